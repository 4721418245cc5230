//! Emergency alert call pipeline.
//!
//! A pipeline run turns an [`AlertRequest`] into a spoken alert (ElevenLabs), publishes the
//! audio (Supabase Storage), places a voice call that plays it (Twilio) and records the
//! attempt (Postgres). [`Orchestrator`] sequences the stages and stops at the first failure.

pub mod config;
pub mod db_types;
pub mod dispatcher;
mod elevenlabs_types;
pub mod error;
pub mod orchestrator;
pub mod publisher;
pub mod record_store;
pub mod synthesizer;
pub mod twilio_types;
pub mod types;
pub mod utils;

pub use config::Config;
pub use db_types::{CallRecord, RecordStatus};
pub use dispatcher::{Dispatcher, TwilioDispatcher};
pub use error::{
    ConfigError, DispatchError, PipelineError, PublishError, StorageError, StoreError,
    SynthesisError,
};
pub use orchestrator::Orchestrator;
pub use publisher::{AudioPublisher, ObjectStore, StoragePublisher, SupabaseStorage};
pub use record_store::{CallRecordStore, PgCallRecordStore};
pub use synthesizer::{ElevenLabsSynthesizer, Synthesizer};
pub use types::{
    AlertRequest, CallAttempt, CallAttemptStatus, CallStatusReport, PipelineState,
    PublishedAudio, Stage, TriggerSuccess,
};

pub mod consts {
    pub const ALERT_AUDIO_CONTENT_TYPE: &str = "audio/mpeg";
    pub const DEFAULT_CALL_TO_NUMBER: &str = "+16056709329";
    pub const DEFAULT_LOCATION: &str = "University of Rhode Island";
    pub const DEFAULT_STORAGE_BUCKET: &str = "elevenlabs";
    pub const ELEVENLABS_API_URL: &str = "https://api.elevenlabs.io/v1";
    pub const ELEVENLABS_MODEL_ID: &str = "eleven_multilingual_v2";
    pub const ELEVENLABS_OUTPUT_FORMAT: &str = "mp3_44100_128";
    pub const ELEVENLABS_VOICE_ID: &str = "JBFqnCBsd6RMkjVDRZzb";
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;
    pub const STORAGE_KEY_SUFFIX_LEN: usize = 8;
    pub const TWILIO_API_URL: &str = "https://api.twilio.com/2010-04-01";
}
