use crate::twilio_types::CallStatus;
use crate::types::Stage;

use thiserror::Error;

/// Failure to build a [`crate::Config`] from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("speech synthesis request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("speech synthesis rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("speech synthesis returned no audio")]
    EmptyAudio,
}

/// Error from the object storage collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("storage rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Error)]
#[error("failed to upload {key} to bucket {bucket} (bucket repaired: {bucket_repaired}): {source}")]
pub struct PublishError {
    pub bucket: String,
    pub key: String,
    /// Whether the one-time bucket self-heal that follows an upload failure succeeded.
    pub bucket_repaired: bool,
    #[source]
    pub source: StorageError,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("call request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("call rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("call response missing call sid")]
    MissingCallSid,

    /// Twilio accepted the request but the call is already over.
    #[error("call ended immediately with status {0:?}")]
    CallFailed(CallStatus),

    /// 2xx from Twilio that could not be parsed.  The call has most likely been placed.
    #[error("call likely placed but response unreadable ({reason}): {body}")]
    UnreadableResponse { reason: String, body: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("insert returned no row")]
    NoRowReturned,

    #[error("refusing to record an initiated call without a provider call id")]
    MissingProviderCallId,
}

/// Aggregate failure of a pipeline run. Carries the failing stage and its cause.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("missing required field: {0}")]
    Validation(&'static str),

    #[error("synthesize stage failed: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("publish stage failed: {0}")]
    Publish(#[from] PublishError),

    #[error("dispatch stage failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("record stage failed: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Validation(_) => Stage::Validate,
            PipelineError::Synthesis(_) => Stage::Synthesize,
            PipelineError::Publish(_) => Stage::Publish,
            PipelineError::Dispatch(_) => Stage::Dispatch,
            PipelineError::Store(_) => Stage::Record,
        }
    }
}
