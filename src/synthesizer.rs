use crate::config::Config;
use crate::elevenlabs_types::{TextToSpeechPayload, VoiceSettings};
use crate::error::SynthesisError;
use crate::utils::truncate_body;

use async_trait::async_trait;
use tracing::{debug, error};

/// Spoken sentence for an emergency alert.
pub fn alert_text(patient_name: &str, location: &str) -> String {
    format!("{patient_name} has been in an emergency in {location} and needs medical attention asap")
}

/// Turns the alert for a patient into audio bytes.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, patient_name: &str, location: &str)
        -> Result<Vec<u8>, SynthesisError>;
}

/// ElevenLabs text-to-speech with a fixed voice, model and output format.
pub struct ElevenLabsSynthesizer {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
    voice_id: String,
    model_id: String,
    output_format: String,
    voice_settings: VoiceSettings,
}

impl ElevenLabsSynthesizer {
    pub fn new(config: &Config, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            api_url: config.elevenlabs_api_url.clone(),
            api_key: config.elevenlabs_api_key.clone(),
            voice_id: config.voice_id.clone(),
            model_id: config.model_id.clone(),
            output_format: config.output_format.clone(),
            voice_settings: VoiceSettings::default(),
        }
    }
}

#[async_trait]
impl Synthesizer for ElevenLabsSynthesizer {
    async fn synthesize(
        &self,
        patient_name: &str,
        location: &str,
    ) -> Result<Vec<u8>, SynthesisError> {
        let text = alert_text(patient_name, location);
        let url = format!("{}/text-to-speech/{}", self.api_url, self.voice_id);
        let payload = TextToSpeechPayload {
            text: &text,
            model_id: &self.model_id,
            voice_settings: self.voice_settings,
        };
        debug!(voice=%self.voice_id, model=%self.model_id, format=%self.output_format, "requesting speech");
        let resp = self
            .http_client
            .post(url)
            .query(&[("output_format", self.output_format.as_str())])
            .header("xi-api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(error=%e, "failed to send request to ElevenLabs");
                SynthesisError::Transport(e)
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(status=%status, "ElevenLabs rejected speech request");
            return Err(SynthesisError::Rejected {
                status: status.as_u16(),
                body: truncate_body(body, 500),
            });
        }

        let audio = resp.bytes().await.map_err(|e| {
            error!(error=%e, "failed to read ElevenLabs audio body");
            SynthesisError::Transport(e)
        })?;
        if audio.is_empty() {
            error!("ElevenLabs returned an empty audio body");
            return Err(SynthesisError::EmptyAudio);
        }
        debug!(bytes = audio.len(), "got speech audio");

        Ok(audio.to_vec())
    }
}
