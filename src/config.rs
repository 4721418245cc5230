use crate::consts::{
    DEFAULT_CALL_TO_NUMBER, DEFAULT_LOCATION, DEFAULT_STORAGE_BUCKET, ELEVENLABS_API_URL,
    ELEVENLABS_MODEL_ID, ELEVENLABS_OUTPUT_FORMAT, ELEVENLABS_VOICE_ID, REQUEST_TIMEOUT_SECS,
    TWILIO_API_URL,
};
use crate::error::ConfigError;

use std::env;
use std::fmt;
use std::time::Duration;

/// Process-wide settings, built once at startup and handed to each component.
#[derive(Clone)]
pub struct Config {
    pub elevenlabs_api_key: String,
    pub elevenlabs_api_url: String,
    pub voice_id: String,
    pub model_id: String,
    pub output_format: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_api_url: String,
    pub twilio_from_number: String,
    /// Used when a trigger does not name a number to call
    pub default_call_to_number: String,
    /// Used when a trigger does not name a location
    pub default_location: String,
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub storage_bucket: String,
    pub database_url: String,
    pub request_timeout: Duration,
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        // a missing .env file is fine; real deployments set the environment directly
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let optional = |key: &'static str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                    key: "REQUEST_TIMEOUT_SECS",
                    message: e.to_string(),
                })?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        key: "REQUEST_TIMEOUT_SECS",
                        message: "must be at least one second".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(REQUEST_TIMEOUT_SECS),
        };

        Ok(Self {
            elevenlabs_api_key: required("ELEVENLABS_API_KEY")?,
            elevenlabs_api_url: trim_base(optional("ELEVENLABS_API_URL", ELEVENLABS_API_URL)),
            voice_id: optional("ELEVENLABS_VOICE_ID", ELEVENLABS_VOICE_ID),
            model_id: optional("ELEVENLABS_MODEL_ID", ELEVENLABS_MODEL_ID),
            output_format: optional("ELEVENLABS_OUTPUT_FORMAT", ELEVENLABS_OUTPUT_FORMAT),
            twilio_account_sid: required("TWILIO_ACCOUNT_SID")?,
            twilio_auth_token: required("TWILIO_AUTH_TOKEN")?,
            twilio_api_url: trim_base(optional("TWILIO_API_URL", TWILIO_API_URL)),
            twilio_from_number: required("TWILIO_FROM_NUMBER")?,
            default_call_to_number: optional("CALL_TO_NUMBER", DEFAULT_CALL_TO_NUMBER),
            default_location: optional("DEFAULT_LOCATION", DEFAULT_LOCATION),
            supabase_url: trim_base(required("SUPABASE_URL")?),
            supabase_service_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
            storage_bucket: optional("SUPABASE_STORAGE_BUCKET", DEFAULT_STORAGE_BUCKET),
            database_url: required("DATABASE_URL")?,
            request_timeout,
        })
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Config")
            .field("elevenlabs_api_url", &self.elevenlabs_api_url)
            .field("voice_id", &self.voice_id)
            .field("model_id", &self.model_id)
            .field("output_format", &self.output_format)
            .field("twilio_api_url", &self.twilio_api_url)
            .field("twilio_from_number", &self.twilio_from_number)
            .field("default_call_to_number", &self.default_call_to_number)
            .field("default_location", &self.default_location)
            .field("supabase_url", &self.supabase_url)
            .field("storage_bucket", &self.storage_bucket)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

/// Config with fixed test credentials; `overrides` replace or add variables.
#[cfg(test)]
pub(crate) fn test_config(overrides: &[(&'static str, String)]) -> Config {
    let mut env: std::collections::HashMap<&'static str, String> = [
        ("ELEVENLABS_API_KEY", "xi-test"),
        ("TWILIO_ACCOUNT_SID", "ACtest"),
        ("TWILIO_AUTH_TOKEN", "token"),
        ("TWILIO_FROM_NUMBER", "+15550001111"),
        ("SUPABASE_URL", "https://project.supabase.test"),
        ("SUPABASE_SERVICE_ROLE_KEY", "service"),
        ("DATABASE_URL", "postgres://localhost/test"),
    ]
    .into_iter()
    .map(|(k, v)| (k, v.to_string()))
    .collect();
    env.extend(overrides.iter().cloned());
    match Config::from_lookup(|key| env.get(key).cloned()) {
        Ok(config) => config,
        Err(e) => panic!("test config: {e}"),
    }
}
