use crate::config::Config;
use crate::error::DispatchError;
use crate::twilio_types::{play_twiml, CallResource, TwilioApiError};
use crate::types::{CallAttempt, CallAttemptStatus};
use crate::utils::{mask_number, truncate_body};

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

/// Places the outbound alert call.  Every successful invocation rings a real phone, so callers
/// invoke it at most once per alert.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(
        &self,
        destination_number: &str,
        audio_url: &str,
    ) -> Result<CallAttempt, DispatchError>;
}

/// Twilio Calls API with inline TwiML, so no hosted call flow is needed.
pub struct TwilioDispatcher {
    http_client: reqwest::Client,
    api_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioDispatcher {
    pub fn new(config: &Config, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            api_url: config.twilio_api_url.clone(),
            account_sid: config.twilio_account_sid.clone(),
            auth_token: config.twilio_auth_token.clone(),
            from_number: config.twilio_from_number.clone(),
        }
    }
}

#[async_trait]
impl Dispatcher for TwilioDispatcher {
    async fn dispatch(
        &self,
        destination_number: &str,
        audio_url: &str,
    ) -> Result<CallAttempt, DispatchError> {
        let account_sid = &self.account_sid;
        let url = format!("{}/Accounts/{account_sid}/Calls.json", self.api_url);
        let twiml = play_twiml(audio_url);
        let mut form = HashMap::new();
        form.insert("From", self.from_number.as_str());
        form.insert("To", destination_number);
        form.insert("Twiml", twiml.as_str());
        debug!(to=%mask_number(destination_number), twiml=%twiml, "placing twilio call");

        let resp = self
            .http_client
            .post(url)
            .basic_auth(account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!(error=%e, "failed to send call request to twilio");
                DispatchError::Transport(e)
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let body = match serde_json::from_str::<TwilioApiError>(&body) {
                Ok(api_error) => match api_error.code {
                    Some(code) => format!("{code}: {}", api_error.message),
                    None => api_error.message,
                },
                Err(_) => truncate_body(body, 500),
            };
            error!(status=%status, error=%body, "twilio rejected call request");
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        // From here on Twilio has accepted the call; errors must not invite a blind retry.
        let body = resp.text().await.map_err(|e| {
            warn!(error=%e, "call likely placed, response unreadable");
            DispatchError::UnreadableResponse {
                reason: e.to_string(),
                body: String::new(),
            }
        })?;
        let call = serde_json::from_str::<CallResource>(&body).map_err(|e| {
            warn!(error=%e, body=%body, "call likely placed, response unreadable");
            DispatchError::UnreadableResponse {
                reason: e.to_string(),
                body: truncate_body(body.clone(), 500),
            }
        })?;
        let provider_call_id = call.sid.ok_or_else(|| {
            error!("twilio call resource has no sid");
            DispatchError::MissingCallSid
        })?;
        info!(call_sid=%provider_call_id, call_status=?call.status, "twilio call created");

        let status = CallAttemptStatus::from(&call.status);
        if status == CallAttemptStatus::Failed {
            error!(call_sid=%provider_call_id, call_status=?call.status, "twilio call ended immediately");
            return Err(DispatchError::CallFailed(call.status));
        }

        Ok(CallAttempt {
            provider_call_id,
            status,
            provider_status: call.status,
            destination_number: call.to,
        })
    }
}
