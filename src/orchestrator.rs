use crate::config::Config;
use crate::dispatcher::{Dispatcher, TwilioDispatcher};
use crate::error::{DispatchError, PipelineError, StoreError};
use crate::publisher::{AudioPublisher, StoragePublisher, SupabaseStorage};
use crate::record_store::{CallRecordStore, PgCallRecordStore};
use crate::synthesizer::{ElevenLabsSynthesizer, Synthesizer};
use crate::types::{
    AlertRequest, CallAttemptStatus, CallStatusReport, PipelineState, TriggerSuccess,
};
use crate::utils::{http_client, mask_number};

use sqlx::{Pool, Postgres};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Runs the alert pipeline: synthesize, publish, dispatch, record.
///
/// Runs are independent.  The orchestrator holds no per-run state, so one instance can be
/// shared behind an `Arc` and triggered concurrently.  Nothing is retried and nothing is
/// rolled back: audio published before a later failure stays where it is.
pub struct Orchestrator {
    synthesizer: Arc<dyn Synthesizer>,
    publisher: Arc<dyn AudioPublisher>,
    dispatcher: Arc<dyn Dispatcher>,
    store: Arc<dyn CallRecordStore>,
    default_location: String,
    default_call_to_number: String,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        synthesizer: Arc<dyn Synthesizer>,
        publisher: Arc<dyn AudioPublisher>,
        dispatcher: Arc<dyn Dispatcher>,
        store: Arc<dyn CallRecordStore>,
    ) -> Self {
        Self {
            synthesizer,
            publisher,
            dispatcher,
            store,
            default_location: config.default_location.clone(),
            default_call_to_number: config.default_call_to_number.clone(),
        }
    }

    /// Wire up the production providers: ElevenLabs, Supabase Storage, Twilio and Postgres.
    pub fn from_config(config: &Config, db_pool: Pool<Postgres>) -> Result<Self, reqwest::Error> {
        let http_client = http_client(config)?;
        let storage = SupabaseStorage::new(config, http_client.clone());
        Ok(Self::new(
            config,
            Arc::new(ElevenLabsSynthesizer::new(config, http_client.clone())),
            Arc::new(StoragePublisher::new(storage, config.storage_bucket.clone())),
            Arc::new(TwilioDispatcher::new(config, http_client)),
            Arc::new(PgCallRecordStore::new(db_pool)),
        ))
    }

    /// Run one pipeline for `request`.  On success exactly one call record exists for the run;
    /// on failure none does.
    pub async fn trigger(&self, request: &AlertRequest) -> Result<TriggerSuccess, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline", emergency_id=%request.emergency_id, %run_id);
        async {
            let mut state = PipelineState::Idle;
            let result = self.advance(request, &mut state).await;
            match &result {
                Ok(success) => {
                    transition(&mut state, PipelineState::Succeeded);
                    info!(
                        automation_call_id=%success.automation_call_id,
                        call_sid=%success.provider_call_id,
                        audio_url=%success.audio_url,
                        "pipeline run succeeded"
                    );
                }
                Err(e) => {
                    let failed = PipelineState::Failed {
                        stage: e.stage(),
                        reason: e.to_string(),
                    };
                    transition(&mut state, failed);
                    error!(stage=%e.stage(), error=%e, "pipeline run failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn advance(
        &self,
        request: &AlertRequest,
        state: &mut PipelineState,
    ) -> Result<TriggerSuccess, PipelineError> {
        if let Some(field) = request.missing_field() {
            warn!(field, "rejecting alert request");
            return Err(PipelineError::Validation(field));
        }
        let location = request
            .location
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(self.default_location.as_str());
        let target_number = request
            .target_number
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(self.default_call_to_number.as_str());
        debug!(location=%location, to=%mask_number(target_number), "alert request accepted");

        transition(state, PipelineState::Synthesizing);
        let audio = self
            .synthesizer
            .synthesize(&request.patient_name, location)
            .await?;
        debug!(bytes = audio.len(), "alert audio synthesized");

        transition(state, PipelineState::Publishing);
        let published = self
            .publisher
            .publish(audio, &request.emergency_id)
            .await?;
        debug!(storage_key=%published.storage_key, url=%published.url, "alert audio published");

        transition(state, PipelineState::Dispatching);
        let attempt = self
            .dispatcher
            .dispatch(target_number, &published.url)
            .await
            .and_then(|attempt| match attempt.status {
                CallAttemptStatus::Initiated => Ok(attempt),
                // a call that is already over is never recorded as initiated
                CallAttemptStatus::Failed => {
                    Err(DispatchError::CallFailed(attempt.provider_status))
                }
            })
            .map_err(|e| {
                warn!(storage_key=%published.storage_key, "published audio left orphaned");
                e
            })?;
        debug!(
            call_sid=%attempt.provider_call_id,
            attempt_status=?attempt.status,
            provider_status=?attempt.provider_status,
            to=%mask_number(&attempt.destination_number),
            "alert call placed"
        );

        transition(state, PipelineState::Recording);
        let record = self
            .store
            .create(
                &request.emergency_id,
                &request.patient_id,
                &request.patient_name,
                &published.url,
                Some(attempt.provider_call_id.as_str()),
            )
            .await
            .map_err(|e| {
                warn!(call_sid=%attempt.provider_call_id, "alert call placed but not recorded");
                e
            })?;

        Ok(TriggerSuccess {
            success: true,
            automation_call_id: record.id,
            provider_call_id: attempt.provider_call_id,
            audio_url: published.url,
            status: record.status,
        })
    }

    /// Latest recorded call for the emergency.  `Ok(None)` means no call was ever recorded.
    pub async fn get_status(
        &self,
        emergency_id: &str,
    ) -> Result<Option<CallStatusReport>, StoreError> {
        if emergency_id.trim().is_empty() {
            return Ok(None);
        }
        let record = self.store.find_latest(emergency_id).await?;
        match &record {
            Some(r) => debug!(emergency_id, automation_call_id=%r.id, status=%r.status, "found call record"),
            None => debug!(emergency_id, "no call record"),
        }
        Ok(record.map(CallStatusReport::from))
    }
}

fn transition(state: &mut PipelineState, next: PipelineState) {
    debug_assert!(!state.is_terminal(), "transition out of terminal state {state}");
    info!(from=%state, state=%next, "pipeline transition");
    *state = next;
}
