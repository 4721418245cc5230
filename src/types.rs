use crate::db_types::{CallRecord, RecordStatus};
use crate::twilio_types::CallStatus;

use serde::Serialize;
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Input to one pipeline run.  `location` and `target_number` fall back to the configured
/// defaults when `None`.
#[derive(Clone, Debug, Default)]
pub struct AlertRequest {
    pub emergency_id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub location: Option<String>,
    pub target_number: Option<String>,
}

impl AlertRequest {
    pub fn new(
        emergency_id: impl Into<String>,
        patient_id: impl Into<String>,
        patient_name: impl Into<String>,
    ) -> Self {
        Self {
            emergency_id: emergency_id.into(),
            patient_id: patient_id.into(),
            patient_name: patient_name.into(),
            ..Default::default()
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_target_number(mut self, target_number: impl Into<String>) -> Self {
        self.target_number = Some(target_number.into());
        self
    }

    /// Name of the first required field that is empty or blank, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("emergency_id", &self.emergency_id),
            ("patient_id", &self.patient_id),
            ("patient_name", &self.patient_name),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

/// Audio uploaded to object storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedAudio {
    pub url: String,
    pub storage_key: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallAttemptStatus {
    Initiated,
    Failed,
}

impl From<&CallStatus> for CallAttemptStatus {
    fn from(status: &CallStatus) -> Self {
        match status {
            CallStatus::Busy | CallStatus::Failed | CallStatus::NoAnswer | CallStatus::Canceled => {
                CallAttemptStatus::Failed
            }
            _ => CallAttemptStatus::Initiated,
        }
    }
}

/// Outcome of asking the telephony provider to place a call.
#[derive(Debug)]
pub struct CallAttempt {
    pub provider_call_id: String,
    pub status: CallAttemptStatus,
    /// Status exactly as the provider reported it
    pub provider_status: CallStatus,
    pub destination_number: String,
}

/// The pipeline stages, in execution order.  `Validate` happens before any external call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Validate,
    Synthesize,
    Publish,
    Dispatch,
    Record,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Stage::Validate => "validate",
            Stage::Synthesize => "synthesize",
            Stage::Publish => "publish",
            Stage::Dispatch => "dispatch",
            Stage::Record => "record",
        };
        write!(f, "{s}")
    }
}

/// Where a pipeline run currently is.  `Succeeded` and `Failed` are terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Synthesizing,
    Publishing,
    Dispatching,
    Recording,
    Succeeded,
    Failed { stage: Stage, reason: String },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Succeeded | PipelineState::Failed { .. }
        )
    }

    /// The stage performed while in this state, if it is a working state.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineState::Idle => Some(Stage::Validate),
            PipelineState::Synthesizing => Some(Stage::Synthesize),
            PipelineState::Publishing => Some(Stage::Publish),
            PipelineState::Dispatching => Some(Stage::Dispatch),
            PipelineState::Recording => Some(Stage::Record),
            PipelineState::Succeeded | PipelineState::Failed { .. } => None,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::Synthesizing => write!(f, "synthesizing"),
            PipelineState::Publishing => write!(f, "publishing"),
            PipelineState::Dispatching => write!(f, "dispatching"),
            PipelineState::Recording => write!(f, "recording"),
            PipelineState::Succeeded => write!(f, "succeeded"),
            PipelineState::Failed { stage, .. } => write!(f, "failed({stage})"),
        }
    }
}

/// Result of a pipeline run that made it all the way through.
#[derive(Clone, Debug, Serialize)]
pub struct TriggerSuccess {
    pub success: bool,
    pub automation_call_id: Uuid,
    #[serde(rename = "call_sid")]
    pub provider_call_id: String,
    pub audio_url: String,
    pub status: RecordStatus,
}

/// Latest known state of the automated call for an emergency.
#[derive(Clone, Debug, Serialize)]
pub struct CallStatusReport {
    pub automation_call_id: Uuid,
    pub status: RecordStatus,
    #[serde(rename = "call_sid")]
    pub provider_call_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<CallRecord> for CallStatusReport {
    fn from(record: CallRecord) -> Self {
        Self {
            automation_call_id: record.id,
            status: record.status,
            provider_call_id: record.provider_call_id,
            created_at: record.created_at,
        }
    }
}
