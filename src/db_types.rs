use serde::{Serialize, Serializer};
use sqlx::types::time::OffsetDateTime;
use std::fmt;
use uuid::Uuid;

/// Row of the `automation_calls` table.
#[derive(sqlx::FromRow)]
pub struct AutomationCall {
    pub id: Uuid,
    pub emergency_id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub audio_url: String,
    pub twilio_call_sid: Option<String>,
    pub status: String,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordStatus {
    Initiated,
    Completed,
    Failed,
    /// Anything written to the table by something other than this crate
    Other(String),
}

impl RecordStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RecordStatus::Initiated => "initiated",
            RecordStatus::Completed => "completed",
            RecordStatus::Failed => "failed",
            RecordStatus::Other(s) => s,
        }
    }
}

impl From<String> for RecordStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "initiated" => RecordStatus::Initiated,
            "completed" => RecordStatus::Completed,
            "failed" => RecordStatus::Failed,
            _ => RecordStatus::Other(s),
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for RecordStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The durable artifact of a pipeline run.
#[derive(Clone, Debug)]
pub struct CallRecord {
    pub id: Uuid,
    pub emergency_id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub audio_url: String,
    pub provider_call_id: Option<String>,
    pub status: RecordStatus,
    pub created_at: OffsetDateTime,
}

impl From<AutomationCall> for CallRecord {
    fn from(row: AutomationCall) -> Self {
        Self {
            id: row.id,
            emergency_id: row.emergency_id,
            patient_id: row.patient_id,
            patient_name: row.patient_name,
            audio_url: row.audio_url,
            provider_call_id: row.twilio_call_sid,
            status: RecordStatus::from(row.status),
            created_at: row.created_at,
        }
    }
}
