use crate::db_types::{AutomationCall, CallRecord, RecordStatus};
use crate::error::StoreError;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use tracing::{debug, error};

/// Durable record of alert call attempts, keyed by emergency.
#[async_trait]
pub trait CallRecordStore: Send + Sync {
    /// Insert one `initiated` record and return it as persisted.
    async fn create(
        &self,
        emergency_id: &str,
        patient_id: &str,
        patient_name: &str,
        audio_url: &str,
        provider_call_id: Option<&str>,
    ) -> Result<CallRecord, StoreError>;

    /// Most recent record for the emergency, or `None` if it never had one.
    async fn find_latest(&self, emergency_id: &str) -> Result<Option<CallRecord>, StoreError>;
}

pub struct PgCallRecordStore {
    pool: Pool<Postgres>,
}

impl PgCallRecordStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl CallRecordStore for PgCallRecordStore {
    async fn create(
        &self,
        emergency_id: &str,
        patient_id: &str,
        patient_name: &str,
        audio_url: &str,
        provider_call_id: Option<&str>,
    ) -> Result<CallRecord, StoreError> {
        // an initiated record always points at a placed call
        if provider_call_id.is_none() {
            return Err(StoreError::MissingProviderCallId);
        }
        let row = sqlx::query_as::<_, AutomationCall>(
            "
            insert into automation_calls (
              emergency_id,
              patient_id,
              patient_name,
              audio_url,
              twilio_call_sid,
              status
            ) values (
              $1,
              $2,
              $3,
              $4,
              $5,
              $6
            )
            returning *
            ",
        )
        .bind(emergency_id)
        .bind(patient_id)
        .bind(patient_name)
        .bind(audio_url)
        .bind(provider_call_id)
        .bind(RecordStatus::Initiated.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(error=%e, "failed to insert automation call row");
            StoreError::Database(e)
        })?
        .ok_or_else(|| {
            error!("automation call insert returned no row");
            StoreError::NoRowReturned
        })?;
        debug!(id=%row.id, "inserted automation call row");

        Ok(CallRecord::from(row))
    }

    async fn find_latest(&self, emergency_id: &str) -> Result<Option<CallRecord>, StoreError> {
        let row = sqlx::query_as::<_, AutomationCall>(
            "
            select *
            from automation_calls
            where emergency_id = $1
            order by created_at desc
            limit 1
            ",
        )
        .bind(emergency_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(error=%e, "failed to select automation call row");
            StoreError::Database(e)
        })?;

        Ok(row.map(CallRecord::from))
    }
}
