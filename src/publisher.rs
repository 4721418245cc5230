use crate::config::Config;
use crate::consts::{ALERT_AUDIO_CONTENT_TYPE, STORAGE_KEY_SUFFIX_LEN};
use crate::error::{PublishError, StorageError};
use crate::types::PublishedAudio;
use crate::utils::truncate_body;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Object name for one run's alert audio: the emergency id plus a random suffix, so repeated or
/// concurrent triggers for the same emergency never collide.
pub fn storage_key(emergency_id: &str) -> String {
    let safe: String = emergency_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("emergency_{safe}_{}.mp3", &suffix[..STORAGE_KEY_SUFFIX_LEN])
}

/// Content store the alert audio is written to.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    fn public_url(&self, bucket: &str, key: &str) -> String;

    /// Make sure `bucket` exists and is publicly readable, creating it if absent.
    async fn ensure_public_bucket(&self, bucket: &str) -> Result<(), StorageError>;
}

/// Stores alert audio and hands back a URL the telephony provider can fetch.
#[async_trait]
pub trait AudioPublisher: Send + Sync {
    async fn publish(&self, audio: Vec<u8>, name_hint: &str)
        -> Result<PublishedAudio, PublishError>;
}

pub struct StoragePublisher<S> {
    store: S,
    bucket: String,
}

impl<S: ObjectStore> StoragePublisher<S> {
    pub fn new(store: S, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// The backing store, so callers and test doubles can inspect what was written.
    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S: ObjectStore> AudioPublisher for StoragePublisher<S> {
    async fn publish(
        &self,
        audio: Vec<u8>,
        name_hint: &str,
    ) -> Result<PublishedAudio, PublishError> {
        let key = storage_key(name_hint);
        debug!(bucket=%self.bucket, key=%key, bytes=audio.len(), "uploading alert audio");

        if let Err(source) = self
            .store
            .put(&self.bucket, &key, audio, ALERT_AUDIO_CONTENT_TYPE)
            .await
        {
            error!(error=%source, bucket=%self.bucket, key=%key, "alert audio upload failed");
            // One-time self-heal so the caller's next attempt can succeed.  The upload itself
            // is not retried here.
            let bucket_repaired = match self.store.ensure_public_bucket(&self.bucket).await {
                Ok(()) => {
                    info!(bucket=%self.bucket, "bucket created or verified as public");
                    true
                }
                Err(e) => {
                    warn!(error=%e, bucket=%self.bucket, "bucket self-heal failed");
                    false
                }
            };
            return Err(PublishError {
                bucket: self.bucket.clone(),
                key,
                bucket_repaired,
                source,
            });
        }

        let url = self.store.public_url(&self.bucket, &key);
        debug!(url=%url, "alert audio published");
        Ok(PublishedAudio {
            url,
            storage_key: key,
        })
    }
}

/// Supabase Storage over its REST API, authenticated with the service role key.
pub struct SupabaseStorage {
    http_client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl SupabaseStorage {
    pub fn new(config: &Config, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url: config.supabase_url.clone(),
            service_key: config.supabase_service_key.clone(),
        }
    }

    fn authed(&self, rq: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        rq.bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }
}

async fn check(resp: reqwest::Response) -> Result<(), StorageError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StorageError::Rejected {
        status: status.as_u16(),
        body: truncate_body(body, 500),
    })
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let url = format!("{}/storage/v1/object/{bucket}/{key}", self.base_url);
        let resp = self
            .authed(self.http_client.post(url))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;
        check(resp).await
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/storage/v1/object/public/{bucket}/{key}", self.base_url)
    }

    async fn ensure_public_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let url = format!("{}/storage/v1/bucket", self.base_url);
        let resp = self
            .authed(self.http_client.post(url))
            .json(&json!({ "id": bucket, "name": bucket, "public": true }))
            .send()
            .await?;
        match check(resp).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // most likely the bucket already exists; flip it to public instead
                debug!(error=%e, bucket=%bucket, "bucket create refused; updating visibility");
                let url = format!("{}/storage/v1/bucket/{bucket}", self.base_url);
                let resp = self
                    .authed(self.http_client.put(url))
                    .json(&json!({ "id": bucket, "public": true }))
                    .send()
                    .await?;
                check(resp).await
            }
        }
    }
}
