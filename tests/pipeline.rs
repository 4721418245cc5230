use emergency_alert::twilio_types::CallStatus;
use emergency_alert::{
    AlertRequest, AudioPublisher, CallAttempt, CallAttemptStatus, CallRecord, CallRecordStore,
    Config, DispatchError, Dispatcher, ObjectStore, Orchestrator, PipelineError, RecordStatus,
    Stage, StorageError, StoragePublisher, StoreError, SynthesisError, Synthesizer,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Default)]
struct FakeSynthesizer {
    fail: bool,
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(
        &self,
        patient_name: &str,
        location: &str,
    ) -> Result<Vec<u8>, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((patient_name.to_string(), location.to_string()));
        if self.fail {
            return Err(SynthesisError::Rejected {
                status: 401,
                body: "invalid api key".to_string(),
            });
        }
        Ok(b"ID3 fake mp3".to_vec())
    }
}

#[derive(Default)]
struct MemoryStore {
    fail: bool,
    objects: Mutex<Vec<String>>,
    heals: AtomicUsize,
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(
        &self,
        _bucket: &str,
        key: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        self.objects.lock().unwrap().push(key.to_string());
        if self.fail {
            return Err(StorageError::Rejected {
                status: 404,
                body: "Bucket not found".to_string(),
            });
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("https://project.supabase.test/storage/v1/object/public/{bucket}/{key}")
    }

    async fn ensure_public_bucket(&self, _bucket: &str) -> Result<(), StorageError> {
        self.heals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct FakeDispatcher {
    fail: bool,
    /// Provider status reported for placed calls; queued when unset.
    provider_status: Option<CallStatus>,
    calls: AtomicUsize,
    placed: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Dispatcher for FakeDispatcher {
    async fn dispatch(
        &self,
        destination_number: &str,
        audio_url: &str,
    ) -> Result<CallAttempt, DispatchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.placed
            .lock()
            .unwrap()
            .push((destination_number.to_string(), audio_url.to_string()));
        if self.fail {
            return Err(DispatchError::Rejected {
                status: 400,
                body: "21211: The 'To' number is not a valid phone number.".to_string(),
            });
        }
        let provider_status = self.provider_status.clone().unwrap_or(CallStatus::Queued);
        Ok(CallAttempt {
            provider_call_id: format!("CA{n:032}"),
            status: CallAttemptStatus::from(&provider_status),
            provider_status,
            destination_number: destination_number.to_string(),
        })
    }
}

#[derive(Default)]
struct MemoryRecordStore {
    fail: bool,
    creates: AtomicUsize,
    records: Mutex<Vec<CallRecord>>,
}

#[async_trait]
impl CallRecordStore for MemoryRecordStore {
    async fn create(
        &self,
        emergency_id: &str,
        patient_id: &str,
        patient_name: &str,
        audio_url: &str,
        provider_call_id: Option<&str>,
    ) -> Result<CallRecord, StoreError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StoreError::NoRowReturned);
        }
        let record = CallRecord {
            id: Uuid::new_v4(),
            emergency_id: emergency_id.to_string(),
            patient_id: patient_id.to_string(),
            patient_name: patient_name.to_string(),
            audio_url: audio_url.to_string(),
            provider_call_id: provider_call_id.map(str::to_string),
            status: RecordStatus::Initiated,
            created_at: OffsetDateTime::now_utc(),
        };
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn find_latest(&self, emergency_id: &str) -> Result<Option<CallRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.emergency_id == emergency_id)
            .cloned())
    }
}

#[derive(Default)]
struct Failures {
    synthesize: bool,
    publish: bool,
    dispatch: bool,
    call_status: Option<CallStatus>,
    record: bool,
}

struct Harness {
    synthesizer: Arc<FakeSynthesizer>,
    publisher: Arc<StoragePublisher<MemoryStore>>,
    dispatcher: Arc<FakeDispatcher>,
    store: Arc<MemoryRecordStore>,
    orchestrator: Orchestrator,
}

impl Harness {
    fn new(failures: Failures) -> Self {
        let env = HashMap::from([
            ("ELEVENLABS_API_KEY", "xi-test"),
            ("TWILIO_ACCOUNT_SID", "ACtest"),
            ("TWILIO_AUTH_TOKEN", "token"),
            ("TWILIO_FROM_NUMBER", "+15550001111"),
            ("SUPABASE_URL", "https://project.supabase.test"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service"),
            ("DATABASE_URL", "postgres://localhost/test"),
        ]);
        let config = Config::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();

        let synthesizer = Arc::new(FakeSynthesizer {
            fail: failures.synthesize,
            ..Default::default()
        });
        let publisher = Arc::new(StoragePublisher::new(
            MemoryStore {
                fail: failures.publish,
                ..Default::default()
            },
            config.storage_bucket.clone(),
        ));
        let dispatcher = Arc::new(FakeDispatcher {
            fail: failures.dispatch,
            provider_status: failures.call_status,
            ..Default::default()
        });
        let store = Arc::new(MemoryRecordStore {
            fail: failures.record,
            ..Default::default()
        });
        let orchestrator = Orchestrator::new(
            &config,
            synthesizer.clone(),
            publisher.clone() as Arc<dyn AudioPublisher>,
            dispatcher.clone(),
            store.clone(),
        );

        Self {
            synthesizer,
            publisher,
            dispatcher,
            store,
            orchestrator,
        }
    }

    fn counts(&self) -> (usize, usize, usize, usize) {
        (
            self.synthesizer.calls.load(Ordering::SeqCst),
            self.publisher.store().objects.lock().unwrap().len(),
            self.dispatcher.calls.load(Ordering::SeqCst),
            self.store.creates.load(Ordering::SeqCst),
        )
    }
}

fn jane_doe() -> AlertRequest {
    AlertRequest::new("E1", "P1", "Jane Doe")
        .with_location("University of Rhode Island")
        .with_target_number("+16056709329")
}

#[tokio::test]
async fn successful_run_records_one_initiated_call() {
    let harness = Harness::new(Failures::default());
    let success = harness.orchestrator.trigger(&jane_doe()).await.unwrap();

    assert!(success.success);
    assert_eq!(success.status, RecordStatus::Initiated);
    assert!(!success.audio_url.is_empty());
    assert!(!success.provider_call_id.is_empty());
    assert_eq!(harness.counts(), (1, 1, 1, 1));

    let records = harness.store.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.id, success.automation_call_id);
    assert_eq!(record.emergency_id, "E1");
    assert_eq!(record.patient_id, "P1");
    assert_eq!(record.patient_name, "Jane Doe");
    assert_eq!(record.audio_url, success.audio_url);
    assert_eq!(
        record.provider_call_id.as_deref(),
        Some(success.provider_call_id.as_str())
    );
}

#[tokio::test]
async fn stages_feed_each_other() {
    let harness = Harness::new(Failures::default());
    let success = harness.orchestrator.trigger(&jane_doe()).await.unwrap();

    let requests = harness.synthesizer.requests.lock().unwrap();
    assert_eq!(
        requests[0],
        (
            "Jane Doe".to_string(),
            "University of Rhode Island".to_string()
        )
    );

    let key = harness.publisher.store().objects.lock().unwrap()[0].clone();
    assert!(key.starts_with("emergency_E1_"));
    assert!(success.audio_url.ends_with(&key));

    let placed = harness.dispatcher.placed.lock().unwrap();
    assert_eq!(
        placed[0],
        ("+16056709329".to_string(), success.audio_url.clone())
    );
}

#[tokio::test]
async fn omitted_location_and_number_use_configured_defaults() {
    let harness = Harness::new(Failures::default());
    let request = AlertRequest::new("E2", "P2", "John Roe");
    harness.orchestrator.trigger(&request).await.unwrap();

    let requests = harness.synthesizer.requests.lock().unwrap();
    assert_eq!(requests[0].1, "University of Rhode Island");
    let placed = harness.dispatcher.placed.lock().unwrap();
    assert_eq!(placed[0].0, "+16056709329");
}

#[tokio::test]
async fn missing_required_fields_touch_no_stage() {
    let cases = [
        AlertRequest::new("", "P1", "Jane Doe"),
        AlertRequest::new("E1", "", "Jane Doe"),
        AlertRequest::new("E1", "P1", ""),
        AlertRequest::new("E1", "P1", "   "),
        AlertRequest::default(),
    ];
    for request in cases {
        let harness = Harness::new(Failures::default());
        let err = harness.orchestrator.trigger(&request).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)), "{err}");
        assert_eq!(err.stage(), Stage::Validate);
        assert_eq!(harness.counts(), (0, 0, 0, 0));
    }
}

#[tokio::test]
async fn synthesis_failure_stops_pipeline() {
    let harness = Harness::new(Failures {
        synthesize: true,
        ..Default::default()
    });
    let err = harness.orchestrator.trigger(&jane_doe()).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Synthesize);
    assert!(matches!(err, PipelineError::Synthesis(_)));
    assert_eq!(harness.counts(), (1, 0, 0, 0));
}

#[tokio::test]
async fn publish_failure_skips_dispatch_and_record() {
    let harness = Harness::new(Failures {
        publish: true,
        ..Default::default()
    });
    let err = harness.orchestrator.trigger(&jane_doe()).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Publish);
    match err {
        PipelineError::Publish(e) => assert!(e.bucket_repaired),
        other => panic!("expected publish failure, got {other}"),
    }
    assert_eq!(harness.counts(), (1, 1, 0, 0));
    assert_eq!(harness.publisher.store().heals.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dispatch_failure_leaves_audio_and_writes_no_record() {
    let harness = Harness::new(Failures {
        dispatch: true,
        ..Default::default()
    });
    let err = harness.orchestrator.trigger(&jane_doe()).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Dispatch);
    assert_eq!(harness.counts(), (1, 1, 1, 0));
    // no compensating delete
    assert_eq!(harness.publisher.store().objects.lock().unwrap().len(), 1);
    assert!(harness.store.records.lock().unwrap().is_empty());
}

#[tokio::test]
async fn busy_call_is_a_dispatch_failure_and_never_recorded() {
    let harness = Harness::new(Failures {
        call_status: Some(CallStatus::Busy),
        ..Default::default()
    });
    let err = harness.orchestrator.trigger(&jane_doe()).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Dispatch);
    assert!(matches!(
        err,
        PipelineError::Dispatch(DispatchError::CallFailed(CallStatus::Busy))
    ));
    assert_eq!(harness.counts(), (1, 1, 1, 0));
    assert!(harness.orchestrator.get_status("E1").await.unwrap().is_none());
}

#[tokio::test]
async fn record_failure_is_reported_after_call_placed() {
    let harness = Harness::new(Failures {
        record: true,
        ..Default::default()
    });
    let err = harness.orchestrator.trigger(&jane_doe()).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Record);
    assert_eq!(harness.counts(), (1, 1, 1, 1));
    assert!(harness
        .orchestrator
        .get_status("E1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn concurrent_triggers_for_same_emergency_stay_independent() {
    let harness = Harness::new(Failures::default());
    let request = jane_doe();
    let (first, second) = tokio::join!(
        harness.orchestrator.trigger(&request),
        harness.orchestrator.trigger(&request),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    let objects = harness.publisher.store().objects.lock().unwrap().clone();
    assert_eq!(objects.len(), 2);
    assert_ne!(objects[0], objects[1]);
    assert_ne!(first.audio_url, second.audio_url);
    assert_ne!(first.automation_call_id, second.automation_call_id);
    assert_ne!(first.provider_call_id, second.provider_call_id);
    assert_eq!(harness.store.records.lock().unwrap().len(), 2);
    assert_eq!(harness.dispatcher.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn status_lookup_before_and_after_trigger() {
    let harness = Harness::new(Failures::default());
    assert!(harness
        .orchestrator
        .get_status("E1")
        .await
        .unwrap()
        .is_none());

    let success = harness.orchestrator.trigger(&jane_doe()).await.unwrap();
    let report = harness
        .orchestrator
        .get_status("E1")
        .await
        .unwrap()
        .expect("status after trigger");

    assert_eq!(report.automation_call_id, success.automation_call_id);
    assert_eq!(report.status, RecordStatus::Initiated);
    assert_eq!(
        report.provider_call_id.as_deref(),
        Some(success.provider_call_id.as_str())
    );
    assert!(harness
        .orchestrator
        .get_status("E404")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn status_reports_latest_record() {
    let harness = Harness::new(Failures::default());
    harness.orchestrator.trigger(&jane_doe()).await.unwrap();
    let second = harness.orchestrator.trigger(&jane_doe()).await.unwrap();

    let report = harness.orchestrator.get_status("E1").await.unwrap().unwrap();
    assert_eq!(report.automation_call_id, second.automation_call_id);
}

#[tokio::test]
async fn trigger_result_serializes_like_the_api_response() {
    let harness = Harness::new(Failures::default());
    let success = harness.orchestrator.trigger(&jane_doe()).await.unwrap();
    let json = serde_json::to_value(&success).unwrap();

    assert_eq!(json["success"], true);
    assert_eq!(json["status"], "initiated");
    assert_eq!(json["call_sid"], success.provider_call_id.as_str());
    assert_eq!(
        json["automation_call_id"],
        success.automation_call_id.to_string()
    );
}
