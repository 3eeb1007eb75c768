#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use safesound_contracts::alert::{Alert, AlertCreateInput, AlertId, Severity};
use safesound_contracts::classification::{ClassificationResult, RawClassification};
use safesound_contracts::notify::DispatchSummary;
use safesound_contracts::user::UserId;
use safesound_contracts::{ContractViolation, ReasonCodeId};
use safesound_engines::classifier::{ClassifierClient, HEALTH_TIMEOUT};
use safesound_engines::gate::{normalize_label, ClassificationGate};
use safesound_storage::repo::StorageError;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::channels::ChannelSet;
use crate::config::PipelineConfig;
use crate::cooldown::AlertCooldown;
use crate::orchestrator::NotificationOrchestrator;
use crate::recipients::RecipientResolver;
use crate::supervisor::NotificationSupervisor;
use crate::{SharedAlertRepo, SharedUserRepo};

pub mod reason_codes {
    use safesound_contracts::ReasonCodeId;

    pub const INGEST_ALERT_CREATED: ReasonCodeId = ReasonCodeId(0x494E_0001);
    pub const INGEST_REPEAT_SUPPRESSED: ReasonCodeId = ReasonCodeId(0x494E_0002);
    pub const INGEST_DANGER_WITHOUT_USER: ReasonCodeId = ReasonCodeId(0x494E_0003);
    pub const INGEST_MANUAL_ALERT_CREATED: ReasonCodeId = ReasonCodeId(0x494E_0004);
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid classification: {0}")]
    InvalidClassification(String),
    #[error("classification service unavailable: {0}")]
    ClassificationServiceUnavailable(String),
    #[error("alert persistence failed: {0}")]
    PersistenceError(#[from] StorageError),
    #[error("user {0} not found")]
    UserNotFound(UserId),
}

impl IngestError {
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::InvalidRequest(_) => "INVALID_REQUEST",
            IngestError::InvalidClassification(_) => "INVALID_CLASSIFICATION",
            IngestError::ClassificationServiceUnavailable(_) => "CLASSIFICATION_SERVICE_UNAVAILABLE",
            IngestError::PersistenceError(_) => "PERSISTENCE_ERROR",
            IngestError::UserNotFound(_) => "USER_NOT_FOUND",
        }
    }
}

#[derive(Debug)]
pub struct IngestOutcome {
    /// The classifier payload, untouched.
    pub classification: Value,
    pub emergency: bool,
    pub alert: Option<Alert>,
    pub suppressed: bool,
    pub reason_code: ReasonCodeId,
    /// Background fan-out. Dropping it does not cancel the fan-out.
    pub notification: Option<JoinHandle<()>>,
}

impl IngestOutcome {
    pub fn severity(&self) -> Option<Severity> {
        self.alert.as_ref().map(|a| a.severity)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManualNotifyRequest {
    pub user_id: UserId,
    pub alert_type: String,
    pub confidence: f64,
    pub location: Option<String>,
}

/// Classify, gate, persist, then schedule the fan-out without waiting for it.
pub struct IngestPipeline {
    classifier: Arc<dyn ClassifierClient>,
    classifier_timeout: Duration,
    gate: ClassificationGate,
    cooldown: AlertCooldown,
    alerts: SharedAlertRepo,
    users: SharedUserRepo,
    supervisor: NotificationSupervisor,
}

impl IngestPipeline {
    pub fn from_config(
        config: &PipelineConfig,
        classifier: Arc<dyn ClassifierClient>,
        alerts: SharedAlertRepo,
        users: SharedUserRepo,
        channels: ChannelSet,
    ) -> Result<Self, ContractViolation> {
        let gate = ClassificationGate::new(config.gate.clone())?;
        let orchestrator = NotificationOrchestrator::new(
            RecipientResolver::new(Arc::clone(&users)),
            channels,
        );
        Ok(Self {
            classifier,
            classifier_timeout: config.classifier_timeout,
            gate,
            cooldown: AlertCooldown::new(config.alert_cooldown_secs),
            alerts,
            users,
            supervisor: NotificationSupervisor::new(
                Arc::new(orchestrator),
                config.max_concurrent_fanouts,
            ),
        })
    }

    pub fn alerts(&self) -> &SharedAlertRepo {
        &self.alerts
    }

    pub fn users(&self) -> &SharedUserRepo {
        &self.users
    }

    pub fn channels(&self) -> &ChannelSet {
        self.supervisor.orchestrator().channels()
    }

    pub async fn ingest_chunk(
        &self,
        audio: Vec<u8>,
        user_id: Option<UserId>,
        location: Option<String>,
    ) -> Result<IngestOutcome, IngestError> {
        if audio.is_empty() {
            return Err(IngestError::InvalidRequest("empty audio chunk".to_string()));
        }
        let payload = self.classify(audio).await?;
        let raw: RawClassification = serde_json::from_value(payload.clone())
            .map_err(|e| IngestError::InvalidClassification(e.to_string()))?;
        let (result, decision) = self
            .gate
            .evaluate(&raw)
            .map_err(|v| IngestError::InvalidClassification(v.to_string()))?;

        if !decision.is_danger {
            tracing::debug!(
                label = %result.label(),
                confidence = result.confidence(),
                reason_code = %decision.reason_code,
                "chunk not dangerous"
            );
            return Ok(IngestOutcome {
                classification: payload,
                emergency: false,
                alert: None,
                suppressed: false,
                reason_code: decision.reason_code,
                notification: None,
            });
        }

        tracing::info!(
            label = %result.label(),
            confidence = result.rounded_confidence(),
            severity = decision.severity.map(Severity::as_str).unwrap_or(""),
            keyword = decision.matched_keyword.as_deref().unwrap_or(""),
            "emergency detected"
        );

        let Some(user_id) = user_id else {
            tracing::warn!(label = %result.label(), "emergency detected without a user id; no alert created");
            return Ok(IngestOutcome {
                classification: payload,
                emergency: true,
                alert: None,
                suppressed: false,
                reason_code: reason_codes::INGEST_DANGER_WITHOUT_USER,
                notification: None,
            });
        };

        let now = Utc::now();
        if !self.cooldown.try_arm(&user_id, &decision.normalized_label, now) {
            tracing::info!(
                user_id = %user_id,
                label = %decision.normalized_label,
                "repeat alert suppressed inside cooldown window"
            );
            return Ok(IngestOutcome {
                classification: payload,
                emergency: true,
                alert: None,
                suppressed: true,
                reason_code: reason_codes::INGEST_REPEAT_SUPPRESSED,
                notification: None,
            });
        }

        let alert = match self.persist(&result, user_id.clone(), location, now) {
            Ok(alert) => alert,
            Err(err) => {
                self.cooldown.disarm(&user_id, &decision.normalized_label);
                return Err(err);
            }
        };
        let handle = self.supervisor.spawn(alert.clone());
        Ok(IngestOutcome {
            classification: payload,
            emergency: true,
            alert: Some(alert),
            suppressed: false,
            reason_code: reason_codes::INGEST_ALERT_CREATED,
            notification: Some(handle),
        })
    }

    /// Operator-triggered alert: gate and cooldown bypassed, fan-out awaited.
    pub async fn notify_emergency(
        &self,
        request: ManualNotifyRequest,
    ) -> Result<(Alert, DispatchSummary), IngestError> {
        if self.users.read().user(&request.user_id).is_none() {
            return Err(IngestError::UserNotFound(request.user_id));
        }
        let result = ClassificationResult::v1(request.alert_type, request.confidence, true)
            .map_err(|v| IngestError::InvalidRequest(v.to_string()))?;
        if normalize_label(result.label()).is_empty() {
            return Err(IngestError::InvalidRequest("type: must not be empty".to_string()));
        }
        let alert = self.persist(&result, request.user_id, request.location, Utc::now())?;
        tracing::info!(
            alert_id = %alert.id,
            reason_code = %reason_codes::INGEST_MANUAL_ALERT_CREATED,
            "manual emergency notification"
        );
        let summary = self.supervisor.orchestrator().dispatch(&alert).await;
        Ok((alert, summary))
    }

    /// Stops scheduling fan-outs and drains the running ones for up to `grace`.
    /// Returns the alerts whose notifications were abandoned.
    pub async fn shutdown(&self, grace: Duration) -> Vec<AlertId> {
        self.supervisor.shutdown(grace).await
    }

    pub async fn classifier_health(&self) -> Result<Value, IngestError> {
        let classifier = Arc::clone(&self.classifier);
        let call = tokio::task::spawn_blocking(move || classifier.health());
        match tokio::time::timeout(HEALTH_TIMEOUT, call).await {
            Err(_) => Err(IngestError::ClassificationServiceUnavailable(
                "health probe timed out".to_string(),
            )),
            Ok(Err(join_err)) => Err(IngestError::ClassificationServiceUnavailable(
                join_err.to_string(),
            )),
            Ok(Ok(result)) => {
                result.map_err(|e| IngestError::ClassificationServiceUnavailable(e.to_string()))
            }
        }
    }

    async fn classify(&self, audio: Vec<u8>) -> Result<Value, IngestError> {
        let classifier = Arc::clone(&self.classifier);
        let call = tokio::task::spawn_blocking(move || classifier.classify(&audio));
        match tokio::time::timeout(self.classifier_timeout, call).await {
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.classifier_timeout.as_millis() as u64,
                    "classifier timed out"
                );
                Err(IngestError::ClassificationServiceUnavailable(format!(
                    "classifier timed out after {}ms",
                    self.classifier_timeout.as_millis()
                )))
            }
            Ok(Err(join_err)) => Err(IngestError::ClassificationServiceUnavailable(
                join_err.to_string(),
            )),
            Ok(Ok(Err(err))) => {
                tracing::warn!(error = %err, "classifier call failed");
                Err(IngestError::ClassificationServiceUnavailable(err.to_string()))
            }
            Ok(Ok(Ok(payload))) => Ok(payload),
        }
    }

    fn persist(
        &self,
        result: &ClassificationResult,
        user_id: UserId,
        location: Option<String>,
        now: chrono::DateTime<Utc>,
    ) -> Result<Alert, IngestError> {
        let input = AlertCreateInput::v1(
            Some(user_id),
            result.label(),
            result.rounded_confidence(),
            location,
        )
        .map_err(|v| IngestError::InvalidClassification(v.to_string()))?;
        let alert = self.alerts.write().create_alert(input, now).map_err(|err| {
            tracing::error!(error = %err, "alert persistence failed");
            IngestError::PersistenceError(err)
        })?;
        tracing::info!(
            alert_id = %alert.id,
            alert_type = %alert.alert_type,
            severity = alert.severity.as_str(),
            location = %alert.location,
            "alert persisted"
        );
        Ok(alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ChannelAdapter;
    use crate::orchestrator::tests::{profile, users, FakeAdapter};
    use chrono::DateTime;
    use parking_lot::{Mutex, RwLock};
    use safesound_contracts::alert::{AlertId, AlertStatus};
    use safesound_contracts::notify::{ChannelKind, REASON_NO_EMERGENCY_CONTACTS};
    use safesound_engines::transport::TransportError;
    use safesound_storage::alerts::AlertStore;
    use safesound_storage::repo::{AlertRepo, AlertTypeStat, StatusCounts};
    use serde_json::json;

    struct FakeClassifier {
        reply: Mutex<Result<Value, TransportError>>,
        delay: Duration,
    }

    impl FakeClassifier {
        fn replying(v: Value) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Ok(v)),
                delay: Duration::ZERO,
            })
        }

        fn set(&self, v: Value) {
            *self.reply.lock() = Ok(v);
        }
    }

    impl ClassifierClient for FakeClassifier {
        fn classify(&self, _audio: &[u8]) -> Result<Value, TransportError> {
            std::thread::sleep(self.delay);
            self.reply.lock().clone()
        }

        fn health(&self) -> Result<Value, TransportError> {
            Ok(json!({"status": "healthy"}))
        }
    }

    /// Store that rejects every write.
    struct BrokenAlertStore;

    impl AlertRepo for BrokenAlertStore {
        fn create_alert(
            &mut self,
            _input: AlertCreateInput,
            _now: DateTime<Utc>,
        ) -> Result<Alert, StorageError> {
            Err(StorageError::Unavailable {
                table: "alerts",
                detail: "disk full".to_string(),
            })
        }
        fn alert(&self, _id: AlertId) -> Option<&Alert> {
            None
        }
        fn list_recent(&self, _limit: usize) -> Vec<&Alert> {
            Vec::new()
        }
        fn update_status(
            &mut self,
            id: AlertId,
            _target: AlertStatus,
            _actor: Option<String>,
            _now: DateTime<Utc>,
        ) -> Result<Alert, StorageError> {
            Err(StorageError::NotFound {
                table: "alerts",
                key: id.to_string(),
            })
        }
        fn count_by_status(&self) -> StatusCounts {
            StatusCounts::default()
        }
        fn aggregate_by_type(&self) -> Vec<AlertTypeStat> {
            Vec::new()
        }
    }

    struct Harness {
        pipeline: IngestPipeline,
        classifier: Arc<FakeClassifier>,
        store: Arc<RwLock<AlertStore>>,
        email: Arc<FakeAdapter>,
        call: Arc<FakeAdapter>,
    }

    fn harness(contacts: usize, cooldown_secs: u64) -> Harness {
        let classifier = FakeClassifier::replying(json!({}));
        let store = Arc::new(RwLock::new(AlertStore::new_in_memory()));
        let email = Arc::new(FakeAdapter::new(ChannelKind::Email));
        let call = Arc::new(FakeAdapter::new(ChannelKind::Call));
        let mut config = PipelineConfig::mvp_v1();
        config.alert_cooldown_secs = cooldown_secs;
        let pipeline = IngestPipeline::from_config(
            &config,
            classifier.clone(),
            store.clone(),
            users(vec![profile("u1", contacts)]),
            ChannelSet::new(
                Some(email.clone() as Arc<dyn ChannelAdapter>),
                Some(call.clone() as Arc<dyn ChannelAdapter>),
            ),
        )
        .unwrap();
        Harness {
            pipeline,
            classifier,
            store,
            email,
            call,
        }
    }

    fn u1() -> Option<UserId> {
        Some(UserId::new("u1").unwrap())
    }

    fn chunk() -> Vec<u8> {
        vec![1, 2, 3, 4]
    }

    #[tokio::test]
    async fn at_ingest_01_glass_breaking_persists_and_notifies() {
        let h = harness(2, 30);
        let payload = json!({"type": "Glass_Breaking", "confidence": 82.4, "emergency_detected": true});
        h.classifier.set(payload.clone());
        let out = h
            .pipeline
            .ingest_chunk(chunk(), u1(), Some("Kitchen".to_string()))
            .await
            .unwrap();
        assert!(out.emergency);
        assert_eq!(out.classification, payload);
        assert_eq!(out.severity(), Some(Severity::High));
        let alert = out.alert.clone().unwrap();
        assert_eq!(alert.confidence, 82);
        assert_eq!(alert.alert_type, "Glass_Breaking");
        assert_eq!(alert.location, "Kitchen");
        assert_eq!(h.store.read().len(), 1);

        out.notification.unwrap().await.unwrap();
        assert_eq!(h.email.sent.lock().len(), 3);
        assert_eq!(h.call.sent.lock().len(), 3);
    }

    #[tokio::test]
    async fn at_ingest_02_speech_creates_nothing() {
        let h = harness(2, 30);
        h.classifier
            .set(json!({"type": "speech", "confidence": 90, "emergency_detected": false}));
        let out = h.pipeline.ingest_chunk(chunk(), u1(), None).await.unwrap();
        assert!(!out.emergency);
        assert!(out.alert.is_none());
        assert!(out.notification.is_none());
        assert!(h.store.read().is_empty());
    }

    #[tokio::test]
    async fn at_ingest_03_below_threshold_creates_nothing() {
        let h = harness(2, 30);
        h.classifier
            .set(json!({"type": "scream", "confidence": 39, "emergency_detected": true}));
        let out = h.pipeline.ingest_chunk(chunk(), u1(), None).await.unwrap();
        assert!(!out.emergency);
        assert!(h.store.read().is_empty());
    }

    #[tokio::test]
    async fn at_ingest_04_no_contacts_still_alerts_and_notifies_user() {
        let h = harness(0, 30);
        h.classifier
            .set(json!({"type": "scream", "confidence": 60, "emergency_detected": true}));
        let out = h.pipeline.ingest_chunk(chunk(), u1(), None).await.unwrap();
        let alert = out.alert.clone().unwrap();
        assert_eq!(alert.severity, Severity::Medium);
        assert_eq!(alert.location, "Unknown");
        out.notification.unwrap().await.unwrap();
        assert_eq!(h.email.sent_addresses().len(), 1);
        assert_eq!(h.call.sent.lock().len(), 1);

        let (_, summary) = h
            .pipeline
            .notify_emergency(ManualNotifyRequest {
                user_id: UserId::new("u1").unwrap(),
                alert_type: "scream".to_string(),
                confidence: 60.0,
                location: None,
            })
            .await
            .unwrap();
        assert_eq!(summary.reason.as_deref(), Some(REASON_NO_EMERGENCY_CONTACTS));
        assert_eq!(summary.contact_attempts, 0);
    }

    #[tokio::test]
    async fn at_ingest_05_out_of_range_confidence_rejected() {
        let h = harness(1, 30);
        for bad in [
            json!({"type": "scream", "confidence": 120, "emergency_detected": true}),
            json!({"type": "scream", "confidence": "high", "emergency_detected": true}),
            json!({"type": "scream", "emergency_detected": true}),
        ] {
            h.classifier.set(bad);
            let err = h.pipeline.ingest_chunk(chunk(), u1(), None).await.unwrap_err();
            assert_eq!(err.code(), "INVALID_CLASSIFICATION");
        }
        assert!(h.store.read().is_empty());
    }

    #[tokio::test]
    async fn at_ingest_06_classifier_failure_and_timeout_are_unavailable() {
        let h = harness(1, 30);
        *h.classifier.reply.lock() = Err(TransportError::Timeout {
            provider: "classifier",
        });
        let err = h.pipeline.ingest_chunk(chunk(), u1(), None).await.unwrap_err();
        assert_eq!(err.code(), "CLASSIFICATION_SERVICE_UNAVAILABLE");

        let slow = Arc::new(FakeClassifier {
            reply: Mutex::new(Ok(json!({}))),
            delay: Duration::from_millis(300),
        });
        let mut config = PipelineConfig::mvp_v1();
        config.classifier_timeout = Duration::from_millis(50);
        let p = IngestPipeline::from_config(
            &config,
            slow,
            Arc::new(RwLock::new(AlertStore::new_in_memory())),
            users(vec![]),
            ChannelSet::default(),
        )
        .unwrap();
        let err = p.ingest_chunk(chunk(), u1(), None).await.unwrap_err();
        assert!(matches!(err, IngestError::ClassificationServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn at_ingest_07_persistence_failure_means_no_notification() {
        let classifier =
            FakeClassifier::replying(json!({"type": "gunshot", "confidence": 95, "emergency_detected": true}));
        let email = Arc::new(FakeAdapter::new(ChannelKind::Email));
        let p = IngestPipeline::from_config(
            &PipelineConfig::mvp_v1(),
            classifier,
            Arc::new(RwLock::new(BrokenAlertStore)),
            users(vec![profile("u1", 2)]),
            ChannelSet::new(Some(email.clone() as Arc<dyn ChannelAdapter>), None),
        )
        .unwrap();
        let err = p.ingest_chunk(chunk(), u1(), None).await.unwrap_err();
        assert_eq!(err.code(), "PERSISTENCE_ERROR");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(email.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn at_ingest_08_repeat_within_cooldown_suppressed() {
        let h = harness(1, 30);
        h.classifier
            .set(json!({"type": "Scream", "confidence": 70, "emergency_detected": true}));
        let first = h.pipeline.ingest_chunk(chunk(), u1(), None).await.unwrap();
        assert!(first.alert.is_some());
        h.classifier
            .set(json!({"type": "scream", "confidence": 80, "emergency_detected": true}));
        let second = h.pipeline.ingest_chunk(chunk(), u1(), None).await.unwrap();
        assert!(second.emergency);
        assert!(second.suppressed);
        assert!(second.alert.is_none());
        assert_eq!(h.store.read().len(), 1);

        h.classifier
            .set(json!({"type": "glass", "confidence": 80, "emergency_detected": true}));
        let other = h.pipeline.ingest_chunk(chunk(), u1(), None).await.unwrap();
        assert!(other.alert.is_some());
    }

    #[tokio::test]
    async fn at_ingest_09_danger_without_user_creates_no_alert() {
        let h = harness(1, 0);
        h.classifier
            .set(json!({"type": "explosion", "confidence": 99, "emergency_detected": true}));
        let out = h.pipeline.ingest_chunk(chunk(), None, None).await.unwrap();
        assert!(out.emergency);
        assert!(out.alert.is_none());
        assert_eq!(out.reason_code, reason_codes::INGEST_DANGER_WITHOUT_USER);
        assert!(h.store.read().is_empty());
    }

    #[tokio::test]
    async fn at_ingest_10_manual_notify_validates_and_awaits() {
        let h = harness(2, 30);
        let err = h
            .pipeline
            .notify_emergency(ManualNotifyRequest {
                user_id: UserId::new("ghost").unwrap(),
                alert_type: "scream".to_string(),
                confidence: 90.0,
                location: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "USER_NOT_FOUND");

        let err = h
            .pipeline
            .notify_emergency(ManualNotifyRequest {
                user_id: UserId::new("u1").unwrap(),
                alert_type: "scream".to_string(),
                confidence: 101.0,
                location: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_REQUEST");

        let (alert, summary) = h
            .pipeline
            .notify_emergency(ManualNotifyRequest {
                user_id: UserId::new("u1").unwrap(),
                alert_type: "Manual_SOS".to_string(),
                confidence: 90.0,
                location: Some("Park".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(summary.email_success_count, 3);
        assert_eq!(summary.call_success_count, 3);
        assert_eq!(h.store.read().len(), 1);
    }

    #[tokio::test]
    async fn at_ingest_11_empty_chunk_rejected_before_classifier() {
        let h = harness(1, 30);
        let err = h.pipeline.ingest_chunk(Vec::new(), u1(), None).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn at_ingest_12_response_does_not_wait_for_fanout() {
        let classifier = FakeClassifier::replying(
            json!({"type": "Gunshot", "confidence": 95, "emergency_detected": true}),
        );
        let store = Arc::new(RwLock::new(AlertStore::new_in_memory()));
        let email = Arc::new(
            FakeAdapter::new(ChannelKind::Email)
                .slow("asha@example.com")
                .slow("c0@example.com")
                .delayed_by(Duration::from_secs(2)),
        );
        let pipeline = IngestPipeline::from_config(
            &PipelineConfig::mvp_v1(),
            classifier,
            store.clone(),
            users(vec![profile("u1", 1)]),
            ChannelSet::new(Some(email.clone() as Arc<dyn ChannelAdapter>), None),
        )
        .unwrap();

        let out = tokio::time::timeout(
            Duration::from_millis(500),
            pipeline.ingest_chunk(chunk(), u1(), None),
        )
        .await
        .expect("ingest must return before the fan-out settles")
        .unwrap();
        assert!(out.alert.is_some());
        assert_eq!(store.read().len(), 1);
        assert!(email.sent.lock().is_empty());

        out.notification.unwrap().await.unwrap();
        assert_eq!(email.sent.lock().len(), 2);
    }

    #[tokio::test]
    async fn at_ingest_13_long_location_still_alerts() {
        let h = harness(1, 30);
        h.classifier
            .set(json!({"type": "Gunshot", "confidence": 95, "emergency_detected": true}));
        let location = "Warehouse 7, north loading dock, ".repeat(11);
        assert!(location.len() > 256);
        let out = h
            .pipeline
            .ingest_chunk(chunk(), u1(), Some(location.clone()))
            .await
            .unwrap();
        let alert = out.alert.clone().unwrap();
        assert!(location.starts_with(&alert.location));
        assert_eq!(h.store.read().len(), 1);
        out.notification.unwrap().await.unwrap();
        assert_eq!(h.email.sent.lock().len(), 2);
    }

    #[tokio::test]
    async fn at_ingest_14_shutdown_drains_scheduled_fanout() {
        let h = harness(1, 30);
        h.classifier
            .set(json!({"type": "scream", "confidence": 70, "emergency_detected": true}));
        let out = h.pipeline.ingest_chunk(chunk(), u1(), None).await.unwrap();
        assert!(out.alert.is_some());
        assert!(h.pipeline.shutdown(Duration::from_secs(5)).await.is_empty());
        assert_eq!(h.email.sent.lock().len(), 2);
        assert_eq!(h.call.sent.lock().len(), 2);
    }
}
