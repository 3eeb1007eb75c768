#![forbid(unsafe_code)]

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine as _;
use parking_lot::RwLock;
use safesound_contracts::alert::{Alert, AlertId, AlertStatus, Severity};
use safesound_contracts::notify::DispatchSummary;
use safesound_contracts::user::UserId;
use safesound_engines::classifier::{HttpClassifierClient, HttpClassifierConfig};
use safesound_os::channels::ChannelSet;
use safesound_os::config::PipelineConfig;
use safesound_os::ingest::{IngestPipeline, ManualNotifyRequest};
use safesound_storage::alerts::AlertStore;
use safesound_storage::repo::{
    AlertRepo, AlertTypeStat, StatusCounts, UserRepo, DEFAULT_RECENT_LIMIT, MAX_RECENT_LIMIT,
};
use safesound_storage::users::UserStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod error;

use error::{ApiError, ApiResult};

/// Largest decoded audio chunk accepted per request.
pub const MAX_AUDIO_CHUNK_BYTES: usize = 5 * 1024 * 1024;
const JSON_ENVELOPE_SLACK: usize = 64 * 1024;

/// Body limit for the JSON routes: a base64-encoded maximal chunk plus envelope fields.
pub fn max_request_body_bytes() -> usize {
    MAX_AUDIO_CHUNK_BYTES.div_ceil(3) * 4 + JSON_ENVELOPE_SLACK
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamAnalyzeRequest {
    #[serde(default, alias = "userId")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub audio_base64: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamAnalyzeResponse {
    pub status: String,
    pub classification: Value,
    pub emergency: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<AlertId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    pub suppressed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdapterHealthResponse {
    pub status: String,
    pub classifier: Value,
    pub email_configured: bool,
    pub voice_configured: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecentAlertsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentAlertsResponse {
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertStatsResponse {
    pub by_status: StatusCounts,
    pub by_type: Vec<AlertTypeStat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertStatusUpdateRequest {
    pub status: String,
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmergencyNotifyRequest {
    #[serde(alias = "userId")]
    pub user_id: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub confidence: f64,
    #[serde(default)]
    pub location: Option<String>,
}

pub struct AdapterRuntime {
    pipeline: IngestPipeline,
}

impl AdapterRuntime {
    pub fn new(pipeline: IngestPipeline) -> Self {
        Self { pipeline }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, String> {
        let users = match config.users_file.as_ref() {
            Some(path) => UserStore::load_from_json_file(path).map_err(|e| e.to_string())?,
            None => {
                tracing::warn!("SAFESOUND_USERS_FILE not set; every alert will report UserNotFound");
                UserStore::new_in_memory()
            }
        };
        tracing::info!(users = users.user_count(), "user store ready");
        let classifier = HttpClassifierClient::new(HttpClassifierConfig {
            base_url: config.classifier_url.clone(),
            timeout: config.classifier_timeout,
        });
        let pipeline = IngestPipeline::from_config(
            config,
            Arc::new(classifier),
            Arc::new(RwLock::new(AlertStore::new_in_memory())),
            Arc::new(RwLock::new(users)),
            ChannelSet::from_config(config),
        )
        .map_err(|v| format!("invalid pipeline config: {v}"))?;
        Ok(Self::new(pipeline))
    }

    pub fn default_from_env() -> Result<Self, String> {
        Self::from_config(&PipelineConfig::from_env())
    }

    pub fn pipeline(&self) -> &IngestPipeline {
        &self.pipeline
    }

    pub async fn health_report(&self) -> (StatusCode, AdapterHealthResponse) {
        let channels = self.pipeline.channels();
        let email_configured = channels.email.is_some();
        let voice_configured = channels.call.is_some();
        match self.pipeline.classifier_health().await {
            Ok(classifier) => (
                StatusCode::OK,
                AdapterHealthResponse {
                    status: "ok".to_string(),
                    classifier,
                    email_configured,
                    voice_configured,
                },
            ),
            Err(err) => (
                StatusCode::SERVICE_UNAVAILABLE,
                AdapterHealthResponse {
                    status: "error".to_string(),
                    classifier: serde_json::json!({ "error": err.to_string() }),
                    email_configured,
                    voice_configured,
                },
            ),
        }
    }

    pub async fn stream_analyze(
        &self,
        request: StreamAnalyzeRequest,
    ) -> ApiResult<StreamAnalyzeResponse> {
        let audio = base64::engine::general_purpose::STANDARD
            .decode(request.audio_base64.trim())
            .map_err(|e| ApiError::bad_request(format!("audio_base64: {e}")))?;
        if audio.len() > MAX_AUDIO_CHUNK_BYTES {
            return Err(ApiError::bad_request(format!(
                "audio chunk of {} bytes exceeds {MAX_AUDIO_CHUNK_BYTES}",
                audio.len()
            )));
        }
        let user_id = request
            .user_id
            .filter(|u| !u.trim().is_empty())
            .map(UserId::new)
            .transpose()
            .map_err(|v| ApiError::bad_request(v.to_string()))?;
        let outcome = self
            .pipeline
            .ingest_chunk(audio, user_id, request.location)
            .await?;
        Ok(StreamAnalyzeResponse {
            status: "ok".to_string(),
            emergency: outcome.emergency,
            alert_id: outcome.alert.as_ref().map(|a| a.id),
            severity: outcome.severity(),
            suppressed: outcome.suppressed,
            classification: outcome.classification,
        })
    }

    pub fn recent_alerts(&self, limit: Option<usize>) -> RecentAlertsResponse {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT).clamp(1, MAX_RECENT_LIMIT);
        let alerts = self.pipeline.alerts().read();
        RecentAlertsResponse {
            alerts: alerts.list_recent(limit).into_iter().cloned().collect(),
        }
    }

    pub fn alert_stats(&self) -> AlertStatsResponse {
        let alerts = self.pipeline.alerts().read();
        AlertStatsResponse {
            by_status: alerts.count_by_status(),
            by_type: alerts.aggregate_by_type(),
        }
    }

    pub fn update_alert_status(
        &self,
        raw_id: &str,
        request: AlertStatusUpdateRequest,
    ) -> ApiResult<Alert> {
        let id = parse_alert_id(raw_id)
            .ok_or_else(|| ApiError::bad_request(format!("invalid alert id '{raw_id}'")))?;
        let target = AlertStatus::parse(&request.status).ok_or_else(|| {
            ApiError::bad_request(format!("unknown status '{}'", request.status))
        })?;
        let updated = self.pipeline.alerts().write().update_status(
            id,
            target,
            request.actor,
            chrono::Utc::now(),
        )?;
        tracing::info!(alert_id = %updated.id, status = updated.status.as_str(), "alert status updated");
        Ok(updated)
    }

    pub async fn notify_emergency(
        &self,
        request: EmergencyNotifyRequest,
    ) -> ApiResult<DispatchSummary> {
        let user_id =
            UserId::new(request.user_id).map_err(|v| ApiError::bad_request(v.to_string()))?;
        let (_, summary) = self
            .pipeline
            .notify_emergency(ManualNotifyRequest {
                user_id,
                alert_type: request.alert_type,
                confidence: request.confidence,
                location: request.location,
            })
            .await?;
        Ok(summary)
    }
}

/// Accepts either the display form (`alert_00000042`) or the bare number.
pub fn parse_alert_id(raw: &str) -> Option<AlertId> {
    let raw = raw.trim();
    let digits = raw.strip_prefix("alert_").unwrap_or(raw);
    digits.parse::<u64>().ok().filter(|v| *v > 0).map(AlertId)
}

pub fn router(runtime: Arc<AdapterRuntime>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/audio/stream-analyze", post(stream_analyze))
        .route("/v1/alerts/recent", get(recent_alerts))
        .route("/v1/alerts/stats", get(alert_stats))
        .route("/v1/alerts/:id/status", post(update_alert_status))
        .route("/v1/notify/emergency", post(notify_emergency))
        .layer(DefaultBodyLimit::max(max_request_body_bytes()))
        .with_state(runtime)
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(v)| v)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

pub async fn healthz(
    State(runtime): State<Arc<AdapterRuntime>>,
) -> (StatusCode, Json<AdapterHealthResponse>) {
    let (status, body) = runtime.health_report().await;
    (status, Json(body))
}

pub async fn stream_analyze(
    State(runtime): State<Arc<AdapterRuntime>>,
    body: Result<Json<StreamAnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<StreamAnalyzeResponse>> {
    let request = json_body(body)?;
    runtime.stream_analyze(request).await.map(Json)
}

pub async fn recent_alerts(
    State(runtime): State<Arc<AdapterRuntime>>,
    query: Result<Query<RecentAlertsQuery>, QueryRejection>,
) -> ApiResult<Json<RecentAlertsResponse>> {
    let Query(query) = query.map_err(|r| ApiError::bad_request(r.body_text()))?;
    Ok(Json(runtime.recent_alerts(query.limit)))
}

pub async fn alert_stats(State(runtime): State<Arc<AdapterRuntime>>) -> Json<AlertStatsResponse> {
    Json(runtime.alert_stats())
}

pub async fn update_alert_status(
    State(runtime): State<Arc<AdapterRuntime>>,
    Path(id): Path<String>,
    body: Result<Json<AlertStatusUpdateRequest>, JsonRejection>,
) -> ApiResult<Json<Alert>> {
    let request = json_body(body)?;
    runtime.update_alert_status(&id, request).map(Json)
}

pub async fn notify_emergency(
    State(runtime): State<Arc<AdapterRuntime>>,
    body: Result<Json<EmergencyNotifyRequest>, JsonRejection>,
) -> ApiResult<Json<DispatchSummary>> {
    let request = json_body(body)?;
    runtime.notify_emergency(request).await.map(Json)
}
