#![forbid(unsafe_code)]

use std::time::Duration;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::transport::{build_http_agent, transport_error_from_ureq, TransportError};

pub const PROVIDER: &str = "classifier";
pub const DEFAULT_CLASSIFIER_URL: &str = "http://localhost:5050";
pub const DEFAULT_CLASSIFY_TIMEOUT: Duration = Duration::from_secs(10);
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
pub const CHUNK_FIELD: &str = "chunk";
pub const CHUNK_FILENAME: &str = "chunk.webm";
pub const CHUNK_CONTENT_TYPE: &str = "audio/webm";

/// External audio classifier. Blocking; callers bound it with their own timeout.
pub trait ClassifierClient: Send + Sync {
    /// Returns the classifier's JSON payload untouched.
    fn classify(&self, audio: &[u8]) -> Result<Value, TransportError>;

    fn health(&self) -> Result<Value, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClassifierConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl HttpClassifierConfig {
    pub fn mvp_v1(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_CLASSIFY_TIMEOUT,
        }
    }
}

pub struct HttpClassifierClient {
    config: HttpClassifierConfig,
    agent: ureq::Agent,
    health_agent: ureq::Agent,
}

impl HttpClassifierClient {
    pub fn new(config: HttpClassifierConfig) -> Self {
        let agent = build_http_agent(config.timeout);
        let health_agent = build_http_agent(HEALTH_TIMEOUT);
        Self {
            config,
            agent,
            health_agent,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

/// Boundary derived from the payload digest.
pub fn multipart_boundary(audio: &[u8]) -> String {
    let digest = Sha256::digest(audio);
    let mut out = String::from("----safesound-");
    for b in &digest[..16] {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Single-part `multipart/form-data` body carrying the chunk as a webm file upload.
pub fn encode_chunk_multipart(audio: &[u8], boundary: &str) -> Vec<u8> {
    let head = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"{CHUNK_FIELD}\"; filename=\"{CHUNK_FILENAME}\"\r\nContent-Type: {CHUNK_CONTENT_TYPE}\r\n\r\n"
    );
    let tail = format!("\r\n--{boundary}--\r\n");
    let mut body = Vec::with_capacity(head.len() + audio.len() + tail.len());
    body.extend_from_slice(head.as_bytes());
    body.extend_from_slice(audio);
    body.extend_from_slice(tail.as_bytes());
    body
}

impl ClassifierClient for HttpClassifierClient {
    fn classify(&self, audio: &[u8]) -> Result<Value, TransportError> {
        if audio.is_empty() {
            return Err(TransportError::Rejected {
                provider: PROVIDER,
                detail: "empty audio chunk".to_string(),
            });
        }
        let boundary = multipart_boundary(audio);
        let body = encode_chunk_multipart(audio, &boundary);
        let resp = self
            .agent
            .post(&self.url("stream-analyze"))
            .set(
                "content-type",
                &format!("multipart/form-data; boundary={boundary}"),
            )
            .set("accept", "application/json")
            .send_bytes(&body)
            .map_err(|e| {
                let err = transport_error_from_ureq(PROVIDER, e);
                tracing::warn!(provider = PROVIDER, error = %err, "classifier request failed");
                err
            })?;
        let payload: Value = resp
            .into_json()
            .map_err(|e| TransportError::InvalidResponse {
                provider: PROVIDER,
                detail: e.to_string(),
            })?;
        if !payload.is_object() {
            return Err(TransportError::InvalidResponse {
                provider: PROVIDER,
                detail: "payload is not a JSON object".to_string(),
            });
        }
        Ok(payload)
    }

    fn health(&self) -> Result<Value, TransportError> {
        let resp = self
            .health_agent
            .get(&self.url("health"))
            .call()
            .map_err(|e| transport_error_from_ureq(PROVIDER, e))?;
        resp.into_json().map_err(|e| TransportError::InvalidResponse {
            provider: PROVIDER,
            detail: e.to_string(),
        })
    }
}
