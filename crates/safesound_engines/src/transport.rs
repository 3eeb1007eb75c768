#![forbid(unsafe_code)]

use std::time::Duration;

use safesound_contracts::alert::AlertId;
use safesound_contracts::notify::ChannelKind;
use sha2::{Digest, Sha256};

pub const USER_AGENT: &str = concat!("safesound/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("{provider} timed out")]
    Timeout { provider: &'static str },
    #[error("{provider} returned http {status}")]
    HttpStatus { provider: &'static str, status: u16 },
    #[error("{provider} transport failure ({kind})")]
    Transport {
        provider: &'static str,
        kind: &'static str,
    },
    #[error("{provider} response invalid: {detail}")]
    InvalidResponse {
        provider: &'static str,
        detail: String,
    },
    #[error("{provider} rejected request: {detail}")]
    Rejected {
        provider: &'static str,
        detail: String,
    },
}

pub fn build_http_agent(timeout: Duration) -> ureq::Agent {
    let timeout = timeout.max(Duration::from_millis(100));
    ureq::AgentBuilder::new()
        .timeout_connect(timeout)
        .timeout_read(timeout)
        .timeout_write(timeout)
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .try_proxy_from_env(false)
        .build()
}

pub(crate) fn transport_error_from_ureq(provider: &'static str, err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Status(status, _) => TransportError::HttpStatus { provider, status },
        ureq::Error::Transport(transport) => {
            let combined = format!("{:?} {}", transport.kind(), transport);
            match classify_transport_error_kind(&combined) {
                "timeout" => TransportError::Timeout { provider },
                kind => TransportError::Transport { provider, kind },
            }
        }
    }
}

fn classify_transport_error_kind(raw: &str) -> &'static str {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        "timeout"
    } else if lower.contains("tls") || lower.contains("ssl") {
        "tls"
    } else if lower.contains("dns") {
        "dns"
    } else if lower.contains("connection") || lower.contains("connect") {
        "connection"
    } else {
        "transport"
    }
}

/// Stable key for one (alert, channel, recipient) attempt.
pub fn attempt_idempotency_key(
    alert_id: AlertId,
    channel: ChannelKind,
    recipient_identifier: &str,
) -> String {
    let mut h = Sha256::new();
    h.update(alert_id.0.to_be_bytes());
    h.update(channel.as_str().as_bytes());
    h.update([0u8]);
    h.update(recipient_identifier.trim().to_ascii_lowercase().as_bytes());
    let digest = h.finalize();
    let mut out = String::with_capacity(32);
    for b in &digest[..16] {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
