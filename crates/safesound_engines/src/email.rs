#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use safesound_contracts::notify::AlertNotice;
use serde::Serialize;
use serde_json::Value;

use crate::message::RenderedMessage;
use crate::transport::{build_http_agent, transport_error_from_ureq, TransportError};

pub const PROVIDER: &str = "email_relay";
pub const SENDER_DISPLAY_NAME: &str = "SafeSound AI - Emergency Alert";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(skip)]
    pub idempotency_key: Option<String>,
}

/// Outbound mail transport. Returns the provider's message id.
pub trait EmailTransport: Send + Sync {
    fn send(&self, message: &EmailMessage) -> Result<String, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpEmailRelayConfig {
    pub endpoint: String,
    pub api_key: String,
    pub from: String,
    pub timeout: Duration,
}

/// Mail delivery through an HTTPS relay that accepts `{from,to,subject,text}`.
pub struct HttpEmailRelay {
    config: HttpEmailRelayConfig,
    agent: ureq::Agent,
}

impl HttpEmailRelay {
    pub fn new(config: HttpEmailRelayConfig) -> Self {
        let agent = build_http_agent(config.timeout);
        Self { config, agent }
    }

    pub fn from_address(&self) -> &str {
        &self.config.from
    }
}

impl EmailTransport for HttpEmailRelay {
    fn send(&self, message: &EmailMessage) -> Result<String, TransportError> {
        let mut req = self
            .agent
            .post(&self.config.endpoint)
            .set("authorization", &format!("Bearer {}", self.config.api_key))
            .set("accept", "application/json");
        if let Some(key) = message.idempotency_key.as_deref() {
            req = req.set("idempotency-key", key);
        }
        let resp = req
            .send_json(serde_json::json!({
                "from": message.from,
                "to": message.to,
                "subject": message.subject,
                "text": message.body,
            }))
            .map_err(|e| transport_error_from_ureq(PROVIDER, e))?;
        let status = resp.status();
        // Relays differ on the id field; an empty body still counts as accepted.
        let body: Value = resp.into_json().unwrap_or(Value::Null);
        let id = body
            .get("id")
            .or_else(|| body.get("message_id"))
            .or_else(|| body.get("messageId"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("relay:{status}"));
        tracing::debug!(provider = PROVIDER, status, message_id = %id, "email relay accepted message");
        Ok(id)
    }
}

pub fn render_email(notice: &AlertNotice, is_self: bool) -> RenderedMessage {
    let subject = if is_self {
        format!(
            "Emergency Detected: {} Alert - Check Your Safety!",
            notice.alert_type
        )
    } else {
        format!(
            "URGENT: {} Alert - {} Needs Help!",
            notice.alert_type, notice.subject_name
        )
    };

    let greeting = if is_self {
        format!(
            "Dear {},\n\nOur monitoring system has detected an emergency sound from your device. \
             This is an automatic safety notification.",
            notice.subject_name
        )
    } else {
        format!(
            "You are receiving this alert because you are listed as an emergency contact for {}.",
            notice.subject_name
        )
    };

    let mut body = String::new();
    body.push_str(&greeting);
    body.push_str("\n\n");
    body.push_str(&format!(
        "{} detected with {}% confidence.\n\n",
        notice.alert_type, notice.confidence
    ));
    body.push_str("Person in danger\n");
    body.push_str(&format!("  Name:  {}\n", notice.subject_name));
    if let Some(email) = notice.subject_email.as_deref() {
        body.push_str(&format!("  Email: {email}\n"));
    }
    if let Some(phone) = notice.subject_phone.as_deref() {
        body.push_str(&format!("  Phone: {phone}\n"));
    }
    body.push_str("\nAlert details\n");
    body.push_str(&format!("  Location:   {}\n", notice.location));
    body.push_str(&format!(
        "  Time:       {}\n",
        notice.detected_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    body.push_str(&format!("  Alert type: {}\n", notice.alert_type));
    body.push_str(&format!("  Confidence: {}%\n", notice.confidence));
    body.push_str(&format!("  Reference:  {}\n\n", notice.alert_id));
    if is_self {
        body.push_str("Please check your surroundings immediately.\n");
    } else {
        body.push_str(&format!(
            "{} may need immediate assistance. Please try to contact them or check their location.\n",
            notice.subject_name
        ));
    }
    RenderedMessage::Email { subject, body }
}

#[derive(Clone)]
pub struct EmailChannel {
    transport: Arc<dyn EmailTransport>,
    from: String,
}

impl EmailChannel {
    pub fn new(transport: Arc<dyn EmailTransport>, from_address: &str) -> Self {
        Self {
            transport,
            from: format!("\"{SENDER_DISPLAY_NAME}\" <{from_address}>"),
        }
    }

    pub fn render(&self, notice: &AlertNotice, is_self: bool) -> RenderedMessage {
        render_email(notice, is_self)
    }

    pub fn send(
        &self,
        to: &str,
        message: &RenderedMessage,
        idempotency_key: Option<String>,
    ) -> Result<String, TransportError> {
        let RenderedMessage::Email { subject, body } = message else {
            return Err(TransportError::Rejected {
                provider: PROVIDER,
                detail: format!("cannot send a {} message by email", message.kind_str()),
            });
        };
        self.transport.send(&EmailMessage {
            from: self.from.clone(),
            to: to.to_string(),
            subject: subject.clone(),
            body: body.clone(),
            idempotency_key,
        })
    }
}
