#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use safesound_contracts::notify::AlertNotice;
use safesound_contracts::ContractViolation;
use serde_json::Value;

use crate::message::RenderedMessage;
use crate::transport::{build_http_agent, transport_error_from_ureq, TransportError};

pub const PROVIDER: &str = "twilio";
pub const DEFAULT_COUNTRY_PREFIX: &str = "+91";
pub const DEFAULT_TWILIO_API_BASE: &str = "https://api.twilio.com";

const MIN_PHONE_DIGITS: usize = 6;
const MAX_PHONE_DIGITS: usize = 15;

/// Normalizes a stored phone number to E.164-ish form. Numbers without a
/// leading `+` (or `00`) get `default_prefix` prepended.
pub fn normalize_phone(raw: &str, default_prefix: &str) -> Result<String, ContractViolation> {
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();
    let (international, digits) = if let Some(rest) = compact.strip_prefix('+') {
        (true, rest)
    } else if let Some(rest) = compact.strip_prefix("00") {
        (true, rest)
    } else {
        (false, compact.as_str())
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ContractViolation::InvalidValue {
            field: "recipient.phone",
            reason: "must contain only digits after an optional leading +",
        });
    }
    let full = if international {
        format!("+{digits}")
    } else {
        format!("{default_prefix}{digits}")
    };
    let count = full.chars().filter(char::is_ascii_digit).count();
    if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&count) {
        return Err(ContractViolation::InvalidRange {
            field: "recipient.phone",
            min: MIN_PHONE_DIGITS as f64,
            max: MAX_PHONE_DIGITS as f64,
            got: count as f64,
        });
    }
    Ok(full)
}

pub fn spoken_message(notice: &AlertNotice, is_self: bool) -> String {
    if is_self {
        format!(
            "Emergency alert from Safe Sound AI. A {} sound was detected from your device \
             with {} percent confidence. This is an automatic safety notification. \
             Please check your surroundings immediately.",
            spoken_label(&notice.alert_type),
            notice.confidence
        )
    } else {
        format!(
            "Emergency alert from Safe Sound AI. A {} sound was detected for {} at {}. \
             Please check on them immediately.",
            spoken_label(&notice.alert_type),
            notice.subject_name,
            notice.location
        )
    }
}

fn spoken_label(alert_type: &str) -> String {
    alert_type.replace('_', " ").to_lowercase()
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// TwiML document that reads `spoken_text` aloud.
pub fn call_script(spoken_text: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Say voice=\"alice\">{}</Say></Response>",
        escape_xml(spoken_text)
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub to: String,
    pub from: String,
    pub script: String,
}

/// Places an outbound call. Returns the provider's call id.
pub trait TelephonyTransport: Send + Sync {
    fn place_call(&self, request: &CallRequest) -> Result<String, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub api_base: String,
    pub timeout: Duration,
}

pub struct TwilioTransport {
    config: TwilioConfig,
    agent: ureq::Agent,
}

impl TwilioTransport {
    pub fn new(config: TwilioConfig) -> Self {
        let agent = build_http_agent(config.timeout);
        Self { config, agent }
    }

    fn calls_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }

    fn basic_auth(&self) -> String {
        let raw = format!("{}:{}", self.config.account_sid, self.config.auth_token);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw.as_bytes())
        )
    }
}

impl TelephonyTransport for TwilioTransport {
    fn place_call(&self, request: &CallRequest) -> Result<String, TransportError> {
        let resp = self
            .agent
            .post(&self.calls_url())
            .set("authorization", &self.basic_auth())
            .set("accept", "application/json")
            .send_form(&[
                ("To", request.to.as_str()),
                ("From", request.from.as_str()),
                ("Twiml", request.script.as_str()),
            ])
            .map_err(|e| transport_error_from_ureq(PROVIDER, e))?;
        let body: Value = resp.into_json().map_err(|e| TransportError::InvalidResponse {
            provider: PROVIDER,
            detail: e.to_string(),
        })?;
        let sid = body
            .get("sid")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| TransportError::InvalidResponse {
                provider: PROVIDER,
                detail: "missing call sid".to_string(),
            })?;
        tracing::debug!(provider = PROVIDER, call_sid = %sid, "call queued");
        Ok(sid)
    }
}

#[derive(Clone)]
pub struct VoiceCallChannel {
    transport: Arc<dyn TelephonyTransport>,
    from_number: String,
    default_prefix: String,
}

impl VoiceCallChannel {
    pub fn new(
        transport: Arc<dyn TelephonyTransport>,
        from_number: impl Into<String>,
        default_prefix: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            from_number: from_number.into(),
            default_prefix: default_prefix.into(),
        }
    }

    pub fn render(&self, notice: &AlertNotice, is_self: bool) -> RenderedMessage {
        RenderedMessage::Voice {
            spoken_text: spoken_message(notice, is_self),
        }
    }

    pub fn normalize(&self, raw_phone: &str) -> Result<String, ContractViolation> {
        normalize_phone(raw_phone, &self.default_prefix)
    }

    pub fn send(&self, raw_phone: &str, message: &RenderedMessage) -> Result<String, TransportError> {
        let RenderedMessage::Voice { spoken_text } = message else {
            return Err(TransportError::Rejected {
                provider: PROVIDER,
                detail: format!("cannot place a call with a {} message", message.kind_str()),
            });
        };
        let to = self
            .normalize(raw_phone)
            .map_err(|v| TransportError::Rejected {
                provider: PROVIDER,
                detail: v.to_string(),
            })?;
        self.transport.place_call(&CallRequest {
            to,
            from: self.from_number.clone(),
            script: call_script(spoken_text),
        })
    }
}
