#![forbid(unsafe_code)]

use serde::Serialize;

/// Channel-specific rendering of one alert for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderedMessage {
    Email { subject: String, body: String },
    Voice { spoken_text: String },
}

impl RenderedMessage {
    pub fn kind_str(&self) -> &'static str {
        match self {
            RenderedMessage::Email { .. } => "email",
            RenderedMessage::Voice { .. } => "voice",
        }
    }
}
