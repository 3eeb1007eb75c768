#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::{Alert, AlertId};
use crate::user::{EmergencyContact, UserProfile};

pub const REASON_NO_EMERGENCY_CONTACTS: &str = "NoEmergencyContacts";
pub const REASON_USER_NOT_FOUND: &str = "UserNotFound";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    Call,
}

impl ChannelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Call => "call",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One person to notify. `is_self` marks the monitored user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipient {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_self: bool,
}

impl Recipient {
    pub fn for_user(user: &UserProfile) -> Self {
        Self {
            name: user.name.clone(),
            email: non_blank(user.email.as_deref()),
            phone: non_blank(user.phone.as_deref()),
            is_self: true,
        }
    }

    pub fn for_contact(contact: &EmergencyContact) -> Self {
        Self {
            name: contact.display_name().to_string(),
            email: non_blank(Some(contact.email.as_str())),
            phone: non_blank(Some(contact.phone.as_str())),
            is_self: false,
        }
    }

    pub fn address(&self, channel: ChannelKind) -> Option<&str> {
        match channel {
            ChannelKind::Email => self.email.as_deref(),
            ChannelKind::Call => self.phone.as_deref(),
        }
    }
}

fn non_blank(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Everything a channel needs to render a message about one alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertNotice {
    pub alert_id: AlertId,
    pub alert_type: String,
    pub confidence: u8,
    pub location: String,
    pub detected_at: DateTime<Utc>,
    pub subject_name: String,
    pub subject_email: Option<String>,
    pub subject_phone: Option<String>,
}

impl AlertNotice {
    pub fn new(alert: &Alert, user: &UserProfile) -> Self {
        Self {
            alert_id: alert.id,
            alert_type: alert.alert_type.clone(),
            confidence: alert.confidence,
            location: alert.location.clone(),
            detected_at: alert.created_at,
            subject_name: user.name.clone(),
            subject_email: user.email.clone(),
            subject_phone: user.phone.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationOutcome {
    pub channel: ChannelKind,
    pub recipient_identifier: String,
    pub is_self: bool,
    pub success: bool,
    pub reason: Option<String>,
}

impl NotificationOutcome {
    pub fn delivered(channel: ChannelKind, recipient_identifier: impl Into<String>, is_self: bool) -> Self {
        Self {
            channel,
            recipient_identifier: recipient_identifier.into(),
            is_self,
            success: true,
            reason: None,
        }
    }

    pub fn failed(
        channel: ChannelKind,
        recipient_identifier: impl Into<String>,
        is_self: bool,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            recipient_identifier: recipient_identifier.into(),
            is_self,
            success: false,
            reason: Some(reason.into()),
        }
    }
}

/// Per-invocation fan-out result. Built fresh, logged, then dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub email_success_count: u32,
    pub call_success_count: u32,
    pub skipped_count: u32,
    pub scheduled_attempts: u32,
    pub contact_attempts: u32,
    pub errors: Vec<NotificationOutcome>,
    pub skipped: Vec<NotificationOutcome>,
    pub channels_not_configured: Vec<ChannelKind>,
    pub reason: Option<String>,
}

impl DispatchSummary {
    /// Single accumulation point for attempt outcomes.
    pub fn record(&mut self, outcome: NotificationOutcome) {
        if outcome.success {
            match outcome.channel {
                ChannelKind::Email => self.email_success_count += 1,
                ChannelKind::Call => self.call_success_count += 1,
            }
        } else {
            self.errors.push(outcome);
        }
    }

    pub fn record_skip(&mut self, outcome: NotificationOutcome) {
        self.skipped_count += 1;
        self.skipped.push(outcome);
    }

    pub fn settled_attempts(&self) -> u32 {
        self.email_success_count
            + self.call_success_count
            + self.skipped_count
            + self.errors.len() as u32
    }
}
