#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::validate_text;
use crate::user::UserId;
use crate::{ContractViolation, Validate};

pub const DEFAULT_LOCATION: &str = "Unknown";
pub const HIGH_SEVERITY_ABOVE: u8 = 75;
/// Longer caller-supplied locations are cut at a char boundary, never rejected.
pub const LOCATION_MAX_LEN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(pub u64);

impl std::fmt::Display for AlertId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "alert_{:08}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

impl Severity {
    pub fn from_confidence(confidence: u8) -> Self {
        if confidence > HIGH_SEVERITY_ABOVE {
            Severity::High
        } else {
            Severity::Medium
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Resolved,
    Dismissed,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Resolved => "resolved",
            AlertStatus::Dismissed => "dismissed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, AlertStatus::Active)
    }

    pub fn can_transition_to(self, to: AlertStatus) -> bool {
        matches!(
            (self, to),
            (AlertStatus::Active, AlertStatus::Resolved)
                | (AlertStatus::Active, AlertStatus::Dismissed)
        )
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Some(AlertStatus::Active),
            "resolved" => Some(AlertStatus::Resolved),
            "dismissed" => Some(AlertStatus::Dismissed),
            _ => None,
        }
    }
}

/// Fields the pipeline hands to the store. Severity is derived here, once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertCreateInput {
    pub user_id: Option<UserId>,
    pub alert_type: String,
    pub confidence: u8,
    pub severity: Severity,
    pub location: String,
}

impl AlertCreateInput {
    pub fn v1(
        user_id: Option<UserId>,
        alert_type: impl Into<String>,
        confidence: u8,
        location: Option<String>,
    ) -> Result<Self, ContractViolation> {
        let location = location
            .map(|l| truncate_location(l.trim()))
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string());
        let input = Self {
            user_id,
            alert_type: alert_type.into(),
            confidence,
            severity: Severity::from_confidence(confidence),
            location,
        };
        input.validate()?;
        Ok(input)
    }
}

fn truncate_location(raw: &str) -> String {
    if raw.len() <= LOCATION_MAX_LEN {
        return raw.to_string();
    }
    let mut end = LOCATION_MAX_LEN;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    raw[..end].trim_end().to_string()
}

impl Validate for AlertCreateInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text("alert.type", &self.alert_type, 256)?;
        validate_text("alert.location", &self.location, LOCATION_MAX_LEN)?;
        if self.confidence > 100 {
            return Err(ContractViolation::InvalidRange {
                field: "alert.confidence",
                min: 0.0,
                max: 100.0,
                got: f64::from(self.confidence),
            });
        }
        if self.severity != Severity::from_confidence(self.confidence) {
            return Err(ContractViolation::InvalidValue {
                field: "alert.severity",
                reason: "must be derived from confidence",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub user_id: Option<UserId>,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub confidence: u8,
    pub severity: Severity,
    pub location: String,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
}

impl Alert {
    pub fn from_input(id: AlertId, input: AlertCreateInput, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: input.user_id,
            alert_type: input.alert_type,
            confidence: input.confidence,
            severity: input.severity,
            location: input.location,
            status: AlertStatus::Active,
            created_at,
            resolved_at: None,
            resolved_by: None,
        }
    }
}
