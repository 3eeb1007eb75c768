#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::common::validate_text;
use crate::{ContractViolation, Validate};

pub const MAX_EMERGENCY_CONTACTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "user_id",
                reason: "must not be empty",
            });
        }
        if id.len() > 128 {
            return Err(ContractViolation::InvalidValue {
                field: "user_id",
                reason: "must be <= 128 chars",
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    pub phone: String,
}

impl EmergencyContact {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("Emergency contact")
    }
}

impl Validate for EmergencyContact {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text("emergency_contact.email", &self.email, 254)?;
        if !self.email.contains('@') {
            return Err(ContractViolation::InvalidValue {
                field: "emergency_contact.email",
                reason: "must contain '@'",
            });
        }
        validate_text("emergency_contact.phone", &self.phone, 32)?;
        Ok(())
    }
}

/// Read-only snapshot of a monitored user as owned by user management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, alias = "emergencyContacts")]
    pub emergency_contacts: Vec<EmergencyContact>,
}

impl Validate for UserProfile {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text("user.name", &self.name, 128)?;
        if let Some(email) = &self.email {
            validate_text("user.email", email, 254)?;
        }
        if let Some(phone) = &self.phone {
            validate_text("user.phone", phone, 32)?;
        }
        if self.emergency_contacts.len() > MAX_EMERGENCY_CONTACTS {
            return Err(ContractViolation::InvalidValue {
                field: "user.emergency_contacts",
                reason: "at most 10 entries",
            });
        }
        for c in &self.emergency_contacts {
            c.validate()?;
        }
        Ok(())
    }
}
