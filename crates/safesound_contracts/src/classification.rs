#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::{ContractViolation, Validate};

pub const CONFIDENCE_MIN: f64 = 0.0;
pub const CONFIDENCE_MAX: f64 = 100.0;
pub const LABEL_MAX_LEN: usize = 256;

/// Classifier payload exactly as received over the wire.
///
/// Every field is optional here; [`ClassificationResult::from_raw`] is the only
/// way into the strict form the gate consumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawClassification {
    #[serde(default, alias = "type")]
    pub label: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default, alias = "emergencyDetected")]
    pub emergency_detected: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    label: String,
    confidence: f64,
    emergency_detected: bool,
}

impl ClassificationResult {
    pub fn v1(
        label: impl Into<String>,
        confidence: f64,
        emergency_detected: bool,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            label: label.into(),
            confidence,
            emergency_detected,
        };
        r.validate()?;
        Ok(r)
    }

    /// Missing label becomes empty (never danger), missing flag becomes false.
    /// Missing or out-of-range confidence is rejected, never clamped.
    pub fn from_raw(raw: &RawClassification) -> Result<Self, ContractViolation> {
        let Some(confidence) = raw.confidence else {
            return Err(ContractViolation::InvalidValue {
                field: "classification.confidence",
                reason: "must be present",
            });
        };
        Self::v1(
            raw.label.clone().unwrap_or_default(),
            confidence,
            raw.emergency_detected.unwrap_or(false),
        )
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn emergency_detected(&self) -> bool {
        self.emergency_detected
    }

    /// Confidence as persisted on an alert.
    pub fn rounded_confidence(&self) -> u8 {
        // validate() pins confidence to [0, 100], so the cast cannot truncate.
        self.confidence.round() as u8
    }
}

impl Validate for ClassificationResult {
    fn validate(&self) -> Result<(), ContractViolation> {
        if !self.confidence.is_finite() {
            return Err(ContractViolation::NotFinite {
                field: "classification.confidence",
            });
        }
        if !(CONFIDENCE_MIN..=CONFIDENCE_MAX).contains(&self.confidence) {
            return Err(ContractViolation::InvalidRange {
                field: "classification.confidence",
                min: CONFIDENCE_MIN,
                max: CONFIDENCE_MAX,
                got: self.confidence,
            });
        }
        if self.label.len() > LABEL_MAX_LEN {
            return Err(ContractViolation::InvalidValue {
                field: "classification.label",
                reason: "exceeds max length",
            });
        }
        Ok(())
    }
}
