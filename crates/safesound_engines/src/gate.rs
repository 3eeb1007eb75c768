#![forbid(unsafe_code)]

use safesound_contracts::alert::Severity;
use safesound_contracts::classification::{ClassificationResult, RawClassification};
use safesound_contracts::{ContractViolation, ReasonCodeId};

pub mod reason_codes {
    use safesound_contracts::ReasonCodeId;

    pub const GATE_OK_DANGER: ReasonCodeId = ReasonCodeId(0x4741_0001);

    pub const GATE_LABEL_EMPTY: ReasonCodeId = ReasonCodeId(0x4741_0010);
    pub const GATE_NOT_FLAGGED: ReasonCodeId = ReasonCodeId(0x4741_0011);
    pub const GATE_BELOW_THRESHOLD: ReasonCodeId = ReasonCodeId(0x4741_0012);
    pub const GATE_LABEL_NOT_IN_LEXICON: ReasonCodeId = ReasonCodeId(0x4741_0013);
}

pub const DEFAULT_THRESHOLD: f64 = 40.0;
pub const DEFAULT_DANGER_LEXICON: &[&str] = &[
    "scream",
    "cry",
    "glass",
    "gunshot",
    "explosion",
    "cough",
    "crash",
    "alarm",
    "violence",
];

/// Lowercase, underscores to spaces, trimmed.
pub fn normalize_label(label: &str) -> String {
    label.to_lowercase().replace('_', " ").trim().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DangerLexicon {
    keywords: Vec<String>,
}

impl DangerLexicon {
    pub fn default_v1() -> Self {
        Self {
            keywords: DEFAULT_DANGER_LEXICON
                .iter()
                .map(|k| (*k).to_string())
                .collect(),
        }
    }

    pub fn from_keywords<I, S>(keywords: I) -> Result<Self, ContractViolation>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for k in keywords {
            let k = normalize_label(k.as_ref());
            if !k.is_empty() && !out.contains(&k) {
                out.push(k);
            }
        }
        if out.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "gate.lexicon",
                reason: "must contain at least one keyword",
            });
        }
        Ok(Self { keywords: out })
    }

    pub fn parse_csv(csv: &str) -> Result<Self, ContractViolation> {
        Self::from_keywords(csv.split(','))
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// First keyword contained in an already-normalized label.
    pub fn first_match(&self, normalized_label: &str) -> Option<&str> {
        self.keywords
            .iter()
            .find(|k| normalized_label.contains(k.as_str()))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GateConfig {
    pub threshold: f64,
    pub lexicon: DangerLexicon,
}

impl GateConfig {
    pub fn mvp_v1() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            lexicon: DangerLexicon::default_v1(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GateDecision {
    pub is_danger: bool,
    pub severity: Option<Severity>,
    pub matched_keyword: Option<String>,
    pub normalized_label: String,
    pub reason_code: ReasonCodeId,
}

impl GateDecision {
    fn reject(normalized_label: String, reason_code: ReasonCodeId) -> Self {
        Self {
            is_danger: false,
            severity: None,
            matched_keyword: None,
            normalized_label,
            reason_code,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassificationGate {
    config: GateConfig,
}

impl Default for ClassificationGate {
    fn default() -> Self {
        Self {
            config: GateConfig::mvp_v1(),
        }
    }
}

impl ClassificationGate {
    pub fn new(config: GateConfig) -> Result<Self, ContractViolation> {
        if !config.threshold.is_finite() {
            return Err(ContractViolation::NotFinite {
                field: "gate.threshold",
            });
        }
        if !(0.0..=100.0).contains(&config.threshold) {
            return Err(ContractViolation::InvalidRange {
                field: "gate.threshold",
                min: 0.0,
                max: 100.0,
                got: config.threshold,
            });
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Validates the wire payload, then decides.
    pub fn evaluate(
        &self,
        raw: &RawClassification,
    ) -> Result<(ClassificationResult, GateDecision), ContractViolation> {
        let result = ClassificationResult::from_raw(raw)?;
        let decision = self.decide(&result);
        Ok((result, decision))
    }

    pub fn decide(&self, result: &ClassificationResult) -> GateDecision {
        let normalized = normalize_label(result.label());
        if normalized.is_empty() {
            return GateDecision::reject(normalized, reason_codes::GATE_LABEL_EMPTY);
        }
        if !result.emergency_detected() {
            return GateDecision::reject(normalized, reason_codes::GATE_NOT_FLAGGED);
        }
        if result.confidence() < self.config.threshold {
            return GateDecision::reject(normalized, reason_codes::GATE_BELOW_THRESHOLD);
        }
        let Some(keyword) = self.config.lexicon.first_match(&normalized) else {
            return GateDecision::reject(normalized, reason_codes::GATE_LABEL_NOT_IN_LEXICON);
        };
        GateDecision {
            is_danger: true,
            // Derived from the stored (rounded) confidence so the persisted alert
            // always satisfies severity == high iff confidence > 75.
            severity: Some(Severity::from_confidence(result.rounded_confidence())),
            matched_keyword: Some(keyword.to_string()),
            normalized_label: normalized,
            reason_code: reason_codes::GATE_OK_DANGER,
        }
    }
}
