#![forbid(unsafe_code)]

use safesound_contracts::classification::ClassificationResult;
use safesound_engines::gate::{ClassificationGate, DangerLexicon, GateConfig};
use serde_json::json;

use crate::args::Flags;

/// Evaluates one classification offline against `base`, with flag overrides.
/// Returns the decision as pretty JSON.
pub fn execute_gate_command(args: &[String], base: GateConfig) -> Result<String, String> {
    let flags = Flags::parse(
        args,
        &["label", "confidence", "threshold", "lexicon"],
        &["emergency"],
    )?;
    let label = flags.require("label")?;
    let confidence = flags
        .f64_value("confidence")?
        .ok_or_else(|| "missing --confidence".to_string())?;

    let mut config = base;
    if let Some(threshold) = flags.f64_value("threshold")? {
        config.threshold = threshold;
    }
    if let Some(csv) = flags.get("lexicon") {
        config.lexicon = DangerLexicon::parse_csv(csv).map_err(|v| format!("--lexicon: {v}"))?;
    }
    let gate = ClassificationGate::new(config).map_err(|v| format!("invalid gate config: {v}"))?;
    let result = ClassificationResult::v1(label, confidence, flags.switch("emergency"))
        .map_err(|v| format!("invalid classification: {v}"))?;
    let decision = gate.decide(&result);

    let body = json!({
        "label": result.label(),
        "confidence": result.confidence(),
        "emergency_detected": result.emergency_detected(),
        "is_danger": decision.is_danger,
        "severity": decision.severity,
        "matched_keyword": decision.matched_keyword,
        "normalized_label": decision.normalized_label,
        "reason_code": decision.reason_code.to_string(),
        "threshold": gate.config().threshold,
    });
    serde_json::to_string_pretty(&body).map_err(|e| e.to_string())
}
