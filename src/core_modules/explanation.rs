// THEORY:
// The `explanation` module renders a scoring trace as plain language. It is a
// pure function of the trace and the level, so identical inputs always produce
// byte-identical text.
//
// The sentence always has four parts in this order:
//   "Estimated risk level: {level}. {visual summary} {symptom summary} {caveat}"
// Visual cues are reported when the raw signal reaches its cue threshold, not
// its weighted contribution. Symptoms are reported when their value exceeds 0.5.

use crate::core_modules::scoring::{RiskLevel, SignalDetail, SignalKind};

pub const DISCLAIMER: &str = "This output is a non-diagnostic risk estimation for triage support only. It cannot diagnose infection and should not replace clinical evaluation.";

const CAVEAT: &str = "This is a triage support estimate, not a diagnosis.";
const NO_VISUAL_CUES: &str = "No strong visual cues like redness, drainage, or swelling were detected.";
const NO_SYMPTOMS: &str = "No concerning symptoms were reported in the questionnaire.";
const SYMPTOM_PRESENT: f64 = 0.5;

fn base_note(kind: SignalKind) -> &'static str {
    match kind {
        SignalKind::PeriwoundRedness => {
            "Higher redness near the wound boundary may be associated with irritation."
        }
        SignalKind::ExudateProxy => {
            "Yellow/green coloration can be a proxy for exudate-like appearance."
        }
        SignalKind::DarkTissueProxy => "Darker regions may indicate non-viable tissue presence.",
        SignalKind::SwellingProxy => "Edge sharpness can be a proxy for localized swelling cues.",
        SignalKind::ReportedPain => {
            "Pain or tenderness near the wound can be a reported symptom of irritation."
        }
        SignalKind::ReportedWarmth => {
            "A warm or hot sensation around the wound can indicate inflammation."
        }
        SignalKind::ReportedSwelling => {
            "Swelling around the wound can be a sign of irritation or inflammation."
        }
        SignalKind::ReportedDrainage => {
            "Drainage or pus-like fluid can be a reported sign of infection."
        }
        SignalKind::ReportedSpreadingRedness => {
            "Redness spreading beyond the wound may indicate inflammation."
        }
    }
}

/// Per-signal note: the fixed sentence plus the value to two decimals.
pub fn signal_note(kind: SignalKind, value: f64) -> String {
    format!("{} Signal intensity: {value:.2}.", base_note(kind))
}

/// Threshold and clause for the visual signals; `None` for symptoms.
fn visual_cue(kind: SignalKind) -> Option<(f64, &'static str)> {
    match kind {
        SignalKind::PeriwoundRedness => Some((0.35, "notable redness around the wound edges")),
        SignalKind::ExudateProxy => Some((0.25, "yellow/green drainage or pus-like coloration")),
        SignalKind::DarkTissueProxy => Some((0.2, "darkened tissue inside the wound")),
        SignalKind::SwellingProxy => Some((0.2, "edge texture changes consistent with swelling")),
        _ => None,
    }
}

fn symptom_phrase(kind: SignalKind) -> Option<&'static str> {
    match kind {
        SignalKind::ReportedPain => Some("pain or tenderness"),
        SignalKind::ReportedWarmth => Some("warmth around the wound"),
        SignalKind::ReportedSwelling => Some("swelling"),
        SignalKind::ReportedDrainage => Some("drainage/pus"),
        SignalKind::ReportedSpreadingRedness => Some("spreading redness"),
        _ => None,
    }
}

fn visual_summary(details: &[SignalDetail]) -> String {
    let cues: Vec<&str> = details
        .iter()
        .filter_map(|d| {
            visual_cue(d.name).and_then(|(threshold, clause)| (d.value >= threshold).then_some(clause))
        })
        .collect();
    if cues.is_empty() {
        NO_VISUAL_CUES.to_string()
    } else {
        format!("Visual cues suggest {}.", cues.join(", "))
    }
}

fn symptom_summary(details: &[SignalDetail]) -> String {
    let reported: Vec<&str> = details
        .iter()
        .filter(|d| d.value > SYMPTOM_PRESENT)
        .filter_map(|d| symptom_phrase(d.name))
        .collect();
    if reported.is_empty() {
        NO_SYMPTOMS.to_string()
    } else {
        format!("Reported symptoms include {}.", reported.join(", "))
    }
}

pub fn explain(details: &[SignalDetail], level: RiskLevel) -> String {
    format!(
        "Estimated risk level: {level}. {} {} {CAVEAT}",
        visual_summary(details),
        symptom_summary(details)
    )
}

pub fn recommended_steps(level: RiskLevel) -> Vec<String> {
    let steps: [&str; 2] = match level {
        RiskLevel::High => [
            "Consider scheduling a clinical check if symptoms persist or worsen.",
            "Monitor for changes such as increasing redness, swelling, or drainage.",
        ],
        RiskLevel::Medium => [
            "Continue monitoring and recheck if the appearance changes.",
            "Seek clinical advice if you are concerned about progression.",
        ],
        RiskLevel::Low => [
            "Keep monitoring for noticeable changes over time.",
            "If you have concerns, seek clinical guidance.",
        ],
    };
    steps.iter().map(|s| s.to_string()).collect()
}
