// THEORY:
// The `scoring` module is the decision layer of the risk engine. It combines
// the four visual proxies and the optional self-reported symptoms into one
// bounded score, a coarse level, and an ordered trace of what contributed.
//
// Key architectural principles:
// 1.  **Additive Model**: score = bias + sum(weight * value) over every signal,
//     visual signals first, then symptoms (true = 1.0, false = 0.0). No cross
//     terms. A signal with no configured weight contributes nothing.
// 2.  **Saturating Clamp**: The raw sum is clamped to [0, 1], never rescaled.
//     Weights are tuned so typical inputs land inside the range; the clamp keeps
//     the contract under any configuration.
// 3.  **Immutable Weights**: A `RiskScorer` owns its `WeightTable` for its whole
//     life and never mutates it, so one scorer can serve concurrent callers.
// 4.  **Traceability**: Every contribution is recorded as a `SignalDetail`, and
//     the explanation is synthesised from that trace (see `explanation`).

use crate::core_modules::explanation::{self, DISCLAIMER};
use crate::core_modules::features::FeatureSignals;
use crate::error::{SymptomParseError, WeightError};
use config::{Config, File, FileFormat, Value, ValueKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

pub const MEDIUM_THRESHOLD: f64 = 0.33;
pub const HIGH_THRESHOLD: f64 = 0.66;

/// Every named signal the scorer understands, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    PeriwoundRedness,
    ExudateProxy,
    DarkTissueProxy,
    SwellingProxy,
    ReportedPain,
    ReportedWarmth,
    ReportedSwelling,
    ReportedDrainage,
    ReportedSpreadingRedness,
}

impl SignalKind {
    pub const VISUAL: [SignalKind; 4] = [
        SignalKind::PeriwoundRedness,
        SignalKind::ExudateProxy,
        SignalKind::DarkTissueProxy,
        SignalKind::SwellingProxy,
    ];

    pub const SYMPTOMS: [SignalKind; 5] = [
        SignalKind::ReportedPain,
        SignalKind::ReportedWarmth,
        SignalKind::ReportedSwelling,
        SignalKind::ReportedDrainage,
        SignalKind::ReportedSpreadingRedness,
    ];

    /// The key used in weight tables and serialized output.
    pub fn name(&self) -> &'static str {
        match self {
            SignalKind::PeriwoundRedness => "periwound_redness",
            SignalKind::ExudateProxy => "exudate_proxy",
            SignalKind::DarkTissueProxy => "dark_tissue_proxy",
            SignalKind::SwellingProxy => "swelling_proxy",
            SignalKind::ReportedPain => "reported_pain",
            SignalKind::ReportedWarmth => "reported_warmth",
            SignalKind::ReportedSwelling => "reported_swelling",
            SignalKind::ReportedDrainage => "reported_drainage",
            SignalKind::ReportedSpreadingRedness => "reported_spreading_redness",
        }
    }

}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Self-reported symptoms from the questionnaire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomInputs {
    pub reported_pain: bool,
    pub reported_warmth: bool,
    pub reported_swelling: bool,
    pub reported_drainage: bool,
    pub reported_spreading_redness: bool,
}

impl SymptomInputs {
    /// The symptoms in declaration order as 1.0 (reported) or 0.0.
    pub fn values(&self) -> [(SignalKind, f64); 5] {
        let flag = |reported: bool| if reported { 1.0 } else { 0.0 };
        [
            (SignalKind::ReportedPain, flag(self.reported_pain)),
            (SignalKind::ReportedWarmth, flag(self.reported_warmth)),
            (SignalKind::ReportedSwelling, flag(self.reported_swelling)),
            (SignalKind::ReportedDrainage, flag(self.reported_drainage)),
            (SignalKind::ReportedSpreadingRedness, flag(self.reported_spreading_redness)),
        ]
    }
}

/// Parses a comma-separated list such as `pain,reported_drainage`.
impl FromStr for SymptomInputs {
    type Err = SymptomParseError;

    fn from_str(list: &str) -> Result<Self, Self::Err> {
        let mut symptoms = SymptomInputs::default();
        for raw in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let name = raw.strip_prefix("reported_").unwrap_or(raw);
            match name {
                "pain" => symptoms.reported_pain = true,
                "warmth" => symptoms.reported_warmth = true,
                "swelling" => symptoms.reported_swelling = true,
                "drainage" => symptoms.reported_drainage = true,
                "spreading_redness" => symptoms.reported_spreading_redness = true,
                _ => return Err(SymptomParseError(raw.to_string())),
            }
        }
        Ok(symptoms)
    }
}

/// Signal name to weight. Missing names weigh 0.0; `bias` is the constant offset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightTable {
    weights: HashMap<String, f64>,
}

impl WeightTable {
    pub const BIAS: &'static str = "bias";

    pub fn new(weights: HashMap<String, f64>) -> Result<Self, WeightError> {
        if let Some(key) = weights.iter().find(|(_, w)| !w.is_finite()).map(|(k, _)| k) {
            return Err(WeightError::NonFinite { key: key.clone() });
        }
        Ok(Self { weights })
    }

    /// Loads a flat key/number file; the format follows the file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, WeightError> {
        let source = Config::builder().add_source(File::from(path.as_ref())).build()?;
        Self::from_source(source)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, WeightError> {
        let source = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?;
        Self::from_source(source)
    }

    /// Keeps the signal names and `bias`, which must be numbers. Any other
    /// key is ignored whatever its type.
    fn from_source(source: Config) -> Result<Self, WeightError> {
        let entries: HashMap<String, Value> = source.try_deserialize()?;
        let known = SignalKind::VISUAL
            .iter()
            .chain(&SignalKind::SYMPTOMS)
            .map(SignalKind::name)
            .chain([Self::BIAS]);

        let mut weights = HashMap::new();
        for key in known {
            let Some(value) = entries.get(key) else {
                continue;
            };
            let weight = match value.kind {
                ValueKind::Float(weight) => weight,
                ValueKind::I64(weight) => weight as f64,
                ValueKind::U64(weight) => weight as f64,
                ValueKind::I128(weight) => weight as f64,
                ValueKind::U128(weight) => weight as f64,
                _ => {
                    return Err(WeightError::NotNumeric {
                        key: key.to_string(),
                        value: value.to_string(),
                    });
                }
            };
            weights.insert(key.to_string(), weight);
        }
        Self::new(weights)
    }

    pub fn get(&self, name: &str) -> f64 {
        self.weights.get(name).copied().unwrap_or(0.0)
    }

    pub fn bias(&self) -> f64 {
        self.get(Self::BIAS)
    }
}

/// One contributing signal in the scoring trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalDetail {
    pub name: SignalKind,
    pub value: f64,
    pub weight: f64,
    pub note: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Bands are inclusive at their lower bound.
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_THRESHOLD {
            RiskLevel::High
        } else if score >= MEDIUM_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The final output of one scoring call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskResult {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub signals: Vec<SignalDetail>,
    pub explanation: String,
    pub disclaimer: String,
    pub recommended_next_steps: Vec<String>,
}

/// Combines feature signals and symptoms into a `RiskResult`.
#[derive(Debug, Clone)]
pub struct RiskScorer {
    weights: WeightTable,
}

impl RiskScorer {
    pub fn new(weights: WeightTable) -> Self {
        Self { weights }
    }

    pub fn score(&self, signals: &FeatureSignals, symptoms: Option<&SymptomInputs>) -> RiskResult {
        let mut weighted_sum = self.weights.bias();
        let mut details = Vec::with_capacity(SignalKind::VISUAL.len() + SignalKind::SYMPTOMS.len());

        let observed = signals
            .values()
            .into_iter()
            .chain(symptoms.map(SymptomInputs::values).into_iter().flatten());
        for (kind, value) in observed {
            let weight = self.weights.get(kind.name());
            weighted_sum += weight * value;
            details.push(SignalDetail {
                name: kind,
                value,
                weight,
                note: explanation::signal_note(kind, value),
            });
        }

        let risk_score = weighted_sum.max(0.0).min(1.0);
        let risk_level = RiskLevel::from_score(risk_score);
        debug!(weighted_sum, risk_score, %risk_level, "Scored signals");

        RiskResult {
            risk_score,
            risk_level,
            explanation: explanation::explain(&details, risk_level),
            signals: details,
            disclaimer: DISCLAIMER.to_string(),
            recommended_next_steps: explanation::recommended_steps(risk_level),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, f64)]) -> WeightTable {
        WeightTable::new(pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect())
            .expect("finite weights")
    }

    fn visual_weights() -> WeightTable {
        table(&[
            ("bias", 0.0),
            ("periwound_redness", 0.5),
            ("exudate_proxy", 0.3),
            ("dark_tissue_proxy", 0.1),
            ("swelling_proxy", 0.1),
        ])
    }

    #[test]
    fn redness_dominated_scenario_is_medium() {
        let scorer = RiskScorer::new(visual_weights());
        let result = scorer.score(&FeatureSignals::new(0.9, 0.1, 0.1, 0.1), None);
        assert!((result.risk_score - 0.5).abs() < 1e-9, "score={}", result.risk_score);
        assert_eq!(result.risk_level, RiskLevel::Medium);
        assert!(result.explanation.contains("notable redness around the wound edges"));
        assert!(result.explanation.contains("No concerning symptoms were reported"));
        assert_eq!(result.signals.len(), 4);
    }

    #[test]
    fn drainage_alone_is_medium() {
        let scorer = RiskScorer::new(table(&[("bias", 0.0), ("reported_drainage", 0.4)]));
        let symptoms = SymptomInputs {
            reported_drainage: true,
            ..Default::default()
        };
        let result = scorer.score(&FeatureSignals::new(0.0, 0.0, 0.0, 0.0), Some(&symptoms));
        assert!((result.risk_score - 0.4).abs() < 1e-12);
        assert_eq!(result.risk_level, RiskLevel::Medium);
        assert!(result.explanation.contains("drainage/pus"));
        assert!(result.explanation.contains("No strong visual cues"));
    }

    #[test]
    fn huge_bias_saturates_at_one() {
        let scorer = RiskScorer::new(table(&[("bias", 5.0)]));
        let result = scorer.score(&FeatureSignals::new(0.0, 0.0, 0.0, 0.0), None);
        assert_eq!(result.risk_score, 1.0);
        assert_eq!(result.risk_level, RiskLevel::High);
    }

    #[test]
    fn negative_sum_saturates_at_zero() {
        let scorer = RiskScorer::new(table(&[("bias", -3.0), ("periwound_redness", 0.5)]));
        let result = scorer.score(&FeatureSignals::new(1.0, 1.0, 1.0, 1.0), None);
        assert_eq!(result.risk_score, 0.0);
        assert_eq!(result.risk_level, RiskLevel::Low);
    }

    #[test]
    fn level_boundaries_are_inclusive_below() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.329_999), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.33), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.659_999), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.66), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(1.0), RiskLevel::High);

        for (bias, level) in [(0.33, RiskLevel::Medium), (0.66, RiskLevel::High)] {
            let scorer = RiskScorer::new(table(&[("bias", bias)]));
            let result = scorer.score(&FeatureSignals::new(0.0, 0.0, 0.0, 0.0), None);
            assert_eq!(result.risk_level, level, "bias={bias}");
        }
    }

    #[test]
    fn scoring_is_deterministic() {
        let scorer = RiskScorer::new(visual_weights());
        let signals = FeatureSignals::new(0.42, 0.31, 0.27, 0.05);
        let symptoms = SymptomInputs {
            reported_pain: true,
            reported_warmth: true,
            ..Default::default()
        };
        let first = scorer.score(&signals, Some(&symptoms));
        let second = scorer.score(&signals, Some(&symptoms));
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).expect("serialize"),
            serde_json::to_string(&second).expect("serialize")
        );
    }

    #[test]
    fn reporting_a_symptom_never_lowers_the_score() {
        let scorer = RiskScorer::new(table(&[
            ("bias", 0.05),
            ("periwound_redness", 0.3),
            ("reported_pain", 0.05),
            ("reported_warmth", 0.08),
            ("reported_swelling", 0.07),
            ("reported_drainage", 0.12),
            ("reported_spreading_redness", 0.15),
        ]));
        let signals = FeatureSignals::new(0.6, 0.2, 0.1, 0.3);
        let toggles: [fn(&mut SymptomInputs); 5] = [
            |s| s.reported_pain = true,
            |s| s.reported_warmth = true,
            |s| s.reported_swelling = true,
            |s| s.reported_drainage = true,
            |s| s.reported_spreading_redness = true,
        ];

        let mut symptoms = SymptomInputs::default();
        let mut previous = scorer.score(&signals, Some(&symptoms)).risk_score;
        for toggle in toggles {
            toggle(&mut symptoms);
            let current = scorer.score(&signals, Some(&symptoms)).risk_score;
            assert!(current >= previous, "{current} < {previous}");
            previous = current;
        }
    }

    #[test]
    fn details_follow_declaration_order() {
        let scorer = RiskScorer::new(WeightTable::default());
        let result = scorer.score(
            &FeatureSignals::new(0.1, 0.2, 0.3, 0.4),
            Some(&SymptomInputs::default()),
        );
        let names: Vec<SignalKind> = result.signals.iter().map(|d| d.name).collect();
        let expected: Vec<SignalKind> = SignalKind::VISUAL
            .into_iter()
            .chain(SignalKind::SYMPTOMS)
            .collect();
        assert_eq!(names, expected);
        assert!(result.signals.iter().all(|d| d.weight == 0.0));
        assert_eq!(
            result.signals[1].note,
            "Yellow/green coloration can be a proxy for exudate-like appearance. Signal intensity: 0.20."
        );
    }

    #[test]
    fn result_serializes_with_flat_names() {
        let scorer = RiskScorer::new(visual_weights());
        let result = scorer.score(&FeatureSignals::new(0.0, 0.0, 0.0, 0.0), None);
        let json = serde_json::to_value(&result).expect("serialize");
        assert_eq!(json["risk_level"], "low");
        assert_eq!(json["signals"][0]["name"], "periwound_redness");
        assert_eq!(json["signals"][3]["weight"], 0.1);
        assert_eq!(json["recommended_next_steps"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn weight_table_loads_yaml_and_defaults_missing_keys() {
        let weights = WeightTable::from_yaml_str("bias: 0.1\nperiwound_redness: 0.4\nunused_key: 2\n")
            .expect("valid yaml");
        assert_eq!(weights.bias(), 0.1);
        assert_eq!(weights.get("periwound_redness"), 0.4);
        assert_eq!(weights.get("reported_pain"), 0.0);
    }

    #[test]
    fn non_numeric_weight_fails_construction() {
        for yaml in [
            "bias: 0.0\nperiwound_redness: very_high\n",
            "periwound_redness: true\n",
            "periwound_redness: \"0.3\"\n",
            "periwound_redness:\n  value: 0.3\n",
        ] {
            let result = WeightTable::from_yaml_str(yaml);
            assert!(
                matches!(result, Err(WeightError::NotNumeric { ref key, .. }) if key == "periwound_redness"),
                "{yaml:?} gave {result:?}"
            );
        }
        let bias = WeightTable::from_yaml_str("bias: false\n");
        assert!(matches!(bias, Err(WeightError::NotNumeric { ref key, .. }) if key == "bias"));
    }

    #[test]
    fn unknown_keys_of_any_type_are_ignored() {
        let weights = WeightTable::from_yaml_str(
            "version: release-1\nmetadata:\n  author: wound team\n  reviewed: true\nenabled: true\nbias: 0.2\nswelling_proxy: 1\n",
        )
        .expect("unknown keys are ignored");
        assert_eq!(weights.bias(), 0.2);
        assert_eq!(weights.get("swelling_proxy"), 1.0);
        assert_eq!(weights.get("version"), 0.0);
        assert_eq!(weights.get("enabled"), 0.0);
    }

    #[test]
    fn non_finite_weight_fails_construction() {
        let result = WeightTable::new(HashMap::from([("bias".to_string(), f64::INFINITY)]));
        assert!(matches!(result, Err(WeightError::NonFinite { ref key }) if key == "bias"));
    }

    #[test]
    fn bundled_weight_file_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/weights.yaml");
        let weights = WeightTable::from_path(path).expect("bundled weights");
        for kind in SignalKind::VISUAL.into_iter().chain(SignalKind::SYMPTOMS) {
            assert!(weights.get(kind.name()) > 0.0, "{kind}");
        }
    }

    #[test]
    fn symptom_lists_parse_with_or_without_prefix() {
        let symptoms: SymptomInputs = "pain, reported_drainage,spreading_redness".parse().expect("valid");
        assert!(symptoms.reported_pain);
        assert!(symptoms.reported_drainage);
        assert!(symptoms.reported_spreading_redness);
        assert!(!symptoms.reported_warmth);
        assert_eq!("".parse::<SymptomInputs>(), Ok(SymptomInputs::default()));
        assert_eq!(
            "pain,itching".parse::<SymptomInputs>(),
            Err(SymptomParseError("itching".to_string()))
        );
    }
}
