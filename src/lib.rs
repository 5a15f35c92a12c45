// THEORY:
// This file is the entry point for the `wound_risk` library crate. It exposes
// the model registry (`pipeline`), the worker pool (`parallel_pipeline`) and the
// data structures they return as the public API. The stages underneath
// (`core_modules`) stay public so they can be tuned and tested on their own,
// but a typical caller only needs `load_model` and `RiskModel::predict`.
//
// Every output is a non-diagnostic triage estimate. Nothing in this crate
// claims to detect infection.

pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;
pub mod settings;

pub use core_modules::features::{ExtractorConfig, FeatureExtractor, FeatureSignals};
pub use core_modules::scoring::{
    RiskLevel, RiskResult, RiskScorer, SignalDetail, SignalKind, SymptomInputs, WeightTable,
};
pub use error::{AssessError, ModelError, SegmentationError, SymptomParseError, WeightError};
pub use parallel_pipeline::WorkerPool;
pub use pipeline::{HeuristicRiskModel, LearnedRiskModel, RiskModel, load_model};
pub use settings::{ModelKind, Settings};
