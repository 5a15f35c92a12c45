use std::path::PathBuf;
use thiserror::Error;

// Error types for the risk engine. Feature extraction itself never fails; the
// only fallible pieces are configuration, the segmentation stage (recovered
// internally), the model registry and the worker pool.

/// Raised while building a `WeightTable`. Always a construction-time failure.
#[derive(Error, Debug)]
pub enum WeightError {
    #[error("Failed to load weight table: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Weight '{key}' is not a finite number")]
    NonFinite { key: String },
    #[error("Weight '{key}' must be a number, found '{value}'")]
    NotNumeric { key: String, value: String },
}

/// Failure of the primary colour-model segmentation. Never reaches the caller
/// of `FeatureExtractor::extract`; it selects the threshold fallback instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmentationError {
    #[error("Seed rectangle leaves no {0} samples in a {1}x{2} image")]
    EmptySeed(&'static str, u32, u32),
    #[error("Colour model component has a singular covariance")]
    SingularCovariance,
    #[error("Colour model produced a non-finite likelihood")]
    NonFinite,
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model path is required for the learned model")]
    MissingModelPath,
    #[error("Learned model at {0} is not available in this build")]
    Unavailable(PathBuf),
    #[error("Weight Error: {0}")]
    Weights(#[from] WeightError),
}

#[derive(Error, Debug)]
pub enum AssessError {
    #[error("Failed to send task to worker pool")]
    PoolClosed,
    #[error("Failed to receive result from worker")]
    WorkerDropped,
    #[error("Model Error: {0}")]
    Model(#[from] ModelError),
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unknown symptom '{0}'")]
pub struct SymptomParseError(pub String);
