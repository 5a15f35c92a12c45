// THEORY:
// The `pipeline` module is the top-level API for the risk engine. It hides
// the full stack (segmentation, feature extraction, scoring, explanation)
// behind a single `RiskModel::predict` call: image in, `RiskResult` out.
//
// Key architectural principles:
// 1.  **Pluggable Models**: `RiskModel` is the seam where a trained model can
//     replace the heuristic one without changing any caller. The registry
//     (`load_model`) picks the implementation from `Settings`.
// 2.  **Shareable**: Models are `Send + Sync` and hold only immutable state, so
//     a single instance behind an `Arc` serves every worker in the pool.
// 3.  **Fail at Load Time**: Misconfiguration (a missing model path, an invalid
//     weight file) is reported when the model is built, not on the first image.

use crate::core_modules::features::FeatureExtractor;
use crate::core_modules::scoring::{RiskResult, RiskScorer, SymptomInputs, WeightTable};
use crate::error::ModelError;
use crate::settings::{ModelKind, Settings};
use image::RgbImage;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Anything that can turn a wound photograph into a risk estimate.
pub trait RiskModel: Send + Sync {
    fn predict(
        &self,
        image: &RgbImage,
        symptoms: Option<&SymptomInputs>,
    ) -> Result<RiskResult, ModelError>;
}

/// Hand-tuned model: colour/edge heuristics followed by the additive scorer.
#[derive(Debug, Clone)]
pub struct HeuristicRiskModel {
    extractor: FeatureExtractor,
    scorer: RiskScorer,
}

impl HeuristicRiskModel {
    pub fn new(extractor: FeatureExtractor, scorer: RiskScorer) -> Self {
        Self { extractor, scorer }
    }

    pub fn from_weights(weights: WeightTable) -> Self {
        Self::new(FeatureExtractor::default(), RiskScorer::new(weights))
    }
}

impl RiskModel for HeuristicRiskModel {
    fn predict(
        &self,
        image: &RgbImage,
        symptoms: Option<&SymptomInputs>,
    ) -> Result<RiskResult, ModelError> {
        let signals = self.extractor.extract(image);
        Ok(self.scorer.score(&signals, symptoms))
    }
}

/// Placeholder for a trained model loaded from `model_path`. Until an inference
/// backend is wired in, every prediction reports `ModelError::Unavailable`.
#[derive(Debug, Clone)]
pub struct LearnedRiskModel {
    model_path: PathBuf,
}

impl LearnedRiskModel {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
        }
    }
}

impl RiskModel for LearnedRiskModel {
    fn predict(
        &self,
        _image: &RgbImage,
        _symptoms: Option<&SymptomInputs>,
    ) -> Result<RiskResult, ModelError> {
        Err(ModelError::Unavailable(self.model_path.clone()))
    }
}

/// Builds the model named by `settings.model`.
pub fn load_model(settings: &Settings) -> Result<Arc<dyn RiskModel>, ModelError> {
    match settings.model {
        ModelKind::Heuristic => {
            let weights = WeightTable::from_path(&settings.weights_path)?;
            info!(weights = %settings.weights_path.display(), "Loaded heuristic model");
            Ok(Arc::new(HeuristicRiskModel::from_weights(weights)))
        }
        ModelKind::Learned => {
            let model_path = settings.model_path.as_ref().ok_or(ModelError::MissingModelPath)?;
            info!(model = %model_path.display(), "Loaded learned model");
            Ok(Arc::new(LearnedRiskModel::new(model_path)))
        }
    }
}
