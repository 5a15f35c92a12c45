// THEORY:
// Runtime settings for the risk engine, layered the same way everywhere:
// built-in defaults, then an optional `wound_risk.{yaml,toml,json}` in the
// working directory, then `WOUND_RISK_*` environment variables. The scoring
// weights themselves live in their own file (`weights_path`) so they can be
// tuned without touching any other setting.

use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat, builder::DefaultState};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt};

pub const SETTINGS_FILE: &str = "wound_risk";
pub const ENV_PREFIX: &str = "WOUND_RISK";

/// Which `RiskModel` implementation `load_model` builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Heuristic,
    Learned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: ModelKind,
    pub weights_path: PathBuf,
    /// Required when `model` is `learned`.
    pub model_path: Option<PathBuf>,
    /// Worker count for the pool; 0 means one per logical CPU.
    pub workers: usize,
    pub log_level: String,
    /// Images whose shorter side is below this are rejected before analysis.
    pub min_image_side: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: ModelKind::Heuristic,
            weights_path: PathBuf::from("config/weights.yaml"),
            model_path: None,
            workers: 0,
            log_level: "info".to_string(),
            min_image_side: 32,
        }
    }
}

impl Settings {
    /// Defaults, then the optional settings file, then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name(SETTINGS_FILE).required(false))
                .add_source(Environment::with_prefix(ENV_PREFIX)),
        )
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Self::from_builder(Config::builder().add_source(File::from_str(yaml, FileFormat::Yaml)))
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }

    pub fn worker_count(&self) -> usize {
        if self.workers == 0 { num_cpus::get() } else { self.workers }
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).with_target(false).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_yields_defaults() {
        let settings = Settings::from_yaml_str("").expect("empty yaml");
        assert_eq!(settings, Settings::default());
        assert!(settings.worker_count() >= 1);
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let settings = Settings::from_yaml_str(
            "model: learned\nmodel_path: models/wound.pt\nworkers: 3\nmin_image_side: 64\n",
        )
        .expect("valid yaml");
        assert_eq!(settings.model, ModelKind::Learned);
        assert_eq!(settings.model_path, Some(PathBuf::from("models/wound.pt")));
        assert_eq!(settings.worker_count(), 3);
        assert_eq!(settings.min_image_side, 64);
        assert_eq!(settings.weights_path, PathBuf::from("config/weights.yaml"));
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn unknown_model_kind_is_rejected() {
        assert!(Settings::from_yaml_str("model: torch\n").is_err());
    }
}
