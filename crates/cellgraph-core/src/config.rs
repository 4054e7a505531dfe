//! # Pipeline Configuration
//!
//! One TOML file configures the whole pipeline. Every table and every field
//! is optional; anything left out takes its default.
//!
//! ```toml
//! [store]
//! path = "cellgraph.redb"
//!
//! [labeler]
//! latency = 80.0
//! min_score = 2
//!
//! [features]
//! init = "seeded"   # zeros | constant | seeded
//! seed = 42
//! dim = 11
//!
//! [propagator]
//! weight_init = "seeded"   # identity | seeded
//! seed = 42
//!
//! [trainer]
//! epochs = 100
//! learning_rate = 0.01
//! test_fraction = 0.4
//!
//! [segmenter]
//! capacity = 4
//! ```
//!
//! Load order: file, then `CELLGRAPH_DB` for the store path. The CLI's
//! `--database` flag is applied last by the caller.

use crate::graph::FeatureInit;
use crate::labeler::LabelThresholds;
use crate::primitives::{DEFAULT_SEED, KPI_DIM};
use crate::propagate::WeightInit;
use crate::segment::SegmenterConfig;
use crate::trainer::TrainerConfig;
use crate::CellGraphError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding `[store] path`.
pub const DB_PATH_ENV: &str = "CELLGRAPH_DB";

const DEFAULT_DB_PATH: &str = "cellgraph.redb";

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// redb database file.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

/// Entity feature strategy names as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureInitKind {
    Zeros,
    Constant,
    #[default]
    Seeded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub init: FeatureInitKind,
    /// Fill value for `constant`.
    pub value: f64,
    /// RNG seed for `seeded`.
    pub seed: u64,
    /// Entity feature width.
    pub dim: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            init: FeatureInitKind::default(),
            value: 0.0,
            seed: DEFAULT_SEED,
            dim: KPI_DIM,
        }
    }
}

impl FeatureConfig {
    #[must_use]
    pub fn feature_init(&self) -> FeatureInit {
        match self.init {
            FeatureInitKind::Zeros => FeatureInit::Zeros,
            FeatureInitKind::Constant => FeatureInit::Constant { value: self.value },
            FeatureInitKind::Seeded => FeatureInit::Seeded { seed: self.seed },
        }
    }
}

/// Operator weight strategy names as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightInitKind {
    Identity,
    #[default]
    Seeded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagatorConfig {
    pub weight_init: WeightInitKind,
    pub seed: u64,
}

impl Default for PropagatorConfig {
    fn default() -> Self {
        Self {
            weight_init: WeightInitKind::default(),
            seed: DEFAULT_SEED,
        }
    }
}

impl PropagatorConfig {
    #[must_use]
    pub fn weight_init(&self) -> WeightInit {
        match self.weight_init {
            WeightInitKind::Identity => WeightInit::Identity,
            WeightInitKind::Seeded => WeightInit::Seeded { seed: self.seed },
        }
    }
}

// =============================================================================
// PIPELINE CONFIG
// =============================================================================

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub store: StoreConfig,
    pub labeler: LabelThresholds,
    pub features: FeatureConfig,
    pub propagator: PropagatorConfig,
    pub trainer: TrainerConfig,
    pub segmenter: SegmenterConfig,
}

impl PipelineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, CellGraphError> {
        let config: Self =
            toml::from_str(content).map_err(|e| CellGraphError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, CellGraphError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CellGraphError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Load from an optional file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, CellGraphError> {
        let mut config = match path {
            Some(path) => {
                tracing::info!(path = %path.display(), "loading configuration");
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Apply `CELLGRAPH_DB` if set.
    pub fn apply_env(&mut self) {
        if let Some(path) = std::env::var(DB_PATH_ENV).ok().filter(|p| !p.is_empty()) {
            self.store.path = PathBuf::from(path);
        }
    }

    /// Reject values no run can succeed with.
    pub fn validate(&self) -> Result<(), CellGraphError> {
        let trainer = &self.trainer;
        if !(trainer.test_fraction > 0.0 && trainer.test_fraction < 1.0) {
            return Err(CellGraphError::InvalidConfig(format!(
                "trainer.test_fraction must be in (0, 1), got {}",
                trainer.test_fraction
            )));
        }
        if trainer.epochs == 0 {
            return Err(CellGraphError::InvalidConfig(
                "trainer.epochs must be positive".to_string(),
            ));
        }
        if !(trainer.learning_rate > 0.0 && trainer.learning_rate.is_finite()) {
            return Err(CellGraphError::InvalidConfig(format!(
                "trainer.learning_rate must be positive, got {}",
                trainer.learning_rate
            )));
        }
        if self.segmenter.capacity == 0 {
            return Err(CellGraphError::InvalidConfig(
                "segmenter.capacity must be positive".to_string(),
            ));
        }
        if self.features.dim == 0 {
            return Err(CellGraphError::InvalidConfig(
                "features.dim must be positive".to_string(),
            ));
        }
        if !self.features.value.is_finite() {
            return Err(CellGraphError::InvalidConfig(
                "features.value must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
