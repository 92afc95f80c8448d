//! Analysis configuration
//!
//! [`AnalysisConfig`] collects every numerical knob of a run. It is plain
//! serde data so that it can be embedded in run files; use
//! [`UncertaintyBuilder`] for ergonomic setup in code.

mod builder;

pub use builder::UncertaintyBuilder;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How per-node time axes are merged into one shared axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMode {
    /// Sorted union of every node's axis
    Union,
    /// Axis of the node with the most time points
    #[default]
    MaxLength,
}

/// How sample nodes are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SamplingScheme {
    /// Pseudo-random draws from a seeded generator
    Random,
    Halton,
    #[default]
    Hammersley,
    LatinHypercube,
}

/// Regression used to fit the polynomial chaos coefficients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegressionRule {
    /// Ordinary least squares through an SVD
    #[default]
    LeastSquares,
    /// Ridge regression with penalty `alpha`
    Tikhonov { alpha: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Total order of the polynomial chaos basis
    pub polynomial_order: usize,
    /// Model evaluations for the Monte Carlo method
    pub mc_samples: usize,
    /// Regression nodes for polynomial chaos; `None` uses `2 * basis_size + 1`
    pub pc_samples: Option<usize>,
    /// Surrogate evaluations used to estimate percentiles
    pub pc_mc_samples: usize,
    /// Worker threads for model evaluation, at least one is always used
    pub cpus: usize,
    /// Expand in an independent standard-normal space through the Rosenblatt transform
    pub rosenblatt: bool,
    pub interpolation: InterpolationMode,
    pub sampling: SamplingScheme,
    pub regression: RegressionRule,
    /// Seed for the random schemes (None = random each run)
    pub seed: Option<u64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            polynomial_order: 3,
            mc_samples: 1_000,
            pc_samples: None,
            pc_mc_samples: 100_000,
            cpus: default_cpus(),
            rosenblatt: false,
            interpolation: InterpolationMode::default(),
            sampling: SamplingScheme::default(),
            regression: RegressionRule::default(),
            seed: None,
        }
    }
}

/// Number of available CPUs, at least one
pub fn default_cpus() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mc_samples == 0 {
            return Err(ConfigError::InvalidSetting {
                setting: "mc_samples",
                reason: "must be positive".to_string(),
            });
        }
        if self.pc_mc_samples == 0 {
            return Err(ConfigError::InvalidSetting {
                setting: "pc_mc_samples",
                reason: "must be positive".to_string(),
            });
        }
        if self.pc_samples == Some(0) {
            return Err(ConfigError::InvalidSetting {
                setting: "pc_samples",
                reason: "must be positive".to_string(),
            });
        }
        if let RegressionRule::Tikhonov { alpha } = self.regression
            && !(alpha.is_finite() && alpha >= 0.0)
        {
            return Err(ConfigError::InvalidSetting {
                setting: "regression",
                reason: format!("tikhonov alpha must be finite and non-negative, got {alpha}"),
            });
        }
        Ok(())
    }

    /// Node count for a polynomial chaos run over a basis of `basis_size` terms
    pub fn pc_node_count(&self, basis_size: usize) -> usize {
        self.pc_samples.unwrap_or(2 * basis_size + 1)
    }
}
