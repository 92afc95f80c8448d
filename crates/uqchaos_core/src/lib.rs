//! Uncertainty quantification and sensitivity analysis library
//!
//! This crate propagates uncertainty in model parameters to model outputs.
//! It supports:
//! - Polynomial chaos expansions fitted by regression on sampled nodes
//! - Plain Monte Carlo estimates over the same pipeline
//! - Dependent parameters through a Rosenblatt (Gaussian copula) transform
//! - Time-series outputs on node-dependent time axes
//! - Total Sobol sensitivity indices and a parameter sensitivity ranking
//! - Single-parameter and all-parameter runs
//!
//! # Builder DSL
//!
//! Use the fluent builder API for ergonomic analysis setup:
//!
//! ```ignore
//! use uqchaos_core::{FnModel, Marginal, ModelOutput, UncertaintyBuilder};
//!
//! let analysis = UncertaintyBuilder::new(FnModel::new("linear", |p| {
//!         let a = p.get("a").unwrap_or_default();
//!         let b = p.get("b").unwrap_or_default();
//!         Ok(ModelOutput::scalar(a + 2.0 * b))
//!     }))
//!     .uncertain("a", 0.5, Marginal::Uniform { min: 0.0, max: 1.0 })
//!     .uncertain("b", 0.5, Marginal::Uniform { min: 0.0, max: 1.0 })
//!     .seed(1)
//!     .build()?;
//!
//! let outcome = analysis.all_parameters()?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod analysis;
pub mod distribution;
pub mod error;
pub mod evaluate;
pub mod features;
pub mod polynomial;
pub mod reconcile;
pub mod sampling;
pub mod statistics;
pub mod surrogate;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod config;
pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use analysis::{RunStage, UncertaintyEstimation};
pub use config::{AnalysisConfig, UncertaintyBuilder};
pub use features::{FeatureSelection, SeriesFeatures};
pub use model::{
    FnModel, Marginal, Method, ModelOutput, Parameter, ParameterSet, RunOutcome, RunTarget,
};
