//! Uncertainty Builder
//!
//! The UncertaintyBuilder provides a fluent API for setting up an analysis:
//! parameters and their distributions, the model, the feature library and
//! every numerical option.
//!
//! # Example
//!
//! ```ignore
//! use uqchaos_core::config::UncertaintyBuilder;
//! use uqchaos_core::model::{FnModel, Marginal, ModelOutput};
//!
//! let analysis = UncertaintyBuilder::new(FnModel::new("decay", |p| {
//!         let k = p.get("k").unwrap_or_default();
//!         let t: Vec<f64> = (0..50).map(|i| i as f64 * 0.1).collect();
//!         let u = t.iter().map(|t| (-k * t).exp()).collect();
//!         Ok(ModelOutput::series(t, u))
//!     }))
//!     .uncertain("k", 1.0, Marginal::uniform_interval(1.0, 0.2))
//!     .fixed("u0", 1.0)
//!     .all_features()
//!     .polynomial_order(4)
//!     .seed(7)
//!     .output_name("decay")
//!     .build()?;
//!
//! let outcome = analysis.all_parameters()?;
//! ```

use std::sync::Arc;

use super::{AnalysisConfig, InterpolationMode, RegressionRule, SamplingScheme};
use crate::analysis::UncertaintyEstimation;
use crate::error::ConfigError;
use crate::features::{FeatureSelection, SeriesFeatures};
use crate::model::{
    FeatureSpec, Marginal, ModelSpec, Parameter, ParameterSet, Plotter, ResultStore,
};

/// Builder for an [`UncertaintyEstimation`]
pub struct UncertaintyBuilder {
    model: Arc<dyn ModelSpec>,
    parameters: Vec<Parameter>,
    correlation: Option<Vec<Vec<f64>>>,
    feature_library: Arc<dyn FeatureSpec>,
    features: FeatureSelection,
    config: AnalysisConfig,
    output_name: Option<String>,
    store: Option<Arc<dyn ResultStore>>,
    plotter: Option<Arc<dyn Plotter>>,
}

impl UncertaintyBuilder {
    /// Start a builder around `model`, with [`SeriesFeatures`] as the feature library
    #[must_use]
    pub fn new(model: impl ModelSpec + 'static) -> Self {
        Self::from_arc(Arc::new(model))
    }

    #[must_use]
    pub fn from_arc(model: Arc<dyn ModelSpec>) -> Self {
        Self {
            model,
            parameters: Vec::new(),
            correlation: None,
            feature_library: Arc::new(SeriesFeatures),
            features: FeatureSelection::None,
            config: AnalysisConfig::default(),
            output_name: None,
            store: None,
            plotter: None,
        }
    }

    // =========================================================================
    // Parameters
    // =========================================================================

    #[must_use]
    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    #[must_use]
    pub fn parameters(mut self, parameters: ParameterSet) -> Self {
        self.parameters.extend(parameters.parameters);
        if parameters.correlation.is_some() {
            self.correlation = parameters.correlation;
        }
        self
    }

    /// Add a parameter that varies with `distribution`
    #[must_use]
    pub fn uncertain(self, name: impl Into<String>, value: f64, distribution: Marginal) -> Self {
        self.parameter(Parameter::uncertain(name, value, distribution))
    }

    /// Add a parameter held at `value`
    #[must_use]
    pub fn fixed(self, name: impl Into<String>, value: f64) -> Self {
        self.parameter(Parameter::new(name, value))
    }

    /// Correlation matrix over the uncertain parameters, in the order they were added
    #[must_use]
    pub fn correlation(mut self, matrix: Vec<Vec<f64>>) -> Self {
        self.correlation = Some(matrix);
        self
    }

    // =========================================================================
    // Features
    // =========================================================================

    #[must_use]
    pub fn feature_library(mut self, library: impl FeatureSpec + 'static) -> Self {
        self.feature_library = Arc::new(library);
        self
    }

    #[must_use]
    pub fn features(mut self, selection: FeatureSelection) -> Self {
        self.features = selection;
        self
    }

    /// Compute every feature of the library
    #[must_use]
    pub fn all_features(self) -> Self {
        self.features(FeatureSelection::All)
    }

    /// Compute the named features
    #[must_use]
    pub fn feature_list<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features(FeatureSelection::Named(
            names.into_iter().map(Into::into).collect(),
        ))
    }

    // =========================================================================
    // Numerical options
    // =========================================================================

    #[must_use]
    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn polynomial_order(mut self, order: usize) -> Self {
        self.config.polynomial_order = order;
        self
    }

    #[must_use]
    pub fn mc_samples(mut self, samples: usize) -> Self {
        self.config.mc_samples = samples;
        self
    }

    #[must_use]
    pub fn pc_samples(mut self, samples: usize) -> Self {
        self.config.pc_samples = Some(samples);
        self
    }

    #[must_use]
    pub fn pc_mc_samples(mut self, samples: usize) -> Self {
        self.config.pc_mc_samples = samples;
        self
    }

    #[must_use]
    pub fn cpus(mut self, cpus: usize) -> Self {
        self.config.cpus = cpus;
        self
    }

    #[must_use]
    pub fn rosenblatt(mut self, enabled: bool) -> Self {
        self.config.rosenblatt = enabled;
        self
    }

    #[must_use]
    pub fn interpolation(mut self, mode: InterpolationMode) -> Self {
        self.config.interpolation = mode;
        self
    }

    #[must_use]
    pub fn sampling(mut self, scheme: SamplingScheme) -> Self {
        self.config.sampling = scheme;
        self
    }

    #[must_use]
    pub fn regression(mut self, rule: RegressionRule) -> Self {
        self.config.regression = rule;
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    // =========================================================================
    // Output
    // =========================================================================

    /// Base name of saved results; defaults to the model's name
    #[must_use]
    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn store(mut self, store: impl ResultStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    #[must_use]
    pub fn shared_store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn plotter(mut self, plotter: impl Plotter + 'static) -> Self {
        self.plotter = Some(Arc::new(plotter));
        self
    }

    /// Validate and assemble the analysis
    pub fn build(self) -> Result<UncertaintyEstimation, ConfigError> {
        let mut parameters = ParameterSet::new(self.parameters)?;
        parameters.correlation = self.correlation;
        self.config.validate()?;
        self.features.resolve(self.feature_library.as_ref())?;

        let output_name = self
            .output_name
            .unwrap_or_else(|| self.model.name().to_string());

        Ok(UncertaintyEstimation {
            parameters,
            model: self.model,
            feature_library: self.feature_library,
            features: self.features,
            config: self.config,
            output_name,
            store: self.store,
            plotter: self.plotter,
        })
    }
}
