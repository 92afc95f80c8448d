//! Run orchestration
//!
//! [`UncertaintyEstimation`] ties the pipeline together. Every run builds a
//! fresh [`RunContext`], walks it through the stages below and hands the
//! completed statistics to the configured store and plotter.
//!
//! ```text
//! Reset → DistributionBuilt → NodesSampled → Evaluated → Reconciled → Fitted → StatisticsComputed
//!                                                │
//!                                                └→ Aborted
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use jiff::Timestamp;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::{debug, error, info, warn};

use crate::config::AnalysisConfig;
use crate::distribution::JointDistribution;
use crate::error::AnalysisError;
use crate::evaluate::Evaluator;
use crate::features::FeatureSelection;
use crate::model::{
    CompletedRun, DIRECT_COMPARISON, FeatureSpec, Method, ModelSpec, ParameterSet, Plotter,
    ResultStore, RunMetadata, RunOutcome, RunTarget, StatisticsBundle,
};
use crate::reconcile::{ReconciledFeature, reconcile};
use crate::sampling::sample_nodes;
use crate::statistics::{MonteCarlo, PolynomialChaos, UncertaintyMethod, sensitivity_ranking};

/// Stage of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunStage {
    Reset,
    DistributionBuilt,
    NodesSampled,
    Evaluated,
    Reconciled,
    Fitted,
    StatisticsComputed,
    Aborted,
}

impl RunStage {
    /// Stage that follows `self` on success
    pub fn next(self) -> Option<RunStage> {
        match self {
            RunStage::Reset => Some(RunStage::DistributionBuilt),
            RunStage::DistributionBuilt => Some(RunStage::NodesSampled),
            RunStage::NodesSampled => Some(RunStage::Evaluated),
            RunStage::Evaluated => Some(RunStage::Reconciled),
            RunStage::Reconciled => Some(RunStage::Fitted),
            RunStage::Fitted => Some(RunStage::StatisticsComputed),
            RunStage::StatisticsComputed | RunStage::Aborted => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

/// State owned by exactly one run
#[derive(Debug)]
pub struct RunContext {
    target: RunTarget,
    method: Method,
    stage: RunStage,
    started_at: Timestamp,
}

impl RunContext {
    pub fn new(target: RunTarget, method: Method) -> Self {
        Self {
            target,
            method,
            stage: RunStage::Reset,
            started_at: Timestamp::now(),
        }
    }

    pub fn stage(&self) -> RunStage {
        self.stage
    }

    pub fn target(&self) -> &RunTarget {
        &self.target
    }

    fn advance(&mut self) {
        if let Some(next) = self.stage.next() {
            debug!(from = ?self.stage, to = ?next, method = self.method.label(), "Run stage");
            self.stage = next;
        }
    }

    fn abort(&mut self) {
        self.stage = RunStage::Aborted;
    }

    fn elapsed_seconds(&self) -> f64 {
        Timestamp::now()
            .duration_since(self.started_at)
            .as_secs_f64()
    }
}

/// Uncertainty quantification and sensitivity analysis of one model
pub struct UncertaintyEstimation {
    pub(crate) parameters: ParameterSet,
    pub(crate) model: Arc<dyn ModelSpec>,
    pub(crate) feature_library: Arc<dyn FeatureSpec>,
    pub(crate) features: FeatureSelection,
    pub(crate) config: AnalysisConfig,
    pub(crate) output_name: String,
    pub(crate) store: Option<Arc<dyn ResultStore>>,
    pub(crate) plotter: Option<Arc<dyn Plotter>>,
}

impl UncertaintyEstimation {
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// Name a run's results are saved and plotted under
    pub fn run_name(&self, target: &RunTarget) -> String {
        match target {
            RunTarget::All => self.output_name.clone(),
            RunTarget::Single(name) => format!("{}_single-parameter-{name}", self.output_name),
        }
    }

    /// Polynomial chaos over every uncertain parameter jointly
    pub fn all_parameters(&self) -> Result<RunOutcome, AnalysisError> {
        self.analyze(RunTarget::All, Method::PolynomialChaos)
    }

    /// Monte Carlo over every uncertain parameter jointly
    pub fn all_parameters_mc(&self) -> Result<RunOutcome, AnalysisError> {
        self.analyze(RunTarget::All, Method::MonteCarlo)
    }

    /// One polynomial chaos run per uncertain parameter
    pub fn single_parameters(&self) -> Result<Vec<(String, RunOutcome)>, AnalysisError> {
        self.each_parameter(Method::PolynomialChaos)
    }

    /// One Monte Carlo run per uncertain parameter
    pub fn single_parameters_mc(&self) -> Result<Vec<(String, RunOutcome)>, AnalysisError> {
        self.each_parameter(Method::MonteCarlo)
    }

    fn each_parameter(&self, method: Method) -> Result<Vec<(String, RunOutcome)>, AnalysisError> {
        let names = self.parameters.uncertain_names();
        if names.is_empty() {
            return Err(crate::error::ConfigError::NoUncertainParameters.into());
        }

        let mut outcomes = Vec::with_capacity(names.len());
        for name in names {
            let outcome = self.analyze(RunTarget::Single(name.clone()), method)?;
            outcomes.push((name, outcome));
        }
        Ok(outcomes)
    }

    /// Run one analysis.
    ///
    /// Configuration errors are returned before any model evaluation. An
    /// abandoned evaluation batch yields [`RunOutcome::Aborted`] and nothing
    /// is persisted.
    pub fn analyze(&self, target: RunTarget, method: Method) -> Result<RunOutcome, AnalysisError> {
        let mut context = RunContext::new(target, method);
        let run_name = self.run_name(context.target());
        info!(run = %run_name, method = method.label(), "Starting analysis");

        self.config.validate()?;
        let feature_names = self.features.resolve(self.feature_library.as_ref())?;

        let rosenblatt = self.config.rosenblatt
            || (method == Method::MonteCarlo && self.parameters.correlation.is_some());
        let joint = JointDistribution::build(&self.parameters, context.target(), rosenblatt)?;
        context.advance();

        let strategy: Box<dyn UncertaintyMethod + '_> = match method {
            Method::PolynomialChaos => Box::new(PolynomialChaos::new(&joint, &self.config)),
            Method::MonteCarlo => Box::new(MonteCarlo::new(self.config.mc_samples)),
        };

        let mut rng = match self.config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        let batch = sample_nodes(&joint, strategy.node_count(), self.config.sampling, &mut rng);
        context.advance();
        info!(run = %run_name, nodes = batch.len(), parameters = ?joint.names(), "Sampled nodes");

        let evaluator = Evaluator {
            model: self.model.as_ref(),
            features: self.feature_library.as_ref(),
            feature_names: &feature_names,
        };
        let results =
            match evaluator.evaluate_nodes(&batch, &self.parameters.nominal(), self.config.cpus) {
                Ok(results) => results,
                Err(abort) => {
                    context.abort();
                    error!(run = %run_name, %abort, "Evaluation aborted, nothing saved");
                    return Ok(RunOutcome::Aborted {
                        target: context.target,
                        reason: abort.to_string(),
                    });
                }
            };
        context.advance();

        let reconciled: Vec<ReconciledFeature> = std::iter::once(DIRECT_COMPARISON)
            .chain(feature_names.iter().map(String::as_str))
            .filter_map(|name| {
                let feature = reconcile(name, &results, self.config.interpolation);
                if feature.is_none() {
                    warn!(run = %run_name, feature = name, "No node produced a value, feature skipped");
                }
                feature
            })
            .collect();
        context.advance();

        let mut surrogates = Vec::with_capacity(reconciled.len());
        for feature in &reconciled {
            if !feature.mask.all() {
                warn!(
                    run = %run_name,
                    feature = %feature.name,
                    excluded = feature.mask.excluded_count(),
                    "Feature does not yield results for all parameter combinations"
                );
            }
            surrogates.push(strategy.fit(feature, &batch)?);
        }
        context.advance();

        let features: BTreeMap<String, _> = reconciled
            .iter()
            .zip(&surrogates)
            .map(|(feature, surrogate)| {
                (
                    feature.name.clone(),
                    strategy.statistics(feature, surrogate, &mut rng),
                )
            })
            .collect();

        let sensitivity_ranking = features
            .get(DIRECT_COMPARISON)
            .and_then(|stats| stats.sensitivity.as_ref())
            .map(|sensitivity| sensitivity_ranking(joint.names(), sensitivity))
            .unwrap_or_default();
        context.advance();

        let run = CompletedRun {
            metadata: RunMetadata {
                name: run_name.clone(),
                method,
                uncertain_parameters: joint.names().to_vec(),
                features: feature_names,
                node_count: batch.len(),
                started_at: context.started_at,
                elapsed_seconds: context.elapsed_seconds(),
            },
            statistics: StatisticsBundle {
                features,
                sensitivity_ranking,
            },
        };
        info!(
            run = %run_name,
            stage = ?context.stage(),
            elapsed = run.metadata.elapsed_seconds,
            "Analysis complete"
        );

        if let Some(store) = &self.store {
            store
                .save(&run_name, &run)
                .map_err(AnalysisError::Persistence)?;
        }
        if let Some(plotter) = &self.plotter {
            plotter
                .plot(&run_name, &run)
                .map_err(AnalysisError::Plotting)?;
        }

        Ok(RunOutcome::Completed(Box::new(run)))
    }
}
