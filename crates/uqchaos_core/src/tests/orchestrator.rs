//! Run entry points and collaborator handoff
//!
//! These tests verify:
//! - Unavailable features are masked out of the fit
//! - Aborted runs are reported and skipped by persistence
//! - Single-parameter runs carry no sensitivity and use per-parameter names
//! - Configuration errors surface before any model evaluation

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{MemoryStore, linear_model, value};
use crate::config::UncertaintyBuilder;
use crate::error::{AnalysisError, CollaboratorError, ConfigError, EvaluationError};
use crate::model::{
    CompletedRun, DIRECT_COMPARISON, FeatureOutput, FeatureSpec, Features, FnModel, Marginal,
    ModelOutput, ParameterAssignment, ResultStore, RunOutcome,
};

fn unit() -> Marginal {
    Marginal::Uniform { min: 0.0, max: 1.0 }
}

/// Feature library whose `threshold` feature only exists for outputs below 1.5
struct Thresholded;

impl FeatureSpec for Thresholded {
    fn implemented_features(&self) -> Vec<String> {
        vec!["threshold".to_string()]
    }

    fn build(&self) -> Box<dyn Features + '_> {
        Box::new(Thresholded)
    }
}

impl Features for Thresholded {
    fn calculate(
        &mut self,
        _name: &str,
        output: &ModelOutput,
    ) -> Result<FeatureOutput, EvaluationError> {
        let x = output.value.flatten()[0];
        Ok(if x < 1.5 {
            FeatureOutput::scalar(x)
        } else {
            FeatureOutput::unavailable()
        })
    }
}

#[test]
fn test_unavailable_feature_is_masked() {
    let analysis = UncertaintyBuilder::new(linear_model())
        .uncertain("a", 0.5, unit())
        .uncertain("b", 0.5, unit())
        .feature_library(Thresholded)
        .all_features()
        .pc_mc_samples(1_000)
        .seed(6)
        .build()
        .unwrap();

    let outcome = analysis.all_parameters().unwrap();
    let bundle = outcome.statistics().unwrap();

    let direct = bundle.get(DIRECT_COMPARISON).unwrap();
    assert_eq!(direct.nodes_used, 21);
    assert_eq!(direct.nodes_excluded, 0);

    let feature = bundle.get("threshold").unwrap();
    assert!(feature.nodes_excluded > 0);
    assert_eq!(feature.nodes_used + feature.nodes_excluded, 21);
    assert!(feature.mean[0].is_finite());
    assert_eq!(feature.sensitivity.as_ref().unwrap().len(), 2);
}

#[test]
fn test_feature_missing_everywhere_is_skipped() {
    let model = FnModel::new("large", |p: &ParameterAssignment| {
        Ok(ModelOutput::scalar(10.0 + value(p, "a")))
    });
    let analysis = UncertaintyBuilder::new(model)
        .uncertain("a", 0.5, unit())
        .feature_library(Thresholded)
        .all_features()
        .pc_mc_samples(1_000)
        .seed(6)
        .build()
        .unwrap();

    let outcome = analysis.all_parameters().unwrap();
    let bundle = outcome.statistics().unwrap();
    assert!(bundle.get("threshold").is_none());
    assert!(bundle.get(DIRECT_COMPARISON).is_some());
}

#[test]
fn test_aborted_parameter_does_not_stop_batch() {
    let store = Arc::new(MemoryStore::default());
    let model = FnModel::new("fragile", |p: &ParameterAssignment| {
        let a = value(p, "a");
        if a > 0.85 {
            return Err(EvaluationError::ResourceExhausted("killed".into()));
        }
        Ok(ModelOutput::scalar(a + value(p, "b")))
    });
    let analysis = UncertaintyBuilder::new(model)
        .uncertain("a", 0.5, unit())
        .uncertain("b", 0.5, unit())
        .output_name("fragile")
        .shared_store(store.clone())
        .pc_mc_samples(1_000)
        .seed(1)
        .build()
        .unwrap();

    let outcomes = analysis.single_parameters().unwrap();
    assert_eq!(outcomes.len(), 2);

    // Hammersley nodes for a reach 0.9
    assert_eq!(outcomes[0].0, "a");
    assert!(matches!(outcomes[0].1, RunOutcome::Aborted { .. }));
    assert!(outcomes[1].1.is_completed());

    assert_eq!(store.names(), vec!["fragile_single-parameter-b"]);
}

#[test]
fn test_single_parameter_runs_have_no_sensitivity() {
    let store = Arc::new(MemoryStore::default());
    let analysis = UncertaintyBuilder::new(linear_model())
        .uncertain("a", 0.5, unit())
        .uncertain("b", 0.5, unit())
        .output_name("linear")
        .shared_store(store.clone())
        .pc_mc_samples(1_000)
        .seed(1)
        .build()
        .unwrap();

    let outcomes = analysis.single_parameters().unwrap();
    for (name, outcome) in &outcomes {
        let run = outcome.completed().unwrap();
        assert_eq!(run.metadata.uncertain_parameters, vec![name.clone()]);
        assert!(!run.statistics.has_sensitivity());
        assert!(run.statistics.sensitivity_ranking.is_empty());
    }

    // Varying b alone: a + 2b with b ~ U(0, 1) and a = 0.5
    let b = outcomes[1].1.statistics().unwrap();
    let direct = b.get(DIRECT_COMPARISON).unwrap();
    assert!((direct.mean[0] - 1.5).abs() < 1e-9);
    assert!((direct.variance[0] - 4.0 / 12.0).abs() < 1e-9);

    assert_eq!(
        store.names(),
        vec!["linear_single-parameter-a", "linear_single-parameter-b"]
    );
}

#[test]
fn test_all_parameters_saved_and_plotted() {
    let store = Arc::new(MemoryStore::default());
    let plots = MemoryStore::default();
    let analysis = UncertaintyBuilder::new(linear_model())
        .uncertain("a", 0.5, unit())
        .uncertain("b", 0.5, unit())
        .shared_store(store.clone())
        .plotter(plots)
        .pc_mc_samples(1_000)
        .seed(1)
        .build()
        .unwrap();

    let outcome = analysis.all_parameters().unwrap();
    assert!(outcome.is_completed());
    assert_eq!(store.names(), vec!["linear"]);

    let runs = store.runs.lock().unwrap();
    let saved = &runs[0].1;
    assert_eq!(saved.metadata.name, "linear");
    assert!(saved.metadata.elapsed_seconds >= 0.0);
    assert_eq!(Some(&saved.statistics), outcome.statistics());
}

struct FailingStore;

impl ResultStore for FailingStore {
    fn save(&self, _name: &str, _run: &CompletedRun) -> Result<(), CollaboratorError> {
        Err("disk full".into())
    }
}

#[test]
fn test_persistence_failure_is_reported() {
    let analysis = UncertaintyBuilder::new(linear_model())
        .uncertain("a", 0.5, unit())
        .store(FailingStore)
        .pc_mc_samples(1_000)
        .seed(1)
        .build()
        .unwrap();

    assert!(matches!(
        analysis.all_parameters(),
        Err(AnalysisError::Persistence(_))
    ));
}

#[test]
fn test_config_error_before_evaluation() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);
    let model = FnModel::new("counted", |_: &ParameterAssignment| {
        CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(ModelOutput::scalar(1.0))
    });
    let analysis = UncertaintyBuilder::new(model)
        .uncertain("a", 0.5, unit())
        .fixed("b", 1.0)
        .build()
        .unwrap();

    let err = analysis
        .analyze(
            crate::model::RunTarget::Single("b".to_string()),
            crate::model::Method::PolynomialChaos,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::Config(ConfigError::MissingDistribution(_))
    ));
    assert_eq!(CALLS.load(Ordering::SeqCst), 0);
}

#[test]
fn test_no_uncertain_parameters() {
    let analysis = UncertaintyBuilder::new(linear_model())
        .fixed("a", 0.5)
        .build()
        .unwrap();

    assert!(matches!(
        analysis.single_parameters(),
        Err(AnalysisError::Config(ConfigError::NoUncertainParameters))
    ));
    assert!(matches!(
        analysis.all_parameters(),
        Err(AnalysisError::Config(ConfigError::NoUncertainParameters))
    ));
}
