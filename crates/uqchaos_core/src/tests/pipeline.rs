//! Polynomial chaos runs end to end
//!
//! These tests verify:
//! - Exact moments and Sobol indices for a linear model
//! - Rosenblatt runs reproduce the moments of the input distribution
//! - Default node counts and sensitivity shapes
//! - Reproducibility across reruns and worker counts

use super::{linear_model, linear_series_model, value};
use crate::config::UncertaintyBuilder;
use crate::error::{AnalysisError, ConfigError};
use crate::model::{DIRECT_COMPARISON, FnModel, Marginal, Method, ModelOutput, RunTarget};
use crate::polynomial::basis_size;

fn unit() -> Marginal {
    Marginal::Uniform { min: 0.0, max: 1.0 }
}

/// Linear model on two independent uniforms has closed-form statistics
#[test]
fn test_linear_model_statistics() {
    let analysis = UncertaintyBuilder::new(linear_model())
        .uncertain("a", 0.5, unit())
        .uncertain("b", 0.5, unit())
        .pc_mc_samples(20_000)
        .seed(11)
        .build()
        .unwrap();

    let outcome = analysis.all_parameters().unwrap();
    let run = outcome.completed().expect("run should complete");
    let stats = run.statistics.get(DIRECT_COMPARISON).unwrap();

    assert!((stats.mean[0] - 1.5).abs() < 1e-9, "mean {}", stats.mean[0]);
    assert!(
        (stats.variance[0] - 5.0 / 12.0).abs() < 1e-9,
        "variance {}",
        stats.variance[0]
    );

    let sensitivity = stats.sensitivity.as_ref().unwrap();
    assert_eq!(sensitivity.len(), 2);
    assert!((sensitivity[0][0] - 0.2).abs() < 1e-9);
    assert!((sensitivity[1][0] - 0.8).abs() < 1e-9);

    // a + 2b on the unit square: 5th percentile is sqrt(0.2) ≈ 0.447
    assert!((stats.p_05[0] - 0.2f64.sqrt()).abs() < 0.03, "p_05 {}", stats.p_05[0]);
    assert!((stats.p_95[0] - (3.0 - 0.2f64.sqrt())).abs() < 0.03);

    let ranking = &run.statistics.sensitivity_ranking;
    assert!((ranking[0].share - 0.2).abs() < 1e-9);
    assert!((ranking[1].share - 0.8).abs() < 1e-9);
}

/// The Rosenblatt transform keeps the exact mean and variance of a normal input
#[test]
fn test_rosenblatt_normal_moments() {
    let model = FnModel::new("identity", |p: &crate::model::ParameterAssignment| {
        Ok(ModelOutput::scalar(value(p, "x")))
    });
    let analysis = UncertaintyBuilder::new(model)
        .uncertain(
            "x",
            5.0,
            Marginal::Normal {
                mean: 5.0,
                std_dev: 2.0,
            },
        )
        .rosenblatt(true)
        .pc_mc_samples(1_000)
        .seed(5)
        .build()
        .unwrap();

    let outcome = analysis.all_parameters().unwrap();
    let stats = outcome
        .statistics()
        .unwrap()
        .get(DIRECT_COMPARISON)
        .unwrap()
        .clone();

    assert!((stats.mean[0] - 5.0).abs() < 1e-6, "mean {}", stats.mean[0]);
    assert!((stats.variance[0] - 4.0).abs() < 1e-6, "variance {}", stats.variance[0]);
    // One parameter: no sensitivity
    assert!(stats.sensitivity.is_none());
}

/// Rosenblatt over non-normal marginals still recovers the input moments.
///
/// The uniform inverse CDF is not polynomial in the normal variable, so the
/// fit needs far more than the default `2 * basis + 1` nodes to settle.
#[test]
fn test_rosenblatt_uniform_moments() {
    let analysis = UncertaintyBuilder::new(linear_model())
        .uncertain("a", 0.5, unit())
        .uncertain("b", 0.5, unit())
        .rosenblatt(true)
        .polynomial_order(5)
        .pc_samples(4_000)
        .pc_mc_samples(1_000)
        .seed(3)
        .build()
        .unwrap();

    let outcome = analysis.all_parameters().unwrap();
    let stats = outcome.statistics().unwrap().get(DIRECT_COMPARISON).unwrap();

    assert!((stats.mean[0] - 1.5).abs() < 0.01, "mean {}", stats.mean[0]);
    assert!(
        (stats.variance[0] - 5.0 / 12.0).abs() < 0.01,
        "variance {}",
        stats.variance[0]
    );
}

/// Default node count is twice the basis size plus one, and every feature gets
/// a sensitivity row per parameter
#[test]
fn test_default_nodes_and_sensitivity_shapes() {
    let analysis = UncertaintyBuilder::new(linear_series_model())
        .uncertain("a", 0.5, unit())
        .uncertain("b", 0.5, unit())
        .all_features()
        .pc_mc_samples(1_000)
        .seed(2)
        .build()
        .unwrap();

    let outcome = analysis.all_parameters().unwrap();
    let run = outcome.completed().unwrap();

    assert_eq!(run.metadata.node_count, 2 * basis_size(3, 2) + 1);
    assert_eq!(run.metadata.node_count, 21);
    assert_eq!(run.metadata.uncertain_parameters, vec!["a", "b"]);

    let names: Vec<&str> = run.statistics.feature_names().collect();
    assert_eq!(names.len(), 6);
    for (name, stats) in &run.statistics.features {
        let sensitivity = stats.sensitivity.as_ref().unwrap();
        assert_eq!(sensitivity.len(), 2, "feature {name}");
        assert_eq!(stats.nodes_used, 21, "feature {name}");
        assert_eq!(stats.nodes_excluded, 0);
    }

    let direct = run.statistics.get(DIRECT_COMPARISON).unwrap();
    assert_eq!(direct.shape, vec![5]);
    assert_eq!(direct.mean.len(), 5);
    assert_eq!(direct.time.as_ref().unwrap().len(), 5);

    let total: f64 = run
        .statistics
        .sensitivity_ranking
        .iter()
        .map(|s| s.share)
        .sum();
    assert!((total - 1.0).abs() < 1e-12);
}

/// Rerunning the same analysis reproduces the same statistics
#[test]
fn test_rerun_is_reproducible() {
    let analysis = UncertaintyBuilder::new(linear_series_model())
        .uncertain("a", 0.5, unit())
        .uncertain("b", 0.5, Marginal::normal_interval(0.5, 0.2))
        .all_features()
        .pc_mc_samples(2_000)
        .seed(99)
        .build()
        .unwrap();

    let first = analysis.all_parameters().unwrap();
    let second = analysis.all_parameters().unwrap();
    assert_eq!(first.statistics(), second.statistics());
}

/// Results do not depend on the number of workers
#[test]
fn test_worker_count_does_not_change_results() {
    let build = |cpus| {
        UncertaintyBuilder::new(linear_series_model())
            .uncertain("a", 0.5, unit())
            .uncertain("b", 0.5, unit())
            .all_features()
            .pc_mc_samples(2_000)
            .cpus(cpus)
            .seed(4)
            .build()
            .unwrap()
    };

    let sequential = build(1).all_parameters().unwrap();
    let parallel = build(4).all_parameters().unwrap();
    assert_eq!(sequential.statistics(), parallel.statistics());
}

/// Correlated parameters need the transform in polynomial chaos runs
#[test]
fn test_correlation_without_transform_is_config_error() {
    let analysis = UncertaintyBuilder::new(linear_model())
        .uncertain("a", 0.5, unit())
        .uncertain("b", 0.5, unit())
        .correlation(vec![vec![1.0, 0.3], vec![0.3, 1.0]])
        .build()
        .unwrap();

    let err = analysis
        .analyze(RunTarget::All, Method::PolynomialChaos)
        .unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::Config(ConfigError::DependenceRequiresTransform)
    ));
}

/// Ridge regression still produces a usable expansion
#[test]
fn test_tikhonov_rule() {
    let analysis = UncertaintyBuilder::new(linear_model())
        .uncertain("a", 0.5, unit())
        .uncertain("b", 0.5, unit())
        .regression(crate::config::RegressionRule::Tikhonov { alpha: 1e-6 })
        .pc_mc_samples(1_000)
        .seed(8)
        .build()
        .unwrap();

    let outcome = analysis.all_parameters().unwrap();
    let stats = outcome.statistics().unwrap().get(DIRECT_COMPARISON).unwrap();
    assert!((stats.mean[0] - 1.5).abs() < 1e-3);
}

/// Long outputs and large resamples are evaluated in blocks; percentiles stay
/// consistent across block boundaries
#[test]
fn test_percentiles_across_output_blocks() {
    let model = FnModel::new("ramp", |p: &crate::model::ParameterAssignment| {
        let a = value(p, "a");
        let time: Vec<f64> = (0..100).map(f64::from).collect();
        let values = time.iter().map(|t| a * t).collect();
        Ok(ModelOutput::series(time, values))
    });
    let analysis = UncertaintyBuilder::new(model)
        .uncertain("a", 0.5, unit())
        .pc_mc_samples(20_000)
        .seed(12)
        .build()
        .unwrap();

    let outcome = analysis.all_parameters().unwrap();
    let stats = outcome.statistics().unwrap().get(DIRECT_COMPARISON).unwrap();

    assert_eq!(stats.p_05.len(), 100);
    assert_eq!(stats.p_95.len(), 100);
    for t in [1, 63, 64, 65, 99] {
        let time = t as f64;
        assert!((stats.p_05[t] - 0.05 * time).abs() < 0.01 * time, "p_05 at {t}");
        assert!((stats.p_95[t] - 0.95 * time).abs() < 0.01 * time, "p_95 at {t}");
    }
}
