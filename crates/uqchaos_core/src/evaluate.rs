//! Model evaluation over a node batch
//!
//! Each node is an independent task: build a model and a feature extractor,
//! run the model, extract every requested feature. Tasks run on a rayon pool
//! scoped to the batch. Results always come back in node order.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{EvaluationAbort, EvaluationError};
use crate::model::{
    DIRECT_COMPARISON, FeatureOutput, FeatureSpec, ModelSpec, NodeResult, ParameterAssignment,
};
use crate::sampling::NodeBatch;

/// Everything a worker needs to evaluate nodes
#[derive(Clone, Copy)]
pub struct Evaluator<'a> {
    pub model: &'a dyn ModelSpec,
    pub features: &'a dyn FeatureSpec,
    /// Requested features, without the direct comparison
    pub feature_names: &'a [String],
}

impl Evaluator<'_> {
    /// Evaluate one node
    pub fn evaluate_node(
        &self,
        node: usize,
        assignment: &ParameterAssignment,
    ) -> Result<NodeResult, EvaluationAbort> {
        let abort = |reason: String| EvaluationAbort { node, reason };

        let mut model = self.model.build();
        let output = match model.run(assignment) {
            Ok(output) => output,
            Err(EvaluationError::ResourceExhausted(reason)) => return Err(abort(reason)),
            Err(EvaluationError::Failed(reason)) => {
                warn!(node, model = self.model.name(), %reason, "Model run failed");
                return Ok(NodeResult::failed(
                    std::iter::once(DIRECT_COMPARISON)
                        .chain(self.feature_names.iter().map(String::as_str)),
                ));
            }
        };

        let mut result = NodeResult::default();
        if !self.feature_names.is_empty() {
            let mut extractor = self.features.build();
            for name in self.feature_names {
                let feature = match extractor.calculate(name, &output) {
                    Ok(feature) => feature,
                    Err(EvaluationError::ResourceExhausted(reason)) => return Err(abort(reason)),
                    Err(EvaluationError::Failed(reason)) => {
                        warn!(node, feature = %name, %reason, "Feature extraction failed");
                        FeatureOutput::unavailable()
                    }
                };
                result.insert(name.clone(), feature);
            }
        }
        result.insert(DIRECT_COMPARISON, FeatureOutput::from(output));

        Ok(result)
    }

    /// Evaluate every node of `batch` with at most `cpus` workers.
    ///
    /// Certain parameters are passed at their `nominal` values. The first
    /// resource exhaustion abandons the batch.
    pub fn evaluate_nodes(
        &self,
        batch: &NodeBatch,
        nominal: &ParameterAssignment,
        cpus: usize,
    ) -> Result<Vec<NodeResult>, EvaluationAbort> {
        let assignments: Vec<ParameterAssignment> = (0..batch.len())
            .map(|i| batch.assignment(i, nominal))
            .collect();
        let cpus = cpus.max(1);
        debug!(nodes = assignments.len(), cpus, "Evaluating node batch");

        self.run_tasks(&assignments, cpus)
    }

    #[cfg(feature = "parallel")]
    fn run_tasks(
        &self,
        assignments: &[ParameterAssignment],
        cpus: usize,
    ) -> Result<Vec<NodeResult>, EvaluationAbort> {
        if cpus > 1 {
            match rayon::ThreadPoolBuilder::new().num_threads(cpus).build() {
                Ok(pool) => {
                    return pool.install(|| {
                        assignments
                            .par_iter()
                            .enumerate()
                            .map(|(node, assignment)| self.evaluate_node(node, assignment))
                            .collect()
                    });
                }
                Err(e) => warn!(error = %e, "Could not build worker pool, evaluating sequentially"),
            }
        }
        self.run_sequential(assignments)
    }

    #[cfg(not(feature = "parallel"))]
    fn run_tasks(
        &self,
        assignments: &[ParameterAssignment],
        _cpus: usize,
    ) -> Result<Vec<NodeResult>, EvaluationAbort> {
        self.run_sequential(assignments)
    }

    fn run_sequential(
        &self,
        assignments: &[ParameterAssignment],
    ) -> Result<Vec<NodeResult>, EvaluationAbort> {
        assignments
            .iter()
            .enumerate()
            .map(|(node, assignment)| self.evaluate_node(node, assignment))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SamplingScheme;
    use crate::distribution::JointDistribution;
    use crate::features::SeriesFeatures;
    use crate::model::{
        FeatureValue, FnModel, Marginal, ModelOutput, Parameter, ParameterSet, RunTarget,
    };
    use crate::sampling::sample_nodes;
    use rand::SeedableRng;

    fn batch(params: &ParameterSet, count: usize) -> NodeBatch {
        let joint = JointDistribution::build(params, &RunTarget::All, false).unwrap();
        sample_nodes(
            &joint,
            count,
            SamplingScheme::Hammersley,
            &mut rand::rngs::SmallRng::seed_from_u64(0),
        )
    }

    fn params() -> ParameterSet {
        ParameterSet::new(vec![
            Parameter::uncertain("a", 0.5, Marginal::Uniform { min: 0.0, max: 1.0 }),
            Parameter::new("offset", 10.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_fixed_parameters_reach_model() {
        let model = FnModel::new("sum", |p: &ParameterAssignment| {
            Ok(ModelOutput::scalar(
                p.get("a").unwrap_or_default() + p.get("offset").unwrap_or_default(),
            ))
        });
        let params = params();
        let evaluator = Evaluator {
            model: &model,
            features: &SeriesFeatures,
            feature_names: &[],
        };

        let results = evaluator
            .evaluate_nodes(&batch(&params, 4), &params.nominal(), 1)
            .unwrap();
        for result in results {
            let Some(FeatureValue::Scalar(x)) = &result.get(DIRECT_COMPARISON).unwrap().value
            else {
                panic!("expected scalar output");
            };
            assert!((10.0..11.0).contains(x));
        }
    }

    #[test]
    fn test_worker_count_keeps_node_order() {
        let model = FnModel::new("ramp", |p: &ParameterAssignment| {
            let a = p.get("a").unwrap_or_default();
            let time: Vec<f64> = (0..8).map(f64::from).collect();
            let values = time.iter().map(|t| a * t + t * t).collect();
            Ok(ModelOutput::series(time, values))
        });
        let params = params();
        let names: Vec<String> = SeriesFeatures::NAMES.iter().map(|n| n.to_string()).collect();
        let evaluator = Evaluator {
            model: &model,
            features: &SeriesFeatures,
            feature_names: &names,
        };
        let batch = batch(&params, 40);

        let sequential = evaluator.evaluate_nodes(&batch, &params.nominal(), 1).unwrap();
        let parallel = evaluator.evaluate_nodes(&batch, &params.nominal(), 4).unwrap();

        assert_eq!(sequential.len(), 40);
        assert_eq!(parallel.len(), 40);
        for (node, (one, four)) in sequential.iter().zip(&parallel).enumerate() {
            for name in names.iter().map(String::as_str).chain([DIRECT_COMPARISON]) {
                let (one, four) = (one.get(name).unwrap(), four.get(name).unwrap());
                assert_eq!(one.time, four.time, "node {node} feature {name}");
                assert_eq!(one.value, four.value, "node {node} feature {name}");
            }
        }
        // Node order follows the batch: `a` grows along Hammersley's first coordinate
        let last = |r: &NodeResult| r.get("final_value").unwrap().value.clone();
        assert!(matches!(
            (last(&parallel[0]), last(&parallel[39])),
            (Some(FeatureValue::Scalar(x)), Some(FeatureValue::Scalar(y))) if x < y
        ));
    }

    #[test]
    fn test_failed_model_masks_every_feature() {
        let model = FnModel::new("flaky", |p: &ParameterAssignment| {
            if p.get("a").unwrap_or_default() > 0.5 {
                Err(EvaluationError::Failed("diverged".into()))
            } else {
                Ok(ModelOutput::series(vec![0.0, 1.0], vec![1.0, 2.0]))
            }
        });
        let params = params();
        let names = vec!["mean".to_string()];
        let evaluator = Evaluator {
            model: &model,
            features: &SeriesFeatures,
            feature_names: &names,
        };

        let results = evaluator
            .evaluate_nodes(&batch(&params, 4), &params.nominal(), 1)
            .unwrap();
        // Hammersley nodes are 0.2, 0.4, 0.6, 0.8
        let available: Vec<bool> = results
            .iter()
            .map(|r| r.get("mean").unwrap().is_available())
            .collect();
        assert_eq!(available, vec![true, true, false, false]);
        assert!(!results[3].get(DIRECT_COMPARISON).unwrap().is_available());
    }

    #[test]
    fn test_resource_exhaustion_aborts() {
        let model = FnModel::new("hungry", |p: &ParameterAssignment| {
            if p.get("a").unwrap_or_default() > 0.7 {
                Err(EvaluationError::ResourceExhausted("out of memory".into()))
            } else {
                Ok(ModelOutput::scalar(1.0))
            }
        });
        let params = params();
        let evaluator = Evaluator {
            model: &model,
            features: &SeriesFeatures,
            feature_names: &[],
        };

        let abort = evaluator
            .evaluate_nodes(&batch(&params, 4), &params.nominal(), 1)
            .unwrap_err();
        assert_eq!(abort.node, 3);
    }
}
