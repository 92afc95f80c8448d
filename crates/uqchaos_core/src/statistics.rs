//! Statistics and sensitivity
//!
//! Two strategies share the [`UncertaintyMethod`] interface: polynomial chaos
//! fits a surrogate and propagates it, Monte Carlo summarises the raw
//! ensemble directly.

use rand::rngs::SmallRng;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::distribution::JointDistribution;
use crate::error::AnalysisError;
use crate::model::{FeatureStatistics, Method, SensitivityShare};
use crate::polynomial::OrthogonalBasis;
use crate::reconcile::ReconciledFeature;
use crate::sampling::NodeBatch;
use crate::surrogate::PolynomialChaosSurrogate;

/// Surrogate draws evaluated per design matrix
const DESIGN_CHUNK_ROWS: usize = 8_192;
/// Outputs whose draws are held in memory together
const OUTPUT_BLOCK: usize = 64;

/// Linear-interpolated percentile of `data`, `q` in `[0, 100]`.
///
/// `data` is sorted in place. Returns NaN for empty input.
pub fn percentile(data: &mut [f64], q: f64) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.sort_unstable_by(f64::total_cmp);

    let position = (q / 100.0).clamp(0.0, 1.0) * (data.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    data[lower] + weight * (data[upper] - data[lower])
}

/// Fitted representation of one feature
#[derive(Debug, Clone, PartialEq)]
pub enum Surrogate {
    PolynomialChaos(PolynomialChaosSurrogate),
    /// Masked ensemble rows
    Ensemble(Vec<Vec<f64>>),
}

/// A way of propagating parameter uncertainty to feature statistics
pub trait UncertaintyMethod {
    fn method(&self) -> Method;

    /// Model evaluations the method needs
    fn node_count(&self) -> usize;

    fn fit(&self, feature: &ReconciledFeature, batch: &NodeBatch)
    -> Result<Surrogate, AnalysisError>;

    fn statistics(
        &self,
        feature: &ReconciledFeature,
        surrogate: &Surrogate,
        rng: &mut SmallRng,
    ) -> FeatureStatistics;
}

/// Polynomial chaos expansion over the basis space of a joint distribution
pub struct PolynomialChaos<'a> {
    joint: &'a JointDistribution,
    config: &'a AnalysisConfig,
    basis: OrthogonalBasis,
    sensitivity: bool,
}

impl<'a> PolynomialChaos<'a> {
    pub fn new(joint: &'a JointDistribution, config: &'a AnalysisConfig) -> Self {
        let basis = OrthogonalBasis::new(joint.basis_marginals(), config.polynomial_order);
        debug!(
            terms = basis.len(),
            dimension = basis.dimension(),
            order = basis.order(),
            "Built orthogonal basis"
        );
        Self {
            joint,
            config,
            basis,
            sensitivity: joint.dimension() > 1,
        }
    }

    pub fn basis(&self) -> &OrthogonalBasis {
        &self.basis
    }
}

impl UncertaintyMethod for PolynomialChaos<'_> {
    fn method(&self) -> Method {
        Method::PolynomialChaos
    }

    fn node_count(&self) -> usize {
        self.config.pc_node_count(self.basis.len())
    }

    fn fit(
        &self,
        feature: &ReconciledFeature,
        batch: &NodeBatch,
    ) -> Result<Surrogate, AnalysisError> {
        let points = batch.restrict(feature.mask.as_slice());
        PolynomialChaosSurrogate::fit(&self.basis, &points, &feature.rows, self.config.regression)
            .map(Surrogate::PolynomialChaos)
            .map_err(|reason| AnalysisError::Regression {
                feature: feature.name.clone(),
                reason,
            })
    }

    fn statistics(
        &self,
        feature: &ReconciledFeature,
        surrogate: &Surrogate,
        rng: &mut SmallRng,
    ) -> FeatureStatistics {
        let Surrogate::PolynomialChaos(expansion) = surrogate else {
            return MonteCarlo::new(0).statistics(feature, surrogate, rng);
        };

        // One set of draws per feature. The design matrix is only ever built
        // DESIGN_CHUNK_ROWS draws at a time, and values are kept for
        // OUTPUT_BLOCK outputs at a time.
        let draws: Vec<Vec<f64>> = (0..self.config.pc_mc_samples)
            .map(|_| self.joint.sample_basis_point(rng))
            .collect();

        let outputs = expansion.output_len();
        let mut p_05 = Vec::with_capacity(outputs);
        let mut p_95 = Vec::with_capacity(outputs);
        for start in (0..outputs).step_by(OUTPUT_BLOCK) {
            let width = OUTPUT_BLOCK.min(outputs - start);
            let mut values = vec![Vec::with_capacity(draws.len()); width];
            for chunk in draws.chunks(DESIGN_CHUNK_ROWS) {
                let design = self.basis.design_matrix(chunk);
                let block = expansion.evaluate_block(&design, start, width);
                for (k, column) in values.iter_mut().enumerate() {
                    column.extend(block.column(k).iter().copied());
                }
            }
            for column in &mut values {
                p_05.push(percentile(column, 5.0));
                p_95.push(percentile(column, 95.0));
            }
        }

        FeatureStatistics {
            time: feature.time.clone(),
            shape: feature.shape.clone(),
            mean: expansion.mean(),
            variance: expansion.variance(),
            p_05,
            p_95,
            sensitivity: self.sensitivity.then(|| expansion.total_sensitivity()),
            nodes_used: feature.rows.len(),
            nodes_excluded: feature.mask.excluded_count(),
        }
    }
}

/// Plain ensemble statistics
pub struct MonteCarlo {
    samples: usize,
}

impl MonteCarlo {
    pub fn new(samples: usize) -> Self {
        Self { samples }
    }
}

impl UncertaintyMethod for MonteCarlo {
    fn method(&self) -> Method {
        Method::MonteCarlo
    }

    fn node_count(&self) -> usize {
        self.samples
    }

    fn fit(
        &self,
        feature: &ReconciledFeature,
        _batch: &NodeBatch,
    ) -> Result<Surrogate, AnalysisError> {
        Ok(Surrogate::Ensemble(feature.rows.clone()))
    }

    /// Mean, population variance and percentiles per output index
    fn statistics(
        &self,
        feature: &ReconciledFeature,
        surrogate: &Surrogate,
        _rng: &mut SmallRng,
    ) -> FeatureStatistics {
        let rows = match surrogate {
            Surrogate::Ensemble(rows) => rows.as_slice(),
            Surrogate::PolynomialChaos(_) => feature.rows.as_slice(),
        };
        let n = rows.len() as f64;
        let outputs = feature.output_len();

        let mut mean = Vec::with_capacity(outputs);
        let mut variance = Vec::with_capacity(outputs);
        let mut p_05 = Vec::with_capacity(outputs);
        let mut p_95 = Vec::with_capacity(outputs);
        for j in 0..outputs {
            let mut column: Vec<f64> = rows.iter().map(|row| row[j]).collect();
            let m = column.iter().sum::<f64>() / n;
            mean.push(m);
            variance.push(column.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n);
            p_05.push(percentile(&mut column, 5.0));
            p_95.push(percentile(&mut column, 95.0));
        }

        FeatureStatistics {
            time: feature.time.clone(),
            shape: feature.shape.clone(),
            mean,
            variance,
            p_05,
            p_95,
            sensitivity: None,
            nodes_used: rows.len(),
            nodes_excluded: feature.mask.excluded_count(),
        }
    }
}

/// Rank parameters by their summed direct-comparison sensitivity.
///
/// Shares sum to one; every share is zero when nothing is sensitive.
pub fn sensitivity_ranking(parameters: &[String], sensitivity: &[Vec<f64>]) -> Vec<SensitivityShare> {
    let sums: Vec<f64> = sensitivity.iter().map(|row| row.iter().sum()).collect();
    let total: f64 = sums.iter().sum();

    parameters
        .iter()
        .zip(sums)
        .map(|(parameter, sum)| SensitivityShare {
            parameter: parameter.clone(),
            share: if total > 0.0 { sum / total } else { 0.0 },
        })
        .collect()
}
