//! Joint distribution over the uncertain parameters.
//!
//! In independent mode the polynomial basis is built directly on the
//! marginals and nodes are drawn from them. In Rosenblatt mode the basis
//! lives in an independent standard-normal space `z`; a node is mapped to
//! parameter space through `x_i = F_i⁻¹(Φ((L z)_i))` where `L` is the
//! Cholesky factor of the parameters' correlation matrix (identity when the
//! parameters are independent).

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::Distribution;
use statrs::distribution::ContinuousCDF;

use crate::error::ConfigError;
use crate::model::{Marginal, ParameterSet, RunTarget};

/// Probabilities are kept away from 0 and 1 before inverse CDFs
const PROBABILITY_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone)]
enum Law {
    Uniform(statrs::distribution::Uniform, rand::distr::Uniform<f64>),
    Normal(statrs::distribution::Normal, rand_distr::Normal<f64>),
    LogNormal(statrs::distribution::LogNormal, rand_distr::LogNormal<f64>),
    Gamma(statrs::distribution::Gamma, rand_distr::Gamma<f64>),
    Beta {
        cdf: statrs::distribution::Beta,
        draw: rand_distr::Beta<f64>,
        min: f64,
        width: f64,
    },
    Triangular(statrs::distribution::Triangular, rand_distr::Triangular<f64>),
    Exponential(statrs::distribution::Exp, rand_distr::Exp<f64>),
}

/// A marginal whose parameters have been checked, ready for sampling
#[derive(Debug, Clone)]
pub struct ResolvedMarginal {
    marginal: Marginal,
    law: Law,
}

impl ResolvedMarginal {
    pub fn new(parameter: &str, marginal: &Marginal) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidDistribution {
            parameter: parameter.to_string(),
            reason,
        };

        let law = match *marginal {
            Marginal::Uniform { min, max } => {
                if !(min.is_finite() && max.is_finite() && min < max) {
                    return Err(invalid(format!("uniform bounds [{min}, {max}] are empty")));
                }
                Law::Uniform(
                    statrs::distribution::Uniform::new(min, max)
                        .map_err(|e| invalid(e.to_string()))?,
                    rand::distr::Uniform::new(min, max).map_err(|e| invalid(e.to_string()))?,
                )
            }
            Marginal::Normal { mean, std_dev } => {
                if !(std_dev.is_finite() && std_dev > 0.0) {
                    return Err(invalid(format!("std_dev must be positive, got {std_dev}")));
                }
                Law::Normal(
                    statrs::distribution::Normal::new(mean, std_dev)
                        .map_err(|e| invalid(e.to_string()))?,
                    rand_distr::Normal::new(mean, std_dev).map_err(|e| invalid(e.to_string()))?,
                )
            }
            Marginal::LogNormal { location, scale } => {
                if !(scale.is_finite() && scale > 0.0) {
                    return Err(invalid(format!("scale must be positive, got {scale}")));
                }
                Law::LogNormal(
                    statrs::distribution::LogNormal::new(location, scale)
                        .map_err(|e| invalid(e.to_string()))?,
                    rand_distr::LogNormal::new(location, scale)
                        .map_err(|e| invalid(e.to_string()))?,
                )
            }
            Marginal::Gamma { shape, rate } => {
                if !(shape > 0.0 && rate > 0.0 && shape.is_finite() && rate.is_finite()) {
                    return Err(invalid(format!(
                        "shape and rate must be positive, got {shape} and {rate}"
                    )));
                }
                Law::Gamma(
                    statrs::distribution::Gamma::new(shape, rate)
                        .map_err(|e| invalid(e.to_string()))?,
                    rand_distr::Gamma::new(shape, 1.0 / rate)
                        .map_err(|e| invalid(e.to_string()))?,
                )
            }
            Marginal::Beta {
                alpha,
                beta,
                min,
                max,
            } => {
                if !(min.is_finite() && max.is_finite() && min < max) {
                    return Err(invalid(format!("beta support [{min}, {max}] is empty")));
                }
                Law::Beta {
                    cdf: statrs::distribution::Beta::new(alpha, beta)
                        .map_err(|e| invalid(e.to_string()))?,
                    draw: rand_distr::Beta::new(alpha, beta).map_err(|e| invalid(e.to_string()))?,
                    min,
                    width: max - min,
                }
            }
            Marginal::Triangular { min, mode, max } => {
                if !(min < max && (min..=max).contains(&mode)) {
                    return Err(invalid(format!(
                        "expected min <= mode <= max with min < max, got {min}, {mode}, {max}"
                    )));
                }
                Law::Triangular(
                    statrs::distribution::Triangular::new(min, max, mode)
                        .map_err(|e| invalid(e.to_string()))?,
                    rand_distr::Triangular::new(min, max, mode)
                        .map_err(|e| invalid(e.to_string()))?,
                )
            }
            Marginal::Exponential { rate } => {
                if !(rate.is_finite() && rate > 0.0) {
                    return Err(invalid(format!("rate must be positive, got {rate}")));
                }
                Law::Exponential(
                    statrs::distribution::Exp::new(rate).map_err(|e| invalid(e.to_string()))?,
                    rand_distr::Exp::new(rate).map_err(|e| invalid(e.to_string()))?,
                )
            }
        };

        Ok(Self {
            marginal: marginal.clone(),
            law,
        })
    }

    pub fn standard_normal() -> Result<Self, ConfigError> {
        Self::new("reference", &Marginal::STANDARD_NORMAL)
    }

    pub fn marginal(&self) -> &Marginal {
        &self.marginal
    }

    pub fn cdf(&self, x: f64) -> f64 {
        match &self.law {
            Law::Uniform(d, _) => d.cdf(x),
            Law::Normal(d, _) => d.cdf(x),
            Law::LogNormal(d, _) => d.cdf(x),
            Law::Gamma(d, _) => d.cdf(x),
            Law::Beta {
                cdf, min, width, ..
            } => cdf.cdf(((x - min) / width).clamp(0.0, 1.0)),
            Law::Triangular(d, _) => d.cdf(x),
            Law::Exponential(d, _) => d.cdf(x),
        }
    }

    /// Quantile function. `p` is clamped into the open unit interval.
    pub fn inverse_cdf(&self, p: f64) -> f64 {
        let p = p.clamp(PROBABILITY_EPSILON, 1.0 - PROBABILITY_EPSILON);
        match &self.law {
            Law::Uniform(d, _) => d.inverse_cdf(p),
            Law::Normal(d, _) => d.inverse_cdf(p),
            Law::LogNormal(d, _) => d.inverse_cdf(p),
            Law::Gamma(d, _) => d.inverse_cdf(p),
            Law::Beta {
                cdf, min, width, ..
            } => min + width * cdf.inverse_cdf(p),
            Law::Triangular(d, _) => d.inverse_cdf(p),
            Law::Exponential(d, _) => d.inverse_cdf(p),
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match &self.law {
            Law::Uniform(_, d) => d.sample(rng),
            Law::Normal(_, d) => d.sample(rng),
            Law::LogNormal(_, d) => d.sample(rng),
            Law::Gamma(_, d) => d.sample(rng),
            Law::Beta {
                draw, min, width, ..
            } => min + width * draw.sample(rng),
            Law::Triangular(_, d) => d.sample(rng),
            Law::Exponential(_, d) => d.sample(rng),
        }
    }
}

#[derive(Debug, Clone)]
enum Coupling {
    Independent,
    /// Lower Cholesky factor of the correlation matrix
    Rosenblatt { factor: DMatrix<f64> },
}

/// Joint distribution of the parameters varied in one run
#[derive(Debug, Clone)]
pub struct JointDistribution {
    names: Vec<String>,
    marginals: Vec<ResolvedMarginal>,
    reference: Vec<ResolvedMarginal>,
    coupling: Coupling,
}

impl JointDistribution {
    /// Build the distribution for a run target.
    ///
    /// A single-parameter target ignores any correlation and uses that
    /// parameter's marginal alone.
    pub fn build(
        parameters: &ParameterSet,
        target: &RunTarget,
        rosenblatt: bool,
    ) -> Result<Self, ConfigError> {
        parameters.validate()?;

        let (names, marginals) = match target {
            RunTarget::Single(name) => {
                let param = parameters
                    .get(name)
                    .ok_or_else(|| ConfigError::UnknownParameter(name.clone()))?;
                let marginal = param
                    .distribution
                    .as_ref()
                    .ok_or_else(|| ConfigError::MissingDistribution(name.clone()))?;
                (
                    vec![name.clone()],
                    vec![ResolvedMarginal::new(name, marginal)?],
                )
            }
            RunTarget::All => {
                let mut names = Vec::new();
                let mut marginals = Vec::new();
                for param in parameters.uncertain() {
                    if let Some(marginal) = &param.distribution {
                        marginals.push(ResolvedMarginal::new(&param.name, marginal)?);
                        names.push(param.name.clone());
                    }
                }
                (names, marginals)
            }
        };

        if marginals.is_empty() {
            return Err(ConfigError::NoUncertainParameters);
        }

        let correlation = match target {
            RunTarget::All => parameters.correlation.as_ref(),
            RunTarget::Single(_) => None,
        };

        let coupling = match (rosenblatt, correlation) {
            (false, Some(_)) => return Err(ConfigError::DependenceRequiresTransform),
            (false, None) => Coupling::Independent,
            (true, None) => Coupling::Rosenblatt {
                factor: DMatrix::identity(marginals.len(), marginals.len()),
            },
            (true, Some(rows)) => Coupling::Rosenblatt {
                factor: cholesky_factor(rows, marginals.len())?,
            },
        };

        let reference = match coupling {
            Coupling::Independent => marginals.clone(),
            Coupling::Rosenblatt { .. } => (0..marginals.len())
                .map(|_| ResolvedMarginal::standard_normal())
                .collect::<Result<_, _>>()?,
        };

        Ok(Self {
            names,
            marginals,
            reference,
            coupling,
        })
    }

    pub fn dimension(&self) -> usize {
        self.marginals.len()
    }

    /// Names of the varied parameters, in node column order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn marginals(&self) -> &[ResolvedMarginal] {
        &self.marginals
    }

    /// Marginals of the space the basis and the surrogate live in
    pub fn basis_marginals(&self) -> &[ResolvedMarginal] {
        &self.reference
    }

    pub fn is_transformed(&self) -> bool {
        matches!(self.coupling, Coupling::Rosenblatt { .. })
    }

    /// Map a point of the basis space to parameter space
    pub fn to_parameter_space(&self, point: &[f64]) -> Vec<f64> {
        match &self.coupling {
            Coupling::Independent => point.to_vec(),
            Coupling::Rosenblatt { factor } => {
                let correlated = factor * DVector::from_column_slice(point);
                correlated
                    .iter()
                    .zip(&self.marginals)
                    .map(|(z, marginal)| {
                        let u = statrs::function::erf::erfc(-z / std::f64::consts::SQRT_2) / 2.0;
                        marginal.inverse_cdf(u)
                    })
                    .collect()
            }
        }
    }

    /// Draw one point in basis space from unit-hypercube coordinates
    pub fn basis_point_from_unit(&self, unit: &[f64]) -> Vec<f64> {
        unit.iter()
            .zip(&self.reference)
            .map(|(u, marginal)| marginal.inverse_cdf(*u))
            .collect()
    }

    /// Draw one pseudo-random point in basis space
    pub fn sample_basis_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        self.reference.iter().map(|m| m.sample(rng)).collect()
    }
}

fn cholesky_factor(rows: &[Vec<f64>], dimension: usize) -> Result<DMatrix<f64>, ConfigError> {
    if rows.len() != dimension || rows.iter().any(|r| r.len() != dimension) {
        return Err(ConfigError::InvalidCorrelation(format!(
            "expected a {dimension}x{dimension} matrix"
        )));
    }

    let matrix = DMatrix::from_fn(dimension, dimension, |i, j| rows[i][j]);
    for i in 0..dimension {
        if (matrix[(i, i)] - 1.0).abs() > 1e-9 {
            return Err(ConfigError::InvalidCorrelation(format!(
                "diagonal entry {i} is {}, expected 1",
                matrix[(i, i)]
            )));
        }
        for j in 0..i {
            if (matrix[(i, j)] - matrix[(j, i)]).abs() > 1e-9 {
                return Err(ConfigError::InvalidCorrelation(format!(
                    "entries ({i}, {j}) and ({j}, {i}) differ"
                )));
            }
        }
    }

    matrix
        .cholesky()
        .map(|c| c.l())
        .ok_or_else(|| ConfigError::InvalidCorrelation("not positive definite".to_string()))
}
