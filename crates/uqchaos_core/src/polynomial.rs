//! Orthonormal polynomial chaos basis
//!
//! Univariate polynomials are generated from their three-term recurrence
//!
//! ```text
//! p₋₁ = 0, p₀ = 1
//! √β_{k+1} p_{k+1}(x) = (x − α_k) p_k(x) − √β_k p_{k−1}(x)
//! ```
//!
//! which makes them orthonormal under the marginal. Normal and uniform
//! marginals use the analytic coefficients (Hermite, Legendre); every other
//! marginal uses a discretised Stieltjes procedure on quantile nodes.
//! Multivariate terms are tensor products indexed by multi-indices of total
//! degree at most the polynomial order, graded with the constant term first.

use nalgebra::DMatrix;

use crate::distribution::ResolvedMarginal;
use crate::model::Marginal;

/// Quantile nodes used by the discretised Stieltjes procedure
const STIELTJES_NODES: usize = 2_000;

/// Recurrence coefficients of one family of orthonormal polynomials
#[derive(Debug, Clone, PartialEq)]
pub struct Recurrence {
    /// `alpha[k]` for `k = 0..order`
    alpha: Vec<f64>,
    /// `sqrt_beta[k]` for `k = 0..=order`; `sqrt_beta[0]` is unused
    sqrt_beta: Vec<f64>,
}

impl Recurrence {
    pub fn for_marginal(marginal: &ResolvedMarginal, order: usize) -> Self {
        match *marginal.marginal() {
            Marginal::Normal { mean, std_dev } => Self::hermite(mean, std_dev, order),
            Marginal::Uniform { min, max } => Self::legendre(min, max, order),
            _ => Self::stieltjes(marginal, order),
        }
    }

    /// Probabilists' Hermite polynomials for `N(mean, std_dev²)`
    pub fn hermite(mean: f64, std_dev: f64, order: usize) -> Self {
        let variance = std_dev * std_dev;
        Self {
            alpha: vec![mean; order],
            sqrt_beta: (0..=order).map(|k| (k as f64 * variance).sqrt()).collect(),
        }
    }

    /// Legendre polynomials for `U(min, max)`
    pub fn legendre(min: f64, max: f64, order: usize) -> Self {
        let half_width = (max - min) / 2.0;
        Self {
            alpha: vec![(min + max) / 2.0; order],
            sqrt_beta: (0..=order)
                .map(|k| {
                    let k = k as f64;
                    half_width * (k * k / (4.0 * k * k - 1.0)).sqrt()
                })
                .collect(),
        }
    }

    /// Discretised Stieltjes procedure over equally weighted quantile nodes
    pub fn stieltjes(marginal: &ResolvedMarginal, order: usize) -> Self {
        let nodes: Vec<f64> = (0..STIELTJES_NODES)
            .map(|i| marginal.inverse_cdf((i as f64 + 0.5) / STIELTJES_NODES as f64))
            .collect();
        let weight = 1.0 / STIELTJES_NODES as f64;

        let mut alpha = Vec::with_capacity(order);
        let mut sqrt_beta = vec![0.0];
        let mut previous = vec![0.0; nodes.len()];
        let mut current = vec![1.0; nodes.len()];

        for k in 0..order {
            let a: f64 = nodes
                .iter()
                .zip(&current)
                .map(|(x, p)| weight * x * p * p)
                .sum();

            let next: Vec<f64> = nodes
                .iter()
                .zip(current.iter().zip(&previous))
                .map(|(x, (p, q))| (x - a) * p - sqrt_beta[k] * q)
                .collect();
            let norm = next.iter().map(|p| weight * p * p).sum::<f64>().sqrt();

            alpha.push(a);
            sqrt_beta.push(norm);
            previous = current;
            current = if norm > 0.0 {
                next.into_iter().map(|p| p / norm).collect()
            } else {
                next
            };
        }

        Self { alpha, sqrt_beta }
    }

    pub fn order(&self) -> usize {
        self.alpha.len()
    }

    /// Values `p_0(x) ..= p_order(x)`
    pub fn evaluate(&self, x: f64) -> Vec<f64> {
        let mut values = Vec::with_capacity(self.order() + 1);
        values.push(1.0);
        let mut previous = 0.0;
        let mut current = 1.0;
        for k in 0..self.order() {
            let next = if self.sqrt_beta[k + 1] > 0.0 {
                ((x - self.alpha[k]) * current - self.sqrt_beta[k] * previous)
                    / self.sqrt_beta[k + 1]
            } else {
                0.0
            };
            values.push(next);
            previous = current;
            current = next;
        }
        values
    }
}

/// Number of terms of a total-degree basis
pub fn basis_size(order: usize, dimension: usize) -> usize {
    // C(order + dimension, dimension)
    (1..=dimension).fold(1usize, |acc, i| acc * (order + i) / i)
}

/// Multi-indices of total degree `<= order`, graded by degree
pub fn multi_indices(order: usize, dimension: usize) -> Vec<Vec<usize>> {
    let mut indices = Vec::with_capacity(basis_size(order, dimension));
    for degree in 0..=order {
        let mut index = vec![0; dimension];
        push_with_degree(&mut indices, &mut index, 0, degree);
    }
    indices
}

fn push_with_degree(out: &mut Vec<Vec<usize>>, index: &mut [usize], position: usize, left: usize) {
    if position + 1 == index.len() {
        index[position] = left;
        out.push(index.to_vec());
        return;
    }
    for k in (0..=left).rev() {
        index[position] = k;
        push_with_degree(out, index, position + 1, left - k);
    }
    index[position] = 0;
}

/// Tensor-product orthonormal basis over the basis-space marginals
#[derive(Debug, Clone)]
pub struct OrthogonalBasis {
    order: usize,
    recurrences: Vec<Recurrence>,
    indices: Vec<Vec<usize>>,
}

impl OrthogonalBasis {
    pub fn new(marginals: &[ResolvedMarginal], order: usize) -> Self {
        Self {
            order,
            recurrences: marginals
                .iter()
                .map(|m| Recurrence::for_marginal(m, order))
                .collect(),
            indices: multi_indices(order, marginals.len()),
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn dimension(&self) -> usize {
        self.recurrences.len()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn multi_indices(&self) -> &[Vec<usize>] {
        &self.indices
    }

    /// Every basis term at one point
    pub fn evaluate(&self, point: &[f64]) -> Vec<f64> {
        let univariate: Vec<Vec<f64>> = self
            .recurrences
            .iter()
            .zip(point)
            .map(|(r, &x)| r.evaluate(x))
            .collect();

        self.indices
            .iter()
            .map(|index| {
                index
                    .iter()
                    .enumerate()
                    .map(|(dim, &degree)| univariate[dim][degree])
                    .product()
            })
            .collect()
    }

    /// Design matrix with one row per point and one column per basis term
    pub fn design_matrix(&self, points: &[Vec<f64>]) -> DMatrix<f64> {
        let mut matrix = DMatrix::zeros(points.len(), self.len());
        for (row, point) in points.iter().enumerate() {
            for (col, value) in self.evaluate(point).into_iter().enumerate() {
                matrix[(row, col)] = value;
            }
        }
        matrix
    }
}
