//! Polynomial chaos surrogate
//!
//! Coefficients are fitted by regressing reconciled node values on the
//! orthonormal basis. Because the basis is orthonormal under the basis-space
//! distribution, moments and total Sobol indices follow directly from the
//! coefficients.

use nalgebra::DMatrix;

use crate::config::RegressionRule;
use crate::polynomial::OrthogonalBasis;

/// Relative cutoff below which singular values are treated as zero
const SINGULAR_CUTOFF: f64 = 1e-12;

/// Variance below this fraction of the second moment counts as zero
const ZERO_VARIANCE_RATIO: f64 = 1e-20;

#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialChaosSurrogate {
    /// Basis terms × flattened output indices
    coefficients: DMatrix<f64>,
    multi_indices: Vec<Vec<usize>>,
}

impl PolynomialChaosSurrogate {
    /// Fit one coefficient column per output index.
    ///
    /// `points` and `rows` hold only the valid nodes, in the same order.
    pub fn fit(
        basis: &OrthogonalBasis,
        points: &[Vec<f64>],
        rows: &[Vec<f64>],
        rule: RegressionRule,
    ) -> Result<Self, String> {
        if points.len() != rows.len() {
            return Err(format!(
                "{} nodes but {} result rows",
                points.len(),
                rows.len()
            ));
        }
        if rows.is_empty() {
            return Err("no nodes to fit".to_string());
        }

        let outputs = rows[0].len();
        let design = basis.design_matrix(points);
        let targets = DMatrix::from_fn(rows.len(), outputs, |i, j| rows[i][j]);

        let coefficients = match rule {
            RegressionRule::LeastSquares => {
                let svd = design.svd(true, true);
                let cutoff = SINGULAR_CUTOFF * svd.singular_values.max();
                svd.solve(&targets, cutoff).map_err(str::to_string)?
            }
            RegressionRule::Tikhonov { alpha } => {
                let transposed = design.transpose();
                let mut normal = &transposed * &design;
                for i in 0..normal.nrows() {
                    normal[(i, i)] += alpha;
                }
                let rhs = &transposed * &targets;
                normal
                    .clone()
                    .cholesky()
                    .map(|c| c.solve(&rhs))
                    .or_else(|| normal.clone().lu().solve(&rhs))
                    .ok_or_else(|| "normal equations are singular".to_string())?
            }
        };

        Ok(Self {
            coefficients,
            multi_indices: basis.multi_indices().to_vec(),
        })
    }

    pub fn coefficients(&self) -> &DMatrix<f64> {
        &self.coefficients
    }

    pub fn output_len(&self) -> usize {
        self.coefficients.ncols()
    }

    /// `E[f] = c₀`
    pub fn mean(&self) -> Vec<f64> {
        self.coefficients.row(0).iter().copied().collect()
    }

    /// `Var[f] = Σ_{k≥1} c_k²`
    pub fn variance(&self) -> Vec<f64> {
        self.coefficients
            .column_iter()
            .map(|c| c.iter().skip(1).map(|x| x * x).sum())
            .collect()
    }

    /// Total Sobol index of every input dimension at every output index.
    ///
    /// Outputs with zero variance get an index of zero.
    pub fn total_sensitivity(&self) -> Vec<Vec<f64>> {
        let dimension = self.multi_indices.first().map_or(0, Vec::len);
        let variance: Vec<f64> = self
            .coefficients
            .column_iter()
            .zip(self.variance())
            .map(|(column, var)| {
                if var <= ZERO_VARIANCE_RATIO * column.norm_squared() {
                    0.0
                } else {
                    var
                }
            })
            .collect();

        (0..dimension)
            .map(|i| {
                self.coefficients
                    .column_iter()
                    .zip(&variance)
                    .map(|(column, &var)| {
                        if var <= 0.0 {
                            return 0.0;
                        }
                        let partial: f64 = column
                            .iter()
                            .zip(&self.multi_indices)
                            .filter(|(_, index)| index[i] > 0)
                            .map(|(c, _)| c * c)
                            .sum();
                        partial / var
                    })
                    .collect()
            })
            .collect()
    }

    /// Surrogate values at every design row for outputs `start..start + width`,
    /// one column per output
    pub fn evaluate_block(&self, design: &DMatrix<f64>, start: usize, width: usize) -> DMatrix<f64> {
        design * self.coefficients.columns(start, width)
    }
}
