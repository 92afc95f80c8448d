//! Raw model output and per-node feature results

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Name of the feature holding the model's own raw output
pub const DIRECT_COMPARISON: &str = "direct_comparison";

/// Value of a feature for one node.
///
/// The variant is the feature's shape tag. When a feature carries a time
/// axis, time runs along the last axis (`Vector` entries, `Matrix` columns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Scalar(f64),
    Vector(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
}

impl FeatureValue {
    /// Array shape, `[]` for scalars
    pub fn shape(&self) -> Vec<usize> {
        match self {
            FeatureValue::Scalar(_) => Vec::new(),
            FeatureValue::Vector(v) => vec![v.len()],
            FeatureValue::Matrix(rows) => {
                vec![rows.len(), rows.first().map_or(0, Vec::len)]
            }
        }
    }

    /// Length of the last axis
    pub fn last_axis_len(&self) -> Option<usize> {
        match self {
            FeatureValue::Scalar(_) => None,
            FeatureValue::Vector(v) => Some(v.len()),
            FeatureValue::Matrix(rows) => rows.first().map(Vec::len),
        }
    }

    /// Matrix rows must all have the same length
    pub fn is_rectangular(&self) -> bool {
        match self {
            FeatureValue::Matrix(rows) => rows.windows(2).all(|w| w[0].len() == w[1].len()),
            _ => true,
        }
    }

    /// Row-major copy of every entry
    pub fn flatten(&self) -> Vec<f64> {
        match self {
            FeatureValue::Scalar(x) => vec![*x],
            FeatureValue::Vector(v) => v.clone(),
            FeatureValue::Matrix(rows) => rows.iter().flatten().copied().collect(),
        }
    }
}

/// Resamples a node's output onto another time axis
pub trait Interpolate: fmt::Debug + Send + Sync {
    fn interpolate(&self, at: &[f64]) -> FeatureValue;
}

/// Piecewise-linear interpolation along the last axis.
///
/// Points outside the node's own axis take the nearest end value.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearInterpolant {
    time: Vec<f64>,
    value: FeatureValue,
}

impl LinearInterpolant {
    pub fn new(time: Vec<f64>, value: FeatureValue) -> Result<Self, String> {
        if time.is_empty() {
            return Err("empty time axis".to_string());
        }
        if time.iter().any(|t| !t.is_finite()) {
            return Err("time axis has non-finite points".to_string());
        }
        if time.windows(2).any(|w| w[1] < w[0]) {
            return Err("time axis is not sorted".to_string());
        }
        if !value.is_rectangular() {
            return Err("ragged matrix value".to_string());
        }
        match value.last_axis_len() {
            None => Err("scalar value cannot carry a time axis".to_string()),
            Some(n) if n != time.len() => Err(format!(
                "time axis has {} points but value has {n}",
                time.len()
            )),
            Some(_) => Ok(Self { time, value }),
        }
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }
}

impl Interpolate for LinearInterpolant {
    fn interpolate(&self, at: &[f64]) -> FeatureValue {
        match &self.value {
            FeatureValue::Scalar(x) => FeatureValue::Scalar(*x),
            FeatureValue::Vector(v) => FeatureValue::Vector(interpolate_row(&self.time, v, at)),
            FeatureValue::Matrix(rows) => FeatureValue::Matrix(
                rows.iter()
                    .map(|row| interpolate_row(&self.time, row, at))
                    .collect(),
            ),
        }
    }
}

fn interpolate_row(time: &[f64], row: &[f64], at: &[f64]) -> Vec<f64> {
    let last = time.len() - 1;
    at.iter()
        .map(|&t| {
            if last == 0 || t <= time[0] {
                return row[0];
            }
            if t >= time[last] {
                return row[last];
            }
            let hi = time.partition_point(|&x| x <= t).clamp(1, last);
            let lo = hi - 1;
            let span = time[hi] - time[lo];
            if span <= 0.0 {
                return row[hi];
            }
            let w = (t - time[lo]) / span;
            row[lo] + w * (row[hi] - row[lo])
        })
        .collect()
}

/// Raw output of one model run
#[derive(Debug, Clone)]
pub struct ModelOutput {
    pub time: Option<Vec<f64>>,
    pub value: FeatureValue,
    pub interpolant: Option<Arc<dyn Interpolate>>,
}

impl ModelOutput {
    pub fn series(time: Vec<f64>, values: Vec<f64>) -> Self {
        Self {
            time: Some(time),
            value: FeatureValue::Vector(values),
            interpolant: None,
        }
    }

    pub fn scalar(value: f64) -> Self {
        Self {
            time: None,
            value: FeatureValue::Scalar(value),
            interpolant: None,
        }
    }

    #[must_use]
    pub fn with_interpolant(mut self, interpolant: Arc<dyn Interpolate>) -> Self {
        self.interpolant = Some(interpolant);
        self
    }
}

/// `(time axis, value, interpolant)` triple of one feature at one node.
///
/// `value == None` marks the feature as unavailable for the node.
#[derive(Debug, Clone, Default)]
pub struct FeatureOutput {
    pub time: Option<Vec<f64>>,
    pub value: Option<FeatureValue>,
    pub interpolant: Option<Arc<dyn Interpolate>>,
}

impl FeatureOutput {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn scalar(value: f64) -> Self {
        Self {
            time: None,
            value: Some(FeatureValue::Scalar(value)),
            interpolant: None,
        }
    }

    pub fn value(value: FeatureValue) -> Self {
        Self {
            time: None,
            value: Some(value),
            interpolant: None,
        }
    }

    pub fn series(time: Vec<f64>, values: Vec<f64>) -> Self {
        Self {
            time: Some(time),
            value: Some(FeatureValue::Vector(values)),
            interpolant: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.value.is_some()
    }
}

impl From<ModelOutput> for FeatureOutput {
    fn from(output: ModelOutput) -> Self {
        Self {
            time: output.time,
            value: Some(output.value),
            interpolant: output.interpolant,
        }
    }
}

/// Every feature computed for one node
#[derive(Debug, Clone, Default)]
pub struct NodeResult {
    pub features: FxHashMap<String, FeatureOutput>,
}

impl NodeResult {
    /// Result of a node whose model run failed: every feature unavailable
    pub fn failed<'a>(features: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            features: features
                .into_iter()
                .map(|name| (name.to_string(), FeatureOutput::unavailable()))
                .collect(),
        }
    }

    pub fn get(&self, feature: &str) -> Option<&FeatureOutput> {
        self.features.get(feature)
    }

    pub fn insert(&mut self, feature: impl Into<String>, output: FeatureOutput) {
        self.features.insert(feature.into(), output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_interpolation_inside_and_outside() {
        let interp =
            LinearInterpolant::new(vec![0.0, 1.0, 2.0], FeatureValue::Vector(vec![0.0, 10.0, 30.0]))
                .unwrap();

        let FeatureValue::Vector(v) = interp.interpolate(&[-1.0, 0.5, 1.0, 1.5, 3.0]) else {
            panic!("expected vector");
        };
        assert_eq!(v, vec![0.0, 5.0, 10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_matrix_interpolates_each_row() {
        let interp = LinearInterpolant::new(
            vec![0.0, 2.0],
            FeatureValue::Matrix(vec![vec![0.0, 2.0], vec![4.0, 0.0]]),
        )
        .unwrap();

        assert_eq!(
            interp.interpolate(&[1.0]),
            FeatureValue::Matrix(vec![vec![1.0], vec![2.0]])
        );
    }

    #[test]
    fn test_interpolant_rejects_bad_layout() {
        assert!(LinearInterpolant::new(vec![0.0, 1.0], FeatureValue::Scalar(1.0)).is_err());
        assert!(LinearInterpolant::new(vec![0.0, 1.0], FeatureValue::Vector(vec![1.0])).is_err());
        assert!(
            LinearInterpolant::new(vec![1.0, 0.0], FeatureValue::Vector(vec![1.0, 2.0])).is_err()
        );
    }

    #[test]
    fn test_interpolant_rejects_non_finite_axis() {
        let value = FeatureValue::Vector(vec![0.0, 1.0]);
        assert!(LinearInterpolant::new(vec![f64::NAN, 1.0], value.clone()).is_err());
        assert!(LinearInterpolant::new(vec![0.0, f64::INFINITY], value).is_err());
    }

    #[test]
    fn test_single_point_axis_holds_value() {
        let interp = LinearInterpolant::new(vec![1.0], FeatureValue::Vector(vec![4.0])).unwrap();
        assert_eq!(
            interp.interpolate(&[0.0, 1.0, 2.0, f64::NAN]),
            FeatureValue::Vector(vec![4.0; 4])
        );
    }

    #[test]
    fn test_shapes() {
        assert_eq!(FeatureValue::Scalar(1.0).shape(), Vec::<usize>::new());
        assert_eq!(FeatureValue::Vector(vec![1.0; 4]).shape(), vec![4]);
        assert_eq!(
            FeatureValue::Matrix(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).flatten(),
            vec![1.0, 2.0, 3.0, 4.0]
        );
    }
}
