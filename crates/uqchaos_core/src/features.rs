//! Feature selection and the built-in series feature library

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, EvaluationError};
use crate::model::{
    DIRECT_COMPARISON, FeatureOutput, FeatureSpec, FeatureValue, Features, ModelOutput,
};

/// Which features of the library a run computes, in addition to the
/// model's own output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSelection {
    #[default]
    None,
    All,
    Named(Vec<String>),
}

impl FeatureSelection {
    /// Resolve against the names implemented by `library`
    pub fn resolve(&self, library: &dyn FeatureSpec) -> Result<Vec<String>, ConfigError> {
        let implemented = library.implemented_features();
        let names = match self {
            FeatureSelection::None => Vec::new(),
            FeatureSelection::All => implemented,
            FeatureSelection::Named(names) => {
                let mut resolved: Vec<String> = Vec::with_capacity(names.len());
                for name in names {
                    if !implemented.contains(name) {
                        return Err(ConfigError::UnknownFeature(name.clone()));
                    }
                    if !resolved.contains(name) {
                        resolved.push(name.clone());
                    }
                }
                resolved
            }
        };
        Ok(names
            .into_iter()
            .filter(|name| name != DIRECT_COMPARISON)
            .collect())
    }
}

/// Summary features of a scalar or time-series output.
///
/// - `mean`, `min`, `max` over every entry
/// - `final_value` is the last entry along the time axis
/// - `peak_time` is the time of the largest entry of a vector series
///
/// A feature that does not apply to the output is reported unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeriesFeatures;

impl SeriesFeatures {
    pub const NAMES: [&'static str; 5] = ["mean", "min", "max", "final_value", "peak_time"];
}

impl FeatureSpec for SeriesFeatures {
    fn implemented_features(&self) -> Vec<String> {
        Self::NAMES.iter().map(|s| (*s).to_string()).collect()
    }

    fn build(&self) -> Box<dyn Features + '_> {
        Box::new(*self)
    }
}

impl Features for SeriesFeatures {
    fn calculate(
        &mut self,
        name: &str,
        output: &ModelOutput,
    ) -> Result<FeatureOutput, EvaluationError> {
        let entries = output.value.flatten();
        if entries.is_empty() {
            return Ok(FeatureOutput::unavailable());
        }

        let result = match name {
            "mean" => FeatureOutput::scalar(entries.iter().sum::<f64>() / entries.len() as f64),
            "min" => FeatureOutput::scalar(entries.iter().copied().fold(f64::INFINITY, f64::min)),
            "max" => FeatureOutput::scalar(
                entries
                    .iter()
                    .copied()
                    .fold(f64::NEG_INFINITY, f64::max),
            ),
            "final_value" => match &output.value {
                FeatureValue::Scalar(x) => FeatureOutput::scalar(*x),
                FeatureValue::Vector(v) => v
                    .last()
                    .map_or_else(FeatureOutput::unavailable, |x| FeatureOutput::scalar(*x)),
                FeatureValue::Matrix(rows) => {
                    let last: Option<Vec<f64>> = rows.iter().map(|r| r.last().copied()).collect();
                    last.map_or_else(FeatureOutput::unavailable, |v| {
                        FeatureOutput::value(FeatureValue::Vector(v))
                    })
                }
            },
            "peak_time" => match (&output.time, &output.value) {
                (Some(time), FeatureValue::Vector(v)) if time.len() == v.len() => {
                    let peak = v
                        .iter()
                        .enumerate()
                        .max_by(|a, b| a.1.total_cmp(b.1))
                        .map(|(i, _)| time[i]);
                    peak.map_or_else(FeatureOutput::unavailable, FeatureOutput::scalar)
                }
                _ => FeatureOutput::unavailable(),
            },
            other => {
                return Err(EvaluationError::Failed(format!(
                    "feature '{other}' is not implemented"
                )));
            }
        };
        Ok(result)
    }
}
