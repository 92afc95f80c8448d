//! Statistics produced by an analysis run

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Statistics of one feature.
///
/// Every array is flattened row-major with `shape`. `sensitivity` holds one
/// row per uncertain parameter, each as long as the flattened output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStatistics {
    pub time: Option<Vec<f64>>,
    pub shape: Vec<usize>,
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
    pub p_05: Vec<f64>,
    pub p_95: Vec<f64>,
    pub sensitivity: Option<Vec<Vec<f64>>>,
    /// Nodes that contributed a value
    pub nodes_used: usize,
    /// Nodes masked out because the feature was unavailable
    pub nodes_excluded: usize,
}

/// Share of the total sensitivity attributed to one parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityShare {
    pub parameter: String,
    pub share: f64,
}

/// Every statistic computed by one run, keyed by feature name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsBundle {
    pub features: BTreeMap<String, FeatureStatistics>,
    /// In uncertain-parameter order. Empty for single-parameter and Monte Carlo runs.
    pub sensitivity_ranking: Vec<SensitivityShare>,
}

impl StatisticsBundle {
    pub fn get(&self, feature: &str) -> Option<&FeatureStatistics> {
        self.features.get(feature)
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }

    pub fn has_sensitivity(&self) -> bool {
        self.features.values().any(|f| f.sensitivity.is_some())
    }

    /// Ranking share of a parameter, if ranked
    pub fn ranking_of(&self, parameter: &str) -> Option<f64> {
        self.sensitivity_ranking
            .iter()
            .find(|s| s.parameter == parameter)
            .map(|s| s.share)
    }
}

/// How the uncertainty is propagated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    #[default]
    PolynomialChaos,
    MonteCarlo,
}

impl Method {
    pub fn label(self) -> &'static str {
        match self {
            Method::PolynomialChaos => "pc",
            Method::MonteCarlo => "mc",
        }
    }
}

/// Which parameters vary in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunTarget {
    /// One parameter varies, every other one is held at its nominal value
    Single(String),
    /// Every uncertain parameter varies jointly
    All,
}

/// Description of a completed run, handed to collaborators with the statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub name: String,
    pub method: Method,
    pub uncertain_parameters: Vec<String>,
    pub features: Vec<String>,
    pub node_count: usize,
    pub started_at: jiff::Timestamp,
    pub elapsed_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedRun {
    pub metadata: RunMetadata,
    pub statistics: StatisticsBundle,
}

/// Result of one orchestrated run
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(Box<CompletedRun>),
    /// The evaluation batch was abandoned; nothing was persisted
    Aborted { target: RunTarget, reason: String },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }

    pub fn completed(&self) -> Option<&CompletedRun> {
        match self {
            RunOutcome::Completed(run) => Some(run),
            RunOutcome::Aborted { .. } => None,
        }
    }

    pub fn statistics(&self) -> Option<&StatisticsBundle> {
        self.completed().map(|run| &run.statistics)
    }
}
