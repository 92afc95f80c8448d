//! YAML persistence of completed runs
//!
//! Each run is written to `{dir}/{name}.yaml`. The document carries the run
//! metadata, the parameter ranking and one group per feature holding its
//! time axis, mean, variance, percentile bands and sensitivity.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uqchaos_core::error::CollaboratorError;
use uqchaos_core::model::{
    CompletedRun, FeatureStatistics, Method, ResultStore, SensitivityShare,
};

#[derive(Debug)]
pub enum StorageError {
    Io(String),
    Parse(String),
    Serialize(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(msg) => write!(f, "IO error: {msg}"),
            StorageError::Parse(msg) => write!(f, "Parse error: {msg}"),
            StorageError::Serialize(msg) => write!(f, "Serialization error: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Statistics of one feature as laid out on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureGroup {
    pub t: Option<Vec<f64>>,
    pub shape: Vec<usize>,
    #[serde(rename = "E")]
    pub mean: Vec<f64>,
    #[serde(rename = "Var")]
    pub variance: Vec<f64>,
    pub p_05: Vec<f64>,
    pub p_95: Vec<f64>,
    #[serde(default)]
    pub sensitivity: Option<Vec<Vec<f64>>>,
    pub nodes_used: usize,
    pub nodes_excluded: usize,
}

impl From<&FeatureStatistics> for FeatureGroup {
    fn from(stats: &FeatureStatistics) -> Self {
        Self {
            t: stats.time.clone(),
            shape: stats.shape.clone(),
            mean: stats.mean.clone(),
            variance: stats.variance.clone(),
            p_05: stats.p_05.clone(),
            p_95: stats.p_95.clone(),
            sensitivity: stats.sensitivity.clone(),
            nodes_used: stats.nodes_used,
            nodes_excluded: stats.nodes_excluded,
        }
    }
}

/// One saved run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRun {
    pub name: String,
    pub method: Method,
    pub uncertain_parameters: Vec<String>,
    pub features: Vec<String>,
    pub node_count: usize,
    pub started_at: jiff::Timestamp,
    pub elapsed_seconds: f64,
    #[serde(default)]
    pub sensitivity_ranking: Vec<SensitivityShare>,
    pub groups: BTreeMap<String, FeatureGroup>,
}

impl From<&CompletedRun> for StoredRun {
    fn from(run: &CompletedRun) -> Self {
        let meta = &run.metadata;
        Self {
            name: meta.name.clone(),
            method: meta.method,
            uncertain_parameters: meta.uncertain_parameters.clone(),
            features: meta.features.clone(),
            node_count: meta.node_count,
            started_at: meta.started_at,
            elapsed_seconds: meta.elapsed_seconds,
            sensitivity_ranking: run.statistics.sensitivity_ranking.clone(),
            groups: run
                .statistics
                .features
                .iter()
                .map(|(name, stats)| (name.clone(), FeatureGroup::from(stats)))
                .collect(),
        }
    }
}

/// Writes every completed run into one directory
#[derive(Debug, Clone)]
pub struct YamlStore {
    dir: PathBuf,
}

impl YamlStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.yaml", sanitize_filename(name)))
    }

    pub fn write(&self, run: &CompletedRun) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| StorageError::Io(format!("Failed to create output directory: {e}")))?;

        let yaml = serde_saphyr::to_string(&StoredRun::from(run))
            .map_err(|e| StorageError::Serialize(format!("Failed to serialize run: {e}")))?;

        let path = self.path_for(&run.metadata.name);
        fs::write(&path, yaml)
            .map_err(|e| StorageError::Io(format!("Failed to write {}: {e}", path.display())))?;
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<StoredRun, StorageError> {
        let path = self.path_for(name);
        let content = fs::read_to_string(&path)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {e}", path.display())))?;

        serde_saphyr::from_str(&content)
            .map_err(|e| StorageError::Parse(format!("Failed to parse {}: {e}", path.display())))
    }
}

impl ResultStore for YamlStore {
    fn save(&self, name: &str, run: &CompletedRun) -> Result<(), CollaboratorError> {
        let path = self.write(run)?;
        tracing::info!(run = name, path = %path.display(), "saved run");
        Ok(())
    }
}

/// Keep file names portable: parameter names end up in run names
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
