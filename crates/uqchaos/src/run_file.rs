//! Run files
//!
//! A run file is a YAML document describing one analysis: the model command,
//! its parameters, the features to compute and the analysis settings.
//!
//! ```yaml
//! name: decay
//! model:
//!   name: decay
//!   program: python3
//!   args: [decay.py]
//! parameters:
//!   - name: k
//!     value: 1.0
//!     distribution: { type: Uniform, min: 0.9, max: 1.1 }
//!   - name: u0
//!     value: 1.0
//! features: all
//! analysis:
//!   polynomial_order: 4
//!   seed: 7
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uqchaos_core::error::ConfigError;
use uqchaos_core::model::{Parameter, ParameterSet};
use uqchaos_core::{AnalysisConfig, FeatureSelection, UncertaintyBuilder};

use crate::command_model::CommandModel;
use crate::storage::StorageError;

/// Features requested by a run file: a keyword (`all` or `none`) or a list of names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureList {
    Keyword(String),
    Names(Vec<String>),
}

impl Default for FeatureList {
    fn default() -> Self {
        FeatureList::Keyword("none".to_string())
    }
}

impl FeatureList {
    pub fn selection(&self) -> Result<FeatureSelection, ConfigError> {
        match self {
            FeatureList::Keyword(k) if k == "all" => Ok(FeatureSelection::All),
            FeatureList::Keyword(k) if k == "none" => Ok(FeatureSelection::None),
            FeatureList::Keyword(k) => Err(ConfigError::InvalidSetting {
                setting: "features",
                reason: format!("expected 'all', 'none' or a list of names, got '{k}'"),
            }),
            FeatureList::Names(names) => Ok(FeatureSelection::Named(names.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFile {
    /// Base name of the saved results; defaults to the model name
    #[serde(default)]
    pub name: Option<String>,
    pub model: CommandModel,
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub correlation: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub features: FeatureList,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl RunFile {
    pub fn parse(content: &str) -> Result<Self, StorageError> {
        serde_saphyr::from_str(content)
            .map_err(|e| StorageError::Parse(format!("Failed to parse run file: {e}")))
    }

    /// Load a run file. A model without a working directory runs next to the file.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let content = fs::read_to_string(path)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {e}", path.display())))?;
        let mut run_file = Self::parse(&content)?;

        if run_file.model.working_dir.is_none()
            && let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            run_file.model.working_dir = Some(parent.to_path_buf());
        }
        Ok(run_file)
    }

    /// Builder carrying everything the file describes; collaborators are added by the caller
    pub fn builder(&self) -> Result<UncertaintyBuilder, ConfigError> {
        let parameters = ParameterSet::new(self.parameters.clone())?;
        let parameters = match &self.correlation {
            Some(matrix) => parameters.with_correlation(matrix.clone()),
            None => parameters,
        };

        let mut builder = UncertaintyBuilder::from_arc(Arc::new(self.model.clone()))
            .parameters(parameters)
            .features(self.features.selection()?)
            .config(self.analysis.clone());
        if let Some(name) = &self.name {
            builder = builder.output_name(name.clone());
        }
        Ok(builder)
    }
}
