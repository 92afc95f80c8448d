use std::fmt;

/// Errors in the analysis setup. Always surfaced before any model evaluation starts.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A parameter was selected for analysis but has no distribution
    MissingDistribution(String),
    UnknownParameter(String),
    DuplicateParameter(String),
    NoUncertainParameters,
    InvalidDistribution {
        parameter: String,
        reason: String,
    },
    InvalidCorrelation(String),
    /// Correlated parameters can only be expanded through the Rosenblatt transform
    DependenceRequiresTransform,
    UnknownFeature(String),
    InvalidSetting {
        setting: &'static str,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingDistribution(name) => {
                write!(f, "parameter '{name}' has no distribution")
            }
            ConfigError::UnknownParameter(name) => write!(f, "unknown parameter '{name}'"),
            ConfigError::DuplicateParameter(name) => {
                write!(f, "parameter '{name}' is defined more than once")
            }
            ConfigError::NoUncertainParameters => write!(f, "no uncertain parameters"),
            ConfigError::InvalidDistribution { parameter, reason } => {
                write!(f, "invalid distribution for '{parameter}': {reason}")
            }
            ConfigError::InvalidCorrelation(reason) => {
                write!(f, "invalid correlation matrix: {reason}")
            }
            ConfigError::DependenceRequiresTransform => write!(
                f,
                "correlated parameters require the rosenblatt transform to be enabled"
            ),
            ConfigError::UnknownFeature(name) => write!(f, "unknown feature '{name}'"),
            ConfigError::InvalidSetting { setting, reason } => {
                write!(f, "invalid setting '{setting}': {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Failure reported by a model or feature extractor for a single node.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// Memory or other resource exhaustion. Aborts the whole batch.
    ResourceExhausted(String),
    /// Any other failure. Only the affected node is masked out.
    Failed(String),
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationError::ResourceExhausted(msg) => write!(f, "resource exhausted: {msg}"),
            EvaluationError::Failed(msg) => write!(f, "evaluation failed: {msg}"),
        }
    }
}

impl std::error::Error for EvaluationError {}

/// A batch of model evaluations was abandoned
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationAbort {
    pub node: usize,
    pub reason: String,
}

impl fmt::Display for EvaluationAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "evaluation aborted at node {}: {}",
            self.node, self.reason
        )
    }
}

impl std::error::Error for EvaluationAbort {}

/// A feature result that does not have the expected `(time, value[, interpolant])` layout
#[derive(Debug, Clone, PartialEq)]
pub struct FormatMismatch {
    pub feature: String,
    pub node: usize,
    pub reason: String,
}

impl fmt::Display for FormatMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "return from feature {} at node {} does not fit the format (t, U, interpolation): {}",
            self.feature, self.node, self.reason
        )
    }
}

impl std::error::Error for FormatMismatch {}

/// Errors from a collaborator (result store or plotter)
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug)]
pub enum AnalysisError {
    Config(ConfigError),
    Regression { feature: String, reason: String },
    Persistence(CollaboratorError),
    Plotting(CollaboratorError),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::Config(e) => write!(f, "{e}"),
            AnalysisError::Regression { feature, reason } => {
                write!(f, "regression failed for feature {feature}: {reason}")
            }
            AnalysisError::Persistence(e) => write!(f, "failed to save results: {e}"),
            AnalysisError::Plotting(e) => write!(f, "failed to plot results: {e}"),
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalysisError::Config(e) => Some(e),
            AnalysisError::Persistence(e) | AnalysisError::Plotting(e) => Some(e.as_ref()),
            AnalysisError::Regression { .. } => None,
        }
    }
}

impl From<ConfigError> for AnalysisError {
    fn from(e: ConfigError) -> Self {
        AnalysisError::Config(e)
    }
}
