mod collaborators;
mod output;
mod parameters;
mod results;

pub use collaborators::{FeatureSpec, Features, FnModel, Model, ModelSpec, Plotter, ResultStore};
pub use output::{
    DIRECT_COMPARISON, FeatureOutput, FeatureValue, Interpolate, LinearInterpolant, ModelOutput,
    NodeResult,
};
pub use parameters::{Marginal, Parameter, ParameterAssignment, ParameterSet};
pub use results::{
    CompletedRun, FeatureStatistics, Method, RunMetadata, RunOutcome, RunTarget,
    SensitivityShare, StatisticsBundle,
};
