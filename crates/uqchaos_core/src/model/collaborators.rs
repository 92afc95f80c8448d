//! Seams to the outside world: the simulated model, the feature library,
//! result persistence and plotting.

use std::fmt;

use super::output::{FeatureOutput, ModelOutput};
use super::parameters::ParameterAssignment;
use super::results::CompletedRun;
use crate::error::{CollaboratorError, EvaluationError};

/// One model instance. Built fresh for every node.
pub trait Model {
    fn run(&mut self, parameters: &ParameterAssignment) -> Result<ModelOutput, EvaluationError>;
}

/// Shareable description of a model, used by worker threads to build instances
pub trait ModelSpec: Send + Sync {
    fn name(&self) -> &str;

    fn build(&self) -> Box<dyn Model + '_>;
}

/// One feature extractor instance. Built fresh for every node.
pub trait Features {
    /// Compute feature `name` from a model output.
    ///
    /// Returning an output whose value is `None` marks the feature as
    /// unavailable for this node.
    fn calculate(
        &mut self,
        name: &str,
        output: &ModelOutput,
    ) -> Result<FeatureOutput, EvaluationError>;
}

/// Shareable description of a feature library
pub trait FeatureSpec: Send + Sync {
    /// Names of every feature the library can compute
    fn implemented_features(&self) -> Vec<String>;

    fn build(&self) -> Box<dyn Features + '_>;
}

/// Receives every completed run
pub trait ResultStore: Send + Sync {
    fn save(&self, name: &str, run: &CompletedRun) -> Result<(), CollaboratorError>;
}

/// Renders every completed run
pub trait Plotter: Send + Sync {
    fn plot(&self, name: &str, run: &CompletedRun) -> Result<(), CollaboratorError>;
}

/// Model backed by a closure
pub struct FnModel<F> {
    name: String,
    function: F,
}

impl<F> FnModel<F>
where
    F: Fn(&ParameterAssignment) -> Result<ModelOutput, EvaluationError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, function: F) -> Self {
        Self {
            name: name.into(),
            function,
        }
    }
}

impl<F> fmt::Debug for FnModel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnModel").field("name", &self.name).finish()
    }
}

struct FnModelInstance<'a, F>(&'a F);

impl<F> Model for FnModelInstance<'_, F>
where
    F: Fn(&ParameterAssignment) -> Result<ModelOutput, EvaluationError>,
{
    fn run(&mut self, parameters: &ParameterAssignment) -> Result<ModelOutput, EvaluationError> {
        (self.0)(parameters)
    }
}

impl<F> ModelSpec for FnModel<F>
where
    F: Fn(&ParameterAssignment) -> Result<ModelOutput, EvaluationError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn build(&self) -> Box<dyn Model + '_> {
        Box::new(FnModelInstance(&self.function))
    }
}
