//! Integration tests for the uqchaos pipeline
//!
//! Tests are organized by topic:
//! - `pipeline` - Polynomial chaos statistics and sensitivity end to end
//! - `reconciliation` - Variable-length time axes through a full run
//! - `orchestrator` - Run entry points, masking, aborts and collaborators
//! - `monte_carlo` - The Monte Carlo strategy

use std::sync::Mutex;

use crate::error::{CollaboratorError, EvaluationError};
use crate::model::{CompletedRun, FnModel, ModelOutput, ParameterAssignment, Plotter, ResultStore};

mod orchestrator;
mod pipeline;

/// Store that keeps every saved run in memory
#[derive(Default)]
pub(crate) struct MemoryStore {
    pub runs: Mutex<Vec<(String, CompletedRun)>>,
}

impl MemoryStore {
    pub fn names(&self) -> Vec<String> {
        self.runs
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl ResultStore for MemoryStore {
    fn save(&self, name: &str, run: &CompletedRun) -> Result<(), CollaboratorError> {
        self.runs
            .lock()
            .unwrap()
            .push((name.to_string(), run.clone()));
        Ok(())
    }
}

impl Plotter for MemoryStore {
    fn plot(&self, name: &str, run: &CompletedRun) -> Result<(), CollaboratorError> {
        self.save(name, run)
    }
}

type ModelFn = fn(&ParameterAssignment) -> Result<ModelOutput, EvaluationError>;

pub(crate) fn value(p: &ParameterAssignment, name: &str) -> f64 {
    p.get(name).unwrap_or_default()
}

/// `a + 2b` as a scalar output
pub(crate) fn linear_model() -> FnModel<ModelFn> {
    FnModel::new("linear", |p| {
        Ok(ModelOutput::scalar(value(p, "a") + 2.0 * value(p, "b")))
    })
}

/// `a + 2b` held over a short time series
pub(crate) fn linear_series_model() -> FnModel<ModelFn> {
    FnModel::new("linear_series", |p| {
        let level = value(p, "a") + 2.0 * value(p, "b");
        let time: Vec<f64> = (0..5).map(f64::from).collect();
        let values = time.iter().map(|t| level * (1.0 + t)).collect();
        Ok(ModelOutput::series(time, values))
    })
}
