//! Models that run as external commands
//!
//! Every node spawns the command once. The parameter assignment is written to
//! the command's stdin as a JSON object (`{"name": value, ...}`) and the
//! command answers on stdout with `{"t": [...] | null, "U": value}`, where
//! `U` is a number, a list or a list of lists.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use uqchaos_core::error::EvaluationError;
use uqchaos_core::model::{FeatureValue, Model, ModelOutput, ModelSpec, ParameterAssignment};

/// Exit signal the kernel's out-of-memory killer uses
#[cfg(unix)]
const SIGKILL: i32 = 9;

/// How to launch the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandModel {
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ModelReply {
    #[serde(default)]
    t: Option<Vec<f64>>,
    #[serde(rename = "U")]
    u: FeatureValue,
}

impl CommandModel {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn execute(&self, parameters: &ParameterAssignment) -> Result<ModelOutput, EvaluationError> {
        let input: BTreeMap<&str, f64> = parameters.iter().collect();
        let input = serde_json::to_vec(&input)
            .map_err(|e| EvaluationError::Failed(format!("failed to encode parameters: {e}")))?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            EvaluationError::Failed(format!("failed to start '{}': {e}", self.program))
        })?;
        if let Some(mut stdin) = child.stdin.take() {
            // A model that ignores its input may close stdin early
            if let Err(e) = stdin.write_all(&input) {
                tracing::debug!(model = %self.name, error = %e, "model closed stdin");
            }
        }
        let output = child
            .wait_with_output()
            .map_err(|e| EvaluationError::Failed(format!("failed to wait for model: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().last().unwrap_or("").trim().to_string();

            #[cfg(unix)]
            {
                use std::os::unix::process::ExitStatusExt;
                if output.status.signal() == Some(SIGKILL) {
                    return Err(EvaluationError::ResourceExhausted(format!(
                        "model '{}' was killed",
                        self.name
                    )));
                }
            }

            return Err(EvaluationError::Failed(format!(
                "model '{}' exited with {}: {detail}",
                self.name, output.status
            )));
        }

        let reply: ModelReply = serde_json::from_slice(&output.stdout)
            .map_err(|e| EvaluationError::Failed(format!("unreadable model output: {e}")))?;

        Ok(ModelOutput {
            time: reply.t,
            value: reply.u,
            interpolant: None,
        })
    }
}

struct CommandInstance<'a> {
    spec: &'a CommandModel,
}

impl Model for CommandInstance<'_> {
    fn run(&mut self, parameters: &ParameterAssignment) -> Result<ModelOutput, EvaluationError> {
        self.spec.execute(parameters)
    }
}

impl ModelSpec for CommandModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn build(&self) -> Box<dyn Model + '_> {
        Box::new(CommandInstance { spec: self })
    }
}
