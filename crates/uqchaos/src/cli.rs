use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::WrapErr;
use uqchaos_core::model::{Method, RunOutcome};

use crate::report::ConsoleReport;
use crate::run_file::RunFile;
use crate::storage::YamlStore;

#[derive(Parser, Debug)]
#[command(name = "uqchaos")]
#[command(about = "Uncertainty quantification and sensitivity analysis of external models")]
pub struct Args {
    /// YAML run file describing the model, its parameters and the analysis
    pub run_file: PathBuf,

    /// Path to the data directory (default: ~/.uqchaos/)
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Where results are saved (default: <data_dir>/results)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    #[arg(short, long, value_enum, default_value_t = MethodArg::Pc)]
    pub method: MethodArg,

    /// Vary every parameter jointly, each parameter alone, or both
    #[arg(short, long, value_enum, default_value_t = TargetArg::All)]
    pub target: TargetArg,

    /// Worker threads, overriding the run file
    #[arg(long)]
    pub cpus: Option<usize>,

    /// Random seed, overriding the run file
    #[arg(long)]
    pub seed: Option<u64>,

    /// Do not print run summaries
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    /// Polynomial chaos expansion
    Pc,
    /// Monte Carlo
    Mc,
}

impl From<MethodArg> for Method {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Pc => Method::PolynomialChaos,
            MethodArg::Mc => Method::MonteCarlo,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TargetArg {
    All,
    Single,
    Both,
}

pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".uqchaos")
}

/// Completed and aborted runs of one invocation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub completed: Vec<String>,
    pub aborted: Vec<String>,
}

impl Summary {
    fn record(&mut self, label: String, outcome: &RunOutcome) {
        match outcome {
            RunOutcome::Completed(run) => self.completed.push(run.metadata.name.clone()),
            RunOutcome::Aborted { reason, .. } => {
                tracing::error!(run = %label, "run aborted: {reason}");
                self.aborted.push(label);
            }
        }
    }
}

/// Load the run file, run every requested analysis and save the results
pub fn execute(args: &Args, data_dir: &Path) -> color_eyre::Result<Summary> {
    let run_file = RunFile::load(&args.run_file)
        .wrap_err_with(|| format!("cannot load run file {}", args.run_file.display()))?;

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| data_dir.join("results"));

    let mut builder = run_file
        .builder()?
        .shared_store(Arc::new(YamlStore::new(output_dir)));
    if let Some(cpus) = args.cpus {
        builder = builder.cpus(cpus);
    }
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }
    if !args.quiet {
        builder = builder.plotter(ConsoleReport);
    }
    let analysis = builder.build()?;

    let method = Method::from(args.method);
    tracing::info!(
        run_file = %args.run_file.display(),
        method = method.label(),
        target = ?args.target,
        "starting analysis"
    );

    let mut summary = Summary::default();
    if matches!(args.target, TargetArg::All | TargetArg::Both) {
        let outcome = match method {
            Method::PolynomialChaos => analysis.all_parameters()?,
            Method::MonteCarlo => analysis.all_parameters_mc()?,
        };
        summary.record(analysis.output_name().to_string(), &outcome);
    }
    if matches!(args.target, TargetArg::Single | TargetArg::Both) {
        let outcomes = match method {
            Method::PolynomialChaos => analysis.single_parameters()?,
            Method::MonteCarlo => analysis.single_parameters_mc()?,
        };
        for (parameter, outcome) in &outcomes {
            let label = format!("{}:{parameter}", analysis.output_name());
            summary.record(label, outcome);
        }
    }

    Ok(summary)
}
