//! Command-line front end for `uqchaos_core`
//!
//! Runs an uncertainty analysis of an external model described by a YAML run
//! file and saves the statistics of every run as YAML.

pub mod cli;
pub mod command_model;
pub mod logging;
pub mod report;
pub mod run_file;
pub mod storage;

pub use cli::{Args, Summary, default_data_dir, execute};
pub use command_model::CommandModel;
pub use logging::init_logging;
pub use report::ConsoleReport;
pub use run_file::RunFile;
pub use storage::{StorageError, StoredRun, YamlStore};
