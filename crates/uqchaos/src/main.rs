use clap::Parser;
use uqchaos::{Args, default_data_dir, execute, init_logging};

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let data_dir = args.data_dir.clone().unwrap_or_else(default_data_dir);

    let _guard = init_logging(&data_dir, &args.log_level)?;

    let summary = execute(&args, &data_dir)?;
    tracing::info!(
        completed = summary.completed.len(),
        aborted = summary.aborted.len(),
        "analysis finished"
    );

    if !summary.aborted.is_empty() {
        color_eyre::eyre::bail!("aborted runs: {}", summary.aborted.join(", "));
    }
    Ok(())
}
