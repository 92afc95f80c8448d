use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Maximum log file size before rotation (5 MB)
const MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;
/// Size to keep after rotation (1 MB of most recent logs)
const KEEP_SIZE: u64 = 1024 * 1024;

pub const LOG_FILE: &str = "uqchaos.log";

/// Last `keep` bytes of the file at `path`, starting on a line boundary
fn tail_lines(path: &Path, keep: u64) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    file.seek(SeekFrom::Start(len.saturating_sub(keep)))?;

    let mut tail = Vec::with_capacity(keep.min(len) as usize);
    file.read_to_end(&mut tail)?;
    if len > keep
        && let Some(newline) = tail.iter().position(|&b| b == b'\n')
    {
        tail.drain(..=newline);
    }
    Ok(tail)
}

/// Cut `uqchaos.log` back to its recent lines once it passes MAX_LOG_SIZE
fn rotate_log_if_needed(log_path: &Path) -> std::io::Result<()> {
    match fs::metadata(log_path) {
        Ok(meta) if meta.len() > MAX_LOG_SIZE => {}
        Ok(_) => return Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    }

    let tail = tail_lines(log_path, KEEP_SIZE)?;
    let mut file = File::create(log_path)?;
    writeln!(file, "--- uqchaos log rotated, kept the last {} bytes ---", tail.len())?;
    file.write_all(&tail)
}

/// Initialize logging.
///
/// Every event passing the filter goes to `{data_dir}/uqchaos.log` through a
/// background writer; warnings and errors are echoed to stderr as well. The
/// filter comes from `RUST_LOG` when set, otherwise from `level`.
///
/// The returned guard flushes the log file when dropped, so keep it alive
/// until the program exits.
pub fn init_logging(data_dir: &Path, level: &str) -> color_eyre::Result<WorkerGuard> {
    fs::create_dir_all(data_dir)?;

    let log_path = data_dir.join(LOG_FILE);
    if let Err(e) = rotate_log_if_needed(&log_path) {
        eprintln!("Warning: Failed to rotate log file: {e}");
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let default_filter = format!("uqchaos={level},uqchaos_core={level}");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(env_filter),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .with_filter(LevelFilter::WARN),
        )
        .init();

    tracing::info!(log_path = %log_path.display(), "uqchaos logging initialized");
    Ok(guard)
}
