use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const DEFAULT_FILTER: &str = "info";
const DEFAULT_LOG_FILE_NAME: &str = "app.log";
const MAX_LOG_FILES: usize = 5;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TelemetryError {
    #[snafu(display("failed to create log directory {}: {source}", path.display()))]
    CreateLogDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to open rolling log file: {source}"))]
    OpenAppender {
        stage: &'static str,
        source: tracing_appender::rolling::InitError,
    },
}

pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Installs the global subscriber: a daily-rotated file under `log_file`'s directory and,
/// when `console` is set, a stdout layer. Both honour `RUST_LOG`.
///
/// Keep the returned guard alive for the life of the process; dropping it flushes and stops the
/// background writer. A second call leaves the first subscriber in place.
pub fn init(log_file: &Path, console: bool) -> TelemetryResult<WorkerGuard> {
    let (directory, file_name) = split_log_path(log_file);
    std::fs::create_dir_all(&directory).context(CreateLogDirSnafu {
        stage: "telemetry-create-dir",
        path: directory.clone(),
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_name)
        .max_log_files(MAX_LOG_FILES)
        .build(&directory)
        .context(OpenAppenderSnafu {
            stage: "telemetry-open-appender",
        })?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let env_filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_filter(env_filter());

    let console_layer = console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_filter(env_filter())
    });

    if tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("global subscriber already installed");
    }

    Ok(guard)
}

/// Directory and file-name prefix for the rolling appender.
fn split_log_path(log_file: &Path) -> (PathBuf, String) {
    let directory = log_file
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = log_file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_LOG_FILE_NAME.to_string());
    (directory, file_name)
}
