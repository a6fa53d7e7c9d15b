use parley_llm::{ProviderError, SettingsError, TelemetryError};
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ServerError {
    #[snafu(display("{source}"))]
    Settings {
        stage: &'static str,
        source: SettingsError,
    },
    #[snafu(display("failed to initialise logging: {source}"))]
    Telemetry {
        stage: &'static str,
        source: TelemetryError,
    },
    #[snafu(display("failed to create LLM provider: {source}"))]
    Provider {
        stage: &'static str,
        source: ProviderError,
    },
    #[snafu(display("failed to start async runtime: {source}"))]
    Runtime {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("failed to bind {addr}: {source}"))]
    Bind {
        stage: &'static str,
        addr: String,
        source: std::io::Error,
    },
    #[snafu(display("server terminated: {source}"))]
    Serve {
        stage: &'static str,
        source: std::io::Error,
    },
}

pub type ServerResult<T> = Result<T, ServerError>;
