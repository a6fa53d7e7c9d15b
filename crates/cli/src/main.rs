mod chat;

use clap::Parser;
use parley_llm::{
    ProviderError, Settings, SettingsError, TelemetryError, create_provider, telemetry,
};
use snafu::{ResultExt, Snafu};
use tokio::io::BufReader;

use crate::chat::{ChatIoError, ChatLoop};

/// Chat with Mistral from the terminal.
#[derive(Debug, Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Response format: plain, bullets or numbered. Asked interactively when omitted.
    #[arg(long)]
    format: Option<String>,

    /// Model to use instead of the configured one.
    #[arg(long)]
    model: Option<String>,
}

#[derive(Debug, Snafu)]
enum CliError {
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
    #[snafu(display("{source}"))]
    Terminal {
        stage: &'static str,
        source: ChatIoError,
    },
}

#[snafu::report]
fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    let mut settings = Settings::load().context(SettingsSnafu {
        stage: "load-settings",
    })?;
    if let Some(model) = cli.model {
        settings.llm_model = model;
    }
    let _guard = telemetry::init(&settings.log_file, false).context(TelemetrySnafu {
        stage: "init-telemetry",
    })?;

    let provider = create_provider(settings.provider_config()).context(ProviderSnafu {
        stage: "create-provider",
    })?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context(RuntimeSnafu {
            stage: "build-runtime",
        })?;

    runtime.block_on(async {
        let input = BufReader::new(tokio::io::stdin());
        let output = std::io::stdout().lock();
        ChatLoop::new(provider.as_ref(), input, output)
            .run(cli.format.as_deref())
            .await
            .context(TerminalSnafu { stage: "chat-loop" })
            .map(|_| ())
    })
}
