mod api;
mod error;

use snafu::ResultExt;

use crate::api::{AppState, router};
use crate::error::{
    BindSnafu, ProviderSnafu, RuntimeSnafu, ServeSnafu, ServerResult, SettingsSnafu,
    TelemetrySnafu,
};
use parley_llm::{Settings, create_provider, telemetry};

#[snafu::report]
fn main() -> ServerResult<()> {
    let settings = Settings::load().context(SettingsSnafu {
        stage: "load-settings",
    })?;
    let _guard = telemetry::init(&settings.log_file, true).context(TelemetrySnafu {
        stage: "init-telemetry",
    })?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context(RuntimeSnafu {
            stage: "build-runtime",
        })?
        .block_on(serve(settings))
}

async fn serve(settings: Settings) -> ServerResult<()> {
    let provider = create_provider(settings.provider_config()).context(ProviderSnafu {
        stage: "create-provider",
    })?;
    let app = router(AppState::new(provider), &settings.static_dir);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .context(BindSnafu {
            stage: "bind-listener",
            addr: settings.bind_addr.clone(),
        })?;

    tracing::info!(
        addr = %settings.bind_addr,
        model = %settings.llm_model,
        static_dir = %settings.static_dir.display(),
        "parley server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context(ServeSnafu { stage: "serve" })?;

    tracing::info!("parley server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
