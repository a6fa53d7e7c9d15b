//! Upstream side of Parley: the chat-completion provider, system prompts, settings and
//! process-wide logging shared by the server and the terminal client.

use std::sync::Arc;

mod mistral;
mod prompt;
mod provider;
mod settings;
pub mod telemetry;

pub use mistral::{
    DEFAULT_MISTRAL_BASE_URL, DEFAULT_MISTRAL_MODEL, MISTRAL_PROVIDER_ID, MistralClient,
    backoff_delay,
};
pub use prompt::{ensure_system_message, system_prompt};
pub use provider::{
    BoxFuture, CompletionRequest, DEFAULT_TEMPERATURE, LlmProvider, ProviderConfig,
    ProviderError, ProviderResult,
};
pub use settings::{
    SETTINGS_DIRECTORY_NAME, SETTINGS_FILE_NAME, Settings, SettingsError, SettingsResult,
    default_settings_path, load_dotenv,
};
pub use telemetry::{TelemetryError, TelemetryResult};

pub fn create_provider(mut config: ProviderConfig) -> ProviderResult<Arc<dyn LlmProvider>> {
    if config.provider_id.is_empty() {
        config.provider_id = MISTRAL_PROVIDER_ID.to_string();
    }

    match config.provider_id.as_str() {
        MISTRAL_PROVIDER_ID => Ok(Arc::new(MistralClient::new(config)?)),
        _ => Err(ProviderError::UnsupportedProvider {
            stage: "create-provider",
            provider_id: config.provider_id,
        }),
    }
}
