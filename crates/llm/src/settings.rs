use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu, ensure};

use crate::mistral::{DEFAULT_MISTRAL_BASE_URL, DEFAULT_MISTRAL_MODEL, MISTRAL_PROVIDER_ID};
use crate::provider::ProviderConfig;

pub const SETTINGS_DIRECTORY_NAME: &str = "parley";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Environment variables that override the settings file.
const ENV_KEYS: [&str; 7] = [
    "mistral_api_key",
    "llm_model",
    "mistral_base_url",
    "api_timeout",
    "log_file",
    "bind_addr",
    "static_dir",
];

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to load settings: {source}"))]
    Extract {
        stage: &'static str,
        #[snafu(source(from(figment::Error, Box::new)))]
        source: Box<figment::Error>,
    },
    #[snafu(display("MISTRAL_API_KEY is not set. Please add it to your .env file."))]
    MissingApiKey { stage: &'static str },
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Runtime configuration shared by the server and the terminal client.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub mistral_api_key: Option<String>,
    pub llm_model: String,
    pub mistral_base_url: String,
    /// Upstream request timeout, in seconds.
    pub api_timeout: u64,
    pub log_file: PathBuf,
    pub bind_addr: String,
    pub static_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mistral_api_key: None,
            llm_model: DEFAULT_MISTRAL_MODEL.to_string(),
            mistral_base_url: DEFAULT_MISTRAL_BASE_URL.to_string(),
            api_timeout: 30,
            log_file: PathBuf::from("logs").join("app.log"),
            bind_addr: "127.0.0.1:5000".to_string(),
            static_dir: PathBuf::from("web"),
        }
    }
}

// Hand-written so the API key never reaches a log line.
impl fmt::Debug for Settings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Settings")
            .field(
                "mistral_api_key",
                &self.mistral_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("llm_model", &self.llm_model)
            .field("mistral_base_url", &self.mistral_base_url)
            .field("api_timeout", &self.api_timeout)
            .field("log_file", &self.log_file)
            .field("bind_addr", &self.bind_addr)
            .field("static_dir", &self.static_dir)
            .finish()
    }
}

impl Settings {
    /// Loads `.env`, the user settings file and the environment, in that order of precedence
    /// (environment wins).
    pub fn load() -> SettingsResult<Self> {
        load_dotenv();
        let path = default_settings_path();
        if let Some(path) = &path {
            tracing::debug!(path = %path.display(), "reading settings file if present");
        }
        Self::from_figment(Self::figment(path.as_deref()))
    }

    /// Layered configuration sources.
    pub fn figment(settings_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = settings_file {
            figment = figment.merge(Json::file(path));
        }
        figment.merge(Env::raw().only(&ENV_KEYS))
    }

    pub fn from_figment(figment: Figment) -> SettingsResult<Self> {
        let settings: Settings = figment.extract().context(ExtractSnafu {
            stage: "extract-settings",
        })?;

        ensure!(
            settings.api_key().is_some(),
            MissingApiKeySnafu {
                stage: "validate-settings",
            }
        );

        Ok(settings)
    }

    /// Trimmed API key, if a non-blank one is configured.
    pub fn api_key(&self) -> Option<&str> {
        self.mistral_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout)
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig::new(
            MISTRAL_PROVIDER_ID,
            self.api_key().unwrap_or_default(),
            self.mistral_base_url.as_str(),
            self.llm_model.as_str(),
        )
        .with_timeout(self.timeout())
    }
}

/// Loads `.env` from the working directory; a missing file is fine.
pub fn load_dotenv() {
    if let Err(error) = dotenvy::dotenv() {
        if !error.not_found() {
            tracing::warn!(error = %error, "failed to read .env file");
        }
    }
}

/// `<config dir>/parley/settings.json`, when the platform has a config directory.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(SETTINGS_DIRECTORY_NAME).join(SETTINGS_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        Jail::expect_with(|jail| {
            jail.set_env("MISTRAL_API_KEY", "secret");

            let settings =
                Settings::from_figment(Settings::figment(None)).map_err(|e| e.to_string())?;
            assert_eq!(settings.api_key(), Some("secret"));
            assert_eq!(settings.llm_model, DEFAULT_MISTRAL_MODEL);
            assert_eq!(settings.timeout(), Duration::from_secs(30));
            assert_eq!(settings.bind_addr, "127.0.0.1:5000");
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_settings_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "settings.json",
                r#"{"mistral_api_key": "from-file", "llm_model": "file-model", "api_timeout": 10}"#,
            )?;
            jail.set_env("LLM_MODEL", "env-model");

            let settings = Settings::from_figment(Settings::figment(Some(Path::new(
                "settings.json",
            ))))
            .map_err(|e| e.to_string())?;
            assert_eq!(settings.api_key(), Some("from-file"));
            assert_eq!(settings.llm_model, "env-model");
            assert_eq!(settings.api_timeout, 10);
            Ok(())
        });
    }

    #[test]
    fn blank_key_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("MISTRAL_API_KEY", "   ");

            let error = Settings::from_figment(Settings::figment(None)).unwrap_err();
            assert!(matches!(error, SettingsError::MissingApiKey { .. }));
            Ok(())
        });
    }

    #[test]
    fn debug_output_redacts_key() {
        let settings = Settings {
            mistral_api_key: Some("super-secret".into()),
            ..Settings::default()
        };
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn provider_config_carries_model_and_timeout() {
        let settings = Settings {
            mistral_api_key: Some(" key ".into()),
            api_timeout: 5,
            ..Settings::default()
        };
        let config = settings.provider_config();
        assert_eq!(config.api_key, "key");
        assert_eq!(config.model, DEFAULT_MISTRAL_MODEL);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.provider_id, MISTRAL_PROVIDER_ID);
    }
}
