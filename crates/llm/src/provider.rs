use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use parley_core::Message;
use snafu::Snafu;

pub const DEFAULT_TEMPERATURE: f64 = 0.7;

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub provider_id: String,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_factor: f64,
}

impl ProviderConfig {
    pub fn new(
        provider_id: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into().trim().to_string(),
            api_key: api_key.into().trim().to_string(),
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
            model: model.into().trim().to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_factor: 0.8,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff_factor: f64) -> Self {
        self.max_retries = max_retries;
        self.backoff_factor = backoff_factor;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub temperature: f64,
    pub max_tokens: Option<u64>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
        }
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    #[snafu(display("missing API key for provider '{provider_id}'"))]
    MissingApiKey {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("unsupported provider '{provider_id}'"))]
    UnsupportedProvider {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("failed to build HTTP client: {source}"))]
    BuildClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("Unauthorized - invalid API key for provider"))]
    Unauthorized { stage: &'static str },
    #[snafu(display("Rate limited by provider"))]
    RateLimited { stage: &'static str },
    #[snafu(display("Upstream API error: {body}"))]
    Upstream {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("The request to the LLM API timed out."))]
    Timeout {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("Could not connect to the LLM API. Check network."))]
    Connection {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("Malformed response from provider"))]
    MalformedResponse {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("Unexpected error when calling the LLM API. Check logs for details."))]
    Unexpected {
        stage: &'static str,
        source: reqwest::Error,
    },
}

impl ProviderError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ProviderError::MissingApiKey { .. } => "missing_api_key",
            ProviderError::UnsupportedProvider { .. } => "unsupported_provider",
            ProviderError::BuildClient { .. } | ProviderError::Unexpected { .. } => {
                "unexpected_error"
            }
            ProviderError::Unauthorized { .. } => "unauthorized",
            ProviderError::RateLimited { .. } => "rate_limited",
            ProviderError::Upstream { .. } => "upstream_error",
            ProviderError::Timeout { .. } => "timeout",
            ProviderError::Connection { .. } => "connection_error",
            ProviderError::MalformedResponse { .. } => "malformed_response",
        }
    }

    /// HTTP status associated with the failure, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Unauthorized { .. } => Some(401),
            ProviderError::RateLimited { .. } => Some(429),
            ProviderError::Upstream { status, .. } => Some(*status),
            ProviderError::Timeout { .. } => Some(504),
            ProviderError::Connection { .. } => Some(503),
            ProviderError::MissingApiKey { .. }
            | ProviderError::UnsupportedProvider { .. }
            | ProviderError::BuildClient { .. }
            | ProviderError::MalformedResponse { .. }
            | ProviderError::Unexpected { .. } => None,
        }
    }
}

/// A chat-completion backend.
pub trait LlmProvider: Send + Sync {
    fn id(&self) -> &str;
    fn model(&self) -> &str;
    /// Sends the full history and returns the assistant's text.
    fn complete<'a>(&'a self, request: CompletionRequest) -> BoxFuture<'a, ProviderResult<String>>;
}
