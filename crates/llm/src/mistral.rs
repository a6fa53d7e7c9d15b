use std::time::Duration;

use parley_core::Message;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, ensure};

use super::provider::{
    BoxFuture, BuildClientSnafu, CompletionRequest, LlmProvider, MalformedResponseSnafu,
    MissingApiKeySnafu, ProviderConfig, ProviderError, ProviderResult, RateLimitedSnafu,
    UnauthorizedSnafu, UpstreamSnafu,
};

pub const MISTRAL_PROVIDER_ID: &str = "mistral";
pub const DEFAULT_MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";
pub const DEFAULT_MISTRAL_MODEL: &str = "mistral-small-latest";

/// Statuses worth another attempt.
const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];
const MAX_BACKOFF: Duration = Duration::from_secs(120);
/// Upstream error bodies are cut to this many characters.
const ERROR_BODY_LIMIT: usize = 1000;

#[derive(Serialize)]
struct ChatCompletionPayload<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Deserialize)]
struct ChatCompletionMessage {
    content: String,
}

/// Client for Mistral's OpenAI-style `/chat/completions` endpoint.
///
/// Transient failures (timeouts, refused connections, 429 and 5xx gateway statuses) are
/// retried with exponential backoff before being mapped to a [`ProviderError`].
#[derive(Clone)]
pub struct MistralClient {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl MistralClient {
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "mistral-client-new",
                provider_id: config.provider_id.clone(),
            }
        );

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context(BuildClientSnafu {
                stage: "build-client",
            })?;

        Ok(Self { config, client })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    async fn send_with_retries(
        &self,
        payload: &ChatCompletionPayload<'_>,
    ) -> ProviderResult<reqwest::Response> {
        let url = self.completions_url();
        let mut retries = 0u32;

        loop {
            let result = self
                .client
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .json(payload)
                .send()
                .await;
            let can_retry = retries < self.config.max_retries;

            match result {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if !(can_retry && RETRY_STATUSES.contains(&status)) {
                        return Ok(response);
                    }

                    retries += 1;
                    tracing::warn!(
                        provider_id = %self.config.provider_id,
                        status,
                        retry = retries,
                        "retrying provider request after retryable status"
                    );
                }
                Err(error) if can_retry && (error.is_timeout() || error.is_connect()) => {
                    retries += 1;
                    tracing::warn!(
                        provider_id = %self.config.provider_id,
                        retry = retries,
                        error = %error,
                        "retrying provider request after transport failure"
                    );
                }
                Err(error) => return Err(classify_transport_error(error, "send-completion")),
            }

            let delay = backoff_delay(self.config.backoff_factor, retries);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    async fn complete_inner(&self, request: CompletionRequest) -> ProviderResult<String> {
        tracing::info!(
            provider_id = %self.config.provider_id,
            model = %self.config.model,
            messages = request.messages.len(),
            "sending chat request"
        );

        let payload = ChatCompletionPayload {
            model: &self.config.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        tracing::debug!(
            has_max_tokens = payload.max_tokens.is_some(),
            temperature = payload.temperature,
            "completion payload prepared"
        );

        let response = self.send_with_retries(&payload).await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| classify_transport_error(error, "read-completion-body"))?;

        if !status.is_success() {
            let body = truncate_chars(&body, ERROR_BODY_LIMIT);
            tracing::warn!(
                provider_id = %self.config.provider_id,
                status = status.as_u16(),
                body = %body,
                "non-OK response from provider"
            );

            return match status.as_u16() {
                401 => UnauthorizedSnafu {
                    stage: "completion-status",
                }
                .fail(),
                429 => RateLimitedSnafu {
                    stage: "completion-status",
                }
                .fail(),
                code => UpstreamSnafu {
                    stage: "completion-status",
                    status: code,
                    body,
                }
                .fail(),
            };
        }

        let parsed = serde_json::from_str::<ChatCompletionResponse>(&body).map_err(|error| {
            tracing::error!(error = %error, "malformed response from provider");
            ProviderError::MalformedResponse {
                stage: "parse-completion",
                details: error.to_string(),
            }
        })?;

        let Some(choice) = parsed.choices.into_iter().next() else {
            return MalformedResponseSnafu {
                stage: "parse-completion",
                details: "response has no choices".to_string(),
            }
            .fail();
        };

        tracing::info!(provider_id = %self.config.provider_id, "received response from provider");
        Ok(choice.message.content)
    }
}

impl LlmProvider for MistralClient {
    fn id(&self) -> &str {
        &self.config.provider_id
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn complete<'a>(&'a self, request: CompletionRequest) -> BoxFuture<'a, ProviderResult<String>> {
        Box::pin(self.complete_inner(request))
    }
}

/// Delay before retry number `retry` (1-based).
///
/// The first retry goes out immediately; later ones wait `factor * 2^(retry - 1)` seconds.
pub fn backoff_delay(factor: f64, retry: u32) -> Duration {
    if retry <= 1 {
        return Duration::ZERO;
    }

    let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
    let seconds = (factor.max(0.0) * 2f64.powi(exponent)).min(MAX_BACKOFF.as_secs_f64());
    Duration::from_secs_f64(seconds)
}

fn classify_transport_error(error: reqwest::Error, stage: &'static str) -> ProviderError {
    if error.is_timeout() {
        tracing::error!(error = %error, "provider request timed out");
        return ProviderError::Timeout {
            stage,
            source: error,
        };
    }
    if error.is_connect() {
        tracing::error!(error = %error, "could not connect to provider");
        return ProviderError::Connection {
            stage,
            source: error,
        };
    }

    tracing::error!(error = %error, "unexpected error when calling provider");
    ProviderError::Unexpected {
        stage,
        source: error,
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
