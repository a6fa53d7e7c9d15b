use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::{DecodeBodySnafu, ReadBodySnafu, SendRequestSnafu, TransportResult};
use crate::message::{FormatStyle, Message};

pub const CHAT_ENDPOINT_PATH: &str = "/api/chat";

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub format_style: FormatStyle,
}

/// Success body of `POST /api/chat`. Both fields are optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
}

/// Error body of `POST /api/chat`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// A response was obtained and decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Reply(ChatReply),
    /// Non-success status; `error` is the server's description.
    Rejected { status: u16, error: String },
}

/// Sends one turn to the chat endpoint.
///
/// Futures are not `Send`: in the browser they run on the page's only thread.
pub trait Transport {
    fn send_turn<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> LocalBoxFuture<'a, TransportResult<TurnOutcome>>;
}

/// `reqwest` transport; uses `fetch` when compiled to wasm.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Targets `{base_url}/api/chat`.
    pub fn new(base_url: &str) -> Self {
        Self::with_endpoint(format!(
            "{}{CHAT_ENDPOINT_PATH}",
            base_url.trim_end_matches('/')
        ))
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_turn(&self, request: &ChatRequest) -> TransportResult<TurnOutcome> {
        tracing::debug!(
            endpoint = %self.endpoint,
            messages = request.messages.len(),
            format_style = %request.format_style,
            "sending chat turn"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .context(SendRequestSnafu {
                stage: "send-chat-request",
                endpoint: self.endpoint.clone(),
            })?;

        let status = response.status();
        let body = response.bytes().await.context(ReadBodySnafu {
            stage: "read-chat-response",
        })?;

        if status.is_success() {
            let reply = serde_json::from_slice::<ChatReply>(&body).context(DecodeBodySnafu {
                stage: "decode-chat-reply",
                status: status.as_u16(),
            })?;
            return Ok(TurnOutcome::Reply(reply));
        }

        let error_body = serde_json::from_slice::<ErrorBody>(&body).context(DecodeBodySnafu {
            stage: "decode-chat-error",
            status: status.as_u16(),
        })?;
        let error = error_body.error.unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

        tracing::warn!(status = status.as_u16(), %error, "chat endpoint rejected turn");
        Ok(TurnOutcome::Rejected {
            status: status.as_u16(),
            error,
        })
    }
}

impl Transport for HttpTransport {
    fn send_turn<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> LocalBoxFuture<'a, TransportResult<TurnOutcome>> {
        self.post_turn(request).boxed_local()
    }
}
