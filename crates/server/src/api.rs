use std::path::Path;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use parley_core::{CHAT_ENDPOINT_PATH, ChatReply, ErrorBody, FormatStyle, Message};
use parley_llm::{CompletionRequest, LlmProvider, ensure_system_message};
use serde_json::Value;
use tower_http::{services::ServeDir, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    provider: Arc<dyn LlmProvider>,
}

impl AppState {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

/// `POST /api/chat` plus the widget's static files.
pub fn router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route(CHAT_ENDPOINT_PATH, post(chat))
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error response carrying `{ "error": message }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }

    fn internal(message: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

struct ChatInput {
    messages: Vec<Message>,
    style: FormatStyle,
}

fn parse_chat_input(body: &[u8]) -> Result<ChatInput, ApiError> {
    let Ok(Value::Object(mut fields)) = serde_json::from_slice::<Value>(body) else {
        return Err(ApiError::bad_request("Invalid JSON body"));
    };

    let messages = match fields.remove("messages") {
        None => Vec::new(),
        Some(value @ Value::Array(_)) => serde_json::from_value(value)
            .map_err(|_| ApiError::bad_request("messages must be a list"))?,
        Some(_) => return Err(ApiError::bad_request("messages must be a list")),
    };

    let style = fields
        .get("format_style")
        .and_then(Value::as_str)
        .map(FormatStyle::parse_lossy)
        .unwrap_or_default();

    Ok(ChatInput { messages, style })
}

async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Json<ChatReply>, ApiError> {
    let ChatInput {
        mut messages,
        style,
    } = parse_chat_input(&body)?;
    ensure_system_message(&mut messages, style);

    tracing::info!(
        provider = %state.provider.id(),
        model = %state.provider.model(),
        messages = messages.len(),
        format_style = %style,
        "handling chat turn"
    );

    let reply = state
        .provider
        .complete(CompletionRequest::new(messages.clone()))
        .await
        .map_err(|error| {
            tracing::error!(code = error.code(), error = %error, "provider call failed");
            ApiError::internal(error.to_string())
        })?;

    messages.push(Message::assistant(reply.clone()));
    Ok(Json(ChatReply {
        reply: Some(reply),
        messages: Some(messages),
    }))
}
