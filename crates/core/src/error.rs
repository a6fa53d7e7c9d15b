use snafu::Snafu;

/// Failure to obtain a usable response from the chat endpoint.
///
/// Display strings are shown to the user after a `Network error: ` prefix.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TransportError {
    #[snafu(display("could not reach {endpoint}: {source}"))]
    SendRequest {
        stage: &'static str,
        endpoint: String,
        source: reqwest::Error,
    },
    #[snafu(display("failed to read response body: {source}"))]
    ReadBody {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("server returned malformed JSON (status {status}): {source}"))]
    DecodeBody {
        stage: &'static str,
        status: u16,
        source: serde_json::Error,
    },
}

impl TransportError {
    pub fn stage(&self) -> &'static str {
        match self {
            TransportError::SendRequest { stage, .. }
            | TransportError::ReadBody { stage, .. }
            | TransportError::DecodeBody { stage, .. } => stage,
        }
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
