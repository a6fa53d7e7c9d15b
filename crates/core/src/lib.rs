#![deny(unsafe_code)]

//! Headless core of the Parley chat widget.
//!
//! [`ChatSession`] owns the conversation and the sending gate, and drives a page through the
//! [`ChatSurface`] trait. Rendering, scroll-follow and the HTTP transport live in their own
//! modules so they can be exercised without a browser.

pub mod error;
pub mod input;
pub mod message;
pub mod render;
pub mod scroll;
pub mod session;
pub mod surface;
pub mod transport;

pub use error::{TransportError, TransportResult};
pub use input::{KeyAction, SendingGate, Submission, classify_key};
pub use message::{Conversation, FormatStyle, Message, Role};
pub use render::{
    Bubble, CmarkPipeline, MarkupOutcome, MarkupPipeline, MessageRenderer, convert_to_list,
    escape_html, escape_with_line_breaks, sanitize_html,
};
pub use scroll::{AppendScroll, PIN_TOLERANCE, ScrollController, ScrollMetrics};
pub use session::ChatSession;
pub use surface::ChatSurface;
pub use transport::{
    CHAT_ENDPOINT_PATH, ChatReply, ChatRequest, ErrorBody, HttpTransport, Transport, TurnOutcome,
};
