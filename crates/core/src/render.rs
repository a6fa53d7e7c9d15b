//! Turns messages into the HTML that goes inside a log bubble.
//!
//! User text is always escaped. Assistant text goes through optional list formatting, then
//! markdown, then the sanitizer; any markdown failure drops back to the escaped form.

use pulldown_cmark::{Options, Parser, html};

use crate::message::{FormatStyle, Message, Role};

/// Inputs larger than this skip markdown and render escaped.
pub const MARKDOWN_SAFE_FALLBACK_THRESHOLD_BYTES: usize = 128 * 1024;

/// Outcome of the markdown stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupOutcome {
    /// Sanitized HTML, safe to insert.
    Html(String),
    /// The caller must render the raw text escaped instead.
    Fallback { reason: String },
}

/// Markdown interpreter plus sanitizer.
pub trait MarkupPipeline {
    fn render(&self, markdown: &str) -> MarkupOutcome;
}

/// Default pipeline: pulldown-cmark into ammonia.
#[derive(Debug, Clone, Copy, Default)]
pub struct CmarkPipeline;

impl MarkupPipeline for CmarkPipeline {
    fn render(&self, markdown: &str) -> MarkupOutcome {
        if markdown.len() > MARKDOWN_SAFE_FALLBACK_THRESHOLD_BYTES {
            return MarkupOutcome::Fallback {
                reason: format!(
                    "reply of {} bytes exceeds markdown limit of {} bytes",
                    markdown.len(),
                    MARKDOWN_SAFE_FALLBACK_THRESHOLD_BYTES
                ),
            };
        }

        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);

        let parser = Parser::new_ext(markdown, options);
        let mut raw_html = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut raw_html, parser);

        MarkupOutcome::Html(sanitize_html(&raw_html))
    }
}

/// Strips scripts, event handlers and unsafe URLs.
pub fn sanitize_html(raw_html: &str) -> String {
    ammonia::clean(raw_html)
}

/// Escapes the five HTML-significant characters.
pub fn escape_html(unsafe_text: &str) -> String {
    let mut escaped = String::with_capacity(unsafe_text.len());
    for ch in unsafe_text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Escaped text with each newline turned into `<br>`.
pub fn escape_with_line_breaks(text: &str) -> String {
    escape_html(text).replace('\n', "<br>")
}

/// Rewrites multi-line text as a markdown list.
///
/// Lines are trimmed and blank ones dropped. A single surviving line comes back as-is, with
/// no list marker.
pub fn convert_to_list(text: &str, style: FormatStyle) -> String {
    let lines = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>();

    if lines.len() <= 1 {
        return lines.first().map(|line| line.to_string()).unwrap_or_default();
    }

    lines
        .iter()
        .enumerate()
        .map(|(index, line)| match style {
            FormatStyle::Numbered => format!("{}. {line}", index + 1),
            _ => format!("- {line}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Ready-to-insert bubble for the message log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    pub role: Role,
    pub label: &'static str,
    pub html: String,
}

impl Bubble {
    /// CSS classes of the bubble wrapper, e.g. `message assistant`.
    pub fn class_name(&self) -> String {
        format!("message {}", self.role.as_str())
    }
}

/// Renders messages with a pluggable markdown pipeline.
#[derive(Debug, Clone, Default)]
pub struct MessageRenderer<P = CmarkPipeline> {
    pipeline: P,
}

impl MessageRenderer<CmarkPipeline> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: MarkupPipeline> MessageRenderer<P> {
    pub fn with_pipeline(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub fn render(&self, message: &Message, style: FormatStyle) -> Bubble {
        let html = match message.role {
            Role::Assistant => self.render_assistant(&message.content, style),
            Role::User | Role::System => escape_with_line_breaks(&message.content),
        };

        Bubble {
            role: message.role,
            label: message.role.label(),
            html,
        }
    }

    fn render_assistant(&self, text: &str, style: FormatStyle) -> String {
        let markdown = match style {
            FormatStyle::Plain => text.to_string(),
            FormatStyle::Bullets | FormatStyle::Numbered => convert_to_list(text, style),
        };

        match self.pipeline.render(&markdown) {
            MarkupOutcome::Html(html) => html,
            MarkupOutcome::Fallback { reason } => {
                tracing::debug!(%reason, "markdown rendering fell back to escaped text");
                escape_with_line_breaks(text)
            }
        }
    }
}
