use crate::error::TransportResult;
use crate::input::{KeyAction, SendingGate, Submission, classify_key};
use crate::message::{Conversation, FormatStyle, Message, Role};
use crate::render::{CmarkPipeline, MarkupPipeline, MessageRenderer};
use crate::scroll::{AppendScroll, ScrollController};
use crate::surface::ChatSurface;
use crate::transport::{ChatRequest, Transport, TurnOutcome};

/// Chat session controller bound to one surface.
///
/// A turn is split into [`ChatSession::begin_turn`] and [`ChatSession::finish_turn`] so the
/// browser glue can await the network without holding a borrow of the session. Every
/// outcome passed to `finish_turn` reopens the sending gate.
pub struct ChatSession<S, P = CmarkPipeline> {
    surface: S,
    renderer: MessageRenderer<P>,
    conversation: Conversation,
    gate: SendingGate,
    scroll: ScrollController,
}

impl<S: ChatSurface> ChatSession<S> {
    pub fn new(surface: S) -> Self {
        Self::with_pipeline(surface, CmarkPipeline)
    }
}

impl<S: ChatSurface, P: MarkupPipeline> ChatSession<S, P> {
    pub fn with_pipeline(mut surface: S, pipeline: P) -> Self {
        surface.fit_input_height();
        Self {
            surface,
            renderer: MessageRenderer::with_pipeline(pipeline),
            conversation: Conversation::new(),
            gate: SendingGate::new(),
            scroll: ScrollController::new(),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_sending(&self) -> bool {
        self.gate.is_sending()
    }

    pub fn is_pinned(&self) -> bool {
        self.scroll.is_pinned()
    }

    /// Text box content changed.
    pub fn on_input_changed(&mut self) {
        self.surface.fit_input_height();
    }

    /// Key pressed in the text box. On [`KeyAction::Submit`] the caller suppresses the
    /// newline and submits the form.
    pub fn on_key_down(&self, key: &str, shift: bool) -> KeyAction {
        classify_key(key, shift)
    }

    /// Starts a turn from the current input.
    ///
    /// Returns `None` when a turn is already in flight or the input is blank; neither is
    /// reported to the user.
    pub fn begin_turn(&mut self) -> Option<ChatRequest> {
        let content = match self.gate.prepare(&self.surface.input_text()) {
            Submission::Ready(content) => content,
            Submission::Busy => {
                tracing::debug!("ignoring submit while a turn is in flight");
                return None;
            }
            Submission::Empty => {
                tracing::debug!("ignoring submit of blank input");
                return None;
            }
        };

        let format_style = self.surface.format_style();
        let user_message = Message::user(content);
        self.append(&user_message, format_style);
        self.conversation.push(user_message);

        self.surface.clear_input();
        self.surface.fit_input_height();
        self.surface.focus_input();
        self.gate.try_acquire();
        self.surface.set_input_enabled(false);

        tracing::debug!(
            messages = self.conversation.messages().len(),
            %format_style,
            "turn started"
        );

        Some(ChatRequest {
            messages: self.conversation.to_vec(),
            format_style,
        })
    }

    /// Applies the result of the request returned by [`ChatSession::begin_turn`].
    pub fn finish_turn(&mut self, outcome: TransportResult<TurnOutcome>) {
        let format_style = self.surface.format_style();

        match outcome {
            Ok(TurnOutcome::Reply(reply)) => {
                if let Some(messages) = reply.messages {
                    self.conversation.replace(messages);
                }
                let text = reply.reply.unwrap_or_default();
                self.append(&Message::assistant(text), format_style);
            }
            Ok(TurnOutcome::Rejected { status, error }) => {
                tracing::warn!(status, %error, "turn rejected by server");
                self.append(&Message::assistant(format!("Error: {error}")), format_style);
            }
            Err(error) => {
                tracing::warn!(stage = error.stage(), %error, "turn failed in transport");
                self.append(
                    &Message::assistant(format!("Network error: {error}")),
                    format_style,
                );
            }
        }

        self.gate.release();
        self.surface.set_input_enabled(true);
    }

    /// Runs a whole turn against `transport`. Returns whether a request was sent.
    pub async fn submit<T: Transport>(&mut self, transport: &T) -> bool {
        let Some(request) = self.begin_turn() else {
            return false;
        };

        let outcome = transport.send_turn(&request).await;
        self.finish_turn(outcome);
        true
    }

    /// The log was scrolled.
    pub fn on_scroll(&mut self) {
        let visible = self.scroll.on_user_scroll(self.surface.scroll_metrics());
        self.surface.set_jump_visible(visible);
    }

    /// The jump-to-latest control was clicked.
    pub fn on_jump_clicked(&mut self) {
        let target = self.scroll.jump_target(self.surface.scroll_metrics());
        self.surface.smooth_scroll_to(target);
    }

    fn append(&mut self, message: &Message, format_style: FormatStyle) {
        debug_assert!(matches!(message.role, Role::User | Role::Assistant));

        let bubble = self.renderer.render(message, format_style);
        self.surface.append_bubble(&bubble);

        match self.scroll.on_content_appended(self.surface.scroll_metrics()) {
            AppendScroll::Follow { scroll_top } => {
                self.surface.set_jump_visible(false);
                self.surface.reveal_latest();
                self.surface.set_scroll_top(scroll_top);
            }
            AppendScroll::Hold => self.surface.set_jump_visible(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use futures::FutureExt;
    use futures::future::LocalBoxFuture;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::TransportError;
    use crate::render::{Bubble, MarkupOutcome};
    use crate::scroll::ScrollMetrics;
    use crate::transport::ChatReply;

    const BUBBLE_HEIGHT: f64 = 120.0;
    const VIEWPORT_HEIGHT: f64 = 400.0;

    /// In-memory stand-in for the page: every bubble adds a fixed height to the log.
    struct FakeSurface {
        input: String,
        style: FormatStyle,
        input_enabled: bool,
        focused: bool,
        fits: usize,
        bubbles: Vec<Bubble>,
        reveals: usize,
        scroll_top: f64,
        jump_visible: bool,
        smooth_target: Option<f64>,
    }

    impl FakeSurface {
        fn new() -> Self {
            Self {
                input: String::new(),
                style: FormatStyle::Plain,
                input_enabled: true,
                focused: false,
                fits: 0,
                bubbles: Vec::new(),
                reveals: 0,
                scroll_top: 0.0,
                jump_visible: false,
                smooth_target: None,
            }
        }

        fn type_text(&mut self, text: &str) {
            self.input = text.to_string();
        }

        fn content_height(&self) -> f64 {
            self.bubbles.len() as f64 * BUBBLE_HEIGHT
        }
    }

    impl ChatSurface for FakeSurface {
        fn input_text(&self) -> String {
            self.input.clone()
        }

        fn clear_input(&mut self) {
            self.input.clear();
        }

        fn fit_input_height(&mut self) {
            self.fits += 1;
        }

        fn focus_input(&mut self) {
            self.focused = true;
        }

        fn set_input_enabled(&mut self, enabled: bool) {
            self.input_enabled = enabled;
        }

        fn format_style(&self) -> FormatStyle {
            self.style
        }

        fn append_bubble(&mut self, bubble: &Bubble) {
            self.bubbles.push(bubble.clone());
        }

        fn reveal_latest(&mut self) {
            self.reveals += 1;
        }

        fn scroll_metrics(&self) -> ScrollMetrics {
            ScrollMetrics::new(
                self.scroll_top,
                self.content_height().max(VIEWPORT_HEIGHT),
                VIEWPORT_HEIGHT,
            )
        }

        fn set_scroll_top(&mut self, scroll_top: f64) {
            self.scroll_top = scroll_top;
        }

        fn smooth_scroll_to(&mut self, scroll_top: f64) {
            self.smooth_target = Some(scroll_top);
        }

        fn set_jump_visible(&mut self, visible: bool) {
            self.jump_visible = visible;
        }
    }

    /// Replays canned outcomes and records every request it sees.
    struct ScriptedTransport {
        outcomes: RefCell<Vec<TransportResult<TurnOutcome>>>,
        requests: RefCell<Vec<ChatRequest>>,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<TransportResult<TurnOutcome>>) -> Self {
            Self {
                outcomes: RefCell::new(outcomes),
                requests: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl Transport for ScriptedTransport {
        fn send_turn<'a>(
            &'a self,
            request: &'a ChatRequest,
        ) -> LocalBoxFuture<'a, TransportResult<TurnOutcome>> {
            self.requests.borrow_mut().push(request.clone());
            let outcome = self.outcomes.borrow_mut().remove(0);
            async move { outcome }.boxed_local()
        }
    }

    struct CountingPipeline {
        calls: Cell<usize>,
    }

    impl MarkupPipeline for CountingPipeline {
        fn render(&self, markdown: &str) -> MarkupOutcome {
            self.calls.set(self.calls.get() + 1);
            MarkupOutcome::Html(format!("<p>{markdown}</p>"))
        }
    }

    fn reply(text: &str, messages: Option<Vec<Message>>) -> TransportResult<TurnOutcome> {
        Ok(TurnOutcome::Reply(ChatReply {
            reply: Some(text.to_string()),
            messages,
        }))
    }

    fn network_failure() -> TransportResult<TurnOutcome> {
        Err(TransportError::DecodeBody {
            stage: "decode-chat-reply",
            status: 200,
            source: serde_json::from_str::<ChatReply>("{").unwrap_err(),
        })
    }

    #[tokio::test]
    async fn success_renders_one_reply_and_adopts_server_history() {
        let server_history = vec![
            Message::system("be helpful"),
            Message::user("hello"),
            Message::assistant("hi"),
        ];
        let transport = ScriptedTransport::new(vec![reply("hi", Some(server_history.clone()))]);
        let mut session = ChatSession::new(FakeSurface::new());
        session.surface_mut().type_text("  hello  ");

        assert!(session.submit(&transport).await);

        let surface = session.surface();
        assert_eq!(surface.bubbles.len(), 2);
        assert_eq!(surface.bubbles[0].role, Role::User);
        assert_eq!(surface.bubbles[0].html, "hello");
        assert_eq!(surface.bubbles[1].role, Role::Assistant);
        assert_eq!(surface.bubbles[1].html, "<p>hi</p>\n");
        assert_eq!(session.conversation().messages(), server_history.as_slice());

        assert!(surface.input_enabled);
        assert!(!session.is_sending());

        let requests = transport.requests.borrow();
        assert_eq!(requests[0].messages, vec![Message::user("hello")]);
    }

    #[tokio::test]
    async fn reply_without_history_keeps_local_conversation() {
        let transport = ScriptedTransport::new(vec![reply("hi", None)]);
        let mut session = ChatSession::new(FakeSurface::new());
        session.surface_mut().type_text("hello");

        session.submit(&transport).await;

        assert_eq!(
            session.conversation().messages(),
            &[Message::user("hello")][..]
        );
        assert_eq!(session.surface().bubbles.len(), 2);
        assert!(session.surface().input_enabled);
        assert!(!session.is_sending());
    }

    #[tokio::test]
    async fn missing_reply_renders_empty_assistant_bubble() {
        let transport = ScriptedTransport::new(vec![Ok(TurnOutcome::Reply(ChatReply::default()))]);
        let mut session = ChatSession::new(FakeSurface::new());
        session.surface_mut().type_text("hello");

        session.submit(&transport).await;

        let last = session.surface().bubbles.last().cloned().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.html, "");
    }

    #[tokio::test]
    async fn server_error_is_shown_and_history_untouched() {
        let transport = ScriptedTransport::new(vec![Ok(TurnOutcome::Rejected {
            status: 400,
            error: "bad request".into(),
        })]);
        let mut session = ChatSession::new(FakeSurface::new());
        session.surface_mut().type_text("hello");

        session.submit(&transport).await;

        let last = session.surface().bubbles.last().cloned().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.html, "<p>Error: bad request</p>\n");
        assert_eq!(
            session.conversation().messages(),
            &[Message::user("hello")][..]
        );
        assert!(session.surface().input_enabled);
    }

    #[tokio::test]
    async fn network_failure_is_shown_and_gate_reopens() {
        let transport = ScriptedTransport::new(vec![network_failure()]);
        let mut session = ChatSession::new(FakeSurface::new());
        session.surface_mut().type_text("hello");

        session.submit(&transport).await;

        let last = session.surface().bubbles.last().cloned().unwrap();
        assert!(last.html.starts_with("<p>Network error: "), "{}", last.html);
        assert!(!session.is_sending());
        assert!(session.surface().input_enabled);
        assert_eq!(session.conversation().messages().len(), 1);
    }

    #[test]
    fn submit_while_sending_is_ignored() {
        let mut session = ChatSession::new(FakeSurface::new());
        session.surface_mut().type_text("first");
        let request = session.begin_turn();
        assert!(request.is_some());
        assert!(session.is_sending());
        assert!(!session.surface().input_enabled);

        session.surface_mut().type_text("second");
        assert_eq!(session.begin_turn(), None);
        assert_eq!(session.surface().bubbles.len(), 1);
        assert_eq!(session.conversation().messages().len(), 1);
        assert_eq!(session.surface().input, "second");
    }

    #[tokio::test]
    async fn pending_turn_blocks_second_network_call() {
        let transport = ScriptedTransport::new(vec![reply("late", None)]);
        let mut session = ChatSession::new(FakeSurface::new());
        session.surface_mut().type_text("first");
        let pending = session.begin_turn().unwrap();

        session.surface_mut().type_text("second");
        assert!(!session.submit(&transport).await);
        assert_eq!(transport.calls(), 0);

        let outcome = transport.send_turn(&pending).await;
        session.finish_turn(outcome);
        assert_eq!(transport.calls(), 1);
        assert!(!session.is_sending());
    }

    #[test]
    fn blank_input_is_ignored_silently() {
        let mut session = ChatSession::new(FakeSurface::new());
        session.surface_mut().type_text("   \n ");

        assert_eq!(session.begin_turn(), None);
        assert!(session.surface().bubbles.is_empty());
        assert!(!session.is_sending());
        assert!(session.surface().input_enabled);
    }

    #[test]
    fn begin_turn_resets_and_focuses_input() {
        let mut session = ChatSession::new(FakeSurface::new());
        session.surface_mut().style = FormatStyle::Bullets;
        session.surface_mut().type_text("question");
        let fits_before = session.surface().fits;

        let request = session.begin_turn().unwrap();

        assert_eq!(request.format_style, FormatStyle::Bullets);
        assert_eq!(session.surface().input, "");
        assert!(session.surface().focused);
        assert_eq!(session.surface().fits, fits_before + 1);
    }

    #[test]
    fn reply_uses_style_selected_when_it_arrives() {
        let mut session = ChatSession::with_pipeline(
            FakeSurface::new(),
            CountingPipeline {
                calls: Cell::new(0),
            },
        );
        session.surface_mut().type_text("list please");
        session.begin_turn().unwrap();

        session.surface_mut().style = FormatStyle::Numbered;
        session.finish_turn(reply("a\nb", None));

        let last = session.surface().bubbles.last().cloned().unwrap();
        assert_eq!(last.html, "<p>1. a\n2. b</p>");
    }

    #[test]
    fn pinned_log_follows_new_bubbles() {
        let mut session = ChatSession::new(FakeSurface::new());
        for index in 0..6 {
            session.surface_mut().type_text(&format!("message {index}"));
            session.begin_turn().unwrap();
            session.finish_turn(reply("ok", None));
        }

        let metrics = session.surface().scroll_metrics();
        assert_eq!(
            metrics.scroll_top,
            metrics.scroll_height - metrics.client_height
        );
        assert!(!session.surface().jump_visible);
        assert!(session.surface().reveals > 0);
    }

    #[test]
    fn scrolled_back_log_keeps_position() {
        let mut session = ChatSession::new(FakeSurface::new());
        for index in 0..6 {
            session.surface_mut().type_text(&format!("message {index}"));
            session.begin_turn().unwrap();
            session.finish_turn(reply("ok", None));
        }

        session.surface_mut().set_scroll_top(0.0);
        session.on_scroll();
        assert!(session.surface().jump_visible);
        assert!(!session.is_pinned());

        session.surface_mut().type_text("one more");
        session.begin_turn().unwrap();
        session.finish_turn(reply("ok", None));

        assert_eq!(session.surface().scroll_metrics().scroll_top, 0.0);
        assert!(session.surface().jump_visible);
    }

    #[test]
    fn jump_control_scrolls_to_tail_and_hides_on_arrival() {
        let mut session = ChatSession::new(FakeSurface::new());
        for index in 0..6 {
            session.surface_mut().type_text(&format!("message {index}"));
            session.begin_turn().unwrap();
            session.finish_turn(reply("ok", None));
        }
        session.surface_mut().set_scroll_top(0.0);
        session.on_scroll();

        session.on_jump_clicked();
        let target = session.surface().smooth_target.unwrap();
        assert_eq!(target, session.surface().scroll_metrics().scroll_height);

        let bottom = session.surface().scroll_metrics().bottom_offset();
        session.surface_mut().set_scroll_top(bottom);
        session.on_scroll();
        assert!(!session.surface().jump_visible);
        assert!(session.is_pinned());
    }
}
