use std::io::Write;

use parley_core::{FormatStyle, Message};
use parley_llm::{CompletionRequest, LlmProvider, ensure_system_message};
use snafu::{ResultExt, Snafu};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

const WRAP_WIDTH: usize = 100;
const FORMAT_PROMPT: &str = "Choose response format (plain/bullets/numbered) [plain]: ";
const BANNER: &str = "\
==========================================
   MISTRAL CLI Chat
   Type 'exit' or 'quit' to stop.
==========================================
";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ChatIoError {
    #[snafu(display("failed to read from terminal: {source}"))]
    ReadInput {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("failed to write to terminal: {source}"))]
    WriteOutput {
        stage: &'static str,
        source: std::io::Error,
    },
}

pub type ChatIoResult<T> = Result<T, ChatIoError>;

/// Interactive loop over a line-based input and a terminal-like output.
pub struct ChatLoop<'a, R, W> {
    provider: &'a dyn LlmProvider,
    input: R,
    output: W,
}

impl<'a, R, W> ChatLoop<'a, R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(provider: &'a dyn LlmProvider, input: R, output: W) -> Self {
        Self {
            provider,
            input,
            output,
        }
    }

    /// Runs until `exit`, `quit` or end of input. `format` skips the interactive style prompt.
    pub async fn run(&mut self, format: Option<&str>) -> ChatIoResult<Vec<Message>> {
        self.write(BANNER)?;
        self.write("\n")?;

        let style = match format {
            Some(raw) => self.resolve_style(raw)?,
            None => {
                self.write(FORMAT_PROMPT)?;
                let raw = self.read_line().await?.unwrap_or_default();
                self.resolve_style(&raw)?
            }
        };
        tracing::info!(format_style = %style, model = %self.provider.model(), "cli chat started");

        let mut messages = Vec::new();
        ensure_system_message(&mut messages, style);

        loop {
            self.write("\nYou: ")?;
            let Some(line) = self.read_line().await? else {
                self.write("\n")?;
                break;
            };
            let user_input = line.trim();

            if is_exit_command(user_input) {
                break;
            }
            if user_input.is_empty() {
                continue;
            }

            messages.push(Message::user(user_input));

            match self
                .provider
                .complete(CompletionRequest::new(messages.clone()))
                .await
            {
                Ok(reply) => {
                    self.write("\nAssistant:\n\n")?;
                    self.write(&textwrap::fill(&reply, WRAP_WIDTH))?;
                    self.write("\n")?;
                    messages.push(Message::assistant(reply));
                }
                Err(error) => {
                    tracing::error!(code = error.code(), error = %error, "error during chat");
                    self.write(&format!("\n[Error] {error}\n"))?;
                }
            }
        }

        self.write("\nGoodbye 👋\n")?;
        Ok(messages)
    }

    fn resolve_style(&mut self, raw: &str) -> ChatIoResult<FormatStyle> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(FormatStyle::Plain);
        }
        match FormatStyle::parse(raw) {
            Some(style) => Ok(style),
            None => {
                self.write("Unknown format, defaulting to 'plain'.\n")?;
                Ok(FormatStyle::Plain)
            }
        }
    }

    /// Next line without its terminator, or `None` at end of input.
    async fn read_line(&mut self) -> ChatIoResult<Option<String>> {
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .await
            .context(ReadInputSnafu { stage: "read-line" })?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn write(&mut self, text: &str) -> ChatIoResult<()> {
        self.output
            .write_all(text.as_bytes())
            .and_then(|()| self.output.flush())
            .context(WriteOutputSnafu { stage: "write" })
    }
}

fn is_exit_command(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use parley_core::Role;
    use parley_llm::{BoxFuture, ProviderError, ProviderResult};
    use pretty_assertions::assert_eq;

    use super::*;

    struct ScriptedProvider {
        replies: Mutex<VecDeque<ProviderResult<String>>>,
        calls: Mutex<Vec<usize>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<ProviderResult<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl LlmProvider for ScriptedProvider {
        fn id(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-model"
        }

        fn complete<'a>(
            &'a self,
            request: CompletionRequest,
        ) -> BoxFuture<'a, ProviderResult<String>> {
            self.calls.lock().unwrap().push(request.messages.len());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()));
            Box::pin(async move { reply })
        }
    }

    async fn run(
        provider: &ScriptedProvider,
        format: Option<&str>,
        input: &str,
    ) -> (Vec<Message>, String) {
        let mut output = Vec::new();
        let messages = ChatLoop::new(provider, input.as_bytes(), &mut output)
            .run(format)
            .await
            .unwrap();
        (messages, String::from_utf8(output).unwrap())
    }

    #[tokio::test]
    async fn conversation_accumulates_and_exits() {
        let provider = ScriptedProvider::new(vec![Ok("first".into()), Ok("second".into())]);
        let (messages, output) = run(&provider, Some("bullets"), "hi\n\nagain\nQUIT\n").await;

        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("bullet points"));
        assert_eq!(messages[4], Message::assistant("second"));
        assert_eq!(*provider.calls.lock().unwrap(), vec![2, 4]);
        assert!(output.starts_with("=========="));
        assert!(output.contains("Assistant:\n\nfirst\n"));
        assert!(output.ends_with("Goodbye 👋\n"));
    }

    #[tokio::test]
    async fn prompts_for_format_and_warns_on_unknown() {
        let provider = ScriptedProvider::new(Vec::new());
        let (messages, output) = run(&provider, None, "fancy\nexit\n").await;

        assert!(output.contains(FORMAT_PROMPT));
        assert!(output.contains("Unknown format, defaulting to 'plain'."));
        assert!(messages[0].content.contains("clear paragraphs"));
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_format_answer_means_plain_without_warning() {
        let provider = ScriptedProvider::new(Vec::new());
        let (messages, output) = run(&provider, None, "\nexit\n").await;

        assert!(!output.contains("Unknown format"));
        assert!(messages[0].content.contains("clear paragraphs"));
    }

    #[tokio::test]
    async fn provider_error_keeps_user_message() {
        let provider = ScriptedProvider::new(vec![Err(ProviderError::RateLimited {
            stage: "test",
        })]);
        let (messages, output) = run(&provider, Some("plain"), "hello\n").await;

        assert!(output.contains("[Error] Rate limited by provider"));
        assert_eq!(messages.last(), Some(&Message::user("hello")));
        assert!(output.ends_with("Goodbye 👋\n"));
    }

    #[tokio::test]
    async fn long_replies_are_wrapped() {
        let reply = "word ".repeat(60);
        let provider = ScriptedProvider::new(vec![Ok(reply)]);
        let (_, output) = run(&provider, Some("plain"), "go\nexit\n").await;

        let body = output
            .split("Assistant:\n\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\nYou:").next())
            .unwrap();
        assert!(body.lines().count() > 1);
        assert!(body.lines().all(|line| line.chars().count() <= WRAP_WIDTH));
    }

    #[test]
    fn exit_commands_ignore_case() {
        assert!(is_exit_command("Exit"));
        assert!(is_exit_command("quit"));
        assert!(!is_exit_command("exit now"));
    }
}
