/// What a key press in the message box should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Swallow the newline and submit the form.
    Submit,
    /// Let the text area handle the key (Shift+Enter inserts a newline).
    Passthrough,
}

/// Maps a key press to an input action.
pub fn classify_key(key: &str, shift: bool) -> KeyAction {
    if key == "Enter" && !shift {
        KeyAction::Submit
    } else {
        KeyAction::Passthrough
    }
}

/// Result of reading the message box on submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// A request is already in flight.
    Busy,
    /// Nothing but whitespace was typed.
    Empty,
    Ready(String),
}

/// Guard against overlapping submissions.
///
/// Only one turn may be outstanding; there is no queue behind it.
#[derive(Debug, Default)]
pub struct SendingGate {
    sending: bool,
}

impl SendingGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// Closes the gate. Returns `false` when it was already closed.
    pub fn try_acquire(&mut self) -> bool {
        if self.sending {
            return false;
        }
        self.sending = true;
        true
    }

    pub fn release(&mut self) {
        self.sending = false;
    }

    /// Validates raw input against the gate without closing it.
    pub fn prepare(&self, raw: &str) -> Submission {
        if self.sending {
            return Submission::Busy;
        }

        let content = raw.trim();
        if content.is_empty() {
            return Submission::Empty;
        }

        Submission::Ready(content.to_string())
    }
}
