use parley_core::{FormatStyle, Message, Role};

/// Instruction telling the model how to shape its answer.
pub fn system_prompt(style: FormatStyle) -> &'static str {
    match style {
        FormatStyle::Bullets => {
            "You are a helpful assistant. \
             Format your main points as clear bullet points using '-' or '•'. \
             Use short, readable lines."
        }
        FormatStyle::Numbered => {
            "You are a helpful assistant. \
             Format your main points as a numbered list (1., 2., 3., ...). \
             Use short, readable lines."
        }
        FormatStyle::Plain => {
            "You are a helpful assistant. \
             Respond in clear paragraphs that are easy to read."
        }
    }
}

/// Puts the style's system prompt first unless the history already has a system message.
///
/// An existing system message wins even if it was written for another style.
pub fn ensure_system_message(messages: &mut Vec<Message>, style: FormatStyle) {
    let has_system = messages.iter().any(|message| message.role == Role::System);
    if !has_system {
        messages.insert(0, Message::system(system_prompt(style)));
    }
}
