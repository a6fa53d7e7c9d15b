use parley_core::{Bubble, ChatSurface, FormatStyle, ScrollMetrics};
use wasm_bindgen::JsCast;
use web_sys::{
    Document, Element, HtmlButtonElement, HtmlElement, HtmlFormElement, HtmlSelectElement,
    HtmlTextAreaElement, ScrollBehavior, ScrollIntoViewOptions, ScrollLogicalPosition,
    ScrollToOptions,
};

use crate::error::{
    MissingElementSnafu, MissingSubmitButtonSnafu, WebError, WebResult, WrongElementSnafu,
};

pub const CHAT_WINDOW_ID: &str = "chatWindow";
pub const CHAT_FORM_ID: &str = "chatForm";
pub const USER_INPUT_ID: &str = "userInput";
pub const FORMAT_SELECT_ID: &str = "formatStyle";
pub const JUMP_BUTTON_ID: &str = "scrollDownBtn";
const JUMP_VISIBLE_CLASS: &str = "visible";

/// The widget's existing page elements.
#[derive(Clone)]
pub struct DomSurface {
    document: Document,
    chat_window: HtmlElement,
    form: HtmlFormElement,
    input: HtmlTextAreaElement,
    submit_button: HtmlButtonElement,
    format_select: HtmlSelectElement,
    jump_button: HtmlElement,
    last_bubble: Option<Element>,
}

impl DomSurface {
    pub fn bind(document: &Document) -> WebResult<Self> {
        let form: HtmlFormElement = element_by_id(document, CHAT_FORM_ID, "form")?;
        let submit_button = form
            .query_selector("button")
            .ok()
            .flatten()
            .and_then(|button| button.dyn_into::<HtmlButtonElement>().ok())
            .ok_or_else(|| {
                MissingSubmitButtonSnafu {
                    stage: "bind-submit-button",
                }
                .build()
            })?;

        Ok(Self {
            document: document.clone(),
            chat_window: element_by_id(document, CHAT_WINDOW_ID, "element")?,
            input: element_by_id(document, USER_INPUT_ID, "textarea")?,
            format_select: element_by_id(document, FORMAT_SELECT_ID, "select")?,
            jump_button: element_by_id(document, JUMP_BUTTON_ID, "element")?,
            submit_button,
            form,
            last_bubble: None,
        })
    }

    pub fn chat_window(&self) -> &HtmlElement {
        &self.chat_window
    }

    pub fn form(&self) -> &HtmlFormElement {
        &self.form
    }

    pub fn input(&self) -> &HtmlTextAreaElement {
        &self.input
    }

    pub fn jump_button(&self) -> &HtmlElement {
        &self.jump_button
    }

    fn build_bubble(&self, bubble: &Bubble) -> WebResult<Element> {
        let wrapper = self.create_div(&bubble.class_name())?;
        let role = self.create_div("role")?;
        role.set_text_content(Some(bubble.label));
        let content = self.create_div("content")?;
        content.set_inner_html(&bubble.html);

        wrapper
            .append_child(&role)
            .and_then(|_| wrapper.append_child(&content))
            .map_err(|error| WebError::browser("assemble-bubble", error))?;
        Ok(wrapper)
    }

    fn create_div(&self, class_name: &str) -> WebResult<Element> {
        let element = self
            .document
            .create_element("div")
            .map_err(|error| WebError::browser("create-element", error))?;
        element.set_class_name(class_name);
        Ok(element)
    }

    fn scroll_window_to(&self, scroll_top: f64, behavior: ScrollBehavior) {
        let options = ScrollToOptions::new();
        options.set_top(scroll_top);
        options.set_behavior(behavior);
        self.chat_window.scroll_to_with_scroll_to_options(&options);
    }
}

impl ChatSurface for DomSurface {
    fn input_text(&self) -> String {
        self.input.value()
    }

    fn clear_input(&mut self) {
        self.input.set_value("");
    }

    fn fit_input_height(&mut self) {
        let style = self.input.style();
        if let Err(error) = style.set_property("height", "auto") {
            log::warn!("resetting input height failed: {:?}", error);
            return;
        }
        let height = height_value(f64::from(self.input.scroll_height()));
        if let Err(error) = style.set_property("height", &height) {
            log::warn!("setting input height failed: {:?}", error);
        }
    }

    fn focus_input(&mut self) {
        if let Err(error) = self.input.focus() {
            log::debug!("focusing input failed: {:?}", error);
        }
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.input.set_disabled(!enabled);
        self.submit_button.set_disabled(!enabled);
    }

    fn format_style(&self) -> FormatStyle {
        FormatStyle::parse_lossy(&self.format_select.value())
    }

    fn append_bubble(&mut self, bubble: &Bubble) {
        let appended = self.build_bubble(bubble).and_then(|wrapper| {
            self.chat_window
                .append_child(&wrapper)
                .map_err(|error| WebError::browser("append-bubble", error))?;
            Ok(wrapper)
        });

        match appended {
            Ok(wrapper) => self.last_bubble = Some(wrapper),
            Err(error) => log::error!("could not append message: {error}"),
        }
    }

    fn reveal_latest(&mut self) {
        if let Some(bubble) = &self.last_bubble {
            let options = ScrollIntoViewOptions::new();
            options.set_behavior(ScrollBehavior::Smooth);
            options.set_block(ScrollLogicalPosition::Nearest);
            bubble.scroll_into_view_with_scroll_into_view_options(&options);
        }
    }

    fn scroll_metrics(&self) -> ScrollMetrics {
        ScrollMetrics::new(
            f64::from(self.chat_window.scroll_top()),
            f64::from(self.chat_window.scroll_height()),
            f64::from(self.chat_window.client_height()),
        )
    }

    fn set_scroll_top(&mut self, scroll_top: f64) {
        self.scroll_window_to(scroll_top, ScrollBehavior::Instant);
    }

    fn smooth_scroll_to(&mut self, scroll_top: f64) {
        self.scroll_window_to(scroll_top, ScrollBehavior::Smooth);
    }

    fn set_jump_visible(&mut self, visible: bool) {
        if let Err(error) = self
            .jump_button
            .class_list()
            .toggle_with_force(JUMP_VISIBLE_CLASS, visible)
        {
            log::warn!("toggling jump control failed: {:?}", error);
        }
    }
}

fn element_by_id<T: JsCast>(
    document: &Document,
    id: &str,
    expected: &'static str,
) -> WebResult<T> {
    let element = document.get_element_by_id(id).ok_or_else(|| {
        MissingElementSnafu {
            stage: "bind-element",
            id,
        }
        .build()
    })?;
    element.dyn_into::<T>().map_err(|_| {
        WrongElementSnafu {
            stage: "bind-element",
            id,
            expected,
        }
        .build()
    })
}

/// CSS `height` for a text box whose content is `scroll_height` pixels tall.
fn height_value(scroll_height: f64) -> String {
    format!("{}px", scroll_height.max(0.0).ceil())
}
