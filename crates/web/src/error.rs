use snafu::Snafu;
use wasm_bindgen::JsValue;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum WebError {
    #[snafu(display("no browser window available"))]
    NoWindow { stage: &'static str },
    #[snafu(display("page has no document"))]
    NoDocument { stage: &'static str },
    #[snafu(display("missing element #{id}"))]
    MissingElement { stage: &'static str, id: String },
    #[snafu(display("element #{id} is not a {expected}"))]
    WrongElement {
        stage: &'static str,
        id: String,
        expected: &'static str,
    },
    #[snafu(display("#chatForm has no submit button"))]
    MissingSubmitButton { stage: &'static str },
    #[snafu(display("browser call failed: {message}"))]
    Browser {
        stage: &'static str,
        message: String,
    },
}

impl WebError {
    pub(crate) fn browser(stage: &'static str, value: JsValue) -> Self {
        WebError::Browser {
            stage,
            message: describe_js(&value),
        }
    }
}

impl From<WebError> for JsValue {
    fn from(error: WebError) -> Self {
        js_sys::Error::new(&error.to_string()).into()
    }
}

pub type WebResult<T> = Result<T, WebError>;

/// Best-effort text for a thrown JS value.
pub(crate) fn describe_js(value: &JsValue) -> String {
    value
        .as_string()
        .unwrap_or_else(|| format!("{value:?}"))
}
