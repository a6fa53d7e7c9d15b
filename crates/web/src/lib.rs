//! Browser entry point: binds a [`ChatSession`] to the page's chat elements and routes DOM
//! events into it.

mod dom;
mod error;

use std::cell::RefCell;
use std::rc::Rc;

use parley_core::{ChatSession, HttpTransport, KeyAction, Transport};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Event, EventTarget, KeyboardEvent};

pub use dom::DomSurface;
pub use error::{WebError, WebResult};

use crate::error::{NoDocumentSnafu, NoWindowSnafu, describe_js};

type SharedSession = Rc<RefCell<ChatSession<DomSurface>>>;

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());

    mount()?;
    log::info!("Parley chat widget mounted");
    Ok(())
}

fn mount() -> WebResult<()> {
    let window = web_sys::window().ok_or_else(|| NoWindowSnafu { stage: "mount" }.build())?;
    let document = window
        .document()
        .ok_or_else(|| NoDocumentSnafu { stage: "mount" }.build())?;
    let origin = window
        .location()
        .origin()
        .map_err(|error| WebError::browser("read-origin", error))?;

    let surface = DomSurface::bind(&document)?;
    let transport = Rc::new(HttpTransport::new(&origin));
    log::debug!("chat endpoint: {}", transport.endpoint());

    let session: SharedSession = Rc::new(RefCell::new(ChatSession::new(surface.clone())));

    listen(surface.input(), "input", {
        let session = Rc::clone(&session);
        move |_event: Event| {
            if let Ok(mut session) = session.try_borrow_mut() {
                session.on_input_changed();
            }
        }
    })?;

    listen(surface.input(), "keydown", {
        let session = Rc::clone(&session);
        let form = surface.form().clone();
        move |event: Event| {
            let Some(event) = event.dyn_ref::<KeyboardEvent>() else {
                return;
            };
            let action = session.borrow().on_key_down(&event.key(), event.shift_key());
            if action == KeyAction::Submit {
                event.prevent_default();
                if let Err(error) = form.request_submit() {
                    log::warn!("form submit failed: {}", describe_js(&error));
                }
            }
        }
    })?;

    listen(surface.form(), "submit", {
        let session = Rc::clone(&session);
        move |event: Event| {
            event.prevent_default();
            let Some(request) = session.borrow_mut().begin_turn() else {
                return;
            };

            let session = Rc::clone(&session);
            let transport = Rc::clone(&transport);
            spawn_local(async move {
                let outcome = transport.send_turn(&request).await;
                session.borrow_mut().finish_turn(outcome);
            });
        }
    })?;

    listen(surface.chat_window(), "scroll", {
        let session = Rc::clone(&session);
        move |_event: Event| {
            if let Ok(mut session) = session.try_borrow_mut() {
                session.on_scroll();
            }
        }
    })?;

    listen(surface.jump_button(), "click", {
        let session = Rc::clone(&session);
        move |_event: Event| {
            session.borrow_mut().on_jump_clicked();
        }
    })?;

    Ok(())
}

/// Registers `handler` for the lifetime of the page.
fn listen<H>(target: &EventTarget, kind: &'static str, handler: H) -> WebResult<()>
where
    H: FnMut(Event) + 'static,
{
    let closure = Closure::<dyn FnMut(Event)>::new(handler);
    target
        .add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())
        .map_err(|error| WebError::browser("add-event-listener", error))?;
    closure.forget();
    Ok(())
}
