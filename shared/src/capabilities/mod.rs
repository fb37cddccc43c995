//! Shell-facing capabilities: HTTP with abort, one-shot timers, render.

mod http;
mod timer;

pub use self::http::{
    Http, HttpError, HttpHeaders, HttpOperation, HttpRequest, HttpResponse, HttpResult,
    ValidatedUrl,
};
pub use self::timer::{Timer, TimerOperation, TimerOutput};

// Crux's built-in Render is enough for triggering view updates.
pub use crux_core::render::Render;

use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
#[effect(app = "App")]
pub struct Capabilities {
    pub http: Http<Event>,
    pub timer: Timer<Event>,
    pub render: Render<Event>,
}
