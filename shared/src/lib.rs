// lib.rs - Pincode lookup screen core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod capabilities;
pub mod controller;
pub mod event;
pub mod lookup;
pub mod model;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use controller::{Command, LookupController};
pub use crux_core::{render::Render, App as CruxApp};
pub use event::Event;
pub use lookup::{LookupOutcome, LookupResult};
pub use model::{ConfigError, LookupConfig, LookupToken, Model, PostOffice, Query, TimerId};

pub const PINCODE_LENGTH: usize = 6;
pub const MAX_PINCODE_LENGTH: usize = 16;
pub const DEBOUNCE_MS: u64 = 500;
pub const MAX_DEBOUNCE_MS: u64 = 10_000;
pub const PINCODE_ENDPOINT: &str = "https://api.postalpincode.in/pincode/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    Network,
    NoData,
    Configuration,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::Network => "NETWORK_ERROR",
            Self::NoData => "NO_DATA",
            Self::Configuration => "CONFIGURATION_ERROR",
        }
    }

    /// Whether asking again can plausibly succeed. The core itself never retries.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Network)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn network(internal: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, "network error").with_internal(internal)
    }

    #[must_use]
    pub fn no_data() -> Self {
        Self::new(ErrorKind::NoData, "no data found")
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Validation => self.message.clone(),
            ErrorKind::Network => {
                "Failed to fetch pincode details. Please check your connection and try again."
                    .into()
            }
            ErrorKind::NoData => "No data found for this pincode.".into(),
            ErrorKind::Configuration => {
                "The pincode service is not configured correctly.".into()
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<capabilities::HttpError> for AppError {
    fn from(e: capabilities::HttpError) -> Self {
        use capabilities::HttpError;

        let request_id = e.request_id().map(str::to_owned);
        let error = match &e {
            HttpError::InvalidUrl { .. }
            | HttpError::PrivateNetworkBlocked { .. }
            | HttpError::InvalidHeader { .. } => {
                Self::new(ErrorKind::Configuration, "invalid lookup request")
                    .with_internal(e.to_string())
            }
            HttpError::Network { .. }
            | HttpError::ResponseTooLarge { .. }
            | HttpError::Aborted { .. } => Self::network(e.to_string()),
        };

        match request_id {
            Some(id) => error.with_context("request_id", id),
            None => error,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        Self::new(ErrorKind::Configuration, e.to_string())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LookupStatus {
    /// Nothing typed yet.
    Idle { prompt: String },
    Typing { remaining: usize },
    /// Complete code, waiting for the debounce to run out.
    Waiting,
    Loading { code: String },
    Results { count: usize, message: Option<String> },
    NoData,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostOfficeRow {
    pub name: String,
    pub branch_type: String,
    pub delivery_status: String,
    pub is_delivery: bool,
    pub location: String,
    pub pincode: String,
}

impl From<&PostOffice> for PostOfficeRow {
    fn from(office: &PostOffice) -> Self {
        Self {
            name: office.name.clone(),
            branch_type: office.branch_type.clone(),
            delivery_status: office.delivery_status.clone(),
            is_delivery: office.is_delivery(),
            location: office.location_line(),
            pincode: office.pincode.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserFacingError {
    pub message: String,
    pub is_retryable: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewModel {
    pub query: String,
    pub status: LookupStatus,
    pub is_loading: bool,
    pub error: Option<UserFacingError>,
    pub offices: Vec<PostOfficeRow>,
    pub can_submit: bool,
    pub can_clear: bool,
}

pub mod app {
    use tracing::{debug, info, warn};

    use super::{LookupStatus, PostOfficeRow, UserFacingError, ViewModel};
    use crate::capabilities::{Capabilities, TimerOutput};
    use crate::controller::Command;
    use crate::event::Event;
    use crate::lookup::{self, LookupOutcome, LookupResult};
    use crate::model::{LookupConfig, Model, TimerId};
    use crate::AppError;

    #[derive(Default)]
    pub struct App;

    impl App {
        fn dispatch(commands: Vec<Command>, model: &mut Model, caps: &Capabilities) {
            for command in commands {
                match command {
                    Command::ScheduleSettle { timer, after_ms } => {
                        caps.timer.start(timer.0, after_ms, Event::DebounceElapsed);
                    }
                    Command::CancelSettle { timer } => caps.timer.clear(timer.0),
                    Command::StartLookup { token, code } => {
                        match lookup::build_request(model.lookup.config(), &code, token) {
                            Ok(request) => {
                                caps.http.send(request, move |result| Event::LookupCompleted {
                                    token,
                                    result,
                                });
                            }
                            Err(e) => {
                                let error = AppError::from(e);
                                warn!(%token, error = %error, "could not build lookup request");
                                model.lookup.complete(token, LookupOutcome::Failed(error));
                            }
                        }
                    }
                    Command::AbortLookup { token } => caps.http.abort(token.request_id()),
                }
            }
        }

        fn status(model: &Model) -> LookupStatus {
            let lookup = &model.lookup;
            let code_length = lookup.config().code_length();
            let query = lookup.query();

            if let Some((_, code)) = lookup.outstanding() {
                return LookupStatus::Loading {
                    code: code.to_string(),
                };
            }

            match (lookup.result(), lookup.last_error()) {
                (Some(LookupResult::Empty), _) => LookupStatus::NoData,
                (_, Some(_)) => LookupStatus::Failed,
                (Some(LookupResult::Success { offices, message }), None) => LookupStatus::Results {
                    count: offices.len(),
                    message: message.clone(),
                },
                (None, None) if query.is_empty() => LookupStatus::Idle {
                    prompt: format!("Enter a {code_length}-digit pincode"),
                },
                (None, None) if !query.is_complete(code_length) => LookupStatus::Typing {
                    remaining: code_length - query.len(),
                },
                (None, None) => LookupStatus::Waiting,
            }
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            debug!(
                event = event.name(),
                user_initiated = event.is_user_initiated(),
                "update"
            );

            if event.is_user_initiated() && !model.screen_active {
                debug!(event = event.name(), "screen inactive, input dropped");
                return;
            }

            match event {
                Event::ScreenActivated => {
                    let commands = model.lookup.cancel_and_clear();
                    Self::dispatch(commands, model, caps);
                    model.screen_active = true;
                    info!("lookup screen activated");
                }

                Event::ScreenDeactivated => {
                    let commands = model.lookup.cancel_and_clear();
                    Self::dispatch(commands, model, caps);
                    model.screen_active = false;
                    info!("lookup screen deactivated");
                }

                Event::QueryChanged { raw } => {
                    let commands = model.lookup.set_query(&raw);
                    Self::dispatch(commands, model, caps);
                }

                Event::SubmitRequested => {
                    let commands = model.lookup.submit_now();
                    Self::dispatch(commands, model, caps);
                }

                Event::ClearRequested => {
                    let commands = model.lookup.cancel_and_clear();
                    Self::dispatch(commands, model, caps);
                }

                Event::ConfigUpdated {
                    code_length,
                    debounce_ms,
                    endpoint,
                } => match LookupConfig::new(code_length, debounce_ms, endpoint) {
                    Ok(config) => {
                        info!(code_length, debounce_ms, "lookup config updated");
                        let commands = model.lookup.set_config(config);
                        Self::dispatch(commands, model, caps);
                    }
                    Err(e) => {
                        warn!(error = %AppError::from(e), "rejected lookup config");
                        return;
                    }
                },

                Event::DebounceElapsed(output) => {
                    let timer = TimerId(output.id());
                    if matches!(output, TimerOutput::Cleared { .. })
                        || model.lookup.pending_timer() != Some(timer)
                    {
                        debug!(%timer, ?output, "debounce timer not pending");
                        return;
                    }
                    let commands = model.lookup.on_settle(timer);
                    Self::dispatch(commands, model, caps);
                }

                Event::LookupCompleted { token, result } => {
                    if !model.lookup.complete(token, lookup::classify(&result)) {
                        return;
                    }
                }
            }

            caps.render.render();
        }

        fn view(&self, model: &Model) -> ViewModel {
            let lookup = &model.lookup;

            ViewModel {
                query: lookup.query().to_string(),
                status: Self::status(model),
                is_loading: lookup.is_loading(),
                error: lookup.last_error().map(UserFacingError::from),
                offices: lookup
                    .result()
                    .map(|r| r.offices().iter().map(PostOfficeRow::from).collect())
                    .unwrap_or_default(),
                can_submit: lookup.is_query_complete(),
                can_clear: !lookup.query().is_empty()
                    || lookup.is_loading()
                    || lookup.result().is_some(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod error_tests {
        use super::*;
        use crate::capabilities::HttpError;

        #[test]
        fn test_error_codes() {
            assert_eq!(ErrorKind::Network.code(), "NETWORK_ERROR");
            assert_eq!(ErrorKind::NoData.code(), "NO_DATA");
            assert!(ErrorKind::Network.is_retryable());
            assert!(!ErrorKind::NoData.is_retryable());
            assert!(!ErrorKind::Validation.is_retryable());
        }

        #[test]
        fn test_user_facing_messages() {
            assert_eq!(
                AppError::no_data().user_facing_message(),
                "No data found for this pincode."
            );
            assert!(AppError::network("dns")
                .user_facing_message()
                .contains("try again"));
            let validation = AppError::new(ErrorKind::Validation, "Enter 6 digits");
            assert_eq!(validation.user_facing_message(), "Enter 6 digits");
        }

        #[test]
        fn test_display_includes_internal() {
            let error = AppError::network("connection reset");
            assert_eq!(
                error.to_string(),
                "[NETWORK_ERROR] network error (internal: connection reset)"
            );
        }

        #[test]
        fn test_from_http_error() {
            let error = AppError::from(HttpError::Network {
                message: "offline".into(),
                request_id: "lookup-3".into(),
            });
            assert_eq!(error.kind, ErrorKind::Network);
            assert_eq!(
                error.context.get("request_id").map(String::as_str),
                Some("lookup-3")
            );

            let error = AppError::from(HttpError::InvalidUrl {
                url: "x".into(),
                reason: "bad".into(),
            });
            assert_eq!(error.kind, ErrorKind::Configuration);
            assert!(error.context.is_empty());
        }

        #[test]
        fn test_from_config_error() {
            let error = AppError::from(ConfigError::CodeLength { got: 0, max: 16 });
            assert_eq!(error.kind, ErrorKind::Configuration);
            assert!(error.message.contains("got 0"));
        }

        #[test]
        fn test_user_facing_error_conversion() {
            let view = UserFacingError::from(&AppError::network("x"));
            assert!(view.is_retryable);
            assert_eq!(view.error_code, "NETWORK_ERROR");
        }
    }

    mod view_tests {
        use super::*;
        use crate::lookup::LookupOutcome;
        use crux_core::App as _;

        fn view(model: &Model) -> ViewModel {
            App.view(model)
        }

        fn settle(model: &mut Model, raw: &str) -> LookupToken {
            model.lookup.set_query(raw);
            let timer = model.lookup.pending_timer().unwrap();
            model
                .lookup
                .on_settle(timer)
                .into_iter()
                .find_map(|c| match c {
                    Command::StartLookup { token, .. } => Some(token),
                    _ => None,
                })
                .unwrap()
        }

        #[test]
        fn test_idle_prompt() {
            let vm = view(&Model::default());
            assert_eq!(
                vm.status,
                LookupStatus::Idle {
                    prompt: "Enter a 6-digit pincode".into()
                }
            );
            assert!(!vm.can_submit);
            assert!(!vm.can_clear);
            assert!(vm.error.is_none());
        }

        #[test]
        fn test_typing_and_waiting() {
            let mut model = Model::default();
            model.lookup.set_query("1100");
            assert_eq!(view(&model).status, LookupStatus::Typing { remaining: 2 });

            model.lookup.set_query("110001");
            let vm = view(&model);
            assert_eq!(vm.status, LookupStatus::Waiting);
            assert!(vm.can_submit);
            assert!(vm.can_clear);
        }

        #[test]
        fn test_loading() {
            let mut model = Model::default();
            settle(&mut model, "110001");
            let vm = view(&model);
            assert!(vm.is_loading);
            assert_eq!(
                vm.status,
                LookupStatus::Loading {
                    code: "110001".into()
                }
            );
        }

        #[test]
        fn test_results_rows() {
            let mut model = Model::default();
            let token = settle(&mut model, "110001");
            let office = PostOffice {
                name: "Connaught Place".into(),
                branch_type: "Sub Post Office".into(),
                delivery_status: "Non-Delivery".into(),
                district: "New Delhi".into(),
                state: "Delhi".into(),
                pincode: "110001".into(),
                ..PostOffice::default()
            };
            model.lookup.complete(
                token,
                LookupOutcome::Completed(LookupResult::Success {
                    offices: vec![office],
                    message: Some("Number of pincode(s) found:1".into()),
                }),
            );

            let vm = view(&model);
            assert!(!vm.is_loading);
            assert_eq!(
                vm.status,
                LookupStatus::Results {
                    count: 1,
                    message: Some("Number of pincode(s) found:1".into())
                }
            );
            assert_eq!(vm.offices.len(), 1);
            assert_eq!(vm.offices[0].location, "New Delhi, Delhi");
            assert!(!vm.offices[0].is_delivery);
        }

        #[test]
        fn test_no_data() {
            let mut model = Model::default();
            let token = settle(&mut model, "999999");
            model
                .lookup
                .complete(token, LookupOutcome::Completed(LookupResult::Empty));

            let vm = view(&model);
            assert_eq!(vm.status, LookupStatus::NoData);
            assert_eq!(
                vm.error.map(|e| e.message),
                Some("No data found for this pincode.".into())
            );
            assert!(vm.offices.is_empty());
        }

        #[test]
        fn test_failed() {
            let mut model = Model::default();
            let token = settle(&mut model, "110001");
            model
                .lookup
                .complete(token, LookupOutcome::Failed(AppError::network("offline")));

            let vm = view(&model);
            assert_eq!(vm.status, LookupStatus::Failed);
            assert!(vm.error.unwrap().is_retryable);
        }

        #[test]
        fn test_status_serializes_tagged() {
            let json = serde_json::to_string(&LookupStatus::Typing { remaining: 3 }).unwrap();
            assert_eq!(json, r#"{"type":"typing","remaining":3}"#);
        }
    }
}
