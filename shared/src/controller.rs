//! Debounced, single-flight lookup controller.
//!
//! The controller owns the query the user is typing, turns bursts of edits
//! into one settled value per pause, and keeps at most one lookup outstanding.
//! It performs no I/O: every operation returns the [`Command`]s the host has to
//! carry out (schedule or clear a countdown, start or abort a request), and
//! results come back through [`LookupController::complete`].
//!
//! Stale work is recognised by identity. A settle only counts if its
//! [`TimerId`] is the pending one, and a completion only counts if its
//! [`LookupToken`] is the outstanding one, so a shell that is slow to cancel
//! can never rewind the state.

use tracing::{debug, info};

use crate::lookup::{LookupOutcome, LookupResult};
use crate::model::{LookupConfig, LookupToken, Query, TimerId};
use crate::AppError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    ScheduleSettle { timer: TimerId, after_ms: u64 },
    CancelSettle { timer: TimerId },
    StartLookup { token: LookupToken, code: Query },
    AbortLookup { token: LookupToken },
}

#[derive(Debug)]
struct PendingSettle {
    timer: TimerId,
    value: Query,
}

#[derive(Debug)]
struct InFlight {
    token: LookupToken,
    code: Query,
}

#[derive(Debug)]
pub struct LookupController {
    config: LookupConfig,
    query: Query,
    result: Option<LookupResult>,
    last_error: Option<AppError>,
    pending_settle: Option<PendingSettle>,
    in_flight: Option<InFlight>,
    next_token: u64,
    next_timer: u64,
}

impl Default for LookupController {
    fn default() -> Self {
        Self::new(LookupConfig::default())
    }
}

impl LookupController {
    pub fn new(config: LookupConfig) -> Self {
        Self {
            config,
            query: Query::default(),
            result: None,
            last_error: None,
            pending_settle: None,
            in_flight: None,
            next_token: 1,
            next_timer: 1,
        }
    }

    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn result(&self) -> Option<&LookupResult> {
        self.result.as_ref()
    }

    pub fn last_error(&self) -> Option<&AppError> {
        self.last_error.as_ref()
    }

    /// True exactly while a lookup is outstanding.
    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_query_complete(&self) -> bool {
        self.query.is_complete(self.config.code_length())
    }

    pub fn outstanding(&self) -> Option<(LookupToken, &Query)> {
        self.in_flight.as_ref().map(|f| (f.token, &f.code))
    }

    pub fn pending_timer(&self) -> Option<TimerId> {
        self.pending_settle.as_ref().map(|p| p.timer)
    }

    /// Store a new raw input and restart the debounce countdown.
    pub fn set_query(&mut self, raw: &str) -> Vec<Command> {
        let query = Query::sanitize(raw, self.config.code_length());
        if query == self.query {
            return Vec::new();
        }
        self.restart_settle(query)
    }

    /// The countdown for `timer` ran out. Ignored unless `timer` is the pending one.
    pub fn on_settle(&mut self, timer: TimerId) -> Vec<Command> {
        let pending = match self.pending_settle.take() {
            Some(pending) if pending.timer == timer => pending,
            other => {
                debug!(%timer, "ignoring stale debounce timer");
                self.pending_settle = other;
                return Vec::new();
            }
        };

        if pending.value.is_complete(self.config.code_length()) {
            self.start_lookup(pending.value)
        } else {
            debug!(value = %pending.value, "settled on an incomplete code");
            self.reset_lookup()
        }
    }

    /// Skip the rest of the debounce wait. No-op unless the query is complete.
    pub fn submit_now(&mut self) -> Vec<Command> {
        if !self.is_query_complete() {
            debug!(query = %self.query, "submit ignored for incomplete code");
            return Vec::new();
        }

        let mut commands = Vec::with_capacity(3);
        if let Some(pending) = self.pending_settle.take() {
            commands.push(Command::CancelSettle {
                timer: pending.timer,
            });
        }
        commands.extend(self.start_lookup(self.query.clone()));
        commands
    }

    pub fn cancel_and_clear(&mut self) -> Vec<Command> {
        let mut commands = Vec::with_capacity(2);
        if let Some(pending) = self.pending_settle.take() {
            commands.push(Command::CancelSettle {
                timer: pending.timer,
            });
        }
        commands.extend(self.reset_lookup());
        self.query = Query::default();
        commands
    }

    /// Swap the configuration. The current query is re-sanitised against the
    /// new code length and settles again if it changed or its completeness
    /// flipped; otherwise an outstanding request is left alone.
    pub fn set_config(&mut self, config: LookupConfig) -> Vec<Command> {
        let was_complete = self.is_query_complete();
        self.config = config;

        let query = Query::sanitize(self.query.as_str(), self.config.code_length());
        if query == self.query && query.is_complete(self.config.code_length()) == was_complete {
            return Vec::new();
        }
        self.restart_settle(query)
    }

    /// Apply a finished lookup. Returns `false` when `token` is not the
    /// outstanding request, in which case nothing changes.
    pub fn complete(&mut self, token: LookupToken, outcome: LookupOutcome) -> bool {
        let flight = match self.in_flight.take() {
            Some(flight) if flight.token == token => flight,
            other => {
                debug!(%token, "dropping result of superseded lookup");
                self.in_flight = other;
                return false;
            }
        };

        match outcome {
            LookupOutcome::Cancelled => {
                debug!(%token, code = %flight.code, "lookup aborted");
            }
            LookupOutcome::Failed(error) => {
                info!(%token, code = %flight.code, error = %error, "lookup failed");
                if !self.is_query_complete() {
                    debug!(%token, "query became incomplete while loading, error dropped");
                    return true;
                }
                self.last_error = Some(error);
            }
            LookupOutcome::Completed(result) => {
                if !self.is_query_complete() {
                    debug!(%token, "query became incomplete while loading, result dropped");
                    return true;
                }
                info!(
                    %token,
                    code = %flight.code,
                    offices = result.offices().len(),
                    "lookup completed"
                );
                if result == LookupResult::Empty {
                    self.last_error = Some(AppError::no_data());
                }
                self.result = Some(result);
            }
        }
        true
    }

    fn restart_settle(&mut self, query: Query) -> Vec<Command> {
        let mut commands = Vec::with_capacity(2);
        if let Some(pending) = self.pending_settle.take() {
            commands.push(Command::CancelSettle {
                timer: pending.timer,
            });
        }

        if !query.is_complete(self.config.code_length()) {
            self.result = None;
            self.last_error = None;
        }

        let timer = self.allocate_timer();
        debug!(%timer, query = %query, "debounce restarted");
        commands.push(Command::ScheduleSettle {
            timer,
            after_ms: self.config.debounce_ms(),
        });
        self.pending_settle = Some(PendingSettle {
            timer,
            value: query.clone(),
        });
        self.query = query;
        commands
    }

    fn start_lookup(&mut self, code: Query) -> Vec<Command> {
        let mut commands = Vec::with_capacity(2);
        if let Some(previous) = self.in_flight.take() {
            debug!(token = %previous.token, "superseding outstanding lookup");
            commands.push(Command::AbortLookup {
                token: previous.token,
            });
        }

        let token = LookupToken(self.next_token);
        self.next_token += 1;

        self.result = None;
        self.last_error = None;
        self.in_flight = Some(InFlight {
            token,
            code: code.clone(),
        });

        debug!(%token, %code, "lookup started");
        commands.push(Command::StartLookup { token, code });
        commands
    }

    fn reset_lookup(&mut self) -> Vec<Command> {
        self.result = None;
        self.last_error = None;
        self.in_flight
            .take()
            .map(|flight| Command::AbortLookup {
                token: flight.token,
            })
            .into_iter()
            .collect()
    }

    fn allocate_timer(&mut self) -> TimerId {
        let timer = TimerId(self.next_timer);
        self.next_timer += 1;
        timer
    }
}
