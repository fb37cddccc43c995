use serde::{Deserialize, Serialize};

use crate::capabilities::{HttpResult, TimerOutput};
use crate::model::LookupToken;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    ScreenActivated,
    ScreenDeactivated,
    QueryChanged { raw: String },
    SubmitRequested,
    ClearRequested,
    ConfigUpdated {
        code_length: usize,
        debounce_ms: u64,
        endpoint: String,
    },

    // Internal events, resolved from shell effects
    #[serde(skip)]
    DebounceElapsed(TimerOutput),
    #[serde(skip)]
    LookupCompleted {
        token: LookupToken,
        result: HttpResult,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ScreenActivated => "screen_activated",
            Self::ScreenDeactivated => "screen_deactivated",
            Self::QueryChanged { .. } => "query_changed",
            Self::SubmitRequested => "submit_requested",
            Self::ClearRequested => "clear_requested",
            Self::ConfigUpdated { .. } => "config_updated",
            Self::DebounceElapsed(_) => "debounce_elapsed",
            Self::LookupCompleted { .. } => "lookup_completed",
        }
    }

    pub fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::QueryChanged { .. } | Self::SubmitRequested | Self::ClearRequested
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_initiated_events() {
        assert!(Event::QueryChanged { raw: "1".into() }.is_user_initiated());
        assert!(Event::SubmitRequested.is_user_initiated());
        assert!(Event::ClearRequested.is_user_initiated());
        assert!(!Event::ScreenActivated.is_user_initiated());
        assert!(!Event::DebounceElapsed(TimerOutput::Fired { id: 1 }).is_user_initiated());
    }

    #[test]
    fn test_shell_events_round_trip_json() {
        let event = Event::QueryChanged {
            raw: "110001".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"QueryChanged":{"raw":"110001"}}"#);
        assert_eq!(serde_json::from_str::<Event>(&json).unwrap(), event);
    }

    #[test]
    fn test_internal_events_are_not_accepted_from_shell() {
        let json = r#"{"DebounceElapsed":{"Fired":{"id":1}}}"#;
        assert!(serde_json::from_str::<Event>(json).is_err());
    }
}
