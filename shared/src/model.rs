use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::capabilities::{HttpError, ValidatedUrl};
use crate::controller::LookupController;
use crate::{DEBOUNCE_MS, MAX_DEBOUNCE_MS, MAX_PINCODE_LENGTH, PINCODE_ENDPOINT, PINCODE_LENGTH};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("code length must be between 1 and {max}, got {got}")]
    CodeLength { got: usize, max: usize },

    #[error("debounce interval must be at most {max}ms, got {got}ms")]
    Debounce { got: u64, max: u64 },

    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] HttpError),
}

/// Tunables for the lookup screen. Only constructible through validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupConfig {
    code_length: usize,
    debounce_ms: u64,
    endpoint: ValidatedUrl,
}

impl LookupConfig {
    pub fn new(
        code_length: usize,
        debounce_ms: u64,
        endpoint: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        if code_length == 0 || code_length > MAX_PINCODE_LENGTH {
            return Err(ConfigError::CodeLength {
                got: code_length,
                max: MAX_PINCODE_LENGTH,
            });
        }
        if debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::Debounce {
                got: debounce_ms,
                max: MAX_DEBOUNCE_MS,
            });
        }

        let mut endpoint = endpoint.into();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }

        Ok(Self {
            code_length,
            debounce_ms,
            endpoint: ValidatedUrl::new(endpoint)?,
        })
    }

    pub fn code_length(&self) -> usize {
        self.code_length
    }

    pub fn debounce_ms(&self) -> u64 {
        self.debounce_ms
    }

    pub fn endpoint(&self) -> &ValidatedUrl {
        &self.endpoint
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            code_length: PINCODE_LENGTH,
            debounce_ms: DEBOUNCE_MS,
            endpoint: ValidatedUrl::trusted(PINCODE_ENDPOINT),
        }
    }
}

/// Sanitised user input: ASCII digits only, never longer than the configured length.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query(String);

impl Query {
    pub fn sanitize(raw: &str, max_len: usize) -> Self {
        Self(
            raw.chars()
                .filter(char::is_ascii_digit)
                .take(max_len)
                .collect(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_complete(&self, code_length: usize) -> bool {
        self.0.len() == code_length
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one lookup request. Assigned in strictly increasing order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LookupToken(pub u64);

impl LookupToken {
    pub fn request_id(self) -> String {
        format!("lookup-{}", self.0)
    }
}

impl fmt::Display for LookupToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of one pending debounce countdown.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A post office record as returned by the directory API. Display data only.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PostOffice {
    pub name: String,
    pub branch_type: String,
    pub delivery_status: String,
    pub district: String,
    pub state: String,
    pub pincode: String,
    pub circle: Option<String>,
    pub division: Option<String>,
    pub region: Option<String>,
    pub block: Option<String>,
    pub country: Option<String>,
}

impl PostOffice {
    pub fn is_delivery(&self) -> bool {
        self.delivery_status.eq_ignore_ascii_case("delivery")
    }

    pub fn location_line(&self) -> String {
        match (self.district.is_empty(), self.state.is_empty()) {
            (false, false) => format!("{}, {}", self.district, self.state),
            (false, true) => self.district.clone(),
            (true, false) => self.state.clone(),
            (true, true) => String::new(),
        }
    }
}

#[derive(Default)]
pub struct Model {
    pub screen_active: bool,
    pub lookup: LookupController,
}

impl Model {
    pub fn with_config(config: LookupConfig) -> Self {
        Self {
            screen_active: false,
            lookup: LookupController::new(config),
        }
    }
}
