//! Error types for the rulekeeper question-answering service.

use thiserror::Error;

/// Library-wide error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// A remote call was rejected. `status` is set when the client surfaced an HTTP status.
    #[error("{}", transport_display(.status, .message))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("File {handle} failed to process. State: {state}")]
    ProcessingFailed { handle: String, state: String },

    #[error("File {handle} still processing after {attempts} poll attempts")]
    TimedOut { handle: String, attempts: u32 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Knowledge base manifest error: {0}")]
    Manifest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn transport_display(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("[{}] {}", code, message),
        None => message.to_string(),
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

/// How the query executor reacts to a failed generation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// File references were rejected as missing or expired
    ContextInvalid,
    /// Quota exhausted or model overloaded
    CapacityExceeded,
    /// Anything else; never retried
    Fatal,
}

const CONTEXT_INVALID_STATUSES: [u16; 2] = [404, 403];
const CAPACITY_STATUSES: [u16; 2] = [429, 503];
const CONTEXT_INVALID_MARKERS: [&str; 4] = ["404", "403", "NOT_FOUND", "PERMISSION_DENIED"];
const CAPACITY_MARKERS: [&str; 4] = ["429", "503", "RESOURCE_EXHAUSTED", "UNAVAILABLE"];

impl ApiError {
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        ApiError::Transport {
            status,
            message: message.into(),
        }
    }

    /// HTTP status attached to a transport error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Classify this error for the fallback ladder.
    ///
    /// A recognised HTTP status decides on its own. Otherwise the message is split into
    /// words and matched against the status markers, context-invalid first, so `1403` in a
    /// quota message does not read as `403`.
    pub fn class(&self) -> ErrorClass {
        let (status, message) = match self {
            ApiError::Transport { status, message } => (*status, message.as_str()),
            _ => return ErrorClass::Fatal,
        };

        match status {
            Some(code) if CONTEXT_INVALID_STATUSES.contains(&code) => {
                return ErrorClass::ContextInvalid
            }
            Some(code) if CAPACITY_STATUSES.contains(&code) => {
                return ErrorClass::CapacityExceeded
            }
            _ => {}
        }

        let words: Vec<&str> = message
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|word| !word.is_empty())
            .collect();
        let mentions = |markers: &[&str]| words.iter().any(|word| markers.contains(word));

        if mentions(&CONTEXT_INVALID_MARKERS) {
            ErrorClass::ContextInvalid
        } else if mentions(&CAPACITY_MARKERS) {
            ErrorClass::CapacityExceeded
        } else {
            ErrorClass::Fatal
        }
    }
}
