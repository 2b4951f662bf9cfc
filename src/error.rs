//! Failure kinds surfaced by the contact repository and the screen controllers.

use std::fmt;

use thiserror::Error;

/// Form fields checked client-side before anything is sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    FirstName,
    PhoneNumber,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::FirstName => f.write_str("first name"),
            Field::PhoneNumber => f.write_str("phone number"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepoError {
    /// No connectivity, DNS failure, connection reset and other IO trouble.
    #[error("network connection error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },

    /// 2xx answer whose envelope carries `success = false`.
    #[error("{}", join_messages(.messages))]
    Application { messages: Vec<String> },

    /// 2xx answer without the payload the operation needs.
    #[error("{0} not found in server response")]
    NotFound(&'static str),

    /// The body could not be decoded as an envelope.
    #[error("malformed server response: {0}")]
    Decode(String),

    #[error("{0} must not be blank")]
    Validation(Field),
}

fn join_messages(messages: &[String]) -> String {
    if messages.is_empty() {
        "unknown server error".to_string()
    } else {
        messages.join(", ")
    }
}

impl RepoError {
    pub fn is_transport(&self) -> bool {
        matches!(self, RepoError::Transport(_))
    }
}
