//! Error types for mailfetch

use crate::session::SessionState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// DNS, socket, TLS or STARTTLS failure while opening a session.
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    /// The server rejected the credentials.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// SELECT failed, including the single reconnect-and-retry.
    #[error("Mailbox unavailable: {0}")]
    MailboxUnavailable(String),

    /// Timeout or connection lost in the middle of an operation.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Email parsing error: {0}")]
    Parse(String),

    /// The server answered NO or BAD to a command.
    #[error("IMAP error: {0}")]
    Imap(String),

    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the session that produced this error must be discarded.
    #[must_use]
    pub const fn is_fatal_to_session(&self) -> bool {
        matches!(self, Self::Network(_) | Self::ConnectFailed(_))
    }

    /// Map an async-imap error, keeping transport failures apart from
    /// server-side rejections.
    pub(crate) fn from_imap(context: &str, err: async_imap::error::Error) -> Self {
        match err {
            async_imap::error::Error::Io(e) => Self::Network(format!("{context}: {e}")),
            async_imap::error::Error::ConnectionLost => {
                Self::Network(format!("{context}: connection lost"))
            }
            other => Self::Imap(format!("{context}: {other}")),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
