//! IMAP session lifecycle
//!
//! [`SessionManager`] owns at most one live connection and tracks where
//! it is in the `Disconnected -> Connecting -> Authenticated ->
//! MailboxSelected` progression. Every operation checks the state
//! first, so calling something out of order is an
//! [`Error::InvalidState`] rather than a silent no-op.
//!
//! A failed attempt never leaves a half-open session behind: whatever
//! went wrong, the manager ends up `Disconnected`.

use crate::config::ConnectionParams;
use crate::error::{Error, Result};
use crate::transport::{self, ImapSession};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Name sent in the IMAP `ID` handshake.
pub const CLIENT_NAME: &str = "mailfetch";

/// Where a [`SessionManager`] is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticated,
    MailboxSelected(String),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Authenticated => f.write_str("authenticated"),
            Self::MailboxSelected(name) => write!(f, "selected on {name}"),
        }
    }
}

/// One IMAP session and its state.
///
/// All operations take `&mut self`, so a manager can only ever serve
/// one caller at a time. Run independent managers on separate tasks
/// for parallelism; they share nothing.
pub struct SessionManager {
    params: ConnectionParams,
    session: Option<ImapSession>,
    state: SessionState,
}

impl SessionManager {
    #[must_use]
    pub const fn new(params: ConnectionParams) -> Self {
        Self {
            params,
            session: None,
            state: SessionState::Disconnected,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub const fn params(&self) -> &ConnectionParams {
        &self.params
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Open the connection, log in and identify the client.
    ///
    /// The `ID` handshake is best-effort: a server that rejects or does
    /// not understand it is logged and the session is used anyway.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if a session is already open.
    /// - [`Error::ConnectFailed`] for DNS, socket or TLS failures.
    /// - [`Error::AuthFailed`] if the server rejects the credentials.
    /// - [`Error::Network`] if a step exceeds the configured timeout.
    pub async fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Err(self.invalid("connect"));
        }

        self.state = SessionState::Connecting;
        match self.establish().await {
            Ok(session) => {
                self.session = Some(session);
                self.state = SessionState::Authenticated;
                info!("Connected to IMAP server {}", self.params.address());
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Disconnected;
                warn!("Connection to {} failed: {}", self.params.address(), e);
                Err(e)
            }
        }
    }

    /// SELECT `name`, reconnecting once if the server refuses.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if no session is open.
    /// - [`Error::MailboxUnavailable`] if SELECT fails again after the
    ///   reconnect.
    /// - Any [`connect`](Self::connect) error from the reconnect itself.
    pub async fn select_mailbox(&mut self, name: &str) -> Result<()> {
        if self.session.is_none() {
            return Err(self.invalid("select a mailbox"));
        }

        let Err(first) = self.try_select(name).await else {
            return Ok(());
        };

        warn!("SELECT {} failed ({}), reconnecting once", name, first);
        self.disconnect().await;
        self.connect().await?;

        self.try_select(name)
            .await
            .map_err(|e| Error::MailboxUnavailable(format!("{name}: {e}")))
    }

    /// Log out and drop the connection.
    ///
    /// Safe to call in any state and more than once. Errors during
    /// LOGOUT are ignored since the connection is being thrown away.
    pub async fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            let logout = with_deadline(self.params.timeout, "LOGOUT", async {
                session
                    .logout()
                    .await
                    .map_err(|e| Error::from_imap("Logout failed", e))
            })
            .await;
            if let Err(e) = logout {
                debug!("Ignoring logout error: {}", e);
            }
            debug!("Disconnected from {}", self.params.address());
        }
        self.state = SessionState::Disconnected;
    }

    // -- crate-internal helpers for the folder and fetch operations --

    /// Connect first if there is no live session.
    pub(crate) async fn ensure_connected(&mut self) -> Result<()> {
        if self.session.is_some() {
            Ok(())
        } else {
            self.connect().await
        }
    }

    pub(crate) const fn timeout(&self) -> Option<Duration> {
        self.params.timeout
    }

    pub(crate) fn session_mut(&mut self, operation: &'static str) -> Result<&mut ImapSession> {
        match self.session.as_mut() {
            Some(session) => Ok(session),
            None => Err(Error::InvalidState {
                operation,
                state: self.state.clone(),
            }),
        }
    }

    /// Pass `result` through, discarding the session if the error
    /// means the connection cannot be trusted any more.
    pub(crate) fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && e.is_fatal_to_session()
        {
            warn!("Discarding IMAP session: {}", e);
            self.session = None;
            self.state = SessionState::Disconnected;
        }
        result
    }

    fn invalid(&self, operation: &'static str) -> Error {
        Error::InvalidState {
            operation,
            state: self.state.clone(),
        }
    }

    async fn establish(&self) -> Result<ImapSession> {
        let timeout = self.params.timeout;
        let client = with_deadline(timeout, "connect", transport::open(&self.params)).await?;

        let mut session = with_deadline(timeout, "LOGIN", async {
            client
                .login(&self.params.username, &self.params.password)
                .await
                .map_err(|(e, _)| login_error(e))
        })
        .await?;

        self.identify(&mut session).await;
        Ok(session)
    }

    /// Send the fixed `ID` command some providers insist on before
    /// allowing mailbox access.
    async fn identify(&self, session: &mut ImapSession) {
        let command = format!(
            "ID (\"name\" \"{CLIENT_NAME}\" \"version\" \"{}\" \"vendor\" \"{CLIENT_NAME}\")",
            env!("CARGO_PKG_VERSION")
        );

        let result = with_deadline(self.params.timeout, "ID", async {
            session
                .run_command_and_check_ok(&command)
                .await
                .map_err(|e| Error::from_imap("ID failed", e))
        })
        .await;

        match result {
            Ok(()) => debug!("Client identification accepted"),
            Err(e) => warn!("Client identification failed, continuing: {}", e),
        }
    }

    async fn try_select(&mut self, name: &str) -> Result<()> {
        let timeout = self.params.timeout;
        let session = self.session_mut("select a mailbox")?;

        let result = with_deadline(timeout, "SELECT", async {
            session
                .select(name)
                .await
                .map(|_| ())
                .map_err(|e| Error::from_imap(&format!("Failed to select {name}"), e))
        })
        .await;

        match self.settle(result) {
            Ok(()) => {
                debug!("Selected mailbox {}", name);
                self.state = SessionState::MailboxSelected(name.to_string());
                Ok(())
            }
            Err(e) => {
                if self.session.is_some() {
                    self.state = SessionState::Authenticated;
                }
                Err(e)
            }
        }
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("params", &self.params)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Run `fut`, turning an expired `timeout` into [`Error::Network`].
pub(crate) async fn with_deadline<T>(
    timeout: Option<Duration>,
    operation: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Error::Network(format!("{operation} timed out after {limit:?}")))?,
        None => fut.await,
    }
}

fn login_error(err: async_imap::error::Error) -> Error {
    match err {
        async_imap::error::Error::Io(e) => Error::ConnectFailed(format!("Login failed: {e}")),
        async_imap::error::Error::ConnectionLost => {
            Error::ConnectFailed("Login failed: connection lost".into())
        }
        other => Error::AuthFailed(format!("Login failed: {other}")),
    }
}
