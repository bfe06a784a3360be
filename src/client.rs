//! One-shot mail retrieval client

use crate::config::ConnectionParams;
use crate::error::Result;
use crate::fetch::MessagePage;
use crate::folder::Folder;
use crate::message::Message;
use crate::session::SessionManager;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Outcome of [`MailClient::test_connection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionCheck {
    pub ok: bool,
    pub message: String,
}

/// Read-only IMAP client.
///
/// Each call opens its own session, does its work and logs out, so a
/// `MailClient` can be shared freely. Use [`MailClient::session`] to
/// run several operations over one connection.
#[derive(Debug, Clone)]
pub struct MailClient {
    params: ConnectionParams,
}

impl MailClient {
    #[must_use]
    pub const fn new(params: ConnectionParams) -> Self {
        Self { params }
    }

    #[must_use]
    pub const fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// A fresh, unconnected session using this client's parameters.
    #[must_use]
    pub fn session(&self) -> SessionManager {
        SessionManager::new(self.params.clone())
    }

    /// Try to connect and log in, reporting the outcome instead of
    /// failing.
    pub async fn test_connection(&self) -> ConnectionCheck {
        let mut session = self.session();
        let result = session.connect().await;
        session.disconnect().await;

        match result {
            Ok(()) => ConnectionCheck {
                ok: true,
                message: format!("Connected to {}", self.params.address()),
            },
            Err(e) => ConnectionCheck {
                ok: false,
                message: e.to_string(),
            },
        }
    }

    /// All folders, or an empty list if they could not be listed.
    ///
    /// Use [`try_list_folders`](Self::try_list_folders) to see why.
    pub async fn list_folders(&self) -> Vec<Folder> {
        match self.try_list_folders().await {
            Ok(folders) => folders,
            Err(e) => {
                warn!("Listing folders failed: {}", e);
                Vec::new()
            }
        }
    }

    /// All folders on the server.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting or LIST fails.
    pub async fn try_list_folders(&self) -> Result<Vec<Folder>> {
        let mut session = self.session();
        let result = session.list_folders().await;
        session.disconnect().await;
        result
    }

    /// One page of messages from `mailbox`, newest first.
    ///
    /// # Errors
    ///
    /// See [`SessionManager::fetch_page`].
    pub async fn fetch_page(
        &self,
        mailbox: &str,
        limit: usize,
        offset: usize,
        include_body: bool,
    ) -> Result<MessagePage> {
        let mut session = self.session();
        let result = session
            .fetch_page(mailbox, limit, offset, include_body)
            .await;
        session.disconnect().await;
        result
    }

    /// The full message with `uid`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// See [`SessionManager::fetch_one`].
    pub async fn fetch_one(&self, mailbox: &str, uid: u32) -> Result<Option<Message>> {
        let mut session = self.session();
        let result = session.fetch_one(mailbox, uid).await;
        session.disconnect().await;
        result
    }
}
