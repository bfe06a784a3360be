//! Paginated message retrieval

use crate::error::{Error, Result};
use crate::message::{Message, parse_message};
use crate::session::{SessionManager, with_deadline};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One page of messages, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    /// Number of messages in the mailbox, independent of paging.
    pub total: usize,
}

impl MessagePage {
    /// Number of pages of `limit` messages needed to cover `total`.
    #[must_use]
    pub const fn page_count(&self, limit: usize) -> usize {
        if limit == 0 {
            0
        } else {
            self.total.div_ceil(limit)
        }
    }
}

/// The `[offset, offset + limit)` window of `uids`, clamped.
fn page_window(uids: &[u32], limit: usize, offset: usize) -> &[u32] {
    let start = offset.min(uids.len());
    let end = offset.saturating_add(limit).min(uids.len());
    &uids[start..end]
}

/// A FETCH response stream that fails part way leaves unread
/// responses on the connection, so the session cannot carry another
/// command.
fn broken_stream(uid: u32, err: &async_imap::error::Error) -> Error {
    Error::Network(format!("Fetch of UID {uid} broke off: {err}"))
}

const fn fetch_query(include_body: bool) -> &'static str {
    if include_body {
        "(UID BODY.PEEK[])"
    } else {
        "(UID BODY.PEEK[HEADER])"
    }
}

impl SessionManager {
    /// UIDs of every message in `mailbox`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting, SELECT or UID SEARCH fails.
    pub async fn search_all(&mut self, mailbox: &str) -> Result<Vec<u32>> {
        self.ensure_connected().await?;
        self.select_mailbox(mailbox).await?;

        let timeout = self.timeout();
        let session = self.session_mut("search")?;
        let result = with_deadline(timeout, "UID SEARCH", async {
            session
                .uid_search("ALL")
                .await
                .map_err(|e| Error::from_imap("Search failed", e))
        })
        .await;

        let mut uids: Vec<u32> = self.settle(result)?.into_iter().collect();
        uids.sort_unstable_by(|a, b| b.cmp(a));
        info!("Found {} messages in {}", uids.len(), mailbox);
        Ok(uids)
    }

    /// Fetch `limit` messages starting `offset` messages from the
    /// newest.
    ///
    /// Messages that cannot be fetched or parsed are logged and left
    /// out; the page still reports the mailbox `total`.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting, SELECT or SEARCH fails, or if
    /// the connection drops part way through the page.
    pub async fn fetch_page(
        &mut self,
        mailbox: &str,
        limit: usize,
        offset: usize,
        include_body: bool,
    ) -> Result<MessagePage> {
        let uids = self.search_all(mailbox).await?;
        let total = uids.len();
        let window = page_window(&uids, limit, offset);

        debug!(
            "Fetching {} of {} messages from {} (offset {})",
            window.len(),
            total,
            mailbox,
            offset
        );

        let mut messages = Vec::with_capacity(window.len());
        for &uid in window {
            match self.fetch_message(uid, include_body).await {
                Ok(Some(message)) => messages.push(message),
                Ok(None) => warn!("UID {} returned no content", uid),
                Err(e) if e.is_fatal_to_session() => return Err(e),
                Err(e) => warn!("Failed to fetch UID {}: {}", uid, e),
            }
        }

        Ok(MessagePage { messages, total })
    }

    /// Fetch the full message with `uid`, or `None` if it does not
    /// exist or cannot be parsed.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting, SELECT or FETCH fails.
    pub async fn fetch_one(&mut self, mailbox: &str, uid: u32) -> Result<Option<Message>> {
        self.ensure_connected().await?;
        self.select_mailbox(mailbox).await?;

        match self.fetch_message(uid, true).await {
            Err(Error::Parse(reason)) => {
                warn!("UID {} in {} could not be parsed: {}", uid, mailbox, reason);
                Ok(None)
            }
            other => other,
        }
    }

    /// Fetch and parse one message from the selected mailbox.
    async fn fetch_message(&mut self, uid: u32, include_body: bool) -> Result<Option<Message>> {
        let Some((uid, raw)) = self.fetch_raw(uid, include_body).await? else {
            return Ok(None);
        };
        parse_message(Some(uid), &raw, include_body).map(Some)
    }

    /// Raw bytes (whole message or header block) for `uid`.
    async fn fetch_raw(&mut self, uid: u32, include_body: bool) -> Result<Option<(u32, Vec<u8>)>> {
        let timeout = self.timeout();
        let session = self.session_mut("fetch")?;

        let result = with_deadline(timeout, "UID FETCH", async {
            let mut responses = session
                .uid_fetch(uid.to_string(), fetch_query(include_body))
                .await
                .map_err(|e| Error::from_imap("Fetch failed", e))?;

            // Drain the whole stream so the session is ready for the
            // next command.
            let mut found = None;
            while let Some(item) = responses.next().await {
                let fetch = item.map_err(|e| broken_stream(uid, &e))?;
                if found.is_some() {
                    continue;
                }
                let content = if include_body {
                    fetch.body()
                } else {
                    fetch.header()
                };
                if let Some(content) = content {
                    found = Some((fetch.uid.unwrap_or(uid), content.to_vec()));
                }
            }
            Ok(found)
        })
        .await;

        self.settle(result)
    }
}
