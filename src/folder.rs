//! Mailbox discovery
//!
//! Folders come back from `LIST "" "*"` with their full hierarchical
//! path. [`Folder`] keeps that path for SELECT and splits off the leaf
//! for display. Well-known folders get a [`FolderRole`], taken from the
//! RFC 6154 special-use attributes when the server sends them and from
//! common names otherwise.

use crate::error::{Error, Result};
use crate::session::{SessionManager, with_deadline};
use async_imap::types::{Name, NameAttribute};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// One mailbox as reported by LIST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    /// Last path segment, for display.
    pub name: String,
    /// Full path, as passed to SELECT.
    pub path: String,
    pub delimiter: Option<String>,
    pub role: Option<FolderRole>,
    /// `false` for `\Noselect` containers.
    pub selectable: bool,
}

/// What a well-known folder is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderRole {
    Inbox,
    Sent,
    Drafts,
    Trash,
    Spam,
    Archive,
}

impl FolderRole {
    /// Role from RFC 6154 special-use attributes.
    fn from_attributes(attributes: &[NameAttribute<'_>]) -> Option<Self> {
        attributes.iter().find_map(|attr| match attr {
            NameAttribute::Sent => Some(Self::Sent),
            NameAttribute::Drafts => Some(Self::Drafts),
            NameAttribute::Trash => Some(Self::Trash),
            NameAttribute::Junk => Some(Self::Spam),
            NameAttribute::Archive => Some(Self::Archive),
            NameAttribute::Extension(label) if label.eq_ignore_ascii_case("\\Spam") => {
                Some(Self::Spam)
            }
            _ => None,
        })
    }

    /// Role guessed from a folder's leaf name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("inbox") {
            return Some(Self::Inbox);
        }
        match name.to_lowercase().as_str() {
            "sent" | "sent items" | "sent messages" | "sent mail" => Some(Self::Sent),
            "drafts" | "draft" => Some(Self::Drafts),
            "trash" | "deleted items" | "deleted messages" | "bin" => Some(Self::Trash),
            "spam" | "junk" | "junk e-mail" => Some(Self::Spam),
            "archive" | "archives" => Some(Self::Archive),
            _ => None,
        }
    }
}

impl fmt::Display for FolderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inbox => "inbox",
            Self::Sent => "sent",
            Self::Drafts => "drafts",
            Self::Trash => "trash",
            Self::Spam => "spam",
            Self::Archive => "archive",
        })
    }
}

impl Folder {
    /// Build a folder from its full path. Returns `None` for an empty
    /// path.
    #[must_use]
    pub fn new(path: &str, delimiter: Option<&str>) -> Option<Self> {
        if path.trim().is_empty() {
            return None;
        }
        let delimiter = delimiter.filter(|d| !d.is_empty());
        let name = delimiter
            .and_then(|d| path.rsplit(d).find(|segment| !segment.is_empty()))
            .unwrap_or(path)
            .to_string();

        Some(Self {
            role: FolderRole::from_name(&name),
            name,
            path: path.to_string(),
            delimiter: delimiter.map(ToString::to_string),
            selectable: true,
        })
    }

    /// Build a folder from one LIST response.
    #[must_use]
    pub fn from_list_entry(entry: &Name) -> Option<Self> {
        Self::with_attributes(entry.name(), entry.delimiter(), entry.attributes())
    }

    fn with_attributes(
        path: &str,
        delimiter: Option<&str>,
        attributes: &[NameAttribute<'_>],
    ) -> Option<Self> {
        let mut folder = Self::new(path, delimiter)?;
        if let Some(role) = FolderRole::from_attributes(attributes) {
            folder.role = Some(role);
        }
        folder.selectable = !attributes
            .iter()
            .any(|attr| matches!(attr, NameAttribute::NoSelect));
        Some(folder)
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl SessionManager {
    /// List every mailbox on the server, in server order.
    ///
    /// Connects first if needed. LIST entries that fail to parse or
    /// have an empty name are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting fails or the server rejects LIST.
    pub async fn list_folders(&mut self) -> Result<Vec<Folder>> {
        self.ensure_connected().await?;
        let timeout = self.timeout();
        let session = self.session_mut("list folders")?;

        let result = with_deadline(timeout, "LIST", async {
            let mut entries = session
                .list(Some(""), Some("*"))
                .await
                .map_err(|e| Error::from_imap("List folders failed", e))?;

            let mut folders = Vec::new();
            while let Some(item) = entries.next().await {
                match item {
                    Ok(entry) => match Folder::from_list_entry(&entry) {
                        Some(folder) => folders.push(folder),
                        None => debug!("Skipping LIST entry with an empty name"),
                    },
                    Err(e) => debug!("Skipping malformed LIST entry: {}", e),
                }
            }
            Ok(folders)
        })
        .await;

        let folders = self.settle(result)?;
        info!("Found {} folders", folders.len());
        Ok(folders)
    }
}
