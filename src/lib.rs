//! Read-only IMAP mail retrieval
//!
//! Connects to an IMAP server over TLS, STARTTLS or plain TCP, pages
//! through a mailbox newest-first and turns each raw message into a
//! [`Message`]: decoded headers, parsed addresses, plain and HTML
//! bodies, attachments and `cid:`-addressable inline images.
//!
//! [`MailClient`] runs each operation on a fresh connection.
//! [`SessionManager`] exposes the underlying session when several
//! operations should share one.
//!
//! The parsing half ([`parse_message`], [`decode_header`],
//! [`parse_address_list`], [`walk`]) has no network dependency and can
//! be used on messages from any source.

mod address;
mod client;
mod config;
mod error;
mod fetch;
mod folder;
mod header;
mod message;
mod mime;
mod session;
mod transport;

pub use address::{Address, parse_address_list};
pub use client::{ConnectionCheck, MailClient};
pub use config::{ConnectionParams, TransportMode};
pub use error::{Error, Result};
pub use fetch::MessagePage;
pub use folder::{Folder, FolderRole};
pub use header::{decode_header, decode_header_bytes, decode_text};
pub use message::{Message, MessageBody, parse_message};
pub use mime::{Attachment, BodyParts, InlineImage, MimeLeaf, MimeNode, walk};
pub use session::{CLIENT_NAME, SessionManager, SessionState};
