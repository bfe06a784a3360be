//! Structured messages built from raw RFC 5322 bytes

use crate::address::{Address, addresses_in};
use crate::error::{Error, Result};
use crate::header::header_value;
use crate::mime::{Attachment, BodyParts, InlineImage, MimeNode, walk};
use chrono::{DateTime, FixedOffset};
use mailparse::{MailHeader, MailHeaderMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A message as handed to the storage layer.
///
/// `uid` is only meaningful inside the session that fetched it. Use
/// [`Message::dedup_key`] to decide whether a message is already
/// stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub uid: Option<u32>,
    /// The `Message-ID` header, angle brackets included.
    pub message_id: Option<String>,
    pub from: Option<Address>,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub subject: String,
    /// `None` when the header is missing or unparsable.
    pub date: Option<DateTime<FixedOffset>>,
    pub body: MessageBody,
    pub attachments: Vec<Attachment>,
    pub inline_images: BTreeMap<String, InlineImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub plain: Option<String>,
    pub html: Option<String>,
}

impl Message {
    /// Key for "already stored?" checks across sessions.
    #[must_use]
    pub fn dedup_key(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    #[must_use]
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// Build a [`Message`] from raw bytes.
///
/// `raw` may be a full message or just its header block. The body is
/// walked only when `include_body` is set.
///
/// # Errors
///
/// Returns [`Error::Parse`] when the bytes cannot be parsed at all.
/// Individual bad headers never fail the message.
pub fn parse_message(uid: Option<u32>, raw: &[u8], include_body: bool) -> Result<Message> {
    let parsed = mailparse::parse_mail(raw).map_err(|e| Error::Parse(e.to_string()))?;
    let headers = &parsed.headers;

    let parts = if include_body {
        walk(&MimeNode::from_parsed(&parsed), true)
    } else {
        BodyParts::default()
    };

    Ok(Message {
        uid,
        message_id: header_text(headers, "Message-ID").filter(|id| !id.is_empty()),
        from: headers
            .get_first_header("From")
            .and_then(|h| addresses_in(h).into_iter().next()),
        to: addresses(headers, "To"),
        cc: addresses(headers, "Cc"),
        subject: header_text(headers, "Subject").unwrap_or_default(),
        date: header_text(headers, "Date").and_then(|d| parse_date(&d)),
        body: MessageBody {
            plain: parts.plain,
            html: parts.html,
        },
        attachments: parts.attachments,
        inline_images: parts.inline_images,
    })
}

/// Decoded value of the first header called `name`.
fn header_text(headers: &[MailHeader<'_>], name: &str) -> Option<String> {
    headers
        .get_first_header(name)
        .map(|h| header_value(h).trim().to_string())
}

fn addresses(headers: &[MailHeader<'_>], name: &str) -> Vec<Address> {
    headers
        .get_all_headers(name)
        .into_iter()
        .flat_map(addresses_in)
        .collect()
}

/// Best-effort `Date` parsing: strict RFC 2822 first, then the more
/// forgiving parser for the variants real mailers produce.
fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(value).ok().or_else(|| {
        let timestamp = mailparse::dateparse(value).ok()?;
        DateTime::from_timestamp(timestamp, 0).map(|utc| utc.fixed_offset())
    })
}
