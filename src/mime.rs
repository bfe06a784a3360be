//! MIME tree and body walker
//!
//! A raw message is parsed once into a [`MimeNode`] tree with transfer
//! encodings already undone. [`walk`] then visits the leaves
//! depth-first, in document order, and sorts each one into the plain
//! body, the HTML body, an attachment, or an inline image.

use crate::error::{Error, Result};
use crate::header::{decode_header, decode_text};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use mailparse::{MailHeaderMap, ParsedMail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// One node of a parsed MIME message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimeNode {
    Leaf(MimeLeaf),
    Composite {
        content_type: String,
        parts: Vec<MimeNode>,
    },
}

/// A part with content, and the headers the walker looks at.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MimeLeaf {
    /// Lowercased media type, e.g. `text/plain`.
    pub content_type: String,
    /// Declared `charset` parameter, if any.
    pub charset: Option<String>,
    /// Raw `Content-ID` value, brackets included.
    pub content_id: Option<String>,
    /// Lowercased disposition type (`inline`, `attachment`, ...).
    pub disposition: Option<String>,
    /// Undecoded filename from the disposition or the `name` parameter.
    pub filename: Option<String>,
    /// Content with the transfer encoding removed.
    pub body: Vec<u8>,
}

impl MimeNode {
    /// Parse raw RFC 5322 bytes into a tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when the bytes are not a message
    /// `mailparse` can make sense of.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let parsed = mailparse::parse_mail(raw).map_err(|e| Error::Parse(e.to_string()))?;
        Ok(Self::from_parsed(&parsed))
    }

    /// Convert an already parsed message.
    #[must_use]
    pub fn from_parsed(part: &ParsedMail<'_>) -> Self {
        let content_type = part.ctype.mimetype.to_ascii_lowercase();

        if content_type.starts_with("multipart/") || !part.subparts.is_empty() {
            return Self::Composite {
                content_type,
                parts: part.subparts.iter().map(Self::from_parsed).collect(),
            };
        }

        let disposition = part
            .headers
            .get_first_value("Content-Disposition")
            .and_then(|v| {
                v.split(';')
                    .next()
                    .map(|t| t.trim().to_ascii_lowercase())
            })
            .filter(|t| !t.is_empty());

        let filename = part
            .get_content_disposition()
            .params
            .get("filename")
            .or_else(|| part.ctype.params.get("name"))
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let body = part.get_body_raw().unwrap_or_else(|e| {
            debug!("Undecodable {} part body: {}", content_type, e);
            Vec::new()
        });

        Self::Leaf(MimeLeaf {
            charset: part.ctype.params.get("charset").cloned(),
            content_id: part
                .headers
                .get_first_value("Content-ID")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            disposition,
            filename,
            body,
            content_type,
        })
    }

    /// Number of leaves below (and including) this node.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Composite { parts, .. } => parts.iter().map(Self::leaf_count).sum(),
        }
    }
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    /// Decoded size in bytes.
    pub size: usize,
    /// Decoded bytes, present only when bodies were requested.
    #[serde(skip)]
    pub content: Option<Vec<u8>>,
}

/// An image referenced from HTML through `cid:`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineImage {
    pub content_type: String,
    /// Base64 of the decoded image bytes.
    pub data: String,
}

/// Everything the walker extracts from a message body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyParts {
    pub plain: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<Attachment>,
    /// Keyed by content identifier without angle brackets.
    pub inline_images: BTreeMap<String, InlineImage>,
}

impl BodyParts {
    /// Apply the first matching rule to `leaf`.
    fn classify(&mut self, leaf: &MimeLeaf, include_content: bool) {
        if leaf.content_type.starts_with("image/")
            && let Some(cid) = leaf.content_id.as_deref()
        {
            if leaf.body.is_empty() {
                return;
            }
            let key = cid.trim_matches(|c: char| c == '<' || c == '>' || c.is_whitespace());
            self.inline_images.insert(
                key.to_string(),
                InlineImage {
                    content_type: leaf.content_type.clone(),
                    data: BASE64.encode(&leaf.body),
                },
            );
            return;
        }

        if leaf.disposition.as_deref() == Some("attachment")
            && let Some(filename) = leaf.filename.as_deref()
        {
            self.attachments.push(Attachment {
                filename: decode_header(filename),
                content_type: leaf.content_type.clone(),
                size: leaf.body.len(),
                content: include_content.then(|| leaf.body.clone()),
            });
            return;
        }

        // Empty text parts do not claim the slot.
        if leaf.body.is_empty() {
            return;
        }
        match leaf.content_type.as_str() {
            "text/plain" if self.plain.is_none() => {
                self.plain = Some(decode_text(&leaf.body, leaf.charset.as_deref()));
            }
            "text/html" if self.html.is_none() => {
                self.html = Some(decode_text(&leaf.body, leaf.charset.as_deref()));
            }
            _ => {}
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plain.is_none()
            && self.html.is_none()
            && self.attachments.is_empty()
            && self.inline_images.is_empty()
    }
}

/// Walk the tree depth-first and classify every leaf.
///
/// The first plain and the first HTML part win; later ones are ignored.
/// Attachment bytes are kept only when `include_content` is set.
#[must_use]
pub fn walk(root: &MimeNode, include_content: bool) -> BodyParts {
    let mut found = BodyParts::default();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        match node {
            MimeNode::Leaf(leaf) => found.classify(leaf, include_content),
            MimeNode::Composite { parts, .. } => stack.extend(parts.iter().rev()),
        }
    }

    found
}
