//! Header and text decoding
//!
//! RFC 2047 encoded-words (`=?charset?B|Q?text?=`) can appear anywhere
//! in an unstructured header, mixed with literal text. `mailparse`
//! resolves them; this module only feeds it loose values and picks the
//! UTF-8 reading of any raw 8-bit bytes. Decoding never fails: invalid
//! byte sequences become replacement characters and encoded-words that
//! cannot be decoded are left as they were.

use charset::Charset;
use mailparse::MailHeader;
use tracing::debug;

/// Decode a header value that may contain RFC 2047 encoded-words.
///
/// ```
/// use mailfetch::decode_header;
///
/// assert_eq!(decode_header("=?UTF-8?B?5L2g5aW9?= world"), "你好 world");
/// assert_eq!(decode_header("plain subject"), "plain subject");
/// ```
#[must_use]
pub fn decode_header(value: &str) -> String {
    let line = format!("X: {value}\r\n");
    match mailparse::parse_header(line.as_bytes()) {
        Ok((header, _)) => header_value(&header),
        Err(e) => {
            debug!("Keeping unparsable header value as is: {}", e);
            value.to_string()
        }
    }
}

/// Decode raw header bytes: lossy UTF-8, unfolded, encoded-words
/// resolved, surrounding whitespace trimmed.
#[must_use]
pub fn decode_header_bytes(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    decode_header(text.trim()).trim().to_string()
}

/// Unfolded, decoded value of a parsed header.
pub(crate) fn header_value(header: &MailHeader<'_>) -> String {
    header
        .get_value_utf8()
        .unwrap_or_else(|_| header.get_value())
}

/// Decode body text in its declared charset, UTF-8 when none is given.
#[must_use]
pub fn decode_text(bytes: &[u8], charset: Option<&str>) -> String {
    let label = charset
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .unwrap_or("utf-8");

    Charset::for_label(label.as_bytes()).map_or_else(
        || {
            debug!("Unknown charset '{}', decoding as UTF-8", label);
            String::from_utf8_lossy(bytes).into_owned()
        },
        |charset| charset.decode_without_bom_handling(bytes).0.into_owned(),
    )
}
