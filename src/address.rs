//! Address list parsing for `From`, `To` and `Cc` headers

use mailparse::{MailAddr, MailHeader, SingleInfo};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// One mailbox from an address header.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    /// Decoded display name, if the header carried one.
    pub display_name: Option<String>,
    pub address: String,
}

impl Address {
    fn from_info(info: &SingleInfo) -> Option<Self> {
        let address = info.addr.trim();
        if address.is_empty() {
            return None;
        }
        Some(Self {
            display_name: info
                .display_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(ToString::to_string),
            address: address.to_string(),
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.display_name {
            Some(name) => write!(f, "{name} <{}>", self.address),
            None => f.write_str(&self.address),
        }
    }
}

/// Parse a raw (undecoded) address header value into its mailboxes.
///
/// The list is split first and each display name decoded afterwards,
/// so an encoded name may decode to text containing commas. Group
/// syntax (`Team: a@x, b@y;`) contributes its members. Entries without
/// an address are dropped.
///
/// ```
/// use mailfetch::parse_address_list;
///
/// let list = parse_address_list("\"Doe, Jane\" <jane@example.com>, bob@example.com");
/// assert_eq!(list.len(), 2);
/// assert_eq!(list[0].display_name.as_deref(), Some("Doe, Jane"));
/// assert_eq!(list[1].address, "bob@example.com");
/// ```
#[must_use]
pub fn parse_address_list(value: &str) -> Vec<Address> {
    if value.trim().is_empty() {
        return Vec::new();
    }
    let line = format!("To: {value}\r\n");
    match mailparse::parse_header(line.as_bytes()) {
        Ok((header, _)) => addresses_in(&header),
        Err(e) => {
            debug!("Unparsable address list: {}", e);
            Vec::new()
        }
    }
}

/// Every mailbox in a parsed address header, in order.
pub(crate) fn addresses_in(header: &MailHeader<'_>) -> Vec<Address> {
    match mailparse::addrparse_header(header) {
        Ok(list) => list
            .iter()
            .flat_map(|entry| match entry {
                MailAddr::Single(info) => vec![info],
                MailAddr::Group(group) => group.addrs.iter().collect(),
            })
            .filter_map(Address::from_info)
            .collect(),
        Err(e) => {
            debug!("Skipping unparsable {} header: {}", header.get_key(), e);
            Vec::new()
        }
    }
}
