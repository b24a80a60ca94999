//! Message loader: reads a claimed file and parses it with mail-parser.

use std::path::Path;

use mail_parser::{Address, HeaderValue, MessageParser};

use crate::error::LoadError;

/// A parsed message, owning its raw bytes and an ordered header table.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    raw: Vec<u8>,
    message_id: Option<String>,
    headers: Vec<(String, Vec<String>)>,
}

impl InboundMessage {
    /// Parse raw message bytes.
    ///
    /// Returns `None` when the parser rejects the input.
    pub fn parse(raw: Vec<u8>) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }

        let (message_id, headers) = {
            let parsed = MessageParser::default().parse(raw.as_slice())?;
            let headers: Vec<(String, Vec<String>)> = parsed
                .headers()
                .iter()
                .map(|h| (h.name().to_string(), header_strings(h.value())))
                .collect();
            (parsed.message_id().map(str::to_string), headers)
        };

        Some(Self {
            raw,
            message_id,
            headers,
        })
    }

    /// Raw bytes exactly as delivered.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// Every value of header `name` (case-insensitive), in file order.
    ///
    /// A header holding several addresses yields one value per address.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .flat_map(|(_, values)| values.iter().map(String::as_str))
    }
}

/// Load a claimed file. Any failure here ends with the file quarantined.
pub fn load(path: &Path) -> Result<InboundMessage, LoadError> {
    let raw = std::fs::read(path)?;
    InboundMessage::parse(raw).ok_or_else(|| LoadError::Malformed {
        path: path.to_path_buf(),
    })
}

/// Flatten a header value into strings: bare addresses for address
/// headers, the text itself otherwise.
fn header_strings(value: &HeaderValue<'_>) -> Vec<String> {
    match value {
        HeaderValue::Address(addr) => address_strings(addr),
        HeaderValue::Text(text) => vec![text.to_string()],
        HeaderValue::TextList(list) => list.iter().map(|t| t.to_string()).collect(),
        _ => Vec::new(),
    }
}

fn address_strings(addr: &Address<'_>) -> Vec<String> {
    match addr {
        Address::List(addrs) => addrs
            .iter()
            .filter_map(|a| a.address.as_ref().map(|s| s.to_string()))
            .collect(),
        Address::Group(groups) => groups
            .iter()
            .flat_map(|g| {
                g.addresses
                    .iter()
                    .filter_map(|a| a.address.as_ref().map(|s| s.to_string()))
            })
            .collect(),
    }
}
