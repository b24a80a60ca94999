//! List-address grammar.
//!
//! ```text
//! address  := local ( "+" | "@" ) rest
//! local    := listname ( "-" subq )?
//! listname := one or more chars other than "+" and "@"
//! subq     := admin | bounces | confirm | join | leave | owner
//!           | request | subscribe | unsubscribe        (any case)
//! ```
//!
//! The local part ends at the first `+` or `@`. When it ends in `-<subq>`
//! with something before the dash, the token is split off; otherwise the
//! whole local part is the list name.

use std::fmt;
use std::str::FromStr;

/// Sub-queue suffix of a list address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubQueue {
    Admin,
    Bounces,
    Confirm,
    Join,
    Leave,
    Owner,
    Request,
    Subscribe,
    Unsubscribe,
}

impl SubQueue {
    pub const ALL: [SubQueue; 9] = [
        SubQueue::Admin,
        SubQueue::Bounces,
        SubQueue::Confirm,
        SubQueue::Join,
        SubQueue::Leave,
        SubQueue::Owner,
        SubQueue::Request,
        SubQueue::Subscribe,
        SubQueue::Unsubscribe,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SubQueue::Admin => "admin",
            SubQueue::Bounces => "bounces",
            SubQueue::Confirm => "confirm",
            SubQueue::Join => "join",
            SubQueue::Leave => "leave",
            SubQueue::Owner => "owner",
            SubQueue::Request => "request",
            SubQueue::Subscribe => "subscribe",
            SubQueue::Unsubscribe => "unsubscribe",
        }
    }
}

impl fmt::Display for SubQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubQueue {
    type Err = ();

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubQueue::ALL
            .into_iter()
            .find(|q| q.as_str().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

/// An address that looks like it belongs to a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListAddress {
    /// List name as written in the address.
    pub listname: String,
    /// Lowercased sub-queue token, if any.
    pub subq: Option<String>,
}

impl ListAddress {
    /// Match a bare address against the list-address grammar.
    pub fn parse(address: &str) -> Option<Self> {
        let end = address.find(['+', '@'])?;
        let local = &address[..end];
        if local.is_empty() {
            return None;
        }

        if let Some(dash) = local.rfind('-') {
            let (listname, token) = (&local[..dash], &local[dash + 1..]);
            if !listname.is_empty()
                && let Ok(subq) = token.parse::<SubQueue>()
            {
                return Some(Self {
                    listname: listname.to_string(),
                    subq: Some(subq.as_str().to_string()),
                });
            }
        }

        Some(Self {
            listname: local.to_string(),
            subq: None,
        })
    }
}

/// Extract the bare address from a header value.
///
/// `Name <addr>` yields `addr`; `addr (comment)` yields `addr`. Returns
/// `None` when nothing address-like is left.
pub fn bare_address(field: &str) -> Option<String> {
    let field = field.trim();

    if let Some(open) = find_unquoted(field, '<') {
        let inner = &field[open + 1..];
        let inner = inner.split_once('>').map_or(inner, |(addr, _)| addr);
        return non_empty(inner.trim());
    }

    let stripped = strip_comments(field);
    let stripped = stripped.trim();
    let addr = stripped
        .split_whitespace()
        .find(|token| token.contains('@'))
        .unwrap_or(stripped);
    non_empty(addr.trim_matches('"'))
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Byte offset of the first `target` outside double quotes.
fn find_unquoted(s: &str, target: char) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, ch) in s.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == target && !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

/// Drop RFC 5322 comments, nested ones included.
fn strip_comments(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;
    let mut in_quotes = false;
    for ch in s.chars() {
        match ch {
            '"' if depth == 0 => {
                in_quotes = !in_quotes;
                out.push(ch);
            }
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes && depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}
