//! Recipient router: find the list a delivered message is addressed to.

use std::collections::HashSet;

use tracing::trace;

use super::address::{ListAddress, bare_address};
use crate::maildir::InboundMessage;

/// Headers naming the envelope recipient, in precedence order.
pub const RECIPIENT_HEADERS: [&str; 3] = ["Delivered-To", "Envelope-To", "Apparently-To"];

/// Route a message to the first recipient that names a registered list.
///
/// Candidates are taken header by header in `RECIPIENT_HEADERS` order, then in
/// the order each header repeats. Once a candidate matches, later ones are
/// never looked at.
pub fn route(message: &InboundMessage, lists: &HashSet<String>) -> Option<ListAddress> {
    let candidates = RECIPIENT_HEADERS
        .into_iter()
        .flat_map(|header| message.get_all(header));
    first_list_address(candidates, lists)
}

/// First candidate that parses as a list address of a registered list.
pub fn first_list_address<'a>(
    candidates: impl IntoIterator<Item = &'a str>,
    lists: &HashSet<String>,
) -> Option<ListAddress> {
    candidates
        .into_iter()
        .filter_map(bare_address)
        .filter_map(|addr| {
            let matched = ListAddress::parse(&addr);
            if matched.is_none() {
                trace!(address = %addr, "Not a list address");
            }
            matched
        })
        .find(|m| lists.contains(&m.listname))
}
