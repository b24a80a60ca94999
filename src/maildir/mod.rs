//! Maildir access: claiming delivered files and loading them.
//!
//! Files move through three names, all decided by suffix:
//! - `new/<name>`: delivered, unclaimed
//! - `cur/<name>:1,P`: claimed by exactly one worker, being processed
//! - `cur/<name>:1,X`: quarantined, waits for an operator
//!
//! A quarantined file moved back to `new/<name>` is processed from scratch.

pub mod claim;
pub mod loader;

pub use claim::{Claim, ClaimedFile, Maildir};
pub use loader::{InboundMessage, load};

/// Suffix of a claimed, in-progress file.
pub const IN_PROGRESS_SUFFIX: &str = ":1,P";
/// Suffix of a quarantined file.
pub const QUARANTINE_SUFFIX: &str = ":1,X";
