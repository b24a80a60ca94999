//! Recipient routing: which list, which queue, which metadata.

pub mod address;
pub mod router;
pub mod selector;

pub use address::{ListAddress, SubQueue, bare_address};
pub use router::{RECIPIENT_HEADERS, route};
pub use selector::{Destination, MessageMetadata, QueueId, SiteRouting, select};
