//! Destination selector: sub-queue token to queue + metadata.

use serde::{Deserialize, Serialize};

use super::address::SubQueue;
use crate::error::RouteError;

/// The switchboard queues a maildir message can land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueId {
    /// Bounce processing.
    Bounce,
    /// Email commands: confirm, join, leave, request.
    Command,
    /// Main inbound queue for list posts and owner mail.
    Inbound,
}

/// Routing metadata attached to a message before enqueue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub listname: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub tolist: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub toconfirm: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub tojoin: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub toleave: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub toowner: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub torequest: bool,
    /// Envelope sender to use when the message is passed on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envsender: Option<String>,
    /// Handler pipeline overriding the list's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<Vec<String>>,
}

impl MessageMetadata {
    fn for_list(listname: &str) -> Self {
        Self {
            listname: listname.to_string(),
            ..Self::default()
        }
    }
}

/// Where a message goes and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub queue: QueueId,
    pub metadata: MessageMetadata,
}

/// Site-wide values used for owner-bound mail.
#[derive(Debug, Clone)]
pub struct SiteRouting {
    /// e.g. `mailman-bounces@example.com`.
    pub bounce_address: String,
    pub owner_pipeline: Vec<String>,
}

/// Pick the destination queue for a list address.
///
/// `subq` is the raw token from the address; anything outside the known set
/// is refused with `RouteError::UnknownSubQueue`.
pub fn select(
    listname: &str,
    subq: Option<&str>,
    site: &SiteRouting,
) -> Result<Destination, RouteError> {
    let mut metadata = MessageMetadata::for_list(listname);

    let Some(token) = subq else {
        metadata.tolist = true;
        return Ok(Destination {
            queue: QueueId::Inbound,
            metadata,
        });
    };

    let subq: SubQueue = token.parse().map_err(|_| RouteError::UnknownSubQueue {
        token: token.to_string(),
    })?;

    let queue = match subq {
        SubQueue::Bounces | SubQueue::Admin => QueueId::Bounce,
        SubQueue::Confirm => {
            metadata.toconfirm = true;
            QueueId::Command
        }
        SubQueue::Join | SubQueue::Subscribe => {
            metadata.tojoin = true;
            QueueId::Command
        }
        SubQueue::Leave | SubQueue::Unsubscribe => {
            metadata.toleave = true;
            QueueId::Command
        }
        SubQueue::Owner => {
            metadata.toowner = true;
            metadata.envsender = Some(site.bounce_address.clone());
            metadata.pipeline = Some(site.owner_pipeline.clone());
            QueueId::Inbound
        }
        SubQueue::Request => {
            metadata.torequest = true;
            QueueId::Command
        }
    };

    Ok(Destination { queue, metadata })
}
