//! Maildir ingest: feeds an MTA-delivered maildir into the list queues.

pub mod config;
pub mod error;
pub mod lists;
pub mod maildir;
pub mod routing;
pub mod runner;
pub mod switchboard;
