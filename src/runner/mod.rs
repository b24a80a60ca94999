//! Queue runners.
//!
//! A runner exposes one capability, [`Pass`]: process whatever is waiting
//! and report how many files it saw. Scheduling, sleeping and sharding live
//! in [`scheduler`], outside the runner itself.

pub mod maildir;
pub mod scheduler;

pub use maildir::{FileOutcome, MaildirRunner, PassReport};
pub use scheduler::{RunnerHandle, spawn_runners};

use crate::error::PassError;

/// One processing pass over a queue.
pub trait Pass: Send + Sync {
    /// Process everything currently waiting. Returns the number of files
    /// observed, which the scheduler uses as a throughput signal.
    fn run_pass(&self) -> Result<usize, PassError>;
}
