//! Maildir runner: claims delivered files, routes them to a list queue,
//! and quarantines whatever it cannot route.
//!
//! Per file:
//! 1. claim `new/<name>` → `cur/<name>:1,P` (lost race: skip)
//! 2. load and parse the message
//! 3. route on `Delivered-To` / `Envelope-To` / `Apparently-To`
//! 4. select the queue and metadata from the sub-queue token
//! 5. enqueue, then delete the claimed file
//!
//! Any failure after step 1 renames the file to `cur/<name>:1,X`. Nothing
//! is retried; an operator moves quarantined files back to `new/` once the
//! cause is fixed.

use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info};

use super::Pass;
use crate::config::MaildirConfig;
use crate::error::{ClaimError, ConfigError, FileError, PassError, RouteError};
use crate::lists::{ListNames, ListsDir};
use crate::maildir::{Claim, ClaimedFile, Maildir, load};
use crate::routing::{QueueId, SiteRouting, route, select};
use crate::switchboard::Switchboards;

/// How a single delivered file ended up.
#[derive(Debug)]
pub enum FileOutcome {
    /// Another runner claimed it first.
    LostRace,
    /// Enqueued and deleted.
    Removed { queue: QueueId },
    /// Renamed to `:1,X`.
    Quarantined { path: PathBuf, error: FileError },
    /// Quarantine rename failed too; the file is still `:1,P`.
    Stuck { path: PathBuf, error: FileError },
}

/// Summary of one pass.
#[derive(Debug, Default)]
pub struct PassReport {
    /// Files listed in `new/`, whatever became of them.
    pub observed: usize,
    pub removed: usize,
    pub quarantined: usize,
    pub lost_races: usize,
    pub stuck: usize,
    /// Per-file outcomes in processing order.
    pub files: Vec<(OsString, FileOutcome)>,
}

impl PassReport {
    fn record(&mut self, name: OsString, outcome: FileOutcome) {
        match outcome {
            FileOutcome::LostRace => self.lost_races += 1,
            FileOutcome::Removed { .. } => self.removed += 1,
            FileOutcome::Quarantined { .. } => self.quarantined += 1,
            FileOutcome::Stuck { .. } => self.stuck += 1,
        }
        self.files.push((name, outcome));
    }
}

/// Feeds a maildir into the list queues.
pub struct MaildirRunner {
    maildir: Maildir,
    lists: Arc<dyn ListNames>,
    queues: Switchboards,
    site: SiteRouting,
}

impl MaildirRunner {
    pub fn new(
        maildir: Maildir,
        lists: Arc<dyn ListNames>,
        queues: Switchboards,
        site: SiteRouting,
    ) -> Self {
        Self {
            maildir,
            lists,
            queues,
            site,
        }
    }

    /// Build a runner over the configured maildir, list directory and
    /// file-backed queues. Creates missing directories.
    pub fn from_config(config: &MaildirConfig) -> crate::error::Result<Self> {
        let maildir = Maildir::open(&config.maildir_dir).map_err(ConfigError::from)?;
        let queues = Switchboards::open(config)?;
        let site = SiteRouting {
            bounce_address: config.site_bounce_address(),
            owner_pipeline: config.owner_pipeline.clone(),
        };
        Ok(Self::new(
            maildir,
            Arc::new(ListsDir::new(&config.lists_dir)),
            queues,
            site,
        ))
    }

    pub fn maildir(&self) -> &Maildir {
        &self.maildir
    }

    /// Process every file currently in `new/` once.
    ///
    /// A missing `new/` means nothing has been delivered yet. Listing
    /// failures and claim failures abort the pass; everything else is
    /// contained to its file.
    pub fn process_pass(&self) -> Result<PassReport, PassError> {
        // Fresh snapshot every pass; lists come and go.
        let lists = self.lists.list_names()?;

        let new_dir = self.maildir.new_dir();
        let entries = match fs::read_dir(new_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(PassReport::default()),
            Err(source) => {
                return Err(PassError::ListDir {
                    path: new_dir.to_path_buf(),
                    source,
                });
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PassError::ListDir {
                path: new_dir.to_path_buf(),
                source,
            })?;
            names.push(entry.file_name());
        }

        let mut report = PassReport {
            observed: names.len(),
            ..PassReport::default()
        };

        for name in names {
            let outcome = self.process_file(&name, &lists)?;
            report.record(name, outcome);
        }

        Ok(report)
    }

    /// Claim one file and see it through to removal or quarantine.
    pub fn process_file(
        &self,
        name: impl AsRef<OsStr>,
        lists: &HashSet<String>,
    ) -> Result<FileOutcome, ClaimError> {
        let name = name.as_ref();
        let claimed = match self.maildir.claim(name)? {
            Claim::Won(claimed) => claimed,
            Claim::LostRace => return Ok(FileOutcome::LostRace),
        };

        let queue = match self.dispatch(&claimed, lists) {
            Ok(queue) => queue,
            Err(e) => return Ok(quarantine(claimed, e)),
        };

        match claimed.remove() {
            Ok(()) => {
                debug!(
                    file = %name.to_string_lossy(),
                    queue = ?queue,
                    "Successfully processed maildir message"
                );
                Ok(FileOutcome::Removed { queue })
            }
            Err((claimed, e)) => Ok(quarantine(claimed, FileError::Remove(e))),
        }
    }

    /// Load, route and enqueue a claimed file.
    fn dispatch(
        &self,
        claimed: &ClaimedFile,
        lists: &HashSet<String>,
    ) -> Result<QueueId, FileError> {
        let message = load(claimed.path())?;

        let Some(address) = route(&message, lists) else {
            return Err(RouteError::NoRouteFound.into());
        };

        let destination = select(&address.listname, address.subq.as_deref(), &self.site)?;
        self.queues
            .get(destination.queue)
            .enqueue(&message, &destination.metadata)?;

        debug!(
            file = %claimed.name().to_string_lossy(),
            list = %address.listname,
            subq = address.subq.as_deref().unwrap_or("-"),
            message_id = message.message_id().unwrap_or("n/a"),
            "Enqueued maildir message"
        );
        Ok(destination.queue)
    }
}

fn quarantine(claimed: ClaimedFile, error: FileError) -> FileOutcome {
    let name = claimed.name().to_string_lossy().into_owned();
    match claimed.quarantine() {
        Ok(path) => {
            error!(file = %name, path = %path.display(), error = %error, "Quarantined maildir file");
            FileOutcome::Quarantined { path, error }
        }
        Err(e) => {
            error!(
                file = %name,
                path = %e.path.display(),
                error = %error,
                quarantine_error = %e.source,
                "Could not quarantine maildir file; left in progress"
            );
            FileOutcome::Stuck {
                path: e.path,
                error,
            }
        }
    }
}

impl Pass for MaildirRunner {
    fn run_pass(&self) -> Result<usize, PassError> {
        let report = self.process_pass()?;
        if report.observed > 0 {
            info!(
                observed = report.observed,
                removed = report.removed,
                quarantined = report.quarantined,
                lost_races = report.lost_races,
                stuck = report.stuck,
                "Maildir pass complete"
            );
        }
        Ok(report.observed)
    }
}
