//! Claim protocol: one atomic rename decides which worker owns a file.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{IN_PROGRESS_SUFFIX, QUARANTINE_SUFFIX};
use crate::error::{ClaimError, QuarantineError};

/// A maildir root with its `new/` and `cur/` directories.
#[derive(Debug, Clone)]
pub struct Maildir {
    new_dir: PathBuf,
    cur_dir: PathBuf,
}

/// Outcome of trying to claim a delivered file.
#[derive(Debug)]
pub enum Claim {
    /// This worker owns the file now.
    Won(ClaimedFile),
    /// Another worker renamed it first.
    LostRace,
}

impl Maildir {
    /// Point at a maildir root without touching the filesystem.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            new_dir: root.join("new"),
            cur_dir: root.join("cur"),
        }
    }

    /// Point at a maildir root, creating `new/` and `cur/` if needed.
    pub fn open(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let maildir = Self::new(root);
        fs::create_dir_all(&maildir.new_dir)?;
        fs::create_dir_all(&maildir.cur_dir)?;
        Ok(maildir)
    }

    pub fn new_dir(&self) -> &Path {
        &self.new_dir
    }

    pub fn cur_dir(&self) -> &Path {
        &self.cur_dir
    }

    /// Claim `new/<name>` by renaming it to `cur/<name>:1,P`.
    ///
    /// Names are taken as delivered; they need not be UTF-8.
    pub fn claim(&self, name: impl AsRef<OsStr>) -> Result<Claim, ClaimError> {
        let name = name.as_ref();
        let src = self.new_dir.join(name);
        let dst = self.cur_dir.join(with_suffix(name, IN_PROGRESS_SUFFIX));

        match fs::rename(&src, &dst) {
            Ok(()) => Ok(Claim::Won(ClaimedFile {
                name: name.to_os_string(),
                path: dst,
                quarantine_path: self.cur_dir.join(with_suffix(name, QUARANTINE_SUFFIX)),
            })),
            // ENOENT also covers a missing `cur/`; only a vanished source is a race.
            Err(e) if e.kind() == ErrorKind::NotFound && !src.exists() => {
                debug!(file = %name.to_string_lossy(), "Another runner claimed maildir file first");
                Ok(Claim::LostRace)
            }
            Err(source) => Err(ClaimError::Rename {
                from: src,
                to: dst,
                source,
            }),
        }
    }

    /// Files left in progress, e.g. by a runner that crashed mid-file.
    ///
    /// These are never re-claimed automatically.
    pub fn in_progress(&self) -> std::io::Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.cur_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut stale = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_name().to_string_lossy().ends_with(IN_PROGRESS_SUFFIX) {
                stale.push(entry.path());
            }
        }
        stale.sort();
        Ok(stale)
    }
}

fn with_suffix(name: &OsStr, suffix: &str) -> OsString {
    let mut target = name.to_os_string();
    target.push(suffix);
    target
}

/// An in-progress file owned by this worker.
///
/// Finishing consumes the value, so each claim ends in exactly one
/// `remove` or `quarantine`.
#[derive(Debug)]
pub struct ClaimedFile {
    name: OsString,
    path: PathBuf,
    quarantine_path: PathBuf,
}

impl ClaimedFile {
    /// Name the file was delivered under.
    pub fn name(&self) -> &OsStr {
        &self.name
    }

    /// Current `:1,P` path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file after a successful enqueue.
    ///
    /// On failure the claim is handed back so the caller can still quarantine.
    pub fn remove(self) -> Result<(), (Self, std::io::Error)> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) => Err((self, e)),
        }
    }

    /// Rename the file to `:1,X`. Returns the quarantine path.
    pub fn quarantine(self) -> Result<PathBuf, QuarantineError> {
        match fs::rename(&self.path, &self.quarantine_path) {
            Ok(()) => Ok(self.quarantine_path),
            Err(source) => Err(QuarantineError {
                path: self.path,
                source,
            }),
        }
    }
}
