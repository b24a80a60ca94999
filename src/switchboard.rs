//! Switchboard: directory-backed destination queues.
//!
//! Each queue is a directory of entry files named
//! `<secs>.<micros>+<uuid>.qfile`. An entry is one line of JSON (version,
//! received time, routing metadata) followed by the raw message bytes.
//! Entries are written to a `.tmp` name, fsynced, then renamed into place,
//! so readers never see a partial entry.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::MaildirConfig;
use crate::error::QueueError;
use crate::maildir::InboundMessage;
use crate::routing::{MessageMetadata, QueueId};

/// On-disk schema version of queue entries.
pub const QFILE_SCHEMA_VERSION: u32 = 3;

const QFILE_EXT: &str = "qfile";

/// A destination queue.
pub trait Switchboard: Send + Sync {
    /// Persist a message with its metadata. Returns the entry's file base.
    fn enqueue(
        &self,
        message: &InboundMessage,
        metadata: &MessageMetadata,
    ) -> Result<String, QueueError>;
}

/// Header line of a queue entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryHeader {
    pub version: u32,
    pub received_time: DateTime<Utc>,
    pub metadata: MessageMetadata,
}

/// A queue entry read back from disk.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub header: EntryHeader,
    pub message: Vec<u8>,
}

/// Switchboard backed by a directory.
#[derive(Debug, Clone)]
pub struct FileSwitchboard {
    dir: PathBuf,
}

impl FileSwitchboard {
    /// Open a queue directory, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, QueueError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| QueueError::Write {
            dir: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, filebase: &str) -> PathBuf {
        self.dir.join(format!("{filebase}.{QFILE_EXT}"))
    }

    /// File bases of all entries, oldest first.
    pub fn files(&self) -> Result<Vec<String>, QueueError> {
        let mut bases = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(base) = name.strip_suffix(&format!(".{QFILE_EXT}")) {
                bases.push(base.to_string());
            }
        }
        bases.sort_by_key(|base| received_key(base));
        Ok(bases)
    }

    /// Read an entry without removing it.
    pub fn dequeue(&self, filebase: &str) -> Result<QueueEntry, QueueError> {
        let path = self.entry_path(filebase);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(QueueError::NotFound {
                    filebase: filebase.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let split = data
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| QueueError::Corrupt {
                filebase: filebase.to_string(),
                reason: "missing header line".into(),
            })?;
        let header: EntryHeader = serde_json::from_slice(&data[..split])?;

        Ok(QueueEntry {
            header,
            message: data[split + 1..].to_vec(),
        })
    }

    /// Remove a processed entry.
    pub fn finish(&self, filebase: &str) -> Result<(), QueueError> {
        fs::remove_file(self.entry_path(filebase))?;
        Ok(())
    }
}

impl Switchboard for FileSwitchboard {
    fn enqueue(
        &self,
        message: &InboundMessage,
        metadata: &MessageMetadata,
    ) -> Result<String, QueueError> {
        let now = Utc::now();
        let filebase = format!(
            "{}.{:06}+{}",
            now.timestamp(),
            now.timestamp_subsec_micros(),
            Uuid::new_v4().simple()
        );

        let header = EntryHeader {
            version: QFILE_SCHEMA_VERSION,
            received_time: now,
            metadata: metadata.clone(),
        };
        let mut data = serde_json::to_vec(&header)?;
        data.push(b'\n');
        data.extend_from_slice(message.raw());

        let path = self.entry_path(&filebase);
        let tmp = path.with_extension(format!("{QFILE_EXT}.tmp"));
        let write = || -> std::io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(&data)?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        };
        if let Err(source) = write() {
            let _ = fs::remove_file(&tmp);
            return Err(QueueError::Write {
                dir: self.dir.clone(),
                source,
            });
        }

        debug!(queue = %self.dir.display(), filebase = %filebase, "Enqueued message");
        Ok(filebase)
    }
}

/// Sort key from a `<secs>.<micros>+<uuid>` file base.
fn received_key(filebase: &str) -> (i64, u32, String) {
    let (time, rest) = filebase.split_once('+').unwrap_or((filebase, ""));
    let (secs, micros) = time.split_once('.').unwrap_or((time, "0"));
    (
        secs.parse().unwrap_or(i64::MAX),
        micros.parse().unwrap_or(0),
        rest.to_string(),
    )
}

/// The three destination queues a maildir runner feeds.
#[derive(Clone)]
pub struct Switchboards {
    bounce: Arc<dyn Switchboard>,
    command: Arc<dyn Switchboard>,
    inbound: Arc<dyn Switchboard>,
}

impl Switchboards {
    pub fn new(
        bounce: Arc<dyn Switchboard>,
        command: Arc<dyn Switchboard>,
        inbound: Arc<dyn Switchboard>,
    ) -> Self {
        Self {
            bounce,
            command,
            inbound,
        }
    }

    /// File-backed queues under the configured queue root.
    pub fn open(config: &MaildirConfig) -> Result<Self, QueueError> {
        Ok(Self::new(
            Arc::new(FileSwitchboard::open(config.bounce_queue_dir())?),
            Arc::new(FileSwitchboard::open(config.command_queue_dir())?),
            Arc::new(FileSwitchboard::open(config.inbound_queue_dir())?),
        ))
    }

    pub fn get(&self, queue: QueueId) -> &dyn Switchboard {
        match queue {
            QueueId::Bounce => self.bounce.as_ref(),
            QueueId::Command => self.command.as_ref(),
            QueueId::Inbound => self.inbound.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn message(body: &str) -> InboundMessage {
        let raw = format!("Delivered-To: mylist@example.com\r\nSubject: t\r\n\r\n{body}\r\n");
        InboundMessage::parse(raw.into_bytes()).unwrap()
    }

    fn metadata() -> MessageMetadata {
        MessageMetadata {
            listname: "mylist".into(),
            tolist: true,
            ..MessageMetadata::default()
        }
    }

    #[test]
    fn open_creates_queue_dir() {
        let dir = TempDir::new().unwrap();
        let queue = FileSwitchboard::open(dir.path().join("qfiles/in")).unwrap();
        assert!(queue.dir().is_dir());
    }

    #[test]
    fn enqueue_then_dequeue_keeps_bytes_and_metadata() {
        let dir = TempDir::new().unwrap();
        let queue = FileSwitchboard::open(dir.path()).unwrap();
        let msg = message("binary-ish \u{e9} body");

        let base = queue.enqueue(&msg, &metadata()).unwrap();
        let entry = queue.dequeue(&base).unwrap();

        assert_eq!(entry.message, msg.raw());
        assert_eq!(entry.header.metadata, metadata());
        assert_eq!(entry.header.version, QFILE_SCHEMA_VERSION);
    }

    #[test]
    fn enqueue_leaves_no_tmp_file() {
        let dir = TempDir::new().unwrap();
        let queue = FileSwitchboard::open(dir.path()).unwrap();
        queue.enqueue(&message("x"), &metadata()).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".qfile"));
    }

    #[test]
    fn files_are_oldest_first() {
        let dir = TempDir::new().unwrap();
        let queue = FileSwitchboard::open(dir.path()).unwrap();
        fs::write(dir.path().join("1700000010.000000+b.qfile"), b"").unwrap();
        fs::write(dir.path().join("999999999.500000+c.qfile"), b"").unwrap();
        fs::write(dir.path().join("1700000002.000001+a.qfile"), b"").unwrap();
        fs::write(dir.path().join("ignored.tmp"), b"").unwrap();

        assert_eq!(
            queue.files().unwrap(),
            vec![
                "999999999.500000+c",
                "1700000002.000001+a",
                "1700000010.000000+b",
            ]
        );
    }

    #[test]
    fn finish_removes_entry() {
        let dir = TempDir::new().unwrap();
        let queue = FileSwitchboard::open(dir.path()).unwrap();
        let base = queue.enqueue(&message("x"), &metadata()).unwrap();

        queue.finish(&base).unwrap();
        assert!(queue.files().unwrap().is_empty());
        assert!(matches!(
            queue.dequeue(&base),
            Err(QueueError::NotFound { .. })
        ));
    }

    #[test]
    fn dequeue_without_header_line_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let queue = FileSwitchboard::open(dir.path()).unwrap();
        fs::write(dir.path().join("1.000000+x.qfile"), b"no newline here").unwrap();

        assert!(matches!(
            queue.dequeue("1.000000+x"),
            Err(QueueError::Corrupt { .. })
        ));
    }

    #[test]
    fn enqueue_into_removed_dir_fails() {
        let dir = TempDir::new().unwrap();
        let queue = FileSwitchboard::open(dir.path().join("gone")).unwrap();
        fs::remove_dir(queue.dir()).unwrap();

        assert!(matches!(
            queue.enqueue(&message("x"), &metadata()),
            Err(QueueError::Write { .. })
        ));
    }

    #[test]
    fn switchboards_pick_queue_by_id() {
        let dir = TempDir::new().unwrap();
        let config = MaildirConfig {
            queue_dir: dir.path().to_path_buf(),
            ..MaildirConfig::default()
        };
        let boards = Switchboards::open(&config).unwrap();

        boards
            .get(QueueId::Command)
            .enqueue(&message("x"), &metadata())
            .unwrap();

        let commands = FileSwitchboard::open(config.command_queue_dir()).unwrap();
        let inbound = FileSwitchboard::open(config.inbound_queue_dir()).unwrap();
        assert_eq!(commands.files().unwrap().len(), 1);
        assert!(inbound.files().unwrap().is_empty());
    }
}
