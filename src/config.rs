//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Handlers an owner-bound message is run through, in order.
pub const DEFAULT_OWNER_PIPELINE: &[&str] = &["SpamDetect", "Replybot", "OwnerRecips", "ToOutgoing"];

/// Maildir runner configuration.
#[derive(Debug, Clone)]
pub struct MaildirConfig {
    /// Maildir root holding `new/` and `cur/`.
    pub maildir_dir: PathBuf,
    /// Root of the switchboard queues.
    pub queue_dir: PathBuf,
    /// Directory of list data; one subdirectory per list.
    pub lists_dir: PathBuf,
    /// Name of the site-wide list, used for the site bounce address.
    pub site_list: String,
    /// Default mail host.
    pub email_host: String,
    /// Pipeline attached to owner-bound messages.
    pub owner_pipeline: Vec<String>,
    /// How long an idle worker sleeps between passes.
    pub sleep_time: Duration,
    /// Number of concurrent workers scanning the maildir.
    pub numslices: usize,
}

impl Default for MaildirConfig {
    fn default() -> Self {
        Self {
            maildir_dir: PathBuf::from("./var/maildir"),
            queue_dir: PathBuf::from("./var/qfiles"),
            lists_dir: PathBuf::from("./var/lists"),
            site_list: "mailman".to_string(),
            email_host: "localhost".to_string(),
            owner_pipeline: DEFAULT_OWNER_PIPELINE.iter().map(|s| s.to_string()).collect(),
            sleep_time: Duration::from_secs(1),
            numslices: 1,
        }
    }
}

impl MaildirConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let maildir_dir = std::env::var("MAILDIR_INGEST_MAILDIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.maildir_dir);
        let queue_dir = std::env::var("MAILDIR_INGEST_QUEUE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.queue_dir);
        let lists_dir = std::env::var("MAILDIR_INGEST_LISTS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.lists_dir);
        let site_list = std::env::var("MAILDIR_INGEST_SITE_LIST").unwrap_or(defaults.site_list);
        let email_host = std::env::var("MAILDIR_INGEST_EMAIL_HOST").unwrap_or(defaults.email_host);

        let owner_pipeline = match std::env::var("MAILDIR_INGEST_OWNER_PIPELINE") {
            Ok(raw) => parse_list(&raw),
            Err(_) => defaults.owner_pipeline,
        };
        if owner_pipeline.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "MAILDIR_INGEST_OWNER_PIPELINE".into(),
                message: "pipeline must name at least one handler".into(),
            });
        }

        let sleep_time = match std::env::var("MAILDIR_INGEST_SLEEP_SECS") {
            Ok(raw) => Duration::from_secs(parse_number("MAILDIR_INGEST_SLEEP_SECS", &raw)?),
            Err(_) => defaults.sleep_time,
        };

        let numslices = match std::env::var("MAILDIR_INGEST_SLICES") {
            Ok(raw) => parse_number("MAILDIR_INGEST_SLICES", &raw)? as usize,
            Err(_) => defaults.numslices,
        };
        if numslices == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MAILDIR_INGEST_SLICES".into(),
                message: "must be at least 1".into(),
            });
        }

        Ok(Self {
            maildir_dir,
            queue_dir,
            lists_dir,
            site_list,
            email_host,
            owner_pipeline,
            sleep_time,
            numslices,
        })
    }

    /// Envelope sender for owner-bound messages, e.g. `mailman-bounces@example.com`.
    pub fn site_bounce_address(&self) -> String {
        format!("{}-bounces@{}", self.site_list, self.email_host)
    }

    pub fn bounce_queue_dir(&self) -> PathBuf {
        self.queue_dir.join("bounces")
    }

    pub fn command_queue_dir(&self) -> PathBuf {
        self.queue_dir.join("commands")
    }

    pub fn inbound_queue_dir(&self) -> PathBuf {
        self.queue_dir.join("in")
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_number(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{raw:?}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_bounce_address_uses_site_list() {
        let config = MaildirConfig {
            email_host: "lists.example.com".into(),
            ..MaildirConfig::default()
        };
        assert_eq!(config.site_bounce_address(), "mailman-bounces@lists.example.com");
    }

    #[test]
    fn queue_dirs_live_under_queue_root() {
        let config = MaildirConfig::default();
        assert_eq!(config.bounce_queue_dir(), PathBuf::from("./var/qfiles/bounces"));
        assert_eq!(config.command_queue_dir(), PathBuf::from("./var/qfiles/commands"));
        assert_eq!(config.inbound_queue_dir(), PathBuf::from("./var/qfiles/in"));
    }

    #[test]
    fn default_owner_pipeline_is_not_empty() {
        let config = MaildirConfig::default();
        assert_eq!(config.owner_pipeline.len(), 4);
        assert_eq!(config.owner_pipeline[0], "SpamDetect");
    }

    #[test]
    fn parse_list_trims_and_drops_empty() {
        assert_eq!(parse_list(" a, b ,,c "), vec!["a", "b", "c"]);
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn parse_number_rejects_garbage() {
        assert_eq!(parse_number("K", " 5 ").unwrap(), 5);
        assert!(matches!(
            parse_number("K", "five"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
