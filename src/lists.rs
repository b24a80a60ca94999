//! Registered list names, snapshotted once per pass.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use crate::error::ListNamesError;

/// Files whose presence marks a directory as a list.
const LIST_CONFIG_FILES: &[&str] = &["config.pck", "config.pck.last", "config.db", "config.db.last"];

/// Source of the currently registered list names.
pub trait ListNames: Send + Sync {
    fn list_names(&self) -> Result<HashSet<String>, ListNamesError>;
}

/// Lists found in a list data directory, one subdirectory per list.
#[derive(Debug, Clone)]
pub struct ListsDir {
    dir: PathBuf,
}

impl ListsDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ListNames for ListsDir {
    fn list_names(&self) -> Result<HashSet<String>, ListNamesError> {
        let read_err = |source| ListNamesError::ReadDir {
            path: self.dir.clone(),
            source,
        };

        let mut names = HashSet::new();
        for entry in fs::read_dir(&self.dir).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !is_acceptable_list_name(&name) {
                continue;
            }
            let path = entry.path();
            if LIST_CONFIG_FILES.iter().any(|f| path.join(f).exists()) {
                names.insert(name);
            }
        }
        Ok(names)
    }
}

/// A fixed set of list names.
#[derive(Debug, Clone, Default)]
pub struct StaticListNames(pub HashSet<String>);

impl<S: Into<String>> FromIterator<S> for StaticListNames {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl ListNames for StaticListNames {
    fn list_names(&self) -> Result<HashSet<String>, ListNamesError> {
        Ok(self.0.clone())
    }
}

/// List names are limited to `[-+_.=a-z0-9]`, any case.
fn is_acceptable_list_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '_' | '.' | '='))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn make_list(root: &std::path::Path, name: &str, config: Option<&str>) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        if let Some(file) = config {
            fs::write(dir.join(file), b"").unwrap();
        }
    }

    #[test]
    fn lists_dir_finds_configured_lists() {
        let dir = TempDir::new().unwrap();
        make_list(dir.path(), "mylist", Some("config.pck"));
        make_list(dir.path(), "oldlist", Some("config.db.last"));
        make_list(dir.path(), "half-made", None);

        let names = ListsDir::new(dir.path()).list_names().unwrap();
        let expected: HashSet<String> = ["mylist", "oldlist"].iter().map(|s| s.to_string()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn lists_dir_skips_hostile_names() {
        let dir = TempDir::new().unwrap();
        make_list(dir.path(), "bad name", Some("config.pck"));
        make_list(dir.path(), "good.name", Some("config.pck"));

        let names = ListsDir::new(dir.path()).list_names().unwrap();
        assert!(names.contains("good.name"));
        assert!(!names.contains("bad name"));
    }

    #[test]
    fn lists_dir_missing_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = ListsDir::new(dir.path().join("nope")).list_names();
        assert!(matches!(result, Err(ListNamesError::ReadDir { .. })));
    }

    #[test]
    fn static_names_from_iter() {
        let lists: StaticListNames = ["a", "b"].into_iter().collect();
        assert_eq!(lists.list_names().unwrap().len(), 2);
    }

    #[test]
    fn acceptable_names() {
        assert!(is_acceptable_list_name("my-list_2.0+x=y"));
        assert!(is_acceptable_list_name("MyList"));
        assert!(!is_acceptable_list_name("../etc"));
        assert!(!is_acceptable_list_name(""));
    }
}
