//! Diagnostic artifact store.
//!
//! Artifacts are opaque PNG blobs named `{scenario}_{kind}_{timestamp}.png`.
//! Files are opened with create-new semantics and never overwritten.

use crate::result::{ProbeError, ProbeResult};
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Collisions tolerated for one name before giving up
const MAX_SUFFIX: u32 = 100;

/// Writes diagnostic artifacts under one directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Store rooted at `dir`; the directory is created on first write
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` as a new artifact and return its path
    pub fn write(&self, scenario: &str, kind: &str, bytes: &[u8]) -> ProbeResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let stem = format!(
            "{}_{}_{}",
            sanitize(scenario),
            sanitize(kind),
            Utc::now().format("%Y%m%dT%H%M%S%3fZ")
        );
        for attempt in 0..MAX_SUFFIX {
            let name = if attempt == 0 {
                format!("{stem}.png")
            } else {
                format!("{stem}-{attempt}.png")
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(bytes)?;
                    info!(path = %path.display(), bytes = bytes.len(), "artifact written");
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
        }
        Err(ProbeError::Screenshot {
            message: format!("no free artifact name for {stem}"),
        })
    }
}

/// Keep `[A-Za-z0-9_-]`, replace everything else with `-`
fn sanitize(part: &str) -> String {
    let cleaned: String = part
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_write_creates_dir_and_names_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path().join("nested/artifacts"));
        let path = store.write("smart_add", "timeout", b"png").unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("smart_add_timeout_"));
        assert!(name.ends_with(".png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"png");
    }

    #[test]
    fn test_repeated_writes_never_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let paths: Vec<_> = (0..5)
            .map(|i| store.write("s", "not_found", &[i]).unwrap())
            .collect();
        for (i, path) in paths.iter().enumerate() {
            assert_eq!(std::fs::read(path).unwrap(), vec![i as u8]);
        }
        let mut unique = paths.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("a/b c"), "a-b-c");
        assert_eq!(sanitize(""), "unnamed");
        assert_eq!(sanitize("task_list"), "task_list");
    }

    proptest! {
        #[test]
        fn prop_sanitized_names_are_path_safe(name in "\\PC{0,30}") {
            let clean = sanitize(&name);
            prop_assert!(!clean.is_empty());
            prop_assert!(clean.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
        }
    }
}
