//! Processed-file tracking for batch-level deduplication.
//!
//! A tracker is a flat set of file identifiers that have been fully
//! processed. The batch driver consults it before fetching a file and adds
//! to it only after the output has been stored, so a crash anywhere in
//! between leaves the file eligible for the next batch.
//!
//! # Concurrency
//!
//! [`FileTracker`] merges with what is on disk immediately before every
//! write and serialises its own writers with a mutex, so concurrent files of
//! one batch never drop each other's entries. Two *processes* sharing the
//! same tracker file can still interleave read-merge-write and lose an entry;
//! the lost file is simply processed again next time.

use crate::error::TilerError;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::debug;

/// Durable record of completed file identifiers.
pub trait ProcessedTracker: Send + Sync {
    /// Whether `name` was already marked processed.
    fn contains(&self, name: &str) -> Result<bool, TilerError>;

    /// Add `name` to the set. Marking an existing name is a no-op.
    fn mark_processed(&self, name: &str) -> Result<(), TilerError>;
}

/// Parse the newline-delimited tracker format.
///
/// Names are kept byte for byte, surrounding spaces included; only a CRLF
/// line ending and blank lines are dropped.
pub fn parse_entries(text: &str) -> BTreeSet<String> {
    text.lines()
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Render a set in the tracker format: sorted, one name per line.
pub fn render_entries(entries: &BTreeSet<String>) -> String {
    entries.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
}

// ── In-memory ────────────────────────────────────────────────────────────

/// Tracker held in memory, for library callers that keep their own state
/// and for tests.
#[derive(Debug, Default)]
pub struct MemoryTracker {
    entries: Mutex<BTreeSet<String>>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: Mutex::new(entries.into_iter().map(Into::into).collect()),
        }
    }

    /// Copy of the current set.
    pub fn snapshot(&self) -> BTreeSet<String> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        // A panic while holding the lock cannot leave a BTreeSet half-updated.
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl ProcessedTracker for MemoryTracker {
    fn contains(&self, name: &str) -> Result<bool, TilerError> {
        Ok(self.lock().contains(name))
    }

    fn mark_processed(&self, name: &str) -> Result<(), TilerError> {
        self.lock().insert(name.to_string());
        Ok(())
    }
}

// ── File-backed ──────────────────────────────────────────────────────────

/// Tracker persisted as a plain, lexically sorted, newline-delimited file.
#[derive(Debug)]
pub struct FileTracker {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current on-disk set. A missing file is an empty set.
    pub fn load(&self) -> Result<BTreeSet<String>, TilerError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(parse_entries(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeSet::new()),
            Err(e) => Err(TilerError::TrackerUnavailable(format!(
                "reading {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn store(&self, entries: &BTreeSet<String>) -> Result<(), TilerError> {
        let err = |e: std::io::Error| {
            TilerError::TrackerUnavailable(format!("writing {}: {}", self.path.display(), e))
        };
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(err)?;

        let mut tmp = NamedTempFile::new_in(parent).map_err(err)?;
        tmp.write_all(render_entries(entries).as_bytes()).map_err(err)?;
        tmp.persist(&self.path).map_err(|e| err(e.error))?;
        Ok(())
    }
}

impl ProcessedTracker for FileTracker {
    fn contains(&self, name: &str) -> Result<bool, TilerError> {
        Ok(self.load()?.contains(name))
    }

    fn mark_processed(&self, name: &str) -> Result<(), TilerError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());

        let mut entries = self.load()?;
        if !entries.insert(name.to_string()) {
            debug!("'{}' already tracked", name);
            return Ok(());
        }
        self.store(&entries)?;
        debug!("Tracked '{}' ({} entries)", name, entries.len());
        Ok(())
    }
}
