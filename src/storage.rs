//! Source and destination collaborators.
//!
//! The pipeline only ever sees local files: a [`SourceProvider`] materialises
//! a named object into a working directory, and a [`DestinationSink`] takes a
//! finished local PDF and publishes it under its logical output name. Both
//! are traits so object-store backends can be plugged in; the local-directory
//! implementations here back the CLI and the tests.
//!
//! Every I/O failure is reported as [`TilerError::Transfer`] and propagated
//! unchanged by the batch driver.

use crate::error::TilerError;
use crate::pipeline::input::base_name;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// A source object materialised on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSource {
    pub path: PathBuf,
    /// Size of the original object in bytes.
    pub size: u64,
}

/// Where input files come from.
pub trait SourceProvider: Send + Sync {
    /// Every object name in the source, including directory markers if the
    /// backend has them (names ending in `/`).
    fn list(&self) -> Result<Vec<String>, TilerError>;

    /// Copy `name` into `dest_dir` and return the local copy.
    fn fetch(&self, name: &str, dest_dir: &Path) -> Result<LocalSource, TilerError>;
}

/// Where finished PDFs go.
pub trait DestinationSink: Send + Sync {
    /// Publish the file at `local_path` as `output_name`.
    fn store(&self, local_path: &Path, output_name: &str) -> Result<(), TilerError>;
}

fn transfer_err(name: &str, e: impl std::fmt::Display) -> TilerError {
    TilerError::Transfer {
        name: name.to_string(),
        reason: e.to_string(),
    }
}

// ── Local directory source ───────────────────────────────────────────────

/// Files under a local directory, named by `/`-separated relative path.
#[derive(Debug, Clone)]
pub struct LocalDirSource {
    root: PathBuf,
}

impl LocalDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn walk(&self, dir: &Path, prefix: &str, out: &mut Vec<String>) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let name = if prefix.is_empty() {
                file_name
            } else {
                format!("{prefix}/{file_name}")
            };
            if entry.file_type()?.is_dir() {
                self.walk(&entry.path(), &name, out)?;
            } else {
                out.push(name);
            }
        }
        Ok(())
    }
}

impl SourceProvider for LocalDirSource {
    fn list(&self) -> Result<Vec<String>, TilerError> {
        let mut names = Vec::new();
        self.walk(&self.root, "", &mut names)
            .map_err(|e| transfer_err(&self.root.display().to_string(), e))?;
        names.sort();
        Ok(names)
    }

    fn fetch(&self, name: &str, dest_dir: &Path) -> Result<LocalSource, TilerError> {
        let src = self.root.join(name);
        let dest = dest_dir.join(base_name(name));
        let size = std::fs::copy(&src, &dest).map_err(|e| transfer_err(name, e))?;
        debug!("Fetched {} ({} bytes) → {}", name, size, dest.display());
        Ok(LocalSource { path: dest, size })
    }
}

// ── Local directory sink ─────────────────────────────────────────────────

/// Writes outputs into a local directory.
#[derive(Debug, Clone)]
pub struct LocalDirSink {
    root: PathBuf,
}

impl LocalDirSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DestinationSink for LocalDirSink {
    fn store(&self, local_path: &Path, output_name: &str) -> Result<(), TilerError> {
        let dest = self.root.join(output_name);
        let parent = dest.parent().unwrap_or(self.root.as_path());
        std::fs::create_dir_all(parent).map_err(|e| transfer_err(output_name, e))?;

        // Unique temp file per store; deleted on drop unless persisted.
        let mut tmp = NamedTempFile::new_in(parent).map_err(|e| transfer_err(output_name, e))?;
        let mut src = File::open(local_path).map_err(|e| transfer_err(output_name, e))?;
        io::copy(&mut src, tmp.as_file_mut()).map_err(|e| transfer_err(output_name, e))?;
        tmp.persist(&dest)
            .map_err(|e| transfer_err(output_name, e.error))?;

        debug!("Stored {}", dest.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_walks_subdirectories_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("b/c")).unwrap();
        std::fs::write(dir.path().join("z.jpg"), b"z").unwrap();
        std::fs::write(dir.path().join("b/c/a.png"), b"a").unwrap();
        std::fs::write(dir.path().join("b/x.pdf"), b"x").unwrap();

        let names = LocalDirSource::new(dir.path()).list().unwrap();
        assert_eq!(names, vec!["b/c/a.png", "b/x.pdf", "z.jpg"]);
    }

    #[test]
    fn fetch_copies_and_reports_size() {
        let src = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("sub")).unwrap();
        std::fs::write(src.path().join("sub/scan.jpg"), b"12345").unwrap();

        let local = LocalDirSource::new(src.path())
            .fetch("sub/scan.jpg", work.path())
            .unwrap();
        assert_eq!(local.size, 5);
        assert_eq!(local.path, work.path().join("scan.jpg"));
        assert_eq!(std::fs::read(&local.path).unwrap(), b"12345");
    }

    #[test]
    fn fetch_missing_is_transfer_error() {
        let src = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let err = LocalDirSource::new(src.path())
            .fetch("nope.png", work.path())
            .unwrap_err();
        assert!(matches!(err, TilerError::Transfer { ref name, .. } if name == "nope.png"));
    }

    #[test]
    fn sink_stores_under_output_name() {
        let out = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let local = work.path().join("final.pdf");
        std::fs::write(&local, b"%PDF-1.5").unwrap();

        LocalDirSink::new(out.path().join("results"))
            .store(&local, "map_tiles.pdf")
            .unwrap();

        let dest = out.path().join("results/map_tiles.pdf");
        assert_eq!(std::fs::read(dest).unwrap(), b"%PDF-1.5");
        assert_eq!(std::fs::read_dir(out.path().join("results")).unwrap().count(), 1);
    }

    #[test]
    fn failed_store_leaves_no_temp_file() {
        let out = tempfile::tempdir().unwrap();
        let sink = LocalDirSink::new(out.path());

        let err = sink
            .store(&out.path().join("missing.pdf"), "map_tiles.pdf")
            .unwrap_err();
        assert!(matches!(err, TilerError::Transfer { ref name, .. } if name == "map_tiles.pdf"));
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn concurrent_stores_of_one_name_do_not_mix() {
        // `a/map.jpg` and `b/map.png` both become `map_tiles.pdf`.
        let out = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let first = work.path().join("first.pdf");
        let second = work.path().join("second.pdf");
        let body_a = vec![b'a'; 256 * 1024];
        let body_b = vec![b'b'; 256 * 1024];
        std::fs::write(&first, &body_a).unwrap();
        std::fs::write(&second, &body_b).unwrap();

        let sink = std::sync::Arc::new(LocalDirSink::new(out.path()));
        let handles: Vec<_> = [first, second]
            .into_iter()
            .map(|local| {
                let sink = std::sync::Arc::clone(&sink);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        sink.store(&local, "map_tiles.pdf").unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let stored = std::fs::read(out.path().join("map_tiles.pdf")).unwrap();
        assert!(stored == body_a || stored == body_b);
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 1);
    }
}
