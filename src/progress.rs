//! Progress-callback trait for per-file batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::TilingConfigBuilder::progress_callback`] to receive
//! events as the batch driver works through its files.
//!
//! # Example
//!
//! ```rust
//! use tilepdf::{BatchProgressCallback, TilingConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, name: &str, _stats: &tilepdf::FileStats) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{n}: {name}");
//!     }
//! }
//!
//! let config = TilingConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::FileError;
use crate::output::{BatchStats, FileStats, SkipReason};
use std::sync::Arc;

/// Called by the batch driver as it processes each file.
///
/// Files run concurrently, so every method may be called from several
/// threads at once. All methods default to no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first file starts.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when the driver picks up a file, before the tracker check.
    fn on_file_start(&self, name: &str) {
        let _ = name;
    }

    /// Called when a file's PDF has been stored and tracked.
    fn on_file_complete(&self, name: &str, stats: &FileStats) {
        let _ = (name, stats);
    }

    /// Called when a file is skipped (already tracked or unsupported).
    fn on_file_skipped(&self, name: &str, reason: &SkipReason) {
        let _ = (name, reason);
    }

    /// Called when a file fails.
    fn on_file_error(&self, error: &FileError) {
        let _ = error;
    }

    /// Called once after every file has an outcome.
    fn on_batch_complete(&self, stats: &BatchStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::TilingConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
