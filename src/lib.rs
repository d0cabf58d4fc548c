//! # tilepdf
//!
//! Turn scanned images and single-page PDFs into size-bounded, multi-page
//! PDFs made of horizontal strips.
//!
//! Large scans (maps, plans, long receipts) are awkward to print or review
//! as one page. This crate compresses each scan under a byte budget, cuts it
//! into `N` full-width strips and writes one PDF page per strip.
//!
//! ## Pipeline Overview
//!
//! ```text
//! source file
//!  │
//!  ├─ 0. Track      skip names already recorded as processed
//!  ├─ 1. Dispatch   .pdf / .jpg / .jpeg / .png / .tif / .tiff, else skip
//!  ├─ 2. Normalize  EXIF-rotate rasters, rasterise PDF page 1 via pdfium
//!  ├─ 3. Compress   JPEG q95→q90, then 100%→50% size, until ≤ budget
//!  ├─ 4. Tile       N horizontal strips, remainder rows on the last
//!  ├─ 5. Assemble   one page per strip, top to bottom
//!  └─ 6. Store      `<stem>_tiles.pdf`, then mark processed
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tilepdf::{run_batch, Collaborators, FileTracker, LocalDirSink, LocalDirSource, TilingConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let collab = Collaborators::new(
//!         Arc::new(LocalDirSource::new("scans")),
//!         Arc::new(LocalDirSink::new("out")),
//!         Arc::new(FileTracker::new("out/processed.txt")),
//!     );
//!     let config = TilingConfig::builder().horizontal_parts(3).build()?;
//!     let report = run_batch(&collab, &config).await?;
//!     eprintln!("{} processed, {} failed", report.stats.processed, report.stats.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `tilepdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! PDF inputs need a pdfium shared library at runtime, found through
//! `PDFIUM_LIB_PATH` or the system library path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod storage;
pub mod tracker;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{TilingConfig, TilingConfigBuilder};
pub use convert::{
    pending_files, process_batch, process_file, process_file_blocking, run_batch, run_batch_sync,
    run_pipeline, Collaborators,
};
pub use error::{FailureKind, FileError, TilerError};
pub use output::{BatchReport, BatchStats, FileOutcome, FileStats, SkipReason};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use storage::{DestinationSink, LocalDirSink, LocalDirSource, LocalSource, SourceProvider};
pub use tracker::{FileTracker, MemoryTracker, ProcessedTracker};
