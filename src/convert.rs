//! Single-file and batch entry points.
//!
//! A file goes through five steps, and any failure aborts only that file:
//!
//! ```text
//! tracker check ─▶ extension dispatch ─▶ fetch ─▶ normalize → compress → tile → assemble ─▶ store ─▶ track
//! ```
//!
//! The tracker is consulted first, so an already-processed file is never
//! downloaded, and it is updated last, so a file whose upload failed is
//! retried by the next batch.

use crate::config::TilingConfig;
use crate::error::{FileError, TilerError};
use crate::output::{BatchReport, FileOutcome, FileStats, SkipReason};
use crate::pipeline::input::{extension_of, output_name_for, SourceKind};
use crate::pipeline::{assemble, compress, normalize, tile};
use crate::storage::{DestinationSink, SourceProvider};
use crate::tracker::ProcessedTracker;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// The three external collaborators a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn SourceProvider>,
    pub sink: Arc<dyn DestinationSink>,
    pub tracker: Arc<dyn ProcessedTracker>,
}

impl Collaborators {
    pub fn new(
        source: Arc<dyn SourceProvider>,
        sink: Arc<dyn DestinationSink>,
        tracker: Arc<dyn ProcessedTracker>,
    ) -> Self {
        Self {
            source,
            sink,
            tracker,
        }
    }
}

/// Run the four pipeline stages on a local file and write the tiled PDF to
/// `output_path`.
///
/// `source_bytes` is the size of the original object; it gates the
/// compressor's pre-downscale.
pub fn run_pipeline(
    input: &Path,
    kind: SourceKind,
    source_bytes: u64,
    output_path: &Path,
    config: &TilingConfig,
) -> Result<FileStats, TilerError> {
    let start = Instant::now();

    // ── Stage 1: Normalize ───────────────────────────────────────────────
    let raster = normalize::normalize(input, kind, config.dpi)?;
    debug!("Normalized → {}x{}", raster.width(), raster.height());

    // ── Stage 2: Compress ────────────────────────────────────────────────
    let compressed = compress::compress(raster, source_bytes, &config.budget())?;
    let pixels = compressed.decode()?;

    // ── Stage 3: Tile ────────────────────────────────────────────────────
    let tiles = tile::split_horizontally(&pixels, config.horizontal_parts)?;
    drop(pixels);

    // ── Stage 4: Assemble ────────────────────────────────────────────────
    let pdf = assemble::assemble(&tiles, output_path)?;

    Ok(FileStats {
        source_bytes,
        width: compressed.width,
        height: compressed.height,
        jpeg_bytes: compressed.jpeg.len() as u64,
        quality: compressed.state.quality,
        resize_percent: compressed.state.resize_percent,
        attempts: compressed.attempts,
        pre_downscaled: compressed.pre_downscaled,
        tiles: pdf.pages,
        pdf_bytes: pdf.bytes,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Process one named source object end to end. Blocking.
///
/// Returns `Ok` for processed and skipped files, `Err` for failures. On
/// `Err` nothing was stored and the tracker was not touched.
pub fn process_file_blocking(
    name: &str,
    collab: &Collaborators,
    config: &TilingConfig,
) -> Result<FileOutcome, TilerError> {
    if collab.tracker.contains(name)? {
        debug!("Skipping '{}': already processed", name);
        return Ok(FileOutcome::Skipped {
            name: name.to_string(),
            reason: SkipReason::AlreadyProcessed,
        });
    }

    let Some(kind) = SourceKind::from_name(name) else {
        info!("Skipping '{}': unsupported format", name);
        return Ok(FileOutcome::Skipped {
            name: name.to_string(),
            reason: SkipReason::UnsupportedFormat {
                extension: extension_of(name),
            },
        });
    };

    info!("Processing '{}' ({:?})", name, kind);
    let start = Instant::now();

    let work_dir =
        TempDir::new().map_err(|e| TilerError::Internal(format!("creating work dir: {e}")))?;
    let local = collab.source.fetch(name, work_dir.path())?;

    let pdf_path = work_dir.path().join("final.pdf");
    let mut stats = run_pipeline(&local.path, kind, local.size, &pdf_path, config)?;

    let output_name = output_name_for(name);
    collab.sink.store(&pdf_path, &output_name)?;
    collab.tracker.mark_processed(name)?;

    stats.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Processed '{}' → '{}': {} tiles, {} bytes, {}ms",
        name, output_name, stats.tiles, stats.pdf_bytes, stats.duration_ms
    );

    Ok(FileOutcome::Processed {
        name: name.to_string(),
        output_name,
        stats,
    })
}

/// Async wrapper around [`process_file_blocking`].
///
/// Decoding, resampling and encoding are CPU-bound, so the whole file runs
/// on tokio's blocking pool.
pub async fn process_file(
    name: &str,
    collab: &Collaborators,
    config: &TilingConfig,
) -> Result<FileOutcome, TilerError> {
    let name = name.to_string();
    let collab = collab.clone();
    let config = config.clone();

    tokio::task::spawn_blocking(move || process_file_blocking(&name, &collab, &config))
        .await
        .map_err(|e| TilerError::Internal(format!("Pipeline task panicked: {}", e)))?
}

/// Names worth submitting: not directory markers, not yet tracked, at most
/// `max_files` of them, in source listing order.
pub fn pending_files(
    source: &dyn SourceProvider,
    tracker: &dyn ProcessedTracker,
    max_files: Option<usize>,
) -> Result<Vec<String>, TilerError> {
    let limit = max_files.unwrap_or(usize::MAX);
    let mut pending = Vec::new();
    for name in source.list()? {
        if pending.len() >= limit {
            break;
        }
        if name.ends_with('/') || tracker.contains(&name)? {
            continue;
        }
        pending.push(name);
    }
    Ok(pending)
}

/// Process `names` concurrently and report every outcome.
///
/// Never fails as a whole: each file's error is captured in its
/// [`FileOutcome::Failed`]. Outcomes keep the order of `names`.
pub async fn process_batch(
    names: &[String],
    collab: &Collaborators,
    config: &TilingConfig,
) -> BatchReport {
    let start = Instant::now();
    info!("Starting batch of {} file(s)", names.len());

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(names.len());
    }

    let mut indexed: Vec<(usize, FileOutcome)> =
        stream::iter(names.iter().cloned().enumerate().map(|(idx, name)| {
            let collab = collab.clone();
            let config = config.clone();
            async move {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_file_start(&name);
                }

                let outcome = match process_file(&name, &collab, &config).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!("Failed '{}': {}", name, e);
                        FileOutcome::Failed {
                            error: FileError::new(&name, &e),
                        }
                    }
                };

                if let Some(ref cb) = config.progress_callback {
                    match &outcome {
                        FileOutcome::Processed { stats, .. } => cb.on_file_complete(&name, stats),
                        FileOutcome::Skipped { reason, .. } => cb.on_file_skipped(&name, reason),
                        FileOutcome::Failed { error } => cb.on_file_error(error),
                    }
                }
                (idx, outcome)
            }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    indexed.sort_by_key(|(idx, _)| *idx);
    let report = BatchReport::new(
        indexed.into_iter().map(|(_, o)| o).collect(),
        start.elapsed().as_millis() as u64,
    );

    info!(
        "Batch complete: {} processed, {} skipped, {} failed in {}ms",
        report.stats.processed,
        report.stats.skipped,
        report.stats.failed,
        report.stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(&report.stats);
    }

    report
}

/// Select pending files and process them.
pub async fn run_batch(
    collab: &Collaborators,
    config: &TilingConfig,
) -> Result<BatchReport, TilerError> {
    let pending = {
        let collab = collab.clone();
        let max_files = config.max_files;
        tokio::task::spawn_blocking(move || {
            pending_files(collab.source.as_ref(), collab.tracker.as_ref(), max_files)
        })
        .await
        .map_err(|e| TilerError::Internal(format!("Listing task panicked: {}", e)))??
    };
    debug!("{} pending file(s) selected", pending.len());

    Ok(process_batch(&pending, collab, config).await)
}

/// Synchronous wrapper around [`run_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_batch_sync(
    collab: &Collaborators,
    config: &TilingConfig,
) -> Result<BatchReport, TilerError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| TilerError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_batch(collab, config))
}
