//! Batch integration tests for tilepdf.
//!
//! Everything runs against temporary directories with the local source,
//! sink and file tracker. Raster inputs are generated on the fly, so no
//! fixtures or network are needed.
//!
//! The PDF-input test needs a pdfium library and is gated behind
//! `TILEPDF_PDFIUM_TESTS`:
//!   PDFIUM_LIB_PATH=/path/to/libpdfium.so TILEPDF_PDFIUM_TESTS=1 cargo test --test batch

use image::{Rgb, RgbImage};
use lopdf::Document;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tilepdf::{
    pending_files, process_batch, run_batch, run_batch_sync, BatchProgressCallback, BatchStats,
    Collaborators, FailureKind, FileError, FileOutcome, FileStats, FileTracker, LocalDirSink,
    LocalDirSource, ProcessedTracker, SkipReason, TilingConfig,
};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Route library logs through the test harness; `RUST_LOG=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Workspace {
    _root: TempDir,
    input: PathBuf,
    output: PathBuf,
    tracker: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("in");
        let output = root.path().join("out");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::create_dir_all(&output).unwrap();
        let tracker = root.path().join("processed.txt");
        Self {
            _root: root,
            input,
            output,
            tracker,
        }
    }

    fn collab(&self) -> Collaborators {
        Collaborators::new(
            Arc::new(LocalDirSource::new(&self.input)),
            Arc::new(LocalDirSink::new(&self.output)),
            Arc::new(FileTracker::new(&self.tracker)),
        )
    }

    fn tracker_text(&self) -> String {
        std::fs::read_to_string(&self.tracker).unwrap_or_default()
    }

    fn put(&self, name: &str, bytes: &[u8]) {
        let path = self.input.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, bytes).unwrap();
    }

    fn put_image(&self, name: &str, width: u32, height: u32) {
        let path = self.input.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        gradient(width, height).save(&path).unwrap();
    }
}

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8])
    })
}

fn noisy(width: u32, height: u32) -> RgbImage {
    let mut state: u32 = 0x9E37_79B9;
    RgbImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let b = state.to_le_bytes();
        Rgb([b[0], b[1], b[2]])
    })
}

/// Page (width, height) in PDF order.
fn page_sizes(path: &Path) -> Vec<(i64, i64)> {
    let doc = Document::load(path).unwrap();
    doc.get_pages()
        .values()
        .map(|id| {
            let page = doc.get_dictionary(*id).unwrap();
            let media = page.get(b"MediaBox").unwrap().as_array().unwrap();
            (media[2].as_i64().unwrap(), media[3].as_i64().unwrap())
        })
        .collect()
}

/// Insert an EXIF APP1 segment carrying only an orientation tag.
fn with_orientation(jpeg: &[u8], orientation: u8) -> Vec<u8> {
    let mut app1 = vec![0xFF, 0xE1, 0x00, 0x22];
    app1.extend_from_slice(b"Exif\0\0");
    app1.extend_from_slice(&[b'I', b'I', 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00]);
    app1.extend_from_slice(&[0x01, 0x00]);
    app1.extend_from_slice(&[0x12, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00]);
    app1.extend_from_slice(&[orientation, 0x00, 0x00, 0x00]);
    app1.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&app1);
    out.extend_from_slice(&jpeg[2..]);
    out
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn png_becomes_tiled_pdf_and_is_tracked() {
    init_tracing();
    let ws = Workspace::new();
    ws.put_image("scan.png", 40, 30);

    let config = TilingConfig::builder().horizontal_parts(3).build().unwrap();
    let report = process_batch(&names(&["scan.png"]), &ws.collab(), &config).await;

    assert_eq!(report.stats.processed, 1);
    match &report.outcomes[0] {
        FileOutcome::Processed {
            output_name, stats, ..
        } => {
            assert_eq!(output_name, "scan_tiles.pdf");
            assert_eq!(stats.tiles, 3);
            assert_eq!(stats.quality, 95);
            assert_eq!(stats.resize_percent, 100);
            assert_eq!(stats.attempts, 1);
        }
        other => panic!("expected processed, got {other:?}"),
    }

    let sizes = page_sizes(&ws.output.join("scan_tiles.pdf"));
    assert_eq!(sizes, vec![(40, 10), (40, 10), (40, 10)]);
    assert_eq!(ws.tracker_text(), "scan.png");
}

#[tokio::test]
async fn remainder_rows_land_on_last_page() {
    let ws = Workspace::new();
    ws.put_image("tall.jpg", 16, 11);

    let config = TilingConfig::builder().horizontal_parts(4).build().unwrap();
    let report = process_batch(&names(&["tall.jpg"]), &ws.collab(), &config).await;
    assert_eq!(report.stats.processed, 1);

    let sizes = page_sizes(&ws.output.join("tall_tiles.pdf"));
    assert_eq!(sizes, vec![(16, 2), (16, 2), (16, 2), (16, 5)]);
}

#[tokio::test]
async fn exif_rotation_is_applied_before_tiling() {
    let ws = Workspace::new();
    let mut jpeg = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 90)
        .encode_image(&gradient(40, 20))
        .unwrap();
    ws.put("rotated.JPG", &with_orientation(&jpeg, 6));

    let config = TilingConfig::builder().horizontal_parts(1).build().unwrap();
    let report = process_batch(&names(&["rotated.JPG"]), &ws.collab(), &config).await;
    assert_eq!(report.stats.processed, 1);

    assert_eq!(page_sizes(&ws.output.join("rotated_tiles.pdf")), vec![(20, 40)]);
}

#[tokio::test]
async fn nested_names_are_tracked_in_full_and_output_by_basename() {
    let ws = Workspace::new();
    ws.put_image("b.png", 8, 8);
    ws.put_image("sub/a.b.png", 8, 8);

    let config = TilingConfig::builder().max_files(None).build().unwrap();
    let report = run_batch(&ws.collab(), &config).await.unwrap();

    assert_eq!(report.stats.processed, 2);
    assert!(ws.output.join("b_tiles.pdf").exists());
    assert!(ws.output.join("a.b_tiles.pdf").exists());
    assert_eq!(ws.tracker_text(), "b.png\nsub/a.b.png");
}

// ── Skips ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unsupported_format_is_skipped_without_side_effects() {
    let ws = Workspace::new();
    ws.put("scan.bmp", b"BM not really");

    let report = process_batch(
        &names(&["scan.bmp"]),
        &ws.collab(),
        &TilingConfig::default(),
    )
    .await;

    assert_eq!(report.stats.skipped, 1);
    assert!(matches!(
        &report.outcomes[0],
        FileOutcome::Skipped {
            reason: SkipReason::UnsupportedFormat { extension: Some(ext) },
            ..
        } if ext == "bmp"
    ));
    assert_eq!(std::fs::read_dir(&ws.output).unwrap().count(), 0);
    assert!(!ws.tracker.exists());
}

#[tokio::test]
async fn tracked_file_is_bypassed_before_download() {
    let ws = Workspace::new();
    std::fs::write(&ws.tracker, "ghost.jpg").unwrap();

    // The source does not even hold the file: a fetch would fail.
    let report = process_batch(
        &names(&["ghost.jpg"]),
        &ws.collab(),
        &TilingConfig::default(),
    )
    .await;

    assert!(matches!(
        &report.outcomes[0],
        FileOutcome::Skipped {
            reason: SkipReason::AlreadyProcessed,
            ..
        }
    ));
    assert_eq!(ws.tracker_text(), "ghost.jpg");
}

#[tokio::test]
async fn second_run_processes_nothing() {
    let ws = Workspace::new();
    ws.put_image("once.png", 12, 12);
    let config = TilingConfig::default();

    let first = run_batch(&ws.collab(), &config).await.unwrap();
    assert_eq!(first.stats.processed, 1);
    let tracker_after_first = ws.tracker_text();

    let second = run_batch(&ws.collab(), &config).await.unwrap();
    assert_eq!(second.stats.total, 0);
    assert_eq!(ws.tracker_text(), tracker_after_first);
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn corrupt_file_fails_alone() {
    init_tracing();
    let ws = Workspace::new();
    ws.put("broken.jpg", b"definitely not a jpeg");
    ws.put_image("good.png", 10, 10);

    let report = process_batch(
        &names(&["broken.jpg", "good.png"]),
        &ws.collab(),
        &TilingConfig::default(),
    )
    .await;

    assert_eq!(report.stats.failed, 1);
    assert_eq!(report.stats.processed, 1);
    let failure = report.failures().next().unwrap();
    assert_eq!(failure.name, "broken.jpg");
    assert_eq!(failure.kind, FailureKind::Decode);
    assert!(!failure.retryable);

    assert!(!ws.output.join("broken_tiles.pdf").exists());
    assert!(ws.output.join("good_tiles.pdf").exists());
    assert_eq!(ws.tracker_text(), "good.png");
}

#[tokio::test]
async fn unreachable_budget_is_reported_and_not_tracked() {
    init_tracing();
    let ws = Workspace::new();
    let path = ws.input.join("noise.png");
    noisy(64, 64).save(&path).unwrap();

    let config = TilingConfig::builder().budget_bytes(100).build().unwrap();
    let report = process_batch(&names(&["noise.png"]), &ws.collab(), &config).await;

    let failure = report.failures().next().unwrap();
    assert_eq!(failure.kind, FailureKind::BudgetUnreachable);
    assert!(!failure.retryable);
    assert!(report.has_failures());
    assert!(!ws.output.join("noise_tiles.pdf").exists());
    assert!(!ws.tracker.exists());
}

#[tokio::test]
async fn too_many_parts_fails_the_file() {
    let ws = Workspace::new();
    ws.put_image("short.png", 20, 3);

    let config = TilingConfig::builder().horizontal_parts(4).build().unwrap();
    let report = process_batch(&names(&["short.png"]), &ws.collab(), &config).await;

    assert_eq!(report.stats.failed, 1);
    assert_eq!(report.failures().next().unwrap().kind, FailureKind::Pipeline);
}

// ── Planning ─────────────────────────────────────────────────────────────────

#[test]
fn pending_respects_tracker_and_cap() {
    let ws = Workspace::new();
    for name in ["a.png", "b.png", "c.png", "d.bmp"] {
        ws.put(name, b"x");
    }
    std::fs::write(&ws.tracker, "a.png").unwrap();

    let source = LocalDirSource::new(&ws.input);
    let tracker = FileTracker::new(&ws.tracker);

    assert_eq!(
        pending_files(&source, &tracker, Some(2)).unwrap(),
        vec!["b.png", "c.png"]
    );
    assert_eq!(
        pending_files(&source, &tracker, None).unwrap(),
        vec!["b.png", "c.png", "d.bmp"]
    );
}

#[test]
fn run_batch_honours_max_files() {
    let ws = Workspace::new();
    for name in ["1.png", "2.png", "3.png"] {
        ws.put_image(name, 6, 6);
    }

    let config = TilingConfig::builder().max_files(Some(2)).build().unwrap();
    let report = tokio_test::block_on(run_batch(&ws.collab(), &config)).unwrap();

    assert_eq!(report.stats.processed, 2);
    let tracker = FileTracker::new(&ws.tracker);
    assert!(tracker.contains("1.png").unwrap());
    assert!(tracker.contains("2.png").unwrap());
    assert!(!tracker.contains("3.png").unwrap());
}

#[test]
fn sync_wrapper_runs_a_batch_without_a_runtime() {
    let ws = Workspace::new();
    ws.put_image("plain.png", 10, 4);
    ws.put("notes.txt", b"hello");

    let config = TilingConfig::builder().max_files(None).build().unwrap();
    let report = run_batch_sync(&ws.collab(), &config).unwrap();

    assert_eq!(report.stats.total, 2);
    assert_eq!(report.stats.processed, 1);
    assert_eq!(report.stats.skipped, 1);
    assert_eq!(page_sizes(&ws.output.join("plain_tiles.pdf")), vec![(10, 2), (10, 2)]);
    assert_eq!(ws.tracker_text(), "plain.png");
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct Counting {
    started: AtomicUsize,
    completed: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    batch_total: AtomicUsize,
}

impl BatchProgressCallback for Counting {
    fn on_batch_start(&self, total_files: usize) {
        self.batch_total.store(total_files, Ordering::SeqCst);
    }
    fn on_file_start(&self, _name: &str) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_file_complete(&self, _name: &str, _stats: &FileStats) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_file_skipped(&self, _name: &str, _reason: &SkipReason) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }
    fn on_file_error(&self, _error: &FileError) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_batch_complete(&self, stats: &BatchStats) {
        assert_eq!(stats.total, self.batch_total.load(Ordering::SeqCst));
    }
}

#[tokio::test]
async fn progress_callback_sees_every_file() {
    let ws = Workspace::new();
    ws.put_image("ok.png", 8, 8);
    ws.put("bad.tif", b"nope");
    ws.put("skip.gif", b"GIF89a");

    let cb = Arc::new(Counting::default());
    let config = TilingConfig::builder()
        .concurrency(2)
        .progress_callback(cb.clone())
        .build()
        .unwrap();
    let report = process_batch(
        &names(&["ok.png", "bad.tif", "skip.gif"]),
        &ws.collab(),
        &config,
    )
    .await;

    assert_eq!(report.stats.total, 3);
    assert_eq!(cb.started.load(Ordering::SeqCst), 3);
    assert_eq!(cb.completed.load(Ordering::SeqCst), 1);
    assert_eq!(cb.failed.load(Ordering::SeqCst), 1);
    assert_eq!(cb.skipped.load(Ordering::SeqCst), 1);
}

// ── PDF input (needs pdfium) ─────────────────────────────────────────────────

#[tokio::test]
async fn pdf_first_page_is_rasterised() {
    if std::env::var("TILEPDF_PDFIUM_TESTS").is_err() {
        println!("SKIP — set TILEPDF_PDFIUM_TESTS=1 to run pdfium tests");
        return;
    }
    init_tracing();
    let ws = Workspace::new();

    // Build the input PDF with the crate's own assembler: one 144x72 pt page.
    let tiles = tilepdf::pipeline::tile::split_horizontally(&gradient(144, 72), 1).unwrap();
    tilepdf::pipeline::assemble::assemble(&tiles, &ws.input.join("page.pdf")).unwrap();

    let config = TilingConfig::builder()
        .dpi(144)
        .horizontal_parts(2)
        .build()
        .unwrap();
    let report = process_batch(&names(&["page.pdf"]), &ws.collab(), &config).await;
    assert_eq!(report.stats.processed, 1, "{:?}", report.outcomes);

    // 144x72 pt at 144 DPI renders to 288x144 px.
    assert_eq!(
        page_sizes(&ws.output.join("page_tiles.pdf")),
        vec![(288, 72), (288, 72)]
    );
}
