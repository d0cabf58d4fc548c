//! CLI binary for tilepdf.
//!
//! A thin shim over the library crate that wires a local input directory,
//! output directory and tracker file into a batch run and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tilepdf::{
    pending_files, run_batch, BatchProgressCallback, BatchStats, Collaborators, FileError,
    FileOutcome, FileStats, FileTracker, LocalDirSink, LocalDirSource, ProgressCallback,
    SkipReason, TilingConfig,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per file. Files finish out of order
/// when `--concurrency` > 1, so every line carries the file name.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Tiling");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_files} file(s)…"))
        ));
    }

    fn on_file_start(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn on_file_complete(&self, name: &str, stats: &FileStats) {
        self.bar.println(format!(
            "  {} {}  {}  {}",
            green("✓"),
            name,
            dim(&format!(
                "{} tiles, {} KiB, q{} @ {}%",
                stats.tiles,
                stats.pdf_bytes / 1024,
                stats.quality,
                stats.resize_percent
            )),
            dim(&format!("{:.1}s", stats.duration_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_file_skipped(&self, name: &str, reason: &SkipReason) {
        self.bar
            .println(format!("  {} {}  {}", dim("–"), name, dim(&reason.to_string())));
        self.bar.inc(1);
    }

    fn on_file_error(&self, error: &FileError) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.message.chars().count() > 80 {
            let mut s: String = error.message.chars().take(79).collect();
            s.push('\u{2026}');
            s
        } else {
            error.message.clone()
        };

        self.bar
            .println(format!("  {} {}  {}", red("✗"), error.name, red(&msg)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, stats: &BatchStats) {
        self.bar.finish_and_clear();

        let failed = self.errors.load(Ordering::SeqCst);
        let mark = if failed == 0 {
            green("✔")
        } else if stats.processed == 0 {
            red("✘")
        } else {
            cyan("⚠")
        };
        eprintln!(
            "{} {} processed, {} skipped, {} failed  {}",
            mark,
            bold(&stats.processed.to_string()),
            stats.skipped,
            if failed == 0 {
                failed.to_string()
            } else {
                red(&failed.to_string())
            },
            dim(&format!("{}ms", stats.total_duration_ms)),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process up to 5 new scans into ./out
  tilepdf scans -o out

  # Everything pending, 3 strips per page, 10 MiB budget
  tilepdf scans -o out --all --parts 3 --budget-mb 10

  # Show what would be processed
  tilepdf scans -o out --dry-run

  # JSON report for scripting
  tilepdf scans -o out --json > report.json

SUPPORTED INPUTS:
  .pdf                       first page rasterised at --dpi
  .jpg .jpeg .png .tif .tiff EXIF orientation applied
  anything else              skipped, never marked processed

OUTPUT:
  <OUTPUT_DIR>/<stem>_tiles.pdf, one page per horizontal strip.
  Processed names are recorded in the tracker file and skipped next time.

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Path to libpdfium (otherwise the system library is used)
  RUST_LOG          Overrides the log filter
"#;

/// Compress scans and split them into multi-page tiled PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "tilepdf",
    version,
    about = "Compress scans and split them into multi-page tiled PDFs",
    long_about = "Compress each image or single-page PDF in INPUT_DIR under a byte budget, \
cut it into horizontal strips and write one PDF page per strip into OUTPUT_DIR. \
Files already listed in the tracker are skipped.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory to read source files from (searched recursively).
    input: PathBuf,

    /// Directory to write `<stem>_tiles.pdf` files into.
    #[arg(short, long, env = "TILEPDF_OUTPUT")]
    output: PathBuf,

    /// Number of horizontal strips per image.
    #[arg(long, env = "TILEPDF_PARTS", default_value_t = tilepdf::config::DEFAULT_HORIZONTAL_PARTS,
          value_parser = clap::value_parser!(u32).range(1..))]
    parts: u32,

    /// Maximum size of the compressed raster, in MiB.
    #[arg(long, env = "TILEPDF_BUDGET_MB", default_value_t = 30,
          value_parser = clap::value_parser!(u64).range(1..))]
    budget_mb: u64,

    /// DPI for PDF rasterisation and the JPEG density header (36–600).
    #[arg(long, env = "TILEPDF_DPI", default_value_t = tilepdf::config::DEFAULT_DPI,
          value_parser = clap::value_parser!(u16).range(36..=600))]
    dpi: u16,

    /// Tracker file [default: <OUTPUT_DIR>/processed.txt].
    #[arg(long, env = "TILEPDF_TRACKER")]
    tracker: Option<PathBuf>,

    /// Maximum number of pending files per run.
    #[arg(long, env = "TILEPDF_MAX_FILES", default_value_t = tilepdf::config::DEFAULT_MAX_FILES,
          conflicts_with = "all")]
    max_files: usize,

    /// Process every pending file (no --max-files cap).
    #[arg(long, env = "TILEPDF_ALL")]
    all: bool,

    /// Number of files processed concurrently.
    #[arg(short, long, env = "TILEPDF_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// List pending files and exit without processing.
    #[arg(long)]
    dry_run: bool,

    /// Print the batch report as JSON on stdout.
    #[arg(long, env = "TILEPDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "TILEPDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TILEPDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TILEPDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.dry_run;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if !cli.input.is_dir() {
        anyhow::bail!("Input '{}' is not a directory", cli.input.display());
    }

    let tracker_path = cli
        .tracker
        .clone()
        .unwrap_or_else(|| cli.output.join("processed.txt"));
    let collab = Collaborators::new(
        Arc::new(LocalDirSource::new(&cli.input)),
        Arc::new(LocalDirSink::new(&cli.output)),
        Arc::new(FileTracker::new(tracker_path)),
    );

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Dry run ──────────────────────────────────────────────────────────
    if cli.dry_run {
        let pending = pending_files(
            collab.source.as_ref(),
            collab.tracker.as_ref(),
            config.max_files,
        )
        .context("Failed to list pending files")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&pending).context("Failed to serialise file list")?
            );
        } else {
            for name in &pending {
                println!("{name}");
            }
            if !cli.quiet {
                eprintln!("{} file(s) pending", pending.len());
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    // ── Run batch ────────────────────────────────────────────────────────
    std::fs::create_dir_all(&cli.output)
        .with_context(|| format!("Failed to create output directory {:?}", cli.output))?;

    let report = run_batch(&collab, &config)
        .await
        .context("Batch failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet && !show_progress {
        // Only print per-file lines when the progress callback is disabled.
        for outcome in &report.outcomes {
            match outcome {
                FileOutcome::Processed {
                    name, output_name, ..
                } => eprintln!("{} {} → {}", green("✓"), name, output_name),
                FileOutcome::Skipped { name, reason } => {
                    eprintln!("{} {} ({})", dim("–"), name, reason)
                }
                FileOutcome::Failed { error } => eprintln!("{} {}", red("✗"), error),
            }
        }
        eprintln!(
            "{} processed, {} skipped, {} failed in {}ms",
            report.stats.processed,
            report.stats.skipped,
            report.stats.failed,
            report.stats.total_duration_ms
        );
    }

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Map CLI args to `TilingConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<TilingConfig> {
    let mut builder = TilingConfig::builder()
        .horizontal_parts(cli.parts)
        .budget_mb(cli.budget_mb)
        .dpi(cli.dpi)
        .concurrency(cli.concurrency)
        .max_files(if cli.all { None } else { Some(cli.max_files) });

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
