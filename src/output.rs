//! Per-file outcomes and batch reports.
//!
//! Every file handed to the batch driver produces exactly one
//! [`FileOutcome`]. Failures are data here, not `Err`: one bad scan must not
//! hide the results of the rest of the batch.

use crate::error::FileError;
use serde::{Deserialize, Serialize};

/// Why a file was not processed, without that being a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The tracker already lists this file.
    AlreadyProcessed,
    /// Extension outside the allow-list.
    UnsupportedFormat { extension: Option<String> },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::AlreadyProcessed => write!(f, "already processed"),
            SkipReason::UnsupportedFormat {
                extension: Some(ext),
            } => write!(f, "unsupported format '.{ext}'"),
            SkipReason::UnsupportedFormat { extension: None } => {
                write!(f, "unsupported format (no extension)")
            }
        }
    }
}

/// Measurements for one successfully processed file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileStats {
    pub source_bytes: u64,
    /// Size of the compressed raster that was tiled.
    pub width: u32,
    pub height: u32,
    pub jpeg_bytes: u64,
    pub quality: u8,
    pub resize_percent: u32,
    pub attempts: usize,
    pub pre_downscaled: bool,
    pub tiles: usize,
    pub pdf_bytes: u64,
    pub duration_ms: u64,
}

/// Result of handing one file to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Processed {
        name: String,
        output_name: String,
        stats: FileStats,
    },
    Skipped {
        name: String,
        #[serde(flatten)]
        reason: SkipReason,
    },
    Failed {
        #[serde(flatten)]
        error: FileError,
    },
}

impl FileOutcome {
    /// The source file identifier this outcome belongs to.
    pub fn name(&self) -> &str {
        match self {
            FileOutcome::Processed { name, .. } | FileOutcome::Skipped { name, .. } => name,
            FileOutcome::Failed { error } => &error.name,
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, FileOutcome::Processed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, FileOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FileOutcome::Failed { .. })
    }
}

/// Counts over a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_duration_ms: u64,
}

/// Everything a batch produced, in the order files were submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
    pub stats: BatchStats,
}

impl BatchReport {
    pub fn new(outcomes: Vec<FileOutcome>, total_duration_ms: u64) -> Self {
        let stats = BatchStats {
            total: outcomes.len(),
            processed: outcomes.iter().filter(|o| o.is_processed()).count(),
            skipped: outcomes.iter().filter(|o| o.is_skipped()).count(),
            failed: outcomes.iter().filter(|o| o.is_failed()).count(),
            total_duration_ms,
        };
        Self { outcomes, stats }
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileError> {
        self.outcomes.iter().filter_map(|o| match o {
            FileOutcome::Failed { error } => Some(error),
            _ => None,
        })
    }

    pub fn has_failures(&self) -> bool {
        self.stats.failed > 0
    }
}
