//! Error types for the tilepdf library.
//!
//! Two distinct error types reflect two distinct scopes:
//!
//! * [`TilerError`]: everything that can abort the processing of **one**
//!   file (undecodable image, corrupt PDF, budget unreachable, transfer
//!   failure). Returned as `Err(TilerError)` from the single-file entry
//!   points.
//!
//! * [`FileError`]: the serialisable record of such a failure, keyed by the
//!   file identifier. Stored inside [`crate::output::FileOutcome::Failed`] so a
//!   batch can keep going and report every failure at the end.
//!
//! An unsupported extension is neither: it is a
//! [`crate::output::SkipReason`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All errors that abort the processing of a single file.
#[derive(Debug, Error)]
pub enum TilerError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Local input file was not found.
    #[error("Input file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The raster decoder rejected the file.
    #[error("Failed to decode image '{path}': {detail}")]
    ImageDecodeFailed { path: PathBuf, detail: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password. Encrypted scans are not supported.
    #[error("PDF '{path}' is encrypted and requires a password")]
    PasswordRequired { path: PathBuf },

    /// The PDF parsed but has no page to render.
    #[error("PDF '{path}' has no pages")]
    EmptyPdf { path: PathBuf },

    /// pdfium-render returned an error while rendering the first page.
    #[error("Rasterisation failed for '{path}': {detail}")]
    RasterisationFailed { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// Every quality/resize candidate exceeded the byte budget.
    #[error(
        "Cannot compress within budget: smallest candidate was {smallest_bytes} bytes \
(budget {budget} bytes) after {attempts} attempts"
    )]
    CompressionBudgetUnreachable {
        budget: u64,
        smallest_bytes: u64,
        attempts: usize,
    },

    /// The JPEG encoder failed on a candidate.
    #[error("JPEG encoding failed: {0}")]
    EncodeFailed(String),

    /// Requested tile count cannot partition the raster.
    #[error("Cannot split {height} rows into {parts} horizontal parts")]
    InvalidParts { parts: u32, height: u32 },

    /// lopdf could not build or serialise the tiled document.
    #[error("PDF assembly failed: {0}")]
    PdfAssemblyFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source download or destination upload failed.
    #[error("Transfer failed for '{name}': {reason}")]
    Transfer { name: String, reason: String },

    /// Reading or writing the processed-file tracker failed.
    #[error("Tracker unavailable: {0}")]
    TrackerUnavailable(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TilerError {
    /// Coarse classification used in batch reports.
    pub fn kind(&self) -> FailureKind {
        match self {
            TilerError::FileNotFound { .. } | TilerError::ImageDecodeFailed { .. } => {
                FailureKind::Decode
            }
            TilerError::CorruptPdf { .. }
            | TilerError::PasswordRequired { .. }
            | TilerError::EmptyPdf { .. }
            | TilerError::RasterisationFailed { .. }
            | TilerError::PdfiumBindingFailed(_) => FailureKind::Pdf,
            TilerError::CompressionBudgetUnreachable { .. } => FailureKind::BudgetUnreachable,
            TilerError::EncodeFailed(_)
            | TilerError::InvalidParts { .. }
            | TilerError::PdfAssemblyFailed(_) => FailureKind::Pipeline,
            TilerError::OutputWriteFailed { .. } | TilerError::Transfer { .. } => {
                FailureKind::Transfer
            }
            TilerError::TrackerUnavailable(_) => FailureKind::Tracker,
            TilerError::InvalidConfig(_) | TilerError::Internal(_) => FailureKind::Other,
        }
    }

    /// Whether a later batch has any chance of succeeding on the same file.
    ///
    /// Budget exhaustion is deterministic for a given input, so retrying it
    /// only burns the same twelve encodes again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::Transfer | FailureKind::Tracker | FailureKind::Other
        )
    }
}

/// Coarse failure category recorded in [`FileError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Decode,
    Pdf,
    BudgetUnreachable,
    Pipeline,
    Transfer,
    Tracker,
    Other,
}

/// A per-file failure, keyed by file identifier.
///
/// The batch continues after recording one of these; the file is left out of
/// the tracker so the next batch picks it up again.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{name}: {message}")]
pub struct FileError {
    pub name: String,
    pub kind: FailureKind,
    pub message: String,
    pub retryable: bool,
}

impl FileError {
    pub fn new(name: impl Into<String>, err: &TilerError) -> Self {
        Self {
            name: name.into(),
            kind: err.kind(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}
