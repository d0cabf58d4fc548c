//! Configuration types for tiling runs.
//!
//! All pipeline behaviour is controlled through [`TilingConfig`], built via
//! its [`TilingConfigBuilder`]. One struct is shared read-only by every file
//! of a batch, so concurrent workers can never disagree on the budget or the
//! tile count.

use crate::error::TilerError;
use crate::pipeline::compress::CompressionBudget;
use crate::progress::ProgressCallback;
use std::fmt;

/// Default byte budget for the compressed raster: 30 MiB.
pub const DEFAULT_BUDGET_BYTES: u64 = 31_457_280;

/// Default DPI for PDF rendering and JPEG density metadata.
pub const DEFAULT_DPI: u16 = 80;

/// Default number of horizontal strips per document.
pub const DEFAULT_HORIZONTAL_PARTS: u32 = 2;

/// Default number of files selected per batch.
pub const DEFAULT_MAX_FILES: usize = 5;

/// Configuration for a tiling run.
///
/// # Example
/// ```rust
/// use tilepdf::TilingConfig;
///
/// let config = TilingConfig::builder()
///     .horizontal_parts(4)
///     .dpi(100)
///     .build()
///     .unwrap();
/// assert_eq!(config.horizontal_parts, 4);
/// ```
#[derive(Clone)]
pub struct TilingConfig {
    /// Maximum size of the compressed raster in bytes. Default: 30 MiB.
    ///
    /// This bounds the JPEG produced by the compressor, not the final PDF.
    pub budget_bytes: u64,

    /// Target DPI. Range: 36–600. Default: 80.
    ///
    /// Used as the render scale for PDF sources and written into the JPEG
    /// density header. It never resizes raster inputs on its own.
    pub dpi: u16,

    /// Number of horizontal strips (PDF pages) per output. Default: 2.
    pub horizontal_parts: u32,

    /// Files processed at the same time by the batch driver. Default: 4.
    pub concurrency: usize,

    /// Upper bound on files picked by [`crate::convert::pending_files`].
    /// `None` takes every pending file. Default: 5.
    pub max_files: Option<usize>,

    /// Optional batch progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            budget_bytes: DEFAULT_BUDGET_BYTES,
            dpi: DEFAULT_DPI,
            horizontal_parts: DEFAULT_HORIZONTAL_PARTS,
            concurrency: 4,
            max_files: Some(DEFAULT_MAX_FILES),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TilingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TilingConfig")
            .field("budget_bytes", &self.budget_bytes)
            .field("dpi", &self.dpi)
            .field("horizontal_parts", &self.horizontal_parts)
            .field("concurrency", &self.concurrency)
            .field("max_files", &self.max_files)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl TilingConfig {
    /// Create a new builder for `TilingConfig`.
    pub fn builder() -> TilingConfigBuilder {
        TilingConfigBuilder {
            config: Self::default(),
        }
    }

    /// The compressor's view of this config.
    pub fn budget(&self) -> CompressionBudget {
        CompressionBudget {
            max_bytes: self.budget_bytes,
            dpi: self.dpi,
        }
    }
}

/// Builder for [`TilingConfig`].
pub struct TilingConfigBuilder {
    config: TilingConfig,
}

impl fmt::Debug for TilingConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TilingConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl TilingConfigBuilder {
    pub fn budget_bytes(mut self, bytes: u64) -> Self {
        self.config.budget_bytes = bytes;
        self
    }

    /// Budget in whole mebibytes (the unit the CLI speaks).
    pub fn budget_mb(mut self, mb: u64) -> Self {
        self.config.budget_bytes = mb.saturating_mul(1024 * 1024);
        self
    }

    pub fn dpi(mut self, dpi: u16) -> Self {
        self.config.dpi = dpi.clamp(36, 600);
        self
    }

    pub fn horizontal_parts(mut self, parts: u32) -> Self {
        self.config.horizontal_parts = parts;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_files(mut self, n: Option<usize>) -> Self {
        self.config.max_files = n;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<TilingConfig, TilerError> {
        let c = &self.config;
        if c.budget_bytes == 0 {
            return Err(TilerError::InvalidConfig(
                "Budget must be at least 1 byte".into(),
            ));
        }
        if c.horizontal_parts == 0 {
            return Err(TilerError::InvalidConfig(
                "Horizontal parts must be ≥ 1".into(),
            ));
        }
        if c.max_files == Some(0) {
            return Err(TilerError::InvalidConfig("max_files must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}
