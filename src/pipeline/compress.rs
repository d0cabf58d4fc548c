//! Adaptive JPEG compression under a byte budget.
//!
//! The search walks a fixed schedule instead of bisecting: quality first
//! (95 → 90 in steps of 5), then resolution (100 % → 50 % in steps of 5 %).
//! The first candidate that fits wins and the search stops there, so the
//! output for a given input and budget is always the same.
//!
//! ```text
//! (q95,100%) → (q90,100%) → (q90,95%) → … → (q90,50%) → CompressionBudgetUnreachable
//! ```
//!
//! Text and line-art survive a lower JPEG quality much better than a lower
//! resolution, which is why quality is always exhausted first.
//!
//! The resize factor is carried as an integer percentage: repeated `-= 0.05`
//! in floating point lands just above 0.5 after ten steps and would allow an
//! eleventh resize.

use crate::error::TilerError;
use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const START_QUALITY: u8 = 95;
pub const MIN_QUALITY: u8 = 90;
pub const QUALITY_STEP: u8 = 5;

pub const START_RESIZE_PERCENT: u32 = 100;
pub const MIN_RESIZE_PERCENT: u32 = 50;
pub const RESIZE_STEP_PERCENT: u32 = 5;

/// Rasters above this many megapixels are shrunk once before the search
/// when the source file is already over budget.
pub const PRE_DOWNSCALE_MEGAPIXELS: f64 = 20.0;

/// Resampling filter for every resize in this module.
const FILTER: FilterType = FilterType::Lanczos3;

/// Byte ceiling plus the DPI written into the JPEG header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionBudget {
    pub max_bytes: u64,
    pub dpi: u16,
}

/// One point of the search schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionState {
    pub resize_percent: u32,
    pub quality: u8,
}

impl CompressionState {
    pub const INITIAL: CompressionState = CompressionState {
        resize_percent: START_RESIZE_PERCENT,
        quality: START_QUALITY,
    };

    /// The state after a candidate at `self` missed the budget, or `None`
    /// once both floors are reached.
    pub fn step_down(self) -> Option<CompressionState> {
        if self.quality > MIN_QUALITY {
            Some(CompressionState {
                quality: self.quality - QUALITY_STEP,
                ..self
            })
        } else if self.resize_percent > MIN_RESIZE_PERCENT {
            Some(CompressionState {
                resize_percent: self.resize_percent - RESIZE_STEP_PERCENT,
                ..self
            })
        } else {
            None
        }
    }
}

/// Iterator over every state the search may try, in order.
#[derive(Debug, Clone)]
pub struct CompressionSchedule {
    next: Option<CompressionState>,
}

impl Iterator for CompressionSchedule {
    type Item = CompressionState;

    fn next(&mut self) -> Option<CompressionState> {
        let current = self.next?;
        self.next = current.step_down();
        Some(current)
    }
}

/// The full schedule, starting at [`CompressionState::INITIAL`].
pub fn schedule() -> CompressionSchedule {
    CompressionSchedule {
        next: Some(CompressionState::INITIAL),
    }
}

/// A JPEG that fits the budget, plus how it was found.
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub state: CompressionState,
    /// Candidate encodes performed, including the winning one.
    pub attempts: usize,
    pub pre_downscaled: bool,
}

impl CompressedImage {
    /// Decode the winning JPEG back to pixels, so later stages see exactly
    /// what was encoded.
    pub fn decode(&self) -> Result<RgbImage, TilerError> {
        image::load_from_memory_with_format(&self.jpeg, image::ImageFormat::Jpeg)
            .map(|img| img.to_rgb8())
            .map_err(|e| TilerError::Internal(format!("re-decoding compressed JPEG: {e}")))
    }
}

/// Target size for the one-off pre-downscale, if it applies.
///
/// Dimensions are truncated, never rounded.
pub fn pre_downscale_dimensions(
    width: u32,
    height: u32,
    source_bytes: u64,
    budget_bytes: u64,
) -> Option<(u32, u32)> {
    let megapixels = (width as f64 * height as f64) / 1_000_000.0;
    if source_bytes <= budget_bytes || megapixels <= PRE_DOWNSCALE_MEGAPIXELS {
        return None;
    }
    let factor = (PRE_DOWNSCALE_MEGAPIXELS / megapixels).sqrt();
    Some((
        ((width as f64 * factor) as u32).max(1),
        ((height as f64 * factor) as u32).max(1),
    ))
}

/// Pixel size of a candidate at `resize_percent`, truncated, at least 1 px.
pub fn scaled_dimensions(width: u32, height: u32, resize_percent: u32) -> (u32, u32) {
    let scale = |v: u32| ((v as u64 * resize_percent as u64 / 100) as u32).max(1);
    (scale(width), scale(height))
}

/// Encode `img` as baseline JPEG with the DPI recorded in the JFIF header.
pub fn encode_jpeg(img: &RgbImage, quality: u8, dpi: u16) -> Result<Vec<u8>, TilerError> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.set_pixel_density(PixelDensity::dpi(dpi));
    encoder
        .encode_image(img)
        .map_err(|e| TilerError::EncodeFailed(e.to_string()))?;
    Ok(buf)
}

/// Compress a normalised raster to at most `budget.max_bytes`.
///
/// `source_bytes` is the size of the original file; it only decides whether
/// the pre-downscale runs.
///
/// # Errors
/// [`TilerError::CompressionBudgetUnreachable`] when the last schedule entry
/// still misses the budget.
pub fn compress(
    img: RgbImage,
    source_bytes: u64,
    budget: &CompressionBudget,
) -> Result<CompressedImage, TilerError> {
    let (base, pre_downscaled) =
        match pre_downscale_dimensions(img.width(), img.height(), source_bytes, budget.max_bytes)
        {
            Some((w, h)) => {
                info!(
                    "Pre-downscaling {}x{} → {}x{} (source {} bytes)",
                    img.width(),
                    img.height(),
                    w,
                    h,
                    source_bytes
                );
                (imageops::resize(&img, w, h, FILTER), true)
            }
            None => (img, false),
        };

    let mut attempts = 0;
    let mut smallest = u64::MAX;

    for state in schedule() {
        attempts += 1;
        let (w, h) = scaled_dimensions(base.width(), base.height(), state.resize_percent);

        let jpeg = if (w, h) == base.dimensions() {
            encode_jpeg(&base, state.quality, budget.dpi)?
        } else {
            let resized = imageops::resize(&base, w, h, FILTER);
            encode_jpeg(&resized, state.quality, budget.dpi)?
        };
        let size = jpeg.len() as u64;

        debug!(
            "Candidate {}: q{} @ {}% ({}x{}) → {} bytes (budget {})",
            attempts, state.quality, state.resize_percent, w, h, size, budget.max_bytes
        );

        if size <= budget.max_bytes {
            info!(
                "Compressed to {} bytes at q{} / {}% after {} attempt(s)",
                size, state.quality, state.resize_percent, attempts
            );
            return Ok(CompressedImage {
                jpeg,
                width: w,
                height: h,
                state,
                attempts,
                pre_downscaled,
            });
        }
        smallest = smallest.min(size);
    }

    Err(TilerError::CompressionBudgetUnreachable {
        budget: budget.max_bytes,
        smallest_bytes: smallest,
        attempts,
    })
}
