//! Horizontal tiling: cut a raster into `N` full-width strips.
//!
//! Every strip is `height / N` rows tall except the last, which also takes
//! the `height % N` leftover rows. Strips never overlap and together cover
//! every row exactly once.

use crate::error::TilerError;
use image::{imageops, RgbImage};
use std::ops::Range;

/// One horizontal strip of the source raster.
#[derive(Debug, Clone)]
pub struct Tile {
    /// Source rows `[start, end)`.
    pub rows: Range<u32>,
    pub image: RgbImage,
}

impl Tile {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Row ranges of the `parts` strips of a raster `height` rows tall.
///
/// # Errors
/// [`TilerError::InvalidParts`] when `parts` is 0 or exceeds `height`
/// (which would produce empty strips).
pub fn tile_ranges(height: u32, parts: u32) -> Result<Vec<Range<u32>>, TilerError> {
    if parts == 0 || parts > height {
        return Err(TilerError::InvalidParts { parts, height });
    }

    let tile_height = height / parts;
    Ok((0..parts)
        .map(|i| {
            let start = i * tile_height;
            let end = if i == parts - 1 {
                height
            } else {
                (i + 1) * tile_height
            };
            start..end
        })
        .collect())
}

/// Split `image` into `parts` strips, top to bottom.
pub fn split_horizontally(image: &RgbImage, parts: u32) -> Result<Vec<Tile>, TilerError> {
    let width = image.width();
    Ok(tile_ranges(image.height(), parts)?
        .into_iter()
        .map(|rows| {
            let strip = imageops::crop_imm(image, 0, rows.start, width, rows.end - rows.start)
                .to_image();
            Tile { rows, image: strip }
        })
        .collect())
}
