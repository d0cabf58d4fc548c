//! Orientation and format normalisation: any accepted source → one `RgbImage`.
//!
//! Phone and flatbed scans often store pixels in sensor order and record the
//! intended rotation in EXIF tag 0x0112. The decoder ignores that tag, so it
//! is read separately with `kamadak-exif` and undone here. A missing or
//! unreadable tag means "leave the pixels alone"; it is never an error.

use crate::error::TilerError;
use crate::pipeline::input::SourceKind;
use crate::pipeline::render;
use image::{DynamicImage, ImageReader, RgbImage};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Produce the normalised RGB raster for a local source file.
pub fn normalize(path: &Path, kind: SourceKind, dpi: u16) -> Result<RgbImage, TilerError> {
    match kind {
        SourceKind::Pdf => Ok(render::render_first_page(path, dpi)?.to_rgb8()),
        SourceKind::Raster => {
            let bytes = std::fs::read(path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TilerError::FileNotFound {
                        path: path.to_path_buf(),
                    }
                } else {
                    TilerError::ImageDecodeFailed {
                        path: path.to_path_buf(),
                        detail: e.to_string(),
                    }
                }
            })?;
            normalize_raster_bytes(&bytes).map_err(|detail| TilerError::ImageDecodeFailed {
                path: path.to_path_buf(),
                detail,
            })
        }
    }
}

/// Decode an in-memory raster, correct its orientation, convert to RGB.
pub fn normalize_raster_bytes(bytes: &[u8]) -> Result<RgbImage, String> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| e.to_string())?;
    // Large-format scans routinely exceed the default allocation limit.
    reader.no_limits();
    let img = reader.decode().map_err(|e| e.to_string())?;

    let orientation = read_orientation(bytes);
    debug!(
        "Decoded {}x{} raster, orientation {:?}",
        img.width(),
        img.height(),
        orientation
    );

    Ok(apply_orientation(img, orientation).to_rgb8())
}

/// EXIF orientation value of `bytes`, if present and readable.
pub fn read_orientation(bytes: &[u8]) -> Option<u32> {
    let mut cursor = Cursor::new(bytes);
    let exif = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif,
        Err(e) => {
            debug!("No usable EXIF block: {}", e);
            return None;
        }
    };

    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
}

/// Undo the stored orientation.
///
/// Rotations in the `image` crate are clockwise: value 6 (stored rotated
/// 90° counter-clockwise) is fixed by `rotate90`, value 8 by `rotate270`.
/// Mirrored orientations (2, 4, 5, 7) are left as-is.
pub fn apply_orientation(img: DynamicImage, orientation: Option<u32>) -> DynamicImage {
    match orientation {
        Some(3) => img.rotate180(),
        Some(6) => img.rotate90(),
        Some(8) => img.rotate270(),
        _ => img,
    }
}
