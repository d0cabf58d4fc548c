//! Input classification: decide from a file name how (or whether) to process it.
//!
//! Dispatch is by extension only. Content sniffing would let a `.bmp`
//! renamed to `.jpg` through to the decoder, which then fails loudly; that is
//! the desired outcome, because the allow-list is the contract with whoever
//! fills the source bucket.

use std::path::Path;

/// Which normalizer path a source takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Render the first page with pdfium.
    Pdf,
    /// Decode with the `image` crate and apply EXIF orientation.
    Raster,
}

const RASTER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff"];

/// Lower-cased extension of `name`, without the dot.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

impl SourceKind {
    /// Classify a file name. `None` means "skip this file".
    pub fn from_name(name: &str) -> Option<SourceKind> {
        let ext = extension_of(name)?;
        if ext == "pdf" {
            Some(SourceKind::Pdf)
        } else if RASTER_EXTENSIONS.contains(&ext.as_str()) {
            Some(SourceKind::Raster)
        } else {
            None
        }
    }
}

/// Final path component of a `/`-separated object name.
pub fn base_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Logical output name: `<base name without last extension>_tiles.pdf`.
pub fn output_name_for(name: &str) -> String {
    let base = base_name(name);
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => base,
    };
    format!("{stem}_tiles.pdf")
}
