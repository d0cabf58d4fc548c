//! Pipeline stages for image-to-tiled-PDF conversion.
//!
//! Each submodule implements exactly one transformation step and works on
//! local files or in-memory rasters only; fetching and storing live in
//! [`crate::storage`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ normalize ──▶ compress ──▶ tile ──▶ assemble
//! (kind)   (RGB raster)   (≤ budget)  (strips)  (PDF)
//! ```
//!
//! 1. [`input`]: classify a file name and derive its output name
//! 2. [`normalize`]: decode rasters with EXIF orientation applied, or
//!    rasterise page 1 of a PDF through [`render`]
//! 3. [`compress`]: quality-then-size search for the first JPEG under budget
//! 4. [`tile`]: cut the compressed raster into horizontal strips
//! 5. [`assemble`]: one PDF page per strip, in top-to-bottom order

pub mod assemble;
pub mod compress;
pub mod input;
pub mod normalize;
pub mod render;
pub mod tile;
