//! PDF rasterisation: render the first page of a PDF to a `DynamicImage` via pdfium.
//!
//! Only page 1 survives. Scanned maps arrive as single-page PDFs in practice;
//! anything after the first page is dropped without error.
//!
//! ## Scale, not pixel cap
//!
//! The page is scaled by `dpi / 72` (PDF user space is 72 units per inch), so
//! the output pixel size follows the physical page size. Huge pages become
//! huge rasters; the compressor is what bounds their encoded size.

use crate::error::TilerError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable naming an explicit libpdfium to bind to.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Bind to pdfium: `PDFIUM_LIB_PATH` first, then the system library.
pub fn bind_pdfium() -> Result<Pdfium, TilerError> {
    let bindings = match std::env::var(PDFIUM_LIB_PATH_ENV) {
        Ok(path) if !path.is_empty() => {
            debug!("Binding pdfium from {}", path);
            Pdfium::bind_to_library(&path)
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| TilerError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Render page 1 of `pdf_path` at `dpi`.
///
/// Blocking; callers run it on a blocking thread.
pub fn render_first_page(pdf_path: &Path, dpi: u16) -> Result<DynamicImage, TilerError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_file(pdf_path, None).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            TilerError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        } else {
            TilerError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if total_pages == 0 {
        return Err(TilerError::EmptyPdf {
            path: pdf_path.to_path_buf(),
        });
    }
    if total_pages > 1 {
        debug!(
            "PDF has {} pages; keeping page 1 only ({})",
            total_pages,
            pdf_path.display()
        );
    }

    let page = pages.get(0).map_err(|e| TilerError::RasterisationFailed {
        path: pdf_path.to_path_buf(),
        detail: format!("{:?}", e),
    })?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(render_scale(dpi));

    let bitmap =
        page.render_with_config(&render_config)
            .map_err(|e| TilerError::RasterisationFailed {
                path: pdf_path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

    let image = bitmap.as_image();
    info!(
        "Rendered page 1 of {} at {} DPI → {}x{} px",
        pdf_path.display(),
        dpi,
        image.width(),
        image.height()
    );

    Ok(image)
}

/// Page scale factor for a target DPI.
fn render_scale(dpi: u16) -> f32 {
    dpi as f32 / 72.0
}
