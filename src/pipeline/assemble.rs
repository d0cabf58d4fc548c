//! Tile-to-PDF assembly: one page per tile, in tile order.
//!
//! Each tile is first turned into a standalone single-page document, then the
//! documents are concatenated by deep-copying each page's object graph into
//! the first one. A page is exactly as large as its tile (1 px = 1 pt) and
//! the strip is embedded losslessly as a Flate-compressed RGB image, so no
//! quality is lost beyond what the compressor already decided.

use crate::error::TilerError;
use crate::pipeline::tile::Tile;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Name of the image XObject on every page.
const IMAGE_NAME: &str = "Im0";

/// Summary of a written PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssembledPdf {
    pub pages: usize,
    pub bytes: u64,
}

/// Build the tiled document and write it atomically to `output_path`.
pub fn assemble(tiles: &[Tile], output_path: &Path) -> Result<AssembledPdf, TilerError> {
    let pages = tiles
        .iter()
        .map(tile_to_document)
        .collect::<Result<Vec<_>, _>>()?;
    let mut doc = concatenate(pages)?;
    let bytes = write_pdf(&mut doc, output_path)?;

    Ok(AssembledPdf {
        pages: tiles.len(),
        bytes,
    })
}

/// A single-page document showing `tile` full-page.
pub fn tile_to_document(tile: &Tile) -> Result<Document, TilerError> {
    let image = &tile.image;
    let (w, h) = (image.width() as i64, image.height() as i64);
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(image_xobject(image)?);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(w),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(h),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content = content.encode().map_err(assembly_err)?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(w),
            Object::Integer(h),
        ],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { IMAGE_NAME => image_id },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => Object::Integer(1),
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    Ok(doc)
}

/// Image XObject with the raw RGB samples, Flate-compressed.
fn image_xobject(image: &RgbImage) -> Result<Stream, TilerError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(image.as_raw()).map_err(assembly_err)?;
    let data = encoder.finish().map_err(assembly_err)?;

    Ok(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(image.width() as i64),
            "Height" => Object::Integer(image.height() as i64),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => Object::Integer(8),
            "Filter" => "FlateDecode",
        },
        data,
    ))
}

fn assembly_err(e: impl std::fmt::Display) -> TilerError {
    TilerError::PdfAssemblyFailed(e.to_string())
}

/// Concatenate documents page-wise, preserving order.
pub fn concatenate(docs: Vec<Document>) -> Result<Document, TilerError> {
    let mut docs = docs.into_iter();
    let mut target = docs
        .next()
        .ok_or_else(|| TilerError::PdfAssemblyFailed("no tiles to assemble".into()))?;

    for source in docs {
        append_pages(&mut target, &source).map_err(assembly_err)?;
    }

    Ok(target)
}

fn pages_root(doc: &Document) -> Result<ObjectId, lopdf::Error> {
    let root_id = doc.trailer.get(b"Root")?.as_reference()?;
    doc.get_object(root_id)?
        .as_dict()?
        .get(b"Pages")?
        .as_reference()
}

/// Copy every page of `source` (with everything it references) to the end
/// of `target`'s page tree.
fn append_pages(target: &mut Document, source: &Document) -> Result<(), lopdf::Error> {
    let target_pages = pages_root(target)?;
    let source_pages = pages_root(source)?;

    let mut copier = ObjectCopier::new(source, target);
    // Parent links resolve straight to the target's page tree.
    copier.id_map.insert(source_pages, target_pages);

    let mut new_kids = Vec::new();
    for (_, page_id) in source.get_pages() {
        new_kids.push(Object::Reference(copier.copy_object(page_id)?));
    }

    let pages_dict = target.get_object_mut(target_pages)?.as_dict_mut()?;
    let mut kids = pages_dict.get(b"Kids")?.as_array()?.clone();
    let count = pages_dict.get(b"Count")?.as_i64()? + new_kids.len() as i64;
    kids.extend(new_kids);
    pages_dict.set("Kids", Object::Array(kids));
    pages_dict.set("Count", Object::Integer(count));

    Ok(())
}

/// Deep copy of objects between documents, remapping references.
struct ObjectCopier<'a> {
    source: &'a Document,
    target: &'a mut Document,
    id_map: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectCopier<'a> {
    fn new(source: &'a Document, target: &'a mut Document) -> Self {
        Self {
            source,
            target,
            id_map: HashMap::new(),
        }
    }

    fn copy_object(&mut self, source_id: ObjectId) -> Result<ObjectId, lopdf::Error> {
        if let Some(target_id) = self.id_map.get(&source_id) {
            return Ok(*target_id);
        }

        // Reserve the id before recursing so reference cycles terminate.
        let new_id = self.target.add_object(Object::Null);
        self.id_map.insert(source_id, new_id);

        let obj = self.source.get_object(source_id)?.clone();
        let new_obj = self.remap(obj)?;
        self.target.objects.insert(new_id, new_obj);

        Ok(new_id)
    }

    fn remap(&mut self, obj: Object) -> Result<Object, lopdf::Error> {
        match obj {
            Object::Reference(id) => Ok(Object::Reference(self.copy_object(id)?)),
            Object::Array(arr) => Ok(Object::Array(
                arr.into_iter()
                    .map(|o| self.remap(o))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Object::Dictionary(mut dict) => {
                for (_, value) in dict.iter_mut() {
                    *value = self.remap(value.clone())?;
                }
                Ok(Object::Dictionary(dict))
            }
            Object::Stream(mut stream) => {
                for (_, value) in stream.dict.iter_mut() {
                    *value = self.remap(value.clone())?;
                }
                Ok(Object::Stream(stream))
            }
            other => Ok(other),
        }
    }
}

/// Serialise `doc` and move it into place at `path`.
///
/// The bytes land in a uniquely named temp file next to `path` first; a
/// reader of `path` sees either the complete document or nothing, and a
/// failed write leaves no temp file behind.
pub fn write_pdf(doc: &mut Document, path: &Path) -> Result<u64, TilerError> {
    let mut buf = Vec::new();
    doc.save_to(&mut buf).map_err(assembly_err)?;

    let write_err = |source| TilerError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(write_err)?;
    tmp.write_all(&buf).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    debug!("Wrote {} bytes to {}", buf.len(), path.display());
    Ok(buf.len() as u64)
}
