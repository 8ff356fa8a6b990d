// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Watermark compositor — builds a single-page overlay sized to the target
// document's first page, tiles it with text glyphs or an image, and merges
// that one overlay onto every page of the target.
//
// The overlay is a transient artefact: it is written to
// `watermark_{uuid}.pdf` next to the output, consumed by the merge, and
// deleted afterwards. Opacity and colour are uniform across all tiles.

use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::{ImageWatermarkOptions, TextWatermarkOptions};

use super::reader::{LETTER_PT, PdfReader, deep_clone_object, resolve_dict};
use super::write_atomic;

/// Average Helvetica glyph width as a fraction of the font size, the same
/// estimate the text layout uses elsewhere in the workbench.
const AVG_GLYPH_FACTOR: f32 = 0.5;

/// Tiles repeat every `text width × 2` horizontally and `font size × 2`
/// vertically in text mode.
const TEXT_TILE_SPACING: f32 = 2.0;

/// Image tiles repeat every `scaled dimension × 1.5`.
const IMAGE_TILE_SPACING: f32 = 1.5;

/// Repeats along one axis: enough tiles to overspan the canvas on every edge
/// regardless of the per-tile rotation.
pub(crate) fn tile_count(canvas: f32, footprint: f32) -> u32 {
    if footprint <= 0.0 {
        return 0;
    }
    (canvas / footprint).ceil() as u32 + 1
}

// -- Text watermark -----------------------------------------------------------

/// Tiled text watermark applied to every page of a document.
pub struct TextWatermark {
    options: TextWatermarkOptions,
}

impl TextWatermark {
    pub fn new(options: TextWatermarkOptions) -> Self {
        Self { options }
    }

    /// Watermark `input` and write `watermarked.pdf` into `out_dir`.
    #[instrument(skip_all, fields(input = %input.as_ref().display(), text = %self.options.text))]
    pub fn apply(&self, input: impl AsRef<Path>, out_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let out_dir = out_dir.as_ref();
        let reader = PdfReader::open(input.as_ref(), None)?;
        let canvas = canvas_size(&reader);

        let overlay = self.build_overlay(canvas)?;
        stamp_and_write(reader, overlay, out_dir)
    }

    /// One page, `canvas` points wide/high, covered in rotated text tiles.
    fn build_overlay(&self, (width, height): (f32, f32)) -> Result<Document> {
        let opts = &self.options;
        let text_width =
            opts.text.chars().count() as f32 * opts.font_size * AVG_GLYPH_FACTOR;
        let tile_w = text_width * TEXT_TILE_SPACING;
        let tile_h = opts.font_size * TEXT_TILE_SPACING;
        let columns = tile_count(width, tile_w);
        let rows = tile_count(height, tile_h);
        debug!(columns, rows, tile_w, tile_h, "text tiling computed");

        let (sin, cos) = opts.angle_degrees.to_radians().sin_cos();
        let mut ops = vec![
            Operation::new("q", vec![]),
            Operation::new("gs", vec!["WmGS".into()]),
            Operation::new(
                "rg",
                vec![
                    Object::Real(opts.color.r as f32 / 255.0),
                    Object::Real(opts.color.g as f32 / 255.0),
                    Object::Real(opts.color.b as f32 / 255.0),
                ],
            ),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["WmFont".into(), Object::Real(opts.font_size)]),
        ];

        // Rotation is local to each tile: the text matrix re-anchors at every
        // grid position and rotates around that anchor.
        for column in 0..columns {
            for row in 0..rows {
                let x = column as f32 * tile_w;
                let y = row as f32 * tile_h;
                ops.push(Operation::new(
                    "Tm",
                    vec![
                        Object::Real(cos),
                        Object::Real(sin),
                        Object::Real(-sin),
                        Object::Real(cos),
                        Object::Real(x),
                        Object::Real(y),
                    ],
                ));
                ops.push(Operation::new(
                    "Tj",
                    vec![Object::string_literal(opts.text.clone())],
                ));
            }
        }
        ops.push(Operation::new("ET", vec![]));
        ops.push(Operation::new("Q", vec![]));

        let mut doc = Document::with_version("1.5");
        let gs_id = doc.add_object(alpha_state(opts.opacity));
        let font_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(b"Helvetica".to_vec())),
        ]));
        let resources = Dictionary::from_iter([
            (
                "Font",
                Object::Dictionary(Dictionary::from_iter([(
                    "WmFont",
                    Object::Reference(font_id),
                )])),
            ),
            (
                "ExtGState",
                Object::Dictionary(Dictionary::from_iter([(
                    "WmGS",
                    Object::Reference(gs_id),
                )])),
            ),
        ]);

        finish_overlay(doc, width, height, ops, resources)
    }
}

// -- Image watermark ----------------------------------------------------------

/// Tiled image watermark applied to every page of a document.
pub struct ImageWatermark {
    image_path: PathBuf,
    options: ImageWatermarkOptions,
}

impl ImageWatermark {
    pub fn new(image_path: impl Into<PathBuf>, options: ImageWatermarkOptions) -> Self {
        Self {
            image_path: image_path.into(),
            options,
        }
    }

    /// Watermark `input` and write `watermarked.pdf` into `out_dir`.
    #[instrument(skip_all, fields(input = %input.as_ref().display(), image = %self.image_path.display()))]
    pub fn apply(&self, input: impl AsRef<Path>, out_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let out_dir = out_dir.as_ref();
        let reader = PdfReader::open(input.as_ref(), None)?;
        let canvas = canvas_size(&reader);

        let overlay = self.build_overlay(canvas)?;
        stamp_and_write(reader, overlay, out_dir)
    }

    /// One page covered in scaled copies of the source image.
    fn build_overlay(&self, (width, height): (f32, f32)) -> Result<Document> {
        let source = image::open(&self.image_path).map_err(|err| {
            BlattwerkError::Image(format!(
                "cannot open watermark image {}: {}",
                self.image_path.display(),
                err
            ))
        })?;

        let scaled_w = source.width() as f32 * self.options.scale;
        let scaled_h = source.height() as f32 * self.options.scale;
        let tile_w = scaled_w * IMAGE_TILE_SPACING;
        let tile_h = scaled_h * IMAGE_TILE_SPACING;
        let columns = tile_count(width, tile_w);
        let rows = tile_count(height, tile_h);
        debug!(columns, rows, scaled_w, scaled_h, "image tiling computed");

        let mut ops = vec![
            Operation::new("q", vec![]),
            Operation::new("gs", vec!["WmGS".into()]),
        ];
        for column in 0..columns {
            for row in 0..rows {
                let x = column as f32 * tile_w;
                let y = row as f32 * tile_h;
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new(
                    "cm",
                    vec![
                        Object::Real(scaled_w),
                        Object::Real(0.0),
                        Object::Real(0.0),
                        Object::Real(scaled_h),
                        Object::Real(x),
                        Object::Real(y),
                    ],
                ));
                ops.push(Operation::new("Do", vec!["WmImg".into()]));
                ops.push(Operation::new("Q", vec![]));
            }
        }
        ops.push(Operation::new("Q", vec![]));

        let mut doc = Document::with_version("1.5");
        let gs_id = doc.add_object(alpha_state(self.options.opacity));
        let image_id = doc.add_object(Object::Stream(jpeg_xobject(&source)?));
        let resources = Dictionary::from_iter([
            (
                "XObject",
                Object::Dictionary(Dictionary::from_iter([(
                    "WmImg",
                    Object::Reference(image_id),
                )])),
            ),
            (
                "ExtGState",
                Object::Dictionary(Dictionary::from_iter([(
                    "WmGS",
                    Object::Reference(gs_id),
                )])),
            ),
        ]);

        finish_overlay(doc, width, height, ops, resources)
    }
}

// -- Overlay assembly ---------------------------------------------------------

/// Canvas size: the first page's media box, or US Letter for an empty
/// document.
fn canvas_size(reader: &PdfReader) -> (f32, f32) {
    if reader.page_count() == 0 {
        LETTER_PT
    } else {
        reader.page_dimensions(1)
    }
}

/// `/ExtGState` dictionary carrying the uniform fill and stroke opacity.
fn alpha_state(opacity: f32) -> Dictionary {
    Dictionary::from_iter([
        ("Type", Object::Name(b"ExtGState".to_vec())),
        ("ca", Object::Real(opacity)),
        ("CA", Object::Real(opacity)),
    ])
}

/// Encode a decoded image as an RGB JPEG image XObject.
fn jpeg_xobject(source: &image::DynamicImage) -> Result<Stream> {
    let rgb = source.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut jpeg = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 85);
    rgb.write_with_encoder(encoder)
        .map_err(|err| BlattwerkError::Image(format!("JPEG encoding failed: {err}")))?;

    Ok(Stream::new(
        Dictionary::from_iter([
            ("Type", Object::Name(b"XObject".to_vec())),
            ("Subtype", Object::Name(b"Image".to_vec())),
            ("Width", Object::Integer(width as i64)),
            ("Height", Object::Integer(height as i64)),
            ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
            ("BitsPerComponent", Object::Integer(8)),
            ("Filter", Object::Name(b"DCTDecode".to_vec())),
        ]),
        jpeg,
    ))
}

/// Wrap the assembled operations and resources into a complete single-page
/// document.
fn finish_overlay(
    mut doc: Document,
    width: f32,
    height: f32,
    ops: Vec<Operation>,
    resources: Dictionary,
) -> Result<Document> {
    let encoded = Content { operations: ops }
        .encode()
        .map_err(|err| BlattwerkError::Pdf(format!("encoding overlay content: {err}")))?;
    let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));
    let resources_id = doc.add_object(resources);

    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Page".to_vec())),
        ("Parent", Object::Reference(pages_id)),
        ("Contents", Object::Reference(content_id)),
        ("Resources", Object::Reference(resources_id)),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(width),
                Object::Real(height),
            ]),
        ),
    ]));
    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(vec![Object::Reference(page_id)])),
            ("Count", Object::Integer(1)),
        ])),
    );
    let catalog_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    Ok(doc)
}

// -- Merging ------------------------------------------------------------------

/// Write the overlay to its transient file, merge it onto every page of the
/// target, write `watermarked.pdf`, and delete the transient file.
fn stamp_and_write(
    reader: PdfReader,
    mut overlay_doc: Document,
    out_dir: &Path,
) -> Result<PathBuf> {
    let overlay_path = out_dir.join(format!("watermark_{}.pdf", Uuid::new_v4()));
    overlay_doc
        .save(&overlay_path)
        .map_err(|err| BlattwerkError::Pdf(format!("writing overlay: {err}")))?;

    // The merge runs against the re-loaded overlay file; whatever happens,
    // the transient file is removed before we return.
    let result = (|| {
        let overlay = Document::load(&overlay_path)
            .map_err(|err| BlattwerkError::Pdf(format!("re-opening overlay: {err}")))?;

        let mut output = reader.into_document();
        stamp_overlay(&mut output, &overlay)?;

        let mut bytes = Vec::new();
        output
            .save_to(&mut bytes)
            .map_err(|err| BlattwerkError::Pdf(format!("serialising output: {err}")))?;
        write_atomic(&out_dir.join("watermarked.pdf"), &bytes)
    })();

    if let Err(err) = std::fs::remove_file(&overlay_path) {
        warn!(path = %overlay_path.display(), %err, "could not remove transient overlay");
    }

    if let Ok(path) = &result {
        info!(path = %path.display(), "watermark applied");
    }
    result
}

/// Merge the overlay's single page onto every page of `target`: its content
/// stream is appended to each page's `/Contents` and its resources are made
/// visible under each page's resource dictionary. The same overlay objects
/// are shared by all pages — there is no per-page regeneration.
fn stamp_overlay(target: &mut Document, overlay: &Document) -> Result<()> {
    let overlay_pages = overlay.get_pages();
    let (_, &overlay_page_id) = overlay_pages
        .iter()
        .next()
        .ok_or_else(|| BlattwerkError::Pdf("overlay has no pages".into()))?;
    let overlay_page = overlay
        .get_object(overlay_page_id)
        .and_then(|obj| obj.as_dict())
        .map_err(|err| BlattwerkError::Pdf(format!("overlay page unreadable: {err}")))?;

    // Bring the overlay's content stream across once.
    let content_stream = overlay_page
        .get(b"Contents")
        .ok()
        .and_then(|contents| match contents {
            Object::Reference(id) => overlay.get_object(*id).ok(),
            inline => Some(inline),
        })
        .and_then(|obj| match obj {
            Object::Stream(stream) => Some(stream.clone()),
            _ => None,
        })
        .ok_or_else(|| BlattwerkError::Pdf("overlay has no content stream".into()))?;
    let content_id = target.add_object(Object::Stream(content_stream));

    // Bring each overlay resource across once, remembering the names to
    // register on every target page.
    let mut imported: Vec<(Vec<u8>, Vec<u8>, lopdf::ObjectId)> = Vec::new();
    let resources = overlay_page
        .get(b"Resources")
        .ok()
        .and_then(|obj| resolve_dict(overlay, obj))
        .ok_or_else(|| BlattwerkError::Pdf("overlay has no resources".into()))?;
    for (category, value) in resources.iter() {
        let Some(entries) = resolve_dict(overlay, value) else {
            continue;
        };
        for (name, entry) in entries.iter() {
            let cloned = deep_clone_object(overlay, target, entry)?;
            let entry_id = match cloned {
                Object::Reference(id) => id,
                other => target.add_object(other),
            };
            imported.push((category.clone(), name.clone(), entry_id));
        }
    }

    let page_ids: Vec<lopdf::ObjectId> = target.get_pages().values().copied().collect();
    debug!(pages = page_ids.len(), resources = imported.len(), "stamping pages");
    for page_id in page_ids {
        append_content(target, page_id, content_id)?;
        register_resources(target, page_id, &imported)?;
    }
    Ok(())
}

/// Append a content stream reference to a page's `/Contents`.
fn append_content(
    target: &mut Document,
    page_id: lopdf::ObjectId,
    content_id: lopdf::ObjectId,
) -> Result<()> {
    let page = target
        .get_object_mut(page_id)
        .map_err(|err| BlattwerkError::Pdf(format!("page {page_id:?} unreadable: {err}")))?;
    let Object::Dictionary(dict) = page else {
        return Err(BlattwerkError::Pdf(format!(
            "page {page_id:?} is not a dictionary"
        )));
    };

    match dict.get(b"Contents").ok().cloned() {
        Some(Object::Reference(existing)) => {
            dict.set(
                "Contents",
                Object::Array(vec![
                    Object::Reference(existing),
                    Object::Reference(content_id),
                ]),
            );
        }
        Some(Object::Array(mut streams)) => {
            streams.push(Object::Reference(content_id));
            dict.set("Contents", Object::Array(streams));
        }
        _ => dict.set("Contents", Object::Reference(content_id)),
    }
    Ok(())
}

/// Make the imported overlay resources visible from one page.
///
/// The page's resource dictionary (possibly shared via a reference) is
/// resolved into a page-owned copy before the watermark entries are added,
/// so no unrelated page's resources are disturbed.
fn register_resources(
    target: &mut Document,
    page_id: lopdf::ObjectId,
    imported: &[(Vec<u8>, Vec<u8>, lopdf::ObjectId)],
) -> Result<()> {
    let mut resources: Dictionary = {
        let page = target
            .get_object(page_id)
            .and_then(|obj| obj.as_dict())
            .map_err(|err| BlattwerkError::Pdf(format!("page {page_id:?} unreadable: {err}")))?;
        page.get(b"Resources")
            .ok()
            .and_then(|obj| resolve_dict(target, obj))
            .cloned()
            .unwrap_or_default()
    };

    for (category, name, entry_id) in imported {
        let mut entries = resources
            .get(category)
            .ok()
            .and_then(|obj| resolve_dict(target, obj))
            .cloned()
            .unwrap_or_default();
        entries.set(name.clone(), Object::Reference(*entry_id));
        resources.set(category.clone(), Object::Dictionary(entries));
    }

    if let Ok(Object::Dictionary(page)) = target.get_object_mut(page_id) {
        page.set("Resources", Object::Dictionary(resources));
    }
    Ok(())
}
