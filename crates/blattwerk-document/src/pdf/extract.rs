// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Embedded-image extraction — walks each page's XObject resources in
// document order, decodes qualifying images, and writes them out as
// individual files plus an optional zip archive.
//
// Anything that cannot be handled (unsupported filter or colour space,
// decode failure, filtered-out format, under-sized image) is skipped, never
// an error: the user gets everything extractable.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use image::DynamicImage;
use lopdf::{Document, Object, Stream};
use tracing::{debug, info, instrument, warn};

use blattwerk_core::ImageKind;
use blattwerk_core::error::{BlattwerkError, Result};

use super::reader::{PdfReader, resolve_dict};

/// A decoded embedded image ready to write.
struct ExtractedImage {
    bytes: Vec<u8>,
    extension: &'static str,
    width: u32,
    height: u32,
}

/// Extracts embedded raster images from a PDF.
pub struct ImageExtractor {
    kind: ImageKind,
    /// Images whose smaller side is below this many pixels are skipped.
    min_dimension: u32,
}

impl ImageExtractor {
    pub fn new(kind: ImageKind, min_dimension: u32) -> Self {
        Self {
            kind,
            min_dimension,
        }
    }

    /// Extract qualifying images into `out_dir`.
    ///
    /// Files are named `page_{page}_img_{index}.{ext}` (both 1-indexed, the
    /// index counting image XObjects in the order the page embeds them), and
    /// returned page-major in discovery order. Skipped images leave gaps in
    /// the index sequence rather than renumbering.
    #[instrument(skip_all, fields(input = %input.as_ref().display(), kind = ?self.kind, min = self.min_dimension))]
    pub fn extract(
        &self,
        input: impl AsRef<Path>,
        out_dir: impl AsRef<Path>,
    ) -> Result<Vec<PathBuf>> {
        let out_dir = out_dir.as_ref();
        std::fs::create_dir_all(out_dir)?;

        let reader = PdfReader::open(input.as_ref(), None)?;
        let doc = reader.document();

        let mut written = Vec::new();
        for (page_number, page_id) in doc.get_pages() {
            let Some(xobjects) = page_xobjects(doc, page_id) else {
                continue;
            };

            let mut image_index = 0u32;
            for (_, entry) in xobjects.iter() {
                let Some(stream) = resolve_stream(doc, entry) else {
                    continue;
                };
                if !is_image(stream) {
                    continue;
                }
                image_index += 1;

                let Some(decoded) = decode_image(stream) else {
                    debug!(page_number, image_index, "undecodable image skipped");
                    continue;
                };
                if !self.kind.accepts(decoded.extension) {
                    continue;
                }
                if decoded.width.min(decoded.height) < self.min_dimension {
                    debug!(
                        page_number,
                        image_index,
                        width = decoded.width,
                        height = decoded.height,
                        "image below minimum dimension skipped"
                    );
                    continue;
                }

                let path = out_dir.join(format!(
                    "page_{page_number}_img_{image_index}.{}",
                    decoded.extension
                ));
                std::fs::write(&path, &decoded.bytes)?;
                written.push(path);
            }
        }

        info!(count = written.len(), "image extraction finished");
        Ok(written)
    }

    /// Pack the extracted files into a zip archive at `zip_path`.
    pub fn archive(paths: &[PathBuf], zip_path: impl AsRef<Path>) -> Result<PathBuf> {
        let zip_path = zip_path.as_ref();
        let file = std::fs::File::create(zip_path)?;
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for path in paths {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    BlattwerkError::Image(format!("unusable archive name: {}", path.display()))
                })?;
            zip.start_file(name, options)
                .map_err(|err| BlattwerkError::Io(std::io::Error::other(err)))?;
            zip.write_all(&std::fs::read(path)?)?;
        }
        zip.finish()
            .map_err(|err| BlattwerkError::Io(std::io::Error::other(err)))?;

        info!(path = %zip_path.display(), entries = paths.len(), "archive written");
        Ok(zip_path.to_path_buf())
    }
}

// -- Page resource walking ----------------------------------------------------

/// The XObject dictionary of a page, if it has one.
fn page_xobjects(doc: &Document, page_id: lopdf::ObjectId) -> Option<lopdf::Dictionary> {
    let page = doc.get_object(page_id).ok()?.as_dict().ok()?;
    let resources = resolve_dict(doc, page.get(b"Resources").ok()?)?;
    resolve_dict(doc, resources.get(b"XObject").ok()?).cloned()
}

fn resolve_stream<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Stream> {
    match obj {
        Object::Stream(stream) => Some(stream),
        Object::Reference(id) => match doc.get_object(*id).ok()? {
            Object::Stream(stream) => Some(stream),
            _ => None,
        },
        _ => None,
    }
}

fn is_image(stream: &Stream) -> bool {
    stream
        .dict
        .get(b"Subtype")
        .ok()
        .and_then(|s| s.as_name().ok())
        .is_some_and(|name| name == b"Image".as_slice())
}

// -- Decoding -----------------------------------------------------------------

/// Decode an image XObject stream into writable bytes.
///
/// JPEG data (DCTDecode) passes through untouched; Flate-compressed or raw
/// pixel data is reconstructed from its declared colour space and re-encoded
/// as PNG. Returns `None` for anything unsupported.
fn decode_image(stream: &Stream) -> Option<ExtractedImage> {
    let filter = first_filter(stream);

    match filter.as_deref() {
        Some("DCTDecode") => {
            // Decode to validate the data and learn the true dimensions, but
            // keep the original JPEG bytes.
            let img = image::load_from_memory_with_format(
                &stream.content,
                image::ImageFormat::Jpeg,
            )
            .ok()?;
            Some(ExtractedImage {
                bytes: stream.content.clone(),
                extension: "jpg",
                width: img.width(),
                height: img.height(),
            })
        }
        Some("FlateDecode") => {
            let mut decoder = ZlibDecoder::new(&stream.content[..]);
            let mut raw = Vec::new();
            decoder.read_to_end(&mut raw).ok()?;
            finish_raw(stream, raw)
        }
        // No filter: the stream holds raw pixel data.
        None => finish_raw(stream, stream.content.clone()),
        Some(other) => {
            warn!(filter = other, "unsupported image filter skipped");
            None
        }
    }
}

/// Rebuild raw pixel data into an image and re-encode it as PNG.
fn finish_raw(stream: &Stream, raw: Vec<u8>) -> Option<ExtractedImage> {
    let img = raw_to_image(stream, raw)?;
    let (width, height) = (img.width(), img.height());

    let mut png = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .ok()?;
    Some(ExtractedImage {
        bytes: png,
        extension: "png",
        width,
        height,
    })
}

/// First entry of the stream's `/Filter`, whether single name or array.
fn first_filter(stream: &Stream) -> Option<String> {
    match stream.dict.get(b"Filter").ok()? {
        Object::Name(name) => Some(String::from_utf8_lossy(name).to_string()),
        Object::Array(filters) => filters.first().and_then(|f| match f {
            Object::Name(name) => Some(String::from_utf8_lossy(name).to_string()),
            _ => None,
        }),
        _ => None,
    }
}

/// Rebuild a `DynamicImage` from raw 8-bit pixel data using the declared
/// dimensions and colour space (RGB and grayscale only).
fn raw_to_image(stream: &Stream, raw: Vec<u8>) -> Option<DynamicImage> {
    let width = dict_u32(stream, b"Width")?;
    let height = dict_u32(stream, b"Height")?;
    let bits = dict_u32(stream, b"BitsPerComponent").unwrap_or(8);
    if bits != 8 {
        return None;
    }

    let color_space = stream
        .dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|cs| match cs {
            Object::Name(name) => Some(String::from_utf8_lossy(name).to_string()),
            Object::Array(parts) => parts.first().and_then(|p| match p {
                Object::Name(name) => Some(String::from_utf8_lossy(name).to_string()),
                _ => None,
            }),
            _ => None,
        })
        .unwrap_or_default();

    let pixels = (width as usize) * (height as usize);
    match color_space.as_str() {
        "DeviceRGB" => {
            let expected = pixels * 3;
            (raw.len() >= expected)
                .then(|| image::RgbImage::from_raw(width, height, raw[..expected].to_vec()))
                .flatten()
                .map(DynamicImage::ImageRgb8)
        }
        "DeviceGray" => {
            (raw.len() >= pixels)
                .then(|| image::GrayImage::from_raw(width, height, raw[..pixels].to_vec()))
                .flatten()
                .map(DynamicImage::ImageLuma8)
        }
        // ICC profiles do not name their layout; infer it from the data size.
        "ICCBased" => {
            if raw.len() >= pixels * 3 {
                image::RgbImage::from_raw(width, height, raw[..pixels * 3].to_vec())
                    .map(DynamicImage::ImageRgb8)
            } else if raw.len() >= pixels {
                image::GrayImage::from_raw(width, height, raw[..pixels].to_vec())
                    .map(DynamicImage::ImageLuma8)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn dict_u32(stream: &Stream, key: &[u8]) -> Option<u32> {
    stream
        .dict
        .get(key)
        .ok()
        .and_then(|v| v.as_i64().ok())
        .and_then(|v| u32::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::pdf_with_images;

    #[test]
    fn minimum_dimension_filters_small_images() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let input = tmp.path().join("in.pdf");
        // 150x150 qualifies; 80x200 has min side 80 < 100.
        std::fs::write(&input, pdf_with_images(&[(150, 150), (80, 200)])).expect("fixture");

        let extractor = ImageExtractor::new(ImageKind::All, 100);
        let out_dir = tmp.path().join("images");
        let paths = extractor.extract(&input, &out_dir).expect("extract");

        assert_eq!(paths.len(), 1);
        assert_eq!(
            paths[0].file_name().and_then(|n| n.to_str()),
            Some("page_1_img_1.jpg")
        );
    }

    #[test]
    fn format_filter_excludes_other_kinds() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let input = tmp.path().join("in.pdf");
        std::fs::write(&input, pdf_with_images(&[(150, 150)])).expect("fixture");

        let extractor = ImageExtractor::new(ImageKind::Png, 1);
        let paths = extractor
            .extract(&input, tmp.path().join("images"))
            .expect("extract");
        assert!(paths.is_empty(), "JPEG must not pass a PNG-only filter");
    }

    #[test]
    fn skipped_images_leave_index_gaps() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let input = tmp.path().join("in.pdf");
        // First image is filtered out by size, second survives as img_2.
        std::fs::write(&input, pdf_with_images(&[(20, 20), (150, 150)])).expect("fixture");

        let extractor = ImageExtractor::new(ImageKind::All, 100);
        let paths = extractor
            .extract(&input, tmp.path().join("images"))
            .expect("extract");
        assert_eq!(paths.len(), 1);
        assert_eq!(
            paths[0].file_name().and_then(|n| n.to_str()),
            Some("page_1_img_2.jpg")
        );
    }

    #[test]
    fn pages_without_images_yield_nothing() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let input = tmp.path().join("in.pdf");
        std::fs::write(&input, crate::pdf::fixtures::sample_pdf(2)).expect("fixture");

        let extractor = ImageExtractor::new(ImageKind::All, 1);
        let paths = extractor
            .extract(&input, tmp.path().join("images"))
            .expect("extract");
        assert!(paths.is_empty());
    }

    #[test]
    fn archive_packs_every_extracted_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let input = tmp.path().join("in.pdf");
        std::fs::write(&input, pdf_with_images(&[(150, 150), (200, 120)])).expect("fixture");

        let extractor = ImageExtractor::new(ImageKind::All, 1);
        let paths = extractor
            .extract(&input, tmp.path().join("images"))
            .expect("extract");
        assert_eq!(paths.len(), 2);

        let zip_path = tmp.path().join("images.zip");
        ImageExtractor::archive(&paths, &zip_path).expect("archive");

        let archive =
            zip::ZipArchive::new(std::fs::File::open(&zip_path).expect("open zip")).expect("zip");
        assert_eq!(archive.len(), 2);
    }
}
