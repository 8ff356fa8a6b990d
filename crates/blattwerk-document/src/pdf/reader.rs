// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page-collection accessor — opens a PDF and exposes its pages as opaque
// handles, using the `lopdf` crate. Also hosts the page-cloning machinery
// shared by the transformers: output documents are always built by copying
// page objects into a fresh container, never by mutating the source.

use std::path::Path;

use lopdf::{Document, Object, ObjectId};
use tracing::{debug, info, instrument, warn};

use blattwerk_core::error::{BlattwerkError, Result};

/// US Letter media box, the fallback when a document has no usable page
/// dimensions.
pub const LETTER_PT: (f32, f32) = (612.0, 792.0);

/// An opened PDF document.
///
/// Owned exclusively by the operation that opened it; dropped at the end of
/// that operation.
pub struct PdfReader {
    /// The underlying lopdf document.
    document: Document,
    /// Source path, if opened from a file (useful for diagnostics).
    source_path: Option<String>,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    ///
    /// Fails with `Format` if the bytes are not a valid PDF, with
    /// `PasswordRequired` if the document is encrypted and no password was
    /// supplied, and with `Authentication` if the supplied password does not
    /// unlock it.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, password: Option<&str>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("opening PDF: {}", path_ref.display());

        let document = Document::load(path_ref).map_err(|err| {
            BlattwerkError::Format(format!("{}: {}", path_ref.display(), err))
        })?;

        let mut reader = Self {
            document,
            source_path: Some(path_ref.display().to_string()),
        };
        reader.unlock(password)?;

        debug!(pages = reader.page_count(), "PDF loaded");
        Ok(reader)
    }

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8], password: Option<&str>) -> Result<Self> {
        let document = Document::load_mem(data)
            .map_err(|err| BlattwerkError::Format(format!("in-memory PDF: {}", err)))?;

        let mut reader = Self {
            document,
            source_path: None,
        };
        reader.unlock(password)?;
        Ok(reader)
    }

    /// If the document is encrypted, decrypt it with the supplied password.
    fn unlock(&mut self, password: Option<&str>) -> Result<()> {
        if !self.document.is_encrypted() {
            return Ok(());
        }
        let password = password.ok_or(BlattwerkError::PasswordRequired)?;
        self.document
            .decrypt(password)
            .map_err(|err| BlattwerkError::Authentication(err.to_string()))?;
        // The decrypted objects are re-written into a plain container.
        self.document.trailer.remove(b"Encrypt");
        debug!("document decrypted");
        Ok(())
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Return the source path if the reader was created via [`PdfReader::open`].
    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    /// Borrow the underlying document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Consume the reader, returning the document.
    pub fn into_document(self) -> Document {
        self.document
    }

    /// Media-box dimensions (width, height) in points of the given 1-indexed
    /// page. Falls back to US Letter when the page or its dimensions cannot
    /// be resolved.
    pub fn page_dimensions(&self, page_number: u32) -> (f32, f32) {
        let pages = self.document.get_pages();
        let Some(&page_id) = pages.get(&page_number) else {
            return LETTER_PT;
        };
        let Ok(page_object) = self.document.get_object(page_id) else {
            return LETTER_PT;
        };
        let rect = media_box(&self.document, page_object, 10).unwrap_or([
            0.0, 0.0, LETTER_PT.0, LETTER_PT.1,
        ]);
        (rect[2] - rect[0], rect[3] - rect[1])
    }

    /// The object ID of the given 1-indexed page.
    pub(crate) fn page_id(&self, page_number: u32) -> Result<ObjectId> {
        self.document
            .get_pages()
            .get(&page_number)
            .copied()
            .ok_or_else(|| {
                BlattwerkError::Pdf(format!("page {page_number} not found in page tree"))
            })
    }
}

// -- Media box resolution -----------------------------------------------------

/// Resolve a page's `/MediaBox`, following indirect references and walking up
/// the page tree. Depth-limited so malformed parent chains cannot recurse
/// forever.
fn media_box(doc: &Document, page_object: &Object, depth: usize) -> Option<[f32; 4]> {
    if depth == 0 {
        return None;
    }
    let dict = page_object.as_dict().ok()?;

    if let Ok(raw) = dict.get(b"MediaBox") {
        let resolved = match raw {
            Object::Reference(id) => doc.get_object(*id).ok(),
            other => Some(other),
        };
        if let Some(Object::Array(values)) = resolved {
            let nums: Vec<f32> = values
                .iter()
                .filter_map(|v| match v {
                    Object::Integer(i) => Some(*i as f32),
                    Object::Real(r) => Some(*r),
                    _ => None,
                })
                .collect();
            if nums.len() == 4 {
                return Some([nums[0], nums[1], nums[2], nums[3]]);
            }
        }
    }

    // Inherited from the parent Pages node.
    if let Ok(Object::Reference(parent_id)) = dict.get(b"Parent")
        && let Ok(parent) = doc.get_object(*parent_id)
    {
        return media_box(doc, parent, depth - 1);
    }
    None
}

// -- Page cloning -------------------------------------------------------------

/// Clone one page (and everything it transitively references) from `source`
/// into `target`, appending it as the last page of `target`'s page tree.
pub(crate) fn append_page_clone(
    source: &Document,
    target: &mut Document,
    page_id: ObjectId,
) -> Result<()> {
    let page_object = source
        .get_object(page_id)
        .map_err(|err| BlattwerkError::Pdf(format!("cannot read page {page_id:?}: {err}")))?;

    let cloned = deep_clone_object(source, target, page_object)?;
    let cloned_id = target.add_object(cloned);

    // Locate the target's /Pages node via the catalog.
    let pages_id = {
        let catalog = target
            .catalog()
            .map_err(|err| BlattwerkError::Pdf(format!("no catalog: {err}")))?;
        match catalog.get(b"Pages") {
            Ok(Object::Reference(id)) => *id,
            Ok(_) => return Err(BlattwerkError::Pdf("/Pages is not a reference".into())),
            Err(err) => return Err(BlattwerkError::Pdf(format!("no /Pages: {err}"))),
        }
    };

    // Register the clone under /Kids and bump /Count.
    if let Ok(Object::Dictionary(pages_dict)) = target.get_object_mut(pages_id) {
        if let Ok(Object::Array(kids)) = pages_dict.get_mut(b"Kids") {
            kids.push(Object::Reference(cloned_id));
        }
        if let Ok(Object::Integer(count)) = pages_dict.get_mut(b"Count") {
            *count += 1;
        }
    }

    // Re-point the clone's /Parent at the target tree (the original parent
    // reference was skipped during cloning).
    if let Ok(Object::Dictionary(page_dict)) = target.get_object_mut(cloned_id) {
        page_dict.set("Parent", Object::Reference(pages_id));
    }

    Ok(())
}

/// Deep-clone a single lopdf object, recursively resolving references.
///
/// `/Parent` entries are deliberately skipped — they form cycles through the
/// page tree and are patched by [`append_page_clone`] instead.
pub(crate) fn deep_clone_object(
    source: &Document,
    target: &mut Document,
    object: &Object,
) -> Result<Object> {
    match object {
        Object::Dictionary(dict) => {
            let mut cloned = lopdf::Dictionary::new();
            for (key, value) in dict.iter() {
                if key == b"Parent" {
                    continue;
                }
                cloned.set(key.clone(), deep_clone_object(source, target, value)?);
            }
            Ok(Object::Dictionary(cloned))
        }
        Object::Array(items) => {
            let mut cloned = Vec::with_capacity(items.len());
            for item in items {
                cloned.push(deep_clone_object(source, target, item)?);
            }
            Ok(Object::Array(cloned))
        }
        Object::Stream(stream) => {
            let mut cloned_dict = lopdf::Dictionary::new();
            for (key, value) in stream.dict.iter() {
                if key == b"Parent" {
                    continue;
                }
                cloned_dict.set(key.clone(), deep_clone_object(source, target, value)?);
            }
            Ok(Object::Stream(lopdf::Stream::new(
                cloned_dict,
                stream.content.clone(),
            )))
        }
        Object::Reference(ref_id) => match source.get_object(*ref_id) {
            Ok(referenced) => {
                let cloned = deep_clone_object(source, target, referenced)?;
                let new_id = target.add_object(cloned);
                Ok(Object::Reference(new_id))
            }
            Err(err) => {
                warn!(?ref_id, %err, "dangling reference replaced with null");
                Ok(Object::Null)
            }
        },
        // Boolean, Integer, Real, String, Name, Null are trivially cloneable.
        other => Ok(other.clone()),
    }
}

/// Resolve an object that may be an inline dictionary or a reference to one.
pub(crate) fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a lopdf::Dictionary> {
    match obj {
        Object::Dictionary(dict) => Some(dict),
        Object::Reference(id) => doc.get_object(*id).ok().and_then(|o| o.as_dict().ok()),
        _ => None,
    }
}

/// Start a fresh output document with an empty page tree, ready for
/// [`append_page_clone`].
pub(crate) fn empty_document() -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.add_object(lopdf::Dictionary::from_iter([
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Kids", Object::Array(Vec::new())),
        ("Count", Object::Integer(0)),
    ]));
    let catalog_id = doc.add_object(lopdf::Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc
}
