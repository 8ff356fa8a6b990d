// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Single-pass transformers — encrypt, decrypt, compress, split, merge,
// rotate. Each is a pure function of (input path, parameters) → new output
// file in `out_dir`; the input file is never touched. Outputs are written
// atomically so a failed run leaves nothing for the download step to pick up.

use std::path::{Path, PathBuf};

use chrono::Utc;
use lopdf::encryption::{EncryptionState, EncryptionVersion, Permissions};
use lopdf::{Document, Object};
use tracing::{debug, info, instrument};

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::{PageSelector, RotationAngle};

use super::reader::{PdfReader, append_page_clone, empty_document};
use super::write_atomic;

// -- Encrypt / decrypt --------------------------------------------------------

/// Copy every page into a new document and password-protect the output
/// container (RC4-128, matching what the original toolchain produced).
#[instrument(skip_all, fields(input = %input.as_ref().display()))]
pub fn encrypt(
    input: impl AsRef<Path>,
    password: &str,
    out_dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let reader = PdfReader::open(input.as_ref(), None)?;
    let mut output = copy_all_pages(reader.document())?;

    let state = {
        let version = EncryptionVersion::V2 {
            document: &output,
            owner_password: password,
            user_password: password,
            key_length: 128,
            permissions: Permissions::all(),
        };
        EncryptionState::try_from(version)
            .map_err(|err| BlattwerkError::Pdf(format!("building encryption state: {err}")))?
    };
    output
        .encrypt(&state)
        .map_err(|err| BlattwerkError::Pdf(format!("encrypting container: {err}")))?;

    let path = timestamped(out_dir.as_ref(), "encrypted");
    save_atomic(&mut output, &path)
}

/// Remove the container-level password.
///
/// Fails with `Authentication` when the password does not unlock the source;
/// an unencrypted source passes through unchanged. Pages are re-written into
/// a plain, non-encrypted container.
#[instrument(skip_all, fields(input = %input.as_ref().display()))]
pub fn decrypt(
    input: impl AsRef<Path>,
    password: &str,
    out_dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let reader = PdfReader::open(input.as_ref(), Some(password))?;
    let mut output = copy_all_pages(reader.document())?;

    let path = timestamped(out_dir.as_ref(), "decrypted");
    save_atomic(&mut output, &path)
}

// -- Compress -----------------------------------------------------------------

/// Structural copy with document metadata retained, plus lossless stream
/// compaction. Embedded images are NOT re-encoded, so the output is not
/// guaranteed to be smaller than the input — a documented limitation, not a
/// defect.
#[instrument(skip_all, fields(input = %input.as_ref().display()))]
pub fn compress(input: impl AsRef<Path>, out_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let reader = PdfReader::open(input.as_ref(), None)?;
    let mut output = reader.into_document();
    output.compress();

    let path = timestamped(out_dir.as_ref(), "compressed");
    save_atomic(&mut output, &path)
}

// -- Split --------------------------------------------------------------------

/// Extract pages `[start, end]` (1-indexed, inclusive) into a new document,
/// preserving their order.
#[instrument(skip_all, fields(input = %input.as_ref().display(), start, end))]
pub fn split(
    input: impl AsRef<Path>,
    start: u32,
    end: u32,
    out_dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let reader = PdfReader::open(input.as_ref(), None)?;
    let total = reader.page_count() as u32;
    if start < 1 || end > total || start > end {
        return Err(BlattwerkError::PageRange { start, end, total });
    }

    let mut output = empty_document();
    for page_number in start..=end {
        let page_id = reader.page_id(page_number)?;
        append_page_clone(reader.document(), &mut output, page_id)?;
    }

    info!(pages = end - start + 1, "split complete");
    let path = timestamped(out_dir.as_ref(), "split");
    save_atomic(&mut output, &path)
}

// -- Merge --------------------------------------------------------------------

/// Concatenate the pages of every input, in the given sequence order, each
/// source keeping its internal page order. The caller supplies the order
/// explicitly (already validated as a permutation of the uploaded set).
#[instrument(skip_all, fields(inputs = inputs.len()))]
pub fn merge(inputs: &[PathBuf], out_dir: impl AsRef<Path>) -> Result<PathBuf> {
    if inputs.is_empty() {
        return Err(BlattwerkError::Parameter("no documents to merge".into()));
    }

    let mut output = empty_document();
    for input in inputs {
        let reader = PdfReader::open(input, None)?;
        let pages = reader.document().get_pages();
        debug!(input = %input.display(), pages = pages.len(), "appending document");
        for (_, page_id) in pages {
            append_page_clone(reader.document(), &mut output, page_id)?;
        }
    }

    let path = out_dir.as_ref().join("merged.pdf");
    save_atomic(&mut output, &path)
}

// -- Rotate -------------------------------------------------------------------

/// Increment the `/Rotate` state of every selected page by the given angle
/// (mod 360); unselected pages pass through untouched. Selected page numbers
/// beyond the document length are ignored.
#[instrument(skip_all, fields(input = %input.as_ref().display(), degrees = angle.degrees()))]
pub fn rotate(
    input: impl AsRef<Path>,
    angle: RotationAngle,
    selector: &PageSelector,
    out_dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let reader = PdfReader::open(input.as_ref(), None)?;
    let mut output = reader.into_document();

    let pages = output.get_pages();
    for (page_number, page_id) in pages {
        if !selector.contains(page_number) {
            continue;
        }

        let existing = output
            .get_object(page_id)
            .ok()
            .and_then(|obj| obj.as_dict().ok())
            .and_then(|dict| dict.get(b"Rotate").ok())
            .and_then(|r| r.as_i64().ok())
            .unwrap_or(0) as i32;
        let updated = (existing + angle.degrees()).rem_euclid(360);

        if let Ok(Object::Dictionary(dict)) = output.get_object_mut(page_id) {
            dict.set("Rotate", Object::Integer(updated as i64));
        }
        debug!(page_number, existing, updated, "page rotated");
    }

    let path = out_dir.as_ref().join("rotated.pdf");
    save_atomic(&mut output, &path)
}

// -- Helpers ------------------------------------------------------------------

/// Copy every page of `source` into a fresh document.
fn copy_all_pages(source: &Document) -> Result<Document> {
    let mut output = empty_document();
    for (_, page_id) in source.get_pages() {
        append_page_clone(source, &mut output, page_id)?;
    }
    Ok(output)
}

/// `{tag}_{unix timestamp}.pdf` in `out_dir`, as the original tool named its
/// outputs.
fn timestamped(out_dir: &Path, tag: &str) -> PathBuf {
    out_dir.join(format!("{tag}_{}.pdf", Utc::now().timestamp()))
}

/// Serialise `doc` and move it into place atomically.
fn save_atomic(doc: &mut Document, path: &Path) -> Result<PathBuf> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|err| BlattwerkError::Pdf(format!("serialising output: {err}")))?;
    let written = write_atomic(path, &bytes)?;
    info!(path = %written.display(), bytes = bytes.len(), "output written");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::sample_pdf;

    fn page_text(doc: &Document, page_number: u32) -> String {
        doc.extract_text(&[page_number]).unwrap_or_default()
    }

    fn write_fixture(dir: &Path, name: &str, pages: usize) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, sample_pdf(pages)).expect("write fixture");
        path
    }

    #[test]
    fn split_keeps_the_selected_pages_in_order() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let input = write_fixture(tmp.path(), "in.pdf", 5);

        let out = split(&input, 2, 4, tmp.path()).expect("split");
        let doc = Document::load(&out).expect("reload");
        assert_eq!(doc.get_pages().len(), 3);
        assert!(page_text(&doc, 1).contains("Page 2"));
        assert!(page_text(&doc, 3).contains("Page 4"));
    }

    #[test]
    fn split_rejects_bad_ranges() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let input = write_fixture(tmp.path(), "in.pdf", 3);

        for (start, end) in [(0, 2), (1, 4), (3, 2)] {
            let result = split(&input, start, end, tmp.path());
            assert!(
                matches!(result, Err(BlattwerkError::PageRange { .. })),
                "range {start}-{end} must be rejected"
            );
        }
    }

    #[test]
    fn merge_concatenates_in_sequence_order() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let a = write_fixture(tmp.path(), "a.pdf", 2);
        let b = write_fixture(tmp.path(), "b.pdf", 3);

        let out = merge(&[a, b], tmp.path()).expect("merge");
        let doc = Document::load(&out).expect("reload");
        assert_eq!(doc.get_pages().len(), 5);
        // A's pages come first, then B's in B's own order.
        assert!(page_text(&doc, 1).contains("Page 1"));
        assert!(page_text(&doc, 2).contains("Page 2"));
        assert!(page_text(&doc, 3).contains("Page 1"));
    }

    #[test]
    fn merge_of_nothing_is_an_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        assert!(merge(&[], tmp.path()).is_err());
    }

    fn rotation_of(doc: &Document, page_number: u32) -> i64 {
        let pages = doc.get_pages();
        let page_id = pages[&page_number];
        doc.get_object(page_id)
            .ok()
            .and_then(|obj| obj.as_dict().ok())
            .and_then(|dict| dict.get(b"Rotate").ok())
            .and_then(|r| r.as_i64().ok())
            .unwrap_or(0)
    }

    #[test]
    fn rotate_only_touches_selected_pages() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let input = write_fixture(tmp.path(), "in.pdf", 3);

        let selector = PageSelector::parse("1,3").expect("selector");
        let out = rotate(&input, RotationAngle::Quarter, &selector, tmp.path()).expect("rotate");

        let doc = Document::load(&out).expect("reload");
        assert_eq!(rotation_of(&doc, 1), 90);
        assert_eq!(rotation_of(&doc, 2), 0);
        assert_eq!(rotation_of(&doc, 3), 90);
    }

    #[test]
    fn rotate_round_trip_restores_state() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let input = write_fixture(tmp.path(), "in.pdf", 2);
        let out_dir_a = tmp.path().join("a");
        let out_dir_b = tmp.path().join("b");
        std::fs::create_dir_all(&out_dir_a).expect("mkdir");
        std::fs::create_dir_all(&out_dir_b).expect("mkdir");

        let once = rotate(&input, RotationAngle::Quarter, &PageSelector::All, &out_dir_a)
            .expect("rotate 90");
        let back = rotate(&once, RotationAngle::ThreeQuarter, &PageSelector::All, &out_dir_b)
            .expect("rotate 270");

        let doc = Document::load(&back).expect("reload");
        assert_eq!(rotation_of(&doc, 1), 0);
        assert_eq!(rotation_of(&doc, 2), 0);
    }

    #[test]
    fn rotate_ignores_out_of_range_selection() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let input = write_fixture(tmp.path(), "in.pdf", 2);

        let selector = PageSelector::parse("1,9").expect("selector");
        let out = rotate(&input, RotationAngle::Half, &selector, tmp.path()).expect("rotate");
        let doc = Document::load(&out).expect("reload");
        assert_eq!(doc.get_pages().len(), 2);
        assert_eq!(rotation_of(&doc, 1), 180);
    }

    #[test]
    fn compress_is_a_faithful_structural_copy() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let input = write_fixture(tmp.path(), "in.pdf", 3);

        let out = compress(&input, tmp.path()).expect("compress");
        let doc = Document::load(&out).expect("reload");
        assert_eq!(doc.get_pages().len(), 3);
        assert!(page_text(&doc, 2).contains("Page 2"));
    }

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let input = write_fixture(tmp.path(), "in.pdf", 2);

        let locked = encrypt(&input, "hunter2", tmp.path()).expect("encrypt");

        // Without the password the file must not open.
        assert!(matches!(
            PdfReader::open(&locked, None),
            Err(BlattwerkError::PasswordRequired)
        ));
        // A wrong password is an authentication failure, not a crash.
        assert!(matches!(
            PdfReader::open(&locked, Some("wrong")),
            Err(BlattwerkError::Authentication(_))
        ));

        let unlocked = decrypt(&locked, "hunter2", tmp.path()).expect("decrypt");
        let reader = PdfReader::open(&unlocked, None).expect("open plain");
        assert_eq!(reader.page_count(), 2);
    }

    #[test]
    fn decrypt_passes_plain_documents_through() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let input = write_fixture(tmp.path(), "in.pdf", 2);

        let out = decrypt(&input, "ignored", tmp.path()).expect("decrypt");
        let reader = PdfReader::open(&out, None).expect("open");
        assert_eq!(reader.page_count(), 2);
    }

    #[test]
    fn inputs_are_never_mutated() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let input = write_fixture(tmp.path(), "in.pdf", 2);
        let before = std::fs::read(&input).expect("read input");

        rotate(&input, RotationAngle::Quarter, &PageSelector::All, tmp.path()).expect("rotate");
        compress(&input, tmp.path()).expect("compress");

        let after = std::fs::read(&input).expect("re-read input");
        assert_eq!(before, after);
    }

    #[test]
    fn no_partial_outputs_are_left_behind() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let input = write_fixture(tmp.path(), "in.pdf", 3);
        split(&input, 1, 2, tmp.path()).expect("split");

        let leftovers: Vec<_> = std::fs::read_dir(tmp.path())
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "part"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
