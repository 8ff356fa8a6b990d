// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF → Word conversion: page text extraction via the PDF accessor, DOCX
// assembly via `docx-rs`. Pages with no extractable text (scans) come
// through as empty sections.

use std::path::{Path, PathBuf};

use chrono::Utc;
use docx_rs::{Docx, Paragraph, Run};
use tracing::{debug, info, instrument};

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_document::PdfReader;

/// Converts a PDF into a Word document.
pub struct PdfToDocxConverter;

impl PdfToDocxConverter {
    /// Convert `input` and write `converted_{timestamp}.docx` into `out_dir`.
    #[instrument(skip_all, fields(input = %input.as_ref().display()))]
    pub fn convert(&self, input: impl AsRef<Path>, out_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let reader = PdfReader::open(input.as_ref(), None)?;
        let page_count = reader.page_count() as u32;

        let mut docx = Docx::new();
        for page_number in 1..=page_count {
            let text = reader
                .document()
                .extract_text(&[page_number])
                .unwrap_or_default();
            debug!(page_number, chars = text.len(), "page text extracted");

            for line in text.lines() {
                docx = docx
                    .add_paragraph(Paragraph::new().add_run(Run::new().add_text(line.trim_end())));
            }
            // Blank paragraph marks the page boundary.
            if page_number < page_count {
                docx = docx.add_paragraph(Paragraph::new());
            }
        }

        let path = out_dir
            .as_ref()
            .join(format!("converted_{}.docx", Utc::now().timestamp()));
        let part = path.with_extension("part");
        let file = std::fs::File::create(&part)?;
        docx.build()
            .pack(file)
            .map_err(|err| BlattwerkError::Convert(format!("assembling DOCX: {err}")))?;
        std::fs::rename(&part, &path)?;

        info!(path = %path.display(), pages = page_count, "conversion complete");
        Ok(path)
    }
}
