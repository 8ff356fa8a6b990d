// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// blattwerk-convert — format converters for the Blattwerk workbench.
//
// Both converters delegate the heavy lifting to libraries: PDF→Word is text
// extraction plus DOCX assembly, URL→PDF is an HTTP fetch plus HTML cleanup
// plus plain-text PDF layout. No original parsing or rendering lives here.

pub mod docx;
pub mod render;
pub mod url;

pub use docx::PdfToDocxConverter;
pub use render::TextPdfRenderer;
pub use url::{PageSetup, UrlToPdfConverter};

use std::path::{Path, PathBuf};

use blattwerk_core::error::Result;

/// Write `bytes` to `path` via a `.part` sibling and rename, so a failed
/// conversion never leaves a partial output visible.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let part = path.with_extension("part");
    std::fs::write(&part, bytes)?;
    std::fs::rename(&part, path)?;
    Ok(path.to_path_buf())
}
