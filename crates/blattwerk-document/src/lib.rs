// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// blattwerk-document — PDF processing for the Blattwerk workbench.
//
// Provides the page-collection accessor, the single-pass transformers
// (encrypt, decrypt, compress, split, merge, rotate), the tiled watermark
// compositor, and embedded-image extraction. Every transformer is a pure
// function of (input file, parameters) → new output file; inputs are never
// mutated in place.

pub mod pdf;

pub use pdf::extract::ImageExtractor;
pub use pdf::reader::PdfReader;
pub use pdf::watermark::{ImageWatermark, TextWatermark};
