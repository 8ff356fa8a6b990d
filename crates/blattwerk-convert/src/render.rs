// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-text → PDF layout using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem,
};
use tracing::{debug, info, instrument};

use blattwerk_core::error::Result;
use blattwerk_core::{Orientation, PaperSize};

/// Lays plain text out onto PDF pages: top-to-bottom flow, word wrap at an
/// estimated character width, automatic page breaks, built-in Helvetica.
pub struct TextPdfRenderer {
    paper_size: PaperSize,
    orientation: Orientation,
    /// Title embedded in the PDF /Info dictionary.
    title: Option<String>,
}

impl TextPdfRenderer {
    pub fn new(paper_size: PaperSize, orientation: Orientation) -> Self {
        Self {
            paper_size,
            orientation,
            title: None,
        }
    }

    /// Portrait A4, the converter default.
    pub fn a4() -> Self {
        Self::new(PaperSize::A4, Orientation::Portrait)
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Page dimensions in printpdf's Mm units, orientation applied.
    fn page_dimensions(&self) -> (Mm, Mm) {
        let (w_mm, h_mm) = self.orientation.apply(self.paper_size.dimensions_mm());
        (Mm(w_mm), Mm(h_mm))
    }

    /// Render the text into a complete PDF, returned as bytes.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub fn render(&self, text: &str) -> Result<Vec<u8>> {
        let (page_w, page_h) = self.page_dimensions();
        let title = self.title.as_deref().unwrap_or("Blattwerk Document");

        info!(paper = ?self.paper_size, orientation = ?self.orientation, "rendering text PDF");

        let font_size_pt: f32 = 11.0;
        let line_height_pt: f32 = 14.0;
        let margin_mm: f32 = 20.0;
        let margin_pt: f32 = Mm(margin_mm).into_pt().0;

        // Helvetica averages roughly half the font size per glyph;
        // 1 pt = 0.3528 mm.
        let usable_width_mm = page_w.0 - 2.0 * margin_mm;
        let avg_char_width_mm: f32 = 0.50 * font_size_pt * 0.3528;
        let max_chars_per_line = (usable_width_mm / avg_char_width_mm) as usize;

        let lines = wrap_text(text, max_chars_per_line);
        let page_h_pt = page_h.into_pt().0;
        let usable_height_pt = page_h_pt - 2.0 * margin_pt;
        let lines_per_page = (usable_height_pt / line_height_pt).max(1.0) as usize;

        let mut doc = PdfDocument::new(title);
        let mut pages: Vec<PdfPage> = Vec::new();

        for page_lines in lines.chunks(lines_per_page) {
            let mut ops: Vec<Op> = Vec::new();
            for (line_index, line) in page_lines.iter().enumerate() {
                if line.is_empty() {
                    continue;
                }
                let y_pt = page_h_pt - margin_pt - (line_index as f32 * line_height_pt);

                ops.push(Op::StartTextSection);
                ops.push(Op::SetTextCursor {
                    pos: Point {
                        x: Pt(margin_pt),
                        y: Pt(y_pt),
                    },
                });
                ops.push(Op::SetFontSizeBuiltinFont {
                    size: Pt(font_size_pt),
                    font: BuiltinFont::Helvetica,
                });
                ops.push(Op::WriteTextBuiltinFont {
                    items: vec![TextItem::Text(line.clone())],
                    font: BuiltinFont::Helvetica,
                });
                ops.push(Op::EndTextSection);
            }
            pages.push(PdfPage::new(page_w, page_h, ops));
        }

        // Zero lines still produce a single blank page.
        if pages.is_empty() {
            pages.push(PdfPage::new(page_w, page_h, Vec::new()));
        }

        debug!(lines = lines.len(), pages = pages.len(), "layout complete");

        doc.with_pages(pages);
        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        Ok(doc.save(&PdfSaveOptions::default(), &mut warnings))
    }
}

// -- Text wrapping ------------------------------------------------------------

/// Wrap a multi-line string so that no line exceeds `max_width` characters.
///
/// Splits on existing newlines first, then word-wraps within each paragraph.
/// Words longer than `max_width` are force-broken.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut result = Vec::new();

    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            result.push(String::new());
            continue;
        }

        let mut current = String::with_capacity(max_width);
        for word in words {
            if word.len() > max_width {
                if !current.is_empty() {
                    result.push(std::mem::take(&mut current));
                }
                let mut remaining = word;
                while remaining.len() > max_width {
                    let (chunk, rest) = remaining.split_at(max_width);
                    result.push(chunk.to_string());
                    remaining = rest;
                }
                current.push_str(remaining);
            } else if current.is_empty() {
                current.push_str(word);
            } else if current.len() + 1 + word.len() <= max_width {
                current.push(' ');
                current.push_str(word);
            } else {
                result.push(std::mem::take(&mut current));
                current.push_str(word);
            }
        }
        if !current.is_empty() {
            result.push(current);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use blattwerk_document::PdfReader;

    #[test]
    fn wrap_respects_width() {
        let lines = wrap_text("the quick brown fox jumps over the lazy dog", 15);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.len() <= 15));
        assert_eq!(
            lines.join(" "),
            "the quick brown fox jumps over the lazy dog"
        );
    }

    #[test]
    fn wrap_breaks_oversized_words() {
        let lines = wrap_text("antidisestablishmentarianism", 10);
        assert!(lines.len() >= 3);
        assert_eq!(lines.concat(), "antidisestablishmentarianism");
    }

    #[test]
    fn wrap_keeps_blank_paragraphs() {
        let lines = wrap_text("one\n\ntwo", 20);
        assert_eq!(lines, vec!["one", "", "two"]);
    }

    #[test]
    fn rendered_output_is_a_valid_pdf() {
        let renderer = TextPdfRenderer::a4();
        let bytes = renderer.render("Hello from the renderer").expect("render");
        let reader = PdfReader::from_bytes(&bytes, None).expect("parse");
        assert_eq!(reader.page_count(), 1);
    }

    #[test]
    fn long_text_breaks_across_pages() {
        let renderer = TextPdfRenderer::new(PaperSize::A4, Orientation::Portrait);
        let text = "lorem ipsum dolor sit amet\n".repeat(200);
        let bytes = renderer.render(&text).expect("render");
        let reader = PdfReader::from_bytes(&bytes, None).expect("parse");
        assert!(reader.page_count() > 1);
    }

    #[test]
    fn empty_text_still_yields_one_page() {
        let renderer = TextPdfRenderer::new(PaperSize::Letter, Orientation::Landscape);
        let bytes = renderer.render("").expect("render");
        let reader = PdfReader::from_bytes(&bytes, None).expect("parse");
        assert_eq!(reader.page_count(), 1);
    }
}
