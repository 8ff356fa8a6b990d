// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// URL → PDF conversion: fetch the page, strip it down to its text, lay the
// text out as a PDF.
//
// The fetch is async internally but exposed through a synchronous wrapper
// that blocks the caller until completion — one call, one fetch, no
// concurrency. The total wait is bounded by the configured timeout and
// surfaces as `Timeout` rather than hanging.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use lol_html::{HtmlRewriter, Settings, element, text};
use tracing::{debug, info, instrument, warn};

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::{Orientation, PaperSize};

use crate::render::TextPdfRenderer;
use crate::write_atomic;

/// Presenting as a browser avoids the trivial bot walls that block default
/// client UAs.
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Page geometry for the rendered PDF.
#[derive(Debug, Clone, Copy)]
pub struct PageSetup {
    pub paper_size: PaperSize,
    pub orientation: Orientation,
}

impl Default for PageSetup {
    fn default() -> Self {
        Self {
            paper_size: PaperSize::A4,
            orientation: Orientation::Portrait,
        }
    }
}

/// Fetches a web page and renders its text content as a PDF.
pub struct UrlToPdfConverter {
    timeout: Duration,
    setup: PageSetup,
}

impl UrlToPdfConverter {
    pub fn new(timeout_secs: u64, setup: PageSetup) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            setup,
        }
    }

    /// Synchronous wrapper: blocks on a private current-thread runtime until
    /// the conversion finishes or times out.
    pub fn convert(&self, url: &str, out_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.convert_async(url, out_dir.as_ref()))
    }

    /// Fetch `url` and write `converted_{timestamp}.pdf` into `out_dir`.
    #[instrument(skip(self), fields(url))]
    pub async fn convert_async(&self, url: &str, out_dir: &Path) -> Result<PathBuf> {
        let html = self.fetch(url).await?;
        let text = html_to_text(&html);
        debug!(html_len = html.len(), text_len = text.len(), "page text extracted");

        let mut renderer = TextPdfRenderer::new(self.setup.paper_size, self.setup.orientation);
        renderer.set_title(url);
        let pdf = renderer.render(&text)?;

        let path = out_dir.join(format!("converted_{}.pdf", Utc::now().timestamp()));
        let written = write_atomic(&path, &pdf)?;
        info!(path = %written.display(), "URL converted");
        Ok(written)
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(BROWSER_UA)
            .build()
            .map_err(|err| BlattwerkError::Fetch(format!("building HTTP client: {err}")))?;

        let response = client.get(url).send().await.map_err(classify_fetch_error)?;
        let response = response.error_for_status().map_err(classify_fetch_error)?;
        response.text().await.map_err(classify_fetch_error)
    }
}

fn classify_fetch_error(err: reqwest::Error) -> BlattwerkError {
    if err.is_timeout() {
        BlattwerkError::Timeout(err.to_string())
    } else {
        BlattwerkError::Fetch(err.to_string())
    }
}

// -- HTML cleanup -------------------------------------------------------------

/// Reduce an HTML document to its readable text: drop `script`, `style`, and
/// `noscript` subtrees, collect the remaining text nodes, decode entities,
/// and normalise whitespace per line.
fn html_to_text(html: &str) -> String {
    let mut chunks: Vec<String> = Vec::new();

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("script, style, noscript", |el| {
                    el.remove();
                    Ok(())
                }),
                text!("*", |t| {
                    let piece = t.as_str();
                    if !piece.trim().is_empty() {
                        chunks.push(piece.to_string());
                    }
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |_: &[u8]| {},
    );

    let mut parsed = rewriter.write(html.as_bytes()).is_ok();
    parsed = rewriter.end().is_ok() && parsed;
    if !parsed {
        // Keep whatever was collected before the parser gave up.
        warn!("HTML could not be fully parsed, rendering partial text");
    }

    chunks
        .iter()
        .map(|chunk| {
            let decoded = html_escape::decode_html_entities(chunk);
            decoded.split_whitespace().collect::<Vec<_>>().join(" ")
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_and_styles_are_dropped() {
        let html = "<html><head><style>body { color: red }</style></head>\
                    <body><script>alert('x')</script><p>Visible text</p></body></html>";
        let text = html_to_text(html);
        assert!(text.contains("Visible text"));
        assert!(!text.contains("alert"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn entities_are_decoded_and_whitespace_collapsed() {
        let html = "<p>fish &amp; chips</p><p>a \n\t  b</p>";
        let text = html_to_text(html);
        assert!(text.contains("fish & chips"));
        assert!(text.contains("a b"));
    }

    #[test]
    fn empty_page_yields_empty_text() {
        assert!(html_to_text("<html><body></body></html>").is_empty());
    }

    #[test]
    fn invalid_url_fails_with_fetch_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let converter = UrlToPdfConverter::new(2, PageSetup::default());
        let result = converter.convert("not a url", tmp.path());
        assert!(matches!(
            result,
            Err(BlattwerkError::Fetch(_) | BlattwerkError::Timeout(_))
        ));
    }
}
