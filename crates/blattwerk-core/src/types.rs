// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Blattwerk PDF workbench.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BlattwerkError, Result};

/// Unique identifier for a browser/CLI session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which pages a rotation applies to.
///
/// Parsed from the user syntax `"1,3,5-7"` (1-indexed, ranges inclusive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelector {
    /// Every page of the document.
    All,
    /// An explicit, sorted, de-duplicated set of 1-indexed page numbers.
    Pages(Vec<u32>),
}

impl PageSelector {
    /// Parse user input into a selector.
    ///
    /// Accepts comma-separated single numbers and inclusive ranges. Empty
    /// segments, dangling dashes, non-numeric parts, page 0, and descending
    /// ranges are all rejected — malformed input must surface as an error
    /// rather than silently selecting nothing.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return if trimmed.is_empty() {
                Err(BlattwerkError::Selector("empty selector".into()))
            } else {
                Ok(Self::All)
            };
        }

        let mut pages = Vec::new();
        for part in trimmed.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(BlattwerkError::Selector(format!(
                    "empty segment in '{trimmed}'"
                )));
            }

            if let Some((start_str, end_str)) = part.split_once('-') {
                let start = parse_page_number(start_str)?;
                let end = parse_page_number(end_str)?;
                if start > end {
                    return Err(BlattwerkError::Selector(format!(
                        "descending range '{part}'"
                    )));
                }
                pages.extend(start..=end);
            } else {
                pages.push(parse_page_number(part)?);
            }
        }

        pages.sort_unstable();
        pages.dedup();
        Ok(Self::Pages(pages))
    }

    /// Whether the given 1-indexed page number is selected.
    pub fn contains(&self, page: u32) -> bool {
        match self {
            Self::All => true,
            Self::Pages(pages) => pages.binary_search(&page).is_ok(),
        }
    }
}

fn parse_page_number(raw: &str) -> Result<u32> {
    let raw = raw.trim();
    let page: u32 = raw
        .parse()
        .map_err(|_| BlattwerkError::Selector(format!("invalid page number '{raw}'")))?;
    if page == 0 {
        return Err(BlattwerkError::Selector(
            "page 0 is invalid (pages start at 1)".into(),
        ));
    }
    Ok(page)
}

/// Parse a merge-order string like `"2,1,3"` into 0-indexed positions.
///
/// The input must be a permutation of `1..=count` — the user reorders the
/// uploaded set, they cannot drop or duplicate entries.
pub fn parse_merge_order(input: &str, count: usize) -> Result<Vec<usize>> {
    let mut order = Vec::with_capacity(count);
    for part in input.split(',') {
        let part = part.trim();
        let position: usize = part
            .parse()
            .map_err(|_| BlattwerkError::Selector(format!("invalid position '{part}'")))?;
        if position == 0 || position > count {
            return Err(BlattwerkError::Selector(format!(
                "position {position} outside 1-{count}"
            )));
        }
        order.push(position - 1);
    }

    let mut seen = order.clone();
    seen.sort_unstable();
    seen.dedup();
    if seen.len() != count {
        return Err(BlattwerkError::Selector(format!(
            "order must be a permutation of 1-{count}"
        )));
    }

    Ok(order)
}

/// Rotation applied to selected pages. Only quarter turns are meaningful for
/// the page `/Rotate` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationAngle {
    Quarter,
    Half,
    ThreeQuarter,
}

impl RotationAngle {
    pub fn degrees(&self) -> i32 {
        match self {
            Self::Quarter => 90,
            Self::Half => 180,
            Self::ThreeQuarter => 270,
        }
    }
}

impl TryFrom<u32> for RotationAngle {
    type Error = BlattwerkError;

    fn try_from(degrees: u32) -> Result<Self> {
        match degrees {
            90 => Ok(Self::Quarter),
            180 => Ok(Self::Half),
            270 => Ok(Self::ThreeQuarter),
            other => Err(BlattwerkError::Parameter(format!(
                "rotation must be 90, 180, or 270 degrees, got {other}"
            ))),
        }
    }
}

/// An RGB colour as produced by the UI colour picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const GRAY: Self = Self {
        r: 128,
        g: 128,
        b: 128,
    };

    /// Parse a `#rrggbb` hex string (leading `#` optional).
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BlattwerkError::Parameter(format!(
                "invalid colour '{hex}', expected #rrggbb"
            )));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).unwrap_or(0)
        };
        Ok(Self {
            r: channel(0..2),
            g: channel(2..4),
            b: channel(4..6),
        })
    }
}

/// Parameters for a tiled text watermark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextWatermarkOptions {
    pub text: String,
    pub font_size: f32,
    /// Fill opacity in (0, 1].
    pub opacity: f32,
    /// Per-glyph rotation in degrees (each tile rotates around its own
    /// anchor, not the canvas).
    pub angle_degrees: f32,
    pub color: RgbColor,
}

impl TextWatermarkOptions {
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(BlattwerkError::Parameter(
                "watermark text must not be empty".into(),
            ));
        }
        Ok(Self {
            text,
            font_size: 40.0,
            opacity: 0.3,
            angle_degrees: 45.0,
            color: RgbColor::GRAY,
        })
    }

    pub fn with_font_size(mut self, font_size: f32) -> Result<Self> {
        if font_size <= 0.0 {
            return Err(BlattwerkError::Parameter(format!(
                "font size must be positive, got {font_size}"
            )));
        }
        self.font_size = font_size;
        Ok(self)
    }

    pub fn with_opacity(mut self, opacity: f32) -> Result<Self> {
        self.opacity = validate_unit_interval("opacity", opacity)?;
        Ok(self)
    }

    pub fn with_angle(mut self, angle_degrees: f32) -> Self {
        self.angle_degrees = angle_degrees;
        self
    }

    pub fn with_color(mut self, color: RgbColor) -> Self {
        self.color = color;
        self
    }
}

/// Parameters for a tiled image watermark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageWatermarkOptions {
    /// Scale applied to the source image's pixel dimensions, in (0, 1].
    pub scale: f32,
    /// Fill opacity in (0, 1].
    pub opacity: f32,
}

impl ImageWatermarkOptions {
    pub fn new(scale: f32, opacity: f32) -> Result<Self> {
        Ok(Self {
            scale: validate_unit_interval("scale", scale)?,
            opacity: validate_unit_interval("opacity", opacity)?,
        })
    }
}

fn validate_unit_interval(name: &str, value: f32) -> Result<f32> {
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(BlattwerkError::Parameter(format!(
            "{name} must be in (0, 1], got {value}"
        )))
    }
}

/// Image-format filter for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageKind {
    Jpeg,
    Png,
    All,
}

impl ImageKind {
    /// Whether this filter accepts the given file extension.
    pub fn accepts(&self, extension: &str) -> bool {
        let ext = extension.to_ascii_lowercase();
        match self {
            Self::Jpeg => matches!(ext.as_str(), "jpeg" | "jpg"),
            Self::Png => ext == "png",
            Self::All => matches!(ext.as_str(), "jpeg" | "jpg" | "png"),
        }
    }
}

impl std::str::FromStr for ImageKind {
    type Err = BlattwerkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "all" => Ok(Self::All),
            other => Err(BlattwerkError::Parameter(format!(
                "unknown image kind '{other}', expected jpeg, png, or all"
            ))),
        }
    }
}

/// Standard paper sizes offered by the converters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    Letter,
    Legal,
}

impl PaperSize {
    /// Dimensions in millimetres (width, height), portrait.
    pub fn dimensions_mm(&self) -> (f32, f32) {
        match self {
            Self::A4 => (210.0, 297.0),
            Self::Letter => (215.9, 279.4),
            Self::Legal => (215.9, 355.6),
        }
    }

    /// Dimensions in PDF points (width, height), portrait. 1 pt = 1/72 in.
    pub fn dimensions_pt(&self) -> (f32, f32) {
        match self {
            Self::A4 => (595.0, 842.0),
            Self::Letter => (612.0, 792.0),
            Self::Legal => (612.0, 1008.0),
        }
    }
}

/// Page orientation for rendered documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    /// Apply the orientation to portrait dimensions.
    pub fn apply(&self, (w, h): (f32, f32)) -> (f32, f32) {
        match self {
            Self::Portrait => (w, h),
            Self::Landscape => (h, w),
        }
    }
}

/// Derive the download filename for an operation output.
///
/// `{stem}_{tag}.{ext}` — `.docx` for the Word-conversion tag, `.pdf` for
/// everything else.
pub fn derived_filename(original: &str, tag: &str) -> String {
    let stem = std::path::Path::new(original)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    let ext = if tag == "converted" { "docx" } else { "pdf" };
    format!("{stem}_{tag}.{ext}")
}
