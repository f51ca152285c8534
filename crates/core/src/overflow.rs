//! Overflow handling for body text.
//!
//! Capacity is estimated from the text frame size and the font size using
//! an average glyph width of half an em and a line height of 1.2 em.
//!
//! The default policy is [`OverflowPolicy::Shrink`]: the font is reduced
//! in 5% steps down to 60% of the style's base size. Text that still does
//! not fit at 60% is cut and ends with [`TRUNCATION_MARKER`], so content
//! is never lost without a visible signal.

use crate::style::BodyParagraph;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Appended wherever text was cut.
pub const TRUNCATION_MARKER: char = '…';

/// Smallest font scale, in percent, the shrink policy goes down to.
pub const MIN_FONT_SCALE_PERCENT: u32 = 60;

const SCALE_STEP_PERCENT: u32 = 5;

/// English Metric Units per point.
const EMU_PER_PT: f32 = 12_700.0;

/// Default text insets: 0.1" left/right, 0.05" top/bottom.
const INSET_X_EMU: i64 = 91_440 * 2;
const INSET_Y_EMU: i64 = 45_720 * 2;

/// Left margin taken by a bullet and its hanging indent.
pub const BULLET_INDENT_EMU: i64 = 342_900;

/// What to do when body text exceeds the estimated capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Reduce the font size within the bounded range, then truncate.
    #[default]
    Shrink,
    /// Keep the base font size and truncate.
    Truncate,
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "shrink" => Ok(Self::Shrink),
            "truncate" => Ok(Self::Truncate),
            other => Err(format!("unknown overflow policy: {}", other)),
        }
    }
}

/// Size of a text frame in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextFrame {
    pub width_emu: i64,
    pub height_emu: i64,
}

impl TextFrame {
    pub fn new(width_emu: i64, height_emu: i64) -> Self {
        Self {
            width_emu,
            height_emu,
        }
    }

    fn chars_per_line(&self, font_pt: f32, bulleted: bool) -> usize {
        let indent = if bulleted { BULLET_INDENT_EMU } else { 0 };
        let usable = (self.width_emu - INSET_X_EMU - indent).max(0) as f32 / EMU_PER_PT;
        ((usable / (font_pt * 0.5)).floor() as usize).max(1)
    }

    fn line_capacity(&self, font_pt: f32) -> usize {
        let usable = (self.height_emu - INSET_Y_EMU).max(0) as f32 / EMU_PER_PT;
        ((usable / (font_pt * 1.2)).floor() as usize).max(1)
    }

    fn lines_needed(&self, paragraphs: &[BodyParagraph], font_pt: f32) -> usize {
        paragraphs
            .iter()
            .map(|p| {
                let cpl = self.chars_per_line(font_pt, p.bulleted);
                p.text.chars().count().div_ceil(cpl).max(1)
            })
            .sum()
    }

    /// True if the paragraphs are estimated to fit at the given font size.
    pub fn fits(&self, paragraphs: &[BodyParagraph], font_pt: f32) -> bool {
        self.lines_needed(paragraphs, font_pt) <= self.line_capacity(font_pt)
    }
}

/// Body text after the overflow policy has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedBody {
    pub paragraphs: Vec<BodyParagraph>,
    /// Font size to write, in points.
    pub font_pt: f32,
    /// Applied scale in percent (100 when unchanged).
    pub scale_percent: u32,
    /// True if any text was cut.
    pub truncated: bool,
}

/// Apply the overflow policy to laid-out body paragraphs.
pub fn fit_body(
    paragraphs: Vec<BodyParagraph>,
    frame: TextFrame,
    base_font_pt: f32,
    policy: OverflowPolicy,
) -> FittedBody {
    let mut scale_percent = 100;

    if policy == OverflowPolicy::Shrink {
        while scale_percent > MIN_FONT_SCALE_PERCENT
            && !frame.fits(&paragraphs, scaled(base_font_pt, scale_percent))
        {
            scale_percent -= SCALE_STEP_PERCENT;
        }
    }

    let font_pt = scaled(base_font_pt, scale_percent);
    if frame.fits(&paragraphs, font_pt) {
        return FittedBody {
            paragraphs,
            font_pt,
            scale_percent,
            truncated: false,
        };
    }

    FittedBody {
        paragraphs: truncate_paragraphs(paragraphs, frame, font_pt),
        font_pt,
        scale_percent,
        truncated: true,
    }
}

fn scaled(base: f32, percent: u32) -> f32 {
    // Round to half points, the granularity PowerPoint shows.
    (base * percent as f32 / 100.0 * 2.0).round() / 2.0
}

fn truncate_paragraphs(
    paragraphs: Vec<BodyParagraph>,
    frame: TextFrame,
    font_pt: f32,
) -> Vec<BodyParagraph> {
    let mut remaining = frame.line_capacity(font_pt);
    let mut kept: Vec<BodyParagraph> = Vec::new();

    for mut paragraph in paragraphs {
        if remaining == 0 {
            if let Some(last) = kept.last_mut() {
                last.text = append_marker(&last.text);
            }
            break;
        }

        let cpl = frame.chars_per_line(font_pt, paragraph.bulleted);
        let needed = paragraph.text.chars().count().div_ceil(cpl).max(1);
        if needed <= remaining {
            remaining -= needed;
            kept.push(paragraph);
            continue;
        }

        paragraph.text = truncate_with_marker(&paragraph.text, remaining * cpl);
        kept.push(paragraph);
        break;
    }

    kept
}

fn append_marker(text: &str) -> String {
    let mut out = text.trim_end().to_string();
    out.push(TRUNCATION_MARKER);
    out
}

/// Cut text to at most `max_chars` characters, preferring a word boundary,
/// and end it with [`TRUNCATION_MARKER`]. Text that fits is returned as is;
/// a zero limit gives an empty string.
pub fn truncate_with_marker(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }

    let keep = max_chars - 1;
    let head: String = text.chars().take(keep).collect();

    // Back off to the last space unless that would drop more than half.
    let ends_on_word = text.chars().nth(keep).map_or(true, char::is_whitespace);
    let cut = match head.rfind(char::is_whitespace) {
        _ if ends_on_word => head.as_str(),
        Some(pos) if head[..pos].chars().count() * 2 >= keep => &head[..pos],
        _ => head.as_str(),
    };

    append_marker(cut)
}
