//! Per-style formatting rules and body layout strategies.
//!
//! Each [`ContentStyle`] has exactly one entry in the strategy table,
//! located by the variant's discriminant. Adding a style means adding a
//! variant and its table entry; the table test catches a missing one.

use crate::types::{ContentStyle, SlideBody};

/// A paragraph of body text ready to be written into a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyParagraph {
    pub text: String,
    pub bulleted: bool,
}

impl BodyParagraph {
    pub fn bullet(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bulleted: true,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bulleted: false,
        }
    }
}

/// Formatting limits that depend on the content style.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleRules {
    /// Titles longer than this are truncated with a marker.
    pub title_max_chars: usize,
    /// Title font size in points.
    pub title_font_pt: f32,
    /// Body font size in points before any overflow shrinking.
    pub body_font_pt: f32,
    /// Glyph used for bulleted paragraphs.
    pub bullet_char: char,
}

/// Formatting rules plus the body layout function for one style.
pub struct StyleStrategy {
    pub style: ContentStyle,
    pub rules: StyleRules,
    layout: fn(&SlideBody) -> Vec<BodyParagraph>,
}

impl StyleStrategy {
    /// Lay out a slide body as paragraphs. Empty text is dropped.
    pub fn layout_body(&self, body: &SlideBody) -> Vec<BodyParagraph> {
        (self.layout)(body)
    }
}

static STRATEGIES: [StyleStrategy; 3] = [
    StyleStrategy {
        style: ContentStyle::Bullets,
        rules: StyleRules {
            title_max_chars: 60,
            title_font_pt: 32.0,
            body_font_pt: 22.0,
            bullet_char: '•',
        },
        layout: layout_bullets,
    },
    StyleStrategy {
        style: ContentStyle::Paragraph,
        rules: StyleRules {
            title_max_chars: 70,
            title_font_pt: 32.0,
            body_font_pt: 20.0,
            bullet_char: '•',
        },
        layout: layout_paragraph,
    },
    StyleStrategy {
        style: ContentStyle::Mixed,
        rules: StyleRules {
            title_max_chars: 70,
            title_font_pt: 30.0,
            body_font_pt: 20.0,
            bullet_char: '•',
        },
        layout: layout_mixed,
    },
];

/// Look up the strategy for a style.
pub fn strategy_for(style: ContentStyle) -> &'static StyleStrategy {
    &STRATEGIES[style as usize]
}

fn non_empty_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}

fn layout_bullets(body: &SlideBody) -> Vec<BodyParagraph> {
    match body {
        SlideBody::Bullets(items) => items
            .iter()
            .map(|i| i.trim())
            .filter(|i| !i.is_empty())
            .map(BodyParagraph::bullet)
            .collect(),
        SlideBody::Paragraph(text) => non_empty_lines(text).map(BodyParagraph::bullet).collect(),
    }
}

fn layout_paragraph(body: &SlideBody) -> Vec<BodyParagraph> {
    let joined = match body {
        SlideBody::Bullets(items) => items
            .iter()
            .map(|i| i.trim())
            .filter(|i| !i.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        SlideBody::Paragraph(text) => non_empty_lines(text).collect::<Vec<_>>().join(" "),
    };

    if joined.is_empty() {
        Vec::new()
    } else {
        vec![BodyParagraph::plain(joined)]
    }
}

fn layout_mixed(body: &SlideBody) -> Vec<BodyParagraph> {
    match body {
        SlideBody::Bullets(items) if items.iter().any(|i| !i.trim().is_empty()) => {
            layout_bullets(body)
        }
        _ => layout_paragraph(body),
    }
}
