//! Domain types for slide content and template selection.

use crate::error::InputError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the body of each slide is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStyle {
    /// One bullet per point.
    Bullets,
    /// A single flowing block of text.
    Paragraph,
    /// Bullets when the slide has points, otherwise a paragraph.
    Mixed,
}

impl ContentStyle {
    /// All styles, in declaration order.
    pub const ALL: [ContentStyle; 3] = [Self::Bullets, Self::Paragraph, Self::Mixed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bullets => "bullets",
            Self::Paragraph => "paragraph",
            Self::Mixed => "mixed",
        }
    }
}

impl fmt::Display for ContentStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStyle {
    type Err = String;

    /// Accepts the short names as well as the carousel type labels
    /// shown in the content generator ("3-4 bullet points", ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bullets" | "bullet" | "3-4 bullet points" => Ok(Self::Bullets),
            "paragraph" | "paragraphs" | "2 paragraphs" => Ok(Self::Paragraph),
            "mixed" | "1 paragraph + 3-4 bullet points" => Ok(Self::Mixed),
            other => Err(format!("unknown content style: {}", other)),
        }
    }
}

/// Body of a slide: either a list of points or a paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlideBody {
    Bullets(Vec<String>),
    Paragraph(String),
}

impl SlideBody {
    /// True if the body carries no text at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Bullets(items) => items.iter().all(|i| i.trim().is_empty()),
            Self::Paragraph(text) => text.trim().is_empty(),
        }
    }
}

/// Canonical content record for one slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideContent {
    pub title: String,
    pub body: SlideBody,
    pub style_tag: ContentStyle,
    /// 0-based position in the deck.
    pub index: usize,
}

impl SlideContent {
    pub fn new(index: usize, title: impl Into<String>, body: SlideBody, style: ContentStyle) -> Self {
        Self {
            title: title.into(),
            body,
            style_tag: style,
            index,
        }
    }

    /// Minimal stand-in for a section that could not be read.
    pub fn placeholder(index: usize, style: ContentStyle) -> Self {
        Self::new(
            index,
            format!("Slide {}", index + 1),
            SlideBody::Paragraph(String::new()),
            style,
        )
    }
}

/// Ordered slide content for one generation request. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deck {
    slides: Vec<SlideContent>,
}

impl Deck {
    /// Build a deck, rejecting an empty slide list.
    pub fn new(slides: Vec<SlideContent>) -> Result<Self, InputError> {
        if slides.is_empty() {
            return Err(InputError::EmptyContent);
        }
        Ok(Self { slides })
    }

    pub fn slides(&self) -> &[SlideContent] {
        &self.slides
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SlideContent> {
        self.slides.iter()
    }
}

impl<'a> IntoIterator for &'a Deck {
    type Item = &'a SlideContent;
    type IntoIter = std::slice::Iter<'a, SlideContent>;

    fn into_iter(self) -> Self::IntoIter {
        self.slides.iter()
    }
}

/// Role a template shape plays when content is written into a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlaceholderRole {
    Title,
    Body,
    Image,
    Footer,
}

/// Language of the generated content and of the built-in templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    English,
    SpanishHonduras,
}

impl Language {
    pub const ALL: [Language; 2] = [Self::English, Self::SpanishHonduras];

    /// Short code used in template ids.
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::SpanishHonduras => "es-hn",
        }
    }

    /// BCP 47 tag written on text runs.
    pub fn lang_tag(&self) -> &'static str {
        match self {
            Self::English => "en-US",
            Self::SpanishHonduras => "es-HN",
        }
    }

    /// Phrase used when asking the content source for this language.
    pub fn prompt_phrase(&self) -> &'static str {
        match self {
            Self::English => "in English",
            Self::SpanishHonduras => "in Spanish, using the dialect from Honduras",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "en-us" | "english" => Ok(Self::English),
            "es" | "es-hn" | "spanish" | "spanish (honduras)" => Ok(Self::SpanishHonduras),
            other => Err(format!("unsupported language: {}", other)),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Color scheme of a built-in template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorVariant {
    Light,
    Dark,
    Ocean,
}

impl ColorVariant {
    pub const ALL: [ColorVariant; 3] = [Self::Light, Self::Dark, Self::Ocean];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::Ocean => "ocean",
        }
    }
}

impl FromStr for ColorVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "ocean" => Ok(Self::Ocean),
            other => Err(format!("unknown color variant: {}", other)),
        }
    }
}

impl fmt::Display for ColorVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies which template a deck is assembled onto.
#[derive(Debug, Clone)]
pub enum TemplateSelector {
    /// One of the templates shipped with the application.
    BuiltIn {
        language: Language,
        color_variant: ColorVariant,
    },
    /// A template uploaded with the request.
    Uploaded {
        filename: String,
        language: Language,
        bytes: Vec<u8>,
    },
}

impl TemplateSelector {
    pub fn built_in(language: Language, color_variant: ColorVariant) -> Self {
        Self::BuiltIn {
            language,
            color_variant,
        }
    }

    pub fn uploaded(filename: impl Into<String>, language: Language, bytes: Vec<u8>) -> Self {
        Self::Uploaded {
            filename: filename.into(),
            language,
            bytes,
        }
    }

    /// Parse a built-in template id such as `en-light` or `es-hn-ocean`.
    pub fn from_builtin_id(id: &str) -> Option<Self> {
        let (lang, color) = id.trim().rsplit_once('-')?;
        Some(Self::built_in(lang.parse().ok()?, color.parse().ok()?))
    }

    pub fn language(&self) -> Language {
        match self {
            Self::BuiltIn { language, .. } | Self::Uploaded { language, .. } => *language,
        }
    }
}

/// Detect a ZIP container (the PPTX wrapper) from its magic bytes.
pub fn has_zip_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04])
}
