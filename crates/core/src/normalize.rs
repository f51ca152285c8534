//! Content normalization for generated slide text.
//!
//! Turns the structured text returned by the content source into a
//! [`Deck`]. JSON (`{"slides": [{"title": .., "points": [..]}]}` or a bare
//! array of sections) is preferred; anything that is not JSON is read as
//! markdown-like text where headings or blank lines separate sections.
//!
//! Sections that are only partly usable are repaired and reported; a
//! section that cannot be read at all is replaced with a placeholder slide
//! so the slide count is preserved.

use crate::error::InputError;
use crate::types::{ContentStyle, Deck, SlideBody, SlideContent};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Regex to collapse runs of spaces and tabs into one.
static WHITESPACE_COLLAPSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{00A0}]+").unwrap());

/// Leading list markers: dashes, stars, bullet glyphs, "1." and "1)".
static LIST_MARKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•·▪◦‣–]|\d{1,2}[.)])\s+").unwrap());

/// Markdown heading marks and "Slide 3:" style prefixes on titles.
static TITLE_PREFIX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:#{1,6}\s*)?(?:(?:slide|diapositiva)\s*\d+\s*[:.\-–]\s*)?").unwrap()
});

/// Markdown heading line, used to split plain-text sections.
static HEADING_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*#{1,6}\s+\S").unwrap());

/// First fenced code block of the response (```json ... ```), wherever
/// it appears.
static CODE_FENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[a-zA-Z]*[ \t]*\r?\n(.*?)\r?\n?[ \t]*```").unwrap());

const TITLE_KEYS: &[&str] = &["title", "heading", "header"];
const BULLET_KEYS: &[&str] = &["points", "bullets", "items"];
const PARAGRAPH_KEYS: &[&str] = &["paragraph", "text", "body", "content"];

/// Output of normalization: the deck plus any recovered problems.
#[derive(Debug, Clone)]
pub struct NormalizedDeck {
    pub deck: Deck,
    /// One [`InputError::MalformedSection`] per repaired or replaced section.
    pub issues: Vec<InputError>,
}

/// Fields pulled out of one section before it becomes a slide.
#[derive(Debug, Default)]
struct RawSection {
    title: Option<String>,
    bullets: Vec<String>,
    paragraph: Option<String>,
}

/// Normalizer for generated slide content.
#[derive(Debug, Clone)]
pub struct ContentNormalizer {
    /// Upper bound on the number of slides kept.
    max_slides: Option<usize>,
}

impl Default for ContentNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentNormalizer {
    pub fn new() -> Self {
        Self { max_slides: None }
    }

    /// Keep at most `max` sections; extra sections are dropped with a warning.
    pub fn with_max_slides(mut self, max: usize) -> Self {
        self.max_slides = Some(max.max(1));
        self
    }

    /// Normalize raw generated text into a deck tagged with `style`.
    pub fn normalize(&self, raw: &str, style: ContentStyle) -> Result<NormalizedDeck, InputError> {
        let raw = strip_code_fence(raw);
        if raw.trim().is_empty() {
            return Err(InputError::EmptyContent);
        }

        let mut sections = match parse_json(raw) {
            Some(value) => json_sections(value),
            None => {
                log::debug!("Content is not JSON, reading as plain text");
                text_sections(raw).into_iter().map(Ok).collect()
            }
        };

        if let Some(max) = self.max_slides {
            if sections.len() > max {
                log::warn!("Dropping {} sections beyond the limit of {}", sections.len() - max, max);
                sections.truncate(max);
            }
        }

        if sections.is_empty() {
            return Err(InputError::EmptyContent);
        }

        let total = sections.len();
        let mut slides = Vec::with_capacity(total);
        let mut issues = Vec::new();
        let mut recovered = 0;

        for (index, section) in sections.into_iter().enumerate() {
            match section.map(|raw| build_slide(index, raw, style)) {
                Ok((slide, None)) => {
                    recovered += 1;
                    slides.push(slide);
                }
                Ok((slide, Some(reason))) => {
                    log::warn!("Repaired slide section {}: {}", index, reason);
                    recovered += 1;
                    slides.push(slide);
                    issues.push(InputError::MalformedSection { index, reason });
                }
                Err(reason) => {
                    log::warn!("Replacing unreadable slide section {}: {}", index, reason);
                    slides.push(SlideContent::placeholder(index, style));
                    issues.push(InputError::MalformedSection { index, reason });
                }
            }
        }

        if recovered == 0 {
            return Err(match issues.pop() {
                Some(only @ InputError::MalformedSection { .. }) if total == 1 => only,
                _ => InputError::EmptyContent,
            });
        }

        log::info!(
            "Normalized {} slides ({} repaired or replaced)",
            slides.len(),
            issues.len()
        );

        Ok(NormalizedDeck {
            deck: Deck::new(slides)?,
            issues,
        })
    }
}

fn strip_code_fence(raw: &str) -> &str {
    match CODE_FENCE_REGEX.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw,
    }
}

/// The content as JSON, or the first object (or array of objects) embedded
/// in surrounding prose.
fn parse_json(raw: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return Some(value);
    }

    let embedded = raw
        .match_indices(['{', '['])
        .filter_map(|(start, _)| balanced_span(&raw[start..]))
        .filter_map(|span| serde_json::from_str::<Value>(span).ok())
        .find(|value| match value {
            Value::Object(_) => true,
            Value::Array(items) => items.iter().any(Value::is_object),
            _ => false,
        })?;

    log::debug!("Using JSON embedded in surrounding text");
    Some(embedded)
}

/// Prefix of `text` from its opening `{` or `[` to the matching close,
/// skipping brackets inside strings.
fn balanced_span(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

fn json_sections(value: Value) -> Vec<Result<RawSection, String>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("slides") {
            Some(Value::Array(items)) => items,
            Some(other) => vec![other],
            None => vec![Value::Object(map)],
        },
        other => vec![other],
    };

    items.into_iter().map(json_section).collect()
}

fn json_section(value: Value) -> Result<RawSection, String> {
    match value {
        Value::Object(map) => {
            let mut section = RawSection::default();

            section.title = TITLE_KEYS
                .iter()
                .filter_map(|k| map.get(*k))
                .find_map(|v| v.as_str().map(clean_title))
                .filter(|t| !t.is_empty());

            for key in BULLET_KEYS.iter().chain(PARAGRAPH_KEYS) {
                match map.get(*key) {
                    Some(Value::Array(items)) if section.bullets.is_empty() => {
                        section.bullets = items
                            .iter()
                            .filter_map(scalar_text)
                            .map(|s| clean_point(&s))
                            .filter(|s| !s.is_empty())
                            .collect();
                    }
                    Some(Value::String(text)) if section.paragraph.is_none() => {
                        let text = clean_text(text);
                        if !text.is_empty() {
                            section.paragraph = Some(text);
                        }
                    }
                    _ => {}
                }
            }

            if section.title.is_none() && section.bullets.is_empty() && section.paragraph.is_none() {
                return Err("section has neither a title nor body text".to_string());
            }
            Ok(section)
        }
        Value::String(text) => {
            let title = clean_title(&text);
            if title.is_empty() {
                return Err("section is an empty string".to_string());
            }
            Ok(RawSection {
                title: Some(title),
                ..RawSection::default()
            })
        }
        Value::Null => Err("section is null".to_string()),
        Value::Bool(_) | Value::Number(_) => Err(format!("section is a bare value: {}", value)),
        Value::Array(_) => Err("section is a nested list".to_string()),
    }
}

/// Text of a scalar list item; nested structures are skipped.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_sections(raw: &str) -> Vec<RawSection> {
    let normalized = raw.replace("\r\n", "\n");
    let lines: Vec<&str> = normalized.lines().collect();
    let by_heading = lines.iter().any(|l| HEADING_REGEX.is_match(l));

    let mut blocks: Vec<Vec<&str>> = Vec::new();
    for line in lines {
        let starts_block = if by_heading {
            HEADING_REGEX.is_match(line)
        } else {
            line.trim().is_empty()
        };

        if by_heading && blocks.is_empty() && !starts_block {
            // Preamble before the first heading.
            if !line.trim().is_empty() {
                log::debug!("Skipping text before the first heading: {}", line.trim());
            }
            continue;
        }
        if starts_block || blocks.is_empty() {
            blocks.push(Vec::new());
        }
        if !line.trim().is_empty() {
            if let Some(block) = blocks.last_mut() {
                block.push(line);
            }
        }
    }

    blocks
        .into_iter()
        .filter(|b| !b.is_empty())
        .map(|block| {
            let mut section = RawSection {
                title: Some(clean_title(block[0])).filter(|t| !t.is_empty()),
                ..RawSection::default()
            };
            let mut prose = Vec::new();
            for line in &block[1..] {
                if LIST_MARKER_REGEX.is_match(line) {
                    section.bullets.push(clean_point(line));
                } else {
                    prose.push(clean_text(line));
                }
            }
            section.bullets.retain(|b| !b.is_empty());
            if !prose.is_empty() {
                section.paragraph = Some(prose.join(" "));
            }
            section
        })
        .collect()
}

/// Turn a raw section into a slide; the second value is the repair reason.
fn build_slide(
    index: usize,
    raw: RawSection,
    style: ContentStyle,
) -> (SlideContent, Option<String>) {
    let mut repairs = Vec::new();

    let title = match raw.title {
        Some(title) => title,
        None => {
            repairs.push("missing title");
            format!("Slide {}", index + 1)
        }
    };

    let prefer_paragraph = style == ContentStyle::Paragraph;
    let body = match (raw.bullets.is_empty(), raw.paragraph) {
        (_, Some(text)) if prefer_paragraph => SlideBody::Paragraph(text),
        (false, _) => SlideBody::Bullets(raw.bullets),
        (true, Some(text)) => SlideBody::Paragraph(text),
        (true, None) => {
            repairs.push("missing body");
            SlideBody::Paragraph(String::new())
        }
    };

    let reason = if repairs.is_empty() {
        None
    } else {
        Some(repairs.join(", "))
    };

    (SlideContent::new(index, title, body, style), reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(raw: &str) -> Result<NormalizedDeck, InputError> {
        ContentNormalizer::new().normalize(raw, ContentStyle::Bullets)
    }

    #[test]
    fn test_json_slides_object() {
        let raw = r#"{"slides": [
            {"title": "Why AWS", "points": ["Scale", " Global reach ", ""]},
            {"title": "Why Azure", "points": ["• Enterprise", "- Hybrid"]}
        ]}"#;

        let result = normalize(raw).unwrap();
        let slides = result.deck.slides();

        assert!(result.issues.is_empty());
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0].title, "Why AWS");
        assert_eq!(
            slides[0].body,
            SlideBody::Bullets(vec!["Scale".into(), "Global reach".into()])
        );
        assert_eq!(
            slides[1].body,
            SlideBody::Bullets(vec!["Enterprise".into(), "Hybrid".into()])
        );
        assert_eq!(slides[1].index, 1);
        assert_eq!(slides[1].style_tag, ContentStyle::Bullets);
    }

    #[test]
    fn test_code_fenced_array() {
        let raw = "```json\n[{\"heading\": \"Intro\", \"paragraph\": \"Cloud  computing\\tbasics\"}]\n```";

        let result = normalize(raw).unwrap();

        assert_eq!(result.deck.slides()[0].title, "Intro");
        assert_eq!(
            result.deck.slides()[0].body,
            SlideBody::Paragraph("Cloud computing basics".into())
        );
    }

    #[test]
    fn test_paragraph_style_prefers_paragraph_text() {
        let raw = r#"[{"title": "T", "points": ["a"], "paragraph": "Prose"}]"#;

        let paragraph = ContentNormalizer::new()
            .normalize(raw, ContentStyle::Paragraph)
            .unwrap();
        let bullets = normalize(raw).unwrap();

        assert_eq!(paragraph.deck.slides()[0].body, SlideBody::Paragraph("Prose".into()));
        assert_eq!(bullets.deck.slides()[0].body, SlideBody::Bullets(vec!["a".into()]));
    }

    #[test]
    fn test_unreadable_section_is_replaced_and_reported() {
        let raw = r#"{"slides": [{"title": "One", "points": ["x"]}, 42, {"title": "Three", "points": ["y"]}]}"#;

        let result = normalize(raw).unwrap();
        let slides = result.deck.slides();

        assert_eq!(slides.len(), 3);
        assert_eq!(slides[1].title, "Slide 2");
        assert!(slides[1].body.is_empty());
        assert!(matches!(
            result.issues.as_slice(),
            [InputError::MalformedSection { index: 1, .. }]
        ));
    }

    #[test]
    fn test_partial_sections_are_repaired() {
        let raw = r#"[{"points": ["only points"]}, {"title": "Only title"}]"#;

        let result = normalize(raw).unwrap();
        let slides = result.deck.slides();

        assert_eq!(slides[0].title, "Slide 1");
        assert_eq!(slides[1].body, SlideBody::Paragraph(String::new()));
        assert_eq!(result.issues.len(), 2);
    }

    #[test]
    fn test_empty_inputs_are_empty_content() {
        assert_eq!(normalize("").unwrap_err(), InputError::EmptyContent);
        assert_eq!(normalize("   \n ").unwrap_err(), InputError::EmptyContent);
        assert_eq!(normalize(r#"{"slides": []}"#).unwrap_err(), InputError::EmptyContent);
        assert_eq!(normalize("[null, 3]").unwrap_err(), InputError::EmptyContent);
    }

    #[test]
    fn test_single_unreadable_section_is_malformed() {
        let err = normalize("[{}]").unwrap_err();

        assert!(matches!(err, InputError::MalformedSection { index: 0, .. }));
    }

    #[test]
    fn test_markdown_fallback_splits_on_headings() {
        let raw = "## Slide 1: Cloud basics\n\n- Elastic\n- Pay as you go\n\n## Slide 2: Costs\nBudgets matter.\n";

        let result = normalize(raw).unwrap();
        let slides = result.deck.slides();

        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0].title, "Cloud basics");
        assert_eq!(
            slides[0].body,
            SlideBody::Bullets(vec!["Elastic".into(), "Pay as you go".into()])
        );
        assert_eq!(slides[1].title, "Costs");
        assert_eq!(slides[1].body, SlideBody::Paragraph("Budgets matter.".into()));
    }

    #[test]
    fn test_fenced_json_followed_by_remarks() {
        let raw = "Sure! Here it is:\n```json\n{\"slides\": [{\"title\": \"Cloud\", \"points\": [\"Elastic\"]}, {\"title\": \"Cost\", \"points\": [\"Pay as you go\"]}]}\n```\nLet me know if you want changes.";

        let result = normalize(raw).unwrap();
        let titles: Vec<&str> = result.deck.iter().map(|s| s.title.as_str()).collect();

        assert_eq!(titles, ["Cloud", "Cost"]);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_unfenced_json_inside_prose() {
        let raw = "Note [draft]: {\"slides\": [{\"title\": \"Cloud [101]\", \"points\": [\"a}\"]}]} Enjoy!";

        let result = normalize(raw).unwrap();

        assert_eq!(result.deck.len(), 1);
        assert_eq!(result.deck.slides()[0].title, "Cloud [101]");
        assert_eq!(result.deck.slides()[0].body, SlideBody::Bullets(vec!["a}".into()]));
    }

    #[test]
    fn test_bracketed_prose_stays_plain_text() {
        let raw = "Costs [2024]\n- Compute\n- Storage";

        let result = normalize(raw).unwrap();

        assert_eq!(result.deck.slides()[0].title, "Costs [2024]");
    }

    #[test]
    fn test_preamble_before_first_heading_is_dropped() {
        let raw = "Here is your carousel:\n\n## Slide 1: Cloud\n- Elastic\n\n## Slide 2: Cost\n- Pay as you go\n";

        let result = normalize(raw).unwrap();
        let titles: Vec<&str> = result.deck.iter().map(|s| s.title.as_str()).collect();

        assert_eq!(titles, ["Cloud", "Cost"]);
    }

    #[test]
    fn test_plain_text_fallback_splits_on_blank_lines() {
        let raw = "First\n1. one\n2) two\n\nSecond\nSome prose";

        let result = normalize(raw).unwrap();

        assert_eq!(result.deck.len(), 2);
        assert_eq!(
            result.deck.slides()[0].body,
            SlideBody::Bullets(vec!["one".into(), "two".into()])
        );
    }

    #[test]
    fn test_max_slides_limit() {
        let raw = r#"["a", "b", "c"]"#;

        let result = ContentNormalizer::new()
            .with_max_slides(2)
            .normalize(raw, ContentStyle::Mixed)
            .unwrap();

        assert_eq!(result.deck.len(), 2);
    }

    #[test]
    fn test_clean_text_nfc_and_whitespace() {
        // "e" + combining acute accent composes to a single "é".
        assert_eq!(clean_text("Caf\u{0065}\u{0301}   ok \r\n x"), "Caf\u{00E9} ok\nx");
    }
}
