//! Read back the slides of a `.pptx` file.
//!
//! Used by the `inspect` command and by tests to check what the assembler
//! wrote: slide order, the layout each slide uses, and the paragraphs of
//! every shape.

use crate::opc::{Package, PRESENTATION_PART};
use crate::xml::{attr, attr_num, extract_part_number, local_name};
use carousel_core::{Error, Result, TemplateError};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use std::io::{Read, Seek};

fn invalid(msg: impl Into<String>) -> Error {
    TemplateError::InvalidTemplateFormat(msg.into()).into()
}

/// One slide as found in the file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InspectedSlide {
    /// 1-based position in the presentation.
    pub number: usize,
    pub part_name: String,
    /// Name of the slide layout, when the slide has one.
    pub layout: Option<String>,
    pub shapes: Vec<InspectedShape>,
}

impl InspectedSlide {
    /// Text of the title placeholder.
    pub fn title(&self) -> Option<String> {
        self.shapes
            .iter()
            .find(|s| matches!(s.placeholder_type.as_deref(), Some("title" | "ctrTitle")))
            .map(InspectedShape::text)
    }

    /// Paragraphs of every shape, in document order.
    pub fn paragraphs(&self) -> impl Iterator<Item = &InspectedParagraph> {
        self.shapes.iter().flat_map(|s| s.paragraphs.iter())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InspectedShape {
    pub name: String,
    /// `<p:ph type>`; `Some("obj")` for a placeholder without a type.
    pub placeholder_type: Option<String>,
    pub paragraphs: Vec<InspectedParagraph>,
    pub x: i64,
    pub y: i64,
}

impl InspectedShape {
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InspectedParagraph {
    pub text: String,
    /// True when the paragraph sets a bullet character of its own.
    pub bulleted: bool,
}

/// Reader for the slides of a presentation.
#[derive(Debug, Clone, Default)]
pub struct DeckInspector;

impl DeckInspector {
    pub fn new() -> Self {
        Self
    }

    /// Inspect a `.pptx` file.
    pub fn inspect<R: Read + Seek>(&self, reader: R) -> Result<Vec<InspectedSlide>> {
        let package = Package::from_reader(reader)?;
        self.inspect_package(&package)
    }

    pub fn inspect_bytes(&self, bytes: &[u8]) -> Result<Vec<InspectedSlide>> {
        self.inspect_package(&Package::from_bytes(bytes)?)
    }

    pub fn inspect_package(&self, package: &Package) -> Result<Vec<InspectedSlide>> {
        let slide_order = self.slide_order(package)?;

        slide_order
            .iter()
            .enumerate()
            .map(|(idx, part_name)| self.read_slide(package, part_name, idx + 1))
            .collect()
    }

    /// Slide part names in presentation order: the `sldIdLst` order, or the
    /// part numbers when the list is missing.
    fn slide_order(&self, package: &Package) -> Result<Vec<String>> {
        let rels = package.relationships(PRESENTATION_PART)?;
        let slide_rels: Vec<_> = rels.iter().filter(|r| r.is_type("slide")).collect();

        let listed = slide_id_list(package.part_text(PRESENTATION_PART)?)?;
        if !listed.is_empty() {
            return Ok(listed
                .iter()
                .filter_map(|rel_id| {
                    let rel = slide_rels.iter().find(|r| &r.id == rel_id);
                    if rel.is_none() {
                        log::warn!("Slide id list refers to unknown relationship {}", rel_id);
                    }
                    rel.and_then(|r| r.resolve(PRESENTATION_PART))
                })
                .collect());
        }

        let mut slides: Vec<(Option<usize>, String)> = slide_rels
            .iter()
            .filter_map(|r| r.resolve(PRESENTATION_PART))
            .map(|path| (extract_part_number(&path), path))
            .collect();

        slides.sort_by(|a, b| match (a.0, b.0) {
            (Some(na), Some(nb)) => na.cmp(&nb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.1.cmp(&b.1),
        });

        Ok(slides.into_iter().map(|(_, path)| path).collect())
    }

    fn read_slide(&self, package: &Package, part_name: &str, number: usize) -> Result<InspectedSlide> {
        let xml = package.part_text(part_name)?;

        let layout = package
            .relationships(part_name)?
            .iter()
            .find(|r| r.is_type("slideLayout"))
            .and_then(|r| r.resolve(part_name))
            .and_then(|layout_part| {
                let layout_xml = package.part_text(&layout_part).ok()?;
                slide_name(layout_xml).or(Some(layout_part))
            });

        Ok(InspectedSlide {
            number,
            part_name: part_name.to_string(),
            layout,
            shapes: extract_shapes(xml)?,
        })
    }
}

/// Relationship ids of `<p:sldId>` entries, in order.
fn slide_id_list(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut ids = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"sldId" =>
            {
                if let Some(id) = attr_rel_id(e) {
                    ids.push(id);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(invalid(format!("Error parsing presentation.xml: {}", e))),
            _ => {}
        }
    }

    Ok(ids)
}

/// The `r:id` attribute. The plain `id` attribute has the same local name,
/// so it is told apart by its prefix.
fn attr_rel_id(e: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| {
            let key = a.key.as_ref();
            key != b"id" && local_name(key) == b"id"
        })
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn slide_name(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if local_name(e.name().as_ref()) == b"cSld" =>
            {
                return attr(e, b"name");
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Extract shapes with their paragraphs and positions from slide XML.
fn extract_shapes(xml_content: &str) -> Result<Vec<InspectedShape>> {
    let mut shapes = Vec::new();
    // Not trimmed: runs may start or end with meaningful spaces.
    let mut reader = Reader::from_str(xml_content);

    let mut current_shape: Option<InspectedShape> = None;
    let mut current_paragraph: Option<InspectedParagraph> = None;
    let mut in_text_body = false;
    let mut in_xfrm = false;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"sp" | b"pic" => current_shape = Some(InspectedShape::default()),
                b"xfrm" => in_xfrm = true,
                b"txBody" => in_text_body = true,
                b"p" if in_text_body => current_paragraph = Some(InspectedParagraph::default()),
                b"t" if current_paragraph.is_some() => in_text = true,
                _ => inspect_element(e, &mut current_shape, &mut current_paragraph, in_xfrm),
            },
            Ok(Event::Empty(ref e)) => {
                inspect_element(e, &mut current_shape, &mut current_paragraph, in_xfrm)
            }
            Ok(Event::Text(ref e)) if in_text => {
                if let Some(paragraph) = current_paragraph.as_mut() {
                    paragraph.text.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"sp" | b"pic" => {
                    if let Some(shape) = current_shape.take() {
                        shapes.push(shape);
                    }
                    in_text_body = false;
                }
                b"xfrm" => in_xfrm = false,
                b"txBody" => in_text_body = false,
                b"p" => {
                    if let (Some(shape), Some(paragraph)) =
                        (current_shape.as_mut(), current_paragraph.take())
                    {
                        shape.paragraphs.push(paragraph);
                    }
                }
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!("XML parsing error, keeping shapes read so far: {}", e);
                break;
            }
            _ => {}
        }
    }

    Ok(shapes)
}

fn inspect_element(
    e: &quick_xml::events::BytesStart<'_>,
    shape: &mut Option<InspectedShape>,
    paragraph: &mut Option<InspectedParagraph>,
    in_xfrm: bool,
) {
    match local_name(e.name().as_ref()) {
        b"cNvPr" => {
            if let Some(shape) = shape.as_mut() {
                shape.name = attr(e, b"name").unwrap_or_default();
            }
        }
        b"ph" => {
            if let Some(shape) = shape.as_mut() {
                shape.placeholder_type = Some(attr(e, b"type").unwrap_or_else(|| "obj".to_string()));
            }
        }
        b"off" if in_xfrm => {
            if let Some(shape) = shape.as_mut() {
                shape.x = attr_num(e, b"x").unwrap_or(0);
                shape.y = attr_num(e, b"y").unwrap_or(0);
            }
        }
        b"buChar" | b"buAutoNum" => {
            if let Some(paragraph) = paragraph.as_mut() {
                paragraph.bulleted = true;
            }
        }
        _ => {}
    }
}
