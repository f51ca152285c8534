//! Slide assembly: writes deck content into slides built on a template's
//! layouts.
//!
//! The template package is cloned, its existing slides are removed, and one
//! slide per deck entry is added. Layouts are used round-robin in deck
//! order. Nothing here touches the filesystem.

use crate::opc::{
    next_rel_id, relative_target, ContentTypes, Package, Relationship, CONTENT_TYPES_PART, CT_SLIDE,
    PRESENTATION_PART, REL_SLIDE, REL_SLIDE_LAYOUT,
};
use crate::template::{Layout, PlaceholderRef, PlaceholderShape, ShapeFrame, SlideSize, Template};
use crate::xml::{attr, local_name, passthrough, XmlBuilder, NS_DRAWINGML, NS_PRESENTATIONML, NS_RELATIONSHIPS};
use carousel_core::{
    fit_body, strategy_for, truncate_with_marker, BodyParagraph, Deck, Error, ExportError,
    OverflowPolicy, PlaceholderRole, Result, SlideContent, TemplateError,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeSet;

/// Parts that belong to the template's own slides.
const SLIDE_PART_PREFIXES: [&str; 3] = ["ppt/slides/", "ppt/notesSlides/", "ppt/comments/"];

/// Children of `<p:presentation>` that follow `<p:sldIdLst>`.
const AFTER_SLIDE_ID_LIST: [&[u8]; 11] = [
    b"sldSz",
    b"notesSz",
    b"smartTags",
    b"embeddedFontLst",
    b"custShowLst",
    b"photoAlbum",
    b"custDataLst",
    b"kinsoku",
    b"defaultTextStyle",
    b"modifyVerifier",
    b"extLst",
];

/// Elements that reference slides by id and are dropped with the old slides.
const SLIDE_REFERENCES: [&[u8]; 3] = [b"sldIdLst", b"custShowLst", b"sectionLst"];

const FIRST_SLIDE_ID: u32 = 256;

fn write_failed(e: quick_xml::Error) -> Error {
    ExportError::failed(e).into()
}

fn invalid(msg: impl Into<String>) -> Error {
    TemplateError::InvalidTemplateFormat(msg.into()).into()
}

/// What happened to one slide during assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledSlide {
    /// 0-based deck position.
    pub index: usize,
    pub layout_index: usize,
    pub part_name: String,
    pub title_placed: bool,
    /// Body font scale in percent (100 when unchanged).
    pub font_scale_percent: u32,
    /// True if any title or body text was cut.
    pub truncated: bool,
    pub warnings: Vec<String>,
}

/// A template package with the deck's slides written into it.
#[derive(Debug, Clone)]
pub struct AssembledDeck {
    pub template_id: String,
    pub package: Package,
    pub slides: Vec<AssembledSlide>,
}

impl AssembledDeck {
    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Warnings of every slide, in deck order.
    pub fn warnings(&self) -> Vec<String> {
        self.slides
            .iter()
            .flat_map(|s| s.warnings.iter().cloned())
            .collect()
    }
}

/// Writes a [`Deck`] into a [`Template`].
#[derive(Debug, Clone, Default)]
pub struct SlideAssembler {
    overflow: OverflowPolicy,
    footer_text: Option<String>,
}

impl SlideAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow = policy;
        self
    }

    /// Text written into the footer placeholder of layouts that have one.
    pub fn with_footer_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.footer_text = if text.trim().is_empty() { None } else { Some(text) };
        self
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow
    }

    pub fn assemble(&self, template: &Template, deck: &Deck) -> Result<AssembledDeck> {
        let layouts = template.layouts();
        if layouts.is_empty() {
            return Err(TemplateError::NoLayoutAvailable {
                template_id: template.id().to_string(),
            }
            .into());
        }

        let mut package = template.package().clone();
        let mut content_types = ContentTypes::parse(package.part_text(CONTENT_TYPES_PART)?)?;
        let mut presentation_rels = package.relationships(PRESENTATION_PART)?;

        let removed = remove_template_slides(&mut package, &mut content_types, &mut presentation_rels);
        if removed > 0 {
            log::debug!("Removed {} slides shipped with template '{}'", removed, template.id());
        }

        let lang = template.language().lang_tag();
        let mut next_id = next_rel_id(&presentation_rels);
        let mut slide_rel_ids = Vec::with_capacity(deck.len());
        let mut slides = Vec::with_capacity(deck.len());
        let mut used_layouts = BTreeSet::new();

        for (i, content) in deck.iter().enumerate() {
            let layout = &layouts[i % layouts.len()];
            let part_name = format!("ppt/slides/slide{}.xml", i + 1);

            let (xml, mut slide) = self.render_slide(content, layout, template.slide_size(), lang)?;
            slide.index = i;
            slide.part_name = part_name.clone();

            package.set_part(&part_name, xml);
            package.set_relationships(
                &part_name,
                &[Relationship::new(
                    "rId1",
                    REL_SLIDE_LAYOUT,
                    relative_target(&part_name, &layout.part_name),
                )],
            )?;
            content_types.set_override(&part_name, CT_SLIDE);

            let rel_id = format!("rId{}", next_id);
            next_id += 1;
            presentation_rels.push(Relationship::new(
                rel_id.clone(),
                REL_SLIDE,
                relative_target(PRESENTATION_PART, &part_name),
            ));
            slide_rel_ids.push(rel_id);
            used_layouts.insert(layout.index);
            slides.push(slide);
        }

        for &index in &used_layouts {
            let layout = &layouts[index];
            let ids = layout.heuristic_shape_ids();
            if ids.is_empty() {
                continue;
            }
            let blanked = blank_shape_text(package.part_text(&layout.part_name)?, &ids)?;
            package.set_part(&layout.part_name, blanked);
            log::debug!("Cleared prompt text of {} shapes in '{}'", ids.len(), layout.part_name);
        }

        let presentation = rewrite_presentation(package.part_text(PRESENTATION_PART)?, &slide_rel_ids)?;
        package.set_part(PRESENTATION_PART, presentation);
        package.set_relationships(PRESENTATION_PART, &presentation_rels)?;
        package.set_part(
            CONTENT_TYPES_PART,
            content_types.to_xml().map_err(write_failed)?,
        );

        log::info!(
            "Assembled {} slides on template '{}' using {} layouts",
            slides.len(),
            template.id(),
            used_layouts.len()
        );

        Ok(AssembledDeck {
            template_id: template.id().to_string(),
            package,
            slides,
        })
    }

    fn render_slide(
        &self,
        content: &SlideContent,
        layout: &Layout,
        slide_size: SlideSize,
        lang: &str,
    ) -> Result<(Vec<u8>, AssembledSlide)> {
        let strategy = strategy_for(content.style_tag);
        let rules = strategy.rules;
        let mut slide = AssembledSlide {
            index: content.index,
            layout_index: layout.index,
            part_name: String::new(),
            title_placed: false,
            font_scale_percent: 100,
            truncated: false,
            warnings: Vec::new(),
        };

        let mut shapes: Vec<TextShape> = Vec::new();

        let title_shape = layout.placeholder(PlaceholderRole::Title);
        match title_shape {
            Some(target) => {
                let title = truncate_with_marker(&content.title, rules.title_max_chars);
                if title != content.title.trim() {
                    slide.truncated = true;
                    slide.warnings.push(format!(
                        "Slide {}: title shortened to {} characters",
                        content.index + 1,
                        rules.title_max_chars
                    ));
                }
                shapes.push(TextShape {
                    name: shape_name(target, "Title"),
                    target: ShapeTarget::from_placeholder(target, slide_size),
                    paragraphs: vec![BodyParagraph::plain(title)],
                    font_pt: Some(rules.title_font_pt),
                    explicit_bullets: false,
                    autofit: false,
                });
                slide.title_placed = true;
            }
            None => {
                log::warn!(
                    "Layout '{}' has no title placeholder; title of slide {} skipped",
                    layout.name,
                    content.index + 1
                );
                slide.warnings.push(format!(
                    "Slide {}: layout '{}' has no title placeholder, title skipped",
                    content.index + 1,
                    layout.name
                ));
            }
        }

        let paragraphs = strategy.layout_body(&content.body);
        if !paragraphs.is_empty() {
            let (name, target) = match layout.placeholder(PlaceholderRole::Body) {
                Some(body) => (shape_name(body, "Content"), ShapeTarget::from_placeholder(body, slide_size)),
                None => {
                    log::debug!("Layout '{}' has no body placeholder; adding a text box", layout.name);
                    let frame = free_area_below(title_shape.and_then(|t| t.frame), slide_size);
                    ("Content".to_string(), ShapeTarget::Frame(frame))
                }
            };

            let fitted = fit_body(
                paragraphs,
                target.frame().text_frame(),
                rules.body_font_pt,
                self.overflow,
            );
            if fitted.truncated {
                log::warn!(
                    "Slide {}: body text truncated at {}% font size",
                    content.index + 1,
                    fitted.scale_percent
                );
                slide.truncated = true;
                slide.warnings.push(format!(
                    "Slide {}: body text did not fit and was truncated",
                    content.index + 1
                ));
            } else if fitted.scale_percent < 100 {
                log::debug!(
                    "Slide {}: body font reduced to {}%",
                    content.index + 1,
                    fitted.scale_percent
                );
            }
            slide.font_scale_percent = fitted.scale_percent;

            shapes.push(TextShape {
                name,
                target,
                paragraphs: fitted.paragraphs,
                font_pt: Some(fitted.font_pt),
                explicit_bullets: true,
                autofit: self.overflow == OverflowPolicy::Shrink,
            });
        }

        if let Some(footer_text) = &self.footer_text {
            if let Some(footer) = layout.placeholder(PlaceholderRole::Footer) {
                shapes.push(TextShape {
                    name: shape_name(footer, "Footer"),
                    target: ShapeTarget::from_placeholder(footer, slide_size),
                    paragraphs: vec![BodyParagraph::plain(footer_text.trim())],
                    font_pt: None,
                    explicit_bullets: false,
                    autofit: false,
                });
            }
        }

        let xml = slide_xml(&shapes, lang, rules.bullet_char).map_err(write_failed)?;
        Ok((xml, slide))
    }
}

fn shape_name(target: &PlaceholderShape, fallback: &str) -> String {
    if target.name.is_empty() {
        fallback.to_string()
    } else {
        target.name.clone()
    }
}

/// Where a shape on the new slide gets its geometry from.
#[derive(Debug, Clone)]
enum ShapeTarget {
    /// Refers to a layout placeholder and inherits its geometry.
    Placeholder {
        ph: PlaceholderRef,
        frame: ShapeFrame,
    },
    /// A free-standing text box at an explicit position.
    Frame(ShapeFrame),
}

impl ShapeTarget {
    fn from_placeholder(shape: &PlaceholderShape, slide_size: SlideSize) -> Self {
        let frame = shape
            .frame
            .filter(|f| f.cx > 0 && f.cy > 0)
            .unwrap_or_else(|| free_area_below(None, slide_size));
        match &shape.placeholder {
            Some(ph) => Self::Placeholder {
                ph: ph.clone(),
                frame,
            },
            None => Self::Frame(frame),
        }
    }

    fn frame(&self) -> ShapeFrame {
        match self {
            Self::Placeholder { frame, .. } | Self::Frame(frame) => *frame,
        }
    }
}

struct TextShape {
    name: String,
    target: ShapeTarget,
    paragraphs: Vec<BodyParagraph>,
    font_pt: Option<f32>,
    /// Write bullet properties on every paragraph instead of inheriting.
    explicit_bullets: bool,
    autofit: bool,
}

/// Area for a body text box: below the title when its position is known,
/// otherwise the lower three quarters of the slide.
fn free_area_below(title: Option<ShapeFrame>, slide: SlideSize) -> ShapeFrame {
    let margin_x = slide.cx / 20;
    let gap = slide.cy / 40;
    let bottom = slide.cy - slide.cy / 12;

    if let Some(title) = title {
        let y = title.y + title.cy + gap;
        if bottom - y > slide.cy / 5 {
            return ShapeFrame {
                x: title.x,
                y,
                cx: title.cx,
                cy: bottom - y,
            };
        }
    }

    let y = slide.cy / 4;
    ShapeFrame {
        x: margin_x,
        y,
        cx: slide.cx - 2 * margin_x,
        cy: bottom - y,
    }
}

fn font_size_attr(font_pt: f32) -> String {
    ((font_pt * 100.0).round() as u32).to_string()
}

fn slide_xml(shapes: &[TextShape], lang: &str, bullet_char: char) -> quick_xml::Result<Vec<u8>> {
    let mut xml = XmlBuilder::document()?;
    xml.start(
        "p:sld",
        &[
            ("xmlns:a", NS_DRAWINGML),
            ("xmlns:r", NS_RELATIONSHIPS),
            ("xmlns:p", NS_PRESENTATIONML),
        ],
    )?;
    xml.start("p:cSld", &[])?;
    xml.start("p:spTree", &[])?;

    xml.start("p:nvGrpSpPr", &[])?;
    xml.empty("p:cNvPr", &[("id", "1"), ("name", "")])?;
    xml.empty("p:cNvGrpSpPr", &[])?;
    xml.empty("p:nvPr", &[])?;
    xml.end("p:nvGrpSpPr")?;
    xml.start("p:grpSpPr", &[])?;
    xml.start("a:xfrm", &[])?;
    xml.empty("a:off", &[("x", "0"), ("y", "0")])?;
    xml.empty("a:ext", &[("cx", "0"), ("cy", "0")])?;
    xml.empty("a:chOff", &[("x", "0"), ("y", "0")])?;
    xml.empty("a:chExt", &[("cx", "0"), ("cy", "0")])?;
    xml.end("a:xfrm")?;
    xml.end("p:grpSpPr")?;

    for (i, shape) in shapes.iter().enumerate() {
        write_text_shape(&mut xml, shape, i as u32 + 2, lang, bullet_char)?;
    }

    xml.end("p:spTree")?;
    xml.end("p:cSld")?;
    xml.start("p:clrMapOvr", &[])?;
    xml.empty("a:masterClrMapping", &[])?;
    xml.end("p:clrMapOvr")?;
    xml.end("p:sld")?;
    Ok(xml.into_bytes())
}

fn write_text_shape(
    xml: &mut XmlBuilder,
    shape: &TextShape,
    id: u32,
    lang: &str,
    bullet_char: char,
) -> quick_xml::Result<()> {
    let id = id.to_string();
    xml.start("p:sp", &[])?;
    xml.start("p:nvSpPr", &[])?;
    xml.empty("p:cNvPr", &[("id", id.as_str()), ("name", shape.name.as_str())])?;

    match &shape.target {
        ShapeTarget::Placeholder { ph, .. } => {
            xml.start("p:cNvSpPr", &[])?;
            xml.empty("a:spLocks", &[("noGrp", "1")])?;
            xml.end("p:cNvSpPr")?;
            xml.start("p:nvPr", &[])?;
            let idx = ph.idx.map(|i| i.to_string());
            let mut attrs: Vec<(&str, &str)> = Vec::new();
            if let Some(ph_type) = ph.ph_type.as_deref() {
                attrs.push(("type", ph_type));
            }
            if let Some(idx) = idx.as_deref() {
                attrs.push(("idx", idx));
            }
            xml.empty("p:ph", &attrs)?;
            xml.end("p:nvPr")?;
            xml.end("p:nvSpPr")?;
            xml.empty("p:spPr", &[])?;
        }
        ShapeTarget::Frame(frame) => {
            xml.empty("p:cNvSpPr", &[("txBox", "1")])?;
            xml.empty("p:nvPr", &[])?;
            xml.end("p:nvSpPr")?;

            let (x, y) = (frame.x.to_string(), frame.y.to_string());
            let (cx, cy) = (frame.cx.to_string(), frame.cy.to_string());
            xml.start("p:spPr", &[])?;
            xml.start("a:xfrm", &[])?;
            xml.empty("a:off", &[("x", x.as_str()), ("y", y.as_str())])?;
            xml.empty("a:ext", &[("cx", cx.as_str()), ("cy", cy.as_str())])?;
            xml.end("a:xfrm")?;
            xml.start("a:prstGeom", &[("prst", "rect")])?;
            xml.empty("a:avLst", &[])?;
            xml.end("a:prstGeom")?;
            xml.end("p:spPr")?;
        }
    }

    xml.start("p:txBody", &[])?;
    let body_attrs: &[(&str, &str)] = match shape.target {
        ShapeTarget::Frame(_) => &[("wrap", "square"), ("rtlCol", "0")],
        ShapeTarget::Placeholder { .. } => &[],
    };
    if shape.autofit {
        xml.start("a:bodyPr", body_attrs)?;
        xml.empty("a:normAutofit", &[])?;
        xml.end("a:bodyPr")?;
    } else {
        xml.empty("a:bodyPr", body_attrs)?;
    }
    xml.empty("a:lstStyle", &[])?;

    let size = shape.font_pt.map(font_size_attr);
    let bullet = bullet_char.to_string();
    for paragraph in &shape.paragraphs {
        xml.start("a:p", &[])?;
        if shape.explicit_bullets {
            if paragraph.bulleted {
                xml.start("a:pPr", &[("marL", "342900"), ("indent", "-342900")])?;
                xml.empty("a:buFont", &[("typeface", "Arial")])?;
                xml.empty("a:buChar", &[("char", bullet.as_str())])?;
            } else {
                xml.start("a:pPr", &[("marL", "0"), ("indent", "0")])?;
                xml.empty("a:buNone", &[])?;
            }
            xml.end("a:pPr")?;
        }
        xml.start("a:r", &[])?;
        let mut run_attrs = vec![("lang", lang)];
        if let Some(size) = size.as_deref() {
            run_attrs.push(("sz", size));
        }
        run_attrs.push(("dirty", "0"));
        xml.empty("a:rPr", &run_attrs)?;
        xml.text_element("a:t", &paragraph.text)?;
        xml.end("a:r")?;
        xml.end("a:p")?;
    }

    xml.end("p:txBody")?;
    xml.end("p:sp")?;
    Ok(())
}

/// Drop the template's own slides, their notes and comments. Returns the
/// number of slide parts removed.
fn remove_template_slides(
    package: &mut Package,
    content_types: &mut ContentTypes,
    presentation_rels: &mut Vec<Relationship>,
) -> usize {
    presentation_rels.retain(|r| !r.is_type("slide"));

    let removed = package.remove_parts_where(|name| {
        SLIDE_PART_PREFIXES
            .iter()
            .any(|prefix| name.starts_with(prefix))
    });
    for name in &removed {
        content_types.remove_override(name);
    }

    removed
        .iter()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .count()
}

/// Rewrite `presentation.xml` with a new slide id list. Everything else
/// passes through unchanged, except elements that reference the removed
/// slides.
fn rewrite_presentation(xml: &str, slide_rel_ids: &[String]) -> Result<Vec<u8>> {
    let mut reader = Reader::from_str(xml);
    let mut out = passthrough();

    let mut depth = 0usize;
    let mut skip_depth: Option<usize> = None;
    let mut inserted = false;
    let mut prefix = String::new();
    let mut r_prefix: Option<String> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| invalid(format!("Error parsing presentation.xml: {}", e)))?;

        match &event {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) => {
                let is_start = matches!(event, Event::Start(_));
                let name = e.name();
                let local = local_name(name.as_ref());

                if skip_depth.is_some() {
                    if is_start {
                        depth += 1;
                    }
                    continue;
                }

                if depth == 0 {
                    prefix = element_prefix(name.as_ref());
                    r_prefix = namespace_prefix(e, NS_RELATIONSHIPS);
                } else if depth == 1 && !inserted && AFTER_SLIDE_ID_LIST.contains(&local) {
                    write_slide_id_list(&mut out, &prefix, r_prefix.as_deref(), slide_rel_ids)
                        .map_err(write_failed)?;
                    inserted = true;
                }

                if SLIDE_REFERENCES.contains(&local) {
                    if is_start {
                        skip_depth = Some(depth);
                        depth += 1;
                    }
                    continue;
                }

                if is_start {
                    depth += 1;
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if let Some(level) = skip_depth {
                    if depth == level {
                        skip_depth = None;
                    }
                    continue;
                }
                // Root closing with no later sibling to insert before.
                if depth == 0 && !inserted {
                    write_slide_id_list(&mut out, &prefix, r_prefix.as_deref(), slide_rel_ids)
                        .map_err(write_failed)?;
                    inserted = true;
                }
            }
            _ => {
                if skip_depth.is_some() {
                    continue;
                }
            }
        }

        out.event(event).map_err(write_failed)?;
    }

    Ok(out.into_bytes())
}

/// `p:presentation` -> `p:`; no prefix gives an empty string.
fn element_prefix(name: &[u8]) -> String {
    match name.iter().position(|&b| b == b':') {
        Some(pos) => format!("{}:", String::from_utf8_lossy(&name[..pos])),
        None => String::new(),
    }
}

/// Prefix bound to a namespace URI by an `xmlns:x` attribute of the element.
fn namespace_prefix(e: &BytesStart<'_>, uri: &str) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        let key = a.key.as_ref();
        let prefix = key.strip_prefix(b"xmlns:")?;
        (a.value.as_ref() == uri.as_bytes()).then(|| String::from_utf8_lossy(prefix).into_owned())
    })
}

fn write_slide_id_list(
    out: &mut XmlBuilder,
    prefix: &str,
    r_prefix: Option<&str>,
    slide_rel_ids: &[String],
) -> quick_xml::Result<()> {
    let list = format!("{}sldIdLst", prefix);
    let item = format!("{}sldId", prefix);
    let rel_attr = format!("{}:id", r_prefix.unwrap_or("r"));

    match r_prefix {
        Some(_) => out.start(&list, &[])?,
        None => out.start(&list, &[("xmlns:r", NS_RELATIONSHIPS)])?,
    };
    for (i, rel_id) in slide_rel_ids.iter().enumerate() {
        let id = (FIRST_SLIDE_ID + i as u32).to_string();
        out.empty(&item, &[("id", id.as_str()), (rel_attr.as_str(), rel_id.as_str())])?;
    }
    out.end(&list)?;
    Ok(())
}

/// Remove the text of the given shapes from a layout part, keeping the
/// shapes and their formatting.
fn blank_shape_text(xml: &str, shape_ids: &[u32]) -> Result<Vec<u8>> {
    let mut reader = Reader::from_str(xml);
    let mut out = passthrough();
    let mut in_shape = false;
    let mut blank = false;
    let mut in_text = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| invalid(format!("Error parsing layout: {}", e)))?;

        match &event {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) => match local_name(e.name().as_ref()) {
                b"sp" if matches!(event, Event::Start(_)) => {
                    in_shape = true;
                    blank = false;
                }
                b"cNvPr" if in_shape => {
                    blank = attr(e, b"id")
                        .and_then(|id| id.parse::<u32>().ok())
                        .is_some_and(|id| shape_ids.contains(&id));
                }
                b"t" if matches!(event, Event::Start(_)) => in_text = true,
                _ => {}
            },
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"sp" => {
                    in_shape = false;
                    blank = false;
                }
                b"t" => in_text = false,
                _ => {}
            },
            Event::Text(_) | Event::CData(_) if in_text && blank => continue,
            _ => {}
        }

        out.event(event).map_err(write_failed)?;
    }

    Ok(out.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::DeckInspector;
    use carousel_core::{ColorVariant, ContentStyle, Language, SlideBody};

    fn deck(count: usize, style: ContentStyle) -> Deck {
        Deck::new(
            (0..count)
                .map(|i| {
                    SlideContent::new(
                        i,
                        format!("Slide title {}", i + 1),
                        SlideBody::Bullets(vec!["A".into(), "B".into(), "C".into()]),
                        style,
                    )
                })
                .collect(),
        )
        .unwrap()
    }

    fn builtin() -> Template {
        Template::builtin(Language::English, ColorVariant::Light).unwrap()
    }

    #[test]
    fn test_layouts_cycle_in_deck_order() {
        let assembled = SlideAssembler::new()
            .assemble(&builtin(), &deck(8, ContentStyle::Bullets))
            .unwrap();
        let layouts: Vec<usize> = assembled.slides.iter().map(|s| s.layout_index).collect();

        assert_eq!(layouts, [0, 1, 2, 0, 1, 2, 0, 1]);
        let rels = assembled.package.relationships("ppt/slides/slide5.xml").unwrap();
        assert_eq!(rels[0].target, "../slideLayouts/slideLayout2.xml");
    }

    #[test]
    fn test_presentation_lists_every_slide_once() {
        let assembled = SlideAssembler::new()
            .assemble(&builtin(), &deck(4, ContentStyle::Bullets))
            .unwrap();
        let presentation = assembled.package.part_text(PRESENTATION_PART).unwrap();

        assert_eq!(presentation.matches("<p:sldId ").count(), 4);
        assert!(presentation.contains(r#"<p:sldId id="256" r:id="rId6"/>"#));
        let list = presentation.find("<p:sldIdLst>").unwrap();
        assert!(list > presentation.find("</p:sldMasterIdLst>").unwrap());
        assert!(list < presentation.find("<p:sldSz").unwrap());

        let types = assembled.package.part_text(CONTENT_TYPES_PART).unwrap();
        assert_eq!(types.matches(CT_SLIDE).count(), 4);
    }

    #[test]
    fn test_bullets_become_bulleted_paragraphs() {
        let assembled = SlideAssembler::new()
            .assemble(&builtin(), &deck(1, ContentStyle::Bullets))
            .unwrap();
        let slide = assembled.package.part_text("ppt/slides/slide1.xml").unwrap();

        assert_eq!(slide.matches(r#"<a:buChar char="•"/>"#).count(), 3);
        let a = slide.find("<a:t>A</a:t>").unwrap();
        let b = slide.find("<a:t>B</a:t>").unwrap();
        let c = slide.find("<a:t>C</a:t>").unwrap();
        assert!(a < b && b < c);
        assert!(slide.contains(r#"<p:ph type="title"/>"#));
        assert!(slide.contains(r#"<a:rPr lang="en-US" sz="2200" dirty="0"/>"#));
    }

    #[test]
    fn test_paragraph_style_is_one_unbulleted_block() {
        let content = SlideContent::new(
            0,
            "Why it matters",
            SlideBody::Paragraph("First sentence.\nSecond sentence.".into()),
            ContentStyle::Paragraph,
        );
        let assembled = SlideAssembler::new()
            .assemble(&builtin(), &Deck::new(vec![content]).unwrap())
            .unwrap();
        let slide = assembled.package.part_text("ppt/slides/slide1.xml").unwrap();

        assert!(!slide.contains("a:buChar"));
        assert!(slide.contains("<a:buNone/>"));
        assert!(slide.contains("<a:t>First sentence. Second sentence.</a:t>"));
    }

    #[test]
    fn test_long_title_is_truncated_with_marker() {
        let content = SlideContent::new(
            0,
            "A very long title that keeps going well past the limit for bullet slides",
            SlideBody::Bullets(vec!["Point".into()]),
            ContentStyle::Bullets,
        );
        let assembled = SlideAssembler::new()
            .assemble(&builtin(), &Deck::new(vec![content]).unwrap())
            .unwrap();

        assert!(assembled.slides[0].truncated);
        let inspected = DeckInspector::new().inspect_package(&assembled.package).unwrap();
        let title = &inspected[0].shapes[0].paragraphs[0].text;
        assert!(title.ends_with('…'));
        assert!(title.chars().count() <= 60);
    }

    #[test]
    fn test_footer_text_goes_into_footer_placeholder() {
        let assembled = SlideAssembler::new()
            .with_footer_text("@carousel")
            .assemble(&builtin(), &deck(3, ContentStyle::Mixed))
            .unwrap();

        let with_footer = assembled.package.part_text("ppt/slides/slide3.xml").unwrap();
        let without = assembled.package.part_text("ppt/slides/slide1.xml").unwrap();
        assert!(with_footer.contains(r#"<p:ph type="ftr" idx="11"/>"#));
        assert!(with_footer.contains("<a:t>@carousel</a:t>"));
        assert!(!without.contains("@carousel"));
    }

    #[test]
    fn test_template_slides_are_replaced() {
        let first = SlideAssembler::new()
            .assemble(&builtin(), &deck(5, ContentStyle::Bullets))
            .unwrap();
        let bytes = crate::export::write_package(&first.package).unwrap();
        let reused = Template::from_upload("previous.pptx", Language::English, &bytes).unwrap();

        let second = SlideAssembler::new()
            .assemble(&reused, &deck(2, ContentStyle::Bullets))
            .unwrap();
        let names: Vec<&str> = second
            .package
            .part_names()
            .filter(|n| n.starts_with("ppt/slides/slide"))
            .collect();

        assert_eq!(names, ["ppt/slides/slide1.xml", "ppt/slides/slide2.xml"]);
        let presentation = second.package.part_text(PRESENTATION_PART).unwrap();
        assert_eq!(presentation.matches("<p:sldId ").count(), 2);
        let rels = second.package.relationships(PRESENTATION_PART).unwrap();
        assert_eq!(rels.iter().filter(|r| r.is_type("slide")).count(), 2);
    }

    #[test]
    fn test_zero_layouts_is_an_error() {
        let mut package = builtin().package().clone();
        package.remove_parts_where(|n| n.starts_with("ppt/slideLayouts/"));
        let template = Template::from_package(
            "bare",
            Language::English,
            None,
            crate::template::TemplateSource::Uploaded { filename: "bare.pptx".into() },
            package,
        )
        .unwrap();

        let err = SlideAssembler::new()
            .assemble(&template, &deck(1, ContentStyle::Bullets))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Template(TemplateError::NoLayoutAvailable { ref template_id }) if template_id == "bare"
        ));
    }

    #[test]
    fn test_free_area_below_title() {
        let slide = SlideSize { cx: 6_858_000, cy: 6_858_000 };
        let title = ShapeFrame { x: 457_200, y: 457_200, cx: 5_943_600, cy: 1_143_000 };
        let area = free_area_below(Some(title), slide);

        assert_eq!(area.x, title.x);
        assert!(area.y > title.y + title.cy);
        assert!(area.y + area.cy < slide.cy);

        let fallback = free_area_below(None, slide);
        assert_eq!(fallback.y, slide.cy / 4);
        assert!(fallback.cx > 0 && fallback.cy > 0);
    }

    #[test]
    fn test_rewrite_presentation_without_r_namespace() {
        let xml = r#"<p:presentation xmlns:p="urn:p"><p:sldIdLst><p:sldId id="300" r:id="rId7"/></p:sldIdLst><p:sldSz cx="1" cy="1"/></p:presentation>"#;
        let out = rewrite_presentation(xml, &["rId2".to_string()]).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert_eq!(
            out,
            format!(
                r#"<p:presentation xmlns:p="urn:p"><p:sldIdLst xmlns:r="{}"><p:sldId id="256" r:id="rId2"/></p:sldIdLst><p:sldSz cx="1" cy="1"/></p:presentation>"#,
                NS_RELATIONSHIPS
            )
        );
    }

    #[test]
    fn test_blank_shape_text_keeps_other_shapes() {
        let xml = r#"<p:spTree><p:sp><p:nvSpPr><p:cNvPr id="2" name="A"/></p:nvSpPr><p:txBody><a:p><a:r><a:t>Prompt</a:t></a:r></a:p></p:txBody></p:sp><p:sp><p:nvSpPr><p:cNvPr id="3" name="B"/></p:nvSpPr><p:txBody><a:p><a:r><a:t>Brand</a:t></a:r></a:p></p:txBody></p:sp></p:spTree>"#;
        let out = String::from_utf8(blank_shape_text(xml, &[2]).unwrap()).unwrap();

        assert!(out.contains("<a:t></a:t>"));
        assert!(!out.contains("Prompt"));
        assert!(out.contains("<a:t>Brand</a:t>"));
    }
}
