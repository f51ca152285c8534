//! Loaded presentation templates and their slide layouts.
//!
//! A [`Template`] owns the package it was read from plus the raw shapes of
//! every slide layout. The placeholder map of each layout is derived from
//! those shapes on first use and never changes afterwards.

use crate::builtin::{builtin_id, builtin_package};
use crate::classify::{classify_shapes, metadata_role, Classification};
use crate::opc::{ContentTypes, Package, CONTENT_TYPES_PART, PRESENTATION_PART};
use crate::xml::{attr, attr_num, extract_part_number, local_name};
use carousel_core::{
    ColorVariant, Error, Language, PlaceholderRole, Result, TemplateError, TextFrame,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const LAYOUT_PREFIX: &str = "ppt/slideLayouts/slideLayout";

fn invalid(msg: impl Into<String>) -> Error {
    TemplateError::InvalidTemplateFormat(msg.into()).into()
}

/// Where a template came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// Shipped template; `path` is set when it was read from a templates
    /// directory instead of being rendered in memory.
    BuiltIn { path: Option<PathBuf> },
    /// Uploaded with a request.
    Uploaded { filename: String },
}

/// Slide dimensions in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideSize {
    pub cx: i64,
    pub cy: i64,
}

impl Default for SlideSize {
    /// 10" x 7.5", the size PowerPoint assumes when `sldSz` is absent.
    fn default() -> Self {
        Self {
            cx: 9_144_000,
            cy: 6_858_000,
        }
    }
}

/// Position and extent of a shape in EMU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShapeFrame {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

impl ShapeFrame {
    pub fn text_frame(&self) -> TextFrame {
        TextFrame::new(self.cx, self.cy)
    }

    fn has_extent(&self) -> bool {
        self.cx > 0 && self.cy > 0
    }
}

/// The `<p:ph>` element of a placeholder shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderRef {
    pub ph_type: Option<String>,
    pub idx: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// A shape with a text body.
    Text,
    /// A `<p:pic>` element.
    Picture,
    Other,
}

/// A shape as read from a layout or master part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawShape {
    pub id: u32,
    pub name: String,
    pub kind: ShapeKind,
    pub placeholder: Option<PlaceholderRef>,
    pub frame: Option<ShapeFrame>,
    /// Text content, one line per paragraph.
    pub text: String,
}

impl RawShape {
    fn new(kind: ShapeKind) -> Self {
        Self {
            id: 0,
            name: String::new(),
            kind,
            placeholder: None,
            frame: None,
            text: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct LayoutShapes {
    part_name: String,
    name: String,
    shapes: Vec<RawShape>,
}

/// A layout shape chosen to receive one kind of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderShape {
    pub shape_id: u32,
    pub name: String,
    /// Present when the shape is a real placeholder; slides then refer to
    /// it and inherit its position and formatting.
    pub placeholder: Option<PlaceholderRef>,
    pub frame: Option<ShapeFrame>,
    pub classification: Classification,
}

/// One slide layout of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// 0-based position among the template's layouts.
    pub index: usize,
    pub name: String,
    pub part_name: String,
    pub placeholders: BTreeMap<PlaceholderRole, PlaceholderShape>,
}

impl Layout {
    pub fn placeholder(&self, role: PlaceholderRole) -> Option<&PlaceholderShape> {
        self.placeholders.get(&role)
    }

    /// Ids of shapes that were claimed by the name/position heuristics.
    pub fn heuristic_shape_ids(&self) -> Vec<u32> {
        self.placeholders
            .values()
            .filter(|p| matches!(p.classification, Classification::Heuristic(_)))
            .map(|p| p.shape_id)
            .collect()
    }
}

/// A presentation template. Immutable once loaded.
#[derive(Debug)]
pub struct Template {
    id: String,
    language: Language,
    color_variant: Option<ColorVariant>,
    source: TemplateSource,
    package: Package,
    slide_size: SlideSize,
    layout_shapes: Vec<LayoutShapes>,
    layouts: OnceLock<Vec<Layout>>,
}

impl Template {
    /// Build a template from an already opened package.
    pub fn from_package(
        id: impl Into<String>,
        language: Language,
        color_variant: Option<ColorVariant>,
        source: TemplateSource,
        package: Package,
    ) -> Result<Self> {
        let id = id.into();
        let slide_size = validate_package(&package)?;
        let layout_shapes = read_layouts(&package)?;

        log::debug!(
            "Loaded template '{}': {} layouts, slide size {}x{}",
            id,
            layout_shapes.len(),
            slide_size.cx,
            slide_size.cy
        );

        Ok(Self {
            id,
            language,
            color_variant,
            source,
            package,
            slide_size,
            layout_shapes,
            layouts: OnceLock::new(),
        })
    }

    /// Render a built-in template in memory.
    pub fn builtin(language: Language, color_variant: ColorVariant) -> Result<Self> {
        Self::from_package(
            builtin_id(language, color_variant),
            language,
            Some(color_variant),
            TemplateSource::BuiltIn { path: None },
            builtin_package(language, color_variant),
        )
    }

    /// Read a built-in template from a file in a templates directory.
    pub fn builtin_from_file(
        language: Language,
        color_variant: ColorVariant,
        path: &Path,
    ) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_package(
            builtin_id(language, color_variant),
            language,
            Some(color_variant),
            TemplateSource::BuiltIn {
                path: Some(path.to_path_buf()),
            },
            Package::from_bytes(&bytes)?,
        )
    }

    /// Parse an uploaded template.
    pub fn from_upload(filename: &str, language: Language, bytes: &[u8]) -> Result<Self> {
        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("template");

        Self::from_package(
            format!("upload:{}", stem),
            language,
            None,
            TemplateSource::Uploaded {
                filename: filename.to_string(),
            },
            Package::from_bytes(bytes)?,
        )
    }

    /// Check that bytes hold a readable PPTX package.
    pub fn validate_bytes(bytes: &[u8]) -> Result<()> {
        let package = Package::from_bytes(bytes)?;
        validate_package(&package).map(|_| ())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn color_variant(&self) -> Option<ColorVariant> {
        self.color_variant
    }

    pub fn source(&self) -> &TemplateSource {
        &self.source
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn slide_size(&self) -> SlideSize {
        self.slide_size
    }

    /// Slide layouts ordered by part number, with their placeholder maps.
    pub fn layouts(&self) -> &[Layout] {
        self.layouts.get_or_init(|| {
            self.layout_shapes
                .iter()
                .enumerate()
                .map(|(index, raw)| build_layout(index, raw, self.slide_size))
                .collect()
        })
    }
}

fn build_layout(index: usize, raw: &LayoutShapes, slide_size: SlideSize) -> Layout {
    let placeholders: BTreeMap<PlaceholderRole, PlaceholderShape> =
        classify_shapes(&raw.shapes, slide_size.cx)
            .into_iter()
            .map(|(role, (i, classification))| {
                let shape = &raw.shapes[i];
                (
                    role,
                    PlaceholderShape {
                        shape_id: shape.id,
                        name: shape.name.clone(),
                        placeholder: match classification {
                            Classification::Metadata => shape.placeholder.clone(),
                            Classification::Heuristic(_) => None,
                        },
                        frame: shape.frame,
                        classification,
                    },
                )
            })
            .collect();

    log::debug!(
        "Layout {} '{}' ({}): {:?}",
        index,
        raw.name,
        raw.part_name,
        placeholders
            .iter()
            .map(|(role, p)| (role, p.name.as_str(), p.classification))
            .collect::<Vec<_>>()
    );

    Layout {
        index,
        name: raw.name.clone(),
        part_name: raw.part_name.clone(),
        placeholders,
    }
}

/// Structural checks shared by every load path; returns the slide size.
fn validate_package(package: &Package) -> Result<SlideSize> {
    for required in [CONTENT_TYPES_PART, PRESENTATION_PART] {
        if !package.contains(required) {
            return Err(invalid(format!("missing required part '{}'", required)));
        }
    }
    ContentTypes::parse(package.part_text(CONTENT_TYPES_PART)?)?;
    read_slide_size(package.part_text(PRESENTATION_PART)?)
}

fn read_slide_size(xml: &str) -> Result<SlideSize> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut saw_root = false;
    let mut size = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                match local_name(e.name().as_ref()) {
                    b"presentation" => saw_root = true,
                    b"sldSz" => {
                        let default = SlideSize::default();
                        size = Some(SlideSize {
                            cx: attr_num(e, b"cx").unwrap_or(default.cx),
                            cy: attr_num(e, b"cy").unwrap_or(default.cy),
                        });
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(invalid(format!("Error parsing presentation.xml: {}", e))),
            _ => {}
        }
    }

    if !saw_root {
        return Err(invalid("ppt/presentation.xml is not a presentation part"));
    }
    Ok(size.unwrap_or_default())
}

fn is_layout_part(name: &str) -> bool {
    name.starts_with(LAYOUT_PREFIX) && name.ends_with(".xml")
}

fn read_layouts(package: &Package) -> Result<Vec<LayoutShapes>> {
    let mut names: Vec<(usize, String)> = package
        .part_names()
        .filter(|n| is_layout_part(n))
        .map(|n| (extract_part_number(n).unwrap_or(usize::MAX), n.to_string()))
        .collect();
    names.sort();

    let mut masters: HashMap<String, Vec<RawShape>> = HashMap::new();
    let mut layouts = Vec::with_capacity(names.len());

    for (_, part_name) in names {
        let (name, mut shapes) = read_shape_tree(package.part_text(&part_name)?, &part_name)?;

        let master_part = package
            .relationships(&part_name)?
            .iter()
            .find(|r| r.is_type("slideMaster"))
            .and_then(|r| r.resolve(&part_name));

        if let Some(master_part) = master_part {
            let master_shapes = match masters.entry(master_part) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => {
                    let shapes = match package.part_text(e.key()) {
                        Ok(xml) => read_shape_tree(xml, e.key())?.1,
                        Err(_) => {
                            log::warn!("Slide master '{}' is missing", e.key());
                            Vec::new()
                        }
                    };
                    e.insert(shapes)
                }
            };
            inherit_frames(&mut shapes, master_shapes);
        }

        let name = name.unwrap_or_else(|| {
            part_name
                .rsplit('/')
                .next()
                .unwrap_or(&part_name)
                .trim_end_matches(".xml")
                .to_string()
        });
        layouts.push(LayoutShapes {
            part_name,
            name,
            shapes,
        });
    }

    Ok(layouts)
}

/// Give placeholders without their own position the frame of the matching
/// master placeholder (same `idx`, else same role).
fn inherit_frames(shapes: &mut [RawShape], master: &[RawShape]) {
    for shape in shapes.iter_mut() {
        let Some(ph) = &shape.placeholder else {
            continue;
        };
        if shape.frame.is_some_and(|f| f.has_extent()) {
            continue;
        }

        let role = metadata_role(ph.ph_type.as_deref());
        let inherited = master
            .iter()
            .filter(|m| m.frame.is_some_and(|f| f.has_extent()))
            .find(|m| {
                matches!((&m.placeholder, ph.idx), (Some(mp), Some(idx)) if mp.idx == Some(idx))
            })
            .or_else(|| {
                master.iter().filter(|m| m.frame.is_some_and(|f| f.has_extent())).find(|m| {
                    m.placeholder
                        .as_ref()
                        .is_some_and(|mp| role.is_some() && metadata_role(mp.ph_type.as_deref()) == role)
                })
            });

        if let Some(source) = inherited {
            shape.frame = source.frame;
        }
    }
}

/// Read the `cSld` name and every shape of a layout, master or slide part.
pub(crate) fn read_shape_tree(xml: &str, part_name: &str) -> Result<(Option<String>, Vec<RawShape>)> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut name = None;
    let mut shapes = Vec::new();
    let mut current: Option<RawShape> = None;
    let mut in_xfrm = false;
    let mut in_text_body = false;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"sp" => current = Some(RawShape::new(ShapeKind::Other)),
                b"pic" => current = Some(RawShape::new(ShapeKind::Picture)),
                b"cSld" => name = attr(e, b"name"),
                b"xfrm" if current.is_some() => in_xfrm = true,
                b"txBody" => {
                    if let Some(shape) = current.as_mut() {
                        if shape.kind == ShapeKind::Other {
                            shape.kind = ShapeKind::Text;
                        }
                        in_text_body = true;
                    }
                }
                b"p" if in_text_body => {
                    if let Some(shape) = current.as_mut() {
                        if !shape.text.is_empty() {
                            shape.text.push('\n');
                        }
                    }
                }
                b"t" if in_text_body => in_text = true,
                _ => {
                    if let Some(shape) = current.as_mut() {
                        apply_shape_attributes(shape, e, in_xfrm);
                    }
                }
            },
            Ok(Event::Empty(ref e)) => {
                if let Some(shape) = current.as_mut() {
                    apply_shape_attributes(shape, e, in_xfrm);
                }
            }
            Ok(Event::Text(ref e)) if in_text => {
                if let Some(shape) = current.as_mut() {
                    shape.text.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"sp" | b"pic" => {
                    if let Some(mut shape) = current.take() {
                        shape.text = shape.text.trim().to_string();
                        shapes.push(shape);
                    }
                    in_xfrm = false;
                    in_text_body = false;
                    in_text = false;
                }
                b"xfrm" => in_xfrm = false,
                b"txBody" => in_text_body = false,
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(invalid(format!("Error parsing '{}': {}", part_name, e)));
            }
            _ => {}
        }
    }

    Ok((name, shapes))
}

fn apply_shape_attributes(shape: &mut RawShape, e: &BytesStart<'_>, in_xfrm: bool) {
    match local_name(e.name().as_ref()) {
        b"cNvPr" => {
            shape.id = attr_num(e, b"id").unwrap_or(0);
            shape.name = attr(e, b"name").unwrap_or_default();
        }
        b"ph" => {
            shape.placeholder = Some(PlaceholderRef {
                ph_type: attr(e, b"type"),
                idx: attr_num(e, b"idx"),
            });
        }
        b"off" if in_xfrm => {
            let frame = shape.frame.get_or_insert_with(ShapeFrame::default);
            frame.x = attr_num(e, b"x").unwrap_or(0);
            frame.y = attr_num(e, b"y").unwrap_or(0);
        }
        b"ext" if in_xfrm => {
            let frame = shape.frame.get_or_insert_with(ShapeFrame::default);
            frame.cx = attr_num(e, b"cx").unwrap_or(0);
            frame.cy = attr_num(e, b"cy").unwrap_or(0);
        }
        _ => {}
    }
}
