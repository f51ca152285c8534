//! In-memory OPC package (the ZIP container behind a .pptx).
//!
//! Parts are kept in archive order. Part data is reference counted so a
//! package cloned from a shared template only copies the parts it changes.

use crate::xml::{attr, local_name, XmlBuilder};
use carousel_core::{has_zip_signature, Error, Result, TemplateError};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read, Seek};
use std::sync::Arc;
use zip::ZipArchive;

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const PACKAGE_RELS_PART: &str = "_rels/.rels";
pub const PRESENTATION_PART: &str = "ppt/presentation.xml";

pub const REL_SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
pub const REL_SLIDE_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
pub const CT_SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";

const NS_PACKAGE_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

fn invalid(msg: impl Into<String>) -> Error {
    TemplateError::InvalidTemplateFormat(msg.into()).into()
}

/// A single part (file) inside the package.
#[derive(Debug, Clone)]
pub struct Part {
    name: String,
    data: Arc<[u8]>,
}

impl Part {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Upper bounds on the data a package may decompress to while being read.
/// Sizes declared inside the archive are not trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageLimits {
    pub max_part_bytes: u64,
    pub max_total_bytes: u64,
}

impl Default for PackageLimits {
    fn default() -> Self {
        Self {
            max_part_bytes: 64 * 1024 * 1024,
            max_total_bytes: 256 * 1024 * 1024,
        }
    }
}

/// A PPTX package held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct Package {
    parts: Vec<Part>,
}

impl Package {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a package from raw bytes, checking the ZIP signature first.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with_limits(bytes, PackageLimits::default())
    }

    pub fn from_bytes_with_limits(bytes: &[u8], limits: PackageLimits) -> Result<Self> {
        if !has_zip_signature(bytes) {
            return Err(invalid("missing ZIP container signature"));
        }
        Self::from_reader_with_limits(Cursor::new(bytes), limits)
    }

    /// Read every file entry of a ZIP archive into memory.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        Self::from_reader_with_limits(reader, PackageLimits::default())
    }

    pub fn from_reader_with_limits<R: Read + Seek>(reader: R, limits: PackageLimits) -> Result<Self> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| invalid(format!("Failed to open ZIP: {}", e)))?;

        let mut parts = Vec::new();
        let mut total = 0u64;
        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| invalid(format!("Failed to read ZIP entry {}: {}", i, e)))?;
            if file.is_dir() {
                continue;
            }

            let name = file.name().trim_start_matches('/').to_string();
            let mut data = Vec::new();
            (&mut file)
                .take(limits.max_part_bytes + 1)
                .read_to_end(&mut data)
                .map_err(|e| invalid(format!("Failed to read '{}': {}", name, e)))?;

            let len = data.len() as u64;
            if len > limits.max_part_bytes {
                log::warn!("Part '{}' exceeds {} bytes uncompressed", name, limits.max_part_bytes);
                return Err(invalid(format!(
                    "part '{}' is larger than {} bytes",
                    name, limits.max_part_bytes
                )));
            }
            total += len;
            if total > limits.max_total_bytes {
                log::warn!("Package exceeds {} bytes uncompressed", limits.max_total_bytes);
                return Err(invalid(format!(
                    "package is larger than {} bytes uncompressed",
                    limits.max_total_bytes
                )));
            }

            parts.push(Part {
                name,
                data: data.into(),
            });
        }

        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.iter().any(|p| p.name == name)
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.iter().find(|p| p.name == name).map(|p| p.data())
    }

    /// A part decoded as UTF-8 text.
    pub fn part_text(&self, name: &str) -> Result<&str> {
        let data = self
            .part(name)
            .ok_or_else(|| invalid(format!("missing part '{}'", name)))?;
        let data = data.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(data);
        std::str::from_utf8(data).map_err(|e| invalid(format!("part '{}' is not UTF-8: {}", name, e)))
    }

    /// Replace a part's data, or append the part if it is new.
    pub fn set_part(&mut self, name: &str, data: impl Into<Vec<u8>>) {
        let data: Vec<u8> = data.into();
        let data: Arc<[u8]> = data.into();
        match self.parts.iter_mut().find(|p| p.name == name) {
            Some(part) => part.data = data,
            None => self.parts.push(Part {
                name: name.to_string(),
                data,
            }),
        }
    }

    /// Remove every part whose name matches the predicate; returns their names.
    pub fn remove_parts_where(&mut self, mut pred: impl FnMut(&str) -> bool) -> Vec<String> {
        let mut removed = Vec::new();
        self.parts.retain(|p| {
            if pred(&p.name) {
                removed.push(p.name.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Names of all parts, in archive order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    /// Relationships of a part; an absent rels part means none.
    pub fn relationships(&self, part_name: &str) -> Result<Vec<Relationship>> {
        let rels_name = rels_part_name(part_name);
        if !self.contains(&rels_name) {
            return Ok(Vec::new());
        }
        parse_relationships(self.part_text(&rels_name)?)
    }

    pub fn set_relationships(&mut self, part_name: &str, rels: &[Relationship]) -> Result<()> {
        let xml = relationships_xml(rels).map_err(|e| invalid(e.to_string()))?;
        self.set_part(&rels_part_name(part_name), xml);
        Ok(())
    }
}

/// One `<Relationship>` entry of a rels part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

impl Relationship {
    pub fn new(id: impl Into<String>, rel_type: &str, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rel_type: rel_type.to_string(),
            target: target.into(),
            external: false,
        }
    }

    /// True if the relationship type ends with the given short type
    /// (e.g. "slide" does not match "slideLayout").
    pub fn is_type(&self, short: &str) -> bool {
        self.rel_type.rsplit('/').next() == Some(short)
    }

    /// Part name the target points to, resolved against the source part.
    pub fn resolve(&self, source_part: &str) -> Option<String> {
        if self.external {
            return None;
        }
        Some(resolve_target(source_part, &self.target))
    }
}

/// `ppt/slides/slide1.xml` -> `ppt/slides/_rels/slide1.xml.rels`.
pub fn rels_part_name(part_name: &str) -> String {
    match part_name.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None if part_name.is_empty() => PACKAGE_RELS_PART.to_string(),
        None => format!("_rels/{}.rels", part_name),
    }
}

/// Resolve a relationship target relative to the source part's directory.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for seg in target.split('/') {
        match seg {
            ".." => {
                segments.pop();
            }
            "." | "" => {}
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Relative target from one part to another (inverse of [`resolve_target`]).
pub fn relative_target(source_part: &str, target_part: &str) -> String {
    let from: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let to: Vec<&str> = target_part.split('/').collect();
    let (to_dirs, file) = to.split_at(to.len().saturating_sub(1));

    let common = from.iter().zip(to_dirs).take_while(|(a, b)| a == b).count();
    let mut segments: Vec<&str> = vec![".."; from.len() - common];
    segments.extend_from_slice(&to_dirs[common..]);
    segments.extend_from_slice(file);
    segments.join("/")
}

/// Parse a rels part.
pub fn parse_relationships(xml: &str) -> Result<Vec<Relationship>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut rels = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                let (Some(id), Some(target)) = (attr(e, b"Id"), attr(e, b"Target")) else {
                    log::warn!("Skipping relationship without Id or Target");
                    continue;
                };
                rels.push(Relationship {
                    id,
                    rel_type: attr(e, b"Type").unwrap_or_default(),
                    target,
                    external: attr(e, b"TargetMode").is_some_and(|m| m == "External"),
                });
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(invalid(format!("Error parsing relationships: {}", e))),
            _ => {}
        }
    }

    Ok(rels)
}

pub fn relationships_xml(rels: &[Relationship]) -> quick_xml::Result<Vec<u8>> {
    let mut xml = XmlBuilder::document()?;
    xml.start("Relationships", &[("xmlns", NS_PACKAGE_RELS)])?;
    for rel in rels {
        let mut attrs = vec![
            ("Id", rel.id.as_str()),
            ("Type", rel.rel_type.as_str()),
            ("Target", rel.target.as_str()),
        ];
        if rel.external {
            attrs.push(("TargetMode", "External"));
        }
        xml.empty("Relationship", &attrs)?;
    }
    xml.end("Relationships")?;
    Ok(xml.into_bytes())
}

/// Next free `rIdN` id among existing relationships.
pub fn next_rel_id(rels: &[Relationship]) -> usize {
    rels.iter()
        .filter_map(|r| r.id.strip_prefix("rId").and_then(|n| n.parse::<usize>().ok()))
        .max()
        .unwrap_or(0)
        + 1
}

/// The `[Content_Types].xml` part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    /// (extension, content type)
    pub defaults: Vec<(String, String)>,
    /// (part name with leading slash, content type)
    pub overrides: Vec<(String, String)>,
}

impl ContentTypes {
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        let mut types = Self::default();

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    match local_name(e.name().as_ref()) {
                        b"Default" => {
                            if let (Some(ext), Some(ct)) = (attr(e, b"Extension"), attr(e, b"ContentType")) {
                                types.defaults.push((ext, ct));
                            }
                        }
                        b"Override" => {
                            if let (Some(name), Some(ct)) = (attr(e, b"PartName"), attr(e, b"ContentType")) {
                                types.overrides.push((name, ct));
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(invalid(format!("Error parsing content types: {}", e))),
                _ => {}
            }
        }

        Ok(types)
    }

    pub fn remove_override(&mut self, part_name: &str) {
        let key = format!("/{}", part_name);
        self.overrides.retain(|(name, _)| *name != key);
    }

    pub fn set_override(&mut self, part_name: &str, content_type: &str) {
        self.remove_override(part_name);
        self.overrides
            .push((format!("/{}", part_name), content_type.to_string()));
    }

    /// Content type registered for a part, by override or extension.
    pub fn content_type_of(&self, part_name: &str) -> Option<&str> {
        let key = format!("/{}", part_name);
        if let Some((_, ct)) = self.overrides.iter().find(|(name, _)| *name == key) {
            return Some(ct);
        }
        let ext = part_name.rsplit_once('.')?.1;
        self.defaults
            .iter()
            .find(|(e, _)| e.eq_ignore_ascii_case(ext))
            .map(|(_, ct)| ct.as_str())
    }

    pub fn to_xml(&self) -> quick_xml::Result<Vec<u8>> {
        let mut xml = XmlBuilder::document()?;
        xml.start("Types", &[("xmlns", NS_CONTENT_TYPES)])?;
        for (ext, ct) in &self.defaults {
            xml.empty("Default", &[("Extension", ext.as_str()), ("ContentType", ct.as_str())])?;
        }
        for (name, ct) in &self.overrides {
            xml.empty("Override", &[("PartName", name.as_str()), ("ContentType", ct.as_str())])?;
        }
        xml.end("Types")?;
        Ok(xml.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/>
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/>
  <Relationship Id="rId9" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/>
</Relationships>"#;

    fn zip_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
        use std::io::Write;
        use zip::write::FileOptions;

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    /// Overwrite the uncompressed size in every local and central header.
    fn declare_size(bytes: &mut [u8], size: u32) {
        let patch = |bytes: &mut [u8], signature: &[u8; 4], offset: usize| {
            let starts: Vec<usize> = bytes
                .windows(4)
                .enumerate()
                .filter(|(_, w)| *w == signature)
                .map(|(i, _)| i)
                .collect();
            for start in starts {
                bytes[start + offset..start + offset + 4].copy_from_slice(&size.to_le_bytes());
            }
        };
        patch(bytes, b"PK\x03\x04", 22);
        patch(bytes, b"PK\x01\x02", 24);
    }

    #[test]
    fn test_declared_sizes_are_not_trusted() {
        let mut bytes = zip_of(&[("ppt/presentation.xml", b"<p:presentation/>")]);
        declare_size(&mut bytes, 0xFFFF_FFF0);

        let package = Package::from_bytes(&bytes).unwrap();

        assert_eq!(package.part(PRESENTATION_PART), Some(&b"<p:presentation/>"[..]));
    }

    #[test]
    fn test_oversized_parts_are_rejected() {
        let big = vec![b'a'; 4096];
        let bytes = zip_of(&[("a.xml", big.as_slice()), ("b.xml", big.as_slice())]);

        let per_part = PackageLimits { max_part_bytes: 1024, max_total_bytes: 1 << 20 };
        let err = Package::from_bytes_with_limits(&bytes, per_part).unwrap_err();
        assert_eq!(err.kind(), "invalid_template_format");

        let total = PackageLimits { max_part_bytes: 4096, max_total_bytes: 6000 };
        let err = Package::from_bytes_with_limits(&bytes, total).unwrap_err();
        assert!(err.to_string().contains("package is larger than 6000 bytes"));

        let roomy = PackageLimits { max_part_bytes: 4096, max_total_bytes: 8192 };
        assert_eq!(Package::from_bytes_with_limits(&bytes, roomy).unwrap().parts().len(), 2);
    }

    #[test]
    fn test_parse_relationships() {
        let rels = parse_relationships(RELS).unwrap();

        assert_eq!(rels.len(), 3);
        assert!(rels[0].is_type("slide"));
        assert!(!rels[1].is_type("slide"));
        assert!(rels[2].external);
        assert_eq!(next_rel_id(&rels), 10);
        assert_eq!(
            rels[0].resolve(PRESENTATION_PART).as_deref(),
            Some("ppt/slides/slide1.xml")
        );
        assert_eq!(rels[2].resolve(PRESENTATION_PART), None);
    }

    #[test]
    fn test_relationships_roundtrip() {
        let rels = parse_relationships(RELS).unwrap();
        let xml = relationships_xml(&rels).unwrap();

        assert_eq!(parse_relationships(std::str::from_utf8(&xml).unwrap()).unwrap(), rels);
    }

    #[test]
    fn test_rels_part_name() {
        assert_eq!(
            rels_part_name("ppt/slides/slide1.xml"),
            "ppt/slides/_rels/slide1.xml.rels"
        );
        assert_eq!(rels_part_name(""), "_rels/.rels");
    }

    #[test]
    fn test_target_resolution() {
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "../slideLayouts/slideLayout2.xml"),
            "ppt/slideLayouts/slideLayout2.xml"
        );
        assert_eq!(resolve_target("ppt/presentation.xml", "/ppt/media/a.png"), "ppt/media/a.png");
        assert_eq!(
            relative_target("ppt/slides/slide1.xml", "ppt/slideLayouts/slideLayout2.xml"),
            "../slideLayouts/slideLayout2.xml"
        );
        assert_eq!(
            relative_target("ppt/presentation.xml", "ppt/slides/slide3.xml"),
            "slides/slide3.xml"
        );
    }

    #[test]
    fn test_content_types() {
        let xml = r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
            <Default Extension="xml" ContentType="application/xml"/>
            <Override PartName="/ppt/slides/slide1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>
        </Types>"#;
        let mut types = ContentTypes::parse(xml).unwrap();

        assert_eq!(types.content_type_of("ppt/slides/slide1.xml"), Some(CT_SLIDE));
        assert_eq!(types.content_type_of("ppt/other.xml"), Some("application/xml"));

        types.remove_override("ppt/slides/slide1.xml");
        types.set_override("ppt/slides/slide2.xml", CT_SLIDE);
        let reparsed = ContentTypes::parse(std::str::from_utf8(&types.to_xml().unwrap()).unwrap()).unwrap();

        assert_eq!(reparsed, types);
        assert_eq!(reparsed.overrides.len(), 1);
    }

    #[test]
    fn test_rejects_non_zip_bytes() {
        let err = Package::from_bytes(b"not a zip at all").unwrap_err();
        assert!(matches!(
            err,
            Error::Template(TemplateError::InvalidTemplateFormat(_))
        ));

        let err = Package::from_bytes(b"PK\x03\x04truncated").unwrap_err();
        assert!(matches!(
            err,
            Error::Template(TemplateError::InvalidTemplateFormat(_))
        ));
    }
}
