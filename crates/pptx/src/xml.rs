//! Small helpers shared by the XML readers and writers.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

pub const NS_PRESENTATIONML: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
pub const NS_DRAWINGML: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const NS_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Extract the local name from a potentially namespaced XML element name.
pub fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Unescaped value of an attribute, looked up by its local name.
pub fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| local_name(a.key.as_ref()) == key)
        .map(|a| match a.unescape_value() {
            Ok(v) => v.into_owned(),
            Err(_) => String::from_utf8_lossy(&a.value).into_owned(),
        })
}

/// Attribute parsed as a number.
pub fn attr_num<T: std::str::FromStr>(e: &BytesStart<'_>, key: &[u8]) -> Option<T> {
    attr(e, key).and_then(|v| v.trim().parse().ok())
}

/// Extract a trailing number from a string like "rId2" or "slideLayout3.xml".
pub fn extract_part_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}

/// Thin wrapper over [`quick_xml::Writer`] for building parts in memory.
pub struct XmlBuilder {
    writer: Writer<Vec<u8>>,
}

impl XmlBuilder {
    /// Start a standalone UTF-8 document.
    pub fn document() -> quick_xml::Result<Self> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        Ok(Self { writer })
    }

    pub fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> quick_xml::Result<&mut Self> {
        let el = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Start(el))?;
        Ok(self)
    }

    pub fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> quick_xml::Result<&mut Self> {
        let el = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Empty(el))?;
        Ok(self)
    }

    pub fn end(&mut self, name: &str) -> quick_xml::Result<&mut Self> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(self)
    }

    /// Write `<name>text</name>` with the text escaped. Characters XML 1.0
    /// cannot carry are dropped.
    pub fn text_element(&mut self, name: &str, text: &str) -> quick_xml::Result<&mut Self> {
        self.start(name, &[])?;
        let text = xml_safe(text);
        self.writer.write_event(Event::Text(BytesText::new(&text)))?;
        self.end(name)
    }

    /// Pass an event read from another document through unchanged.
    pub fn event(&mut self, event: Event<'_>) -> quick_xml::Result<&mut Self> {
        self.writer.write_event(event)?;
        Ok(self)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_inner()
    }

    pub fn into_string(self) -> String {
        String::from_utf8_lossy(&self.into_bytes()).into_owned()
    }
}

fn xml_safe(text: &str) -> String {
    text.chars()
        .filter(|&c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

/// Writer for rewriting an existing part without adding a declaration.
pub fn passthrough() -> XmlBuilder {
    XmlBuilder {
        writer: Writer::new(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_part_number() {
        assert_eq!(extract_part_number("rId1"), Some(1));
        assert_eq!(extract_part_number("rId12"), Some(12));
        assert_eq!(extract_part_number("slideLayout1.xml"), Some(1));
        assert_eq!(extract_part_number("slide123.xml"), Some(123));
        assert_eq!(extract_part_number("nodigits"), None);
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"p:sp"), b"sp");
        assert_eq!(local_name(b"a:t"), b"t");
        assert_eq!(local_name(b"sp"), b"sp");
    }

    #[test]
    fn test_builder_escapes_text() {
        let mut xml = XmlBuilder::document().unwrap();
        xml.start("a:p", &[("lang", "en-US")]).unwrap();
        xml.text_element("a:t", "R&D <fast>").unwrap();
        xml.end("a:p").unwrap();
        let out = xml.into_string();

        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>"));
        assert!(out.contains("<a:p lang=\"en-US\"><a:t>R&amp;D &lt;fast&gt;</a:t></a:p>"));
    }

    #[test]
    fn test_builder_drops_control_characters() {
        let mut xml = passthrough();
        xml.text_element("a:t", "tab\there\u{0B}\u{1}").unwrap();
        assert_eq!(xml.into_string(), "<a:t>tab\there</a:t>");
    }
}
