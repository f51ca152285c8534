//! End-to-end deck generation: normalize content, resolve the template,
//! assemble slides, export bytes.

use crate::assemble::SlideAssembler;
use crate::export::{DocumentExporter, ExportedDeck};
use crate::registry::{TemplateRegistry, TemplateSummary};
use carousel_core::{
    CarouselRequest, ContentNormalizer, ContentSource, ContentStyle, Error, Language, Result,
    TemplateSelector,
};

/// Configured pipeline over a template registry.
#[derive(Debug, Clone)]
pub struct DeckPipeline<'r> {
    registry: &'r TemplateRegistry,
    normalizer: ContentNormalizer,
    assembler: SlideAssembler,
    exporter: DocumentExporter,
}

impl Default for DeckPipeline<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl DeckPipeline<'static> {
    /// Pipeline over the process-wide registry with default settings.
    pub fn new() -> Self {
        DeckPipeline::with_registry(TemplateRegistry::global())
    }
}

impl<'r> DeckPipeline<'r> {
    pub fn with_registry(registry: &'r TemplateRegistry) -> Self {
        Self {
            registry,
            normalizer: ContentNormalizer::new(),
            assembler: SlideAssembler::new(),
            exporter: DocumentExporter::new(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: ContentNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_assembler(mut self, assembler: SlideAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn registry(&self) -> &'r TemplateRegistry {
        self.registry
    }

    /// Build a presentation from generated content. The download is named
    /// after the first slide title.
    pub fn assemble(
        &self,
        content: &str,
        selector: &TemplateSelector,
        style: ContentStyle,
    ) -> Result<ExportedDeck> {
        self.run(content, selector, style, None)
    }

    /// Ask `source` for content once and build a presentation from it. The
    /// download is named after the request topic.
    pub fn generate_and_assemble<S>(
        &self,
        source: &S,
        request: &CarouselRequest,
        selector: &TemplateSelector,
    ) -> Result<ExportedDeck>
    where
        S: ContentSource + ?Sized,
    {
        log::info!(
            "Requesting {} slides about '{}' ({})",
            request.num_slides,
            request.topic.trim(),
            request.language
        );
        let content = source.generate(request).map_err(|e| {
            log::warn!("Content source failed: {}", e);
            Error::ContentSource(e)
        })?;

        let normalizer = self.normalizer.clone().with_max_slides(request.num_slides);
        let pipeline = Self {
            normalizer,
            ..self.clone()
        };
        pipeline.run(&content, selector, request.style, Some(request.topic.trim()))
    }

    fn run(
        &self,
        content: &str,
        selector: &TemplateSelector,
        style: ContentStyle,
        name_hint: Option<&str>,
    ) -> Result<ExportedDeck> {
        let normalized = self.normalizer.normalize(content, style)?;
        let template = self.registry.resolve(selector)?;
        let assembled = self.assembler.assemble(&template, &normalized.deck)?;

        let first_title = normalized
            .deck
            .slides()
            .first()
            .map(|s| s.title.as_str())
            .unwrap_or_default();
        let name_hint = name_hint.filter(|h| !h.is_empty()).unwrap_or(first_title);

        let mut exported = self.exporter.export(&assembled, name_hint)?;

        let mut warnings: Vec<String> = normalized.issues.iter().map(ToString::to_string).collect();
        warnings.append(&mut exported.warnings);
        exported.warnings = warnings;

        log::info!(
            "Built '{}' on template '{}' with {} warnings",
            exported.filename,
            template.id(),
            exported.warnings.len()
        );
        Ok(exported)
    }
}

/// Build a presentation from generated content with default settings.
pub fn assemble_deck(
    content: &str,
    selector: &TemplateSelector,
    style: ContentStyle,
) -> Result<ExportedDeck> {
    DeckPipeline::new().assemble(content, selector, style)
}

/// Built-in templates available for a language.
pub fn list_templates(language: Language) -> Vec<TemplateSummary> {
    TemplateRegistry::global().list_templates(language)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::DeckInspector;
    use crate::template::Template;
    use carousel_core::{BoxError, ColorVariant, InputError, TemplateError};
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    const BULLETS_JSON: &str = r#"{"slides": [
        {"title": "Why Rust", "points": ["A", "B", "C"]},
        {"title": "Ownership", "points": ["Moves", "Borrows"]},
        {"title": "Tooling", "points": ["Cargo"]}
    ]}"#;

    fn english_light() -> TemplateSelector {
        TemplateSelector::built_in(Language::English, ColorVariant::Light)
    }

    fn eight_slides() -> String {
        let slides: Vec<String> = (1..=8)
            .map(|i| format!(r#"{{"title": "Part {}", "points": ["x{}"]}}"#, i, i))
            .collect();
        format!("[{}]", slides.join(","))
    }

    /// A template built from two plain text boxes, without placeholder
    /// metadata. `top` names the upper box and `lower` the one below it.
    fn textbox_template(top: &str, lower: &str) -> Vec<u8> {
        let parts = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/></Types>"#,
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/></Relationships>"#,
            ),
            (
                "ppt/presentation.xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:sldSz cx="9144000" cy="6858000"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#,
            ),
            (
                "ppt/slideLayouts/slideLayout1.xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldLayout xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld name="Boxes"><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>
<p:sp><p:nvSpPr><p:cNvPr id="2" name="LOWER"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="457200" y="2286000"/><a:ext cx="8229600" cy="3657600"/></a:xfrm></p:spPr><p:txBody><a:bodyPr/><a:p><a:r><a:t>Lorem ipsum</a:t></a:r></a:p></p:txBody></p:sp>
<p:sp><p:nvSpPr><p:cNvPr id="3" name="TOP"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="457200" y="457200"/><a:ext cx="8229600" cy="1143000"/></a:xfrm></p:spPr><p:txBody><a:bodyPr/><a:p><a:r><a:t>Heading</a:t></a:r></a:p></p:txBody></p:sp>
</p:spTree></p:cSld></p:sldLayout>"#,
            ),
        ];

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, xml) in parts {
            let xml = xml.replace("TOP", top).replace("LOWER", lower);
            zip.start_file(name, FileOptions::default()).unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_slide_count_matches_deck_and_output_is_valid() {
        let registry = TemplateRegistry::new();
        let exported = DeckPipeline::with_registry(&registry)
            .assemble(BULLETS_JSON, &english_light(), ContentStyle::Bullets)
            .unwrap();

        assert_eq!(exported.slide_count, 3);
        assert_eq!(exported.filename, "why_rust_presentation.pptx");
        assert!(Template::validate_bytes(&exported.bytes).is_ok());

        let slides = DeckInspector::new().inspect_bytes(&exported.bytes).unwrap();
        assert_eq!(slides.len(), 3);
        assert_eq!(slides[1].title().as_deref(), Some("Ownership"));
    }

    #[test]
    fn test_identical_inputs_give_identical_output() {
        let registry = TemplateRegistry::new();
        let pipeline = DeckPipeline::with_registry(&registry);
        let selector = TemplateSelector::built_in(Language::SpanishHonduras, ColorVariant::Ocean);

        let first = pipeline.assemble(BULLETS_JSON, &selector, ContentStyle::Mixed).unwrap();
        let second = pipeline.assemble(BULLETS_JSON, &selector, ContentStyle::Mixed).unwrap();

        assert_eq!(first.bytes, second.bytes);
    }

    #[test]
    fn test_empty_content_produces_no_deck() {
        let registry = TemplateRegistry::new();
        let pipeline = DeckPipeline::with_registry(&registry);

        for content in ["", "   ", "[]", r#"{"slides": []}"#] {
            let err = pipeline
                .assemble(content, &english_light(), ContentStyle::Bullets)
                .unwrap_err();
            assert!(
                matches!(err, Error::Input(InputError::EmptyContent)),
                "{:?} gave {:?}",
                content,
                err
            );
        }
        assert_eq!(registry.cached_count(), 0);
    }

    #[test]
    fn test_eight_slides_cycle_three_layouts() {
        let registry = TemplateRegistry::new();
        let exported = DeckPipeline::with_registry(&registry)
            .assemble(&eight_slides(), &english_light(), ContentStyle::Bullets)
            .unwrap();
        let slides = DeckInspector::new().inspect_bytes(&exported.bytes).unwrap();

        let layouts: Vec<String> = slides.iter().filter_map(|s| s.layout.clone()).collect();
        let names = ["Title and Content", "Statement", "Content with Footer"];
        let expected: Vec<&str> = [0, 1, 2, 0, 1, 2, 0, 1].iter().map(|&i| names[i]).collect();
        assert_eq!(layouts, expected);
        assert_eq!(slides[7].title().as_deref(), Some("Part 8"));
    }

    #[test]
    fn test_bullets_are_written_in_order() {
        let registry = TemplateRegistry::new();
        let exported = DeckPipeline::with_registry(&registry)
            .assemble(BULLETS_JSON, &english_light(), ContentStyle::Bullets)
            .unwrap();
        let slides = DeckInspector::new().inspect_bytes(&exported.bytes).unwrap();

        let bullets: Vec<&str> = slides[0]
            .paragraphs()
            .filter(|p| p.bulleted)
            .map(|p| p.text.as_str())
            .collect();
        assert_eq!(bullets, ["A", "B", "C"]);
    }

    #[test]
    fn test_metadata_less_upload_still_gets_a_body() {
        let registry = TemplateRegistry::new();
        let selector = TemplateSelector::uploaded(
            "boxes.pptx",
            Language::English,
            textbox_template("Rectangle 2", "Rectangle 1"),
        );
        let exported = DeckPipeline::with_registry(&registry)
            .assemble(BULLETS_JSON, &selector, ContentStyle::Bullets)
            .unwrap();

        let slides = DeckInspector::new().inspect_bytes(&exported.bytes).unwrap();
        assert_eq!(slides.len(), 3);
        let texts: Vec<&str> = slides[0].paragraphs().map(|p| p.text.as_str()).collect();
        assert!(texts.contains(&"Why Rust"));
        assert!(texts.contains(&"A") && texts.contains(&"C"));
        assert!(!texts.contains(&"Lorem ipsum"));
    }

    #[test]
    fn test_default_text_box_names_keep_titles() {
        let registry = TemplateRegistry::new();
        let selector = TemplateSelector::uploaded(
            "boxes.pptx",
            Language::English,
            textbox_template("TextBox 3", "TextBox 4"),
        );
        let exported = DeckPipeline::with_registry(&registry)
            .assemble(BULLETS_JSON, &selector, ContentStyle::Bullets)
            .unwrap();

        assert!(exported.warnings.is_empty(), "{:?}", exported.warnings);
        let slides = DeckInspector::new().inspect_bytes(&exported.bytes).unwrap();
        let shapes = &slides[0].shapes;
        assert_eq!(shapes[0].text(), "Why Rust");
        assert_eq!(shapes[0].y, 457_200);
        assert_eq!(shapes[1].text(), "A\nB\nC");
        assert_eq!(shapes[1].y, 2_286_000);
    }

    #[test]
    fn test_template_without_layouts_gives_no_bytes() {
        let registry = TemplateRegistry::new();
        let mut package = Template::builtin(Language::English, ColorVariant::Dark)
            .unwrap()
            .package()
            .clone();
        package.remove_parts_where(|n| n.starts_with("ppt/slideLayouts/"));
        let bytes = crate::export::write_package(&package).unwrap();
        let selector = TemplateSelector::uploaded("bare.pptx", Language::English, bytes);

        let err = DeckPipeline::with_registry(&registry)
            .assemble(BULLETS_JSON, &selector, ContentStyle::Bullets)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Template(TemplateError::NoLayoutAvailable { .. })
        ));
    }

    #[test]
    fn test_malformed_sections_become_warnings() {
        let registry = TemplateRegistry::new();
        let content = r#"[{"title": "One", "points": ["a"]}, null]"#;
        let exported = DeckPipeline::with_registry(&registry)
            .assemble(content, &english_light(), ContentStyle::Bullets)
            .unwrap();

        assert_eq!(exported.slide_count, 2);
        assert!(exported.warnings[0].contains("Slide section 1 is malformed"));
    }

    #[test]
    fn test_generate_and_assemble_names_file_after_topic() {
        let registry = TemplateRegistry::new();
        let calls = std::cell::Cell::new(0);
        let source = |request: &CarouselRequest| -> std::result::Result<String, BoxError> {
            calls.set(calls.get() + 1);
            assert!(request.system_prompt().contains("2 presentation slides"));
            Ok(eight_slides())
        };
        let request = CarouselRequest::new("AWS vs. Azure", Language::English, ContentStyle::Bullets)
            .with_num_slides(2);

        let exported = DeckPipeline::with_registry(&registry)
            .generate_and_assemble(&source, &request, &english_light())
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(exported.slide_count, 2);
        assert_eq!(exported.filename, "aws_vs_azure_presentation.pptx");
    }

    #[test]
    fn test_content_source_failure_is_reported() {
        let registry = TemplateRegistry::new();
        let source = |_: &CarouselRequest| -> std::result::Result<String, BoxError> {
            Err("service unavailable".into())
        };
        let request = CarouselRequest::new("Topic", Language::English, ContentStyle::Bullets);

        let err = DeckPipeline::with_registry(&registry)
            .generate_and_assemble(&source, &request, &english_light())
            .unwrap_err();

        assert_eq!(err.kind(), "content_source");
        assert!(err.to_string().contains("service unavailable"));
    }

    #[test]
    fn test_list_templates_over_global_registry() {
        let ids: Vec<String> = list_templates(Language::English)
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, ["en-light", "en-dark", "en-ocean"]);
    }
}
