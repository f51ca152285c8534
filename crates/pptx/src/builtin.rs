//! Built-in carousel templates.
//!
//! Every built-in template is the same square package (three layouts on
//! one master) rendered with a palette per [`ColorVariant`] and prompt
//! text per [`Language`].

use crate::opc::Package;
use carousel_core::{ColorVariant, Language};

const CONTENT_TYPES: &str = include_str!("../resources/builtin/content_types.xml");
const PACKAGE_RELS: &str = include_str!("../resources/builtin/package.rels");
const CORE_PROPS: &str = include_str!("../resources/builtin/core.xml");
const APP_PROPS: &str = include_str!("../resources/builtin/app.xml");
const PRESENTATION: &str = include_str!("../resources/builtin/presentation.xml");
const PRESENTATION_RELS: &str = include_str!("../resources/builtin/presentation.xml.rels");
const PRES_PROPS: &str = include_str!("../resources/builtin/presProps.xml");
const VIEW_PROPS: &str = include_str!("../resources/builtin/viewProps.xml");
const TABLE_STYLES: &str = include_str!("../resources/builtin/tableStyles.xml");
const SLIDE_MASTER: &str = include_str!("../resources/builtin/slideMaster1.xml");
const SLIDE_MASTER_RELS: &str = include_str!("../resources/builtin/slideMaster1.xml.rels");
const SLIDE_LAYOUT_1: &str = include_str!("../resources/builtin/slideLayout1.xml");
const SLIDE_LAYOUT_2: &str = include_str!("../resources/builtin/slideLayout2.xml");
const SLIDE_LAYOUT_3: &str = include_str!("../resources/builtin/slideLayout3.xml");
const SLIDE_LAYOUT_RELS: &str = include_str!("../resources/builtin/slideLayout.xml.rels");
const THEME: &str = include_str!("../resources/builtin/theme1.xml");

/// Part name and source text of every built-in part, in archive order.
const PARTS: [(&str, &str); 18] = [
    ("[Content_Types].xml", CONTENT_TYPES),
    ("_rels/.rels", PACKAGE_RELS),
    ("docProps/core.xml", CORE_PROPS),
    ("docProps/app.xml", APP_PROPS),
    ("ppt/presentation.xml", PRESENTATION),
    ("ppt/_rels/presentation.xml.rels", PRESENTATION_RELS),
    ("ppt/presProps.xml", PRES_PROPS),
    ("ppt/viewProps.xml", VIEW_PROPS),
    ("ppt/tableStyles.xml", TABLE_STYLES),
    ("ppt/slideMasters/slideMaster1.xml", SLIDE_MASTER),
    ("ppt/slideMasters/_rels/slideMaster1.xml.rels", SLIDE_MASTER_RELS),
    ("ppt/slideLayouts/slideLayout1.xml", SLIDE_LAYOUT_1),
    ("ppt/slideLayouts/_rels/slideLayout1.xml.rels", SLIDE_LAYOUT_RELS),
    ("ppt/slideLayouts/slideLayout2.xml", SLIDE_LAYOUT_2),
    ("ppt/slideLayouts/_rels/slideLayout2.xml.rels", SLIDE_LAYOUT_RELS),
    ("ppt/slideLayouts/slideLayout3.xml", SLIDE_LAYOUT_3),
    ("ppt/slideLayouts/_rels/slideLayout3.xml.rels", SLIDE_LAYOUT_RELS),
    ("ppt/theme/theme1.xml", THEME),
];

/// Colors of one variant, as RGB hex without the leading `#`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: &'static str,
    pub text: &'static str,
    pub accent: &'static str,
}

pub fn palette(variant: ColorVariant) -> Palette {
    match variant {
        ColorVariant::Light => Palette {
            background: "FFFFFF",
            text: "1F2937",
            accent: "0A66C2",
        },
        ColorVariant::Dark => Palette {
            background: "111827",
            text: "F9FAFB",
            accent: "38BDF8",
        },
        ColorVariant::Ocean => Palette {
            background: "0B3954",
            text: "FFFFFF",
            accent: "5FB4E5",
        },
    }
}

struct Prompts {
    title: &'static str,
    body: &'static str,
    footer: &'static str,
}

fn prompts(language: Language) -> Prompts {
    match language {
        Language::English => Prompts {
            title: "Click to edit title",
            body: "Click to add text",
            footer: "Footer",
        },
        Language::SpanishHonduras => Prompts {
            title: "Haga clic para modificar el título",
            body: "Haga clic para agregar texto",
            footer: "Pie de página",
        },
    }
}

/// Id of a built-in template, e.g. `en-light` or `es-hn-ocean`.
pub fn builtin_id(language: Language, variant: ColorVariant) -> String {
    format!("{}-{}", language.code(), variant.as_str())
}

fn theme_name(language: Language, variant: ColorVariant) -> String {
    let mut color = variant.as_str().to_string();
    if let Some(first) = color.get_mut(..1) {
        first.make_ascii_uppercase();
    }
    format!("Carousel {} ({})", color, language.lang_tag())
}

/// Render the built-in package for a language and color variant.
pub fn builtin_package(language: Language, variant: ColorVariant) -> Package {
    let colors = palette(variant);
    let prompts = prompts(language);
    let name = theme_name(language, variant);
    let tokens: [(&str, &str); 8] = [
        ("{{BG}}", colors.background),
        ("{{TEXT}}", colors.text),
        ("{{ACCENT}}", colors.accent),
        ("{{LANG}}", language.lang_tag()),
        ("{{TITLE_PROMPT}}", prompts.title),
        ("{{BODY_PROMPT}}", prompts.body),
        ("{{FOOTER_PROMPT}}", prompts.footer),
        ("{{THEME_NAME}}", name.as_str()),
    ];

    let mut package = Package::new();
    for (part_name, source) in PARTS {
        let rendered = tokens
            .iter()
            .fold(source.to_string(), |text, (token, value)| text.replace(token, value));
        package.set_part(part_name, rendered);
    }

    log::debug!(
        "Rendered built-in template {} ({} parts)",
        builtin_id(language, variant),
        package.parts().len()
    );
    package
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ids() {
        assert_eq!(builtin_id(Language::English, ColorVariant::Light), "en-light");
        assert_eq!(
            builtin_id(Language::SpanishHonduras, ColorVariant::Ocean),
            "es-hn-ocean"
        );
    }

    #[test]
    fn test_no_tokens_left_after_rendering() {
        for language in Language::ALL {
            for variant in ColorVariant::ALL {
                let package = builtin_package(language, variant);
                for part in package.parts() {
                    let text = std::str::from_utf8(part.data()).unwrap();
                    assert!(!text.contains("{{"), "token left in {}", part.name());
                }
            }
        }
    }

    #[test]
    fn test_palette_and_language_are_applied() {
        let package = builtin_package(Language::SpanishHonduras, ColorVariant::Dark);
        let master = package.part_text("ppt/slideMasters/slideMaster1.xml").unwrap();
        let layout = package.part_text("ppt/slideLayouts/slideLayout1.xml").unwrap();

        assert!(master.contains(r#"<a:srgbClr val="111827"/>"#));
        assert!(master.contains(r#"lang="es-HN""#));
        assert!(layout.contains("Haga clic para modificar el título"));
        assert_eq!(package.part_names().next(), Some("[Content_Types].xml"));
    }
}
