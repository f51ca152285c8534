//! Document exporter: serializes an assembled package to `.pptx` bytes.
//!
//! Entries are deflated and stamped with the ZIP epoch (1980-01-01), so
//! the same package always produces the same bytes. `[Content_Types].xml`
//! is written first; every other part keeps its package order and its
//! bytes.

use crate::assemble::AssembledDeck;
use crate::opc::{Package, CONTENT_TYPES_PART};
use crate::template::Template;
use carousel_core::{Error, ExportError, Result};
use regex::Regex;
use serde::Serialize;
use std::io::{Cursor, Write};
use std::sync::LazyLock;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

static SLUG_SEPARATOR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}]+").unwrap());

const MAX_SLUG_CHARS: usize = 60;

/// A finished presentation ready for download.
#[derive(Debug, Clone, Serialize)]
pub struct ExportedDeck {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub filename: String,
    pub slide_count: usize,
    /// Recovered problems worth showing next to the download.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentExporter;

impl DocumentExporter {
    pub fn new() -> Self {
        Self
    }

    /// Serialize an assembled deck. `name_hint` (usually the topic) names
    /// the download as `{slug}_presentation.pptx`.
    pub fn export(&self, deck: &AssembledDeck, name_hint: &str) -> Result<ExportedDeck> {
        let bytes = write_package(&deck.package)?;

        Template::validate_bytes(&bytes).map_err(|e| {
            log::error!("Exported deck failed validation: {}", e);
            Error::from(ExportError::failed(e))
        })?;

        let filename = download_filename(name_hint);
        log::info!(
            "Exported {} slides as '{}' ({} bytes)",
            deck.slide_count(),
            filename,
            bytes.len()
        );

        Ok(ExportedDeck {
            bytes,
            filename,
            slide_count: deck.slide_count(),
            warnings: deck.warnings(),
        })
    }
}

/// Write a package as a ZIP archive.
pub fn write_package(package: &Package) -> Result<Vec<u8>> {
    write_zip(package).map_err(|e| {
        log::error!("Failed to write presentation archive: {}", e);
        ExportError::failed(e).into()
    })
}

fn write_zip(package: &Package) -> zip::result::ZipResult<Vec<u8>> {
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    let content_types = package.parts().iter().filter(|p| p.name() == CONTENT_TYPES_PART);
    let others = package.parts().iter().filter(|p| p.name() != CONTENT_TYPES_PART);
    for part in content_types.chain(others) {
        zip.start_file(part.name(), options)?;
        zip.write_all(part.data())?;
    }

    Ok(zip.finish()?.into_inner())
}

/// `"AWS vs. Azure!"` -> `aws_vs_azure_presentation.pptx`.
pub fn download_filename(name_hint: &str) -> String {
    let slug = SLUG_SEPARATOR_REGEX
        .replace_all(&name_hint.to_lowercase(), "_")
        .trim_matches('_')
        .chars()
        .take(MAX_SLUG_CHARS)
        .collect::<String>();
    let slug = slug.trim_end_matches('_');

    if slug.is_empty() {
        "carousel_presentation.pptx".to_string()
    } else {
        format!("{}_presentation.pptx", slug)
    }
}
