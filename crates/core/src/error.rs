//! Error types for deck generation and assembly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed cause carried by errors that wrap a lower-level failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Problems with the generated content itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// No usable slide could be recovered from the content.
    #[error("No usable slide content was generated")]
    EmptyContent,

    /// A section of the content could not be interpreted.
    #[error("Slide section {index} is malformed: {reason}")]
    MalformedSection { index: usize, reason: String },
}

/// Problems with the presentation template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The bytes are not a readable PPTX package.
    #[error("Invalid template format: {0}")]
    InvalidTemplateFormat(String),

    /// The template defines no slide layouts to build slides from.
    #[error("Template '{template_id}' has no slide layouts")]
    NoLayoutAvailable { template_id: String },
}

/// Problems while serializing the finished deck.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to export presentation: {source}")]
    ExportFailed {
        #[source]
        source: BoxError,
    },
}

impl ExportError {
    /// Wrap any error as an export failure.
    pub fn failed(source: impl Into<BoxError>) -> Self {
        Self::ExportFailed {
            source: source.into(),
        }
    }
}

/// Errors that can occur anywhere in the generation pipeline.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Export(#[from] ExportError),

    /// Failed to read a template or content file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// The external content source failed.
    #[error("Content generation failed: {0}")]
    ContentSource(#[source] BoxError),
}

impl Error {
    /// Stable machine-readable kind, used in [`ErrorReport`].
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Input(InputError::EmptyContent) => "empty_content",
            Error::Input(InputError::MalformedSection { .. }) => "malformed_section",
            Error::Template(TemplateError::InvalidTemplateFormat(_)) => "invalid_template_format",
            Error::Template(TemplateError::NoLayoutAvailable { .. }) => "no_layout_available",
            Error::Export(_) => "export_failed",
            Error::Io(_) => "io",
            Error::ContentSource(_) => "content_source",
        }
    }

    /// A message suitable for showing to the person who made the request.
    pub fn user_message(&self) -> String {
        match self {
            Error::Input(InputError::EmptyContent) => {
                "No slide content could be generated for this topic. Try again or rephrase the topic."
                    .to_string()
            }
            Error::Input(InputError::MalformedSection { index, .. }) => format!(
                "The generated content for slide {} could not be read. Try generating again.",
                index + 1
            ),
            Error::Template(TemplateError::InvalidTemplateFormat(_)) => {
                "The uploaded file is not a valid PowerPoint (.pptx) template. Upload a .pptx file saved from PowerPoint, Keynote or LibreOffice."
                    .to_string()
            }
            Error::Template(TemplateError::NoLayoutAvailable { .. }) => {
                "The template has no slide layouts to build slides from. Add at least one slide layout to the template's master and upload it again."
                    .to_string()
            }
            Error::Export(_) => {
                "The presentation could not be saved. Try again or choose another template."
                    .to_string()
            }
            Error::Io(_) => "A template file could not be read.".to_string(),
            Error::ContentSource(_) => {
                "The content service is unavailable right now. Try again in a few minutes."
                    .to_string()
            }
        }
    }
}

/// Structured error object returned at the pipeline boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Machine-readable error kind.
    pub kind: String,
    /// User-facing message.
    pub message: String,
    /// Underlying technical detail.
    pub detail: String,
}

impl From<&Error> for ErrorReport {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.user_message(),
            detail: err.to_string(),
        }
    }
}
