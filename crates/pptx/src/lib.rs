//! PPTX (Office Open XML) backend for carousel decks.
//!
//! Templates are ZIP packages of XML parts. This crate loads them, finds
//! the placeholders of each slide layout, writes deck content into new
//! slides, and serializes the result back to `.pptx` bytes.

pub mod assemble;
pub mod builtin;
pub mod classify;
pub mod export;
pub mod inspect;
pub mod opc;
pub mod pipeline;
pub mod registry;
pub mod template;
pub mod xml;

pub use assemble::{AssembledDeck, AssembledSlide, SlideAssembler};
pub use export::{download_filename, DocumentExporter, ExportedDeck};
pub use inspect::{DeckInspector, InspectedParagraph, InspectedShape, InspectedSlide};
pub use opc::{Package, PackageLimits};
pub use pipeline::{assemble_deck, list_templates, DeckPipeline};
pub use registry::{TemplateRegistry, TemplateSummary};
pub use template::{Layout, PlaceholderShape, Template, TemplateSource};
