//! Core domain types, content normalization, and formatting rules
//! for carousel deck generation.

pub mod error;
pub mod normalize;
pub mod overflow;
pub mod request;
pub mod style;
pub mod types;

pub use error::{BoxError, Error, ErrorReport, ExportError, InputError, Result, TemplateError};
pub use normalize::{ContentNormalizer, NormalizedDeck};
pub use overflow::{fit_body, truncate_with_marker, FittedBody, OverflowPolicy, TextFrame};
pub use request::{CarouselRequest, ContentSource, ProfessionalContext};
pub use style::{strategy_for, BodyParagraph, StyleRules, StyleStrategy};
pub use types::{
    has_zip_signature, ColorVariant, ContentStyle, Deck, Language, PlaceholderRole, SlideBody,
    SlideContent, TemplateSelector,
};
