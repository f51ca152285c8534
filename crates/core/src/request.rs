//! Generation requests and the content source seam.
//!
//! The content source (an AI text service) is outside this workspace; it
//! is reached through [`ContentSource`] and treated as a blocking call
//! whose latency is bounded by the caller.

use crate::error::BoxError;
use crate::types::{ContentStyle, Language};
use serde::{Deserialize, Serialize};

/// Default number of slides asked for.
pub const DEFAULT_NUM_SLIDES: usize = 10;

/// What the person making the request told us about themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessionalContext {
    pub experience: String,
    pub achievements: String,
    pub interests: String,
    pub audience: String,
}

impl ProfessionalContext {
    /// Render as the labelled block sent along with the topic.
    pub fn render(&self) -> String {
        let or_default = |value: &str, default: &'static str| -> String {
            if value.trim().is_empty() {
                default.to_string()
            } else {
                value.trim().to_string()
            }
        };

        format!(
            "Experience: {}\nAchievements: {}\nInterests: {}\nAudience: {}",
            self.experience.trim(),
            self.achievements.trim(),
            or_default(&self.interests, "general interests"),
            or_default(&self.audience, "general public"),
        )
    }
}

/// A request for carousel slide content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarouselRequest {
    pub topic: String,
    pub context: ProfessionalContext,
    pub language: Language,
    pub style: ContentStyle,
    pub num_slides: usize,
}

impl CarouselRequest {
    pub fn new(topic: impl Into<String>, language: Language, style: ContentStyle) -> Self {
        Self {
            topic: topic.into(),
            context: ProfessionalContext::default(),
            language,
            style,
            num_slides: DEFAULT_NUM_SLIDES,
        }
    }

    pub fn with_context(mut self, context: ProfessionalContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_num_slides(mut self, num_slides: usize) -> Self {
        self.num_slides = num_slides.max(1);
        self
    }

    fn content_guideline(&self) -> &'static str {
        match self.style {
            ContentStyle::Bullets => "Include 3-4 concise bullet points per slide",
            ContentStyle::Paragraph => "Include 2 short paragraphs per slide",
            ContentStyle::Mixed => {
                "Include 1 short paragraph followed by 3-4 concise bullet points per slide"
            }
        }
    }

    /// Instructions for the content source, including the JSON contract
    /// the normalizer expects.
    pub fn system_prompt(&self) -> String {
        format!(
            "Create content for {} presentation slides {}.\n\
             Follow these guidelines:\n\
             1. Each slide should have a clear, concise title\n\
             2. {}\n\
             3. Maintain consistent narrative flow\n\
             4. Use professional language\n\
             Return a JSON object with this structure:\n\
             {{\"slides\": [{{\"title\": \"string\", \"points\": [\"string\"], \"paragraph\": \"string\"}}]}}",
            self.num_slides,
            self.language.prompt_phrase(),
            self.content_guideline(),
        )
    }

    /// The topic together with the professional context.
    pub fn user_prompt(&self) -> String {
        format!(
            "Create presentation content about: {}\n\n{}",
            self.topic.trim(),
            self.context.render()
        )
    }
}

/// External producer of structured slide text.
pub trait ContentSource {
    /// Produce structured text for the request. Called once per request;
    /// retries belong to the caller.
    fn generate(&self, request: &CarouselRequest) -> Result<String, BoxError>;
}

impl<F> ContentSource for F
where
    F: Fn(&CarouselRequest) -> Result<String, BoxError>,
{
    fn generate(&self, request: &CarouselRequest) -> Result<String, BoxError> {
        self(request)
    }
}
