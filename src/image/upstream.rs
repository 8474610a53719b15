//! Boundary to the remote image service.
//!
//! The router only depends on the shapes defined here. A provider binding
//! translates its wire format into [`UpstreamResponse`] and its transport or
//! HTTP failures into [`UpstreamFailure`].

use crate::image::types::{AspectRatio, ImageFormat, ReferenceImage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Parameters for the text-only path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextToImageCall {
    /// Prompt text.
    pub prompt: String,
    /// Number of images to generate.
    pub image_count: u8,
    /// Output encoding.
    pub output_format: ImageFormat,
    /// Requested aspect ratio.
    pub aspect_ratio: AspectRatio,
}

/// Parameters for the reference-conditioned path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceCall {
    /// Prompt text.
    pub prompt: String,
    /// The inline reference image.
    pub reference: ReferenceImage,
}

/// One category/probability pair reported by a safety filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyRating {
    /// Harm category, e.g. `HARM_CATEGORY_DANGEROUS_CONTENT`.
    pub category: String,
    /// Probability bucket, e.g. `MEDIUM`.
    pub probability: String,
}

impl std::fmt::Display for SafetyRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.category, self.probability)
    }
}

/// Image bytes as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// Base64-encoded bytes.
    pub data: String,
    /// MIME type of the bytes.
    pub mime_type: String,
}

/// One generation attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    /// Why generation ended, if reported.
    pub finish_reason: Option<String>,
    /// Free-form explanation accompanying the finish reason.
    pub finish_message: Option<String>,
    /// Per-category safety signals for this candidate.
    pub safety_ratings: Vec<SafetyRating>,
    /// Generated image, if any.
    pub image: Option<ImagePayload>,
}

/// Provider-neutral view of a completed call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpstreamResponse {
    /// Set when the prompt was refused before generation.
    pub block_reason: Option<String>,
    /// Explanation accompanying the block reason.
    pub block_reason_message: Option<String>,
    /// Prompt-level safety signals.
    pub prompt_safety_ratings: Vec<SafetyRating>,
    /// Generation attempts, in service order.
    pub candidates: Vec<Candidate>,
}

impl UpstreamResponse {
    /// A response carrying a single image, mostly useful for stubs.
    pub fn with_image(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                image: Some(ImagePayload {
                    data: data.into(),
                    mime_type: mime_type.into(),
                }),
                ..Candidate::default()
            }],
            ..Self::default()
        }
    }
}

/// A transport or service-level failure that has not been classified yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamFailure {
    /// HTTP status, when the failure came from a response.
    pub status: Option<u16>,
    /// Structured service status such as `RESOURCE_EXHAUSTED`.
    pub code: Option<String>,
    /// Raw message.
    pub message: String,
}

impl UpstreamFailure {
    /// A failure described only by its message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
        }
    }

    /// A failure carrying an HTTP status.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            code: None,
            message: message.into(),
        }
    }

    /// Attaches a structured service status.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl std::fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "[{status}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Result of a single upstream call.
pub type UpstreamResult = std::result::Result<UpstreamResponse, UpstreamFailure>;

/// The two logical operations of the image service.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Generates from text only.
    async fn generate_from_text(&self, call: &TextToImageCall) -> UpstreamResult;

    /// Generates from text plus one inline reference image.
    async fn generate_from_reference(&self, call: &ReferenceCall) -> UpstreamResult;

    /// Short name for logs and display.
    fn name(&self) -> &str;
}
