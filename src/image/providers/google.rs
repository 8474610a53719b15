//! Google Generative Language API binding (Imagen + Gemini image models).

use crate::error::{GenFrameError, Result};
use crate::image::upstream::{
    Candidate, ImagePayload, ReferenceCall, SafetyRating, TextToImageCall, UpstreamClient,
    UpstreamFailure, UpstreamResponse, UpstreamResult,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Imagen model variants used for text-to-image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImagenModel {
    /// Imagen 4 (balanced).
    #[default]
    Imagen4,
    /// Imagen 4 Ultra (highest quality).
    Imagen4Ultra,
    /// Imagen 4 Fast.
    Imagen4Fast,
    /// Imagen 3.
    Imagen3,
}

impl ImagenModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Imagen4 => "imagen-4.0-generate-001",
            Self::Imagen4Ultra => "imagen-4.0-ultra-generate-001",
            Self::Imagen4Fast => "imagen-4.0-fast-generate-001",
            Self::Imagen3 => "imagen-3.0-generate-002",
        }
    }
}

/// Gemini image model variants used for reference-conditioned generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Gemini 2.5 Flash Image (fast, economical).
    #[default]
    FlashImage,
    /// Gemini 3 Pro Image (highest quality).
    ProImage,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FlashImage => "gemini-2.5-flash-image",
            Self::ProImage => "gemini-3-pro-image-preview",
        }
    }
}

/// Builder for [`GoogleClient`].
#[derive(Debug, Clone, Default)]
pub struct GoogleClientBuilder {
    api_key: Option<String>,
    imagen_model: ImagenModel,
    gemini_model: GeminiModel,
    base_url: Option<String>,
}

impl GoogleClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GOOGLE_API_KEY`, then `GEMINI_API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the text-to-image model.
    pub fn imagen_model(mut self, model: ImagenModel) -> Self {
        self.imagen_model = model;
        self
    }

    /// Sets the reference-conditioned model.
    pub fn gemini_model(mut self, model: GeminiModel) -> Self {
        self.gemini_model = model;
        self
    }

    /// Overrides the API origin.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the client, resolving the API key.
    pub fn build(self) -> Result<GoogleClient> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                GenFrameError::InvalidCredentials(
                    "GOOGLE_API_KEY not set and no API key provided".into(),
                )
            })?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(GoogleClient {
            client: reqwest::Client::new(),
            api_key,
            imagen_model: self.imagen_model,
            gemini_model: self.gemini_model,
            base_url,
        })
    }
}

/// Client for the Imagen `:predict` and Gemini `:generateContent` endpoints.
pub struct GoogleClient {
    client: reqwest::Client,
    api_key: String,
    imagen_model: ImagenModel,
    gemini_model: GeminiModel,
    base_url: String,
}

impl GoogleClient {
    /// Creates a new `GoogleClientBuilder`.
    pub fn builder() -> GoogleClientBuilder {
        GoogleClientBuilder::new()
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, model, method)
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        body: &B,
    ) -> std::result::Result<R, UpstreamFailure> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_failure)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text));
        }

        response.json().await.map_err(transport_failure)
    }
}

#[async_trait]
impl UpstreamClient for GoogleClient {
    async fn generate_from_text(&self, call: &TextToImageCall) -> UpstreamResult {
        let url = self.model_url(self.imagen_model.as_str(), "predict");
        let body = ImagenRequest::from_call(call);
        let response: ImagenResponse = self.post(&url, &body).await?;
        Ok(response.into_upstream())
    }

    async fn generate_from_reference(&self, call: &ReferenceCall) -> UpstreamResult {
        let url = self.model_url(self.gemini_model.as_str(), "generateContent");
        let body = GeminiRequest::from_call(call);
        let response: GeminiResponse = self.post(&url, &body).await?;
        Ok(response.into_upstream())
    }

    fn name(&self) -> &str {
        "google"
    }
}

fn transport_failure(err: reqwest::Error) -> UpstreamFailure {
    UpstreamFailure {
        status: err.status().map(|s| s.as_u16()),
        code: None,
        message: err.to_string(),
    }
}

/// Google error envelope: `{"error": {"code", "message", "status"}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

fn parse_error(status: u16, text: &str) -> UpstreamFailure {
    match serde_json::from_str::<ErrorEnvelope>(text) {
        Ok(envelope) => UpstreamFailure {
            status: Some(status),
            code: envelope.error.status,
            message: envelope
                .error
                .message
                .unwrap_or_else(|| format!("HTTP {status}")),
        },
        Err(_) if text.trim().is_empty() => UpstreamFailure::http(status, format!("HTTP {status}")),
        Err(_) => UpstreamFailure::http(status, text),
    }
}

// Imagen request/response types
#[derive(Debug, Serialize)]
struct ImagenRequest {
    instances: Vec<ImagenInstance>,
    parameters: ImagenParameters,
}

#[derive(Debug, Serialize)]
struct ImagenInstance {
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImagenParameters {
    sample_count: u8,
    aspect_ratio: String,
    output_options: ImagenOutputOptions,
    include_rai_reason: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImagenOutputOptions {
    mime_type: String,
}

impl ImagenRequest {
    fn from_call(call: &TextToImageCall) -> Self {
        Self {
            instances: vec![ImagenInstance {
                prompt: call.prompt.clone(),
            }],
            parameters: ImagenParameters {
                sample_count: call.image_count,
                aspect_ratio: call.aspect_ratio.as_str().to_string(),
                output_options: ImagenOutputOptions {
                    mime_type: call.output_format.mime_type().to_string(),
                },
                include_rai_reason: true,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImagenResponse {
    #[serde(default)]
    predictions: Vec<ImagenPrediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImagenPrediction {
    #[serde(default)]
    bytes_base64_encoded: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    rai_filtered_reason: Option<String>,
}

impl ImagenResponse {
    /// Predictions with image bytes come first; filtered ones follow as
    /// safety-stopped candidates.
    fn into_upstream(self) -> UpstreamResponse {
        let (images, filtered): (Vec<_>, Vec<_>) = self
            .predictions
            .into_iter()
            .partition(|p| p.bytes_base64_encoded.is_some());

        let candidates = images
            .into_iter()
            .filter_map(|p| {
                let data = p.bytes_base64_encoded?;
                Some(Candidate {
                    image: Some(ImagePayload {
                        data,
                        mime_type: p.mime_type.unwrap_or_else(|| "image/png".to_string()),
                    }),
                    ..Candidate::default()
                })
            })
            .chain(filtered.into_iter().map(|p| Candidate {
                finish_reason: p.rai_filtered_reason.as_ref().map(|_| "SAFETY".to_string()),
                finish_message: p.rai_filtered_reason,
                ..Candidate::default()
            }))
            .collect();

        UpstreamResponse {
            candidates,
            ..UpstreamResponse::default()
        }
    }
}

// Gemini request/response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
}

impl GeminiRequest {
    fn from_call(call: &ReferenceCall) -> Self {
        let parts = vec![
            GeminiRequestPart::InlineData {
                inline_data: InlineData {
                    mime_type: call.reference.mime_type.clone(),
                    data: call.reference.data.clone(),
                },
            },
            GeminiRequestPart::Text {
                text: call.prompt.clone(),
            },
        ];

        Self {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    finish_message: Option<String>,
    #[serde(default)]
    safety_ratings: Vec<WireSafetyRating>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
    #[serde(default)]
    safety_ratings: Vec<WireSafetyRating>,
}

#[derive(Debug, Deserialize)]
struct WireSafetyRating {
    category: String,
    probability: String,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

fn convert_ratings(ratings: Vec<WireSafetyRating>) -> Vec<SafetyRating> {
    ratings
        .into_iter()
        .map(|r| SafetyRating {
            category: r.category,
            probability: r.probability,
        })
        .collect()
}

impl GeminiResponse {
    fn into_upstream(self) -> UpstreamResponse {
        let (block_reason, block_reason_message, prompt_safety_ratings) = match self.prompt_feedback
        {
            Some(feedback) => (
                feedback.block_reason,
                feedback.block_reason_message,
                convert_ratings(feedback.safety_ratings),
            ),
            None => (None, None, Vec::new()),
        };

        let candidates = self
            .candidates
            .into_iter()
            .map(|c| Candidate {
                image: c
                    .content
                    .and_then(|content| content.parts.into_iter().find_map(|p| p.inline_data))
                    .map(|inline| ImagePayload {
                        data: inline.data,
                        mime_type: inline.mime_type,
                    }),
                finish_reason: c.finish_reason,
                finish_message: c.finish_message,
                safety_ratings: convert_ratings(c.safety_ratings),
            })
            .collect();

        UpstreamResponse {
            block_reason,
            block_reason_message,
            prompt_safety_ratings,
            candidates,
        }
    }
}
