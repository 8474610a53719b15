//! Core types for image generation.

use crate::error::{GenFrameError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Maximum number of images a single text-to-image call may request.
pub const MAX_IMAGE_COUNT: u8 = 4;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    Png,
    /// JPEG format (lossy).
    #[default]
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Parses a MIME type such as `image/png`.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Picks the format a file name asks for, e.g. `fox.webp`.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?;
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// Aspect ratios accepted by the text-to-image model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 1:1 square aspect ratio.
    #[default]
    #[serde(rename = "1:1")]
    Square,
    /// 3:4 portrait aspect ratio.
    #[serde(rename = "3:4")]
    StandardPortrait,
    /// 4:3 landscape aspect ratio.
    #[serde(rename = "4:3")]
    Standard,
    /// 9:16 tall portrait aspect ratio.
    #[serde(rename = "9:16")]
    Portrait,
    /// 16:9 widescreen aspect ratio.
    #[serde(rename = "16:9")]
    Landscape,
}

impl AspectRatio {
    /// All supported ratios, in display order.
    pub const ALL: [AspectRatio; 5] = [
        Self::Square,
        Self::StandardPortrait,
        Self::Standard,
        Self::Portrait,
        Self::Landscape,
    ];

    /// Returns the aspect ratio as a string (e.g., "16:9").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::StandardPortrait => "3:4",
            Self::Standard => "4:3",
            Self::Portrait => "9:16",
            Self::Landscape => "16:9",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AspectRatio {
    type Err = GenFrameError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| GenFrameError::InvalidRequest(format!("unsupported aspect ratio: {s}")))
    }
}

/// An image supplied by the user to condition generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceImage {
    /// Base64-encoded image bytes.
    pub data: String,
    /// MIME type of the image.
    pub mime_type: String,
}

impl ReferenceImage {
    /// Creates a reference image from already-encoded data.
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Encodes raw bytes, detecting the MIME type from magic bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let format = ImageFormat::from_magic_bytes(bytes).ok_or_else(|| {
            GenFrameError::InvalidRequest("reference image is not a PNG, JPEG or WebP file".into())
        })?;
        Ok(Self::new(
            base64::engine::general_purpose::STANDARD.encode(bytes),
            format.mime_type(),
        ))
    }

    /// Reads and encodes an image file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Parses a `data:<mime>;base64,<payload>` URI.
    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let (mime_type, data) = split_data_uri(uri)?;
        Ok(Self::new(data, mime_type))
    }

    /// Returns the image as a data URI.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// A request to generate one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// The text prompt describing the desired image.
    pub prompt: String,
    /// Number of images to request on the text-only path.
    pub image_count: u8,
    /// Desired output format.
    pub output_format: ImageFormat,
    /// Aspect ratio. Ignored when a reference image is present.
    pub aspect_ratio: AspectRatio,
    /// Reference image for image-conditioned generation.
    pub reference_image: Option<ReferenceImage>,
}

impl GenerationRequest {
    /// Creates a new request with the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image_count: 1,
            output_format: ImageFormat::default(),
            aspect_ratio: AspectRatio::default(),
            reference_image: None,
        }
    }

    /// Sets the number of images requested upstream.
    pub fn with_image_count(mut self, count: u8) -> Self {
        self.image_count = count;
        self
    }

    /// Sets the aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    /// Sets the desired output format.
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Sets a reference image, switching to the reference-conditioned path.
    pub fn with_reference_image(mut self, image: ReferenceImage) -> Self {
        self.reference_image = Some(image);
        self
    }

    /// Returns true if this request carries a reference image.
    pub fn has_reference(&self) -> bool {
        self.reference_image.is_some()
    }

    /// Checks the request before it is sent anywhere.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(GenFrameError::InvalidRequest("prompt must not be empty".into()));
        }
        if self.image_count == 0 || self.image_count > MAX_IMAGE_COUNT {
            return Err(GenFrameError::InvalidRequest(format!(
                "image count must be between 1 and {MAX_IMAGE_COUNT}, got {}",
                self.image_count
            )));
        }
        if let Some(ref reference) = self.reference_image {
            if reference.data.is_empty() {
                return Err(GenFrameError::InvalidRequest(
                    "reference image has no data".into(),
                ));
            }
        }
        Ok(())
    }
}

/// A generated image, held as a self-describing data URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[must_use = "generated image should be saved or processed"]
pub struct GeneratedImage {
    uri: String,
}

impl GeneratedImage {
    /// Wraps a base64 payload and its MIME type.
    pub fn new(mime_type: &str, base64_data: &str) -> Self {
        Self {
            uri: format!("data:{mime_type};base64,{base64_data}"),
        }
    }

    /// Validates and wraps an existing data URI.
    pub fn from_data_uri(uri: impl Into<String>) -> Result<Self> {
        let uri = uri.into();
        split_data_uri(&uri)?;
        Ok(Self { uri })
    }

    /// Returns the full data URI.
    pub fn data_uri(&self) -> &str {
        &self.uri
    }

    /// Returns the MIME type.
    pub fn mime_type(&self) -> &str {
        split_data_uri(&self.uri).map(|(mime, _)| mime).unwrap_or("")
    }

    /// Returns the base64 payload.
    pub fn base64_data(&self) -> &str {
        split_data_uri(&self.uri).map(|(_, data)| data).unwrap_or("")
    }

    /// Returns the format, if it is one we know.
    pub fn format(&self) -> Option<ImageFormat> {
        ImageFormat::from_mime_type(self.mime_type())
    }

    /// Decodes the payload into raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(self.base64_data())
            .map_err(|e| GenFrameError::Decode(e.to_string()))
    }

    /// Saves the decoded image to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.decode()?)?;
        Ok(())
    }

    /// Suggested file name for downloading this image.
    pub fn file_name(&self, stem: &str) -> String {
        let ext = self.format().map(|f| f.extension()).unwrap_or("img");
        format!("{stem}.{ext}")
    }
}

fn split_data_uri(uri: &str) -> Result<(&str, &str)> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| GenFrameError::Decode("not a data URI".into()))?;
    let (mime, data) = rest
        .split_once(";base64,")
        .ok_or_else(|| GenFrameError::Decode("data URI is not base64-encoded".into()))?;
    if mime.is_empty() {
        return Err(GenFrameError::Decode("data URI has no MIME type".into()));
    }
    Ok((mime, data))
}
