//! Error types for image generation, history and settings.
//!
//! Every variant's `Display` output is the message shown to the user, so a
//! front end can print `err.to_string()` without further mapping.

use serde::{Deserialize, Serialize};

/// Classification of a failed generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The prompt was refused before generation started.
    PromptBlocked,
    /// Generation ended early for a non-safety reason.
    GenerationStopped,
    /// Generation ended early because of a safety stop.
    ContentBlocked,
    /// The service answered but returned no image.
    NoImageReturned,
    /// The API key was rejected.
    InvalidCredentials,
    /// Quota or rate limit exhausted.
    QuotaExceeded,
    /// The service is temporarily unavailable.
    ServiceUnavailable,
    /// Any other upstream failure.
    UnknownFailure,
    /// The request was rejected locally before being sent.
    InvalidRequest,
    /// A local failure (storage, decoding, I/O).
    Local,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PromptBlocked => "prompt_blocked",
            Self::GenerationStopped => "generation_stopped",
            Self::ContentBlocked => "content_blocked",
            Self::NoImageReturned => "no_image_returned",
            Self::InvalidCredentials => "invalid_credentials",
            Self::QuotaExceeded => "quota_exceeded",
            Self::ServiceUnavailable => "service_unavailable",
            Self::UnknownFailure => "unknown_failure",
            Self::InvalidRequest => "invalid_request",
            Self::Local => "local",
        };
        f.write_str(s)
    }
}

/// Errors that can occur while generating images or managing local state.
#[derive(Debug, thiserror::Error)]
pub enum GenFrameError {
    /// The prompt was blocked by a pre-generation safety filter.
    #[error("Your prompt was blocked: {0}")]
    PromptBlocked(String),

    /// The candidate finished with a non-success reason.
    #[error("Image generation stopped unexpectedly ({reason}){}", detail_suffix(.detail))]
    GenerationStopped {
        /// Finish reason reported upstream.
        reason: String,
        /// Safety signals and finish message, if any.
        detail: String,
    },

    /// The candidate was stopped by a safety filter.
    #[error("The image was blocked by safety filters ({reason}){}", detail_suffix(.detail))]
    ContentBlocked {
        /// Finish reason reported upstream.
        reason: String,
        /// Safety signals and finish message, if any.
        detail: String,
    },

    /// No image payload in an otherwise successful response.
    #[error("The model did not return an image. Try rephrasing your prompt.")]
    NoImageReturned,

    /// API key missing, invalid, or lacking permission.
    #[error("Your API key is invalid or lacks permission. Please enter a valid key. ({0})")]
    InvalidCredentials(String),

    /// Quota or rate limit exceeded.
    #[error("API quota exceeded. Check your plan and billing details, or try again later.")]
    QuotaExceeded(String),

    /// Upstream temporarily unavailable.
    #[error("The image service is temporarily unavailable. Please try again in a few moments.")]
    ServiceUnavailable(String),

    /// Unclassified upstream failure, carrying the raw message.
    #[error("Image generation failed: {0}")]
    UnknownFailure(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Failed to decode base64 or data URI content.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// Key-value store failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// History index outside the current list.
    #[error("no history entry at index {index} (history has {len} entries)")]
    HistoryIndex {
        /// Requested index.
        index: usize,
        /// Number of entries at the time.
        len: usize,
    },

    /// I/O error (e.g., saving file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn detail_suffix(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(": {detail}")
    }
}

impl GenFrameError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PromptBlocked(_) => ErrorKind::PromptBlocked,
            Self::GenerationStopped { .. } => ErrorKind::GenerationStopped,
            Self::ContentBlocked { .. } => ErrorKind::ContentBlocked,
            Self::NoImageReturned => ErrorKind::NoImageReturned,
            Self::InvalidCredentials(_) => ErrorKind::InvalidCredentials,
            Self::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            Self::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            Self::UnknownFailure(_) => ErrorKind::UnknownFailure,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Decode(_)
            | Self::Storage(_)
            | Self::HistoryIndex { .. }
            | Self::Io(_)
            | Self::Json(_) => ErrorKind::Local,
        }
    }

    /// Returns true if the upstream service refused the content.
    pub fn is_safety_block(&self) -> bool {
        matches!(self, Self::PromptBlocked(_) | Self::ContentBlocked { .. })
    }
}

/// Result type alias for generation operations.
pub type Result<T> = std::result::Result<T, GenFrameError>;

const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Redacts API keys and truncates upstream error bodies before they reach a
/// user-facing message or a log line.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let redacted: Vec<String> = text
        .split_inclusive(|c: char| c.is_whitespace() || c == '"' || c == '&' || c == '=')
        .map(|token| {
            let trimmed = token.trim_end_matches(|c: char| {
                c.is_whitespace() || c == '"' || c == '&' || c == '='
            });
            if trimmed.starts_with("AIza") && trimmed.len() > 20 {
                token.replacen(trimmed, "[REDACTED]", 1)
            } else {
                token.to_string()
            }
        })
        .collect();
    let joined = redacted.concat();
    let trimmed = joined.trim();

    if trimmed.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let cut: String = trimmed.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            GenFrameError::PromptBlocked("SAFETY".into()).kind(),
            ErrorKind::PromptBlocked
        );
        assert_eq!(
            GenFrameError::ContentBlocked {
                reason: "SAFETY".into(),
                detail: String::new(),
            }
            .kind(),
            ErrorKind::ContentBlocked
        );
        assert_eq!(GenFrameError::NoImageReturned.kind(), ErrorKind::NoImageReturned);
        assert_eq!(
            GenFrameError::HistoryIndex { index: 3, len: 1 }.kind(),
            ErrorKind::Local
        );
    }

    #[test]
    fn test_error_display() {
        let err = GenFrameError::GenerationStopped {
            reason: "MAX_TOKENS".into(),
            detail: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "Image generation stopped unexpectedly (MAX_TOKENS)"
        );

        let err = GenFrameError::ContentBlocked {
            reason: "SAFETY".into(),
            detail: "HARM_CATEGORY_HARASSMENT: HIGH".into(),
        };
        assert_eq!(
            err.to_string(),
            "The image was blocked by safety filters (SAFETY): HARM_CATEGORY_HARASSMENT: HIGH"
        );

        let err = GenFrameError::UnknownFailure("boom".into());
        assert_eq!(err.to_string(), "Image generation failed: boom");
    }

    #[test]
    fn test_is_safety_block() {
        assert!(GenFrameError::PromptBlocked("x".into()).is_safety_block());
        assert!(!GenFrameError::NoImageReturned.is_safety_block());
        assert!(!GenFrameError::QuotaExceeded("429".into()).is_safety_block());
    }

    #[test]
    fn test_sanitize_redacts_api_key() {
        let msg = "bad key=AIzaSyA1234567890abcdefghijklmnop in request";
        let sanitized = sanitize_error_message(msg);
        assert!(!sanitized.contains("AIzaSy"));
        assert!(sanitized.contains("[REDACTED]"));
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "x".repeat(2000);
        let sanitized = sanitize_error_message(&long);
        assert_eq!(sanitized.chars().count(), MAX_ERROR_MESSAGE_LEN + 3);
        assert!(sanitized.ends_with("..."));
    }
}
