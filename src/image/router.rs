//! Chooses the upstream path for a request and normalizes the outcome.

use crate::error::{sanitize_error_message, GenFrameError, Result};
use crate::image::types::{GeneratedImage, GenerationRequest};
use crate::image::upstream::{
    ReferenceCall, SafetyRating, TextToImageCall, UpstreamClient, UpstreamFailure,
    UpstreamResponse,
};
use crate::notify::{Notifier, StudioEvent};
use std::time::Instant;

/// Which upstream operation a request is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPath {
    /// Text-to-image; honors the aspect ratio.
    TextOnly,
    /// Text plus reference image; ignores the aspect ratio.
    ReferenceConditioned,
}

impl GenerationPath {
    /// Selects the path for a request. A reference image always wins.
    pub fn for_request(request: &GenerationRequest) -> Self {
        if request.has_reference() {
            Self::ReferenceConditioned
        } else {
            Self::TextOnly
        }
    }
}

const SUCCESS_FINISH_REASONS: &[&str] = &["STOP", "FINISH_REASON_UNSPECIFIED"];

const SAFETY_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "IMAGE_SAFETY",
    "PROHIBITED_CONTENT",
    "IMAGE_PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
    "RECITATION",
    "IMAGE_RECITATION",
];

/// Routes generation requests to an [`UpstreamClient`].
pub struct Router<C> {
    client: C,
    notifier: Notifier,
}

impl<C: UpstreamClient> Router<C> {
    /// Creates a router with its own notifier.
    pub fn new(client: C) -> Self {
        Self::with_notifier(client, Notifier::new())
    }

    /// Creates a router that reports credential failures on `notifier`.
    pub fn with_notifier(client: C, notifier: Notifier) -> Self {
        Self { client, notifier }
    }

    /// Returns the notifier used for credential failures.
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Generates one image for `request`.
    pub async fn route(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        request.validate()?;

        let path = GenerationPath::for_request(request);
        let start = Instant::now();
        tracing::debug!(
            upstream = self.client.name(),
            ?path,
            aspect_ratio = %request.aspect_ratio,
            image_count = request.image_count,
            "dispatching generation request"
        );

        let outcome = match (path, &request.reference_image) {
            (GenerationPath::ReferenceConditioned, Some(reference)) => {
                let call = ReferenceCall {
                    prompt: request.prompt.clone(),
                    reference: reference.clone(),
                };
                self.client.generate_from_reference(&call).await
            }
            _ => {
                let call = TextToImageCall {
                    prompt: request.prompt.clone(),
                    image_count: request.image_count,
                    output_format: request.output_format,
                    aspect_ratio: request.aspect_ratio,
                };
                self.client.generate_from_text(&call).await
            }
        };

        let result = match outcome {
            Ok(response) => normalize_response(response),
            Err(failure) => Err(self.classify_failure(failure)),
        };

        match &result {
            Ok(image) => tracing::debug!(
                elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                mime_type = image.mime_type(),
                "generation succeeded"
            ),
            Err(e) => tracing::warn!(kind = %e.kind(), "generation failed: {e}"),
        }
        result
    }

    fn classify_failure(&self, failure: UpstreamFailure) -> GenFrameError {
        let error = classify_failure(&failure);
        if let GenFrameError::InvalidCredentials(ref message) = error {
            self.notifier.notify(StudioEvent::CredentialsRejected {
                message: message.clone(),
            });
        }
        error
    }
}

/// Turns a completed upstream response into an image or a classified error.
pub fn normalize_response(response: UpstreamResponse) -> Result<GeneratedImage> {
    if let Some(reason) = response.block_reason {
        let mut parts = vec![reason];
        if let Some(message) = response.block_reason_message {
            parts.push(message);
        }
        let ratings = join_ratings(&response.prompt_safety_ratings);
        if !ratings.is_empty() {
            parts.push(ratings);
        }
        return Err(GenFrameError::PromptBlocked(parts.join(". ")));
    }

    if let Some(candidate) = response.candidates.first() {
        if let Some(reason) = candidate.finish_reason.as_deref() {
            if !SUCCESS_FINISH_REASONS.contains(&reason) {
                let mut detail = join_ratings(&candidate.safety_ratings);
                if let Some(message) = candidate.finish_message.as_deref() {
                    detail = if detail.is_empty() {
                        message.to_string()
                    } else {
                        format!("{message}. {detail}")
                    };
                }
                let reason = reason.to_string();
                return Err(if SAFETY_FINISH_REASONS.contains(&reason.as_str()) {
                    GenFrameError::ContentBlocked { reason, detail }
                } else {
                    GenFrameError::GenerationStopped { reason, detail }
                });
            }
        }
    }

    response
        .candidates
        .into_iter()
        .find_map(|c| c.image)
        .filter(|payload| !payload.data.is_empty())
        .map(|payload| GeneratedImage::new(&payload.mime_type, &payload.data))
        .ok_or(GenFrameError::NoImageReturned)
}

/// Maps a transport/service failure onto the error taxonomy.
///
/// Structured status and code win; the message is only searched when
/// neither classifies the failure.
pub fn classify_failure(failure: &UpstreamFailure) -> GenFrameError {
    let message = sanitize_error_message(&failure.message);

    let by_status = failure.status.and_then(|status| match status {
        401 | 403 => Some(GenFrameError::InvalidCredentials(message.clone())),
        429 => Some(GenFrameError::QuotaExceeded(message.clone())),
        500 | 502 | 503 | 504 => Some(GenFrameError::ServiceUnavailable(message.clone())),
        _ => None,
    });
    if let Some(error) = by_status {
        return error;
    }

    let by_code = failure.code.as_deref().and_then(|code| match code {
        "UNAUTHENTICATED" | "PERMISSION_DENIED" => {
            Some(GenFrameError::InvalidCredentials(message.clone()))
        }
        "RESOURCE_EXHAUSTED" => Some(GenFrameError::QuotaExceeded(message.clone())),
        "UNAVAILABLE" => Some(GenFrameError::ServiceUnavailable(message.clone())),
        _ => None,
    });
    if let Some(error) = by_code {
        return error;
    }

    let lower = message.to_lowercase();
    if lower.contains("api key not valid")
        || lower.contains("api_key_invalid")
        || message.contains("401")
        || message.contains("403")
    {
        GenFrameError::InvalidCredentials(message)
    } else if message.contains("429") || lower.contains("quota") || lower.contains("resource_exhausted")
    {
        GenFrameError::QuotaExceeded(message)
    } else if message.contains("503") || lower.contains("unavailable") || lower.contains("overloaded")
    {
        GenFrameError::ServiceUnavailable(message)
    } else {
        GenFrameError::UnknownFailure(message)
    }
}

fn join_ratings(ratings: &[SafetyRating]) -> String {
    ratings
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::image::types::{AspectRatio, ReferenceImage};
    use crate::image::upstream::{Candidate, ImagePayload, UpstreamResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Text(TextToImageCall),
        Reference(ReferenceCall),
    }

    struct StubClient {
        reply: UpstreamResult,
        seen: Mutex<Vec<Seen>>,
    }

    impl StubClient {
        fn replying(reply: UpstreamResult) -> Self {
            Self {
                reply,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<Seen> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl UpstreamClient for StubClient {
        async fn generate_from_text(&self, call: &TextToImageCall) -> UpstreamResult {
            self.seen.lock().unwrap().push(Seen::Text(call.clone()));
            self.reply.clone()
        }

        async fn generate_from_reference(&self, call: &ReferenceCall) -> UpstreamResult {
            self.seen.lock().unwrap().push(Seen::Reference(call.clone()));
            self.reply.clone()
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn reference() -> ReferenceImage {
        ReferenceImage::new("iVBORw0KGgo=", "image/png")
    }

    fn stopped(reason: &str, ratings: Vec<SafetyRating>) -> UpstreamResponse {
        UpstreamResponse {
            candidates: vec![Candidate {
                finish_reason: Some(reason.into()),
                safety_ratings: ratings,
                ..Candidate::default()
            }],
            ..UpstreamResponse::default()
        }
    }

    #[tokio::test]
    async fn test_text_only_path_without_reference() {
        let router = Router::new(StubClient::replying(Ok(UpstreamResponse::with_image(
            "image/jpeg",
            "abc",
        ))));
        for ratio in AspectRatio::ALL {
            let request = GenerationRequest::new("a red fox").with_aspect_ratio(ratio);
            router.route(&request).await.unwrap();
        }
        let seen = router.client().seen();
        assert_eq!(seen.len(), 5);
        assert!(seen.iter().all(|s| matches!(s, Seen::Text(_))));
        assert!(matches!(
            &seen[4],
            Seen::Text(call) if call.aspect_ratio == AspectRatio::Landscape
        ));
    }

    #[tokio::test]
    async fn test_reference_path_with_reference() {
        let router = Router::new(StubClient::replying(Ok(UpstreamResponse::with_image(
            "image/png",
            "abc",
        ))));
        let request = GenerationRequest::new("make it snowy")
            .with_aspect_ratio(AspectRatio::Portrait)
            .with_image_count(3)
            .with_reference_image(reference());
        router.route(&request).await.unwrap();

        let seen = router.client().seen();
        assert_eq!(
            seen,
            vec![Seen::Reference(ReferenceCall {
                prompt: "make it snowy".into(),
                reference: reference(),
            })]
        );
    }

    #[tokio::test]
    async fn test_red_fox_returns_payload_unchanged() {
        let router = Router::new(StubClient::replying(Ok(UpstreamResponse::with_image(
            "image/jpeg",
            "/9j/4AAQSkZJRg==",
        ))));
        let request = GenerationRequest::new("a red fox").with_aspect_ratio(AspectRatio::Landscape);
        let image = router.route(&request).await.unwrap();
        assert_eq!(image.base64_data(), "/9j/4AAQSkZJRg==");
        assert_eq!(image.mime_type(), "image/jpeg");
    }

    #[tokio::test]
    async fn test_invalid_request_is_not_sent() {
        let router = Router::new(StubClient::replying(Ok(UpstreamResponse::default())));
        let err = router.route(&GenerationRequest::new("  ")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(router.client().seen().is_empty());
    }

    #[tokio::test]
    async fn test_credential_failure_notifies() {
        let router = Router::new(StubClient::replying(Err(UpstreamFailure::http(
            400,
            "API key not valid. Please pass a valid API key.",
        ))));
        let mut events = router.notifier().subscribe();
        let err = router.route(&GenerationRequest::new("fox")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
        assert!(matches!(
            events.try_recv(),
            Ok(StudioEvent::CredentialsRejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_quota_failure_does_not_notify() {
        let router = Router::new(StubClient::replying(Err(UpstreamFailure::message(
            "got status 429 from upstream",
        ))));
        let mut events = router.notifier().subscribe();
        let err = router.route(&GenerationRequest::new("fox")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_safety_finish_reason_is_content_blocked() {
        let err = normalize_response(stopped("SAFETY", vec![])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContentBlocked);
    }

    #[test]
    fn test_other_finish_reason_is_generation_stopped() {
        let err = normalize_response(stopped("MAX_TOKENS", vec![])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GenerationStopped);
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[test]
    fn test_stop_with_image_succeeds() {
        let mut response = stopped("STOP", vec![]);
        response.candidates[0].image = Some(ImagePayload {
            data: "abc".into(),
            mime_type: "image/png".into(),
        });
        let image = normalize_response(response).unwrap();
        assert_eq!(image.data_uri(), "data:image/png;base64,abc");
    }

    #[test]
    fn test_block_reason_is_prompt_blocked_with_ratings() {
        let response = UpstreamResponse {
            block_reason: Some("SAFETY".into()),
            prompt_safety_ratings: vec![
                SafetyRating {
                    category: "HARM_CATEGORY_HARASSMENT".into(),
                    probability: "HIGH".into(),
                },
                SafetyRating {
                    category: "HARM_CATEGORY_HATE_SPEECH".into(),
                    probability: "MEDIUM".into(),
                },
            ],
            ..UpstreamResponse::default()
        };
        let err = normalize_response(response).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PromptBlocked);
        assert_eq!(
            err.to_string(),
            "Your prompt was blocked: SAFETY. HARM_CATEGORY_HARASSMENT: HIGH, HARM_CATEGORY_HATE_SPEECH: MEDIUM"
        );
    }

    #[test]
    fn test_block_reason_wins_over_finish_reason() {
        let mut response = stopped("SAFETY", vec![]);
        response.block_reason = Some("OTHER".into());
        let err = normalize_response(response).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PromptBlocked);
    }

    #[test]
    fn test_content_blocked_carries_ratings() {
        let err = normalize_response(stopped(
            "IMAGE_SAFETY",
            vec![SafetyRating {
                category: "HARM_CATEGORY_SEXUALLY_EXPLICIT".into(),
                probability: "HIGH".into(),
            }],
        ))
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("HARM_CATEGORY_SEXUALLY_EXPLICIT: HIGH"));
    }

    #[test]
    fn test_missing_image_is_no_image_returned() {
        let err = normalize_response(UpstreamResponse::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoImageReturned);

        let err = normalize_response(stopped("STOP", vec![])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoImageReturned);
    }

    #[test]
    fn test_first_image_is_returned() {
        let response = UpstreamResponse {
            candidates: vec![
                Candidate::default(),
                Candidate {
                    image: Some(ImagePayload {
                        data: "first".into(),
                        mime_type: "image/png".into(),
                    }),
                    ..Candidate::default()
                },
                Candidate {
                    image: Some(ImagePayload {
                        data: "second".into(),
                        mime_type: "image/png".into(),
                    }),
                    ..Candidate::default()
                },
            ],
            ..UpstreamResponse::default()
        };
        assert_eq!(normalize_response(response).unwrap().base64_data(), "first");
    }

    #[test]
    fn test_classify_by_status() {
        let kind = |status| classify_failure(&UpstreamFailure::http(status, "x")).kind();
        assert_eq!(kind(401), ErrorKind::InvalidCredentials);
        assert_eq!(kind(403), ErrorKind::InvalidCredentials);
        assert_eq!(kind(429), ErrorKind::QuotaExceeded);
        assert_eq!(kind(503), ErrorKind::ServiceUnavailable);
        assert_eq!(kind(418), ErrorKind::UnknownFailure);
    }

    #[test]
    fn test_classify_by_code() {
        let failure = UpstreamFailure::http(400, "denied").with_code("PERMISSION_DENIED");
        assert_eq!(classify_failure(&failure).kind(), ErrorKind::InvalidCredentials);

        let failure = UpstreamFailure::message("slow down").with_code("RESOURCE_EXHAUSTED");
        assert_eq!(classify_failure(&failure).kind(), ErrorKind::QuotaExceeded);
    }

    #[test]
    fn test_classify_by_message() {
        let kind = |msg: &str| classify_failure(&UpstreamFailure::message(msg)).kind();
        assert_eq!(kind("HTTP 429 Too Many Requests"), ErrorKind::QuotaExceeded);
        assert_eq!(kind("You exceeded your current quota"), ErrorKind::QuotaExceeded);
        assert_eq!(kind("request failed with 403"), ErrorKind::InvalidCredentials);
        assert_eq!(kind("The model is overloaded"), ErrorKind::ServiceUnavailable);
        assert_eq!(kind("connection reset by peer"), ErrorKind::UnknownFailure);
    }

    #[test]
    fn test_unknown_failure_keeps_raw_message() {
        let err = classify_failure(&UpstreamFailure::message("dns error: no such host"));
        assert_eq!(err.to_string(), "Image generation failed: dns error: no such host");
    }
}
