//! Image generation: request types, upstream boundary and routing.

pub mod providers;
mod router;
mod types;
mod upstream;

pub use router::{classify_failure, normalize_response, GenerationPath, Router};
pub use types::{
    AspectRatio, GeneratedImage, GenerationRequest, ImageFormat, ReferenceImage, MAX_IMAGE_COUNT,
};
pub use upstream::{
    Candidate, ImagePayload, ReferenceCall, SafetyRating, TextToImageCall, UpstreamClient,
    UpstreamFailure, UpstreamResponse, UpstreamResult,
};
