//! Upstream service bindings.

mod google;

pub use google::{GeminiModel, GoogleClient, GoogleClientBuilder, ImagenModel};
