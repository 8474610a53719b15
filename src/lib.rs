#![warn(missing_docs)]
//! GenFrame - prompt-to-image generation with local preferences and history.
//!
//! Text-only requests go to Imagen; requests with a reference image go to a
//! Gemini image model. Both outcomes are normalized into a single
//! [`GeneratedImage`] or a [`GenFrameError`] whose `Display` output is ready to
//! show to a user.
//!
//! # Quick Start
//!
//! ```no_run
//! use genframe::{GenerationRequest, GoogleClient, Router};
//!
//! #[tokio::main]
//! async fn main() -> genframe::Result<()> {
//!     let router = Router::new(GoogleClient::builder().build()?);
//!     let request = GenerationRequest::new("A golden retriever puppy");
//!     let image = router.route(&request).await?;
//!     image.save("puppy.jpg")?;
//!     Ok(())
//! }
//! ```
//!
//! # With history and settings
//!
//! ```no_run
//! use genframe::{FileStore, GoogleClient, Studio};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> genframe::Result<()> {
//!     let store = Arc::new(FileStore::open(".genframe/store.json")?);
//!     let mut studio = Studio::open(GoogleClient::builder().build()?, store)?;
//!     let entry = studio.generate("a red fox", None).await?;
//!     println!("{} entries, newest: {}", studio.history().len(), entry.prompt);
//!     Ok(())
//! }
//! ```

mod error;
pub mod history;
pub mod image;
pub mod notify;
pub mod settings;
pub mod storage;
pub mod studio;

// Re-export error types at crate root
pub use error::{ErrorKind, GenFrameError, Result};

pub use history::{HistoryCache, HistoryEntry, HISTORY_CAPACITY};
pub use image::providers::{GeminiModel, GoogleClient, GoogleClientBuilder, ImagenModel};
pub use image::{
    AspectRatio, GeneratedImage, GenerationPath, GenerationRequest, ImageFormat, ReferenceImage,
    Router, UpstreamClient,
};
pub use notify::{Notifier, StudioEvent};
pub use settings::{Settings, StylePreset, Theme};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use studio::Studio;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{GenFrameError, Result};
    pub use crate::image::providers::GoogleClient;
    pub use crate::image::{GeneratedImage, GenerationRequest, ReferenceImage, Router};
    pub use crate::studio::Studio;
}
