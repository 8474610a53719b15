//! Non-visual front end: settings, history and the generate action.

use crate::error::{GenFrameError, Result};
use crate::history::{HistoryCache, HistoryEntry};
use crate::image::{
    AspectRatio, GenerationRequest, ImageFormat, ReferenceImage, Router, UpstreamClient,
};
use crate::notify::{Notifier, StudioEvent};
use crate::settings::{Settings, StylePreset, Theme};
use crate::storage::KeyValueStore;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Ties a router to persisted settings and history.
///
/// `generate` borrows the studio mutably, so at most one request can be in
/// flight per studio.
pub struct Studio<C> {
    router: Router<C>,
    store: Arc<dyn KeyValueStore>,
    settings: Settings,
    history: HistoryCache,
    output_format: ImageFormat,
}

impl<C: UpstreamClient> Studio<C> {
    /// Loads settings and history from `store`.
    pub fn open(client: C, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let settings = Settings::load(store.as_ref())?;
        let history = HistoryCache::load(store.clone())?;
        tracing::debug!(entries = history.len(), ?settings, "studio opened");
        Ok(Self {
            router: Router::new(client),
            store,
            settings,
            history,
            output_format: ImageFormat::default(),
        })
    }

    /// Sets the output encoding for text-only generation.
    pub fn with_output_format(mut self, format: ImageFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Subscribes to studio events such as rejected credentials.
    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.router.notifier().subscribe()
    }

    /// Returns the notifier shared with the router.
    pub fn notifier(&self) -> &Notifier {
        self.router.notifier()
    }

    /// Current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// History, newest first.
    pub fn history(&self) -> &[HistoryEntry] {
        self.history.list()
    }

    /// Builds the request that `generate` would send.
    pub fn build_request(
        &self,
        prompt: &str,
        reference: Option<ReferenceImage>,
    ) -> GenerationRequest {
        let mut request = GenerationRequest::new(self.settings.style.apply(prompt))
            .with_aspect_ratio(self.settings.aspect_ratio)
            .with_format(self.output_format);
        if let Some(reference) = reference {
            request = request.with_reference_image(reference);
        }
        request
    }

    /// Generates one image and records it in history.
    pub async fn generate(
        &mut self,
        prompt: &str,
        reference: Option<ReferenceImage>,
    ) -> Result<HistoryEntry> {
        // Checked before the style modifier makes a blank prompt look non-empty.
        if prompt.trim().is_empty() {
            return Err(GenFrameError::InvalidRequest("prompt must not be empty".into()));
        }
        let reference_image_uri = reference.as_ref().map(ReferenceImage::to_data_uri);
        let request = self.build_request(prompt, reference);
        let result = self.router.route(&request).await?;

        let entry = HistoryEntry {
            result,
            prompt: prompt.trim().to_string(),
            aspect_ratio: self.settings.aspect_ratio,
            style_label: self.settings.style.label().to_string(),
            reference_image_uri,
        };
        self.history.record(entry.clone())?;
        Ok(entry)
    }

    /// Removes a history entry.
    pub fn delete(&mut self, index: usize) -> Result<HistoryEntry> {
        self.history.delete(index)
    }

    /// Removes every history entry.
    pub fn clear_history(&mut self) -> Result<()> {
        self.history.clear()
    }

    /// Returns a history entry and restores its aspect ratio and style.
    pub fn restore(&mut self, index: usize) -> Result<HistoryEntry> {
        let entry = self.history.restore(index)?;
        self.apply(self.settings.with_entry(&entry))?;
        Ok(entry)
    }

    /// Changes and persists the theme.
    pub fn set_theme(&mut self, theme: Theme) -> Result<()> {
        self.apply(Settings {
            theme,
            ..self.settings
        })
    }

    /// Flips and persists the theme.
    pub fn toggle_theme(&mut self) -> Result<Theme> {
        let theme = self.settings.theme.toggled();
        self.set_theme(theme)?;
        Ok(theme)
    }

    /// Changes and persists the aspect ratio.
    pub fn set_aspect_ratio(&mut self, aspect_ratio: AspectRatio) -> Result<()> {
        self.apply(Settings {
            aspect_ratio,
            ..self.settings
        })
    }

    /// Changes and persists the style preset.
    pub fn set_style(&mut self, style: StylePreset) -> Result<()> {
        self.apply(Settings {
            style,
            ..self.settings
        })
    }

    /// Saves `next` and adopts it only once the store accepted it.
    fn apply(&mut self, next: Settings) -> Result<()> {
        next.save(self.store.as_ref())?;
        self.settings = next;
        Ok(())
    }
}
