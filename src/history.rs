//! Bounded, newest-first history of successful generations.

use crate::error::{GenFrameError, Result};
use crate::image::{AspectRatio, GeneratedImage};
use crate::storage::{KeyValueStore, HISTORY_KEY};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Maximum number of entries kept.
pub const HISTORY_CAPACITY: usize = 20;

/// One past generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// The generated image.
    pub result: GeneratedImage,
    /// Prompt as typed by the user, without style modifiers.
    pub prompt: String,
    /// Aspect ratio selected at generation time.
    pub aspect_ratio: AspectRatio,
    /// Label of the style preset in effect.
    #[serde(rename = "style")]
    pub style_label: String,
    /// Reference image as a data URI, when one was used.
    #[serde(rename = "referenceImage", default, skip_serializing_if = "Option::is_none")]
    pub reference_image_uri: Option<String>,
}

/// History list mirrored to a [`KeyValueStore`] on every mutation.
pub struct HistoryCache {
    store: Arc<dyn KeyValueStore>,
    entries: Vec<HistoryEntry>,
}

impl HistoryCache {
    /// Loads the persisted list. A malformed value yields an empty list.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let entries = match store.get(HISTORY_KEY)? {
            Some(raw) => match serde_json::from_str::<Vec<HistoryEntry>>(&raw) {
                Ok(mut entries) => {
                    entries.truncate(HISTORY_CAPACITY);
                    entries
                }
                Err(e) => {
                    tracing::warn!("discarding unreadable history: {e}");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        Ok(Self { store, entries })
    }

    /// Entries, newest first.
    pub fn list(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds `entry` at the front, drops older entries with the same result,
    /// and keeps at most [`HISTORY_CAPACITY`] entries.
    pub fn record(&mut self, entry: HistoryEntry) -> Result<()> {
        let next: Vec<HistoryEntry> = std::iter::once(entry.clone())
            .chain(
                self.entries
                    .iter()
                    .filter(|existing| existing.result != entry.result)
                    .cloned(),
            )
            .take(HISTORY_CAPACITY)
            .collect();
        self.replace(next)
    }

    /// Removes the entry at `index`; later entries move up by one.
    pub fn delete(&mut self, index: usize) -> Result<HistoryEntry> {
        self.check_index(index)?;
        let mut next = self.entries.clone();
        let removed = next.remove(index);
        self.replace(next)?;
        Ok(removed)
    }

    /// Returns a copy of the entry at `index` for re-display.
    pub fn restore(&self, index: usize) -> Result<HistoryEntry> {
        self.check_index(index)?;
        Ok(self.entries[index].clone())
    }

    /// Removes every entry.
    pub fn clear(&mut self) -> Result<()> {
        self.replace(Vec::new())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.entries.len() {
            return Err(GenFrameError::HistoryIndex {
                index,
                len: self.entries.len(),
            });
        }
        Ok(())
    }

    /// Persists first so a failed write leaves memory and storage in agreement.
    fn replace(&mut self, next: Vec<HistoryEntry>) -> Result<()> {
        let serialized = serde_json::to_string(&next)?;
        self.store.set(HISTORY_KEY, &serialized)?;
        self.entries = next;
        Ok(())
    }
}
