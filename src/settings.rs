//! User preferences: theme, aspect ratio and style.

use crate::error::{GenFrameError, Result};
use crate::history::HistoryEntry;
use crate::image::AspectRatio;
use crate::storage::{KeyValueStore, ASPECT_RATIO_KEY, STYLE_KEY, THEME_KEY};
use serde::{Deserialize, Serialize};

/// Color theme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light theme.
    Light,
    /// Dark theme.
    #[default]
    Dark,
}

impl Theme {
    /// Returns the stored name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Returns the other theme.
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Theme {
    type Err = GenFrameError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(GenFrameError::InvalidRequest(format!("unknown theme: {other}"))),
        }
    }
}

/// Named style presets appended to the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StylePreset {
    /// No modifier.
    #[default]
    None,
    /// Photographic realism.
    Photorealistic,
    /// Film still look.
    Cinematic,
    /// Japanese animation.
    Anime,
    /// Watercolor painting.
    Watercolor,
    /// Digital illustration.
    DigitalArt,
    /// Retro pixel art.
    PixelArt,
    /// Rendered 3D scene.
    Render3D,
    /// Pencil sketch.
    Sketch,
}

impl StylePreset {
    /// All presets, in display order.
    pub const ALL: [StylePreset; 9] = [
        Self::None,
        Self::Photorealistic,
        Self::Cinematic,
        Self::Anime,
        Self::Watercolor,
        Self::DigitalArt,
        Self::PixelArt,
        Self::Render3D,
        Self::Sketch,
    ];

    /// Display label, also the stored value.
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Photorealistic => "Photorealistic",
            Self::Cinematic => "Cinematic",
            Self::Anime => "Anime",
            Self::Watercolor => "Watercolor",
            Self::DigitalArt => "Digital Art",
            Self::PixelArt => "Pixel Art",
            Self::Render3D => "3D Render",
            Self::Sketch => "Sketch",
        }
    }

    /// Text appended to the prompt.
    pub fn modifier(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Photorealistic => {
                Some("photorealistic, highly detailed, natural lighting, shot on a DSLR camera")
            }
            Self::Cinematic => Some("cinematic film still, dramatic lighting, shallow depth of field"),
            Self::Anime => Some("anime style, vibrant colors, clean line art"),
            Self::Watercolor => Some("watercolor painting, soft edges, paper texture"),
            Self::DigitalArt => Some("digital art, concept art, trending illustration"),
            Self::PixelArt => Some("pixel art, 16-bit, retro video game style"),
            Self::Render3D => Some("3D render, octane render, studio lighting"),
            Self::Sketch => Some("pencil sketch, graphite, hand-drawn"),
        }
    }

    /// Applies the modifier to a user prompt.
    pub fn apply(&self, prompt: &str) -> String {
        let prompt = prompt.trim();
        match self.modifier() {
            Some(modifier) => format!("{prompt}, {modifier}"),
            None => prompt.to_string(),
        }
    }
}

impl std::fmt::Display for StylePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for StylePreset {
    type Err = GenFrameError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = normalize_label(s);
        Self::ALL
            .into_iter()
            .find(|style| normalize_label(style.label()) == wanted)
            .ok_or_else(|| GenFrameError::InvalidRequest(format!("unknown style: {s}")))
    }
}

fn normalize_label(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Explicit settings, loaded from and saved to a [`KeyValueStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Color theme.
    pub theme: Theme,
    /// Aspect ratio for text-only generation.
    pub aspect_ratio: AspectRatio,
    /// Active style preset.
    pub style: StylePreset,
}

impl Settings {
    /// Reads settings. Missing or unparseable values fall back to defaults.
    pub fn load(store: &dyn KeyValueStore) -> Result<Self> {
        fn read<T: std::str::FromStr + Default>(store: &dyn KeyValueStore, key: &str) -> Result<T> {
            Ok(match store.get(key)? {
                Some(raw) => raw.parse().unwrap_or_else(|_| {
                    tracing::warn!(key, value = %raw, "ignoring unreadable setting");
                    T::default()
                }),
                None => T::default(),
            })
        }

        Ok(Self {
            theme: read(store, THEME_KEY)?,
            aspect_ratio: read(store, ASPECT_RATIO_KEY)?,
            style: read(store, STYLE_KEY)?,
        })
    }

    /// Returns these settings with the aspect ratio and style of `entry`.
    ///
    /// The theme is kept. A style label that no longer names a preset leaves
    /// the current style in place.
    pub fn with_entry(self, entry: &HistoryEntry) -> Self {
        Self {
            aspect_ratio: entry.aspect_ratio,
            style: entry.style_label.parse().unwrap_or(self.style),
            ..self
        }
    }

    /// Writes every setting.
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        store.set(THEME_KEY, self.theme.as_str())?;
        store.set(ASPECT_RATIO_KEY, self.aspect_ratio.as_str())?;
        store.set(STYLE_KEY, self.style.label())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_defaults_when_store_empty() {
        let settings = Settings::load(&MemoryStore::new()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.theme, Theme::Dark);
        assert_eq!(settings.aspect_ratio, AspectRatio::Square);
        assert_eq!(settings.style, StylePreset::None);
    }

    #[test]
    fn test_save_then_load() {
        let store = MemoryStore::new();
        let settings = Settings {
            theme: Theme::Light,
            aspect_ratio: AspectRatio::Portrait,
            style: StylePreset::PixelArt,
        };
        settings.save(&store).unwrap();
        assert_eq!(store.get(STYLE_KEY).unwrap().as_deref(), Some("Pixel Art"));
        assert_eq!(Settings::load(&store).unwrap(), settings);
    }

    #[test]
    fn test_unreadable_values_fall_back() {
        let store = MemoryStore::new();
        store.set(THEME_KEY, "sepia").unwrap();
        store.set(ASPECT_RATIO_KEY, "16:9").unwrap();
        let settings = Settings::load(&store).unwrap();
        assert_eq!(settings.theme, Theme::Dark);
        assert_eq!(settings.aspect_ratio, AspectRatio::Landscape);
    }

    #[test]
    fn test_with_entry_takes_ratio_and_style() {
        let entry = HistoryEntry {
            result: crate::image::GeneratedImage::new("image/png", "eA=="),
            prompt: "a lighthouse".into(),
            aspect_ratio: AspectRatio::Portrait,
            style_label: "Watercolor".into(),
            reference_image_uri: None,
        };
        let current = Settings {
            theme: Theme::Light,
            aspect_ratio: AspectRatio::Square,
            style: StylePreset::Anime,
        };

        let restored = current.with_entry(&entry);
        assert_eq!(restored.theme, Theme::Light);
        assert_eq!(restored.aspect_ratio, AspectRatio::Portrait);
        assert_eq!(restored.style, StylePreset::Watercolor);

        let retired = HistoryEntry {
            style_label: "Baroque".into(),
            ..entry
        };
        assert_eq!(current.with_entry(&retired).style, StylePreset::Anime);
    }

    #[test]
    fn test_style_parse_is_lenient() {
        assert_eq!("3d render".parse::<StylePreset>().unwrap(), StylePreset::Render3D);
        assert_eq!("pixel-art".parse::<StylePreset>().unwrap(), StylePreset::PixelArt);
        assert!("baroque".parse::<StylePreset>().is_err());
    }

    #[test]
    fn test_style_apply() {
        assert_eq!(StylePreset::None.apply("  a red fox "), "a red fox");
        assert_eq!(
            StylePreset::Anime.apply("a red fox"),
            "a red fox, anime style, vibrant colors, clean line art"
        );
    }

    #[test]
    fn test_theme_toggle() {
        assert_eq!(Theme::Dark.toggled(), Theme::Light);
        assert_eq!("LIGHT".parse::<Theme>().unwrap(), Theme::Light);
    }
}
