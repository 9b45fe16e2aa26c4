//! Image variant data models.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ResolveError;
use crate::layout::Size;

/// Resolution at which an image message may be available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageVariant {
    /// Small preview shown inline in the chat list.
    #[serde(rename = "thumb")]
    Thumbnail,
    /// Higher resolution shown when the user opens the image.
    #[serde(rename = "large")]
    Large,
    /// Full-size original, downloaded on explicit request.
    #[serde(rename = "origin")]
    Original,
}

impl ImageVariant {
    /// All variants, smallest first.
    pub const ALL: [Self; 3] = [Self::Thumbnail, Self::Large, Self::Original];

    /// Short tag used in cache file names and manifests.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Thumbnail => "thumb",
            Self::Large => "large",
            Self::Original => "origin",
        }
    }

    /// Variant a UI should request for the given user intent.
    #[must_use]
    pub const fn for_intent(intent: DisplayIntent) -> Self {
        match intent {
            DisplayIntent::Inline => Self::Thumbnail,
            DisplayIntent::ViewFullSize => Self::Large,
            DisplayIntent::DownloadOriginal => Self::Original,
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Thumbnail => 0,
            Self::Large => 1,
            Self::Original => 2,
        }
    }
}

impl fmt::Display for ImageVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Error returned when parsing an unknown variant tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown image variant: {0}")]
pub struct ParseVariantError(pub String);

impl FromStr for ImageVariant {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "thumb" | "thumbnail" => Ok(Self::Thumbnail),
            "large" => Ok(Self::Large),
            "origin" | "original" => Ok(Self::Original),
            _ => Err(ParseVariantError(s.to_string())),
        }
    }
}

/// Why the UI wants an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayIntent {
    /// Default rendering in the message list.
    Inline,
    /// User opened the image viewer.
    ViewFullSize,
    /// User asked for the original file.
    DownloadOriginal,
}

/// One value per image variant, looked up by variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantMap<T>([T; 3]);

impl<T> VariantMap<T> {
    /// Build a map by calling `f` for each variant.
    pub fn from_fn(mut f: impl FnMut(ImageVariant) -> T) -> Self {
        Self(ImageVariant::ALL.map(&mut f))
    }

    /// Iterate `(variant, value)` pairs, smallest variant first.
    pub fn iter(&self) -> impl Iterator<Item = (ImageVariant, &T)> {
        ImageVariant::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T> Index<ImageVariant> for VariantMap<T> {
    type Output = T;

    fn index(&self, variant: ImageVariant) -> &T {
        &self.0[variant.index()]
    }
}

impl<T> IndexMut<ImageVariant> for VariantMap<T> {
    fn index_mut(&mut self, variant: ImageVariant) -> &mut T {
        &mut self.0[variant.index()]
    }
}

/// Metadata for one variant of one message's image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageVariantRecord {
    /// Identifier stable per message and variant; used as the cache key.
    pub id: String,
    /// Network-resolvable reference to the image bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_locator: Option<String>,
    /// Size the UI intends to render at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_size: Option<Size>,
    /// Which variant this record describes.
    pub variant: ImageVariant,
    /// Where the bytes may already be on disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
}

impl ImageVariantRecord {
    /// Create a record with only an id and variant.
    #[must_use]
    pub fn new(id: impl Into<String>, variant: ImageVariant) -> Self {
        Self {
            id: id.into(),
            remote_locator: None,
            display_size: None,
            variant,
            local_path: None,
        }
    }

    /// Set the remote locator.
    #[must_use]
    pub fn with_remote_locator(mut self, locator: impl Into<String>) -> Self {
        self.remote_locator = Some(locator.into());
        self
    }

    /// Set the display size.
    #[must_use]
    pub const fn with_display_size(mut self, size: Size) -> Self {
        self.display_size = Some(size);
        self
    }

    /// Set the local path.
    #[must_use]
    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    /// Non-empty remote locator, if any.
    #[must_use]
    pub fn remote(&self) -> Option<&str> {
        self.remote_locator
            .as_deref()
            .map(str::trim)
            .filter(|locator| !locator.is_empty())
    }
}

/// Resolution progress of one variant of one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VariantPhase {
    /// Nothing attempted yet, or a fetch was cancelled.
    #[default]
    Unresolved,
    /// A remote fetch is in flight.
    Fetching,
    /// Decoded pixels are available.
    Ready,
    /// The last fetch or decode failed.
    Failed(ResolveError),
}

impl VariantPhase {
    /// Whether a fetch is in flight.
    #[must_use]
    pub const fn is_fetching(&self) -> bool {
        matches!(self, Self::Fetching)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip_through_from_str() {
        for variant in ImageVariant::ALL {
            assert_eq!(variant.tag().parse::<ImageVariant>().unwrap(), variant);
        }
        assert_eq!("Original".parse::<ImageVariant>().unwrap(), ImageVariant::Original);
        assert!("medium".parse::<ImageVariant>().is_err());
    }

    #[test]
    fn intent_selects_variant() {
        assert_eq!(ImageVariant::for_intent(DisplayIntent::Inline), ImageVariant::Thumbnail);
        assert_eq!(ImageVariant::for_intent(DisplayIntent::ViewFullSize), ImageVariant::Large);
        assert_eq!(
            ImageVariant::for_intent(DisplayIntent::DownloadOriginal),
            ImageVariant::Original
        );
    }

    #[test]
    fn variant_map_indexes_by_variant() {
        let mut map = VariantMap::from_fn(ImageVariant::tag);
        assert_eq!(map[ImageVariant::Large], "large");
        map[ImageVariant::Large] = "big";
        let collected: Vec<_> = map.iter().map(|(_, tag)| *tag).collect();
        assert_eq!(collected, vec!["thumb", "big", "origin"]);
    }

    #[test]
    fn blank_locator_is_not_remote() {
        let record = ImageVariantRecord::new("a", ImageVariant::Large).with_remote_locator("  ");
        assert_eq!(record.remote(), None);
        let record = record.with_remote_locator("https://example.com/a.jpg");
        assert_eq!(record.remote(), Some("https://example.com/a.jpg"));
    }

    #[test]
    fn record_deserializes_with_optional_fields_missing() {
        let record: ImageVariantRecord =
            serde_json::from_str(r#"{ "id": "img-1", "variant": "thumb" }"#).unwrap();
        assert_eq!(record, ImageVariantRecord::new("img-1", ImageVariant::Thumbnail));
    }
}
