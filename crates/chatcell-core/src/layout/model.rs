//! Layout geometry types.

use serde::{Deserialize, Serialize};

/// Width and height in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl Size {
    /// Zero-sized value.
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// Create a new size.
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Whether either dimension is zero or negative.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Padding on the four edges of a box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeInsets {
    /// Top edge.
    pub top: f32,
    /// Left edge.
    pub left: f32,
    /// Bottom edge.
    pub bottom: f32,
    /// Right edge.
    pub right: f32,
}

impl EdgeInsets {
    /// No padding.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Create insets in top, left, bottom, right order.
    #[must_use]
    pub const fn new(top: f32, left: f32, bottom: f32, right: f32) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// Sum of left and right.
    #[must_use]
    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    /// Sum of top and bottom.
    #[must_use]
    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }

    /// Swap left and right, used to mirror an incoming layout to outgoing.
    #[must_use]
    pub const fn mirrored(self) -> Self {
        Self::new(self.top, self.right, self.bottom, self.left)
    }
}

/// Message sending direction relative to the local user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Received from someone else; drawn on the leading side.
    Incoming,
    /// Sent by the local user; drawn on the trailing side.
    Outgoing,
}

/// Kind of message content, selecting its bubble layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Plain text bubble.
    Text,
    /// Voice clip bubble.
    Voice,
    /// Image bubble.
    Image,
    /// Centered system notice without avatar.
    System,
}

impl MessageKind {
    /// All kinds, in table order.
    pub const ALL: [Self; 4] = [Self::Text, Self::Voice, Self::Image, Self::System];
}

/// Insets and avatar geometry for one message cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Padding around the whole message cell.
    pub message_insets: EdgeInsets,
    /// Padding between the bubble edge and its content.
    pub bubble_insets: EdgeInsets,
    /// Padding around the avatar.
    pub avatar_insets: EdgeInsets,
    /// Avatar size; zero means no avatar is shown.
    pub avatar_size: Size,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            message_insets: EdgeInsets::ZERO,
            bubble_insets: EdgeInsets::ZERO,
            avatar_insets: EdgeInsets::ZERO,
            avatar_size: Size::new(40.0, 40.0),
        }
    }
}

impl LayoutConfig {
    /// Replace the message insets.
    #[must_use]
    pub const fn with_message_insets(mut self, insets: EdgeInsets) -> Self {
        self.message_insets = insets;
        self
    }

    /// Replace the bubble insets.
    #[must_use]
    pub const fn with_bubble_insets(mut self, insets: EdgeInsets) -> Self {
        self.bubble_insets = insets;
        self
    }

    /// Replace the avatar insets.
    #[must_use]
    pub const fn with_avatar_insets(mut self, insets: EdgeInsets) -> Self {
        self.avatar_insets = insets;
        self
    }

    /// Replace the avatar size.
    #[must_use]
    pub const fn with_avatar_size(mut self, size: Size) -> Self {
        self.avatar_size = size;
        self
    }

    /// Whether an avatar is drawn for this layout.
    #[must_use]
    pub fn shows_avatar(&self) -> bool {
        !self.avatar_size.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn mirrored_swaps_left_and_right() {
        let insets = EdgeInsets::new(14.0, 20.0, 20.0, 22.0);
        assert_eq!(insets.mirrored(), EdgeInsets::new(14.0, 22.0, 20.0, 20.0));
        assert_eq!(insets.mirrored().mirrored(), insets);
    }

    #[test]
    fn insets_sums() {
        let insets = EdgeInsets::new(3.0, 8.0, 1.0, 0.0);
        assert_eq!(insets.horizontal(), 8.0);
        assert_eq!(insets.vertical(), 4.0);
    }

    #[test]
    fn default_layout_has_standard_avatar() {
        let layout = LayoutConfig::default();
        assert_eq!(layout.avatar_size, Size::new(40.0, 40.0));
        assert_eq!(layout.bubble_insets, EdgeInsets::ZERO);
        assert!(layout.shows_avatar());
    }

    #[test]
    fn zero_avatar_is_hidden() {
        let layout = LayoutConfig::default().with_avatar_size(Size::ZERO);
        assert!(!layout.shows_avatar());
    }

    #[test]
    fn direction_serializes_lowercase() {
        let json = serde_json::to_string(&Direction::Outgoing).unwrap_or_default();
        assert_eq!(json, "\"outgoing\"");
    }
}
