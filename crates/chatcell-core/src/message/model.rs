//! Chat message cell data.

use serde::{Deserialize, Serialize};

use crate::layout::{Direction, LayoutConfig, LayoutTable, MessageKind};
use crate::media::ImageMessageState;

/// Unique identifier for a message in a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Create a new message ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content of a chat message.
#[derive(Debug)]
pub enum MessageBody {
    /// Plain text.
    Text(String),
    /// Voice clip of the given length.
    Voice {
        /// Clip length in seconds.
        duration_secs: u32,
    },
    /// Image with its variants.
    Image(Box<ImageMessageState>),
    /// System notice.
    System(String),
}

impl MessageBody {
    /// Layout kind for this content.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Text(_) => MessageKind::Text,
            Self::Voice { .. } => MessageKind::Voice,
            Self::Image(_) => MessageKind::Image,
            Self::System(_) => MessageKind::System,
        }
    }
}

/// One entry in a chat message list.
#[derive(Debug)]
pub struct ChatMessage {
    /// Unique identifier.
    pub id: MessageId,
    /// Whether the local user sent or received it.
    pub direction: Direction,
    /// Message content.
    pub body: MessageBody,
}

impl ChatMessage {
    /// Create a message.
    #[must_use]
    pub const fn new(id: MessageId, direction: Direction, body: MessageBody) -> Self {
        Self {
            id,
            direction,
            body,
        }
    }

    /// Create an image message.
    #[must_use]
    pub fn image(id: MessageId, direction: Direction, state: ImageMessageState) -> Self {
        Self::new(id, direction, MessageBody::Image(Box::new(state)))
    }

    /// Layout kind for this message.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        self.body.kind()
    }

    /// Cell layout from `table`.
    #[must_use]
    pub fn layout(&self, table: &LayoutTable) -> LayoutConfig {
        table.get(self.kind(), self.direction)
    }

    /// Image state, if this is an image message.
    #[must_use]
    pub fn image_state(&self) -> Option<&ImageMessageState> {
        match &self.body {
            MessageBody::Image(state) => Some(&**state),
            _ => None,
        }
    }

    /// Mutable image state, if this is an image message.
    pub fn image_state_mut(&mut self) -> Option<&mut ImageMessageState> {
        match &mut self.body {
            MessageBody::Image(state) => Some(&mut **state),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Size;

    #[test]
    fn kind_follows_body() {
        let text = ChatMessage::new(
            MessageId(1),
            Direction::Incoming,
            MessageBody::Text("hi".into()),
        );
        assert_eq!(text.kind(), MessageKind::Text);
        assert!(text.image_state().is_none());

        let image = ChatMessage::image(
            MessageId(2),
            Direction::Outgoing,
            ImageMessageState::default(),
        );
        assert_eq!(image.kind(), MessageKind::Image);
        assert!(image.image_state().is_some());
    }

    #[test]
    fn layout_uses_direction() {
        let table = LayoutTable::standard();
        let notice = ChatMessage::new(
            MessageId(3),
            Direction::Incoming,
            MessageBody::System("joined".into()),
        );
        assert_eq!(notice.layout(&table).avatar_size, Size::ZERO);

        let voice = ChatMessage::new(
            MessageId(4),
            Direction::Outgoing,
            MessageBody::Voice { duration_secs: 3 },
        );
        assert_eq!(
            voice.layout(&table),
            table.get(MessageKind::Voice, Direction::Outgoing)
        );
    }

    #[test]
    fn id_display() {
        assert_eq!(MessageId::new(42).to_string(), "42");
    }
}
