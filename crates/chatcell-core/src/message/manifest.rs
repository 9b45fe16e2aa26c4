//! JSON manifest describing a batch of messages.
//!
//! This is the already-deserialized form a messaging SDK hands over:
//!
//! ```json
//! { "messages": [
//!     { "id": 1, "direction": "incoming", "type": "image", "length": 2048,
//!       "images": [ { "id": "abc", "variant": "thumb", "local_path": "/tmp/abc.jpg" },
//!                   { "id": "abc", "variant": "large", "remote_locator": "https://..." } ] },
//!     { "id": 2, "direction": "outgoing", "type": "text", "text": "nice" }
//! ] }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::model::{ChatMessage, MessageBody, MessageId};
use crate::Result;
use crate::layout::Direction;
use crate::media::{ImageMessageState, ImageVariantRecord};

/// A list of messages as supplied by the message source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageManifest {
    /// Messages in display order.
    pub messages: Vec<ManifestMessage>,
}

/// One message in a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMessage {
    /// Message identifier.
    pub id: MessageId,
    /// Sent or received.
    pub direction: Direction,
    /// Content.
    #[serde(flatten)]
    pub body: ManifestBody,
}

/// Content of a manifest message, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ManifestBody {
    /// Plain text.
    Text {
        /// Message text.
        text: String,
    },
    /// Voice clip.
    Voice {
        /// Clip length in seconds.
        duration_secs: u32,
    },
    /// Image with its variant records.
    Image {
        /// Declared payload size in bytes.
        #[serde(default)]
        length: u64,
        /// One record per available variant.
        images: Vec<ImageVariantRecord>,
    },
    /// System notice.
    System {
        /// Notice text.
        text: String,
    },
}

impl MessageManifest {
    /// Parse a manifest from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a manifest file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Convert into list entries with fresh state.
    #[must_use]
    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages.into_iter().map(ChatMessage::from).collect()
    }
}

impl From<ManifestMessage> for ChatMessage {
    fn from(message: ManifestMessage) -> Self {
        let body = match message.body {
            ManifestBody::Text { text } => MessageBody::Text(text),
            ManifestBody::Voice { duration_secs } => MessageBody::Voice { duration_secs },
            ManifestBody::Image { length, images } => MessageBody::Image(Box::new(
                ImageMessageState::new(images).with_byte_length(length),
            )),
            ManifestBody::System { text } => MessageBody::System(text),
        };
        Self::new(message.id, message.direction, body)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::layout::MessageKind;
    use crate::media::ImageVariant;

    const SAMPLE: &str = r#"{
        "messages": [
            { "id": 1, "direction": "incoming", "type": "image", "length": 2048,
              "images": [
                { "id": "abc", "variant": "thumb", "local_path": "/tmp/abc_thumb.jpg",
                  "display_size": { "width": 120.0, "height": 80.0 } },
                { "id": "abc", "variant": "large", "remote_locator": "https://img.example/abc/large" }
              ] },
            { "id": 2, "direction": "outgoing", "type": "text", "text": "nice" },
            { "id": 3, "direction": "incoming", "type": "voice", "duration_secs": 4 },
            { "id": 4, "direction": "incoming", "type": "system", "text": "Bob joined" }
        ]
    }"#;

    #[test]
    fn parses_all_message_types() {
        let messages = MessageManifest::from_json(SAMPLE).unwrap().into_messages();
        let kinds: Vec<_> = messages.iter().map(ChatMessage::kind).collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::Image,
                MessageKind::Text,
                MessageKind::Voice,
                MessageKind::System
            ]
        );
    }

    #[test]
    fn image_records_keep_their_fields() {
        let messages = MessageManifest::from_json(SAMPLE).unwrap().into_messages();
        let state = messages[0].image_state().unwrap();

        assert_eq!(state.byte_length(), 2048);
        let thumb = state.record(ImageVariant::Thumbnail).unwrap();
        assert_eq!(
            thumb.local_path.as_deref(),
            Some(Path::new("/tmp/abc_thumb.jpg"))
        );
        let large = state.record(ImageVariant::Large).unwrap();
        assert_eq!(large.remote(), Some("https://img.example/abc/large"));
        assert!(state.record(ImageVariant::Original).is_none());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let json = r#"{ "messages": [ { "id": 1, "direction": "incoming", "type": "video" } ] }"#;
        assert!(matches!(
            MessageManifest::from_json(json),
            Err(Error::Serde(_))
        ));
    }
}
