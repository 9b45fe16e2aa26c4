//! Chat message list.

mod list;
mod manifest;
mod model;

pub use list::MessageList;
pub use manifest::{ManifestBody, ManifestMessage, MessageManifest};
pub use model::{ChatMessage, MessageBody, MessageId};
