//! Ordered message list owning per-message state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use super::model::{ChatMessage, MessageId};
use crate::media::{
    DecodedImage, FetchEvent, FetchHandle, FileSystem, ImageCodec, ImageResolver, ImageVariant,
    ResolveError, Transport,
};

/// Messages in display order.
///
/// The list is the only owner of each message's state. Fetch events are
/// routed to their message by id; an event for a message that is no longer
/// in the list is dropped.
#[derive(Debug, Default)]
pub struct MessageList {
    messages: Vec<ChatMessage>,
    fetches: HashMap<MessageId, Vec<FetchHandle>>,
}

impl MessageList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages in display order.
    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    /// Append a message, replacing any existing message with the same id.
    pub fn push(&mut self, message: ChatMessage) {
        if let Some(pos) = self.position(message.id) {
            self.cancel_fetches(message.id);
            self.messages[pos] = message;
        } else {
            self.messages.push(message);
        }
    }

    /// Message with `id`.
    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Mutable message with `id`.
    pub fn get_mut(&mut self, id: MessageId) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Remove a message, cancelling its downloads.
    pub fn evict(&mut self, id: MessageId) -> Option<ChatMessage> {
        let pos = self.position(id)?;
        self.cancel_fetches(id);
        debug!("Evicted message {id}");
        Some(self.messages.remove(pos))
    }

    /// Resolve an image variant of message `id` from the local cache.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotFound`] if the message is missing or not an
    /// image, otherwise whatever [`ImageResolver::resolve`] returns.
    pub fn resolve_image<F: FileSystem, C: ImageCodec>(
        &mut self,
        id: MessageId,
        variant: ImageVariant,
        resolver: &ImageResolver<F, C>,
    ) -> Result<DecodedImage, ResolveError> {
        let state = self
            .get_mut(id)
            .and_then(ChatMessage::image_state_mut)
            .ok_or(ResolveError::NotFound)?;
        resolver.resolve(state, variant)
    }

    /// Start downloading an image variant of message `id`.
    ///
    /// Returns whether a fetch was started. Must be called from within a
    /// tokio runtime.
    pub fn request_image<F: FileSystem, C: ImageCodec, T: Transport>(
        &mut self,
        id: MessageId,
        variant: ImageVariant,
        resolver: &ImageResolver<F, C>,
        transport: &Arc<T>,
        events: &UnboundedSender<FetchEvent>,
    ) -> bool {
        let Some(state) = self.get_mut(id).and_then(ChatMessage::image_state_mut) else {
            return false;
        };
        let Some(handle) = resolver.request_remote(id, state, variant, transport, events) else {
            return false;
        };
        self.fetches.entry(id).or_default().push(handle);
        true
    }

    /// Cancel the in-flight download of one variant.
    ///
    /// Returns whether a download was cancelled.
    pub fn cancel_image<F: FileSystem, C: ImageCodec>(
        &mut self,
        id: MessageId,
        variant: ImageVariant,
        resolver: &ImageResolver<F, C>,
    ) -> bool {
        let Some(handles) = self.fetches.get_mut(&id) else {
            return false;
        };
        let Some(pos) = handles.iter().position(|h| h.variant() == variant) else {
            return false;
        };
        let handle = handles.swap_remove(pos);
        if let Some(state) = self
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .and_then(ChatMessage::image_state_mut)
        {
            resolver.cancel(state, handle);
        } else {
            handle.abort();
        }
        true
    }

    /// Route a fetch event to its message.
    ///
    /// Returns the outcome when the event finishes a download; `None` for
    /// progress, stale events and evicted messages.
    pub fn apply<F: FileSystem, C: ImageCodec>(
        &mut self,
        resolver: &ImageResolver<F, C>,
        event: FetchEvent,
    ) -> Option<Result<DecodedImage, ResolveError>> {
        let (id, fetch) = (event.message, event.fetch);
        let terminal = event.kind.is_terminal();

        let Some(state) = self.get_mut(id).and_then(ChatMessage::image_state_mut) else {
            debug!("Dropping fetch event for evicted message {id}");
            return None;
        };
        let outcome = resolver.apply(state, event);

        if terminal && let Some(handles) = self.fetches.get_mut(&id) {
            handles.retain(|h| h.id() != fetch);
            if handles.is_empty() {
                self.fetches.remove(&id);
            }
        }
        outcome
    }

    /// Number of downloads tracked for message `id`.
    #[must_use]
    pub fn pending_fetches(&self, id: MessageId) -> usize {
        self.fetches.get(&id).map_or(0, Vec::len)
    }

    fn position(&self, id: MessageId) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    fn cancel_fetches(&mut self, id: MessageId) {
        for handle in self.fetches.remove(&id).unwrap_or_default() {
            handle.abort();
        }
    }
}

impl Drop for MessageList {
    fn drop(&mut self) {
        for handle in self.fetches.values().flatten() {
            handle.abort();
        }
    }
}
