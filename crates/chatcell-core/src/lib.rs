//! # chatcell-core
//!
//! Cell data for a chat message list in a desktop messaging client.
//!
//! This crate provides:
//! - **Image messages** - thumbnail, large and original variants resolved
//!   from the local cache, with progress-reporting downloads
//! - **Observable values** - synchronous subscribe/notify for UI bindings
//! - **Cell layout** - insets and avatar geometry per message kind and direction
//! - **Message list** - ownership of per-message state and routing of
//!   download events
//!
//! ## Loading an image
//!
//! ```ignore
//! use std::sync::Arc;
//! use chatcell_core::{HttpTransport, ImageResolver, ImageVariant, MessageList, CacheConfig};
//!
//! let config = CacheConfig::default();
//! let resolver = ImageResolver::from_config(&config);
//! let transport = Arc::new(HttpTransport::new(&config)?);
//! let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
//!
//! match list.resolve_image(id, ImageVariant::Thumbnail, &resolver) {
//!     Ok(image) => show(image),
//!     Err(e) if e.needs_fetch() => {
//!         list.request_image(id, ImageVariant::Thumbnail, &resolver, &transport, &events_tx);
//!     }
//!     Err(_) => show_placeholder(),
//! }
//!
//! // On the UI thread:
//! while let Some(event) = events_rx.recv().await {
//!     list.apply(&resolver, event);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod layout;
pub mod media;
pub mod message;
pub mod observable;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use error::{Error, Result};
pub use layout::{Direction, EdgeInsets, LayoutConfig, LayoutTable, MessageKind, Size};
pub use media::{
    DecodedImage, DisplayIntent, FetchEvent, FetchEventKind, FetchHandle, HttpTransport,
    ImageMessageState, ImageResolver, ImageVariant, ImageVariantRecord, ResolveError, Transport,
    VariantPhase,
};
pub use message::{ChatMessage, MessageBody, MessageId, MessageList, MessageManifest};
pub use observable::{Observable, Subscription};
