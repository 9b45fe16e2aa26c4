//! Image message support.
//!
//! An image message carries up to three variants of the same picture:
//! a thumbnail shown inline, a large version for the viewer, and the
//! original file. Each variant is resolved from the local cache first and
//! downloaded only when the caller asks for it.

mod codec;
mod error;
mod fs;
mod model;
mod resolver;
mod state;
mod transport;

pub use codec::{CodecError, DecodedImage, ImageCodec, RasterCodec};
pub use error::ResolveError;
pub use fs::{FileSystem, LocalFileSystem};
pub use model::{
    DisplayIntent, ImageVariant, ImageVariantRecord, ParseVariantError, VariantMap, VariantPhase,
};
pub use resolver::{
    FetchEvent, FetchEventKind, FetchHandle, FetchId, ImageResolver, progress_percent,
};
pub use state::ImageMessageState;
pub use transport::{HttpTransport, ProgressSink, Transport, TransportError};
