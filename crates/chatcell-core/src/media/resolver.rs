//! Image variant resolution and download.
//!
//! Resolution is split in two:
//!
//! - [`ImageResolver::resolve`] only looks at the local cache. It never
//!   touches the network and is safe to call on every render.
//! - [`ImageResolver::request_remote`] spawns a fetch on the tokio runtime.
//!   The fetch task never touches message state; it sends [`FetchEvent`]s
//!   down a channel, and the owner of the state feeds them back through
//!   [`ImageResolver::apply`] on its own thread.
//!
//! ```text
//! Unresolved ── local hit ──────────────────────────────→ Ready
//! Unresolved ── miss, request_remote ──→ Fetching ──────→ Ready | Failed
//! Ready | Failed ── request_remote ───→ Fetching
//! ```

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::{AbortHandle, JoinError};
use tracing::{debug, info, warn};

use super::codec::{DecodedImage, ImageCodec, RasterCodec};
use super::error::ResolveError;
use super::fs::{FileSystem, LocalFileSystem};
use super::model::{ImageVariant, ImageVariantRecord, VariantPhase};
use super::state::ImageMessageState;
use super::transport::{ProgressSink, Transport};
use crate::config::CacheConfig;
use crate::message::MessageId;

static NEXT_FETCH_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one fetch attempt; a retry gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchId(pub(crate) u64);

impl FetchId {
    fn next() -> Self {
        Self(NEXT_FETCH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Progress or outcome of a fetch, addressed to one message variant.
#[derive(Debug, Clone)]
pub struct FetchEvent {
    /// Message the fetch belongs to.
    pub message: MessageId,
    /// Variant being fetched.
    pub variant: ImageVariant,
    /// Fetch attempt that produced the event.
    pub fetch: FetchId,
    /// What happened.
    pub kind: FetchEventKind,
}

/// Payload of a [`FetchEvent`].
#[derive(Debug, Clone)]
pub enum FetchEventKind {
    /// Bytes received so far; `total` is 0 when unknown.
    Progress {
        /// Bytes received.
        received: u64,
        /// Expected total bytes.
        total: u64,
    },
    /// All bytes received.
    Completed(Bytes),
    /// The transport gave up.
    Failed(String),
}

impl FetchEventKind {
    /// Whether this event ends the fetch.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

/// Handle to an in-flight fetch task.
#[derive(Debug)]
pub struct FetchHandle {
    message: MessageId,
    variant: ImageVariant,
    fetch: FetchId,
    task: AbortHandle,
}

impl FetchHandle {
    /// Message being fetched for.
    #[must_use]
    pub const fn message(&self) -> MessageId {
        self.message
    }

    /// Variant being fetched.
    #[must_use]
    pub const fn variant(&self) -> ImageVariant {
        self.variant
    }

    /// Fetch attempt id.
    #[must_use]
    pub const fn id(&self) -> FetchId {
        self.fetch
    }

    /// Whether the fetch task has finished running.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the task without touching message state.
    pub(crate) fn abort(&self) {
        self.task.abort();
    }
}

/// Aborts the fetch task when the owning task is aborted.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn join_failure(error: JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    let payload = error.into_panic();
    let reason = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_owned());
    warn!("Transport panicked: {reason}");
    format!("transport panicked: {reason}")
}

/// Download percentage for `received` out of `total` bytes.
///
/// Rounds down and clamps to 100. Returns `None` when `total` is 0.
#[must_use]
pub fn progress_percent(received: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let percent = (u128::from(received) * 100 / u128::from(total)).min(100);
    u8::try_from(percent).ok()
}

/// Resolves image variants from the local cache and downloads missing ones.
#[derive(Debug, Clone)]
pub struct ImageResolver<F = LocalFileSystem, C = RasterCodec> {
    fs: F,
    codec: C,
    cache_dir: PathBuf,
}

impl ImageResolver {
    /// Resolver using the local disk and the raster codec.
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self::with_parts(LocalFileSystem, RasterCodec, cache_dir)
    }

    /// Resolver writing into the configured cache directory.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.cache_dir.clone())
    }
}

impl<F: FileSystem, C: ImageCodec> ImageResolver<F, C> {
    /// Resolver with custom filesystem and codec.
    pub fn with_parts(fs: F, codec: C, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            codec,
            cache_dir: cache_dir.into(),
        }
    }

    /// Directory downloaded images are written to.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Where a downloaded copy of `record` is stored.
    ///
    /// The file name is the id with every byte outside `[a-z0-9_-]`
    /// written as `%XX`, followed by `_<tag>`. Distinct ids never share a
    /// file, even on case-insensitive filesystems.
    #[must_use]
    pub fn cache_path(&self, record: &ImageVariantRecord) -> PathBuf {
        let mut name = String::with_capacity(record.id.len() + 8);
        for byte in record.id.bytes() {
            if byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-' || byte == b'_' {
                name.push(char::from(byte));
            } else {
                let _ = write!(name, "%{byte:02X}");
            }
        }
        self.cache_dir
            .join(format!("{name}_{}", record.variant.tag()))
    }

    /// Path of an existing local file for `variant`, if any.
    ///
    /// Returns `None` when the message has no such variant, the record has no
    /// local path, or the path is missing or a directory.
    #[must_use]
    pub fn locate_local_path(
        &self,
        state: &ImageMessageState,
        variant: ImageVariant,
    ) -> Option<PathBuf> {
        let path = state.record(variant)?.local_path.as_deref()?;
        (self.fs.exists(path) && !self.fs.is_dir(path)).then(|| path.to_path_buf())
    }

    /// Decode `variant` from the local cache.
    ///
    /// On success the decoded slot for `variant` is updated.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::NotFound`] if the message has no such variant.
    /// - [`ResolveError::NotCached`] if there is no usable local copy; an
    ///   unreadable or corrupt file counts as no copy. Call
    ///   [`request_remote`](Self::request_remote) next.
    pub fn resolve(
        &self,
        state: &mut ImageMessageState,
        variant: ImageVariant,
    ) -> Result<DecodedImage, ResolveError> {
        if state.record(variant).is_none() {
            return Err(ResolveError::NotFound);
        }
        let Some(path) = self.locate_local_path(state, variant) else {
            debug!("Cache miss for {variant}");
            return Err(ResolveError::NotCached);
        };

        let bytes = match self.fs.read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Unreadable cached {variant} at {}: {e}", path.display());
                return Err(ResolveError::NotCached);
            }
        };
        let image = match self.codec.decode(&bytes) {
            Ok(image) => image,
            Err(e) => {
                debug!("Corrupt cached {variant} at {}: {e}", path.display());
                return Err(ResolveError::NotCached);
            }
        };

        debug!("Cache hit for {variant} at {}", path.display());
        state.set_decoded(variant, image.clone());
        if !state.phase(variant).is_fetching() {
            state.set_phase(variant, VariantPhase::Ready);
        }
        Ok(image)
    }

    /// Start downloading `variant` for `message`.
    ///
    /// Returns `None` without doing anything if the variant has no remote
    /// locator or is already being fetched. Events for the fetch are sent to
    /// `events` and must be passed to [`apply`](Self::apply).
    ///
    /// Must be called from within a tokio runtime.
    #[allow(clippy::unused_self)]
    pub fn request_remote<T: Transport>(
        &self,
        message: MessageId,
        state: &mut ImageMessageState,
        variant: ImageVariant,
        transport: &Arc<T>,
        events: &UnboundedSender<FetchEvent>,
    ) -> Option<FetchHandle> {
        let locator = state.record(variant)?.remote()?.to_owned();
        if state.phase(variant).is_fetching() {
            debug!("{variant} for message {message} is already downloading");
            return None;
        }

        let fetch = FetchId::next();
        state.begin_fetch(variant, fetch);
        info!("Downloading {variant} for message {message}");

        let transport = Arc::clone(transport);
        let events = events.clone();
        let task = tokio::spawn(async move {
            let event = move |kind| FetchEvent {
                message,
                variant,
                fetch,
                kind,
            };
            let sink = {
                let events = events.clone();
                ProgressSink::new(move |received, total| {
                    // A closed channel means the owner is gone.
                    let _ = events.send(event(FetchEventKind::Progress { received, total }));
                })
            };
            // A panicking transport only takes down the inner task.
            let inner = tokio::spawn(async move { transport.fetch(&locator, sink).await });
            let _guard = AbortOnDrop(inner.abort_handle());
            let kind = match inner.await {
                Ok(Ok(bytes)) => FetchEventKind::Completed(bytes),
                Ok(Err(e)) => FetchEventKind::Failed(e.to_string()),
                Err(e) => FetchEventKind::Failed(join_failure(e)),
            };
            let _ = events.send(event(kind));
        });

        Some(FetchHandle {
            message,
            variant,
            fetch,
            task: task.abort_handle(),
        })
    }

    /// Apply a fetch event to the state it belongs to.
    ///
    /// Returns the outcome when the event ends the fetch, `None` for progress
    /// and for events from a superseded or cancelled fetch.
    pub fn apply(
        &self,
        state: &mut ImageMessageState,
        event: FetchEvent,
    ) -> Option<Result<DecodedImage, ResolveError>> {
        let FetchEvent {
            message,
            variant,
            fetch,
            kind,
        } = event;
        if state.current_fetch(variant) != Some(fetch) {
            debug!("Ignoring stale {variant} event for message {message}");
            return None;
        }

        let outcome = match kind {
            FetchEventKind::Progress { received, total } => {
                if let Some(percent) = progress_percent(received, total) {
                    state.set_progress(variant, percent);
                }
                return None;
            }
            FetchEventKind::Completed(bytes) => self.complete(state, variant, &bytes),
            FetchEventKind::Failed(reason) => {
                warn!("Download of {variant} for message {message} failed: {reason}");
                Err(ResolveError::FetchFailed(reason))
            }
        };

        match &outcome {
            Ok(_) => {
                info!("Downloaded {variant} for message {message}");
                state.set_phase(variant, VariantPhase::Ready);
            }
            Err(e) => state.set_phase(variant, VariantPhase::Failed(e.clone())),
        }
        state.finish_fetch(variant, fetch);
        Some(outcome)
    }

    /// Abort a fetch and retire it from the state's in-flight count.
    #[allow(clippy::unused_self, clippy::needless_pass_by_value)]
    pub fn cancel(&self, state: &mut ImageMessageState, handle: FetchHandle) {
        handle.abort();
        if state.finish_fetch(handle.variant, handle.fetch) {
            debug!("Cancelled {} for message {}", handle.variant, handle.message);
            state.set_phase(handle.variant, VariantPhase::Unresolved);
        }
    }

    fn complete(
        &self,
        state: &mut ImageMessageState,
        variant: ImageVariant,
        bytes: &[u8],
    ) -> Result<DecodedImage, ResolveError> {
        let image = self
            .codec
            .decode(bytes)
            .map_err(|e| ResolveError::DecodeFailed(e.to_string()))?;

        if let Some(record) = state.record(variant) {
            let path = self.cache_path(record);
            match self.fs.write(&path, bytes) {
                Ok(()) => state.set_local_path(variant, path),
                Err(e) => warn!("Could not cache {variant} at {}: {e}", path.display()),
            }
        }

        state.complete_progress(variant);
        state.set_decoded(variant, image.clone());
        Ok(image)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::io;
    use std::sync::Mutex;

    use proptest::prelude::*;

    use super::*;
    use crate::media::CodecError;

    /// In-memory filesystem.
    #[derive(Default)]
    struct MemFs {
        files: Mutex<HashMap<PathBuf, Vec<u8>>>,
        dirs: Vec<PathBuf>,
        fail_writes: bool,
    }

    impl FileSystem for MemFs {
        fn exists(&self, path: &Path) -> bool {
            self.dirs.iter().any(|d| d == path) || self.files.lock().unwrap().contains_key(path)
        }

        fn is_dir(&self, path: &Path) -> bool {
            self.dirs.iter().any(|d| d == path)
        }

        fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }

        fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
            if self.fail_writes {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
            self.files
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), bytes.to_vec());
            Ok(())
        }
    }

    /// Accepts bytes starting with `IMG`, as a 1x1 image.
    struct TagCodec;

    impl ImageCodec for TagCodec {
        fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError> {
            if bytes.starts_with(b"IMG") {
                Ok(DecodedImage::new(image::RgbaImage::new(1, 1)))
            } else {
                Err(CodecError::Empty)
            }
        }
    }

    fn resolver(fs: MemFs) -> ImageResolver<MemFs, TagCodec> {
        ImageResolver::with_parts(fs, TagCodec, "/cache")
    }

    fn event(variant: ImageVariant, fetch: FetchId, kind: FetchEventKind) -> FetchEvent {
        FetchEvent {
            message: MessageId(1),
            variant,
            fetch,
            kind,
        }
    }

    fn large_state() -> ImageMessageState {
        ImageMessageState::new([
            ImageVariantRecord::new("img-1", ImageVariant::Large).with_remote_locator("r://large")
        ])
    }

    #[test]
    fn percent_rounds_down_and_clamps() {
        assert_eq!(progress_percent(50, 100), Some(50));
        assert_eq!(progress_percent(1, 3), Some(33));
        assert_eq!(progress_percent(2, 3), Some(66));
        assert_eq!(progress_percent(150, 100), Some(100));
        assert_eq!(progress_percent(u64::MAX, 1), Some(100));
        assert_eq!(progress_percent(5, 0), None);
    }

    proptest! {
        #[test]
        fn percent_stays_in_range(received in any::<u64>(), total in 1..u64::MAX) {
            let percent = progress_percent(received, total).unwrap();
            prop_assert!(percent <= 100);
            prop_assert_eq!(progress_percent(received, total), Some(percent));
        }
    }

    #[test]
    fn cache_path_escapes_id() {
        let resolver = resolver(MemFs::default());
        let record = ImageVariantRecord::new("../a/b c", ImageVariant::Original);
        assert_eq!(
            resolver.cache_path(&record),
            PathBuf::from("/cache/%2E%2E%2Fa%2Fb%20c_origin")
        );
        let record = ImageVariantRecord::new("", ImageVariant::Thumbnail);
        assert_eq!(resolver.cache_path(&record), PathBuf::from("/cache/_thumb"));
    }

    #[test]
    fn distinct_ids_get_distinct_cache_files() {
        let resolver = resolver(MemFs::default());
        let ids = ["a/b", "a_b", "a%2Fb", "A_b", "a_B", "é", "%C3%A9", "x", "x_thumb"];
        let mut paths = std::collections::HashSet::new();
        for id in ids {
            for variant in ImageVariant::ALL {
                let path = resolver.cache_path(&ImageVariantRecord::new(id, variant));
                let folded = path.to_string_lossy().to_lowercase();
                assert!(paths.insert(folded), "{id} {variant} collides");
            }
        }
    }

    #[test]
    fn locate_rejects_directories() {
        let fs = MemFs {
            dirs: vec![PathBuf::from("/pics/t")],
            ..MemFs::default()
        };
        let resolver = resolver(fs);
        let state = ImageMessageState::new([
            ImageVariantRecord::new("t", ImageVariant::Thumbnail).with_local_path("/pics/t")
        ]);
        assert_eq!(resolver.locate_local_path(&state, ImageVariant::Thumbnail), None);
    }

    #[test]
    fn resolve_without_record_is_not_found() {
        let resolver = resolver(MemFs::default());
        let mut state = large_state();
        assert_eq!(
            resolver.resolve(&mut state, ImageVariant::Thumbnail).unwrap_err(),
            ResolveError::NotFound
        );
    }

    #[test]
    fn corrupt_local_file_is_a_cache_miss() {
        let fs = MemFs::default();
        fs.write(Path::new("/pics/t"), b"garbage").unwrap();
        let resolver = resolver(fs);
        let mut state = ImageMessageState::new([
            ImageVariantRecord::new("t", ImageVariant::Thumbnail).with_local_path("/pics/t")
        ]);

        let err = resolver.resolve(&mut state, ImageVariant::Thumbnail).unwrap_err();
        assert!(err.needs_fetch());
        assert!(state.decoded(ImageVariant::Thumbnail).value().is_none());
        assert_eq!(state.phase(ImageVariant::Thumbnail), &VariantPhase::Unresolved);
    }

    #[test]
    fn progress_then_completion() {
        let resolver = resolver(MemFs::default());
        let mut state = large_state();
        let fetch = FetchId(100);
        state.begin_fetch(ImageVariant::Large, fetch);

        let progress = |received| FetchEventKind::Progress {
            received,
            total: 100,
        };
        assert!(resolver
            .apply(&mut state, event(ImageVariant::Large, fetch, progress(50)))
            .is_none());
        assert_eq!(state.progress(ImageVariant::Large).get(), 50);

        // Same report twice leaves the same percent.
        resolver.apply(&mut state, event(ImageVariant::Large, fetch, progress(50)));
        assert_eq!(state.progress(ImageVariant::Large).get(), 50);

        // Regressions from the transport are shown as-is.
        resolver.apply(&mut state, event(ImageVariant::Large, fetch, progress(40)));
        assert_eq!(state.progress(ImageVariant::Large).get(), 40);

        let outcome = resolver
            .apply(
                &mut state,
                event(
                    ImageVariant::Large,
                    fetch,
                    FetchEventKind::Completed(Bytes::from_static(b"IMG-large")),
                ),
            )
            .unwrap();

        assert!(outcome.is_ok());
        assert_eq!(state.progress(ImageVariant::Large).get(), 100);
        assert_eq!(state.phase(ImageVariant::Large), &VariantPhase::Ready);
        assert!(!state.is_downloading());
        assert_eq!(
            state.record(ImageVariant::Large).unwrap().local_path,
            Some(PathBuf::from("/cache/img-1_large"))
        );
        assert!(resolver.resolve(&mut state, ImageVariant::Large).is_ok());
    }

    #[test]
    fn unknown_total_leaves_progress() {
        let resolver = resolver(MemFs::default());
        let mut state = large_state();
        let fetch = FetchId(101);
        state.begin_fetch(ImageVariant::Large, fetch);

        resolver.apply(
            &mut state,
            event(
                ImageVariant::Large,
                fetch,
                FetchEventKind::Progress {
                    received: 10,
                    total: 0,
                },
            ),
        );
        assert_eq!(state.progress(ImageVariant::Large).get(), 0);
    }

    #[test]
    fn undecodable_download_fails_without_caching() {
        let resolver = resolver(MemFs::default());
        let mut state = large_state();
        let fetch = FetchId(102);
        state.begin_fetch(ImageVariant::Large, fetch);

        let outcome = resolver
            .apply(
                &mut state,
                event(
                    ImageVariant::Large,
                    fetch,
                    FetchEventKind::Completed(Bytes::from_static(b"html error page")),
                ),
            )
            .unwrap();

        assert!(matches!(outcome, Err(ResolveError::DecodeFailed(_))));
        assert!(matches!(
            state.phase(ImageVariant::Large),
            VariantPhase::Failed(ResolveError::DecodeFailed(_))
        ));
        assert!(state.decoded(ImageVariant::Large).value().is_none());
        assert!(state.record(ImageVariant::Large).unwrap().local_path.is_none());
        assert!(!state.is_downloading());
    }

    #[test]
    fn failed_cache_write_still_shows_image() {
        let fs = MemFs {
            fail_writes: true,
            ..MemFs::default()
        };
        let resolver = resolver(fs);
        let mut state = large_state();
        let fetch = FetchId(103);
        state.begin_fetch(ImageVariant::Large, fetch);

        let outcome = resolver.apply(
            &mut state,
            event(
                ImageVariant::Large,
                fetch,
                FetchEventKind::Completed(Bytes::from_static(b"IMG")),
            ),
        );

        assert!(matches!(outcome, Some(Ok(_))));
        assert!(state.decoded(ImageVariant::Large).value().is_some());
        assert!(state.record(ImageVariant::Large).unwrap().local_path.is_none());
    }

    #[test]
    fn stale_events_are_ignored() {
        let resolver = resolver(MemFs::default());
        let mut state = large_state();
        state.begin_fetch(ImageVariant::Large, FetchId(104));

        let outcome = resolver.apply(
            &mut state,
            event(
                ImageVariant::Large,
                FetchId(99),
                FetchEventKind::Failed("old".into()),
            ),
        );

        assert!(outcome.is_none());
        assert!(state.phase(ImageVariant::Large).is_fetching());
        assert!(state.is_downloading());
    }
}
