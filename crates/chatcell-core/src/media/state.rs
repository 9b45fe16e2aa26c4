//! Per-message image state.

use std::path::PathBuf;

use tracing::warn;

use super::codec::DecodedImage;
use super::model::{ImageVariant, ImageVariantRecord, VariantMap, VariantPhase};
use super::resolver::FetchId;
use crate::layout::Size;
use crate::observable::Observable;

/// Image data attached to one chat message.
///
/// Records are fixed at construction; only a successful download changes a
/// record, by filling in its `local_path`. The decoded slots, progress and
/// downloading flag are observable and are written only by
/// [`ImageResolver`](super::ImageResolver).
#[derive(Debug, Default)]
pub struct ImageMessageState {
    records: VariantMap<Option<ImageVariantRecord>>,
    decoded: VariantMap<Observable<Option<DecodedImage>>>,
    progress: VariantMap<Observable<u8>>,
    downloading: Observable<bool>,
    phases: VariantMap<VariantPhase>,
    fetches: VariantMap<Option<FetchId>>,
    in_flight: usize,
    byte_length: u64,
}

impl ImageMessageState {
    /// Build the state from the records supplied with the message.
    ///
    /// If several records share a variant, the first one is kept.
    pub fn new(records: impl IntoIterator<Item = ImageVariantRecord>) -> Self {
        let mut state = Self::default();
        for record in records {
            let slot = &mut state.records[record.variant];
            if let Some(existing) = slot {
                warn!(
                    "Dropping duplicate {} record {} (keeping {})",
                    record.variant, record.id, existing.id
                );
                continue;
            }
            *slot = Some(record);
        }
        state
    }

    /// Set the declared byte length of the image payload.
    #[must_use]
    pub const fn with_byte_length(mut self, length: u64) -> Self {
        self.byte_length = length;
        self
    }

    /// Declared byte length of the image payload.
    #[must_use]
    pub const fn byte_length(&self) -> u64 {
        self.byte_length
    }

    /// Record for `variant`, if the message has one.
    #[must_use]
    pub fn record(&self, variant: ImageVariant) -> Option<&ImageVariantRecord> {
        self.records[variant].as_ref()
    }

    /// All records present, smallest variant first.
    pub fn records(&self) -> impl Iterator<Item = &ImageVariantRecord> {
        self.records.iter().filter_map(|(_, record)| record.as_ref())
    }

    /// Observable decoded image for `variant`.
    #[must_use]
    pub fn decoded(&self, variant: ImageVariant) -> &Observable<Option<DecodedImage>> {
        &self.decoded[variant]
    }

    /// Observable download percentage for `variant`.
    #[must_use]
    pub fn progress(&self, variant: ImageVariant) -> &Observable<u8> {
        &self.progress[variant]
    }

    /// Observable flag, true while any fetch for this message is in flight.
    #[must_use]
    pub const fn downloading(&self) -> &Observable<bool> {
        &self.downloading
    }

    /// Whether any fetch for this message is in flight.
    #[must_use]
    pub const fn is_downloading(&self) -> bool {
        *self.downloading.value()
    }

    /// Number of fetches in flight.
    #[must_use]
    pub const fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Resolution phase of `variant`.
    #[must_use]
    pub fn phase(&self, variant: ImageVariant) -> &VariantPhase {
        &self.phases[variant]
    }

    /// Reset a failed variant so the UI stops showing the error.
    pub fn clear_error(&mut self, variant: ImageVariant) {
        if matches!(self.phases[variant], VariantPhase::Failed(_)) {
            self.phases[variant] = VariantPhase::Unresolved;
        }
    }

    /// Bubble size for this image, fitted within `max`.
    ///
    /// Uses the decoded thumbnail if present, then the declared display sizes
    /// of the thumbnail, large and original records. The longer side is
    /// scaled to the matching side of `max`. Returns [`Size::ZERO`] when no
    /// size is known.
    #[must_use]
    pub fn content_size(&self, max: Size) -> Size {
        let decoded = self.decoded[ImageVariant::Thumbnail]
            .value()
            .as_ref()
            .map(DecodedImage::size);
        let declared = ImageVariant::ALL
            .into_iter()
            .filter_map(|variant| self.record(variant).and_then(|r| r.display_size));

        let Some(size) = decoded.into_iter().chain(declared).find(|s| !s.is_empty()) else {
            return Size::ZERO;
        };

        if size.height > size.width {
            Size::new(size.width / size.height * max.height, max.height)
        } else {
            Size::new(max.width, size.height / size.width * max.width)
        }
    }

    pub(crate) fn current_fetch(&self, variant: ImageVariant) -> Option<FetchId> {
        self.fetches[variant]
    }

    pub(crate) fn begin_fetch(&mut self, variant: ImageVariant, fetch: FetchId) {
        self.fetches[variant] = Some(fetch);
        self.phases[variant] = VariantPhase::Fetching;
        self.in_flight += 1;
        self.progress[variant].set_if_changed(0);
        self.downloading.set_if_changed(true);
    }

    /// Retire `fetch`; returns false if it is not the variant's current fetch.
    pub(crate) fn finish_fetch(&mut self, variant: ImageVariant, fetch: FetchId) -> bool {
        if self.fetches[variant] != Some(fetch) {
            return false;
        }
        self.fetches[variant] = None;
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.in_flight == 0 {
            self.downloading.set_if_changed(false);
        }
        true
    }

    pub(crate) fn set_progress(&mut self, variant: ImageVariant, percent: u8) {
        self.progress[variant].set(percent);
    }

    pub(crate) fn complete_progress(&mut self, variant: ImageVariant) {
        self.progress[variant].set_if_changed(100);
    }

    pub(crate) fn set_decoded(&mut self, variant: ImageVariant, image: DecodedImage) {
        self.decoded[variant].set(Some(image));
    }

    pub(crate) fn set_phase(&mut self, variant: ImageVariant, phase: VariantPhase) {
        self.phases[variant] = phase;
    }

    pub(crate) fn set_local_path(&mut self, variant: ImageVariant, path: PathBuf) {
        if let Some(record) = self.records[variant].as_mut() {
            record.local_path = Some(path);
        }
    }
}
