//! Shared table of live track ids and their recorded classification tags.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::counting::TagSet;

/// Unique track identifier. Monotonically increasing, never reused.
pub type TrackId = u64;

/// The live-track table shared between the tracking thread and classifier
/// result submitters.
///
/// Tracks are registered at spawn and removed at expiry under the same lock
/// that guards tag updates, so a classification result can never land on a
/// track that has already been removed.
#[derive(Debug, Default)]
pub struct TrackRegistry {
    live: Mutex<HashMap<TrackId, TagSet>>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, id: TrackId) {
        self.live.lock().insert(id, TagSet::default());
    }

    pub(crate) fn remove(&self, id: TrackId) {
        self.live.lock().remove(&id);
    }

    /// Run `f` on the tag set of a live track while the table is locked.
    /// Returns `None` if the track is not live.
    pub(crate) fn with_tags<R>(&self, id: TrackId, f: impl FnOnce(&mut TagSet) -> R) -> Option<R> {
        self.live.lock().get_mut(&id).map(f)
    }

    pub fn contains(&self, id: TrackId) -> bool {
        self.live.lock().contains_key(&id)
    }

    /// Tags recorded so far for a live track.
    pub fn tags(&self, id: TrackId) -> Option<TagSet> {
        self.live.lock().get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.lock().is_empty()
    }
}
