//! Exactly-once recording of classifier tags per track.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::counting::statistics::{EventKind, StatisticsStore};
use crate::counting::tag::{Tag, ThresholdTable};
use crate::tracker::{TrackId, TrackRegistry};

/// Folds asynchronous classifier results into the statistics.
///
/// Cheap to clone; clones share the registry and the store, so a classifier
/// worker thread can hold its own handle.
#[derive(Debug, Clone)]
pub struct ClassificationAggregator {
    registry: Arc<TrackRegistry>,
    thresholds: ThresholdTable,
    statistics: Arc<StatisticsStore>,
}

impl ClassificationAggregator {
    pub fn new(
        registry: Arc<TrackRegistry>,
        thresholds: ThresholdTable,
        statistics: Arc<StatisticsStore>,
    ) -> Self {
        Self {
            registry,
            thresholds,
            statistics,
        }
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    /// Record every tag whose probability meets its threshold and that the
    /// track does not carry yet. Returns the newly recorded tags.
    ///
    /// Results for tracks that are no longer live are dropped.
    pub fn submit<I>(&self, track_id: TrackId, probabilities: I) -> Vec<Tag>
    where
        I: IntoIterator<Item = (Tag, f64)>,
    {
        let accepted: Vec<Tag> = probabilities
            .into_iter()
            .filter(|&(tag, probability)| {
                if !(0.0..=1.0).contains(&probability) {
                    warn!(track_id, %tag, probability, "ignoring invalid classifier probability");
                    return false;
                }
                self.thresholds.accepts(tag, probability)
            })
            .map(|(tag, _)| tag)
            .collect();

        // The registry lock is held while counting, so the track cannot
        // expire between the liveness check and the increment.
        let recorded = self.registry.with_tags(track_id, |tags| {
            let mut recorded = Vec::new();
            for tag in accepted {
                if tags.insert(tag) {
                    self.statistics.record_event(EventKind::Tagged(tag));
                    recorded.push(tag);
                }
            }
            recorded
        });

        match recorded {
            Some(recorded) => {
                if !recorded.is_empty() {
                    debug!(track_id, tags = ?recorded, "classification recorded");
                }
                recorded
            }
            None => {
                debug!(track_id, "dropping classification for track that is no longer live");
                Vec::new()
            }
        }
    }

    /// Like [`submit`](Self::submit), for classifiers that report string
    /// labels. Unknown labels are skipped.
    pub fn submit_labels<'a, I>(&self, track_id: TrackId, labels: I) -> Vec<Tag>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let parsed: Vec<(Tag, f64)> = labels
            .into_iter()
            .filter_map(|(label, probability)| match label.parse::<Tag>() {
                Ok(tag) => Some((tag, probability)),
                Err(err) => {
                    warn!(track_id, error = %err, "skipping classifier label");
                    None
                }
            })
            .collect();
        self.submit(track_id, parsed)
    }
}
