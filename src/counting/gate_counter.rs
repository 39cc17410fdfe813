//! Directional gate-crossing detection on track trajectories.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::counting::statistics::{EventKind, StatisticsStore};
use crate::error::ConfigError;
use crate::tracker::{Point, Track, TrackId};

/// Direction of a gate crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Into the hive
    In,
    /// Out of the hive
    Out,
}

impl From<Direction> for EventKind {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::In => EventKind::BeeIn,
            Direction::Out => EventKind::BeeOut,
        }
    }
}

/// One physical crossing of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateEvent {
    pub track_id: TrackId,
    pub direction: Direction,
    pub frame_index: u64,
}

/// Virtual boundary in frame coordinates.
///
/// The gate is the line through `origin` perpendicular to `inward`, which
/// points into the hive. Points closer than `band` to the line count as
/// being on the gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub origin: Point,
    pub inward: Point,
    pub band: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        // Horizontal line across the middle of a 960x540 frame, hive below.
        Self {
            origin: Point::new(480.0, 270.0),
            inward: Point::new(0.0, 1.0),
            band: 0.0,
        }
    }
}

impl GateConfig {
    pub fn new(origin: Point, inward: Point) -> Self {
        Self {
            origin,
            inward,
            band: 0.0,
        }
    }

    /// Horizontal gate at `y`; the hive lies towards larger `y` when
    /// `hive_below` is set.
    pub fn horizontal(y: f64, hive_below: bool) -> Self {
        let sign = if hive_below { 1.0 } else { -1.0 };
        Self::new(Point::new(0.0, y), Point::new(0.0, sign))
    }

    pub fn with_band(mut self, band: f64) -> Self {
        self.band = band;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let norm = self.inward.x.hypot(self.inward.y);
        if !self.origin.is_finite() || !norm.is_finite() || norm == 0.0 {
            return Err(ConfigError::DegenerateGate);
        }
        if !self.band.is_finite() || self.band < 0.0 {
            return Err(ConfigError::InvalidGateBand(self.band));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Inward,
    Outward,
}

#[derive(Debug, Clone, Copy, Default)]
struct GateMemo {
    /// Last side the trajectory was definitely on
    last_side: Option<Side>,
    /// Frame of the last emitted event
    last_event_frame: Option<u64>,
}

/// Emits at most one [`GateEvent`] per track per frame and records it in the
/// [`StatisticsStore`].
pub struct GateCounter {
    origin: Point,
    normal: Point,
    band: f64,
    statistics: Arc<StatisticsStore>,
    memo: HashMap<TrackId, GateMemo>,
}

impl GateCounter {
    pub fn new(config: GateConfig, statistics: Arc<StatisticsStore>) -> Result<Self, ConfigError> {
        config.validate()?;
        let norm = config.inward.x.hypot(config.inward.y);
        Ok(Self {
            origin: config.origin,
            normal: Point::new(config.inward.x / norm, config.inward.y / norm),
            band: config.band,
            statistics,
            memo: HashMap::new(),
        })
    }

    /// Signed distance from the gate line, positive on the hive side.
    pub fn signed_distance(&self, p: Point) -> f64 {
        (p.x - self.origin.x) * self.normal.x + (p.y - self.origin.y) * self.normal.y
    }

    fn side_of(&self, p: Point) -> Option<Side> {
        let d = self.signed_distance(p);
        if d.abs() <= self.band {
            None
        } else if d > 0.0 {
            Some(Side::Inward)
        } else {
            Some(Side::Outward)
        }
    }

    /// Check the latest trajectory segment of `track` for a crossing.
    ///
    /// Only tracks matched in `frame_index` are considered. Positions on the
    /// gate never trigger; the crossing fires once the track reaches a
    /// definite side opposite to the last definite side it was seen on.
    pub fn evaluate(&mut self, track: &Track, frame_index: u64) -> Option<GateEvent> {
        if !track.matched_in(frame_index) {
            return None;
        }
        let (prev, last) = track.trace().last_two()?;
        if prev == last {
            return None;
        }

        let prev_side = self.side_of(prev);
        let last_side = self.side_of(last);
        let memo = self.memo.entry(track.id).or_default();
        if memo.last_event_frame == Some(frame_index) {
            return None;
        }

        let reference = prev_side.or(memo.last_side);
        if last_side.is_some() {
            memo.last_side = last_side;
        } else if prev_side.is_some() {
            memo.last_side = prev_side;
        }

        let (Some(from), Some(to)) = (reference, last_side) else {
            return None;
        };
        if from == to {
            return None;
        }
        memo.last_event_frame = Some(frame_index);

        let direction = match to {
            Side::Inward => Direction::In,
            Side::Outward => Direction::Out,
        };
        let event = GateEvent {
            track_id: track.id,
            direction,
            frame_index,
        };
        self.statistics.record_event(direction.into());
        debug!(track_id = track.id, frame = frame_index, ?direction, "gate crossing");
        Some(event)
    }

    /// Evaluate every track and drop state for tracks no longer live.
    pub fn evaluate_all(&mut self, tracks: &[Track], frame_index: u64) -> Vec<GateEvent> {
        let events: Vec<GateEvent> = tracks
            .iter()
            .filter_map(|t| self.evaluate(t, frame_index))
            .collect();
        self.memo
            .retain(|id, _| tracks.binary_search_by_key(id, |t| t.id).is_ok());
        events
    }

    /// Number of tracks with remembered gate state.
    pub fn tracked_len(&self) -> usize {
        self.memo.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{Blob, Tracker, TrackerConfig};

    fn bee(x: f64, y: f64, frame: u64) -> Blob {
        Blob::new(x, y, 40.0, 20.0, 600.0, frame)
    }

    /// Drive one bee along `ys` (x fixed) and collect gate events.
    fn run(gate: GateConfig, ys: &[f64]) -> (Vec<GateEvent>, Arc<StatisticsStore>) {
        let statistics = Arc::new(StatisticsStore::new());
        let mut counter = GateCounter::new(gate, Arc::clone(&statistics)).unwrap();
        let mut tracker = Tracker::new(TrackerConfig::default()).unwrap();
        let mut events = Vec::new();
        for (frame, y) in ys.iter().enumerate() {
            let frame = frame as u64;
            let tracks = tracker.step(&[bee(100.0, *y, frame)], frame);
            events.extend(counter.evaluate_all(tracks, frame));
        }
        (events, statistics)
    }

    #[test]
    fn test_single_crossing_inward() {
        let (events, statistics) = run(GateConfig::horizontal(100.0, true), &[80.0, 90.0, 110.0, 120.0]);
        assert_eq!(
            events,
            vec![GateEvent {
                track_id: 1,
                direction: Direction::In,
                frame_index: 2,
            }]
        );
        assert_eq!(statistics.snapshot_window().bees_in, 1);
        assert_eq!(statistics.snapshot_window().bees_out, 0);
    }

    #[test]
    fn test_single_crossing_outward() {
        let (events, statistics) = run(GateConfig::horizontal(100.0, true), &[120.0, 105.0, 95.0]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].direction, Direction::Out);
        assert_eq!(statistics.snapshot_overall().bees_out, 1);
    }

    #[test]
    fn test_touching_without_crossing() {
        let (events, _) = run(GateConfig::horizontal(100.0, true), &[80.0, 90.0, 100.0, 90.0, 80.0]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_crossing_through_the_line() {
        let (events, _) = run(GateConfig::horizontal(100.0, true), &[90.0, 100.0, 110.0]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].direction, Direction::In);
        assert_eq!(events[0].frame_index, 2);
    }

    #[test]
    fn test_back_and_forth_alternates() {
        let (events, statistics) = run(
            GateConfig::horizontal(100.0, true),
            &[90.0, 110.0, 90.0, 110.0],
        );
        let directions: Vec<Direction> = events.iter().map(|e| e.direction).collect();
        assert_eq!(directions, vec![Direction::In, Direction::Out, Direction::In]);
        let overall = statistics.snapshot_overall();
        assert_eq!(overall.bees_in, 2);
        assert_eq!(overall.bees_out, 1);
    }

    #[test]
    fn test_band_absorbs_jitter() {
        let gate = GateConfig::horizontal(100.0, true).with_band(5.0);
        let (events, _) = run(gate, &[80.0, 98.0, 103.0, 97.0, 102.0, 80.0]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_memo_is_dropped_for_expired_tracks() {
        let statistics = Arc::new(StatisticsStore::new());
        let mut counter = GateCounter::new(GateConfig::horizontal(100.0, true), statistics).unwrap();
        let config = TrackerConfig {
            max_misses: 0,
            ..TrackerConfig::default()
        };
        let mut tracker = Tracker::new(config).unwrap();
        tracker.step(&[bee(100.0, 80.0, 0)], 0);
        let tracks = tracker.step(&[bee(100.0, 90.0, 1)], 1);
        counter.evaluate_all(tracks, 1);
        assert_eq!(counter.tracked_len(), 1);

        let tracks = tracker.step(&[], 2);
        counter.evaluate_all(tracks, 2);
        assert_eq!(counter.tracked_len(), 0);
    }

    #[test]
    fn test_invalid_gate() {
        let statistics = Arc::new(StatisticsStore::new());
        let gate = GateConfig::new(Point::new(0.0, 0.0), Point::new(0.0, 0.0));
        assert_eq!(
            GateCounter::new(gate, Arc::clone(&statistics)).err(),
            Some(ConfigError::DegenerateGate)
        );
        let band = GateConfig::horizontal(10.0, false).with_band(-1.0);
        assert_eq!(
            GateCounter::new(band, statistics).err(),
            Some(ConfigError::InvalidGateBand(-1.0))
        );
    }
}
