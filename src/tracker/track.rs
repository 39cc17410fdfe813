//! A single tracked bee (or bee group) and its bounded trajectory.

use std::collections::VecDeque;

use ndarray::{Array1, Array2};

use crate::error::TrackerError;
use crate::tracker::blob::{Blob, Point, SizeClass};
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::palette::Color;
use crate::tracker::registry::TrackId;
use crate::tracker::track_state::TrackState;

/// Ordered past positions of a track, capped at a fixed length.
///
/// Pushing onto a full trace drops the oldest point; the newest point is
/// always retained.
#[derive(Debug, Clone)]
pub struct Trace {
    points: VecDeque<Point>,
    capacity: usize,
}

impl Trace {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, point: Point) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn first(&self) -> Option<Point> {
        self.points.front().copied()
    }

    pub fn last(&self) -> Option<Point> {
        self.points.back().copied()
    }

    /// The second-to-last and last points, if the trace holds at least two.
    pub fn last_two(&self) -> Option<(Point, Point)> {
        let n = self.points.len();
        if n < 2 {
            return None;
        }
        Some((self.points[n - 2], self.points[n - 1]))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }
}

/// Single object track.
#[derive(Debug, Clone)]
pub struct Track {
    /// Unique track identifier
    pub id: TrackId,
    /// Current lifecycle state
    pub state: TrackState,
    /// Single bee or group, fixed at spawn
    pub kind: SizeClass,
    /// Display color, fixed at spawn
    pub color: Color,
    /// Frame the track was spawned in
    pub start_frame: u64,
    /// Last frame a blob was associated
    pub frame_id: u64,
    /// Consecutive frames without an associated blob
    pub misses: u32,
    /// Most recently associated blob
    pub last_blob: Blob,
    /// Number of blobs associated so far, including the spawning one
    pub hits: u64,
    mean: Array1<f64>,
    covariance: Array2<f64>,
    trace: Trace,
}

impl Track {
    pub(crate) fn spawn(
        id: TrackId,
        blob: Blob,
        kind: SizeClass,
        color: Color,
        kalman_filter: &KalmanFilter,
        trace_capacity: usize,
        frame_id: u64,
    ) -> Self {
        let (mean, covariance) = kalman_filter.initiate([blob.center.x, blob.center.y]);
        let mut trace = Trace::new(trace_capacity);
        trace.push(blob.center);

        Self {
            id,
            state: TrackState::Spawned,
            kind,
            color,
            start_frame: frame_id,
            frame_id,
            misses: 0,
            last_blob: blob,
            hits: 1,
            mean,
            covariance,
            trace,
        }
    }

    /// Current (predicted or filtered) position.
    pub fn position(&self) -> Point {
        Point::new(self.mean[0], self.mean[1])
    }

    /// Estimated velocity in pixels per frame.
    pub fn velocity(&self) -> Point {
        Point::new(self.mean[2], self.mean[3])
    }

    /// Estimated acceleration, for the constant-acceleration model only.
    pub fn acceleration(&self) -> Option<Point> {
        (self.mean.len() >= 6).then(|| Point::new(self.mean[4], self.mean[5]))
    }

    /// Sum of the position variances, a scalar uncertainty in px².
    pub fn position_variance(&self) -> f64 {
        self.covariance[[0, 0]] + self.covariance[[1, 1]]
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Whether a blob was associated with this track in `frame`.
    pub fn matched_in(&self, frame: u64) -> bool {
        self.misses == 0 && self.frame_id == frame
    }

    pub(crate) fn predict(&mut self, kalman_filter: &KalmanFilter) {
        let (mean, covariance) = kalman_filter.predict(&self.mean, &self.covariance);
        self.mean = mean;
        self.covariance = covariance;
    }

    /// Fold a matched blob into the track. Bookkeeping always happens; an
    /// error means the filter kept its prediction.
    pub(crate) fn update(
        &mut self,
        blob: Blob,
        kalman_filter: &KalmanFilter,
        frame_id: u64,
    ) -> Result<(), TrackerError> {
        self.frame_id = frame_id;
        self.misses = 0;
        self.hits += 1;
        self.state = TrackState::Active;
        self.last_blob = blob;
        self.trace.push(blob.center);

        let (mean, covariance) = kalman_filter
            .update(&self.mean, &self.covariance, [blob.center.x, blob.center.y])
            .ok_or(TrackerError::SingularInnovation(self.id))?;
        self.mean = mean;
        self.covariance = covariance;
        Ok(())
    }

    pub(crate) fn mark_missed(&mut self) {
        self.misses += 1;
        self.state = TrackState::Coasting;
    }

    pub(crate) fn mark_expired(&mut self) {
        self.state = TrackState::Expired;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::kalman_filter::{KalmanNoise, MotionModel};

    const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
    };

    #[test]
    fn test_trace_evicts_oldest() {
        let mut trace = Trace::new(3);
        for i in 0..5 {
            trace.push(Point::new(i as f64, 0.0));
        }
        assert_eq!(trace.len(), 3);
        let xs: Vec<f64> = trace.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![2.0, 3.0, 4.0]);
        assert_eq!(trace.last_two(), Some((Point::new(3.0, 0.0), Point::new(4.0, 0.0))));
    }

    #[test]
    fn test_spawn_seeds_trace() {
        let kf = KalmanFilter::default();
        let blob = Blob::new(10.0, 20.0, 30.0, 15.0, 400.0, 7);
        let track = Track::spawn(1, blob, SizeClass::Single, WHITE, &kf, 100, 7);
        assert_eq!(track.state, TrackState::Spawned);
        assert_eq!(track.trace().len(), 1);
        assert_eq!(track.position(), Point::new(10.0, 20.0));
        assert_eq!(track.start_frame, 7);
        assert!(track.matched_in(7));
        assert!(track.acceleration().is_none());
    }

    #[test]
    fn test_miss_then_update_resets_counter() {
        let kf = KalmanFilter::default();
        let blob = Blob::new(10.0, 20.0, 30.0, 15.0, 400.0, 0);
        let mut track = Track::spawn(1, blob, SizeClass::Single, WHITE, &kf, 100, 0);

        track.predict(&kf);
        track.mark_missed();
        track.predict(&kf);
        track.mark_missed();
        assert_eq!(track.misses, 2);
        assert_eq!(track.state, TrackState::Coasting);
        assert_eq!(track.trace().len(), 1);

        track.predict(&kf);
        let next = Blob::new(12.0, 20.0, 30.0, 15.0, 400.0, 3);
        track.update(next, &kf, 3).unwrap();
        assert_eq!(track.misses, 0);
        assert_eq!(track.state, TrackState::Active);
        assert_eq!(track.trace().len(), 2);
        assert!(track.matched_in(3));
    }

    #[test]
    fn test_coasting_grows_uncertainty_until_expired() {
        let kf = KalmanFilter::new(MotionModel::ConstantAcceleration, KalmanNoise::default());
        let blob = Blob::new(10.0, 20.0, 30.0, 15.0, 400.0, 0);
        let mut track = Track::spawn(1, blob, SizeClass::Group, WHITE, &kf, 100, 0);
        assert_eq!(track.acceleration(), Some(Point::new(0.0, 0.0)));

        let mut variance = track.position_variance();
        for _ in 0..3 {
            track.predict(&kf);
            track.mark_missed();
            assert!(track.position_variance() > variance);
            variance = track.position_variance();
        }
        assert!(track.state.is_live());
        track.mark_expired();
        assert!(!track.state.is_live());
    }
}
