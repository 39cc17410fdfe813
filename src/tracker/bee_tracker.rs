//! Frame-over-frame bee tracker: predict, associate, update, coast, spawn.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::ConfigError;
use crate::tracker::blob::{AreaRange, Blob, Point, SizeClass, classify_area};
use crate::tracker::kalman_filter::{KalmanFilter, KalmanNoise, MotionModel};
use crate::tracker::matching::{self, AssignmentResult};
use crate::tracker::palette::{Palette, PaletteConfig};
use crate::tracker::registry::{TrackId, TrackRegistry};
use crate::tracker::track::Track;

/// Configuration for the [`Tracker`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum distance in pixels between a prediction and a blob centroid
    pub gating_distance: f64,
    /// Weight of the area-similarity term in the association cost
    pub area_weight: f64,
    /// A track expires once its miss counter exceeds this value
    pub max_misses: u32,
    /// Maximum number of points kept per trace
    pub max_trace_length: usize,
    /// Area range of a single bee
    pub single_bee_area: AreaRange,
    /// Area range of a group of bees
    pub group_area: AreaRange,
    pub motion_model: MotionModel,
    pub noise: KalmanNoise,
    pub palette: PaletteConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            gating_distance: 80.0,
            area_weight: 0.0,
            max_misses: 10,
            max_trace_length: 10_000,
            single_bee_area: AreaRange::new(100.0, 2500.0),
            group_area: AreaRange::new(3000.0, 12500.0),
            motion_model: MotionModel::ConstantVelocity,
            noise: KalmanNoise::default(),
            palette: PaletteConfig::default(),
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("gating_distance", self.gating_distance)?;
        if !self.area_weight.is_finite() || self.area_weight < 0.0 {
            return Err(ConfigError::NonPositive {
                name: "area_weight",
                value: self.area_weight,
            });
        }
        if self.max_trace_length < 2 {
            return Err(ConfigError::TraceTooShort(self.max_trace_length));
        }
        for (name, range) in [("single bee", &self.single_bee_area), ("group", &self.group_area)] {
            if !range.is_valid() {
                return Err(ConfigError::InvalidSizeRange {
                    name,
                    min: range.min,
                    max: range.max,
                });
            }
        }
        if self.single_bee_area.overlaps(&self.group_area) {
            return Err(ConfigError::OverlappingSizeRanges);
        }
        positive("noise.measurement", self.noise.measurement)?;
        positive("noise.position", self.noise.position)?;
        positive("noise.velocity", self.noise.velocity)?;
        positive("noise.acceleration", self.noise.acceleration)?;
        if self.palette.size == 0 {
            return Err(ConfigError::ZeroCount("palette.size"));
        }
        Ok(())
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}

/// What happened to the blobs and tracks during one [`Tracker::step`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepSummary {
    pub frame_index: u64,
    /// Blobs dropped for malformed geometry
    pub rejected: usize,
    /// Blobs dropped as noise or ambiguous size
    pub discarded: usize,
    /// Tracks matched to a blob
    pub matched: usize,
    /// Tracks coasting after this step (not counting expired ones)
    pub coasting: usize,
    pub spawned: Vec<TrackId>,
    pub expired: Vec<TrackId>,
}

pub struct Tracker {
    tracks: Vec<Track>,
    next_id: TrackId,
    frame_id: u64,
    frames_seen: u64,
    config: TrackerConfig,
    kalman_filter: KalmanFilter,
    palette: Palette,
    registry: Arc<TrackRegistry>,
    last_step: StepSummary,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let kalman_filter = KalmanFilter::new(config.motion_model, config.noise);
        let palette = Palette::new(&config.palette);
        Ok(Self {
            tracks: Vec::new(),
            next_id: 1,
            frame_id: 0,
            frames_seen: 0,
            config,
            kalman_filter,
            palette,
            registry: Arc::new(TrackRegistry::new()),
            last_step: StepSummary::default(),
        })
    }

    /// Shared handle to the live-track table.
    pub fn registry(&self) -> Arc<TrackRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Live tracks, ordered by ascending id.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks
            .binary_search_by_key(&id, |t| t.id)
            .ok()
            .map(|idx| &self.tracks[idx])
    }

    /// Number of frames passed to [`Tracker::step`] so far.
    pub fn frame_count(&self) -> u64 {
        self.frames_seen
    }

    /// Frame index of the latest step.
    pub fn current_frame(&self) -> u64 {
        self.frame_id
    }

    pub fn last_step(&self) -> &StepSummary {
        &self.last_step
    }

    fn next_track_id(&mut self) -> TrackId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Advance all tracks by one frame using the given detections.
    ///
    /// Blobs outside both size ranges are dropped before association, so
    /// they neither spawn tracks nor feed existing ones; a track whose only
    /// blob is dropped coasts for that frame.
    pub fn step(&mut self, blobs: &[Blob], frame_index: u64) -> &[Track] {
        self.frame_id = frame_index;
        self.frames_seen += 1;
        let mut summary = StepSummary {
            frame_index,
            ..StepSummary::default()
        };

        // Step 1: Drop malformed and out-of-range blobs
        let mut candidates: Vec<Blob> = Vec::with_capacity(blobs.len());
        let mut kinds: Vec<SizeClass> = Vec::with_capacity(blobs.len());
        for blob in blobs {
            if let Err(err) = blob.validate() {
                warn!(frame = frame_index, error = %err, "rejecting malformed blob");
                summary.rejected += 1;
                continue;
            }
            match classify_area(blob.area, &self.config.single_bee_area, &self.config.group_area) {
                Some(kind) => {
                    candidates.push(*blob);
                    kinds.push(kind);
                }
                None => {
                    trace!(frame = frame_index, area = blob.area, "discarding blob outside size ranges");
                    summary.discarded += 1;
                }
            }
        }

        // Step 2: Predict every live track
        for track in self.tracks.iter_mut() {
            track.predict(&self.kalman_filter);
        }

        // Step 3: Associate predictions with blobs
        let predictions: Vec<(Point, f64)> = self
            .tracks
            .iter()
            .map(|t| (t.position(), t.last_blob.area))
            .collect();
        let costs = matching::association_costs(
            &predictions,
            &candidates,
            self.config.gating_distance,
            self.config.area_weight,
        );
        let AssignmentResult {
            matches,
            unmatched_tracks,
            unmatched_detections,
        } = matching::linear_assignment(&costs);

        for &(itracked, idet) in &matches {
            let track = &mut self.tracks[itracked];
            if let Err(err) = track.update(candidates[idet], &self.kalman_filter, frame_index) {
                warn!(frame = frame_index, error = %err, "kalman update failed, keeping prediction");
            }
        }
        summary.matched = matches.len();

        // Step 4: Coast unmatched tracks and expire the stale ones
        for idx in unmatched_tracks {
            self.tracks[idx].mark_missed();
        }

        let max_misses = self.config.max_misses;
        let registry = &self.registry;
        let expired = &mut summary.expired;
        self.tracks.retain_mut(|track| {
            if track.misses <= max_misses {
                return true;
            }
            track.mark_expired();
            registry.remove(track.id);
            debug!(
                track_id = track.id,
                frame = frame_index,
                hits = track.hits,
                "track expired"
            );
            expired.push(track.id);
            false
        });
        summary.coasting = self.tracks.iter().filter(|t| t.misses > 0).count();

        // Step 5: Spawn tracks for unmatched blobs
        for idx in unmatched_detections {
            let id = self.next_track_id();
            let color = self.palette.draw();
            self.registry.register(id);
            self.tracks.push(Track::spawn(
                id,
                candidates[idx],
                kinds[idx],
                color,
                &self.kalman_filter,
                self.config.max_trace_length,
                frame_index,
            ));
            trace!(track_id = id, frame = frame_index, kind = ?kinds[idx], "track spawned");
            summary.spawned.push(id);
        }

        self.last_step = summary;
        &self.tracks
    }
}
