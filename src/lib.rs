//! Hive-entrance bee tracking and counting.
//!
//! Blobs found by a detector are associated frame over frame into tracks,
//! tracks crossing a virtual gate are counted as bees entering or leaving,
//! and classifier tags (varroa, pollen, wasp, cooling) are recorded at most
//! once per track.
//!
//! ```no_run
//! use std::sync::Arc;
//! use beegate::{Blob, GateConfig, GateCounter, StatisticsStore, Tracker, TrackerConfig};
//!
//! let statistics = Arc::new(StatisticsStore::new());
//! let mut tracker = Tracker::new(TrackerConfig::default())?;
//! let mut gate = GateCounter::new(GateConfig::horizontal(270.0, true), Arc::clone(&statistics))?;
//!
//! for (frame, y) in [250.0, 262.0, 281.0].into_iter().enumerate() {
//!     let blobs = [Blob::new(400.0, y, 40.0, 20.0, 600.0, frame as u64)];
//!     let tracks = tracker.step(&blobs, frame as u64);
//!     gate.evaluate_all(tracks, frame as u64);
//! }
//! assert_eq!(statistics.snapshot_window().bees_in, 1);
//! # Ok::<(), beegate::ConfigError>(())
//! ```

pub mod config;
pub mod counting;
pub mod error;
pub mod integration;
pub mod tracker;

pub use config::HiveConfig;
pub use counting::{
    ClassificationAggregator, Direction, EventKind, GateConfig, GateCounter, GateEvent, StatisticsReport,
    StatisticsSnapshot, StatisticsStore, Tag, TagSet, ThresholdTable,
};
pub use error::{BlobError, ConfigError, PipelineError, TrackerError};
pub use integration::{
    BlobBuilder, BlobDetector, BufferConfig, BufferedSource, ClassificationRequest, Classifier, FrameOutcome,
    FrameSource, HivePipeline, PipelineConfig, ReportConfig, Reporter, SourceKind, TelemetrySink, TimedFrame,
};
pub use tracker::{Blob, Point, SizeClass, Track, TrackId, TrackState, Tracker, TrackerConfig};
