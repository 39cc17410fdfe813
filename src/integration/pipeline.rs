//! HivePipeline for chaining blob detection, tracking and counting.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::HiveConfig;
use crate::counting::{ClassificationAggregator, EventKind, GateCounter, GateEvent, StatisticsReport, StatisticsStore};
use crate::error::{ConfigError, PipelineError};
use crate::tracker::{Blob, Tracker};

use super::{BlobDetector, ClassificationRequest, Classifier, FrameSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub enable_tracking: bool,
    pub enable_counting: bool,
    pub enable_classification: bool,
    /// Request a classification every N matched frames of a track
    pub extract_frame_step: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enable_tracking: true,
            enable_counting: true,
            enable_classification: true,
            extract_frame_step: 10,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extract_frame_step == 0 {
            return Err(ConfigError::ZeroCount("extract_frame_step"));
        }
        Ok(())
    }
}

/// What happened in one processed frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameOutcome {
    pub frame_index: u64,
    pub live_tracks: usize,
    pub events: Vec<GateEvent>,
    pub classification_requests: Vec<ClassificationRequest>,
}

/// Per-frame chain: detector, tracker, gate counter, statistics.
///
/// Classifier results come back asynchronously through the handle returned
/// by [`aggregator`](Self::aggregator).
pub struct HivePipeline<D: BlobDetector> {
    detector: D,
    classifier: Option<Box<dyn Classifier<D::Frame> + Send>>,
    tracker: Tracker,
    gate: GateCounter,
    statistics: Arc<StatisticsStore>,
    aggregator: ClassificationAggregator,
    config: PipelineConfig,
    frame_index: u64,
}

impl<D: BlobDetector> HivePipeline<D> {
    /// Validate `config` and wire up every component.
    pub fn new(detector: D, config: &HiveConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let statistics = Arc::new(StatisticsStore::new());
        let tracker = Tracker::new(config.tracker.clone())?;
        let gate = GateCounter::new(config.gate, Arc::clone(&statistics))?;
        let aggregator = ClassificationAggregator::new(
            tracker.registry(),
            config.thresholds,
            Arc::clone(&statistics),
        );
        Ok(Self {
            detector,
            classifier: None,
            tracker,
            gate,
            statistics,
            aggregator,
            config: config.pipeline,
            frame_index: 0,
        })
    }

    pub fn with_classifier<C>(mut self, classifier: C) -> Self
    where
        C: Classifier<D::Frame> + Send + 'static,
    {
        self.classifier = Some(Box::new(classifier));
        self
    }

    pub fn statistics(&self) -> Arc<StatisticsStore> {
        Arc::clone(&self.statistics)
    }

    /// Handle for delivering classifier results, usable from any thread.
    pub fn aggregator(&self) -> ClassificationAggregator {
        self.aggregator.clone()
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    /// Number of frames processed so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Run the chain on blobs detected elsewhere.
    ///
    /// Classification requests are collected in the outcome but not sent,
    /// since there is no frame to crop from.
    pub fn process_blobs(&mut self, blobs: &[Blob]) -> FrameOutcome {
        self.advance(blobs)
    }

    /// Detect, track and count one frame.
    ///
    /// Returns `None` when the detector fails; the frame is skipped and not
    /// counted as processed.
    pub fn process_frame(&mut self, frame: &D::Frame) -> Option<FrameOutcome> {
        let blobs = match self.detector.detect(frame, self.frame_index) {
            Ok(blobs) => blobs,
            Err(err) => {
                warn!(frame = self.frame_index, error = %err, "blob detection failed, skipping frame");
                return None;
            }
        };
        let outcome = self.advance(&blobs);
        if let Some(classifier) = self.classifier.as_mut() {
            for request in &outcome.classification_requests {
                classifier.request(frame, *request);
            }
        }
        Some(outcome)
    }

    /// Pull frames until end of stream or until `shutdown` is set.
    ///
    /// The flag is checked before each frame, so the frame in flight is
    /// always finished. Returns the final statistics.
    pub fn run<S>(&mut self, source: &mut S, shutdown: &AtomicBool) -> Result<StatisticsReport, PipelineError<S::Error>>
    where
        S: FrameSource<Frame = D::Frame>,
    {
        info!(start_frame = self.frame_index, "pipeline started");
        while !shutdown.load(Ordering::Acquire) {
            let Some(timed) = source.next_frame().map_err(PipelineError::Source)? else {
                debug!(frame = self.frame_index, "end of stream");
                break;
            };
            if let Some(outcome) = self.process_frame(&timed.frame) {
                debug!(
                    frame = outcome.frame_index,
                    timestamp_ms = timed.timestamp.as_millis() as u64,
                    live = outcome.live_tracks,
                    events = outcome.events.len(),
                    "frame processed"
                );
            }
        }
        let report = self.statistics.snapshot();
        info!(
            frames = report.overall.processed_frames,
            bees_in = report.overall.bees_in,
            bees_out = report.overall.bees_out,
            "pipeline stopped"
        );
        Ok(report)
    }

    fn advance(&mut self, blobs: &[Blob]) -> FrameOutcome {
        let frame_index = self.frame_index;
        self.frame_index += 1;

        let mut outcome = FrameOutcome {
            frame_index,
            ..FrameOutcome::default()
        };

        if self.config.enable_tracking {
            let tracks = self.tracker.step(blobs, frame_index);
            outcome.live_tracks = tracks.len();

            if self.config.enable_counting {
                outcome.events = self.gate.evaluate_all(tracks, frame_index);
            }

            if self.config.enable_classification {
                let step = self.config.extract_frame_step;
                outcome.classification_requests = tracks
                    .iter()
                    .filter(|t| t.matched_in(frame_index) && t.hits % step == 0)
                    .map(|t| ClassificationRequest {
                        track_id: t.id,
                        frame_index,
                        center: t.last_blob.center,
                        major_axis: t.last_blob.major_axis,
                        minor_axis: t.last_blob.minor_axis,
                        kind: t.kind,
                    })
                    .collect();
            }
        }

        self.statistics.record_event(EventKind::FrameProcessed);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::counting::{Direction, GateConfig, Tag};
    use crate::integration::TimedFrame;
    use crate::tracker::TrackId;

    /// Each frame is the list of blob centroids to report.
    struct MockDetector;

    impl BlobDetector for MockDetector {
        type Frame = Vec<(f64, f64)>;
        type Error = String;

        fn detect(&mut self, frame: &Self::Frame, frame_index: u64) -> Result<Vec<Blob>, String> {
            if frame.is_empty() {
                return Err("empty frame".to_string());
            }
            Ok(frame
                .iter()
                .map(|&(x, y)| Blob::new(x, y, 40.0, 20.0, 600.0, frame_index))
                .collect())
        }
    }

    struct VecSource(std::vec::IntoIter<Vec<(f64, f64)>>);

    impl FrameSource for VecSource {
        type Frame = Vec<(f64, f64)>;
        type Error = String;

        fn next_frame(&mut self) -> Result<Option<TimedFrame<Self::Frame>>, String> {
            Ok(self.0.next().map(|f| TimedFrame::new(f, Duration::ZERO)))
        }
    }

    struct BrokenSource;

    impl FrameSource for BrokenSource {
        type Frame = Vec<(f64, f64)>;
        type Error = String;

        fn next_frame(&mut self) -> Result<Option<TimedFrame<Self::Frame>>, String> {
            Err("disk gone".to_string())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingClassifier(Arc<Mutex<Vec<TrackId>>>);

    impl Classifier<Vec<(f64, f64)>> for RecordingClassifier {
        fn request(&mut self, _frame: &Vec<(f64, f64)>, request: ClassificationRequest) {
            self.0.lock().push(request.track_id);
        }
    }

    fn hive_config() -> HiveConfig {
        HiveConfig {
            gate: GateConfig::horizontal(100.0, true),
            ..HiveConfig::default()
        }
    }

    #[test]
    fn test_crossing_on_third_frame() {
        let mut pipeline = HivePipeline::new(MockDetector, &hive_config()).unwrap();
        let first = pipeline.process_frame(&vec![(50.0, 80.0)]).unwrap();
        let second = pipeline.process_frame(&vec![(50.0, 90.0)]).unwrap();
        let third = pipeline.process_frame(&vec![(50.0, 110.0)]).unwrap();
        assert!(first.events.is_empty());
        assert!(second.events.is_empty());
        assert_eq!(third.events.len(), 1);
        assert_eq!(third.events[0].direction, Direction::In);

        let statistics = pipeline.statistics();
        let window = statistics.snapshot_window();
        assert_eq!(window.bees_in, 1);
        assert_eq!(window.processed_frames, 3);

        statistics.reset_window();
        assert_eq!(statistics.snapshot_window().bees_in, 0);
        assert_eq!(statistics.snapshot_overall().bees_in, 1);
    }

    #[test]
    fn test_detector_error_skips_frame() {
        let mut pipeline = HivePipeline::new(MockDetector, &hive_config()).unwrap();
        assert!(pipeline.process_frame(&vec![]).is_none());
        assert_eq!(pipeline.statistics().snapshot_overall().processed_frames, 0);
        assert_eq!(pipeline.frame_index(), 0);
    }

    #[test]
    fn test_classification_requested_every_step() {
        let config = HiveConfig {
            pipeline: PipelineConfig {
                extract_frame_step: 2,
                ..PipelineConfig::default()
            },
            ..hive_config()
        };
        let classifier = RecordingClassifier::default();
        let requested = Arc::clone(&classifier.0);
        let mut pipeline = HivePipeline::new(MockDetector, &config)
            .unwrap()
            .with_classifier(classifier);
        for i in 0..5 {
            pipeline.process_frame(&vec![(300.0 + i as f64, 300.0)]);
        }
        // Hits 2 and 4.
        assert_eq!(*requested.lock(), vec![1, 1]);

        let aggregator = pipeline.aggregator();
        assert_eq!(aggregator.submit(1, [(Tag::Pollen, 0.93)]), vec![Tag::Pollen]);
        assert_eq!(pipeline.statistics().snapshot_window().pollen_count, 1);
    }

    #[test]
    fn test_counting_disabled() {
        let config = HiveConfig {
            pipeline: PipelineConfig {
                enable_counting: false,
                ..PipelineConfig::default()
            },
            ..hive_config()
        };
        let mut pipeline = HivePipeline::new(MockDetector, &config).unwrap();
        for blobs in [[Blob::new(50.0, 90.0, 40.0, 20.0, 600.0, 0)], [Blob::new(50.0, 110.0, 40.0, 20.0, 600.0, 1)]] {
            assert!(pipeline.process_blobs(&blobs).events.is_empty());
        }
        let overall = pipeline.statistics().snapshot_overall();
        assert_eq!(overall.bees_in, 0);
        assert_eq!(overall.processed_frames, 2);
    }

    #[test]
    fn test_run_until_end_of_stream() {
        let frames = vec![vec![(50.0, 120.0)], vec![(50.0, 105.0)], vec![(50.0, 95.0)], vec![(50.0, 80.0)]];
        let mut source = VecSource(frames.into_iter());
        let mut pipeline = HivePipeline::new(MockDetector, &hive_config()).unwrap();
        let report = pipeline.run(&mut source, &AtomicBool::new(false)).unwrap();
        assert_eq!(report.overall.bees_out, 1);
        assert_eq!(report.overall.processed_frames, 4);
    }

    #[test]
    fn test_run_honours_shutdown_flag() {
        let mut source = VecSource(vec![vec![(1.0, 1.0)]; 10].into_iter());
        let mut pipeline = HivePipeline::new(MockDetector, &hive_config()).unwrap();
        let report = pipeline.run(&mut source, &AtomicBool::new(true)).unwrap();
        assert_eq!(report.overall.processed_frames, 0);
    }

    #[test]
    fn test_run_source_error() {
        let mut pipeline = HivePipeline::new(MockDetector, &hive_config()).unwrap();
        let err = pipeline
            .run(&mut BrokenSource, &AtomicBool::new(false))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Source(ref e) if e == "disk gone"));
    }

    #[test]
    fn test_invalid_config_refuses_to_start() {
        let config = HiveConfig {
            pipeline: PipelineConfig {
                extract_frame_step: 0,
                ..PipelineConfig::default()
            },
            ..HiveConfig::default()
        };
        assert_eq!(
            HivePipeline::new(MockDetector, &config).err(),
            Some(ConfigError::ZeroCount("extract_frame_step"))
        );
    }
}
