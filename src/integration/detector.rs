//! Traits for the collaborators around the tracking core.

use std::fmt::Display;
use std::time::Duration;

use crate::counting::StatisticsReport;
use crate::tracker::{Blob, Point, SizeClass, TrackId};

/// A frame together with its capture time relative to the stream start.
#[derive(Debug, Clone)]
pub struct TimedFrame<F> {
    pub frame: F,
    pub timestamp: Duration,
}

impl<F> TimedFrame<F> {
    pub fn new(frame: F, timestamp: Duration) -> Self {
        Self { frame, timestamp }
    }
}

/// Pull-based frame source (camera or video file).
pub trait FrameSource {
    type Frame;
    type Error;

    /// Return the next frame, or `None` at end of stream. May block until a
    /// frame is ready.
    fn next_frame(&mut self) -> Result<Option<TimedFrame<Self::Frame>>, Self::Error>;
}

/// Turns a frame into ellipse blob candidates.
///
/// Implement this trait to connect a thresholding/contour stage to the
/// tracker.
///
/// # Example
///
/// ```ignore
/// use beegate::{Blob, BlobDetector};
///
/// struct ContourDetector { /* thresholds */ }
///
/// impl BlobDetector for ContourDetector {
///     type Frame = GrayImage;
///     type Error = std::io::Error;
///
///     fn detect(&mut self, frame: &GrayImage, frame_index: u64) -> Result<Vec<Blob>, Self::Error> {
///         Ok(vec![])
///     }
/// }
/// ```
pub trait BlobDetector {
    type Frame;
    type Error: Display;

    fn detect(&mut self, frame: &Self::Frame, frame_index: u64) -> Result<Vec<Blob>, Self::Error>;
}

/// What the classifier needs to cut a bee out of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationRequest {
    pub track_id: TrackId,
    pub frame_index: u64,
    pub center: Point,
    pub major_axis: f64,
    pub minor_axis: f64,
    pub kind: SizeClass,
}

/// Asynchronous bee classifier.
///
/// `request` must not block the tracking thread. Results are delivered
/// later through a `ClassificationAggregator` handle, or not at all.
pub trait Classifier<F> {
    fn request(&mut self, frame: &F, request: ClassificationRequest);
}

/// Uplink for periodic statistics reports.
pub trait TelemetrySink {
    type Error: Display;

    fn transmit(&mut self, report: &StatisticsReport) -> Result<(), Self::Error>;
}
