//! Integration layer connecting frame capture, blob detection and uplink
//! with the tracker and counters.
//!
//! The traits in this module are the seams to the outside world: plug a
//! camera into [`FrameSource`], a contour stage into [`BlobDetector`], a
//! model into [`Classifier`] and a network client into [`TelemetrySink`].

mod buffer;
mod builder;
mod detector;
mod pipeline;
mod reporter;

pub use buffer::{BufferConfig, BufferedSource, SourceKind};
pub use builder::BlobBuilder;
pub use detector::{BlobDetector, ClassificationRequest, Classifier, FrameSource, TelemetrySink, TimedFrame};
pub use pipeline::{FrameOutcome, HivePipeline, PipelineConfig};
pub use reporter::{ReportConfig, Reporter};
