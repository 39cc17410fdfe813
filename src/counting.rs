//! Event aggregation: gate crossings, classification tags and statistics.

mod classification;
mod gate_counter;
mod statistics;
mod tag;

pub use classification::ClassificationAggregator;
pub use gate_counter::{Direction, GateConfig, GateCounter, GateEvent};
pub use statistics::{EventKind, SUBSCRIBER_CAPACITY, StatisticsReport, StatisticsSnapshot, StatisticsStore};
pub use tag::{Tag, TagSet, ThresholdTable, UnknownTag};
