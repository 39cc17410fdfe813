//! Top-level configuration, validated once and passed to each component.

use serde::{Deserialize, Serialize};

use crate::counting::{GateConfig, ThresholdTable};
use crate::error::ConfigError;
use crate::integration::{BufferConfig, PipelineConfig, ReportConfig};
use crate::tracker::TrackerConfig;

/// Every tunable of the hive-entrance counter.
///
/// Missing sections fall back to their defaults, but an explicitly given
/// threshold table must define every tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HiveConfig {
    pub tracker: TrackerConfig,
    pub gate: GateConfig,
    pub thresholds: ThresholdTable,
    pub pipeline: PipelineConfig,
    pub buffer: BufferConfig,
    pub report: ReportConfig,
}

impl HiveConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tracker.validate()?;
        self.gate.validate()?;
        self.pipeline.validate()?;
        self.buffer.validate()?;
        self.report.validate()
    }
}
