//! Periodic uplink of statistics reports on a background thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::counting::{StatisticsReport, StatisticsStore};
use crate::error::ConfigError;

use super::TelemetrySink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub interval_ms: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { interval_ms: 60_000 }
    }
}

impl ReportConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::ZeroCount("interval_ms"));
        }
        Ok(())
    }
}

/// Background thread that snapshots the store every interval and hands the
/// report to a [`TelemetrySink`].
///
/// The window is acknowledged only after a successful transmission, so a
/// failed uplink carries its counts over to the next report.
pub struct Reporter {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<Option<StatisticsReport>>>,
}

impl Reporter {
    /// Start reporting every `config.interval()`.
    pub fn spawn<T>(statistics: Arc<StatisticsStore>, sink: T, config: &ReportConfig) -> Result<Self, ConfigError>
    where
        T: TelemetrySink + Send + 'static,
    {
        config.validate()?;
        let interval = config.interval();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let handle = thread::spawn(move || {
            let mut sink = sink;
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        report_once(&statistics, &mut sink);
                    }
                    // Explicit stop or the handle was dropped.
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        debug!("reporter stopping, sending final report");
                        return report_once(&statistics, &mut sink);
                    }
                }
            }
        });
        info!(interval_ms = config.interval_ms, "reporter started");
        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Send one final report, stop the thread and return that report if it
    /// was transmitted.
    pub fn shutdown(mut self) -> Option<StatisticsReport> {
        self.stop()
    }

    fn stop(&mut self) -> Option<StatisticsReport> {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        self.handle.take().and_then(|h| h.join().ok().flatten())
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn report_once<T: TelemetrySink>(statistics: &StatisticsStore, sink: &mut T) -> Option<StatisticsReport> {
    let report = statistics.snapshot();
    match sink.transmit(&report) {
        Ok(()) => {
            statistics.acknowledge_window(&report.window);
            debug!(
                bees_in = report.window.bees_in,
                bees_out = report.window.bees_out,
                frames = report.window.processed_frames,
                "statistics transmitted"
            );
            Some(report)
        }
        Err(err) => {
            warn!(error = %err, "statistics uplink failed, keeping window");
            None
        }
    }
}
