//! Bounded frame buffer between a capture thread and the tracking thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::integration::detector::{FrameSource, TimedFrame};

/// Where frames come from. Live cameras favour latency, files throughput.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Camera,
    VideoFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub camera_depth: usize,
    pub video_depth: usize,
    /// Sleep before retrying a push into a full buffer
    pub full_pause_ms: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            camera_depth: 3,
            video_depth: 20,
            full_pause_ms: 100,
        }
    }
}

impl BufferConfig {
    pub fn depth(&self, kind: SourceKind) -> usize {
        match kind {
            SourceKind::Camera => self.camera_depth,
            SourceKind::VideoFile => self.video_depth,
        }
    }

    pub fn full_pause(&self) -> Duration {
        Duration::from_millis(self.full_pause_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera_depth == 0 {
            return Err(ConfigError::ZeroCount("camera_depth"));
        }
        if self.video_depth == 0 {
            return Err(ConfigError::ZeroCount("video_depth"));
        }
        Ok(())
    }
}

type Slot<F, E> = Result<TimedFrame<F>, E>;

/// A [`FrameSource`] fed by a background capture thread through a bounded
/// buffer.
///
/// When the buffer is full the capture thread pauses and retries instead
/// of dropping frames. End of stream and source errors are forwarded in
/// order.
pub struct BufferedSource<F, E> {
    rx: Option<Receiver<Slot<F, E>>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl<F, E> BufferedSource<F, E>
where
    F: Send + 'static,
    E: Send + 'static,
{
    pub fn spawn<S>(source: S, kind: SourceKind, config: &BufferConfig) -> Self
    where
        S: FrameSource<Frame = F, Error = E> + Send + 'static,
    {
        let depth = config.depth(kind).max(1);
        let pause = config.full_pause();
        let (tx, rx) = crossbeam_channel::bounded(depth);
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        debug!(?kind, depth, "starting capture thread");
        let handle = thread::spawn(move || capture_loop(source, tx, thread_stop, pause));
        Self {
            rx: Some(rx),
            stop,
            handle: Some(handle),
        }
    }
}

impl<F, E> BufferedSource<F, E> {
    /// Frames currently waiting in the buffer.
    pub fn pending(&self) -> usize {
        self.rx.as_ref().map_or(0, Receiver::len)
    }

    /// Stop the capture thread and wait for it. Buffered frames are
    /// discarded.
    pub fn shutdown(mut self) {
        self.stop_capture();
    }

    fn stop_capture(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.rx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl<F, E> Drop for BufferedSource<F, E> {
    fn drop(&mut self) {
        self.stop_capture();
    }
}

impl<F, E> FrameSource for BufferedSource<F, E> {
    type Frame = F;
    type Error = E;

    fn next_frame(&mut self) -> Result<Option<TimedFrame<F>>, E> {
        let Some(rx) = self.rx.as_ref() else {
            return Ok(None);
        };
        match rx.recv() {
            Ok(Ok(frame)) => Ok(Some(frame)),
            Ok(Err(err)) => Err(err),
            // Capture thread finished and the buffer is drained.
            Err(_) => Ok(None),
        }
    }
}

fn capture_loop<S>(mut source: S, tx: Sender<Slot<S::Frame, S::Error>>, stop: Arc<AtomicBool>, pause: Duration)
where
    S: FrameSource,
{
    while !stop.load(Ordering::Acquire) {
        let slot = match source.next_frame() {
            Ok(Some(frame)) => Ok(frame),
            Ok(None) => {
                debug!("frame source reached end of stream");
                return;
            }
            Err(err) => Err(err),
        };
        let failed = slot.is_err();
        if !push_blocking(&tx, slot, &stop, pause) || failed {
            return;
        }
    }
}

/// Push with pause-and-retry while the buffer is full. Returns `false` when
/// the consumer is gone or a stop was requested.
fn push_blocking<T>(tx: &Sender<T>, mut item: T, stop: &AtomicBool, pause: Duration) -> bool {
    loop {
        match tx.try_send(item) {
            Ok(()) => return true,
            Err(TrySendError::Full(back)) => {
                if stop.load(Ordering::Acquire) {
                    return false;
                }
                trace!(pause_ms = pause.as_millis() as u64, "frame buffer full, pausing");
                thread::sleep(pause);
                item = back;
            }
            Err(TrySendError::Disconnected(_)) => return false,
        }
    }
}
