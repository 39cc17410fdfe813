//! Thread-safe window and overall counters.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::counting::tag::Tag;

/// One countable occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BeeIn,
    BeeOut,
    Tagged(Tag),
    FrameProcessed,
}

const SLOTS: usize = 7;

/// Events queued per subscriber before new ones are dropped.
pub const SUBSCRIBER_CAPACITY: usize = 1024;

impl EventKind {
    fn slot(self) -> usize {
        match self {
            EventKind::Tagged(Tag::Wasp) => 0,
            EventKind::Tagged(Tag::Varroa) => 1,
            EventKind::Tagged(Tag::Pollen) => 2,
            EventKind::Tagged(Tag::Cooling) => 3,
            EventKind::BeeIn => 4,
            EventKind::BeeOut => 5,
            EventKind::FrameProcessed => 6,
        }
    }
}

/// Point-in-time copy of one counter set, in the uplink export schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    #[serde(rename = "wespenCount")]
    pub wasp_count: u64,
    pub varroa_count: u64,
    pub pollen_count: u64,
    pub cooling_count: u64,
    pub bees_in: u64,
    pub bees_out: u64,
    pub processed_frames: u64,
}

impl StatisticsSnapshot {
    fn from_slots(slots: [u64; SLOTS]) -> Self {
        Self {
            wasp_count: slots[0],
            varroa_count: slots[1],
            pollen_count: slots[2],
            cooling_count: slots[3],
            bees_in: slots[4],
            bees_out: slots[5],
            processed_frames: slots[6],
        }
    }

    fn slots(&self) -> [u64; SLOTS] {
        [
            self.wasp_count,
            self.varroa_count,
            self.pollen_count,
            self.cooling_count,
            self.bees_in,
            self.bees_out,
            self.processed_frames,
        ]
    }

    /// Count for a single event kind.
    pub fn get(&self, kind: EventKind) -> u64 {
        self.slots()[kind.slot()]
    }

    pub fn tag_count(&self, tag: Tag) -> u64 {
        self.get(EventKind::Tagged(tag))
    }
}

/// Window and overall snapshots taken under one lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsReport {
    pub window: StatisticsSnapshot,
    pub overall: StatisticsSnapshot,
}

impl StatisticsReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Default)]
struct Counters {
    // Reset on every successful uplink; saturates instead of wrapping.
    window: [u32; SLOTS],
    overall: [u64; SLOTS],
}

/// Counters fed by gate crossings, classification tags and processed
/// frames.
///
/// Every operation takes one mutex around both counter sets, so concurrent
/// writers never lose updates and snapshots never tear.
#[derive(Debug, Default)]
pub struct StatisticsStore {
    counters: Mutex<Counters>,
    subscribers: Mutex<Vec<Sender<EventKind>>>,
}

impl StatisticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event(&self, kind: EventKind) {
        {
            let mut counters = self.counters.lock();
            let slot = kind.slot();
            counters.window[slot] = counters.window[slot].saturating_add(1);
            counters.overall[slot] += 1;
        }
        self.publish(kind);
    }

    pub fn snapshot_window(&self) -> StatisticsSnapshot {
        let counters = self.counters.lock();
        StatisticsSnapshot::from_slots(counters.window.map(u64::from))
    }

    pub fn snapshot_overall(&self) -> StatisticsSnapshot {
        StatisticsSnapshot::from_slots(self.counters.lock().overall)
    }

    /// Both counter sets at a single instant.
    pub fn snapshot(&self) -> StatisticsReport {
        let counters = self.counters.lock();
        StatisticsReport {
            window: StatisticsSnapshot::from_slots(counters.window.map(u64::from)),
            overall: StatisticsSnapshot::from_slots(counters.overall),
        }
    }

    /// Zero the window counters. Overall counters are untouched.
    pub fn reset_window(&self) {
        self.counters.lock().window = [0; SLOTS];
    }

    /// Subtract a transmitted window snapshot, keeping events recorded while
    /// the snapshot was in flight.
    pub fn acknowledge_window(&self, sent: &StatisticsSnapshot) {
        let sent = sent.slots();
        let mut counters = self.counters.lock();
        for (slot, count) in counters.window.iter_mut().enumerate() {
            let sent = u32::try_from(sent[slot]).unwrap_or(u32::MAX);
            *count = count.saturating_sub(sent);
        }
    }

    /// Receive every event recorded from now on. Dropping the receiver
    /// unsubscribes.
    ///
    /// At most [`SUBSCRIBER_CAPACITY`] events are queued. A subscriber that
    /// stops draining its receiver misses events instead of growing the
    /// queue; counters are never affected.
    pub fn subscribe(&self) -> Receiver<EventKind> {
        let (tx, rx) = crossbeam_channel::bounded(SUBSCRIBER_CAPACITY);
        self.subscribers.lock().push(tx);
        rx
    }

    fn publish(&self, kind: EventKind) {
        let mut subscribers = self.subscribers.lock();
        if !subscribers.is_empty() {
            subscribers.retain(|tx| match tx.try_send(kind) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(?kind, "event subscriber is lagging, dropping event");
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use super::*;

    #[test]
    fn test_record_updates_both_sets() {
        let store = StatisticsStore::new();
        store.record_event(EventKind::BeeIn);
        store.record_event(EventKind::BeeIn);
        store.record_event(EventKind::Tagged(Tag::Varroa));

        let window = store.snapshot_window();
        assert_eq!(window.bees_in, 2);
        assert_eq!(window.varroa_count, 1);
        assert_eq!(store.snapshot_overall(), window);
    }

    #[test]
    fn test_reset_window_keeps_overall() {
        let store = StatisticsStore::new();
        store.record_event(EventKind::BeeOut);
        store.record_event(EventKind::FrameProcessed);
        store.reset_window();

        assert_eq!(store.snapshot_window(), StatisticsSnapshot::default());
        let overall = store.snapshot_overall();
        assert_eq!(overall.bees_out, 1);
        assert_eq!(overall.processed_frames, 1);
    }

    #[test]
    fn test_acknowledge_keeps_late_events() {
        let store = StatisticsStore::new();
        store.record_event(EventKind::BeeIn);
        let sent = store.snapshot_window();
        store.record_event(EventKind::BeeIn);
        store.acknowledge_window(&sent);
        assert_eq!(store.snapshot_window().bees_in, 1);
        assert_eq!(store.snapshot_overall().bees_in, 2);
    }

    #[test]
    fn test_concurrent_writers_lose_nothing() {
        let store = Arc::new(StatisticsStore::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        store.record_event(EventKind::BeeIn);
                        store.record_event(EventKind::BeeOut);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let report = store.snapshot();
        assert_eq!(report.overall.bees_in, 4000);
        assert_eq!(report.overall.bees_out, 4000);
        assert_eq!(report.window, report.overall);
    }

    #[test]
    fn test_snapshots_are_consistent_under_concurrent_writes() {
        let store = Arc::new(StatisticsStore::new());
        let done = Arc::new(AtomicBool::new(false));
        let writers: Vec<_> = [
            [EventKind::BeeIn, EventKind::FrameProcessed],
            [EventKind::BeeOut, EventKind::Tagged(Tag::Varroa)],
            [EventKind::Tagged(Tag::Wasp), EventKind::Tagged(Tag::Cooling)],
        ]
        .into_iter()
        .map(|kinds| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..2000 {
                    for kind in kinds {
                        store.record_event(kind);
                    }
                }
            })
        })
        .collect();

        let reader = {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut previous = StatisticsReport::default();
                let mut reads = 0u64;
                loop {
                    let finished = done.load(Ordering::Acquire);
                    let report = store.snapshot();
                    assert_eq!(report.window, report.overall);
                    for (now, before) in report.overall.slots().iter().zip(previous.overall.slots()) {
                        assert!(*now >= before);
                    }
                    previous = report;
                    reads += 1;
                    if finished {
                        return (previous, reads);
                    }
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        done.store(true, Ordering::Release);
        let (last, reads) = reader.join().unwrap();
        assert!(reads >= 1);
        assert_eq!(last.overall.bees_in, 2000);
        assert_eq!(last.overall.wasp_count, 2000);
        assert_eq!(last.overall.processed_frames, 2000);
    }

    #[test]
    fn test_lagging_subscriber_is_capped() {
        let store = StatisticsStore::new();
        let rx = store.subscribe();
        for _ in 0..SUBSCRIBER_CAPACITY + 5 {
            store.record_event(EventKind::FrameProcessed);
        }
        assert_eq!(rx.len(), SUBSCRIBER_CAPACITY);
        assert_eq!(store.subscribers.lock().len(), 1);
        assert_eq!(
            store.snapshot_overall().processed_frames,
            (SUBSCRIBER_CAPACITY + 5) as u64
        );
        rx.try_recv().unwrap();
        store.record_event(EventKind::BeeIn);
        assert_eq!(rx.len(), SUBSCRIBER_CAPACITY);
    }

    #[test]
    fn test_subscribers_receive_events() {
        let store = StatisticsStore::new();
        let rx = store.subscribe();
        store.record_event(EventKind::BeeIn);
        store.record_event(EventKind::Tagged(Tag::Pollen));
        assert_eq!(rx.try_recv(), Ok(EventKind::BeeIn));
        assert_eq!(rx.try_recv(), Ok(EventKind::Tagged(Tag::Pollen)));

        drop(rx);
        store.record_event(EventKind::BeeOut);
        assert!(store.subscribers.lock().is_empty());
    }

    #[test]
    fn test_export_schema() {
        let store = StatisticsStore::new();
        store.record_event(EventKind::Tagged(Tag::Wasp));
        let json: serde_json::Value =
            serde_json::from_str(&store.snapshot().to_json().unwrap()).unwrap();
        let window = json["window"].as_object().unwrap();
        let mut keys: Vec<&str> = window.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "beesIn",
                "beesOut",
                "coolingCount",
                "pollenCount",
                "processedFrames",
                "varroaCount",
                "wespenCount",
            ]
        );
        assert_eq!(window["wespenCount"], 1);
        assert_eq!(json["overall"]["wespenCount"], 1);
    }
}
