//! Progress events and the per-job tracker that produces them.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Starting,
    Downloading,
    Archiving,
    Complete,
    Cancelled,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled | Self::Failed)
    }
}

/// Snapshot of a job's progress.
///
/// While downloading, units are segments and bytes are downloaded bytes. While
/// archiving, units are encoded chunks and bytes are compressed archive bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub units_done: usize,
    pub units_total: usize,
    pub bytes_done: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_total: Option<u64>,
    /// Bytes per second since the previous sample
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instantaneous_throughput: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_size_bytes: Option<u64>,
}

impl ProgressEvent {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            units_done: 0,
            units_total: 0,
            bytes_done: 0,
            bytes_total: None,
            instantaneous_throughput: None,
            archive_size_bytes: None,
        }
    }
}

/// Receiver of progress events. Called inline, so implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Forwards events into an unbounded channel; a closed receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelProgress(pub UnboundedSender<ProgressEvent>);

impl ProgressSink for ChannelProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        let _ = self.0.send(event.clone());
    }
}

struct Sample {
    at: Instant,
    bytes: u64,
}

/// Per-job progress state, shared between the running job and status polls.
pub struct ProgressTracker {
    sink: Arc<dyn ProgressSink>,
    status: Arc<RwLock<ProgressEvent>>,
    last_sample: Mutex<Sample>,
}

impl ProgressTracker {
    pub fn new(sink: Arc<dyn ProgressSink>, status: Arc<RwLock<ProgressEvent>>) -> Self {
        Self {
            sink,
            status,
            last_sample: Mutex::new(Sample {
                at: Instant::now(),
                bytes: 0,
            }),
        }
    }

    pub fn snapshot(&self) -> ProgressEvent {
        self.status.read().clone()
    }

    fn publish(&self, event: ProgressEvent) {
        *self.status.write() = event.clone();
        self.sink.on_progress(&event);
    }

    pub fn starting(&self, units_total: usize) {
        let mut event = ProgressEvent::new(Phase::Starting);
        event.units_total = units_total;
        *self.last_sample.lock() = Sample {
            at: Instant::now(),
            bytes: 0,
        };
        self.publish(event);
    }

    /// Records one successfully fetched unit of `bytes` length.
    pub fn unit_completed(&self, bytes: u64) {
        let now = Instant::now();
        let mut event = self.snapshot();
        event.phase = Phase::Downloading;
        event.units_done += 1;
        event.bytes_done += bytes;

        let mean = event.bytes_done as f64 / event.units_done as f64;
        event.bytes_total = Some((mean * event.units_total as f64).round() as u64);

        {
            let mut sample = self.last_sample.lock();
            let elapsed = now.duration_since(sample.at).as_secs_f64();
            event.instantaneous_throughput = (elapsed > 0.0)
                .then(|| (event.bytes_done - sample.bytes) as f64 / elapsed);
            *sample = Sample {
                at: now,
                bytes: event.bytes_done,
            };
        }

        self.publish(event);
    }

    /// Records one encoded chunk of the archive.
    pub fn archiving(
        &self,
        chunks_done: usize,
        chunks_total: usize,
        bytes_done: u64,
        archive_size: u64,
    ) {
        self.publish(ProgressEvent {
            phase: Phase::Archiving,
            units_done: chunks_done,
            units_total: chunks_total,
            bytes_done,
            bytes_total: Some(archive_size),
            instantaneous_throughput: None,
            archive_size_bytes: Some(archive_size),
        });
    }

    /// Publishes the terminal event, keeping the last counters.
    pub fn finish(&self, phase: Phase, archive_size: Option<u64>) {
        let mut event = self.snapshot();
        event.phase = phase;
        event.instantaneous_throughput = None;
        if archive_size.is_some() {
            event.archive_size_bytes = archive_size;
        }
        self.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> (ProgressTracker, Arc<Mutex<Vec<ProgressEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink_events = events.clone();
        let sink = move |event: &ProgressEvent| sink_events.lock().push(event.clone());
        let tracker = ProgressTracker::new(
            Arc::new(sink),
            Arc::new(RwLock::new(ProgressEvent::new(Phase::Starting))),
        );
        (tracker, events)
    }

    #[test]
    fn estimates_total_from_mean_unit_size() {
        let (tracker, events) = tracker();
        tracker.starting(4);
        tracker.unit_completed(100);
        tracker.unit_completed(300);

        let events = events.lock();
        let last = events.last().unwrap();
        assert_eq!(last.phase, Phase::Downloading);
        assert_eq!(last.units_done, 2);
        assert_eq!(last.units_total, 4);
        assert_eq!(last.bytes_done, 400);
        assert_eq!(last.bytes_total, Some(800));
    }

    #[test]
    fn throughput_covers_only_the_interval_since_the_last_sample() {
        let (tracker, events) = tracker();
        tracker.starting(3);
        std::thread::sleep(std::time::Duration::from_millis(20));
        tracker.unit_completed(1_000);
        std::thread::sleep(std::time::Duration::from_millis(20));
        tracker.unit_completed(4_000);

        let events = events.lock();
        let first = events[1].instantaneous_throughput.unwrap();
        let second = events[2].instantaneous_throughput.unwrap();
        // at most bytes / 20ms, and only the newest unit's bytes count
        assert!(first > 0.0 && first <= 50_000.0, "first sample {first}");
        assert!(second > 0.0 && second <= 200_000.0, "second sample {second}");
    }

    #[test]
    fn finish_keeps_counters_and_updates_status() {
        let (tracker, _events) = tracker();
        tracker.starting(1);
        tracker.unit_completed(10);
        tracker.finish(Phase::Complete, Some(42));

        let status = tracker.snapshot();
        assert_eq!(status.phase, Phase::Complete);
        assert_eq!(status.units_done, 1);
        assert_eq!(status.archive_size_bytes, Some(42));
    }

    #[test]
    fn events_serialize_in_snake_case() {
        let mut event = ProgressEvent::new(Phase::Downloading);
        event.units_total = 3;
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["phase"], "downloading");
        assert_eq!(json["units_total"], 3);
        assert!(json.get("bytes_total").is_none());
    }

    #[test]
    fn channel_sink_forwards_events() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = ChannelProgress(tx);
        sink.on_progress(&ProgressEvent::new(Phase::Cancelled));
        assert_eq!(rx.try_recv().unwrap().phase, Phase::Cancelled);
    }
}
