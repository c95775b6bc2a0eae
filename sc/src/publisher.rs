//! Publishers - sinks notified on every counted item
//!
//! A publisher receives `(count, max)` synchronously on the thread that
//! completed the item. Closures become publishers through [`from_fn`]; the
//! types here cover logging, recording and fan-out over a bounded channel.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Default capacity of a `ChannelPublisher` (progress events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Sink invoked after each counted item
pub trait Publisher: Send + Sync {
    /// Report that `count` of `max` declared items are done
    fn publish(&self, count: u64, max: u64);
}

impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    fn publish(&self, count: u64, max: u64) {
        (**self).publish(count, max)
    }
}

/// Publisher backed by a closure, see [`from_fn`]
#[derive(Clone)]
pub struct FnPublisher<F>(F);

impl<F> fmt::Debug for FnPublisher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnPublisher")
    }
}

impl<F> Publisher for FnPublisher<F>
where
    F: Fn(u64, u64) + Send + Sync,
{
    fn publish(&self, count: u64, max: u64) {
        (self.0)(count, max)
    }
}

/// Turn a `Fn(count, max)` closure into a publisher
pub fn from_fn<F>(f: F) -> FnPublisher<F>
where
    F: Fn(u64, u64) + Send + Sync,
{
    FnPublisher(f)
}

/// A single progress observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Items completed so far
    pub count: u64,
    /// Items declared by the enclosing operation
    pub max: u64,
}

impl Progress {
    pub fn new(count: u64, max: u64) -> Self {
        Self { count, max }
    }

    /// Completed share in `[0.0, 1.0]`; an undeclared total counts as done
    pub fn fraction(&self) -> f64 {
        if self.max == 0 {
            return 1.0;
        }
        (self.count as f64 / self.max as f64).min(1.0)
    }

    /// Completed share as a whole percentage
    pub fn percent(&self) -> u8 {
        (self.fraction() * 100.0).floor() as u8
    }

    /// Whether the declared total has been reached
    pub fn is_complete(&self) -> bool {
        self.count >= self.max
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.count, self.max)
    }
}

/// Publisher that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl Publisher for NoopPublisher {
    fn publish(&self, _count: u64, _max: u64) {}
}

/// Publisher that reports through `tracing`
///
/// Emits one `info!` line every `every` items and always on the item that
/// reaches the declared total.
#[derive(Debug, Clone)]
pub struct LogPublisher {
    label: String,
    every: u64,
}

impl LogPublisher {
    pub fn new(label: impl Into<String>, every: u64) -> Self {
        let label = label.into();
        debug!(%label, every, "LogPublisher::new: called");
        Self {
            label,
            every: every.max(1),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the given observation would be logged
    pub fn should_log(&self, count: u64, max: u64) -> bool {
        count % self.every == 0 || count == max
    }
}

impl Publisher for LogPublisher {
    fn publish(&self, count: u64, max: u64) {
        if self.should_log(count, max) {
            let progress = Progress::new(count, max);
            info!(label = %self.label, %progress, percent = progress.percent(), "progress");
        }
    }
}

/// Publisher that keeps every observation in memory
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<Progress>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// All observations in the order they were published
    pub fn events(&self) -> Vec<Progress> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    /// Observations as `(count, max)` pairs
    pub fn pairs(&self) -> Vec<(u64, u64)> {
        self.events().into_iter().map(|p| (p.count, p.max)).collect()
    }

    /// The most recent observation, if any
    pub fn last(&self) -> Option<Progress> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).last().copied()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clear();
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, count: u64, max: u64) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Progress::new(count, max));
    }
}

/// Publisher that forwards observations over a bounded broadcast channel
///
/// Sending never blocks the serializing thread: with no subscribers the event
/// is dropped, and receivers that fall behind lose the oldest events.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: broadcast::Sender<Progress>,
}

impl ChannelPublisher {
    /// Create a channel publisher with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "ChannelPublisher::new: called");
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Create a channel publisher with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Subscribe to observations published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Progress> {
        debug!("ChannelPublisher::subscribe: new subscriber");
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Outcome of draining a progress receiver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Events received
    pub delivered: u64,
    /// Events lost because the receiver lagged behind
    pub dropped: u64,
    /// Most recent event received
    pub last: Option<Progress>,
}

/// Take every event currently queued for `rx` without blocking
pub fn drain_pending(rx: &mut broadcast::Receiver<Progress>) -> DrainStats {
    let mut stats = DrainStats::default();
    loop {
        match rx.try_recv() {
            Ok(progress) => {
                stats.delivered += 1;
                stats.last = Some(progress);
            }
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => stats.dropped += skipped,
            Err(broadcast::error::TryRecvError::Empty) | Err(broadcast::error::TryRecvError::Closed) => break,
        }
    }
    debug!(delivered = stats.delivered, dropped = stats.dropped, "drain_pending: done");
    stats
}

impl Default for ChannelPublisher {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl Publisher for ChannelPublisher {
    fn publish(&self, count: u64, max: u64) {
        // No subscribers is fine
        let _ = self.tx.send(Progress::new(count, max));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn accepts<P: Publisher>(publisher: P, count: u64, max: u64) {
        publisher.publish(count, max);
    }

    #[test]
    fn test_closure_is_a_publisher() {
        let total = Arc::new(AtomicU64::new(0));
        let sink = {
            let total = total.clone();
            from_fn(move |count, _max| {
                total.fetch_add(count, Ordering::SeqCst);
            })
        };

        sink.publish(1, 3);
        sink.publish(2, 3);
        assert_eq!(total.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_arc_of_publisher_is_a_publisher() {
        let recorder = Arc::new(RecordingPublisher::new());
        accepts(recorder.clone(), 1, 2);

        let shared: Arc<dyn Publisher> = recorder.clone();
        accepts(shared, 2, 2);

        assert_eq!(recorder.pairs(), vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn test_drain_pending_counts_delivered_and_dropped() {
        let publisher = ChannelPublisher::new(2);
        let mut rx = publisher.subscribe();
        for count in 1..=5 {
            publisher.publish(count, 5);
        }

        let stats = drain_pending(&mut rx);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.dropped, 3);
        assert_eq!(stats.last, Some(Progress::new(5, 5)));
        assert_eq!(drain_pending(&mut rx), DrainStats::default());
    }

    #[test]
    fn test_progress_fraction_and_percent() {
        assert_eq!(Progress::new(1, 4).percent(), 25);
        assert_eq!(Progress::new(0, 0).fraction(), 1.0);
        assert_eq!(Progress::new(9, 3).fraction(), 1.0);
        assert!(Progress::new(3, 3).is_complete());
        assert!(!Progress::new(2, 3).is_complete());
        assert_eq!(Progress::new(2, 3).to_string(), "2/3");
    }

    #[test]
    fn test_log_publisher_cadence() {
        let publisher = LogPublisher::new("write", 10);
        assert!(!publisher.should_log(3, 25));
        assert!(publisher.should_log(10, 25));
        assert!(publisher.should_log(25, 25));

        let every_item = LogPublisher::new("read", 0);
        assert!(every_item.should_log(1, 25));
    }

    #[test]
    fn test_recording_publisher_keeps_order() {
        let recorder = RecordingPublisher::new();
        assert!(recorder.is_empty());
        recorder.publish(1, 2);
        recorder.publish(2, 2);

        assert_eq!(recorder.pairs(), vec![(1, 2), (2, 2)]);
        assert_eq!(recorder.last(), Some(Progress::new(2, 2)));

        recorder.clear();
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_channel_publisher_delivers_to_subscribers() {
        let publisher = ChannelPublisher::new(8);
        let mut rx = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 1);

        publisher.publish(1, 2);
        publisher.publish(2, 2);

        assert_eq!(rx.try_recv().ok(), Some(Progress::new(1, 2)));
        assert_eq!(rx.try_recv().ok(), Some(Progress::new(2, 2)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_publisher_without_subscribers() {
        let publisher = ChannelPublisher::new(1);
        publisher.publish(1, 1);
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[test]
    fn test_channel_publisher_lagging_receiver_drops_oldest() {
        let publisher = ChannelPublisher::new(2);
        let mut rx = publisher.subscribe();
        for count in 1..=4 {
            publisher.publish(count, 4);
        }

        assert!(matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Lagged(2))));
        assert_eq!(rx.try_recv().ok(), Some(Progress::new(3, 4)));
        assert_eq!(rx.try_recv().ok(), Some(Progress::new(4, 4)));
    }
}
