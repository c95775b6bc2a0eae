//! Progress counter shared by one serialization pass
//!
//! A `ProgressCounter` holds the running item count, the total declared by the
//! enclosing operation and the publisher notified on every increment. The
//! count and maximum are atomics; the publish call happens after the increment
//! and outside any lock, so a slow publisher never holds up other incrementers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use tracing::debug;

use crate::publisher::{Progress, Publisher};

/// Counts completed items for the operation currently using it
#[derive(Default)]
pub struct ProgressCounter {
    count: AtomicU64,
    max: AtomicU64,
    publisher: RwLock<Option<Arc<dyn Publisher>>>,
}

impl std::fmt::Debug for ProgressCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressCounter")
            .field("count", &self.count())
            .field("max", &self.max())
            .field("has_publisher", &self.has_publisher())
            .finish()
    }
}

impl ProgressCounter {
    /// Create a fresh counter, independent of the process-wide one
    pub fn new() -> Self {
        debug!("ProgressCounter::new: called");
        Self::default()
    }

    /// Create a fresh counter behind an `Arc`, ready to hand to an enclosure
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Zero both the count and the declared maximum
    pub fn reset(&self) {
        debug!("ProgressCounter::reset: called");
        self.count.store(0, Ordering::SeqCst);
        self.max.store(0, Ordering::SeqCst);
    }

    /// Set the declared maximum, leaving the count alone
    pub fn set_max(&self, max: u64) {
        debug!(max, "ProgressCounter::set_max: called");
        self.max.store(max, Ordering::SeqCst);
    }

    /// Replace the registered publisher; `None` turns notification off
    pub fn set_publisher(&self, publisher: Option<Arc<dyn Publisher>>) {
        debug!(enabled = publisher.is_some(), "ProgressCounter::set_publisher: called");
        let mut slot = self.publisher.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = publisher;
    }

    /// Reset, then set the maximum and the publisher, in that order
    ///
    /// This is the configuration step an enclosure performs at the start of
    /// every encode or decode pass.
    pub fn configure(&self, max: u64, publisher: Option<Arc<dyn Publisher>>) {
        debug!(max, "ProgressCounter::configure: called");
        self.reset();
        self.set_max(max);
        self.set_publisher(publisher);
    }

    /// Record one completed item and notify the publisher
    ///
    /// Returns the count produced by this increment. Concurrent callers each
    /// observe a distinct value; the publish for that value runs on the
    /// caller's thread after the atomic step.
    pub fn increment(&self) -> u64 {
        let count = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        let max = self.max.load(Ordering::SeqCst);
        if count == max.saturating_add(1) {
            debug!(count, max, "ProgressCounter::increment: count exceeded declared total");
        }

        if let Some(publisher) = self.publisher() {
            publisher.publish(count, max);
        }
        count
    }

    /// Items counted so far (advisory)
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    /// Declared total for the current operation (advisory)
    pub fn max(&self) -> u64 {
        self.max.load(Ordering::SeqCst)
    }

    /// Count and maximum read one after the other (advisory)
    pub fn snapshot(&self) -> Progress {
        Progress::new(self.count(), self.max())
    }

    /// The currently registered publisher
    pub fn publisher(&self) -> Option<Arc<dyn Publisher>> {
        self.publisher
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Whether a publisher is currently registered
    pub fn has_publisher(&self) -> bool {
        self.publisher
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }
}

/// The process-wide counter, created on first use and never dropped
///
/// Enclosures that are not given their own counter report through this one,
/// which means only one such operation may be in flight at a time.
pub fn global() -> &'static Arc<ProgressCounter> {
    static GLOBAL: OnceLock<Arc<ProgressCounter>> = OnceLock::new();
    GLOBAL.get_or_init(|| {
        debug!("counter::global: initializing process-wide counter");
        Arc::new(ProgressCounter::new())
    })
}
