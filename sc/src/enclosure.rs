//! Enclosure - the envelope that brackets one counted operation
//!
//! An `Enclosure<T>` is what actually gets handed to the encoder. Encoding it
//! configures its counter (reset, declared total, publisher), writes the
//! declared total and then encodes the payload with the counter entered as the
//! ambient scope. On the wire it is a plain pair: `[declared_total, payload]`.
//!
//! Decoding needs the publisher and counter up front, so it goes through
//! [`EnclosureSeed`]. The plain `Deserialize` impl decodes against the
//! process-wide counter and keeps whichever publisher is registered there.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::{self, DeserializeSeed, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::countable::Counted;
use crate::counter::{self, ProgressCounter};
use crate::publisher::Publisher;
use crate::scope;

const EXPECTING: &str = "a [declared_total, payload] pair";

/// Envelope around a payload whose countable items report progress
#[derive(Clone)]
pub struct Enclosure<T> {
    declared_total: u64,
    payload: T,
    publisher: Option<Arc<dyn Publisher>>,
    counter: Arc<ProgressCounter>,
}

impl<T> Enclosure<T> {
    /// Wrap `payload`, declaring how many countable items it holds
    ///
    /// Reports through the process-wide counter until `with_counter` says
    /// otherwise. Nothing is configured until the enclosure is encoded.
    pub fn new(declared_total: u64, payload: T) -> Self {
        debug!(declared_total, "Enclosure::new: called");
        Self {
            declared_total,
            payload,
            publisher: None,
            counter: counter::global().clone(),
        }
    }

    /// Notify `publisher` on every counted item
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Report through `counter` instead of the process-wide one
    pub fn with_counter(mut self, counter: Arc<ProgressCounter>) -> Self {
        self.counter = counter;
        self
    }

    /// Report through a fresh counter owned by this operation alone
    pub fn isolated(self) -> Self {
        self.with_counter(ProgressCounter::shared())
    }

    pub fn declared_total(&self) -> u64 {
        self.declared_total
    }

    pub fn set_declared_total(&mut self, declared_total: u64) {
        self.declared_total = declared_total;
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut T {
        &mut self.payload
    }

    pub fn set_payload(&mut self, payload: T) {
        self.payload = payload;
    }

    pub fn into_payload(self) -> T {
        self.payload
    }

    pub fn publisher(&self) -> Option<&Arc<dyn Publisher>> {
        self.publisher.as_ref()
    }

    /// Rebind the publisher; takes effect on the next encode
    pub fn set_publisher(&mut self, publisher: Option<Arc<dyn Publisher>>) {
        self.publisher = publisher;
    }

    pub fn counter(&self) -> &Arc<ProgressCounter> {
        &self.counter
    }
}

impl<I> Enclosure<Vec<Counted<I>>> {
    /// Enclose a list of items, each counted, declaring exactly their number
    pub fn of_items(items: impl IntoIterator<Item = I>) -> Self {
        let payload: Vec<Counted<I>> = items.into_iter().map(Counted).collect();
        Self::new(payload.len() as u64, payload)
    }
}

impl<T: fmt::Debug> fmt::Debug for Enclosure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enclosure")
            .field("declared_total", &self.declared_total)
            .field("payload", &self.payload)
            .field("has_publisher", &self.publisher.is_some())
            .finish()
    }
}

/// Equality covers what is persisted: the declared total and the payload
impl<T: PartialEq> PartialEq for Enclosure<T> {
    fn eq(&self, other: &Self) -> bool {
        self.declared_total == other.declared_total && self.payload == other.payload
    }
}

impl<T: Serialize> Serialize for Enclosure<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        debug!(declared_total = self.declared_total, "Enclosure::serialize: called");
        self.counter.configure(self.declared_total, self.publisher.clone());

        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.declared_total)?;
        {
            let _guard = scope::enter(self.counter.clone());
            tuple.serialize_element(&self.payload)?;
        }

        debug!(
            declared_total = self.declared_total,
            counted = self.counter.count(),
            "Enclosure::serialize: payload written"
        );
        tuple.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Enclosure<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let counter = counter::global().clone();
        let publisher = counter.publisher();
        EnclosureSeed {
            publisher,
            counter,
            _marker: PhantomData,
        }
        .deserialize(deserializer)
    }
}

/// Decoding context for an `Enclosure<T>`
///
/// Carries what the stream cannot: the publisher to notify and the counter to
/// report through.
pub struct EnclosureSeed<T> {
    publisher: Option<Arc<dyn Publisher>>,
    counter: Arc<ProgressCounter>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> EnclosureSeed<T> {
    /// Decode against the process-wide counter with no publisher
    pub fn new() -> Self {
        Self {
            publisher: None,
            counter: counter::global().clone(),
            _marker: PhantomData,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_counter(mut self, counter: Arc<ProgressCounter>) -> Self {
        self.counter = counter;
        self
    }

    /// Decode against a fresh counter owned by this operation alone
    pub fn isolated(self) -> Self {
        self.with_counter(ProgressCounter::shared())
    }

    pub fn counter(&self) -> &Arc<ProgressCounter> {
        &self.counter
    }
}

impl<T> Default for EnclosureSeed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'de, T: Deserialize<'de>> DeserializeSeed<'de> for EnclosureSeed<T> {
    type Value = Enclosure<T>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_tuple(2, EnclosureVisitor { seed: self })
    }
}

struct EnclosureVisitor<T> {
    seed: EnclosureSeed<T>,
}

impl<'de, T: Deserialize<'de>> Visitor<'de> for EnclosureVisitor<T> {
    type Value = Enclosure<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(EXPECTING)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let EnclosureSeed { publisher, counter, .. } = self.seed;
        counter.reset();

        let declared_total: u64 = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &EXPECTING))?;
        debug!(declared_total, "Enclosure::deserialize: read declared total");
        counter.set_max(declared_total);
        counter.set_publisher(publisher.clone());

        let payload: T = {
            let _guard = scope::enter(counter.clone());
            seq.next_element()?
        }
        .ok_or_else(|| de::Error::invalid_length(1, &EXPECTING))?;

        debug!(declared_total, counted = counter.count(), "Enclosure::deserialize: payload read");
        Ok(Enclosure {
            declared_total,
            payload,
            publisher,
            counter,
        })
    }
}
