//! sercount - item-level progress for serde serialization
//!
//! Wrap a large aggregate in an [`Enclosure`] that declares how many items it
//! holds, wrap each item in [`Counted`], and encode the enclosure with any serde
//! format. Every counted item reports `(count, max)` to a [`Publisher`] right
//! after its own encode or decode finishes.
//!
//! # Architecture
//!
//! ```text
//! Enclosure::serialize ── configure counter (reset, max, publisher)
//!   ├── write declared_total
//!   └── scope::enter(counter)
//!         └── payload ── Counted<T>::serialize ── T::serialize, then counter.increment()
//!                                                                   └── publisher.publish(count, max)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sercount::{Enclosure, publisher};
//!
//! let enclosure = Enclosure::of_items(vec!["a", "b", "c"])
//!     .isolated()
//!     .with_publisher(Arc::new(publisher::from_fn(|count, max| println!("{count}/{max}"))));
//! let json = serde_json::to_string(&enclosure)?;
//! ```
//!
//! # Modules
//!
//! - [`counter`] - the progress counter and the process-wide instance
//! - [`scope`] - ambient counter for the operation being traversed
//! - [`countable`] - `Counted<T>` and the `#[serde(with)]` helpers
//! - [`enclosure`] - `Enclosure<T>` and its decoding seed
//! - [`publisher`] - publisher trait and stock sinks
//! - [`codec`] - JSON/YAML helpers, `peek_declared_total`
//! - [`config`] - configuration loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod codec;
pub mod config;
pub mod countable;
pub mod counter;
pub mod enclosure;
pub mod publisher;
pub mod record;
pub mod scope;

pub use codec::{CodecError, CodecResult, Format};
pub use config::Config;
pub use countable::Counted;
pub use counter::ProgressCounter;
pub use enclosure::{Enclosure, EnclosureSeed};
pub use publisher::{
    ChannelPublisher, DrainStats, FnPublisher, LogPublisher, NoopPublisher, Progress, Publisher, RecordingPublisher,
};
