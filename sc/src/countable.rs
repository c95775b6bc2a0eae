//! Countable items
//!
//! `Counted<T>` encodes and decodes exactly like `T`, then reports one
//! completed item to the ambient counter (see [`crate::scope`]). The increment
//! happens only after the wrapped value's own serde call returned `Ok`; errors
//! pass through untouched and are not counted.
//!
//! Fields can opt in without changing their type:
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct Row {
//!     #[serde(with = "sercount::countable")]
//!     cells: Vec<String>,
//! }
//! ```

use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::scope;

/// Serialize `value` as-is, then count it
pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize + ?Sized,
    S: Serializer,
{
    let ok = value.serialize(serializer)?;
    scope::current().increment();
    Ok(ok)
}

/// Deserialize a `T` as-is, then count it
pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    let value = T::deserialize(deserializer)?;
    scope::current().increment();
    Ok(value)
}

/// A value that counts itself whenever it is encoded or decoded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Counted<T>(pub T);

impl<T> Counted<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Counted<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T> Deref for Counted<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Counted<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T> AsRef<T> for Counted<T> {
    fn as_ref(&self) -> &T {
        &self.0
    }
}

impl<T: Serialize> Serialize for Counted<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize(&self.0, serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Counted<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize(deserializer).map(Counted)
    }
}
