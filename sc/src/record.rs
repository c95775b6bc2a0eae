//! Sample record payload used by the `sercount` binary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::countable::Counted;
use crate::enclosure::Enclosure;

/// Payload written and read by the CLI
pub type RecordSet = Vec<Counted<Record>>;

/// One synthetic item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: Uuid,
    pub index: u64,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

impl Record {
    pub fn new(index: u64, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            index,
            label: label.into(),
            created_at: Utc::now(),
        }
    }
}

/// Build `count` records labelled `{prefix}-{index}`
pub fn generate(count: u64, prefix: &str) -> Vec<Record> {
    debug!(count, %prefix, "record::generate: called");
    (0..count).map(|i| Record::new(i, format!("{}-{}", prefix, i))).collect()
}

/// Enclose `count` generated records, declaring exactly that many items
pub fn enclose(count: u64, prefix: &str) -> Enclosure<RecordSet> {
    Enclosure::of_items(generate(count, prefix))
}
