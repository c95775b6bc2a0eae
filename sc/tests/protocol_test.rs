//! Integration tests for the progress-counting protocol
//!
//! Tests that go through the process-wide counter are `#[serial]`; everything
//! else uses its own counter and may run in parallel.

use std::sync::{Arc, Barrier};

use proptest::prelude::*;
use serde::{Serialize, Serializer};
use serial_test::serial;

use sercount::codec::{self, Format};
use sercount::counter;
use sercount::scope;
use sercount::{Counted, Enclosure, EnclosureSeed, ProgressCounter, RecordingPublisher};

fn recorder() -> Arc<RecordingPublisher> {
    Arc::new(RecordingPublisher::new())
}

/// Payload node that blocks on a barrier while being encoded
struct Rendezvous(Arc<Barrier>);

impl Serialize for Rendezvous {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.wait();
        serializer.serialize_unit()
    }
}

/// Payload whose chunks are encoded on worker threads
struct ParallelChunks(Vec<Vec<Counted<u32>>>);

impl Serialize for ParallelChunks {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let counter = scope::current();
        let encoded: Vec<Result<serde_json::Value, serde_json::Error>> = std::thread::scope(|s| {
            let handles: Vec<_> = self
                .0
                .iter()
                .map(|chunk| {
                    let counter = counter.clone();
                    s.spawn(move || scope::with(counter, || serde_json::to_value(chunk)))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|_| Ok(serde_json::Value::Null)))
                .collect()
        });

        let values = encoded
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(<S::Error as serde::ser::Error>::custom)?;
        values.serialize(serializer)
    }
}

// =============================================================================
// Sequential operations on the process-wide counter
// =============================================================================

#[test]
#[serial]
fn test_three_items_report_one_two_three() {
    let rec = recorder();
    let enclosure = Enclosure::new(3, vec![Counted("ItemA"), Counted("ItemB"), Counted("ItemC")]).with_publisher(rec.clone());

    serde_json::to_vec(&enclosure).expect("encode");

    assert_eq!(rec.pairs(), vec![(1, 3), (2, 3), (3, 3)]);
}

#[test]
#[serial]
fn test_repeated_operations_start_from_zero() {
    let rec = recorder();
    let enclosure = Enclosure::of_items(1..=4u32).with_publisher(rec.clone());

    serde_json::to_vec(&enclosure).expect("first encode");
    serde_json::to_vec(&enclosure).expect("second encode");

    let counts: Vec<u64> = rec.events().iter().map(|p| p.count).collect();
    assert_eq!(counts, vec![1, 2, 3, 4, 1, 2, 3, 4]);
}

#[test]
#[serial]
fn test_round_trip_through_global_counter() {
    let write_rec = recorder();
    let original = Enclosure::of_items(vec!["north".to_string(), "south".to_string()]).with_publisher(write_rec.clone());
    let yaml = codec::encode_to_string(Format::Yaml, &original, false).expect("encode");

    let read_rec = recorder();
    let decoded: Enclosure<Vec<Counted<String>>> =
        codec::decode_from_str(Format::Yaml, &yaml, EnclosureSeed::new().with_publisher(read_rec.clone())).expect("decode");

    assert_eq!(decoded, original);
    assert_eq!(write_rec.len(), 2);
    assert_eq!(read_rec.pairs(), vec![(1, 2), (2, 2)]);
    assert_eq!(counter::global().snapshot().count, 2);
}

#[test]
#[serial]
fn test_undeclared_items_overshoot_without_error() {
    let rec = recorder();
    let enclosure = Enclosure::new(1, vec![Counted(1u8), Counted(2u8)]).with_publisher(rec.clone());

    serde_json::to_vec(&enclosure).expect("encode");

    assert_eq!(rec.pairs(), vec![(1, 1), (2, 1)]);
}

// =============================================================================
// Overlapping operations
// =============================================================================

#[test]
#[serial]
fn test_overlapping_operations_on_global_counter_corrupt_progress() {
    let barrier = Arc::new(Barrier::new(2));
    let first_rec = recorder();
    let second_rec = recorder();

    std::thread::scope(|s| {
        let first = Enclosure::new(
            2,
            (
                Counted(1u8),
                Rendezvous(barrier.clone()),
                Rendezvous(barrier.clone()),
                Counted(2u8),
            ),
        )
        .with_publisher(first_rec.clone());
        s.spawn(move || serde_json::to_vec(&first).expect("first encode"));

        let second = Enclosure::new(10, ()).with_publisher(second_rec.clone());
        let barrier = barrier.clone();
        s.spawn(move || {
            barrier.wait();
            serde_json::to_vec(&second).expect("second encode");
            barrier.wait();
        });
    });

    // The second operation reset the count and took over the publisher
    assert_eq!(first_rec.pairs(), vec![(1, 2)]);
    assert_eq!(second_rec.pairs(), vec![(1, 10)]);
    assert_eq!((counter::global().count(), counter::global().max()), (1, 10));
}

#[test]
fn test_overlapping_operations_with_own_counters_are_isolated() {
    let barrier = Arc::new(Barrier::new(2));
    let first_rec = recorder();
    let second_rec = recorder();

    std::thread::scope(|s| {
        let first = Enclosure::new(
            2,
            (
                Counted(1u8),
                Rendezvous(barrier.clone()),
                Rendezvous(barrier.clone()),
                Counted(2u8),
            ),
        )
        .isolated()
        .with_publisher(first_rec.clone());
        s.spawn(move || serde_json::to_vec(&first).expect("first encode"));

        let second = Enclosure::new(10, ()).isolated().with_publisher(second_rec.clone());
        let barrier = barrier.clone();
        s.spawn(move || {
            barrier.wait();
            serde_json::to_vec(&second).expect("second encode");
            barrier.wait();
        });
    });

    assert_eq!(first_rec.pairs(), vec![(1, 2), (2, 2)]);
    assert!(second_rec.is_empty());
}

// =============================================================================
// Parallel fan-out within one operation
// =============================================================================

#[test]
fn test_parallel_chunks_count_every_item_once() {
    let chunks: Vec<Vec<Counted<u32>>> = (0..8u32)
        .map(|c| (0..250u32).map(|i| Counted(c * 1000 + i)).collect())
        .collect();
    let rec = recorder();
    let enclosure = Enclosure::new(2000, ParallelChunks(chunks)).isolated().with_publisher(rec.clone());

    let json = serde_json::to_string(&enclosure).expect("encode");

    assert!(json.starts_with("[2000,[["));
    assert_eq!(enclosure.counter().count(), 2000);
    let mut counts: Vec<u64> = rec.events().iter().map(|p| p.count).collect();
    counts.sort_unstable();
    assert_eq!(counts, (1..=2000).collect::<Vec<u64>>());
    assert!(rec.events().iter().all(|p| p.max == 2000));
}

#[test]
fn test_scoped_counter_leaves_global_alone() {
    let counter = ProgressCounter::shared();
    let enclosure = Enclosure::of_items(0..5u8).with_counter(counter.clone());
    serde_json::to_vec(&enclosure).expect("encode");

    assert_eq!(counter.count(), 5);
    assert_eq!(scope::depth(), 0);
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_encode_counts_strictly_increase_to_total(items in prop::collection::vec(any::<u32>(), 0..64)) {
        let n = items.len() as u64;
        let rec = recorder();
        let enclosure = Enclosure::of_items(items).isolated().with_publisher(rec.clone());

        serde_json::to_vec(&enclosure).expect("encode");

        let pairs = rec.pairs();
        prop_assert_eq!(pairs.len() as u64, n);
        prop_assert!(pairs.windows(2).all(|w| w[0].0 < w[1].0));
        if n > 0 {
            prop_assert_eq!(pairs.last().copied(), Some((n, n)));
        }
    }

    #[test]
    fn prop_round_trip_matches_and_counts_both_sides(items in prop::collection::vec(".{0,12}", 0..32)) {
        let n = items.len() as u64;
        let original = Enclosure::of_items(items).isolated();
        let json = codec::encode_to_string(Format::Json, &original, false).expect("encode");
        prop_assert_eq!(original.counter().count(), n);

        let seed = EnclosureSeed::new().isolated();
        let decoded: Enclosure<Vec<Counted<String>>> = codec::decode_from_str(Format::Json, &json, seed).expect("decode");

        prop_assert_eq!(decoded.counter().count(), n);
        prop_assert_eq!(decoded.declared_total(), n);
        prop_assert_eq!(decoded, original);
    }
}
