//! Stream-to-store pipeline: raw bytes through the framer into a
//! collection, then back out through the typed facade.

use docbind::collection::{MemoryCollection, RawCollection, TypedCollection};
use docbind::document::Document;
use docbind::error::Result;
use docbind::framer::{CollectionSink, DocumentFramer};
use docbind::{doc, impl_record};

use proptest::prelude::*;

#[derive(Debug, Default, Clone, PartialEq)]
struct Reading {
    sensor: String,
    value: f64,
    ok: bool,
}
impl_record!(Reading { sensor, value, ok });

fn sample_stream() -> (Vec<u8>, Vec<Document>) {
    let docs = vec![
        doc! { "sensor" => "alpha", "value" => 1.5, "ok" => true },
        doc! { "sensor" => "beta", "value" => -3.25, "ok" => false },
        doc! { "sensor" => "gamma", "value" => 0.0, "ok" => true },
    ];
    let mut bytes = Vec::new();
    for doc in &docs {
        bytes.extend_from_slice(&doc.to_bytes().unwrap());
    }
    (bytes, docs)
}

#[test]
fn test_stream_lands_in_collection() {
    let (bytes, docs) = sample_stream();
    let mut store = MemoryCollection::new();

    let mut framer = DocumentFramer::new(CollectionSink::new(&mut store));
    let completed = framer.feed_all(&bytes).unwrap();
    assert_eq!(completed, docs.len());
    drop(framer);

    assert_eq!(store.len(), 3);
    // Stored documents carry a generated _id ahead of the framed fields.
    for (stored, sent) in store.documents().iter().zip(&docs) {
        assert_eq!(stored.keys().next(), Some("_id"));
        for (key, value) in sent.iter() {
            assert_eq!(stored.get(key), Some(value));
        }
    }
}

#[test]
fn test_framed_documents_reach_typed_readers() {
    let (bytes, _) = sample_stream();
    let mut store = MemoryCollection::new();
    DocumentFramer::new(CollectionSink::new(&mut store))
        .feed_all(&bytes)
        .unwrap();

    let coll = TypedCollection::<Reading>::new(Box::new(store));
    let readings: Vec<Reading> = coll.find(doc! {}).unwrap().collect::<Result<_>>().unwrap();
    assert_eq!(readings.len(), 3);
    assert_eq!(
        readings[1],
        Reading {
            sensor: "beta".into(),
            value: -3.25,
            ok: false,
        }
    );
}

#[test]
fn test_byte_at_a_time_matches_bulk_feed() {
    let (bytes, _) = sample_stream();

    let mut bulk_store = MemoryCollection::new();
    DocumentFramer::new(CollectionSink::new(&mut bulk_store))
        .feed_all(&bytes)
        .unwrap();

    let mut trickle_store = MemoryCollection::new();
    {
        let mut framer = DocumentFramer::new(CollectionSink::new(&mut trickle_store));
        for byte in &bytes {
            framer.feed(*byte).unwrap();
        }
    }

    assert_eq!(bulk_store.len(), trickle_store.len());
    for (a, b) in bulk_store.documents().iter().zip(trickle_store.documents()) {
        // Generated _ids differ between runs; the framed payload must not.
        for (key, value) in a.iter().filter(|(k, _)| *k != "_id") {
            assert_eq!(b.get(key), Some(value));
        }
    }
}

#[test]
fn test_oversized_frame_rejected_stream_recovers() {
    let mut store = MemoryCollection::new();
    let mut framer = DocumentFramer::new(CollectionSink::new(&mut store));

    // A declared length past the limit fails on the fourth prefix byte.
    let huge = (64u32 * 1024 * 1024).to_le_bytes();
    let mut fed = 0;
    let mut failed = false;
    for byte in huge {
        match framer.feed(byte) {
            Ok(_) => fed += 1,
            Err(_) => {
                failed = true;
                break;
            }
        }
    }
    assert_eq!(fed, 3);
    assert!(failed);

    // The framer reset itself; a well-formed frame goes through next.
    let frame = doc! { "sensor" => "alpha", "value" => 1.0, "ok" => true }
        .to_bytes()
        .unwrap();
    assert_eq!(framer.feed_all(&frame).unwrap(), 1);
    drop(framer);
    assert_eq!(store.len(), 1);
}

proptest! {
    // However the stream is cut into chunks, the same documents come out.
    #[test]
    fn prop_chunking_does_not_change_framing(cuts in proptest::collection::vec(0usize..200, 0..8)) {
        let (bytes, docs) = sample_stream();

        let mut cuts: Vec<usize> = cuts.into_iter().map(|c| c % (bytes.len() + 1)).collect();
        cuts.sort_unstable();

        let mut store = MemoryCollection::new();
        {
            let mut framer = DocumentFramer::new(CollectionSink::new(&mut store));
            let mut start = 0;
            for cut in cuts {
                framer.feed_all(&bytes[start..cut]).unwrap();
                start = cut;
            }
            framer.feed_all(&bytes[start..]).unwrap();
        }

        prop_assert_eq!(store.len(), docs.len());
        for (stored, sent) in store.documents().iter().zip(&docs) {
            for (key, value) in sent.iter() {
                prop_assert_eq!(stored.get(key), Some(value));
            }
        }
    }
}
