//! Multi-threaded and randomized tests for the buffer substrate.
//!
//! The unit tests alongside each module pin down single-threaded
//! semantics; these tests exercise the coarse per-instance mutexes from
//! many threads and compare the page table against a model under a
//! randomized workload.

use basalt_buffer::{ExtendibleHashTable, FrameId, LruKReplacer, Replacer};
use basalt_common::BufferConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;

const THREADS: usize = 8;
const KEYS_PER_THREAD: u64 = 512;

#[test]
fn test_concurrent_table_inserts() {
    let config = BufferConfig {
        bucket_size: 4,
        ..Default::default()
    };
    let table: Arc<ExtendibleHashTable<u64, u64>> =
        Arc::new(ExtendibleHashTable::from_config(&config).unwrap());

    let handles: Vec<_> = (0..THREADS as u64)
        .map(|t| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                let base = t * KEYS_PER_THREAD;
                for key in base..base + KEYS_PER_THREAD {
                    table.insert(key, key * 2);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(table.len(), THREADS * KEYS_PER_THREAD as usize);
    for key in 0..THREADS as u64 * KEYS_PER_THREAD {
        assert_eq!(table.find(&key), Some(key * 2));
    }
}

#[test]
fn test_concurrent_table_mixed_workload() {
    let table: Arc<ExtendibleHashTable<u64, u64>> = Arc::new(ExtendibleHashTable::new(8));

    // Each thread owns a disjoint key range: inserts everything, removes
    // the odd keys, and reads as it goes.
    let handles: Vec<_> = (0..THREADS as u64)
        .map(|t| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                let base = t * KEYS_PER_THREAD;
                for key in base..base + KEYS_PER_THREAD {
                    table.insert(key, key);
                    assert_eq!(table.find(&key), Some(key));
                }
                for key in base..base + KEYS_PER_THREAD {
                    if key % 2 == 1 {
                        assert!(table.remove(&key));
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for key in 0..THREADS as u64 * KEYS_PER_THREAD {
        if key % 2 == 1 {
            assert_eq!(table.find(&key), None);
        } else {
            assert_eq!(table.find(&key), Some(key));
        }
    }
}

#[test]
fn test_concurrent_eviction_is_unique() {
    let config = BufferConfig {
        frame_count: 256,
        replacer_k: 2,
        ..Default::default()
    };
    let capacity = config.frame_count;
    let replacer = Arc::new(LruKReplacer::from_config(&config).unwrap());

    for frame in 0..capacity as u32 {
        replacer.record_access(FrameId(frame)).unwrap();
        replacer.set_evictable(FrameId(frame), true).unwrap();
    }
    assert_eq!(replacer.size(), capacity);

    // Every frame must be evicted exactly once across all threads.
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let replacer = Arc::clone(&replacer);
            thread::spawn(move || {
                let mut victims = Vec::new();
                while let Some(frame_id) = replacer.evict() {
                    victims.push(frame_id);
                }
                victims
            })
        })
        .collect();

    let mut seen = HashSet::new();
    let mut total = 0;
    for handle in handles {
        for frame_id in handle.join().unwrap() {
            assert!(seen.insert(frame_id), "frame {} evicted twice", frame_id);
            total += 1;
        }
    }

    assert_eq!(total, capacity);
    assert_eq!(replacer.size(), 0);
}

#[test]
fn test_concurrent_access_recording() {
    let capacity = 128usize;
    let replacer = Arc::new(LruKReplacer::new(capacity, 3));

    // Threads hammer overlapping frames; the evictable count must still
    // settle to exactly the number of distinct frames touched.
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let replacer = Arc::clone(&replacer);
            thread::spawn(move || {
                for round in 0..64usize {
                    let frame = ((t * 31 + round) % capacity) as u32;
                    replacer.record_access(FrameId(frame)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut touched = HashSet::new();
    for t in 0..THREADS {
        for round in 0..64usize {
            touched.insert(((t * 31 + round) % capacity) as u32);
        }
    }
    for &frame in &touched {
        replacer.set_evictable(FrameId(frame), true).unwrap();
    }
    assert_eq!(replacer.size(), touched.len());

    let mut evicted = 0;
    while replacer.evict().is_some() {
        evicted += 1;
    }
    assert_eq!(evicted, touched.len());
}

#[test]
fn test_table_matches_hash_map_model() {
    let table: ExtendibleHashTable<u64, u64> = ExtendibleHashTable::new(4);
    let mut model: HashMap<u64, u64> = HashMap::new();
    let mut rng = StdRng::seed_from_u64(0xB0A7);

    for round in 0..10_000u64 {
        let key = rng.gen_range(0..512);
        match rng.gen_range(0..10) {
            0..=5 => {
                table.insert(key, round);
                model.insert(key, round);
            }
            6..=7 => {
                assert_eq!(table.remove(&key), model.remove(&key).is_some());
            }
            _ => {
                assert_eq!(table.find(&key), model.get(&key).copied());
            }
        }
        assert_eq!(table.len(), model.len());
    }

    for (key, value) in &model {
        assert_eq!(table.find(key), Some(*value));
    }
}

#[test]
fn test_replacer_size_under_random_workload() {
    let capacity = 64usize;
    let replacer = LruKReplacer::new(capacity, 2);
    let mut evictable: HashSet<u32> = HashSet::new();
    let mut known: HashSet<u32> = HashSet::new();
    let mut rng = StdRng::seed_from_u64(0x5EED);

    for _ in 0..10_000 {
        let frame = rng.gen_range(0..capacity as u32);
        match rng.gen_range(0..10) {
            0..=4 => {
                replacer.record_access(FrameId(frame)).unwrap();
                known.insert(frame);
            }
            5..=6 => {
                let flag = rng.gen_bool(0.5);
                replacer.set_evictable(FrameId(frame), flag).unwrap();
                if known.contains(&frame) {
                    if flag {
                        evictable.insert(frame);
                    } else {
                        evictable.remove(&frame);
                    }
                }
            }
            7 => {
                if let Some(frame_id) = replacer.evict() {
                    assert!(
                        evictable.remove(&frame_id.0),
                        "evicted a non-evictable frame {}",
                        frame_id
                    );
                    known.remove(&frame_id.0);
                } else {
                    assert!(evictable.is_empty());
                }
            }
            _ => match replacer.remove(FrameId(frame)) {
                Ok(()) => {
                    evictable.remove(&frame);
                    known.remove(&frame);
                }
                Err(_) => {
                    assert!(known.contains(&frame) && !evictable.contains(&frame));
                }
            },
        }
        assert_eq!(replacer.size(), evictable.len());
    }
}
