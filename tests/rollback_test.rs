/*!
 * Rollback and Leak Tests
 * Partial construction failure, ghost entries and memory accounting
 */

use memseg::{IndexShape, SegmentError, SegmentManager};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn test_partial_constructor_failure_rolls_back() {
    struct Tracked(Arc<AtomicUsize>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let mgr = SegmentManager::new(64 * 1024).unwrap();
    let baseline = mgr.get_free_memory();
    let drops = Arc::new(AtomicUsize::new(0));

    let drops_in = Arc::clone(&drops);
    let err = mgr
        .construct::<Tracked>("flaky")
        .try_with(5, move |i| {
            if i == 3 {
                Err(SegmentError::ConstructorFailed { index: i })
            } else {
                Ok(Tracked(Arc::clone(&drops_in)))
            }
        })
        .unwrap_err();

    assert_eq!(err, SegmentError::ConstructorFailed { index: 3 });
    // the three built elements were dropped during rollback
    assert_eq!(drops.load(Ordering::SeqCst), 3);
    // no ghost entry, no leaked memory
    assert!(mgr.find::<Tracked>("flaky").is_none());
    assert_eq!(mgr.num_named_objects(), 0);
    assert_eq!(mgr.get_free_memory(), baseline);
    assert!(mgr.check_sanity());
}

#[test]
fn test_failed_allocation_leaves_no_ghost_entry() {
    let mgr = SegmentManager::new(4096).unwrap();

    let err = mgr.construct::<u64>("big").fill(10_000, 0).unwrap_err();
    assert!(matches!(err, SegmentError::OutOfMemory { .. }));
    assert_eq!(mgr.num_named_objects(), 0);

    // the same name is free to be constructed once the request fits
    let h = mgr.construct::<u64>("big").fill(8, 0).unwrap();
    assert_eq!(h.len(), 8);
}

#[test]
fn test_overflow_rejected_before_allocation() {
    let mgr = SegmentManager::new(4096).unwrap();
    let baseline = mgr.get_free_memory();

    let err = mgr
        .construct::<u64>("huge")
        .fill(usize::MAX / 4, 0)
        .unwrap_err();
    assert!(matches!(err, SegmentError::Overflow { .. }));
    assert_eq!(mgr.get_free_memory(), baseline);
}

#[test]
fn test_free_memory_returns_to_baseline_after_churn() {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    let mgr = SegmentManager::new(64 * 1024).unwrap();
    let baseline = mgr.get_free_memory();
    assert!(mgr.all_memory_deallocated());

    let mut rng = StdRng::seed_from_u64(0x5eed);
    for round in 0..3 {
        for i in 0..10 {
            let count = rng.gen_range(1..64);
            mgr.construct::<u64>(&format!("r{}-{}", round, i))
                .fill(count, 0)
                .unwrap();
        }
        for i in 0..10 {
            assert!(mgr.destroy::<u64>(&format!("r{}-{}", round, i)));
        }
    }

    assert_eq!(mgr.get_free_memory(), baseline);
    assert!(mgr.all_memory_deallocated());
    assert!(mgr.check_sanity());
}

/// One randomized step against the model: the set of present names must
/// always equal the set whose construct fully succeeded.
fn model_step(
    mgr: &SegmentManager,
    model: &mut HashMap<String, usize>,
    op: u8,
    name_id: usize,
    count: usize,
) {
    let name = format!("name-{}", name_id);
    match op {
        0 => {
            let result = mgr.construct::<u32>(&name).fill(count, name_id as u32);
            match result {
                Ok(h) => {
                    assert_eq!(h.len(), count);
                    assert!(model.insert(name, count).is_none());
                }
                Err(SegmentError::AlreadyExists(_)) => {
                    assert!(model.contains_key(&name));
                }
                Err(SegmentError::OutOfMemory { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        1 => {
            let destroyed = mgr.destroy::<u32>(&name);
            assert_eq!(destroyed, model.remove(&name).is_some());
        }
        _ => match (mgr.find::<u32>(&name), model.get(&name)) {
            (Some(h), Some(&expected)) => assert_eq!(h.len(), expected),
            (None, None) => {}
            (found, expected) => {
                panic!("model disagrees for {name}: {found:?} vs {expected:?}")
            }
        },
    }
}

proptest! {
    #[test]
    fn prop_present_names_match_model(
        shape in prop_oneof![Just(IndexShape::Intrusive), Just(IndexShape::Node)],
        ops in prop::collection::vec((0u8..3, 0usize..6, 1usize..5), 0..40),
    ) {
        let mgr: SegmentManager = SegmentManager::with_shape(64 * 1024, shape).unwrap();
        let mut model: HashMap<String, usize> = HashMap::new();

        for (op, name_id, count) in ops {
            model_step(&mgr, &mut model, op, name_id, count);
        }

        prop_assert_eq!(mgr.num_named_objects(), model.len());
        prop_assert!(mgr.check_sanity());

        // destroying every survivor returns the segment to its baseline
        for name in model.keys() {
            prop_assert!(mgr.destroy::<u32>(name));
        }
        prop_assert!(mgr.all_memory_deallocated());
    }
}
