/*!
 * Raw Facade Tests
 * Pass-throughs, allocation commands, batches and anonymous objects
 */

use memseg::{AllocationCommand, ObjectKind, SegmentError, SegmentManager, SeqFit};
use pretty_assertions::assert_eq;

fn manager() -> SegmentManager {
    SegmentManager::new(64 * 1024).unwrap()
}

#[test]
fn test_raw_allocate_round_trip() {
    let mgr = manager();
    let free_before = mgr.get_free_memory();

    let off = mgr.allocate(100).unwrap();
    assert!(mgr.size_of(off) >= 100);
    assert!(mgr.get_free_memory() < free_before);

    mgr.deallocate(off);
    assert_eq!(mgr.get_free_memory(), free_before);
    assert!(mgr.all_memory_deallocated());
}

#[test]
fn test_out_of_memory_error_reports_free() {
    let mgr = SegmentManager::new(4096).unwrap();
    assert!(mgr.try_allocate(1 << 20).is_none());
    let err = mgr.allocate(1 << 20).unwrap_err();
    match err {
        SegmentError::OutOfMemory { requested, free } => {
            assert_eq!(requested, 1 << 20);
            assert!(free <= 4096);
        }
        other => panic!("expected OutOfMemory, got {other}"),
    }
}

#[test]
fn test_aligned_allocation() {
    let mgr = manager();
    let off = mgr.allocate_aligned(512, 256).unwrap();
    assert_eq!(mgr.resolve_offset(off).as_ptr() as usize % 256, 0);
    mgr.deallocate(off);
}

#[test]
fn test_expand_in_place_reuses_the_block() {
    let mgr = manager();
    let off = mgr.allocate(128).unwrap();

    let got = mgr
        .allocation_command(AllocationCommand::ExpandInPlace, 256, 1024, Some(off))
        .unwrap();
    assert_eq!(got.offset, off);
    assert!(got.reused);
    assert!(got.received >= 1024);
    assert_eq!(mgr.size_of(off), got.received);
    mgr.deallocate(off);
}

#[test]
fn test_expand_falls_back_to_new_allocation() {
    let mgr = manager();
    let off = mgr.allocate(128).unwrap();
    let wall = mgr.allocate(64).unwrap();

    let got = mgr
        .allocation_command(AllocationCommand::ExpandOrNew, 512, 512, Some(off))
        .unwrap();
    assert!(!got.reused);
    assert_ne!(got.offset, off);

    mgr.deallocate(off);
    mgr.deallocate(wall);
    mgr.deallocate(got.offset);
    assert!(mgr.all_memory_deallocated());
}

#[test]
fn test_shrink_in_place() {
    let mgr = manager();
    let off = mgr.allocate(1024).unwrap();
    let got = mgr
        .allocation_command(AllocationCommand::Shrink, 128, 128, Some(off))
        .unwrap();
    assert_eq!(got.offset, off);
    assert_eq!(got.received, 128);
    assert_eq!(mgr.size_of(off), 128);
    mgr.deallocate(off);
}

#[test]
fn test_raw_allocation_command_counts_elements() {
    let mgr = manager();
    let got = mgr
        .raw_allocation_command(AllocationCommand::AllocateNew, 16, 64, None, 8)
        .unwrap();
    assert_eq!(got.received, 64);
    assert!(mgr.size_of(got.offset) >= 64 * 8);
    mgr.deallocate(got.offset);
}

#[test]
fn test_allocate_many_uniform_and_sized() {
    let mgr = manager();
    let free_before = mgr.get_free_memory();

    let chain = mgr.allocate_many(64, 8).unwrap();
    assert_eq!(chain.len(), 8);
    mgr.deallocate_many(chain);

    let sized = mgr.allocate_many_sized(&[16, 700, 48]).unwrap();
    assert_eq!(sized.len(), 3);
    assert!(mgr.size_of(sized[1]) >= 700);
    mgr.deallocate_many(sized);

    assert_eq!(mgr.get_free_memory(), free_before);
}

#[test]
fn test_allocate_many_rolls_back_as_a_unit() {
    let mgr = SegmentManager::new(4096).unwrap();
    let free_before = mgr.get_free_memory();
    assert!(mgr.try_allocate_many(1024, 10).is_none());
    assert_eq!(mgr.get_free_memory(), free_before);
}

#[test]
fn test_zero_free_memory() {
    let mgr = manager();
    let off = mgr.allocate(64).unwrap();
    // scribble over the block, then free it
    unsafe { std::ptr::write_bytes(mgr.resolve_offset(off).as_ptr(), 0xAB, 64) };
    mgr.deallocate(off);

    mgr.zero_free_memory();

    // first-fit hands the same block back, now zeroed
    let again = mgr.allocate(64).unwrap();
    assert_eq!(again, off);
    let bytes =
        unsafe { std::slice::from_raw_parts(mgr.resolve_offset(again).as_ptr(), 64) };
    assert_eq!(bytes, &[0u8; 64][..]);
    mgr.deallocate(again);
}

#[test]
fn test_anonymous_construct_and_destroy() {
    let mgr = manager();
    let free_before = mgr.get_free_memory();

    let h = mgr.construct_anonymous::<u32>().fill(4, 9).unwrap();
    assert_eq!(mgr.instance_kind(h), ObjectKind::Anonymous);
    assert_eq!(mgr.instance_len(h), 4);
    assert_eq!(unsafe { mgr.slice(h) }, &[9, 9, 9, 9]);
    // invisible to both directories
    assert_eq!(mgr.num_named_objects(), 0);
    assert_eq!(mgr.num_unique_objects(), 0);

    mgr.destroy_handle(h);
    assert_eq!(mgr.get_free_memory(), free_before);
    assert!(mgr.all_memory_deallocated());
}

#[test]
fn test_grow_keeps_handles_valid() {
    let mut mgr = SegmentManager::new(4096).unwrap();
    let h = mgr.construct::<u64>("pinned").fill(4, 0xFEED).unwrap();
    assert!(mgr.construct::<u64>("too-big").fill(1000, 0).is_err());

    mgr.grow(64 * 1024).unwrap();

    // offsets survive the grow even if the base address moved
    let found = mgr.find::<u64>("pinned").unwrap();
    assert_eq!(found, h);
    assert_eq!(unsafe { mgr.slice(found) }, &[0xFEED; 4]);
    assert!(mgr.construct::<u64>("now-fits").fill(1000, 0).is_ok());
    assert!(mgr.check_sanity());
}

#[test]
fn test_shrink_to_fit_releases_tail() {
    let mut mgr = SegmentManager::new(64 * 1024).unwrap();
    let size_before = mgr.get_size();
    let off = mgr.allocate(256).unwrap();
    mgr.shrink_to_fit();
    assert!(mgr.get_size() < size_before);
    assert!(mgr.check_sanity());
    mgr.deallocate(off);
}

#[test]
fn test_min_size_and_stats() {
    let mgr = manager();
    assert!(SegmentManager::<SeqFit>::get_min_size(1000) >= 1000);

    mgr.construct::<u8>("a").fill(1, 0).unwrap();
    mgr.construct_unique::<u8>().one(0).unwrap();
    let stats = mgr.stats();
    assert_eq!(stats.size, mgr.get_size());
    assert_eq!(stats.named_objects, 1);
    assert_eq!(stats.unique_objects, 1);
    assert!(stats.free_memory < stats.size);
}

#[test]
fn test_typed_allocator_and_deleter() {
    let mgr = manager();

    let alloc = mgr.allocator::<u64>();
    let raw = alloc.allocate(16).unwrap();
    assert_eq!(raw.len(), 16);
    assert_eq!(mgr.resolve(raw).as_ptr() as usize % std::mem::align_of::<u64>(), 0);
    alloc.deallocate(raw);

    let built = mgr.construct::<u64>("owned").fill(2, 1).unwrap();
    mgr.deleter::<u64>().destroy(built);
    assert!(mgr.find::<u64>("owned").is_none());
    assert!(mgr.all_memory_deallocated());
}
