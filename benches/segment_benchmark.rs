/*!
 * Segment Manager Benchmarks
 *
 * Compare raw allocation, named construction and lookup across the two
 * index shapes
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use memseg::{IndexShape, SegmentManager};

fn bench_raw_allocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("raw_allocate");

    for size in [64usize, 1024, 16 * 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mgr = SegmentManager::new(8 * 1024 * 1024).unwrap();
            b.iter(|| {
                let off = mgr.allocate(black_box(size)).unwrap();
                mgr.deallocate(off);
            });
        });
    }

    group.finish();
}

fn bench_named_construct_destroy(c: &mut Criterion) {
    let mut group = c.benchmark_group("named_construct_destroy");

    for shape in [IndexShape::Intrusive, IndexShape::Node] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:?}", shape)),
            &shape,
            |b, &shape| {
                let mgr: SegmentManager =
                    SegmentManager::with_shape(8 * 1024 * 1024, shape).unwrap();
                b.iter(|| {
                    let h = mgr
                        .construct::<u64>(black_box("bench-object"))
                        .fill(8, 0)
                        .unwrap();
                    black_box(h);
                    mgr.destroy::<u64>("bench-object");
                });
            },
        );
    }

    group.finish();
}

fn bench_find_among_many(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_among_many");

    for shape in [IndexShape::Intrusive, IndexShape::Node] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:?}", shape)),
            &shape,
            |b, &shape| {
                let mgr: SegmentManager =
                    SegmentManager::with_shape(8 * 1024 * 1024, shape).unwrap();
                for i in 0..256 {
                    mgr.construct::<u32>(&format!("entry-{:04}", i)).one(i).unwrap();
                }
                b.iter(|| black_box(mgr.find::<u32>(black_box("entry-0128"))));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_raw_allocate,
    bench_named_construct_destroy,
    bench_find_among_many
);
criterion_main!(benches);
