//! Insert and lookup benchmarks for the tuple table and FAST index.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use index_zoo::{FastIndex, StaticIndex, TupleTable};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::Arc;

fn generate_keys(n: usize) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n).map(|_| rng.gen_range(0..n as u64 * 4)).collect()
}

fn load_table(keys: &[u64]) -> Arc<TupleTable<u64, u64>> {
    let table = Arc::new(TupleTable::new());
    for (i, &key) in keys.iter().enumerate() {
        table.insert(key, i as u64);
    }
    table
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for size in [10_000, 100_000].iter() {
        let keys = generate_keys(*size);
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("TupleTable", size), size, |b, _| {
            b.iter(|| black_box(load_table(&keys)));
        });

        group.bench_with_input(BenchmarkId::new("TupleTable/4 threads", size), size, |b, _| {
            b.iter(|| {
                let table: TupleTable<u64, u64> = TupleTable::new();
                std::thread::scope(|s| {
                    for chunk in keys.chunks(keys.len().div_ceil(4)) {
                        let table = &table;
                        s.spawn(move || {
                            for &key in chunk {
                                table.insert(key, key);
                            }
                        });
                    }
                });
                black_box(table)
            });
        });
    }

    group.finish();
}

fn bench_find(c: &mut Criterion) {
    let mut group = c.benchmark_group("find");

    for size in [10_000, 1_000_000].iter() {
        let keys = generate_keys(*size);
        let probes: Vec<u64> = keys.iter().step_by(7).copied().take(10_000).collect();
        group.throughput(Throughput::Elements(probes.len() as u64));

        let btree: BTreeMap<u64, u64> =
            keys.iter().enumerate().map(|(i, &k)| (k, i as u64)).collect();
        group.bench_with_input(BenchmarkId::new("BTreeMap", size), size, |b, _| {
            b.iter(|| {
                let mut hits = 0usize;
                for key in probes.iter() {
                    hits += usize::from(btree.contains_key(key));
                }
                black_box(hits)
            });
        });

        for layers in [0, 4, 8] {
            let mut index = FastIndex::new(load_table(&keys), layers).unwrap();
            index.reorganize();

            group.bench_with_input(BenchmarkId::new(format!("FAST/{layers}"), size), size, |b, _| {
                b.iter(|| {
                    let mut hits = 0usize;
                    for &key in probes.iter() {
                        hits += index.find(key).len();
                    }
                    black_box(hits)
                });
            });
        }
    }

    group.finish();
}

fn bench_find_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_range");
    let size = 1_000_000;
    let keys = generate_keys(size);
    let mut index = FastIndex::new(load_table(&keys), 8).unwrap();
    index.reorganize();

    for width in [10u64, 1_000].iter() {
        group.bench_with_input(BenchmarkId::new("FAST/8", width), width, |b, &width| {
            let mut rng = StdRng::seed_from_u64(7);
            b.iter(|| {
                let lo = rng.gen_range(0..size as u64 * 4);
                black_box(index.find_range(lo, lo.saturating_add(width)).len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert, bench_find, bench_find_range);
criterion_main!(benches);
