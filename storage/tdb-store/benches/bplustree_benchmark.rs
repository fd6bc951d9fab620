//! B+Tree and node table benchmarks
//!
//! - Sequential and shuffled record inserts
//! - Prefix range scans
//! - Node id allocation and lookup through the cached node table

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use tdb_store::base::{BlockCache, FileSet, RecordFactory};
use tdb_store::btree::calc_order;
use tdb_store::sys::{BLOCK_SIZE, LEN_INDEX_TRIPLE_RECORD};
use tdb_store::{build_dataset, BPlusTree, BPlusTreeParams, Location, Node, RangeIndex, SystemConfig};

fn triple_tree() -> BPlusTree {
    let rf = RecordFactory::new(LEN_INDEX_TRIPLE_RECORD, 0).unwrap();
    let params = BPlusTreeParams::with_order(
        calc_order(BLOCK_SIZE, LEN_INDEX_TRIPLE_RECORD),
        BLOCK_SIZE,
        rf,
    )
    .unwrap();
    BPlusTree::open(
        &FileSet::new(&Location::mem(), "SPO"),
        params,
        0,
        Arc::new(BlockCache::new(1_000)),
    )
    .unwrap()
}

fn key(i: u64) -> [u8; LEN_INDEX_TRIPLE_RECORD] {
    let mut k = [0u8; LEN_INDEX_TRIPLE_RECORD];
    k[..8].copy_from_slice(&(i / 100).to_be_bytes());
    k[8..16].copy_from_slice(&(i % 100).to_be_bytes());
    k[16..].copy_from_slice(&i.to_be_bytes());
    k
}

/// Spread keys over the key space without a random number generator
fn shuffled(i: u64, n: u64) -> u64 {
    (i * 7_919) % n
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("bplustree_insert");

    for size in [1_000u64, 10_000, 50_000].iter() {
        group.throughput(Throughput::Elements(*size));

        group.bench_with_input(BenchmarkId::new("sequential", size), size, |b, &size| {
            b.iter(|| {
                let tree = triple_tree();
                let rf = tree.record_factory();
                for i in 0..size {
                    tree.insert(rf.create_key(&key(i)).unwrap()).unwrap();
                }
                black_box(tree.depth().unwrap())
            });
        });

        group.bench_with_input(BenchmarkId::new("shuffled", size), size, |b, &size| {
            b.iter(|| {
                let tree = triple_tree();
                let rf = tree.record_factory();
                for i in 0..size {
                    tree.insert(rf.create_key(&key(shuffled(i, size))).unwrap())
                        .unwrap();
                }
                black_box(tree.depth().unwrap())
            });
        });
    }

    group.finish();
}

fn bench_range_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("bplustree_range_scan");
    let tree = triple_tree();
    let rf = tree.record_factory();
    for i in 0..50_000 {
        tree.insert(rf.create_key(&key(i)).unwrap()).unwrap();
    }

    for width in [10u64, 100, 1_000].iter() {
        group.throughput(Throughput::Elements(*width));
        group.bench_with_input(BenchmarkId::from_parameter(width), width, |b, &width| {
            let from = rf.create_key(&key(20_000)).unwrap();
            let to = rf.create_key(&key(20_000 + width)).unwrap();
            b.iter(|| black_box(tree.iter(Some(&from), Some(&to)).unwrap().count()));
        });
    }

    group.finish();
}

fn bench_node_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("node_table");
    let nodes: Vec<Node> = (0..5_000)
        .map(|i| Node::iri(format!("http://example.org/resource/{i}")))
        .collect();
    group.throughput(Throughput::Elements(nodes.len() as u64));

    group.bench_function("allocate", |b| {
        b.iter(|| {
            let ds = build_dataset(&Location::mem(), &SystemConfig::default()).unwrap();
            for node in &nodes {
                black_box(ds.id_for(node).unwrap());
            }
        });
    });

    let ds = build_dataset(&Location::mem(), &SystemConfig::small()).unwrap();
    let ids: Vec<_> = nodes.iter().map(|n| ds.id_for(n).unwrap()).collect();
    group.bench_function("lookup_mostly_uncached", |b| {
        b.iter(|| {
            for id in &ids {
                black_box(ds.node_for(*id).unwrap());
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_insert, bench_range_scan, bench_node_table);
criterion_main!(benches);
