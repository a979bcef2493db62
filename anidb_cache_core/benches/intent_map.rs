//! Benchmarks for the intent map
//!
//! Measures the bookkeeping cost of coalescing: registering observers,
//! fanning a result out to them and retiring the entry.

use anidb_cache_core::cache_key;
use anidb_cache_core::intent::IntentMap;
use anidb_cache_core::pending::{FetchResult, Pending};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tokio::runtime::Runtime;

/// One key, a growing number of observers sharing it
fn benchmark_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("intent_fan_out");
    let runtime = Runtime::new().unwrap();

    for observers in [1_usize, 10, 100, 1_000] {
        group.throughput(Throughput::Elements(observers as u64));
        group.bench_with_input(
            BenchmarkId::new("register_resolve", observers),
            &observers,
            |b, &observers| {
                b.iter(|| {
                    runtime.block_on(async {
                        let intents = IntentMap::<FetchResult<u32>>::new();
                        let key = cache_key!["aid", 5];
                        let mut pendings = Vec::with_capacity(observers);
                        for _ in 0..observers {
                            let (observer, pending) = Pending::channel();
                            black_box(intents.register(&key, observer).await);
                            pendings.push(pending);
                        }
                        intents.resolve_and_retire(&key, Ok(Some(5))).await;
                        for pending in pendings {
                            black_box(pending.await.unwrap());
                        }
                    })
                })
            },
        );
    }

    group.finish();
}

/// Many distinct keys live at once
fn benchmark_distinct_keys(c: &mut Criterion) {
    let mut group = c.benchmark_group("intent_distinct_keys");
    let runtime = Runtime::new().unwrap();

    for keys in [10_u32, 100, 1_000] {
        group.throughput(Throughput::Elements(u64::from(keys)));
        group.bench_with_input(BenchmarkId::new("keys", keys), &keys, |b, &keys| {
            b.iter(|| {
                runtime.block_on(async {
                    let intents = IntentMap::<FetchResult<u32>>::new();
                    let mut pendings = Vec::with_capacity(keys as usize);
                    for aid in 0..keys {
                        let (observer, pending) = Pending::channel();
                        intents.register(&cache_key!["aid", aid], observer).await;
                        pendings.push(pending);
                    }
                    black_box(intents.len());
                    for aid in 0..keys {
                        intents
                            .resolve_and_retire(&cache_key!["aid", aid], Ok(Some(aid)))
                            .await;
                    }
                    for pending in pendings {
                        black_box(pending.await.unwrap());
                    }
                })
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_fan_out, benchmark_distinct_keys);
criterion_main!(benches);
