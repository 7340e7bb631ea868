//! 锁基准测试
//!
//! 测量无竞争情况下获取+释放一把锁的开销，存储使用进程内实现，
//! 结果反映算法本身而非网络往返。

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use keylock::{AcquireOptions, LockConfig, LockManager, MemoryStore};
use std::hint::black_box;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn bench_uncontended_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().expect("failed to build tokio runtime");
    let manager = LockManager::new(Arc::new(MemoryStore::new()), LockConfig::default());

    c.bench_function("acquire_release_uncontended", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut handle = manager
                    .acquire(black_box("bench"), AcquireOptions::new())
                    .await
                    .expect("acquire failed");
                handle.release().await.expect("release failed");
            })
        })
    });
}

fn bench_try_acquire_while_held(c: &mut Criterion) {
    let rt = Runtime::new().expect("failed to build tokio runtime");
    let mut group = c.benchmark_group("try_acquire_held");

    for strict in [false, true] {
        let config = LockConfig {
            strict_ownership: strict,
            ..Default::default()
        };
        let manager = LockManager::new(Arc::new(MemoryStore::new()), config);
        let mut held = rt
            .block_on(manager.acquire("bench", AcquireOptions::new()))
            .expect("acquire failed");

        group.bench_with_input(BenchmarkId::from_parameter(strict), &strict, |b, _| {
            b.iter(|| {
                let result = rt.block_on(manager.try_acquire("bench", AcquireOptions::new()));
                black_box(result.expect("try_acquire failed").is_none())
            })
        });

        rt.block_on(held.release()).expect("release failed");
    }

    group.finish();
}

criterion_group!(benches, bench_uncontended_round_trip, bench_try_acquire_while_held);
criterion_main!(benches);
