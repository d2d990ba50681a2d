// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::semicolon_if_nothing_returned)] // Benchmark code formatting
#![allow(clippy::missing_panics_doc)] // Benches panic on failure

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sigplane::config::BufferCacheConfig;
use sigplane::BufferManager;

// ============================================================================
// Allocate / release cycle
// ============================================================================

/// Benchmark: cached allocate + drop at several size classes
fn bench_cached_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_cache_cycle");
    let manager = BufferManager::new();
    for size in [64usize, 4096, 65_536, 1 << 20] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let block = manager.allocate(black_box(size));
                black_box(block.len());
            })
        });
    }
    group.finish();
}

/// Benchmark: same cycle with caching disabled (plain heap allocation)
fn bench_uncached_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_cache_disabled");
    let manager = BufferManager::with_config(&BufferCacheConfig {
        enabled: false,
        ..BufferCacheConfig::default()
    });
    for size in [64usize, 4096, 65_536, 1 << 20] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let block = manager.allocate(black_box(size));
                black_box(block.len());
            })
        });
    }
    group.finish();
}

/// Benchmark: mixed sizes against a bounded cache
fn bench_bounded_mixed(c: &mut Criterion) {
    let manager = BufferManager::new();
    manager.set_max_thread_blocks(Some(16));
    let sizes: Vec<usize> = (0..256).map(|_| fastrand::usize(0..200_000)).collect();
    c.bench_function("buffer_cache_bounded_mixed", |b| {
        b.iter(|| {
            for &size in &sizes {
                black_box(manager.allocate(size).len());
            }
        })
    });
}

criterion_group!(
    benches,
    bench_cached_cycle,
    bench_uncached_cycle,
    bench_bounded_mixed
);
criterion_main!(benches);
