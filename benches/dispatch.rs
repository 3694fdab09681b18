use std::time::Instant;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use statewire::{Executor, ExecutorConfig, Store, CONFIG, REGISTRY};

fn make_store_with_handlers(handlers: usize) -> Store {
    let store = Store::new();
    // Half read only `registry`, half read both roots, so a registry write
    // evaluates every handler and a config write evaluates half.
    for n in 0..handlers {
        if n % 2 == 0 {
            store.register(move |s| s.registry("counter").renders_as(&n.to_string()), |_| {});
        } else {
            store.register(
                |s| s.config("mode").eq_str("bench") & s.registry("counter").is_truthy(),
                |_| {},
            );
        }
    }
    store
}

fn bench_set_without_handlers(c: &mut Criterion) {
    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("no_handlers", |b| {
        let store = Store::new();
        let mut i = 0i64;
        b.iter(|| {
            i += 1;
            store.set(REGISTRY, "bench.counter", i).unwrap();
        });
    });

    group.bench_function("deep_path", |b| {
        let store = Store::new();
        let mut i = 0i64;
        b.iter(|| {
            i += 1;
            store.set(REGISTRY, "a.b.c.d.e.f.g.h", i).unwrap();
        });
    });
    group.finish();
}

fn bench_dispatch_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    for handlers in [8usize, 64, 256] {
        group.bench_function(format!("registry_write/{handlers}_handlers"), |b| {
            b.iter_custom(|iters| {
                // Fresh store per sample so handler state does not carry over.
                let store = make_store_with_handlers(handlers);
                let start = Instant::now();
                for i in 0..iters {
                    store.set(REGISTRY, "counter", i64::try_from(i % 512).unwrap_or(0)).unwrap();
                }
                start.elapsed()
            });
        });
    }

    group.bench_function("unrelated_root/256_handlers", |b| {
        let store = make_store_with_handlers(256);
        let mut i = 0i64;
        b.iter(|| {
            i += 1;
            store.set("session", "tick", i).unwrap();
        });
    });

    group.bench_function("config_write/256_handlers", |b| {
        let store = make_store_with_handlers(256);
        b.iter(|| store.set(CONFIG, "mode", "bench").unwrap());
    });
    group.finish();
}

fn bench_executor_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("executor");
    group.throughput(Throughput::Elements(1));

    group.bench_function("submit_join", |b| {
        let exec = Executor::new(ExecutorConfig {
            workers: 2,
            ..ExecutorConfig::default()
        });
        b.iter(|| exec.spawn(|| 1u64).unwrap().join().unwrap());
    });
    group.finish();
}

criterion_group!(
    dispatch,
    bench_set_without_handlers,
    bench_dispatch_fanout,
    bench_executor_roundtrip
);
criterion_main!(dispatch);
