use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use scopewire::api::*;
use std::hint::black_box;
use std::sync::Arc;

struct Config {
    name: &'static str,
}

struct Session {
    id: u64,
}

fn benchmark_fork_dispose(c: &mut Criterion) {
    let mut group = c.benchmark_group("scope_lifecycle");
    let root = Registry::new();

    group.bench_function("fork_dispose", |b| {
        b.iter(|| {
            let child = root.fork();
            black_box(child.dispose())
        });
    });

    group.bench_function("fork_depth_4", |b| {
        b.iter(|| {
            let a = root.fork();
            let b1 = a.fork();
            let c1 = b1.fork();
            let d = c1.fork();
            d.must_dispose();
            c1.must_dispose();
            b1.must_dispose();
            a.must_dispose();
        });
    });

    group.finish();
}

fn benchmark_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    let root = Registry::new();
    root.bind_value(Config { name: "bench" });
    root.bind_factory(|_scope: &Registry| Session { id: 7 });

    for depth in [1usize, 4, 16].iter() {
        let mut chain = vec![root.fork()];
        for _ in 1..*depth {
            let next = chain[chain.len() - 1].fork();
            chain.push(next);
        }
        let leaf = chain[chain.len() - 1].clone();

        group.bench_with_input(BenchmarkId::new("value_from_ancestor", depth), &leaf, |b, leaf| {
            b.iter(|| black_box(leaf.resolve::<Config>().map(|c| c.name)));
        });
        group.bench_with_input(BenchmarkId::new("cached_factory", depth), &leaf, |b, leaf| {
            b.iter(|| black_box(leaf.resolve::<Session>().map(|s| s.id)));
        });

        drop(leaf);
        while let Some(scope) = chain.pop() {
            let _ = scope.dispose();
        }
    }

    group.finish();
}

fn benchmark_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    let _ = env_logger::builder().is_test(true).try_init();

    for middleware in [0usize, 4, 16].iter() {
        let mut kernel = Kernel::new(KernelConfig::default(), Arc::new(NullEmitter));
        kernel.registry().bind_value(Config { name: "bench" });
        for _ in 0..*middleware {
            kernel.add_middleware(|ctx: &mut Context| ctx.next());
        }
        let endpoint = kernel.endpoint(
            "bench",
            |ctx: &mut Context| -> CoreResult<()> {
                let config = ctx.resolve::<Config>()?;
                ctx.send_text(200, config.name);
                Ok(())
            },
            &[],
        );

        group.bench_with_input(BenchmarkId::new("serve", middleware), &endpoint, |b, endpoint| {
            b.iter(|| black_box(endpoint.serve(Request::default(), RouteParams::new())));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_fork_dispose, benchmark_resolution, benchmark_dispatch);
criterion_main!(benches);
