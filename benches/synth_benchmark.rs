//! Synthesis Benchmarks for syncstack
//!
//! Measures the pure, in-memory parts of a synth run:
//!
//! 1. **Subnet allocation** across VPC sizes and zone counts
//! 2. **App construction** from a deployment context
//! 3. **Template rendering** of all three stacks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use syncstack::model::network::{Ipv4Cidr, VpcSpec};
use syncstack::prelude::*;
use syncstack::settings::keys;

fn context() -> Context {
    let mut ctx = Context::new();
    ctx.set(keys::PROJECT_PREFIX, "bench");
    ctx.set(keys::PROJECT_NAME, "sync");
    ctx.set(keys::BASTION_KEY_PAIR, "bastion-key");
    ctx.set(keys::PRIVATE_KEY_PAIR, "private-key");
    ctx.set(keys::BUCKET_NAME, "bench-sync-data");
    ctx
}

// ============================================================================
// Allocation
// ============================================================================

fn bench_subnet_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("subnet_allocation");

    for max_azs in [1usize, 2, 3, 6].iter() {
        let spec = VpcSpec {
            cidr: "10.0.0.0/16".parse::<Ipv4Cidr>().unwrap(),
            max_azs: *max_azs,
            ..VpcSpec::default()
        };
        group.throughput(Throughput::Elements((*max_azs * 2) as u64));
        group.bench_with_input(BenchmarkId::new("azs", max_azs), &spec, |b, spec| {
            b.iter(|| black_box(spec.allocate().unwrap()))
        });
    }

    group.finish();
}

// ============================================================================
// App construction and rendering
// ============================================================================

fn bench_build_app(c: &mut Criterion) {
    let settings = Settings::from_context(&context()).unwrap();
    let lookups = LookupCache::empty();

    c.bench_function("build_app", |b| {
        b.iter(|| {
            black_box(
                App::from_settings(settings.clone(), Environment::default(), &lookups).unwrap(),
            )
        })
    });
}

fn bench_synth(c: &mut Criterion) {
    let settings = Settings::from_context(&context()).unwrap();
    let app = App::from_settings(settings, Environment::default(), &LookupCache::empty()).unwrap();

    c.bench_function("synth_all_stacks", |b| {
        b.iter(|| black_box(app.synth().unwrap()))
    });

    let assembly = app.synth().unwrap();
    c.bench_function("manifest", |b| b.iter(|| black_box(assembly.manifest())));
}

criterion_group!(allocation, bench_subnet_allocation);
criterion_group!(synthesis, bench_build_app, bench_synth);
criterion_main!(allocation, synthesis);
