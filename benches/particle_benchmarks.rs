//! 粒子系统性能基准测试
//!
//! 测试整帧更新和死亡粒子移除的吞吐量

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use particle_engine::particles::{
    EmitterConfig, EmitterTransform, ParticlePool, ParticleSystem,
};
use particle_engine::ParticleSystemConfig;
use std::hint::black_box;

fn full_system(count: usize) -> ParticleSystem {
    let mut config = ParticleSystemConfig::new(
        EmitterConfig::default()
            .with_emission_rate(0.0)
            .with_max_particles(count)
            .with_lifetime(1000.0, 1000.0),
    );
    config.seed = Some(1);
    config.forces.gravity.enabled = true;
    config.forces.drag.enabled = true;
    config.forces.noise.enabled = true;
    let mut system = ParticleSystem::new(config);
    system.play();
    system.burst(count);
    system
}

fn bench_system_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("particle_system_update");
    let transform = EmitterTransform::default();

    for count in [1_000usize, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let mut system = full_system(count);
            b.iter(|| {
                system.update(black_box(1.0 / 60.0), &transform, None);
                black_box(system.gpu_data().len())
            });
        });
    }

    group.finish();
}

fn bench_remove_dead_particles(c: &mut Criterion) {
    let mut group = c.benchmark_group("remove_dead_particles");

    for count in [1_000usize, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter_batched(
                || {
                    let mut pool = ParticlePool::new(count);
                    for i in 0..count {
                        let particle = pool.emit();
                        particle.lifetime = 1.0;
                        particle.age = if i % 3 == 0 { 2.0 } else { 0.0 };
                    }
                    pool
                },
                |mut pool| black_box(pool.remove_dead_particles()),
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_sync_to_gpu(c: &mut Criterion) {
    let mut pool = ParticlePool::new(10_000);
    pool.emit_batch(10_000);
    c.bench_function("sync_to_gpu_10k", |b| {
        b.iter(|| {
            pool.sync_to_gpu();
            black_box(pool.gpu_bytes().len())
        });
    });
}

criterion_group!(
    benches,
    bench_system_update,
    bench_remove_dead_particles,
    bench_sync_to_gpu
);
criterion_main!(benches);
