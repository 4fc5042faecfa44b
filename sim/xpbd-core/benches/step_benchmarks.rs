//! Benchmarks for the XPBD step pipeline.
//!
//! Run with: cargo bench -p xpbd-core
//!
//! Scenes are piles of spheres and boxes dropped onto a fixed slab. The
//! random generator is seeded so every run benchmarks the same scene.

#![allow(missing_docs, clippy::wildcard_imports)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use nalgebra::{Point3, UnitQuaternion, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use xpbd_core::broad_phase::compute_aabbs;
use xpbd_core::*;

const SEED: u64 = 0x5eed;

/// A slab plus `n` bodies scattered in a column above it.
fn pile(n: usize) -> BodyArrays {
    let mut rng = StdRng::seed_from_u64(SEED);
    let side = (n as f64).cbrt().ceil().max(1.0);

    let mut bodies = vec![BodyDesc::fixed_cuboid(Vector3::new(side * 2.0, 0.5, side * 2.0))];
    bodies.extend((0..n).map(|i| {
        let position = Point3::new(
            rng.gen_range(-side..side),
            rng.gen_range(1.0..side * 2.0 + 1.0),
            rng.gen_range(-side..side),
        );
        let tilt = UnitQuaternion::from_euler_angles(
            rng.gen_range(-0.5..0.5),
            rng.gen_range(-0.5..0.5),
            rng.gen_range(-0.5..0.5),
        );
        let body = if i % 2 == 0 {
            BodyDesc::sphere(1.0, rng.gen_range(0.2..0.4))
        } else {
            let h = rng.gen_range(0.15..0.3);
            BodyDesc::cuboid(1.0, Vector3::new(h, h, h))
        };
        body.at(position)
            .with_orientation(tilt)
            .with_friction(0.5)
    }));

    BodyArrays::from_bodies(bodies)
}

/// Step a world a few times so contacts exist before measuring.
fn settled_world(n: usize, config: SimulationConfig) -> World {
    let mut world = World::new(pile(n), config).expect("valid scene");
    world.run_steps(20);
    world
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");

    for n in [10, 100, 1000] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("pile", n), &n, |b, &n| {
            let mut world = settled_world(n, SimulationConfig::default());
            b.iter(|| {
                world.step();
                black_box(world.last_step_stats())
            });
        });
    }

    group.finish();
}

fn bench_broad_phase(c: &mut Criterion) {
    let mut group = c.benchmark_group("broad_phase");
    let config = SimulationConfig::default();

    for n in [100, 1000] {
        let world = settled_world(n, config.clone());
        let store = world.body_store();
        let mut aabbs = Vec::new();
        compute_aabbs(store, &config.contact, config.timestep, &mut aabbs);

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("spatial_hash", n), &n, |b, _| {
            let mut broad_phase = SpatialHash::new();
            let mut pairs = Vec::new();
            b.iter(|| {
                broad_phase.find_potential_pairs(store, &aabbs, &mut pairs);
                black_box(pairs.len())
            });
        });
        group.bench_with_input(BenchmarkId::new("brute_force", n), &n, |b, _| {
            let mut broad_phase = BruteForce;
            let mut pairs = Vec::new();
            b.iter(|| {
                broad_phase.find_potential_pairs(store, &aabbs, &mut pairs);
                black_box(pairs.len())
            });
        });
    }

    group.finish();
}

fn bench_solver_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("solver_mode");
    let n = 500;
    group.throughput(Throughput::Elements(n as u64));

    for mode in [SolverMode::GaussSeidel, SolverMode::Jacobi] {
        let config = SimulationConfig::default().solver(SolverConfig::default().mode(mode));
        group.bench_with_input(BenchmarkId::new("pile", mode), &config, |b, config| {
            let mut world = settled_world(n, config.clone());
            b.iter(|| {
                world.step();
                black_box(world.last_step_stats())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_step, bench_broad_phase, bench_solver_modes);
criterion_main!(benches);
