//! # ECS Performance Benchmark
//!
//! Measures the hot paths of the runtime:
//! - Entity creation against a pre-sized world
//! - Active-set iteration over a pair of pools
//! - Signature matching across every live entity
//! - One `Run` collection pass
//!
//! Run with: `cargo bench --package sigil_core`

// Benchmarks don't need docs and build their systems through Default
#![allow(missing_docs)]
#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sigil_core::{
    Component, EcsResult, Entity, Run, RunSystem, System, SystemContext, Systems, World,
};

/// Entity count of the populated worlds.
const ENTITY_COUNT: u32 = 100_000;

#[derive(Clone, Copy, Debug, Default)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}
impl Component for Position {}

#[derive(Clone, Copy, Debug, Default)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}
impl Component for Velocity {}

#[derive(Default)]
struct Movement;
impl System for Movement {}
impl RunSystem for Movement {
    fn run(&mut self, ctx: &mut SystemContext<'_>) -> EcsResult<()> {
        integrate(ctx.world)
    }
}

fn integrate(world: &mut World) -> EcsResult<()> {
    let (mut positions, velocities) = world.pool_pair_mut::<Position, Velocity>()?;
    for (entity, position) in positions.iter_active_mut() {
        let velocity = velocities.get_component(entity)?;
        position.x += velocity.x;
        position.y += velocity.y;
        position.z += velocity.z;
    }
    Ok(())
}

/// World with every entity owning a position and every other entity a velocity.
fn populated_world(count: u32) -> World {
    let mut world = World::new(count, 8);
    world
        .register_component::<Position>()
        .expect("register position");
    world
        .register_component::<Velocity>()
        .expect("register velocity");

    for i in 0..count {
        let entity = world.create_entity().expect("capacity");
        let f = i as f32;
        world
            .add_component(entity, Position { x: f, y: f, z: f })
            .expect("add position");
        if i % 2 == 0 {
            world
                .add_component(entity, Velocity { x: 0.1, y: 0.2, z: 0.3 })
                .expect("add velocity");
        }
    }
    world
}

/// Benchmark: Create entities until the world is full.
fn bench_create_entities(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_entities");

    for count in [1_000, 10_000, ENTITY_COUNT] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut world = World::new(count, 8);
                for _ in 0..count {
                    black_box(world.create_entity().expect("capacity"));
                }
                world.entity_count()
            });
        });
    }

    group.finish();
}

/// Benchmark: Integrate positions over the active set.
fn bench_active_iteration(c: &mut Criterion) {
    let mut world = populated_world(ENTITY_COUNT);

    c.bench_function("integrate_100k", |b| {
        b.iter(|| integrate(black_box(&mut world)).expect("pools registered"));
    });
}

/// Benchmark: Match every live entity against a two-component mask.
fn bench_mask_matching(c: &mut Criterion) {
    let world = populated_world(ENTITY_COUNT);
    let mask = world
        .mask()
        .with::<Position>()
        .and_then(|mask| mask.with::<Velocity>())
        .expect("registered")
        .build();

    c.bench_function("entities_matching_100k", |b| {
        b.iter(|| world.entities_matching(black_box(&mask)).count());
    });
}

/// Benchmark: One `Run` pass through the system registry.
fn bench_execute_run(c: &mut Criterion) {
    let mut systems = Systems::new(populated_world(ENTITY_COUNT));
    systems.create_system::<Movement>().expect("register system");
    systems.create_collection::<Run>().expect("create collection");
    systems
        .add_system::<Run, Movement>()
        .expect("add to collection");

    c.bench_function("execute_run_100k", |b| {
        b.iter(|| black_box(systems.execute::<Run>().expect("pass")));
    });
}

/// Benchmark: Destroy and recreate one entity with components.
fn bench_entity_churn(c: &mut Criterion) {
    let mut world = populated_world(ENTITY_COUNT);
    let target = Entity::new(ENTITY_COUNT / 2);

    c.bench_function("destroy_recreate", |b| {
        b.iter(|| {
            world.destroy_entity(target).expect("alive");
            let entity = world.create_entity().expect("capacity");
            world
                .add_component(entity, Position::default())
                .expect("add position");
            black_box(entity)
        });
    });
}

criterion_group!(
    benches,
    bench_create_entities,
    bench_active_iteration,
    bench_mask_matching,
    bench_execute_run,
    bench_entity_churn,
);
criterion_main!(benches);
