use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rb2d_core::core::body::{Body, BodyType};
use rb2d_core::core::shape::{Filter, ShapeType};
use rb2d_core::core::types::{Material, Transform2};
use rb2d_core::utils::allocator::Id;
use rb2d_core::{World, WorldDef};

const DT: f32 = 1.0 / 60.0;

fn stack_of_boxes(count: usize) -> World {
    let mut world = World::new(WorldDef::default());

    let ground_id = world.create_body(Body::builder(BodyType::Static).build(Id::NULL));
    world
        .create_shape(
            ground_id,
            ShapeType::Polygon {
                vertices: vec![
                    glam::Vec2::new(-50.0, -1.0),
                    glam::Vec2::new(50.0, -1.0),
                    glam::Vec2::new(50.0, 0.0),
                    glam::Vec2::new(-50.0, 0.0),
                ],
                radius: 0.0,
            },
            Transform2::default(),
            Material::default(),
            Filter::default(),
            false,
        )
        .unwrap();

    for i in 0..count {
        let body_id = world.create_body(
            Body::builder(BodyType::Dynamic)
                .position(glam::Vec2::new((i % 20) as f32 * 1.1, 1.0 + (i / 20) as f32 * 1.1))
                .build(Id::NULL),
        );
        world
            .create_shape(
                body_id,
                ShapeType::Circle { radius: 0.5 },
                Transform2::default(),
                Material::default(),
                Filter::default(),
                false,
            )
            .unwrap();
    }

    world
}

fn bench_step_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step_scaling");
    for &count in &[100usize, 500, 2000] {
        group.bench_with_input(BenchmarkId::new("bodies", count), &count, |b, &count| {
            b.iter_batched(
                || stack_of_boxes(count),
                |mut world| {
                    world.step(black_box(DT)).unwrap();
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_resting_stack_sleep(c: &mut Criterion) {
    c.bench_function("resting_stack_settles_and_sleeps", |b| {
        b.iter_batched(
            || stack_of_boxes(200),
            |mut world| {
                for _ in 0..120 {
                    world.step(black_box(DT)).unwrap();
                }
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_step_scaling, bench_resting_stack_sleep);
criterion_main!(benches);
