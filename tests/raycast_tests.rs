use glam::Vec2;
use rb2d_core::core::body::{Body, BodyType};
use rb2d_core::core::shape::{Filter, ShapeType};
use rb2d_core::core::types::{Material, Transform2};
use rb2d_core::utils::allocator::Id;
use rb2d_core::{RaycastQuery, World, WorldDef};

fn add_circle(world: &mut World, position: Vec2, filter: Filter, is_sensor: bool) -> Id {
    let body_id = world.create_body(Body::builder(BodyType::Static).position(position).build(Id::NULL));
    world
        .create_shape(
            body_id,
            ShapeType::Circle { radius: 0.5 },
            Transform2::default(),
            Material::default(),
            filter,
            is_sensor,
        )
        .unwrap();
    body_id
}

#[test]
fn raycast_filters_out_a_mismatched_category() {
    let mut world = World::new(WorldDef::new());
    let near_filter = Filter {
        category_bits: 0b01,
        mask_bits: u32::MAX,
        group_index: 0,
    };
    let far_filter = Filter {
        category_bits: 0b10,
        mask_bits: u32::MAX,
        group_index: 0,
    };

    add_circle(&mut world, Vec2::new(0.0, 5.0), near_filter, false);
    add_circle(&mut world, Vec2::new(0.0, 10.0), far_filter, false);

    let mut query = RaycastQuery::new(Vec2::ZERO, Vec2::Y, 20.0);
    query.filter.mask_bits = 0b01;

    let mut hits = Vec::new();
    world.raycast(&query, |hit| {
        hits.push(hit);
        true
    });

    assert_eq!(hits.len(), 1, "only the category-matching circle should hit");
    assert!((hits[0].point.y - 4.5).abs() < 1e-3);
}

#[test]
fn raycast_closest_returns_the_nearest_hit() {
    let mut world = World::new(WorldDef::new());
    add_circle(&mut world, Vec2::new(0.0, 4.0), Filter::default(), false);
    add_circle(&mut world, Vec2::new(0.0, 8.0), Filter::default(), false);

    let query = RaycastQuery::new(Vec2::ZERO, Vec2::Y, 20.0);
    let hit = world.raycast_closest(&query).expect("closest hit");
    assert!((hit.point.y - 3.5).abs() < 1e-3);
}

#[test]
fn raycast_with_no_direction_finds_nothing() {
    let mut world = World::new(WorldDef::new());
    add_circle(&mut world, Vec2::new(0.0, 4.0), Filter::default(), false);

    let query = RaycastQuery::new(Vec2::ZERO, Vec2::ZERO, 20.0);
    assert!(world.raycast_closest(&query).is_none());
}
