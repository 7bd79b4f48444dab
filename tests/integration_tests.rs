use glam::Vec2;
use rb2d_core::core::body::{Body, BodyType};
use rb2d_core::utils::allocator::Id;
use rb2d_core::{World, WorldDef};

#[test]
fn bodies_fall_under_gravity() {
    let mut world = World::new(WorldDef::new());
    let body_id = world.create_body(
        Body::builder(BodyType::Dynamic)
            .position(Vec2::new(0.0, 10.0))
            .build(Id::NULL),
    );

    world.step(1.0 / 60.0).unwrap();

    let position_y = world.body_transform(body_id).unwrap().position.y;
    assert!(position_y < 10.0, "body should start falling, y = {position_y}");
}

#[test]
fn static_bodies_do_not_move() {
    let mut world = World::new(WorldDef::new());
    let body_id = world.create_body(
        Body::builder(BodyType::Static)
            .position(Vec2::new(3.0, 4.0))
            .build(Id::NULL),
    );

    for _ in 0..30 {
        world.step(1.0 / 60.0).unwrap();
    }

    assert_eq!(world.body_transform(body_id).unwrap().position, Vec2::new(3.0, 4.0));
}

#[test]
fn a_stale_body_handle_is_a_no_op_everywhere() {
    let mut world = World::new(WorldDef::new());
    let body_id = world.create_body(Body::builder(BodyType::Dynamic).build(Id::NULL));
    assert!(world.destroy_body(body_id));

    assert!(world.body_transform(body_id).is_none());
    assert!(!world.destroy_body(body_id));
    assert!(!world.is_body_awake(body_id));
}
