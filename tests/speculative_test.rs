use glam::Vec2;
use rb2d_core::core::body::{Body, BodyType};
use rb2d_core::core::shape::{Filter, ShapeType};
use rb2d_core::core::types::{Material, Transform2};
use rb2d_core::utils::allocator::Id;
use rb2d_core::{World, WorldDef};

#[test]
fn speculative_contact_stops_a_body_before_it_penetrates() {
    let mut world = World::new(WorldDef::new().with_gravity(Vec2::ZERO));

    let wall = world.create_body(
        Body::builder(BodyType::Static)
            .position(Vec2::new(2.0, 0.0))
            .build(Id::NULL),
    );
    world
        .create_shape(
            wall,
            ShapeType::Polygon {
                vertices: vec![
                    Vec2::new(-0.5, -5.0),
                    Vec2::new(0.5, -5.0),
                    Vec2::new(0.5, 5.0),
                    Vec2::new(-0.5, 5.0),
                ],
                radius: 0.0,
            },
            Transform2::default(),
            Material::default(),
            Filter::default(),
            false,
        )
        .unwrap();

    // A closing speed of 12 m/s covers 0.2 units per 1/60s step. Relative to
    // the wall's near face at x = 1.5, the approaching sphere never needs
    // more than one step's worth of speculative margin to be caught.
    let body = world.create_body(
        Body::builder(BodyType::Dynamic)
            .position(Vec2::new(0.9, 0.0))
            .linear_velocity(Vec2::new(12.0, 0.0))
            .build(Id::NULL),
    );
    world
        .create_shape(
            body,
            ShapeType::Circle { radius: 0.5 },
            Transform2::default(),
            Material::default(),
            Filter::default(),
            false,
        )
        .unwrap();

    for _ in 0..30 {
        world.step(1.0 / 60.0).unwrap();
    }

    let position_x = world.body_transform(body).unwrap().position.x;
    assert!(position_x <= 1.05, "sphere penetrated the wall, x = {position_x}");
    assert!(position_x >= 0.85, "sphere should not have bounced backward, x = {position_x}");
}

#[test]
fn disabling_speculative_contacts_still_prevents_deep_steady_state_penetration() {
    let mut world = World::new(WorldDef::new().with_gravity(Vec2::new(0.0, -10.0)));

    let floor = world.create_body(Body::builder(BodyType::Static).build(Id::NULL));
    world
        .create_shape(
            floor,
            ShapeType::Polygon {
                vertices: vec![
                    Vec2::new(-10.0, -1.0),
                    Vec2::new(10.0, -1.0),
                    Vec2::new(10.0, 0.0),
                    Vec2::new(-10.0, 0.0),
                ],
                radius: 0.0,
            },
            Transform2::default(),
            Material::default(),
            Filter::default(),
            false,
        )
        .unwrap();

    let ball = world.create_body(
        Body::builder(BodyType::Dynamic)
            .position(Vec2::new(0.0, 0.6))
            .build(Id::NULL),
    );
    world
        .create_shape(
            ball,
            ShapeType::Circle { radius: 0.5 },
            Transform2::default(),
            Material::default(),
            Filter::default(),
            false,
        )
        .unwrap();

    for _ in 0..300 {
        world.step(1.0 / 60.0).unwrap();
    }

    let resting_y = world.body_transform(ball).unwrap().position.y;
    assert!(resting_y > 0.3, "ball sank too far into the floor, y = {resting_y}");
}
