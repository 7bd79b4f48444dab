use glam::Vec2;
use rb2d_core::core::body::{Body, BodyType};
use rb2d_core::core::shape::{Filter, ShapeType};
use rb2d_core::core::types::{Material, Transform2, Velocity2};
use rb2d_core::utils::allocator::Id;
use rb2d_core::{World, WorldDef};

fn add_circle(world: &mut World, body_type: BodyType, position: Vec2, radius: f32) -> Id {
    let body_id = world.create_body(Body::builder(body_type).position(position).build(Id::NULL));
    world
        .create_shape(
            body_id,
            ShapeType::Circle { radius },
            Transform2::default(),
            Material::default(),
            Filter::default(),
            false,
        )
        .unwrap();
    body_id
}

#[test]
fn overlapping_circles_produce_a_touching_contact() {
    let mut world = World::new(WorldDef::new().with_gravity(Vec2::ZERO));
    add_circle(&mut world, BodyType::Static, Vec2::ZERO, 1.0);
    add_circle(&mut world, BodyType::Dynamic, Vec2::new(1.5, 0.0), 1.0);

    world.step(1.0 / 60.0).unwrap();

    let touching = world.contacts().any(|(_, c)| c.flags.touching);
    assert!(touching, "overlapping circles should produce a touching contact");
}

#[test]
fn separated_circles_produce_no_contact() {
    let mut world = World::new(WorldDef::new().with_gravity(Vec2::ZERO));
    add_circle(&mut world, BodyType::Static, Vec2::ZERO, 1.0);
    add_circle(&mut world, BodyType::Dynamic, Vec2::new(50.0, 0.0), 1.0);

    world.step(1.0 / 60.0).unwrap();

    assert!(world.contacts().next().is_none());
}

#[test]
fn contact_begin_and_end_events_bracket_the_touching_window() {
    let mut world = World::new(WorldDef::new());
    add_circle(&mut world, BodyType::Static, Vec2::new(0.0, 0.0), 1.0);
    let falling = add_circle(&mut world, BodyType::Dynamic, Vec2::new(0.0, 3.0), 0.5);

    let mut saw_begin = false;
    for _ in 0..400 {
        world.step(1.0 / 60.0).unwrap();
        if !world.events().contact_begin_events().is_empty() {
            saw_begin = true;
            break;
        }
    }
    assert!(saw_begin, "a falling circle should eventually touch the floor");

    world.set_body_velocity(
        falling,
        Velocity2 {
            linear: Vec2::new(0.0, 50.0),
            angular: 0.0,
        },
    );

    let mut saw_end = false;
    for _ in 0..20 {
        world.step(1.0 / 60.0).unwrap();
        if !world.events().contact_end_events().is_empty() {
            saw_end = true;
            break;
        }
    }
    assert!(saw_end, "launching the circle away should end the contact");
}

#[test]
fn sensors_report_begin_and_end_without_blocking_motion() {
    let mut world = World::new(WorldDef::new().with_gravity(Vec2::ZERO));
    let sensor_body = world.create_body(Body::builder(BodyType::Static).build(Id::NULL));
    world
        .create_shape(
            sensor_body,
            ShapeType::Circle { radius: 2.0 },
            Transform2::default(),
            Material::default(),
            Filter::default(),
            true,
        )
        .unwrap();

    let mover = world.create_body(
        Body::builder(BodyType::Dynamic)
            .position(Vec2::new(-5.0, 0.0))
            .linear_velocity(Vec2::new(3.0, 0.0))
            .build(Id::NULL),
    );
    world
        .create_shape(
            mover,
            ShapeType::Circle { radius: 0.25 },
            Transform2::default(),
            Material::default(),
            Filter::default(),
            false,
        )
        .unwrap();

    let mut saw_begin = false;
    let mut saw_end = false;
    for _ in 0..300 {
        world.step(1.0 / 60.0).unwrap();
        if !world.events().sensor_begin_events().is_empty() {
            saw_begin = true;
        }
        if saw_begin && !world.events().sensor_end_events().is_empty() {
            saw_end = true;
            break;
        }
    }
    assert!(saw_begin, "mover should have entered the sensor");
    assert!(saw_end, "mover should have exited the sensor");
}

#[test]
fn filters_prevent_a_pair_from_colliding() {
    let mut world = World::new(WorldDef::new().with_gravity(Vec2::ZERO));
    let group_a = Filter {
        category_bits: 0b01,
        mask_bits: 0b01,
        group_index: 0,
    };
    let group_b = Filter {
        category_bits: 0b10,
        mask_bits: 0b10,
        group_index: 0,
    };

    let body_a = world.create_body(Body::builder(BodyType::Static).build(Id::NULL));
    world
        .create_shape(
            body_a,
            ShapeType::Circle { radius: 1.0 },
            Transform2::default(),
            Material::default(),
            group_a,
            false,
        )
        .unwrap();

    let body_b = world.create_body(
        Body::builder(BodyType::Dynamic)
            .position(Vec2::new(1.0, 0.0))
            .build(Id::NULL),
    );
    world
        .create_shape(
            body_b,
            ShapeType::Circle { radius: 1.0 },
            Transform2::default(),
            Material::default(),
            group_b,
            false,
        )
        .unwrap();

    world.step(1.0 / 60.0).unwrap();
    assert!(world.contacts().next().is_none(), "mismatched filters must not pair");
}
