use glam::Vec2;
use rb2d_core::core::body::{Body, BodyType};
use rb2d_core::core::joint::{Joint, JointType};
use rb2d_core::core::types::Transform2;
use rb2d_core::utils::allocator::Id;
use rb2d_core::{World, WorldDef};

fn anchored_pair(world: &mut World, wheel_position: Vec2) -> (Id, Id) {
    let base = world.create_body(Body::builder(BodyType::Static).build(Id::NULL));
    let wheel = world.create_body(
        Body::builder(BodyType::Dynamic)
            .position(wheel_position)
            .build(Id::NULL),
    );
    (base, wheel)
}

#[test]
fn revolute_motor_spins_up_toward_its_target_speed() {
    let mut world = World::new(WorldDef::new().with_gravity(Vec2::ZERO));
    let (base, wheel) = anchored_pair(&mut world, Vec2::ZERO);

    let joint = Joint::new(
        Id::NULL,
        base,
        wheel,
        Transform2::default(),
        Transform2::default(),
        JointType::Revolute {
            enable_motor: true,
            motor_speed: 10.0,
            max_motor_torque: 5.0,
            enable_limit: false,
            lower_angle: 0.0,
            upper_angle: 0.0,
        },
    );
    world.create_joint(joint);

    let dt = 1.0 / 60.0;
    for _ in 0..600 {
        world.step(dt).unwrap();
    }

    let angular_speed = world.body_velocity(wheel).unwrap().angular;
    assert!(
        (angular_speed - 10.0).abs() < 0.5,
        "motor should have reached its target speed, got {angular_speed}"
    );
}

#[test]
fn revolute_limit_keeps_the_angle_within_bounds() {
    let mut world = World::new(WorldDef::new().with_gravity(Vec2::ZERO));
    let (base, arm) = anchored_pair(&mut world, Vec2::ZERO);

    let lower = -0.5_f32;
    let upper = 0.5_f32;
    let joint = Joint::new(
        Id::NULL,
        base,
        arm,
        Transform2::default(),
        Transform2::default(),
        JointType::Revolute {
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
            enable_limit: true,
            lower_angle: lower,
            upper_angle: upper,
        },
    );
    world.create_joint(joint);
    world.set_body_velocity(
        arm,
        rb2d_core::core::types::Velocity2 {
            linear: Vec2::ZERO,
            angular: 5.0,
        },
    );

    for _ in 0..60 {
        world.step(1.0 / 60.0).unwrap();
    }

    let angle = world.body_transform(arm).unwrap().rotation.angle();
    assert!(angle <= upper + 0.1, "angle {angle} exceeded the upper limit {upper}");
}

#[test]
fn weld_joint_keeps_bodies_rigidly_locked_together() {
    let mut world = World::new(WorldDef::new());
    let base = world.create_body(Body::builder(BodyType::Static).build(Id::NULL));
    let link = world.create_body(
        Body::builder(BodyType::Dynamic)
            .position(Vec2::new(1.0, 0.0))
            .build(Id::NULL),
    );

    let joint = Joint::new(
        Id::NULL,
        base,
        link,
        Transform2::new(Vec2::new(1.0, 0.0), rb2d_core::utils::math::Rot::IDENTITY),
        Transform2::default(),
        JointType::Weld {
            linear_hertz: 0.0,
            linear_damping_ratio: 0.0,
            angular_hertz: 0.0,
            angular_damping_ratio: 0.0,
        },
    );
    world.create_joint(joint);

    for _ in 0..120 {
        world.step(1.0 / 60.0).unwrap();
    }

    let position = world.body_transform(link).unwrap().position;
    assert!((position - Vec2::new(1.0, 0.0)).length() < 0.1, "welded link drifted to {position:?}");
}

#[test]
fn distance_joint_holds_bodies_at_a_fixed_separation() {
    let mut world = World::new(WorldDef::new());
    let base = world.create_body(Body::builder(BodyType::Static).build(Id::NULL));
    let bob = world.create_body(
        Body::builder(BodyType::Dynamic)
            .position(Vec2::new(3.0, 0.0))
            .build(Id::NULL),
    );

    let joint = Joint::new(
        Id::NULL,
        base,
        bob,
        Transform2::default(),
        Transform2::default(),
        JointType::Distance {
            length: 3.0,
            min_length: 3.0,
            max_length: 3.0,
            enable_spring: false,
            hertz: 0.0,
            damping_ratio: 0.0,
        },
    );
    world.create_joint(joint);

    for _ in 0..300 {
        world.step(1.0 / 60.0).unwrap();
    }

    let distance = world.body_transform(bob).unwrap().position.length();
    assert!((distance - 3.0).abs() < 0.15, "pendulum bob drifted to distance {distance}");
}

#[test]
fn destroying_a_joint_lets_its_bodies_move_independently() {
    let mut world = World::new(WorldDef::new().with_gravity(Vec2::ZERO));
    let (base, bob) = anchored_pair(&mut world, Vec2::new(2.0, 0.0));

    let joint_id = world.create_joint(Joint::new(
        Id::NULL,
        base,
        bob,
        Transform2::default(),
        Transform2::default(),
        JointType::Distance {
            length: 2.0,
            min_length: 2.0,
            max_length: 2.0,
            enable_spring: false,
            hertz: 0.0,
            damping_ratio: 0.0,
        },
    ));

    assert!(world.destroy_joint(joint_id));
    assert!(world.joints().next().is_none());

    world.set_body_velocity(
        bob,
        rb2d_core::core::types::Velocity2 {
            linear: Vec2::new(5.0, 0.0),
            angular: 0.0,
        },
    );
    world.step(1.0 / 60.0).unwrap();
    let position = world.body_transform(bob).unwrap().position;
    assert!(position.x > 2.0, "bob should drift freely once its joint is gone");
}
