//! Core entity data: shapes, bodies, joints, and the shared value types
//! (transforms, velocities, materials) they're built from.

pub mod body;
pub mod joint;
pub mod shape;
pub mod types;

pub use body::{Body, BodyFlags, BodyType};
pub use joint::{Joint, JointType};
pub use shape::{Filter, Shape, ShapeType};
pub use types::{MassData, Material, MaterialPairProperties, Transform2, Velocity2};
