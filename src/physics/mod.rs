//! Rigid-body physics: bodies, collision shapes, broad and narrow phase,
//! and a sequential-impulse contact solver.

pub mod body;
pub mod broadphase;
pub mod narrow;
pub mod shape;
pub mod solver;
pub mod world;

pub use body::MassProps;
pub use shape::Shape;
pub use world::{BodyHandle, ContactGeom, GeomHandle, PhysicsWorld, SpaceKind};
