// src/geometry/mod.rs - Vector math and ray/box collision geometry
pub mod raybox;
pub mod vec3;

pub use raybox::{BoundingBox, Ray, RayBox};
pub use vec3::{angle_from_dot, Vector3, NUM_AXES};
