use glam::{Mat3, Quat, Vec3};

use crate::geometry::Plane;

/// Collision shape in geometry-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Sphere { radius: f32 },
    Box { half: Vec3 },
    /// Capsule whose cylinder part of `length` runs along local Z.
    Capsule { radius: f32, length: f32 },
    /// Infinite plane in the geometry's local frame, moved with its placement.
    /// Only valid on static geometry.
    Plane(Plane),
}

/// World placement of a shape.
#[derive(Debug, Clone, Copy)]
pub struct Placed {
    pub shape: Shape,
    pub pos: Vec3,
    pub rot: Quat,
}

impl Placed {
    pub fn aabb(&self) -> Aabb {
        match self.shape {
            Shape::Sphere { radius } => Aabb::from_center_half_extents(self.pos, Vec3::splat(radius)),
            Shape::Box { half } => {
                let r = Mat3::from_quat(self.rot);
                let m = Mat3::from_cols(r.x_axis.abs(), r.y_axis.abs(), r.z_axis.abs());
                Aabb::from_center_half_extents(self.pos, m * half)
            }
            Shape::Capsule { radius, length } => {
                let axis = (self.rot * Vec3::Z * (length * 0.5)).abs();
                Aabb::from_center_half_extents(self.pos, axis + Vec3::splat(radius))
            }
            Shape::Plane(_) => Aabb::INFINITE,
        }
    }

    /// `local` carried into world coordinates by this placement, with a unit normal.
    pub fn world_plane(&self, local: Plane) -> Plane {
        let local = local.normalized();
        let n = local.normal();
        Plane::from_normal_and_point(self.rot * n, self.pos + self.rot * (n * -local.d))
    }

    /// End points of a capsule's core segment.
    pub fn segment(&self, length: f32) -> (Vec3, Vec3) {
        let half = self.rot * Vec3::Z * (length * 0.5);
        (self.pos - half, self.pos + half)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const INFINITE: Aabb = Aabb {
        min: Vec3::splat(f32::NEG_INFINITY),
        max: Vec3::splat(f32::INFINITY),
    };

    pub fn from_center_half_extents(c: Vec3, he: Vec3) -> Self {
        Self {
            min: c - he,
            max: c + he,
        }
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        !(self.max.x < other.min.x
            || self.min.x > other.max.x
            || self.max.y < other.min.y
            || self.min.y > other.max.y
            || self.max.z < other.min.z
            || self.min.z > other.max.z)
    }

    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotated_box_aabb_grows() {
        let placed = Placed {
            shape: Shape::Box {
                half: Vec3::new(2.0, 0.5, 0.5),
            },
            pos: Vec3::ZERO,
            rot: Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
        };
        let aabb = placed.aabb();
        assert!((aabb.max.y - 2.0).abs() < 1e-5);
        assert!((aabb.max.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn planes_are_unbounded() {
        let placed = Placed {
            shape: Shape::Plane(Plane::new(0.0, 1.0, 0.0, 0.0)),
            pos: Vec3::ZERO,
            rot: Quat::IDENTITY,
        };
        assert!(!placed.aabb().is_finite());
        let unit = Aabb::from_center_half_extents(Vec3::splat(1e6), Vec3::ONE);
        assert!(placed.aabb().overlaps(&unit));
    }

    #[test]
    fn plane_follows_its_placement() {
        // y = 1 locally, tipped onto its side and moved along X
        let placed = Placed {
            shape: Shape::Plane(Plane::new(0.0, 2.0, 0.0, -2.0)),
            pos: Vec3::new(5.0, 0.0, 0.0),
            rot: Quat::from_rotation_z(-std::f32::consts::FRAC_PI_2),
        };
        let Shape::Plane(local) = placed.shape else {
            unreachable!()
        };
        let world = placed.world_plane(local);
        assert!((world.normal() - Vec3::X).length() < 1e-5);
        assert!(world.signed_distance(Vec3::new(6.0, 3.0, -2.0)).abs() < 1e-5);
        assert!((world.signed_distance(Vec3::new(10.0, 0.0, 0.0)) - 4.0).abs() < 1e-5);
    }
}
