//! Points, planes, angle helpers and interpolation.
//!
//! Angles called "rev" are in revolutions: 1.0 is a full turn.

use glam::Vec3;

/// A location in 3D space. Also used as a vector/offset.
pub type Point = Vec3;
pub type Vector = Vec3;

/// Per-component tolerance used by [`PointExt::near_to`].
const NEAR_TO_DELTA: f32 = 0.0001;

pub fn rev2rad(ang: f32) -> f32 {
    ang * std::f32::consts::TAU
}

pub fn rad2rev(ang: f32) -> f32 {
    ang / std::f32::consts::TAU
}

pub fn rev2deg(ang: f32) -> f32 {
    ang * 360.0
}

pub fn deg2rev(ang: f32) -> f32 {
    ang / 360.0
}

pub fn rad2deg(ang: f32) -> f32 {
    ang.to_degrees()
}

pub fn deg2rad(ang: f32) -> f32 {
    ang.to_radians()
}

/// Shortest signed angular distance from `src` to `dest`, in revolutions.
pub fn min_ang_diff(src: f32, dest: f32) -> f32 {
    let dist = (dest - src).rem_euclid(1.0);
    if 1.0 - dist < dist {
        -(1.0 - dist)
    } else {
        dist
    }
}

/// Reduce an angle offset so its magnitude is at most `max`, keeping the sign.
pub fn cap_ang_diff(ang: f32, max: f32) -> f32 {
    ang.clamp(-max, max)
}

/// Geometric helpers the rest of the engine expects on a point.
pub trait PointExt {
    fn mag(self) -> f32;
    fn dist_to(self, other: Self) -> f32;
    /// Angle between two vectors, in revolutions.
    fn ang_to(self, other: Self) -> f32;
    /// Same direction, new length. A zero vector is returned unchanged.
    fn to_length(self, len: f32) -> Self;
    fn near_to(self, other: Self) -> bool;
}

impl PointExt for Vec3 {
    fn mag(self) -> f32 {
        self.length()
    }

    fn dist_to(self, other: Self) -> f32 {
        self.distance(other)
    }

    fn ang_to(self, other: Self) -> f32 {
        let denom = self.length() * other.length();
        if denom == 0.0 {
            return 0.0;
        }
        rad2rev((self.dot(other) / denom).clamp(-1.0, 1.0).acos())
    }

    fn to_length(self, len: f32) -> Self {
        let old_len = self.length();
        if old_len != 0.0 {
            self * (len / old_len)
        } else {
            self
        }
    }

    fn near_to(self, other: Self) -> bool {
        (self - other).abs().max_element() < NEAR_TO_DELTA
    }
}

// ---------------------------------------------------------------------------
// Plane
// ---------------------------------------------------------------------------

/// Implicit plane `a*x + b*y + c*z + d = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
}

impl Plane {
    pub fn new(a: f32, b: f32, c: f32, d: f32) -> Self {
        Self { a, b, c, d }
    }

    /// Plane through three points. Counter-clockwise winding seen from the
    /// front gives a normal pointing towards the viewer.
    pub fn from_points(p1: Point, p2: Point, p3: Point) -> Self {
        let n = (p2 - p1).cross(p3 - p1).normalize_or_zero();
        Self::from_normal_and_point(n, p1)
    }

    pub fn from_normal_and_point(normal: Vector, p: Point) -> Self {
        Self {
            a: normal.x,
            b: normal.y,
            c: normal.z,
            d: -normal.dot(p),
        }
    }

    pub fn normal(&self) -> Vector {
        Vec3::new(self.a, self.b, self.c)
    }

    /// Signed distance, positive on the side the normal points to.
    /// Only a true distance when the normal is unit length.
    pub fn signed_distance(&self, p: Point) -> f32 {
        self.normal().dot(p) + self.d
    }

    /// Orthogonal projection of `p` onto the plane.
    pub fn project(&self, p: Point) -> Point {
        let n = self.normal();
        let len_sq = n.length_squared();
        if len_sq == 0.0 {
            return p;
        }
        p - n * (self.signed_distance(p) / len_sq)
    }

    /// Same plane with a unit normal.
    pub fn normalized(&self) -> Self {
        let len = self.normal().length();
        if len == 0.0 {
            return *self;
        }
        Self::new(self.a / len, self.b / len, self.c / len, self.d / len)
    }
}

// ---------------------------------------------------------------------------
// Barycentric
// ---------------------------------------------------------------------------

/// Barycentric coordinates of `p` (projected onto the triangle's plane)
/// relative to triangle `(a, b, c)`. Degenerate triangles give `None`.
pub fn barycentric(p: Point, a: Point, b: Point, c: Point) -> Option<Vec3> {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < f32::EPSILON {
        return None;
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    Some(Vec3::new(1.0 - v - w, v, w))
}

/// Weight three per-vertex values by barycentric coordinates.
pub fn barycentric_interp(weights: Vec3, va: Vec3, vb: Vec3, vc: Vec3) -> Vec3 {
    va * weights.x + vb * weights.y + vc * weights.z
}

// ---------------------------------------------------------------------------
// Interpolation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpMode {
    Linear,
    /// Ease in, ease out.
    Smoothed,
    /// Fast start that flattens out logarithmically.
    LogDown,
}

/// Interpolate between `a` and `b`; `x` is clamped to [0, 1].
pub fn interpolate(a: f32, b: f32, x: f32, mode: InterpMode) -> f32 {
    if x <= 0.0 {
        return a;
    }
    if x >= 1.0 {
        return b;
    }
    match mode {
        InterpMode::Linear => a + (b - a) * x,
        InterpMode::Smoothed => {
            if x < 0.5 {
                a + (b - a) * 2.0 * x * x
            } else {
                a + (b - a) * (1.0 - 2.0 * (1.0 - x) * (1.0 - x))
            }
        }
        InterpMode::LogDown => {
            const SCALING: f32 = 1000.0;
            a + (b - a) * ((x.ln() + SCALING) / SCALING).max(0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn angle_conversions_agree() {
        assert!((rev2rad(0.5) - std::f32::consts::PI).abs() < EPS);
        assert!((rad2rev(std::f32::consts::PI) - 0.5).abs() < EPS);
        assert!((rev2deg(0.25) - 90.0).abs() < EPS);
        assert!((deg2rev(180.0) - 0.5).abs() < EPS);
        assert!((deg2rad(rad2deg(1.25)) - 1.25).abs() < EPS);
    }

    #[test]
    fn min_ang_diff_takes_short_way() {
        assert!((min_ang_diff(0.1, 0.3) - 0.2).abs() < EPS);
        assert!((min_ang_diff(0.9, 0.1) - 0.2).abs() < EPS);
        assert!((min_ang_diff(0.1, 0.9) + 0.2).abs() < EPS);
        assert_eq!(cap_ang_diff(-0.4, 0.25), -0.25);
        assert_eq!(cap_ang_diff(0.1, 0.25), 0.1);
    }

    #[test]
    fn to_length_keeps_direction_and_zero() {
        let v = Vec3::new(3.0, 0.0, 4.0).to_length(10.0);
        assert!(v.near_to(Vec3::new(6.0, 0.0, 8.0)));
        assert_eq!(Vec3::ZERO.to_length(5.0), Vec3::ZERO);
        assert!((Vec3::X.ang_to(Vec3::Y) - 0.25).abs() < EPS);
    }

    #[test]
    fn plane_from_ccw_points_faces_viewer() {
        // Counter-clockwise seen from +Z
        let plane = Plane::from_points(Vec3::ZERO, Vec3::X, Vec3::Y);
        assert!(plane.normal().near_to(Vec3::Z));
        assert!((plane.signed_distance(Vec3::new(3.0, -2.0, 5.0)) - 5.0).abs() < EPS);
        assert!(plane
            .project(Vec3::new(3.0, -2.0, 5.0))
            .near_to(Vec3::new(3.0, -2.0, 0.0)));
    }

    #[test]
    fn project_handles_unnormalized_coefficients() {
        let plane = Plane::new(0.0, 2.0, 0.0, -4.0); // y = 2
        assert!(plane
            .project(Vec3::new(1.0, 7.0, 1.0))
            .near_to(Vec3::new(1.0, 2.0, 1.0)));
        assert!((plane.normalized().d + 2.0).abs() < EPS);
    }

    #[test]
    fn barycentric_round_trips_vertices() {
        let (a, b, c) = (Vec3::ZERO, Vec3::X, Vec3::Y);
        let w = barycentric(Vec3::new(0.25, 0.25, 0.0), a, b, c).unwrap();
        assert!((w.x - 0.5).abs() < EPS && (w.y - 0.25).abs() < EPS && (w.z - 0.25).abs() < EPS);

        let value = barycentric_interp(w, Vec3::splat(0.0), Vec3::splat(4.0), Vec3::splat(8.0));
        assert!(value.near_to(Vec3::splat(3.0)));

        assert!(barycentric(Vec3::ZERO, a, a, a).is_none());
    }

    #[test]
    fn interpolate_modes_hit_endpoints() {
        for mode in [InterpMode::Linear, InterpMode::Smoothed, InterpMode::LogDown] {
            assert_eq!(interpolate(2.0, 6.0, 0.0, mode), 2.0);
            assert_eq!(interpolate(2.0, 6.0, 1.0, mode), 6.0);
        }
        assert!((interpolate(2.0, 6.0, 0.5, InterpMode::Linear) - 4.0).abs() < EPS);
        assert!((interpolate(0.0, 1.0, 0.5, InterpMode::Smoothed) - 0.5).abs() < EPS);
    }
}
