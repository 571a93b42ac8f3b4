//! Narrow-phase contact generation.
//!
//! Every routine reports contacts for the ordered pair `(g1, g2)`. The
//! contact normal points out of `g2` into `g1`: pushing `g1` along the normal
//! separates the pair. `depth` is the penetration along the normal.

use glam::{Quat, Vec3};

use super::shape::{Placed, Shape};
use crate::geometry::Plane;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    pub pos: Vec3,
    pub normal: Vec3,
    pub depth: f32,
    /// Box face index (0..6) on each geometry, -1 when not applicable.
    pub side1: i32,
    pub side2: i32,
}

impl ContactPoint {
    fn new(pos: Vec3, normal: Vec3, depth: f32) -> Self {
        Self {
            pos,
            normal,
            depth,
            side1: -1,
            side2: -1,
        }
    }

    /// The same contact seen from the other geometry.
    pub fn mirrored(&self) -> Self {
        Self {
            pos: self.pos,
            normal: -self.normal,
            depth: self.depth,
            side1: self.side2,
            side2: self.side1,
        }
    }
}

/// Contacts between two placed shapes, at most `max` of them.
pub fn collide(a: &Placed, b: &Placed, max: usize) -> Vec<ContactPoint> {
    let mut out = match (a.shape, b.shape) {
        (Shape::Sphere { radius: ra }, Shape::Sphere { radius: rb }) => {
            sphere_sphere(a.pos, ra, b.pos, rb).into_iter().collect()
        }
        (Shape::Sphere { radius }, Shape::Box { half }) => {
            sphere_box(a.pos, radius, b, half).into_iter().collect()
        }
        (Shape::Sphere { radius }, Shape::Capsule { radius: cr, length }) => {
            let (p0, p1) = b.segment(length);
            let q = closest_point_on_segment(p0, p1, a.pos);
            sphere_sphere(a.pos, radius, q, cr).into_iter().collect()
        }
        (Shape::Sphere { radius }, Shape::Plane(plane)) => {
            sphere_plane(a.pos, radius, &b.world_plane(plane)).into_iter().collect()
        }
        (Shape::Capsule { radius: ra, length: la }, Shape::Capsule { radius: rb, length: lb }) => {
            let (a0, a1) = a.segment(la);
            let (b0, b1) = b.segment(lb);
            let (pa, pb) = closest_points_segments(a0, a1, b0, b1);
            sphere_sphere(pa, ra, pb, rb).into_iter().collect()
        }
        (Shape::Capsule { radius, length }, Shape::Box { half }) => {
            capsule_box(a, radius, length, b, half)
        }
        (Shape::Capsule { radius, length }, Shape::Plane(plane)) => {
            let plane = b.world_plane(plane);
            let (p0, p1) = a.segment(length);
            [p0, p1]
                .into_iter()
                .filter_map(|p| sphere_plane(p, radius, &plane))
                .collect()
        }
        (Shape::Box { half: ha }, Shape::Box { half: hb }) => box_box(a, ha, b, hb),
        (Shape::Box { half }, Shape::Plane(plane)) => box_plane(a, half, &b.world_plane(plane)),
        (Shape::Plane(_), Shape::Plane(_)) => Vec::new(),
        // Remaining combinations are the mirror image of one above.
        _ => collide(b, a, max).iter().map(ContactPoint::mirrored).collect(),
    };
    out.truncate(max);
    out
}

fn sphere_sphere(ca: Vec3, ra: f32, cb: Vec3, rb: f32) -> Option<ContactPoint> {
    let d = ca - cb;
    let dist = d.length();
    let rsum = ra + rb;
    if dist >= rsum {
        return None;
    }
    let normal = if dist > 1.0e-6 { d / dist } else { Vec3::Y };
    let depth = rsum - dist;
    Some(ContactPoint::new(cb + normal * (rb - depth * 0.5), normal, depth))
}

fn sphere_plane(c: Vec3, r: f32, plane: &Plane) -> Option<ContactPoint> {
    let dist = plane.signed_distance(c);
    let depth = r - dist;
    if depth <= 0.0 {
        return None;
    }
    let n = plane.normal();
    Some(ContactPoint::new(c - n * dist, n, depth))
}

/// Sphere as g1, oriented box as g2.
fn sphere_box(c: Vec3, r: f32, b: &Placed, half: Vec3) -> Option<ContactPoint> {
    let inv = b.rot.inverse();
    let local = inv * (c - b.pos);
    let clamped = local.clamp(-half, half);

    if clamped == local {
        // Center inside the box: push out through the nearest face.
        let (axis, sign, face_dist) = nearest_face(local, half);
        let mut surface = local;
        surface[axis] = sign * half[axis];
        let n_local = axis_vec(axis) * sign;
        let mut contact = ContactPoint::new(b.pos + b.rot * surface, b.rot * n_local, r + face_dist);
        contact.side2 = face_index(axis, sign);
        return Some(contact);
    }

    let diff = local - clamped;
    let dist = diff.length();
    if dist >= r {
        return None;
    }
    let n_local = diff / dist;
    Some(ContactPoint::new(b.pos + b.rot * clamped, b.rot * n_local, r - dist))
}

fn capsule_box(a: &Placed, radius: f32, length: f32, b: &Placed, half: Vec3) -> Vec<ContactPoint> {
    let (p0, p1) = a.segment(length);
    let inv = b.rot.inverse();
    let (l0, l1) = (inv * (p0 - b.pos), inv * (p1 - b.pos));
    let (closest_local, _) = closest_points_segment_aabb(l0, l1, -half, half);
    let closest = b.pos + b.rot * closest_local;

    let mut out: Vec<ContactPoint> = Vec::with_capacity(3);
    for p in [closest, p0, p1] {
        if let Some(c) = sphere_box(p, radius, b, half) {
            if !out.iter().any(|o| (o.pos - c.pos).length_squared() < 1.0e-6) {
                out.push(c);
            }
        }
    }
    out
}

fn box_plane(a: &Placed, half: Vec3, plane: &Plane) -> Vec<ContactPoint> {
    let n = plane.normal();
    box_vertices(a.pos, a.rot, half)
        .into_iter()
        .filter_map(|v| {
            let dist = plane.signed_distance(v);
            (dist < 0.0).then(|| ContactPoint::new(v, n, -dist))
        })
        .collect()
}

fn box_box(a: &Placed, ha: Vec3, b: &Placed, hb: Vec3) -> Vec<ContactPoint> {
    let mut out = Vec::new();

    // Vertices of A inside B: push A out through B's nearest face.
    let inv_b = b.rot.inverse();
    for v in box_vertices(a.pos, a.rot, ha) {
        let local = inv_b * (v - b.pos);
        if local.abs().cmple(hb).all() {
            let (axis, sign, pen) = nearest_face(local, hb);
            let mut c = ContactPoint::new(v, b.rot * (axis_vec(axis) * sign), pen);
            c.side2 = face_index(axis, sign);
            out.push(c);
        }
    }

    // Vertices of B inside A: A's face normal points at B, so flip it.
    let inv_a = a.rot.inverse();
    for v in box_vertices(b.pos, b.rot, hb) {
        let local = inv_a * (v - a.pos);
        if local.abs().cmple(ha).all() {
            let (axis, sign, pen) = nearest_face(local, ha);
            let mut c = ContactPoint::new(v, -(a.rot * (axis_vec(axis) * sign)), pen);
            c.side1 = face_index(axis, sign);
            out.push(c);
        }
    }

    if out.is_empty() {
        // Edge-on-edge crossings: fall back to face-axis separation test.
        if let Some(c) = box_box_face_axes(a, ha, b, hb) {
            out.push(c);
        }
    }
    out
}

fn box_box_face_axes(a: &Placed, ha: Vec3, b: &Placed, hb: Vec3) -> Option<ContactPoint> {
    let ra = glam::Mat3::from_quat(a.rot);
    let rb = glam::Mat3::from_quat(b.rot);
    let axes = [
        ra.x_axis, ra.y_axis, ra.z_axis, rb.x_axis, rb.y_axis, rb.z_axis,
    ];
    let d = a.pos - b.pos;
    let mut best: Option<(f32, Vec3)> = None;
    for axis in axes {
        let pa = ha.x * ra.x_axis.dot(axis).abs()
            + ha.y * ra.y_axis.dot(axis).abs()
            + ha.z * ra.z_axis.dot(axis).abs();
        let pb = hb.x * rb.x_axis.dot(axis).abs()
            + hb.y * rb.y_axis.dot(axis).abs()
            + hb.z * rb.z_axis.dot(axis).abs();
        let overlap = pa + pb - d.dot(axis).abs();
        if overlap <= 0.0 {
            return None;
        }
        if best.map_or(true, |(o, _)| overlap < o) {
            let n = if d.dot(axis) >= 0.0 { axis } else { -axis };
            best = Some((overlap, n));
        }
    }
    best.map(|(depth, n)| ContactPoint::new((a.pos + b.pos) * 0.5, n, depth))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn axis_vec(axis: usize) -> Vec3 {
    match axis {
        0 => Vec3::X,
        1 => Vec3::Y,
        _ => Vec3::Z,
    }
}

fn face_index(axis: usize, sign: f32) -> i32 {
    (axis as i32) * 2 + if sign < 0.0 { 1 } else { 0 }
}

/// Face of a box (half extents `half`) closest to an interior local point:
/// (axis, outward sign, distance to that face).
fn nearest_face(local: Vec3, half: Vec3) -> (usize, f32, f32) {
    let mut best = (0usize, 1.0f32, f32::MAX);
    for axis in 0..3 {
        let dist = half[axis] - local[axis].abs();
        if dist < best.2 {
            let sign = if local[axis] < 0.0 { -1.0 } else { 1.0 };
            best = (axis, sign, dist);
        }
    }
    best
}

fn box_vertices(pos: Vec3, rot: Quat, half: Vec3) -> [Vec3; 8] {
    let mut out = [Vec3::ZERO; 8];
    for (i, v) in out.iter_mut().enumerate() {
        let s = Vec3::new(
            if i & 1 == 0 { -1.0 } else { 1.0 },
            if i & 2 == 0 { -1.0 } else { 1.0 },
            if i & 4 == 0 { -1.0 } else { 1.0 },
        );
        *v = pos + rot * (half * s);
    }
    out
}

pub fn closest_point_on_segment(a: Vec3, b: Vec3, p: Vec3) -> Vec3 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Closest points between segments `p1-q1` and `p2-q2`.
pub fn closest_points_segments(p1: Vec3, q1: Vec3, p2: Vec3, q2: Vec3) -> (Vec3, Vec3) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    if a <= f32::EPSILON && e <= f32::EPSILON {
        return (p1, p2);
    }
    let (s, t);
    if a <= f32::EPSILON {
        s = 0.0;
        t = (f / e).clamp(0.0, 1.0);
    } else {
        let c = d1.dot(r);
        if e <= f32::EPSILON {
            t = 0.0;
            s = (-c / a).clamp(0.0, 1.0);
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let s0 = if denom != 0.0 {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let t0 = (b * s0 + f) / e;
            if t0 < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t0 > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            } else {
                t = t0;
                s = s0;
            }
        }
    }
    (p1 + d1 * s, p2 + d2 * t)
}

fn closest_points_segment_aabb(a: Vec3, b: Vec3, mn: Vec3, mx: Vec3) -> (Vec3, Vec3) {
    let mut ps = (a + b) * 0.5;
    let mut qs = ps.clamp(mn, mx);
    for _ in 0..4 {
        ps = closest_point_on_segment(a, b, qs);
        qs = ps.clamp(mn, mx);
    }
    (ps, qs)
}
