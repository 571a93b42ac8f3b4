use glam::{Mat3, Vec3};

use super::body::Body;
use super::world::{BodyHandle, ContactGeom};
use crate::constants::{CONTACT_BOUNCE, CONTACT_BOUNCE_VEL, CONTACT_MU};
use crate::util::pool::Pool;

/// Fraction of the penetration corrected per step.
const ERP: f32 = 0.2;
/// Penetration tolerated without correction.
const SLOP: f32 = 0.001;

/// A one-step constraint created from a single contact point.
/// `b1` is pushed along the contact normal, `b2` against it.
#[derive(Debug, Clone)]
pub struct ContactJoint {
    pub b1: Option<BodyHandle>,
    pub b2: Option<BodyHandle>,
    pub contact: ContactGeom,
    pub bounce: f32,
    pub mu: f32,
}

impl ContactJoint {
    pub fn new(b1: Option<BodyHandle>, b2: Option<BodyHandle>, contact: ContactGeom) -> Self {
        Self {
            b1,
            b2,
            contact,
            bounce: CONTACT_BOUNCE,
            mu: CONTACT_MU,
        }
    }
}

/// Per-joint data that stays fixed across solver iterations.
struct Prepared {
    r1: Vec3,
    r2: Vec3,
    tangents: [Vec3; 2],
    mass_n: f32,
    mass_t: [f32; 2],
    target_vn: f32,
    acc_n: f32,
    acc_t: [f32; 2],
}

fn body_terms(bodies: &Pool<Body>, h: Option<BodyHandle>, p: Vec3) -> (Vec3, Mat3, f32) {
    match h.and_then(|h| bodies.get(h)) {
        Some(b) => (p - b.pos, b.inv_inertia_world(), b.inv_mass),
        None => (Vec3::ZERO, Mat3::ZERO, 0.0),
    }
}

fn velocity_at(bodies: &Pool<Body>, h: Option<BodyHandle>, p: Vec3) -> Vec3 {
    match h.and_then(|h| bodies.get(h)) {
        Some(b) => b.point_vel(p),
        None => Vec3::ZERO,
    }
}

fn apply(bodies: &mut Pool<Body>, h: Option<BodyHandle>, impulse: Vec3, r: Vec3) {
    if let Some(b) = h.and_then(|h| bodies.get_mut(h)) {
        b.apply_impulse_at(impulse, r);
    }
}

fn effective_mass(dir: Vec3, r1: Vec3, r2: Vec3, inv_i1: Mat3, inv_i2: Mat3, im1: f32, im2: f32) -> f32 {
    let k = im1
        + im2
        + dir.dot((inv_i1 * r1.cross(dir)).cross(r1))
        + dir.dot((inv_i2 * r2.cross(dir)).cross(r2));
    if k > 0.0 {
        1.0 / k
    } else {
        0.0
    }
}

/// Unit vectors `t1`, `t2` completing `n` to an orthonormal basis.
pub fn orthonormal_basis(n: Vec3) -> (Vec3, Vec3) {
    let a = if n.x.abs() > 0.57735 {
        Vec3::new(n.y, -n.x, 0.0)
    } else {
        Vec3::new(0.0, n.z, -n.y)
    }
    .normalize();
    (a, n.cross(a))
}

/// Sequential impulse solve of every joint, in place on body velocities.
pub fn solve(bodies: &mut Pool<Body>, joints: &[ContactJoint], iterations: usize, dt: f32) {
    let mut prepared: Vec<Prepared> = joints
        .iter()
        .map(|j| {
            let c = &j.contact;
            let (r1, inv_i1, im1) = body_terms(bodies, j.b1, c.pos);
            let (r2, inv_i2, im2) = body_terms(bodies, j.b2, c.pos);
            let (t1, t2) = orthonormal_basis(c.normal);

            let vrel = velocity_at(bodies, j.b1, c.pos) - velocity_at(bodies, j.b2, c.pos);
            let vn = vrel.dot(c.normal);
            let bias = ERP / dt * (c.depth - SLOP).max(0.0);
            let bounce = if -vn > CONTACT_BOUNCE_VEL {
                -j.bounce * vn
            } else {
                0.0
            };

            Prepared {
                r1,
                r2,
                tangents: [t1, t2],
                mass_n: effective_mass(c.normal, r1, r2, inv_i1, inv_i2, im1, im2),
                mass_t: [
                    effective_mass(t1, r1, r2, inv_i1, inv_i2, im1, im2),
                    effective_mass(t2, r1, r2, inv_i1, inv_i2, im1, im2),
                ],
                target_vn: bias.max(bounce),
                acc_n: 0.0,
                acc_t: [0.0; 2],
            }
        })
        .collect();

    for _ in 0..iterations {
        for (j, p) in joints.iter().zip(prepared.iter_mut()) {
            let c = &j.contact;

            // Normal
            let vrel = velocity_at(bodies, j.b1, c.pos) - velocity_at(bodies, j.b2, c.pos);
            let vn = vrel.dot(c.normal);
            let lambda = (p.target_vn - vn) * p.mass_n;
            let new_acc = (p.acc_n + lambda).max(0.0);
            let d = new_acc - p.acc_n;
            p.acc_n = new_acc;
            let impulse = c.normal * d;
            apply(bodies, j.b1, impulse, p.r1);
            apply(bodies, j.b2, -impulse, p.r2);

            // Friction, bounded by the accumulated normal impulse
            let limit = j.mu * p.acc_n;
            for k in 0..2 {
                let t = p.tangents[k];
                let vrel = velocity_at(bodies, j.b1, c.pos) - velocity_at(bodies, j.b2, c.pos);
                let lambda = -vrel.dot(t) * p.mass_t[k];
                let new_acc = (p.acc_t[k] + lambda).clamp(-limit, limit);
                let d = new_acc - p.acc_t[k];
                p.acc_t[k] = new_acc;
                let impulse = t * d;
                apply(bodies, j.b1, impulse, p.r1);
                apply(bodies, j.b2, -impulse, p.r2);
            }
        }
    }
}
