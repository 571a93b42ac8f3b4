use glam::{Mat3, Quat, Vec3};

/// Mass and diagonal local inertia of a rigid body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassProps {
    pub mass: f32,
    /// Principal moments of inertia in the body frame.
    pub inertia: Vec3,
}

impl MassProps {
    /// Solid sphere of given total mass.
    pub fn sphere(mass: f32, radius: f32) -> Self {
        let i = 0.4 * mass * radius * radius;
        Self {
            mass,
            inertia: Vec3::splat(i),
        }
    }

    /// Solid box of given total mass and half extents.
    pub fn cuboid(mass: f32, half: Vec3) -> Self {
        let (x2, y2, z2) = (half.x * half.x, half.y * half.y, half.z * half.z);
        Self {
            mass,
            inertia: Vec3::new(y2 + z2, x2 + z2, x2 + y2) * (mass / 3.0),
        }
    }

    /// Capsule along the local Z axis; `length` is the cylinder part only.
    /// Treated as a cylinder of the full length, which is close enough for damping and contact response.
    pub fn capsule(mass: f32, radius: f32, length: f32) -> Self {
        let full = length + 2.0 * radius;
        let r2 = radius * radius;
        let side = mass * (3.0 * r2 + full * full) / 12.0;
        Self {
            mass,
            inertia: Vec3::new(side, side, 0.5 * mass * r2),
        }
    }
}

/// A rigid body. Integrated by [`super::PhysicsWorld::quick_step`].
#[derive(Debug, Clone)]
pub struct Body {
    pub(super) pos: Vec3,
    pub(super) rot: Quat,
    pub(super) lin_vel: Vec3,
    pub(super) ang_vel: Vec3,
    pub(super) force: Vec3,
    pub(super) torque: Vec3,
    pub(super) inv_mass: f32,
    pub(super) inv_inertia_local: Vec3,
}

impl Body {
    pub fn new(mass: MassProps) -> Self {
        let inv = |v: f32| if v > 0.0 { 1.0 / v } else { 0.0 };
        Self {
            pos: Vec3::ZERO,
            rot: Quat::IDENTITY,
            lin_vel: Vec3::ZERO,
            ang_vel: Vec3::ZERO,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            inv_mass: inv(mass.mass),
            inv_inertia_local: Vec3::new(
                inv(mass.inertia.x),
                inv(mass.inertia.y),
                inv(mass.inertia.z),
            ),
        }
    }

    pub fn pos(&self) -> Vec3 {
        self.pos
    }

    pub fn rot(&self) -> Mat3 {
        Mat3::from_quat(self.rot)
    }

    pub fn quat(&self) -> Quat {
        self.rot
    }

    pub fn lin_vel(&self) -> Vec3 {
        self.lin_vel
    }

    pub fn ang_vel(&self) -> Vec3 {
        self.ang_vel
    }

    pub fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    /// World-space inverse inertia: R * I^-1 * R^T.
    pub fn inv_inertia_world(&self) -> Mat3 {
        let r = Mat3::from_quat(self.rot);
        r * Mat3::from_diagonal(self.inv_inertia_local) * r.transpose()
    }

    pub fn vector_from_world(&self, v: Vec3) -> Vec3 {
        self.rot.inverse() * v
    }

    pub fn vector_to_world(&self, v: Vec3) -> Vec3 {
        self.rot * v
    }

    /// Velocity of a world-space point rigidly attached to the body.
    pub fn point_vel(&self, world_point: Vec3) -> Vec3 {
        self.lin_vel + self.ang_vel.cross(world_point - self.pos)
    }

    pub(super) fn apply_impulse_at(&mut self, impulse: Vec3, r: Vec3) {
        if self.inv_mass == 0.0 {
            return;
        }
        self.lin_vel += impulse * self.inv_mass;
        self.ang_vel += self.inv_inertia_world() * r.cross(impulse);
    }

    /// Apply accumulated forces for `dt`, then clear the accumulators.
    pub(super) fn integrate_forces(&mut self, gravity: Vec3, dt: f32) {
        if self.inv_mass > 0.0 {
            self.lin_vel += (gravity + self.force * self.inv_mass) * dt;
            self.ang_vel += self.inv_inertia_world() * self.torque * dt;
        }
        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
    }

    pub(super) fn integrate_velocity(&mut self, dt: f32) {
        self.pos += self.lin_vel * dt;
        let w = self.ang_vel;
        if w.length_squared() > 0.0 {
            let dq = Quat::from_xyzw(w.x, w.y, w.z, 0.0) * self.rot;
            self.rot = Quat::from_xyzw(
                self.rot.x + 0.5 * dt * dq.x,
                self.rot.y + 0.5 * dt * dq.y,
                self.rot.z + 0.5 * dt * dq.z,
                self.rot.w + 0.5 * dt * dq.w,
            )
            .normalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_mass_ignores_impulses() {
        let mut body = Body::new(MassProps {
            mass: 0.0,
            inertia: Vec3::ZERO,
        });
        body.apply_impulse_at(Vec3::X * 10.0, Vec3::Y);
        assert_eq!(body.lin_vel(), Vec3::ZERO);
        assert_eq!(body.ang_vel(), Vec3::ZERO);
    }

    #[test]
    fn off_center_impulse_spins() {
        let mut body = Body::new(MassProps::sphere(1.0, 1.0));
        body.apply_impulse_at(Vec3::X, Vec3::Y);
        assert!((body.lin_vel().x - 1.0).abs() < 1e-6);
        // Y cross X = -Z
        assert!(body.ang_vel().z < 0.0);
    }

    #[test]
    fn rotation_integration_stays_normalized() {
        let mut body = Body::new(MassProps::cuboid(2.0, Vec3::ONE));
        body.ang_vel = Vec3::new(0.0, std::f32::consts::PI, 0.0);
        for _ in 0..60 {
            body.integrate_velocity(1.0 / 60.0);
        }
        assert!((body.quat().length() - 1.0).abs() < 1e-5);
        // Half a turn about Y flips X
        let x = body.vector_to_world(Vec3::X);
        assert!(x.x < -0.95);
    }
}
