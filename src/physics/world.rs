use anyhow::{bail, Context, Result};
use glam::{Quat, Vec3};
use hecs::Entity;

use super::body::{Body, MassProps};
use super::broadphase::SpatialHash;
use super::narrow::{self, ContactPoint};
use super::shape::{Placed, Shape};
use super::solver::{self, ContactJoint};
use crate::collision::{CollisionHandler, GeomInfo};
use crate::constants::{
    BROADPHASE_CELL_SIZE, BROADPHASE_TABLE_SIZE, MAX_BODIES, MAX_CONTACTS, MAX_CONTACT_JOINTS,
    MAX_GEOMS, SOLVER_ITERATIONS,
};
use crate::util::pool::{Handle, Pool};

pub type BodyHandle = Handle<Body>;
pub type GeomHandle = Handle<Geom>;

/// Which broad-phase space a geometry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceKind {
    /// Immovable scenery. Static geometry is never tested against other static geometry.
    Static,
    Dynamic,
}

/// One contact point between `g1` and `g2`; the normal points out of `g2` into `g1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactGeom {
    pub pos: Vec3,
    pub normal: Vec3,
    pub depth: f32,
    pub g1: GeomHandle,
    pub g2: GeomHandle,
    pub side1: i32,
    pub side2: i32,
}

impl ContactGeom {
    fn from_point(p: ContactPoint, g1: GeomHandle, g2: GeomHandle) -> Self {
        Self {
            pos: p.pos,
            normal: p.normal,
            depth: p.depth,
            g1,
            g2,
            side1: p.side1,
            side2: p.side2,
        }
    }

    /// The same contact from `g2`'s point of view.
    pub fn mirrored(&self) -> Self {
        Self {
            pos: self.pos,
            normal: -self.normal,
            depth: self.depth,
            g1: self.g2,
            g2: self.g1,
            side1: self.side2,
            side2: self.side1,
        }
    }
}

/// A collision geometry. Owns its collision handler.
pub struct Geom {
    shape: Shape,
    space: SpaceKind,
    body: Option<BodyHandle>,
    offset_pos: Vec3,
    offset_rot: Quat,
    /// World placement when not attached to a body.
    pos: Vec3,
    rot: Quat,
    enabled: bool,
    owner: Option<Entity>,
    handler: Box<dyn CollisionHandler>,
}

/// The rigid-body world, its two broad-phase spaces and the contact joint group.
pub struct PhysicsWorld {
    bodies: Pool<Body>,
    geoms: Pool<Geom>,
    joints: Vec<ContactJoint>,
    max_joints: usize,
    gravity: Vec3,
    static_grid: SpatialHash,
    dynamic_grid: SpatialHash,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::with_budgets(MAX_BODIES, MAX_GEOMS, MAX_CONTACT_JOINTS)
    }
}

impl PhysicsWorld {
    pub fn with_budgets(bodies: usize, geoms: usize, joints: usize) -> Self {
        Self {
            bodies: Pool::with_capacity(bodies),
            geoms: Pool::with_capacity(geoms),
            joints: Vec::with_capacity(joints.min(1024)),
            max_joints: joints,
            gravity: Vec3::ZERO,
            static_grid: SpatialHash::new(BROADPHASE_CELL_SIZE, BROADPHASE_TABLE_SIZE),
            dynamic_grid: SpatialHash::new(BROADPHASE_CELL_SIZE, BROADPHASE_TABLE_SIZE),
        }
    }

    pub fn set_gravity(&mut self, g: Vec3) {
        self.gravity = g;
    }

    /// Drop every body, geometry (with its handler) and pending joint.
    pub fn clear(&mut self) {
        self.joints.clear();
        self.geoms.clear();
        self.bodies.clear();
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn geom_count(&self) -> usize {
        self.geoms.len()
    }

    // ---- Bodies ----

    pub fn create_body(&mut self, mass: MassProps, pos: Vec3, rot: Quat) -> Result<BodyHandle> {
        let mut body = Body::new(mass);
        body.pos = pos;
        body.rot = rot.normalize();
        match self.bodies.alloc(body) {
            Some(h) => Ok(h),
            None => bail!(
                "Physics body budget of {} exhausted",
                self.bodies.capacity()
            ),
        }
    }

    /// Destroy a body. Geometries attached to it stay where they are, unattached.
    pub fn destroy_body(&mut self, h: BodyHandle) {
        let Some(body) = self.bodies.free(h) else {
            return;
        };
        for (_, geom) in self.geoms.iter_mut() {
            if geom.body == Some(h) {
                geom.pos = body.pos + body.rot * geom.offset_pos;
                geom.rot = body.rot * geom.offset_rot;
                geom.body = None;
            }
        }
    }

    pub fn body(&self, h: BodyHandle) -> Option<&Body> {
        self.bodies.get(h)
    }

    fn body_mut(&mut self, h: BodyHandle) -> Result<&mut Body> {
        self.bodies
            .get_mut(h)
            .with_context(|| format!("Stale physics body handle {h:?}"))
    }

    pub fn set_body_pos(&mut self, h: BodyHandle, pos: Vec3) -> Result<()> {
        self.body_mut(h)?.pos = pos;
        Ok(())
    }

    pub fn set_body_rot(&mut self, h: BodyHandle, rot: Quat) -> Result<()> {
        self.body_mut(h)?.rot = rot.normalize();
        Ok(())
    }

    pub fn set_body_lin_vel(&mut self, h: BodyHandle, v: Vec3) -> Result<()> {
        self.body_mut(h)?.lin_vel = v;
        Ok(())
    }

    pub fn set_body_ang_vel(&mut self, h: BodyHandle, w: Vec3) -> Result<()> {
        self.body_mut(h)?.ang_vel = w;
        Ok(())
    }

    /// Force given in the body's own frame.
    pub fn add_rel_force(&mut self, h: BodyHandle, f: Vec3) -> Result<()> {
        let body = self.body_mut(h)?;
        body.force += body.rot * f;
        Ok(())
    }

    /// Torque given in the body's own frame.
    pub fn add_rel_torque(&mut self, h: BodyHandle, t: Vec3) -> Result<()> {
        let body = self.body_mut(h)?;
        body.torque += body.rot * t;
        Ok(())
    }

    // ---- Geometries ----

    pub fn create_geom(
        &mut self,
        shape: Shape,
        space: SpaceKind,
        owner: Option<Entity>,
        handler: Box<dyn CollisionHandler>,
    ) -> Result<GeomHandle> {
        if matches!(shape, Shape::Plane(_)) && space != SpaceKind::Static {
            bail!("Plane geometry must live in the static space");
        }
        let geom = Geom {
            shape,
            space,
            body: None,
            offset_pos: Vec3::ZERO,
            offset_rot: Quat::IDENTITY,
            pos: Vec3::ZERO,
            rot: Quat::IDENTITY,
            enabled: true,
            owner,
            handler,
        };
        match self.geoms.alloc(geom) {
            Some(h) => Ok(h),
            None => bail!(
                "Collision geometry budget of {} exhausted",
                self.geoms.capacity()
            ),
        }
    }

    /// Destroy a geometry together with its handler.
    pub fn destroy_geom(&mut self, h: GeomHandle) {
        self.geoms.free(h);
    }

    fn geom(&self, h: GeomHandle) -> Result<&Geom> {
        self.geoms
            .get(h)
            .with_context(|| format!("Stale collision geometry handle {h:?}"))
    }

    fn geom_mut(&mut self, h: GeomHandle) -> Result<&mut Geom> {
        self.geoms
            .get_mut(h)
            .with_context(|| format!("Stale collision geometry handle {h:?}"))
    }

    /// Attach a geometry to a body (or detach with `None`) with a body-local offset.
    pub fn set_geom_body(
        &mut self,
        g: GeomHandle,
        body: Option<BodyHandle>,
        offset_pos: Vec3,
        offset_rot: Quat,
    ) -> Result<()> {
        if let Some(b) = body {
            if self.bodies.get(b).is_none() {
                bail!("Stale physics body handle {b:?}");
            }
        }
        let geom = self.geom_mut(g)?;
        geom.body = body;
        geom.offset_pos = offset_pos;
        geom.offset_rot = offset_rot;
        Ok(())
    }

    pub fn geom_body(&self, g: GeomHandle) -> Option<BodyHandle> {
        self.geoms.get(g).and_then(|geom| geom.body)
    }

    /// Place an unattached geometry. Ignored for attached geometry, which follows its body.
    pub fn set_geom_pos(&mut self, g: GeomHandle, pos: Vec3) -> Result<()> {
        self.geom_mut(g)?.pos = pos;
        Ok(())
    }

    pub fn set_geom_rot(&mut self, g: GeomHandle, rot: Quat) -> Result<()> {
        self.geom_mut(g)?.rot = rot.normalize();
        Ok(())
    }

    pub fn set_geom_enabled(&mut self, g: GeomHandle, enabled: bool) -> Result<()> {
        self.geom_mut(g)?.enabled = enabled;
        Ok(())
    }

    pub fn geom_enabled(&self, g: GeomHandle) -> bool {
        self.geoms.get(g).map_or(false, |geom| geom.enabled)
    }

    /// World placement, following the owning body when attached.
    pub fn geom_placed(&self, g: GeomHandle) -> Option<Placed> {
        let geom = self.geoms.get(g)?;
        Some(self.placed(geom))
    }

    fn placed(&self, geom: &Geom) -> Placed {
        match geom.body.and_then(|b| self.bodies.get(b)) {
            Some(body) => Placed {
                shape: geom.shape,
                pos: body.pos + body.rot * geom.offset_pos,
                rot: body.rot * geom.offset_rot,
            },
            None => Placed {
                shape: geom.shape,
                pos: geom.pos,
                rot: geom.rot,
            },
        }
    }

    pub fn geom_info(&self, g: GeomHandle) -> Result<GeomInfo> {
        let geom = self.geom(g)?;
        Ok(GeomInfo {
            id: g,
            owner: geom.owner,
            kind: geom.handler.kind(),
        })
    }

    pub fn handler(&self, g: GeomHandle) -> Option<&dyn CollisionHandler> {
        self.geoms.get(g).map(|geom| geom.handler.as_ref())
    }

    pub fn handler_mut(&mut self, g: GeomHandle) -> Result<&mut dyn CollisionHandler> {
        Ok(self.geom_mut(g)?.handler.as_mut())
    }

    // ---- Collision ----

    /// Candidate pairs whose bounds overlap: dynamic against dynamic and
    /// dynamic against static. Geometry on the same body never pairs.
    /// Pairs come out sorted and unique.
    pub fn near_pairs(&mut self) -> Vec<(GeomHandle, GeomHandle)> {
        let mut dynamic = Vec::new();
        let mut statics = Vec::new();
        for (h, geom) in self.geoms.iter() {
            let entry = (h, self.placed(geom).aabb(), geom.body);
            match geom.space {
                SpaceKind::Dynamic => dynamic.push(entry),
                SpaceKind::Static => statics.push(entry),
            }
        }

        self.dynamic_grid.clear();
        self.static_grid.clear();
        for (i, (_, aabb, _)) in dynamic.iter().enumerate() {
            self.dynamic_grid.insert(aabb, i as u32);
        }
        for (i, (_, aabb, _)) in statics.iter().enumerate() {
            self.static_grid.insert(aabb, i as u32);
        }

        let mut pairs = Vec::new();
        for (i, (h1, aabb1, body1)) in dynamic.iter().enumerate() {
            let same_body = |b2: &Option<BodyHandle>| body1.is_some() && body1 == b2;
            self.dynamic_grid.query(aabb1, |j| {
                let (h2, aabb2, body2) = &dynamic[j as usize];
                if (j as usize) > i && !same_body(body2) && aabb1.overlaps(aabb2) {
                    pairs.push((*h1, *h2));
                }
            });
            self.static_grid.query(aabb1, |j| {
                let (h2, aabb2, body2) = &statics[j as usize];
                if !same_body(body2) && aabb1.overlaps(aabb2) {
                    pairs.push((*h1, *h2));
                }
            });
        }
        pairs.sort();
        pairs.dedup();
        pairs
    }

    /// Narrow-phase contacts of an ordered pair, at most `MAX_CONTACTS`.
    pub fn collide(&self, g1: GeomHandle, g2: GeomHandle) -> Vec<ContactGeom> {
        let (Some(p1), Some(p2)) = (self.geom_placed(g1), self.geom_placed(g2)) else {
            return Vec::new();
        };
        narrow::collide(&p1, &p2, MAX_CONTACTS)
            .into_iter()
            .map(|p| ContactGeom::from_point(p, g1, g2))
            .collect()
    }

    /// Empty the contact joint group.
    pub fn clear_contact_group(&mut self) {
        self.joints.clear();
    }

    pub fn contact_joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Create a contact joint between the bodies of the contact's geometries.
    pub fn add_contact_joint(&mut self, contact: &ContactGeom) -> Result<()> {
        if self.joints.len() >= self.max_joints {
            bail!("Contact joint group of {} joints exhausted", self.max_joints);
        }
        let b1 = self.geom_body(contact.g1);
        let b2 = self.geom_body(contact.g2);
        if b1.is_none() && b2.is_none() {
            return Ok(());
        }
        self.joints.push(ContactJoint::new(b1, b2, *contact));
        Ok(())
    }

    /// Advance every body by `dt`: apply forces, solve the contact joints,
    /// then integrate positions.
    pub fn quick_step(&mut self, dt: f32) {
        let gravity = self.gravity;
        for (_, body) in self.bodies.iter_mut() {
            body.integrate_forces(gravity, dt);
        }
        solver::solve(&mut self.bodies, &self.joints, SOLVER_ITERATIONS, dt);
        for (_, body) in self.bodies.iter_mut() {
            body.integrate_velocity(dt);
        }
    }
}
