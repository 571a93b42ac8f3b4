use std::collections::BTreeMap;

use anyhow::Result;
use glam::{Mat3, Quat, Vec3};
use hecs::Entity;

use crate::collision::CollisionHandler;
use crate::physics::{BodyHandle, GeomHandle, MassProps, PhysicsWorld, Shape, SpaceKind};

/// Local-frame placement of a geometry relative to its object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeomOffset {
    pub pos: Vec3,
    pub rot: Quat,
}

impl GeomOffset {
    pub fn at(pos: Vec3) -> Self {
        Self {
            pos,
            rot: Quat::IDENTITY,
        }
    }
}

/// A game object's share of the physics world: at most one body and any
/// number of named geometries.
///
/// With a body, every geometry is attached to it and moves with it. Without
/// one, geometries carry their own placement and are moved one by one.
pub struct PhysicsBinding {
    owner: Entity,
    body: Option<BodyHandle>,
    geoms: BTreeMap<String, GeomHandle>,
}

impl PhysicsBinding {
    pub fn new(owner: Entity) -> Self {
        Self {
            owner,
            body: None,
            geoms: BTreeMap::new(),
        }
    }

    pub fn body(&self) -> Option<BodyHandle> {
        self.body
    }

    pub fn geom(&self, name: &str) -> Option<GeomHandle> {
        self.geoms.get(name).copied()
    }

    pub fn geoms(&self) -> impl Iterator<Item = (&str, GeomHandle)> {
        self.geoms.iter().map(|(n, g)| (n.as_str(), *g))
    }

    /// Create the object's body at the given placement, replacing any old one.
    /// Existing geometries are re-attached to the new body.
    pub fn set_body(
        &mut self,
        physics: &mut PhysicsWorld,
        mass: MassProps,
        pos: Vec3,
        rot: Mat3,
    ) -> Result<BodyHandle> {
        if let Some(old) = self.body.take() {
            physics.destroy_body(old);
        }
        let body = physics.create_body(mass, pos, Quat::from_mat3(&rot))?;
        for g in self.geoms.values() {
            physics.set_geom_body(*g, Some(body), Vec3::ZERO, Quat::IDENTITY)?;
        }
        self.body = Some(body);
        Ok(body)
    }

    /// Create geometry `name`, replacing (and destroying) any geometry and
    /// handler already registered under that name.
    ///
    /// `pos`/`rot` is the object's current placement, used when there is no body.
    #[allow(clippy::too_many_arguments)]
    pub fn set_geom(
        &mut self,
        physics: &mut PhysicsWorld,
        name: &str,
        shape: Shape,
        space: SpaceKind,
        handler: Box<dyn CollisionHandler>,
        offset: Option<GeomOffset>,
        pos: Vec3,
        rot: Mat3,
    ) -> Result<GeomHandle> {
        if let Some(old) = self.geoms.remove(name) {
            physics.destroy_geom(old);
        }
        let geom = physics.create_geom(shape, space, Some(self.owner), handler)?;
        let offset = offset.unwrap_or(GeomOffset::at(Vec3::ZERO));
        match self.body {
            Some(body) => physics.set_geom_body(geom, Some(body), offset.pos, offset.rot)?,
            None => {
                let rot = Quat::from_mat3(&rot);
                physics.set_geom_pos(geom, pos + rot * offset.pos)?;
                physics.set_geom_rot(geom, rot * offset.rot)?;
            }
        }
        self.geoms.insert(name.to_owned(), geom);
        Ok(geom)
    }

    pub fn set_pos(&self, physics: &mut PhysicsWorld, pos: Vec3) -> Result<()> {
        match self.body {
            Some(body) => physics.set_body_pos(body, pos),
            None => self
                .geoms
                .values()
                .try_for_each(|g| physics.set_geom_pos(*g, pos)),
        }
    }

    pub fn set_rot(&self, physics: &mut PhysicsWorld, rot: Mat3) -> Result<()> {
        let q = Quat::from_mat3(&rot);
        match self.body {
            Some(body) => physics.set_body_rot(body, q),
            None => self
                .geoms
                .values()
                .try_for_each(|g| physics.set_geom_rot(*g, q)),
        }
    }

    /// Destroy the body and every geometry together with its handler.
    pub fn release(&mut self, physics: &mut PhysicsWorld) {
        for (_, g) in std::mem::take(&mut self.geoms) {
            physics.destroy_geom(g);
        }
        if let Some(body) = self.body.take() {
            physics.destroy_body(body);
        }
    }
}
