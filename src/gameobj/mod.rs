//! The game-object table: named scene objects as `hecs` entities, each with
//! a transform, damping, an optional physics binding and a variant component.

pub mod avatar;
pub mod binding;
pub mod bubble;
pub mod mesh;
pub mod target_ring;

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context, Result};
use glam::{Mat3, Vec3};
use hecs::{DynamicBundle, Entity};

use crate::constants::{DEFAULT_ANG_DAMP_COEF, DEFAULT_VEL_DAMP_COEF, MAX_FPS};
use crate::data::{AreaDecl, ObjectDecl};
use crate::draw::{DrawItem, DrawList};
use crate::factory::Registry;
use crate::input::Intent;
use crate::physics::PhysicsWorld;

use self::avatar::Avatar;
use self::binding::PhysicsBinding;
use self::bubble::Bubble;
use self::mesh::{MeshLibrary, MeshObject};
use self::target_ring::TargetRing;

// ---- Components ----

/// Unique name within the active mission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name(pub String);

/// World placement. Read back from the body after every step for dynamic objects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub pos: Vec3,
    pub rot: Mat3,
    /// Linear velocity, only meaningful with a body.
    pub vel: Vec3,
}

impl Transform {
    pub fn new(pos: Vec3, rot: Mat3) -> Self {
        Self {
            pos,
            rot,
            vel: Vec3::ZERO,
        }
    }

    /// World position of a point given in the object's frame.
    pub fn rel_point_pos(&self, p: Vec3) -> Vec3 {
        self.pos + self.rot * p
    }

    pub fn vector_to_world(&self, v: Vec3) -> Vec3 {
        self.rot * v
    }

    pub fn vector_from_world(&self, v: Vec3) -> Vec3 {
        self.rot.transpose() * v
    }
}

/// Per-axis damping coefficients in the body's frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Damping {
    pub lin: Vec3,
    pub ang: Vec3,
}

impl Default for Damping {
    fn default() -> Self {
        Self {
            lin: Vec3::splat(DEFAULT_VEL_DAMP_COEF),
            ang: Vec3::splat(DEFAULT_ANG_DAMP_COEF),
        }
    }
}

// ---- Contexts ----

/// What an object may touch during its post-step hook.
pub struct StepCtx<'a> {
    pub physics: &'a mut PhysicsWorld,
    pub step: u64,
    pub intent: &'a Intent,
}

/// What a constructor needs besides the table itself.
pub struct ObjectBuilder<'a> {
    pub physics: &'a mut PhysicsWorld,
    pub meshes: &'a mut MeshLibrary,
}

pub type ObjectCtor = fn(&mut GameObjects, &mut ObjectBuilder, &ObjectDecl) -> Result<Entity>;

/// Constructors for every scene object type tag.
pub fn object_registry() -> Result<Registry<ObjectCtor>> {
    let mut reg: Registry<ObjectCtor> = Registry::new("game object");
    reg.register("Avatar", avatar::build)?;
    reg.register("Mesh", mesh::build)?;
    reg.register("TargetRing", target_ring::build)?;
    Ok(reg)
}

// ---- Table ----

/// All live game objects, addressable by name. Iteration is in name order.
#[derive(Default)]
pub struct GameObjects {
    world: hecs::World,
    by_name: BTreeMap<String, Entity>,
}

impl GameObjects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object with a transform and default damping.
    pub fn spawn(&mut self, name: &str, transform: Transform) -> Result<Entity> {
        if self.by_name.contains_key(name) {
            bail!("Duplicate game object name \"{name}\"");
        }
        let e = self
            .world
            .spawn((Name(name.to_owned()), transform, Damping::default()));
        self.by_name.insert(name.to_owned(), e);
        Ok(e)
    }

    pub fn insert(&mut self, e: Entity, components: impl DynamicBundle) -> Result<()> {
        self.world
            .insert(e, components)
            .map_err(|_| anyhow!("Game object {e:?} no longer exists"))
    }

    pub fn get(&self, name: &str) -> Option<Entity> {
        self.by_name.get(name).copied()
    }

    /// First object, in name order, whose name starts with `prefix`.
    pub fn find_by_prefix(&self, prefix: &str) -> Option<Entity> {
        self.by_name
            .range(prefix.to_owned()..)
            .next()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(_, e)| *e)
    }

    pub fn world(&self) -> &hecs::World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut hecs::World {
        &mut self.world
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn transform(&self, e: Entity) -> Option<Transform> {
        self.world.get::<&Transform>(e).ok().map(|t| *t)
    }

    pub fn set_damping(&mut self, e: Entity, damping: Damping) -> Result<()> {
        self.insert(e, (damping,))
    }

    /// Build an area's objects: the bubble from the sky, then every declared
    /// object through its type tag's constructor. Any object may override its
    /// damping coefficients with a `damping` parameter.
    pub fn instantiate(
        &mut self,
        area: &AreaDecl,
        registry: &Registry<ObjectCtor>,
        builder: &mut ObjectBuilder,
    ) -> Result<()> {
        bubble::spawn(self, &area.sky)?;
        for decl in &area.objects {
            let ctor = registry.get(&decl.kind)?;
            let e = ctor(self, builder, decl)
                .with_context(|| format!("Unable to create game object \"{}\"", decl.name))?;
            if let Some(coef) = decl.params.opt_f32("damping")? {
                self.set_damping(
                    e,
                    Damping {
                        lin: Vec3::splat(coef),
                        ang: Vec3::splat(coef),
                    },
                )?;
            }
        }
        Ok(())
    }

    /// (passed, total) target rings.
    pub fn rings(&self) -> (usize, usize) {
        let mut query = self.world.query::<&TargetRing>();
        query
            .iter()
            .fold((0, 0), |(p, t), (_, r)| (p + usize::from(r.is_passed()), t + 1))
    }

    pub fn set_pos(&mut self, physics: &mut PhysicsWorld, e: Entity, pos: Vec3) -> Result<()> {
        if let Ok(binding) = self.world.get::<&PhysicsBinding>(e) {
            binding.set_pos(physics, pos)?;
        }
        let mut t = self
            .world
            .get::<&mut Transform>(e)
            .map_err(|_| anyhow!("Game object {e:?} has no transform"))?;
        t.pos = pos;
        Ok(())
    }

    pub fn set_rot(&mut self, physics: &mut PhysicsWorld, e: Entity, rot: Mat3) -> Result<()> {
        if let Ok(binding) = self.world.get::<&PhysicsBinding>(e) {
            binding.set_rot(physics, rot)?;
        }
        let mut t = self
            .world
            .get::<&mut Transform>(e)
            .map_err(|_| anyhow!("Game object {e:?} has no transform"))?;
        t.rot = rot;
        Ok(())
    }

    /// Tear down every object, releasing its body and geometries.
    pub fn clear(&mut self, physics: &mut PhysicsWorld) {
        for (_, binding) in self.world.query_mut::<&mut PhysicsBinding>() {
            binding.release(physics);
        }
        self.world.clear();
        self.by_name.clear();
    }

    /// Per-object hook run after the integrator: read the body back into the
    /// transform, run the variant's step, then queue damping for the next step.
    pub fn post_step(&mut self, ctx: &mut StepCtx) -> Result<()> {
        for (name, &e) in &self.by_name {
            let Ok((t, damping, binding, avatar, ring)) = self.world.query_one_mut::<(
                &mut Transform,
                &Damping,
                Option<&PhysicsBinding>,
                Option<&mut Avatar>,
                Option<&mut TargetRing>,
            )>(e) else {
                continue;
            };
            let Some(binding) = binding else {
                continue;
            };
            let body = binding.body();

            if let Some(b) = body.and_then(|h| ctx.physics.body(h)) {
                t.pos = b.pos();
                t.rot = b.rot();
                t.vel = b.lin_vel();
            }

            if let (Some(avatar), Some(body)) = (avatar, body) {
                avatar::step(avatar, body, ctx)?;
            }
            if let Some(ring) = ring {
                ring.step(name, binding, ctx);
            }

            let Some(body) = body else {
                continue;
            };
            let Some(b) = ctx.physics.body(body) else {
                continue;
            };
            let scale = -1.0 / MAX_FPS as f32;
            let lin = b.vector_from_world(b.lin_vel()) * damping.lin * scale;
            let ang = b.vector_from_world(b.ang_vel()) * damping.ang * scale;
            ctx.physics.add_rel_force(body, lin)?;
            ctx.physics.add_rel_torque(body, ang)?;
        }
        Ok(())
    }

    /// Append every object to the draw list: the bubble to the far pass,
    /// everything else to the near pass.
    pub fn draw(&self, list: &mut DrawList) {
        for (name, &e) in &self.by_name {
            let Ok(t) = self.world.get::<&Transform>(e) else {
                continue;
            };
            let item = |mesh: &str, scale: f32| DrawItem {
                name: name.clone(),
                mesh: mesh.to_owned(),
                pos: t.pos,
                rot: t.rot,
                scale,
            };
            if let Ok(bubble) = self.world.get::<&Bubble>(e) {
                list.clear_color = bubble.color;
                list.far.push(item("bubble", bubble.radius));
            } else if let Ok(m) = self.world.get::<&MeshObject>(e) {
                list.near.push(item(&m.mesh_name, 1.0));
            } else if self.world.get::<&Avatar>(e).is_ok() {
                list.near.push(item("avatar", 1.0));
            } else if self.world.get::<&TargetRing>(e).is_ok() {
                list.near.push(item("target_ring", 1.0));
            }
        }
    }
}
