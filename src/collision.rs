//! Per-geometry collision handlers and the pair dispatch that drives them.
//!
//! Every collision geometry owns one handler. For each colliding pair both
//! handlers see the collision, each from its own side, and a contact joint
//! is only created when both agree.

use anyhow::Result;
use hecs::Entity;

use crate::gameobj::avatar::{Avatar, SurfaceContact};
use crate::gameobj::target_ring::TargetRing;
use crate::physics::{ContactGeom, GeomHandle, PhysicsWorld};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    AlwaysAccept,
    TrackedCollisionLog,
    CheckFace,
    AvatarAttachment,
    AvatarSticky,
}

/// What a handler may know about a geometry, its own or the other party.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeomInfo {
    pub id: GeomHandle,
    pub owner: Option<Entity>,
    pub kind: HandlerKind,
}

/// Mutable state handlers may touch while reacting to a collision.
pub struct CollisionCtx<'a> {
    pub objects: &'a mut hecs::World,
    pub step: u64,
}

/// One observed collision from the point of view of the logging geometry.
#[derive(Debug, Clone)]
pub struct Collision {
    pub other: GeomInfo,
    pub step: u64,
    pub contacts: Vec<ContactGeom>,
}

pub trait CollisionHandler {
    fn kind(&self) -> HandlerKind;

    /// React to a collision between `this` and `other`. `contacts` always
    /// has `this` as `g1`. Returns whether contact joints may be created.
    fn handle(
        &mut self,
        ctx: &mut CollisionCtx,
        this: GeomInfo,
        other: GeomInfo,
        contacts: &[ContactGeom],
    ) -> bool;

    /// Collisions recorded during the most recent step, for logging handlers.
    fn collisions(&self) -> &[Collision] {
        &[]
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Plain solid geometry.
pub struct AlwaysAccept;

impl CollisionHandler for AlwaysAccept {
    fn kind(&self) -> HandlerKind {
        HandlerKind::AlwaysAccept
    }

    fn handle(&mut self, _: &mut CollisionCtx, _: GeomInfo, _: GeomInfo, _: &[ContactGeom]) -> bool {
        true
    }
}

/// Solid geometry that remembers what it hit during the current step.
#[derive(Default)]
pub struct TrackedCollisionLog {
    step: Option<u64>,
    log: Vec<Collision>,
}

impl TrackedCollisionLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CollisionHandler for TrackedCollisionLog {
    fn kind(&self) -> HandlerKind {
        HandlerKind::TrackedCollisionLog
    }

    fn handle(
        &mut self,
        ctx: &mut CollisionCtx,
        _this: GeomInfo,
        other: GeomInfo,
        contacts: &[ContactGeom],
    ) -> bool {
        if self.step != Some(ctx.step) {
            self.step = Some(ctx.step);
            self.log.clear();
        }
        self.log.push(Collision {
            other,
            step: ctx.step,
            contacts: contacts.to_vec(),
        });
        true
    }

    fn collisions(&self) -> &[Collision] {
        &self.log
    }
}

/// One pass-through face of a target ring. Never produces contact.
pub struct CheckFace {
    pub face: usize,
}

impl CollisionHandler for CheckFace {
    fn kind(&self) -> HandlerKind {
        HandlerKind::CheckFace
    }

    fn handle(
        &mut self,
        ctx: &mut CollisionCtx,
        this: GeomInfo,
        other: GeomInfo,
        _contacts: &[ContactGeom],
    ) -> bool {
        if other.kind != HandlerKind::AvatarAttachment {
            return false;
        }
        if let Some(owner) = this.owner {
            if let Ok(mut ring) = ctx.objects.get::<&mut TargetRing>(owner) {
                ring.mark_face(self.face, ctx.step);
            }
        }
        false
    }
}

/// The avatar's body geometry. Feeds running-surface contacts to the
/// avatar's attachment state machine.
pub struct AvatarAttachment;

impl CollisionHandler for AvatarAttachment {
    fn kind(&self) -> HandlerKind {
        HandlerKind::AvatarAttachment
    }

    fn handle(
        &mut self,
        ctx: &mut CollisionCtx,
        this: GeomInfo,
        other: GeomInfo,
        contacts: &[ContactGeom],
    ) -> bool {
        if other.kind != HandlerKind::AvatarSticky {
            return true;
        }
        let deepest = contacts
            .iter()
            .max_by(|a, b| a.depth.total_cmp(&b.depth));
        if let (Some(owner), Some(c)) = (this.owner, deepest) {
            if let Ok(mut avatar) = ctx.objects.get::<&mut Avatar>(owner) {
                avatar.record_surface(SurfaceContact {
                    normal: c.normal,
                    point: c.pos,
                    depth: c.depth,
                    step: ctx.step,
                });
            }
        }
        true
    }
}

/// Marks a geometry as a surface the avatar can run on.
pub struct AvatarSticky;

impl CollisionHandler for AvatarSticky {
    fn kind(&self) -> HandlerKind {
        HandlerKind::AvatarSticky
    }

    fn handle(&mut self, _: &mut CollisionCtx, _: GeomInfo, _: GeomInfo, _: &[ContactGeom]) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run narrow-phase on one near pair and let both handlers react.
/// Returns the number of contact joints created.
pub fn dispatch_pair(
    physics: &mut PhysicsWorld,
    ctx: &mut CollisionCtx,
    g1: GeomHandle,
    g2: GeomHandle,
) -> Result<usize> {
    if !physics.geom_enabled(g1) || !physics.geom_enabled(g2) {
        return Ok(0);
    }
    let contacts = physics.collide(g1, g2);
    if contacts.is_empty() {
        return Ok(0);
    }
    let info1 = physics.geom_info(g1)?;
    let info2 = physics.geom_info(g2)?;
    let mirrored: Vec<ContactGeom> = contacts.iter().map(ContactGeom::mirrored).collect();

    let accept1 = physics.handler_mut(g1)?.handle(ctx, info1, info2, &contacts);
    let accept2 = physics.handler_mut(g2)?.handle(ctx, info2, info1, &mirrored);
    if !(accept1 && accept2) {
        return Ok(0);
    }
    for c in &contacts {
        physics.add_contact_joint(c)?;
    }
    Ok(contacts.len())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::{Quat, Vec3};

    use super::*;
    use crate::physics::{MassProps, Shape, SpaceKind};

    /// Records everything it is shown into a shared log and answers `accept`.
    struct Recorder {
        accept: bool,
        seen: Rc<RefCell<Vec<(GeomHandle, Vec<ContactGeom>)>>>,
    }

    impl CollisionHandler for Recorder {
        fn kind(&self) -> HandlerKind {
            HandlerKind::AlwaysAccept
        }

        fn handle(
            &mut self,
            _: &mut CollisionCtx,
            this: GeomInfo,
            _: GeomInfo,
            contacts: &[ContactGeom],
        ) -> bool {
            self.seen.borrow_mut().push((this.id, contacts.to_vec()));
            self.accept
        }
    }

    type Seen = Rc<RefCell<Vec<(GeomHandle, Vec<ContactGeom>)>>>;

    fn overlapping_pair(accept1: bool, accept2: bool) -> (PhysicsWorld, GeomHandle, GeomHandle, Seen) {
        let mut world = PhysicsWorld::default();
        let seen: Seen = Rc::default();
        let mut make = |pos: Vec3, accept: bool| {
            let b = world
                .create_body(MassProps::sphere(1.0, 1.0), pos, Quat::IDENTITY)
                .unwrap();
            let g = world
                .create_geom(
                    Shape::Sphere { radius: 1.0 },
                    SpaceKind::Dynamic,
                    None,
                    Box::new(Recorder {
                        accept,
                        seen: seen.clone(),
                    }),
                )
                .unwrap();
            world.set_geom_body(g, Some(b), Vec3::ZERO, Quat::IDENTITY).unwrap();
            g
        };
        let g1 = make(Vec3::ZERO, accept1);
        let g2 = make(Vec3::new(1.5, 0.2, 0.0), accept2);
        (world, g1, g2, seen)
    }

    #[test]
    fn joints_only_when_both_accept() {
        for (a1, a2, expect_joints) in [
            (true, true, true),
            (true, false, false),
            (false, true, false),
            (false, false, false),
        ] {
            let (mut world, g1, g2, seen) = overlapping_pair(a1, a2);
            let mut objects = hecs::World::new();
            let mut ctx = CollisionCtx {
                objects: &mut objects,
                step: 0,
            };
            let created = dispatch_pair(&mut world, &mut ctx, g1, g2).unwrap();
            assert_eq!(created > 0, expect_joints);
            assert_eq!(world.contact_joint_count(), created);
            // Both handlers observed the collision regardless of the outcome
            assert_eq!(seen.borrow().len(), 2);
        }
    }

    #[test]
    fn second_handler_sees_mirrored_contacts() {
        let (mut world, g1, g2, seen) = overlapping_pair(true, true);
        let mut objects = hecs::World::new();
        let mut ctx = CollisionCtx {
            objects: &mut objects,
            step: 3,
        };
        dispatch_pair(&mut world, &mut ctx, g1, g2).unwrap();

        let seen = seen.borrow();
        let (first_id, first) = &seen[0];
        let (second_id, second) = &seen[1];
        assert_eq!(*first_id, g1);
        assert_eq!(*second_id, g2);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second) {
            assert_eq!(b.normal, -a.normal);
            assert_eq!(b.pos, a.pos);
            assert_eq!(b.depth, a.depth);
            assert_eq!((b.g1, b.g2), (a.g2, a.g1));
            assert_eq!((b.side1, b.side2), (a.side2, a.side1));
        }
    }

    #[test]
    fn disabled_geometry_never_reaches_handlers() {
        let (mut world, g1, g2, seen) = overlapping_pair(true, true);
        world.set_geom_enabled(g2, false).unwrap();
        let mut objects = hecs::World::new();
        let mut ctx = CollisionCtx {
            objects: &mut objects,
            step: 0,
        };
        assert_eq!(dispatch_pair(&mut world, &mut ctx, g1, g2).unwrap(), 0);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn tracked_log_resets_on_new_step() {
        let mut log = TrackedCollisionLog::new();
        let mut objects = hecs::World::new();
        let (_world, id, _, _) = overlapping_pair(true, true);
        let info = GeomInfo {
            id,
            owner: None,
            kind: HandlerKind::AlwaysAccept,
        };

        for step in [7, 7, 8] {
            let mut ctx = CollisionCtx {
                objects: &mut objects,
                step,
            };
            assert!(log.handle(&mut ctx, info, info, &[]));
            if step == 7 {
                assert!(log.collisions().iter().all(|c| c.step == 7));
            }
        }
        assert_eq!(log.collisions().len(), 1);
        assert_eq!(log.collisions()[0].step, 8);
    }
}
