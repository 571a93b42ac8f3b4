use std::f32::consts::{PI, TAU};

use anyhow::Result;
use glam::{Quat, Vec3};

use super::binding::{GeomOffset, PhysicsBinding};
use super::{GameObjects, ObjectBuilder, StepCtx, Transform};
use crate::collision::{CheckFace, TrackedCollisionLog};
use crate::data::ObjectDecl;
use crate::physics::{Shape, SpaceKind};

/// Radius of the ring's centerline.
const RING_RADIUS: f32 = 2.0;
/// The rim is approximated by this many capsules.
const RIM_SEGMENTS: usize = 8;
const RIM_THICKNESS: f32 = 0.25;
/// Check faces: thin boxes spanning the opening, in front of and behind the rim.
const FACE_HALF: Vec3 = Vec3::new(1.5, 1.5, 0.05);
const FACE_OFFSET: f32 = 0.3;

/// A gate the avatar has to fly through. Passed once the avatar has
/// touched both check faces.
#[derive(Debug, Clone, Default)]
pub struct TargetRing {
    faces_hit: [Option<u64>; 2],
    reported: bool,
    /// Steps in which something bumped into the rim.
    pub rim_bumps: u32,
}

impl TargetRing {
    pub fn mark_face(&mut self, face: usize, step: u64) {
        if let Some(slot) = self.faces_hit.get_mut(face) {
            slot.get_or_insert(step);
        }
    }

    pub fn is_passed(&self) -> bool {
        self.faces_hit.iter().all(Option::is_some)
    }

    pub fn step(&mut self, name: &str, binding: &PhysicsBinding, ctx: &StepCtx) {
        let bumped = binding
            .geoms()
            .filter(|(geom_name, _)| geom_name.starts_with("rim"))
            .filter_map(|(_, g)| ctx.physics.handler(g))
            .any(|h| h.collisions().iter().any(|c| c.step == ctx.step));
        if bumped {
            self.rim_bumps += 1;
        }
        if self.is_passed() && !self.reported {
            self.reported = true;
            log::debug!(
                "Ring {name} passed at step {} after {} rim bumps",
                ctx.step,
                self.rim_bumps
            );
        }
    }
}

pub fn build(objects: &mut GameObjects, b: &mut ObjectBuilder, decl: &ObjectDecl) -> Result<hecs::Entity> {
    let pos = decl.position();
    let rot = decl.rotation();
    let e = objects.spawn(&decl.name, Transform::new(pos, rot))?;

    let mut binding = PhysicsBinding::new(e);
    let chord = 2.0 * RING_RADIUS * (PI / RIM_SEGMENTS as f32).sin();
    for i in 0..RIM_SEGMENTS {
        let ang = (i as f32 + 0.5) * TAU / RIM_SEGMENTS as f32;
        let center = Vec3::new(ang.cos(), ang.sin(), 0.0) * RING_RADIUS;
        let tangent = Vec3::new(-ang.sin(), ang.cos(), 0.0);
        binding.set_geom(
            b.physics,
            &format!("rim{i}"),
            Shape::Capsule {
                radius: RIM_THICKNESS,
                length: chord,
            },
            SpaceKind::Static,
            Box::new(TrackedCollisionLog::new()),
            Some(GeomOffset {
                pos: center,
                rot: Quat::from_rotation_arc(Vec3::Z, tangent),
            }),
            pos,
            rot,
        )?;
    }
    for (face, z) in [(0usize, -FACE_OFFSET), (1, FACE_OFFSET)] {
        binding.set_geom(
            b.physics,
            &format!("face{}", face + 1),
            Shape::Box { half: FACE_HALF },
            SpaceKind::Static,
            Box::new(CheckFace { face }),
            Some(GeomOffset::at(Vec3::new(0.0, 0.0, z))),
            pos,
            rot,
        )?;
    }
    objects.insert(e, (binding, TargetRing::default()))?;
    Ok(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passed_needs_both_faces() {
        let mut ring = TargetRing::default();
        assert!(!ring.is_passed());
        ring.mark_face(1, 10);
        assert!(!ring.is_passed());
        ring.mark_face(1, 11);
        ring.mark_face(0, 12);
        assert!(ring.is_passed());
        assert_eq!(ring.faces_hit, [Some(12), Some(10)]);
        // Out of range faces are ignored
        ring.mark_face(5, 13);
    }
}
