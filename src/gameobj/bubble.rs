use anyhow::Result;
use glam::{Mat3, Vec3};

use super::{GameObjects, Transform};
use crate::data::SkyDecl;

pub const BUBBLE_NAME: &str = "Bubble";

/// The atmosphere shell around an area. Drawn in the far pass only, no physics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bubble {
    pub radius: f32,
    pub color: [f32; 3],
}

/// Created from the area's sky parameters rather than from a scene object.
pub fn spawn(objects: &mut GameObjects, sky: &SkyDecl) -> Result<hecs::Entity> {
    let e = objects.spawn(BUBBLE_NAME, Transform::new(Vec3::ZERO, Mat3::IDENTITY))?;
    objects.insert(
        e,
        (Bubble {
            radius: sky.bubble_radius,
            color: sky.color,
        },),
    )?;
    Ok(e)
}
