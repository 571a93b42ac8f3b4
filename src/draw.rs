//! What the core hands to the renderer each frame.

use glam::{Mat3, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    pub name: String,
    pub mesh: String,
    pub pos: Vec3,
    pub rot: Mat3,
    pub scale: f32,
}

/// One frame's scene: a far pass (sky), a near pass (gameplay objects) and
/// 2D overlay text lines, top to bottom.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    pub clear_color: [f32; 3],
    pub camera: Option<Camera>,
    pub far: Vec<DrawItem>,
    pub near: Vec<DrawItem>,
    pub overlay: Vec<String>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.camera = None;
        self.far.clear();
        self.near.clear();
        self.overlay.clear();
    }

    pub fn text(&mut self, line: impl Into<String>) {
        self.overlay.push(line.into());
    }
}
