//! Engine-wide tuning constants.

/// Maximum frames per second, and the number of simulated steps per second.
pub const MAX_FPS: u32 = 60;
/// Duration of one simulation step in clock ticks (milliseconds).
pub const FIXED_STEP_MS: u64 = 1000 / MAX_FPS as u64;
/// Duration of one simulation step in seconds. Physics always advances by this.
pub const STEP_SECONDS: f32 = 1.0 / MAX_FPS as f32;

/// Default damping coefficients for linear and angular velocity on new game objects.
pub const DEFAULT_VEL_DAMP_COEF: f32 = 0.15;
pub const DEFAULT_ANG_DAMP_COEF: f32 = 0.15;

/// Maximum number of contact points generated for one geometry pair.
pub const MAX_CONTACTS: usize = 16;
/// Restitution of every contact joint.
pub const CONTACT_BOUNCE: f32 = 0.5;
/// Minimum approach speed before restitution kicks in.
pub const CONTACT_BOUNCE_VEL: f32 = 0.1;
/// Coulomb friction coefficient of every contact joint.
pub const CONTACT_MU: f32 = 5000.0;
/// Sequential impulse iterations per step.
pub const SOLVER_ITERATIONS: usize = 10;

/// Default window size when not running fullscreen.
pub const SCREEN_WIDTH: u32 = 800;
pub const SCREEN_HEIGHT: u32 = 600;

/// Default scenario data file.
pub const DEFAULT_DATA_PATH: &str = "data/orbit.json";

/// Allocation budgets of the physics world.
pub const MAX_BODIES: usize = 1024;
pub const MAX_GEOMS: usize = 4096;
/// Capacity of the per-step contact joint group.
pub const MAX_CONTACT_JOINTS: usize = 4096;
/// Broad-phase grid cell edge length, in meters.
pub const BROADPHASE_CELL_SIZE: f32 = 4.0;
pub const BROADPHASE_TABLE_SIZE: usize = 1024;
