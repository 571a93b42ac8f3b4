//! The player character: thrust and turn control, fly/run stance, and the
//! surface attachment state machine.

use anyhow::Result;
use glam::{Mat3, Quat, Vec3};

use super::binding::PhysicsBinding;
use super::{GameObjects, ObjectBuilder, StepCtx, Transform};
use crate::collision::AvatarAttachment;
use crate::constants::MAX_FPS;
use crate::data::ObjectDecl;
use crate::input::{Intent, IntentKind};
use crate::physics::{BodyHandle, MassProps, Shape, SpaceKind};

// ---- Control ----

/// Maximum force or torque per second applied by each maneuver.
const MAX_STRAFE: f32 = 5000.0;
const MAX_ACCEL: f32 = 15000.0;
const MAX_TURN: f32 = 1000.0;
const MAX_ROLL: f32 = 800.0;

/// Counter-turn and counter-roll coefficients, only active while the axis is released.
const CTURN_COEF: f32 = 700.0;
const CROLL_COEF: f32 = 700.0;

// ---- Body ----

const BODY_MASS: f32 = 80.0;
const BODY_RADIUS: f32 = 0.5;
/// Capsule geometry: a 2.0-long cylinder and two 0.25-radius caps, along local Z.
const CAPSULE_RADIUS: f32 = 0.25;
const CAPSULE_LENGTH: f32 = 2.0;

// ---- Stance ----

/// Steps taken by the fly <-> prerun stance change.
const STANCE_TRANSITION_STEPS: u32 = 12;

// ---- Attachment ----

/// Distance from the avatar's center to a running surface, along the surface normal.
/// Slightly under the capsule radius so a running avatar keeps touching the surface.
pub const RUN_HEIGHT: f32 = CAPSULE_RADIUS - 0.02;
/// A surface contact older than this many steps is forgotten.
const CONTACT_MEMORY_STEPS: u64 = 3;

/// Smoothing of one attachment axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisTuning {
    /// Fraction of the remaining delta corrected per step.
    pub rate: f32,
    /// Largest correction applied in a single step.
    pub max_step: f32,
    /// Deltas at or below this count as settled.
    pub threshold: f32,
}

const fn axis(rate: f32, max_step: f32, threshold: f32) -> AxisTuning {
    AxisTuning {
        rate,
        max_step,
        threshold,
    }
}

/// Order: X rotation, Z rotation, Y position, X angular velocity,
/// Z angular velocity, Y linear velocity.
pub const ATTACH_AXES: [AxisTuning; 6] = [
    axis(0.2, 0.05, 0.05),
    axis(0.2, 0.05, 0.05),
    axis(0.2, 0.05, 0.05),
    axis(0.3, 0.5, 0.2),
    axis(0.3, 0.5, 0.2),
    axis(0.3, 0.5, 0.3),
];

/// A running-surface contact reported by the avatar's collision handler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceContact {
    /// Surface normal, pointing from the surface towards the avatar.
    pub normal: Vec3,
    pub point: Vec3,
    pub depth: f32,
    pub step: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Detached,
    Attached,
}

/// How far the avatar is from resting on a surface, per attachment axis,
/// in the avatar's own frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceDeltas(pub [f32; 6]);

impl SurfaceDeltas {
    pub fn measure(pos: Vec3, rot: Quat, lin_vel: Vec3, ang_vel: Vec3, contact: &SurfaceContact) -> Self {
        let inv = rot.inverse();
        let n = inv * contact.normal;
        let height = (pos - contact.point).dot(contact.normal);
        let w = inv * ang_vel;
        let v = inv * lin_vel;
        Self([
            n.z.atan2(n.y),
            (-n.x).atan2(n.y),
            RUN_HEIGHT - height,
            -w.x,
            -w.z,
            -v.y,
        ])
    }

    /// Correction to apply this step on each axis.
    pub fn corrections(&self) -> [f32; 6] {
        let mut out = [0.0; 6];
        for (i, (d, t)) in self.0.iter().zip(ATTACH_AXES.iter()).enumerate() {
            out[i] = (d * t.rate).clamp(-t.max_step, t.max_step);
        }
        out
    }

    pub fn settled(&self) -> bool {
        self.0
            .iter()
            .zip(ATTACH_AXES.iter())
            .all(|(d, t)| d.abs() <= t.threshold)
    }
}

/// Attachment after one step. Attaching needs a settled surface; an attached
/// avatar stays attached across unsettled steps (seams) until contact is lost.
pub fn next_attachment(state: Attachment, deltas: Option<&SurfaceDeltas>) -> Attachment {
    match deltas {
        None => Attachment::Detached,
        Some(d) if d.settled() => Attachment::Attached,
        Some(_) => state,
    }
}

// ---- Component ----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stance {
    Fly,
    FlyToPrerun,
    Prerun,
    PrerunToFly,
}

#[derive(Debug, Clone)]
pub struct Avatar {
    stance: Stance,
    /// Progress of the current stance change, 0..=STANCE_TRANSITION_STEPS.
    stance_progress: u32,
    attachment: Attachment,
    surface: Option<SurfaceContact>,
    /// Last applied thrust and torques, in the avatar's frame, for drawing.
    pub thrust: Vec3,
    pub torque: Vec3,
    pub counter_torque: Vec3,
}

impl Default for Avatar {
    fn default() -> Self {
        Self {
            stance: Stance::Fly,
            stance_progress: 0,
            attachment: Attachment::Detached,
            surface: None,
            thrust: Vec3::ZERO,
            torque: Vec3::ZERO,
            counter_torque: Vec3::ZERO,
        }
    }
}

impl Avatar {
    pub fn stance(&self) -> Stance {
        self.stance
    }

    pub fn attachment(&self) -> Attachment {
        self.attachment
    }

    pub fn record_surface(&mut self, contact: SurfaceContact) {
        // Keep the deepest contact of a step.
        match self.surface {
            Some(old) if old.step == contact.step && old.depth >= contact.depth => {}
            _ => self.surface = Some(contact),
        }
    }

    /// Stance change driven by the run-stance channel. Prerun is not left
    /// until the channel is entirely off.
    fn update_stance(&mut self, intent: &Intent) {
        let hold = intent.is_on(IntentKind::RunStance)
            || (matches!(self.stance, Stance::FlyToPrerun | Stance::Prerun)
                && intent.is_partially_on(IntentKind::RunStance));
        let done = self.stance_progress >= STANCE_TRANSITION_STEPS;

        self.stance = match (hold, self.stance) {
            (true, Stance::Fly) => {
                self.stance_progress = 0;
                Stance::FlyToPrerun
            }
            (true, Stance::PrerunToFly) => {
                // Reverse in place
                self.stance_progress = STANCE_TRANSITION_STEPS - self.stance_progress;
                Stance::FlyToPrerun
            }
            (true, Stance::FlyToPrerun) if done => Stance::Prerun,
            (false, Stance::Prerun) => {
                self.stance_progress = 0;
                Stance::PrerunToFly
            }
            (false, Stance::FlyToPrerun) => {
                self.stance_progress = STANCE_TRANSITION_STEPS - self.stance_progress;
                Stance::PrerunToFly
            }
            (false, Stance::PrerunToFly) if done => Stance::Fly,
            (_, s) => s,
        };
        if matches!(self.stance, Stance::FlyToPrerun | Stance::PrerunToFly) {
            self.stance_progress = (self.stance_progress + 1).min(STANCE_TRANSITION_STEPS);
        }
    }

    /// Current surface contact, if fresh and the stance allows running.
    fn usable_surface(&self, step: u64) -> Option<SurfaceContact> {
        if self.stance == Stance::Fly {
            return None;
        }
        self.surface
            .filter(|s| step.saturating_sub(s.step) <= CONTACT_MEMORY_STEPS)
    }
}

// ---- Construction ----

pub fn build(objects: &mut GameObjects, b: &mut ObjectBuilder, decl: &ObjectDecl) -> Result<hecs::Entity> {
    let pos = decl.position();
    let rot = decl.rotation();
    let e = objects.spawn(&decl.name, Transform::new(pos, rot))?;

    let mut binding = PhysicsBinding::new(e);
    binding.set_body(b.physics, MassProps::sphere(BODY_MASS, BODY_RADIUS), pos, rot)?;
    binding.set_geom(
        b.physics,
        "body",
        Shape::Capsule {
            radius: CAPSULE_RADIUS,
            length: CAPSULE_LENGTH,
        },
        SpaceKind::Dynamic,
        Box::new(AvatarAttachment),
        None,
        pos,
        rot,
    )?;
    objects.insert(e, (binding, Avatar::default()))?;
    Ok(e)
}

// ---- Per-step behavior ----

pub fn step(avatar: &mut Avatar, body: BodyHandle, ctx: &mut StepCtx) -> Result<()> {
    let intent = ctx.intent;
    let per_step = 1.0 / MAX_FPS as f32;
    let physics = &mut *ctx.physics;

    // Thrust
    let thrust = Vec3::new(
        -intent.value(IntentKind::TransX) * MAX_STRAFE * per_step,
        -intent.value(IntentKind::TransY) * MAX_STRAFE * per_step,
        intent.value(IntentKind::TransZ) * MAX_ACCEL * per_step,
    );
    if thrust != Vec3::ZERO {
        physics.add_rel_force(body, thrust)?;
    }
    avatar.thrust = thrust;

    // Turn, or counter-turn when released
    let avel = match physics.body(body) {
        Some(b) => b.vector_from_world(b.ang_vel()),
        None => Vec3::ZERO,
    };
    let mut torque = Vec3::ZERO;
    let mut counter = Vec3::ZERO;
    let controls = [
        (IntentKind::RotateX, 0, MAX_TURN, CTURN_COEF),
        (IntentKind::RotateY, 1, -MAX_TURN, CTURN_COEF),
        (IntentKind::RotateZ, 2, MAX_ROLL, CROLL_COEF),
    ];
    for (kind, i, max, coef) in controls {
        let v = intent.value(kind);
        if v != 0.0 {
            torque[i] = v * max * per_step;
        } else {
            counter[i] = -avel[i] * coef * per_step;
        }
    }
    physics.add_rel_torque(body, torque + counter)?;
    avatar.torque = torque;
    avatar.counter_torque = counter;

    avatar.update_stance(intent);
    attach_step(avatar, body, ctx)
}

fn attach_step(avatar: &mut Avatar, body: BodyHandle, ctx: &mut StepCtx) -> Result<()> {
    let surface = avatar.usable_surface(ctx.step);
    let Some(b) = ctx.physics.body(body) else {
        return Ok(());
    };
    let (pos, rot, lin_vel, ang_vel) = (b.pos(), b.quat(), b.lin_vel(), b.ang_vel());
    let deltas = surface.map(|s| SurfaceDeltas::measure(pos, rot, lin_vel, ang_vel, &s));

    let next = next_attachment(avatar.attachment, deltas.as_ref());
    if next != avatar.attachment {
        log::debug!("Avatar {:?} -> {:?} at step {}", avatar.attachment, next, ctx.step);
        avatar.attachment = next;
    }
    if surface.is_none() {
        avatar.surface = None;
    }

    if let (Some(d), Some(s)) = (deltas, surface) {
        let c = d.corrections();
        let new_rot = rot * Quat::from_rotation_x(c[0]) * Quat::from_rotation_z(c[1]);
        let local_w = rot.inverse() * ang_vel + Vec3::new(c[3], 0.0, c[4]);
        let local_v = rot.inverse() * lin_vel + Vec3::new(0.0, c[5], 0.0);

        let physics = &mut *ctx.physics;
        physics.set_body_rot(body, new_rot)?;
        physics.set_body_pos(body, pos + s.normal * c[2])?;
        physics.set_body_ang_vel(body, rot * local_w)?;
        physics.set_body_lin_vel(body, rot * local_v)?;
    }
    Ok(())
}

/// Camera eye, target and up, relative to the avatar's frame.
pub const CAMERA_POS_OFFSET: Vec3 = Vec3::new(0.0, 1.1, -7.0);
pub const CAMERA_TGT_OFFSET: Vec3 = Vec3::new(0.0, 1.1, 0.0);
pub const CAMERA_UP_VECTOR: Vec3 = Vec3::new(0.0, 1.0, 0.0);

/// Chase camera for an avatar at `t`: (eye, target, up).
pub fn camera(t: &Transform) -> (Vec3, Vec3, Vec3) {
    let rot: Mat3 = t.rot;
    (
        t.pos + rot * CAMERA_POS_OFFSET,
        t.pos + rot * CAMERA_TGT_OFFSET,
        rot * CAMERA_UP_VECTOR,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tilted_surface_deltas() -> SurfaceDeltas {
        // Avatar hovering a bit high over a floor tilted 20 degrees, sinking and spinning
        let normal = Quat::from_rotation_x(20f32.to_radians()) * Vec3::Y;
        let contact = SurfaceContact {
            normal,
            point: Vec3::ZERO,
            depth: 0.01,
            step: 0,
        };
        SurfaceDeltas::measure(
            normal * 0.6,
            Quat::IDENTITY,
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(0.8, 0.0, -0.5),
            &contact,
        )
    }

    #[test]
    fn measures_tilt_height_and_motion() {
        let d = tilted_surface_deltas();
        assert!((d.0[0] - 20f32.to_radians()).abs() < 1e-4);
        assert!(d.0[1].abs() < 1e-5);
        assert!((d.0[2] - (RUN_HEIGHT - 0.6)).abs() < 1e-5);
        assert_eq!(d.0[3], -0.8);
        assert_eq!(d.0[4], 0.5);
        assert_eq!(d.0[5], 1.0);
        assert!(!d.settled());
    }

    #[test]
    fn corrections_are_clamped_per_axis() {
        let d = SurfaceDeltas([1.0, -1.0, 0.1, 10.0, 0.0, -0.5]);
        let c = d.corrections();
        assert_eq!(c[0], 0.05);
        assert_eq!(c[1], -0.05);
        assert!((c[2] - 0.02).abs() < 1e-6);
        assert_eq!(c[3], 0.5);
        assert_eq!(c[4], 0.0);
        assert!((c[5] + 0.15).abs() < 1e-6);
    }

    #[test]
    fn attaches_only_after_deltas_settle() {
        let mut d = tilted_surface_deltas();
        let mut state = next_attachment(Attachment::Detached, Some(&d));
        assert_eq!(state, Attachment::Detached, "first contact must not snap");

        let mut steps = 0;
        while state == Attachment::Detached {
            let c = d.corrections();
            for (v, k) in d.0.iter_mut().zip(c) {
                *v -= k;
            }
            state = next_attachment(state, Some(&d));
            assert_eq!(state == Attachment::Attached, d.settled());
            steps += 1;
            assert!(steps < 1000);
        }
        assert!(steps > 1);

        // A seam wobble keeps the attachment, losing the surface drops it
        let wobble = SurfaceDeltas([0.3, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(next_attachment(state, Some(&wobble)), Attachment::Attached);
        assert_eq!(next_attachment(state, None), Attachment::Detached);
    }

    #[test]
    fn stance_cycles_through_transitions() {
        let mut avatar = Avatar::default();
        let mut intent = Intent::default();
        intent.set(IntentKind::RunStance, 1.0);
        avatar.update_stance(&intent);
        assert_eq!(avatar.stance(), Stance::FlyToPrerun);
        for _ in 0..STANCE_TRANSITION_STEPS {
            avatar.update_stance(&intent);
        }
        assert_eq!(avatar.stance(), Stance::Prerun);

        // Partially released: stays in prerun
        intent.set(IntentKind::RunStance, 0.2);
        avatar.update_stance(&intent);
        assert_eq!(avatar.stance(), Stance::Prerun);

        intent.set(IntentKind::RunStance, 0.0);
        avatar.update_stance(&intent);
        assert_eq!(avatar.stance(), Stance::PrerunToFly);
        for _ in 0..STANCE_TRANSITION_STEPS {
            avatar.update_stance(&intent);
        }
        assert_eq!(avatar.stance(), Stance::Fly);
    }

    #[test]
    fn flying_avatar_ignores_surfaces() {
        let mut avatar = Avatar::default();
        avatar.record_surface(SurfaceContact {
            normal: Vec3::Y,
            point: Vec3::ZERO,
            depth: 0.0,
            step: 5,
        });
        assert!(avatar.usable_surface(5).is_none());
        avatar.stance = Stance::Prerun;
        assert!(avatar.usable_surface(5).is_some());
        assert!(avatar.usable_surface(5 + CONTACT_MEMORY_STEPS + 1).is_none());
    }

    #[test]
    fn strafe_keys_thrust_the_way_they_read() {
        use crate::constants::STEP_SECONDS;
        use crate::input::{FrameEvent, InputState, IntentBindings};
        use crate::physics::PhysicsWorld;
        use winit::keyboard::KeyCode;

        let mut physics = PhysicsWorld::default();
        let body = physics
            .create_body(MassProps::sphere(BODY_MASS, BODY_RADIUS), Vec3::ZERO, Quat::IDENTITY)
            .unwrap();

        // R rises, W pushes forward
        let mut input = InputState::new();
        input.sample(&[
            FrameEvent::Key { code: KeyCode::KeyR, pressed: true, repeat: false },
            FrameEvent::Key { code: KeyCode::KeyW, pressed: true, repeat: false },
        ]);
        let intent = IntentBindings::default().sample(&input);
        assert_eq!(intent.value(IntentKind::TransY), -1.0);

        let mut avatar = Avatar::default();
        let mut ctx = StepCtx {
            physics: &mut physics,
            step: 0,
            intent: &intent,
        };
        step(&mut avatar, body, &mut ctx).unwrap();
        assert!(avatar.thrust.y > 0.0, "{:?}", avatar.thrust);
        assert!(avatar.thrust.z > 0.0);
        assert_eq!(avatar.thrust.x, 0.0);

        physics.quick_step(STEP_SECONDS);
        let v = physics.body(body).unwrap().lin_vel();
        assert!(v.y > 0.0 && v.z > 0.0, "{v:?}");

        // Positive channel values push along the negative X and Y axes
        let mut intent = Intent::default();
        intent.set(IntentKind::TransX, 1.0);
        intent.set(IntentKind::TransY, 1.0);
        let mut ctx = StepCtx {
            physics: &mut physics,
            step: 1,
            intent: &intent,
        };
        step(&mut avatar, body, &mut ctx).unwrap();
        assert!(avatar.thrust.x < 0.0 && avatar.thrust.y < 0.0);
    }

    #[test]
    fn camera_sits_behind_and_above() {
        let t = Transform::new(Vec3::new(1.0, 2.0, 3.0), Mat3::IDENTITY);
        let (eye, target, up) = camera(&t);
        assert!((eye - Vec3::new(1.0, 3.1, -4.0)).length() < 1e-5);
        assert!((target - Vec3::new(1.0, 3.1, 3.0)).length() < 1e-5);
        assert_eq!(up, Vec3::Y);
    }
}
