//! Transition conditions. Each instance belongs to one transition of one
//! activation of a state, and starts measuring on its first evaluation.

use anyhow::{Context, Result};
use glam::Vec3;

use super::MissionView;
use crate::constants::MAX_FPS;
use crate::data::Params;

const AVATAR_MOVES_DISTANCE: f32 = 1.5;

pub trait Condition {
    fn is_true(&mut self, view: &MissionView) -> Result<bool>;

    /// Overlay text, for conditions declared with `display`.
    fn draw(&self, _view: &MissionView, _out: &mut Vec<String>) {}
}

// ---- RingsPassed ----

pub struct RingsPassed {
    rings: usize,
}

impl Condition for RingsPassed {
    fn is_true(&mut self, view: &MissionView) -> Result<bool> {
        Ok(view.rings_passed >= self.rings)
    }
}

pub fn rings_passed(params: &Params) -> Result<Box<dyn Condition>> {
    Ok(Box::new(RingsPassed {
        rings: params.u32("rings")? as usize,
    }))
}

// ---- TimerCountdown ----

/// True once more than `seconds` have passed since the first evaluation.
pub struct TimerCountdown {
    seconds: f32,
    display: bool,
    started_at: Option<u64>,
}

impl TimerCountdown {
    fn elapsed(&self, total_steps: u64) -> Option<f32> {
        self.started_at
            .map(|start| total_steps.saturating_sub(start) as f32 / MAX_FPS as f32)
    }
}

impl Condition for TimerCountdown {
    fn is_true(&mut self, view: &MissionView) -> Result<bool> {
        self.started_at.get_or_insert(view.total_steps);
        Ok(self.elapsed(view.total_steps).is_some_and(|e| e > self.seconds))
    }

    fn draw(&self, view: &MissionView, out: &mut Vec<String>) {
        if !self.display {
            return;
        }
        if let Some(e) = self.elapsed(view.total_steps) {
            out.push(format!("{:.1}", (self.seconds - e).max(0.0)));
        }
    }
}

pub fn timer_countdown(params: &Params) -> Result<Box<dyn Condition>> {
    Ok(Box::new(TimerCountdown {
        seconds: params.f32("seconds")?,
        display: params.bool_or("display", false)?,
        started_at: None,
    }))
}

// ---- AvatarMoves ----

/// True once the avatar is more than `distance` from where it was at the
/// first evaluation.
pub struct AvatarMoves {
    distance: f32,
    origin: Option<Vec3>,
}

impl Condition for AvatarMoves {
    fn is_true(&mut self, view: &MissionView) -> Result<bool> {
        let pos = view.avatar_pos.context("No avatar in the current area")?;
        let origin = *self.origin.get_or_insert(pos);
        Ok(pos.distance(origin) > self.distance)
    }
}

pub fn avatar_moves(params: &Params) -> Result<Box<dyn Condition>> {
    Ok(Box::new(AvatarMoves {
        distance: params.f32_or("distance", AVATAR_MOVES_DISTANCE)?,
        origin: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(json: &str) -> Params {
        serde_json::from_str(json).unwrap()
    }

    fn at_step(total_steps: u64) -> MissionView {
        MissionView {
            total_steps,
            ..Default::default()
        }
    }

    #[test]
    fn timer_measures_from_first_evaluation() {
        let mut c = timer_countdown(&params(r#"{"seconds": 1.0, "display": true}"#)).unwrap();
        let mut out = Vec::new();
        c.draw(&at_step(0), &mut out);
        assert!(out.is_empty(), "nothing to show before the first evaluation");

        assert!(!c.is_true(&at_step(500)).unwrap());
        assert!(!c.is_true(&at_step(560)).unwrap());
        // Exactly one second is not more than one second
        assert!(!c.is_true(&at_step(560)).unwrap());
        assert!(c.is_true(&at_step(561)).unwrap());

        c.draw(&at_step(530), &mut out);
        assert_eq!(out, vec!["0.5".to_owned()]);
    }

    #[test]
    fn avatar_moves_uses_first_position_as_origin() {
        let mut c = avatar_moves(&Params::default()).unwrap();
        let view = |x: f32| MissionView {
            avatar_pos: Some(Vec3::new(x, 0.0, 0.0)),
            ..Default::default()
        };
        assert!(!c.is_true(&view(10.0)).unwrap());
        assert!(!c.is_true(&view(11.5)).unwrap());
        assert!(c.is_true(&view(11.6)).unwrap());
        assert!(c.is_true(&MissionView::default()).is_err());
    }

    #[test]
    fn rings_passed_counts() {
        let mut c = rings_passed(&params(r#"{"rings": 2}"#)).unwrap();
        let view = |n| MissionView {
            rings_passed: n,
            rings_total: 3,
            ..Default::default()
        };
        assert!(!c.is_true(&view(1)).unwrap());
        assert!(c.is_true(&view(2)).unwrap());
        assert!(rings_passed(&Params::default()).is_err());
    }
}
