//! Mission progression: a declarative state graph loaded from scenario data,
//! with effects fired per state and conditions guarding each transition.

pub mod conditions;
pub mod effects;
pub mod fsm;

use anyhow::Result;
use glam::Vec3;

use crate::constants::MAX_FPS;
use crate::data::Params;
use crate::factory::Registry;

pub use self::conditions::Condition;
pub use self::effects::Effect;
pub use self::fsm::MissionFsm;

/// Gameplay state that conditions and effects may read, sampled once per step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MissionView {
    pub total_steps: u64,
    pub rings_passed: usize,
    pub rings_total: usize,
    pub avatar_pos: Option<Vec3>,
}

/// Mission-wide presentation state shared by every state's effects.
#[derive(Debug, Clone, Default)]
pub struct MissionHud {
    pub timer_start: Option<u64>,
}

impl MissionHud {
    /// Seconds on the mission timer, if it has been started.
    pub fn timer_seconds(&self, total_steps: u64) -> Option<f32> {
        self.timer_start
            .map(|start| total_steps.saturating_sub(start) as f32 / MAX_FPS as f32)
    }

    pub fn draw(&self, view: &MissionView, out: &mut Vec<String>) {
        if let Some(secs) = self.timer_seconds(view.total_steps) {
            out.push(format!("TIME: {secs:.2}"));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionOutcome {
    Win,
    Fail,
}

impl MissionOutcome {
    /// The reserved state name that ends a mission with this outcome.
    pub fn from_state_name(name: &str) -> Option<Self> {
        match name {
            "win" => Some(Self::Win),
            "fail" => Some(Self::Fail),
            _ => None,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Win => "Mission complete!",
            Self::Fail => "Mission failed",
        }
    }
}

pub type EffectCtor = fn(&Params) -> Result<Box<dyn Effect>>;
pub type ConditionCtor = fn(&Params) -> Result<Box<dyn Condition>>;

/// Constructors for effect and condition type tags.
pub struct MissionFactories {
    pub effects: Registry<EffectCtor>,
    pub conditions: Registry<ConditionCtor>,
}

impl MissionFactories {
    /// Registries holding every built-in effect and condition.
    pub fn new() -> Result<Self> {
        let mut effects: Registry<EffectCtor> = Registry::new("mission effect");
        effects.register("DisplayMessage", effects::display_message)?;
        effects.register("StartTimer", effects::start_timer)?;

        let mut conditions: Registry<ConditionCtor> = Registry::new("transition condition");
        conditions.register("RingsPassed", conditions::rings_passed)?;
        conditions.register("TimerCountdown", conditions::timer_countdown)?;
        conditions.register("AvatarMoves", conditions::avatar_moves)?;

        Ok(Self { effects, conditions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hud_timer_counts_from_start() {
        let mut hud = MissionHud::default();
        let view = MissionView {
            total_steps: 150,
            ..Default::default()
        };
        let mut out = Vec::new();
        hud.draw(&view, &mut out);
        assert!(out.is_empty());

        hud.timer_start = Some(60);
        hud.draw(&view, &mut out);
        assert_eq!(out, vec!["TIME: 1.50".to_owned()]);
    }

    #[test]
    fn reserved_names() {
        assert_eq!(MissionOutcome::from_state_name("win"), Some(MissionOutcome::Win));
        assert_eq!(MissionOutcome::from_state_name("fail"), Some(MissionOutcome::Fail));
        assert_eq!(MissionOutcome::from_state_name("start"), None);
    }
}
