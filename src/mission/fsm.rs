use anyhow::{Context, Result};

use super::{Condition, Effect, MissionFactories, MissionHud, MissionOutcome, MissionView};
use crate::data::{MissionDecl, StateDecl, TransitionDecl};

struct Transition {
    target: String,
    conditions: Vec<Box<dyn Condition>>,
}

impl Transition {
    fn build(decl: &TransitionDecl, factories: &MissionFactories) -> Result<Self> {
        let conditions = decl
            .conditions
            .iter()
            .map(|c| (factories.conditions.get(&c.kind)?)(&c.params))
            .collect::<Result<_>>()?;
        Ok(Self {
            target: decl.target.clone(),
            conditions,
        })
    }

    /// All conditions hold. Stops at the first false one.
    fn conditions_true(&mut self, view: &MissionView) -> Result<bool> {
        for c in &mut self.conditions {
            if !c.is_true(view)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// One activation of a declared state. Built fresh on every entry, so
/// conditions always start measuring anew.
struct MissionState {
    name: String,
    effects: Vec<Box<dyn Effect>>,
    transitions: Vec<Transition>,
}

impl MissionState {
    fn build(decl: &StateDecl, factories: &MissionFactories) -> Result<Self> {
        let effects = decl
            .effects
            .iter()
            .map(|e| (factories.effects.get(&e.kind)?)(&e.params))
            .collect::<Result<_>>()?;
        let transitions = decl
            .transitions
            .iter()
            .map(|t| Transition::build(t, factories))
            .collect::<Result<_>>()?;
        Ok(Self {
            name: decl.name.clone(),
            effects,
            transitions,
        })
    }

    /// Target of the first transition, in declaration order, whose conditions all hold.
    fn get_transition(&mut self, view: &MissionView) -> Result<Option<String>> {
        for t in &mut self.transitions {
            if t.conditions_true(view)? {
                return Ok(Some(t.target.clone()));
            }
        }
        Ok(None)
    }
}

enum Current {
    NotStarted,
    Active(MissionState),
    Finished(MissionOutcome),
}

/// Drives one mission from its "start" state to "win" or "fail".
pub struct MissionFsm {
    mission: MissionDecl,
    factories: MissionFactories,
    current: Current,
    hud: MissionHud,
    started_at: Option<u64>,
    finished_at: Option<u64>,
}

impl MissionFsm {
    pub fn new(mission: MissionDecl, factories: MissionFactories) -> Self {
        Self {
            mission,
            factories,
            current: Current::NotStarted,
            hud: MissionHud::default(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.mission.name
    }

    /// Name of the active state: a declared state, "win" or "fail".
    /// `None` before the first step or draw.
    pub fn current_state(&self) -> Option<&str> {
        match &self.current {
            Current::NotStarted => None,
            Current::Active(state) => Some(&state.name),
            Current::Finished(MissionOutcome::Win) => Some("win"),
            Current::Finished(MissionOutcome::Fail) => Some("fail"),
        }
    }

    pub fn outcome(&self) -> Option<MissionOutcome> {
        match self.current {
            Current::Finished(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.outcome().is_some()
    }

    pub fn hud(&self) -> &MissionHud {
        &self.hud
    }

    /// Seconds from entering "start" until the mission ended, or until `view` if still running.
    pub fn elapsed_seconds(&self, view: &MissionView) -> f32 {
        let start = self.hud.timer_start.or(self.started_at).unwrap_or(view.total_steps);
        let end = self.finished_at.unwrap_or(view.total_steps);
        end.saturating_sub(start) as f32 / crate::constants::MAX_FPS as f32
    }

    fn transition_to(&mut self, name: &str, view: &MissionView) -> Result<()> {
        if let Current::Active(state) = &mut self.current {
            for e in &mut state.effects {
                e.exiting_state(view, &mut self.hud);
            }
        }

        if let Some(outcome) = MissionOutcome::from_state_name(name) {
            log::info!(
                "Mission \"{}\" ended: {} at step {}",
                self.mission.name,
                outcome.message(),
                view.total_steps
            );
            self.current = Current::Finished(outcome);
            self.finished_at = Some(view.total_steps);
            return Ok(());
        }

        let decl = self
            .mission
            .state(name)
            .with_context(|| format!("Unable to transition to state \"{name}\""))?;
        let mut state = MissionState::build(decl, &self.factories)
            .with_context(|| format!("Invalid mission state \"{name}\""))?;
        for e in &mut state.effects {
            e.entering_state(view, &mut self.hud);
        }
        log::debug!(
            "Mission \"{}\" entered state \"{}\" at step {}",
            self.mission.name,
            name,
            view.total_steps
        );
        self.started_at.get_or_insert(view.total_steps);
        self.current = Current::Active(state);
        Ok(())
    }

    fn ensure_started(&mut self, view: &MissionView) -> Result<()> {
        if matches!(self.current, Current::NotStarted) {
            self.transition_to("start", view)?;
        }
        Ok(())
    }

    /// Run the active state's effects, then take at most one transition.
    /// Returns the outcome on the step the mission ends.
    pub fn step(&mut self, view: &MissionView) -> Result<Option<MissionOutcome>> {
        self.ensure_started(view)?;
        let Current::Active(state) = &mut self.current else {
            return Ok(None);
        };
        for e in &mut state.effects {
            e.step(view, &mut self.hud);
        }
        if let Some(target) = state.get_transition(view)? {
            self.transition_to(&target, view)?;
            return Ok(self.outcome());
        }
        Ok(None)
    }

    pub fn draw(&mut self, view: &MissionView, out: &mut Vec<String>) -> Result<()> {
        self.ensure_started(view)?;
        if let Current::Active(state) = &self.current {
            for e in &state.effects {
                e.draw(view, out);
            }
            for t in &state.transitions {
                for c in &t.conditions {
                    c.draw(view, out);
                }
            }
        }
        self.hud.draw(view, out);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::data::{Params, ScenarioData};

    fn mission(states: &str) -> MissionDecl {
        let json = format!(
            r#"{{"areas": [{{"name": "A", "missions": [{{"name": "M", "states": {states}}}]}}]}}"#
        );
        let data = ScenarioData::parse(&json).unwrap();
        data.mission(1, 1).unwrap().1.clone()
    }

    fn view(total_steps: u64, rings_passed: usize) -> MissionView {
        MissionView {
            total_steps,
            rings_passed,
            rings_total: 3,
            avatar_pos: None,
        }
    }

    #[test]
    fn two_rings_win_exactly_when_second_ring_passes() {
        let decl = mission(
            r#"[{"name": "start", "transitions": [
                {"target": "win", "conditions": [{"type": "RingsPassed", "rings": 2}]}
            ]}]"#,
        );
        let mut fsm = MissionFsm::new(decl, MissionFactories::new().unwrap());
        assert_eq!(fsm.current_state(), None);

        for (step, rings) in [(0, 0), (1, 0), (2, 1), (3, 1)] {
            assert_eq!(fsm.step(&view(step, rings)).unwrap(), None);
            assert_eq!(fsm.current_state(), Some("start"));
        }
        assert_eq!(fsm.step(&view(4, 2)).unwrap(), Some(MissionOutcome::Win));
        assert_eq!(fsm.current_state(), Some("win"));
        assert!(fsm.is_finished());
        assert_eq!(fsm.step(&view(5, 2)).unwrap(), None);
        assert_eq!(fsm.outcome(), Some(MissionOutcome::Win));
        assert!((fsm.elapsed_seconds(&view(100, 2)) - 4.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn first_declared_transition_wins() {
        let decl = mission(
            r#"[
                {"name": "start", "transitions": [
                    {"target": "second", "conditions": [{"type": "RingsPassed", "rings": 1}]},
                    {"target": "fail", "conditions": [{"type": "RingsPassed", "rings": 0}]}
                ]},
                {"name": "second"}
            ]"#,
        );
        let mut fsm = MissionFsm::new(decl, MissionFactories::new().unwrap());
        fsm.step(&view(0, 1)).unwrap();
        assert_eq!(fsm.current_state(), Some("second"));
        // No transitions: stays put
        fsm.step(&view(1, 3)).unwrap();
        assert_eq!(fsm.current_state(), Some("second"));
    }

    thread_local! {
        static EVALUATIONS: Cell<u32> = const { Cell::new(0) };
    }

    struct Counting;

    impl Condition for Counting {
        fn is_true(&mut self, _view: &MissionView) -> Result<bool> {
            EVALUATIONS.with(|n| n.set(n.get() + 1));
            Ok(true)
        }
    }

    fn counting(_: &Params) -> Result<Box<dyn Condition>> {
        Ok(Box::new(Counting))
    }

    #[test]
    fn terminal_states_stop_all_evaluation() {
        let decl = mission(
            r#"[{"name": "start", "transitions": [
                {"target": "fail", "conditions": [{"type": "Counting"}]}
            ]}]"#,
        );
        let mut factories = MissionFactories::new().unwrap();
        factories.conditions.register("Counting", counting).unwrap();
        let mut fsm = MissionFsm::new(decl, factories);

        assert_eq!(fsm.step(&view(0, 0)).unwrap(), Some(MissionOutcome::Fail));
        let after_fail = EVALUATIONS.with(Cell::get);
        assert_eq!(after_fail, 1);
        for s in 1..10 {
            assert_eq!(fsm.step(&view(s, 0)).unwrap(), None);
            let mut out = Vec::new();
            fsm.draw(&view(s, 0), &mut out).unwrap();
        }
        assert_eq!(EVALUATIONS.with(Cell::get), after_fail);
        assert_eq!(fsm.current_state(), Some("fail"));
    }

    #[test]
    fn reentering_a_state_restarts_its_timers() {
        // start -(1s)-> wait -(immediately)-> start
        let decl = mission(
            r#"[
                {"name": "start", "transitions": [
                    {"target": "wait", "conditions": [{"type": "TimerCountdown", "seconds": 1.0}]}
                ]},
                {"name": "wait", "transitions": [{"target": "start"}]}
            ]"#,
        );
        let mut fsm = MissionFsm::new(decl, MissionFactories::new().unwrap());
        let mut entered_wait = Vec::new();
        for s in 0..200 {
            fsm.step(&view(s, 0)).unwrap();
            if fsm.current_state() == Some("wait") {
                entered_wait.push(s);
            }
        }
        // Each visit to "start" restarts its one-second countdown
        assert_eq!(entered_wait, vec![61, 124, 187]);
    }

    #[test]
    fn draw_starts_the_mission_and_shows_messages() {
        let decl = mission(
            r#"[{"name": "start",
                 "effects": [{"type": "DisplayMessage", "message": "Pass the rings"}, {"type": "StartTimer"}],
                 "transitions": [{"target": "win", "conditions": [
                     {"type": "TimerCountdown", "seconds": 2.0, "display": true}
                 ]}]}]"#,
        );
        let mut fsm = MissionFsm::new(decl, MissionFactories::new().unwrap());
        let mut out = Vec::new();
        fsm.draw(&view(30, 0), &mut out).unwrap();
        assert_eq!(fsm.current_state(), Some("start"));
        // The countdown has not been evaluated yet, so only the message and timer show
        assert_eq!(out, vec!["Pass the rings".to_owned(), "TIME: 0.00".to_owned()]);

        fsm.step(&view(60, 0)).unwrap();
        out.clear();
        fsm.draw(&view(90, 0), &mut out).unwrap();
        assert_eq!(out[1], "1.5");
        assert_eq!(out[2], "TIME: 1.00");
    }

    #[test]
    fn unknown_tags_and_states_are_errors() {
        let decl = mission(
            r#"[{"name": "start", "transitions": [
                {"target": "win", "conditions": [{"type": "Teleport"}]}
            ]}]"#,
        );
        let mut fsm = MissionFsm::new(decl, MissionFactories::new().unwrap());
        let err = fsm.step(&view(0, 0)).unwrap_err();
        assert_eq!(
            err.root_cause().to_string(),
            "No implementation for transition condition \"Teleport\""
        );

        let decl = mission(r#"[{"name": "start", "transitions": [{"target": "nowhere"}]}]"#);
        let mut fsm = MissionFsm::new(decl, MissionFactories::new().unwrap());
        let err = fsm.step(&view(0, 0)).unwrap_err();
        assert_eq!(err.to_string(), "Unable to transition to state \"nowhere\"");
    }
}
