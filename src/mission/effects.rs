use anyhow::Result;

use super::{MissionHud, MissionView};
use crate::data::Params;

/// Something a mission state does while it is active. Every hook is optional.
pub trait Effect {
    fn entering_state(&mut self, _view: &MissionView, _hud: &mut MissionHud) {}
    fn step(&mut self, _view: &MissionView, _hud: &mut MissionHud) {}
    fn exiting_state(&mut self, _view: &MissionView, _hud: &mut MissionHud) {}
    fn draw(&self, _view: &MissionView, _out: &mut Vec<String>) {}
}

/// Shows a line of text while the state is active.
pub struct DisplayMessage {
    message: String,
}

impl Effect for DisplayMessage {
    fn draw(&self, _view: &MissionView, out: &mut Vec<String>) {
        out.push(self.message.clone());
    }
}

pub fn display_message(params: &Params) -> Result<Box<dyn Effect>> {
    Ok(Box::new(DisplayMessage {
        message: params.str("message")?.to_owned(),
    }))
}

/// Starts the mission timer on entry. A running timer is not restarted.
pub struct StartTimer;

impl Effect for StartTimer {
    fn entering_state(&mut self, view: &MissionView, hud: &mut MissionHud) {
        hud.timer_start.get_or_insert(view.total_steps);
    }
}

pub fn start_timer(_params: &Params) -> Result<Box<dyn Effect>> {
    Ok(Box::new(StartTimer))
}
