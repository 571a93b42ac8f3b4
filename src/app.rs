use std::sync::Arc;

use anyhow::{Context, Result};
use instant::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{DeviceEvent, DeviceId, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Fullscreen, Window, WindowAttributes, WindowId};

use crate::cli::Cli;
use crate::constants::{FIXED_STEP_MS, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::data::ScenarioData;
use crate::debug::timer::{FramePhase, PhaseTimers};
use crate::debug::{FrameStats, Performance};
use crate::draw::DrawList;
use crate::error::{as_signal, LoopSignal};
use crate::gameplay::Gameplay;
use crate::input::{quit_requested, Channel, FrameEvent, InputState, IntentBindings};
use crate::scheduler::FrameScheduler;
use crate::sim::Sim;

/// Most steps simulated in one frame before the backlog is dropped.
const MAX_CATCH_UP_STEPS: u32 = 10;

/// Quit and display-reset requests carried by one frame's events.
fn control_signal(input: &InputState, events: &[FrameEvent]) -> Option<LoopSignal> {
    if quit_requested(events) {
        return Some(LoopSignal::Quit("Closed on quit event".into()));
    }
    if Channel::Key(KeyCode::Escape).matches_frame_events(input, events) {
        return Some(LoopSignal::Quit("Escape pressed".into()));
    }
    if Channel::Key(KeyCode::F11).matches_frame_events(input, events) {
        return Some(LoopSignal::DisplayReset);
    }
    None
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// Top-level application state.
struct App {
    window: Option<Arc<Window>>,
    fullscreen: bool,

    sim: Sim,
    game: Gameplay,

    // Input
    input: InputState,
    bindings: IntentBindings,
    /// Events delivered since the last frame started.
    pending_events: Vec<FrameEvent>,

    // Fixed timestep
    clock: Instant,
    scheduler: FrameScheduler,

    // Diagnostics
    perf: Performance,
    timers: PhaseTimers,
    frame_stats: FrameStats,

    // Reused every frame
    draw_list: DrawList,

    /// The error that ended the loop, if any.
    error: Option<anyhow::Error>,
    deinitialized: bool,
}

impl App {
    fn new(sim: Sim, game: Gameplay, fullscreen: bool) -> Self {
        Self {
            window: None,
            fullscreen,
            sim,
            game,
            input: InputState::new(),
            bindings: IntentBindings::default(),
            pending_events: Vec::new(),
            clock: Instant::now(),
            scheduler: FrameScheduler::new(FIXED_STEP_MS).with_catch_up_limit(MAX_CATCH_UP_STEPS),
            perf: Performance::new(),
            timers: PhaseTimers::new(),
            frame_stats: FrameStats::new(),
            draw_list: DrawList::new(),
            error: None,
            deinitialized: false,
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.elapsed().as_millis() as u64
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let mut attrs = WindowAttributes::default().with_title("Orbit Ribbon");
        attrs = if self.fullscreen {
            attrs.with_fullscreen(Some(Fullscreen::Borderless(None)))
        } else {
            attrs.with_inner_size(LogicalSize::new(SCREEN_WIDTH, SCREEN_HEIGHT))
        };
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("Unable to create the game window")?,
        );
        let size = window.inner_size();
        log::info!(
            "Window created: {}x{} ({})",
            size.width,
            size.height,
            if self.fullscreen { "fullscreen" } else { "windowed" }
        );
        self.window = Some(window);
        Ok(())
    }

    /// One frame: collect events, sample input, simulate the due steps,
    /// build the draw list and cap the frame rate.
    fn frame(&mut self) -> Result<()> {
        let frame_start = self.now_ms();
        let steps = self.scheduler.begin_frame(frame_start);

        // --- Input ---
        self.timers.begin();
        let events = std::mem::take(&mut self.pending_events);
        self.input.sample(&events);
        if let Some(signal) = control_signal(&self.input, &events) {
            return Err(signal.into());
        }
        let intent = self.bindings.sample(&self.input);
        self.timers.end(FramePhase::Input);

        // --- Simulation ---
        self.timers.begin();
        self.game.simulate(&mut self.sim, steps, &intent)?;
        self.timers.end(FramePhase::Simulation);

        // --- Draw ---
        self.timers.begin();
        self.game.draw(&self.sim, &mut self.draw_list)?;
        self.draw_list.text(self.perf.info());
        log::trace!(
            "Frame: {} near, {} far, {} overlay lines | {}",
            self.draw_list.near.len(),
            self.draw_list.far.len(),
            self.draw_list.overlay.len(),
            self.timers.summary()
        );
        self.timers.end(FramePhase::Draw);

        // --- Frame cap ---
        let mut idle_ms = 0;
        if let Some(sleep) = self.scheduler.end_frame(self.now_ms()) {
            idle_ms = sleep.as_millis() as u64;
            std::thread::sleep(sleep);
        }
        let total_ms = self.now_ms().saturating_sub(frame_start);
        self.perf.record_frame(total_ms, idle_ms);
        self.frame_stats.record_frame(total_ms as f64 / 1000.0);
        Ok(())
    }

    /// Decide what a failed frame means for the loop.
    fn handle_frame_error(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        match as_signal(&err).cloned() {
            Some(LoopSignal::Quit(reason)) => {
                log::info!("{reason}, exiting");
                event_loop.exit();
            }
            Some(LoopSignal::DisplayReset) => {
                self.fullscreen = !self.fullscreen;
                log::info!("Display mode reset, re-creating the window");
                self.window = None;
                if let Err(e) = self.create_window(event_loop) {
                    self.fail(event_loop, e);
                }
            }
            None => self.fail(event_loop, err),
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.error = Some(err);
        event_loop.exit();
    }

    /// Release game objects and the physics world. Safe to call more than once.
    fn deinit(&mut self) {
        if self.deinitialized {
            return;
        }
        self.deinitialized = true;
        self.game.deinit(&mut self.sim);
        self.window = None;
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.create_window(event_loop) {
            self.fail(event_loop, e);
            return;
        }
        // Continuous game loop
        event_loop.set_control_flow(ControlFlow::Poll);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.pending_events.push(FrameEvent::MouseMotion {
                dx: dx as f32,
                dy: dy as f32,
            });
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => self.pending_events.push(FrameEvent::Quit),
            WindowEvent::Focused(false) => self.pending_events.push(FrameEvent::FocusLost),
            WindowEvent::Resized(size) => self.pending_events.push(FrameEvent::Resized {
                width: size.width,
                height: size.height,
            }),
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    self.pending_events.push(FrameEvent::Key {
                        code,
                        pressed: event.state.is_pressed(),
                        repeat: event.repeat,
                    });
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.pending_events.push(FrameEvent::MouseButton {
                    button,
                    pressed: state.is_pressed(),
                });
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.frame() {
                    self.handle_frame_error(event_loop, e);
                }
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.deinit();
    }
}

/// Load the scenario, start the selected mission and run the frame loop until
/// quit or a fatal error.
pub fn run(cli: &Cli) -> Result<()> {
    let data = ScenarioData::load(&cli.data)?;
    let (area, mission) = cli.selection();

    let mut sim = Sim::init();
    let mut game = Gameplay::new(data)?;
    if let Err(e) = game.load(&mut sim, area, mission) {
        game.deinit(&mut sim);
        return Err(e);
    }

    let mut app = App::new(sim, game, cli.fullscreen);
    let result = EventLoop::new()
        .context("Unable to initialize the display")
        .and_then(|event_loop| event_loop.run_app(&mut app).context("Event loop failed"));
    app.deinit();
    log::info!("Shut down after {} frames", app.frame_stats.frame_count());

    result?;
    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> FrameEvent {
        FrameEvent::Key {
            code,
            pressed: true,
            repeat: false,
        }
    }

    #[test]
    fn quit_and_display_reset_signals() {
        let mut input = InputState::new();
        let events = vec![key(KeyCode::KeyW)];
        input.sample(&events);
        assert_eq!(control_signal(&input, &events), None);

        let events = vec![FrameEvent::Quit];
        assert!(matches!(control_signal(&input, &events), Some(LoopSignal::Quit(_))));

        let events = vec![key(KeyCode::Escape)];
        input.sample(&events);
        assert!(matches!(control_signal(&input, &events), Some(LoopSignal::Quit(_))));

        let events = vec![key(KeyCode::F11)];
        input.sample(&events);
        assert_eq!(control_signal(&input, &events), Some(LoopSignal::DisplayReset));

        // Held keys do not repeat the signal on later frames
        input.sample(&[]);
        assert_eq!(control_signal(&input, &[]), None);
    }
}
