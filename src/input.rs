//! Input handling.
//!
//! Window events are copied into a per-frame event list. Logical channels
//! read either the sampled device state or that list, independent of which
//! physical device backs them.

use std::collections::HashSet;

use glam::Vec2;
use winit::event::MouseButton;
use winit::keyboard::KeyCode;

/// A channel whose magnitude reaches this is "on".
const ON_THRESHOLD: f32 = 0.5;
/// Mouse travel, in pixels per frame, that maps to a full axis deflection.
const MOUSE_FULL_SCALE: f32 = 20.0;

/// An input or system event delivered during the current frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    Key {
        code: KeyCode,
        pressed: bool,
        repeat: bool,
    },
    MouseButton {
        button: MouseButton,
        pressed: bool,
    },
    MouseMotion {
        dx: f32,
        dy: f32,
    },
    Resized {
        width: u32,
        height: u32,
    },
    /// The window lost keyboard focus; releases never arrive for held input.
    FocusLost,
    Quit,
}

/// True when the frame's events contain a quit request.
pub fn quit_requested(events: &[FrameEvent]) -> bool {
    events.iter().any(|e| matches!(e, FrameEvent::Quit))
}

// ---------------------------------------------------------------------------
// Device state
// ---------------------------------------------------------------------------

/// Device state sampled once per frame from the frame's events.
#[derive(Debug, Default)]
pub struct InputState {
    keys_down: HashSet<KeyCode>,
    buttons_down: HashSet<MouseButton>,
    mouse_delta: Vec2,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one frame's events into the held state. Mouse motion only
    /// lasts for the frame it arrived in.
    pub fn sample(&mut self, events: &[FrameEvent]) {
        self.mouse_delta = Vec2::ZERO;
        for event in events {
            match *event {
                FrameEvent::Key { code, pressed, .. } => {
                    if pressed {
                        self.keys_down.insert(code);
                    } else {
                        self.keys_down.remove(&code);
                    }
                }
                FrameEvent::MouseButton { button, pressed } => {
                    if pressed {
                        self.buttons_down.insert(button);
                    } else {
                        self.buttons_down.remove(&button);
                    }
                }
                FrameEvent::MouseMotion { dx, dy } => {
                    self.mouse_delta += Vec2::new(dx, dy);
                }
                FrameEvent::FocusLost => self.reset(),
                FrameEvent::Resized { .. } | FrameEvent::Quit => {}
            }
        }
    }

    pub fn key_down(&self, code: KeyCode) -> bool {
        self.keys_down.contains(&code)
    }

    pub fn button_down(&self, button: MouseButton) -> bool {
        self.buttons_down.contains(&button)
    }

    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    /// Release everything.
    pub fn reset(&mut self) {
        self.keys_down.clear();
        self.buttons_down.clear();
        self.mouse_delta = Vec2::ZERO;
    }
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAxis {
    X,
    Y,
}

/// A logical input. Buttons read 0 or 1, axes read in [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub enum Channel {
    Key(KeyCode),
    Button(MouseButton),
    Mouse(MouseAxis),
    Invert(Box<Channel>),
    /// The stronger of two channels.
    Or(Box<Channel>, Box<Channel>),
    /// The weaker of two channels, zero unless both are partially on.
    And(Box<Channel>, Box<Channel>),
    /// An axis built from two buttons.
    PseudoAxis { neg: Box<Channel>, pos: Box<Channel> },
}

impl Channel {
    pub fn invert(self) -> Self {
        Channel::Invert(Box::new(self))
    }

    pub fn or(self, other: Channel) -> Self {
        Channel::Or(Box::new(self), Box::new(other))
    }

    pub fn and(self, other: Channel) -> Self {
        Channel::And(Box::new(self), Box::new(other))
    }

    pub fn pseudo_axis(neg: Channel, pos: Channel) -> Self {
        Channel::PseudoAxis {
            neg: Box::new(neg),
            pos: Box::new(pos),
        }
    }

    pub fn value(&self, input: &InputState) -> f32 {
        match self {
            Channel::Key(code) => on_off(input.key_down(*code)),
            Channel::Button(button) => on_off(input.button_down(*button)),
            Channel::Mouse(axis) => {
                let d = input.mouse_delta();
                let raw = match axis {
                    MouseAxis::X => d.x,
                    MouseAxis::Y => -d.y,
                };
                (raw / MOUSE_FULL_SCALE).clamp(-1.0, 1.0)
            }
            Channel::Invert(c) => -c.value(input),
            Channel::Or(a, b) => {
                let (a, b) = (a.value(input), b.value(input));
                if a.abs() >= b.abs() {
                    a
                } else {
                    b
                }
            }
            Channel::And(a, b) => {
                let (a, b) = (a.value(input), b.value(input));
                if a == 0.0 || b == 0.0 {
                    0.0
                } else if a.abs() <= b.abs() {
                    a
                } else {
                    b
                }
            }
            Channel::PseudoAxis { neg, pos } => {
                (pos.value(input).abs() - neg.value(input).abs()).clamp(-1.0, 1.0)
            }
        }
    }

    pub fn is_on(&self, input: &InputState) -> bool {
        self.value(input).abs() >= ON_THRESHOLD
    }

    pub fn is_partially_on(&self, input: &InputState) -> bool {
        self.value(input) != 0.0
    }

    /// Whether this channel was switched on by one of the frame's events.
    pub fn matches_frame_events(&self, input: &InputState, events: &[FrameEvent]) -> bool {
        self.matches_signed(input, events, 1.0)
    }

    fn matches_signed(&self, input: &InputState, events: &[FrameEvent], sign: f32) -> bool {
        match self {
            Channel::Key(k) => events.iter().any(|e| {
                matches!(e, FrameEvent::Key { code, pressed: true, repeat: false } if code == k)
            }),
            Channel::Button(b) => events.iter().any(|e| {
                matches!(e, FrameEvent::MouseButton { button, pressed: true } if button == b)
            }),
            Channel::Mouse(axis) => events.iter().any(|e| match (e, axis) {
                (FrameEvent::MouseMotion { dx, .. }, MouseAxis::X) => dx * sign > 0.0,
                (FrameEvent::MouseMotion { dy, .. }, MouseAxis::Y) => -dy * sign > 0.0,
                _ => false,
            }),
            Channel::Invert(c) => c.matches_signed(input, events, -sign),
            Channel::Or(a, b) => {
                a.matches_signed(input, events, sign) || b.matches_signed(input, events, sign)
            }
            Channel::And(a, b) => {
                (a.matches_signed(input, events, sign) && b.is_partially_on(input))
                    || (b.matches_signed(input, events, sign) && a.is_partially_on(input))
            }
            Channel::PseudoAxis { neg, pos } => {
                if sign > 0.0 {
                    pos.matches_signed(input, events, 1.0)
                } else {
                    neg.matches_signed(input, events, 1.0)
                }
            }
        }
    }
}

fn on_off(on: bool) -> f32 {
    if on {
        1.0
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Player intent
// ---------------------------------------------------------------------------

/// What the player is asking the avatar to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    TransX,
    TransY,
    TransZ,
    RotateX,
    RotateY,
    RotateZ,
    RunStance,
}

impl IntentKind {
    pub const ALL: [IntentKind; 7] = [
        IntentKind::TransX,
        IntentKind::TransY,
        IntentKind::TransZ,
        IntentKind::RotateX,
        IntentKind::RotateY,
        IntentKind::RotateZ,
        IntentKind::RunStance,
    ];
}

/// Intent channel values sampled for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Intent {
    values: [f32; 7],
}

impl Intent {
    pub fn value(&self, kind: IntentKind) -> f32 {
        self.values[kind as usize]
    }

    pub fn set(&mut self, kind: IntentKind, value: f32) {
        self.values[kind as usize] = value;
    }

    pub fn is_on(&self, kind: IntentKind) -> bool {
        self.value(kind).abs() >= ON_THRESHOLD
    }

    pub fn is_partially_on(&self, kind: IntentKind) -> bool {
        self.value(kind) != 0.0
    }
}

/// Which channel drives each intent.
#[derive(Debug, Clone)]
pub struct IntentBindings {
    channels: Vec<(IntentKind, Channel)>,
}

impl Default for IntentBindings {
    fn default() -> Self {
        use KeyCode::*;
        let key = Channel::Key;
        Self {
            channels: vec![
                (IntentKind::TransX, Channel::pseudo_axis(key(KeyA), key(KeyD))),
                // Stick-style vertical axis: positive is down
                (IntentKind::TransY, Channel::pseudo_axis(key(KeyR), key(KeyF))),
                (IntentKind::TransZ, Channel::pseudo_axis(key(KeyS), key(KeyW))),
                (
                    IntentKind::RotateX,
                    Channel::pseudo_axis(key(ArrowDown), key(ArrowUp)).or(Channel::Mouse(MouseAxis::Y)),
                ),
                (
                    IntentKind::RotateY,
                    Channel::pseudo_axis(key(ArrowLeft), key(ArrowRight)).or(Channel::Mouse(MouseAxis::X)),
                ),
                (IntentKind::RotateZ, Channel::pseudo_axis(key(KeyQ), key(KeyE))),
                (IntentKind::RunStance, key(Space)),
            ],
        }
    }
}

impl IntentBindings {
    pub fn bind(&mut self, kind: IntentKind, channel: Channel) {
        match self.channels.iter_mut().find(|(k, _)| *k == kind) {
            Some(entry) => entry.1 = channel,
            None => self.channels.push((kind, channel)),
        }
    }

    pub fn channel(&self, kind: IntentKind) -> Option<&Channel> {
        self.channels.iter().find(|(k, _)| *k == kind).map(|(_, c)| c)
    }

    pub fn sample(&self, input: &InputState) -> Intent {
        let mut intent = Intent::default();
        for (kind, channel) in &self.channels {
            intent.set(*kind, channel.value(input));
        }
        intent
    }
}
