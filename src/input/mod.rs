//! Normalized input events and seat state
//!
//! The device layer hands the core already-decoded events: a logical key or
//! button code, a press/release state and the output it happened on. This
//! module tracks the bits of seat state the core needs to route them
//! (modifier mask, cursor position, what surface the cursor and touch point
//! are over).

pub mod binding;
pub mod keycodes;

use bitflags::bitflags;
use log::trace;
use std::collections::BTreeSet;

use crate::types::{OutputId, SurfaceId};

pub use binding::{ActivatorBinding, ActivatorSource, BindingParseError, Chord, Trigger};

/// Press or release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressState {
    Pressed,
    Released,
}

impl PressState {
    pub fn from_pressed(pressed: bool) -> Self {
        if pressed {
            PressState::Pressed
        } else {
            PressState::Released
        }
    }
}

/// Keyboard key press/release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub output: OutputId,
    pub code: u32,
    pub state: PressState,
}

/// Pointer button press/release at the cursor position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ButtonEvent {
    pub output: OutputId,
    pub code: u32,
    pub state: PressState,
    pub x: f64,
    pub y: f64,
}

/// Touch point going down
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub output: OutputId,
    pub x: f64,
    pub y: f64,
}

bitflags! {
    /// Keyboard modifier mask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        const NONE = 0;
        const SHIFT = 1 << 0;
        const CTRL = 1 << 2;
        const ALT = 1 << 3;
        const SUPER = 1 << 6;
    }
}

impl Modifiers {
    /// Parse the name used inside `<...>` in bindings
    pub fn from_binding_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "shift" => Some(Self::SHIFT),
            "ctrl" | "control" => Some(Self::CTRL),
            "alt" => Some(Self::ALT),
            "super" | "logo" | "meta" => Some(Self::SUPER),
            _ => None,
        }
    }

    /// The modifier a physical key contributes
    pub fn from_key(code: u32) -> Option<Self> {
        use keycodes::*;
        match code {
            KEY_LEFTSHIFT | KEY_RIGHTSHIFT => Some(Self::SHIFT),
            KEY_LEFTCTRL | KEY_RIGHTCTRL => Some(Self::CTRL),
            KEY_LEFTALT | KEY_RIGHTALT => Some(Self::ALT),
            KEY_LEFTMETA | KEY_RIGHTMETA => Some(Self::SUPER),
            _ => None,
        }
    }

    pub fn names(self) -> impl Iterator<Item = &'static str> {
        [
            (Self::CTRL, "ctrl"),
            (Self::ALT, "alt"),
            (Self::SHIFT, "shift"),
            (Self::SUPER, "super"),
        ]
        .into_iter()
        .filter(move |(m, _)| self.contains(*m))
        .map(|(_, name)| name)
    }
}

/// Seat state shared by all outputs
#[derive(Debug, Default)]
pub struct InputState {
    /// Physical modifier keys currently held
    held_modifier_keys: BTreeSet<u32>,

    /// Cursor position in output-local coordinates
    cursor_position: (f64, f64),

    /// Surface under the cursor at the last motion event
    cursor_focus: Option<SurfaceId>,

    /// Surface under the last touch-down
    touch_focus: Option<SurfaceId>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track modifier keys. Returns true if `code` is a modifier.
    pub fn update_key(&mut self, code: u32, state: PressState) -> bool {
        if Modifiers::from_key(code).is_none() {
            return false;
        }

        match state {
            PressState::Pressed => self.held_modifier_keys.insert(code),
            PressState::Released => self.held_modifier_keys.remove(&code),
        };
        trace!("Modifiers now {:#x}", self.modifiers().bits());
        true
    }

    /// Current modifier mask
    pub fn modifiers(&self) -> Modifiers {
        self.held_modifier_keys
            .iter()
            .filter_map(|code| Modifiers::from_key(*code))
            .fold(Modifiers::NONE, |acc, m| acc | m)
    }

    pub fn cursor_position(&self) -> (f64, f64) {
        self.cursor_position
    }

    pub fn set_cursor(&mut self, x: f64, y: f64, focus: Option<SurfaceId>) {
        self.cursor_position = (x, y);
        self.cursor_focus = focus;
    }

    pub fn cursor_focus(&self) -> Option<SurfaceId> {
        self.cursor_focus
    }

    pub fn set_touch_focus(&mut self, focus: Option<SurfaceId>) {
        self.touch_focus = focus;
    }

    pub fn touch_focus(&self) -> Option<SurfaceId> {
        self.touch_focus
    }

    /// Forget a surface that went away
    pub fn forget_surface(&mut self, surface: SurfaceId) {
        if self.cursor_focus == Some(surface) {
            self.cursor_focus = None;
        }
        if self.touch_focus == Some(surface) {
            self.touch_focus = None;
        }
    }
}
