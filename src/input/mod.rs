//! Joypad input: queries `libretro_backend::RuntimeHandle` once per tick and
//! caches the result in [`state::JoypadSnapshot`] so every subsystem the
//! scheduler dispatches to within that tick sees a consistent, edge-detected
//! view (§4.1 step 1 and "edge detection").

use crate::state;
use libretro_backend::{JoypadButton as LrJoypadButton, RuntimeHandle};

/// Bitmask positions matching [`crate::state::JoypadSnapshot`]'s `current`/
/// `previous` fields.
pub mod bit {
    pub const UP: u32 = 1 << 0;
    pub const DOWN: u32 = 1 << 1;
    pub const LEFT: u32 = 1 << 2;
    pub const RIGHT: u32 = 1 << 3;
    pub const A: u32 = 1 << 4;
    pub const B: u32 = 1 << 5;
    pub const X: u32 = 1 << 6;
    pub const Y: u32 = 1 << 7;
    pub const START: u32 = 1 << 8;
    pub const SELECT: u32 = 1 << 9;
    pub const L1: u32 = 1 << 10;
    pub const R1: u32 = 1 << 11;
    pub const L2: u32 = 1 << 12;
    pub const R2: u32 = 1 << 13;
}

const ORDERED_BITS: [(u32, LrJoypadButton); 14] = [
    (bit::UP, LrJoypadButton::Up),
    (bit::DOWN, LrJoypadButton::Down),
    (bit::LEFT, LrJoypadButton::Left),
    (bit::RIGHT, LrJoypadButton::Right),
    (bit::A, LrJoypadButton::A),
    (bit::B, LrJoypadButton::B),
    (bit::X, LrJoypadButton::X),
    (bit::Y, LrJoypadButton::Y),
    (bit::START, LrJoypadButton::Start),
    (bit::SELECT, LrJoypadButton::Select),
    (bit::L1, LrJoypadButton::L1),
    (bit::R1, LrJoypadButton::R1),
    (bit::L2, LrJoypadButton::L2),
    (bit::R2, LrJoypadButton::R2),
];

fn poll_raw(handle: &mut RuntimeHandle) -> u32 {
    let mut bits = 0u32;
    for (bit, button) in ORDERED_BITS {
        if handle.is_joypad_button_pressed(0, button) {
            bits |= bit;
        }
    }
    bits
}

/// Poll the host once and advance the shared [`state::JoypadSnapshot`]:
/// this tick's reading becomes `current`, last tick's `current` becomes
/// `previous`. Call exactly once per `on_run`, before dispatching to any
/// subsystem.
pub fn snapshot_per_frame(handle: &mut RuntimeHandle) {
    let raw = poll_raw(handle);
    let mut s = state::global().lock().unwrap();
    let prev_current = s.input.joypad.current;
    s.input.joypad.previous = prev_current;
    s.input.joypad.current = raw;
}

pub fn joypad() -> state::JoypadSnapshot {
    state::global().lock().unwrap().input.joypad
}
