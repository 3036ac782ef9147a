//! Core-side shared state: the single `GlobalState` singleton every subsystem
//! reads or writes through for the duration of one call.
//!
//! Kept as an `OnceLock<Mutex<GlobalState>>`, the same shape the donor core
//! used for its own guest-memory bridge — but holding this project's
//! framebuffer/audio/input data directly instead of a pointer into a WASM
//! guest's linear memory.

use crate::config::Settings;
use libretro_backend::RuntimeHandle;
use std::sync::{Mutex, OnceLock};

pub const FB_WIDTH: usize = 320;
pub const FB_HEIGHT: usize = 240;
pub const UNIVERSAL_BUFFER_SIZE: usize = 6 * 1024 * 1024;

/// The single shared 320x240 RGB565 framebuffer.
///
/// No double-buffering, no dirty regions: every render call rewrites every
/// pixel it cares about, and whatever isn't touched carries over from the
/// previous tick (only the background/video/image paths clear to black on
/// their own when they need to).
pub struct Framebuffer {
    pub width: usize,
    pub height: usize,
    pixels: Vec<u16>,
}

impl Framebuffer {
    pub(crate) fn new() -> Self {
        Self {
            width: FB_WIDTH,
            height: FB_HEIGHT,
            pixels: vec![0u16; FB_WIDTH * FB_HEIGHT],
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u16] {
        &self.pixels
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u16] {
        &mut self.pixels
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, rgb565: u16) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = rgb565;
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u16 {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x]
        } else {
            0
        }
    }

    pub fn clear(&mut self, rgb565: u16) {
        self.pixels.fill(rgb565);
    }
}

/// The ~6 MB scratch buffer reused sequentially by image decode, thumbnail
/// loading, and bilinear resample sources.
///
/// The single-owner-at-a-time invariant is enforced only by convention (per
/// spec §5): `take` panics in debug builds if the buffer is already held,
/// since two live holders is a programming error, not a recoverable one.
pub struct UniversalBuffer {
    bytes: Vec<u8>,
    held: bool,
}

impl UniversalBuffer {
    fn new() -> Self {
        Self {
            bytes: vec![0u8; UNIVERSAL_BUFFER_SIZE],
            held: false,
        }
    }

    /// Borrow the buffer for the duration of a single call. The guard's Drop
    /// releases the "held" flag; it must not be stored across tick boundaries.
    pub fn take(&mut self) -> UniversalBufferGuard<'_> {
        debug_assert!(!self.held, "universal scratch buffer double-held");
        self.held = true;
        UniversalBufferGuard { buf: self }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }
}

pub struct UniversalBufferGuard<'a> {
    buf: &'a mut UniversalBuffer,
}

impl<'a> std::ops::Deref for UniversalBufferGuard<'a> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.buf.bytes
    }
}

impl<'a> std::ops::DerefMut for UniversalBufferGuard<'a> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf.bytes
    }
}

impl<'a> Drop for UniversalBufferGuard<'a> {
    fn drop(&mut self) {
        self.buf.held = false;
    }
}

/// Cached per-port joypad state, snapshotted once per tick by the scheduler
/// so every consumer within the tick sees a consistent view.
#[derive(Default, Clone, Copy)]
pub struct JoypadSnapshot {
    pub current: u32,
    pub previous: u32,
}

impl JoypadSnapshot {
    #[inline]
    pub fn pressed(&self, bit: u32) -> bool {
        self.current & bit != 0
    }

    /// Release-edge: was down last tick, isn't now.
    #[inline]
    pub fn released(&self, bit: u32) -> bool {
        self.previous & bit != 0 && self.current & bit == 0
    }

    /// Press-edge: wasn't down last tick, is now.
    #[inline]
    pub fn pressed_edge(&self, bit: u32) -> bool {
        self.previous & bit == 0 && self.current & bit != 0
    }
}

#[derive(Default)]
pub struct InputState {
    pub joypad: JoypadSnapshot,
}

/// Global core state, accessed from `Core::on_run` and every subsystem tick.
pub struct GlobalState {
    /// Current libretro runtime handle, valid only for the duration of `on_run`.
    pub handle: *mut RuntimeHandle,

    pub framebuffer: Framebuffer,
    pub universal: UniversalBuffer,
    pub input: InputState,
    pub settings: Settings,
}

// The raw `handle` pointer is only ever dereferenced from within `on_run`,
// under the same single-threaded cooperative tick this state is designed
// around; the mutex exists to satisfy `OnceLock`'s requirements, not to
// arbitrate real concurrent access.
unsafe impl Send for GlobalState {}
unsafe impl Sync for GlobalState {}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            handle: std::ptr::null_mut(),
            framebuffer: Framebuffer::new(),
            universal: UniversalBuffer::new(),
            input: InputState::default(),
            settings: Settings::default(),
        }
    }
}

static GLOBAL_STATE: OnceLock<Mutex<GlobalState>> = OnceLock::new();

pub fn global() -> &'static Mutex<GlobalState> {
    GLOBAL_STATE.get_or_init(|| Mutex::new(GlobalState::default()))
}

pub fn set_runtime_handle(handle: &mut RuntimeHandle) {
    let mut s = global().lock().unwrap();
    s.handle = handle as *mut _;
}

pub fn clear_on_unload() {
    let mut s = global().lock().unwrap();
    s.handle = std::ptr::null_mut();
    s.framebuffer = Framebuffer::new();
    s.input = InputState::default();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framebuffer_set_get_roundtrips_in_bounds() {
        let mut fb = Framebuffer::new();
        fb.set(10, 10, 0xBEEF);
        assert_eq!(fb.get(10, 10), 0xBEEF);
    }

    #[test]
    fn framebuffer_out_of_bounds_writes_are_ignored() {
        let mut fb = Framebuffer::new();
        fb.set(10_000, 10_000, 0xBEEF);
        assert_eq!(fb.get(0, 0), 0);
    }

    #[test]
    fn universal_buffer_guard_releases_on_drop() {
        let mut buf = UniversalBuffer::new();
        {
            let mut guard = buf.take();
            guard[0] = 7;
        }
        assert!(!buf.held);
        assert_eq!(buf.bytes[0], 7);
    }

    #[test]
    fn joypad_edge_detection() {
        let snap = JoypadSnapshot {
            current: 0,
            previous: 1,
        };
        assert!(snap.released(1));
        assert!(!snap.pressed_edge(1));
    }
}
