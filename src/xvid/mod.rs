//! Safe wrapper around libxvidcore (§4.3).
//!
//! Exposes exactly the five operations the video pipeline needs: `init`
//! (process-wide, once), `create`, `feed_vol`, `decode`, `destroy`. Nothing
//! outside this module touches a raw libxvidcore handle.

pub mod sys;

use crate::error::{MediaError, MediaResult};
use std::os::raw::c_void;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

static GLOBAL_INIT_DONE: AtomicBool = AtomicBool::new(false);

/// Maximum number of `xvid_decore` calls per `decode_frame` invocation
/// before giving up on this frame for the tick (§4.3 step 3).
const MAX_DECODE_LOOP_ITERATIONS: u32 = 10;

/// Runs the library's global init exactly once per process. The library
/// never exposes or needs a matching teardown call.
pub fn global_init() -> MediaResult<()> {
    if GLOBAL_INIT_DONE.swap(true, Ordering::SeqCst) {
        return Ok(());
    }
    let mut init = sys::xvid_gbl_init_t {
        version: sys::XVID_VERSION,
        cpu_flags: 0,
        debug: 0,
    };
    let rc = unsafe {
        sys::xvid_global(
            ptr::null_mut(),
            sys::XVID_GBL_INIT,
            &mut init as *mut _ as *mut c_void,
            ptr::null_mut(),
        )
    };
    if rc < 0 {
        return Err(MediaError::DecodeError("xvid global init failed".into()));
    }
    Ok(())
}

pub enum DecodeOutcome {
    /// A full frame is ready; read it back via [`XvidDecoder::planes`].
    FrameReady,
    /// No displayable frame emerged this call; the caller should still
    /// treat this as success and retry on the next tick (§4.3 step 4).
    NoFrameYet,
}

pub struct XvidDecoder {
    handle: *mut c_void,
    width: u32,
    height: u32,
    vol_sent: bool,
    y_plane: Vec<u8>,
    u_plane: Vec<u8>,
    v_plane: Vec<u8>,
}

// The handle is only ever touched through `&mut self` methods, serializing
// access the same way the rest of this project's single-threaded tick loop
// serializes every other subsystem.
unsafe impl Send for XvidDecoder {}

impl XvidDecoder {
    pub fn new(width: u32, height: u32) -> MediaResult<Self> {
        global_init()?;

        let mut create = sys::xvid_dec_create_t {
            version: sys::XVID_VERSION,
            handle: ptr::null_mut(),
            width: width as i32,
            height: height as i32,
            fourcc: 0,
            num_threads: 1,
        };
        let rc = unsafe {
            sys::xvid_decore(
                ptr::null_mut(),
                sys::XVID_DEC_CREATE,
                &mut create as *mut _ as *mut c_void,
                ptr::null_mut(),
            )
        };
        if rc < 0 || create.handle.is_null() {
            return Err(MediaError::DecodeError("xvid decoder create failed".into()));
        }

        Ok(Self {
            handle: create.handle,
            width,
            height,
            vol_sent: false,
            y_plane: vec![0u8; (width * height) as usize],
            u_plane: vec![0u8; (width * height / 4) as usize],
            v_plane: vec![0u8; (width * height / 4) as usize],
        })
    }

    fn resize_planes(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.y_plane = vec![0u8; (width * height) as usize];
        self.u_plane = vec![0u8; (width * height / 4) as usize];
        self.v_plane = vec![0u8; (width * height / 4) as usize];
    }

    /// Feed VOL extradata once per session, with `output_csp = NULL` so the
    /// call only primes the decoder's sequence state without emitting a frame.
    pub fn feed_vol(&mut self, vol_bytes: &[u8]) -> MediaResult<()> {
        if self.vol_sent || vol_bytes.is_empty() {
            return Ok(());
        }
        let mut frame = sys::xvid_dec_frame_t {
            version: sys::XVID_VERSION,
            general: 0,
            bitstream: vol_bytes.as_ptr() as *const c_void,
            length: vol_bytes.len() as i32,
            output: sys::xvid_image_t {
                csp: sys::XVID_CSP_NULL,
                plane: [ptr::null_mut(); 4],
                stride: [0; 4],
            },
            brightness: 0,
        };
        let mut stats = zeroed_stats();
        let rc = unsafe {
            sys::xvid_decore(
                self.handle,
                sys::XVID_DEC_DECODE,
                &mut frame as *mut _ as *mut c_void,
                &mut stats as *mut _ as *mut c_void,
            )
        };
        if rc < 0 {
            return Err(MediaError::DecodeError("xvid VOL feed failed".into()));
        }
        self.vol_sent = true;
        Ok(())
    }

    /// Decode as much of `data` as needed to produce one frame, looping
    /// per §4.3 step 3. Always returns `Ok` — a frame that never materializes
    /// is reported via `NoFrameYet`, not an error, so a single stalled tick
    /// doesn't take down the whole player.
    pub fn decode_frame(&mut self, data: &[u8]) -> MediaResult<DecodeOutcome> {
        let mut offset = 0usize;
        let mut loop_count = 0u32;

        loop {
            if loop_count >= MAX_DECODE_LOOP_ITERATIONS {
                return Ok(DecodeOutcome::NoFrameYet);
            }
            let remaining = data.len().saturating_sub(offset);
            if remaining <= 4 {
                return Ok(DecodeOutcome::NoFrameYet);
            }

            let mut frame = sys::xvid_dec_frame_t {
                version: sys::XVID_VERSION,
                general: 0,
                bitstream: data[offset..].as_ptr() as *const c_void,
                length: remaining as i32,
                output: sys::xvid_image_t {
                    csp: sys::XVID_CSP_I420,
                    plane: [
                        self.y_plane.as_mut_ptr() as *mut c_void,
                        self.u_plane.as_mut_ptr() as *mut c_void,
                        self.v_plane.as_mut_ptr() as *mut c_void,
                        ptr::null_mut(),
                    ],
                    stride: [self.width as i32, (self.width / 2) as i32, (self.width / 2) as i32, 0],
                },
                brightness: 0,
            };
            let mut stats = zeroed_stats();

            let ret = unsafe {
                sys::xvid_decore(
                    self.handle,
                    sys::XVID_DEC_DECODE,
                    &mut frame as *mut _ as *mut c_void,
                    &mut stats as *mut _ as *mut c_void,
                )
            };
            if ret <= 0 {
                return Ok(DecodeOutcome::NoFrameYet);
            }
            offset += ret as usize;
            loop_count += 1;

            if stats.r#type == sys::XVID_TYPE_VOL {
                let (new_w, new_h) = unsafe {
                    (
                        stats.data.vol.width as u32,
                        stats.data.vol.height as u32,
                    )
                };
                if new_w != self.width || new_h != self.height {
                    self.resize_planes(new_w, new_h);
                }
                continue;
            }

            if should_continue_decode_loop(stats.r#type, ret, remaining, loop_count) {
                continue;
            }
            return Ok(DecodeOutcome::FrameReady);
        }
    }

    pub fn planes(&self) -> (&[u8], &[u8], &[u8], u32, u32) {
        (&self.y_plane, &self.u_plane, &self.v_plane, self.width, self.height)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Drop for XvidDecoder {
    fn drop(&mut self) {
        unsafe {
            sys::xvid_decore(self.handle, sys::XVID_DEC_DESTROY, ptr::null_mut(), ptr::null_mut());
        }
    }
}

/// Shared by the animated background and the full-screen player: both run
/// XviD content at a fixed 30Hz tick rate even though the source clip may be
/// encoded at 15 or 30fps (or something odd in between).
pub fn repeat_count_for_fps(fps: f64) -> u32 {
    if fps >= 25.0 {
        1
    } else if fps >= 12.0 {
        2
    } else {
        3
    }
}

/// Ticks a per-tick repeat counter; returns `true` when a new source frame
/// should be decoded this tick (counter wrapped to zero).
pub struct RepeatCounter {
    repeat_count: u32,
    counter: u32,
}

impl RepeatCounter {
    pub fn new(fps: f64) -> Self {
        Self {
            repeat_count: repeat_count_for_fps(fps),
            counter: 0,
        }
    }

    pub fn set_fps(&mut self, fps: f64) {
        self.repeat_count = repeat_count_for_fps(fps);
    }

    /// Advance one tick; returns `true` if a new frame should be decoded.
    pub fn tick(&mut self) -> bool {
        let should_decode = self.counter == 0;
        self.counter = (self.counter + 1) % self.repeat_count;
        should_decode
    }
}

fn zeroed_stats() -> sys::xvid_dec_stats_t {
    sys::xvid_dec_stats_t {
        version: sys::XVID_VERSION,
        r#type: sys::XVID_TYPE_NOTHING,
        data: sys::xvid_dec_stats_data_t {
            vol: std::mem::ManuallyDrop::new(sys::xvid_dec_stats_vol_t {
                general: 0,
                width: 0,
                height: 0,
                aspect_ratio: 0,
                par_width: 0,
                par_height: 0,
            }),
        },
    }
}

/// Pure decision logic for §4.3 step 3's loop condition, split out so it can
/// be exercised without a real libxvidcore handle.
fn should_continue_decode_loop(stats_type: i32, ret: i32, remaining: usize, loop_count: u32) -> bool {
    stats_type <= 0
        && ret > 0
        && remaining > 4
        && loop_count < MAX_DECODE_LOOP_ITERATIONS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continues_while_no_frame_and_input_remains() {
        assert!(should_continue_decode_loop(0, 10, 100, 1));
    }

    #[test]
    fn stops_once_a_frame_type_is_reported() {
        assert!(!should_continue_decode_loop(1, 10, 100, 1));
    }

    #[test]
    fn stops_when_remaining_input_is_at_or_below_four_bytes() {
        assert!(!should_continue_decode_loop(0, 10, 4, 1));
    }

    #[test]
    fn stops_when_loop_count_hits_the_cap() {
        assert!(!should_continue_decode_loop(0, 10, 100, MAX_DECODE_LOOP_ITERATIONS));
    }

    #[test]
    fn stops_when_decode_call_consumed_nothing() {
        assert!(!should_continue_decode_loop(0, 0, 100, 1));
    }

    #[test]
    fn repeat_count_matches_fps_bands() {
        assert_eq!(repeat_count_for_fps(30.0), 1);
        assert_eq!(repeat_count_for_fps(25.0), 1);
        assert_eq!(repeat_count_for_fps(20.0), 2);
        assert_eq!(repeat_count_for_fps(12.0), 2);
        assert_eq!(repeat_count_for_fps(10.0), 3);
    }

    #[test]
    fn repeat_counter_decodes_new_frame_only_when_wrapped() {
        let mut rc = RepeatCounter::new(15.0); // repeat_count = 2
        assert!(rc.tick()); // counter 0 -> decode, advance to 1
        assert!(!rc.tick()); // counter 1 -> redisplay, wraps to 0
        assert!(rc.tick());
    }

    #[test]
    fn repeat_counter_at_native_rate_decodes_every_tick() {
        let mut rc = RepeatCounter::new(30.0);
        for _ in 0..5 {
            assert!(rc.tick());
        }
    }
}
