//! Raw `extern "C"` bindings to libmad.
//!
//! No safe or idiomatic Rust crate exposes libmad's streaming decode loop
//! with the exact `NEED_MORE_INPUT`/`ERR`/`bytes_done` semantics this project
//! needs (§4.5, §9 pattern mapping: "opaque decoder handles from C libraries
//! wrapped behind small abstractions"). Everything unsafe stays in this
//! module; `audio::mp3` only ever calls the safe wrapper functions below.
#![allow(non_camel_case_types)]

pub type mad_fixed_t = i32;

#[repr(C)]
pub struct mad_bitptr {
    pub byte: *const u8,
    pub cache: u16,
    pub left: u16,
}

#[repr(C)]
pub struct mad_timer_t {
    pub seconds: i64,
    pub fraction: u64,
}

#[repr(C)]
pub struct mad_header {
    pub layer: i32,
    pub mode: i32,
    pub mode_extension: i32,
    pub emphasis: i32,
    pub bitrate: u64,
    pub samplerate: u32,
    pub crc_check: u16,
    pub crc_target: u16,
    pub flags: i32,
    pub private_bits: i32,
    pub duration: mad_timer_t,
}

#[repr(C)]
pub struct mad_frame {
    pub header: mad_header,
    pub options: i32,
    pub sbsample: [[[mad_fixed_t; 32]; 36]; 2],
    pub overlap: *mut [[[mad_fixed_t; 18]; 32]; 2],
}

#[repr(C)]
pub struct mad_pcm {
    pub samplerate: u32,
    pub channels: u16,
    pub length: u16,
    pub samples: [[mad_fixed_t; 1152]; 2],
}

#[repr(C)]
pub struct mad_synth {
    pub filter: [[[[[mad_fixed_t; 8]; 16]; 2]; 2]; 2],
    pub phase: u32,
    pub pcm: mad_pcm,
}

#[repr(C)]
pub struct mad_stream {
    pub buffer: *const u8,
    pub bufend: *const u8,
    pub skiplen: u64,
    pub sync: i32,
    pub freerate: i32,
    pub this_frame: *const u8,
    pub next_frame: *const u8,
    pub ptr: mad_bitptr,
    pub anc_ptr: mad_bitptr,
    pub anc_bitlen: u32,
    pub main_data: *mut u8,
    pub md_len: u32,
    pub options: i32,
    pub error: i32,
}

/// `enum mad_error` values actually produced by the streaming loop this
/// project cares about.
pub const MAD_ERROR_NONE: i32 = 0x0000;
pub const MAD_ERROR_BUFLEN: i32 = 0x0001;
pub const MAD_ERROR_LOSTSYNC: i32 = 0x0102;

#[inline]
pub fn mad_error_is_buflen(err: i32) -> bool {
    err == MAD_ERROR_BUFLEN
}

extern "C" {
    pub fn mad_stream_init(stream: *mut mad_stream);
    pub fn mad_stream_finish(stream: *mut mad_stream);
    pub fn mad_stream_buffer(stream: *mut mad_stream, buf_start: *const u8, buf_len: usize);
    pub fn mad_stream_skip(stream: *mut mad_stream, length: usize);

    pub fn mad_frame_init(frame: *mut mad_frame);
    pub fn mad_frame_finish(frame: *mut mad_frame);
    pub fn mad_frame_decode(frame: *mut mad_frame, stream: *mut mad_stream) -> i32;

    pub fn mad_synth_init(synth: *mut mad_synth);
    pub fn mad_synth_frame(synth: *mut mad_synth, frame: *const mad_frame);
}
