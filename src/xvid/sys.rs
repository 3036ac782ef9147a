//! Raw `extern "C"` bindings to libxvidcore.
//!
//! libxvidcore exposes a single dispatch entry point per subsystem
//! (`xvid_global`, `xvid_decore`) rather than a function per operation; this
//! mirrors that shape exactly and leaves all pointer plumbing here. Nothing
//! outside `xvid::sys` ever sees a raw libxvidcore pointer (§4.3, §9 pattern
//! mapping).
#![allow(non_camel_case_types)]

use std::os::raw::{c_int, c_void};

pub const XVID_VERSION: c_int = 0x0406; // 4.6.x ABI

pub const XVID_GBL_INIT: c_int = 0;

pub const XVID_DEC_CREATE: c_int = 0;
pub const XVID_DEC_DESTROY: c_int = 1;
pub const XVID_DEC_DECODE: c_int = 2;

pub const XVID_CSP_I420: c_int = 0x0001;
pub const XVID_CSP_NULL: c_int = 0x0008;

/// Negative `xvid_dec_stats_t.type` values carry VOL info; `0` means no
/// frame produced yet; `> 0` is a decoded VOP type.
pub const XVID_TYPE_NOTHING: c_int = 0;
pub const XVID_TYPE_VOL: c_int = -1;

#[repr(C)]
pub struct xvid_gbl_init_t {
    pub version: c_int,
    pub cpu_flags: c_int,
    pub debug: c_int,
}

#[repr(C)]
pub struct xvid_image_t {
    pub csp: c_int,
    pub plane: [*mut c_void; 4],
    pub stride: [c_int; 4],
}

#[repr(C)]
pub struct xvid_dec_create_t {
    pub version: c_int,
    pub handle: *mut c_void,
    pub width: c_int,
    pub height: c_int,
    pub fourcc: c_int,
    pub num_threads: c_int,
}

#[repr(C)]
pub struct xvid_dec_frame_t {
    pub version: c_int,
    pub general: c_int,
    pub bitstream: *const c_void,
    pub length: c_int,
    pub output: xvid_image_t,
    pub brightness: c_int,
}

#[repr(C)]
pub struct xvid_dec_stats_vol_t {
    pub general: c_int,
    pub width: c_int,
    pub height: c_int,
    pub aspect_ratio: c_int,
    pub par_width: c_int,
    pub par_height: c_int,
}

#[repr(C)]
pub struct xvid_dec_stats_vop_t {
    pub general: c_int,
    pub time_base: c_int,
    pub time_increment: c_int,
    pub qscale_stride: c_int,
    pub qscale: *mut u8,
}

#[repr(C)]
pub union xvid_dec_stats_data_t {
    pub vol: std::mem::ManuallyDrop<xvid_dec_stats_vol_t>,
    pub vop: std::mem::ManuallyDrop<xvid_dec_stats_vop_t>,
}

#[repr(C)]
pub struct xvid_dec_stats_t {
    pub version: c_int,
    pub r#type: c_int,
    pub data: xvid_dec_stats_data_t,
}

extern "C" {
    pub fn xvid_global(
        handle: *mut c_void,
        opt: c_int,
        param1: *mut c_void,
        param2: *mut c_void,
    ) -> c_int;

    pub fn xvid_decore(
        handle: *mut c_void,
        opt: c_int,
        param1: *mut c_void,
        param2: *mut c_void,
    ) -> c_int;
}
