//! Chunked image loading state machine (§4.8).
//!
//! Decoding a large JPEG on this CPU can take seconds; splitting the file
//! read across ticks and isolating the one unavoidable blocking decode call
//! keeps every other tick cheap.

use crate::error::{MediaError, MediaResult};
use crate::image::{DecodedImage, MAX_FILE_SIZE_BYTES};

pub const READ_CHUNK_SIZE: usize = 32 * 1024;

/// 8.8 fixed point; 256 is 100%.
pub const ZOOM_ONE: i32 = 256;
pub const ZOOM_MIN: i32 = 1;

pub const PAN_SPEED_NORMAL: i32 = 16;

/// While A is held, panning moves at 0.4x normal speed.
pub const PAN_SPEED_HELD_NUM: i32 = 2;
pub const PAN_SPEED_HELD_DEN: i32 = 5;

/// Rapid ring pumps run just before the slow decode call so background
/// music doesn't audibly stall while the CPU is monopolized.
pub const MUSIC_FLUSH_MAX_PUMPS: u32 = 32;

pub const ERROR_DISPLAY_TICKS: u32 = 60; // ~2s at 30Hz

pub enum ViewerState {
    Idle,
    Reading {
        buffer: Vec<u8>,
        total_size: usize,
    },
    Decoding {
        buffer: Vec<u8>,
    },
    Done {
        image: DecodedImage,
        zoom: i32,
        pan_x: i32,
        pan_y: i32,
    },
    Error {
        label: String,
        ticks_remaining: u32,
    },
}

pub struct ImageViewer {
    state: ViewerState,
    saved_zoom: Option<i32>,
}

impl Default for ImageViewer {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageViewer {
    pub fn new() -> Self {
        Self {
            state: ViewerState::Idle,
            saved_zoom: None,
        }
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    /// Begin a load; `total_size` comes from the file's metadata.
    pub fn begin_load(&mut self, total_size: usize) -> MediaResult<()> {
        if total_size > MAX_FILE_SIZE_BYTES {
            self.fail("too large");
            return Err(MediaError::TooLarge(format!(
                "{total_size} bytes exceeds {MAX_FILE_SIZE_BYTES}"
            )));
        }
        self.state = ViewerState::Reading {
            buffer: Vec::with_capacity(total_size),
            total_size,
        };
        Ok(())
    }

    /// Feed one tick's worth of freshly read bytes (at most
    /// [`READ_CHUNK_SIZE`]). Transitions to `Decoding` once the whole file
    /// has arrived.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> MediaResult<()> {
        let ViewerState::Reading { buffer, total_size } = &mut self.state else {
            return Err(MediaError::DecodeError("push_chunk outside Reading state".into()));
        };
        buffer.extend_from_slice(chunk);
        if buffer.len() >= *total_size {
            let full = std::mem::take(buffer);
            self.state = ViewerState::Decoding { buffer: full };
        }
        Ok(())
    }

    /// Run the one slow decode call. The caller is expected to have already
    /// pumped the music ring to maximum fill beforehand (§4.8).
    pub fn decode_now(&mut self) {
        let ViewerState::Decoding { buffer } = &self.state else {
            return;
        };
        match crate::image::decode(buffer) {
            Ok(image) => {
                let fit = fit_zoom(image.width, image.height);
                let zoom = self
                    .saved_zoom
                    .take()
                    .map(|z| z.clamp(ZOOM_MIN, ZOOM_ONE))
                    .unwrap_or(fit);
                let (pan_x, pan_y) = clamp_pan(0, 0, image.width, image.height, zoom);
                self.state = ViewerState::Done {
                    image,
                    zoom,
                    pan_x,
                    pan_y,
                };
            }
            Err(e) => {
                let label = e.overlay_label().to_string();
                self.state = ViewerState::Error {
                    label,
                    ticks_remaining: ERROR_DISPLAY_TICKS,
                };
            }
        }
    }

    fn fail(&mut self, label: &str) {
        self.state = ViewerState::Error {
            label: label.to_string(),
            ticks_remaining: ERROR_DISPLAY_TICKS,
        };
    }

    /// B during Reading/Decoding aborts the load outright.
    pub fn cancel(&mut self) {
        self.state = ViewerState::Idle;
    }

    /// Remember the current zoom before navigating to another image, so it
    /// can be restored (clamped to the new image's valid range).
    pub fn save_zoom_for_navigation(&mut self) {
        if let ViewerState::Done { zoom, .. } = &self.state {
            self.saved_zoom = Some(*zoom);
        }
    }

    pub fn pan(&mut self, dx_dir: i32, dy_dir: i32, a_held: bool) {
        let ViewerState::Done {
            image,
            zoom,
            pan_x,
            pan_y,
        } = &mut self.state
        else {
            return;
        };
        let speed = if a_held {
            PAN_SPEED_NORMAL * PAN_SPEED_HELD_NUM / PAN_SPEED_HELD_DEN
        } else {
            PAN_SPEED_NORMAL
        };
        let (new_x, new_y) = clamp_pan(
            *pan_x + dx_dir * speed,
            *pan_y + dy_dir * speed,
            image.width,
            image.height,
            *zoom,
        );
        *pan_x = new_x;
        *pan_y = new_y;
    }

    pub fn tick_error_display(&mut self) {
        if let ViewerState::Error { ticks_remaining, .. } = &mut self.state {
            if *ticks_remaining > 0 {
                *ticks_remaining -= 1;
            } else {
                self.state = ViewerState::Idle;
            }
        }
    }
}

/// Choose zoom so the longer source axis matches the screen, but never
/// upscale past 100%.
fn fit_zoom(img_w: u32, img_h: u32) -> i32 {
    const SCREEN_W: i64 = 320;
    const SCREEN_H: i64 = 240;
    if img_w == 0 || img_h == 0 {
        return ZOOM_ONE;
    }
    let zx = (SCREEN_W * ZOOM_ONE as i64) / img_w as i64;
    let zy = (SCREEN_H * ZOOM_ONE as i64) / img_h as i64;
    zx.min(zy).min(ZOOM_ONE as i64).max(ZOOM_MIN as i64) as i32
}

fn clamp_pan(pan_x: i32, pan_y: i32, img_w: u32, img_h: u32, zoom: i32) -> (i32, i32) {
    const SCREEN_W: i32 = 320;
    const SCREEN_H: i32 = 240;
    let scaled_w = ((img_w as i64 * zoom as i64) / ZOOM_ONE as i64) as i32;
    let scaled_h = ((img_h as i64 * zoom as i64) / ZOOM_ONE as i64) as i32;

    let max_x = (scaled_w - SCREEN_W).max(0);
    let max_y = (scaled_h - SCREEN_H).max(0);
    (pan_x.clamp(0, max_x), pan_y.clamp(0, max_y))
}

/// Bilinear-resample `image` into a 320x240 RGB565 destination buffer,
/// honoring `zoom`/`pan_x`/`pan_y`. Source coordinates are tracked in 16.16
/// fixed point.
pub fn render_bilinear(image: &DecodedImage, zoom: i32, pan_x: i32, pan_y: i32, out: &mut [u16]) {
    const SCREEN_W: usize = 320;
    const SCREEN_H: usize = 240;
    debug_assert_eq!(out.len(), SCREEN_W * SCREEN_H);

    if zoom <= 0 || image.width == 0 || image.height == 0 {
        out.fill(0);
        return;
    }

    // step = how many source pixels (16.16) one destination pixel advances.
    let step = ((ZOOM_ONE as i64) << 16) / zoom as i64;
    let origin_x = (pan_x as i64) << 16;
    let origin_y = (pan_y as i64) << 16;

    for dy in 0..SCREEN_H {
        let src_y_fixed = origin_y + dy as i64 * step;
        for dx in 0..SCREEN_W {
            let src_x_fixed = origin_x + dx as i64 * step;
            let pixel = sample_bilinear(image, src_x_fixed, src_y_fixed);
            out[dy * SCREEN_W + dx] = pixel;
        }
    }
}

fn sample_bilinear(image: &DecodedImage, x_fixed: i64, y_fixed: i64) -> u16 {
    let x0 = (x_fixed >> 16).clamp(0, image.width as i64 - 1) as usize;
    let y0 = (y_fixed >> 16).clamp(0, image.height as i64 - 1) as usize;
    let x1 = (x0 + 1).min(image.width as usize - 1);
    let y1 = (y0 + 1).min(image.height as usize - 1);

    let fx = (x_fixed & 0xFFFF) as i64;
    let fy = (y_fixed & 0xFFFF) as i64;

    let p00 = pixel_at(image, x0, y0);
    let p10 = pixel_at(image, x1, y0);
    let p01 = pixel_at(image, x0, y1);
    let p11 = pixel_at(image, x1, y1);

    let r = bilerp(p00[0], p10[0], p01[0], p11[0], fx, fy);
    let g = bilerp(p00[1], p10[1], p01[1], p11[1], fx, fy);
    let b = bilerp(p00[2], p10[2], p01[2], p11[2], fx, fy);

    pack_rgb565(r, g, b)
}

fn pixel_at(image: &DecodedImage, x: usize, y: usize) -> [u8; 4] {
    let idx = (y * image.width as usize + x) * 4;
    [
        image.rgba[idx],
        image.rgba[idx + 1],
        image.rgba[idx + 2],
        image.rgba[idx + 3],
    ]
}

fn bilerp(p00: u8, p10: u8, p01: u8, p11: u8, fx: i64, fy: i64) -> u8 {
    let top = p00 as i64 * (65536 - fx) + p10 as i64 * fx;
    let bottom = p01 as i64 * (65536 - fx) + p11 as i64 * fx;
    let value = (top * (65536 - fy) + bottom * fy) >> 32;
    value.clamp(0, 255) as u8
}

fn pack_rgb565(r: u8, g: u8, b: u8) -> u16 {
    let r5 = (r as u16 >> 3) & 0x1F;
    let g6 = (g as u16 >> 2) & 0x3F;
    let b5 = (b as u16 >> 3) & 0x1F;
    (r5 << 11) | (g6 << 5) | b5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_zoom_never_exceeds_100_percent_for_small_images() {
        assert_eq!(fit_zoom(100, 100), ZOOM_ONE);
    }

    #[test]
    fn fit_zoom_shrinks_large_images_to_fit_longer_axis() {
        let z = fit_zoom(1732, 1000);
        let scaled_w = (1732i64 * z as i64) / ZOOM_ONE as i64;
        assert!(scaled_w <= 320);
    }

    #[test]
    fn clamp_pan_centers_when_image_fits_on_screen() {
        let (x, y) = clamp_pan(500, 500, 100, 100, ZOOM_ONE);
        assert_eq!((x, y), (0, 0));
    }

    #[test]
    fn clamp_pan_bounds_when_image_larger_than_screen() {
        let (x, _y) = clamp_pan(-10, 0, 1732, 1732, ZOOM_ONE);
        assert_eq!(x, 0);
        let (x, _y) = clamp_pan(100_000, 0, 1732, 1732, ZOOM_ONE);
        assert!(x <= 1732 - 320);
    }

    #[test]
    fn push_chunk_transitions_to_decoding_once_full() {
        let mut viewer = ImageViewer::new();
        viewer.begin_load(4).unwrap();
        viewer.push_chunk(&[1, 2]).unwrap();
        assert!(matches!(viewer.state(), ViewerState::Reading { .. }));
        viewer.push_chunk(&[3, 4]).unwrap();
        assert!(matches!(viewer.state(), ViewerState::Decoding { .. }));
    }

    #[test]
    fn begin_load_rejects_oversized_file_upfront() {
        let mut viewer = ImageViewer::new();
        let err = viewer.begin_load(MAX_FILE_SIZE_BYTES + 1);
        assert!(err.is_err());
        assert!(matches!(viewer.state(), ViewerState::Error { .. }));
    }

    #[test]
    fn pack_rgb565_matches_bit_layout() {
        assert_eq!(pack_rgb565(255, 255, 255), 0xFFFF);
        assert_eq!(pack_rgb565(0, 0, 0), 0);
    }
}
