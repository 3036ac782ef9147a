//! Animated menu background with alpha overlay (§4.7).
//!
//! Drives the same XviD pipeline as the full-screen player at the menu's
//! fixed 30Hz tick rate, then composites a cached PNG overlay on top.

use crate::color;
use crate::image::DecodedImage;
use crate::state::{FB_HEIGHT, FB_WIDTH};
use crate::xvid::RepeatCounter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlendMode {
    Transparent,
    Opaque,
    Blend,
}

const ALPHA_TRANSPARENT_BELOW: u8 = 5;
const ALPHA_OPAQUE_ABOVE: u8 = 250;

/// A loaded overlay with its per-pixel blend classification pre-computed at
/// load time so the per-frame compositing path is three branches, never an
/// alpha comparison.
pub struct OverlayCache {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    blend_mode: Vec<BlendMode>,
}

impl OverlayCache {
    pub fn build(image: &DecodedImage) -> Self {
        let blend_mode = image
            .rgba
            .chunks_exact(4)
            .map(|px| classify_alpha(px[3]))
            .collect();
        Self {
            width: image.width,
            height: image.height,
            rgba: image.rgba.clone(),
            blend_mode,
        }
    }
}

fn classify_alpha(alpha: u8) -> BlendMode {
    if alpha < ALPHA_TRANSPARENT_BELOW {
        BlendMode::Transparent
    } else if alpha > ALPHA_OPAQUE_ABOVE {
        BlendMode::Opaque
    } else {
        BlendMode::Blend
    }
}

pub struct AnimatedBackground {
    repeat: RepeatCounter,
    main_overlay: Option<OverlayCache>,
    section_overlay: Option<OverlayCache>,
}

impl AnimatedBackground {
    pub fn new(fps: f64) -> Self {
        Self {
            repeat: RepeatCounter::new(fps),
            main_overlay: None,
            section_overlay: None,
        }
    }

    pub fn set_main_overlay(&mut self, image: Option<&DecodedImage>) {
        self.main_overlay = image.map(OverlayCache::build);
    }

    pub fn set_section_overlay(&mut self, image: Option<&DecodedImage>) {
        self.section_overlay = image.map(OverlayCache::build);
    }

    /// Per §4.3 repeat/rate adaptation: call once per menu tick; returns
    /// `true` when a fresh source frame should be decoded this tick.
    pub fn should_decode_new_frame(&mut self) -> bool {
        self.repeat.tick()
    }

    /// Composite the converted background frame with whichever overlay is
    /// active for the current navigation depth, writing RGB565 into `out`
    /// (a 320x240 framebuffer slice).
    pub fn composite(&self, background: &[u16], in_section: bool, out: &mut [u16]) {
        debug_assert_eq!(background.len(), (FB_WIDTH * FB_HEIGHT) as usize);
        debug_assert_eq!(out.len(), (FB_WIDTH * FB_HEIGHT) as usize);

        let overlay = if in_section {
            self.section_overlay.as_ref().or(self.main_overlay.as_ref())
        } else {
            self.main_overlay.as_ref()
        };

        let Some(overlay) = overlay else {
            out.copy_from_slice(background);
            return;
        };

        for y in 0..FB_HEIGHT as usize {
            for x in 0..FB_WIDTH as usize {
                let dst_idx = y * FB_WIDTH as usize + x;
                if x >= overlay.width as usize || y >= overlay.height as usize {
                    out[dst_idx] = background[dst_idx];
                    continue;
                }
                let ov_idx = y * overlay.width as usize + x;
                out[dst_idx] = match overlay.blend_mode[ov_idx] {
                    BlendMode::Transparent => background[dst_idx],
                    BlendMode::Opaque => {
                        let px = &overlay.rgba[ov_idx * 4..ov_idx * 4 + 4];
                        pack_dithered(px[0], px[1], px[2], x, y)
                    }
                    BlendMode::Blend => {
                        let px = &overlay.rgba[ov_idx * 4..ov_idx * 4 + 4];
                        let blended = blend_premultiplied(background[dst_idx], px);
                        pack_dithered_rgb(blended, x, y)
                    }
                };
            }
        }
    }
}

/// Unpack a background RGB565 pixel, alpha-blend the overlay's premultiplied
/// color on top, return straight (r,g,b) in 0..255.
fn blend_premultiplied(bg: u16, overlay_rgba: &[u8]) -> (u8, u8, u8) {
    let bg_r = ((bg >> 11) & 0x1F) as u32 * 255 / 31;
    let bg_g = ((bg >> 5) & 0x3F) as u32 * 255 / 63;
    let bg_b = (bg & 0x1F) as u32 * 255 / 31;

    let a = overlay_rgba[3] as u32;
    let ov_r = overlay_rgba[0] as u32 * a / 255;
    let ov_g = overlay_rgba[1] as u32 * a / 255;
    let ov_b = overlay_rgba[2] as u32 * a / 255;

    let inv_a = 255 - a;
    let r = ov_r + bg_r * inv_a / 255;
    let g = ov_g + bg_g * inv_a / 255;
    let b = ov_b + bg_b * inv_a / 255;

    (r.min(255) as u8, g.min(255) as u8, b.min(255) as u8)
}

fn pack_dithered_rgb(rgb: (u8, u8, u8), x: usize, y: usize) -> u16 {
    pack_dithered(rgb.0, rgb.1, rgb.2, x, y)
}

/// Apply the same 4x4 Bayer kernel used by the YUV pipeline to hide banding
/// on the 16-bit display when down-converting a blended pixel.
fn pack_dithered(r: u8, g: u8, b: u8, x: usize, y: usize) -> u16 {
    let d = color::bayer_offset(x, y);
    let r = (r as i32 + d).clamp(0, 255) as u8;
    let g = (g as i32 + d).clamp(0, 255) as u8;
    let b = (b as i32 + d).clamp(0, 255) as u8;
    let r5 = (r as u16 >> 3) & 0x1F;
    let g6 = (g as u16 >> 2) & 0x3F;
    let b5 = (b as u16 >> 3) & 0x1F;
    (r5 << 11) | (g6 << 5) | b5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_image(w: u32, h: u32, rgba: [u8; 4]) -> DecodedImage {
        DecodedImage {
            width: w,
            height: h,
            rgba: rgba.repeat((w * h) as usize),
        }
    }

    #[test]
    fn classify_alpha_matches_the_three_bands() {
        assert_eq!(classify_alpha(0), BlendMode::Transparent);
        assert_eq!(classify_alpha(4), BlendMode::Transparent);
        assert_eq!(classify_alpha(255), BlendMode::Opaque);
        assert_eq!(classify_alpha(251), BlendMode::Opaque);
        assert_eq!(classify_alpha(128), BlendMode::Blend);
    }

    #[test]
    fn transparent_overlay_passes_background_through() {
        let mut bg_pipe = AnimatedBackground::new(30.0);
        let overlay = solid_image(FB_WIDTH as u32, FB_HEIGHT as u32, [255, 0, 0, 0]);
        bg_pipe.set_main_overlay(Some(&overlay));

        let background = vec![0x1234u16; (FB_WIDTH * FB_HEIGHT) as usize];
        let mut out = vec![0u16; (FB_WIDTH * FB_HEIGHT) as usize];
        bg_pipe.composite(&background, false, &mut out);
        assert_eq!(out[0], 0x1234);
    }

    #[test]
    fn opaque_overlay_fully_replaces_background() {
        let mut bg_pipe = AnimatedBackground::new(30.0);
        let overlay = solid_image(FB_WIDTH as u32, FB_HEIGHT as u32, [255, 255, 255, 255]);
        bg_pipe.set_main_overlay(Some(&overlay));

        let background = vec![0x0000u16; (FB_WIDTH * FB_HEIGHT) as usize];
        let mut out = vec![0u16; (FB_WIDTH * FB_HEIGHT) as usize];
        bg_pipe.composite(&background, false, &mut out);
        assert!(out[0] != 0);
    }

    #[test]
    fn section_overlay_is_selected_only_when_in_section() {
        let mut bg_pipe = AnimatedBackground::new(30.0);
        let main = solid_image(FB_WIDTH as u32, FB_HEIGHT as u32, [255, 0, 0, 255]);
        let section = solid_image(FB_WIDTH as u32, FB_HEIGHT as u32, [0, 255, 0, 255]);
        bg_pipe.set_main_overlay(Some(&main));
        bg_pipe.set_section_overlay(Some(&section));

        let background = vec![0u16; (FB_WIDTH * FB_HEIGHT) as usize];
        let mut out_main = vec![0u16; (FB_WIDTH * FB_HEIGHT) as usize];
        let mut out_section = vec![0u16; (FB_WIDTH * FB_HEIGHT) as usize];
        bg_pipe.composite(&background, false, &mut out_main);
        bg_pipe.composite(&background, true, &mut out_section);
        assert_ne!(out_main[0], out_section[0]);
    }

    #[test]
    fn repeat_schedule_is_reused_from_the_xvid_pipeline() {
        let mut bg_pipe = AnimatedBackground::new(15.0);
        assert!(bg_pipe.should_decode_new_frame());
        assert!(!bg_pipe.should_decode_new_frame());
    }
}
