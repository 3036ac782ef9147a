//! Framebuffer drawing primitives: point/line/rect/circle on the shared
//! 320x240 RGB565 surface, adapted from the donor's guest-facing graphics
//! API to operate directly on [`crate::state::Framebuffer`].

use crate::state::Framebuffer;

pub fn point(fb: &mut Framebuffer, x: i32, y: i32, color: u16) {
    if x >= 0 && y >= 0 {
        fb.set(x as usize, y as usize, color);
    }
}

/// Bresenham's line algorithm.
pub fn line(fb: &mut Framebuffer, mut x0: i32, mut y0: i32, x1: i32, y1: i32, color: u16) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        point(fb, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

pub fn rect(fb: &mut Framebuffer, x: i32, y: i32, w: u32, h: u32, color: u16) {
    let screen_w = fb.width as i32;
    let screen_h = fb.height as i32;

    let x_start = x.max(0);
    let y_start = y.max(0);
    let x_end = (x + w as i32).min(screen_w);
    let y_end = (y + h as i32).min(screen_h);
    if x_start >= x_end || y_start >= y_end {
        return;
    }

    for cy in y_start..y_end {
        for cx in x_start..x_end {
            fb.set(cx as usize, cy as usize, color);
        }
    }
}

pub fn rect_outline(fb: &mut Framebuffer, x: i32, y: i32, w: u32, h: u32, color: u16) {
    line(fb, x, y, x + w as i32, y, color);
    line(fb, x, y + h as i32, x + w as i32, y + h as i32, color);
    line(fb, x, y, x, y + h as i32, color);
    line(fb, x + w as i32, y, x + w as i32, y + h as i32, color);
}

pub fn circle(fb: &mut Framebuffer, cx: i32, cy: i32, r: u32, color: u16) {
    let r_sq = (r * r) as i32;
    let r_i32 = r as i32;

    let x_min = (cx - r_i32).max(0);
    let x_max = (cx + r_i32).min(fb.width as i32);
    let y_min = (cy - r_i32).max(0);
    let y_max = (cy + r_i32).min(fb.height as i32);

    for y in y_min..y_max {
        for x in x_min..x_max {
            let dx = x - cx;
            let dy = y - cy;
            if dx * dx + dy * dy <= r_sq {
                fb.set(x as usize, y as usize, color);
            }
        }
    }
}

/// Bresenham's circle algorithm (midpoint variant).
pub fn circle_outline(fb: &mut Framebuffer, cx: i32, cy: i32, r: u32, color: u16) {
    let mut x = 0;
    let mut y = r as i32;
    let mut d = 3 - 2 * r as i32;

    let mut plot8 = |fb: &mut Framebuffer, x: i32, y: i32| {
        point(fb, cx + x, cy + y, color);
        point(fb, cx - x, cy + y, color);
        point(fb, cx + x, cy - y, color);
        point(fb, cx - x, cy - y, color);
        point(fb, cx + y, cy + x, color);
        point(fb, cx - y, cy + x, color);
        point(fb, cx + y, cy - x, color);
        point(fb, cx - y, cy - x, color);
    };

    while y >= x {
        plot8(fb, x, y);
        x += 1;
        if d > 0 {
            y -= 1;
            d += 4 * (x - y) + 10;
        } else {
            d += 4 * x + 6;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_out_of_bounds_is_a_no_op() {
        let mut fb = Framebuffer::new();
        point(&mut fb, -1, -1, 0xFFFF);
        point(&mut fb, 10_000, 10_000, 0xFFFF);
        assert_eq!(fb.get(0, 0), 0);
    }

    #[test]
    fn line_draws_both_endpoints() {
        let mut fb = Framebuffer::new();
        line(&mut fb, 0, 0, 5, 0, 0xFFFF);
        assert_eq!(fb.get(0, 0), 0xFFFF);
        assert_eq!(fb.get(5, 0), 0xFFFF);
    }

    #[test]
    fn rect_fills_the_requested_region_only() {
        let mut fb = Framebuffer::new();
        rect(&mut fb, 2, 2, 3, 3, 0xFFFF);
        assert_eq!(fb.get(2, 2), 0xFFFF);
        assert_eq!(fb.get(4, 4), 0xFFFF);
        assert_eq!(fb.get(5, 5), 0);
    }

    #[test]
    fn circle_includes_center_and_excludes_far_corners() {
        let mut fb = Framebuffer::new();
        circle(&mut fb, 50, 50, 10, 0xFFFF);
        assert_eq!(fb.get(50, 50), 0xFFFF);
        assert_eq!(fb.get(50 - 20, 50 - 20), 0);
    }
}
