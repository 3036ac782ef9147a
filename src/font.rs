//! Built-in 5x7 bitmap font for framebuffer overlays (FPS counter, transient
//! error labels, menu captions). No TTF loading, no glyph cache warm-up —
//! just a fixed table looked up directly, since every caller in scope draws
//! a handful of short ASCII strings per tick.

use crate::gfx;
use crate::state::Framebuffer;

pub const CHAR_WIDTH: i32 = 5;
pub const CHAR_HEIGHT: i32 = 7;
pub const CHAR_SPACING: i32 = 6;

/// One column bitmask per glyph column, bit 0 = top row. Covers ASCII
/// 0x20 ('space') through 0x7E ('~').
const GLYPHS: [[u8; 5]; 95] = build_glyphs();

const fn g(rows: [u8; 5]) -> [u8; 5] {
    rows
}

const fn build_glyphs() -> [[u8; 5]; 95] {
    let mut table = [[0u8; 5]; 95];

    table[0] = g([0x00, 0x00, 0x00, 0x00, 0x00]); // space
    table[1] = g([0x00, 0x00, 0x5F, 0x00, 0x00]); // !
    table[2] = g([0x00, 0x07, 0x00, 0x07, 0x00]); // "
    table[3] = g([0x14, 0x7F, 0x14, 0x7F, 0x14]); // #
    table[4] = g([0x24, 0x2A, 0x7F, 0x2A, 0x12]); // $
    table[5] = g([0x23, 0x13, 0x08, 0x64, 0x62]); // %
    table[6] = g([0x36, 0x49, 0x55, 0x22, 0x50]); // &
    table[7] = g([0x00, 0x05, 0x03, 0x00, 0x00]); // '
    table[8] = g([0x00, 0x1C, 0x22, 0x41, 0x00]); // (
    table[9] = g([0x00, 0x41, 0x22, 0x1C, 0x00]); // )
    table[10] = g([0x14, 0x08, 0x3E, 0x08, 0x14]); // *
    table[11] = g([0x08, 0x08, 0x3E, 0x08, 0x08]); // +
    table[12] = g([0x00, 0x50, 0x30, 0x00, 0x00]); // ,
    table[13] = g([0x08, 0x08, 0x08, 0x08, 0x08]); // -
    table[14] = g([0x00, 0x60, 0x60, 0x00, 0x00]); // .
    table[15] = g([0x20, 0x10, 0x08, 0x04, 0x02]); // /
    table[16] = g([0x3E, 0x51, 0x49, 0x45, 0x3E]); // 0
    table[17] = g([0x00, 0x42, 0x7F, 0x40, 0x00]); // 1
    table[18] = g([0x42, 0x61, 0x51, 0x49, 0x46]); // 2
    table[19] = g([0x21, 0x41, 0x45, 0x4B, 0x31]); // 3
    table[20] = g([0x18, 0x14, 0x12, 0x7F, 0x10]); // 4
    table[21] = g([0x27, 0x45, 0x45, 0x45, 0x39]); // 5
    table[22] = g([0x3C, 0x4A, 0x49, 0x49, 0x30]); // 6
    table[23] = g([0x01, 0x71, 0x09, 0x05, 0x03]); // 7
    table[24] = g([0x36, 0x49, 0x49, 0x49, 0x36]); // 8
    table[25] = g([0x06, 0x49, 0x49, 0x29, 0x1E]); // 9
    table[26] = g([0x00, 0x36, 0x36, 0x00, 0x00]); // :
    table[27] = g([0x00, 0x56, 0x36, 0x00, 0x00]); // ;
    table[28] = g([0x08, 0x14, 0x22, 0x41, 0x00]); // <
    table[29] = g([0x14, 0x14, 0x14, 0x14, 0x14]); // =
    table[30] = g([0x00, 0x41, 0x22, 0x14, 0x08]); // >
    table[31] = g([0x02, 0x01, 0x51, 0x09, 0x06]); // ?
    table[32] = g([0x32, 0x49, 0x79, 0x41, 0x3E]); // @
    table[33] = g([0x7E, 0x11, 0x11, 0x11, 0x7E]); // A
    table[34] = g([0x7F, 0x49, 0x49, 0x49, 0x36]); // B
    table[35] = g([0x3E, 0x41, 0x41, 0x41, 0x22]); // C
    table[36] = g([0x7F, 0x41, 0x41, 0x22, 0x1C]); // D
    table[37] = g([0x7F, 0x49, 0x49, 0x49, 0x41]); // E
    table[38] = g([0x7F, 0x09, 0x09, 0x09, 0x01]); // F
    table[39] = g([0x3E, 0x41, 0x49, 0x49, 0x7A]); // G
    table[40] = g([0x7F, 0x08, 0x08, 0x08, 0x7F]); // H
    table[41] = g([0x00, 0x41, 0x7F, 0x41, 0x00]); // I
    table[42] = g([0x20, 0x40, 0x41, 0x3F, 0x01]); // J
    table[43] = g([0x7F, 0x08, 0x14, 0x22, 0x41]); // K
    table[44] = g([0x7F, 0x40, 0x40, 0x40, 0x40]); // L
    table[45] = g([0x7F, 0x02, 0x0C, 0x02, 0x7F]); // M
    table[46] = g([0x7F, 0x04, 0x08, 0x10, 0x7F]); // N
    table[47] = g([0x3E, 0x41, 0x41, 0x41, 0x3E]); // O
    table[48] = g([0x7F, 0x09, 0x09, 0x09, 0x06]); // P
    table[49] = g([0x3E, 0x41, 0x51, 0x21, 0x5E]); // Q
    table[50] = g([0x7F, 0x09, 0x19, 0x29, 0x46]); // R
    table[51] = g([0x46, 0x49, 0x49, 0x49, 0x31]); // S
    table[52] = g([0x01, 0x01, 0x7F, 0x01, 0x01]); // T
    table[53] = g([0x3F, 0x40, 0x40, 0x40, 0x3F]); // U
    table[54] = g([0x1F, 0x20, 0x40, 0x20, 0x1F]); // V
    table[55] = g([0x3F, 0x40, 0x38, 0x40, 0x3F]); // W
    table[56] = g([0x63, 0x14, 0x08, 0x14, 0x63]); // X
    table[57] = g([0x07, 0x08, 0x70, 0x08, 0x07]); // Y
    table[58] = g([0x61, 0x51, 0x49, 0x45, 0x43]); // Z
    table[59] = g([0x00, 0x7F, 0x41, 0x41, 0x00]); // [
    table[60] = g([0x02, 0x04, 0x08, 0x10, 0x20]); // backslash
    table[61] = g([0x00, 0x41, 0x41, 0x7F, 0x00]); // ]
    table[62] = g([0x04, 0x02, 0x01, 0x02, 0x04]); // ^
    table[63] = g([0x40, 0x40, 0x40, 0x40, 0x40]); // _
    table[64] = g([0x00, 0x01, 0x02, 0x04, 0x00]); // `
    table[65] = g([0x20, 0x54, 0x54, 0x54, 0x78]); // a
    table[66] = g([0x7F, 0x48, 0x44, 0x44, 0x38]); // b
    table[67] = g([0x38, 0x44, 0x44, 0x44, 0x20]); // c
    table[68] = g([0x38, 0x44, 0x44, 0x48, 0x7F]); // d
    table[69] = g([0x38, 0x54, 0x54, 0x54, 0x18]); // e
    table[70] = g([0x08, 0x7E, 0x09, 0x01, 0x02]); // f
    table[71] = g([0x0C, 0x52, 0x52, 0x52, 0x3E]); // g
    table[72] = g([0x7F, 0x08, 0x04, 0x04, 0x78]); // h
    table[73] = g([0x00, 0x44, 0x7D, 0x40, 0x00]); // i
    table[74] = g([0x20, 0x40, 0x44, 0x3D, 0x00]); // j
    table[75] = g([0x7F, 0x10, 0x28, 0x44, 0x00]); // k
    table[76] = g([0x00, 0x41, 0x7F, 0x40, 0x00]); // l
    table[77] = g([0x7C, 0x04, 0x18, 0x04, 0x78]); // m
    table[78] = g([0x7C, 0x08, 0x04, 0x04, 0x78]); // n
    table[79] = g([0x38, 0x44, 0x44, 0x44, 0x38]); // o
    table[80] = g([0x7C, 0x14, 0x14, 0x14, 0x08]); // p
    table[81] = g([0x08, 0x14, 0x14, 0x18, 0x7C]); // q
    table[82] = g([0x7C, 0x08, 0x04, 0x04, 0x08]); // r
    table[83] = g([0x48, 0x54, 0x54, 0x54, 0x20]); // s
    table[84] = g([0x04, 0x3F, 0x44, 0x40, 0x20]); // t
    table[85] = g([0x3C, 0x40, 0x40, 0x20, 0x7C]); // u
    table[86] = g([0x1C, 0x20, 0x40, 0x20, 0x1C]); // v
    table[87] = g([0x3C, 0x40, 0x30, 0x40, 0x3C]); // w
    table[88] = g([0x44, 0x28, 0x10, 0x28, 0x44]); // x
    table[89] = g([0x0C, 0x50, 0x50, 0x50, 0x3C]); // y
    table[90] = g([0x44, 0x64, 0x54, 0x4C, 0x44]); // z
    table[91] = g([0x00, 0x08, 0x36, 0x41, 0x00]); // {
    table[92] = g([0x00, 0x00, 0x7F, 0x00, 0x00]); // |
    table[93] = g([0x00, 0x41, 0x36, 0x08, 0x00]); // }
    table[94] = g([0x08, 0x04, 0x08, 0x10, 0x08]); // ~

    table
}

fn glyph_for(c: char) -> Option<&'static [u8; 5]> {
    let code = c as u32;
    if !(0x20..=0x7E).contains(&code) {
        return None;
    }
    Some(&GLYPHS[(code - 0x20) as usize])
}

pub fn draw_char(fb: &mut Framebuffer, x: i32, y: i32, c: char, color: u16) {
    let Some(columns) = glyph_for(c) else {
        return;
    };
    for (col, bits) in columns.iter().enumerate() {
        for row in 0..CHAR_HEIGHT {
            if bits & (1 << row) != 0 {
                gfx::point(fb, x + col as i32, y + row, color);
            }
        }
    }
}

pub fn draw_text(fb: &mut Framebuffer, x: i32, y: i32, text: &str, color: u16) {
    let start_x = x;
    let mut cx = x;
    let mut cy = y;
    for c in text.chars() {
        if c == '\n' {
            cy += CHAR_HEIGHT + 2;
            cx = start_x;
            continue;
        }
        draw_char(fb, cx, cy, c, color);
        cx += CHAR_SPACING;
    }
}

/// Draws `text` once in black at the four cardinal offsets and once in
/// `color` on top, for legibility over a busy animated background.
pub fn draw_text_outlined(fb: &mut Framebuffer, x: i32, y: i32, text: &str, color: u16) {
    const OUTLINE: u16 = 0x0000;
    for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
        draw_text(fb, x + dx, y + dy, text, OUTLINE);
    }
    draw_text(fb, x, y, text, color);
}

pub fn measure_text(text: &str) -> i32 {
    let mut width = 0;
    let mut line_width = 0;
    for c in text.chars() {
        if c == '\n' {
            width = width.max(line_width);
            line_width = 0;
            continue;
        }
        line_width += CHAR_SPACING;
    }
    width.max(line_width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glyph_lookup_covers_printable_ascii_and_rejects_control_chars() {
        assert!(glyph_for('A').is_some());
        assert!(glyph_for('~').is_some());
        assert!(glyph_for(' ').is_some());
        assert!(glyph_for('\n').is_none());
        assert!(glyph_for('\u{1F600}').is_none());
    }

    #[test]
    fn measure_text_counts_fixed_advance_per_character() {
        assert_eq!(measure_text("AB"), CHAR_SPACING * 2);
        assert_eq!(measure_text(""), 0);
    }

    #[test]
    fn measure_text_takes_the_widest_line() {
        assert_eq!(measure_text("AB\nABC"), CHAR_SPACING * 3);
    }

    #[test]
    fn draw_char_writes_pixels_for_a_non_blank_glyph() {
        let mut fb = Framebuffer::new();
        draw_char(&mut fb, 0, 0, 'A', 0xFFFF);
        let any_set = (0..CHAR_HEIGHT)
            .flat_map(|y| (0..CHAR_WIDTH).map(move |x| (x, y)))
            .any(|(x, y)| fb.get(x as usize, y as usize) != 0);
        assert!(any_set);
    }

    #[test]
    fn draw_char_for_space_writes_nothing() {
        let mut fb = Framebuffer::new();
        draw_char(&mut fb, 0, 0, ' ', 0xFFFF);
        let any_set = (0..CHAR_HEIGHT)
            .flat_map(|y| (0..CHAR_WIDTH).map(move |x| (x, y)))
            .any(|(x, y)| fb.get(x as usize, y as usize) != 0);
        assert!(!any_set);
    }
}
