//! Hand-rolled BMP decode (§4.8, §9 pattern mapping: explicit probe-and-
//! fallback over `biBitCount`/`biCompression` rather than a heuristic guess).
//!
//! No Rust image crate in the pack decodes BMP with `BI_BITFIELDS` channel
//! masks the way this needs, so this reads the container directly the way
//! the donor's own PNG/GIF paths read theirs: fixed-offset fields, no
//! generic container abstraction.

use crate::error::{MediaError, MediaResult};
use crate::image::DecodedImage;

const BI_RGB: u32 = 0;
const BI_BITFIELDS: u32 = 3;

pub fn decode(bytes: &[u8]) -> MediaResult<DecodedImage> {
    if bytes.len() < 54 {
        return Err(MediaError::DecodeError("bmp: file too short for headers".into()));
    }
    if &bytes[0..2] != b"BM" {
        return Err(MediaError::FormatUnsupported("bmp: bad file signature".into()));
    }

    let data_offset = u32::from_le_bytes(bytes[10..14].try_into().unwrap()) as usize;
    let dib_header_size = u32::from_le_bytes(bytes[14..18].try_into().unwrap());
    if dib_header_size < 40 {
        return Err(MediaError::FormatUnsupported(
            "bmp: unsupported DIB header version".into(),
        ));
    }

    let raw_width = i32::from_le_bytes(bytes[18..22].try_into().unwrap());
    let raw_height = i32::from_le_bytes(bytes[22..26].try_into().unwrap());
    let bit_count = u16::from_le_bytes(bytes[28..30].try_into().unwrap());
    let compression = u32::from_le_bytes(bytes[30..34].try_into().unwrap());

    let width = raw_width.unsigned_abs();
    let top_down = raw_height < 0;
    let height = raw_height.unsigned_abs();
    if width == 0 || height == 0 {
        return Err(MediaError::DecodeError("bmp: zero dimension".into()));
    }

    let (r_mask, g_mask, b_mask) = match (compression, bit_count) {
        (BI_BITFIELDS, 16) | (BI_BITFIELDS, 32) => {
            let mask_offset = 14 + dib_header_size as usize;
            if bytes.len() < mask_offset + 12 {
                return Err(MediaError::DecodeError("bmp: truncated bitfield masks".into()));
            }
            (
                u32::from_le_bytes(bytes[mask_offset..mask_offset + 4].try_into().unwrap()),
                u32::from_le_bytes(bytes[mask_offset + 4..mask_offset + 8].try_into().unwrap()),
                u32::from_le_bytes(bytes[mask_offset + 8..mask_offset + 12].try_into().unwrap()),
            )
        }
        (BI_RGB, 16) => (0x7C00, 0x03E0, 0x001F), // default 555 when no explicit masks
        (BI_RGB, _) | (BI_BITFIELDS, _) => (0, 0, 0),
        _ => {
            return Err(MediaError::FormatUnsupported(format!(
                "bmp: unsupported compression {compression}"
            )))
        }
    };

    let palette = if bit_count == 8 {
        let palette_offset = 14 + dib_header_size as usize;
        let palette_len = data_offset.saturating_sub(palette_offset) / 4;
        let mut entries = Vec::with_capacity(palette_len);
        for i in 0..palette_len {
            let base = palette_offset + i * 4;
            if base + 3 >= bytes.len() {
                break;
            }
            entries.push([bytes[base + 2], bytes[base + 1], bytes[base], 255]);
        }
        Some(entries)
    } else {
        None
    };

    let row_bytes_unpadded = (width as usize) * (bit_count as usize) / 8;
    let row_stride = (row_bytes_unpadded + 3) & !3;

    let mut rgba = vec![0u8; (width as usize) * (height as usize) * 4];

    for out_row in 0..height as usize {
        let src_row = if top_down {
            out_row
        } else {
            height as usize - 1 - out_row
        };
        let row_start = data_offset + src_row * row_stride;
        if row_start + row_bytes_unpadded > bytes.len() {
            return Err(MediaError::IoShort {
                expected: row_start + row_bytes_unpadded,
                got: bytes.len(),
            });
        }
        let row = &bytes[row_start..row_start + row_bytes_unpadded];

        for x in 0..width as usize {
            let dst = (out_row * width as usize + x) * 4;
            match bit_count {
                8 => {
                    let idx = row[x] as usize;
                    let color = palette
                        .as_ref()
                        .and_then(|p| p.get(idx))
                        .copied()
                        .unwrap_or([0, 0, 0, 255]);
                    rgba[dst..dst + 4].copy_from_slice(&color);
                }
                24 => {
                    let base = x * 3;
                    rgba[dst] = row[base + 2];
                    rgba[dst + 1] = row[base + 1];
                    rgba[dst + 2] = row[base];
                    rgba[dst + 3] = 255;
                }
                32 => {
                    let base = x * 4;
                    let px = u32::from_le_bytes(row[base..base + 4].try_into().unwrap());
                    if compression == BI_BITFIELDS {
                        let (r, g, b) = unpack_bitfields(px, r_mask, g_mask, b_mask);
                        rgba[dst..dst + 4].copy_from_slice(&[r, g, b, 255]);
                    } else {
                        rgba[dst] = row[base + 2];
                        rgba[dst + 1] = row[base + 1];
                        rgba[dst + 2] = row[base];
                        rgba[dst + 3] = 255;
                    }
                }
                16 => {
                    let base = x * 2;
                    let px = u16::from_le_bytes(row[base..base + 2].try_into().unwrap()) as u32;
                    let (r, g, b) = unpack_bitfields(px, r_mask, g_mask, b_mask);
                    rgba[dst..dst + 4].copy_from_slice(&[r, g, b, 255]);
                }
                other => {
                    return Err(MediaError::FormatUnsupported(format!(
                        "bmp: unsupported bit depth {other}"
                    )))
                }
            }
        }
    }

    Ok(DecodedImage {
        width,
        height,
        rgba,
    })
}

/// Expand a packed pixel through arbitrary channel masks, scaling each
/// extracted field up to 8 bits regardless of its native width.
fn unpack_bitfields(px: u32, r_mask: u32, g_mask: u32, b_mask: u32) -> (u8, u8, u8) {
    (
        extract_channel(px, r_mask),
        extract_channel(px, g_mask),
        extract_channel(px, b_mask),
    )
}

fn extract_channel(px: u32, mask: u32) -> u8 {
    if mask == 0 {
        return 0;
    }
    let shift = mask.trailing_zeros();
    let width = 32 - (mask >> shift).leading_zeros();
    let raw = (px & mask) >> shift;
    let max_val = (1u64 << width) - 1;
    ((raw as u64 * 255 / max_val.max(1)) as u8).min(255)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_channel_scales_5_bit_field_to_8_bit() {
        let v = extract_channel(0x1F, 0x1F); // all 5 bits set, mask at bit 0
        assert_eq!(v, 255);
    }

    #[test]
    fn extract_channel_handles_shifted_mask() {
        let mask = 0x7C00; // bits 10..14, 5-bit red field in 555
        let px = 0x7C00; // red fully on
        assert_eq!(extract_channel(px, mask), 255);
    }

    #[test]
    fn extract_channel_zero_mask_yields_zero() {
        assert_eq!(extract_channel(0xFFFF, 0), 0);
    }

    #[test]
    fn rejects_short_files() {
        let err = decode(&[0u8; 10]);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_bad_signature() {
        let mut bytes = vec![0u8; 54];
        bytes[0] = b'X';
        bytes[1] = b'Y';
        let err = decode(&bytes);
        assert!(matches!(err, Err(MediaError::FormatUnsupported(_))));
    }
}
