//! Image codec dispatch (§4.8): magic-byte probing into the matching decoder.

pub mod bmp;
pub mod viewer;

use crate::error::{MediaError, MediaResult};

pub const MAX_IMAGE_DIMENSION: u32 = 1732;
pub const MAX_IMAGE_PIXELS: u64 = 1732 * 1732;
pub const MAX_FILE_SIZE_BYTES: usize = 4 * 1024 * 1024;

pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8, row-major.
    pub rgba: Vec<u8>,
}

/// Identify a container by its leading bytes and decode it to RGBA8.
/// Mirrors the donor's PNG decode idiom (`png::Decoder` + `read_info` +
/// `next_frame`) for every format that has an equivalent crate API.
pub fn decode(bytes: &[u8]) -> MediaResult<DecodedImage> {
    if bytes.len() > MAX_FILE_SIZE_BYTES {
        return Err(MediaError::TooLarge(format!(
            "image file is {} bytes, cap is {}",
            bytes.len(),
            MAX_FILE_SIZE_BYTES
        )));
    }

    let image = if bytes.starts_with(b"\x89PNG") {
        decode_png(bytes)?
    } else if bytes.starts_with(b"GIF8") {
        decode_gif(bytes)?
    } else if bytes.starts_with(b"BM") {
        bmp::decode(bytes)?
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        decode_webp(bytes)?
    } else if bytes.starts_with(&[0xFF, 0xD8]) {
        decode_jpeg(bytes)?
    } else {
        return Err(MediaError::FormatUnsupported("unrecognized image container".into()));
    };

    check_bounds(image.width, image.height)?;
    Ok(image)
}

fn check_bounds(width: u32, height: u32) -> MediaResult<()> {
    if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        return Err(MediaError::TooLarge(format!(
            "{width}x{height} exceeds {MAX_IMAGE_DIMENSION}x{MAX_IMAGE_DIMENSION}"
        )));
    }
    if (width as u64) * (height as u64) > MAX_IMAGE_PIXELS {
        return Err(MediaError::TooLarge(format!(
            "{width}x{height} exceeds the pixel budget"
        )));
    }
    Ok(())
}

fn decode_png(bytes: &[u8]) -> MediaResult<DecodedImage> {
    let cursor = std::io::Cursor::new(bytes);
    let decoder = png::Decoder::new(cursor);
    let mut reader = decoder
        .read_info()
        .map_err(|e| MediaError::DecodeError(format!("png: {e}")))?;

    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| MediaError::DecodeError(format!("png: {e}")))?;

    let bytes = &buf[..info.buffer_size()];
    let rgba: Vec<u8> = match info.color_type {
        png::ColorType::Rgba => bytes.to_vec(),
        png::ColorType::Rgb => bytes
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        png::ColorType::Grayscale => bytes.iter().flat_map(|&g| [g, g, g, 255]).collect(),
        png::ColorType::GrayscaleAlpha => bytes
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        png::ColorType::Indexed => {
            return Err(MediaError::FormatUnsupported("indexed png not expanded".into()))
        }
    };

    Ok(DecodedImage {
        width: info.width,
        height: info.height,
        rgba,
    })
}

fn decode_gif(bytes: &[u8]) -> MediaResult<DecodedImage> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = options
        .read_info(bytes)
        .map_err(|e| MediaError::DecodeError(format!("gif: {e}")))?;
    let frame = decoder
        .read_next_frame()
        .map_err(|e| MediaError::DecodeError(format!("gif: {e}")))?
        .ok_or_else(|| MediaError::DecodeError("gif: no frames".into()))?;

    Ok(DecodedImage {
        width: frame.width as u32,
        height: frame.height as u32,
        rgba: frame.buffer.to_vec(),
    })
}

fn decode_jpeg(bytes: &[u8]) -> MediaResult<DecodedImage> {
    let mut decoder = jpeg_decoder::Decoder::new(bytes);
    let pixels = decoder
        .decode()
        .map_err(|e| MediaError::DecodeError(format!("jpeg: {e}")))?;
    let info = decoder
        .info()
        .ok_or_else(|| MediaError::DecodeError("jpeg: missing frame info".into()))?;

    let rgba: Vec<u8> = match info.pixel_format {
        jpeg_decoder::PixelFormat::RGB24 => pixels
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        jpeg_decoder::PixelFormat::L8 => pixels.iter().flat_map(|&g| [g, g, g, 255]).collect(),
        jpeg_decoder::PixelFormat::CMYK32 => {
            return Err(MediaError::FormatUnsupported("cmyk jpeg unsupported".into()))
        }
        _ => return Err(MediaError::FormatUnsupported("unsupported jpeg pixel format".into())),
    };

    Ok(DecodedImage {
        width: info.width as u32,
        height: info.height as u32,
        rgba,
    })
}

fn decode_webp(bytes: &[u8]) -> MediaResult<DecodedImage> {
    let decoder = image_webp::WebPDecoder::new(std::io::Cursor::new(bytes))
        .map_err(|e| MediaError::DecodeError(format!("webp: {e}")))?;
    let (width, height) = decoder.dimensions();
    let mut decoder = decoder;
    let mut buf = vec![0u8; (width as usize) * (height as usize) * 4];
    decoder
        .read_image(&mut buf)
        .map_err(|e| MediaError::DecodeError(format!("webp: {e}")))?;

    Ok(DecodedImage {
        width,
        height,
        rgba: buf,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_files_before_touching_any_decoder() {
        let bytes = vec![0u8; MAX_FILE_SIZE_BYTES + 1];
        let err = decode(&bytes);
        assert!(matches!(err, Err(MediaError::TooLarge(_))));
    }

    #[test]
    fn rejects_unrecognized_magic_bytes() {
        let bytes = vec![0x00, 0x01, 0x02, 0x03];
        let err = decode(&bytes);
        assert!(matches!(err, Err(MediaError::FormatUnsupported(_))));
    }

    #[test]
    fn bounds_check_rejects_oversized_dimensions() {
        let err = check_bounds(2000, 100);
        assert!(matches!(err, Err(MediaError::TooLarge(_))));
    }

    #[test]
    fn bounds_check_rejects_oversized_pixel_count() {
        let err = check_bounds(1732, 1732);
        assert!(err.is_ok());
        let err = check_bounds(1700, 1700);
        assert!(err.is_ok());
    }
}
