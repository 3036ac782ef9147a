//! PCM decode: raw bytes straight from file, mono duplicated to stereo.

use crate::error::{MediaError, MediaResult};
use std::io::{Read, Seek, SeekFrom};

pub struct PcmCursor {
    pub channels: u16,
    pub bits_per_sample: u16,
    chunk_idx: usize,
    chunk_pos: u32,
}

impl PcmCursor {
    pub fn new(channels: u16, bits_per_sample: u16) -> Self {
        Self {
            channels,
            bits_per_sample,
            chunk_idx: 0,
            chunk_pos: 0,
        }
    }

    pub fn seek_to_chunk(&mut self, chunk_idx: usize, byte_offset: u32) {
        self.chunk_idx = chunk_idx;
        self.chunk_pos = byte_offset;
    }

    pub fn chunk_idx(&self) -> usize {
        self.chunk_idx
    }

    /// Decode up to `max_out_bytes` stereo i16 bytes from the given
    /// audio-chunk index/size tables, advancing the cursor. Returns stereo
    /// PCM bytes ready for the ring.
    pub fn decode_into<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        offsets: &[u64],
        sizes: &[u32],
        max_out_bytes: usize,
    ) -> MediaResult<Vec<u8>> {
        let bytes_per_sample = (self.bits_per_sample / 8) as usize;
        let frame_bytes = bytes_per_sample * self.channels as usize;
        if frame_bytes == 0 {
            return Ok(Vec::new());
        }

        let mut out = Vec::with_capacity(max_out_bytes);
        while out.len() + frame_bytes * 2 <= max_out_bytes {
            if self.chunk_idx >= offsets.len() {
                break;
            }
            let chunk_size = sizes[self.chunk_idx];
            if self.chunk_pos >= chunk_size {
                self.chunk_idx += 1;
                self.chunk_pos = 0;
                continue;
            }

            let remaining_in_chunk = chunk_size - self.chunk_pos;
            let want_frames = (max_out_bytes - out.len()) / (frame_bytes * 2);
            let want_bytes = (want_frames.max(1) * frame_bytes).min(remaining_in_chunk as usize);

            let mut buf = vec![0u8; want_bytes];
            reader
                .seek(SeekFrom::Start(offsets[self.chunk_idx] + self.chunk_pos as u64))
                .map_err(|_| MediaError::IoShort {
                    expected: want_bytes,
                    got: 0,
                })?;
            let got = reader.read(&mut buf).map_err(|_| MediaError::IoShort {
                expected: want_bytes,
                got: 0,
            })?;
            if got == 0 {
                break;
            }
            buf.truncate(got - (got % bytes_per_sample.max(1)));
            self.chunk_pos += got as u32;

            if self.channels == 1 {
                for sample in buf.chunks_exact(bytes_per_sample) {
                    out.extend_from_slice(sample);
                    out.extend_from_slice(sample);
                }
            } else {
                out.extend_from_slice(&buf);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn mono_samples_are_duplicated_to_stereo() {
        let data: Vec<u8> = vec![1, 0, 2, 0, 3, 0]; // three i16 mono samples
        let mut reader = Cursor::new(data);
        let mut cursor = PcmCursor::new(1, 16);
        let out = cursor
            .decode_into(&mut reader, &[0], &[6], 64)
            .unwrap();
        // Each 2-byte mono sample becomes 4 bytes (L+R).
        assert_eq!(out.len(), 12);
        assert_eq!(&out[0..4], &[1, 0, 1, 0]);
    }

    #[test]
    fn stereo_passes_through_unchanged() {
        let data: Vec<u8> = vec![1, 0, 2, 0];
        let mut reader = Cursor::new(data);
        let mut cursor = PcmCursor::new(2, 16);
        let out = cursor.decode_into(&mut reader, &[0], &[4], 64).unwrap();
        assert_eq!(out, vec![1, 0, 2, 0]);
    }

    #[test]
    fn advances_to_next_chunk_when_current_exhausted() {
        let data: Vec<u8> = vec![9, 9];
        let mut reader = Cursor::new(data.clone());
        let mut cursor = PcmCursor::new(2, 16);
        cursor.seek_to_chunk(0, 2); // already at end of chunk 0 (size 2)
        let _ = cursor.decode_into(&mut reader, &[0, 0], &[2, 2], 64);
        assert_eq!(cursor.chunk_idx(), 1);
    }
}
