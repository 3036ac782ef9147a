//! MP3 decode via libmad (§4.5): input buffer management, stream/frame/synth
//! state, and the consecutive-error abort rule.

use crate::audio::mad_sys as sys;
use crate::error::{MediaError, MediaResult};

/// After this many consecutive non-BUFLEN decode errors within one file,
/// the decoder is considered unrecoverable and the stream is abandoned.
pub const MAX_CONSECUTIVE_ERRORS: u32 = 100;

/// libmad wants its input buffer topped up well before it runs dry; this is
/// the chunk size pulled from the file each time `feed` is called.
pub const INPUT_CHUNK_SIZE: usize = 8 * 1024;

pub enum DecodeOutcome {
    /// A frame was decoded; `samples` holds interleaved i16 stereo PCM.
    Frame { samples: Vec<i16> },
    /// Stream needs more input before another frame can come out.
    NeedMoreInput,
    /// A recoverable frame error occurred (bad sync, CRC, etc); caller should
    /// keep feeding input and try again.
    RecoverableError,
}

pub struct Mp3Decoder {
    stream: sys::mad_stream,
    frame: sys::mad_frame,
    synth: sys::mad_synth,
    input_buf: Vec<u8>,
    consecutive_errors: u32,
    pub detected_samplerate: Option<u32>,
    pub detected_channels: Option<u16>,
}

impl Mp3Decoder {
    pub fn new() -> Self {
        unsafe {
            let mut stream = std::mem::zeroed::<sys::mad_stream>();
            let mut frame = std::mem::zeroed::<sys::mad_frame>();
            let mut synth = std::mem::zeroed::<sys::mad_synth>();
            sys::mad_stream_init(&mut stream);
            sys::mad_frame_init(&mut frame);
            sys::mad_synth_init(&mut synth);
            Self {
                stream,
                frame,
                synth,
                input_buf: Vec::new(),
                consecutive_errors: 0,
                detected_samplerate: None,
                detected_channels: None,
            }
        }
    }

    /// Append freshly read file bytes to the decoder's input buffer and
    /// re-point the stream at it. Bytes already consumed by libmad (before
    /// `next_frame`) are dropped first so the buffer doesn't grow unbounded.
    pub fn feed(&mut self, chunk: &[u8]) {
        if !self.stream.next_frame.is_null() && !self.stream.buffer.is_null() {
            let consumed = unsafe { self.stream.next_frame.offset_from(self.stream.buffer) };
            if consumed > 0 && (consumed as usize) <= self.input_buf.len() {
                self.input_buf.drain(0..consumed as usize);
            }
        }
        self.input_buf.extend_from_slice(chunk);
        unsafe {
            sys::mad_stream_buffer(&mut self.stream, self.input_buf.as_ptr(), self.input_buf.len());
        }
    }

    /// Try to decode one frame from whatever input is currently buffered.
    pub fn decode_one(&mut self) -> MediaResult<DecodeOutcome> {
        let rc = unsafe { sys::mad_frame_decode(&mut self.frame, &mut self.stream) };
        if rc == 0 {
            self.consecutive_errors = 0;
            unsafe { sys::mad_synth_frame(&mut self.synth, &self.frame) };
            self.detected_samplerate = Some(self.synth.pcm.samplerate);
            self.detected_channels = Some(self.synth.pcm.channels);
            return Ok(DecodeOutcome::Frame {
                samples: self.interleave_pcm(),
            });
        }

        if sys::mad_error_is_buflen(self.stream.error) {
            return Ok(DecodeOutcome::NeedMoreInput);
        }

        self.consecutive_errors += 1;
        if self.consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
            return Err(MediaError::DecodeError(format!(
                "mp3 decode aborted after {} consecutive frame errors",
                self.consecutive_errors
            )));
        }
        Ok(DecodeOutcome::RecoverableError)
    }

    fn interleave_pcm(&self) -> Vec<i16> {
        let pcm = &self.synth.pcm;
        let len = pcm.length as usize;
        let channels = pcm.channels as usize;
        let mut out = Vec::with_capacity(len * 2);
        for i in 0..len {
            let l = mad_fixed_to_i16(pcm.samples[0][i]);
            let r = if channels == 2 {
                mad_fixed_to_i16(pcm.samples[1][i])
            } else {
                l
            };
            out.push(l);
            out.push(r);
        }
        out
    }
}

impl Drop for Mp3Decoder {
    fn drop(&mut self) {
        unsafe {
            sys::mad_frame_finish(&mut self.frame);
            sys::mad_stream_finish(&mut self.stream);
        }
    }
}

/// libmad fixed point is 28 fractional bits in a 32-bit word; scale + clamp
/// down to i16 the way every libmad consumer does it (minimad's `scale()`).
fn mad_fixed_to_i16(sample: sys::mad_fixed_t) -> i16 {
    const MAD_F_FRACBITS: i32 = 28;
    const MAD_F_ONE: i32 = 1 << MAD_F_FRACBITS;
    let mut sample = sample;
    sample += 1 << (MAD_F_FRACBITS - 16);
    sample = sample.clamp(-MAD_F_ONE, MAD_F_ONE - 1);
    (sample >> (MAD_F_FRACBITS - 15)) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mad_fixed_to_i16_roundtrips_zero() {
        assert_eq!(mad_fixed_to_i16(0), 0);
    }

    #[test]
    fn mad_fixed_to_i16_clamps_full_scale() {
        let max_fixed = (1i32 << 28) - 1;
        let v = mad_fixed_to_i16(max_fixed);
        assert!(v >= 0);
    }

    #[test]
    fn mad_fixed_to_i16_clamps_negative_full_scale() {
        let min_fixed = -(1i32 << 28);
        let v = mad_fixed_to_i16(min_fixed);
        assert!(v <= 0);
    }

    #[test]
    fn mad_fixed_to_i16_saturates_rather_than_wraps_past_mad_f_one() {
        let overshoot = 1i32 << 29;
        assert_eq!(mad_fixed_to_i16(overshoot), i16::MAX);

        let negative_overshoot = -(1i32 << 29);
        assert_eq!(mad_fixed_to_i16(negative_overshoot), i16::MIN);
    }
}
