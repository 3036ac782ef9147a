//! Per-tick audio drain and AV-sync bookkeeping (§4.5).
//!
//! The scheduler calls [`AudioMixer::drain`] once per tick to hand the host
//! its audio batch; everything else here exists to keep that call cheap and
//! to swallow the handful of stale samples a seek leaves sitting in the ring.

use crate::audio::ring::AudioRing;

/// Upper bound, in interleaved stereo i16 frames, on how far a decoder is
/// allowed to run ahead of playback before `push_decoded` starts dropping
/// the tail of what it's handed. Keeps a runaway fast decoder from filling
/// the universal buffer with audio nobody will hear for seconds.
pub const MAX_AUDIO_BUFFER: usize = 4096;

const BYTES_PER_FRAME: usize = 4; // 16-bit stereo

pub struct AudioMixer {
    ring: AudioRing,
    muted_bytes_remaining: usize,
}

impl AudioMixer {
    pub fn new(ring_size: usize) -> Self {
        Self {
            ring: AudioRing::new(ring_size),
            muted_bytes_remaining: 0,
        }
    }

    /// How far ahead (in samples) the video clock should stay of the audio
    /// clock before the player starts dropping or duplicating video frames
    /// to catch up. `sample_rate / 10` gives a 100ms window.
    pub fn sync_offset_samples(sample_rate: u32) -> u32 {
        sample_rate / 10
    }

    /// Push freshly decoded stereo PCM into the ring, capped at
    /// [`MAX_AUDIO_BUFFER`] frames of outstanding backlog. Returns the number
    /// of input samples actually queued (the rest silently dropped, not
    /// written — the decoder is expected to keep pace with playback, not
    /// buffer arbitrarily far ahead).
    pub fn push_decoded(&mut self, samples: &[i16]) -> usize {
        let outstanding_frames = self.ring.count() / BYTES_PER_FRAME;
        if outstanding_frames >= MAX_AUDIO_BUFFER {
            return 0;
        }
        let room_frames = MAX_AUDIO_BUFFER - outstanding_frames;
        let room_bytes = room_frames * BYTES_PER_FRAME;

        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let to_write = bytes.len().min(room_bytes);
        self.ring.write(&bytes[..to_write]);
        to_write / 2 // back to i16-sample count
    }

    /// Seeking leaves whatever was mid-flight in the ring sounding wrong;
    /// mute roughly 93ms of output (≈4096 samples at 44.1kHz) rather than
    /// let it play, and drop the stale bytes currently queued.
    pub fn mute_for_seek(&mut self, sample_rate: u32) {
        self.ring.clear();
        let muted_frames = (sample_rate as usize * 93) / 1000;
        self.muted_bytes_remaining = muted_frames * BYTES_PER_FRAME;
    }

    /// Drain up to `out.len()` bytes for the host. While a seek mute window
    /// is active, emits silence and shrinks the window instead of reading
    /// from the ring.
    pub fn drain(&mut self, out: &mut [u8]) -> usize {
        if self.muted_bytes_remaining > 0 {
            let n = out.len().min(self.muted_bytes_remaining);
            for b in out[..n].iter_mut() {
                *b = 0;
            }
            self.muted_bytes_remaining -= n;
            // Any audio that arrived during the mute window is stale; drop it
            // rather than let it build up behind the silence.
            let mut scratch = vec![0u8; self.ring.count()];
            self.ring.read(&mut scratch);
            return n;
        }
        self.ring.read(out)
    }

    pub fn ring_free_space(&self) -> usize {
        self.ring.free_space()
    }

    /// Clear any armed mute window without touching the ring itself. Used
    /// when a caller has just drained the ring down by other means (image
    /// decode's pre-stall flush, §4.8) and wants playback to resume clean
    /// rather than carry over a stale mute countdown.
    pub fn reset_timing(&mut self) {
        self.muted_bytes_remaining = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_decoded_drops_tail_once_backlog_is_full() {
        let mut mixer = AudioMixer::new(MAX_AUDIO_BUFFER * BYTES_PER_FRAME + 64);
        let full = vec![1i16; MAX_AUDIO_BUFFER * 2]; // *2 for stereo interleave
        let queued = mixer.push_decoded(&full);
        assert_eq!(queued, MAX_AUDIO_BUFFER * 2);

        let more = vec![2i16; 100];
        let queued2 = mixer.push_decoded(&more);
        assert_eq!(queued2, 0);
    }

    #[test]
    fn sync_offset_is_one_tenth_of_sample_rate() {
        assert_eq!(AudioMixer::sync_offset_samples(44100), 4410);
    }

    #[test]
    fn mute_for_seek_clears_ring_and_emits_silence() {
        let mut mixer = AudioMixer::new(4096);
        mixer.push_decoded(&[100, 100, 100, 100]);
        mixer.mute_for_seek(44100);
        assert_eq!(mixer.ring_free_space(), 4096);

        let mut out = [0xAAu8; 16];
        let n = mixer.drain(&mut out);
        assert_eq!(n, 16);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn reset_timing_clears_an_armed_mute_window() {
        let mut mixer = AudioMixer::new(4096);
        mixer.mute_for_seek(44100);
        mixer.reset_timing();
        mixer.push_decoded(&[7, 7]);
        let mut out = [0xAAu8; 4];
        let n = mixer.drain(&mut out);
        assert_eq!(n, 4);
        assert_eq!(out, [7, 0, 7, 0]);
    }

    #[test]
    fn mute_window_eventually_expires() {
        let mut mixer = AudioMixer::new(4096);
        mixer.mute_for_seek(44100);
        let mut out = [0u8; 4096];
        // 93ms at 44.1kHz stereo 16-bit is well under 8192 bytes; two drains
        // of this size should exhaust the mute window.
        mixer.drain(&mut out);
        mixer.drain(&mut out);
        mixer.push_decoded(&[5, 5]);
        let mut out2 = [0xAAu8; 4];
        let n = mixer.drain(&mut out2);
        assert_eq!(n, 4);
        assert_eq!(out2, [5, 0, 5, 0]);
    }
}
