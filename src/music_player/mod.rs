//! Background-music collaborator (§1, §4.5): decode + ring feed only.
//!
//! The playlist-browsing UI is an out-of-scope collaborator; this module
//! owns just enough playlist state (current track, advance-on-end) to know
//! what to decode next, plus the actual decode-and-feed path the scheduler's
//! per-tick audio pump contract depends on.

use crate::audio::adpcm;
use crate::audio::mixer::AudioMixer;
use crate::audio::mp3::Mp3Decoder;
use crate::audio::ring::AUDIO_RING_MUSIC_SIZE;
use crate::error::{MediaError, MediaResult};
use std::io::Cursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackFormat {
    Wav,
    Mp3,
    Adpcm,
}

enum Decoder {
    Wav { channels: u16 },
    Mp3(Box<Mp3Decoder>),
    Adpcm { channels: usize, samples_per_block: usize },
}

pub struct MusicPlayer {
    mixer: AudioMixer,
    playlist: Vec<String>,
    current_index: usize,
    playing: bool,
    foreground: bool,
    decoder: Option<Decoder>,
}

impl Default for MusicPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl MusicPlayer {
    pub fn new() -> Self {
        Self {
            mixer: AudioMixer::new(AUDIO_RING_MUSIC_SIZE),
            playlist: Vec::new(),
            current_index: 0,
            playing: false,
            foreground: false,
            decoder: None,
        }
    }

    pub fn set_playlist(&mut self, paths: Vec<String>) {
        self.playlist = paths;
        self.current_index = 0;
    }

    pub fn current_path(&self) -> Option<&str> {
        self.playlist.get(self.current_index).map(String::as_str)
    }

    pub fn advance_next(&mut self) {
        if self.playlist.is_empty() {
            return;
        }
        self.current_index = (self.current_index + 1) % self.playlist.len();
        self.decoder = None;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub fn is_foreground(&self) -> bool {
        self.foreground
    }

    pub fn set_foreground(&mut self, foreground: bool) {
        self.foreground = foreground;
    }

    pub fn begin_track(&mut self, format: TrackFormat, channels: u16, samples_per_block: u16) {
        self.decoder = Some(match format {
            TrackFormat::Wav => Decoder::Wav { channels },
            TrackFormat::Mp3 => Decoder::Mp3(Box::new(Mp3Decoder::new())),
            TrackFormat::Adpcm => Decoder::Adpcm {
                channels: channels as usize,
                samples_per_block: samples_per_block as usize,
            },
        });
    }

    /// Refill should only happen once the ring has drained below half
    /// capacity (§4.5 ring contract).
    pub fn should_refill(&self) -> bool {
        self.mixer.ring_free_space() >= AUDIO_RING_MUSIC_SIZE / 2
    }

    /// Open a `.wav` track and feed its whole decoded sample set into the
    /// ring in one shot. Background jingles/loops in this scope are small
    /// enough that streaming the container in chunks (the way AVI audio and
    /// image files are) isn't worth the bookkeeping.
    pub fn load_wav_file(&mut self, path: &str) -> MediaResult<()> {
        let bytes = std::fs::read(path).map_err(|_| MediaError::NotFound(path.to_string()))?;
        let reader = hound::WavReader::new(Cursor::new(bytes))
            .map_err(|e| MediaError::FormatUnsupported(e.to_string()))?;
        let spec = reader.spec();
        if spec.channels != 1 && spec.channels != 2 {
            return Err(MediaError::FormatUnsupported(format!(
                "{}-channel wav",
                spec.channels
            )));
        }

        let mut samples = Vec::new();
        for sample in reader.into_samples::<i16>() {
            samples.push(sample.map_err(|e| MediaError::DecodeError(e.to_string()))?);
        }

        self.begin_track(TrackFormat::Wav, spec.channels, 0);
        self.feed_wav_samples(&samples);
        Ok(())
    }

    pub fn feed_wav_samples(&mut self, interleaved: &[i16]) {
        let Some(Decoder::Wav { channels }) = &self.decoder else {
            return;
        };
        if *channels == 1 {
            let stereo: Vec<i16> = interleaved.iter().flat_map(|&s| [s, s]).collect();
            self.mixer.push_decoded(&stereo);
        } else {
            self.mixer.push_decoded(interleaved);
        }
    }

    pub fn feed_mp3_input(&mut self, chunk: &[u8]) -> MediaResult<()> {
        let Some(Decoder::Mp3(decoder)) = &mut self.decoder else {
            return Ok(());
        };
        decoder.feed(chunk);
        loop {
            match decoder.decode_one()? {
                crate::audio::mp3::DecodeOutcome::Frame { samples } => {
                    self.mixer.push_decoded(&samples);
                }
                crate::audio::mp3::DecodeOutcome::NeedMoreInput => break,
                crate::audio::mp3::DecodeOutcome::RecoverableError => continue,
            }
        }
        Ok(())
    }

    pub fn feed_adpcm_block(&mut self, block: &[u8]) -> MediaResult<()> {
        let Some(Decoder::Adpcm { channels, samples_per_block }) = &self.decoder else {
            return Ok(());
        };
        let samples = adpcm::decode_block(block, *channels, *samples_per_block)?;
        self.mixer.push_decoded(&samples);
        Ok(())
    }

    /// Called every tick regardless of foreground state (§4.1 priority
    /// ladder note: "non-foreground music continues to pump audio").
    pub fn drain(&mut self, out: &mut [u8]) -> usize {
        self.mixer.drain(out)
    }

    /// Drop any armed seek-mute countdown. Called after a caller has just
    /// flushed the ring down by other means (image decode's pre-stall flush,
    /// §4.8) so playback resumes clean instead of carrying over stale state.
    pub fn reset_timing_reference(&mut self) {
        self.mixer.reset_timing();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_next_wraps_around_playlist() {
        let mut mp = MusicPlayer::new();
        mp.set_playlist(vec!["a.wav".into(), "b.mp3".into()]);
        mp.advance_next();
        assert_eq!(mp.current_path(), Some("b.mp3"));
        mp.advance_next();
        assert_eq!(mp.current_path(), Some("a.wav"));
    }

    #[test]
    fn advance_next_on_empty_playlist_is_a_no_op() {
        let mut mp = MusicPlayer::new();
        mp.advance_next();
        assert_eq!(mp.current_path(), None);
    }

    #[test]
    fn mono_wav_samples_are_duplicated_to_stereo_before_the_ring() {
        let mut mp = MusicPlayer::new();
        mp.begin_track(TrackFormat::Wav, 1, 0);
        mp.feed_wav_samples(&[10, 20]);
        let mut out = [0u8; 8];
        let n = mp.drain(&mut out);
        assert_eq!(n, 8);
    }

    #[test]
    fn load_wav_file_reads_spec_and_feeds_samples_via_hound() {
        let path = std::env::temp_dir().join("frogcore_test_load_wav_file.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(10i16).unwrap();
        writer.write_sample(20i16).unwrap();
        writer.finalize().unwrap();

        let mut mp = MusicPlayer::new();
        mp.load_wav_file(path.to_str().unwrap()).unwrap();
        let mut out = [0u8; 8];
        assert_eq!(mp.drain(&mut out), 8);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn background_music_keeps_playing_while_not_foreground() {
        let mut mp = MusicPlayer::new();
        mp.set_playing(true);
        mp.set_foreground(false);
        assert!(mp.is_playing());
        assert!(!mp.is_foreground());
    }

    #[test]
    fn should_refill_once_ring_drops_below_half_capacity() {
        let mp = MusicPlayer::new();
        assert!(mp.should_refill()); // starts empty
    }

    #[test]
    fn reset_timing_reference_delegates_to_the_mixer() {
        let mut mp = MusicPlayer::new();
        mp.begin_track(TrackFormat::Wav, 2, 0);
        mp.reset_timing_reference();
        mp.feed_wav_samples(&[3, 4]);
        let mut out = [0xAAu8; 4];
        assert_eq!(mp.drain(&mut out), 4);
        assert_eq!(out, [3, 0, 4, 0]);
    }
}
