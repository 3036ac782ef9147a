//! Open-file glue tying the AVI demuxer, the XviD pipeline, and the audio
//! decoders together into the per-tick decode step the video player needs
//! (§4.2-§4.6). Owns the file handle and both codec contexts for one open
//! clip; the scheduler creates one of these per `VideoPlayer::open`.

use crate::audio::adpcm;
use crate::audio::mixer::AudioMixer;
use crate::audio::mp3::{DecodeOutcome as Mp3Outcome, Mp3Decoder};
use crate::audio::pcm::PcmCursor;
use crate::audio::ring::AUDIO_RING_VIDEO_SIZE;
use crate::avi::{self, AudioFormat, AviStream};
use crate::color::{FrameColorParams, YuvTables};
use crate::error::{MediaError, MediaResult};
use crate::xvid::XvidDecoder;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

/// Bounded at 320x240x2 bytes per §4.3 step 1.
const MAX_FRAME_CHUNK_BYTES: usize = 320 * 240 * 2;

enum AudioDecoder {
    Pcm(PcmCursor),
    MsAdpcm,
    Mp3(Box<Mp3Decoder>),
    Disabled,
}

pub struct VideoSession {
    file: File,
    pub stream: AviStream,
    xvid: XvidDecoder,
    vol_sent: bool,
    mixer: AudioMixer,
    audio_decoder: AudioDecoder,
    next_audio_chunk: usize,
    scratch: Vec<u8>,
}

impl VideoSession {
    pub fn open(path: &str) -> MediaResult<Self> {
        let mut file = File::open(path).map_err(|_| MediaError::NotFound(path.to_string()))?;
        let stream = avi::open(&mut file)?;
        let xvid = XvidDecoder::new(stream.width, stream.height)?;

        let audio_decoder = match stream.audio_format {
            AudioFormat::Pcm => {
                AudioDecoder::Pcm(PcmCursor::new(stream.audio_channels, stream.audio_bits_per_sample))
            }
            AudioFormat::MsAdpcm => AudioDecoder::MsAdpcm,
            AudioFormat::Mp3 => AudioDecoder::Mp3(Box::new(Mp3Decoder::new())),
            AudioFormat::Disabled => AudioDecoder::Disabled,
        };

        Ok(Self {
            file,
            stream,
            xvid,
            vol_sent: false,
            mixer: AudioMixer::new(AUDIO_RING_VIDEO_SIZE),
            audio_decoder,
            next_audio_chunk: 0,
            scratch: vec![0u8; MAX_FRAME_CHUNK_BYTES],
        })
    }

    pub fn total_frames(&self) -> u64 {
        self.stream.video_chunks.len() as u64
    }

    pub fn fps(&self) -> f64 {
        self.stream.fps
    }

    /// Decode the video chunk at `frame_index` directly into the shared
    /// framebuffer via the active color pipeline (§4.3 steps 1-3, §4.4).
    pub fn decode_video_frame(
        &mut self,
        frame_index: u64,
        yuv_tables: &YuvTables,
        params: &FrameColorParams,
        fb: &mut [u16],
        fb_w: usize,
        fb_h: usize,
    ) -> MediaResult<()> {
        let _ = yuv_tables;
        let entry = self
            .stream
            .video_chunks
            .get(frame_index as usize)
            .ok_or_else(|| MediaError::DecodeError("frame index past end of stream".into()))?;
        let entry = *entry;

        let size = (entry.size as usize).min(self.scratch.len());
        self.file
            .seek(SeekFrom::Start(entry.offset))
            .map_err(|_| MediaError::IoShort { expected: size, got: 0 })?;
        let buf = &mut self.scratch[..size];
        self.file
            .read_exact(buf)
            .map_err(|_| MediaError::IoShort { expected: size, got: 0 })?;

        if !self.vol_sent && !self.stream.vol_extradata.is_empty() {
            self.xvid.feed_vol(&self.stream.vol_extradata)?;
            self.vol_sent = true;
        }

        self.xvid.decode_frame(buf)?;
        let (y, u, v, w, h) = self.xvid.planes();
        crate::color::yuv420_to_rgb565(params, y, u, v, w as usize, h as usize, fb, fb_w, fb_h);
        Ok(())
    }

    /// Rewind decode state to the start of the clip (Repeat play mode, §4.6).
    pub fn rewind(&mut self) {
        self.vol_sent = false;
        self.next_audio_chunk = 0;
        self.mixer.mute_for_seek(self.stream.audio_sample_rate.max(1));
    }

    /// Seek-induced audio cursor recompute + mute window (§4.5/§4.6): jump the
    /// audio chunk cursor to roughly the same point in the stream as
    /// `video_frame` and arm the mute window to suppress the splice glitch.
    pub fn seek_audio_cursor(&mut self, video_frame: u64) {
        let total_video = self.total_frames().max(1);
        let total_audio = self.stream.audio_chunks.len() as u64;
        let target = (video_frame * total_audio / total_video).min(total_audio);
        self.next_audio_chunk = target as usize;
        self.mixer.mute_for_seek(self.stream.audio_sample_rate.max(1));
    }

    /// Pull and decode whole audio chunks until the ring holds at least half
    /// its capacity (§4.5 ring contract), or the stream runs out.
    pub fn pump_audio(&mut self) -> MediaResult<()> {
        if matches!(self.audio_decoder, AudioDecoder::Disabled) {
            return Ok(());
        }

        if let AudioDecoder::Pcm(cursor) = &mut self.audio_decoder {
            cursor.seek_to_chunk(self.next_audio_chunk, 0);
            let offsets: Vec<u64> = self.stream.audio_chunks.iter().map(|e| e.offset).collect();
            let sizes: Vec<u32> = self.stream.audio_chunks.iter().map(|e| e.size).collect();
            while self.mixer.ring_free_space() >= AUDIO_RING_VIDEO_SIZE / 2 {
                let want = self.mixer.ring_free_space().min(self.scratch.len());
                let bytes = cursor.decode_into(&mut self.file, &offsets, &sizes, want)?;
                if bytes.is_empty() {
                    break;
                }
                self.mixer.push_decoded(&le_bytes_to_i16(&bytes));
            }
            self.next_audio_chunk = cursor.chunk_idx();
            return Ok(());
        }

        while self.mixer.ring_free_space() >= AUDIO_RING_VIDEO_SIZE / 2 {
            let Some(entry) = self.stream.audio_chunks.get(self.next_audio_chunk).copied() else {
                break;
            };
            self.next_audio_chunk += 1;

            let size = (entry.size as usize).min(self.scratch.len());
            if self.file.seek(SeekFrom::Start(entry.offset)).is_err() {
                break;
            }
            let buf = &mut self.scratch[..size];
            if self.file.read_exact(buf).is_err() {
                break;
            }

            match &mut self.audio_decoder {
                AudioDecoder::Pcm(_) => unreachable!("handled above"),
                AudioDecoder::MsAdpcm => {
                    let channels = self.stream.audio_channels as usize;
                    let samples_per_block = self.stream.audio_samples_per_block as usize;
                    if let Ok(samples) = adpcm::decode_block(buf, channels, samples_per_block) {
                        self.mixer.push_decoded(&samples);
                    }
                }
                AudioDecoder::Mp3(decoder) => {
                    decoder.feed(buf);
                    loop {
                        match decoder.decode_one() {
                            Ok(Mp3Outcome::Frame { samples }) => self.mixer.push_decoded(&samples),
                            Ok(Mp3Outcome::NeedMoreInput) => break,
                            Ok(Mp3Outcome::RecoverableError) => continue,
                            Err(_) => break,
                        }
                    }
                }
                AudioDecoder::Disabled => unreachable!(),
            }
        }
        Ok(())
    }

    pub fn drain_audio(&mut self, out: &mut [u8]) -> usize {
        self.mixer.drain(out)
    }
}

/// [`PcmCursor::decode_into`] already mono-duplicates at the byte level, so
/// this is a plain little-endian byte->sample conversion, not a full PCM
/// decode path.
fn le_bytes_to_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
