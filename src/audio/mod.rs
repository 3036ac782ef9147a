//! Audio decode, ring buffering, and mixing (§4.5).

pub mod adpcm;
pub mod mad_sys;
pub mod mixer;
pub mod mp3;
pub mod pcm;
pub mod ring;

pub use mixer::AudioMixer;
pub use ring::{AudioRing, AUDIO_RING_MUSIC_SIZE, AUDIO_RING_VIDEO_SIZE};
