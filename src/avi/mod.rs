//! RIFF/AVI container parsing (§4.2): header extraction plus the three
//! competing `idx1` offset conventions different encoders have shipped.

use crate::error::{MediaError, MediaResult};
use std::io::{Read, Seek, SeekFrom};

/// Chunk counts beyond this are silently truncated rather than rejected.
pub const MAX_INDEX_ENTRIES: usize = 360_000;

/// Bytes of codec-private data captured past the BITMAPINFOHEADER in a
/// video `strf` chunk.
pub const MAX_VOL_EXTRADATA: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Pcm,
    MsAdpcm,
    Mp3,
    Disabled,
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkEntry {
    pub offset: u64,
    pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexConvention {
    /// Relative to the first byte after the `movi` FOURCC.
    MoviRelative,
    /// Absolute file offsets.
    Absolute,
    /// Relative to `movi` start minus 4 (legacy encoder bug).
    MoviRelativeMinusFour,
}

pub struct AviStream {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub vol_extradata: Vec<u8>,
    pub audio_format: AudioFormat,
    pub audio_sample_rate: u32,
    pub audio_channels: u16,
    pub audio_bits_per_sample: u16,
    pub audio_block_align: u16,
    pub audio_samples_per_block: u16,
    pub video_chunks: Vec<ChunkEntry>,
    pub audio_chunks: Vec<ChunkEntry>,
}

struct RawHeader {
    fourcc: [u8; 4],
    size: u32,
}

fn read_header<R: Read>(r: &mut R) -> MediaResult<RawHeader> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(|_| MediaError::IoShort {
        expected: 8,
        got: 0,
    })?;
    Ok(RawHeader {
        fourcc: [buf[0], buf[1], buf[2], buf[3]],
        size: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
    })
}

fn read_u32<R: Read>(r: &mut R) -> MediaResult<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|_| MediaError::IoShort {
        expected: 4,
        got: 0,
    })?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u16<R: Read>(r: &mut R) -> MediaResult<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf).map_err(|_| MediaError::IoShort {
        expected: 2,
        got: 0,
    })?;
    Ok(u16::from_le_bytes(buf))
}

struct HdrlInfo {
    micros_per_frame: u32,
    avih_width: u32,
    avih_height: u32,
}

struct StreamInfo {
    is_video: bool,
    is_audio: bool,
    width: u32,
    height: u32,
    vol_extradata: Vec<u8>,
    audio_format: AudioFormat,
    audio_sample_rate: u32,
    audio_channels: u16,
    audio_bits_per_sample: u16,
    audio_block_align: u16,
    audio_samples_per_block: u16,
}

impl Default for StreamInfo {
    fn default() -> Self {
        Self {
            is_video: false,
            is_audio: false,
            width: 0,
            height: 0,
            vol_extradata: Vec::new(),
            audio_format: AudioFormat::Disabled,
            audio_sample_rate: 0,
            audio_channels: 0,
            audio_bits_per_sample: 0,
            audio_block_align: 0,
            audio_samples_per_block: 0,
        }
    }
}

/// Parse a RIFF/AVI container, returning media parameters plus a chunk
/// index. Media data itself is never read here; only offsets and sizes.
pub fn open<R: Read + Seek>(reader: &mut R) -> MediaResult<AviStream> {
    let riff = read_header(reader)?;
    if &riff.fourcc != b"RIFF" {
        return Err(MediaError::FormatUnsupported("not a RIFF container".into()));
    }
    let mut form_type = [0u8; 4];
    reader
        .read_exact(&mut form_type)
        .map_err(|_| MediaError::IoShort { expected: 4, got: 0 })?;
    if &form_type != b"AVI " {
        return Err(MediaError::FormatUnsupported("RIFF form is not AVI".into()));
    }

    let mut hdrl: Option<HdrlInfo> = None;
    let mut streams: Vec<StreamInfo> = Vec::new();
    let mut movi_data_start: Option<u64> = None;
    let mut movi_size: u64 = 0;
    let mut idx1_entries: Vec<(([u8; 4]), u32, u32, u32)> = Vec::new();

    loop {
        let header = match read_header(reader) {
            Ok(h) => h,
            Err(_) => break, // reached EOF; top-level walk is done
        };

        if &header.fourcc == b"LIST" {
            let mut list_type = [0u8; 4];
            reader
                .read_exact(&mut list_type)
                .map_err(|_| MediaError::IoShort { expected: 4, got: 0 })?;
            let list_body_len = header.size.saturating_sub(4) as u64;
            let list_start = reader
                .stream_position()
                .map_err(|_| MediaError::DecodeError("seek failed".into()))?;

            match &list_type {
                b"hdrl" => {
                    hdrl = Some(parse_hdrl(reader, list_body_len, &mut streams)?);
                }
                b"movi" => {
                    movi_data_start = Some(list_start);
                    movi_size = list_body_len;
                    reader
                        .seek(SeekFrom::Current(list_body_len as i64))
                        .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
                }
                _ => {
                    reader
                        .seek(SeekFrom::Current(list_body_len as i64))
                        .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
                }
            }
        } else if &header.fourcc == b"idx1" {
            idx1_entries = parse_idx1(reader, header.size as u64)?;
        } else {
            let skip = header.size as i64 + (header.size as i64 & 1);
            reader
                .seek(SeekFrom::Current(skip))
                .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
        }
    }

    let hdrl = hdrl.ok_or_else(|| MediaError::FormatUnsupported("missing hdrl".into()))?;
    let movi_data_start =
        movi_data_start.ok_or_else(|| MediaError::FormatUnsupported("missing movi".into()))?;

    let video = streams.iter().find(|s| s.is_video);
    let audio = streams.iter().find(|s| s.is_audio);

    let width = video.map(|s| s.width).unwrap_or(hdrl.avih_width);
    let height = video.map(|s| s.height).unwrap_or(hdrl.avih_height);
    let vol_extradata = video.map(|s| s.vol_extradata.clone()).unwrap_or_default();

    let fps = if hdrl.micros_per_frame == 0 {
        1.0
    } else {
        (1_000_000.0 / hdrl.micros_per_frame as f64).max(1.0)
    };

    let (mut video_chunks, mut audio_chunks) = if !idx1_entries.is_empty() {
        build_index_from_idx1(reader, movi_data_start, &idx1_entries)?
    } else {
        walk_movi_linear(reader, movi_data_start, movi_size)?
    };
    video_chunks.truncate(MAX_INDEX_ENTRIES);
    audio_chunks.truncate(MAX_INDEX_ENTRIES);

    Ok(AviStream {
        width,
        height,
        fps,
        vol_extradata,
        audio_format: audio.map(|s| s.audio_format).unwrap_or(AudioFormat::Disabled),
        audio_sample_rate: audio.map(|s| s.audio_sample_rate).unwrap_or(0),
        audio_channels: audio.map(|s| s.audio_channels).unwrap_or(0),
        audio_bits_per_sample: audio.map(|s| s.audio_bits_per_sample).unwrap_or(0),
        audio_block_align: audio.map(|s| s.audio_block_align).unwrap_or(0),
        audio_samples_per_block: audio.map(|s| s.audio_samples_per_block).unwrap_or(0),
        video_chunks,
        audio_chunks,
    })
}

fn parse_hdrl<R: Read + Seek>(
    reader: &mut R,
    body_len: u64,
    streams: &mut Vec<StreamInfo>,
) -> MediaResult<HdrlInfo> {
    let list_start = reader
        .stream_position()
        .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
    let mut micros_per_frame = 0u32;
    let mut avih_width = 0u32;
    let mut avih_height = 0u32;

    loop {
        let pos = reader
            .stream_position()
            .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
        if pos >= list_start + body_len {
            break;
        }
        let header = read_header(reader)?;
        if &header.fourcc == b"avih" {
            micros_per_frame = read_u32(reader)?;
            let _max_bytes_per_sec = read_u32(reader)?;
            let _padding_granularity = read_u32(reader)?;
            let _flags = read_u32(reader)?;
            let _total_frames = read_u32(reader)?;
            let _initial_frames = read_u32(reader)?;
            let _streams = read_u32(reader)?;
            let _suggested_buffer_size = read_u32(reader)?;
            avih_width = read_u32(reader)?;
            avih_height = read_u32(reader)?;
            let consumed = 4 * 10;
            let remaining = header.size as i64 - consumed as i64;
            if remaining > 0 {
                reader
                    .seek(SeekFrom::Current(remaining))
                    .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
            }
            if header.size & 1 == 1 {
                reader
                    .seek(SeekFrom::Current(1))
                    .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
            }
        } else if &header.fourcc == b"LIST" {
            let mut list_type = [0u8; 4];
            reader
                .read_exact(&mut list_type)
                .map_err(|_| MediaError::IoShort { expected: 4, got: 0 })?;
            let sub_len = header.size.saturating_sub(4) as u64;
            if &list_type == b"strl" {
                streams.push(parse_strl(reader, sub_len)?);
            } else {
                reader
                    .seek(SeekFrom::Current(sub_len as i64))
                    .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
            }
        } else {
            let skip = header.size as i64 + (header.size as i64 & 1);
            reader
                .seek(SeekFrom::Current(skip))
                .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
        }
    }

    Ok(HdrlInfo {
        micros_per_frame,
        avih_width,
        avih_height,
    })
}

fn parse_strl<R: Read + Seek>(reader: &mut R, body_len: u64) -> MediaResult<StreamInfo> {
    let list_start = reader
        .stream_position()
        .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
    let mut info = StreamInfo::default();
    let mut fcc_type = [0u8; 4];

    loop {
        let pos = reader
            .stream_position()
            .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
        if pos >= list_start + body_len {
            break;
        }
        let header = read_header(reader)?;
        if &header.fourcc == b"strh" {
            reader
                .read_exact(&mut fcc_type)
                .map_err(|_| MediaError::IoShort { expected: 4, got: 0 })?;
            info.is_video = &fcc_type == b"vids";
            info.is_audio = &fcc_type == b"auds";
            let remaining = header.size as i64 - 4;
            if remaining > 0 {
                reader
                    .seek(SeekFrom::Current(remaining))
                    .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
            }
            if header.size & 1 == 1 {
                reader
                    .seek(SeekFrom::Current(1))
                    .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
            }
        } else if &header.fourcc == b"strf" {
            if info.is_video {
                parse_strf_video(reader, header.size, &mut info)?;
            } else if info.is_audio {
                parse_strf_audio(reader, header.size, &mut info)?;
            } else {
                let skip = header.size as i64 + (header.size as i64 & 1);
                reader
                    .seek(SeekFrom::Current(skip))
                    .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
            }
        } else {
            let skip = header.size as i64 + (header.size as i64 & 1);
            reader
                .seek(SeekFrom::Current(skip))
                .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
        }
    }

    Ok(info)
}

fn parse_strf_video<R: Read + Seek>(
    reader: &mut R,
    chunk_size: u32,
    info: &mut StreamInfo,
) -> MediaResult<()> {
    let _bi_size = read_u32(reader)?;
    let width = read_u32(reader)?;
    let height_raw = read_u32(reader)?;
    let _bi_planes = read_u16(reader)?;
    let _bi_bit_count = read_u16(reader)?;
    let _bi_compression = read_u32(reader)?;
    let _bi_size_image = read_u32(reader)?;
    let _bi_x_pels = read_u32(reader)?;
    let _bi_y_pels = read_u32(reader)?;
    let _bi_clr_used = read_u32(reader)?;
    let _bi_clr_important = read_u32(reader)?;

    info.width = width;
    info.height = (height_raw as i32).unsigned_abs();

    const BITMAPINFOHEADER_LEN: u32 = 40;
    let extra_len = chunk_size.saturating_sub(BITMAPINFOHEADER_LEN) as usize;
    let capped = extra_len.min(MAX_VOL_EXTRADATA);
    let mut vol = vec![0u8; capped];
    if capped > 0 {
        reader
            .read_exact(&mut vol)
            .map_err(|_| MediaError::IoShort { expected: capped, got: 0 })?;
    }
    if extra_len > capped {
        reader
            .seek(SeekFrom::Current((extra_len - capped) as i64))
            .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
    }
    info.vol_extradata = vol;

    if chunk_size & 1 == 1 {
        reader
            .seek(SeekFrom::Current(1))
            .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
    }
    Ok(())
}

fn parse_strf_audio<R: Read + Seek>(
    reader: &mut R,
    chunk_size: u32,
    info: &mut StreamInfo,
) -> MediaResult<()> {
    let format_tag = read_u16(reader)?;
    let channels = read_u16(reader)?;
    let sample_rate = read_u32(reader)?;
    let _avg_bytes_per_sec = read_u32(reader)?;
    let block_align = read_u16(reader)?;
    let bits_per_sample = read_u16(reader)?;

    info.audio_format = match format_tag {
        0x0001 => AudioFormat::Pcm,
        0x0002 => AudioFormat::MsAdpcm,
        0x0055 => AudioFormat::Mp3,
        _ => AudioFormat::Disabled,
    };
    info.audio_channels = channels;
    info.audio_sample_rate = sample_rate;
    info.audio_block_align = block_align;
    info.audio_bits_per_sample = bits_per_sample;

    const WAVEFORMATEX_CORE_LEN: u32 = 16;
    let mut consumed = WAVEFORMATEX_CORE_LEN;
    if chunk_size > WAVEFORMATEX_CORE_LEN {
        let cb_size = read_u16(reader)?;
        consumed += 2;
        if info.audio_format == AudioFormat::MsAdpcm && cb_size >= 2 {
            info.audio_samples_per_block = read_u16(reader)?;
            consumed += 2;
            let remaining_extra = cb_size.saturating_sub(2) as i64;
            if remaining_extra > 0 {
                reader
                    .seek(SeekFrom::Current(remaining_extra))
                    .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
            }
            consumed += remaining_extra as u32;
        } else if cb_size > 0 {
            reader
                .seek(SeekFrom::Current(cb_size as i64))
                .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
            consumed += cb_size as u32;
        }
    }

    let remaining = chunk_size as i64 - consumed as i64;
    if remaining > 0 {
        reader
            .seek(SeekFrom::Current(remaining))
            .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
    }
    if chunk_size & 1 == 1 {
        reader
            .seek(SeekFrom::Current(1))
            .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
    }
    Ok(())
}

fn parse_idx1<R: Read>(
    reader: &mut R,
    size: u64,
) -> MediaResult<Vec<([u8; 4], u32, u32, u32)>> {
    let count = (size / 16) as usize;
    let mut entries = Vec::with_capacity(count.min(MAX_INDEX_ENTRIES * 2));
    for _ in 0..count {
        let mut ckid = [0u8; 4];
        reader
            .read_exact(&mut ckid)
            .map_err(|_| MediaError::IoShort { expected: 4, got: 0 })?;
        let flags = read_u32(reader)?;
        let offset = read_u32(reader)?;
        let chunk_size = read_u32(reader)?;
        entries.push((ckid, flags, offset, chunk_size));
    }
    Ok(entries)
}

fn looks_like_stream_chunk_tag(tag: &[u8; 4]) -> bool {
    let digits_ok = tag[0].is_ascii_digit() && tag[1].is_ascii_digit();
    if !digits_ok {
        return false;
    }
    let a = tag[2].to_ascii_lowercase();
    let b = tag[3].to_ascii_lowercase();
    (a == b'd' && (b == b'c' || b == b'b')) || (a == b'w' && b == b'b')
}

fn candidate_offset(convention: IndexConvention, movi_data_start: u64, entry_offset: u32) -> u64 {
    match convention {
        IndexConvention::MoviRelative => movi_data_start + entry_offset as u64,
        IndexConvention::Absolute => entry_offset as u64,
        IndexConvention::MoviRelativeMinusFour => {
            (movi_data_start + entry_offset as u64).saturating_sub(4)
        }
    }
}

fn detect_convention<R: Read + Seek>(
    reader: &mut R,
    movi_data_start: u64,
    entries: &[([u8; 4], u32, u32, u32)],
) -> MediaResult<(IndexConvention, bool)> {
    let first_video = entries
        .iter()
        .find(|(ckid, ..)| looks_like_stream_chunk_tag(ckid) && ckid[2].to_ascii_lowercase() != b'w');
    let probe_entry = first_video.or_else(|| entries.first());
    let probe_entry = match probe_entry {
        Some(e) => *e,
        None => return Ok((IndexConvention::MoviRelative, true)),
    };

    for convention in [
        IndexConvention::MoviRelative,
        IndexConvention::Absolute,
        IndexConvention::MoviRelativeMinusFour,
    ] {
        let base = candidate_offset(convention, movi_data_start, probe_entry.2);
        for &with_header_adjust in &[true, false] {
            let probe_pos = if with_header_adjust { base + 8 } else { base };
            if let Ok(tag) = peek_tag(reader, probe_pos) {
                if looks_like_stream_chunk_tag(&tag) {
                    return Ok((convention, with_header_adjust));
                }
            }
        }
    }
    // All three conventions failed to find a plausible header; fall back to
    // convention 1 with the +8 adjustment per the documented default.
    Ok((IndexConvention::MoviRelative, true))
}

fn peek_tag<R: Read + Seek>(reader: &mut R, pos: u64) -> MediaResult<[u8; 4]> {
    reader
        .seek(SeekFrom::Start(pos))
        .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
    let mut tag = [0u8; 4];
    reader
        .read_exact(&mut tag)
        .map_err(|_| MediaError::IoShort { expected: 4, got: 0 })?;
    Ok(tag)
}

fn build_index_from_idx1<R: Read + Seek>(
    reader: &mut R,
    movi_data_start: u64,
    entries: &[([u8; 4], u32, u32, u32)],
) -> MediaResult<(Vec<ChunkEntry>, Vec<ChunkEntry>)> {
    let (convention, with_header_adjust) = detect_convention(reader, movi_data_start, entries)?;
    let adjust = if with_header_adjust { 8 } else { 0 };

    let mut video_chunks = Vec::new();
    let mut audio_chunks = Vec::new();
    for (ckid, _flags, offset, chunk_size) in entries {
        if !looks_like_stream_chunk_tag(ckid) {
            continue;
        }
        let header_pos = candidate_offset(convention, movi_data_start, *offset) + adjust;
        let data_pos = header_pos + 8;
        let entry = ChunkEntry {
            offset: data_pos,
            size: *chunk_size,
        };
        let kind = ckid[2].to_ascii_lowercase();
        if kind == b'w' {
            audio_chunks.push(entry);
        } else {
            video_chunks.push(entry);
        }
    }
    Ok((video_chunks, audio_chunks))
}

fn walk_movi_linear<R: Read + Seek>(
    reader: &mut R,
    movi_data_start: u64,
    movi_size: u64,
) -> MediaResult<(Vec<ChunkEntry>, Vec<ChunkEntry>)> {
    let mut video_chunks = Vec::new();
    let mut audio_chunks = Vec::new();
    let mut pos = movi_data_start;
    let end = movi_data_start + movi_size;

    reader
        .seek(SeekFrom::Start(pos))
        .map_err(|_| MediaError::DecodeError("seek failed".into()))?;

    while pos + 8 <= end {
        let header = read_header(reader)?;
        let data_pos = pos + 8;
        if looks_like_stream_chunk_tag(&header.fourcc) {
            let entry = ChunkEntry {
                offset: data_pos,
                size: header.size,
            };
            let kind = header.fourcc[2].to_ascii_lowercase();
            if kind == b'w' {
                audio_chunks.push(entry);
            } else {
                video_chunks.push(entry);
            }
        }
        let advance = 8 + header.size as u64 + (header.size as u64 & 1);
        pos += advance;
        reader
            .seek(SeekFrom::Start(pos))
            .map_err(|_| MediaError::DecodeError("seek failed".into()))?;
    }

    Ok((video_chunks, audio_chunks))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_chunk_tags_match_spec_patterns() {
        assert!(looks_like_stream_chunk_tag(b"00dc"));
        assert!(looks_like_stream_chunk_tag(b"00db"));
        assert!(looks_like_stream_chunk_tag(b"01wb"));
        assert!(looks_like_stream_chunk_tag(b"01WB"));
        assert!(!looks_like_stream_chunk_tag(b"LIST"));
        assert!(!looks_like_stream_chunk_tag(b"JUNK"));
    }

    #[test]
    fn candidate_offset_conventions_differ() {
        let movi = 1000u64;
        assert_eq!(
            candidate_offset(IndexConvention::MoviRelative, movi, 50),
            1050
        );
        assert_eq!(candidate_offset(IndexConvention::Absolute, movi, 50), 50);
        assert_eq!(
            candidate_offset(IndexConvention::MoviRelativeMinusFour, movi, 50),
            1046
        );
    }

    #[test]
    fn fps_clamps_to_at_least_one() {
        let hdrl = HdrlInfo {
            micros_per_frame: 0,
            avih_width: 320,
            avih_height: 240,
        };
        let fps = if hdrl.micros_per_frame == 0 {
            1.0
        } else {
            (1_000_000.0 / hdrl.micros_per_frame as f64).max(1.0)
        };
        assert_eq!(fps, 1.0);
    }

    #[test]
    fn index_entry_counts_are_capped() {
        let mut v = vec![
            ChunkEntry {
                offset: 0,
                size: 10
            };
            MAX_INDEX_ENTRIES + 500
        ];
        v.truncate(MAX_INDEX_ENTRIES);
        assert_eq!(v.len(), MAX_INDEX_ENTRIES);
    }
}
