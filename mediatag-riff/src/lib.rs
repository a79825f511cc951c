//! # mediatag-riff
//!
//! RIFF/WAVE support for the mediatag metadata library: the 12-byte RIFF
//! header, `fmt ` and `data` chunks, and an embedded `id3 ` chunk parsed
//! with the ID3v2 machinery.

use mediatag_core::io::{BinaryReader, BinaryWriter};
use mediatag_core::{
    Diagnostics, Error, MediaFormat, MediaType, ProgressFeedback, Result, TrackInfo,
};
use mediatag_id3::Id3v2Tag;
use std::io::{Read, Seek, Write};
use std::time::Duration;

/// WAVE format codes from `fmt `.
mod format_tag {
    pub const PCM: u16 = 0x0001;
    pub const IEEE_FLOAT: u16 = 0x0003;
    pub const ALAW: u16 = 0x0006;
    pub const MULAW: u16 = 0x0007;
    pub const MPEG_LAYER3: u16 = 0x0055;
    pub const EXTENSIBLE: u16 = 0xFFFE;
}

/// One chunk of the RIFF body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiffChunk {
    /// Chunk id.
    pub fourcc: [u8; 4],
    /// Absolute offset of the chunk header.
    pub offset: u64,
    /// Payload length (without the pad byte).
    pub data_len: u32,
}

impl RiffChunk {
    /// Total length on disk, including the header and odd-length pad byte.
    pub fn total_len(&self) -> u64 {
        8 + self.data_len as u64 + (self.data_len % 2) as u64
    }
}

/// A parsed WAVE file.
#[derive(Debug, Default)]
pub struct WavContainer {
    /// The single audio track described by `fmt `.
    pub track: TrackInfo,
    /// The embedded ID3v2 tag, if any edits or an `id3 ` chunk exist.
    pub tag: Option<Id3v2Tag>,
    chunks: Vec<RiffChunk>,
}

impl WavContainer {
    /// Parse a RIFF/WAVE stream.
    pub fn parse<R: Read + Seek>(
        reader: &mut BinaryReader<R>,
        diag: &mut Diagnostics,
    ) -> Result<Self> {
        let magic = reader.read_fourcc()?;
        if magic != *b"RIFF" {
            return Err(Error::invalid_data("no RIFF header"));
        }
        let riff_len = reader.read_u32_le()? as u64;
        let form = reader.read_fourcc()?;
        if form != *b"WAVE" {
            return Err(Error::unsupported(format!(
                "RIFF form type {:?} is not WAVE",
                String::from_utf8_lossy(&form)
            )));
        }
        let file_len = reader.stream_len()?;
        let riff_end = (8 + riff_len).min(file_len);

        let mut container = WavContainer::default();
        let mut data_len = 0u64;
        let mut byte_rate = 0u32;
        while reader.position()? + 8 <= riff_end {
            let offset = reader.position()?;
            let fourcc = reader.read_fourcc()?;
            let mut len = reader.read_u32_le()?;
            if offset + 8 + len as u64 > riff_end {
                diag.warn(
                    "parsing RIFF file",
                    format!(
                        "chunk {} exceeds the RIFF span and was clamped",
                        String::from_utf8_lossy(&fourcc)
                    ),
                );
                len = (riff_end - offset - 8) as u32;
            }
            let chunk = RiffChunk {
                fourcc,
                offset,
                data_len: len,
            };
            container.chunks.push(chunk);
            match &fourcc {
                b"fmt " => {
                    let payload = reader.read_bytes(len.min(40) as usize)?;
                    byte_rate = container.parse_fmt(&payload)?;
                    reader.seek_to(offset + chunk.total_len())?;
                }
                b"id3 " | b"ID3 " => {
                    let payload = reader.read_bytes(len as usize)?;
                    match Id3v2Tag::parse(&payload, diag) {
                        Ok(tag) => container.tag = Some(tag),
                        Err(e) => diag.critical(
                            "parsing RIFF file",
                            format!("unreadable id3 chunk skipped: {e}"),
                        ),
                    }
                    reader.seek_to(offset + chunk.total_len())?;
                }
                b"data" => {
                    data_len = len as u64;
                    reader.seek_to(offset + chunk.total_len())?;
                }
                _ => {
                    reader.seek_to(offset + chunk.total_len())?;
                }
            }
        }
        if container.track.sample_rate == 0 {
            return Err(Error::no_data("no fmt chunk found"));
        }
        if byte_rate > 0 && data_len > 0 {
            container.track.duration =
                Duration::from_secs_f64(data_len as f64 / byte_rate as f64);
        }
        container.track.header_valid = true;
        Ok(container)
    }

    /// Decode `fmt ` and return the byte rate for duration computation.
    fn parse_fmt(&mut self, data: &[u8]) -> Result<u32> {
        if data.len() < 16 {
            return Err(Error::invalid_data("fmt chunk too short"));
        }
        let mut format = u16::from_le_bytes(data[..2].try_into().unwrap());
        let channels = u16::from_le_bytes(data[2..4].try_into().unwrap());
        let sample_rate = u32::from_le_bytes(data[4..8].try_into().unwrap());
        let byte_rate = u32::from_le_bytes(data[8..12].try_into().unwrap());
        let bits = u16::from_le_bytes(data[14..16].try_into().unwrap());
        if format == format_tag::EXTENSIBLE && data.len() >= 26 {
            // The real format sits in the first two GUID bytes.
            format = u16::from_le_bytes(data[24..26].try_into().unwrap());
        }
        self.track = TrackInfo {
            media_type: MediaType::Audio,
            format: match format {
                format_tag::PCM => MediaFormat::Pcm { float: false },
                format_tag::IEEE_FLOAT => MediaFormat::Pcm { float: true },
                format_tag::ALAW => MediaFormat::Other("A-law PCM".into()),
                format_tag::MULAW => MediaFormat::Other("mu-law PCM".into()),
                format_tag::MPEG_LAYER3 => MediaFormat::MpegAudio {
                    version: 1.0,
                    layer: 3,
                },
                other => MediaFormat::Other(format!("WAVE format {other:#06x}")),
            },
            sample_rate,
            channel_count: channels,
            bit_depth: bits,
            bitrate: byte_rate as f64 * 8.0 / 1000.0,
            ..TrackInfo::new()
        };
        Ok(byte_rate)
    }

    /// The tag, created empty on first access.
    pub fn tag_mut(&mut self) -> &mut Id3v2Tag {
        self.tag.get_or_insert_with(Id3v2Tag::new)
    }

    /// Stream a rewrite with the staged tag into `writer`. The `id3 ` chunk
    /// is replaced in place in the chunk order, or appended at the end when
    /// the file had none.
    pub fn rewrite<R: Read + Seek, W: Write + Seek>(
        &self,
        reader: &mut BinaryReader<R>,
        writer: &mut BinaryWriter<W>,
        progress: &ProgressFeedback,
        diag: &mut Diagnostics,
    ) -> Result<()> {
        let tag_bytes = match &self.tag {
            Some(tag) => {
                let bytes = tag.make(tag.preferred_write_version(), 0, diag)?;
                if bytes.len() > 10 + mediatag_id3::synch::MAX_SYNCHSAFE as usize {
                    return Err(Error::invalid_data("ID3v2 tag exceeds the synchsafe range"));
                }
                Some(bytes)
            }
            None => None,
        };

        // Body first, sizes after.
        let mut body: Vec<u8> = Vec::new();
        let mut tag_placed = false;
        for chunk in &self.chunks {
            progress.check()?;
            match &chunk.fourcc {
                b"id3 " | b"ID3 " => {
                    if let Some(bytes) = tag_bytes.as_ref().filter(|_| !tag_placed) {
                        push_chunk(&mut body, *b"id3 ", bytes);
                    }
                    tag_placed = true;
                }
                _ => {
                    reader.seek_to(chunk.offset + 8)?;
                    let payload = reader.read_bytes(chunk.data_len as usize)?;
                    push_chunk(&mut body, chunk.fourcc, &payload);
                }
            }
        }
        if !tag_placed {
            if let Some(bytes) = tag_bytes.as_ref() {
                push_chunk(&mut body, *b"id3 ", bytes);
            }
        }

        progress.report("writing RIFF file", 50.0);
        writer.write_bytes(b"RIFF")?;
        writer.write_u32_le((4 + body.len()) as u32)?;
        writer.write_bytes(b"WAVE")?;
        writer.write_bytes(&body)?;
        writer.flush()?;
        progress.report("writing RIFF file", 100.0);
        Ok(())
    }
}

fn push_chunk(out: &mut Vec<u8>, fourcc: [u8; 4], payload: &[u8]) {
    out.extend_from_slice(&fourcc);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
}
