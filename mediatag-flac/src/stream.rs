//! Native FLAC streams: the `fLaC` magic and the metadata block chain.
//!
//! Each block is a 4-byte header (1-bit last-block flag, 7-bit type, 24-bit
//! length) plus payload. The editor touches `VORBIS_COMMENT` and `PICTURE`
//! blocks; every other block survives verbatim. Audio frames are never
//! decoded.

use mediatag_core::io::{BinaryReader, BinaryWriter};
use mediatag_core::{Diagnostics, Error, Picture, ProgressFeedback, Result};
use mediatag_vorbis::{comment::VorbisComment, make_picture_block, parse_picture_block};
use std::io::{Read, Seek, Write};

/// Stream magic.
pub const FLAC_MAGIC: [u8; 4] = *b"fLaC";

/// STREAMINFO payload length.
pub const STREAM_INFO_LEN: usize = 34;

const COPY_BUF_LEN: usize = 64 * 1024;

/// Metadata block types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// Mandatory first block.
    StreamInfo,
    /// Padding bytes.
    Padding,
    /// Application-specific data.
    Application,
    /// Seek table.
    SeekTable,
    /// Vorbis comment.
    VorbisComment,
    /// Cue sheet.
    CueSheet,
    /// Embedded picture.
    Picture,
    /// Reserved or unknown type.
    Unknown(u8),
}

impl BlockType {
    /// Decode a 7-bit type code.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => BlockType::StreamInfo,
            1 => BlockType::Padding,
            2 => BlockType::Application,
            3 => BlockType::SeekTable,
            4 => BlockType::VorbisComment,
            5 => BlockType::CueSheet,
            6 => BlockType::Picture,
            other => BlockType::Unknown(other),
        }
    }

    /// The 7-bit type code.
    pub fn code(&self) -> u8 {
        match self {
            BlockType::StreamInfo => 0,
            BlockType::Padding => 1,
            BlockType::Application => 2,
            BlockType::SeekTable => 3,
            BlockType::VorbisComment => 4,
            BlockType::CueSheet => 5,
            BlockType::Picture => 6,
            BlockType::Unknown(code) => *code,
        }
    }
}

/// Decoded STREAMINFO block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlacStreamInfo {
    /// Minimum block size in samples.
    pub min_block_size: u16,
    /// Maximum block size in samples.
    pub max_block_size: u16,
    /// Minimum frame size in bytes (0 = unknown).
    pub min_frame_size: u32,
    /// Maximum frame size in bytes (0 = unknown).
    pub max_frame_size: u32,
    /// Sample rate in Hz (20 bits).
    pub sample_rate: u32,
    /// Channel count (3 bits + 1).
    pub channel_count: u8,
    /// Bits per sample (5 bits + 1).
    pub bits_per_sample: u8,
    /// Total samples (36 bits, 0 = unknown).
    pub total_samples: u64,
    /// MD5 signature of the unencoded audio.
    pub md5: [u8; 16],
}

/// Parse a STREAMINFO payload.
pub fn parse_stream_info(data: &[u8]) -> Result<FlacStreamInfo> {
    if data.len() < STREAM_INFO_LEN {
        return Err(Error::invalid_data("STREAMINFO block too short"));
    }
    let packed = u64::from_be_bytes(data[10..18].try_into().unwrap());
    Ok(FlacStreamInfo {
        min_block_size: u16::from_be_bytes(data[0..2].try_into().unwrap()),
        max_block_size: u16::from_be_bytes(data[2..4].try_into().unwrap()),
        min_frame_size: u32::from_be_bytes([0, data[4], data[5], data[6]]),
        max_frame_size: u32::from_be_bytes([0, data[7], data[8], data[9]]),
        sample_rate: (packed >> 44) as u32,
        channel_count: ((packed >> 41) & 0x7) as u8 + 1,
        bits_per_sample: ((packed >> 36) & 0x1F) as u8 + 1,
        total_samples: packed & 0xF_FFFF_FFFF,
        md5: data[18..34].try_into().unwrap(),
    })
}

/// One block of the on-disk chain.
#[derive(Debug, Clone)]
pub struct BlockRecord {
    /// Block type.
    pub block_type: BlockType,
    /// Absolute offset of the block header.
    pub offset: u64,
    /// Payload length.
    pub data_len: u32,
    /// Whether the last-block flag was set.
    pub last: bool,
}

/// A parsed native FLAC stream.
#[derive(Debug, Default)]
pub struct FlacStream {
    /// Decoded STREAMINFO.
    pub stream_info: FlacStreamInfo,
    /// Raw STREAMINFO payload, kept for byte-identical rewrites.
    stream_info_raw: Vec<u8>,
    /// The Vorbis comment, if present or staged.
    pub comment: Option<VorbisComment>,
    /// Embedded pictures in chain order.
    pub pictures: Vec<Picture>,
    /// The on-disk chain.
    blocks: Vec<BlockRecord>,
    /// Offset of the first audio frame.
    audio_offset: u64,
}

impl FlacStream {
    /// Parse the metadata chain of a native FLAC stream.
    pub fn parse<R: Read + Seek>(
        reader: &mut BinaryReader<R>,
        diag: &mut Diagnostics,
    ) -> Result<Self> {
        let magic = reader.read_fourcc()?;
        if magic != FLAC_MAGIC {
            return Err(Error::invalid_data("stream does not start with fLaC"));
        }
        let mut stream = FlacStream::default();
        let mut last = false;
        let mut first = true;
        while !last {
            let offset = reader.position()?;
            let header = reader.read_u32_be()?;
            last = header & 0x8000_0000 != 0;
            let block_type = BlockType::from_code(((header >> 24) & 0x7F) as u8);
            let data_len = header & 0x00FF_FFFF;
            stream.blocks.push(BlockRecord {
                block_type,
                offset,
                data_len,
                last,
            });
            if first && block_type != BlockType::StreamInfo {
                return Err(Error::invalid_data(
                    "first FLAC metadata block is not STREAMINFO",
                ));
            }
            first = false;
            match block_type {
                BlockType::StreamInfo => {
                    stream.stream_info_raw = reader.read_bytes(data_len as usize)?;
                    stream.stream_info = parse_stream_info(&stream.stream_info_raw)?;
                }
                BlockType::VorbisComment => {
                    let payload = reader.read_bytes(data_len as usize)?;
                    if stream.comment.is_some() {
                        diag.warn("parsing FLAC stream", "second VORBIS_COMMENT block ignored");
                    } else {
                        stream.comment = Some(VorbisComment::parse(&payload, false, diag)?);
                    }
                }
                BlockType::Picture => {
                    let payload = reader.read_bytes(data_len as usize)?;
                    match parse_picture_block(&payload) {
                        Ok(picture) => stream.pictures.push(picture),
                        Err(e) => diag.critical(
                            "parsing FLAC stream",
                            format!("unreadable PICTURE block skipped: {e}"),
                        ),
                    }
                }
                _ => {
                    reader.skip(data_len as u64)?;
                }
            }
        }
        stream.audio_offset = reader.position()?;
        tracing::debug!(
            blocks = stream.blocks.len(),
            pictures = stream.pictures.len(),
            "parsed FLAC metadata chain"
        );
        Ok(stream)
    }

    /// The comment, created empty on first access.
    pub fn comment_mut(&mut self) -> &mut VorbisComment {
        self.comment
            .get_or_insert_with(|| VorbisComment::new("mediatag"))
    }

    /// Build the new metadata chain (without the magic): STREAMINFO verbatim,
    /// preserved blocks, the staged comment, pictures before any padding.
    fn build_chain(&self, reader_blocks: &mut dyn FnMut(&BlockRecord) -> Result<Vec<u8>>) -> Result<Vec<(u8, Vec<u8>)>> {
        let mut chain: Vec<(u8, Vec<u8>)> = Vec::new();
        chain.push((BlockType::StreamInfo.code(), self.stream_info_raw.clone()));
        // Preserved foreign blocks keep their relative order after STREAMINFO.
        for block in &self.blocks {
            match block.block_type {
                BlockType::StreamInfo
                | BlockType::VorbisComment
                | BlockType::Picture
                | BlockType::Padding => {}
                _ => chain.push((block.block_type.code(), reader_blocks(block)?)),
            }
        }
        if let Some(comment) = &self.comment {
            let payload = comment.make(false);
            if payload.len() > 0x00FF_FFFF {
                return Err(Error::invalid_data(
                    "VORBIS_COMMENT block exceeds the 24-bit length limit",
                ));
            }
            chain.push((BlockType::VorbisComment.code(), payload));
        }
        for picture in &self.pictures {
            let payload = make_picture_block(picture);
            if payload.len() > 0x00FF_FFFF {
                return Err(Error::invalid_data(
                    "PICTURE block exceeds the 24-bit length limit",
                ));
            }
            chain.push((BlockType::Picture.code(), payload));
        }
        Ok(chain)
    }

    /// Whether the staged chain fits the existing metadata region.
    pub fn can_apply_in_place<R: Read + Seek>(
        &self,
        reader: &mut BinaryReader<R>,
    ) -> Result<bool> {
        let mut fetch = |block: &BlockRecord| -> Result<Vec<u8>> {
            reader.seek_to(block.offset + 4)?;
            reader.read_bytes(block.data_len as usize)
        };
        let chain = self.build_chain(&mut fetch)?;
        let new_len: u64 = chain.iter().map(|(_, payload)| 4 + payload.len() as u64).sum();
        let old_len = self.audio_offset - 4;
        Ok(fits_with_padding(new_len, old_len))
    }

    /// Apply the staged chain into the existing metadata region of `stream`,
    /// absorbing the size difference into a PADDING block. Returns `false`
    /// when it does not fit.
    pub fn try_apply_in_place<S: Read + Write + Seek>(
        &self,
        stream: &mut S,
        progress: &ProgressFeedback,
        diag: &mut Diagnostics,
    ) -> Result<bool> {
        let mut reader = BinaryReader::new(&mut *stream);
        let mut fetch = |block: &BlockRecord| -> Result<Vec<u8>> {
            reader.seek_to(block.offset + 4)?;
            reader.read_bytes(block.data_len as usize)
        };
        let chain = self.build_chain(&mut fetch)?;
        let new_len: u64 = chain.iter().map(|(_, payload)| 4 + payload.len() as u64).sum();
        let old_len = self.audio_offset - 4;
        if !fits_with_padding(new_len, old_len) {
            return Ok(false);
        }
        progress.check()?;
        progress.report("updating FLAC metadata in place", 0.0);

        let padding = old_len - new_len;
        let bytes = serialize_chain(&chain, padding)?;
        debug_assert_eq!(bytes.len() as u64, old_len);
        stream.seek(std::io::SeekFrom::Start(4))?;
        stream.write_all(&bytes)?;
        stream.flush()?;
        progress.report("updating FLAC metadata in place", 100.0);
        diag.info("writing FLAC stream", "metadata chain rewritten in place");
        Ok(true)
    }

    /// Stream a full rewrite: magic, new chain with fresh padding, audio
    /// frames copied verbatim.
    pub fn rewrite<R: Read + Seek, W: Write + Seek>(
        &self,
        reader: &mut BinaryReader<R>,
        writer: &mut BinaryWriter<W>,
        preferred_padding: u32,
        progress: &ProgressFeedback,
        diag: &mut Diagnostics,
    ) -> Result<()> {
        let mut fetch = |block: &BlockRecord| -> Result<Vec<u8>> {
            reader.seek_to(block.offset + 4)?;
            reader.read_bytes(block.data_len as usize)
        };
        let chain = self.build_chain(&mut fetch)?;

        progress.check()?;
        progress.report("writing FLAC metadata", 0.0);
        writer.write_bytes(&FLAC_MAGIC)?;
        let bytes = serialize_chain(&chain, preferred_padding as u64)?;
        writer.write_bytes(&bytes)?;
        progress.report("writing FLAC metadata", 50.0);

        progress.check()?;
        let total = reader.stream_len()?;
        reader.seek_to(self.audio_offset)?;
        let mut remaining = total - self.audio_offset;
        let mut buf = [0u8; COPY_BUF_LEN];
        while remaining > 0 {
            progress.check()?;
            let chunk = remaining.min(COPY_BUF_LEN as u64) as usize;
            reader.read_exact(&mut buf[..chunk])?;
            writer.write_bytes(&buf[..chunk])?;
            remaining -= chunk as u64;
        }
        writer.flush()?;
        progress.report("writing FLAC metadata", 100.0);
        diag.info("writing FLAC stream", "stream rewritten");
        Ok(())
    }
}

/// The metadata region can absorb `new_len` bytes when the leftover is zero
/// or at least a PADDING block header.
fn fits_with_padding(new_len: u64, old_len: u64) -> bool {
    new_len <= old_len && (old_len - new_len == 0 || old_len - new_len >= 4)
}

/// Serialise a chain, appending `padding` bytes as a PADDING block (header
/// included) and setting the last-block flag on the final block.
fn serialize_chain(chain: &[(u8, Vec<u8>)], padding: u64) -> Result<Vec<u8>> {
    if chain.is_empty() {
        return Err(Error::invalid_data("empty FLAC metadata chain"));
    }
    let mut out = Vec::new();
    let with_padding = padding >= 4;
    for (index, (code, payload)) in chain.iter().enumerate() {
        let last = !with_padding && index == chain.len() - 1;
        push_block_header(&mut out, *code, payload.len() as u32, last);
        out.extend_from_slice(payload);
    }
    if with_padding {
        let payload_len = (padding - 4) as u32;
        push_block_header(&mut out, BlockType::Padding.code(), payload_len, true);
        out.extend(std::iter::repeat(0u8).take(payload_len as usize));
    }
    Ok(out)
}

fn push_block_header(out: &mut Vec<u8>, code: u8, len: u32, last: bool) {
    let header = ((last as u32) << 31) | ((code as u32) << 24) | (len & 0x00FF_FFFF);
    out.extend_from_slice(&header.to_be_bytes());
}
