//! MPEG audio frame headers, including Xing/Info and VBRI side data.
//!
//! The sync word is the top 11 bits of the 32-bit header. Bitrate and
//! sample-rate lookup tables are fixed by the MPEG standard; a bitrate index
//! of `1111` is invalid and rejected.

use mediatag_core::io::BinaryReader;
use mediatag_core::{Error, Result};
use std::io::{Read, Seek};

/// Sync mask: top 11 bits set.
const SYNC_MASK: u32 = 0xFFE0_0000;

/// Bitrate tables in kbit/s, indexed `[mpeg2][layer-1][bitrate index]`.
/// Index 0 means "free format", index 15 is invalid.
const BITRATE_TABLE: [[[u16; 15]; 3]; 2] = [
    [
        [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448],
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384],
        [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
    ],
    [
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
    ],
];

/// Channel mode of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegChannelMode {
    /// Two independent channels.
    Stereo,
    /// Joint stereo.
    JointStereo,
    /// Two mono channels.
    DualChannel,
    /// Single channel.
    SingleChannel,
}

impl MpegChannelMode {
    /// Channel count.
    pub fn channels(&self) -> u16 {
        match self {
            MpegChannelMode::SingleChannel => 1,
            _ => 2,
        }
    }
}

/// Xing header flag word bits.
mod xing {
    pub const FRAMES: u32 = 0x1;
    pub const BYTES: u32 = 0x2;
    pub const TOC: u32 = 0x4;
    pub const QUALITY: u32 = 0x8;
}

/// Decoded Xing/Info side data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XingHeader {
    /// Whether the header was an "Info" (CBR) header.
    pub is_info: bool,
    /// Total frame count, if present.
    pub frame_count: Option<u32>,
    /// Total byte count, if present.
    pub byte_count: Option<u32>,
    /// Whether a 100-byte TOC was present.
    pub has_toc: bool,
    /// Quality indicator, if present.
    pub quality: Option<u32>,
}

/// Decoded VBRI side data (Fraunhofer encoders).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VbriHeader {
    /// Version.
    pub version: u16,
    /// Total byte count.
    pub byte_count: u32,
    /// Total frame count.
    pub frame_count: u32,
}

/// A parsed MPEG audio frame header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MpegAudioFrame {
    header: u32,
    /// Xing/Info side data, if present.
    pub xing: Option<XingHeader>,
    /// VBRI side data, if present.
    pub vbri: Option<VbriHeader>,
}

impl MpegAudioFrame {
    /// Parse the frame header at the current position, plus its Xing/Info or
    /// VBRI side data when present.
    pub fn parse<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let start = reader.position()?;
        let header = reader.read_u32_be()?;
        let mut frame = MpegAudioFrame {
            header,
            xing: None,
            vbri: None,
        };
        if !frame.is_valid() {
            return Err(Error::invalid_data(format!(
                "no MPEG audio frame at offset {start}"
            )));
        }

        // Xing/Info sits after the side information, whose size depends on
        // version and channel mode.
        let xing_offset = start + 4 + frame.side_info_len();
        reader.seek_to(xing_offset)?;
        let mut magic = [0u8; 4];
        if reader.read_exact(&mut magic).is_ok() {
            if &magic == b"Xing" || &magic == b"Info" {
                let flags = reader.read_u32_be()?;
                let mut parsed = XingHeader {
                    is_info: &magic == b"Info",
                    ..XingHeader::default()
                };
                if flags & xing::FRAMES != 0 {
                    parsed.frame_count = Some(reader.read_u32_be()?);
                }
                if flags & xing::BYTES != 0 {
                    parsed.byte_count = Some(reader.read_u32_be()?);
                }
                if flags & xing::TOC != 0 {
                    parsed.has_toc = true;
                    reader.skip(100)?;
                }
                if flags & xing::QUALITY != 0 {
                    parsed.quality = Some(reader.read_u32_be()?);
                }
                frame.xing = Some(parsed);
            }
        }
        if frame.xing.is_none() {
            // VBRI sits at a fixed 32 bytes after the header.
            reader.seek_to(start + 4 + 32)?;
            let mut magic = [0u8; 4];
            if reader.read_exact(&mut magic).is_ok() && &magic == b"VBRI" {
                let version = reader.read_u16_be()?;
                reader.skip(4)?; // delay and quality
                let byte_count = reader.read_u32_be()?;
                let frame_count = reader.read_u32_be()?;
                frame.vbri = Some(VbriHeader {
                    version,
                    byte_count,
                    frame_count,
                });
            }
        }
        Ok(frame)
    }

    /// Whether the header carries the sync word and valid field values.
    pub fn is_valid(&self) -> bool {
        self.header & SYNC_MASK == SYNC_MASK
            && self.raw_version() != 1 // reserved
            && self.raw_layer() != 0 // reserved
            && self.bitrate_index() != 15
            && self.sample_rate() != 0
    }

    fn raw_version(&self) -> u32 {
        (self.header >> 19) & 0x3
    }

    fn raw_layer(&self) -> u32 {
        (self.header >> 17) & 0x3
    }

    fn bitrate_index(&self) -> usize {
        ((self.header >> 12) & 0xF) as usize
    }

    /// MPEG version: 1.0, 2.0 or 2.5; 0.0 when reserved.
    pub fn mpeg_version(&self) -> f64 {
        match self.raw_version() {
            3 => 1.0,
            2 => 2.0,
            0 => 2.5,
            _ => 0.0,
        }
    }

    /// Layer: 1, 2 or 3; 0 when reserved.
    pub fn layer(&self) -> u8 {
        match self.raw_layer() {
            3 => 1,
            2 => 2,
            1 => 3,
            _ => 0,
        }
    }

    /// Bitrate in kbit/s; 0 for free format.
    pub fn bitrate(&self) -> u16 {
        let index = self.bitrate_index();
        if index == 0 || index >= 15 {
            return 0;
        }
        let version_row = if self.raw_version() == 3 { 0 } else { 1 };
        let layer_row = (self.layer() as usize).saturating_sub(1).min(2);
        BITRATE_TABLE[version_row][layer_row][index]
    }

    /// Sample rate in Hz; 0 when the index is reserved.
    pub fn sample_rate(&self) -> u32 {
        let family = match (self.header >> 10) & 0x3 {
            0 => 44100,
            1 => 48000,
            2 => 32000,
            _ => return 0,
        };
        match self.raw_version() {
            3 => family,
            // MPEG-2 halves, MPEG-2.5 quarters the MPEG-1 rates; index 0
            // under MPEG-2 is 22050 Hz.
            2 => family / 2,
            0 => family / 4,
            _ => 0,
        }
    }

    /// Whether the padding bit is set.
    pub fn has_padding(&self) -> bool {
        self.header & 0x200 != 0
    }

    /// Padding size in bytes: 4 for layer I, 1 otherwise.
    pub fn padding_len(&self) -> u32 {
        if !self.has_padding() {
            0
        } else if self.layer() == 1 {
            4
        } else {
            1
        }
    }

    /// Whether a CRC protects the frame.
    pub fn is_protected_by_crc(&self) -> bool {
        self.header & 0x1_0000 == 0
    }

    /// Channel mode.
    pub fn channel_mode(&self) -> MpegChannelMode {
        match (self.header >> 6) & 0x3 {
            0 => MpegChannelMode::Stereo,
            1 => MpegChannelMode::JointStereo,
            2 => MpegChannelMode::DualChannel,
            _ => MpegChannelMode::SingleChannel,
        }
    }

    /// Samples per frame: 384 for layer I, 1152 for layer II, and 1152/576
    /// for layer III under MPEG-1/MPEG-2+.
    pub fn sample_count(&self) -> u32 {
        match self.layer() {
            1 => 384,
            2 => 1152,
            3 => {
                if self.raw_version() == 3 {
                    1152
                } else {
                    576
                }
            }
            _ => 0,
        }
    }

    /// Frame size in bytes: `(12·bitrate/sample_rate + padding)·4` for
    /// layer I, `144·bitrate/sample_rate + padding` for layers II and III.
    pub fn frame_size(&self) -> u32 {
        let bitrate = self.bitrate() as u32 * 1000;
        let sample_rate = self.sample_rate();
        if bitrate == 0 || sample_rate == 0 {
            return 0;
        }
        match self.layer() {
            1 => (12 * bitrate / sample_rate + self.padding_len()) * 4,
            2 | 3 => 144 * bitrate / sample_rate + self.padding_len(),
            _ => 0,
        }
    }

    /// Length of the side information between the header and any Xing/Info
    /// field, per version and channel mode.
    fn side_info_len(&self) -> u64 {
        let mono = self.channel_mode() == MpegChannelMode::SingleChannel;
        if self.raw_version() == 3 {
            if mono {
                17
            } else {
                32
            }
        } else if mono {
            9
        } else {
            17
        }
    }

    /// Whether the stream is variable-bitrate according to the side data.
    pub fn is_vbr(&self) -> bool {
        matches!(self.xing, Some(xing) if !xing.is_info) || self.vbri.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// MPEG-1 Layer III, 128 kbit/s, 44100 Hz, joint stereo, no padding.
    const HEADER_V1_L3: u32 = 0xFFFB_9064;

    fn frame_from_header(header: u32) -> MpegAudioFrame {
        MpegAudioFrame {
            header,
            xing: None,
            vbri: None,
        }
    }

    #[test]
    fn test_v1_layer3_fields() {
        let frame = frame_from_header(HEADER_V1_L3);
        assert!(frame.is_valid());
        assert_eq!(frame.mpeg_version(), 1.0);
        assert_eq!(frame.layer(), 3);
        assert_eq!(frame.bitrate(), 128);
        assert_eq!(frame.sample_rate(), 44100);
        assert_eq!(frame.channel_mode(), MpegChannelMode::JointStereo);
        assert_eq!(frame.sample_count(), 1152);
        assert_eq!(frame.frame_size(), 417);
        assert!(!frame.is_protected_by_crc());
    }

    #[test]
    fn test_layer1_bounds() {
        // Layer I bitrates run 32..448 kbit/s.
        for index in 1u32..15 {
            let header = 0xFFFE_0000 | (index << 12); // MPEG-1 layer I, 44100
            let frame = frame_from_header(header);
            assert!(frame.is_valid());
            assert!((32..=448).contains(&frame.bitrate()), "{index}");
        }
    }

    #[test]
    fn test_bad_bitrate_index_rejected() {
        let header = 0xFFFB_F064; // index 1111
        assert!(!frame_from_header(header).is_valid());
        let mut reader = BinaryReader::new(Cursor::new(header.to_be_bytes().to_vec()));
        assert!(MpegAudioFrame::parse(&mut reader).is_err());
    }

    #[test]
    fn test_mpeg2_sample_rates() {
        // MPEG-2, sample rate index 0 -> 22050 Hz.
        let header = 0xFFF3_9000;
        let frame = frame_from_header(header);
        assert_eq!(frame.mpeg_version(), 2.0);
        assert_eq!(frame.sample_rate(), 22050);
        // MPEG-2.5, same index -> 11025 Hz.
        let header = 0xFFE3_9000;
        let frame = frame_from_header(header);
        assert_eq!(frame.mpeg_version(), 2.5);
        assert_eq!(frame.sample_rate(), 11025);
    }

    #[test]
    fn test_reserved_version_invalid() {
        assert!(!frame_from_header(0xFFEB_9064).is_valid());
    }

    #[test]
    fn test_xing_header_parse() {
        let mut data = HEADER_V1_L3.to_be_bytes().to_vec();
        data.extend_from_slice(&[0u8; 32]); // side info (joint stereo, MPEG-1)
        data.extend_from_slice(b"Xing");
        data.extend_from_slice(&(0x3u32).to_be_bytes()); // frames + bytes
        data.extend_from_slice(&1000u32.to_be_bytes());
        data.extend_from_slice(&417_000u32.to_be_bytes());
        data.extend_from_slice(&[0u8; 64]);

        let mut reader = BinaryReader::new(Cursor::new(data));
        let frame = MpegAudioFrame::parse(&mut reader).unwrap();
        let xing = frame.xing.unwrap();
        assert!(!xing.is_info);
        assert_eq!(xing.frame_count, Some(1000));
        assert_eq!(xing.byte_count, Some(417_000));
        assert!(!xing.has_toc);
        assert!(frame.is_vbr());
    }

    #[test]
    fn test_vbri_header_parse() {
        let mut data = HEADER_V1_L3.to_be_bytes().to_vec();
        data.extend_from_slice(&[0u8; 32]);
        data.extend_from_slice(b"VBRI");
        data.extend_from_slice(&1u16.to_be_bytes()); // version
        data.extend_from_slice(&[0u8; 4]); // delay + quality
        data.extend_from_slice(&500_000u32.to_be_bytes());
        data.extend_from_slice(&1200u32.to_be_bytes());
        data.extend_from_slice(&[0u8; 16]);

        let mut reader = BinaryReader::new(Cursor::new(data));
        let frame = MpegAudioFrame::parse(&mut reader).unwrap();
        let vbri = frame.vbri.unwrap();
        assert_eq!(vbri.byte_count, 500_000);
        assert_eq!(vbri.frame_count, 1200);
        assert!(frame.is_vbr());
    }
}
