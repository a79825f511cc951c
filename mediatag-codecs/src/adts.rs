//! ADTS (Audio Data Transport Stream) fixed headers for raw AAC streams.

use mediatag_core::{Error, Result};

/// MPEG-4 sampling frequencies by index.
pub const SAMPLING_FREQUENCIES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Parsed ADTS fixed header (7 or 9 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    /// 1 for MPEG-2, 0 for MPEG-4.
    pub mpeg_version: u8,
    /// CRC absent flag.
    pub protection_absent: bool,
    /// Profile minus one is stored; this is the MPEG-4 audio object type.
    pub profile: u8,
    /// Sampling frequency index.
    pub sample_rate_index: u8,
    /// Channel configuration.
    pub channel_config: u8,
    /// Frame length including the header.
    pub frame_length: u16,
    /// Number of raw data blocks minus one.
    pub num_raw_data_blocks: u8,
    /// CRC when protection is present.
    pub crc: Option<u16>,
}

impl AdtsHeader {
    /// Parse an ADTS header from the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 7 {
            return Err(Error::invalid_data("ADTS header too short"));
        }
        if data[0] != 0xFF || data[1] & 0xF0 != 0xF0 {
            return Err(Error::invalid_data("no ADTS sync word"));
        }
        let mpeg_version = (data[1] >> 3) & 1;
        let layer = (data[1] >> 1) & 3;
        if layer != 0 {
            return Err(Error::invalid_data("ADTS layer field must be zero"));
        }
        let protection_absent = data[1] & 1 == 1;
        let profile = ((data[2] >> 6) & 3) + 1;
        let sample_rate_index = (data[2] >> 2) & 0xF;
        if sample_rate_index as usize >= SAMPLING_FREQUENCIES.len() {
            return Err(Error::invalid_data(format!(
                "reserved ADTS sampling frequency index {sample_rate_index}"
            )));
        }
        let channel_config = ((data[2] & 1) << 2) | ((data[3] >> 6) & 3);
        let frame_length = (((data[3] & 0x3) as u16) << 11)
            | ((data[4] as u16) << 3)
            | ((data[5] >> 5) as u16);
        let num_raw_data_blocks = data[6] & 0x3;
        let crc = if protection_absent {
            None
        } else {
            if data.len() < 9 {
                return Err(Error::invalid_data("ADTS CRC truncated"));
            }
            Some(u16::from_be_bytes([data[7], data[8]]))
        };
        Ok(Self {
            mpeg_version,
            protection_absent,
            profile,
            sample_rate_index,
            channel_config,
            frame_length,
            num_raw_data_blocks,
            crc,
        })
    }

    /// Sampling frequency in Hz.
    pub fn sample_rate(&self) -> u32 {
        SAMPLING_FREQUENCIES[self.sample_rate_index as usize]
    }

    /// Header length: 7 bytes, 9 with CRC.
    pub fn header_len(&self) -> usize {
        if self.protection_absent {
            7
        } else {
            9
        }
    }
}
