//! AV1 codec configuration (`av1C`) and the IVF file header.

use mediatag_core::{Error, Result};

/// Parsed AV1CodecConfigurationRecord.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Av1ConfigRecord {
    /// seq_profile (0 = Main, 1 = High, 2 = Professional).
    pub profile: u8,
    /// seq_level_idx_0.
    pub level: u8,
    /// seq_tier_0.
    pub high_tier: bool,
    /// Bit depth: 8, 10 or 12.
    pub bit_depth: u8,
    /// Monochrome flag.
    pub monochrome: bool,
}

impl Av1ConfigRecord {
    /// Parse an `av1C` payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::invalid_data("av1C record too short"));
        }
        if data[0] & 0x80 == 0 || data[0] & 0x7F != 1 {
            return Err(Error::unsupported_version(format!(
                "av1C marker/version byte {:#04x}",
                data[0]
            )));
        }
        let profile = data[1] >> 5;
        let level = data[1] & 0x1F;
        let high_tier = data[2] & 0x80 != 0;
        let high_bitdepth = data[2] & 0x40 != 0;
        let twelve_bit = data[2] & 0x20 != 0;
        let bit_depth = match (high_bitdepth, twelve_bit) {
            (false, _) => 8,
            (true, false) => 10,
            (true, true) => 12,
        };
        let monochrome = data[2] & 0x10 != 0;
        Ok(Self {
            profile,
            level,
            high_tier,
            bit_depth,
            monochrome,
        })
    }

    /// Profile name.
    pub fn profile_name(&self) -> &'static str {
        match self.profile {
            0 => "Main",
            1 => "High",
            2 => "Professional",
            _ => "Unknown",
        }
    }
}

/// Parsed IVF file header (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IvfHeader {
    /// Codec FourCC (`AV01`, `VP90`, `VP80`).
    pub fourcc: [u8; 4],
    /// Frame width in pixels.
    pub width: u16,
    /// Frame height in pixels.
    pub height: u16,
    /// Timebase denominator.
    pub timebase_den: u32,
    /// Timebase numerator.
    pub timebase_num: u32,
    /// Number of frames.
    pub frame_count: u32,
}

impl IvfHeader {
    /// Header length.
    pub const LEN: usize = 32;

    /// Parse an IVF header from the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::LEN {
            return Err(Error::invalid_data("IVF header too short"));
        }
        if &data[..4] != b"DKIF" {
            return Err(Error::invalid_data("no DKIF magic"));
        }
        let version = u16::from_le_bytes([data[4], data[5]]);
        if version != 0 {
            return Err(Error::unsupported_version(format!("IVF version {version}")));
        }
        Ok(Self {
            fourcc: data[8..12].try_into().unwrap(),
            width: u16::from_le_bytes([data[12], data[13]]),
            height: u16::from_le_bytes([data[14], data[15]]),
            timebase_den: u32::from_le_bytes(data[16..20].try_into().unwrap()),
            timebase_num: u32::from_le_bytes(data[20..24].try_into().unwrap()),
            frame_count: u32::from_le_bytes(data[24..28].try_into().unwrap()),
        })
    }

    /// Frames per second from the timebase, when defined.
    pub fn fps(&self) -> Option<f64> {
        if self.timebase_num == 0 {
            None
        } else {
            Some(self.timebase_den as f64 / self.timebase_num as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_av1c() {
        // marker+version, profile 0 level 8, high bitdepth.
        let record = Av1ConfigRecord::parse(&[0x81, 0x08, 0x40, 0x00]).unwrap();
        assert_eq!(record.profile, 0);
        assert_eq!(record.profile_name(), "Main");
        assert_eq!(record.level, 8);
        assert_eq!(record.bit_depth, 10);
        assert!(!record.monochrome);
        assert!(Av1ConfigRecord::parse(&[0x01, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_ivf() {
        let mut data = Vec::new();
        data.extend_from_slice(b"DKIF");
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&32u16.to_le_bytes());
        data.extend_from_slice(b"AV01");
        data.extend_from_slice(&1920u16.to_le_bytes());
        data.extend_from_slice(&1080u16.to_le_bytes());
        data.extend_from_slice(&30u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&300u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        let header = IvfHeader::parse(&data).unwrap();
        assert_eq!(&header.fourcc, b"AV01");
        assert_eq!(header.width, 1920);
        assert_eq!(header.height, 1080);
        assert_eq!(header.fps(), Some(30.0));
        assert_eq!(header.frame_count, 300);
    }
}
