//! AVC decoder configuration records (the `avcC` atom payload).

use mediatag_core::{Error, Result};

/// Parsed AVCDecoderConfigurationRecord.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcConfigRecord {
    /// profile_idc.
    pub profile: u8,
    /// profile compatibility flags.
    pub profile_compat: u8,
    /// level_idc (e.g. 41 for level 4.1).
    pub level: u8,
    /// NAL unit length field size in bytes (1, 2 or 4).
    pub nal_length_size: u8,
    /// Sequence parameter sets.
    pub sps: Vec<Vec<u8>>,
    /// Picture parameter sets.
    pub pps: Vec<Vec<u8>>,
}

impl AvcConfigRecord {
    /// Parse an `avcC` payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 7 {
            return Err(Error::invalid_data("avcC record too short"));
        }
        if data[0] != 1 {
            return Err(Error::unsupported_version(format!(
                "avcC configuration version {}",
                data[0]
            )));
        }
        let profile = data[1];
        let profile_compat = data[2];
        let level = data[3];
        let nal_length_size = (data[4] & 0x3) + 1;

        let mut pos = 5usize;
        let sps_count = (data[pos] & 0x1F) as usize;
        pos += 1;
        let mut sps = Vec::with_capacity(sps_count);
        for _ in 0..sps_count {
            let (set, next) = read_parameter_set(data, pos)?;
            sps.push(set);
            pos = next;
        }
        let pps_count = *data
            .get(pos)
            .ok_or_else(|| Error::invalid_data("avcC record truncated"))?
            as usize;
        pos += 1;
        let mut pps = Vec::with_capacity(pps_count);
        for _ in 0..pps_count {
            let (set, next) = read_parameter_set(data, pos)?;
            pps.push(set);
            pos = next;
        }
        Ok(Self {
            profile,
            profile_compat,
            level,
            nal_length_size,
            sps,
            pps,
        })
    }

    /// Level as "major.minor".
    pub fn level_string(&self) -> String {
        format!("{}.{}", self.level / 10, self.level % 10)
    }
}

fn read_parameter_set(data: &[u8], pos: usize) -> Result<(Vec<u8>, usize)> {
    let len_bytes = data
        .get(pos..pos + 2)
        .ok_or_else(|| Error::invalid_data("avcC parameter set truncated"))?;
    let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
    let set = data
        .get(pos + 2..pos + 2 + len)
        .ok_or_else(|| Error::invalid_data("avcC parameter set truncated"))?;
    Ok((set.to_vec(), pos + 2 + len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_avcc() -> Vec<u8> {
        let sps = [0x67, 0x64, 0x00, 0x29];
        let pps = [0x68, 0xEB];
        let mut data = vec![1, 100, 0, 41, 0xFF];
        data.push(0xE1); // one SPS
        data.extend_from_slice(&(sps.len() as u16).to_be_bytes());
        data.extend_from_slice(&sps);
        data.push(1); // one PPS
        data.extend_from_slice(&(pps.len() as u16).to_be_bytes());
        data.extend_from_slice(&pps);
        data
    }

    #[test]
    fn test_parse() {
        let record = AvcConfigRecord::parse(&build_avcc()).unwrap();
        assert_eq!(record.profile, 100);
        assert_eq!(record.level, 41);
        assert_eq!(record.level_string(), "4.1");
        assert_eq!(record.nal_length_size, 4);
        assert_eq!(record.sps.len(), 1);
        assert_eq!(record.pps.len(), 1);
    }

    #[test]
    fn test_bad_version() {
        let mut data = build_avcc();
        data[0] = 2;
        assert!(AvcConfigRecord::parse(&data).is_err());
    }

    #[test]
    fn test_truncated() {
        let data = build_avcc();
        assert!(AvcConfigRecord::parse(&data[..8]).is_err());
    }
}
