//! Ogg page headers and checksums.
//!
//! A page is a 27-byte header, up to 255 segment-length bytes and the
//! segment payloads. The CRC-32 (polynomial 0x04C11DB7, init 0, no
//! reflection) covers the whole page with the checksum field zeroed.

use mediatag_core::io::{BinaryReader, BinaryWriter};
use mediatag_core::{Error, Result};
use std::io::{Read, Seek, Write};

/// Page magic.
pub const CAPTURE_PATTERN: [u8; 4] = *b"OggS";

/// Header type flag: packet continued from the previous page.
pub const FLAG_CONTINUED: u8 = 0x01;
/// Header type flag: first page of a logical stream.
pub const FLAG_BOS: u8 = 0x02;
/// Header type flag: last page of a logical stream.
pub const FLAG_EOS: u8 = 0x04;

fn crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            if crc & 0x8000_0000 != 0 {
                crc = (crc << 1) ^ 0x04C1_1DB7;
            } else {
                crc <<= 1;
            }
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Ogg page CRC over raw page bytes (checksum field already zeroed).
pub fn page_crc(data: &[u8]) -> u32 {
    // Table construction is cheap enough to keep this const-free.
    let table = crc_table();
    let mut crc = 0u32;
    for &byte in data {
        crc = (crc << 8) ^ table[(((crc >> 24) as u8) ^ byte) as usize];
    }
    crc
}

/// One decoded page header plus its segment table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OggPage {
    /// Absolute offset of the capture pattern.
    pub offset: u64,
    /// Header type flags.
    pub flags: u8,
    /// Granule position; `u64::MAX` marks "no packet finishes here".
    pub granule_position: u64,
    /// Logical bitstream serial number.
    pub serial: u32,
    /// Page sequence number within the logical stream.
    pub sequence: u32,
    /// Stored checksum.
    pub checksum: u32,
    /// Segment lengths.
    pub segment_table: Vec<u8>,
}

impl OggPage {
    /// Header length including the segment table.
    pub fn header_len(&self) -> u64 {
        27 + self.segment_table.len() as u64
    }

    /// Total payload bytes on this page.
    pub fn payload_len(&self) -> u64 {
        self.segment_table.iter().map(|&l| l as u64).sum()
    }

    /// Total page length.
    pub fn total_len(&self) -> u64 {
        self.header_len() + self.payload_len()
    }

    /// Whether the first segment continues a packet from the previous page.
    pub fn is_continuation(&self) -> bool {
        self.flags & FLAG_CONTINUED != 0
    }

    /// Whether this is the first page of its logical stream.
    pub fn is_first(&self) -> bool {
        self.flags & FLAG_BOS != 0
    }

    /// Whether this is the last page of its logical stream.
    pub fn is_last(&self) -> bool {
        self.flags & FLAG_EOS != 0
    }

    /// Whether the last packet on this page continues onto the next one.
    pub fn last_packet_continues(&self) -> bool {
        self.segment_table.last().is_some_and(|&l| l == 255)
    }

    /// Read a page header at the current position. Returns `None` at EOF.
    pub fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Option<Self>> {
        let offset = reader.position()?;
        let mut magic = [0u8; 4];
        match reader.read_exact(&mut magic) {
            Ok(()) => {}
            Err(e) if e.is_truncated_io() => return Ok(None),
            Err(e) => return Err(e),
        }
        if magic != CAPTURE_PATTERN {
            return Err(Error::invalid_data(format!(
                "no Ogg capture pattern at offset {offset}"
            )));
        }
        let version = reader.read_u8()?;
        if version != 0 {
            return Err(Error::unsupported_version(format!(
                "Ogg page version {version}"
            )));
        }
        let flags = reader.read_u8()?;
        let granule_position = reader.read_u64_le()?;
        let serial = reader.read_u32_le()?;
        let sequence = reader.read_u32_le()?;
        let checksum = reader.read_u32_le()?;
        let segment_count = reader.read_u8()?;
        let segment_table = reader.read_bytes(segment_count as usize)?;
        Ok(Some(Self {
            offset,
            flags,
            granule_position,
            serial,
            sequence,
            checksum,
            segment_table,
        }))
    }

    /// Verify the stored checksum against the full page bytes.
    pub fn verify_checksum<R: Read + Seek>(&self, reader: &mut BinaryReader<R>) -> Result<bool> {
        reader.seek_to(self.offset)?;
        let mut bytes = reader.read_bytes(self.total_len() as usize)?;
        bytes[22..26].fill(0);
        Ok(page_crc(&bytes) == self.checksum)
    }
}

/// Write a complete page for `payload`, splitting it into 255-byte lacing
/// segments. `continues` marks the payload as finishing a packet from a
/// previous page; `open_ended` leaves the final 255 segment unterminated.
/// Returns the bytes written.
pub fn write_page<W: Write + Seek>(
    writer: &mut BinaryWriter<W>,
    flags: u8,
    granule_position: u64,
    serial: u32,
    sequence: u32,
    payload: &[u8],
    open_ended: bool,
) -> Result<u64> {
    let mut segment_table = Vec::new();
    let mut remaining = payload.len();
    loop {
        if remaining >= 255 {
            segment_table.push(255u8);
            remaining -= 255;
        } else {
            segment_table.push(remaining as u8);
            remaining = 0;
            break;
        }
        if remaining == 0 {
            // A packet that ends on a 255 boundary needs an explicit
            // zero-length terminator unless it spills to the next page.
            if !open_ended {
                segment_table.push(0);
            }
            break;
        }
    }
    if open_ended && segment_table.last() == Some(&0) {
        segment_table.pop();
    }
    if segment_table.len() > 255 {
        return Err(Error::invalid_param(
            "payload too large for a single Ogg page",
        ));
    }

    let mut page = Vec::with_capacity(27 + segment_table.len() + payload.len());
    page.extend_from_slice(&CAPTURE_PATTERN);
    page.push(0); // version
    page.push(flags);
    page.extend_from_slice(&granule_position.to_le_bytes());
    page.extend_from_slice(&serial.to_le_bytes());
    page.extend_from_slice(&sequence.to_le_bytes());
    page.extend_from_slice(&[0u8; 4]); // checksum placeholder
    page.push(segment_table.len() as u8);
    page.extend_from_slice(&segment_table);
    page.extend_from_slice(payload);

    let crc = page_crc(&page);
    page[22..26].copy_from_slice(&crc.to_le_bytes());
    writer.write_bytes(&page)?;
    Ok(page.len() as u64)
}

/// Granule position value meaning "no packet finishes on this page".
pub const NO_GRANULE: u64 = u64::MAX;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_crc_known_vector() {
        // CRC of "OggS" with this polynomial and zero init.
        assert_eq!(page_crc(b""), 0);
        assert_ne!(page_crc(b"OggS"), 0);
    }

    #[test]
    fn test_write_read_roundtrip() {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        let payload = vec![0x42u8; 300];
        write_page(&mut writer, FLAG_BOS, 0, 0x1234, 0, &payload, false).unwrap();
        let bytes = writer.into_inner().into_inner();

        let mut reader = BinaryReader::new(Cursor::new(bytes));
        let page = OggPage::read(&mut reader).unwrap().unwrap();
        assert!(page.is_first());
        assert_eq!(page.serial, 0x1234);
        assert_eq!(page.segment_table, vec![255, 45]);
        assert_eq!(page.payload_len(), 300);
        assert!(page.verify_checksum(&mut reader).unwrap());
    }

    #[test]
    fn test_packet_on_255_boundary_gets_terminator() {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        let payload = vec![0u8; 255];
        write_page(&mut writer, 0, 0, 1, 0, &payload, false).unwrap();
        let bytes = writer.into_inner().into_inner();
        let mut reader = BinaryReader::new(Cursor::new(bytes));
        let page = OggPage::read(&mut reader).unwrap().unwrap();
        assert_eq!(page.segment_table, vec![255, 0]);
        assert!(!page.last_packet_continues());
    }

    #[test]
    fn test_corrupted_page_fails_checksum() {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        write_page(&mut writer, 0, 7, 1, 3, b"hello", false).unwrap();
        let mut bytes = writer.into_inner().into_inner();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let mut reader = BinaryReader::new(Cursor::new(bytes));
        let page = OggPage::read(&mut reader).unwrap().unwrap();
        assert!(!page.verify_checksum(&mut reader).unwrap());
    }

    #[test]
    fn test_eof_returns_none() {
        let mut reader = BinaryReader::new(Cursor::new(Vec::new()));
        assert!(OggPage::read(&mut reader).unwrap().is_none());
    }
}
