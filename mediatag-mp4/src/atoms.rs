//! ISO-BMFF atom (box) parsing and writing.

use mediatag_core::element::{ElementFormat, RawElementHeader};
use mediatag_core::io::BinaryReader;
use mediatag_core::{Error, Result};
use std::io::{Read, Seek};

/// Well-known atom identifiers.
pub mod ids {
    pub const FTYP: [u8; 4] = *b"ftyp";
    pub const MOOV: [u8; 4] = *b"moov";
    pub const MVHD: [u8; 4] = *b"mvhd";
    pub const TRAK: [u8; 4] = *b"trak";
    pub const TKHD: [u8; 4] = *b"tkhd";
    pub const TREF: [u8; 4] = *b"tref";
    pub const CHAP: [u8; 4] = *b"chap";
    pub const MDIA: [u8; 4] = *b"mdia";
    pub const MDHD: [u8; 4] = *b"mdhd";
    pub const HDLR: [u8; 4] = *b"hdlr";
    pub const MINF: [u8; 4] = *b"minf";
    pub const STBL: [u8; 4] = *b"stbl";
    pub const STSD: [u8; 4] = *b"stsd";
    pub const STTS: [u8; 4] = *b"stts";
    pub const STSZ: [u8; 4] = *b"stsz";
    pub const STCO: [u8; 4] = *b"stco";
    pub const CO64: [u8; 4] = *b"co64";
    pub const EDTS: [u8; 4] = *b"edts";
    pub const DINF: [u8; 4] = *b"dinf";
    pub const UDTA: [u8; 4] = *b"udta";
    pub const META: [u8; 4] = *b"meta";
    pub const ILST: [u8; 4] = *b"ilst";
    pub const FREE: [u8; 4] = *b"free";
    pub const SKIP: [u8; 4] = *b"skip";
    pub const MDAT: [u8; 4] = *b"mdat";
    pub const DATA: [u8; 4] = *b"data";
    pub const MEAN: [u8; 4] = *b"mean";
    pub const NAME: [u8; 4] = *b"name";
    pub const FREEFORM: [u8; 4] = *b"----";
    pub const ESDS: [u8; 4] = *b"esds";
    pub const AVCC: [u8; 4] = *b"avcC";
    pub const HVCC: [u8; 4] = *b"hvcC";
    pub const AV1C: [u8; 4] = *b"av1C";
}

/// Render an atom id for messages; non-printable bytes fall back to hex.
pub fn display_fourcc(id: [u8; 4]) -> String {
    if id.iter().all(|&b| (0x20..0x7F).contains(&b) || b == 0xA9) {
        id.iter().map(|&b| b as char).collect()
    } else {
        format!("{:02x}{:02x}{:02x}{:02x}", id[0], id[1], id[2], id[3])
    }
}

/// Atom header: FourCC plus 32-bit, 64-bit or to-end-of-span size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomHeader {
    /// Atom type.
    pub fourcc: [u8; 4],
    /// Payload size; `None` when the atom extends to the end of its span.
    pub data_len: Option<u64>,
    /// Header size: 8, or 16 with an extended size.
    pub header_len: u32,
}

impl AtomHeader {
    /// Read an atom header. `remaining` bounds the read; fewer than 8 bytes
    /// left means no further atom fits.
    pub fn read<R: Read + Seek>(
        reader: &mut BinaryReader<R>,
        remaining: u64,
    ) -> Result<Option<Self>> {
        if remaining < 8 {
            return Ok(None);
        }
        let size32 = reader.read_u32_be()?;
        let fourcc = reader.read_fourcc()?;
        match size32 {
            0 => Ok(Some(Self {
                fourcc,
                data_len: None,
                header_len: 8,
            })),
            1 => {
                if remaining < 16 {
                    return Err(Error::invalid_data(format!(
                        "atom {} declares an extended size but the header is truncated",
                        display_fourcc(fourcc)
                    )));
                }
                let size64 = reader.read_u64_be()?;
                if size64 < 16 {
                    return Err(Error::invalid_data(format!(
                        "atom {} has an extended size smaller than its header",
                        display_fourcc(fourcc)
                    )));
                }
                Ok(Some(Self {
                    fourcc,
                    data_len: Some(size64 - 16),
                    header_len: 16,
                }))
            }
            2..=7 => Err(Error::invalid_data(format!(
                "atom {} declares a size smaller than its header",
                display_fourcc(fourcc)
            ))),
            _ => Ok(Some(Self {
                fourcc,
                data_len: Some(size32 as u64 - 8),
                header_len: 8,
            })),
        }
    }
}

/// Serialise an atom header for the given payload length, choosing the
/// 64-bit form only when required.
pub fn put_atom(out: &mut Vec<u8>, fourcc: [u8; 4], payload: &[u8]) {
    let total = payload.len() as u64 + 8;
    if total > u32::MAX as u64 {
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(&fourcc);
        out.extend_from_slice(&(payload.len() as u64 + 16).to_be_bytes());
    } else {
        out.extend_from_slice(&(total as u32).to_be_bytes());
        out.extend_from_slice(&fourcc);
    }
    out.extend_from_slice(payload);
}

/// Append a `free` padding atom spanning exactly `total` bytes (minimum 8).
pub fn put_free_atom(out: &mut Vec<u8>, total: u64) -> Result<()> {
    if total < 8 {
        return Err(Error::invalid_param(format!(
            "free atom needs at least 8 bytes, got {total}"
        )));
    }
    out.extend_from_slice(&(total as u32).to_be_bytes());
    out.extend_from_slice(&ids::FREE);
    out.extend(std::iter::repeat(0u8).take(total as usize - 8));
    Ok(())
}

/// The format hook for the generic element tree.
pub struct Mp4ElementFormat;

impl ElementFormat for Mp4ElementFormat {
    type Id = [u8; 4];
    const CONTAINER_NAME: &'static str = "MP4";

    fn read_header<R: Read + Seek>(
        reader: &mut BinaryReader<R>,
        remaining: u64,
    ) -> Result<Option<RawElementHeader<[u8; 4]>>> {
        Ok(AtomHeader::read(reader, remaining)?.map(|header| RawElementHeader {
            id: header.fourcc,
            header_len: header.header_len,
            data_len: header.data_len,
        }))
    }

    fn is_parent(header: &RawElementHeader<[u8; 4]>) -> bool {
        matches!(
            &header.id,
            &ids::MOOV
                | &ids::TRAK
                | &ids::MDIA
                | &ids::MINF
                | &ids::STBL
                | &ids::EDTS
                | &ids::DINF
                | &ids::UDTA
                | &ids::META
                | &ids::ILST
                | &ids::TREF
        )
    }

    fn child_payload_offset(header: &RawElementHeader<[u8; 4]>) -> u64 {
        // `meta` is a full box: version and flags precede its children.
        if header.id == ids::META {
            4
        } else {
            0
        }
    }

    fn display_id(id: [u8; 4]) -> String {
        display_fourcc(id)
    }
}

/// Iterator over atoms packed back-to-back in a byte slice, as inside `ilst`
/// field atoms. Yields `(fourcc, payload)`.
pub struct AtomIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> AtomIter<'a> {
    /// Iterate over the atoms in `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> Iterator for AtomIter<'a> {
    type Item = Result<([u8; 4], &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.data.len() - self.pos;
        if remaining < 8 {
            return None;
        }
        let size = u32::from_be_bytes(self.data[self.pos..self.pos + 4].try_into().unwrap());
        let fourcc: [u8; 4] = self.data[self.pos + 4..self.pos + 8].try_into().unwrap();
        let (start, total) = match size {
            0 => (self.pos + 8, remaining),
            1 => {
                if remaining < 16 {
                    return Some(Err(Error::invalid_data(
                        "extended atom size in truncated buffer",
                    )));
                }
                let size64 = u64::from_be_bytes(
                    self.data[self.pos + 8..self.pos + 16].try_into().unwrap(),
                ) as usize;
                if size64 < 16 {
                    return Some(Err(Error::invalid_data("extended atom size too small")));
                }
                (self.pos + 16, size64)
            }
            2..=7 => {
                return Some(Err(Error::invalid_data(format!(
                    "atom {} smaller than its header",
                    display_fourcc(fourcc)
                ))))
            }
            _ => (self.pos + 8, size as usize),
        };
        if total > remaining {
            return Some(Err(Error::invalid_data(format!(
                "atom {} exceeds its buffer",
                display_fourcc(fourcc)
            ))));
        }
        let end = self.pos + total;
        let payload = &self.data[start..end];
        self.pos = end;
        Some(Ok((fourcc, payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_plain_header() {
        let mut data = Vec::new();
        put_atom(&mut data, *b"ftyp", b"isom\x00\x00\x02\x00");
        let mut reader = BinaryReader::new(Cursor::new(data));
        let header = AtomHeader::read(&mut reader, 16).unwrap().unwrap();
        assert_eq!(header.fourcc, *b"ftyp");
        assert_eq!(header.data_len, Some(8));
        assert_eq!(header.header_len, 8);
    }

    #[test]
    fn test_extended_size() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(b"mdat");
        data.extend_from_slice(&100u64.to_be_bytes());
        data.extend(std::iter::repeat(0u8).take(84));
        let mut reader = BinaryReader::new(Cursor::new(data));
        let header = AtomHeader::read(&mut reader, 100).unwrap().unwrap();
        assert_eq!(header.fourcc, *b"mdat");
        assert_eq!(header.data_len, Some(84));
        assert_eq!(header.header_len, 16);
    }

    #[test]
    fn test_size_zero_extends_to_span() {
        let mut data = Vec::new();
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(b"mdat");
        data.extend_from_slice(&[0xAB; 24]);
        let mut reader = BinaryReader::new(Cursor::new(data));
        let header = AtomHeader::read(&mut reader, 32).unwrap().unwrap();
        assert_eq!(header.data_len, None);
    }

    #[test]
    fn test_undersized_atom_rejected() {
        let mut data = Vec::new();
        data.extend_from_slice(&4u32.to_be_bytes());
        data.extend_from_slice(b"mdat");
        let mut reader = BinaryReader::new(Cursor::new(data));
        assert!(AtomHeader::read(&mut reader, 8).is_err());
    }

    #[test]
    fn test_atom_iter() {
        let mut data = Vec::new();
        put_atom(&mut data, *b"mean", b"com.apple.iTunes");
        put_atom(&mut data, *b"name", b"MEDIA");
        let items: Vec<_> = AtomIter::new(&data).collect::<Result<_>>().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].0, *b"mean");
        assert_eq!(items[0].1, b"com.apple.iTunes");
        assert_eq!(items[1].0, *b"name");
    }

    #[test]
    fn test_free_atom_exact() {
        let mut out = Vec::new();
        put_free_atom(&mut out, 32).unwrap();
        assert_eq!(out.len(), 32);
        assert_eq!(&out[4..8], b"free");
        assert!(put_free_atom(&mut Vec::new(), 7).is_err());
    }

    #[test]
    fn test_display_fourcc() {
        assert_eq!(display_fourcc(*b"moov"), "moov");
        assert_eq!(display_fourcc([0xA9, b'n', b'a', b'm']), "\u{a9}nam");
        assert_eq!(display_fourcc([0x00, 0x01, 0x02, 0x03]), "00010203");
    }
}
