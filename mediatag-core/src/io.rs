//! Binary reading and writing primitives.
//!
//! [`BinaryReader`] and [`BinaryWriter`] wrap seekable streams and expose the
//! integer widths and text codecs the container parsers need. Format-specific
//! codecs (EBML VINTs, synchsafe integers, atom size headers) live in the
//! format crates; only cross-format primitives belong here.

use crate::error::{Error, Result};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, SeekFrom, Write};

/// Binary reader over a seekable stream.
#[derive(Debug)]
pub struct BinaryReader<R> {
    inner: R,
}

impl<R: Read + Seek> BinaryReader<R> {
    /// Create a new reader.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Consume the reader and return the underlying stream.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Get a mutable reference to the underlying stream.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Current stream position.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Seek to an absolute offset.
    pub fn seek_to(&mut self, offset: u64) -> Result<u64> {
        Ok(self.inner.seek(SeekFrom::Start(offset))?)
    }

    /// Skip `count` bytes forward.
    pub fn skip(&mut self, count: u64) -> Result<u64> {
        Ok(self.inner.seek(SeekFrom::Current(count as i64))?)
    }

    /// Total stream length, restoring the current position afterwards.
    pub fn stream_len(&mut self) -> Result<u64> {
        let current = self.inner.stream_position()?;
        let end = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(current))?;
        Ok(end)
    }

    /// Read exactly `count` bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; count];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read into the provided buffer.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf)?;
        Ok(())
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.inner.read_u8()?)
    }

    /// Read a big-endian u16.
    pub fn read_u16_be(&mut self) -> Result<u16> {
        Ok(self.inner.read_u16::<BigEndian>()?)
    }

    /// Read a little-endian u16.
    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(self.inner.read_u16::<LittleEndian>()?)
    }

    /// Read a big-endian 24-bit unsigned integer.
    pub fn read_u24_be(&mut self) -> Result<u32> {
        Ok(self.inner.read_u24::<BigEndian>()?)
    }

    /// Read a little-endian 24-bit unsigned integer.
    pub fn read_u24_le(&mut self) -> Result<u32> {
        Ok(self.inner.read_u24::<LittleEndian>()?)
    }

    /// Read a big-endian u32.
    pub fn read_u32_be(&mut self) -> Result<u32> {
        Ok(self.inner.read_u32::<BigEndian>()?)
    }

    /// Read a little-endian u32.
    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(self.inner.read_u32::<LittleEndian>()?)
    }

    /// Read a big-endian u64.
    pub fn read_u64_be(&mut self) -> Result<u64> {
        Ok(self.inner.read_u64::<BigEndian>()?)
    }

    /// Read a little-endian u64.
    pub fn read_u64_le(&mut self) -> Result<u64> {
        Ok(self.inner.read_u64::<LittleEndian>()?)
    }

    /// Read a big-endian i16.
    pub fn read_i16_be(&mut self) -> Result<i16> {
        Ok(self.inner.read_i16::<BigEndian>()?)
    }

    /// Read a big-endian i32.
    pub fn read_i32_be(&mut self) -> Result<i32> {
        Ok(self.inner.read_i32::<BigEndian>()?)
    }

    /// Read a big-endian i64.
    pub fn read_i64_be(&mut self) -> Result<i64> {
        Ok(self.inner.read_i64::<BigEndian>()?)
    }

    /// Read a big-endian IEEE 754 single.
    pub fn read_f32_be(&mut self) -> Result<f32> {
        Ok(self.inner.read_f32::<BigEndian>()?)
    }

    /// Read a big-endian IEEE 754 double.
    pub fn read_f64_be(&mut self) -> Result<f64> {
        Ok(self.inner.read_f64::<BigEndian>()?)
    }

    /// Read a 4-byte FourCC.
    pub fn read_fourcc(&mut self) -> Result<[u8; 4]> {
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read a fixed-length UTF-8 string, trimming trailing NUL bytes.
    pub fn read_string(&mut self, len: usize) -> Result<String> {
        let buf = self.read_bytes(len)?;
        let end = buf.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
        String::from_utf8(buf[..end].to_vec())
            .map_err(|e| Error::invalid_data(format!("invalid UTF-8 string: {e}")))
    }
}

/// Binary writer over a seekable stream.
#[derive(Debug)]
pub struct BinaryWriter<W> {
    inner: W,
}

impl<W: Write + Seek> BinaryWriter<W> {
    /// Create a new writer.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Consume the writer and return the underlying stream.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Get a mutable reference to the underlying stream.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Current stream position.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Seek to an absolute offset.
    pub fn seek_to(&mut self, offset: u64) -> Result<u64> {
        Ok(self.inner.seek(SeekFrom::Start(offset))?)
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf)?;
        Ok(())
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        Ok(self.inner.write_u8(value)?)
    }

    /// Write a big-endian u16.
    pub fn write_u16_be(&mut self, value: u16) -> Result<()> {
        Ok(self.inner.write_u16::<BigEndian>(value)?)
    }

    /// Write a little-endian u16.
    pub fn write_u16_le(&mut self, value: u16) -> Result<()> {
        Ok(self.inner.write_u16::<LittleEndian>(value)?)
    }

    /// Write a big-endian 24-bit unsigned integer.
    pub fn write_u24_be(&mut self, value: u32) -> Result<()> {
        Ok(self.inner.write_u24::<BigEndian>(value)?)
    }

    /// Write a big-endian u32.
    pub fn write_u32_be(&mut self, value: u32) -> Result<()> {
        Ok(self.inner.write_u32::<BigEndian>(value)?)
    }

    /// Write a little-endian u32.
    pub fn write_u32_le(&mut self, value: u32) -> Result<()> {
        Ok(self.inner.write_u32::<LittleEndian>(value)?)
    }

    /// Write a big-endian u64.
    pub fn write_u64_be(&mut self, value: u64) -> Result<()> {
        Ok(self.inner.write_u64::<BigEndian>(value)?)
    }

    /// Write a big-endian IEEE 754 double.
    pub fn write_f64_be(&mut self, value: f64) -> Result<()> {
        Ok(self.inner.write_f64::<BigEndian>(value)?)
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Text codecs shared across tag formats.
pub mod text {
    use crate::error::{Error, Result};

    /// Decode Latin-1 (ISO 8859-1) bytes. Every byte maps to the code point
    /// of the same value, so this cannot fail.
    pub fn latin1_to_string(data: &[u8]) -> String {
        data.iter().map(|&b| b as char).collect()
    }

    /// Encode a string as Latin-1. Returns `None` when the string contains a
    /// code point above U+00FF and encoding would be lossy.
    pub fn string_to_latin1(s: &str) -> Option<Vec<u8>> {
        s.chars()
            .map(|c| {
                let cp = c as u32;
                if cp <= 0xFF {
                    Some(cp as u8)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Decode UTF-16 with the given endianness. An odd trailing byte is
    /// rejected as invalid data.
    pub fn utf16_to_string(data: &[u8], little_endian: bool) -> Result<String> {
        if data.len() % 2 != 0 {
            return Err(Error::invalid_data("UTF-16 data has odd length"));
        }
        let units: Vec<u16> = data
            .chunks_exact(2)
            .map(|pair| {
                if little_endian {
                    u16::from_le_bytes([pair[0], pair[1]])
                } else {
                    u16::from_be_bytes([pair[0], pair[1]])
                }
            })
            .collect();
        String::from_utf16(&units)
            .map_err(|e| Error::invalid_data(format!("invalid UTF-16 data: {e}")))
    }

    /// Decode UTF-16 honouring a leading BOM; defaults to little-endian when
    /// no BOM is present, which is what ID3v2.3 writers commonly emit.
    pub fn utf16_bom_to_string(data: &[u8]) -> Result<String> {
        if data.len() >= 2 {
            match (data[0], data[1]) {
                (0xFF, 0xFE) => return utf16_to_string(&data[2..], true),
                (0xFE, 0xFF) => return utf16_to_string(&data[2..], false),
                _ => {}
            }
        }
        utf16_to_string(data, true)
    }

    /// Encode a string as UTF-16 with the given endianness, without BOM.
    pub fn string_to_utf16(s: &str, little_endian: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(s.len() * 2);
        for unit in s.encode_utf16() {
            let bytes = if little_endian {
                unit.to_le_bytes()
            } else {
                unit.to_be_bytes()
            };
            out.extend_from_slice(&bytes);
        }
        out
    }
}

/// Read a big-endian u32 from the start of a slice.
pub fn read_u32_be(data: &[u8]) -> Result<u32> {
    if data.len() < 4 {
        return Err(Error::invalid_data("slice too short for u32"));
    }
    Ok(u32::from_be_bytes([data[0], data[1], data[2], data[3]]))
}

/// Read a big-endian u64 from the start of a slice.
pub fn read_u64_be(data: &[u8]) -> Result<u64> {
    if data.len() < 8 {
        return Err(Error::invalid_data("slice too short for u64"));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[..8]);
    Ok(u64::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reader_integers() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let mut reader = BinaryReader::new(Cursor::new(&data));
        assert_eq!(reader.read_u16_be().unwrap(), 0x0102);
        assert_eq!(reader.read_u24_be().unwrap(), 0x030405);
        assert_eq!(reader.read_u8().unwrap(), 0x06);
        reader.seek_to(0).unwrap();
        assert_eq!(reader.read_u32_le().unwrap(), 0x04030201);
        assert_eq!(reader.read_u32_be().unwrap(), 0x05060708);
    }

    #[test]
    fn test_reader_eof() {
        let mut reader = BinaryReader::new(Cursor::new(&[0x01u8]));
        assert!(reader.read_u32_be().unwrap_err().is_truncated_io());
    }

    #[test]
    fn test_writer_roundtrip() {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        writer.write_u32_be(0xDEADBEEF).unwrap();
        writer.write_u24_be(0x010203).unwrap();
        writer.write_u16_le(0x0405).unwrap();
        let buf = writer.into_inner().into_inner();
        assert_eq!(buf, [0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0x03, 0x05, 0x04]);
    }

    #[test]
    fn test_fixed_string() {
        let mut reader = BinaryReader::new(Cursor::new(b"mp42\x00\x00\x00\x00".to_vec()));
        assert_eq!(reader.read_string(8).unwrap(), "mp42");
    }

    #[test]
    fn test_latin1() {
        let bytes = [0x4D, 0xFC, 0x6E, 0x63, 0x68, 0x65, 0x6E]; // "München"
        assert_eq!(text::latin1_to_string(&bytes), "M\u{fc}nchen");
        assert_eq!(text::string_to_latin1("M\u{fc}nchen").unwrap(), bytes);
        assert!(text::string_to_latin1("\u{2713}").is_none());
    }

    #[test]
    fn test_utf16_bom() {
        let le = [0xFF, 0xFE, 0x48, 0x00, 0x69, 0x00];
        assert_eq!(text::utf16_bom_to_string(&le).unwrap(), "Hi");
        let be = [0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        assert_eq!(text::utf16_bom_to_string(&be).unwrap(), "Hi");
    }

    #[test]
    fn test_utf16_odd_length() {
        assert!(text::utf16_to_string(&[0x00, 0x48, 0x00], false).is_err());
    }
}
