//! Property-based tests for the binary I/O primitives.
//!
//! Uses proptest to verify round-trip correctness of the endian readers and
//! the text codecs.

use mediatag_core::io::{text, BinaryReader, BinaryWriter};
use proptest::prelude::*;
use std::io::Cursor;

proptest! {
    #[test]
    fn roundtrip_u16_be(value in any::<u16>()) {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        writer.write_u16_be(value).unwrap();
        let buf = writer.into_inner().into_inner();
        let mut reader = BinaryReader::new(Cursor::new(buf));
        prop_assert_eq!(reader.read_u16_be().unwrap(), value);
    }

    #[test]
    fn roundtrip_u24_be(value in 0u32..0x0100_0000) {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        writer.write_u24_be(value).unwrap();
        let buf = writer.into_inner().into_inner();
        prop_assert_eq!(buf.len(), 3);
        let mut reader = BinaryReader::new(Cursor::new(buf));
        prop_assert_eq!(reader.read_u24_be().unwrap(), value);
    }

    #[test]
    fn roundtrip_u32_both_endian(value in any::<u32>()) {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        writer.write_u32_be(value).unwrap();
        writer.write_u32_le(value).unwrap();
        let buf = writer.into_inner().into_inner();
        let mut reader = BinaryReader::new(Cursor::new(buf));
        prop_assert_eq!(reader.read_u32_be().unwrap(), value);
        prop_assert_eq!(reader.read_u32_le().unwrap(), value);
    }

    #[test]
    fn roundtrip_u64_be(value in any::<u64>()) {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        writer.write_u64_be(value).unwrap();
        let buf = writer.into_inner().into_inner();
        let mut reader = BinaryReader::new(Cursor::new(buf));
        prop_assert_eq!(reader.read_u64_be().unwrap(), value);
    }

    #[test]
    fn roundtrip_f64_be(value in any::<f64>().prop_filter("finite", |f| f.is_finite())) {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        writer.write_f64_be(value).unwrap();
        let buf = writer.into_inner().into_inner();
        let mut reader = BinaryReader::new(Cursor::new(buf));
        prop_assert_eq!(reader.read_f64_be().unwrap(), value);
    }

    #[test]
    fn roundtrip_utf16(s in "\\PC{0,64}") {
        for little_endian in [true, false] {
            let bytes = text::string_to_utf16(&s, little_endian);
            let decoded = text::utf16_to_string(&bytes, little_endian).unwrap();
            prop_assert_eq!(&decoded, &s);
        }
    }

    #[test]
    fn roundtrip_latin1(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let decoded = text::latin1_to_string(&bytes);
        let encoded = text::string_to_latin1(&decoded).unwrap();
        prop_assert_eq!(encoded, bytes);
    }
}
