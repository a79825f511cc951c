//! iTunes-style MP4 metadata (`moov/udta/meta/ilst`).
//!
//! Each `ilst` child atom is one field. Its value lives in a nested `data`
//! atom whose first four bytes declare a well-known type; freeform `----`
//! atoms derive their identifier from nested `mean` and `name` atoms.
//! Duplicate identifiers are preserved and written back in insertion order.

use crate::atoms::{ids, put_atom, AtomIter};
use mediatag_core::{
    Diagnostics, Error, FieldId, Genre, KnownField, Picture, PositionInSet, Result, Tag, TagField,
    TagTarget, TagType, TagValue, TextEncoding,
};

/// `data` atom well-known type codes.
mod data_type {
    pub const IMPLICIT: u32 = 0;
    pub const UTF8: u32 = 1;
    pub const UTF16BE: u32 = 2;
    pub const JPEG: u32 = 13;
    pub const PNG: u32 = 14;
    pub const BE_SIGNED: u32 = 21;
    pub const BE_UNSIGNED: u32 = 22;
}

/// Native atom for a uniform field, where one exists.
fn field_atom(field: KnownField) -> Option<[u8; 4]> {
    Some(match field {
        KnownField::Title => *b"\xA9nam",
        KnownField::Artist => *b"\xA9ART",
        KnownField::Album => *b"\xA9alb",
        KnownField::AlbumArtist => *b"aART",
        KnownField::Genre => *b"\xA9gen",
        KnownField::RecordingDate => *b"\xA9day",
        KnownField::Comment => *b"\xA9cmt",
        KnownField::Bpm => *b"tmpo",
        KnownField::TrackPosition => *b"trkn",
        KnownField::DiskPosition => *b"disk",
        KnownField::Encoder => *b"\xA9too",
        KnownField::Lyrics => *b"\xA9lyr",
        KnownField::Composer => *b"\xA9wrt",
        KnownField::Rating => *b"rtng",
        KnownField::Copyright => *b"cprt",
        KnownField::Cover => *b"covr",
        KnownField::Publisher | KnownField::ReleaseDate | KnownField::EncoderSettings => {
            return None
        }
        _ => return None,
    })
}

/// The `gnre` atom stores an ID3v1 genre index plus one.
const GENRE_ATOM: [u8; 4] = *b"gnre";

/// An iTunes-style tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mp4Tag {
    target: TagTarget,
    fields: Vec<TagField>,
}

impl Mp4Tag {
    /// Create an empty tag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `ilst` payload.
    pub fn parse_ilst(data: &[u8], diag: &mut Diagnostics) -> Result<Self> {
        let mut tag = Mp4Tag::new();
        for item in AtomIter::new(data) {
            let (fourcc, payload) = item?;
            if let Err(e) = tag.parse_field(fourcc, payload) {
                diag.critical(
                    "parsing MP4 tag",
                    format!(
                        "field {} skipped: {e}",
                        crate::atoms::display_fourcc(fourcc)
                    ),
                );
            }
        }
        Ok(tag)
    }

    fn parse_field(&mut self, fourcc: [u8; 4], payload: &[u8]) -> Result<()> {
        let mut mean = None;
        let mut name = None;
        let mut values = Vec::new();
        for child in AtomIter::new(payload) {
            let (child_id, child_payload) = child?;
            match child_id {
                ids::MEAN if child_payload.len() >= 4 => {
                    mean = Some(String::from_utf8_lossy(&child_payload[4..]).into_owned());
                }
                ids::NAME if child_payload.len() >= 4 => {
                    name = Some(String::from_utf8_lossy(&child_payload[4..]).into_owned());
                }
                ids::DATA => values.push(parse_data_atom(fourcc, child_payload)?),
                _ => {}
            }
        }

        let id = if fourcc == ids::FREEFORM {
            FieldId::Freeform {
                mean: mean.ok_or_else(|| {
                    Error::invalid_data("freeform atom without a mean atom")
                })?,
                name: name.ok_or_else(|| {
                    Error::invalid_data("freeform atom without a name atom")
                })?,
            }
        } else {
            FieldId::FourCc(fourcc)
        };
        if values.is_empty() {
            return Err(Error::invalid_data("field without a data atom"));
        }
        for value in values {
            self.fields.push(TagField::new(id.clone(), value));
        }
        Ok(())
    }

    /// Serialise into an `ilst` payload, `None` when no non-empty field is
    /// left.
    pub fn make_ilst(&self) -> Option<Vec<u8>> {
        let mut out = Vec::new();
        for field in &self.fields {
            if field.is_empty() {
                continue;
            }
            let mut item = Vec::new();
            let fourcc = match &field.id {
                FieldId::FourCc(id) => *id,
                FieldId::Freeform { mean, name } => {
                    let mut mean_payload = vec![0u8; 4];
                    mean_payload.extend_from_slice(mean.as_bytes());
                    put_atom(&mut item, ids::MEAN, &mean_payload);
                    let mut name_payload = vec![0u8; 4];
                    name_payload.extend_from_slice(name.as_bytes());
                    put_atom(&mut item, ids::NAME, &name_payload);
                    ids::FREEFORM
                }
                // Foreign identifier kinds cannot appear in an MP4 tag.
                _ => continue,
            };
            if let Some(data) = make_data_atom(fourcc, &field.value) {
                item.extend_from_slice(&data);
                let mut atom = Vec::new();
                put_atom(&mut atom, fourcc, &item);
                out.extend_from_slice(&atom);
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    fn first_value(&self, fourcc: [u8; 4]) -> Option<&TagValue> {
        self.fields
            .iter()
            .find(|f| matches!(&f.id, FieldId::FourCc(id) if *id == fourcc))
            .map(|f| &f.value)
    }

    fn remove_atom(&mut self, fourcc: [u8; 4]) -> bool {
        let before = self.fields.len();
        self.fields
            .retain(|f| !matches!(&f.id, FieldId::FourCc(id) if *id == fourcc));
        before != self.fields.len()
    }
}

impl Tag for Mp4Tag {
    fn tag_type(&self) -> TagType {
        TagType::Mp4
    }

    fn target(&self) -> &TagTarget {
        &self.target
    }

    fn set_target(&mut self, _target: TagTarget) {
        // MP4 tags always apply to the whole file.
    }

    fn fields(&self) -> &[TagField] {
        &self.fields
    }

    fn supports_field(&self, field: KnownField) -> bool {
        field_atom(field).is_some()
    }

    fn value(&self, field: KnownField) -> Option<&TagValue> {
        if field == KnownField::Genre {
            // A numeric gnre atom takes precedence over the text form.
            if let Some(value) = self.first_value(GENRE_ATOM) {
                return Some(value);
            }
        }
        self.first_value(field_atom(field)?)
    }

    fn set_value(&mut self, field: KnownField, value: TagValue) -> bool {
        let Some(fourcc) = field_atom(field) else {
            return false;
        };
        self.remove_value(field);
        if !value.is_empty() {
            let fourcc = match (&value, field) {
                (TagValue::Genre(Genre::Index(_)), KnownField::Genre) => GENRE_ATOM,
                _ => fourcc,
            };
            self.fields.push(TagField::new(FieldId::FourCc(fourcc), value));
        }
        true
    }

    fn remove_value(&mut self, field: KnownField) -> bool {
        let Some(fourcc) = field_atom(field) else {
            return false;
        };
        let mut removed = self.remove_atom(fourcc);
        if field == KnownField::Genre {
            removed |= self.remove_atom(GENRE_ATOM);
        }
        removed
    }
}

fn parse_data_atom(fourcc: [u8; 4], payload: &[u8]) -> Result<TagValue> {
    if payload.len() < 8 {
        return Err(Error::invalid_data("data atom shorter than its type header"));
    }
    let type_code = u32::from_be_bytes(payload[..4].try_into().unwrap()) & 0x00FF_FFFF;
    let value = &payload[8..];
    Ok(match type_code {
        data_type::UTF8 => TagValue::text_with_encoding(
            std::str::from_utf8(value)
                .map_err(|e| Error::invalid_data(format!("invalid UTF-8 in data atom: {e}")))?,
            TextEncoding::Utf8,
        ),
        data_type::UTF16BE => TagValue::text_with_encoding(
            mediatag_core::io::text::utf16_to_string(value, false)?,
            TextEncoding::Utf16Be,
        ),
        data_type::JPEG => TagValue::Picture(Picture {
            data: value.to_vec(),
            mime_type: "image/jpeg".into(),
            description: String::new(),
            picture_type: 3,
        }),
        data_type::PNG => TagValue::Picture(Picture {
            data: value.to_vec(),
            mime_type: "image/png".into(),
            description: String::new(),
            picture_type: 3,
        }),
        data_type::BE_SIGNED | data_type::BE_UNSIGNED => {
            let mut acc: i64 = 0;
            if value.len() > 8 {
                return Err(Error::invalid_data("integer data atom longer than 8 bytes"));
            }
            for &b in value {
                acc = (acc << 8) | b as i64;
            }
            TagValue::Integer(acc)
        }
        data_type::IMPLICIT => match fourcc {
            ids::FREEFORM => TagValue::Binary {
                data: value.to_vec(),
                mime_type: String::new(),
            },
            _ if fourcc == *b"trkn" || fourcc == *b"disk" => {
                if value.len() < 6 {
                    return Err(Error::invalid_data("position data atom too short"));
                }
                TagValue::Position(PositionInSet {
                    position: Some(u16::from_be_bytes([value[2], value[3]]) as u32),
                    total: Some(u16::from_be_bytes([value[4], value[5]]) as u32),
                })
            }
            _ if fourcc == GENRE_ATOM => {
                if value.len() < 2 {
                    return Err(Error::invalid_data("gnre data atom too short"));
                }
                let index = u16::from_be_bytes([value[0], value[1]]);
                if index == 0 {
                    return Err(Error::invalid_data("gnre index zero"));
                }
                TagValue::Genre(Genre::Index((index - 1).min(u8::MAX as u16) as u8))
            }
            _ => TagValue::Binary {
                data: value.to_vec(),
                mime_type: String::new(),
            },
        },
        _ => TagValue::Binary {
            data: value.to_vec(),
            mime_type: String::new(),
        },
    })
}

/// Build a `data` atom for the value; `None` when the value cannot be
/// represented (e.g. empty).
fn make_data_atom(fourcc: [u8; 4], value: &TagValue) -> Option<Vec<u8>> {
    let (type_code, bytes): (u32, Vec<u8>) = match value {
        TagValue::Empty => return None,
        TagValue::Text { data, encoding } => match encoding {
            TextEncoding::Utf16Be | TextEncoding::Utf16Le => (
                data_type::UTF16BE,
                mediatag_core::io::text::string_to_utf16(data, false),
            ),
            _ => (data_type::UTF8, data.as_bytes().to_vec()),
        },
        TagValue::Integer(i) => {
            let bytes = if i16::try_from(*i).is_ok() {
                (*i as i16).to_be_bytes().to_vec()
            } else if i32::try_from(*i).is_ok() {
                (*i as i32).to_be_bytes().to_vec()
            } else {
                i.to_be_bytes().to_vec()
            };
            (data_type::BE_SIGNED, bytes)
        }
        TagValue::Position(position) => {
            let mut bytes = vec![0u8, 0];
            bytes.extend_from_slice(&(position.position.unwrap_or(0) as u16).to_be_bytes());
            bytes.extend_from_slice(&(position.total.unwrap_or(0) as u16).to_be_bytes());
            if fourcc == *b"trkn" {
                bytes.extend_from_slice(&[0, 0]);
            }
            (data_type::IMPLICIT, bytes)
        }
        TagValue::Genre(Genre::Index(index)) => (
            data_type::IMPLICIT,
            ((*index as u16) + 1).to_be_bytes().to_vec(),
        ),
        TagValue::Genre(Genre::Name(name)) => (data_type::UTF8, name.as_bytes().to_vec()),
        TagValue::Picture(picture) => {
            let code = if picture.mime_type == "image/png" {
                data_type::PNG
            } else {
                data_type::JPEG
            };
            (code, picture.data.clone())
        }
        TagValue::Binary { data, .. } => (data_type::IMPLICIT, data.clone()),
        other => (
            data_type::UTF8,
            other.to_text()?.as_bytes().to_vec(),
        ),
    };
    let mut payload = type_code.to_be_bytes().to_vec();
    payload.extend_from_slice(&[0u8; 4]); // locale
    payload.extend_from_slice(&bytes);
    let mut out = Vec::new();
    put_atom(&mut out, ids::DATA, &payload);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(tag: &Mp4Tag) -> Mp4Tag {
        let ilst = tag.make_ilst().unwrap();
        let mut diag = Diagnostics::new();
        let parsed = Mp4Tag::parse_ilst(&ilst, &mut diag).unwrap();
        assert!(diag.is_empty(), "{:?}", diag.entries());
        parsed
    }

    #[test]
    fn test_title_utf8() {
        let mut tag = Mp4Tag::new();
        assert!(tag.set_value(KnownField::Title, TagValue::text("Example \u{2713}")));
        let ilst = tag.make_ilst().unwrap();
        // data atom type code 1 and the expected UTF-8 bytes are present.
        let expected = [
            0x45, 0x78, 0x61, 0x6D, 0x70, 0x6C, 0x65, 0x20, 0xE2, 0x9C, 0x93,
        ];
        assert!(ilst
            .windows(expected.len())
            .any(|window| window == expected));
        let back = roundtrip(&tag);
        assert_eq!(
            back.value(KnownField::Title).and_then(TagValue::to_text),
            Some("Example \u{2713}".into())
        );
    }

    #[test]
    fn test_track_position() {
        let mut tag = Mp4Tag::new();
        tag.set_value(
            KnownField::TrackPosition,
            TagValue::Position(PositionInSet::new(3, 12)),
        );
        let back = roundtrip(&tag);
        assert_eq!(
            back.value(KnownField::TrackPosition),
            Some(&TagValue::Position(PositionInSet::new(3, 12)))
        );
    }

    #[test]
    fn test_numeric_genre_uses_gnre() {
        let mut tag = Mp4Tag::new();
        tag.set_value(KnownField::Genre, TagValue::Genre(Genre::Index(17)));
        let ilst = tag.make_ilst().unwrap();
        assert!(ilst.windows(4).any(|w| w == b"gnre"));
        let back = roundtrip(&tag);
        assert_eq!(
            back.value(KnownField::Genre),
            Some(&TagValue::Genre(Genre::Index(17)))
        );
    }

    #[test]
    fn test_freeform_roundtrip() {
        let mut tag = Mp4Tag::new();
        tag.fields.push(TagField::new(
            FieldId::Freeform {
                mean: "com.apple.iTunes".into(),
                name: "MEDIA".into(),
            },
            TagValue::text("Movie"),
        ));
        let back = roundtrip(&tag);
        assert_eq!(
            back.fields()[0].id,
            FieldId::Freeform {
                mean: "com.apple.iTunes".into(),
                name: "MEDIA".into()
            }
        );
        assert_eq!(back.fields()[0].value.to_text().as_deref(), Some("Movie"));
    }

    #[test]
    fn test_duplicates_preserved_in_order() {
        let mut tag = Mp4Tag::new();
        tag.fields.push(TagField::new(
            FieldId::FourCc(*b"\xA9cmt"),
            TagValue::text("first"),
        ));
        tag.fields.push(TagField::new(
            FieldId::FourCc(*b"\xA9cmt"),
            TagValue::text("second"),
        ));
        let back = roundtrip(&tag);
        let comments: Vec<_> = back
            .fields()
            .iter()
            .filter(|f| matches!(&f.id, FieldId::FourCc(id) if id == b"\xA9cmt"))
            .map(|f| f.value.to_text().unwrap())
            .collect();
        assert_eq!(comments, vec!["first", "second"]);
    }

    #[test]
    fn test_cover_mime_detection() {
        let mut tag = Mp4Tag::new();
        tag.set_value(
            KnownField::Cover,
            TagValue::Picture(Picture {
                data: vec![0x89, b'P', b'N', b'G'],
                mime_type: "image/png".into(),
                description: String::new(),
                picture_type: 3,
            }),
        );
        let back = roundtrip(&tag);
        match back.value(KnownField::Cover) {
            Some(TagValue::Picture(picture)) => {
                assert_eq!(picture.mime_type, "image/png");
            }
            other => panic!("unexpected cover value: {other:?}"),
        }
    }

    #[test]
    fn test_empty_tag_serialises_to_none() {
        assert!(Mp4Tag::new().make_ilst().is_none());
    }
}
