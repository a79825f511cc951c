//! ID3v1: the fixed 128-byte trailer.
//!
//! Fields are fixed-width Latin-1, NUL- or space-padded. ID3v1.1 steals the
//! last two comment bytes for a track number (a zero byte followed by a
//! non-zero one).

use crate::genres;
use mediatag_core::io::text;
use mediatag_core::{
    Error, FieldId, Genre, KnownField, PositionInSet, Result, Tag, TagField, TagTarget, TagType,
    TagValue, TextEncoding,
};

/// Total trailer size.
pub const ID3V1_LEN: usize = 128;

/// Trailer magic.
pub const ID3V1_MAGIC: [u8; 3] = *b"TAG";

/// An ID3v1(.1) tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Id3v1Tag {
    target: TagTarget,
    fields: Vec<TagField>,
}

fn fixed_string(data: &[u8]) -> String {
    let end = data
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(data.len());
    text::latin1_to_string(&data[..end]).trim_end().to_string()
}

fn put_fixed(out: &mut [u8], value: &str) {
    let bytes = text::string_to_latin1(value)
        .unwrap_or_else(|| value.chars().map(|c| if (c as u32) <= 0xFF { c as u8 } else { b'?' }).collect());
    let len = bytes.len().min(out.len());
    out[..len].copy_from_slice(&bytes[..len]);
}

impl Id3v1Tag {
    /// Create an empty tag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a 128-byte trailer.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ID3V1_LEN || data[..3] != ID3V1_MAGIC {
            return Err(Error::no_data("no ID3v1 trailer"));
        }
        let mut tag = Id3v1Tag::new();
        let mut push = |field: KnownField, value: TagValue| {
            if !value.is_empty() {
                tag.set_value(field, value);
            }
        };
        push(KnownField::Title, latin1_value(&data[3..33]));
        push(KnownField::Artist, latin1_value(&data[33..63]));
        push(KnownField::Album, latin1_value(&data[63..93]));
        push(KnownField::RecordingDate, latin1_value(&data[93..97]));
        // ID3v1.1 track number.
        if data[125] == 0 && data[126] != 0 {
            push(KnownField::Comment, latin1_value(&data[97..125]));
            push(
                KnownField::TrackPosition,
                TagValue::Position(PositionInSet {
                    position: Some(data[126] as u32),
                    total: None,
                }),
            );
        } else {
            push(KnownField::Comment, latin1_value(&data[97..127]));
        }
        if genres::genre_name(data[127]).is_some() {
            push(KnownField::Genre, TagValue::Genre(Genre::Index(data[127])));
        }
        Ok(tag)
    }

    /// Serialise the 128-byte trailer.
    pub fn make(&self) -> [u8; ID3V1_LEN] {
        let mut out = [0u8; ID3V1_LEN];
        out[..3].copy_from_slice(&ID3V1_MAGIC);
        let text_of = |field| {
            self.value(field)
                .and_then(TagValue::to_text)
                .unwrap_or_default()
        };
        put_fixed(&mut out[3..33], &text_of(KnownField::Title));
        put_fixed(&mut out[33..63], &text_of(KnownField::Artist));
        put_fixed(&mut out[63..93], &text_of(KnownField::Album));
        put_fixed(&mut out[93..97], &text_of(KnownField::RecordingDate));
        put_fixed(&mut out[97..125], &text_of(KnownField::Comment));
        if let Some(track) = self
            .value(KnownField::TrackPosition)
            .and_then(TagValue::to_integer)
        {
            if (1..=255).contains(&track) {
                out[125] = 0;
                out[126] = track as u8;
            }
        }
        out[127] = match self.value(KnownField::Genre) {
            Some(TagValue::Genre(Genre::Index(index))) => *index,
            Some(TagValue::Genre(Genre::Name(name))) => genres::genre_index(name).unwrap_or(0xFF),
            Some(other) => other
                .to_text()
                .and_then(|name| genres::genre_index(&name))
                .unwrap_or(0xFF),
            None => 0xFF,
        };
        out
    }
}

fn latin1_value(data: &[u8]) -> TagValue {
    let value = fixed_string(data);
    if value.is_empty() {
        TagValue::Empty
    } else {
        TagValue::text_with_encoding(value, TextEncoding::Latin1)
    }
}

fn field_slot(field: KnownField) -> bool {
    matches!(
        field,
        KnownField::Title
            | KnownField::Artist
            | KnownField::Album
            | KnownField::RecordingDate
            | KnownField::Comment
            | KnownField::TrackPosition
            | KnownField::Genre
    )
}

impl Tag for Id3v1Tag {
    fn tag_type(&self) -> TagType {
        TagType::Id3v1
    }

    fn target(&self) -> &TagTarget {
        &self.target
    }

    fn set_target(&mut self, _target: TagTarget) {}

    fn fields(&self) -> &[TagField] {
        &self.fields
    }

    fn supports_field(&self, field: KnownField) -> bool {
        field_slot(field)
    }

    fn value(&self, field: KnownField) -> Option<&TagValue> {
        let key = format!("{field:?}");
        self.fields
            .iter()
            .find(|f| matches!(&f.id, FieldId::Name(n) if *n == key))
            .map(|f| &f.value)
    }

    fn set_value(&mut self, field: KnownField, value: TagValue) -> bool {
        if !field_slot(field) {
            return false;
        }
        self.remove_value(field);
        if !value.is_empty() {
            self.fields
                .push(TagField::new(FieldId::Name(format!("{field:?}")), value));
        }
        true
    }

    fn remove_value(&mut self, field: KnownField) -> bool {
        let key = format!("{field:?}");
        let before = self.fields.len();
        self.fields
            .retain(|f| !matches!(&f.id, FieldId::Name(n) if *n == key));
        before != self.fields.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let mut tag = Id3v1Tag::new();
        tag.set_value(KnownField::Title, TagValue::text("Some Title"));
        tag.set_value(KnownField::Artist, TagValue::text("Some Artist"));
        tag.set_value(KnownField::RecordingDate, TagValue::text("1999"));
        tag.set_value(
            KnownField::TrackPosition,
            TagValue::Position(PositionInSet {
                position: Some(7),
                total: None,
            }),
        );
        tag.set_value(KnownField::Genre, TagValue::Genre(Genre::Index(17)));

        let bytes = tag.make();
        assert_eq!(bytes.len(), ID3V1_LEN);
        assert_eq!(&bytes[..3], b"TAG");
        let parsed = Id3v1Tag::parse(&bytes).unwrap();
        assert_eq!(
            parsed.value(KnownField::Title).and_then(TagValue::to_text),
            Some("Some Title".into())
        );
        assert_eq!(
            parsed
                .value(KnownField::TrackPosition)
                .and_then(TagValue::to_integer),
            Some(7)
        );
        assert_eq!(
            parsed.value(KnownField::Genre),
            Some(&TagValue::Genre(Genre::Index(17)))
        );
    }

    #[test]
    fn test_no_magic() {
        assert!(Id3v1Tag::parse(&[0u8; 128]).is_err());
    }

    #[test]
    fn test_latin1_preserved() {
        let mut tag = Id3v1Tag::new();
        tag.set_value(KnownField::Artist, TagValue::text("M\u{fc}nchener Freiheit"));
        let bytes = tag.make();
        assert_eq!(bytes[33], b'M');
        assert_eq!(bytes[34], 0xFC);
        let parsed = Id3v1Tag::parse(&bytes).unwrap();
        assert_eq!(
            parsed.value(KnownField::Artist).and_then(TagValue::to_text),
            Some("M\u{fc}nchener Freiheit".into())
        );
    }

    #[test]
    fn test_unsupported_field() {
        let mut tag = Id3v1Tag::new();
        assert!(!tag.set_value(KnownField::Lyrics, TagValue::text("la la")));
    }
}
