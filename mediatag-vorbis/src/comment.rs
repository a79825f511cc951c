//! Vorbis comments: the vendor string and KEY=value field list.
//!
//! Keys are case-insensitive ASCII and stored uppercase; values are UTF-8.
//! Cover art travels as a base64 `METADATA_BLOCK_PICTURE` field sharing the
//! FLAC PICTURE block layout. Field order (and duplicate keys) survive a
//! round-trip; the vendor string is preserved verbatim.

use crate::picture;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use mediatag_core::{
    Diagnostics, Error, FieldId, KnownField, Result, Tag, TagField, TagTarget, TagType, TagValue,
};

/// Key of the embedded cover art field.
const PICTURE_KEY: &str = "METADATA_BLOCK_PICTURE";

/// Native key for a uniform field, where one exists.
fn field_key(field: KnownField) -> Option<&'static str> {
    Some(match field {
        KnownField::Title => "TITLE",
        KnownField::Artist => "ARTIST",
        KnownField::Album => "ALBUM",
        KnownField::AlbumArtist => "ALBUMARTIST",
        KnownField::Genre => "GENRE",
        KnownField::RecordingDate => "DATE",
        KnownField::Comment => "COMMENT",
        KnownField::Bpm => "BPM",
        KnownField::TrackPosition => "TRACKNUMBER",
        KnownField::DiskPosition => "DISCNUMBER",
        KnownField::Encoder => "ENCODER",
        KnownField::EncoderSettings => "ENCODING",
        KnownField::Lyrics => "LYRICS",
        KnownField::Composer => "COMPOSER",
        KnownField::Rating => "RATING",
        KnownField::Copyright => "COPYRIGHT",
        KnownField::Publisher => "PUBLISHER",
        KnownField::Cover => PICTURE_KEY,
        KnownField::ReleaseDate => "ORIGINALDATE",
        _ => return None,
    })
}

/// A Vorbis comment tag.
#[derive(Debug, Clone, PartialEq)]
pub struct VorbisComment {
    /// Vendor string, preserved on rewrite.
    pub vendor: String,
    target: TagTarget,
    fields: Vec<TagField>,
}

impl Default for VorbisComment {
    fn default() -> Self {
        Self {
            vendor: String::new(),
            target: TagTarget::default(),
            fields: Vec::new(),
        }
    }
}

impl VorbisComment {
    /// Create an empty comment with the given vendor string.
    pub fn new(vendor: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into(),
            ..Self::default()
        }
    }

    /// Parse a comment block. `data` starts at the vendor length field;
    /// `with_framing_bit` consumes the trailing framing bit the Vorbis codec
    /// requires.
    pub fn parse(data: &[u8], with_framing_bit: bool, diag: &mut Diagnostics) -> Result<Self> {
        let mut pos = 0usize;
        let read_u32 = |pos: &mut usize| -> Result<u32> {
            let bytes: [u8; 4] = data
                .get(*pos..*pos + 4)
                .ok_or_else(|| Error::invalid_data("Vorbis comment truncated"))?
                .try_into()
                .unwrap();
            *pos += 4;
            Ok(u32::from_le_bytes(bytes))
        };

        let vendor_len = read_u32(&mut pos)? as usize;
        let vendor_bytes = data
            .get(pos..pos + vendor_len)
            .ok_or_else(|| Error::invalid_data("Vorbis vendor string truncated"))?;
        pos += vendor_len;
        let vendor = String::from_utf8_lossy(vendor_bytes).into_owned();

        let count = read_u32(&mut pos)?;
        let mut comment = VorbisComment::new(vendor);
        for _ in 0..count {
            let len = read_u32(&mut pos)? as usize;
            let entry = data
                .get(pos..pos + len)
                .ok_or_else(|| Error::invalid_data("Vorbis comment entry truncated"))?;
            pos += len;
            let Ok(entry) = std::str::from_utf8(entry) else {
                diag.warn("parsing Vorbis comment", "non-UTF-8 comment entry skipped");
                continue;
            };
            let Some((key, value)) = entry.split_once('=') else {
                diag.warn(
                    "parsing Vorbis comment",
                    format!("comment entry without '=' skipped: {entry:?}"),
                );
                continue;
            };
            if !key.bytes().all(|b| (0x20..=0x7D).contains(&b) && b != b'=') {
                diag.warn(
                    "parsing Vorbis comment",
                    format!("comment key with invalid characters skipped: {key:?}"),
                );
                continue;
            }
            comment.fields.push(decode_field(key, value, diag));
        }
        if with_framing_bit {
            match data.get(pos) {
                Some(byte) if byte & 0x1 == 1 => {}
                _ => diag.warn("parsing Vorbis comment", "framing bit missing or zero"),
            }
        }
        Ok(comment)
    }

    /// Serialise the comment block, optionally with the Vorbis framing bit.
    pub fn make(&self, with_framing_bit: bool) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.vendor.len() as u32).to_le_bytes());
        out.extend_from_slice(self.vendor.as_bytes());
        let entries: Vec<Vec<u8>> = self
            .fields
            .iter()
            .filter(|f| !f.is_empty())
            .filter_map(encode_field)
            .collect();
        out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        for entry in entries {
            out.extend_from_slice(&(entry.len() as u32).to_le_bytes());
            out.extend_from_slice(&entry);
        }
        if with_framing_bit {
            out.push(1);
        }
        out
    }

    /// Append a field without replacing existing occurrences.
    pub fn push_field(&mut self, field: TagField) {
        self.fields.push(field);
    }

    fn first_key(&self, key: &str) -> Option<&TagValue> {
        self.fields
            .iter()
            .find(|f| matches!(&f.id, FieldId::Key(k) if k == key))
            .map(|f| &f.value)
    }

    fn remove_key(&mut self, key: &str) -> bool {
        let before = self.fields.len();
        self.fields
            .retain(|f| !matches!(&f.id, FieldId::Key(k) if k == key));
        before != self.fields.len()
    }
}

impl Tag for VorbisComment {
    fn tag_type(&self) -> TagType {
        TagType::VorbisComment
    }

    fn target(&self) -> &TagTarget {
        &self.target
    }

    fn set_target(&mut self, _target: TagTarget) {
        // Vorbis comments always describe the whole logical stream.
    }

    fn fields(&self) -> &[TagField] {
        &self.fields
    }

    fn supports_field(&self, field: KnownField) -> bool {
        field_key(field).is_some()
    }

    fn value(&self, field: KnownField) -> Option<&TagValue> {
        self.first_key(field_key(field)?)
    }

    fn set_value(&mut self, field: KnownField, value: TagValue) -> bool {
        let Some(key) = field_key(field) else {
            return false;
        };
        self.remove_value(field);
        if value.is_empty() {
            return true;
        }
        // A position with a total also fills the matching *TOTAL field.
        if let TagValue::Position(position) = &value {
            let total_key = match field {
                KnownField::TrackPosition => Some("TRACKTOTAL"),
                KnownField::DiskPosition => Some("DISCTOTAL"),
                _ => None,
            };
            if let (Some(total_key), Some(total)) = (total_key, position.total) {
                self.remove_key(total_key);
                self.fields.push(TagField::new(
                    FieldId::key(total_key),
                    TagValue::text(total.to_string()),
                ));
            }
            if let Some(pos) = position.position {
                self.fields.push(TagField::new(
                    FieldId::key(key),
                    TagValue::text(pos.to_string()),
                ));
            }
            return true;
        }
        self.fields.push(TagField::new(FieldId::key(key), value));
        true
    }

    fn remove_value(&mut self, field: KnownField) -> bool {
        let Some(key) = field_key(field) else {
            return false;
        };
        let mut removed = self.remove_key(key);
        match field {
            KnownField::TrackPosition => removed |= self.remove_key("TRACKTOTAL"),
            KnownField::DiskPosition => removed |= self.remove_key("DISCTOTAL"),
            _ => {}
        }
        removed
    }
}

fn decode_field(key: &str, value: &str, diag: &mut Diagnostics) -> TagField {
    let key_upper = key.to_ascii_uppercase();
    if key_upper == PICTURE_KEY {
        match BASE64
            .decode(value)
            .map_err(|e| Error::invalid_data(format!("invalid base64 picture: {e}")))
            .and_then(|block| picture::parse_picture_block(&block))
        {
            Ok(parsed) => {
                return TagField::new(FieldId::key(PICTURE_KEY), TagValue::Picture(parsed))
            }
            Err(e) => diag.warn(
                "parsing Vorbis comment",
                format!("unreadable {PICTURE_KEY} kept as text: {e}"),
            ),
        }
    }
    TagField::new(FieldId::key(key_upper), TagValue::text(value))
}

fn encode_field(field: &TagField) -> Option<Vec<u8>> {
    let FieldId::Key(key) = &field.id else {
        return None;
    };
    let value = match &field.value {
        TagValue::Picture(picture) => BASE64.encode(picture::make_picture_block(picture)),
        other => other.to_text()?,
    };
    let mut entry = Vec::with_capacity(key.len() + 1 + value.len());
    entry.extend_from_slice(key.as_bytes());
    entry.push(b'=');
    entry.extend_from_slice(value.as_bytes());
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediatag_core::{Picture, PositionInSet};

    fn roundtrip(comment: &VorbisComment, framing: bool) -> VorbisComment {
        let bytes = comment.make(framing);
        let mut diag = Diagnostics::new();
        let parsed = VorbisComment::parse(&bytes, framing, &mut diag).unwrap();
        assert!(diag.is_empty(), "{:?}", diag.entries());
        parsed
    }

    #[test]
    fn test_roundtrip_preserves_vendor_and_order() {
        let mut comment = VorbisComment::new("mediatag test vendor");
        comment.push_field(TagField::new(FieldId::key("ARTIST"), TagValue::text("Bach")));
        comment.push_field(TagField::new(FieldId::key("TITLE"), TagValue::text("Air")));
        comment.push_field(TagField::new(
            FieldId::key("ARTIST"),
            TagValue::text("Orchestra"),
        ));
        let back = roundtrip(&comment, true);
        assert_eq!(back.vendor, "mediatag test vendor");
        let keys: Vec<String> = back.fields().iter().map(|f| f.id.to_string()).collect();
        assert_eq!(keys, vec!["ARTIST", "TITLE", "ARTIST"]);
    }

    #[test]
    fn test_case_insensitive_keys() {
        let mut diag = Diagnostics::new();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        let entry = b"artist=Bach";
        bytes.extend_from_slice(&(entry.len() as u32).to_le_bytes());
        bytes.extend_from_slice(entry);
        let comment = VorbisComment::parse(&bytes, false, &mut diag).unwrap();
        assert_eq!(
            comment.value(KnownField::Artist).and_then(TagValue::to_text),
            Some("Bach".into())
        );
    }

    #[test]
    fn test_picture_roundtrip() {
        let mut comment = VorbisComment::new("v");
        comment.set_value(
            KnownField::Cover,
            TagValue::Picture(Picture {
                data: vec![0xFF, 0xD8],
                mime_type: "image/jpeg".into(),
                description: "cover".into(),
                picture_type: 3,
            }),
        );
        let back = roundtrip(&comment, false);
        match back.value(KnownField::Cover) {
            Some(TagValue::Picture(picture)) => {
                assert_eq!(picture.mime_type, "image/jpeg");
                assert_eq!(picture.data, vec![0xFF, 0xD8]);
            }
            other => panic!("unexpected cover: {other:?}"),
        }
    }

    #[test]
    fn test_track_position_fills_total() {
        let mut comment = VorbisComment::new("v");
        comment.set_value(
            KnownField::TrackPosition,
            TagValue::Position(PositionInSet::new(3, 12)),
        );
        let back = roundtrip(&comment, false);
        assert_eq!(
            back.value(KnownField::TrackPosition)
                .and_then(TagValue::to_text),
            Some("3".into())
        );
        assert_eq!(
            back.first_key("TRACKTOTAL").and_then(TagValue::to_text),
            Some("12".into())
        );
    }

    #[test]
    fn test_malformed_entry_skipped_with_warning() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        let entry = b"no separator here";
        bytes.extend_from_slice(&(entry.len() as u32).to_le_bytes());
        bytes.extend_from_slice(entry);
        let mut diag = Diagnostics::new();
        let comment = VorbisComment::parse(&bytes, false, &mut diag).unwrap();
        assert!(comment.fields().is_empty());
        assert!(diag.has_problems());
    }

    #[test]
    fn test_truncated_rejected() {
        let mut comment = VorbisComment::new("vendor string");
        comment.push_field(TagField::new(FieldId::key("TITLE"), TagValue::text("x")));
        let bytes = comment.make(false);
        let mut diag = Diagnostics::new();
        assert!(VorbisComment::parse(&bytes[..6], false, &mut diag).is_err());
    }
}
