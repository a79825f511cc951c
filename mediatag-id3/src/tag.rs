//! The ID3v2 tag: header, extended header, frames and padding.

use crate::frame::{self, convert_id_for_version};
use crate::synch;
use mediatag_core::{
    Diagnostics, Error, FieldId, Genre, KnownField, Result, Tag, TagField, TagTarget, TagType,
    TagValue,
};

/// Tag header length.
pub const HEADER_LEN: usize = 10;

/// Tag magic.
pub const ID3V2_MAGIC: [u8; 3] = *b"ID3";

/// Header flag: unsynchronisation applied.
const FLAG_UNSYNCHRONISATION: u8 = 0x80;
/// Header flag: extended header present.
const FLAG_EXTENDED_HEADER: u8 = 0x40;
/// Header flag: experimental.
const FLAG_EXPERIMENTAL: u8 = 0x20;
/// Header flag: footer present (v2.4).
const FLAG_FOOTER: u8 = 0x10;

/// Frame ids to consult for a uniform field, in priority order. Both the
/// v2.4 and v2.3 timestamp forms are listed so either parse source works.
fn frame_candidates(field: KnownField) -> &'static [[u8; 4]] {
    const TITLE: [[u8; 4]; 1] = [*b"TIT2"];
    const ARTIST: [[u8; 4]; 1] = [*b"TPE1"];
    const ALBUM: [[u8; 4]; 1] = [*b"TALB"];
    const ALBUM_ARTIST: [[u8; 4]; 1] = [*b"TPE2"];
    const GENRE: [[u8; 4]; 1] = [*b"TCON"];
    const RECORDING_DATE: [[u8; 4]; 2] = [*b"TDRC", *b"TYER"];
    const RELEASE_DATE: [[u8; 4]; 2] = [*b"TDRL", *b"TORY"];
    const COMMENT: [[u8; 4]; 1] = [*b"COMM"];
    const BPM: [[u8; 4]; 1] = [*b"TBPM"];
    const TRACK_POSITION: [[u8; 4]; 1] = [*b"TRCK"];
    const DISK_POSITION: [[u8; 4]; 1] = [*b"TPOS"];
    const ENCODER: [[u8; 4]; 1] = [*b"TENC"];
    const ENCODER_SETTINGS: [[u8; 4]; 1] = [*b"TSSE"];
    const LYRICS: [[u8; 4]; 1] = [*b"USLT"];
    const COMPOSER: [[u8; 4]; 1] = [*b"TCOM"];
    const RATING: [[u8; 4]; 1] = [*b"POPM"];
    const COPYRIGHT: [[u8; 4]; 1] = [*b"TCOP"];
    const COVER: [[u8; 4]; 1] = [*b"APIC"];
    const PUBLISHER: [[u8; 4]; 1] = [*b"TPUB"];
    match field {
        KnownField::Title => &TITLE,
        KnownField::Artist => &ARTIST,
        KnownField::Album => &ALBUM,
        KnownField::AlbumArtist => &ALBUM_ARTIST,
        KnownField::Genre => &GENRE,
        KnownField::RecordingDate => &RECORDING_DATE,
        KnownField::ReleaseDate => &RELEASE_DATE,
        KnownField::Comment => &COMMENT,
        KnownField::Bpm => &BPM,
        KnownField::TrackPosition => &TRACK_POSITION,
        KnownField::DiskPosition => &DISK_POSITION,
        KnownField::Encoder => &ENCODER,
        KnownField::EncoderSettings => &ENCODER_SETTINGS,
        KnownField::Lyrics => &LYRICS,
        KnownField::Composer => &COMPOSER,
        KnownField::Rating => &RATING,
        KnownField::Copyright => &COPYRIGHT,
        KnownField::Cover => &COVER,
        KnownField::Publisher => &PUBLISHER,
        _ => &[],
    }
}

/// An ID3v2.2/2.3/2.4 tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Id3v2Tag {
    /// Major version as parsed (2, 3 or 4); new tags default to 4.
    pub version_major: u8,
    /// Revision byte.
    pub revision: u8,
    /// Total on-disk size including header, body, padding and footer.
    pub total_size: u64,
    target: TagTarget,
    fields: Vec<TagField>,
}

impl Id3v2Tag {
    /// Create an empty v2.4 tag.
    pub fn new() -> Self {
        Self {
            version_major: 4,
            ..Self::default()
        }
    }

    /// Size of the on-disk tag starting at `data`, without parsing frames.
    /// Returns `None` when no tag starts there.
    pub fn probe(data: &[u8]) -> Option<u64> {
        if data.len() < HEADER_LEN || data[..3] != ID3V2_MAGIC {
            return None;
        }
        let size = synch::decode_synchsafe(data[6..10].try_into().unwrap()).ok()?;
        let footer = if data[5] & FLAG_FOOTER != 0 { 10 } else { 0 };
        Some(HEADER_LEN as u64 + size as u64 + footer)
    }

    /// Parse a tag starting at `data`.
    pub fn parse(data: &[u8], diag: &mut Diagnostics) -> Result<Self> {
        if data.len() < HEADER_LEN || data[..3] != ID3V2_MAGIC {
            return Err(Error::no_data("no ID3v2 header"));
        }
        let version_major = data[3];
        let revision = data[4];
        if !(2..=4).contains(&version_major) {
            return Err(Error::unsupported_version(format!(
                "ID3v2.{version_major}.{revision}"
            )));
        }
        let flags = data[5];
        let size = synch::decode_synchsafe(data[6..10].try_into().unwrap())? as usize;
        if HEADER_LEN + size > data.len() {
            return Err(Error::TruncatedData {
                offset: 0,
                declared: (HEADER_LEN + size) as u64,
                available: data.len() as u64,
            });
        }
        let footer = if version_major == 4 && flags & FLAG_FOOTER != 0 {
            10u64
        } else {
            0
        };
        if flags & FLAG_EXPERIMENTAL != 0 {
            diag.info("parsing ID3v2 tag", "experimental flag set");
        }

        let mut body = data[HEADER_LEN..HEADER_LEN + size].to_vec();
        // v2.2 and v2.3 apply unsynchronisation to the whole body; v2.4
        // applies it per frame (the tag flag is then informational).
        if flags & FLAG_UNSYNCHRONISATION != 0 && version_major <= 3 {
            body = synch::deunsynchronize(&body);
        }

        let mut offset = 0usize;
        if flags & FLAG_EXTENDED_HEADER != 0 && version_major >= 3 {
            offset += extended_header_len(&body, version_major)?;
        }

        let mut tag = Id3v2Tag {
            version_major,
            revision,
            total_size: HEADER_LEN as u64 + size as u64 + footer,
            ..Id3v2Tag::default()
        };
        while offset < body.len() {
            match frame::parse_frame(&body[offset..], version_major, diag) {
                Ok(Some(parsed)) => {
                    tag.fields.extend(parsed.fields);
                    offset += parsed.consumed;
                }
                Ok(None) => break,
                Err(Error::TruncatedData { .. }) => {
                    diag.critical(
                        "parsing ID3v2 tag",
                        "frame exceeds the tag body; remaining frames skipped",
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(tag)
    }

    /// Serialise the tag.
    ///
    /// `version` must be 3 or 4 (a tag parsed as v2.2 converts to the
    /// requested version; frames without an equivalent are dropped with a
    /// warning). `padding` zero bytes follow the frames.
    pub fn make(&self, version: u8, padding: u32, diag: &mut Diagnostics) -> Result<Vec<u8>> {
        if version != 3 && version != 4 {
            return Err(Error::invalid_param(format!(
                "ID3v2.{version} cannot be written; use 3 or 4"
            )));
        }
        let mut body = frame::build_frames(&self.fields, version, diag)?;
        let mut flags = 0u8;
        if version == 3 && synch::needs_unsynchronisation(&body) {
            body = synch::unsynchronize(&body);
            flags |= FLAG_UNSYNCHRONISATION;
        }
        let size = body.len() + padding as usize;
        let mut out = Vec::with_capacity(HEADER_LEN + size);
        out.extend_from_slice(&ID3V2_MAGIC);
        out.push(version);
        out.push(0);
        out.push(flags);
        out.extend_from_slice(&synch::encode_synchsafe(size as u32)?);
        out.extend_from_slice(&body);
        out.extend(std::iter::repeat(0u8).take(padding as usize));
        Ok(out)
    }

    /// The version this tag writes as by default: the parsed version, or
    /// v2.4 for new tags and tags parsed from v2.2.
    pub fn preferred_write_version(&self) -> u8 {
        match self.version_major {
            3 => 3,
            _ => 4,
        }
    }

    /// Append a field without replacing existing occurrences.
    pub fn push_field(&mut self, field: TagField) {
        self.fields.push(field);
    }
}

fn extended_header_len(body: &[u8], version: u8) -> Result<usize> {
    if body.len() < 4 {
        return Err(Error::invalid_data("extended header truncated"));
    }
    let size_bytes: [u8; 4] = body[..4].try_into().unwrap();
    Ok(if version == 4 {
        // v2.4: synchsafe, includes the size field itself.
        (synch::decode_synchsafe(size_bytes)? as usize).max(4)
    } else {
        // v2.3: plain big-endian, excludes the size field.
        u32::from_be_bytes(size_bytes) as usize + 4
    })
}

impl Tag for Id3v2Tag {
    fn tag_type(&self) -> TagType {
        TagType::Id3v2
    }

    fn target(&self) -> &TagTarget {
        &self.target
    }

    fn set_target(&mut self, _target: TagTarget) {}

    fn fields(&self) -> &[TagField] {
        &self.fields
    }

    fn supports_field(&self, field: KnownField) -> bool {
        !frame_candidates(field).is_empty()
    }

    fn value(&self, field: KnownField) -> Option<&TagValue> {
        for id in frame_candidates(field) {
            let found = self
                .fields
                .iter()
                .find(|f| matches!(&f.id, FieldId::FourCc(raw) if raw == id));
            if let Some(found) = found {
                return Some(&found.value);
            }
        }
        None
    }

    fn set_value(&mut self, field: KnownField, value: TagValue) -> bool {
        let candidates = frame_candidates(field);
        let Some(&primary) = candidates.first() else {
            return false;
        };
        self.remove_value(field);
        if !value.is_empty() {
            // Numeric genres are written in their textual form.
            let value = match value {
                TagValue::Genre(Genre::Index(index)) if field == KnownField::Genre => {
                    TagValue::text(index.to_string())
                }
                other => other,
            };
            self.fields.push(TagField::new(FieldId::FourCc(primary), value));
        }
        true
    }

    fn remove_value(&mut self, field: KnownField) -> bool {
        let candidates = frame_candidates(field);
        let before = self.fields.len();
        self.fields.retain(|f| {
            !matches!(&f.id, FieldId::FourCc(raw) if candidates.contains(raw))
        });
        before != self.fields.len()
    }
}

/// Convert the uniform fields of any tag into an ID3v1 tag, for writers that
/// keep both tags in sync.
pub fn synthesize_v1(source: &dyn Tag) -> crate::v1::Id3v1Tag {
    let mut v1 = crate::v1::Id3v1Tag::new();
    for &field in &[
        KnownField::Title,
        KnownField::Artist,
        KnownField::Album,
        KnownField::RecordingDate,
        KnownField::Comment,
        KnownField::TrackPosition,
        KnownField::Genre,
    ] {
        if let Some(value) = source.value(field) {
            v1.set_value(field, value.clone());
        }
    }
    v1
}

/// The id a uniform field maps to under the given write version, exposed for
/// tests and the facade.
pub fn frame_id_for(field: KnownField, version: u8) -> Option<[u8; 4]> {
    frame_candidates(field)
        .first()
        .map(|&id| convert_id_for_version(id, version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediatag_core::TextEncoding;

    #[test]
    fn test_roundtrip_v4() {
        let mut tag = Id3v2Tag::new();
        tag.set_value(KnownField::Title, TagValue::text("Hi"));
        tag.set_value(KnownField::Artist, TagValue::text("Someone"));
        let mut diag = Diagnostics::new();
        let bytes = tag.make(4, 64, &mut diag).unwrap();
        assert!(diag.is_empty());

        let parsed = Id3v2Tag::parse(&bytes, &mut diag).unwrap();
        assert_eq!(parsed.version_major, 4);
        assert_eq!(
            parsed.value(KnownField::Title).and_then(TagValue::to_text),
            Some("Hi".into())
        );
        assert_eq!(parsed.total_size, bytes.len() as u64);
    }

    #[test]
    fn test_header_size_synchsafe() {
        // 245 bytes of frames + padding to reach a 255-byte body: the size
        // field must read 00 00 01 7F with every MSB clear.
        let mut tag = Id3v2Tag::new();
        tag.set_value(KnownField::Title, TagValue::text("Hi"));
        let mut diag = Diagnostics::new();
        let frames = frame::build_frames(tag.fields(), 3, &mut diag).unwrap();
        let padding = 255 - frames.len() as u32;
        let bytes = tag.make(3, padding, &mut diag).unwrap();
        assert_eq!(&bytes[6..10], &[0x00, 0x00, 0x01, 0x7F]);
        assert!(bytes[6..10].iter().all(|b| b & 0x80 == 0));
    }

    #[test]
    fn test_v23_tag_level_unsynchronisation() {
        let mut tag = Id3v2Tag::new();
        tag.push_field(TagField::new(
            FieldId::FourCc(*b"PRIV"),
            TagValue::Binary {
                data: vec![0xFF, 0xFB, 0x90, 0x44],
                mime_type: String::new(),
            },
        ));
        let mut diag = Diagnostics::new();
        let bytes = tag.make(3, 0, &mut diag).unwrap();
        assert_eq!(bytes[5] & 0x80, 0x80, "tag-level unsync flag expected");
        // No false sync in the body.
        assert!(!bytes[10..]
            .windows(2)
            .any(|w| w[0] == 0xFF && w[1] >= 0xE0));

        let parsed = Id3v2Tag::parse(&bytes, &mut diag).unwrap();
        let private = parsed
            .fields()
            .iter()
            .find(|f| matches!(&f.id, FieldId::FourCc(id) if id == b"PRIV"))
            .unwrap();
        assert_eq!(
            private.value,
            TagValue::Binary {
                data: vec![0xFF, 0xFB, 0x90, 0x44],
                mime_type: String::new()
            }
        );
    }

    #[test]
    fn test_recording_date_read_from_either_frame() {
        // A v2.3 tag stores TYER; the uniform field still reads it.
        let mut tag = Id3v2Tag::new();
        tag.push_field(TagField::new(
            FieldId::FourCc(*b"TYER"),
            TagValue::text_with_encoding("1999", TextEncoding::Latin1),
        ));
        assert_eq!(
            tag.value(KnownField::RecordingDate)
                .and_then(TagValue::to_text),
            Some("1999".into())
        );
        // Writing as v2.4 converts the frame id.
        let mut diag = Diagnostics::new();
        let bytes = tag.make(4, 0, &mut diag).unwrap();
        assert!(bytes.windows(4).any(|w| w == b"TDRC"));
        assert!(!bytes.windows(4).any(|w| w == b"TYER"));
    }

    #[test]
    fn test_v22_parse_and_conversion() {
        // Hand-built v2.2 tag with TT2 and an RVA frame.
        let mut body = Vec::new();
        body.extend_from_slice(b"TT2");
        body.extend_from_slice(&[0, 0, 3, 0]);
        body.extend_from_slice(b"Hi");
        body.extend_from_slice(b"RVA");
        body.extend_from_slice(&[0, 0, 2, 0x10, 0x20]);
        let mut data = b"ID3\x02\x00\x00".to_vec();
        data.extend_from_slice(&synch::encode_synchsafe(body.len() as u32).unwrap());
        data.extend_from_slice(&body);

        let mut diag = Diagnostics::new();
        let tag = Id3v2Tag::parse(&data, &mut diag).unwrap();
        assert_eq!(tag.version_major, 2);
        assert_eq!(tag.preferred_write_version(), 4);
        assert_eq!(
            tag.value(KnownField::Title).and_then(TagValue::to_text),
            Some("Hi".into())
        );

        let bytes = tag.make(4, 0, &mut diag).unwrap();
        assert!(
            diag.entries().iter().any(|e| e.message.contains("RVA")),
            "dropping RVA must warn: {:?}",
            diag.entries()
        );
        let reparsed = Id3v2Tag::parse(&bytes, &mut diag).unwrap();
        assert_eq!(
            reparsed.value(KnownField::Title).and_then(TagValue::to_text),
            Some("Hi".into())
        );
    }

    #[test]
    fn test_probe() {
        let mut tag = Id3v2Tag::new();
        tag.set_value(KnownField::Title, TagValue::text("x"));
        let mut diag = Diagnostics::new();
        let bytes = tag.make(4, 10, &mut diag).unwrap();
        assert_eq!(Id3v2Tag::probe(&bytes), Some(bytes.len() as u64));
        assert_eq!(Id3v2Tag::probe(b"not a tag"), None);
    }

    #[test]
    fn test_unsupported_future_version() {
        let data = b"ID3\x05\x00\x00\x00\x00\x00\x00".to_vec();
        let mut diag = Diagnostics::new();
        assert!(matches!(
            Id3v2Tag::parse(&data, &mut diag),
            Err(Error::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_synthesize_v1() {
        let mut tag = Id3v2Tag::new();
        tag.set_value(KnownField::Title, TagValue::text("Song"));
        tag.set_value(KnownField::Genre, TagValue::Genre(Genre::Index(17)));
        let v1 = synthesize_v1(&tag);
        assert_eq!(
            v1.value(KnownField::Title).and_then(TagValue::to_text),
            Some("Song".into())
        );
    }
}
