//! Matroska tags: Targets and SimpleTag trees.

use crate::ebml::{self, ChildIter};
use crate::elements::*;
use crate::error::Result;
use mediatag_core::{
    Diagnostics, FieldId, KnownField, Tag, TagField, TagTarget, TagType, TagValue, TextEncoding,
};

/// Matroska tag name for a uniform field, where one exists.
fn field_name(field: KnownField) -> Option<&'static str> {
    Some(match field {
        KnownField::Title => "TITLE",
        KnownField::Artist => "ARTIST",
        KnownField::Album => "ALBUM",
        KnownField::AlbumArtist => "ALBUM_ARTIST",
        KnownField::Genre => "GENRE",
        KnownField::RecordingDate => "DATE_RECORDED",
        KnownField::ReleaseDate => "DATE_RELEASED",
        KnownField::Comment => "COMMENT",
        KnownField::Bpm => "BPM",
        KnownField::TrackPosition => "PART_NUMBER",
        KnownField::Encoder => "ENCODER",
        KnownField::EncoderSettings => "ENCODER_SETTINGS",
        KnownField::Lyrics => "LYRICS",
        KnownField::Composer => "COMPOSER",
        KnownField::Rating => "RATING",
        KnownField::Copyright => "COPYRIGHT",
        KnownField::Publisher => "PUBLISHER",
        // Cover art lives in Attachments, disk numbering has no defined name.
        KnownField::Cover | KnownField::DiskPosition => return None,
        _ => return None,
    })
}

/// One Matroska Tag element: a target plus its SimpleTag entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatroskaTag {
    target: TagTarget,
    fields: Vec<TagField>,
}

impl MatroskaTag {
    /// Create an empty tag with the given target.
    pub fn new(target: TagTarget) -> Self {
        Self {
            target,
            fields: Vec::new(),
        }
    }

    /// Append a field without replacing existing ones.
    pub fn push_field(&mut self, field: TagField) {
        self.fields.push(field);
    }

    /// Mutable access for the rewrite path.
    pub fn fields_mut(&mut self) -> &mut Vec<TagField> {
        &mut self.fields
    }

    /// Parse one Tag element payload.
    pub fn parse(data: &[u8], diag: &mut Diagnostics) -> Result<Self> {
        let mut tag = MatroskaTag::default();
        for child in ChildIter::new(data) {
            let (id, payload) = child?;
            match id {
                TARGETS => tag.target = parse_targets(payload)?,
                SIMPLE_TAG => match parse_simple_tag(payload, 0, diag)? {
                    Some(field) => tag.fields.push(field),
                    None => {}
                },
                _ => diag.info(
                    "parsing Matroska tag",
                    format!("unknown element 0x{id:X} in Tag ignored"),
                ),
            }
        }
        Ok(tag)
    }

    /// Serialise into a complete Tag element (header included).
    pub fn make_element(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        payload_targets(&mut payload, &self.target);
        for field in &self.fields {
            if !field.is_empty() {
                put_simple_tag(&mut payload, field);
            }
        }
        let mut out = Vec::new();
        ebml::put_element(&mut out, TAG, &payload);
        out
    }
}

impl Tag for MatroskaTag {
    fn tag_type(&self) -> TagType {
        TagType::Matroska
    }

    fn target(&self) -> &TagTarget {
        &self.target
    }

    fn set_target(&mut self, target: TagTarget) {
        self.target = target;
    }

    fn fields(&self) -> &[TagField] {
        &self.fields
    }

    fn supports_field(&self, field: KnownField) -> bool {
        field_name(field).is_some()
    }

    fn value(&self, field: KnownField) -> Option<&TagValue> {
        let name = field_name(field)?;
        self.fields
            .iter()
            .find(|f| matches!(&f.id, FieldId::Name(n) if n == name))
            .map(|f| &f.value)
    }

    fn set_value(&mut self, field: KnownField, value: TagValue) -> bool {
        let Some(name) = field_name(field) else {
            return false;
        };
        self.remove_value(field);
        if !value.is_empty() {
            self.fields
                .push(TagField::new(FieldId::Name(name.to_string()), value));
        }
        true
    }

    fn remove_value(&mut self, field: KnownField) -> bool {
        let Some(name) = field_name(field) else {
            return false;
        };
        let before = self.fields.len();
        self.fields
            .retain(|f| !matches!(&f.id, FieldId::Name(n) if n == name));
        before != self.fields.len()
    }
}

fn parse_targets(data: &[u8]) -> Result<TagTarget> {
    let mut target = TagTarget::default();
    for child in ChildIter::new(data) {
        let (id, payload) = child?;
        match id {
            TARGET_TYPE_VALUE => target.level = ebml::parse_uint(payload),
            TARGET_TYPE => target.level_name = ebml::parse_string(payload)?,
            TAG_TRACK_UID => target.track_uids.push(ebml::parse_uint(payload)),
            TAG_CHAPTER_UID => target.chapter_uids.push(ebml::parse_uint(payload)),
            TAG_EDITION_UID => target.edition_uids.push(ebml::parse_uint(payload)),
            TAG_ATTACHMENT_UID => target.attachment_uids.push(ebml::parse_uint(payload)),
            _ => {}
        }
    }
    Ok(target)
}

fn payload_targets(out: &mut Vec<u8>, target: &TagTarget) {
    let mut payload = Vec::new();
    if target.level != 0 {
        ebml::put_uint(&mut payload, TARGET_TYPE_VALUE, target.level);
    }
    if !target.level_name.is_empty() {
        ebml::put_string(&mut payload, TARGET_TYPE, &target.level_name);
    }
    for &uid in &target.track_uids {
        ebml::put_uint(&mut payload, TAG_TRACK_UID, uid);
    }
    for &uid in &target.chapter_uids {
        ebml::put_uint(&mut payload, TAG_CHAPTER_UID, uid);
    }
    for &uid in &target.edition_uids {
        ebml::put_uint(&mut payload, TAG_EDITION_UID, uid);
    }
    for &uid in &target.attachment_uids {
        ebml::put_uint(&mut payload, TAG_ATTACHMENT_UID, uid);
    }
    ebml::put_element(out, TARGETS, &payload);
}

const MAX_SIMPLE_TAG_DEPTH: u32 = 16;

fn parse_simple_tag(
    data: &[u8],
    depth: u32,
    diag: &mut Diagnostics,
) -> Result<Option<TagField>> {
    if depth > MAX_SIMPLE_TAG_DEPTH {
        diag.critical(
            "parsing Matroska tag",
            "SimpleTag nesting deeper than 16 levels; subtree skipped",
        );
        return Ok(None);
    }
    let mut name = String::new();
    let mut language = None;
    let mut value = TagValue::Empty;
    let mut nested = Vec::new();
    for child in ChildIter::new(data) {
        let (id, payload) = child?;
        match id {
            TAG_NAME => name = ebml::parse_string(payload)?,
            TAG_LANGUAGE => {
                let lang = ebml::parse_string(payload)?;
                if !mediatag_core::lang::is_unspecified(&lang) {
                    language = Some(lang);
                }
            }
            TAG_STRING => {
                value = TagValue::text_with_encoding(ebml::parse_string(payload)?, TextEncoding::Utf8)
            }
            TAG_BINARY => {
                value = TagValue::Binary {
                    data: payload.to_vec(),
                    mime_type: String::new(),
                }
            }
            SIMPLE_TAG => {
                if let Some(field) = parse_simple_tag(payload, depth + 1, diag)? {
                    nested.push(field);
                }
            }
            TAG_DEFAULT => {}
            _ => {}
        }
    }
    if name.is_empty() {
        diag.warn("parsing Matroska tag", "SimpleTag without TagName skipped");
        return Ok(None);
    }
    let mut field = TagField::new(FieldId::Name(name), value);
    field.language = language;
    field.nested = nested;
    Ok(Some(field))
}

fn put_simple_tag(out: &mut Vec<u8>, field: &TagField) {
    let mut payload = Vec::new();
    let name = match &field.id {
        FieldId::Name(n) => n.clone(),
        other => other.to_string(),
    };
    ebml::put_string(&mut payload, TAG_NAME, &name);
    ebml::put_string(
        &mut payload,
        TAG_LANGUAGE,
        field.language.as_deref().unwrap_or("und"),
    );
    match &field.value {
        TagValue::Binary { data, .. } => ebml::put_element(&mut payload, TAG_BINARY, data),
        TagValue::Empty => {}
        other => {
            if let Some(text) = other.to_text() {
                ebml::put_string(&mut payload, TAG_STRING, &text);
            }
        }
    }
    for nested in &field.nested {
        if !nested.is_empty() {
            put_simple_tag(&mut payload, nested);
        }
    }
    ebml::put_element(out, SIMPLE_TAG, &payload);
}

/// Parse a whole Tags element payload into its Tag entries.
pub fn parse_tags_payload(data: &[u8], diag: &mut Diagnostics) -> Result<Vec<MatroskaTag>> {
    let mut tags = Vec::new();
    for child in ChildIter::new(data) {
        let (id, payload) = child?;
        if id == TAG {
            tags.push(MatroskaTag::parse(payload, diag)?);
        }
    }
    Ok(tags)
}

/// Serialise tags into a complete Tags element (header included). Empty tags
/// are skipped; returns `None` when nothing remains.
pub fn make_tags_element(tags: &[MatroskaTag]) -> Option<Vec<u8>> {
    let mut payload = Vec::new();
    for tag in tags {
        if !tag.is_empty() {
            payload.extend_from_slice(&tag.make_element());
        }
    }
    if payload.is_empty() {
        return None;
    }
    let mut out = Vec::new();
    ebml::put_element(&mut out, TAGS, &payload);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediatag_core::target::level;

    fn roundtrip(tag: &MatroskaTag) -> MatroskaTag {
        let element = tag.make_element();
        // Strip the Tag header to get the payload back.
        let mut iter = ChildIter::new(&element);
        let (id, payload) = iter.next().unwrap().unwrap();
        assert_eq!(id, TAG);
        let mut diag = Diagnostics::new();
        MatroskaTag::parse(payload, &mut diag).unwrap()
    }

    #[test]
    fn test_simple_roundtrip() {
        let mut tag = MatroskaTag::new(TagTarget::file());
        assert!(tag.set_value(KnownField::Title, TagValue::text("clip")));
        assert!(tag.set_value(KnownField::Artist, TagValue::text("someone")));
        let back = roundtrip(&tag);
        assert_eq!(
            back.value(KnownField::Title).and_then(TagValue::to_text),
            Some("clip".into())
        );
        assert_eq!(
            back.value(KnownField::Artist).and_then(TagValue::to_text),
            Some("someone".into())
        );
    }

    #[test]
    fn test_track_target_roundtrip() {
        let mut tag = MatroskaTag::new(TagTarget::track(0xDEADBEEF));
        tag.set_value(KnownField::Title, TagValue::text("commentary"));
        let back = roundtrip(&tag);
        assert_eq!(back.target().level, level::TRACK);
        assert_eq!(back.target().track_uids, vec![0xDEADBEEF]);
    }

    #[test]
    fn test_nested_simple_tag() {
        let mut part = TagField::new(FieldId::Name("PART_NUMBER".into()), TagValue::text("3"));
        part.nested.push(TagField::new(
            FieldId::Name("TOTAL_PARTS".into()),
            TagValue::text("12"),
        ));
        let mut tag = MatroskaTag::new(TagTarget::file());
        tag.push_field(part);
        let back = roundtrip(&tag);
        let field = &back.fields()[0];
        assert_eq!(field.nested.len(), 1);
        assert_eq!(field.nested[0].value.to_text().as_deref(), Some("12"));
    }

    #[test]
    fn test_unsupported_fields() {
        let mut tag = MatroskaTag::new(TagTarget::file());
        assert!(!tag.supports_field(KnownField::Cover));
        assert!(!tag.set_value(
            KnownField::Cover,
            TagValue::Binary {
                data: vec![1, 2],
                mime_type: "image/jpeg".into()
            }
        ));
    }

    #[test]
    fn test_tags_element_skips_empty() {
        let empty = MatroskaTag::new(TagTarget::file());
        assert!(make_tags_element(&[empty]).is_none());
    }
}
