//! ID3v2 frame parsing and serialisation.
//!
//! Frame headers are 6 bytes in v2.2 (3-byte id, 3-byte size) and 10 bytes
//! in v2.3/v2.4 (4-byte id, 4-byte size, 2 flag bytes); v2.4 frame sizes are
//! synchsafe. The first byte of a text frame declares its encoding; multiple
//! values are separated by one NUL terminator in that encoding.

use crate::synch;
use mediatag_core::io::text;
use mediatag_core::{
    Diagnostics, Error, FieldId, Genre, Picture, Result, TagField, TagValue, TextEncoding,
};

/// Text encoding bytes.
mod encoding {
    pub const LATIN1: u8 = 0;
    pub const UTF16_BOM: u8 = 1;
    pub const UTF16_BE: u8 = 2;
    pub const UTF8: u8 = 3;
}

/// Translate a v2.2 frame id to its v2.3/v2.4 form. `None` for frames with
/// no lossless successor (EQU, RVA, CRM).
pub fn translate_v22_id(id: [u8; 3]) -> Option<[u8; 4]> {
    Some(match &id {
        b"TT2" => *b"TIT2",
        b"TP1" => *b"TPE1",
        b"TP2" => *b"TPE2",
        b"TAL" => *b"TALB",
        b"TCO" => *b"TCON",
        b"TYE" => *b"TDRC",
        b"TRK" => *b"TRCK",
        b"TPA" => *b"TPOS",
        b"TBP" => *b"TBPM",
        b"TEN" => *b"TENC",
        b"TSS" => *b"TSSE",
        b"TCM" => *b"TCOM",
        b"TCR" => *b"TCOP",
        b"TPB" => *b"TPUB",
        b"TXX" => *b"TXXX",
        b"COM" => *b"COMM",
        b"ULT" => *b"USLT",
        b"PIC" => *b"APIC",
        b"POP" => *b"POPM",
        _ => return None,
    })
}

/// Convert a frame id between the v2.3 and v2.4 vocabularies where they
/// differ (the timestamp frames).
pub fn convert_id_for_version(id: [u8; 4], version: u8) -> [u8; 4] {
    match (&id, version) {
        (b"TYER", 4) => *b"TDRC",
        (b"TDRC", 3) => *b"TYER",
        (b"TDRL", 3) => *b"TORY",
        (b"TORY", 4) => *b"TDRL",
        _ => id,
    }
}

fn is_text_frame(id: &[u8; 4]) -> bool {
    id[0] == b'T' && id != b"TXXX"
}

fn decode_text(encoding_byte: u8, data: &[u8]) -> Result<(String, TextEncoding)> {
    Ok(match encoding_byte {
        encoding::LATIN1 => (text::latin1_to_string(data), TextEncoding::Latin1),
        encoding::UTF16_BOM => {
            let decoded = text::utf16_bom_to_string(data)?;
            let enc = if data.starts_with(&[0xFE, 0xFF]) {
                TextEncoding::Utf16Be
            } else {
                TextEncoding::Utf16Le
            };
            (decoded, enc)
        }
        encoding::UTF16_BE => (text::utf16_to_string(data, false)?, TextEncoding::Utf16Be),
        encoding::UTF8 => (
            String::from_utf8(data.to_vec())
                .map_err(|e| Error::invalid_data(format!("invalid UTF-8 text frame: {e}")))?,
            TextEncoding::Utf8,
        ),
        other => {
            return Err(Error::invalid_data(format!(
                "unknown text encoding byte {other}"
            )))
        }
    })
}

/// Terminator width for an encoding byte.
fn terminator_width(encoding_byte: u8) -> usize {
    match encoding_byte {
        encoding::UTF16_BOM | encoding::UTF16_BE => 2,
        _ => 1,
    }
}

/// Split `data` at the first terminator of the given width. Returns the head
/// and the rest (empty when no terminator exists).
fn split_terminated(data: &[u8], width: usize) -> (&[u8], &[u8]) {
    if width == 2 {
        let mut i = 0;
        while i + 1 < data.len() {
            if data[i] == 0 && data[i + 1] == 0 {
                return (&data[..i], &data[i + 2..]);
            }
            i += 2;
        }
    } else if let Some(pos) = data.iter().position(|&b| b == 0) {
        return (&data[..pos], &data[pos + 1..]);
    }
    (data, &[])
}

/// Encoding byte to use when writing `enc` under the given tag version
/// (UTF-8 exists only in v2.4).
fn encoding_byte_for(enc: TextEncoding, version: u8) -> (u8, TextEncoding) {
    match (enc, version) {
        (TextEncoding::Latin1, _) => (encoding::LATIN1, TextEncoding::Latin1),
        (TextEncoding::Utf8, 4) => (encoding::UTF8, TextEncoding::Utf8),
        (TextEncoding::Utf8, _) | (TextEncoding::Utf16Le, _) => {
            (encoding::UTF16_BOM, TextEncoding::Utf16Le)
        }
        (TextEncoding::Utf16Be, _) => (encoding::UTF16_BE, TextEncoding::Utf16Be),
    }
}

fn encode_text_with_bom(value: &str, encoding_byte: u8, enc: TextEncoding) -> Vec<u8> {
    match encoding_byte {
        encoding::LATIN1 => text::string_to_latin1(value)
            .unwrap_or_else(|| value.as_bytes().to_vec()),
        encoding::UTF16_BOM => {
            let little_endian = enc != TextEncoding::Utf16Be;
            let mut out = if little_endian {
                vec![0xFF, 0xFE]
            } else {
                vec![0xFE, 0xFF]
            };
            out.extend_from_slice(&text::string_to_utf16(value, little_endian));
            out
        }
        encoding::UTF16_BE => text::string_to_utf16(value, false),
        _ => value.as_bytes().to_vec(),
    }
}

/// One frame parsed off the tag body.
pub struct ParsedFrame {
    /// Bytes consumed including the header.
    pub consumed: usize,
    /// Fields the frame produced (text frames may hold several values).
    pub fields: Vec<TagField>,
}

/// Parse the frame at the start of `data`. Returns `None` when padding (a
/// zero byte) or the end of the body is reached.
pub fn parse_frame(
    data: &[u8],
    version: u8,
    diag: &mut Diagnostics,
) -> Result<Option<ParsedFrame>> {
    let header_len = if version == 2 { 6 } else { 10 };
    if data.len() < header_len || data[0] == 0 {
        return Ok(None);
    }

    let (id4, id_raw, size, mut frame_flags): ([u8; 4], FieldId, usize, u16) = if version == 2 {
        let id3: [u8; 3] = data[..3].try_into().unwrap();
        let size = u32::from_be_bytes([0, data[3], data[4], data[5]]) as usize;
        match translate_v22_id(id3) {
            // Translatable frames are carried under their modern id.
            Some(id4) => (id4, FieldId::FourCc(id4), size, 0),
            None => (*b"\0\0\0\0", FieldId::ThreeCc(id3), size, 0),
        }
    } else {
        let id4: [u8; 4] = data[..4].try_into().unwrap();
        let size_bytes: [u8; 4] = data[4..8].try_into().unwrap();
        let size = if version == 4 {
            synch::decode_synchsafe(size_bytes)? as usize
        } else {
            u32::from_be_bytes(size_bytes) as usize
        };
        let flags = u16::from_be_bytes([data[8], data[9]]);
        (id4, FieldId::FourCc(id4), size, flags)
    };

    if !data[..header_len - if version == 2 { 3 } else { 6 }]
        .iter()
        .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    {
        // Garbage where a frame id should be; treat as padding.
        return Ok(None);
    }
    let total = header_len + size;
    if total > data.len() {
        return Err(Error::TruncatedData {
            offset: 0,
            declared: total as u64,
            available: data.len() as u64,
        });
    }

    let mut payload = data[header_len..total].to_vec();
    if version == 4 {
        if frame_flags & 0x0002 != 0 {
            payload = synch::deunsynchronize(&payload);
            frame_flags &= !0x0002;
        }
        if frame_flags & 0x0001 != 0 && payload.len() >= 4 {
            // Drop the data length indicator.
            payload.drain(..4);
        }
    }
    let _ = frame_flags;
    // v2.3 compression/encryption live in the second flag byte.
    if version == 3 && data[9] & 0xC0 != 0 {
        diag.warn(
            "parsing ID3v2 tag",
            format!(
                "compressed or encrypted frame {} skipped",
                String::from_utf8_lossy(&data[..4])
            ),
        );
        return Ok(Some(ParsedFrame {
            consumed: total,
            fields: Vec::new(),
        }));
    }

    // Frames with no v2.3+ equivalent are kept under their v2.2 id and
    // dropped (with a warning) when the tag is written.
    if id4 == *b"\0\0\0\0" {
        let field = TagField::new(
            id_raw,
            TagValue::Binary {
                data: payload,
                mime_type: String::new(),
            },
        );
        return Ok(Some(ParsedFrame {
            consumed: total,
            fields: vec![field],
        }));
    }

    let fields = match &id4 {
        id if is_text_frame(id) => parse_text_frame(id_raw, &payload)?,
        b"TXXX" => vec![parse_txxx(id_raw, &payload)?],
        b"COMM" | b"USLT" => vec![parse_language_frame(id_raw, &payload)?],
        b"APIC" => vec![parse_apic(id_raw, &payload, version == 2)?],
        b"POPM" => vec![parse_popm(id_raw, &payload)?],
        _ => vec![TagField::new(
            id_raw,
            TagValue::Binary {
                data: payload,
                mime_type: String::new(),
            },
        )],
    };
    Ok(Some(ParsedFrame {
        consumed: total,
        fields,
    }))
}

fn parse_text_frame(id: FieldId, payload: &[u8]) -> Result<Vec<TagField>> {
    let Some((&encoding_byte, content)) = payload.split_first() else {
        return Ok(Vec::new());
    };
    let width = terminator_width(encoding_byte);
    let mut rest = content;
    let mut fields = Vec::new();
    loop {
        let (head, tail) = split_terminated(rest, width);
        let (value, enc) = decode_text(encoding_byte, head)?;
        if !value.is_empty() {
            fields.push(TagField::new(
                id.clone(),
                TagValue::text_with_encoding(value, enc),
            ));
        }
        if tail.is_empty() {
            break;
        }
        rest = tail;
    }
    Ok(fields)
}

fn parse_txxx(id: FieldId, payload: &[u8]) -> Result<TagField> {
    let Some((&encoding_byte, content)) = payload.split_first() else {
        return Err(Error::invalid_data("empty TXXX frame"));
    };
    let width = terminator_width(encoding_byte);
    let (description, value) = split_terminated(content, width);
    let (description, _) = decode_text(encoding_byte, description)?;
    let (value, enc) = decode_text(encoding_byte, value)?;
    Ok(TagField::new(id, TagValue::text_with_encoding(value, enc))
        .with_description(description))
}

fn parse_language_frame(id: FieldId, payload: &[u8]) -> Result<TagField> {
    if payload.len() < 4 {
        return Err(Error::invalid_data("language frame too short"));
    }
    let encoding_byte = payload[0];
    let language = String::from_utf8_lossy(&payload[1..4]).into_owned();
    let width = terminator_width(encoding_byte);
    let (description, body) = split_terminated(&payload[4..], width);
    let (description, _) = decode_text(encoding_byte, description)?;
    let (body, enc) = decode_text(encoding_byte, body)?;
    let mut field = TagField::new(id, TagValue::text_with_encoding(body, enc));
    if !mediatag_core::lang::is_unspecified(&language) {
        field.language = Some(language);
    }
    if !description.is_empty() {
        field.description = Some(description);
    }
    Ok(field)
}

fn parse_apic(id: FieldId, payload: &[u8], v22_format: bool) -> Result<TagField> {
    if payload.len() < 2 {
        return Err(Error::invalid_data("APIC frame too short"));
    }
    let encoding_byte = payload[0];
    let (mime, rest) = if v22_format {
        // v2.2 PIC: 3-byte image format instead of a MIME string.
        if payload.len() < 5 {
            return Err(Error::invalid_data("PIC frame too short"));
        }
        let format = &payload[1..4];
        let mime = match format {
            b"JPG" => "image/jpeg",
            b"PNG" => "image/png",
            _ => "application/octet-stream",
        };
        (mime.to_string(), &payload[4..])
    } else {
        let (mime, rest) = split_terminated(&payload[1..], 1);
        (text::latin1_to_string(mime), rest)
    };
    if rest.is_empty() {
        return Err(Error::invalid_data("APIC frame without picture data"));
    }
    let picture_type = rest[0];
    let width = terminator_width(encoding_byte);
    let (description, data) = split_terminated(&rest[1..], width);
    let (description, _) = decode_text(encoding_byte, description)?;
    Ok(TagField::new(
        id,
        TagValue::Picture(Picture {
            data: data.to_vec(),
            mime_type: mime,
            description,
            picture_type,
        }),
    ))
}

fn parse_popm(id: FieldId, payload: &[u8]) -> Result<TagField> {
    let (email, rest) = split_terminated(payload, 1);
    if rest.is_empty() {
        return Err(Error::invalid_data("POPM frame without a rating byte"));
    }
    let mut field = TagField::new(id, TagValue::Integer(rest[0] as i64));
    let email = text::latin1_to_string(email);
    if !email.is_empty() {
        field.description = Some(email);
    }
    Ok(field)
}

// ---------------------------------------------------------------------------
// Serialisation
// ---------------------------------------------------------------------------

fn push_frame_header(out: &mut Vec<u8>, id: [u8; 4], size: usize, version: u8, flags: u16) -> Result<()> {
    out.extend_from_slice(&id);
    if version == 4 {
        out.extend_from_slice(&synch::encode_synchsafe(size as u32)?);
    } else {
        out.extend_from_slice(&(size as u32).to_be_bytes());
    }
    out.extend_from_slice(&flags.to_be_bytes());
    Ok(())
}

/// Serialise `fields` as a v2.3 or v2.4 frame sequence. Text fields sharing
/// an id merge into one multi-value frame; v2.2-only frames are dropped with
/// a warning. In v2.4, frames containing false sync patterns are written
/// with frame-level unsynchronisation; for v2.3 the caller applies tag-level
/// unsynchronisation to the returned body.
pub fn build_frames(fields: &[TagField], version: u8, diag: &mut Diagnostics) -> Result<Vec<u8>> {
    debug_assert!(version == 3 || version == 4);
    let mut out = Vec::new();
    let mut merged: Vec<usize> = Vec::new();

    for (index, field) in fields.iter().enumerate() {
        if merged.contains(&index) || field.is_empty() {
            continue;
        }
        let id = match &field.id {
            FieldId::FourCc(id) => convert_id_for_version(*id, version),
            FieldId::ThreeCc(id) => {
                diag.warn(
                    "writing ID3v2 tag",
                    format!(
                        "frame {} has no ID3v2.{version} equivalent and was dropped",
                        String::from_utf8_lossy(id)
                    ),
                );
                continue;
            }
            other => {
                diag.warn(
                    "writing ID3v2 tag",
                    format!("field {other} cannot be stored in an ID3v2 tag"),
                );
                continue;
            }
        };

        let payload = if is_text_frame(&id) {
            // Collect all values of this id into one frame.
            let mut values: Vec<&TagField> = vec![field];
            for (other_index, other) in fields.iter().enumerate().skip(index + 1) {
                let other_id = match &other.id {
                    FieldId::FourCc(raw) => convert_id_for_version(*raw, version),
                    _ => continue,
                };
                if other_id == id && !other.is_empty() {
                    values.push(other);
                    merged.push(other_index);
                }
            }
            build_text_payload(&values, version)?
        } else {
            match build_single_payload(field, version)? {
                Some(payload) => payload,
                None => continue,
            }
        };

        let (payload, flags) = if version == 4 && synch::needs_unsynchronisation(&payload) {
            (synch::unsynchronize(&payload), 0x0002u16)
        } else {
            (payload, 0)
        };
        push_frame_header(&mut out, id, payload.len(), version, flags)?;
        out.extend_from_slice(&payload);
    }
    Ok(out)
}

fn text_value_of(field: &TagField) -> String {
    match &field.value {
        TagValue::Genre(Genre::Index(index)) => index.to_string(),
        other => other.to_text().unwrap_or_default(),
    }
}

fn build_text_payload(values: &[&TagField], version: u8) -> Result<Vec<u8>> {
    // The first value's declared encoding wins for the whole frame.
    let preferred = values[0]
        .value
        .encoding()
        .unwrap_or(TextEncoding::Utf8);
    // Fall back to Unicode when any value does not fit Latin-1.
    let preferred = if preferred == TextEncoding::Latin1
        && values
            .iter()
            .any(|f| text::string_to_latin1(&text_value_of(f)).is_none())
    {
        TextEncoding::Utf8
    } else {
        preferred
    };
    let (encoding_byte, enc) = encoding_byte_for(preferred, version);
    let mut payload = vec![encoding_byte];
    for (index, field) in values.iter().enumerate() {
        if index > 0 {
            payload.extend(std::iter::repeat(0u8).take(terminator_width(encoding_byte)));
        }
        payload.extend_from_slice(&encode_text_with_bom(&text_value_of(field), encoding_byte, enc));
    }
    Ok(payload)
}

fn build_single_payload(field: &TagField, version: u8) -> Result<Option<Vec<u8>>> {
    let id = match &field.id {
        FieldId::FourCc(id) => *id,
        _ => return Ok(None),
    };
    Ok(Some(match &id {
        b"TXXX" => {
            let enc = field.value.encoding().unwrap_or(TextEncoding::Utf8);
            let (encoding_byte, enc) = encoding_byte_for(enc, version);
            let mut payload = vec![encoding_byte];
            payload.extend_from_slice(&encode_text_with_bom(
                field.description.as_deref().unwrap_or(""),
                encoding_byte,
                enc,
            ));
            payload.extend(std::iter::repeat(0u8).take(terminator_width(encoding_byte)));
            payload.extend_from_slice(&encode_text_with_bom(
                &text_value_of(field),
                encoding_byte,
                enc,
            ));
            payload
        }
        b"COMM" | b"USLT" => {
            let enc = field.value.encoding().unwrap_or(TextEncoding::Utf8);
            let (encoding_byte, enc) = encoding_byte_for(enc, version);
            let mut payload = vec![encoding_byte];
            let language = field.language.as_deref().unwrap_or("und");
            let mut lang_bytes = language.as_bytes().to_vec();
            lang_bytes.resize(3, b' ');
            payload.extend_from_slice(&lang_bytes[..3]);
            payload.extend_from_slice(&encode_text_with_bom(
                field.description.as_deref().unwrap_or(""),
                encoding_byte,
                enc,
            ));
            payload.extend(std::iter::repeat(0u8).take(terminator_width(encoding_byte)));
            payload.extend_from_slice(&encode_text_with_bom(
                &text_value_of(field),
                encoding_byte,
                enc,
            ));
            payload
        }
        b"APIC" => {
            let TagValue::Picture(picture) = &field.value else {
                return Ok(None);
            };
            let mut payload = vec![encoding::LATIN1];
            payload.extend_from_slice(picture.mime_type.as_bytes());
            payload.push(0);
            payload.push(picture.picture_type);
            payload.extend_from_slice(
                &text::string_to_latin1(&picture.description)
                    .unwrap_or_else(|| picture.description.as_bytes().to_vec()),
            );
            payload.push(0);
            payload.extend_from_slice(&picture.data);
            payload
        }
        b"POPM" => {
            let rating = field.value.to_integer().unwrap_or(0).clamp(0, 255) as u8;
            let mut payload = field
                .description
                .as_deref()
                .unwrap_or("")
                .as_bytes()
                .to_vec();
            payload.push(0);
            payload.push(rating);
            payload
        }
        _ => match &field.value {
            TagValue::Binary { data, .. } => data.clone(),
            other => {
                let Some(value) = other.to_text() else {
                    return Ok(None);
                };
                let mut payload = vec![encoding::UTF8];
                payload.extend_from_slice(value.as_bytes());
                payload
            }
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(body: &[u8], version: u8) -> (Vec<TagField>, Diagnostics) {
        let mut diag = Diagnostics::new();
        let mut fields = Vec::new();
        let mut rest = body;
        while let Some(frame) = parse_frame(rest, version, &mut diag).unwrap() {
            fields.extend(frame.fields);
            rest = &rest[frame.consumed..];
        }
        (fields, diag)
    }

    #[test]
    fn test_text_frame_roundtrip_v4() {
        let field = TagField::new(FieldId::FourCc(*b"TIT2"), TagValue::text("Hi"));
        let mut diag = Diagnostics::new();
        let body = build_frames(&[field], 4, &mut diag).unwrap();
        let (fields, _) = parse_all(&body, 4);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].value.to_text().as_deref(), Some("Hi"));
    }

    #[test]
    fn test_multi_value_merge_and_split() {
        let fields = vec![
            TagField::new(FieldId::FourCc(*b"TPE1"), TagValue::text("A")),
            TagField::new(FieldId::FourCc(*b"TPE1"), TagValue::text("B")),
        ];
        let mut diag = Diagnostics::new();
        let body = build_frames(&fields, 4, &mut diag).unwrap();
        // One frame only.
        assert_eq!(&body[..4], b"TPE1");
        let (parsed, _) = parse_all(&body, 4);
        let values: Vec<String> = parsed
            .iter()
            .map(|f| f.value.to_text().unwrap())
            .collect();
        assert_eq!(values, vec!["A", "B"]);
    }

    #[test]
    fn test_utf16_with_bom_roundtrip() {
        let field = TagField::new(
            FieldId::FourCc(*b"TALB"),
            TagValue::text_with_encoding("Füür", TextEncoding::Utf16Le),
        );
        let mut diag = Diagnostics::new();
        let body = build_frames(&[field], 3, &mut diag).unwrap();
        // v2.3 has no UTF-8; encoding byte must be 1 (UTF-16 with BOM).
        assert_eq!(body[10], 1);
        assert_eq!(&body[11..13], &[0xFF, 0xFE]);
        let (parsed, _) = parse_all(&body, 3);
        assert_eq!(parsed[0].value.to_text().as_deref(), Some("Füür"));
    }

    #[test]
    fn test_comment_frame_language() {
        let field = TagField::new(FieldId::FourCc(*b"COMM"), TagValue::text("nice"))
            .with_language("deu")
            .with_description("note");
        let mut diag = Diagnostics::new();
        let body = build_frames(&[field], 4, &mut diag).unwrap();
        let (parsed, _) = parse_all(&body, 4);
        assert_eq!(parsed[0].language.as_deref(), Some("deu"));
        assert_eq!(parsed[0].description.as_deref(), Some("note"));
        assert_eq!(parsed[0].value.to_text().as_deref(), Some("nice"));
    }

    #[test]
    fn test_apic_roundtrip() {
        let field = TagField::new(
            FieldId::FourCc(*b"APIC"),
            TagValue::Picture(Picture {
                data: vec![0xFF, 0xD8, 0xFF],
                mime_type: "image/jpeg".into(),
                description: "front".into(),
                picture_type: 3,
            }),
        );
        let mut diag = Diagnostics::new();
        let body = build_frames(&[field], 4, &mut diag).unwrap();
        let (parsed, _) = parse_all(&body, 4);
        match &parsed[0].value {
            TagValue::Picture(picture) => {
                assert_eq!(picture.mime_type, "image/jpeg");
                assert_eq!(picture.picture_type, 3);
                assert_eq!(picture.description, "front");
                assert_eq!(picture.data, vec![0xFF, 0xD8, 0xFF]);
            }
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn test_v24_frame_unsynchronisation() {
        let field = TagField::new(
            FieldId::FourCc(*b"APIC"),
            TagValue::Picture(Picture {
                data: vec![0xFF, 0xE0, 0xFF],
                mime_type: "image/jpeg".into(),
                description: String::new(),
                picture_type: 3,
            }),
        );
        let mut diag = Diagnostics::new();
        let body = build_frames(&[field], 4, &mut diag).unwrap();
        // Frame format flag 0x02 set.
        assert_eq!(body[9] & 0x02, 0x02);
        let (parsed, _) = parse_all(&body, 4);
        match &parsed[0].value {
            TagValue::Picture(picture) => assert_eq!(picture.data, vec![0xFF, 0xE0, 0xFF]),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn test_v22_translation() {
        // TT2 frame: "Hi" in Latin-1.
        let mut body = b"TT2".to_vec();
        body.extend_from_slice(&[0, 0, 3]);
        body.push(0); // Latin-1
        body.extend_from_slice(b"Hi");
        let (parsed, _) = parse_all(&body, 2);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, FieldId::FourCc(*b"TIT2"));
        assert_eq!(parsed[0].value.to_text().as_deref(), Some("Hi"));
    }

    #[test]
    fn test_untranslatable_v22_frame_dropped_on_write() {
        let mut body = b"RVA".to_vec();
        body.extend_from_slice(&[0, 0, 2]);
        body.extend_from_slice(&[0x10, 0x20]);
        let (parsed, _) = parse_all(&body, 2);
        assert_eq!(parsed.len(), 1);

        let mut diag = Diagnostics::new();
        let out = build_frames(&parsed, 4, &mut diag).unwrap();
        assert!(out.is_empty());
        assert!(diag.has_problems());
        assert!(diag.entries()[0].message.contains("RVA"));
    }

    #[test]
    fn test_padding_stops_parse() {
        let (parsed, _) = parse_all(&[0u8; 64], 4);
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_year_frame_conversion() {
        assert_eq!(convert_id_for_version(*b"TDRC", 3), *b"TYER");
        assert_eq!(convert_id_for_version(*b"TYER", 4), *b"TDRC");
        assert_eq!(convert_id_for_version(*b"TIT2", 3), *b"TIT2");
    }
}
