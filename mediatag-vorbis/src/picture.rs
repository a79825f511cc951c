//! The FLAC PICTURE block body.
//!
//! The same layout is used by the FLAC `PICTURE` metadata block and, base64
//! encoded, by the `METADATA_BLOCK_PICTURE` Vorbis comment field.

use mediatag_core::{Error, Picture, Result};

/// Parse a PICTURE block body.
pub fn parse_picture_block(data: &[u8]) -> Result<Picture> {
    let mut pos = 0usize;
    let read_u32 = |pos: &mut usize| -> Result<u32> {
        let bytes: [u8; 4] = data
            .get(*pos..*pos + 4)
            .ok_or_else(|| Error::invalid_data("picture block truncated"))?
            .try_into()
            .unwrap();
        *pos += 4;
        Ok(u32::from_be_bytes(bytes))
    };
    let read_block = |pos: &mut usize, len: usize| -> Result<&[u8]> {
        let bytes = data
            .get(*pos..*pos + len)
            .ok_or_else(|| Error::invalid_data("picture block truncated"))?;
        *pos += len;
        Ok(bytes)
    };

    let picture_type = read_u32(&mut pos)?;
    let mime_len = read_u32(&mut pos)? as usize;
    let mime_type = String::from_utf8(read_block(&mut pos, mime_len)?.to_vec())
        .map_err(|e| Error::invalid_data(format!("picture MIME type not UTF-8: {e}")))?;
    let description_len = read_u32(&mut pos)? as usize;
    let description = String::from_utf8(read_block(&mut pos, description_len)?.to_vec())
        .map_err(|e| Error::invalid_data(format!("picture description not UTF-8: {e}")))?;
    // Width, height, depth, colour count are informational only.
    pos += 16;
    let data_len = read_u32(&mut pos)? as usize;
    let bytes = read_block(&mut pos, data_len)?.to_vec();

    Ok(Picture {
        data: bytes,
        mime_type,
        description,
        picture_type: picture_type.min(u8::MAX as u32) as u8,
    })
}

/// Serialise a PICTURE block body. Width/height/depth are written as zero;
/// readers treat them as unknown.
pub fn make_picture_block(picture: &Picture) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 + picture.mime_type.len() + picture.data.len());
    out.extend_from_slice(&(picture.picture_type as u32).to_be_bytes());
    out.extend_from_slice(&(picture.mime_type.len() as u32).to_be_bytes());
    out.extend_from_slice(picture.mime_type.as_bytes());
    out.extend_from_slice(&(picture.description.len() as u32).to_be_bytes());
    out.extend_from_slice(picture.description.as_bytes());
    out.extend_from_slice(&[0u8; 16]);
    out.extend_from_slice(&(picture.data.len() as u32).to_be_bytes());
    out.extend_from_slice(&picture.data);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let picture = Picture {
            data: vec![0xFF, 0xD8, 0xFF, 0xE0],
            mime_type: "image/jpeg".into(),
            description: "front".into(),
            picture_type: 3,
        };
        let block = make_picture_block(&picture);
        let parsed = parse_picture_block(&block).unwrap();
        assert_eq!(parsed, picture);
    }

    #[test]
    fn test_truncated_rejected() {
        let picture = Picture {
            data: vec![1, 2, 3],
            mime_type: "image/png".into(),
            description: String::new(),
            picture_type: 0,
        };
        let block = make_picture_block(&picture);
        assert!(parse_picture_block(&block[..block.len() - 2]).is_err());
    }
}
