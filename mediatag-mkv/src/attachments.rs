//! Matroska attachments.
//!
//! FileData payloads can be large (fonts, cover art); parsing records the
//! data span within the file instead of loading it, and the bytes are
//! fetched on demand or streamed during rewrite.

use crate::ebml::{self, ChildIter};
use crate::elements::*;
use crate::error::Result;
use mediatag_core::Diagnostics;

/// One AttachedFile entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachedFile {
    /// File UID.
    pub uid: u64,
    /// File name.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// Description, if present.
    pub description: Option<String>,
    /// Absolute offset of the FileData payload in the source file.
    pub data_offset: u64,
    /// Length of the FileData payload.
    pub data_len: u64,
    /// Replacement bytes staged for the next rewrite; `None` keeps the
    /// on-disk data.
    pub pending_data: Option<Vec<u8>>,
}

impl AttachedFile {
    /// Create an attachment to be added on the next rewrite.
    pub fn new(uid: u64, name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            uid,
            name: name.into(),
            mime_type: mime_type.into(),
            description: None,
            data_offset: 0,
            data_len: data.len() as u64,
            pending_data: Some(data),
        }
    }
}

/// Parse an Attachments element payload. `payload_offset` is the absolute
/// file offset of `data`, used to locate FileData spans.
pub fn parse_attachments_payload(
    data: &[u8],
    payload_offset: u64,
    diag: &mut Diagnostics,
) -> Result<Vec<AttachedFile>> {
    let mut attachments = Vec::new();
    let mut iter = ChildIter::new(data);
    loop {
        let Some(child) = iter.next() else { break };
        let (id, payload) = child?;
        if id != ATTACHED_FILE {
            continue;
        }
        // The iterator position sits one past the child, so the payload
        // starts that many bytes back.
        let attached_payload_offset = iter.position() - payload.len();
        let mut file = AttachedFile::default();
        let mut inner = ChildIter::new(payload);
        loop {
            let Some(grandchild) = inner.next() else { break };
            let (id, inner_payload) = grandchild?;
            match id {
                FILE_UID => file.uid = ebml::parse_uint(inner_payload),
                FILE_NAME => file.name = ebml::parse_string(inner_payload)?,
                FILE_MIME_TYPE => file.mime_type = ebml::parse_string(inner_payload)?,
                FILE_DESCRIPTION => {
                    file.description = Some(ebml::parse_string(inner_payload)?)
                }
                FILE_DATA => {
                    let data_rel = inner.position() - inner_payload.len();
                    file.data_offset =
                        payload_offset + attached_payload_offset as u64 + data_rel as u64;
                    file.data_len = inner_payload.len() as u64;
                }
                _ => {}
            }
        }
        if file.name.is_empty() && file.data_len == 0 {
            diag.warn(
                "parsing Matroska attachments",
                "AttachedFile without name and data skipped",
            );
            continue;
        }
        attachments.push(file);
    }
    Ok(attachments)
}

/// Serialise attachments into a complete Attachments element. The callback
/// supplies the on-disk bytes for entries without pending data. Returns
/// `None` when there is no attachment left.
pub fn make_attachments_element<F>(
    attachments: &[AttachedFile],
    mut read_existing: F,
) -> Result<Option<Vec<u8>>>
where
    F: FnMut(&AttachedFile) -> Result<Vec<u8>>,
{
    if attachments.is_empty() {
        return Ok(None);
    }
    let mut payload = Vec::new();
    for file in attachments {
        let data = match &file.pending_data {
            Some(bytes) => bytes.clone(),
            None => read_existing(file)?,
        };
        let mut entry = Vec::new();
        ebml::put_string(&mut entry, FILE_NAME, &file.name);
        if let Some(description) = &file.description {
            ebml::put_string(&mut entry, FILE_DESCRIPTION, description);
        }
        ebml::put_string(&mut entry, FILE_MIME_TYPE, &file.mime_type);
        ebml::put_uint(&mut entry, FILE_UID, file.uid);
        ebml::put_element(&mut entry, FILE_DATA, &data);
        ebml::put_element(&mut payload, ATTACHED_FILE, &entry);
    }
    let mut out = Vec::new();
    ebml::put_element(&mut out, ATTACHMENTS, &payload);
    Ok(Some(out))
}
