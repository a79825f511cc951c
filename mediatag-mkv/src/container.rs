//! Matroska container: parsing and rewriting.
//!
//! Parsing walks the segment's top-level elements through the generic element
//! tree, cross-checking SeekHead entries, and materialises tags, tracks,
//! chapters and attachments. Rewriting either patches the Tags element in
//! place (when the edit fits the old span plus adjacent Void padding) or
//! streams the whole segment to a new target with sizes recomputed bottom-up
//! and SeekHead/Cues recomputed last.

use crate::attachments::{self, AttachedFile};
use crate::chapters::{self, EditionEntry};
use crate::ebml::{self, ChildIter, ElementHeader};
use crate::elements::*;
use crate::error::{MkvError, Result};
use crate::tag::{self, MatroskaTag};
use crate::track;
use mediatag_core::element::{ElementFormat, ElementTree, RawElementHeader};
use mediatag_core::io::{BinaryReader, BinaryWriter};
use mediatag_core::{Diagnostics, ProgressFeedback, TagTarget, TrackInfo};
use std::io::{Read, Seek, Write};

/// Highest DocTypeReadVersion we understand.
const SUPPORTED_DOC_TYPE_READ_VERSION: u64 = 4;

/// Copy buffer for streaming rewrites.
const COPY_BUF_LEN: usize = 64 * 1024;

/// EBML element format plugged into the generic element tree.
pub struct MatroskaElementFormat;

impl ElementFormat for MatroskaElementFormat {
    type Id = u32;
    const CONTAINER_NAME: &'static str = "Matroska";

    fn read_header<R: Read + Seek>(
        reader: &mut BinaryReader<R>,
        remaining: u64,
    ) -> mediatag_core::Result<Option<RawElementHeader<u32>>> {
        if remaining < 2 {
            return Ok(None);
        }
        let header = ElementHeader::read(reader.get_mut())
            .map_err(mediatag_core::Error::from)?;
        Ok(Some(RawElementHeader {
            id: header.id,
            header_len: header.header_len as u32,
            data_len: header.size,
        }))
    }

    fn is_parent(header: &RawElementHeader<u32>) -> bool {
        matches!(
            header.id,
            EBML | SEGMENT
                | SEEK_HEAD
                | INFO
                | TRACKS
                | TRACK_ENTRY
                | TAGS
                | TAG
                | ATTACHMENTS
                | CHAPTERS
                | CUES
                | CLUSTER
        )
    }

    fn display_id(id: u32) -> String {
        format!("0x{id:X}")
    }
}

/// Decoded EBML document header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EbmlDocInfo {
    /// EBMLVersion.
    pub version: u64,
    /// EBMLReadVersion.
    pub read_version: u64,
    /// Document type, `matroska` or `webm`.
    pub doc_type: String,
    /// DocTypeVersion.
    pub doc_type_version: u64,
    /// DocTypeReadVersion.
    pub doc_type_read_version: u64,
}

impl Default for EbmlDocInfo {
    fn default() -> Self {
        Self {
            version: 1,
            read_version: 1,
            doc_type: "matroska".to_string(),
            doc_type_version: 4,
            doc_type_read_version: 2,
        }
    }
}

/// One top-level element inside the segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopLevelElement {
    /// Element id.
    pub id: u32,
    /// Absolute offset of the element header.
    pub offset: u64,
    /// Header length.
    pub header_len: u32,
    /// Payload length.
    pub data_len: u64,
}

impl TopLevelElement {
    fn total_len(&self) -> u64 {
        self.header_len as u64 + self.data_len
    }

    fn end_offset(&self) -> u64 {
        self.offset + self.total_len()
    }
}

/// A parsed Matroska/WebM file.
#[derive(Debug, Default)]
pub struct MatroskaContainer {
    /// EBML document header.
    pub doc_info: EbmlDocInfo,
    /// Tags, each with its target.
    pub tags: Vec<MatroskaTag>,
    /// Tracks.
    pub tracks: Vec<TrackInfo>,
    /// Chapter editions.
    pub editions: Vec<EditionEntry>,
    /// Attachments.
    pub attachments: Vec<AttachedFile>,
    /// Segment title from the Info element.
    pub title: Option<String>,
    /// Timestamp scale in nanoseconds per unit.
    pub timestamp_scale: u64,
    /// Segment duration in timestamp units.
    pub duration: f64,

    ebml_header_len: u64,
    segment_data_offset: u64,
    top_level: Vec<TopLevelElement>,
    attachments_dirty: bool,
    title_dirty: bool,
}

impl MatroskaContainer {
    /// Parse a Matroska or WebM stream.
    pub fn parse<R: Read + Seek>(
        reader: &mut BinaryReader<R>,
        diag: &mut Diagnostics,
    ) -> Result<Self> {
        let file_len = reader.stream_len()?;
        let mut tree: ElementTree<MatroskaElementFormat> = ElementTree::new();

        let ebml_index = tree
            .read_at(reader, 0, file_len, diag)
            .map_err(MkvError::from)?
            .ok_or(MkvError::InvalidEbmlHeader("file is empty".into()))?;
        if tree.node(ebml_index).id != EBML {
            return Err(MkvError::InvalidEbmlHeader(
                "file does not start with an EBML element".into(),
            ));
        }

        let mut container = MatroskaContainer {
            timestamp_scale: 1_000_000,
            ..MatroskaContainer::default()
        };

        let ebml_payload = tree.read_data(reader, ebml_index).map_err(MkvError::from)?;
        container.doc_info = parse_ebml_header(&ebml_payload)?;
        match container.doc_info.doc_type.as_str() {
            "matroska" | "webm" => {}
            other => return Err(MkvError::UnsupportedDocType(other.to_string())),
        }
        if container.doc_info.doc_type_read_version > SUPPORTED_DOC_TYPE_READ_VERSION {
            return Err(MkvError::UnsupportedDocTypeVersion {
                doc_type: container.doc_info.doc_type.clone(),
                version: container.doc_info.doc_type_read_version,
            });
        }
        container.ebml_header_len = tree.node(ebml_index).total_len();

        let segment_index = tree
            .next_sibling(reader, ebml_index, diag)
            .map_err(MkvError::from)?
            .ok_or(MkvError::MissingElement("Segment"))?;
        if tree.node(segment_index).id != SEGMENT {
            return Err(MkvError::MissingElement("Segment"));
        }
        container.segment_data_offset = tree.node(segment_index).data_offset();

        // Walk the segment's children; the linear walk is the authoritative
        // inventory, SeekHead entries are cross-checked against it below.
        let mut seek_entries: Vec<(u32, u64)> = Vec::new();
        let mut child = tree
            .first_child(reader, segment_index, diag)
            .map_err(MkvError::from)?;
        while let Some(index) = child {
            let node = tree.node(index);
            let element = TopLevelElement {
                id: node.id,
                offset: node.start_offset,
                header_len: node.header_len,
                data_len: node.data_len,
            };
            container.top_level.push(element);

            match element.id {
                SEEK_HEAD => {
                    let payload = tree.read_data(reader, index).map_err(MkvError::from)?;
                    seek_entries.extend(parse_seek_head(&payload, diag)?);
                }
                INFO => {
                    let payload = tree.read_data(reader, index).map_err(MkvError::from)?;
                    container.parse_info(&payload)?;
                }
                TAGS => {
                    let payload = tree.read_data(reader, index).map_err(MkvError::from)?;
                    container.tags = tag::parse_tags_payload(&payload, diag)?;
                }
                CHAPTERS => {
                    let payload = tree.read_data(reader, index).map_err(MkvError::from)?;
                    container.editions = chapters::parse_chapters_payload(&payload, diag)?;
                }
                ATTACHMENTS => {
                    let payload = tree.read_data(reader, index).map_err(MkvError::from)?;
                    container.attachments = attachments::parse_attachments_payload(
                        &payload,
                        node.data_offset(),
                        diag,
                    )?;
                }
                _ => {}
            }
            child = tree
                .next_sibling(reader, index, diag)
                .map_err(MkvError::from)?;
        }

        // Tracks parse after Info so the timestamp scale is known.
        for element in container.top_level.clone() {
            if element.id == TRACKS {
                reader.seek_to(element.offset + element.header_len as u64)?;
                let payload = reader.read_bytes(element.data_len as usize)?;
                for child in ChildIter::new(&payload) {
                    let (id, entry) = child?;
                    if id == TRACK_ENTRY {
                        container.tracks.push(track::parse_track_entry(
                            entry,
                            element.offset,
                            container.timestamp_scale,
                            container.duration,
                            diag,
                        )?);
                    }
                }
            }
        }

        for (id, position) in seek_entries {
            let absolute = container.segment_data_offset + position;
            let found = container
                .top_level
                .iter()
                .any(|e| e.id == id && e.offset == absolute);
            if !found {
                diag.warn(
                    "parsing Matroska segment",
                    format!(
                        "SeekHead entry for {} (0x{id:X}) points to offset {absolute} where no such element was found",
                        top_level_name(id)
                    ),
                );
            }
        }

        tracing::debug!(
            tags = container.tags.len(),
            tracks = container.tracks.len(),
            attachments = container.attachments.len(),
            "parsed Matroska segment"
        );
        Ok(container)
    }

    fn parse_info(&mut self, data: &[u8]) -> Result<()> {
        for child in ChildIter::new(data) {
            let (id, payload) = child?;
            match id {
                TIMESTAMP_SCALE => self.timestamp_scale = ebml::parse_uint(payload),
                DURATION => self.duration = ebml::parse_float(payload),
                TITLE => self.title = Some(ebml::parse_string(payload)?),
                _ => {}
            }
        }
        Ok(())
    }

    /// The tag matching `target`, creating it when absent.
    pub fn tag_for_target(&mut self, target: &TagTarget) -> &mut MatroskaTag {
        use mediatag_core::Tag as _;
        if let Some(pos) = self.tags.iter().position(|t| t.target() == target) {
            return &mut self.tags[pos];
        }
        self.tags.push(MatroskaTag::new(target.clone()));
        self.tags.last_mut().expect("just pushed")
    }

    /// Stage an attachment change; forces a full rewrite on the next apply.
    pub fn set_attachments_changed(&mut self) {
        self.attachments_dirty = true;
    }

    /// Stage a new segment title (`None` removes it); forces a full rewrite.
    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
        self.title_dirty = true;
    }

    /// Whether the staged edits can be applied without rewriting the file.
    pub fn can_apply_in_place(&self) -> bool {
        if self.attachments_dirty || self.title_dirty {
            return false;
        }
        let Some(span) = self.tags_span() else {
            return false;
        };
        let new_len = tag::make_tags_element(&self.tags).map_or(0, |b| b.len() as u64);
        fits_with_void(new_len, span.1)
    }

    /// Apply staged tag edits into the existing Tags span of `stream`.
    ///
    /// Returns `false` without touching the stream when the edit does not fit
    /// in place; the caller then falls back to [`MatroskaContainer::rewrite`].
    pub fn try_apply_in_place<S: Read + Write + Seek>(
        &self,
        stream: &mut S,
        progress: &ProgressFeedback,
        diag: &mut Diagnostics,
    ) -> Result<bool> {
        if self.attachments_dirty || self.title_dirty {
            return Ok(false);
        }
        let Some((offset, span)) = self.tags_span() else {
            return Ok(false);
        };
        let new_tags = tag::make_tags_element(&self.tags);
        let new_len = new_tags.as_ref().map_or(0, |b| b.len() as u64);
        if !fits_with_void(new_len, span) {
            return Ok(false);
        }

        progress.check()?;
        progress.report("updating Tags in place", 0.0);

        let mut out = new_tags.unwrap_or_default();
        if span > new_len {
            ebml::put_void(&mut out, span - new_len)?;
        }
        debug_assert_eq!(out.len() as u64, span);
        stream.seek(std::io::SeekFrom::Start(offset))?;
        stream.write_all(&out)?;
        stream.flush()?;

        progress.report("updating Tags in place", 100.0);
        diag.info(
            "writing Matroska tags",
            format!("Tags rewritten in place at offset {offset}"),
        );
        Ok(true)
    }

    /// Offset and total length of the Tags element plus any directly
    /// following Void padding.
    fn tags_span(&self) -> Option<(u64, u64)> {
        let pos = self.top_level.iter().position(|e| e.id == TAGS)?;
        let tags = self.top_level[pos];
        let mut span = tags.total_len();
        let mut end = tags.end_offset();
        for element in &self.top_level[pos + 1..] {
            if element.id == VOID && element.offset == end {
                span += element.total_len();
                end = element.end_offset();
            } else {
                break;
            }
        }
        Some((tags.offset, span))
    }

    /// Stream a full rewrite of the container into `writer`.
    ///
    /// Elements keep their original order; SeekHead is rebuilt first in the
    /// segment, the Tags/Attachments elements are replaced by the staged
    /// state (inserted before the first cluster when previously absent), and
    /// Cues cluster positions are shifted by the layout delta.
    pub fn rewrite<R: Read + Seek, W: Write + Seek>(
        &self,
        reader: &mut BinaryReader<R>,
        writer: &mut BinaryWriter<W>,
        progress: &ProgressFeedback,
        diag: &mut Diagnostics,
    ) -> Result<()> {
        let new_tags = tag::make_tags_element(&self.tags);
        let new_attachments = attachments::make_attachments_element(&self.attachments, |file| {
            reader.seek_to(file.data_offset)?;
            Ok(reader.read_bytes(file.data_len as usize)?)
        })?;

        // Assemble the output piece list in original element order.
        let mut pieces: Vec<Piece> = Vec::new();
        let mut tags_placed = false;
        let mut attachments_placed = false;
        let mut cluster_seen = false;
        for element in &self.top_level {
            match element.id {
                SEEK_HEAD | VOID => continue,
                TAGS => {
                    if let Some(bytes) = new_tags.clone().filter(|_| !tags_placed) {
                        pieces.push(Piece::Bytes {
                            id: TAGS,
                            bytes,
                        });
                    }
                    tags_placed = true;
                }
                ATTACHMENTS => {
                    if let Some(bytes) = new_attachments.clone().filter(|_| !attachments_placed) {
                        pieces.push(Piece::Bytes {
                            id: ATTACHMENTS,
                            bytes,
                        });
                    }
                    attachments_placed = true;
                }
                INFO if self.title_dirty => {
                    reader.seek_to(element.offset + element.header_len as u64)?;
                    let payload = reader.read_bytes(element.data_len as usize)?;
                    pieces.push(Piece::Bytes {
                        id: INFO,
                        bytes: rebuild_info(&payload, self.title.as_deref())?,
                    });
                }
                CUES => {
                    reader.seek_to(element.offset + element.header_len as u64)?;
                    let payload = reader.read_bytes(element.data_len as usize)?;
                    pieces.push(Piece::Cues { payload });
                }
                CLUSTER => {
                    if !cluster_seen {
                        cluster_seen = true;
                        insert_missing(
                            &mut pieces,
                            &mut tags_placed,
                            &mut attachments_placed,
                            &new_tags,
                            &new_attachments,
                        );
                    }
                    pieces.push(Piece::Copy { element: *element });
                }
                _ => pieces.push(Piece::Copy { element: *element }),
            }
        }
        insert_missing(
            &mut pieces,
            &mut tags_placed,
            &mut attachments_placed,
            &new_tags,
            &new_attachments,
        );

        // Layout pass: SeekHead and rebuilt Cues use fixed-width values so
        // their sizes are known before the offsets they encode.
        let seek_ids = seek_head_ids(&pieces);
        let seek_head_len = seek_head_size(&seek_ids);
        let mut positions: Vec<(u32, u64)> = Vec::new();
        let mut relative = seek_head_len;
        let mut cluster_delta: Option<i64> = None;
        for piece in &pieces {
            let id = piece.id();
            if positions.iter().all(|(seen, _)| *seen != id) && seek_ids.contains(&id) {
                positions.push((id, relative));
            }
            if let Piece::Copy { element } = piece {
                if element.id == CLUSTER && cluster_delta.is_none() {
                    let old_relative = element.offset - self.segment_data_offset;
                    cluster_delta = Some(relative as i64 - old_relative as i64);
                }
            }
            relative += piece.len();
        }
        let segment_payload_len = relative;

        // Emission pass.
        progress.check()?;
        progress.report("writing EBML header", 0.0);
        reader.seek_to(0)?;
        copy_bytes(reader, writer, self.ebml_header_len)?;

        let mut segment_header = Vec::new();
        ebml::write_id(&mut segment_header, SEGMENT)?;
        let (size, len) = ebml::encode_vint_with_length(segment_payload_len, 8)?;
        segment_header.extend_from_slice(&size[..len]);
        writer.write_bytes(&segment_header)?;

        writer.write_bytes(&make_seek_head(&seek_ids, &positions))?;

        let total_pieces = pieces.len().max(1);
        for (index, piece) in pieces.iter().enumerate() {
            progress.check()?;
            progress.report(
                "writing segment",
                index as f64 / total_pieces as f64 * 100.0,
            );
            match piece {
                Piece::Copy { element } => {
                    reader.seek_to(element.offset)?;
                    copy_bytes(reader, writer, element.total_len())?;
                }
                Piece::Bytes { bytes, .. } => writer.write_bytes(bytes)?,
                Piece::Cues { payload } => {
                    let delta = cluster_delta.unwrap_or(0);
                    let rebuilt = rebuild_cues(payload, delta)?;
                    writer.write_bytes(&rebuilt)?;
                }
            }
        }
        writer.flush()?;
        progress.report("writing segment", 100.0);
        diag.info(
            "writing Matroska segment",
            format!("segment rewritten, {segment_payload_len} payload bytes"),
        );
        Ok(())
    }
}

enum Piece {
    Copy { element: TopLevelElement },
    Bytes { id: u32, bytes: Vec<u8> },
    Cues { payload: Vec<u8> },
}

impl Piece {
    fn id(&self) -> u32 {
        match self {
            Piece::Copy { element } => element.id,
            Piece::Bytes { id, .. } => *id,
            Piece::Cues { .. } => CUES,
        }
    }

    fn len(&self) -> u64 {
        match self {
            Piece::Copy { element } => element.total_len(),
            Piece::Bytes { bytes, .. } => bytes.len() as u64,
            Piece::Cues { payload } => cues_rebuilt_size(payload),
        }
    }
}

fn insert_missing(
    pieces: &mut Vec<Piece>,
    tags_placed: &mut bool,
    attachments_placed: &mut bool,
    new_tags: &Option<Vec<u8>>,
    new_attachments: &Option<Vec<u8>>,
) {
    if !*tags_placed {
        if let Some(bytes) = new_tags.clone() {
            pieces.push(Piece::Bytes { id: TAGS, bytes });
        }
        *tags_placed = true;
    }
    if !*attachments_placed {
        if let Some(bytes) = new_attachments.clone() {
            pieces.push(Piece::Bytes {
                id: ATTACHMENTS,
                bytes,
            });
        }
        *attachments_placed = true;
    }
}

/// A removed-or-absent Tags span can absorb `new_len` bytes when the leftover
/// is zero or large enough for a Void element.
fn fits_with_void(new_len: u64, span: u64) -> bool {
    new_len <= span && (span - new_len == 0 || span - new_len >= 2)
}

/// Parse a SeekHead payload into `(element id, relative position)` entries.
pub fn parse_seek_head(data: &[u8], diag: &mut Diagnostics) -> Result<Vec<(u32, u64)>> {
    let mut entries = Vec::new();
    for child in ChildIter::new(data) {
        let (id, payload) = child?;
        if id != SEEK {
            continue;
        }
        let mut seek_id = None;
        let mut position = None;
        for grandchild in ChildIter::new(payload) {
            let (id, payload) = grandchild?;
            match id {
                SEEK_ID => {
                    let mut cursor = std::io::Cursor::new(payload);
                    seek_id = Some(ebml::read_id(&mut cursor)?.0);
                }
                SEEK_POSITION => position = Some(ebml::parse_uint(payload)),
                _ => {}
            }
        }
        match (seek_id, position) {
            (Some(id), Some(position)) => entries.push((id, position)),
            _ => diag.warn(
                "parsing Matroska SeekHead",
                "Seek entry without SeekID or SeekPosition ignored",
            ),
        }
    }
    Ok(entries)
}

/// Distinct ids to index in the rebuilt SeekHead, in output order.
fn seek_head_ids(pieces: &[Piece]) -> Vec<u32> {
    let mut ids = Vec::new();
    for piece in pieces {
        let id = piece.id();
        let indexable = matches!(id, INFO | TRACKS | CHAPTERS | ATTACHMENTS | TAGS | CUES | CLUSTER);
        if indexable && !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Size of one Seek entry with a fixed 8-byte SeekPosition payload.
fn seek_entry_size(id: u32) -> u64 {
    let id_payload = ebml::id_length(id) as u64;
    let seek_id = 2 + 1 + id_payload; // SeekID header + size + payload
    let seek_position = 2 + 1 + 8;
    let entry_payload = seek_id + seek_position;
    2 + 1 + entry_payload // Seek header + size + payload
}

/// Total size of the rebuilt SeekHead element.
fn seek_head_size(ids: &[u32]) -> u64 {
    let payload: u64 = ids.iter().map(|&id| seek_entry_size(id)).sum();
    4 + ebml::vint_length(payload) as u64 + payload
}

/// Build the SeekHead element with 8-byte positions.
fn make_seek_head(ids: &[u32], positions: &[(u32, u64)]) -> Vec<u8> {
    let mut payload = Vec::new();
    for &id in ids {
        let position = positions
            .iter()
            .find(|(seen, _)| *seen == id)
            .map(|(_, p)| *p)
            .unwrap_or(0);
        let mut entry = Vec::new();
        let mut id_bytes = Vec::new();
        let _ = ebml::write_id(&mut id_bytes, id);
        ebml::put_element(&mut entry, SEEK_ID, &id_bytes);
        ebml::put_element(&mut entry, SEEK_POSITION, &position.to_be_bytes());
        ebml::put_element(&mut payload, SEEK, &entry);
    }
    let mut out = Vec::new();
    ebml::put_element(&mut out, SEEK_HEAD, &payload);
    out
}

/// Size the rebuilt Cues element will have: CueClusterPosition values are
/// re-encoded with fixed 8-byte payloads, everything else is copied.
fn cues_rebuilt_size(payload: &[u8]) -> u64 {
    match rebuild_cues(payload, 0) {
        Ok(bytes) => bytes.len() as u64,
        Err(_) => 4 + ebml::vint_length(payload.len() as u64) as u64 + payload.len() as u64,
    }
}

/// Rebuild a Cues payload shifting every CueClusterPosition by `delta`.
fn rebuild_cues(payload: &[u8], delta: i64) -> Result<Vec<u8>> {
    let mut cues_payload = Vec::new();
    for point in ChildIter::new(payload) {
        let (id, point_payload) = point?;
        if id != CUE_POINT {
            // Preserve unknown children verbatim.
            ebml::put_element(&mut cues_payload, id, point_payload);
            continue;
        }
        let mut new_point = Vec::new();
        for child in ChildIter::new(point_payload) {
            let (id, child_payload) = child?;
            if id != CUE_TRACK_POSITIONS {
                ebml::put_element(&mut new_point, id, child_payload);
                continue;
            }
            let mut new_positions = Vec::new();
            for grandchild in ChildIter::new(child_payload) {
                let (id, grandchild_payload) = grandchild?;
                if id == CUE_CLUSTER_POSITION {
                    let old = ebml::parse_uint(grandchild_payload) as i64;
                    let shifted = old.checked_add(delta).filter(|v| *v >= 0).ok_or_else(|| {
                        MkvError::InvalidElementSize {
                            offset: 0,
                            message: "cue position underflow while shifting clusters".into(),
                        }
                    })?;
                    ebml::put_element(
                        &mut new_positions,
                        CUE_CLUSTER_POSITION,
                        &(shifted as u64).to_be_bytes(),
                    );
                } else {
                    ebml::put_element(&mut new_positions, id, grandchild_payload);
                }
            }
            ebml::put_element(&mut new_point, CUE_TRACK_POSITIONS, &new_positions);
        }
        ebml::put_element(&mut cues_payload, CUE_POINT, &new_point);
    }
    let mut out = Vec::new();
    ebml::put_element(&mut out, CUES, &cues_payload);
    Ok(out)
}

/// Rebuild an Info payload with the Title element replaced (or removed).
fn rebuild_info(payload: &[u8], title: Option<&str>) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(payload.len());
    let mut title_placed = false;
    for child in ChildIter::new(payload) {
        let (id, child_payload) = child?;
        if id == TITLE {
            if let Some(title) = title.filter(|_| !title_placed) {
                ebml::put_string(&mut out, TITLE, title);
            }
            title_placed = true;
        } else {
            ebml::put_element(&mut out, id, child_payload);
        }
    }
    if !title_placed {
        if let Some(title) = title {
            ebml::put_string(&mut out, TITLE, title);
        }
    }
    let mut element = Vec::new();
    ebml::put_element(&mut element, INFO, &out);
    Ok(element)
}

fn parse_ebml_header(data: &[u8]) -> Result<EbmlDocInfo> {
    let mut info = EbmlDocInfo::default();
    for child in ChildIter::new(data) {
        let (id, payload) = child?;
        match id {
            EBML_VERSION => info.version = ebml::parse_uint(payload),
            EBML_READ_VERSION => info.read_version = ebml::parse_uint(payload),
            DOC_TYPE => info.doc_type = ebml::parse_string(payload)?,
            DOC_TYPE_VERSION => info.doc_type_version = ebml::parse_uint(payload),
            DOC_TYPE_READ_VERSION => info.doc_type_read_version = ebml::parse_uint(payload),
            EBML_MAX_ID_LENGTH | EBML_MAX_SIZE_LENGTH => {}
            _ => {}
        }
    }
    Ok(info)
}

fn copy_bytes<R: Read + Seek, W: Write + Seek>(
    reader: &mut BinaryReader<R>,
    writer: &mut BinaryWriter<W>,
    mut remaining: u64,
) -> Result<()> {
    let mut buf = [0u8; COPY_BUF_LEN];
    while remaining > 0 {
        let chunk = remaining.min(COPY_BUF_LEN as u64) as usize;
        reader.read_exact(&mut buf[..chunk])?;
        writer.write_bytes(&buf[..chunk])?;
        remaining -= chunk as u64;
    }
    Ok(())
}

/// Build a minimal EBML header element for the given document type.
pub fn make_ebml_header(doc_info: &EbmlDocInfo) -> Vec<u8> {
    let mut payload = Vec::new();
    ebml::put_uint(&mut payload, EBML_VERSION, doc_info.version);
    ebml::put_uint(&mut payload, EBML_READ_VERSION, doc_info.read_version);
    ebml::put_uint(&mut payload, EBML_MAX_ID_LENGTH, 4);
    ebml::put_uint(&mut payload, EBML_MAX_SIZE_LENGTH, 8);
    ebml::put_string(&mut payload, DOC_TYPE, &doc_info.doc_type);
    ebml::put_uint(&mut payload, DOC_TYPE_VERSION, doc_info.doc_type_version);
    ebml::put_uint(
        &mut payload,
        DOC_TYPE_READ_VERSION,
        doc_info.doc_type_read_version,
    );
    let mut out = Vec::new();
    ebml::put_element(&mut out, EBML, &payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediatag_core::{KnownField, Tag as _, TagValue};
    use std::io::Cursor;

    /// Build a small but complete WebM file: EBML header, Segment with
    /// SeekHead, Info, Tracks (one video track), a Cluster and Cues.
    fn build_webm(with_tags: Option<&[u8]>, void_after_tags: u64) -> Vec<u8> {
        let doc_info = EbmlDocInfo {
            doc_type: "webm".into(),
            ..EbmlDocInfo::default()
        };
        let mut file = make_ebml_header(&doc_info);

        let mut info = Vec::new();
        ebml::put_uint(&mut info, TIMESTAMP_SCALE, 1_000_000);
        ebml::put_float(&mut info, DURATION, 1000.0);
        ebml::put_string(&mut info, MUXING_APP, "mediatag");
        ebml::put_string(&mut info, WRITING_APP, "mediatag");
        let mut info_el = Vec::new();
        ebml::put_element(&mut info_el, INFO, &info);

        let mut entry = Vec::new();
        ebml::put_uint(&mut entry, TRACK_NUMBER, 1);
        ebml::put_uint(&mut entry, TRACK_UID, 0x1234);
        ebml::put_uint(&mut entry, TRACK_TYPE, 1);
        ebml::put_string(&mut entry, CODEC_ID, "V_VP9");
        let mut video = Vec::new();
        ebml::put_uint(&mut video, PIXEL_WIDTH, 320);
        ebml::put_uint(&mut video, PIXEL_HEIGHT, 240);
        ebml::put_element(&mut entry, VIDEO, &video);
        let mut tracks_payload = Vec::new();
        ebml::put_element(&mut tracks_payload, TRACK_ENTRY, &entry);
        let mut tracks_el = Vec::new();
        ebml::put_element(&mut tracks_el, TRACKS, &tracks_payload);

        let mut cluster_payload = Vec::new();
        ebml::put_uint(&mut cluster_payload, 0xE7, 0); // cluster timestamp
        cluster_payload.extend_from_slice(&[0u8; 32]);
        let mut cluster_el = Vec::new();
        ebml::put_element(&mut cluster_el, CLUSTER, &cluster_payload);

        let mut segment_payload = Vec::new();
        segment_payload.extend_from_slice(&info_el);
        segment_payload.extend_from_slice(&tracks_el);
        if let Some(tags) = with_tags {
            segment_payload.extend_from_slice(tags);
            if void_after_tags > 0 {
                ebml::put_void(&mut segment_payload, void_after_tags).unwrap();
            }
        }
        // Cues referencing the cluster, position relative to segment data.
        let cluster_relative = segment_payload.len() as u64;
        segment_payload.extend_from_slice(&cluster_el);
        let mut cue_positions = Vec::new();
        ebml::put_uint(&mut cue_positions, CUE_TRACK, 1);
        ebml::put_uint(&mut cue_positions, CUE_CLUSTER_POSITION, cluster_relative);
        let mut cue_point = Vec::new();
        ebml::put_uint(&mut cue_point, CUE_TIME, 0);
        ebml::put_element(&mut cue_point, CUE_TRACK_POSITIONS, &cue_positions);
        let mut cues_payload = Vec::new();
        ebml::put_element(&mut cues_payload, CUE_POINT, &cue_point);
        ebml::put_element(&mut segment_payload, CUES, &cues_payload);

        let _ = ebml::write_id(&mut file, SEGMENT);
        let _ = ebml::write_vint(&mut file, segment_payload.len() as u64);
        file.extend_from_slice(&segment_payload);
        file
    }

    fn parse_file(data: Vec<u8>) -> (MatroskaContainer, Diagnostics) {
        let mut reader = BinaryReader::new(Cursor::new(data));
        let mut diag = Diagnostics::new();
        let container = MatroskaContainer::parse(&mut reader, &mut diag).unwrap();
        (container, diag)
    }

    #[test]
    fn test_parse_minimal_webm() {
        let (container, _diag) = parse_file(build_webm(None, 0));
        assert_eq!(container.doc_info.doc_type, "webm");
        assert_eq!(container.tracks.len(), 1);
        assert_eq!(container.tracks[0].id, 0x1234);
        assert_eq!(container.timestamp_scale, 1_000_000);
        assert!(container.tags.is_empty());
    }

    #[test]
    fn test_rejects_foreign_doc_type() {
        let doc_info = EbmlDocInfo {
            doc_type: "notmkv".into(),
            ..EbmlDocInfo::default()
        };
        let mut file = make_ebml_header(&doc_info);
        let _ = ebml::write_id(&mut file, SEGMENT);
        let _ = ebml::write_vint(&mut file, 0);
        let mut reader = BinaryReader::new(Cursor::new(file));
        let mut diag = Diagnostics::new();
        let err = MatroskaContainer::parse(&mut reader, &mut diag).unwrap_err();
        assert!(matches!(err, MkvError::UnsupportedDocType(_)));
    }

    #[test]
    fn test_rejects_future_read_version() {
        let doc_info = EbmlDocInfo {
            doc_type: "matroska".into(),
            doc_type_read_version: 9,
            ..EbmlDocInfo::default()
        };
        let mut file = make_ebml_header(&doc_info);
        let _ = ebml::write_id(&mut file, SEGMENT);
        let _ = ebml::write_vint(&mut file, 0);
        let mut reader = BinaryReader::new(Cursor::new(file));
        let mut diag = Diagnostics::new();
        let err = MatroskaContainer::parse(&mut reader, &mut diag).unwrap_err();
        assert!(matches!(
            err,
            MkvError::UnsupportedDocTypeVersion { version: 9, .. }
        ));
    }

    #[test]
    fn test_full_rewrite_adds_track_tag_and_fixes_references() {
        let (mut container, _) = parse_file(build_webm(None, 0));
        let video_uid = container.tracks[0].id;
        let tag = container.tag_for_target(&TagTarget::track(video_uid));
        assert!(tag.set_value(KnownField::Title, TagValue::text("clip")));

        let source = build_webm(None, 0);
        let mut reader = BinaryReader::new(Cursor::new(source));
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        let mut diag = Diagnostics::new();
        container
            .rewrite(
                &mut reader,
                &mut writer,
                &ProgressFeedback::new(),
                &mut diag,
            )
            .unwrap();
        let output = writer.into_inner().into_inner();

        // Reparse the output and verify the tag and the SeekHead index.
        let (reparsed, diag) = parse_file(output);
        assert_eq!(reparsed.tags.len(), 1);
        assert_eq!(reparsed.tags[0].target(), &TagTarget::track(video_uid));
        assert_eq!(
            reparsed.tags[0]
                .value(KnownField::Title)
                .and_then(TagValue::to_text),
            Some("clip".into())
        );
        // No stale SeekHead entry warnings: every entry resolved.
        assert!(
            !diag.entries().iter().any(|e| e.message.contains("SeekHead")),
            "{:?}",
            diag.entries()
        );
        // The cluster and the cues both survived the rewrite.
        assert!(reparsed.top_level.iter().any(|e| e.id == CLUSTER));
        assert!(reparsed.top_level.iter().any(|e| e.id == CUES));
    }

    #[test]
    fn test_in_place_update_fits_in_void() {
        // Build a file that already carries a Tags element plus Void padding.
        let mut tag = MatroskaTag::new(TagTarget::file());
        tag.set_value(KnownField::Title, TagValue::text("old title"));
        let tags_el = tag::make_tags_element(std::slice::from_ref(&tag)).unwrap();
        let file = build_webm(Some(&tags_el), 64);

        let (mut container, _) = parse_file(file.clone());
        let existing = container.tag_for_target(&TagTarget::file());
        existing.set_value(KnownField::Title, TagValue::text("new"));
        assert!(container.can_apply_in_place());

        let mut stream = Cursor::new(file.clone());
        let mut diag = Diagnostics::new();
        let applied = container
            .try_apply_in_place(&mut stream, &ProgressFeedback::new(), &mut diag)
            .unwrap();
        assert!(applied);
        let updated = stream.into_inner();
        assert_eq!(updated.len(), file.len(), "file length must not change");

        let (reparsed, _) = parse_file(updated);
        assert_eq!(
            reparsed.tags[0]
                .value(KnownField::Title)
                .and_then(TagValue::to_text),
            Some("new".into())
        );
    }

    #[test]
    fn test_in_place_refused_when_too_large() {
        let mut tag = MatroskaTag::new(TagTarget::file());
        tag.set_value(KnownField::Title, TagValue::text("x"));
        let tags_el = tag::make_tags_element(std::slice::from_ref(&tag)).unwrap();
        let file = build_webm(Some(&tags_el), 0);

        let (mut container, _) = parse_file(file.clone());
        let existing = container.tag_for_target(&TagTarget::file());
        existing.set_value(
            KnownField::Comment,
            TagValue::text("a".repeat(500)),
        );
        assert!(!container.can_apply_in_place());
        let mut stream = Cursor::new(file);
        let mut diag = Diagnostics::new();
        let applied = container
            .try_apply_in_place(&mut stream, &ProgressFeedback::new(), &mut diag)
            .unwrap();
        assert!(!applied);
    }

    #[test]
    fn test_segment_title_rewrite() {
        let (mut container, _) = parse_file(build_webm(None, 0));
        assert_eq!(container.title, None);
        container.set_title(Some("My recording".into()));
        assert!(!container.can_apply_in_place());

        let mut reader = BinaryReader::new(Cursor::new(build_webm(None, 0)));
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        let mut diag = Diagnostics::new();
        container
            .rewrite(
                &mut reader,
                &mut writer,
                &ProgressFeedback::new(),
                &mut diag,
            )
            .unwrap();
        let (reparsed, _) = parse_file(writer.into_inner().into_inner());
        assert_eq!(reparsed.title.as_deref(), Some("My recording"));
        assert_eq!(reparsed.timestamp_scale, 1_000_000);
    }

    #[test]
    fn test_cancellation_before_rewrite() {
        let (container, _) = parse_file(build_webm(None, 0));
        let progress = ProgressFeedback::new();
        progress.cancel();
        let mut reader = BinaryReader::new(Cursor::new(build_webm(None, 0)));
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        let mut diag = Diagnostics::new();
        let err = container
            .rewrite(&mut reader, &mut writer, &progress, &mut diag)
            .unwrap_err();
        assert!(matches!(err, MkvError::Aborted));
    }
}
