//! MP4 container: parsing and the in-place/full rewrite planner.
//!
//! Parsing walks top-level atoms through the generic element tree, loads the
//! `moov` subtree into memory (it is small next to `mdat`) and materialises
//! the iTunes tag and tracks from it. Rewriting replaces the
//! `udta/meta/ilst` chain inside `moov`: in place when the new `ilst` fits
//! the old span plus adjacent `free` padding, otherwise by streaming to a
//! new target with every `stco`/`co64` entry shifted by the layout delta.

use crate::atoms::{display_fourcc, ids, put_atom, put_free_atom, AtomIter, Mp4ElementFormat};
use crate::tag::Mp4Tag;
use crate::track;
use mediatag_core::element::ElementTree;
use mediatag_core::io::{BinaryReader, BinaryWriter};
use mediatag_core::{Diagnostics, Error, ProgressFeedback, Result, TrackInfo};
use std::io::{Read, Seek, Write};
use std::time::Duration;

const COPY_BUF_LEN: usize = 64 * 1024;

/// One top-level atom of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopAtom {
    /// Atom type.
    pub fourcc: [u8; 4],
    /// Absolute offset of the atom header.
    pub offset: u64,
    /// Header length (8 or 16).
    pub header_len: u32,
    /// Payload length.
    pub data_len: u64,
}

impl TopAtom {
    fn total_len(&self) -> u64 {
        self.header_len as u64 + self.data_len
    }

    fn end_offset(&self) -> u64 {
        self.offset + self.total_len()
    }
}

/// Span of the existing `ilst` atom plus any directly following `free`
/// padding inside `meta`, in absolute file offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IlstSpan {
    offset: u64,
    len: u64,
}

/// Options for the rewrite path.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mp4WriteOptions {
    /// Move `moov` in front of `mdat` when it trails it ("fast start").
    pub relocate_moov: bool,
    /// Padding to place after a rewritten `ilst` for future in-place edits.
    pub preferred_padding: u32,
}

/// A parsed MP4/ISO-BMFF file.
#[derive(Debug, Default)]
pub struct Mp4Container {
    /// Major brand from `ftyp`.
    pub major_brand: [u8; 4],
    /// The iTunes tag, if any edits or an existing `ilst` exist.
    pub tag: Option<Mp4Tag>,
    /// Tracks.
    pub tracks: Vec<TrackInfo>,
    /// Ids of chapter text tracks referenced through `tref/chap`.
    pub chapter_track_ids: Vec<u32>,
    /// Presentation duration from `mvhd`.
    pub duration: Duration,

    movie_timescale: u32,
    top_level: Vec<TopAtom>,
    moov: Option<TopAtom>,
    ilst_span: Option<IlstSpan>,
}

impl Mp4Container {
    /// Parse an MP4 stream.
    pub fn parse<R: Read + Seek>(
        reader: &mut BinaryReader<R>,
        diag: &mut Diagnostics,
    ) -> Result<Self> {
        let file_len = reader.stream_len()?;
        let mut tree: ElementTree<Mp4ElementFormat> = ElementTree::new();
        let mut container = Mp4Container::default();

        let mut index = tree.read_at(reader, 0, file_len, diag)?;
        let first = index.ok_or_else(|| Error::invalid_data("file holds no atom"))?;
        if tree.node(first).id != ids::FTYP {
            return Err(Error::invalid_data("file does not start with an ftyp atom"));
        }

        while let Some(current) = index {
            let node = tree.node(current);
            let atom = TopAtom {
                fourcc: node.id,
                offset: node.start_offset,
                header_len: node.header_len,
                data_len: node.data_len,
            };
            container.top_level.push(atom);
            match atom.fourcc {
                ids::FTYP => {
                    let payload = tree.read_data(reader, current)?;
                    if payload.len() >= 4 {
                        container.major_brand = payload[..4].try_into().unwrap();
                    }
                }
                ids::MOOV => {
                    if container.moov.is_some() {
                        diag.warn("parsing MP4", "second moov atom ignored");
                    } else {
                        container.moov = Some(atom);
                        let payload = tree.read_data(reader, current)?;
                        container.parse_moov(&payload, atom, diag)?;
                    }
                }
                _ => {}
            }
            index = tree.next_sibling(reader, current, diag)?;
        }

        if container.moov.is_none() {
            return Err(Error::no_data("no moov atom found"));
        }
        tracing::debug!(
            tracks = container.tracks.len(),
            has_tag = container.tag.is_some(),
            "parsed MP4 container"
        );
        Ok(container)
    }

    fn parse_moov(&mut self, moov: &[u8], atom: TopAtom, diag: &mut Diagnostics) -> Result<()> {
        let moov_data_offset = atom.offset + atom.header_len as u64;
        for child in AtomIter::new(moov) {
            let (fourcc, payload) = child?;
            match fourcc {
                ids::MVHD => self.parse_mvhd(payload)?,
                ids::TRAK => {
                    let trak_offset =
                        moov_data_offset + slice_offset(moov, payload) - 8;
                    match track::parse_trak(payload, trak_offset, self.movie_timescale, diag) {
                        Ok(track) => self.tracks.push(track),
                        Err(e) => diag.critical(
                            "parsing MP4 track",
                            format!("track skipped: {e}"),
                        ),
                    }
                    self.chapter_track_ids
                        .extend(track::chapter_references(payload)?);
                }
                ids::UDTA => {
                    self.parse_udta(payload, moov_data_offset + slice_offset(moov, payload), diag)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_mvhd(&mut self, data: &[u8]) -> Result<()> {
        if data.len() < 4 {
            return Err(Error::invalid_data("mvhd too short"));
        }
        let version = data[0];
        let (timescale, duration) = if version == 1 {
            if data.len() < 32 {
                return Err(Error::invalid_data("mvhd v1 too short"));
            }
            (
                u32::from_be_bytes(data[20..24].try_into().unwrap()),
                u64::from_be_bytes(data[24..32].try_into().unwrap()),
            )
        } else {
            if data.len() < 20 {
                return Err(Error::invalid_data("mvhd v0 too short"));
            }
            (
                u32::from_be_bytes(data[12..16].try_into().unwrap()),
                u32::from_be_bytes(data[16..20].try_into().unwrap()) as u64,
            )
        };
        self.movie_timescale = timescale;
        if timescale > 0 {
            self.duration = Duration::from_secs_f64(duration as f64 / timescale as f64);
        }
        Ok(())
    }

    fn parse_udta(&mut self, udta: &[u8], udta_data_offset: u64, diag: &mut Diagnostics) -> Result<()> {
        for child in AtomIter::new(udta) {
            let (fourcc, payload) = child?;
            if fourcc != ids::META || payload.len() < 4 {
                continue;
            }
            let meta_children = &payload[4..];
            let meta_children_offset =
                udta_data_offset + slice_offset(udta, payload) + 4;
            let mut previous_was_ilst_chain = false;
            for grandchild in AtomIter::new(meta_children) {
                let (fourcc, payload) = grandchild?;
                let grandchild_payload_offset = slice_offset(meta_children, payload);
                match fourcc {
                    ids::ILST => {
                        self.tag = Some(Mp4Tag::parse_ilst(payload, diag)?);
                        self.ilst_span = Some(IlstSpan {
                            offset: meta_children_offset + grandchild_payload_offset - 8,
                            len: payload.len() as u64 + 8,
                        });
                        previous_was_ilst_chain = true;
                    }
                    ids::FREE | ids::SKIP if previous_was_ilst_chain => {
                        if let Some(span) = &mut self.ilst_span {
                            span.len += payload.len() as u64 + 8;
                        }
                    }
                    _ => previous_was_ilst_chain = false,
                }
            }
        }
        Ok(())
    }

    /// The tag, created empty on first access.
    pub fn tag_mut(&mut self) -> &mut Mp4Tag {
        self.tag.get_or_insert_with(Mp4Tag::new)
    }

    /// Whether the staged tag fits the existing `ilst` span.
    pub fn can_apply_in_place(&self) -> bool {
        let Some(span) = self.ilst_span else {
            return false;
        };
        let new_len = self.new_ilst_atom().map_or(0, |b| b.len() as u64);
        fits_with_free(new_len, span.len)
    }

    fn new_ilst_atom(&self) -> Option<Vec<u8>> {
        let payload = self.tag.as_ref()?.make_ilst()?;
        let mut atom = Vec::new();
        put_atom(&mut atom, ids::ILST, &payload);
        Some(atom)
    }

    /// Apply staged tag edits into the existing `ilst` span of `stream`.
    ///
    /// Returns `false` without touching the stream when the edit does not
    /// fit; the caller then falls back to [`Mp4Container::rewrite`]. The
    /// surrounding atom sizes are untouched because the span's total length
    /// is preserved, so no chunk offset moves.
    pub fn try_apply_in_place<S: Read + Write + Seek>(
        &self,
        stream: &mut S,
        progress: &ProgressFeedback,
        diag: &mut Diagnostics,
    ) -> Result<bool> {
        let Some(span) = self.ilst_span else {
            return Ok(false);
        };
        let new_atom = self.new_ilst_atom();
        let new_len = new_atom.as_ref().map_or(0, |b| b.len() as u64);
        if !fits_with_free(new_len, span.len) {
            return Ok(false);
        }

        progress.check()?;
        progress.report("updating ilst in place", 0.0);
        let mut out = new_atom.unwrap_or_default();
        if span.len > new_len {
            put_free_atom(&mut out, span.len - new_len)?;
        }
        debug_assert_eq!(out.len() as u64, span.len);
        stream.seek(std::io::SeekFrom::Start(span.offset))?;
        stream.write_all(&out)?;
        stream.flush()?;
        progress.report("updating ilst in place", 100.0);
        diag.info(
            "writing MP4 tag",
            format!("ilst rewritten in place at offset {}", span.offset),
        );
        Ok(true)
    }

    /// Stream a full rewrite into `writer`, rebuilding `moov` around the
    /// staged tag and patching every chunk offset table by the layout shift.
    pub fn rewrite<R: Read + Seek, W: Write + Seek>(
        &self,
        reader: &mut BinaryReader<R>,
        writer: &mut BinaryWriter<W>,
        options: Mp4WriteOptions,
        progress: &ProgressFeedback,
        diag: &mut Diagnostics,
    ) -> Result<()> {
        let moov_atom = self
            .moov
            .ok_or_else(|| Error::no_data("no moov atom to rewrite"))?;
        reader.seek_to(moov_atom.offset + moov_atom.header_len as u64)?;
        let old_moov = reader.read_bytes(moov_atom.data_len as usize)?;

        progress.check()?;
        progress.report("rebuilding moov", 0.0);
        let new_ilst = self.new_ilst_atom();
        let mut new_moov_payload = rebuild_moov(&old_moov, new_ilst.as_deref(), options)?;

        // Layout simulation: same atom order, moov swapped for the rebuilt
        // bytes, optionally relocated in front of the first mdat.
        let new_moov_total = new_moov_payload.len() as u64 + 8;
        let mdat_offset = self
            .top_level
            .iter()
            .find(|a| a.fourcc == ids::MDAT)
            .map(|a| a.offset);
        let relocate = options.relocate_moov
            && mdat_offset.is_some_and(|mdat| moov_atom.offset > mdat);

        let mut order: Vec<&TopAtom> = Vec::new();
        for atom in &self.top_level {
            if relocate && atom.fourcc == ids::MOOV {
                continue;
            }
            if relocate && Some(atom.offset) == mdat_offset {
                order.push(&moov_atom);
            }
            order.push(atom);
        }
        if !relocate {
            // moov stays at its ordinal position.
        } else if !order.iter().any(|a| a.fourcc == ids::MOOV) {
            order.push(&moov_atom);
        }
        if !order.iter().any(|a| a.fourcc == ids::MOOV) {
            return Err(Error::invalid_data("moov atom lost during layout"));
        }

        // Old-offset -> new-offset mapping for every top-level atom.
        let mut shifts: Vec<(TopAtom, i64)> = Vec::new();
        let mut out_offset = 0u64;
        for atom in &order {
            let new_total = if atom.fourcc == ids::MOOV {
                new_moov_total
            } else {
                atom.total_len()
            };
            shifts.push((**atom, out_offset as i64 - atom.offset as i64));
            out_offset += new_total;
        }

        patch_chunk_offsets(&mut new_moov_payload, &shifts, progress, diag)?;

        // Emission.
        for (index, atom) in order.iter().enumerate() {
            progress.check()?;
            progress.report(
                "writing atoms",
                index as f64 / order.len() as f64 * 100.0,
            );
            if atom.fourcc == ids::MOOV {
                let mut header = Vec::new();
                put_atom(&mut header, ids::MOOV, &[]);
                // put_atom wrote size 8 for the empty payload; fix it up.
                header[..4].copy_from_slice(&(new_moov_total as u32).to_be_bytes());
                writer.write_bytes(&header)?;
                writer.write_bytes(&new_moov_payload)?;
            } else {
                reader.seek_to(atom.offset)?;
                copy_bytes(reader, writer, atom.total_len())?;
            }
        }
        writer.flush()?;
        progress.report("writing atoms", 100.0);
        diag.info(
            "writing MP4 container",
            format!("container rewritten, moov is {new_moov_total} bytes"),
        );
        Ok(())
    }
}

/// Byte offset of `inner` within `outer`; both must come from the same
/// allocation, which `AtomIter` guarantees.
fn slice_offset(outer: &[u8], inner: &[u8]) -> u64 {
    (inner.as_ptr() as usize - outer.as_ptr() as usize) as u64
}

/// A replaced `ilst` span can absorb `new_len` bytes when the leftover is
/// zero or large enough for a `free` atom header.
fn fits_with_free(new_len: u64, span: u64) -> bool {
    new_len <= span && (span - new_len == 0 || span - new_len >= 8)
}

/// Rebuild the `moov` payload with the `udta/meta/ilst` chain replaced.
fn rebuild_moov(
    moov: &[u8],
    new_ilst: Option<&[u8]>,
    options: Mp4WriteOptions,
) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(moov.len());
    let mut udta_seen = false;
    for child in AtomIter::new(moov) {
        let (fourcc, payload) = child?;
        if fourcc == ids::UDTA {
            udta_seen = true;
            let udta = rebuild_udta(payload, new_ilst, options)?;
            if !udta.is_empty() {
                put_atom(&mut out, ids::UDTA, &udta);
            }
        } else {
            put_atom(&mut out, fourcc, payload);
        }
    }
    if !udta_seen {
        if let Some(ilst) = new_ilst {
            let udta = rebuild_udta(&[], Some(ilst), options)?;
            put_atom(&mut out, ids::UDTA, &udta);
        }
    }
    Ok(out)
}

fn rebuild_udta(
    udta: &[u8],
    new_ilst: Option<&[u8]>,
    options: Mp4WriteOptions,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut meta_seen = false;
    for child in AtomIter::new(udta) {
        let (fourcc, payload) = child?;
        if fourcc == ids::META {
            meta_seen = true;
            let meta = rebuild_meta(payload, new_ilst, options)?;
            put_atom(&mut out, ids::META, &meta);
        } else {
            put_atom(&mut out, fourcc, payload);
        }
    }
    if !meta_seen {
        if let Some(ilst) = new_ilst {
            let meta = make_meta(ilst, options)?;
            put_atom(&mut out, ids::META, &meta);
        }
    }
    Ok(out)
}

fn rebuild_meta(
    meta: &[u8],
    new_ilst: Option<&[u8]>,
    options: Mp4WriteOptions,
) -> Result<Vec<u8>> {
    if meta.len() < 4 {
        return Err(Error::invalid_data("meta atom too short"));
    }
    let mut out = meta[..4].to_vec();
    let mut ilst_seen = false;
    for child in AtomIter::new(&meta[4..]) {
        let (fourcc, payload) = child?;
        match fourcc {
            ids::ILST => {
                ilst_seen = true;
                if let Some(ilst) = new_ilst {
                    out.extend_from_slice(ilst);
                    if options.preferred_padding >= 8 {
                        put_free_atom(&mut out, options.preferred_padding as u64)?;
                    }
                }
            }
            // Old padding around the tag is not carried over.
            ids::FREE | ids::SKIP => {}
            _ => put_atom(&mut out, fourcc, payload),
        }
    }
    if !ilst_seen {
        if let Some(ilst) = new_ilst {
            out.extend_from_slice(ilst);
            if options.preferred_padding >= 8 {
                put_free_atom(&mut out, options.preferred_padding as u64)?;
            }
        }
    }
    Ok(out)
}

/// Create a fresh `meta` payload: version/flags, a metadata handler and the
/// tag itself.
fn make_meta(ilst: &[u8], options: Mp4WriteOptions) -> Result<Vec<u8>> {
    let mut out = vec![0u8; 4];
    let mut hdlr = vec![0u8; 8];
    hdlr.extend_from_slice(b"mdir");
    hdlr.extend_from_slice(b"appl");
    hdlr.extend_from_slice(&[0u8; 9]);
    put_atom(&mut out, ids::HDLR, &hdlr);
    out.extend_from_slice(ilst);
    if options.preferred_padding >= 8 {
        put_free_atom(&mut out, options.preferred_padding as u64)?;
    }
    Ok(out)
}

/// Shift every `stco`/`co64` entry inside the rebuilt `moov` payload
/// according to which top-level atom the offset used to point into.
fn patch_chunk_offsets(
    moov: &mut [u8],
    shifts: &[(TopAtom, i64)],
    progress: &ProgressFeedback,
    diag: &mut Diagnostics,
) -> Result<()> {
    let shift_for = |offset: u64| -> i64 {
        shifts
            .iter()
            .find(|(atom, _)| offset >= atom.offset && offset < atom.end_offset())
            .map(|(_, shift)| *shift)
            .unwrap_or(0)
    };

    // Locate every stco/co64 atom within the moov payload.
    let tables = find_chunk_offset_tables(moov)?;
    for (index, table) in tables.iter().enumerate() {
        progress.check()?;
        let entry_count =
            u32::from_be_bytes(moov[table.offset + 4..table.offset + 8].try_into().unwrap())
                as usize;
        let entry_len = if table.co64 { 8 } else { 4 };
        let entries_start = table.offset + 8;
        if entries_start + entry_count * entry_len > table.end {
            return Err(Error::invalid_data(format!(
                "{} table declares more entries than fit its atom",
                if table.co64 { "co64" } else { "stco" }
            )));
        }
        for i in 0..entry_count {
            let at = entries_start + i * entry_len;
            let old = if table.co64 {
                u64::from_be_bytes(moov[at..at + 8].try_into().unwrap())
            } else {
                u32::from_be_bytes(moov[at..at + 4].try_into().unwrap()) as u64
            };
            let shift = shift_for(old);
            let new = old as i64 + shift;
            if new < 0 {
                return Err(Error::bad_tag_offset(format!(
                    "chunk offset {old} would underflow by {shift}"
                )));
            }
            let new = new as u64;
            if table.co64 {
                moov[at..at + 8].copy_from_slice(&new.to_be_bytes());
            } else {
                if new > u32::MAX as u64 {
                    return Err(Error::bad_tag_offset(format!(
                        "chunk offset {new} no longer fits a 32-bit stco entry"
                    )));
                }
                moov[at..at + 4].copy_from_slice(&(new as u32).to_be_bytes());
            }
        }
        tracing::trace!(table = index, entries = entry_count, "patched chunk offsets");
    }
    if !tables.is_empty() {
        diag.info(
            "writing MP4 container",
            format!("patched {} chunk offset table(s)", tables.len()),
        );
    }
    Ok(())
}

struct OffsetTable {
    /// Payload offset within the moov payload buffer.
    offset: usize,
    /// One past the payload end.
    end: usize,
    /// 64-bit entries.
    co64: bool,
}

fn find_chunk_offset_tables(moov: &[u8]) -> Result<Vec<OffsetTable>> {
    let mut tables = Vec::new();
    for trak in children_of(moov, ids::TRAK)? {
        for mdia in children_of(&moov[trak.clone()], ids::MDIA)? {
            let mdia = offset_range(&trak, mdia);
            for minf in children_of(&moov[mdia.clone()], ids::MINF)? {
                let minf = offset_range(&mdia, minf);
                for stbl in children_of(&moov[minf.clone()], ids::STBL)? {
                    let stbl = offset_range(&minf, stbl);
                    for child in AtomIter::new(&moov[stbl.clone()]) {
                        let (fourcc, payload) = child?;
                        if fourcc == ids::STCO || fourcc == ids::CO64 {
                            if payload.len() < 8 {
                                return Err(Error::invalid_data(format!(
                                    "{} atom too short",
                                    display_fourcc(fourcc)
                                )));
                            }
                            let start =
                                stbl.start + slice_offset(&moov[stbl.clone()], payload) as usize;
                            tables.push(OffsetTable {
                                offset: start,
                                end: start + payload.len(),
                                co64: fourcc == ids::CO64,
                            });
                        }
                    }
                }
            }
        }
    }
    Ok(tables)
}

/// Payload ranges of all children with the given id, relative to `data`.
fn children_of(data: &[u8], fourcc: [u8; 4]) -> Result<Vec<std::ops::Range<usize>>> {
    let mut out = Vec::new();
    for child in AtomIter::new(data) {
        let (id, payload) = child?;
        if id == fourcc {
            let start = slice_offset(data, payload) as usize;
            out.push(start..start + payload.len());
        }
    }
    Ok(out)
}

fn offset_range(
    outer: &std::ops::Range<usize>,
    inner: std::ops::Range<usize>,
) -> std::ops::Range<usize> {
    (outer.start + inner.start)..(outer.start + inner.end)
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

#[cfg(test)]
mod tests {
    use super::*;
    use mediatag_core::{KnownField, Tag as _, TagValue};
    use std::io::Cursor;

    /// A minimal MP4: ftyp, moov (mvhd + one audio trak with an stco), mdat.
    fn build_mp4(with_ilst: Option<&[u8]>, free_after: u64) -> Vec<u8> {
        let mut mvhd = vec![0u8; 4];
        mvhd.extend_from_slice(&[0u8; 8]);
        mvhd.extend_from_slice(&1000u32.to_be_bytes()); // timescale
        mvhd.extend_from_slice(&5000u32.to_be_bytes()); // duration: 5 s
        mvhd.extend_from_slice(&[0u8; 80]);

        // The trak below points one chunk at the mdat payload.
        let mut tkhd = vec![0u8, 0, 0, 1];
        tkhd.extend_from_slice(&[0u8; 8]);
        tkhd.extend_from_slice(&1u32.to_be_bytes());
        tkhd.extend_from_slice(&[0u8; 8]);
        tkhd.extend_from_slice(&[0u8; 52]);
        tkhd.extend_from_slice(&[0u8; 8]);

        let mut mdhd = vec![0u8; 4];
        mdhd.extend_from_slice(&[0u8; 8]);
        mdhd.extend_from_slice(&44100u32.to_be_bytes());
        mdhd.extend_from_slice(&44100u32.to_be_bytes());
        mdhd.extend_from_slice(&0x55C4u16.to_be_bytes()); // "und"
        mdhd.extend_from_slice(&0u16.to_be_bytes());

        let mut hdlr = vec![0u8; 8];
        hdlr.extend_from_slice(b"soun");
        hdlr.extend_from_slice(&[0u8; 13]);

        let mut entry = vec![0u8; 6];
        entry.extend_from_slice(&1u16.to_be_bytes());
        entry.extend_from_slice(&[0u8; 8]);
        entry.extend_from_slice(&2u16.to_be_bytes());
        entry.extend_from_slice(&16u16.to_be_bytes());
        entry.extend_from_slice(&[0u8; 4]);
        entry.extend_from_slice(&(44100u32 << 16).to_be_bytes());
        let mut sample_entry = Vec::new();
        put_atom(&mut sample_entry, *b"mp4a", &entry);
        let mut stsd = vec![0u8; 4];
        stsd.extend_from_slice(&1u32.to_be_bytes());
        stsd.extend_from_slice(&sample_entry);

        // stco placeholder; the single entry is patched below once the mdat
        // offset is known.
        let mut stbl = Vec::new();
        put_atom(&mut stbl, ids::STSD, &stsd);
        let mut stco = vec![0u8; 4];
        stco.extend_from_slice(&1u32.to_be_bytes());
        stco.extend_from_slice(&0u32.to_be_bytes()); // placeholder
        put_atom(&mut stbl, ids::STCO, &stco);
        let mut minf = Vec::new();
        put_atom(&mut minf, ids::STBL, &stbl);
        let mut mdia = Vec::new();
        put_atom(&mut mdia, ids::MDHD, &mdhd);
        put_atom(&mut mdia, ids::HDLR, &hdlr);
        put_atom(&mut mdia, ids::MINF, &minf);
        let mut trak = Vec::new();
        put_atom(&mut trak, ids::TKHD, &tkhd);
        put_atom(&mut trak, ids::MDIA, &mdia);

        let mut moov = Vec::new();
        put_atom(&mut moov, ids::MVHD, &mvhd);
        put_atom(&mut moov, ids::TRAK, &trak);
        if let Some(ilst) = with_ilst {
            let mut meta = vec![0u8; 4];
            let mut hdlr_meta = vec![0u8; 8];
            hdlr_meta.extend_from_slice(b"mdir");
            hdlr_meta.extend_from_slice(b"appl");
            hdlr_meta.extend_from_slice(&[0u8; 9]);
            put_atom(&mut meta, ids::HDLR, &hdlr_meta);
            let mut ilst_atom = Vec::new();
            put_atom(&mut ilst_atom, ids::ILST, ilst);
            meta.extend_from_slice(&ilst_atom);
            if free_after >= 8 {
                put_free_atom(&mut meta, free_after).unwrap();
            }
            let mut udta = Vec::new();
            put_atom(&mut udta, ids::META, &meta);
            put_atom(&mut moov, ids::UDTA, &udta);
        }

        let mut file = Vec::new();
        put_atom(&mut file, ids::FTYP, b"M4A \x00\x00\x02\x00isommp42");
        let mut moov_atom = Vec::new();
        put_atom(&mut moov_atom, ids::MOOV, &moov);
        file.extend_from_slice(&moov_atom);
        let mdat_payload_offset = (file.len() + 8) as u32;
        let mdat_payload = [0xA5u8; 64];
        put_atom(&mut file, ids::MDAT, &mdat_payload);

        // Patch the single stco entry to the mdat payload offset.
        let needle = {
            let mut n = Vec::new();
            put_atom(&mut n, ids::STCO, &{
                let mut s = vec![0u8; 4];
                s.extend_from_slice(&1u32.to_be_bytes());
                s.extend_from_slice(&0u32.to_be_bytes());
                s
            });
            n
        };
        let pos = file
            .windows(needle.len())
            .position(|w| w == needle)
            .expect("stco placeholder present");
        let entry_at = pos + 8 + 8;
        file[entry_at..entry_at + 4].copy_from_slice(&mdat_payload_offset.to_be_bytes());
        file
    }

    fn parse(data: Vec<u8>) -> (Mp4Container, Diagnostics) {
        let mut reader = BinaryReader::new(Cursor::new(data));
        let mut diag = Diagnostics::new();
        let container = Mp4Container::parse(&mut reader, &mut diag).unwrap();
        (container, diag)
    }

    fn read_stco_entry(data: &[u8]) -> u32 {
        let pos = data.windows(4).position(|w| w == b"stco").expect("stco");
        // fourcc at pos, payload starts at pos+4: version/flags 4, count 4.
        u32::from_be_bytes(data[pos + 12..pos + 16].try_into().unwrap())
    }

    fn read_mdat_payload_offset(data: &[u8]) -> u32 {
        // The fourcc sits 4 bytes into the atom; the payload starts 4 after.
        let pos = data.windows(4).position(|w| w == b"mdat").expect("mdat");
        (pos + 4) as u32
    }

    #[test]
    fn test_parse_minimal() {
        let (container, diag) = parse(build_mp4(None, 0));
        assert_eq!(&container.major_brand, b"M4A ");
        assert_eq!(container.tracks.len(), 1);
        assert_eq!(container.tracks[0].sample_rate, 44100);
        assert_eq!(container.duration, Duration::from_secs(5));
        assert!(container.tag.is_none());
        assert!(diag.is_empty(), "{:?}", diag.entries());
    }

    #[test]
    fn test_set_title_rewrites_and_patches_stco() {
        let source = build_mp4(None, 0);
        let old_stco = read_stco_entry(&source);
        assert_eq!(old_stco, read_mdat_payload_offset(&source));

        let (mut container, _) = parse(source.clone());
        container
            .tag_mut()
            .set_value(KnownField::Title, TagValue::text("Example \u{2713}"));

        let mut reader = BinaryReader::new(Cursor::new(source.clone()));
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        let mut diag = Diagnostics::new();
        container
            .rewrite(
                &mut reader,
                &mut writer,
                Mp4WriteOptions::default(),
                &ProgressFeedback::new(),
                &mut diag,
            )
            .unwrap();
        let output = writer.into_inner().into_inner();

        // The tag is present with type code 1 and the expected UTF-8 bytes.
        let expected = [
            0x45, 0x78, 0x61, 0x6D, 0x70, 0x6C, 0x65, 0x20, 0xE2, 0x9C, 0x93,
        ];
        assert!(output.windows(expected.len()).any(|w| w == expected));

        // Chunk offsets moved by exactly the moov growth.
        let new_stco = read_stco_entry(&output);
        assert_eq!(new_stco, read_mdat_payload_offset(&output));
        let delta = output.len() as i64 - source.len() as i64;
        assert_eq!(new_stco as i64 - old_stco as i64, delta);

        // Reparse and confirm the tag value.
        let (reparsed, _) = parse(output);
        assert_eq!(
            reparsed
                .tag
                .as_ref()
                .and_then(|t| t.value(KnownField::Title))
                .and_then(TagValue::to_text),
            Some("Example \u{2713}".into())
        );
    }

    #[test]
    fn test_in_place_when_padding_suffices() {
        let mut tag = Mp4Tag::new();
        tag.set_value(KnownField::Title, TagValue::text("placeholder title"));
        let ilst = tag.make_ilst().unwrap();
        let source = build_mp4(Some(&ilst), 64);

        let (mut container, _) = parse(source.clone());
        container
            .tag_mut()
            .set_value(KnownField::Title, TagValue::text("short"));
        assert!(container.can_apply_in_place());

        let mut stream = Cursor::new(source.clone());
        let mut diag = Diagnostics::new();
        assert!(container
            .try_apply_in_place(&mut stream, &ProgressFeedback::new(), &mut diag)
            .unwrap());
        let output = stream.into_inner();
        assert_eq!(output.len(), source.len());
        // Chunk offsets untouched.
        assert_eq!(read_stco_entry(&output), read_stco_entry(&source));

        let (reparsed, _) = parse(output);
        assert_eq!(
            reparsed
                .tag
                .as_ref()
                .and_then(|t| t.value(KnownField::Title))
                .and_then(TagValue::to_text),
            Some("short".into())
        );
    }

    #[test]
    fn test_in_place_refused_without_padding() {
        let mut tag = Mp4Tag::new();
        tag.set_value(KnownField::Title, TagValue::text("t"));
        let ilst = tag.make_ilst().unwrap();
        let source = build_mp4(Some(&ilst), 0);

        let (mut container, _) = parse(source.clone());
        container
            .tag_mut()
            .set_value(KnownField::Title, TagValue::text("a much longer title value"));
        assert!(!container.can_apply_in_place());
        let mut stream = Cursor::new(source);
        let mut diag = Diagnostics::new();
        assert!(!container
            .try_apply_in_place(&mut stream, &ProgressFeedback::new(), &mut diag)
            .unwrap());
    }

    #[test]
    fn test_cancellation() {
        let source = build_mp4(None, 0);
        let (mut container, _) = parse(source.clone());
        container
            .tag_mut()
            .set_value(KnownField::Title, TagValue::text("x"));
        let progress = ProgressFeedback::new();
        progress.cancel();
        let mut reader = BinaryReader::new(Cursor::new(source));
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        let mut diag = Diagnostics::new();
        let err = container
            .rewrite(
                &mut reader,
                &mut writer,
                Mp4WriteOptions::default(),
                &progress,
                &mut diag,
            )
            .unwrap_err();
        assert!(err.is_aborted());
    }
}
