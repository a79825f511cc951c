//! Ogg container: logical streams, codec detection and comment rewriting.
//!
//! The codec of a logical stream is detected from its first packet
//! (`\x01vorbis`, `OpusHead`, the FLAC-to-Ogg mapping header); the comment
//! lives in the second packet (or, for FLAC, in the `VORBIS_COMMENT` header
//! packet). Rewriting re-emits the header packets on fresh pages and copies
//! the audio pages verbatim apart from renumbered sequences and recomputed
//! checksums, so granule positions never change.

use crate::iterator::{OggIterator, OggPacket};
use crate::page::{self, OggPage, FLAG_BOS, FLAG_CONTINUED};
use mediatag_core::io::{BinaryReader, BinaryWriter};
use mediatag_core::{
    Diagnostics, Error, MediaFormat, MediaType, ProgressFeedback, Result, TrackInfo,
};
use mediatag_vorbis::VorbisComment;
use std::io::{Read, Seek, Write};

/// Maximum payload bytes on one page (255 segments of 255 bytes).
const MAX_PAGE_PAYLOAD: usize = 255 * 255;

/// Codec carried by a logical stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OggCodec {
    /// Vorbis audio.
    Vorbis,
    /// Opus audio.
    Opus,
    /// FLAC via the FLAC-to-Ogg mapping.
    Flac,
    /// Theora video.
    Theora,
    /// Anything else; header packets are preserved verbatim.
    Unknown,
}

/// One logical bitstream.
#[derive(Debug)]
pub struct LogicalStream {
    /// Serial number.
    pub serial: u32,
    /// Detected codec.
    pub codec: OggCodec,
    /// The stream's comment, if it has (or is staged to have) one.
    pub comment: Option<VorbisComment>,
    /// Technical track information.
    pub track: TrackInfo,

    header_packets: Vec<Vec<u8>>,
    comment_packet: Option<usize>,
    headers_done: bool,
    first_data_offset: Option<u64>,
    last_granule: u64,
    pre_skip: u16,
}

impl LogicalStream {
    fn new(serial: u32) -> Self {
        Self {
            serial,
            codec: OggCodec::Unknown,
            comment: None,
            track: TrackInfo::new(),
            header_packets: Vec::new(),
            comment_packet: None,
            headers_done: false,
            first_data_offset: None,
            last_granule: 0,
            pre_skip: 0,
        }
    }

    /// The comment, created empty on first access.
    pub fn comment_mut(&mut self) -> &mut VorbisComment {
        self.comment
            .get_or_insert_with(|| VorbisComment::new("mediatag"))
    }

    /// Number of header packets this stream's codec uses.
    fn expected_headers(&self) -> usize {
        match self.codec {
            OggCodec::Vorbis | OggCodec::Theora => 3,
            OggCodec::Opus => 2,
            // FLAC headers are delimited by the last-metadata-block flag.
            OggCodec::Flac => usize::MAX,
            OggCodec::Unknown => 1,
        }
    }
}

/// A parsed physical Ogg stream.
#[derive(Debug, Default)]
pub struct OggContainer {
    /// Logical streams in order of first appearance.
    pub streams: Vec<LogicalStream>,
}

impl OggContainer {
    /// Parse a physical Ogg stream. `verify_checksums` reports (but never
    /// fails on) CRC mismatches.
    pub fn parse<R: Read + Seek>(
        reader: &mut BinaryReader<R>,
        verify_checksums: bool,
        diag: &mut Diagnostics,
    ) -> Result<Self> {
        let mut container = OggContainer::default();
        let mut iter = OggIterator::new(verify_checksums);
        while let Some(packet) = iter.next_packet(reader, diag)? {
            container.take_packet(packet, diag)?;
        }
        if container.streams.is_empty() {
            return Err(Error::no_data("no Ogg logical stream found"));
        }
        for stream in &mut container.streams {
            finish_track(stream);
        }
        tracing::debug!(streams = container.streams.len(), "parsed Ogg container");
        Ok(container)
    }

    fn stream_mut(&mut self, serial: u32) -> &mut LogicalStream {
        if let Some(pos) = self.streams.iter().position(|s| s.serial == serial) {
            return &mut self.streams[pos];
        }
        self.streams.push(LogicalStream::new(serial));
        self.streams.last_mut().expect("just pushed")
    }

    fn take_packet(&mut self, packet: OggPacket, diag: &mut Diagnostics) -> Result<()> {
        let stream = self.stream_mut(packet.serial);
        if stream.headers_done {
            if stream.first_data_offset.is_none() {
                stream.first_data_offset = Some(packet.start_offset);
            }
            if packet.granule_position != page::NO_GRANULE {
                stream.last_granule = stream.last_granule.max(packet.granule_position);
            }
            return Ok(());
        }

        if stream.header_packets.is_empty() {
            detect_codec(stream, &packet.data, diag);
            stream.header_packets.push(packet.data);
            if stream.expected_headers() == 1 {
                stream.headers_done = true;
            }
            return Ok(());
        }

        let index = stream.header_packets.len();
        match stream.codec {
            OggCodec::Vorbis if index == 1 => {
                if packet.data.len() >= 7 && &packet.data[..7] == b"\x03vorbis" {
                    stream.comment =
                        Some(VorbisComment::parse(&packet.data[7..], true, diag)?);
                    stream.comment_packet = Some(index);
                } else {
                    diag.critical(
                        "parsing Ogg stream",
                        "second Vorbis packet is not a comment header",
                    );
                }
            }
            OggCodec::Opus if index == 1 => {
                if packet.data.len() >= 8 && &packet.data[..8] == b"OpusTags" {
                    stream.comment =
                        Some(VorbisComment::parse(&packet.data[8..], false, diag)?);
                    stream.comment_packet = Some(index);
                } else {
                    diag.critical(
                        "parsing Ogg stream",
                        "second Opus packet is not an OpusTags header",
                    );
                }
            }
            OggCodec::Flac => {
                // Each header packet is a metadata block; bit 7 of the first
                // byte marks the last one.
                if let Some(&first) = packet.data.first() {
                    if first & 0x7F == 4 && packet.data.len() >= 4 {
                        stream.comment =
                            Some(VorbisComment::parse(&packet.data[4..], false, diag)?);
                        stream.comment_packet = Some(index);
                    }
                    if first & 0x80 != 0 {
                        stream.headers_done = true;
                    }
                }
            }
            _ => {}
        }
        stream.header_packets.push(packet.data);
        if stream.codec != OggCodec::Flac
            && stream.header_packets.len() >= stream.expected_headers()
        {
            stream.headers_done = true;
        }
        Ok(())
    }

    /// Stream a rewrite with updated comments into `writer`.
    pub fn rewrite<R: Read + Seek, W: Write + Seek>(
        &self,
        reader: &mut BinaryReader<R>,
        writer: &mut BinaryWriter<W>,
        progress: &ProgressFeedback,
        diag: &mut Diagnostics,
    ) -> Result<()> {
        let data_start = self
            .streams
            .iter()
            .filter_map(|s| s.first_data_offset)
            .min()
            .unwrap_or(reader.stream_len()?);

        // Header pages, one stream after another in BOS order.
        let mut sequences: Vec<(u32, u32)> = Vec::new();
        for stream in &self.streams {
            progress.check()?;
            progress.report("writing Ogg headers", 0.0);
            let mut sequence = 0u32;
            for (index, packet) in stream.header_packets.iter().enumerate() {
                let bytes;
                let packet: &[u8] = if Some(index) == stream.comment_packet {
                    bytes = build_comment_packet(stream, packet)?;
                    &bytes
                } else {
                    packet
                };
                let first_flags = if index == 0 { FLAG_BOS } else { 0 };
                write_packet_pages(
                    writer,
                    stream.serial,
                    &mut sequence,
                    first_flags,
                    0,
                    packet,
                )?;
            }
            sequences.push((stream.serial, sequence));
        }

        // Audio pages: verbatim payloads, renumbered sequences, fresh CRCs.
        reader.seek_to(data_start)?;
        let total = reader.stream_len()?;
        loop {
            progress.check()?;
            let Some(page) = OggPage::read(reader)? else { break };
            let payload = reader.read_bytes(page.payload_len() as usize)?;
            let sequence = match sequences.iter_mut().find(|(s, _)| *s == page.serial) {
                Some((_, sequence)) => {
                    let current = *sequence;
                    *sequence += 1;
                    current
                }
                None => {
                    diag.warn(
                        "writing Ogg stream",
                        format!("page for unknown stream {:#x} copied as-is", page.serial),
                    );
                    page.sequence
                }
            };
            let mut raw = Vec::with_capacity(page.total_len() as usize);
            raw.extend_from_slice(&page::CAPTURE_PATTERN);
            raw.push(0);
            raw.push(page.flags);
            raw.extend_from_slice(&page.granule_position.to_le_bytes());
            raw.extend_from_slice(&page.serial.to_le_bytes());
            raw.extend_from_slice(&sequence.to_le_bytes());
            raw.extend_from_slice(&[0u8; 4]);
            raw.push(page.segment_table.len() as u8);
            raw.extend_from_slice(&page.segment_table);
            raw.extend_from_slice(&payload);
            let crc = page::page_crc(&raw);
            raw[22..26].copy_from_slice(&crc.to_le_bytes());
            writer.write_bytes(&raw)?;

            if total > data_start {
                progress.report(
                    "copying Ogg audio pages",
                    (page.offset - data_start) as f64 / (total - data_start) as f64 * 100.0,
                );
            }
        }
        writer.flush()?;
        progress.report("copying Ogg audio pages", 100.0);
        Ok(())
    }
}

fn detect_codec(stream: &mut LogicalStream, packet: &[u8], diag: &mut Diagnostics) {
    if packet.len() >= 7 && &packet[..7] == b"\x01vorbis" {
        stream.codec = OggCodec::Vorbis;
        stream.track.media_type = MediaType::Audio;
        stream.track.format = MediaFormat::Vorbis;
        if packet.len() >= 28 {
            stream.track.channel_count = packet[11] as u16;
            stream.track.sample_rate =
                u32::from_le_bytes(packet[12..16].try_into().unwrap());
            let nominal = i32::from_le_bytes(packet[20..24].try_into().unwrap());
            if nominal > 0 {
                stream.track.bitrate = nominal as f64 / 1000.0;
            }
        }
    } else if packet.len() >= 8 && &packet[..8] == b"OpusHead" {
        stream.codec = OggCodec::Opus;
        stream.track.media_type = MediaType::Audio;
        stream.track.format = MediaFormat::Opus;
        if packet.len() >= 16 {
            stream.track.channel_count = packet[9] as u16;
            stream.pre_skip = u16::from_le_bytes(packet[10..12].try_into().unwrap());
            // Opus always decodes at 48 kHz; the original input rate is kept
            // as the extension rate.
            stream.track.sample_rate = 48000;
            stream.track.extension_sample_rate =
                u32::from_le_bytes(packet[12..16].try_into().unwrap());
        }
    } else if packet.len() >= 5 && &packet[..5] == b"\x7FFLAC" {
        stream.codec = OggCodec::Flac;
        stream.track.media_type = MediaType::Audio;
        stream.track.format = MediaFormat::Flac;
        // Mapping header: 0x7F "FLAC" major minor count(u16) "fLaC"
        // then the STREAMINFO block (header + payload).
        if packet.len() >= 13 + 4 + mediatag_flac::STREAM_INFO_LEN {
            match mediatag_flac::parse_stream_info(&packet[17..]) {
                Ok(info) => {
                    stream.track.sample_rate = info.sample_rate;
                    stream.track.channel_count = info.channel_count as u16;
                    stream.track.bit_depth = info.bits_per_sample as u16;
                    stream.track.sample_count = info.total_samples;
                }
                Err(e) => diag.warn(
                    "parsing Ogg stream",
                    format!("unreadable STREAMINFO in FLAC mapping header: {e}"),
                ),
            }
        }
    } else if packet.len() >= 7 && &packet[..7] == b"\x80theora" {
        stream.codec = OggCodec::Theora;
        stream.track.media_type = MediaType::Video;
        stream.track.format = MediaFormat::Theora;
    } else {
        stream.codec = OggCodec::Unknown;
        diag.info(
            "parsing Ogg stream",
            format!("unrecognised codec in stream {:#x}", stream.serial),
        );
    }
    stream.track.id = stream.serial as u64;
}

fn finish_track(stream: &mut LogicalStream) {
    let samples = match stream.codec {
        OggCodec::Opus => stream.last_granule.saturating_sub(stream.pre_skip as u64),
        OggCodec::Flac if stream.track.sample_count > 0 => stream.track.sample_count,
        _ => stream.last_granule,
    };
    if samples > 0 && stream.track.sample_rate > 0 {
        stream.track.duration =
            std::time::Duration::from_secs_f64(samples as f64 / stream.track.sample_rate as f64);
    }
    if stream.track.sample_count == 0 {
        stream.track.sample_count = samples;
    }
    stream.track.header_valid = true;
}

/// Rebuild the comment packet for a stream, preserving the codec framing.
fn build_comment_packet(stream: &LogicalStream, original: &[u8]) -> Result<Vec<u8>> {
    let comment = stream
        .comment
        .as_ref()
        .ok_or_else(|| Error::no_data("stream has no comment to write"))?;
    Ok(match stream.codec {
        OggCodec::Vorbis => {
            let mut out = b"\x03vorbis".to_vec();
            out.extend_from_slice(&comment.make(true));
            out
        }
        OggCodec::Opus => {
            let mut out = b"OpusTags".to_vec();
            out.extend_from_slice(&comment.make(false));
            out
        }
        OggCodec::Flac => {
            let payload = comment.make(false);
            if payload.len() > 0x00FF_FFFF {
                return Err(Error::invalid_data(
                    "VORBIS_COMMENT block exceeds the 24-bit length limit",
                ));
            }
            let last_flag = original.first().map_or(0, |b| b & 0x80);
            let mut out = Vec::with_capacity(4 + payload.len());
            out.push(last_flag | 4);
            out.extend_from_slice(&(payload.len() as u32).to_be_bytes()[1..]);
            out.extend_from_slice(&payload);
            out
        }
        _ => original.to_vec(),
    })
}

/// Emit one packet as a run of pages, splitting at the page payload limit.
fn write_packet_pages<W: Write + Seek>(
    writer: &mut BinaryWriter<W>,
    serial: u32,
    sequence: &mut u32,
    first_page_flags: u8,
    granule: u64,
    packet: &[u8],
) -> Result<()> {
    let mut offset = 0usize;
    let mut first = true;
    loop {
        let remaining = packet.len() - offset;
        let chunk = remaining.min(MAX_PAGE_PAYLOAD);
        // A page filled to the limit never terminates its packet; an exact
        // fit is closed by an empty continued page below.
        let open_ended = chunk == MAX_PAGE_PAYLOAD;
        let flags = if first { first_page_flags } else { FLAG_CONTINUED };
        // Pages that do not finish a packet carry no granule position.
        let page_granule = if open_ended { page::NO_GRANULE } else { granule };
        page::write_page(
            writer,
            flags,
            page_granule,
            serial,
            *sequence,
            &packet[offset..offset + chunk],
            open_ended,
        )?;
        *sequence += 1;
        offset += chunk;
        first = false;
        if offset >= packet.len() {
            if open_ended {
                // The packet ended exactly on the page limit: terminate it
                // with an empty continued page.
                page::write_page(writer, FLAG_CONTINUED, granule, serial, *sequence, &[], false)?;
                *sequence += 1;
            }
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{write_page, FLAG_EOS};
    use mediatag_core::{KnownField, Tag as _, TagValue};
    use std::io::Cursor;

    fn vorbis_id_packet() -> Vec<u8> {
        let mut packet = b"\x01vorbis".to_vec();
        packet.extend_from_slice(&0u32.to_le_bytes()); // version
        packet.push(2); // channels
        packet.extend_from_slice(&44100u32.to_le_bytes());
        packet.extend_from_slice(&0i32.to_le_bytes()); // max bitrate
        packet.extend_from_slice(&160_000i32.to_le_bytes()); // nominal
        packet.extend_from_slice(&0i32.to_le_bytes()); // min
        packet.push(0xB8); // blocksizes
        packet.push(0x01); // framing
        packet
    }

    fn vorbis_comment_packet(pairs: &[(&str, &str)]) -> Vec<u8> {
        let mut comment = VorbisComment::new("Xiph.Org libVorbis");
        for (key, value) in pairs {
            comment.push_field(mediatag_core::TagField::new(
                mediatag_core::FieldId::key(*key),
                TagValue::text(*value),
            ));
        }
        let mut packet = b"\x03vorbis".to_vec();
        packet.extend_from_slice(&comment.make(true));
        packet
    }

    fn setup_packet() -> Vec<u8> {
        let mut packet = b"\x05vorbis".to_vec();
        packet.extend_from_slice(&[0u8; 16]);
        packet
    }

    fn build_ogg_vorbis(pairs: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        write_page(&mut writer, FLAG_BOS, 0, 0xCAFE, 0, &vorbis_id_packet(), false).unwrap();
        // Comment and setup share one page in typical encoder output; here
        // they get separate pages, which is equally valid.
        write_page(&mut writer, 0, 0, 0xCAFE, 1, &vorbis_comment_packet(pairs), false).unwrap();
        write_page(&mut writer, 0, 0, 0xCAFE, 2, &setup_packet(), false).unwrap();
        write_page(&mut writer, 0, 44100, 0xCAFE, 3, &[0x11u8; 100], false).unwrap();
        write_page(&mut writer, FLAG_EOS, 88200, 0xCAFE, 4, &[0x22u8; 80], false).unwrap();
        writer.into_inner().into_inner()
    }

    fn parse(data: Vec<u8>) -> (OggContainer, Diagnostics) {
        let mut reader = BinaryReader::new(Cursor::new(data));
        let mut diag = Diagnostics::new();
        let container = OggContainer::parse(&mut reader, true, &mut diag).unwrap();
        (container, diag)
    }

    #[test]
    fn test_parse_vorbis() {
        let (container, diag) =
            parse(build_ogg_vorbis(&[("ARTIST", "Bach"), ("TITLE", "Air")]));
        assert_eq!(container.streams.len(), 1);
        let stream = &container.streams[0];
        assert_eq!(stream.codec, OggCodec::Vorbis);
        assert_eq!(stream.track.sample_rate, 44100);
        assert_eq!(stream.track.channel_count, 2);
        assert_eq!(stream.track.bitrate, 160.0);
        assert_eq!(stream.track.duration, std::time::Duration::from_secs(2));
        let comment = stream.comment.as_ref().unwrap();
        assert_eq!(
            comment.value(KnownField::Artist).and_then(TagValue::to_text),
            Some("Bach".into())
        );
        assert!(diag.is_empty(), "{:?}", diag.entries());
    }

    #[test]
    fn test_comment_roundtrip_preserves_vendor_order_and_granules() {
        let source = build_ogg_vorbis(&[("ARTIST", "Bach"), ("TITLE", "Air")]);
        let (mut container, _) = parse(source.clone());
        container.streams[0]
            .comment_mut()
            .set_value(KnownField::Comment, TagValue::text("remastered"));

        let mut reader = BinaryReader::new(Cursor::new(source));
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        let mut diag = Diagnostics::new();
        container
            .rewrite(&mut reader, &mut writer, &ProgressFeedback::new(), &mut diag)
            .unwrap();
        let output = writer.into_inner().into_inner();

        let (reparsed, rediag) = parse(output);
        let stream = &reparsed.streams[0];
        let comment = stream.comment.as_ref().unwrap();
        assert_eq!(comment.vendor, "Xiph.Org libVorbis");
        let keys: Vec<String> = comment.fields().iter().map(|f| f.id.to_string()).collect();
        assert_eq!(keys, vec!["ARTIST", "TITLE", "COMMENT"]);
        // Granule positions of the audio pages are untouched.
        assert_eq!(stream.track.duration, std::time::Duration::from_secs(2));
        // Every page passed its checksum (no warnings).
        assert!(rediag.is_empty(), "{:?}", rediag.entries());
    }

    #[test]
    fn test_opus_detection() {
        let mut head = b"OpusHead".to_vec();
        head.push(1); // version
        head.push(2); // channels
        head.extend_from_slice(&312u16.to_le_bytes()); // pre-skip
        head.extend_from_slice(&48000u32.to_le_bytes());
        head.extend_from_slice(&0u16.to_le_bytes());
        head.push(0);
        let mut tags = b"OpusTags".to_vec();
        tags.extend_from_slice(&VorbisComment::new("libopus").make(false));

        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        write_page(&mut writer, FLAG_BOS, 0, 7, 0, &head, false).unwrap();
        write_page(&mut writer, 0, 0, 7, 1, &tags, false).unwrap();
        write_page(&mut writer, FLAG_EOS, 48312, 7, 2, &[0u8; 50], false).unwrap();
        let (container, _) = parse(writer.into_inner().into_inner());
        let stream = &container.streams[0];
        assert_eq!(stream.codec, OggCodec::Opus);
        assert_eq!(stream.track.sample_rate, 48000);
        // Duration accounts for pre-skip: (48312 - 312) / 48000 = 1 s.
        assert_eq!(stream.track.duration, std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_large_comment_spans_pages() {
        let source = build_ogg_vorbis(&[]);
        let (mut container, _) = parse(source.clone());
        container.streams[0].comment_mut().set_value(
            KnownField::Comment,
            TagValue::text("x".repeat(70_000)),
        );
        let mut reader = BinaryReader::new(Cursor::new(source));
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        let mut diag = Diagnostics::new();
        container
            .rewrite(&mut reader, &mut writer, &ProgressFeedback::new(), &mut diag)
            .unwrap();
        let (reparsed, rediag) = parse(writer.into_inner().into_inner());
        let comment = reparsed.streams[0].comment.as_ref().unwrap();
        assert_eq!(
            comment
                .value(KnownField::Comment)
                .and_then(TagValue::to_text)
                .map(|s| s.len()),
            Some(70_000)
        );
        assert!(rediag.is_empty(), "{:?}", rediag.entries());
    }
}
