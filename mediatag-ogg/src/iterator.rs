//! Packet reassembly across Ogg pages.
//!
//! Packets are laced into 255-byte segments and may continue across pages.
//! [`OggIterator`] yields completed packets in file order, keeping one
//! pending buffer per logical stream. The sequence is finite and
//! non-restartable; it stops cleanly at end of stream.

use crate::page::OggPage;
use mediatag_core::io::BinaryReader;
use mediatag_core::{Diagnostics, Result};
use std::collections::HashMap;
use std::io::{Read, Seek};

/// One reassembled packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OggPacket {
    /// Serial number of the logical stream.
    pub serial: u32,
    /// Packet bytes.
    pub data: Vec<u8>,
    /// Granule position of the page the packet completed on.
    pub granule_position: u64,
    /// Sequence number of the page the packet started on.
    pub page_sequence: u32,
    /// File offset of the page the packet started on.
    pub start_offset: u64,
    /// Whether the packet started on a begin-of-stream page.
    pub is_first: bool,
    /// Whether the packet ended on an end-of-stream page's final segment.
    pub is_last: bool,
}

#[derive(Default)]
struct PendingPacket {
    data: Vec<u8>,
    start_sequence: u32,
    start_offset: u64,
    started_on_bos: bool,
}

/// Stateful packet iterator over a physical Ogg stream.
pub struct OggIterator {
    verify_checksums: bool,
    pending: HashMap<u32, PendingPacket>,
    queued: std::collections::VecDeque<OggPacket>,
    finished: bool,
}

impl OggIterator {
    /// Create an iterator; checksum verification is diagnostic-only.
    pub fn new(verify_checksums: bool) -> Self {
        Self {
            verify_checksums,
            pending: HashMap::new(),
            queued: std::collections::VecDeque::new(),
            finished: false,
        }
    }

    /// Next packet in file order, or `None` at end of stream.
    pub fn next_packet<R: Read + Seek>(
        &mut self,
        reader: &mut BinaryReader<R>,
        diag: &mut Diagnostics,
    ) -> Result<Option<OggPacket>> {
        loop {
            if let Some(packet) = self.queued.pop_front() {
                return Ok(Some(packet));
            }
            if self.finished {
                return Ok(None);
            }
            let Some(page) = OggPage::read(reader)? else {
                self.finished = true;
                // Unterminated packets at EOF are dropped with a warning.
                for (serial, pending) in self.pending.drain() {
                    if !pending.data.is_empty() {
                        diag.warn(
                            "reading Ogg stream",
                            format!(
                                "stream {serial:#x} ends with an unterminated packet of {} bytes",
                                pending.data.len()
                            ),
                        );
                    }
                }
                continue;
            };
            self.take_page(reader, &page, diag)?;
        }
    }

    fn take_page<R: Read + Seek>(
        &mut self,
        reader: &mut BinaryReader<R>,
        page: &OggPage,
        diag: &mut Diagnostics,
    ) -> Result<()> {
        if self.verify_checksums && !page.verify_checksum(reader)? {
            diag.warn(
                "reading Ogg stream",
                format!(
                    "page {} of stream {:#x} fails its checksum",
                    page.sequence, page.serial
                ),
            );
        }
        reader.seek_to(page.offset + page.header_len())?;

        let pending = self.pending.entry(page.serial).or_default();
        if pending.data.is_empty() {
            pending.start_sequence = page.sequence;
            pending.start_offset = page.offset;
            pending.started_on_bos = page.is_first();
        } else if !page.is_continuation() {
            diag.warn(
                "reading Ogg stream",
                format!(
                    "page {} of stream {:#x} drops an unterminated packet",
                    page.sequence, page.serial
                ),
            );
            pending.data.clear();
            pending.start_sequence = page.sequence;
            pending.start_offset = page.offset;
            pending.started_on_bos = page.is_first();
        }

        let segment_count = page.segment_table.len();
        for (index, &length) in page.segment_table.iter().enumerate() {
            let bytes = reader.read_bytes(length as usize)?;
            pending.data.extend_from_slice(&bytes);
            if length < 255 {
                let completed = std::mem::take(&mut pending.data);
                let is_last = page.is_last() && index == segment_count - 1;
                self.queued.push_back(OggPacket {
                    serial: page.serial,
                    data: completed,
                    granule_position: page.granule_position,
                    page_sequence: pending.start_sequence,
                    start_offset: pending.start_offset,
                    is_first: pending.started_on_bos,
                    is_last,
                });
                pending.start_sequence = page.sequence;
                pending.start_offset = page.offset;
                pending.started_on_bos = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{write_page, FLAG_BOS, FLAG_CONTINUED, FLAG_EOS};
    use mediatag_core::io::BinaryWriter;
    use std::io::Cursor;

    fn drain(data: Vec<u8>) -> (Vec<OggPacket>, Diagnostics) {
        let mut reader = BinaryReader::new(Cursor::new(data));
        let mut diag = Diagnostics::new();
        let mut iter = OggIterator::new(true);
        let mut packets = Vec::new();
        while let Some(packet) = iter.next_packet(&mut reader, &mut diag).unwrap() {
            packets.push(packet);
        }
        (packets, diag)
    }

    #[test]
    fn test_single_page_two_packets() {
        // Hand-build one page holding "ab" and "cde".
        let mut page = Vec::new();
        page.extend_from_slice(b"OggS\x00");
        page.push(FLAG_BOS | FLAG_EOS);
        page.extend_from_slice(&5u64.to_le_bytes());
        page.extend_from_slice(&9u32.to_le_bytes());
        page.extend_from_slice(&0u32.to_le_bytes());
        page.extend_from_slice(&[0u8; 4]);
        page.push(2);
        page.push(2);
        page.push(3);
        page.extend_from_slice(b"abcde");
        let crc = crate::page::page_crc(&page);
        page[22..26].copy_from_slice(&crc.to_le_bytes());

        let (packets, diag) = drain(page);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].data, b"ab");
        assert!(packets[0].is_first);
        assert!(!packets[0].is_last);
        assert_eq!(packets[1].data, b"cde");
        assert!(packets[1].is_last);
        assert_eq!(packets[1].granule_position, 5);
        assert!(diag.is_empty(), "{:?}", diag.entries());
    }

    #[test]
    fn test_packet_spanning_pages() {
        let big = vec![0x7Eu8; 255];
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        // First page: one open-ended 255 segment.
        write_page(&mut writer, FLAG_BOS, u64::MAX, 3, 0, &big, true).unwrap();
        // Second page: the 10-byte tail.
        write_page(&mut writer, FLAG_CONTINUED | FLAG_EOS, 42, 3, 1, &[1u8; 10], false).unwrap();
        let bytes = writer.into_inner().into_inner();

        let (packets, diag) = drain(bytes);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].data.len(), 265);
        assert_eq!(packets[0].granule_position, 42);
        assert_eq!(packets[0].page_sequence, 0);
        assert!(packets[0].is_first);
        assert!(packets[0].is_last);
        assert!(diag.is_empty(), "{:?}", diag.entries());
    }

    #[test]
    fn test_interleaved_streams() {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        write_page(&mut writer, FLAG_BOS, 0, 1, 0, b"one", false).unwrap();
        write_page(&mut writer, FLAG_BOS, 0, 2, 0, b"two", false).unwrap();
        write_page(&mut writer, FLAG_EOS, 1, 1, 1, b"three", false).unwrap();
        write_page(&mut writer, FLAG_EOS, 1, 2, 1, b"four", false).unwrap();
        let bytes = writer.into_inner().into_inner();

        let (packets, _) = drain(bytes);
        let order: Vec<(u32, &[u8])> = packets
            .iter()
            .map(|p| (p.serial, p.data.as_slice()))
            .collect();
        assert_eq!(
            order,
            vec![
                (1, b"one".as_slice()),
                (2, b"two".as_slice()),
                (1, b"three".as_slice()),
                (2, b"four".as_slice())
            ]
        );
    }

    #[test]
    fn test_truncated_final_packet_warns() {
        let big = vec![0u8; 255];
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        write_page(&mut writer, FLAG_BOS, u64::MAX, 3, 0, &big, true).unwrap();
        let bytes = writer.into_inner().into_inner();
        let (packets, diag) = drain(bytes);
        assert!(packets.is_empty());
        assert!(diag.has_problems());
    }
}
