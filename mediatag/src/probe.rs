//! Container format detection from magic bytes.

use mediatag_core::io::BinaryReader;
use mediatag_core::{ContainerFormat, Result};
use std::io::{Read, Seek};

/// How many bytes the probe inspects.
pub const PROBE_LEN: usize = 16;

/// Detect the container format from the first bytes of a stream. The stream
/// position is restored afterwards.
pub fn detect_format<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<ContainerFormat> {
    let position = reader.position()?;
    let available = reader.stream_len()?.saturating_sub(position) as usize;
    let mut buffer = vec![0u8; PROBE_LEN.min(available)];
    reader.read_exact(&mut buffer)?;
    reader.seek_to(position)?;
    Ok(detect_from_bytes(&buffer))
}

/// Detect the container format from a byte prefix.
pub fn detect_from_bytes(buffer: &[u8]) -> ContainerFormat {
    if buffer.len() >= 8 && &buffer[4..8] == b"ftyp" {
        return ContainerFormat::Mp4;
    }
    if buffer.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        // The DocType decides Matroska vs WebM later; default to Matroska.
        return ContainerFormat::Matroska;
    }
    if buffer.starts_with(b"OggS") {
        return ContainerFormat::Ogg;
    }
    if buffer.starts_with(b"fLaC") {
        return ContainerFormat::Flac;
    }
    if buffer.len() >= 12 && buffer.starts_with(b"RIFF") && &buffer[8..12] == b"WAVE" {
        return ContainerFormat::Wav;
    }
    if buffer.starts_with(b"DKIF") {
        return ContainerFormat::Ivf;
    }
    if buffer.starts_with(b"ID3") {
        return ContainerFormat::MpegAudio;
    }
    if buffer.len() >= 2 && buffer[0] == 0xFF {
        // ADTS: sync FFFx with the layer bits zero; MPEG audio otherwise.
        if buffer[1] & 0xF6 == 0xF0 {
            return ContainerFormat::Adts;
        }
        if buffer[1] & 0xE0 == 0xE0 {
            return ContainerFormat::MpegAudio;
        }
    }
    ContainerFormat::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_detection() {
        assert_eq!(
            detect_from_bytes(b"\x00\x00\x00\x20ftypM4A \x00\x00\x00\x00"),
            ContainerFormat::Mp4
        );
        assert_eq!(
            detect_from_bytes(&[0x1A, 0x45, 0xDF, 0xA3, 0x01]),
            ContainerFormat::Matroska
        );
        assert_eq!(detect_from_bytes(b"OggS\x00\x02"), ContainerFormat::Ogg);
        assert_eq!(detect_from_bytes(b"fLaC\x00"), ContainerFormat::Flac);
        assert_eq!(
            detect_from_bytes(b"RIFF\x24\x00\x00\x00WAVEfmt "),
            ContainerFormat::Wav
        );
        assert_eq!(detect_from_bytes(b"ID3\x04\x00"), ContainerFormat::MpegAudio);
        assert_eq!(detect_from_bytes(&[0xFF, 0xFB, 0x90]), ContainerFormat::MpegAudio);
        assert_eq!(detect_from_bytes(&[0xFF, 0xF1, 0x50]), ContainerFormat::Adts);
        assert_eq!(detect_from_bytes(b"DKIF\x00\x00"), ContainerFormat::Ivf);
        assert_eq!(detect_from_bytes(b"random"), ContainerFormat::Unknown);
    }
}
