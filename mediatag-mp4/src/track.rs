//! MP4 track parsing: the `trak/mdia/minf/stbl` chain.

use crate::atoms::{ids, AtomIter};
use mediatag_core::track::Dimensions;
use mediatag_core::{Diagnostics, Error, MediaFormat, MediaType, Result, TrackInfo};
use std::time::Duration;

/// Parse one `trak` payload.
pub fn parse_trak(
    data: &[u8],
    start_offset: u64,
    movie_timescale: u32,
    diag: &mut Diagnostics,
) -> Result<TrackInfo> {
    let mut track = TrackInfo::new();
    track.start_offset = start_offset;
    let _ = movie_timescale;

    for child in AtomIter::new(data) {
        let (fourcc, payload) = child?;
        match fourcc {
            ids::TKHD => parse_tkhd(payload, &mut track)?,
            ids::MDIA => parse_mdia(payload, &mut track, diag)?,
            _ => {}
        }
    }
    track.header_valid = true;
    Ok(track)
}

/// Track ids referenced by a `tref/chap` box: the chapter text tracks of
/// this track, if any.
pub fn chapter_references(trak: &[u8]) -> Result<Vec<u32>> {
    let mut referenced = Vec::new();
    for child in AtomIter::new(trak) {
        let (fourcc, payload) = child?;
        if fourcc != ids::TREF {
            continue;
        }
        for reference in AtomIter::new(payload) {
            let (fourcc, payload) = reference?;
            if fourcc == ids::CHAP {
                for chunk in payload.chunks_exact(4) {
                    referenced.push(u32::from_be_bytes(chunk.try_into().unwrap()));
                }
            }
        }
    }
    Ok(referenced)
}

fn parse_tkhd(data: &[u8], track: &mut TrackInfo) -> Result<()> {
    if data.len() < 4 {
        return Err(Error::invalid_data("tkhd too short"));
    }
    let version = data[0];
    let flags = u32::from_be_bytes([0, data[1], data[2], data[3]]);
    track.enabled = flags & 0x1 != 0;
    let (id_offset, rest_offset) = if version == 1 {
        (4 + 16, 4 + 16 + 4 + 4 + 8)
    } else {
        (4 + 8, 4 + 8 + 4 + 4 + 4)
    };
    if data.len() < rest_offset + 52 + 8 {
        return Err(Error::invalid_data("tkhd too short for its version"));
    }
    track.id = u32::from_be_bytes(data[id_offset..id_offset + 4].try_into().unwrap()) as u64;
    // layer, alternate group, volume, reserved, matrix: 52 bytes.
    let dims = rest_offset + 52;
    let width = u32::from_be_bytes(data[dims..dims + 4].try_into().unwrap());
    let height = u32::from_be_bytes(data[dims + 4..dims + 8].try_into().unwrap());
    // 16.16 fixed point.
    track.display_dimensions = Dimensions {
        width: width >> 16,
        height: height >> 16,
    };
    Ok(())
}

fn parse_mdia(data: &[u8], track: &mut TrackInfo, diag: &mut Diagnostics) -> Result<()> {
    for child in AtomIter::new(data) {
        let (fourcc, payload) = child?;
        match fourcc {
            ids::MDHD => parse_mdhd(payload, track)?,
            ids::HDLR => parse_hdlr(payload, track)?,
            ids::MINF => {
                for grandchild in AtomIter::new(payload) {
                    let (fourcc, payload) = grandchild?;
                    if fourcc == ids::STBL {
                        parse_stbl(payload, track, diag)?;
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_mdhd(data: &[u8], track: &mut TrackInfo) -> Result<()> {
    if data.len() < 4 {
        return Err(Error::invalid_data("mdhd too short"));
    }
    let version = data[0];
    let (timescale, duration, lang_offset) = if version == 1 {
        if data.len() < 4 + 8 + 8 + 4 + 8 + 2 {
            return Err(Error::invalid_data("mdhd v1 too short"));
        }
        (
            u32::from_be_bytes(data[20..24].try_into().unwrap()),
            u64::from_be_bytes(data[24..32].try_into().unwrap()),
            32,
        )
    } else {
        if data.len() < 4 + 4 + 4 + 4 + 4 + 2 {
            return Err(Error::invalid_data("mdhd v0 too short"));
        }
        (
            u32::from_be_bytes(data[12..16].try_into().unwrap()),
            u32::from_be_bytes(data[16..20].try_into().unwrap()) as u64,
            20,
        )
    };
    track.timescale = timescale as u64;
    if timescale > 0 {
        track.duration = Duration::from_secs_f64(duration as f64 / timescale as f64);
    }
    // Language: three 5-bit values, each offset by 0x60.
    let packed = u16::from_be_bytes(data[lang_offset..lang_offset + 2].try_into().unwrap());
    if packed != 0 && packed != 0x7FFF {
        let code: String = [
            ((packed >> 10) & 0x1F) as u8 + 0x60,
            ((packed >> 5) & 0x1F) as u8 + 0x60,
            (packed & 0x1F) as u8 + 0x60,
        ]
        .iter()
        .map(|&b| b as char)
        .collect();
        if code.chars().all(|c| c.is_ascii_lowercase()) {
            track.language = code;
        }
    }
    Ok(())
}

fn parse_hdlr(data: &[u8], track: &mut TrackInfo) -> Result<()> {
    if data.len() < 12 {
        return Err(Error::invalid_data("hdlr too short"));
    }
    let handler: [u8; 4] = data[8..12].try_into().unwrap();
    track.media_type = match &handler {
        b"soun" => MediaType::Audio,
        b"vide" => MediaType::Video,
        b"text" | b"sbtl" | b"subt" => MediaType::Text,
        b"hint" => MediaType::Hint,
        b"meta" => MediaType::Meta,
        _ => MediaType::Unknown,
    };
    Ok(())
}

fn parse_stbl(data: &[u8], track: &mut TrackInfo, diag: &mut Diagnostics) -> Result<()> {
    for child in AtomIter::new(data) {
        let (fourcc, payload) = child?;
        match fourcc {
            ids::STSD => parse_stsd(payload, track, diag)?,
            ids::STSZ => {
                if payload.len() >= 12 {
                    track.sample_count =
                        u32::from_be_bytes(payload[8..12].try_into().unwrap()) as u64;
                }
            }
            ids::STTS => {
                if track.sample_count == 0 && payload.len() >= 8 {
                    // Sum sample counts when stsz was absent.
                    let entries = u32::from_be_bytes(payload[4..8].try_into().unwrap()) as usize;
                    let mut total = 0u64;
                    for i in 0..entries {
                        let offset = 8 + i * 8;
                        if offset + 8 > payload.len() {
                            break;
                        }
                        total += u32::from_be_bytes(
                            payload[offset..offset + 4].try_into().unwrap(),
                        ) as u64;
                    }
                    track.sample_count = total;
                }
            }
            _ => {}
        }
    }
    if track.media_type == MediaType::Video
        && track.sample_count > 0
        && !track.duration.is_zero()
    {
        track.fps = track.sample_count as f64 / track.duration.as_secs_f64();
    }
    Ok(())
}

fn parse_stsd(data: &[u8], track: &mut TrackInfo, diag: &mut Diagnostics) -> Result<()> {
    if data.len() < 8 {
        return Err(Error::invalid_data("stsd too short"));
    }
    let entry_count = u32::from_be_bytes(data[4..8].try_into().unwrap());
    if entry_count == 0 {
        return Ok(());
    }
    // Only the first sample entry determines the track format.
    let mut iter = AtomIter::new(&data[8..]);
    let Some(entry) = iter.next() else {
        return Err(Error::invalid_data("stsd without a sample entry"));
    };
    let (format, payload) = entry?;
    track.format_id = crate::atoms::display_fourcc(format);

    match &format {
        b"mp4a" => parse_audio_sample_entry(payload, track, diag)?,
        b"ac-3" => {
            parse_audio_sample_entry(payload, track, diag)?;
            track.format = MediaFormat::Ac3;
        }
        b"ec-3" => {
            parse_audio_sample_entry(payload, track, diag)?;
            track.format = MediaFormat::EAc3;
        }
        b"Opus" => {
            parse_audio_sample_entry(payload, track, diag)?;
            track.format = MediaFormat::Opus;
        }
        b"fLaC" => {
            parse_audio_sample_entry(payload, track, diag)?;
            track.format = MediaFormat::Flac;
        }
        b"alac" => {
            parse_audio_sample_entry(payload, track, diag)?;
            track.format = MediaFormat::Alac;
        }
        b"avc1" | b"avc3" => {
            parse_video_sample_entry(payload, track)?;
        }
        b"hev1" | b"hvc1" => {
            parse_video_sample_entry(payload, track)?;
            track.format = MediaFormat::Hevc;
        }
        b"vp09" => {
            parse_video_sample_entry(payload, track)?;
            track.format = MediaFormat::Vp9;
        }
        b"av01" => {
            parse_video_sample_entry(payload, track)?;
            track.format = MediaFormat::Av1;
        }
        b"tx3g" | b"text" => track.format = MediaFormat::Text,
        other => {
            diag.info(
                "parsing MP4 track",
                format!(
                    "unrecognised sample entry {}",
                    crate::atoms::display_fourcc(*other)
                ),
            );
            track.format = MediaFormat::Other(crate::atoms::display_fourcc(*other));
        }
    }
    Ok(())
}

/// Audio sample entry: 8 reserved bytes, version info, channel count, sample
/// size and rate, then codec-specific child atoms.
fn parse_audio_sample_entry(
    data: &[u8],
    track: &mut TrackInfo,
    diag: &mut Diagnostics,
) -> Result<()> {
    if data.len() < 28 {
        return Err(Error::invalid_data("audio sample entry too short"));
    }
    track.channel_count = u16::from_be_bytes(data[16..18].try_into().unwrap());
    track.bit_depth = u16::from_be_bytes(data[18..20].try_into().unwrap());
    // 16.16 fixed point sample rate.
    track.sample_rate = u32::from_be_bytes(data[24..28].try_into().unwrap()) >> 16;

    for child in AtomIter::new(&data[28..]) {
        let Ok((fourcc, payload)) = child else {
            // Some writers pad sample entries; stop at the first garbage.
            break;
        };
        if fourcc == ids::ESDS {
            match aac_profile_from_esds(payload) {
                Some(profile) => track.format = MediaFormat::Aac { profile },
                None => {
                    diag.warn(
                        "parsing MP4 track",
                        "esds atom without a decoder specific info descriptor",
                    );
                    track.format = MediaFormat::Aac { profile: 2 };
                }
            }
        }
    }
    if track.format == MediaFormat::Unknown {
        track.format = MediaFormat::Aac { profile: 2 };
    }
    Ok(())
}

/// Video sample entry: 16 predefined/reserved bytes, dimensions, resolution,
/// frame count, compressor name, depth, then codec configuration atoms.
fn parse_video_sample_entry(data: &[u8], track: &mut TrackInfo) -> Result<()> {
    if data.len() < 70 {
        return Err(Error::invalid_data("video sample entry too short"));
    }
    track.pixel_dimensions = Dimensions {
        width: u16::from_be_bytes(data[24..26].try_into().unwrap()) as u32,
        height: u16::from_be_bytes(data[26..28].try_into().unwrap()) as u32,
    };
    if track.display_dimensions == Dimensions::default() {
        track.display_dimensions = track.pixel_dimensions;
    }
    for child in AtomIter::new(&data[70..]) {
        let Ok((fourcc, payload)) = child else { break };
        if fourcc == ids::AVCC && payload.len() >= 4 {
            track.format = MediaFormat::Avc {
                profile: payload[1],
                level: payload[3],
            };
        }
    }
    Ok(())
}

/// Extract the audio object type from an `esds` payload.
///
/// The ES descriptor uses tag bytes followed by a variable-length size
/// (up to four 0x80-continued bytes); the decoder specific info (tag 0x05)
/// starts with the 5-bit audio object type.
fn aac_profile_from_esds(data: &[u8]) -> Option<u8> {
    // Skip version and flags.
    let mut pos = 4usize;
    while pos < data.len() {
        let tag = data[pos];
        pos += 1;
        let mut size = 0usize;
        for _ in 0..4 {
            let byte = *data.get(pos)?;
            pos += 1;
            size = (size << 7) | (byte & 0x7F) as usize;
            if byte & 0x80 == 0 {
                break;
            }
        }
        match tag {
            0x03 => {
                // ES descriptor: skip ES id and flags, then descend.
                pos = pos.checked_add(3)?;
            }
            0x04 => {
                // Decoder config descriptor header, then descend.
                pos = pos.checked_add(13)?;
            }
            0x05 => {
                let first = *data.get(pos)?;
                return Some(first >> 3);
            }
            _ => {
                pos = pos.checked_add(size)?;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::put_atom;

    fn build_mdhd() -> Vec<u8> {
        let mut mdhd = vec![0u8; 4]; // version 0
        mdhd.extend_from_slice(&0u32.to_be_bytes()); // creation
        mdhd.extend_from_slice(&0u32.to_be_bytes()); // modification
        mdhd.extend_from_slice(&44100u32.to_be_bytes()); // timescale
        mdhd.extend_from_slice(&441000u32.to_be_bytes()); // duration (10 s)
        // "eng" packed: e=5, n=14, g=7.
        let packed: u16 = (5 << 10) | (14 << 5) | 7;
        mdhd.extend_from_slice(&packed.to_be_bytes());
        mdhd.extend_from_slice(&0u16.to_be_bytes());
        mdhd
    }

    fn build_audio_stsd() -> Vec<u8> {
        // mp4a sample entry.
        let mut entry = vec![0u8; 6]; // reserved
        entry.extend_from_slice(&1u16.to_be_bytes()); // data reference index
        entry.extend_from_slice(&[0u8; 8]); // version/revision/vendor
        entry.extend_from_slice(&2u16.to_be_bytes()); // channels
        entry.extend_from_slice(&16u16.to_be_bytes()); // sample size
        entry.extend_from_slice(&[0u8; 4]); // predefined/reserved
        entry.extend_from_slice(&(44100u32 << 16).to_be_bytes()); // rate 16.16

        // esds with audio object type 2 (LC).
        let mut esds = vec![0u8; 4];
        esds.extend_from_slice(&[0x05, 0x02, 0x12, 0x10]); // DSI: 0b00010_010...
        let mut esds_atom = Vec::new();
        put_atom(&mut esds_atom, ids::ESDS, &esds);
        entry.extend_from_slice(&esds_atom);

        let mut sample_entry = Vec::new();
        put_atom(&mut sample_entry, *b"mp4a", &entry);

        let mut stsd = vec![0u8; 4];
        stsd.extend_from_slice(&1u32.to_be_bytes());
        stsd.extend_from_slice(&sample_entry);
        stsd
    }

    fn build_trak() -> Vec<u8> {
        let mut tkhd = vec![0u8, 0, 0, 1]; // version 0, enabled
        tkhd.extend_from_slice(&[0u8; 8]); // times
        tkhd.extend_from_slice(&7u32.to_be_bytes()); // track id
        tkhd.extend_from_slice(&[0u8; 4 + 4]); // reserved + duration
        tkhd.extend_from_slice(&[0u8; 52]); // layer..matrix
        tkhd.extend_from_slice(&0u32.to_be_bytes()); // width
        tkhd.extend_from_slice(&0u32.to_be_bytes()); // height

        let mut hdlr = vec![0u8; 8];
        hdlr.extend_from_slice(b"soun");
        hdlr.extend_from_slice(&[0u8; 12]);
        hdlr.push(0);

        let mut stbl = Vec::new();
        put_atom(&mut stbl, ids::STSD, &build_audio_stsd());
        let mut stsz = vec![0u8; 4];
        stsz.extend_from_slice(&0u32.to_be_bytes());
        stsz.extend_from_slice(&430u32.to_be_bytes());
        put_atom(&mut stbl, ids::STSZ, &stsz);

        let mut minf = Vec::new();
        put_atom(&mut minf, ids::STBL, &stbl);

        let mut mdia = Vec::new();
        put_atom(&mut mdia, ids::MDHD, &build_mdhd());
        put_atom(&mut mdia, ids::HDLR, &hdlr);
        put_atom(&mut mdia, ids::MINF, &minf);

        let mut trak = Vec::new();
        put_atom(&mut trak, ids::TKHD, &tkhd);
        put_atom(&mut trak, ids::MDIA, &mdia);
        trak
    }

    #[test]
    fn test_parse_audio_trak() {
        let trak = build_trak();
        let mut diag = Diagnostics::new();
        let track = parse_trak(&trak, 0, 1000, &mut diag).unwrap();
        assert_eq!(track.id, 7);
        assert_eq!(track.media_type, MediaType::Audio);
        assert_eq!(track.format, MediaFormat::Aac { profile: 2 });
        assert_eq!(track.sample_rate, 44100);
        assert_eq!(track.channel_count, 2);
        assert_eq!(track.bit_depth, 16);
        assert_eq!(track.language, "eng");
        assert_eq!(track.timescale, 44100);
        assert_eq!(track.duration, Duration::from_secs(10));
        assert_eq!(track.sample_count, 430);
        assert!(track.enabled);
        assert!(diag.is_empty(), "{:?}", diag.entries());
    }

    #[test]
    fn test_chapter_references() {
        let mut chap = Vec::new();
        chap.extend_from_slice(&3u32.to_be_bytes());
        chap.extend_from_slice(&5u32.to_be_bytes());
        let mut tref = Vec::new();
        put_atom(&mut tref, ids::CHAP, &chap);
        let mut trak = build_trak();
        put_atom(&mut trak, ids::TREF, &tref);
        assert_eq!(chapter_references(&trak).unwrap(), vec![3, 5]);
        assert!(chapter_references(&build_trak()).unwrap().is_empty());
    }

    #[test]
    fn test_esds_object_type() {
        let mut esds = vec![0u8; 4];
        // Full chain: ES descriptor -> decoder config -> DSI with AOT 5 (SBR).
        esds.extend_from_slice(&[0x03, 0x19, 0x00, 0x01, 0x00]);
        esds.extend_from_slice(&[0x04, 0x11]);
        esds.extend_from_slice(&[0x40, 0x15, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        esds.extend_from_slice(&[0x05, 0x02, 0x2B, 0x10]); // 0b00101_...
        assert_eq!(aac_profile_from_esds(&esds), Some(5));
    }
}
