//! Matroska track entry parsing.

use crate::ebml::{self, ChildIter};
use crate::elements::*;
use crate::error::Result;
use mediatag_core::track::Dimensions;
use mediatag_core::{Diagnostics, MediaFormat, MediaType, TrackInfo};
use std::time::Duration;

/// Map a Matroska TrackType value onto the uniform media type.
fn media_type(raw: u64) -> MediaType {
    match raw {
        1 => MediaType::Video,
        2 => MediaType::Audio,
        3 => MediaType::Video, // complex (combined A/V)
        16 => MediaType::Meta, // logo
        17 => MediaType::Text, // subtitle
        18 => MediaType::Text, // buttons
        _ => MediaType::Unknown,
    }
}

/// Map a Matroska codec id string onto the uniform format descriptor.
pub fn media_format(codec_id: &str, codec_private: Option<&[u8]>) -> MediaFormat {
    match codec_id {
        "A_AAC" | "A_AAC/MPEG4/LC" | "A_AAC/MPEG4/LC/SBR" => MediaFormat::Aac { profile: 2 },
        "A_MPEG/L3" => MediaFormat::MpegAudio {
            version: 1.0,
            layer: 3,
        },
        "A_MPEG/L2" => MediaFormat::MpegAudio {
            version: 1.0,
            layer: 2,
        },
        "A_VORBIS" => MediaFormat::Vorbis,
        "A_OPUS" => MediaFormat::Opus,
        "A_FLAC" => MediaFormat::Flac,
        "A_AC3" => MediaFormat::Ac3,
        "A_EAC3" => MediaFormat::EAc3,
        "A_PCM/INT/LIT" | "A_PCM/INT/BIG" => MediaFormat::Pcm { float: false },
        "A_PCM/FLOAT/IEEE" => MediaFormat::Pcm { float: true },
        "V_MPEG4/ISO/AVC" => {
            // avcC layout: configuration version, profile, compat, level.
            match codec_private {
                Some(avcc) if avcc.len() >= 4 => MediaFormat::Avc {
                    profile: avcc[1],
                    level: avcc[3],
                },
                _ => MediaFormat::Avc {
                    profile: 0,
                    level: 0,
                },
            }
        }
        "V_MPEGH/ISO/HEVC" => MediaFormat::Hevc,
        "V_VP8" => MediaFormat::Vp8,
        "V_VP9" => MediaFormat::Vp9,
        "V_AV1" => MediaFormat::Av1,
        "V_THEORA" => MediaFormat::Theora,
        "S_TEXT/UTF8" | "S_TEXT/ASS" | "S_TEXT/SSA" | "S_TEXT/WEBVTT" => MediaFormat::Text,
        other => MediaFormat::Other(other.to_string()),
    }
}

/// Parse one TrackEntry payload into a [`TrackInfo`].
///
/// `timestamp_scale` (ns per unit) and the segment `duration` (in units) come
/// from the Info element and yield the playback duration; per-track bitrate
/// is not stored in Matroska and stays unset.
pub fn parse_track_entry(
    data: &[u8],
    start_offset: u64,
    timestamp_scale: u64,
    segment_duration: f64,
    diag: &mut Diagnostics,
) -> Result<TrackInfo> {
    let mut track = TrackInfo::new();
    track.start_offset = start_offset;
    track.timescale = timestamp_scale;
    let mut codec_id = String::new();
    let mut codec_private: Option<Vec<u8>> = None;
    let mut default_duration_ns = 0u64;

    for child in ChildIter::new(data) {
        let (id, payload) = child?;
        match id {
            TRACK_NUMBER => track.number = ebml::parse_uint(payload) as u32,
            TRACK_UID => track.id = ebml::parse_uint(payload),
            TRACK_TYPE => track.media_type = media_type(ebml::parse_uint(payload)),
            TRACK_NAME => track.name = ebml::parse_string(payload)?,
            TRACK_LANGUAGE => track.language = ebml::parse_string(payload)?,
            CODEC_ID => codec_id = ebml::parse_string(payload)?,
            CODEC_PRIVATE => codec_private = Some(payload.to_vec()),
            FLAG_ENABLED => track.enabled = ebml::parse_uint(payload) != 0,
            FLAG_DEFAULT => track.default = ebml::parse_uint(payload) != 0,
            FLAG_FORCED => track.forced = ebml::parse_uint(payload) != 0,
            FLAG_LACING => track.lacing = ebml::parse_uint(payload) != 0,
            DEFAULT_DURATION => default_duration_ns = ebml::parse_uint(payload),
            CONTENT_ENCODINGS => {
                track.encrypted = content_encodings_encrypted(payload)?;
            }
            VIDEO => parse_video(payload, &mut track)?,
            AUDIO => parse_audio(payload, &mut track)?,
            _ => {}
        }
    }

    if track.media_type == MediaType::Video && default_duration_ns > 0 {
        track.fps = 1_000_000_000.0 / default_duration_ns as f64;
    }
    if segment_duration > 0.0 {
        let ns = segment_duration * timestamp_scale as f64;
        track.duration = Duration::from_nanos(ns as u64);
    }
    if codec_id.is_empty() {
        diag.warn(
            "parsing Matroska track",
            format!("track {} has no CodecID", track.number),
        );
    } else {
        track.format = media_format(&codec_id, codec_private.as_deref());
        track.format_id = codec_id;
    }
    track.header_valid = true;
    Ok(track)
}

fn content_encodings_encrypted(data: &[u8]) -> Result<bool> {
    for encoding in ChildIter::new(data) {
        let (id, payload) = encoding?;
        if id == CONTENT_ENCODING {
            for child in ChildIter::new(payload) {
                let (id, _) = child?;
                if id == CONTENT_ENCRYPTION {
                    return Ok(true);
                }
            }
        }
    }
    Ok(false)
}

fn parse_video(data: &[u8], track: &mut TrackInfo) -> Result<()> {
    for child in ChildIter::new(data) {
        let (id, payload) = child?;
        match id {
            PIXEL_WIDTH => track.pixel_dimensions.width = ebml::parse_uint(payload) as u32,
            PIXEL_HEIGHT => track.pixel_dimensions.height = ebml::parse_uint(payload) as u32,
            DISPLAY_WIDTH => track.display_dimensions.width = ebml::parse_uint(payload) as u32,
            DISPLAY_HEIGHT => track.display_dimensions.height = ebml::parse_uint(payload) as u32,
            COLOUR_SPACE => track.color_space = ebml::parse_uint(payload) as u32,
            _ => {}
        }
    }
    if track.display_dimensions == Dimensions::default() {
        track.display_dimensions = track.pixel_dimensions;
    }
    Ok(())
}

fn parse_audio(data: &[u8], track: &mut TrackInfo) -> Result<()> {
    for child in ChildIter::new(data) {
        let (id, payload) = child?;
        match id {
            SAMPLING_FREQUENCY => track.sample_rate = ebml::parse_float(payload) as u32,
            OUTPUT_SAMPLING_FREQUENCY => {
                track.extension_sample_rate = ebml::parse_float(payload) as u32
            }
            CHANNELS => track.channel_count = ebml::parse_uint(payload) as u16,
            BIT_DEPTH => track.bit_depth = ebml::parse_uint(payload) as u16,
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_track_entry() -> Vec<u8> {
        let mut payload = Vec::new();
        ebml::put_uint(&mut payload, TRACK_NUMBER, 1);
        ebml::put_uint(&mut payload, TRACK_UID, 0xABCD);
        ebml::put_uint(&mut payload, TRACK_TYPE, 2);
        ebml::put_string(&mut payload, CODEC_ID, "A_OPUS");
        ebml::put_string(&mut payload, TRACK_LANGUAGE, "eng");
        let mut audio = Vec::new();
        ebml::put_float(&mut audio, SAMPLING_FREQUENCY, 48000.0);
        ebml::put_uint(&mut audio, CHANNELS, 2);
        ebml::put_element(&mut payload, AUDIO, &audio);
        payload
    }

    #[test]
    fn test_parse_audio_track() {
        let payload = build_track_entry();
        let mut diag = Diagnostics::new();
        let track = parse_track_entry(&payload, 0, 1_000_000, 2000.0, &mut diag).unwrap();
        assert_eq!(track.number, 1);
        assert_eq!(track.id, 0xABCD);
        assert_eq!(track.media_type, MediaType::Audio);
        assert_eq!(track.format, MediaFormat::Opus);
        assert_eq!(track.sample_rate, 48000);
        assert_eq!(track.channel_count, 2);
        assert_eq!(track.language, "eng");
        assert_eq!(track.duration, Duration::from_secs(2));
        assert!(track.header_valid);
        assert!(diag.is_empty());
    }

    #[test]
    fn test_video_display_defaults_to_pixel() {
        let mut payload = Vec::new();
        ebml::put_uint(&mut payload, TRACK_NUMBER, 1);
        ebml::put_uint(&mut payload, TRACK_TYPE, 1);
        ebml::put_string(&mut payload, CODEC_ID, "V_VP9");
        ebml::put_uint(&mut payload, DEFAULT_DURATION, 40_000_000);
        let mut video = Vec::new();
        ebml::put_uint(&mut video, PIXEL_WIDTH, 640);
        ebml::put_uint(&mut video, PIXEL_HEIGHT, 360);
        ebml::put_element(&mut payload, VIDEO, &video);

        let mut diag = Diagnostics::new();
        let track = parse_track_entry(&payload, 0, 1_000_000, 0.0, &mut diag).unwrap();
        assert_eq!(track.pixel_dimensions.width, 640);
        assert_eq!(track.display_dimensions.height, 360);
        assert_eq!(track.format, MediaFormat::Vp9);
        assert!((track.fps - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_avc_profile_from_codec_private() {
        let avcc = [1u8, 100, 0, 41, 0xFF];
        assert_eq!(
            media_format("V_MPEG4/ISO/AVC", Some(&avcc)),
            MediaFormat::Avc {
                profile: 100,
                level: 41
            }
        );
    }
}
