//! Uniform technical track information.
//!
//! Container parsers create a [`TrackInfo`] per stream and fill the subset of
//! attributes the format and media type provide.

use crate::format::{MediaFormat, MediaType};
use std::fmt;
use std::time::Duration;

/// Pixel or display dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Aspect ratio as a numerator/denominator pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AspectRatio {
    /// Numerator.
    pub numerator: u32,
    /// Denominator.
    pub denominator: u32,
}

impl AspectRatio {
    /// Whether the ratio is defined.
    pub fn is_valid(&self) -> bool {
        self.numerator != 0 && self.denominator != 0
    }
}

/// Technical information about one track.
///
/// Which attributes are populated depends on the media type and the
/// container; unset numeric attributes are zero, unset optionals are `None`.
#[derive(Debug, Clone, Default)]
pub struct TrackInfo {
    /// Track id as stored in the container (Matroska UID, MP4 track id).
    pub id: u64,
    /// One-based track number.
    pub number: u32,
    /// Track name.
    pub name: String,
    /// ISO-639-2 language code.
    pub language: String,
    /// Media type.
    pub media_type: MediaType,
    /// Codec descriptor.
    pub format: MediaFormat,
    /// Raw codec id string as stored in the container, if textual.
    pub format_id: String,
    /// Absolute offset where the track's codec data begins.
    pub start_offset: u64,
    /// Playback duration.
    pub duration: Duration,
    /// Average bitrate in kbit/s.
    pub bitrate: f64,
    /// Maximum bitrate in kbit/s.
    pub max_bitrate: f64,
    /// Sampling frequency in Hz.
    pub sample_rate: u32,
    /// Extension sampling frequency (SBR) in Hz.
    pub extension_sample_rate: u32,
    /// Channel count.
    pub channel_count: u16,
    /// Bits per sample.
    pub bit_depth: u16,
    /// Frames per second for video.
    pub fps: f64,
    /// Ticks per second the container timestamps use.
    pub timescale: u64,
    /// Number of samples/frames.
    pub sample_count: u64,
    /// Coded picture dimensions.
    pub pixel_dimensions: Dimensions,
    /// Display dimensions after aspect-ratio correction.
    pub display_dimensions: Dimensions,
    /// Pixel aspect ratio.
    pub pixel_aspect_ratio: AspectRatio,
    /// Colour space identifier (container-specific numeric code).
    pub color_space: u32,
    /// Whether the track is enabled.
    pub enabled: bool,
    /// Whether the track is flagged as default.
    pub default: bool,
    /// Whether the track is flagged as forced.
    pub forced: bool,
    /// Whether the track uses lacing (Matroska).
    pub lacing: bool,
    /// Whether the content is encrypted.
    pub encrypted: bool,
    /// Whether the header has been parsed successfully.
    pub header_valid: bool,
}

impl TrackInfo {
    /// Create a track with container defaults.
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Short technical summary, e.g. `audio, AAC, 44100 Hz, 2 ch`.
    pub fn summary(&self) -> String {
        let mut parts = vec![self.media_type.to_string(), self.format.name()];
        match self.media_type {
            MediaType::Audio => {
                if self.sample_rate != 0 {
                    parts.push(format!("{} Hz", self.sample_rate));
                }
                if self.channel_count != 0 {
                    parts.push(format!("{} ch", self.channel_count));
                }
            }
            MediaType::Video => {
                if self.pixel_dimensions != Dimensions::default() {
                    parts.push(self.pixel_dimensions.to_string());
                }
                if self.fps != 0.0 {
                    parts.push(format!("{:.3} fps", self.fps));
                }
            }
            _ => {}
        }
        parts.join(", ")
    }
}

impl fmt::Display for TrackInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track {}: {}", self.number, self.summary())
    }
}
