//! Container and media format descriptors.

use std::fmt;

/// Container format of a file, detected from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ContainerFormat {
    /// ISO Base Media File Format (MP4, M4A, M4V, MOV).
    Mp4,
    /// Matroska.
    Matroska,
    /// WebM (Matroska subset).
    WebM,
    /// Ogg physical stream.
    Ogg,
    /// Native FLAC stream.
    Flac,
    /// RIFF/WAVE.
    Wav,
    /// MPEG audio elementary stream, possibly with ID3 tags.
    MpegAudio,
    /// Raw ADTS AAC stream.
    Adts,
    /// IVF-wrapped AV1/VP8/VP9.
    Ivf,
    /// Unrecognised.
    Unknown,
}

impl ContainerFormat {
    /// Typical file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "m4a",
            Self::Matroska => "mkv",
            Self::WebM => "webm",
            Self::Ogg => "ogg",
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::MpegAudio => "mp3",
            Self::Adts => "aac",
            Self::Ivf => "ivf",
            Self::Unknown => "bin",
        }
    }

    /// MIME type.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::Matroska => "video/x-matroska",
            Self::WebM => "video/webm",
            Self::Ogg => "application/ogg",
            Self::Flac => "audio/flac",
            Self::Wav => "audio/wav",
            Self::MpegAudio => "audio/mpeg",
            Self::Adts => "audio/aac",
            Self::Ivf => "video/x-ivf",
            Self::Unknown => "application/octet-stream",
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mp4 => "MP4/ISO-BMFF",
            Self::Matroska => "Matroska",
            Self::WebM => "WebM",
            Self::Ogg => "Ogg",
            Self::Flac => "FLAC",
            Self::Wav => "RIFF/WAVE",
            Self::MpegAudio => "MPEG audio",
            Self::Adts => "ADTS",
            Self::Ivf => "IVF",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Kind of media a track carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MediaType {
    /// Audio samples.
    Audio,
    /// Video frames.
    Video,
    /// Subtitles / timed text.
    Text,
    /// Hint track.
    Hint,
    /// Metadata track.
    Meta,
    /// Unknown.
    #[default]
    Unknown,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Text => "text",
            Self::Hint => "hint",
            Self::Meta => "meta",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Codec family and variant of a track.
#[derive(Debug, Clone, PartialEq, Default)]
#[non_exhaustive]
pub enum MediaFormat {
    /// Not determined.
    #[default]
    Unknown,
    /// MPEG-1/2/2.5 audio with the given layer.
    MpegAudio {
        /// 1.0, 2.0 or 2.5.
        version: f64,
        /// 1, 2 or 3.
        layer: u8,
    },
    /// Advanced Audio Coding with an object-type profile.
    Aac {
        /// MPEG-4 audio object type (2 = LC).
        profile: u8,
    },
    /// Vorbis.
    Vorbis,
    /// Opus.
    Opus,
    /// FLAC.
    Flac,
    /// Apple Lossless.
    Alac,
    /// AC-3.
    Ac3,
    /// Enhanced AC-3.
    EAc3,
    /// Uncompressed PCM.
    Pcm {
        /// True for IEEE float samples.
        float: bool,
    },
    /// H.264/AVC.
    Avc {
        /// profile_idc.
        profile: u8,
        /// level_idc.
        level: u8,
    },
    /// H.265/HEVC.
    Hevc,
    /// VP8.
    Vp8,
    /// VP9.
    Vp9,
    /// AV1.
    Av1,
    /// Theora.
    Theora,
    /// Timed text / subtitles.
    Text,
    /// A codec identified only by its raw id string.
    Other(String),
}

impl MediaFormat {
    /// Human-readable codec name.
    pub fn name(&self) -> String {
        match self {
            Self::Unknown => "unknown".into(),
            Self::MpegAudio { version, layer } => {
                format!("MPEG-{version:.1} Layer {layer}")
            }
            Self::Aac { profile } => match profile {
                1 => "AAC Main Profile".into(),
                2 => "AAC Low Complexity Profile".into(),
                5 => "AAC HE (SBR)".into(),
                29 => "AAC HE v2 (SBR + PS)".into(),
                _ => "AAC".into(),
            },
            Self::Vorbis => "Vorbis".into(),
            Self::Opus => "Opus".into(),
            Self::Flac => "FLAC".into(),
            Self::Alac => "Apple Lossless".into(),
            Self::Ac3 => "AC-3".into(),
            Self::EAc3 => "E-AC-3".into(),
            Self::Pcm { float } => {
                if *float {
                    "PCM (IEEE float)".into()
                } else {
                    "PCM".into()
                }
            }
            Self::Avc { profile, level } => {
                let profile_name = match profile {
                    66 => "Baseline",
                    77 => "Main",
                    88 => "Extended",
                    100 => "High",
                    110 => "High 10",
                    122 => "High 4:2:2",
                    244 => "High 4:4:4",
                    _ => "Unknown Profile",
                };
                format!(
                    "H.264 {} Profile Level {}.{}",
                    profile_name,
                    level / 10,
                    level % 10
                )
            }
            Self::Hevc => "H.265/HEVC".into(),
            Self::Vp8 => "VP8".into(),
            Self::Vp9 => "VP9".into(),
            Self::Av1 => "AV1".into(),
            Self::Theora => "Theora".into(),
            Self::Text => "timed text".into(),
            Self::Other(id) => id.clone(),
        }
    }

    /// Short abbreviation.
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Self::Unknown => "?",
            Self::MpegAudio { layer: 3, .. } => "MP3",
            Self::MpegAudio { layer: 2, .. } => "MP2",
            Self::MpegAudio { .. } => "MP1",
            Self::Aac { .. } => "AAC",
            Self::Vorbis => "Vorbis",
            Self::Opus => "Opus",
            Self::Flac => "FLAC",
            Self::Alac => "ALAC",
            Self::Ac3 => "AC3",
            Self::EAc3 => "EAC3",
            Self::Pcm { .. } => "PCM",
            Self::Avc { .. } => "AVC",
            Self::Hevc => "HEVC",
            Self::Vp8 => "VP8",
            Self::Vp9 => "VP9",
            Self::Av1 => "AV1",
            Self::Theora => "Theora",
            Self::Text => "text",
            Self::Other(_) => "?",
        }
    }

    /// Whether the codec is lossless.
    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Flac | Self::Alac | Self::Pcm { .. })
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_names() {
        assert_eq!(ContainerFormat::Matroska.to_string(), "Matroska");
        assert_eq!(ContainerFormat::Flac.extension(), "flac");
        assert_eq!(ContainerFormat::MpegAudio.mime_type(), "audio/mpeg");
    }

    #[test]
    fn test_format_names() {
        let avc = MediaFormat::Avc {
            profile: 100,
            level: 41,
        };
        assert_eq!(avc.name(), "H.264 High Profile Level 4.1");
        let mp3 = MediaFormat::MpegAudio {
            version: 1.0,
            layer: 3,
        };
        assert_eq!(mp3.abbreviation(), "MP3");
        assert!(MediaFormat::Flac.is_lossless());
        assert!(!MediaFormat::Opus.is_lossless());
    }
}
