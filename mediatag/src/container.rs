//! The strongly-typed sum over the supported container kinds.

use crate::mpeg::MpegAudioFile;
use mediatag_codecs::{AdtsHeader, IvfHeader};
use mediatag_core::{ContainerFormat, Tag, TrackInfo};
use mediatag_flac::FlacStream;
use mediatag_mkv::{AttachedFile, EditionEntry, MatroskaContainer};
use mediatag_mp4::Mp4Container;
use mediatag_ogg::OggContainer;
use mediatag_riff::WavContainer;

/// A parsed container of any supported kind.
///
/// Keeping this an enum (rather than boxed trait objects) keeps the
/// traversal monomorphic and lets callers reach the format-specific
/// surfaces when the uniform one is not enough.
#[derive(Debug)]
pub enum KnownContainer {
    /// MP4/ISO-BMFF.
    Mp4(Mp4Container),
    /// Matroska or WebM.
    Matroska(MatroskaContainer),
    /// Ogg (Vorbis, Opus, FLAC mapping, Theora).
    Ogg(OggContainer),
    /// Native FLAC.
    Flac(FlacStream),
    /// RIFF/WAVE.
    Wav(WavContainer),
    /// MPEG audio with ID3 tags.
    MpegAudio(MpegAudioFile),
    /// Raw ADTS AAC; read-only.
    Adts {
        /// First frame header.
        header: AdtsHeader,
        /// Derived track information.
        track: TrackInfo,
    },
    /// IVF-wrapped video; read-only.
    Ivf {
        /// File header.
        header: IvfHeader,
        /// Derived track information.
        track: TrackInfo,
    },
}

impl KnownContainer {
    /// The detected container format.
    pub fn format(&self) -> ContainerFormat {
        match self {
            KnownContainer::Mp4(_) => ContainerFormat::Mp4,
            KnownContainer::Matroska(c) => {
                if c.doc_info.doc_type == "webm" {
                    ContainerFormat::WebM
                } else {
                    ContainerFormat::Matroska
                }
            }
            KnownContainer::Ogg(_) => ContainerFormat::Ogg,
            KnownContainer::Flac(_) => ContainerFormat::Flac,
            KnownContainer::Wav(_) => ContainerFormat::Wav,
            KnownContainer::MpegAudio(_) => ContainerFormat::MpegAudio,
            KnownContainer::Adts { .. } => ContainerFormat::Adts,
            KnownContainer::Ivf { .. } => ContainerFormat::Ivf,
        }
    }

    /// All tracks of the container.
    pub fn tracks(&self) -> Vec<&TrackInfo> {
        match self {
            KnownContainer::Mp4(c) => c.tracks.iter().collect(),
            KnownContainer::Matroska(c) => c.tracks.iter().collect(),
            KnownContainer::Ogg(c) => c.streams.iter().map(|s| &s.track).collect(),
            KnownContainer::Flac(_) => Vec::new(),
            KnownContainer::Wav(c) => vec![&c.track],
            KnownContainer::MpegAudio(c) => vec![&c.track],
            KnownContainer::Adts { track, .. } | KnownContainer::Ivf { track, .. } => {
                vec![track]
            }
        }
    }

    /// All tags of the container as uniform trait objects.
    pub fn tags(&self) -> Vec<&dyn Tag> {
        let mut tags: Vec<&dyn Tag> = Vec::new();
        match self {
            KnownContainer::Mp4(c) => {
                if let Some(tag) = &c.tag {
                    tags.push(tag);
                }
            }
            KnownContainer::Matroska(c) => {
                for tag in &c.tags {
                    tags.push(tag);
                }
            }
            KnownContainer::Ogg(c) => {
                for stream in &c.streams {
                    if let Some(comment) = &stream.comment {
                        tags.push(comment);
                    }
                }
            }
            KnownContainer::Flac(c) => {
                if let Some(comment) = &c.comment {
                    tags.push(comment);
                }
            }
            KnownContainer::Wav(c) => {
                if let Some(tag) = &c.tag {
                    tags.push(tag);
                }
            }
            KnownContainer::MpegAudio(c) => {
                if let Some(tag) = &c.id3v2 {
                    tags.push(tag);
                }
                if let Some(tag) = &c.id3v1 {
                    tags.push(tag);
                }
            }
            KnownContainer::Adts { .. } | KnownContainer::Ivf { .. } => {}
        }
        tags
    }

    /// Chapter editions. Only Matroska carries a chapter structure; other
    /// formats yield an empty slice.
    pub fn chapters(&self) -> &[EditionEntry] {
        match self {
            KnownContainer::Matroska(c) => &c.editions,
            _ => &[],
        }
    }

    /// Attached files (Matroska only).
    pub fn attachments(&self) -> &[AttachedFile] {
        match self {
            KnownContainer::Matroska(c) => &c.attachments,
            _ => &[],
        }
    }

    /// Whether the container kind supports writing tags at all.
    pub fn supports_writing(&self) -> bool {
        !matches!(
            self,
            KnownContainer::Adts { .. } | KnownContainer::Ivf { .. }
        )
    }
}
