//! `MediaFileInfo`: open a file, identify its container, parse tags and
//! tracks, mutate fields, apply changes.
//!
//! Applying changes prefers an in-place update when the staged edits fit the
//! existing metadata region; otherwise the container is streamed into a
//! sibling temporary file which atomically replaces the original. On failure
//! (including cancellation) the temporary is deleted and the original file
//! is untouched.

use crate::container::KnownContainer;
use crate::mpeg::MpegAudioFile;
use crate::probe;
use mediatag_codecs::{AdtsHeader, IvfHeader, MpegAudioFrame};
use mediatag_core::io::{BinaryReader, BinaryWriter};
use mediatag_core::{
    ContainerFormat, Diagnostics, Error, KnownField, MediaFormat, MediaType, ProgressFeedback,
    Result, Tag, TagValue, TrackInfo,
};
use mediatag_flac::FlacStream;
use mediatag_id3::synthesize_v1;
use mediatag_mkv::MatroskaContainer;
use mediatag_mp4::{Mp4Container, Mp4WriteOptions};
use mediatag_ogg::OggContainer;
use mediatag_riff::WavContainer;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Write behaviour configuration.
#[derive(Debug, Clone, Copy)]
pub struct WriteConfig {
    /// Padding placed after a rewritten tag region for future in-place edits.
    pub preferred_padding: u32,
    /// Skip the in-place fast path and always rewrite the whole file.
    pub force_full_rewrite: bool,
    /// Move MP4 `moov` in front of `mdat` on rewrite ("fast start").
    pub relocate_moov: bool,
    /// Regenerate an existing ID3v1 trailer from the ID3v2 fields on save.
    pub sync_id3v1: bool,
    /// Verify Ogg page checksums while parsing (reported as diagnostics).
    pub verify_ogg_checksums: bool,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            preferred_padding: 1024,
            force_full_rewrite: false,
            relocate_moov: false,
            sync_id3v1: true,
            verify_ogg_checksums: false,
        }
    }
}

/// A media file with its parsed container state.
#[derive(Debug)]
pub struct MediaFileInfo {
    path: PathBuf,
    format: ContainerFormat,
    container: Option<KnownContainer>,
    config: WriteConfig,
}

impl MediaFileInfo {
    /// Open a file and identify its container by magic bytes. Nothing is
    /// parsed yet; call [`MediaFileInfo::parse_everything`].
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut reader = BinaryReader::new(BufReader::new(File::open(&path)?));
        let format = probe::detect_format(&mut reader)?;
        tracing::debug!(path = %path.display(), %format, "identified container");
        Ok(Self {
            path,
            format,
            container: None,
            config: WriteConfig::default(),
        })
    }

    /// Adjust write behaviour.
    pub fn with_config(mut self, config: WriteConfig) -> Self {
        self.config = config;
        self
    }

    /// The detected container format.
    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    /// The file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse tracks, tags, chapters and attachments. Returns the collected
    /// diagnostics; recoverable problems do not fail the call.
    pub fn parse_everything(&mut self) -> Result<Diagnostics> {
        let mut diag = Diagnostics::new();
        let mut reader = BinaryReader::new(BufReader::new(File::open(&self.path)?));
        let container = match self.format {
            ContainerFormat::Mp4 => {
                KnownContainer::Mp4(Mp4Container::parse(&mut reader, &mut diag)?)
            }
            ContainerFormat::Matroska | ContainerFormat::WebM => {
                let parsed = MatroskaContainer::parse(&mut reader, &mut diag)
                    .map_err(mediatag_core::Error::from)?;
                KnownContainer::Matroska(parsed)
            }
            ContainerFormat::Ogg => KnownContainer::Ogg(OggContainer::parse(
                &mut reader,
                self.config.verify_ogg_checksums,
                &mut diag,
            )?),
            ContainerFormat::Flac => {
                KnownContainer::Flac(FlacStream::parse(&mut reader, &mut diag)?)
            }
            ContainerFormat::Wav => {
                KnownContainer::Wav(WavContainer::parse(&mut reader, &mut diag)?)
            }
            ContainerFormat::MpegAudio => {
                KnownContainer::MpegAudio(MpegAudioFile::parse(&mut reader, &mut diag)?)
            }
            ContainerFormat::Adts => {
                let len = 9.min(reader.stream_len()? as usize);
                let bytes = reader.read_bytes(len)?;
                let header = AdtsHeader::parse(&bytes)?;
                let track = TrackInfo {
                    media_type: MediaType::Audio,
                    format: MediaFormat::Aac {
                        profile: header.profile,
                    },
                    sample_rate: header.sample_rate(),
                    channel_count: header.channel_config as u16,
                    header_valid: true,
                    ..TrackInfo::new()
                };
                KnownContainer::Adts { header, track }
            }
            ContainerFormat::Ivf => {
                let bytes = reader.read_bytes(IvfHeader::LEN)?;
                let header = IvfHeader::parse(&bytes)?;
                let track = TrackInfo {
                    media_type: MediaType::Video,
                    format: match &header.fourcc {
                        b"AV01" => MediaFormat::Av1,
                        b"VP90" => MediaFormat::Vp9,
                        b"VP80" => MediaFormat::Vp8,
                        other => {
                            MediaFormat::Other(String::from_utf8_lossy(other).into_owned())
                        }
                    },
                    pixel_dimensions: mediatag_core::track::Dimensions {
                        width: header.width as u32,
                        height: header.height as u32,
                    },
                    fps: header.fps().unwrap_or(0.0),
                    sample_count: header.frame_count as u64,
                    header_valid: true,
                    ..TrackInfo::new()
                };
                KnownContainer::Ivf { header, track }
            }
            ContainerFormat::Unknown => {
                return Err(Error::unsupported("unrecognised container format"));
            }
            _ => {
                return Err(Error::unsupported("unrecognised container format"));
            }
        };
        self.container = Some(container);
        Ok(diag)
    }

    /// The parsed container, when [`MediaFileInfo::parse_everything`] ran.
    pub fn container(&self) -> Option<&KnownContainer> {
        self.container.as_ref()
    }

    /// Mutable access to the parsed container.
    pub fn container_mut(&mut self) -> Option<&mut KnownContainer> {
        self.container.as_mut()
    }

    /// All tracks.
    pub fn tracks(&self) -> Vec<&TrackInfo> {
        self.container.as_ref().map_or_else(Vec::new, |c| c.tracks())
    }

    /// All tags as uniform trait objects.
    pub fn tags(&self) -> Vec<&dyn Tag> {
        self.container.as_ref().map_or_else(Vec::new, |c| c.tags())
    }

    /// Chapter editions (Matroska only).
    pub fn chapters(&self) -> &[mediatag_mkv::EditionEntry] {
        self.container.as_ref().map_or(&[], |c| c.chapters())
    }

    /// Attached files (Matroska only).
    pub fn attachments(&self) -> &[mediatag_mkv::AttachedFile] {
        self.container.as_ref().map_or(&[], |c| c.attachments())
    }

    /// First value of a uniform field across the container's tags.
    pub fn value(&self, field: KnownField) -> Option<TagValue> {
        self.tags()
            .iter()
            .find_map(|tag| tag.value(field).cloned())
    }

    /// Set a uniform field on the container's primary tag, creating the tag
    /// when absent. Returns `false` when the format cannot represent the
    /// field (or nothing is parsed yet).
    pub fn set_value(&mut self, field: KnownField, value: TagValue) -> bool {
        let Some(container) = self.container.as_mut() else {
            return false;
        };
        match container {
            KnownContainer::Mp4(c) => c.tag_mut().set_value(field, value),
            KnownContainer::Matroska(c) => c
                .tag_for_target(&mediatag_core::TagTarget::file())
                .set_value(field, value),
            KnownContainer::Ogg(c) => match c.streams.first_mut() {
                Some(stream) => stream.comment_mut().set_value(field, value),
                None => false,
            },
            KnownContainer::Flac(c) => c.comment_mut().set_value(field, value),
            KnownContainer::Wav(c) => c.tag_mut().set_value(field, value),
            KnownContainer::MpegAudio(c) => c.id3v2_mut().set_value(field, value),
            KnownContainer::Adts { .. } | KnownContainer::Ivf { .. } => false,
        }
    }

    /// Apply all staged edits to the file.
    ///
    /// Prefers the in-place path; falls back to a temp-file rewrite with an
    /// atomic swap. Cancellation surfaces as [`Error::OperationAborted`]
    /// with the original file untouched.
    pub fn apply_changes(&mut self, progress: &ProgressFeedback) -> Result<Diagnostics> {
        let mut diag = Diagnostics::new();
        let Some(container) = self.container.as_mut() else {
            return Err(Error::no_data("nothing parsed; call parse_everything first"));
        };
        if !container.supports_writing() {
            return Err(Error::unsupported(format!(
                "{} files are read-only",
                container.format()
            )));
        }

        // Keep the ID3v1 trailer in sync with the edited ID3v2 fields.
        if self.config.sync_id3v1 {
            if let KnownContainer::MpegAudio(file) = &mut *container {
                if let (Some(v2), Some(_)) = (&file.id3v2, &file.id3v1) {
                    file.id3v1 = Some(synthesize_v1(v2));
                }
            }
        }

        if !self.config.force_full_rewrite {
            let applied = self.try_in_place(progress, &mut diag)?;
            if applied {
                self.reparse_after_write(&mut diag)?;
                return Ok(diag);
            }
        }

        self.full_rewrite(progress, &mut diag)?;
        self.reparse_after_write(&mut diag)?;
        Ok(diag)
    }

    fn try_in_place(
        &mut self,
        progress: &ProgressFeedback,
        diag: &mut Diagnostics,
    ) -> Result<bool> {
        let container = self.container.as_ref().expect("checked by caller");
        let open_rw = || -> Result<File> {
            Ok(OpenOptions::new().read(true).write(true).open(&self.path)?)
        };
        let applied = match container {
            KnownContainer::Mp4(c) => {
                let mut file = open_rw()?;
                c.try_apply_in_place(&mut file, progress, diag)?
            }
            KnownContainer::Matroska(c) => {
                let mut file = open_rw()?;
                c.try_apply_in_place(&mut file, progress, diag)
                    .map_err(mediatag_core::Error::from)?
            }
            KnownContainer::Flac(c) => {
                let mut file = open_rw()?;
                c.try_apply_in_place(&mut file, progress, diag)?
            }
            KnownContainer::MpegAudio(c) => {
                let mut file = open_rw()?;
                c.try_apply_in_place(&mut file, progress, diag)?
            }
            // Ogg and WAV always rewrite: their layout leaves no padding to
            // absorb size changes.
            _ => false,
        };
        Ok(applied)
    }

    fn full_rewrite(&mut self, progress: &ProgressFeedback, diag: &mut Diagnostics) -> Result<()> {
        let container = self.container.as_ref().expect("checked by caller");
        let temp_path = temp_path_for(&self.path);
        let result = (|| -> Result<()> {
            let mut reader = BinaryReader::new(BufReader::new(File::open(&self.path)?));
            let mut writer = BinaryWriter::new(BufWriter::new(File::create(&temp_path)?));
            match container {
                KnownContainer::Mp4(c) => {
                    let options = Mp4WriteOptions {
                        relocate_moov: self.config.relocate_moov,
                        preferred_padding: self.config.preferred_padding,
                    };
                    c.rewrite(&mut reader, &mut writer, options, progress, diag)?;
                }
                KnownContainer::Matroska(c) => {
                    c.rewrite(&mut reader, &mut writer, progress, diag)
                        .map_err(mediatag_core::Error::from)?;
                }
                KnownContainer::Ogg(c) => {
                    c.rewrite(&mut reader, &mut writer, progress, diag)?;
                }
                KnownContainer::Flac(c) => {
                    c.rewrite(
                        &mut reader,
                        &mut writer,
                        self.config.preferred_padding,
                        progress,
                        diag,
                    )?;
                }
                KnownContainer::Wav(c) => {
                    c.rewrite(&mut reader, &mut writer, progress, diag)?;
                }
                KnownContainer::MpegAudio(c) => {
                    c.rewrite(
                        &mut reader,
                        &mut writer,
                        self.config.preferred_padding,
                        progress,
                        diag,
                    )?;
                }
                KnownContainer::Adts { .. } | KnownContainer::Ivf { .. } => {
                    unreachable!("read-only formats rejected earlier")
                }
            }
            Ok(())
        })();

        match result {
            Ok(()) => {
                std::fs::rename(&temp_path, &self.path)?;
                diag.info(
                    "writing file",
                    format!("{} rewritten", self.path.display()),
                );
                Ok(())
            }
            Err(e) => {
                let _ = std::fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }

    fn reparse_after_write(&mut self, diag: &mut Diagnostics) -> Result<()> {
        // Offsets moved; the old element index is stale.
        self.container = None;
        let reparse = self.parse_everything()?;
        diag.merge(reparse);
        Ok(())
    }

    /// Technical details of the first audio frame of an MP3 file, when that
    /// is what was parsed.
    pub fn first_mpeg_frame(&self) -> Option<&MpegAudioFrame> {
        match self.container.as_ref()? {
            KnownContainer::MpegAudio(file) => file.first_frame.as_ref(),
            _ => None,
        }
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".mediatag.tmp");
    path.with_file_name(name)
}
