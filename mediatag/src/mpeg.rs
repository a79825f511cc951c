//! MPEG audio files: ID3v2 tags at the start, audio frames, an optional
//! ID3v1 trailer.

use mediatag_codecs::MpegAudioFrame;
use mediatag_core::io::{BinaryReader, BinaryWriter};
use mediatag_core::{
    Diagnostics, MediaFormat, MediaType, ProgressFeedback, Result, TrackInfo,
};
use mediatag_id3::{Id3v1Tag, Id3v2Tag, ID3V1_LEN, ID3V1_MAGIC};
use std::io::{Read, Seek, Write};
use std::time::Duration;

/// How far into the stream the first frame sync is searched for.
const SYNC_SCAN_LIMIT: usize = 64 * 1024;

const COPY_BUF_LEN: usize = 64 * 1024;

/// An MP3 (or other MPEG audio) file with its ID3 tags.
#[derive(Debug, Default)]
pub struct MpegAudioFile {
    /// The leading ID3v2 tag, if any edits or an on-disk tag exist.
    pub id3v2: Option<Id3v2Tag>,
    /// The trailing ID3v1 tag.
    pub id3v1: Option<Id3v1Tag>,
    /// The audio track.
    pub track: TrackInfo,
    /// The first parsed frame, for callers that need the raw header fields.
    pub first_frame: Option<MpegAudioFrame>,

    audio_start: u64,
    audio_end: u64,
    id3v2_region: u64,
    had_id3v1: bool,
}

impl MpegAudioFile {
    /// Parse tags and the first audio frame.
    pub fn parse<R: Read + Seek>(
        reader: &mut BinaryReader<R>,
        diag: &mut Diagnostics,
    ) -> Result<Self> {
        let file_len = reader.stream_len()?;
        let mut file = MpegAudioFile::default();

        // Leading ID3v2 tags; broken writers sometimes stack several.
        let mut offset = 0u64;
        loop {
            reader.seek_to(offset)?;
            let header = reader.read_bytes(10.min((file_len - offset) as usize))?;
            let Some(tag_len) = Id3v2Tag::probe(&header) else {
                break;
            };
            reader.seek_to(offset)?;
            let tag_bytes = reader.read_bytes(tag_len.min(file_len - offset) as usize)?;
            match Id3v2Tag::parse(&tag_bytes, diag) {
                Ok(tag) => {
                    if file.id3v2.is_some() {
                        diag.warn(
                            "parsing MP3 file",
                            "multiple ID3v2 tags found; only the first is editable",
                        );
                    } else {
                        file.id3v2 = Some(tag);
                    }
                }
                Err(e) => diag.critical(
                    "parsing MP3 file",
                    format!("unreadable ID3v2 tag skipped: {e}"),
                ),
            }
            offset += tag_len;
            if offset >= file_len {
                break;
            }
        }
        // A truncated trailing tag must not push the audio span past EOF.
        file.id3v2_region = offset.min(file_len);
        file.audio_start = file.id3v2_region;

        // Trailing ID3v1.
        file.audio_end = file_len;
        if file_len >= file.audio_start + ID3V1_LEN as u64 {
            reader.seek_to(file_len - ID3V1_LEN as u64)?;
            let trailer = reader.read_bytes(ID3V1_LEN)?;
            if trailer[..3] == ID3V1_MAGIC {
                match Id3v1Tag::parse(&trailer) {
                    Ok(tag) => {
                        file.id3v1 = Some(tag);
                        file.had_id3v1 = true;
                        file.audio_end = file_len - ID3V1_LEN as u64;
                    }
                    Err(e) => diag.warn(
                        "parsing MP3 file",
                        format!("unreadable ID3v1 trailer ignored: {e}"),
                    ),
                }
            }
        }

        file.scan_first_frame(reader, diag)?;
        Ok(file)
    }

    /// Locate and parse the first audio frame, deriving the track fields.
    fn scan_first_frame<R: Read + Seek>(
        &mut self,
        reader: &mut BinaryReader<R>,
        diag: &mut Diagnostics,
    ) -> Result<()> {
        let span = (self.audio_end.saturating_sub(self.audio_start) as usize)
            .min(SYNC_SCAN_LIMIT);
        reader.seek_to(self.audio_start)?;
        let window = reader.read_bytes(span)?;
        let mut sync_at = None;
        for i in 0..window.len().saturating_sub(3) {
            if window[i] == 0xFF && window[i + 1] & 0xE0 == 0xE0 {
                reader.seek_to(self.audio_start + i as u64)?;
                if let Ok(frame) = MpegAudioFrame::parse(reader) {
                    sync_at = Some((i as u64, frame));
                    break;
                }
            }
        }
        let Some((sync_offset, frame)) = sync_at else {
            diag.critical(
                "parsing MP3 file",
                "no MPEG audio frame found; technical information unavailable",
            );
            return Ok(());
        };
        if sync_offset != 0 {
            diag.warn(
                "parsing MP3 file",
                format!("{sync_offset} bytes of garbage before the first frame"),
            );
        }

        let audio_len = self.audio_end - (self.audio_start + sync_offset);
        self.track = TrackInfo {
            media_type: MediaType::Audio,
            format: MediaFormat::MpegAudio {
                version: frame.mpeg_version(),
                layer: frame.layer(),
            },
            start_offset: self.audio_start + sync_offset,
            sample_rate: frame.sample_rate(),
            channel_count: frame.channel_mode().channels(),
            ..TrackInfo::new()
        };

        // Prefer exact frame counts from Xing/VBRI side data.
        let side_frames = frame
            .xing
            .and_then(|x| x.frame_count)
            .or(frame.vbri.map(|v| v.frame_count));
        let side_bytes = frame
            .xing
            .and_then(|x| x.byte_count)
            .or(frame.vbri.map(|v| v.byte_count));
        if let Some(frames) = side_frames {
            let samples = frames as u64 * frame.sample_count() as u64;
            self.track.sample_count = samples;
            if frame.sample_rate() > 0 {
                let seconds = samples as f64 / frame.sample_rate() as f64;
                self.track.duration = Duration::from_secs_f64(seconds);
                let bytes = side_bytes.map(u64::from).unwrap_or(audio_len);
                if seconds > 0.0 {
                    self.track.bitrate = bytes as f64 * 8.0 / seconds / 1000.0;
                }
            }
        } else if frame.bitrate() > 0 {
            self.track.bitrate = frame.bitrate() as f64;
            let seconds = audio_len as f64 * 8.0 / (frame.bitrate() as f64 * 1000.0);
            self.track.duration = Duration::from_secs_f64(seconds);
            if frame.sample_rate() > 0 {
                self.track.sample_count =
                    (seconds * frame.sample_rate() as f64) as u64;
            }
        }
        self.track.header_valid = true;
        self.first_frame = Some(frame);
        Ok(())
    }

    /// The ID3v2 tag, created empty on first access.
    pub fn id3v2_mut(&mut self) -> &mut Id3v2Tag {
        self.id3v2.get_or_insert_with(Id3v2Tag::new)
    }

    /// The ID3v1 tag, created empty on first access.
    pub fn id3v1_mut(&mut self) -> &mut Id3v1Tag {
        self.id3v1.get_or_insert_with(Id3v1Tag::new)
    }

    /// Whether the staged tags fit the file without a full rewrite: the new
    /// ID3v2 tag fits the old leading region, and no ID3v1 trailer needs to
    /// be removed (appending one is fine).
    pub fn can_apply_in_place(&self, diag: &mut Diagnostics) -> Result<bool> {
        if self.had_id3v1 && self.id3v1.is_none() {
            return Ok(false);
        }
        let new_len = match &self.id3v2 {
            Some(tag) => {
                let mut probe_diag = Diagnostics::new();
                let bytes = tag.make(tag.preferred_write_version(), 0, &mut probe_diag)?;
                diag.merge(probe_diag);
                bytes.len() as u64
            }
            None => 0,
        };
        // The old region absorbs the new tag with padding; an empty region
        // only works for an empty tag.
        Ok(new_len <= self.id3v2_region && (new_len > 0 || self.id3v2_region == 0))
    }

    /// Apply staged edits into `stream` without moving the audio data.
    pub fn try_apply_in_place<S: Read + Write + Seek>(
        &self,
        stream: &mut S,
        progress: &ProgressFeedback,
        diag: &mut Diagnostics,
    ) -> Result<bool> {
        if !self.can_apply_in_place(diag)? {
            return Ok(false);
        }
        progress.check()?;
        progress.report("updating ID3 tags in place", 0.0);
        if let Some(tag) = &self.id3v2 {
            let version = tag.preferred_write_version();
            let body = tag.make(version, 0, diag)?;
            let padding = (self.id3v2_region - body.len() as u64) as u32;
            let padded = tag.make(version, padding, diag)?;
            debug_assert_eq!(padded.len() as u64, self.id3v2_region);
            stream.seek(std::io::SeekFrom::Start(0))?;
            stream.write_all(&padded)?;
        }
        progress.check()?;
        if let Some(tag) = &self.id3v1 {
            stream.seek(std::io::SeekFrom::Start(self.audio_end))?;
            stream.write_all(&tag.make())?;
        }
        stream.flush()?;
        progress.report("updating ID3 tags in place", 100.0);
        Ok(true)
    }

    /// Stream a full rewrite: new ID3v2 tag (with fresh padding), audio
    /// copied verbatim, new ID3v1 trailer.
    pub fn rewrite<R: Read + Seek, W: Write + Seek>(
        &self,
        reader: &mut BinaryReader<R>,
        writer: &mut BinaryWriter<W>,
        preferred_padding: u32,
        progress: &ProgressFeedback,
        diag: &mut Diagnostics,
    ) -> Result<()> {
        progress.check()?;
        progress.report("writing ID3v2 tag", 0.0);
        if let Some(tag) = &self.id3v2 {
            let bytes = tag.make(tag.preferred_write_version(), preferred_padding, diag)?;
            writer.write_bytes(&bytes)?;
        }

        progress.check()?;
        reader.seek_to(self.audio_start)?;
        let mut remaining = self.audio_end - self.audio_start;
        let total = remaining.max(1);
        let mut buf = [0u8; COPY_BUF_LEN];
        while remaining > 0 {
            progress.check()?;
            let chunk = remaining.min(COPY_BUF_LEN as u64) as usize;
            reader.read_exact(&mut buf[..chunk])?;
            writer.write_bytes(&buf[..chunk])?;
            remaining -= chunk as u64;
            progress.report(
                "copying audio frames",
                (total - remaining) as f64 / total as f64 * 100.0,
            );
        }

        if let Some(tag) = &self.id3v1 {
            writer.write_bytes(&tag.make())?;
        }
        writer.flush()?;
        progress.report("copying audio frames", 100.0);
        Ok(())
    }
}
