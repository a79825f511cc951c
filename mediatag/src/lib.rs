//! # mediatag
//!
//! Read and write metadata ("tags") and technical track information in media
//! container files: MP4/ISO-BMFF with iTunes metadata, Matroska/WebM, Ogg
//! (Vorbis, Opus, FLAC), native FLAC, RIFF/WAVE and MPEG audio with
//! ID3v1/ID3v2.
//!
//! Tags are edited through a uniform field model and written back in place
//! when the edit fits the existing metadata region, or via a streamed
//! rewrite with an atomic file swap otherwise. Stream integrity is
//! preserved: MP4 chunk offsets are patched, Matroska SeekHead and Cues are
//! recomputed, Ogg page checksums are regenerated.
//!
//! ## Example
//!
//! ```no_run
//! use mediatag::prelude::*;
//!
//! fn main() -> mediatag::Result<()> {
//!     let mut file = MediaFileInfo::open("song.m4a")?;
//!     let diag = file.parse_everything()?;
//!     for message in &diag {
//!         eprintln!("{message}");
//!     }
//!     for track in file.tracks() {
//!         println!("{track}");
//!     }
//!     file.set_value(KnownField::Title, TagValue::text("A better title"));
//!     file.apply_changes(&ProgressFeedback::new())?;
//!     Ok(())
//! }
//! ```

pub mod container;
pub mod media_file;
pub mod mpeg;
pub mod prelude;
pub mod probe;

pub use container::KnownContainer;
pub use media_file::{MediaFileInfo, WriteConfig};
pub use mpeg::MpegAudioFile;
pub use probe::detect_from_bytes;

pub use mediatag_core::{
    ContainerFormat, DiagLevel, DiagMessage, Diagnostics, Error, FieldId, Genre, KnownField,
    MediaFormat, MediaType, Picture, PositionInSet, ProgressFeedback, Result, Tag, TagField,
    TagTarget, TagType, TagValue, TextEncoding, TrackInfo,
};
