//! # mediatag-vorbis
//!
//! Vorbis comment metadata for the mediatag library: the vendor string and
//! KEY=value field list used by Ogg Vorbis, Opus (`OpusTags`) and FLAC
//! (`VORBIS_COMMENT` block), plus the shared PICTURE block layout.

pub mod comment;
pub mod picture;

pub use comment::VorbisComment;
pub use picture::{make_picture_block, parse_picture_block};
