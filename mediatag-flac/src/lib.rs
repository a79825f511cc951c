//! # mediatag-flac
//!
//! Native FLAC metadata support for the mediatag library: the `fLaC` magic,
//! the metadata block chain, STREAMINFO decoding and padding-aware rewrites
//! of `VORBIS_COMMENT` and `PICTURE` blocks.

pub mod stream;

pub use stream::{
    parse_stream_info, BlockRecord, BlockType, FlacStream, FlacStreamInfo, FLAC_MAGIC,
    STREAM_INFO_LEN,
};
