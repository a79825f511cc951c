//! # mediatag-id3
//!
//! ID3 tag support for the mediatag metadata library: the ID3v1 128-byte
//! trailer and ID3v2.2/2.3/2.4 tags with synchsafe integers,
//! unsynchronisation, version conversion and the genre table.

pub mod frame;
pub mod genres;
pub mod synch;
pub mod tag;
pub mod v1;

pub use tag::{synthesize_v1, Id3v2Tag};
pub use v1::{Id3v1Tag, ID3V1_LEN, ID3V1_MAGIC};
