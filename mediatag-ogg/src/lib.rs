//! # mediatag-ogg
//!
//! Ogg support for the mediatag metadata library: page parsing and writing
//! with CRC verification, packet reassembly across pages, codec detection
//! (Vorbis, Opus, FLAC mapping, Theora) and comment rewriting via header
//! repagination.

pub mod container;
pub mod iterator;
pub mod page;

pub use container::{LogicalStream, OggCodec, OggContainer};
pub use iterator::{OggIterator, OggPacket};
pub use page::OggPage;
