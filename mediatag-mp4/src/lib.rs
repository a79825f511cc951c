//! # mediatag-mp4
//!
//! MP4/ISO-BMFF support for the mediatag metadata library.
//!
//! Reads and writes iTunes-style metadata (`moov/udta/meta/ilst`), parses
//! track technical information from the `trak/mdia/minf/stbl` chain and
//! keeps chunk offset tables (`stco`/`co64`) consistent across rewrites.
//!
//! ## Example
//!
//! ```no_run
//! use mediatag_core::{BinaryReader, Diagnostics, KnownField, Tag, TagValue};
//! use mediatag_mp4::Mp4Container;
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let file = File::open("song.m4a").unwrap();
//! let mut reader = BinaryReader::new(BufReader::new(file));
//! let mut diag = Diagnostics::new();
//! let mut container = Mp4Container::parse(&mut reader, &mut diag).unwrap();
//! container.tag_mut().set_value(KnownField::Title, TagValue::text("My song"));
//! ```

pub mod atoms;
pub mod container;
pub mod tag;
pub mod track;

pub use atoms::{AtomHeader, AtomIter, Mp4ElementFormat};
pub use container::{Mp4Container, Mp4WriteOptions};
pub use tag::Mp4Tag;
