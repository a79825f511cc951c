//! # mediatag-mkv
//!
//! Matroska/WebM support for the mediatag metadata library.
//!
//! Reads and writes the metadata structures of EBML-based containers: tags
//! with their targets, track entries, chapter editions and attachments.
//! Media data (clusters) is never decoded; it is indexed for the rewrite
//! path and copied verbatim.
//!
//! ## Example
//!
//! ```no_run
//! use mediatag_core::{BinaryReader, Diagnostics, KnownField, Tag, TagTarget, TagValue};
//! use mediatag_mkv::MatroskaContainer;
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let file = File::open("video.mkv").unwrap();
//! let mut reader = BinaryReader::new(BufReader::new(file));
//! let mut diag = Diagnostics::new();
//! let mut container = MatroskaContainer::parse(&mut reader, &mut diag).unwrap();
//! let tag = container.tag_for_target(&TagTarget::file());
//! tag.set_value(KnownField::Title, TagValue::text("My recording"));
//! ```

pub mod attachments;
pub mod chapters;
pub mod container;
pub mod ebml;
pub mod elements;
pub mod error;
pub mod tag;
pub mod track;

pub use attachments::AttachedFile;
pub use chapters::{ChapterAtom, ChapterDisplay, EditionEntry};
pub use container::{EbmlDocInfo, MatroskaContainer};
pub use error::{MkvError, Result};
pub use tag::MatroskaTag;
