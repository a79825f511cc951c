//! # mediatag-core
//!
//! Core types and utilities for the mediatag metadata library.
//!
//! This crate provides the building blocks shared by all container crates:
//! - Error handling and the diagnostics collector
//! - Binary reading/writing with the text codecs tag formats need
//! - The generic lazy element tree for atom/element containers
//! - The uniform tag model: values, fields, targets, known-field vocabulary
//! - Track descriptors and media format identification
//! - Progress reporting with cooperative cancellation
//! - The embedded ISO-639 language table

pub mod diag;
pub mod element;
pub mod error;
pub mod field;
pub mod fields;
pub mod format;
pub mod io;
pub mod lang;
pub mod progress;
pub mod target;
pub mod track;
pub mod value;

pub use diag::{DiagLevel, DiagMessage, Diagnostics};
pub use error::{Error, Result};
pub use field::{FieldId, TagField};
pub use fields::{KnownField, Tag, TagType};
pub use format::{ContainerFormat, MediaFormat, MediaType};
pub use io::{BinaryReader, BinaryWriter};
pub use progress::ProgressFeedback;
pub use target::TagTarget;
pub use track::TrackInfo;
pub use value::{Genre, Picture, PositionInSet, TagValue, TextEncoding};
