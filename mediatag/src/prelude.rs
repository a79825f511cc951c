//! Convenience re-exports for the common surface.

pub use crate::media_file::{MediaFileInfo, WriteConfig};
pub use mediatag_core::{
    ContainerFormat, Diagnostics, KnownField, MediaType, ProgressFeedback, Tag, TagTarget,
    TagValue,
};
