//! The uniform field vocabulary and the tag capability set.
//!
//! Each tag format maps a subset of [`KnownField`] onto its native
//! identifiers; the [`Tag`] trait is the uniform access surface the facade
//! exposes regardless of the underlying container.

use crate::field::TagField;
use crate::target::TagTarget;
use crate::value::TagValue;
use std::fmt;

/// Tag format discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagType {
    /// ID3v1 128-byte trailer.
    Id3v1,
    /// ID3v2.2/2.3/2.4.
    Id3v2,
    /// iTunes-style MP4 `ilst`.
    Mp4,
    /// Matroska Tags element.
    Matroska,
    /// Vorbis comment (Ogg or FLAC).
    VorbisComment,
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TagType::Id3v1 => "ID3v1",
            TagType::Id3v2 => "ID3v2",
            TagType::Mp4 => "MP4",
            TagType::Matroska => "Matroska",
            TagType::VorbisComment => "Vorbis comment",
        };
        f.write_str(name)
    }
}

/// Format-independent metadata fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum KnownField {
    /// Title of the work.
    Title,
    /// Performing artist.
    Artist,
    /// Album or collection.
    Album,
    /// Album artist.
    AlbumArtist,
    /// Genre.
    Genre,
    /// Recording date or year.
    RecordingDate,
    /// Free-form comment.
    Comment,
    /// Beats per minute.
    Bpm,
    /// Position of the track within the album.
    TrackPosition,
    /// Position of the disk within the set.
    DiskPosition,
    /// Encoder software.
    Encoder,
    /// Settings the encoder was invoked with.
    EncoderSettings,
    /// Unsynchronised lyrics.
    Lyrics,
    /// Composer.
    Composer,
    /// Rating.
    Rating,
    /// Copyright notice.
    Copyright,
    /// Cover art.
    Cover,
    /// Publisher / label.
    Publisher,
    /// Original release date.
    ReleaseDate,
}

impl KnownField {
    /// All fields, for enumeration.
    pub const ALL: &'static [KnownField] = &[
        KnownField::Title,
        KnownField::Artist,
        KnownField::Album,
        KnownField::AlbumArtist,
        KnownField::Genre,
        KnownField::RecordingDate,
        KnownField::Comment,
        KnownField::Bpm,
        KnownField::TrackPosition,
        KnownField::DiskPosition,
        KnownField::Encoder,
        KnownField::EncoderSettings,
        KnownField::Lyrics,
        KnownField::Composer,
        KnownField::Rating,
        KnownField::Copyright,
        KnownField::Cover,
        KnownField::Publisher,
        KnownField::ReleaseDate,
    ];
}

/// Capability set implemented by every tag format.
pub trait Tag {
    /// The tag's format.
    fn tag_type(&self) -> TagType;

    /// The scope this tag applies to.
    fn target(&self) -> &TagTarget;

    /// Change the scope. Formats without target support ignore this.
    fn set_target(&mut self, target: TagTarget);

    /// All fields in insertion order, duplicates preserved.
    fn fields(&self) -> &[TagField];

    /// Whether this format can represent the given field at all.
    fn supports_field(&self, field: KnownField) -> bool;

    /// The first value mapped to `field`, if present.
    fn value(&self, field: KnownField) -> Option<&TagValue>;

    /// Set `field`, replacing all existing occurrences. Returns `false` when
    /// the format cannot represent the field.
    fn set_value(&mut self, field: KnownField, value: TagValue) -> bool;

    /// Remove all occurrences of `field`. Returns whether anything was removed.
    fn remove_value(&mut self, field: KnownField) -> bool;

    /// Number of non-empty fields.
    fn field_count(&self) -> usize {
        self.fields().iter().filter(|f| !f.is_empty()).count()
    }

    /// Whether the tag holds no non-empty field.
    fn is_empty(&self) -> bool {
        self.field_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_type_display() {
        assert_eq!(TagType::VorbisComment.to_string(), "Vorbis comment");
        assert_eq!(TagType::Id3v2.to_string(), "ID3v2");
    }

    #[test]
    fn test_known_field_inventory() {
        assert!(KnownField::ALL.contains(&KnownField::Title));
        assert!(KnownField::ALL.contains(&KnownField::Cover));
    }
}
