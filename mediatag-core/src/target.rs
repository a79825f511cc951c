//! Tag targets: the scope a tag applies to.
//!
//! Matroska generalises tag scoping through target type values (10..70) and
//! UID lists; the other formats use the default whole-file target.

use std::fmt;

/// Well-known Matroska target type values.
pub mod level {
    /// Shot.
    pub const SHOT: u64 = 10;
    /// Subtrack / movement / scene.
    pub const SUBTRACK: u64 = 20;
    /// Track / song / chapter.
    pub const TRACK: u64 = 30;
    /// Part / session.
    pub const PART: u64 = 40;
    /// Album / movie / episode (the default).
    pub const ALBUM: u64 = 50;
    /// Edition / issue / volume / season.
    pub const EDITION: u64 = 60;
    /// Collection.
    pub const COLLECTION: u64 = 70;
}

/// Scope a tag applies to: the whole file or specific tracks, chapters,
/// editions or attachments identified by UID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagTarget {
    /// Target type value (10..70); 0 means unspecified and is treated as the
    /// album level.
    pub level: u64,
    /// Optional name of the level, e.g. "ALBUM".
    pub level_name: String,
    /// Track UIDs in scope.
    pub track_uids: Vec<u64>,
    /// Chapter UIDs in scope.
    pub chapter_uids: Vec<u64>,
    /// Edition UIDs in scope.
    pub edition_uids: Vec<u64>,
    /// Attachment UIDs in scope.
    pub attachment_uids: Vec<u64>,
}

impl TagTarget {
    /// The default whole-file target.
    pub fn file() -> Self {
        Self::default()
    }

    /// Target one track at the track level.
    pub fn track(uid: u64) -> Self {
        Self {
            level: level::TRACK,
            track_uids: vec![uid],
            ..Self::default()
        }
    }

    /// Target one chapter.
    pub fn chapter(uid: u64) -> Self {
        Self {
            level: level::TRACK,
            chapter_uids: vec![uid],
            ..Self::default()
        }
    }

    /// Target one edition.
    pub fn edition(uid: u64) -> Self {
        Self {
            level: level::EDITION,
            edition_uids: vec![uid],
            ..Self::default()
        }
    }

    /// Target one attachment.
    pub fn attachment(uid: u64) -> Self {
        Self {
            level: level::ALBUM,
            attachment_uids: vec![uid],
            ..Self::default()
        }
    }

    /// Effective level: unspecified resolves to the album level.
    pub fn effective_level(&self) -> u64 {
        if self.level == 0 {
            level::ALBUM
        } else {
            self.level
        }
    }

    /// Whether this is the default whole-file target.
    pub fn is_default(&self) -> bool {
        (self.level == 0 || self.level == level::ALBUM)
            && self.level_name.is_empty()
            && self.track_uids.is_empty()
            && self.chapter_uids.is_empty()
            && self.edition_uids.is_empty()
            && self.attachment_uids.is_empty()
    }

    /// Whether any UID list is non-empty.
    pub fn has_uids(&self) -> bool {
        !self.track_uids.is_empty()
            || !self.chapter_uids.is_empty()
            || !self.edition_uids.is_empty()
            || !self.attachment_uids.is_empty()
    }
}

impl fmt::Display for TagTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            return f.write_str("file");
        }
        write!(f, "level {}", self.effective_level())?;
        if !self.level_name.is_empty() {
            write!(f, " ({})", self.level_name)?;
        }
        for uid in &self.track_uids {
            write!(f, ", track {uid}")?;
        }
        for uid in &self.chapter_uids {
            write!(f, ", chapter {uid}")?;
        }
        for uid in &self.edition_uids {
            write!(f, ", edition {uid}")?;
        }
        for uid in &self.attachment_uids {
            write!(f, ", attachment {uid}")?;
        }
        Ok(())
    }
}
