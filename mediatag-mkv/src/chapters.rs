//! Matroska chapters: EditionEntry and ChapterAtom trees.

use crate::ebml::{self, ChildIter};
use crate::elements::*;
use crate::error::Result;
use mediatag_core::Diagnostics;
use std::time::Duration;

/// A localised chapter title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterDisplay {
    /// Title string.
    pub string: String,
    /// ISO-639-2 language.
    pub language: String,
    /// Country code, if present.
    pub country: Option<String>,
}

/// One chapter, possibly with nested chapters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterAtom {
    /// Chapter UID.
    pub uid: u64,
    /// Start time.
    pub time_start: Duration,
    /// End time, if declared.
    pub time_end: Option<Duration>,
    /// Hidden flag.
    pub hidden: bool,
    /// Enabled flag.
    pub enabled: bool,
    /// Display strings.
    pub displays: Vec<ChapterDisplay>,
    /// Nested chapters.
    pub children: Vec<ChapterAtom>,
}

impl ChapterAtom {
    /// The preferred display title, if any.
    pub fn title(&self) -> Option<&str> {
        self.displays.first().map(|d| d.string.as_str())
    }
}

/// One edition: an ordered set of chapters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditionEntry {
    /// Edition UID.
    pub uid: u64,
    /// Hidden flag.
    pub hidden: bool,
    /// Default flag.
    pub default: bool,
    /// Ordered-chapters flag.
    pub ordered: bool,
    /// Top-level chapters.
    pub chapters: Vec<ChapterAtom>,
}

const MAX_CHAPTER_DEPTH: u32 = 16;

/// Parse a Chapters element payload.
pub fn parse_chapters_payload(
    data: &[u8],
    diag: &mut Diagnostics,
) -> Result<Vec<EditionEntry>> {
    let mut editions = Vec::new();
    for child in ChildIter::new(data) {
        let (id, payload) = child?;
        if id == EDITION_ENTRY {
            editions.push(parse_edition(payload, diag)?);
        }
    }
    Ok(editions)
}

fn parse_edition(data: &[u8], diag: &mut Diagnostics) -> Result<EditionEntry> {
    let mut edition = EditionEntry::default();
    for child in ChildIter::new(data) {
        let (id, payload) = child?;
        match id {
            EDITION_UID => edition.uid = ebml::parse_uint(payload),
            EDITION_FLAG_HIDDEN => edition.hidden = ebml::parse_uint(payload) != 0,
            EDITION_FLAG_DEFAULT => edition.default = ebml::parse_uint(payload) != 0,
            EDITION_FLAG_ORDERED => edition.ordered = ebml::parse_uint(payload) != 0,
            CHAPTER_ATOM => {
                if let Some(chapter) = parse_chapter(payload, 0, diag)? {
                    edition.chapters.push(chapter);
                }
            }
            _ => {}
        }
    }
    Ok(edition)
}

fn parse_chapter(data: &[u8], depth: u32, diag: &mut Diagnostics) -> Result<Option<ChapterAtom>> {
    if depth > MAX_CHAPTER_DEPTH {
        diag.critical(
            "parsing Matroska chapters",
            "ChapterAtom nesting deeper than 16 levels; subtree skipped",
        );
        return Ok(None);
    }
    let mut chapter = ChapterAtom {
        enabled: true,
        ..ChapterAtom::default()
    };
    for child in ChildIter::new(data) {
        let (id, payload) = child?;
        match id {
            CHAPTER_UID => chapter.uid = ebml::parse_uint(payload),
            CHAPTER_TIME_START => {
                chapter.time_start = Duration::from_nanos(ebml::parse_uint(payload))
            }
            CHAPTER_TIME_END => {
                chapter.time_end = Some(Duration::from_nanos(ebml::parse_uint(payload)))
            }
            CHAPTER_FLAG_HIDDEN => chapter.hidden = ebml::parse_uint(payload) != 0,
            CHAPTER_FLAG_ENABLED => chapter.enabled = ebml::parse_uint(payload) != 0,
            CHAPTER_DISPLAY => {
                let mut display = ChapterDisplay {
                    string: String::new(),
                    language: "eng".to_string(),
                    country: None,
                };
                for grandchild in ChildIter::new(payload) {
                    let (id, payload) = grandchild?;
                    match id {
                        CHAP_STRING => display.string = ebml::parse_string(payload)?,
                        CHAP_LANGUAGE => display.language = ebml::parse_string(payload)?,
                        CHAP_COUNTRY => display.country = Some(ebml::parse_string(payload)?),
                        _ => {}
                    }
                }
                chapter.displays.push(display);
            }
            CHAPTER_ATOM => {
                if let Some(nested) = parse_chapter(payload, depth + 1, diag)? {
                    chapter.children.push(nested);
                }
            }
            _ => {}
        }
    }
    Ok(Some(chapter))
}
