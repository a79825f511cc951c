//! Typed tag values.
//!
//! A [`TagValue`] is a tagged union over the value kinds the supported tag
//! formats can represent. Conversions between representations are explicit
//! operations; the declared text encoding is retained so a round-trip can
//! reproduce the original bytes where the format allows.

use crate::error::{Error, Result};
use crate::io::text;
use chrono::NaiveDateTime;
use std::fmt;
use std::time::Duration;

/// Character encoding of a text value as declared by the containing format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextEncoding {
    /// ISO 8859-1.
    Latin1,
    /// UTF-8.
    #[default]
    Utf8,
    /// UTF-16 little-endian.
    Utf16Le,
    /// UTF-16 big-endian.
    Utf16Be,
}

impl TextEncoding {
    /// Encode `s` in this encoding. Latin-1 fails when a code point does not
    /// fit; the Unicode encodings are total.
    pub fn encode(&self, s: &str) -> Result<Vec<u8>> {
        match self {
            TextEncoding::Latin1 => text::string_to_latin1(s)
                .ok_or_else(|| Error::invalid_data("string not representable in Latin-1")),
            TextEncoding::Utf8 => Ok(s.as_bytes().to_vec()),
            TextEncoding::Utf16Le => Ok(text::string_to_utf16(s, true)),
            TextEncoding::Utf16Be => Ok(text::string_to_utf16(s, false)),
        }
    }

    /// Decode bytes declared to be in this encoding.
    pub fn decode(&self, data: &[u8]) -> Result<String> {
        match self {
            TextEncoding::Latin1 => Ok(text::latin1_to_string(data)),
            TextEncoding::Utf8 => String::from_utf8(data.to_vec())
                .map_err(|e| Error::invalid_data(format!("invalid UTF-8 text: {e}"))),
            TextEncoding::Utf16Le => text::utf16_to_string(data, true),
            TextEncoding::Utf16Be => text::utf16_to_string(data, false),
        }
    }
}

/// Position within a set, e.g. track 3 of 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct PositionInSet {
    /// The element's position, if known.
    pub position: Option<u32>,
    /// The set's total size, if known.
    pub total: Option<u32>,
}

impl PositionInSet {
    /// Create a position with both parts known.
    pub fn new(position: u32, total: u32) -> Self {
        Self {
            position: Some(position),
            total: Some(total),
        }
    }

    /// Parse the common "3/12" textual form; a bare number is a position
    /// without a total.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.splitn(2, '/');
        let pos = parts.next().unwrap_or("").trim();
        let position = if pos.is_empty() {
            None
        } else {
            Some(pos.parse().map_err(|_| {
                Error::invalid_data(format!("invalid position in set: {s:?}"))
            })?)
        };
        let total = match parts.next() {
            Some(t) if !t.trim().is_empty() => Some(t.trim().parse().map_err(|_| {
                Error::invalid_data(format!("invalid position in set: {s:?}"))
            })?),
            _ => None,
        };
        Ok(Self { position, total })
    }
}

impl fmt::Display for PositionInSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.position, self.total) {
            (Some(p), Some(t)) => write!(f, "{p}/{t}"),
            (Some(p), None) => write!(f, "{p}"),
            (None, Some(t)) => write!(f, "/{t}"),
            (None, None) => Ok(()),
        }
    }
}

/// A genre, either as an ID3v1 genre index or as free text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Genre {
    /// ID3v1 genre table index.
    Index(u8),
    /// Free-form genre name.
    Name(String),
}

/// Embedded picture with its transport metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// MIME type, e.g. `image/jpeg`.
    pub mime_type: String,
    /// Free-form description.
    pub description: String,
    /// APIC-style picture type code (3 = front cover).
    pub picture_type: u8,
}

/// A typed metadata value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TagValue {
    /// No value.
    #[default]
    Empty,
    /// Signed integer.
    Integer(i64),
    /// List of signed integers.
    IntegerList(Vec<i64>),
    /// List of unsigned integers.
    UnsignedList(Vec<u64>),
    /// Text with its declared encoding.
    Text {
        /// Decoded content.
        data: String,
        /// The encoding declared by (and re-used for) the containing format.
        encoding: TextEncoding,
    },
    /// Opaque binary payload.
    Binary {
        /// Raw bytes.
        data: Vec<u8>,
        /// MIME type when known, empty otherwise.
        mime_type: String,
    },
    /// Calendar timestamp.
    DateTime(NaiveDateTime),
    /// Length of time.
    TimeSpan(Duration),
    /// Position in a set ("3/12").
    Position(PositionInSet),
    /// Genre by index or name.
    Genre(Genre),
    /// Embedded picture.
    Picture(Picture),
}

impl TagValue {
    /// Text value with the default UTF-8 encoding.
    pub fn text(data: impl Into<String>) -> Self {
        TagValue::Text {
            data: data.into(),
            encoding: TextEncoding::Utf8,
        }
    }

    /// Text value with an explicit encoding.
    pub fn text_with_encoding(data: impl Into<String>, encoding: TextEncoding) -> Self {
        TagValue::Text {
            data: data.into(),
            encoding,
        }
    }

    /// Whether the value is empty (no content).
    pub fn is_empty(&self) -> bool {
        match self {
            TagValue::Empty => true,
            TagValue::Text { data, .. } => data.is_empty(),
            TagValue::Binary { data, .. } => data.is_empty(),
            TagValue::IntegerList(v) => v.is_empty(),
            TagValue::UnsignedList(v) => v.is_empty(),
            _ => false,
        }
    }

    /// The declared text encoding, if this is a text value.
    pub fn encoding(&self) -> Option<TextEncoding> {
        match self {
            TagValue::Text { encoding, .. } => Some(*encoding),
            _ => None,
        }
    }

    /// Re-declare the encoding of a text value. Content is unchanged; this is
    /// lossless for any Unicode target and checked for Latin-1.
    pub fn convert_encoding(&mut self, target: TextEncoding) -> Result<()> {
        if let TagValue::Text { data, encoding } = self {
            if target == TextEncoding::Latin1 && text::string_to_latin1(data).is_none() {
                return Err(Error::invalid_data(
                    "text not representable in Latin-1",
                ));
            }
            *encoding = target;
        }
        Ok(())
    }

    /// View the value as text where a canonical textual form exists.
    pub fn to_text(&self) -> Option<String> {
        match self {
            TagValue::Text { data, .. } => Some(data.clone()),
            TagValue::Integer(i) => Some(i.to_string()),
            TagValue::Position(p) => Some(p.to_string()),
            TagValue::Genre(Genre::Name(name)) => Some(name.clone()),
            TagValue::DateTime(dt) => Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            _ => None,
        }
    }

    /// View the value as an integer where one is derivable.
    pub fn to_integer(&self) -> Option<i64> {
        match self {
            TagValue::Integer(i) => Some(*i),
            TagValue::Text { data, .. } => data.trim().parse().ok(),
            TagValue::Position(p) => p.position.map(i64::from),
            TagValue::Genre(Genre::Index(i)) => Some(i64::from(*i)),
            _ => None,
        }
    }
}

impl From<&str> for TagValue {
    fn from(s: &str) -> Self {
        TagValue::text(s)
    }
}

impl From<String> for TagValue {
    fn from(s: String) -> Self {
        TagValue::text(s)
    }
}

impl From<i64> for TagValue {
    fn from(i: i64) -> Self {
        TagValue::Integer(i)
    }
}
