//! Tag fields: one metadata item with its format-specific identifier.

use crate::value::TagValue;
use std::fmt;

/// Format-specific field identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldId {
    /// 4-byte identifier: MP4 atom name or ID3v2.3/2.4 frame id.
    FourCc([u8; 4]),
    /// 3-byte ID3v2.2 frame id.
    ThreeCc([u8; 3]),
    /// Free-form MP4 `----` atom identified by `mean` and `name`.
    Freeform {
        /// Reverse-DNS namespace, e.g. `com.apple.iTunes`.
        mean: String,
        /// Field name within the namespace.
        name: String,
    },
    /// Vorbis comment key (stored uppercase).
    Key(String),
    /// Matroska SimpleTag name.
    Name(String),
}

impl FieldId {
    /// FourCC id from a byte string literal.
    pub fn fourcc(bytes: &[u8; 4]) -> Self {
        FieldId::FourCc(*bytes)
    }

    /// Vorbis key id; normalised to uppercase.
    pub fn key(key: impl AsRef<str>) -> Self {
        FieldId::Key(key.as_ref().to_ascii_uppercase())
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldId::FourCc(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            FieldId::ThreeCc(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            FieldId::Freeform { mean, name } => write!(f, "{mean}:{name}"),
            FieldId::Key(k) => f.write_str(k),
            FieldId::Name(n) => f.write_str(n),
        }
    }
}

/// One metadata item: an identifier, a typed value and the optional
/// qualifiers some formats attach (language, description, nested fields).
///
/// At least one of value / nested fields is non-empty for a well-formed
/// field; [`TagField::is_empty`] checks this.
#[derive(Debug, Clone, PartialEq)]
pub struct TagField {
    /// Format-specific identifier.
    pub id: FieldId,
    /// The value.
    pub value: TagValue,
    /// ISO-639 language qualifier (ID3v2 COMM/USLT, Matroska TagLanguage).
    pub language: Option<String>,
    /// Content descriptor (ID3v2) or sub-identifier.
    pub description: Option<String>,
    /// Nested fields (Matroska nested SimpleTag).
    pub nested: Vec<TagField>,
}

impl TagField {
    /// Create a field from id and value.
    pub fn new(id: FieldId, value: TagValue) -> Self {
        Self {
            id,
            value,
            language: None,
            description: None,
            nested: Vec::new(),
        }
    }

    /// Builder-style language qualifier.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Builder-style description qualifier.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// A field is empty when it carries neither a value nor nested fields.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.nested.iter().all(TagField::is_empty)
    }
}
