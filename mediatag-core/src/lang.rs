//! ISO-639 language lookups.
//!
//! The table is embedded from `data/iso-639-2.csv` at build time and parsed
//! once on first use. Besides name lookups it bridges the 2-letter codes
//! ID3v2 sometimes carries to the canonical 3-letter form the other
//! containers use.

use std::collections::HashMap;
use std::sync::OnceLock;

struct LanguageTable {
    /// alpha-3 code -> English name.
    names: HashMap<&'static str, &'static str>,
    /// alpha-2 code -> alpha-3 code.
    alpha2: HashMap<&'static str, &'static str>,
}

static TABLE: OnceLock<LanguageTable> = OnceLock::new();

fn table() -> &'static LanguageTable {
    TABLE.get_or_init(|| {
        let csv = include_str!("../data/iso-639-2.csv");
        let mut names = HashMap::new();
        let mut alpha2 = HashMap::new();
        for line in csv.lines().skip(1) {
            let mut cols = line.splitn(3, ',');
            let (Some(a3), Some(a2), Some(name)) = (cols.next(), cols.next(), cols.next())
            else {
                continue;
            };
            if a3.len() != 3 {
                continue;
            }
            names.insert(a3, name);
            if a2.len() == 2 {
                alpha2.insert(a2, a3);
            }
        }
        LanguageTable { names, alpha2 }
    })
}

/// English name of an ISO-639-2 (3-letter) code, if known.
pub fn language_name(alpha3: &str) -> Option<&'static str> {
    table().names.get(alpha3).copied()
}

/// Canonical 3-letter form of a 2-letter ISO-639-1 code.
pub fn alpha2_to_alpha3(alpha2: &str) -> Option<&'static str> {
    table().alpha2.get(alpha2).copied()
}

/// Normalise a language code as found in a file: 3-letter codes pass
/// through lowercased, 2-letter codes are mapped to their 3-letter form,
/// anything else yields `None`.
pub fn normalize(code: &str) -> Option<String> {
    let lower = code.trim().to_ascii_lowercase();
    match lower.len() {
        3 if table().names.contains_key(lower.as_str()) => Some(lower),
        3 => Some(lower), // unknown but plausibly valid alpha-3
        2 => alpha2_to_alpha3(&lower).map(str::to_owned),
        _ => None,
    }
}

/// Whether a 3-letter code means "no specific language".
pub fn is_unspecified(alpha3: &str) -> bool {
    matches!(alpha3, "und" | "zxx" | "mul" | "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_lookup() {
        assert_eq!(language_name("eng"), Some("English"));
        assert_eq!(language_name("deu"), Some("German"));
        assert_eq!(language_name("qqq"), None);
    }

    #[test]
    fn test_alpha2_bridge() {
        assert_eq!(alpha2_to_alpha3("en"), Some("eng"));
        assert_eq!(alpha2_to_alpha3("ja"), Some("jpn"));
        assert_eq!(alpha2_to_alpha3("xx"), None);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("EN").as_deref(), Some("eng"));
        assert_eq!(normalize("eng").as_deref(), Some("eng"));
        assert_eq!(normalize("xyz").as_deref(), Some("xyz"));
        assert_eq!(normalize("x"), None);
    }

    #[test]
    fn test_unspecified() {
        assert!(is_unspecified("und"));
        assert!(!is_unspecified("eng"));
    }
}
