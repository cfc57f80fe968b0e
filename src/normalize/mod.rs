//! Canonical comparison keys for researcher names and ISSNs.
//!
//! Everything here is total: any input yields a (possibly empty) key.

use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    /// Leading run of digits in a year cell ("2020", "2020.0", " 2019a")
    static ref YEAR_PREFIX: Regex = Regex::new(r"^\s*(\d{1,9})").unwrap();
}

/// Fold a name into its comparison form: accents removed, underscores
/// turned into spaces, trimmed, lowercased.
///
/// Characters with no ASCII decomposition are dropped.
pub fn normalize_text<S: AsRef<str>>(value: S) -> String {
    let folded: String = value
        .as_ref()
        .nfkd()
        .filter(|c| c.is_ascii())
        .collect();
    folded.replace('_', " ").trim().to_lowercase()
}

/// Clean an ISSN-like value into the reconciliation join key.
///
/// `None` becomes the empty string; otherwise the value is uppercased and
/// everything except `0-9` and `X` is removed.
pub fn clean_issn(value: Option<&str>) -> String {
    match value {
        None => String::new(),
        Some(raw) => raw
            .to_uppercase()
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == 'X')
            .collect(),
    }
}

/// Title-case a name the way display names are shown: the first letter of
/// every alphabetic run is uppercased, the rest lowercased.
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_alpha = false;
    for c in value.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Coerce a year cell to an integer, keeping only its leading digits.
/// Unparseable or missing values become 0.
pub fn coerce_year(value: Option<&str>) -> i32 {
    value
        .and_then(|v| YEAR_PREFIX.captures(v))
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text_strips_accents() {
        assert_eq!(normalize_text("João Silva"), "joao silva");
        assert_eq!(normalize_text("  Fátima_Maria NOBRE "), "fatima maria nobre");
        assert_eq!(normalize_text("Sandra Haydée Petit"), "sandra haydee petit");
    }

    #[test]
    fn test_normalize_text_empty() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn test_clean_issn() {
        assert_eq!(clean_issn(Some("0100-1965")), "01001965");
        assert_eq!(clean_issn(None), "");
        assert_eq!(clean_issn(Some("0100.1965 ")), "01001965");
        assert_eq!(clean_issn(Some("1234-567x")), "1234567X");
        assert_eq!(clean_issn(Some("ISSN: 2175-6236")), "21756236");
        assert_eq!(clean_issn(Some("")), "");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("maria das dores"), "Maria Das Dores");
        assert_eq!(title_case("JOSÉ o'neil"), "José O'Neil");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_coerce_year() {
        assert_eq!(coerce_year(Some("2020")), 2020);
        assert_eq!(coerce_year(Some("2020.0")), 2020);
        assert_eq!(coerce_year(Some(" 2019a")), 2019);
        assert_eq!(coerce_year(Some("s.d.")), 0);
        assert_eq!(coerce_year(None), 0);
    }
}
