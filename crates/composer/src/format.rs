//! Content normalization for names and dates

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

/// Case transform applied to Name elements
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameCase {
    #[default]
    AsIs,
    Upper,
    Lower,
    Title,
}

/// Input layouts accepted for Date elements, tried in order
const DATE_INPUT_FORMATS: [&str; 8] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Apply a case transform to a name
pub fn apply_name_case(name: &str, case: NameCase) -> String {
    match case {
        NameCase::AsIs => name.to_string(),
        NameCase::Upper => name.to_uppercase(),
        NameCase::Lower => name.to_lowercase(),
        NameCase::Title => name
            .split(' ')
            .map(title_word)
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn title_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Parse a date in any accepted input layout
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    DATE_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(input)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// Translate a `YYYY-MM-DD` style pattern into a chrono format string
///
/// Tokens: `YYYY`, `YY`, `MMMM`, `MMM`, `MM`, `M`, `DD`, `D`. Anything else is
/// copied literally.
pub fn to_chrono_pattern(pattern: &str) -> String {
    const TOKENS: [(&str, &str); 8] = [
        ("YYYY", "%Y"),
        ("YY", "%y"),
        ("MMMM", "%B"),
        ("MMM", "%b"),
        ("MM", "%m"),
        ("M", "%-m"),
        ("DD", "%d"),
        ("D", "%-d"),
    ];

    let mut out = String::with_capacity(pattern.len() * 2);
    let mut rest = pattern;
    'scan: while !rest.is_empty() {
        for (token, replacement) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(replacement);
                rest = tail;
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            if c == '%' {
                out.push_str("%%");
            } else {
                out.push(c);
            }
        }
        rest = chars.as_str();
    }
    out
}

/// Reformat a date string, or `None` when the input is not a date
pub fn format_date(input: &str, pattern: &str) -> Option<String> {
    let date = parse_date(input)?;
    Some(date.format(&to_chrono_pattern(pattern)).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_name_case() {
        assert_eq!(apply_name_case("jane DOE", NameCase::AsIs), "jane DOE");
        assert_eq!(apply_name_case("jane DOE", NameCase::Upper), "JANE DOE");
        assert_eq!(apply_name_case("jane DOE", NameCase::Lower), "jane doe");
        assert_eq!(apply_name_case("jane DOE", NameCase::Title), "Jane Doe");
    }

    #[test]
    fn test_title_case_keeps_spacing() {
        assert_eq!(apply_name_case("ann  marie", NameCase::Title), "Ann  Marie");
    }

    #[test]
    fn test_parse_date_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        for input in [
            "2024-03-09",
            "2024/03/09",
            "03/09/2024",
            "09.03.2024",
            "March 09, 2024",
            "Mar 9, 2024",
            "9 March 2024",
            "2024-03-09T10:30:00Z",
            "  2024-03-09  ",
        ] {
            assert_eq!(parse_date(input), Some(expected), "input {input:?}");
        }
    }

    #[test]
    fn test_parse_date_rejects_invalid() {
        assert_eq!(parse_date("2024-13-45"), None);
        assert_eq!(parse_date("tomorrow"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_pattern_translation() {
        assert_eq!(to_chrono_pattern("YYYY-MM-DD"), "%Y-%m-%d");
        assert_eq!(to_chrono_pattern("DD/MM/YY"), "%d/%m/%y");
        assert_eq!(to_chrono_pattern("MMMM D, YYYY"), "%B %-d, %Y");
        assert_eq!(to_chrono_pattern("100%"), "100%%");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("03/09/2024", "YYYY-MM-DD").as_deref(), Some("2024-03-09"));
        assert_eq!(format_date("2024-03-09", "DD.MM.YYYY").as_deref(), Some("09.03.2024"));
        assert_eq!(format_date("2024-03-09", "MMM D, YYYY").as_deref(), Some("Mar 9, 2024"));
        assert_eq!(format_date("2024-13-45", "YYYY-MM-DD"), None);
    }
}
