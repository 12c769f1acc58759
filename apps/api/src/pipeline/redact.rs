//! PII Redactor — deterministic, pattern-based masking of names, emails,
//! phone numbers, and postal addresses in extracted résumé text.
//!
//! Ordering matters: the email and phone are extracted first, because the
//! masking passes would otherwise destroy the very substrings the final
//! record needs. Detection is best-effort; it may under- or over-redact
//! and makes no NER-grade claims.

use std::sync::LazyLock;

use regex::Regex;

pub const NAME_SENTINEL: &str = "[REDACTED-NAME]";
pub const EMAIL_SENTINEL: &str = "[EMAIL]";
pub const PHONE_SENTINEL: &str = "[PHONE]";
pub const ADDRESS_SENTINEL: &str = "[ADDRESS]";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap()
});

// Digit-grouping pattern for phone candidates. Matches international
// prefixes, optional parentheses, and separator-joined digit groups.
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+?\d{1,3}[-.\s]?)?(?:\(?\d{2,4}\)?[-.\s]?)?\d{2,4}[-.\s]?\d{2,4}[-.\s]?\d{2,4}")
        .unwrap()
});

// House number, word tokens, optional comma-separated locality, then a
// 5-digit postal code.
static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,5}\s+\w+(?:\s+\w+)*(?:,\s*\w+(?:\s+\w+)*)?,?\s*\d{5}").unwrap()
});

/// Output of one redaction pass: the masked text plus the two side-channel
/// values extracted before masking.
#[derive(Debug, PartialEq)]
pub struct Redaction {
    pub text: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Extracts the first email and phone candidate, then masks every known
/// name token, every email-shaped substring, the extracted phone, and every
/// postal-address-shaped substring.
pub fn redact(text: &str, known_name_tokens: &[String]) -> Redaction {
    let email = EMAIL_RE.find(text).map(|m| m.as_str().to_string());
    let phone = first_phone_candidate(text);

    // Longest token first so "Jean-Paul" is masked whole before "Jean"
    // could leave a "-Paul" remnant.
    let mut tokens: Vec<&String> = known_name_tokens.iter().collect();
    tokens.sort_by_key(|t| std::cmp::Reverse(t.len()));

    let mut redacted = text.to_string();
    for token in tokens {
        if token.is_empty() {
            continue;
        }
        let pattern = Regex::new(&format!("(?i){}", regex::escape(token)))
            .expect("escaped name token is a valid pattern");
        redacted = pattern.replace_all(&redacted, NAME_SENTINEL).into_owned();
    }

    redacted = EMAIL_RE.replace_all(&redacted, EMAIL_SENTINEL).into_owned();

    // Exact-substring mask of the captured phone, not a second pattern run.
    if let Some(ref phone) = phone {
        redacted = redacted.replace(phone.as_str(), PHONE_SENTINEL);
    }

    redacted = ADDRESS_RE
        .replace_all(&redacted, ADDRESS_SENTINEL)
        .into_owned();

    Redaction {
        text: redacted,
        email,
        phone,
    }
}

/// First phone-shaped match that survives the year guard.
///
/// A match beginning with `1` or `2` immediately followed by three digits is
/// rejected so standalone years ("2020") and date ranges ("2021 à 2022")
/// are not mistaken for phone numbers. Genuine phone numbers starting with
/// those digits are misclassified too.
fn first_phone_candidate(text: &str) -> Option<String> {
    for m in PHONE_RE.find_iter(text) {
        // Reproduces the original lookbehind: no digit directly before.
        if m.start() > 0 {
            let preceding = text.as_bytes()[m.start() - 1];
            if preceding.is_ascii_digit() {
                continue;
            }
        }
        if looks_like_year_run(m.as_str()) {
            continue;
        }
        return Some(m.as_str().to_string());
    }
    None
}

fn looks_like_year_run(candidate: &str) -> bool {
    let bytes = candidate.as_bytes();
    bytes.len() >= 4
        && (bytes[0] == b'1' || bytes[0] == b'2')
        && bytes[1..4].iter().all(u8::is_ascii_digit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_email_extracted_and_masked() {
        let r = redact("Contact: jean.dupont@example.com for details", &[]);
        assert_eq!(r.email.as_deref(), Some("jean.dupont@example.com"));
        assert!(!r.text.contains("jean.dupont@example.com"));
        assert!(r.text.contains(EMAIL_SENTINEL));
    }

    #[test]
    fn test_phone_extracted_and_masked() {
        let r = redact("Tél: 06 12 34 56 78 — disponible", &[]);
        assert_eq!(r.phone.as_deref(), Some("06 12 34 56 78"));
        assert!(!r.text.contains("06 12 34 56 78"));
        assert!(r.text.contains(PHONE_SENTINEL));
    }

    #[test]
    fn test_standalone_year_is_not_a_phone() {
        let r = redact("Diplômé en 2024", &[]);
        assert_eq!(r.phone, None);
    }

    #[test]
    fn test_date_range_is_not_a_phone() {
        let r = redact("Formation 2021 à 2022, puis poste en CDI", &[]);
        assert_eq!(r.phone, None);
    }

    #[test]
    fn test_year_joined_range_is_not_a_phone() {
        let r = redact("Master 2018-2021 Data Science", &[]);
        assert_eq!(r.phone, None);
    }

    #[test]
    fn test_names_masked_case_insensitive() {
        let r = redact("MARIE curie est Marie", &tokens(&["Marie", "Curie"]));
        assert_eq!(
            r.text,
            "[REDACTED-NAME] [REDACTED-NAME] est [REDACTED-NAME]"
        );
    }

    #[test]
    fn test_overlapping_names_longest_first() {
        let r = redact(
            "Jean-Paul et Jean travaillent ensemble",
            &tokens(&["Jean", "Jean-Paul"]),
        );
        // No partial "-Paul" remnant may survive.
        assert!(!r.text.contains("-Paul"));
        assert_eq!(
            r.text,
            "[REDACTED-NAME] et [REDACTED-NAME] travaillent ensemble"
        );
    }

    #[test]
    fn test_address_masked() {
        let r = redact("Habite 12 rue de la Paix, Paris 75002 depuis 2019", &[]);
        assert!(r.text.contains(ADDRESS_SENTINEL));
        assert!(!r.text.contains("rue de la Paix"));
    }

    #[test]
    fn test_extracted_values_absent_from_redacted_text() {
        let r = redact(
            "Marie Curie — marie@x.com — 06 12 34 56 78",
            &tokens(&["Marie", "Curie"]),
        );
        let email = r.email.clone().unwrap();
        let phone = r.phone.clone().unwrap();
        assert!(!r.text.contains(&email));
        assert!(!r.text.contains(&phone));
    }

    #[test]
    fn test_redaction_is_idempotent() {
        let names = tokens(&["Marie", "Curie"]);
        let first = redact(
            "Marie Curie, marie@x.com, 06 12 34 56 78, 5 avenue Foch, Lyon 69006",
            &names,
        );
        let second = redact(&first.text, &names);
        assert_eq!(second.text, first.text);
        assert_eq!(second.email, None);
        assert_eq!(second.phone, None);
    }

    #[test]
    fn test_empty_text_passes_through() {
        let r = redact("", &tokens(&["Marie"]));
        assert_eq!(r.text, "");
        assert_eq!(r.email, None);
        assert_eq!(r.phone, None);
    }
}
