use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Regex patterns for PII that may appear in payout destinations or driver errors.
pub struct PiiRegexRegistry;

impl PiiRegexRegistry {
    pub fn email() -> &'static Regex {
        static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
            #[allow(clippy::unwrap_used)]
            Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{1,}\b").unwrap()
        });
        &EMAIL_REGEX
    }

    /// IBAN-like or long digit runs (card / bank account numbers).
    pub fn account_number() -> &'static Regex {
        static ACCOUNT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
            #[allow(clippy::unwrap_used)]
            Regex::new(r"\b(?:[A-Z]{2}\d{2}[A-Z0-9]{8,30}|\d{8,19})\b").unwrap()
        });
        &ACCOUNT_REGEX
    }
}

/// Masks e-mail local parts (first char kept) and all but the last four
/// characters of account numbers.
pub fn redact(input: &str) -> String {
    let emails = PiiRegexRegistry::email().replace_all(input, |caps: &regex::Captures| {
        let full = &caps[0];
        match full.find('@') {
            Some(0) | None => full.to_string(),
            Some(at) => format!("{}***{}", &full[..1], &full[at..]),
        }
    });

    PiiRegexRegistry::account_number()
        .replace_all(&emails, |caps: &regex::Captures| {
            let full = &caps[0];
            let tail = &full[full.len().saturating_sub(4)..];
            format!("****{tail}")
        })
        .into_owned()
}

/// Display wrapper that redacts on format, for use in `tracing` fields.
pub struct Redacted<'a>(pub &'a str);

impl fmt::Display for Redacted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&redact(self.0))
    }
}
