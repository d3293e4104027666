//! Text normalization and posting fingerprints.
//!
//! A fingerprint is derived from the normalized title, company and location
//! joined with `|`. Combined with the company identity it forms the dedup key
//! of the job store.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static RE_NON_FINGERPRINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9|]+").unwrap());

/// Delimiter between fingerprint fields.
pub const FINGERPRINT_DELIMITER: char = '|';

/// NFKC-canonicalizes, trims, lowercases and collapses whitespace runs.
///
/// Idempotent: `normalize_text(&normalize_text(x)) == normalize_text(x)`.
pub fn normalize_text(s: &str) -> String {
    let canonical: String = s.nfkc().collect();
    let lowered = canonical.trim().to_lowercase();
    // Lowercasing can produce non-NFKC sequences for a few code points.
    let lowered: String = lowered.nfkc().collect();
    RE_WHITESPACE.replace_all(lowered.trim(), " ").into_owned()
}

/// Computes the dedup fingerprint of a posting.
///
/// Characters outside `[a-z0-9|]` are stripped after normalization, so two
/// triples that differ only in punctuation collapse to the same value.
pub fn fingerprint(title: &str, company: &str, location: &str) -> String {
    let base = format!(
        "{}{d}{}{d}{}",
        normalize_text(title),
        normalize_text(company),
        normalize_text(location),
        d = FINGERPRINT_DELIMITER
    );
    RE_NON_FINGERPRINT.replace_all(&base, "").into_owned()
}

/// Key used to drop duplicates across providers in aggregate mode.
pub fn listing_key(title: &str, company: &str) -> (String, String) {
    (normalize_text(title), normalize_text(company))
}
