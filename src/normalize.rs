//! # Name Normalization
//!
//! Maps display strings to comparison keys so that records can be matched
//! across sources that disagree on casing, punctuation, and spacing.

/// Normalize a display name into a comparison key.
///
/// The key is lower-cased, punctuation is dropped, and whitespace runs are
/// collapsed to a single space with no leading or trailing space. Only
/// letters, digits, and single spaces survive. Unicode alphanumerics are
/// kept, so non-Latin catalog names normalize to usable keys.
///
/// An empty or all-punctuation input normalizes to the empty string, which
/// is never a valid match key: two records that both lack a usable name are
/// not considered equal.
pub fn normalize_name(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    let mut pending_space = false;
    for ch in raw.chars() {
        if ch.is_whitespace() {
            pending_space = true;
        } else if ch.is_alphanumeric() {
            if pending_space && !key.is_empty() {
                key.push(' ');
            }
            pending_space = false;
            for lowered in ch.to_lowercase() {
                key.push(lowered);
            }
        }
        // Punctuation is dropped without terminating the current word run.
    }
    key
}
