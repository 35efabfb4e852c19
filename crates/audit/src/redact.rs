//! Message redaction for anything that leaves the process (responses, logs,
//! audit rows).
//!
//! Redaction is all-or-nothing: if a message looks like it carries a
//! credential, the whole message is replaced. Partial masking tends to leak
//! the interesting half.

/// Replacement text for a message that matched a sensitive pattern.
pub const REDACTED_MESSAGE: &str = "Invalid request";

const SENSITIVE_WORDS: [&str; 3] = ["password", "secret", "token"];

/// Keywords that are only sensitive when followed by an assignment
/// (`key = ...`, `authorization: ...`).
const ASSIGNED_WORDS: [&str; 2] = ["key", "authorization"];

/// Whether the message matches any sensitive pattern (case-insensitive).
pub fn contains_sensitive(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();

    SENSITIVE_WORDS.iter().any(|w| lower.contains(w))
        || ASSIGNED_WORDS.iter().any(|w| has_assignment_after(&lower, w))
        || has_bearer_credential(&lower)
}

/// Return the message unchanged, or [`REDACTED_MESSAGE`] if it matches.
pub fn redact(message: &str) -> String {
    if contains_sensitive(message) {
        REDACTED_MESSAGE.to_string()
    } else {
        message.to_string()
    }
}

/// `word`, optional whitespace, then `:` or `=`.
fn has_assignment_after(haystack: &str, word: &str) -> bool {
    haystack.match_indices(word).any(|(idx, _)| {
        let rest = haystack[idx + word.len()..].trim_start();
        rest.starts_with(':') || rest.starts_with('=')
    })
}

/// `bearer`, at least one whitespace, then a non-whitespace character.
fn has_bearer_credential(haystack: &str) -> bool {
    haystack.match_indices("bearer").any(|(idx, _)| {
        let rest = &haystack[idx + "bearer".len()..];
        let trimmed = rest.trim_start();
        trimmed.len() < rest.len() && !trimmed.is_empty()
    })
}
