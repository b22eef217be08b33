//! Delimited label lists as stored in text columns.
//!
//! Lists are written as `", "`-joined labels. Reading accepts either commas
//! or newlines as separators, since onboarding triggers are typed free-form.

pub const SEPARATOR: &str = ", ";

pub fn is_delimiter(c: char) -> bool {
    c == ',' || c == '\n' || c == '\r'
}

/// Split a delimited list, trimming labels and dropping empty ones.
pub fn split(raw: &str) -> Vec<String> {
    raw.split(is_delimiter)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join<S: AsRef<str>>(labels: &[S]) -> String {
    labels
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}
