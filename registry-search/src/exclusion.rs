//! Exclusion filtering of result rows.
//!
//! A row is excluded when any exclusion term occurs in its text, compared
//! case-insensitively. Terms are tested in order and the first match is
//! reported. No whitespace normalisation happens here.

/// Outcome of testing a row's text against the exclusion terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion<'a> {
    Keep,
    /// Excluded; carries the first matching term as supplied.
    Exclude(&'a str),
}

impl Exclusion<'_> {
    pub fn is_excluded(&self) -> bool {
        matches!(self, Self::Exclude(_))
    }
}

/// Test `text` against `terms`, short-circuiting on the first match.
pub fn check_exclusion<'a, S: AsRef<str>>(text: &str, terms: &'a [S]) -> Exclusion<'a> {
    let haystack = text.to_lowercase();
    terms
        .iter()
        .map(AsRef::as_ref)
        .find(|term| haystack.contains(&term.to_lowercase()))
        .map_or(Exclusion::Keep, Exclusion::Exclude)
}
