//! Gap filtering.
//!
//! Aligners pad sequences with gap characters; external tools expect raw
//! sequences, so gaps (and optionally ambiguity codes) are stripped first.

/// Characters removed when no explicit set is given.
pub const DEFAULT_GAP_CHARS: &str = "-";

/// Returns `sequence` with every character listed in `chars` removed.
///
/// Each character of `chars` is filtered on its own: `"-N"` removes all
/// `-` and all `N`, not the substring `-N`.
pub fn ungap(sequence: &str, chars: &str) -> String {
    sequence.chars().filter(|c| !chars.contains(*c)).collect()
}
