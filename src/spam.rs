//! Spam heuristic for comment text.

use unicode_normalization::UnicodeNormalization;

/// True when the text changes under NFKD normalization.
///
/// Spam on the platform hides keywords behind compatibility variants
/// (full-width letters, ligatures, styled mathematical alphabets); those
/// decompose under NFKD while ordinary ASCII text is left untouched.
/// Precomposed accented text also decomposes and gets flagged - a known
/// false positive this heuristic accepts.
pub fn is_spam(text: &str) -> bool {
    let normalized: String = text.nfkd().collect();
    normalized != text
}
