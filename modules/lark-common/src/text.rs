use regex::Regex;
use std::sync::LazyLock;

static APOSTROPHE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"['\x{2018}\x{2019}`]").unwrap());
static NON_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}]+").unwrap());

/// Lowercase, drop apostrophes ("can't" -> "cant"), collapse every other
/// non-alphanumeric run to a single space and trim.
///
/// Phrases, synonyms and keywords all go through this so comparisons are
/// made between like forms.
pub fn normalize(text: &str) -> String {
    let lower = text.to_lowercase();
    let no_apostrophes = APOSTROPHE_RE.replace_all(&lower, "");
    NON_WORD_RE
        .replace_all(&no_apostrophes, " ")
        .trim()
        .to_string()
}

/// Split normalized text into tokens.
pub fn tokens(normalized: &str) -> Vec<&str> {
    normalized.split(' ').filter(|t| !t.is_empty()).collect()
}

/// Canonical area identifier: "Bethnal Green" -> "bethnal_green".
/// An ampersand reads as "and", so "Elephant & Castle" and
/// "Elephant and Castle" share one id.
pub fn normalize_area(area: &str) -> String {
    normalize(&area.replace('&', " and ")).replace(' ', "_")
}

/// First `n` characters (not bytes) of `s`.
pub fn truncate_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// True if `needle` occurs in `haystack` as a whole-token sequence.
/// Both sides are expected to be normalized already.
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let padded = format!(" {haystack} ");
    padded.contains(&format!(" {needle} "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_punctuation_and_apostrophes() {
        assert_eq!(normalize("  Witchy & Wild!! "), "witchy wild");
        assert_eq!(normalize("I can\u{2019}t go on"), "i cant go on");
        assert_eq!(normalize("self-harm"), "self harm");
        assert_eq!(normalize("witchy_wild"), "witchy wild");
    }

    #[test]
    fn normalize_handles_empty_and_garbage() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("?!..."), "");
        assert!(tokens(&normalize("   ")).is_empty());
    }

    #[test]
    fn ampersand_in_area_reads_as_and() {
        assert_eq!(normalize_area("Elephant & Castle"), "elephant_and_castle");
        assert_eq!(normalize_area("Elephant and Castle"), "elephant_and_castle");
        assert_eq!(normalize_area("Elephant&Castle"), "elephant_and_castle");
    }

    #[test]
    fn area_ids_use_underscores() {
        assert_eq!(normalize_area("Bethnal Green"), "bethnal_green");
        assert_eq!(normalize_area("east_london"), "east_london");
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate_chars("melancholic", 8), "melancho");
        assert_eq!(truncate_chars("sad", 8), "sad");
        assert_eq!(truncate_chars("café-bar", 4), "café");
    }

    #[test]
    fn phrase_containment_respects_token_boundaries() {
        assert!(contains_phrase("please surprise me now", "surprise me"));
        assert!(!contains_phrase("blowout", "low"));
        assert!(!contains_phrase("anything", ""));
    }
}
