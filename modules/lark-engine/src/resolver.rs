//! Free-text mood phrase -> canonical tag.
//!
//! Three strategies are tried in order: exact, substring (reported as
//! fuzzy) and stem. Within a strategy the first tag in taxonomy order wins.
//! Confidence is reported but never used to reject a match here.

use lark_common::text::{contains_phrase, normalize, tokens, truncate_chars};
use lark_common::{
    MatchStrategy, ResolvedMood, CONFIDENCE_EXACT, CONFIDENCE_STEM, CONFIDENCE_SUBSTRING,
    STEM_PREFIX_CHARS,
};

use crate::taxonomy::{Tag, Taxonomy};

pub struct MoodResolver<'a> {
    taxonomy: &'a Taxonomy,
}

impl<'a> MoodResolver<'a> {
    pub fn new(taxonomy: &'a Taxonomy) -> Self {
        Self { taxonomy }
    }

    pub fn resolve(&self, phrase: &str) -> Option<ResolvedMood> {
        let normalized = normalize(phrase);
        if normalized.is_empty() {
            return None;
        }
        let words = tokens(&normalized);
        let tags = self.taxonomy.tags();

        if let Some(tag) = tags.iter().find(|t| matches_exact(t, &normalized)) {
            return Some(resolved(tag, CONFIDENCE_EXACT, MatchStrategy::Exact));
        }

        if let Some(tag) = tags
            .iter()
            .find(|t| t.forms.iter().any(|f| normalized.contains(f.as_str())))
        {
            return Some(resolved(tag, CONFIDENCE_SUBSTRING, MatchStrategy::Fuzzy));
        }

        let stems: Vec<&str> = words
            .iter()
            .map(|w| truncate_chars(w, STEM_PREFIX_CHARS))
            .collect();
        if let Some(tag) = tags.iter().find(|t| {
            t.forms
                .iter()
                .map(|f| truncate_chars(f, STEM_PREFIX_CHARS))
                .any(|f| stems.contains(&f))
        }) {
            return Some(resolved(tag, CONFIDENCE_STEM, MatchStrategy::Stem));
        }

        None
    }

    /// True when the phrase signals indecision: empty, or made up entirely
    /// of hedge phrases ("surprise me", "I don't know, whatever").
    pub fn is_hedging(&self, phrase: &str) -> bool {
        let normalized = normalize(phrase);
        if normalized.is_empty() {
            return true;
        }

        // Longest hedges first so "surprise me" is consumed before "surprise".
        let mut hedges: Vec<&String> = self.taxonomy.hedges().iter().collect();
        hedges.sort_by_key(|h| std::cmp::Reverse(h.len()));

        let mut remaining = format!(" {normalized} ");
        for hedge in hedges {
            let needle = format!(" {hedge} ");
            while remaining.contains(&needle) {
                remaining = remaining.replacen(&needle, " ", 1);
            }
        }
        remaining.trim().is_empty()
    }
}

/// The whole phrase equals a form, or the form appears as a run of whole
/// words ("spoken word" in "some spoken word tonight").
fn matches_exact(tag: &Tag, phrase: &str) -> bool {
    tag.forms.iter().any(|f| contains_phrase(phrase, f))
}

fn resolved(tag: &Tag, confidence: f32, strategy: MatchStrategy) -> ResolvedMood {
    ResolvedMood {
        tag: tag.id.clone(),
        confidence,
        strategy,
    }
}
