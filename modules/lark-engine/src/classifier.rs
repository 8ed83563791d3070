//! Sensitive-content classification.
//!
//! Tiers are an ordered list of (tier, keywords) pairs evaluated with early
//! exit, most severe first. Text that matches a crisis keyword is crisis
//! regardless of what else it contains.

use std::collections::HashMap;

use tracing::debug;

use lark_common::text::normalize;
use lark_common::{Severity, SeverityTier, TaxonomyError};

use crate::taxonomy::KeywordSpec;

#[derive(Debug, Clone)]
struct KeywordTier {
    tier: SeverityTier,
    keywords: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NeedClassifier {
    tiers: Vec<KeywordTier>,
}

impl NeedClassifier {
    /// Build from configured keyword sets. Sets must be disjoint after
    /// normalization; a keyword listed under two tiers is a config error.
    pub fn from_config(spec: &KeywordSpec) -> Result<Self, TaxonomyError> {
        let ordered = [
            (SeverityTier::Crisis, &spec.crisis),
            (SeverityTier::Distress, &spec.distress),
            (SeverityTier::Melancholy, &spec.melancholy),
        ];

        let mut owner: HashMap<String, SeverityTier> = HashMap::new();
        let mut tiers = Vec::with_capacity(ordered.len());
        for (tier, raw) in ordered {
            let mut keywords = Vec::with_capacity(raw.len());
            for keyword in raw {
                let normalized = normalize(keyword);
                if normalized.is_empty() {
                    return Err(TaxonomyError::EmptyKeyword(tier));
                }
                match owner.get(&normalized) {
                    Some(&first) if first != tier => {
                        return Err(TaxonomyError::OverlappingKeyword {
                            keyword: normalized,
                            first,
                            second: tier,
                        });
                    }
                    Some(_) => continue,
                    None => {
                        owner.insert(normalized.clone(), tier);
                        keywords.push(normalized);
                    }
                }
            }
            tiers.push(KeywordTier { tier, keywords });
        }

        Ok(Self { tiers })
    }

    /// Classify free text. Never fails; empty text is `none`.
    pub fn classify(&self, text: &str) -> Severity {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Severity::none();
        }

        for tier in &self.tiers {
            let matched: Vec<String> = tier
                .keywords
                .iter()
                .filter(|k| normalized.contains(k.as_str()))
                .cloned()
                .collect();
            if !matched.is_empty() {
                debug!(tier = %tier.tier, keywords = ?matched, "Sensitive content detected");
                return Severity {
                    tier: tier.tier,
                    keywords: matched,
                };
            }
        }

        Severity::none()
    }

    /// Keywords configured for a tier, normalized.
    pub fn keywords(&self, tier: SeverityTier) -> &[String] {
        self.tiers
            .iter()
            .find(|t| t.tier == tier)
            .map(|t| t.keywords.as_slice())
            .unwrap_or(&[])
    }
}
