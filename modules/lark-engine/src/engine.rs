use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use tracing::{debug, info, warn};

use lark_common::{
    FilterRecord, LarkResult, MatchResult, ResolvedMood, SelectionConfig, SelectionMode, Severity,
};

use crate::catalogue::{CatalogueAudit, CatalogueIndex, CatalogueSource, EntryFilter};
use crate::classifier::NeedClassifier;
use crate::resolver::MoodResolver;
use crate::selector::Selector;
use crate::taxonomy::{Taxonomy, TaxonomyConfig};

/// One immutable, fully validated view of taxonomy + catalogue, with the
/// request pipeline on top. Shared across requests behind an `Arc`.
#[derive(Debug)]
pub struct Engine {
    taxonomy: Taxonomy,
    classifier: NeedClassifier,
    catalogue: CatalogueIndex,
    selection: SelectionConfig,
    loaded_at: DateTime<Utc>,
}

impl Engine {
    pub fn new(
        config: &TaxonomyConfig,
        source: &dyn CatalogueSource,
        selection: SelectionConfig,
    ) -> LarkResult<Self> {
        let taxonomy = Taxonomy::from_config(config)?;
        let classifier = NeedClassifier::from_config(&config.keywords)?;
        let catalogue = CatalogueIndex::load(source, &taxonomy)?;
        Ok(Self::from_parts(taxonomy, classifier, catalogue, selection))
    }

    pub fn from_parts(
        taxonomy: Taxonomy,
        classifier: NeedClassifier,
        catalogue: CatalogueIndex,
        selection: SelectionConfig,
    ) -> Self {
        let audit = catalogue.audit(&taxonomy);
        for tag in &audit.tags_without_entries {
            warn!(tag = %tag, "Catalogue has no entries for tag");
        }
        for cluster in &audit.clusters_without_refuge {
            warn!(
                cluster = %cluster,
                "Crisis-eligible need cluster has no refuge entries; crisis requests will skip it"
            );
        }
        info!(
            tags = taxonomy.tags().len(),
            entries = catalogue.len(),
            clean = audit.is_clean(),
            "Engine snapshot ready"
        );
        Self {
            taxonomy,
            classifier,
            catalogue,
            selection,
            loaded_at: Utc::now(),
        }
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn catalogue(&self) -> &CatalogueIndex {
        &self.catalogue
    }

    pub fn selection(&self) -> SelectionConfig {
        self.selection
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn resolve(&self, phrase: &str) -> Option<ResolvedMood> {
        MoodResolver::new(&self.taxonomy).resolve(phrase)
    }

    pub fn classify(&self, text: &str) -> Severity {
        self.classifier.classify(text)
    }

    pub fn audit(&self) -> CatalogueAudit {
        self.catalogue.audit(&self.taxonomy)
    }

    /// Run one request.
    ///
    /// Both the raw text and the mood phrase are scanned for sensitive
    /// content first; any sensitive tier routes to the care pathway.
    /// Otherwise a resolved, non-hedging mood gets standard selection and
    /// everything else gets a wildcard draw. Never fails: an empty result is
    /// the "nothing found" outcome.
    pub fn recommend<R: Rng + ?Sized>(
        &self,
        filters: &FilterRecord,
        today: NaiveDate,
        rng: &mut R,
    ) -> MatchResult {
        let scanned = [filters.raw_text.as_deref(), filters.mood.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let severity = self.classifier.classify(&scanned);
        let filter = EntryFilter::new(filters, &self.taxonomy, today);
        let selector = Selector::new(&self.taxonomy, &self.catalogue, self.selection);

        let result = if severity.tier.is_sensitive() {
            self.care_pathway(filters, severity, &selector, &filter, rng)
        } else {
            self.mood_match(filters, severity, &selector, &filter, rng)
        };

        debug!(
            mode = ?result.mode,
            tier = %result.severity.tier,
            mood = ?result.mood.as_ref().map(|m| m.tag.as_str()),
            picks = ?result.entry_ids(),
            "Recommendation built"
        );
        result
    }

    /// The mood a sensitive request literally asked for, from the mood
    /// phrase or failing that the raw text. Only ever used as an exclusion.
    fn literal_mood(&self, filters: &FilterRecord) -> Option<ResolvedMood> {
        let resolver = MoodResolver::new(&self.taxonomy);
        [filters.mood.as_deref(), filters.raw_text.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|text| resolver.resolve(text))
    }

    fn care_pathway<R: Rng + ?Sized>(
        &self,
        filters: &FilterRecord,
        severity: Severity,
        selector: &Selector<'_>,
        filter: &EntryFilter<'_>,
        rng: &mut R,
    ) -> MatchResult {
        let mood = self.literal_mood(filters);
        let picks = selector.care(severity.tier, mood.as_ref().map(|m| &m.tag), filter, rng);
        MatchResult {
            mode: SelectionMode::CarePathway,
            severity,
            mood,
            picks,
        }
    }

    fn mood_match<R: Rng + ?Sized>(
        &self,
        filters: &FilterRecord,
        severity: Severity,
        selector: &Selector<'_>,
        filter: &EntryFilter<'_>,
        rng: &mut R,
    ) -> MatchResult {
        let phrase = filters.mood.as_deref().unwrap_or_default();
        let resolver = MoodResolver::new(&self.taxonomy);
        match resolver.resolve(phrase) {
            Some(mood) if !resolver.is_hedging(phrase) => MatchResult {
                mode: SelectionMode::Standard,
                picks: selector.standard(&mood.tag, filter, rng),
                severity,
                mood: Some(mood),
            },
            _ => MatchResult {
                mode: SelectionMode::Wildcard,
                picks: selector.wildcard(filter, rng),
                severity,
                mood: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::tests::MINI_CATALOGUE;
    use crate::catalogue::StaticSource;
    use crate::taxonomy::tests::MINI;
    use lark_common::SeverityTier;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn engine() -> Engine {
        Engine::new(
            &TaxonomyConfig::parse(MINI).unwrap(),
            &StaticSource::from_json(MINI_CATALOGUE).unwrap(),
            SelectionConfig::default(),
        )
        .unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 14).unwrap()
    }

    fn request(mood: Option<&str>, raw_text: Option<&str>) -> FilterRecord {
        FilterRecord {
            mood: mood.map(str::to_string),
            raw_text: raw_text.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn resolved_mood_runs_standard_mode() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(1);
        let result = engine.recommend(&request(Some("witchy"), None), today(), &mut rng);
        assert_eq!(result.mode, SelectionMode::Standard);
        assert_eq!(result.mood.unwrap().tag.as_str(), "witchy_wild");
        assert_eq!(result.picks.len(), 3);
    }

    #[test]
    fn unresolved_or_hedging_phrase_runs_wildcard_mode() {
        let engine = engine();
        for phrase in [Some("asdf"), Some("surprise me"), Some(""), None] {
            let mut rng = StdRng::seed_from_u64(2);
            let result = engine.recommend(&request(phrase, None), today(), &mut rng);
            assert_eq!(result.mode, SelectionMode::Wildcard, "{phrase:?}");
            assert_eq!(result.severity.tier, SeverityTier::None);
            assert!(result.mood.is_none());
        }
    }

    #[test]
    fn sensitive_raw_text_overrides_the_mood() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(3);
        let result = engine.recommend(
            &request(Some("haunted"), Some("i want to disappear, something haunted")),
            today(),
            &mut rng,
        );
        assert_eq!(result.mode, SelectionMode::CarePathway);
        assert_eq!(result.severity.tier, SeverityTier::Distress);
        assert!(result.requires_resources());
        assert!(result.picks.iter().all(|p| !p.entry.has_tag("witchy_wild")));
    }

    #[test]
    fn sensitive_mood_phrase_is_scanned_too() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(4);
        let result = engine.recommend(&request(Some("lonely"), None), today(), &mut rng);
        assert_eq!(result.mode, SelectionMode::CarePathway);
        assert_eq!(result.severity.tier, SeverityTier::Melancholy);
        assert!(!result.requires_resources());
    }
}
