//! Read-only catalogue of recommendable entries, indexed by tag.
//!
//! Entries arrive from a [`CatalogueSource`] as loosely-typed
//! [`RawEntry`] records and are validated all-or-nothing: the first bad
//! entry aborts the load. After that the index never changes; reloads build
//! a fresh one (see `store`).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use lark_common::text::normalize_area;
use lark_common::{
    Availability, Budget, CapacityClass, CatalogueEntry, CatalogueError, FilterRecord, GroupSize,
    PriceTier, SeverityTier, TagId,
};

use crate::taxonomy::Taxonomy;

const MAX_TAGS: usize = 4;
const COMPOUND_SEPARATORS: &[char] = &[',', '/', ';', '|', '+'];

/// An entry as supplied by the catalogue source, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntry {
    pub id: Option<String>,
    pub name: Option<String>,
    pub tags: Option<Vec<TagId>>,
    #[serde(alias = "location")]
    pub area: Option<String>,
    pub price: Option<PriceTier>,
    pub capacity: Option<CapacityClass>,
    #[serde(default)]
    pub availability: Option<Availability>,
    #[serde(default)]
    pub refuge: bool,
}

/// Where catalogue entries come from.
pub trait CatalogueSource: Send + Sync {
    fn fetch(&self) -> Result<Vec<RawEntry>, CatalogueError>;

    /// Human-readable origin for logs.
    fn describe(&self) -> String;
}

/// A JSON file holding an array of entries.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogueSource for JsonFileSource {
    fn fetch(&self) -> Result<Vec<RawEntry>, CatalogueError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| CatalogueError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Entries held in memory. Used by tests and embedders that already have data.
#[derive(Default)]
pub struct StaticSource {
    entries: Vec<RawEntry>,
}

impl StaticSource {
    pub fn new(entries: Vec<RawEntry>) -> Self {
        Self { entries }
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogueError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }
}

impl CatalogueSource for StaticSource {
    fn fetch(&self) -> Result<Vec<RawEntry>, CatalogueError> {
        Ok(self.entries.clone())
    }

    fn describe(&self) -> String {
        format!("static({} entries)", self.entries.len())
    }
}

// --- Filtering ---

#[derive(Debug, Clone)]
enum LocationMatch<'a> {
    Area(String),
    Region(&'a HashSet<String>),
}

/// A [`FilterRecord`] compiled against a taxonomy (for region names) and a
/// reference date (for relative time constraints).
///
/// Each dimension is an independent predicate; a dimension the record
/// leaves empty does not filter at all.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter<'a> {
    location: Option<LocationMatch<'a>>,
    budget: Option<Budget>,
    group: Option<GroupSize>,
    dates: Option<Vec<NaiveDate>>,
}

impl<'a> EntryFilter<'a> {
    pub fn new(filters: &FilterRecord, taxonomy: &'a Taxonomy, today: NaiveDate) -> Self {
        let location = filters
            .location
            .as_deref()
            .map(normalize_area)
            .filter(|area| !area.is_empty())
            .map(|area| match taxonomy.region(&area) {
                Some(areas) => LocationMatch::Region(areas),
                None => LocationMatch::Area(area),
            });

        Self {
            location,
            budget: filters.budget,
            group: filters.group,
            dates: filters.time.map(|t| t.dates(today)),
        }
    }

    /// Filter that lets every entry through.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn allows(&self, entry: &CatalogueEntry) -> bool {
        self.location_ok(entry) && self.budget_ok(entry) && self.group_ok(entry) && self.time_ok(entry)
    }

    fn location_ok(&self, entry: &CatalogueEntry) -> bool {
        match &self.location {
            None => true,
            Some(LocationMatch::Area(area)) => entry.area == *area,
            Some(LocationMatch::Region(areas)) => areas.contains(&entry.area),
        }
    }

    fn budget_ok(&self, entry: &CatalogueEntry) -> bool {
        match self.budget {
            Some(Budget::Low) => matches!(entry.price, PriceTier::Free | PriceTier::Low),
            Some(Budget::High) | None => true,
        }
    }

    fn group_ok(&self, entry: &CatalogueEntry) -> bool {
        match self.group {
            Some(GroupSize::Solo) => entry.capacity != CapacityClass::SmallGroup,
            Some(GroupSize::Group) | None => true,
        }
    }

    fn time_ok(&self, entry: &CatalogueEntry) -> bool {
        match (&self.dates, &entry.availability) {
            (Some(dates), Some(availability)) => dates.iter().any(|d| availability.is_open_on(*d)),
            _ => true,
        }
    }
}

// --- Index ---

#[derive(Debug, Default)]
pub struct CatalogueIndex {
    entries: Vec<Arc<CatalogueEntry>>,
    by_tag: HashMap<TagId, Vec<usize>>,
    by_id: HashMap<String, usize>,
}

impl CatalogueIndex {
    pub fn load(source: &dyn CatalogueSource, taxonomy: &Taxonomy) -> Result<Self, CatalogueError> {
        let raw = source.fetch()?;
        let index = Self::build(raw, taxonomy)?;
        info!(
            source = %source.describe(),
            entries = index.len(),
            refuge = index.refuge_entries().len(),
            "Catalogue loaded"
        );
        Ok(index)
    }

    /// Validate and index raw entries. Fails on the first invalid entry.
    pub fn build(raw: Vec<RawEntry>, taxonomy: &Taxonomy) -> Result<Self, CatalogueError> {
        let mut entries = Vec::with_capacity(raw.len());
        let mut by_tag: HashMap<TagId, Vec<usize>> = HashMap::new();
        let mut by_id = HashMap::with_capacity(raw.len());

        for (index, raw) in raw.into_iter().enumerate() {
            let entry = validate(index, raw, taxonomy)?;
            let slot = entries.len();
            if by_id.insert(entry.id.clone(), slot).is_some() {
                return Err(CatalogueError::DuplicateId(entry.id));
            }
            for tag in &entry.tags {
                by_tag.entry(tag.clone()).or_default().push(slot);
            }
            entries.push(Arc::new(entry));
        }

        Ok(Self {
            entries,
            by_tag,
            by_id,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Arc<CatalogueEntry>] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&Arc<CatalogueEntry>> {
        self.by_id.get(id).map(|&i| &self.entries[i])
    }

    /// Entries carrying `tag`, in catalogue order.
    pub fn entries_for(&self, tag: &str) -> Vec<Arc<CatalogueEntry>> {
        self.by_tag
            .get(tag)
            .map(|slots| slots.iter().map(|&i| Arc::clone(&self.entries[i])).collect())
            .unwrap_or_default()
    }

    pub fn filter(&self, entries: &[Arc<CatalogueEntry>], filter: &EntryFilter<'_>) -> Vec<Arc<CatalogueEntry>> {
        entries
            .iter()
            .filter(|e| filter.allows(e))
            .cloned()
            .collect()
    }

    /// Convenience for `filter(entries_for(tag))`.
    pub fn eligible(&self, tag: &str, filter: &EntryFilter<'_>) -> Vec<Arc<CatalogueEntry>> {
        self.filter(&self.entries_for(tag), filter)
    }

    pub fn refuge_entries(&self) -> Vec<Arc<CatalogueEntry>> {
        self.entries.iter().filter(|e| e.refuge).cloned().collect()
    }

    /// Coverage gaps between this catalogue and the taxonomy.
    pub fn audit(&self, taxonomy: &Taxonomy) -> CatalogueAudit {
        let tags_without_entries: Vec<TagId> = taxonomy
            .tags()
            .iter()
            .filter(|t| !self.by_tag.contains_key(&t.id))
            .map(|t| t.id.clone())
            .collect();

        let refuge = self.refuge_entries();
        let clusters_without_refuge: Vec<String> = taxonomy
            .care_policy(SeverityTier::Crisis)
            .map(|policy| policy.clusters.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|name| taxonomy.cluster(name))
            .filter(|cluster| {
                !refuge
                    .iter()
                    .any(|e| e.tags.iter().any(|t| cluster.contains(t)))
            })
            .map(|cluster| cluster.name.clone())
            .collect();

        CatalogueAudit {
            entries: self.len(),
            refuge_entries: refuge.len(),
            tags_without_entries,
            clusters_without_refuge,
        }
    }
}

/// Result of [`CatalogueIndex::audit`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogueAudit {
    pub entries: usize,
    pub refuge_entries: usize,
    pub tags_without_entries: Vec<TagId>,
    /// Crisis-tier clusters with no refuge-flagged member entry.
    pub clusters_without_refuge: Vec<String>,
}

impl CatalogueAudit {
    pub fn is_clean(&self) -> bool {
        self.tags_without_entries.is_empty() && self.clusters_without_refuge.is_empty()
    }
}

fn validate(index: usize, raw: RawEntry, taxonomy: &Taxonomy) -> Result<CatalogueEntry, CatalogueError> {
    let id = match raw.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return Err(missing(index, "<no id>", "id")),
    };
    let name = raw
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| missing(index, &id, "name"))?;
    let raw_tags = raw.tags.ok_or_else(|| missing(index, &id, "tags"))?;
    let location = raw.area.ok_or_else(|| missing(index, &id, "area"))?;
    let price = raw.price.ok_or_else(|| missing(index, &id, "price"))?;
    let capacity = raw.capacity.ok_or_else(|| missing(index, &id, "capacity"))?;

    let mut tags: Vec<TagId> = Vec::with_capacity(raw_tags.len());
    for tag in raw_tags {
        if !taxonomy.contains(tag.as_str()) {
            return Err(CatalogueError::UnknownTag { id, tag });
        }
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    if tags.is_empty() || tags.len() > MAX_TAGS {
        return Err(CatalogueError::TagCount {
            id,
            count: tags.len(),
        });
    }

    if location.contains(COMPOUND_SEPARATORS) {
        return Err(CatalogueError::CompoundLocation { id, location });
    }
    let area = normalize_area(&location);
    if area.is_empty() {
        return Err(missing(index, &id, "area"));
    }

    Ok(CatalogueEntry {
        id,
        name,
        tags,
        area,
        price,
        capacity,
        availability: raw.availability,
        refuge: raw.refuge,
    })
}

fn missing(index: usize, id: &str, field: &'static str) -> CatalogueError {
    CatalogueError::MissingField {
        index,
        id: id.to_string(),
        field,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::taxonomy::tests::mini;
    use chrono::Weekday;
    use lark_common::TimeConstraint;

    /// Catalogue over the mini taxonomy. `sacred` has one refuge entry;
    /// `witchy_wild` has none.
    pub(crate) const MINI_CATALOGUE: &str = r#"[
        {"id": "w1", "name": "Moonlit Tarot", "tags": ["witchy_wild"], "area": "Hackney", "price": "low", "capacity": "solo_friendly"},
        {"id": "w2", "name": "Occult Bookshop Night", "tags": ["witchy_wild"], "area": "Soho", "price": "high", "capacity": "small_group",
         "availability": {"days": ["Fri", "Sat"]}},
        {"id": "g1", "name": "Grief Choir", "tags": ["grief_grace"], "area": "Bethnal Green", "price": "free", "capacity": "any", "refuge": true},
        {"id": "n1", "name": "Vintage Fair", "tags": ["nostalgic"], "area": "Camden", "price": "medium", "capacity": "any"},
        {"id": "s1", "name": "Evensong", "tags": ["sacred", "grief_grace"], "area": "Westminster", "price": "free", "capacity": "solo_friendly", "refuge": true}
    ]"#;

    pub(crate) fn mini_catalogue(taxonomy: &Taxonomy) -> CatalogueIndex {
        CatalogueIndex::load(&StaticSource::from_json(MINI_CATALOGUE).unwrap(), taxonomy).unwrap()
    }

    fn wednesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 14).unwrap()
    }

    fn ids(entries: &[Arc<CatalogueEntry>]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    fn build_one(json: &str) -> Result<CatalogueIndex, CatalogueError> {
        let taxonomy = mini();
        let raw: Vec<RawEntry> = serde_json::from_str(json)?;
        CatalogueIndex::build(raw, &taxonomy)
    }

    #[test]
    fn entries_are_indexed_by_every_tag() {
        let taxonomy = mini();
        let catalogue = mini_catalogue(&taxonomy);
        assert_eq!(catalogue.len(), 5);
        assert_eq!(ids(&catalogue.entries_for("grief_grace")), vec!["g1", "s1"]);
        assert_eq!(ids(&catalogue.entries_for("sacred")), vec!["s1"]);
        assert!(catalogue.entries_for("unknown").is_empty());
    }

    #[test]
    fn areas_are_normalized_at_load() {
        let taxonomy = mini();
        let catalogue = mini_catalogue(&taxonomy);
        assert_eq!(catalogue.get("g1").unwrap().area, "bethnal_green");
    }

    #[test]
    fn refuge_entries_are_flagged_only() {
        let taxonomy = mini();
        let catalogue = mini_catalogue(&taxonomy);
        assert_eq!(ids(&catalogue.refuge_entries()), vec!["g1", "s1"]);
    }

    #[test]
    fn missing_required_field_fails_fast() {
        let err = build_one(r#"[{"id": "x", "name": "X", "tags": ["sacred"], "area": "Soho", "capacity": "any"}]"#)
            .unwrap_err();
        assert!(matches!(err, CatalogueError::MissingField { field: "price", .. }));
    }

    #[test]
    fn missing_id_is_reported_by_position() {
        let err = build_one(r#"[{"name": "X", "tags": ["sacred"], "area": "Soho", "price": "free", "capacity": "any"}]"#)
            .unwrap_err();
        assert!(matches!(err, CatalogueError::MissingField { index: 0, field: "id", .. }));
    }

    #[test]
    fn entry_without_tags_is_rejected() {
        let err = build_one(r#"[{"id": "x", "name": "X", "tags": [], "area": "Soho", "price": "free", "capacity": "any"}]"#)
            .unwrap_err();
        assert!(matches!(err, CatalogueError::TagCount { count: 0, .. }));
    }

    #[test]
    fn entry_with_unknown_tag_is_rejected() {
        let err = build_one(r#"[{"id": "x", "name": "X", "tags": ["opera"], "area": "Soho", "price": "free", "capacity": "any"}]"#)
            .unwrap_err();
        assert!(matches!(err, CatalogueError::UnknownTag { .. }));
    }

    #[test]
    fn compound_location_is_rejected() {
        let err = build_one(
            r#"[{"id": "x", "name": "X", "tags": ["sacred"], "area": "Hackney / Dalston", "price": "free", "capacity": "any"}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, CatalogueError::CompoundLocation { .. }));
    }

    #[test]
    fn ampersand_area_is_one_location_in_either_spelling() {
        let taxonomy = mini();
        let raw: Vec<RawEntry> = serde_json::from_str(
            r#"[
                {"id": "amp", "name": "A", "tags": ["sacred"], "area": "Elephant & Castle", "price": "free", "capacity": "any"},
                {"id": "word", "name": "W", "tags": ["sacred"], "area": "Elephant and Castle", "price": "free", "capacity": "any"}
            ]"#,
        )
        .unwrap();
        let catalogue = CatalogueIndex::build(raw, &taxonomy).unwrap();
        assert_eq!(catalogue.get("amp").unwrap().area, "elephant_and_castle");

        for location in ["Elephant & Castle", "elephant and castle"] {
            let record = FilterRecord {
                location: Some(location.to_string()),
                ..Default::default()
            };
            let filter = EntryFilter::new(&record, &taxonomy, wednesday());
            assert_eq!(ids(&catalogue.filter(catalogue.entries(), &filter)), vec!["amp", "word"]);
        }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let entry = r#"{"id": "x", "name": "X", "tags": ["sacred"], "area": "Soho", "price": "free", "capacity": "any"}"#;
        let err = build_one(&format!("[{entry}, {entry}]")).unwrap_err();
        assert!(matches!(err, CatalogueError::DuplicateId(id) if id == "x"));
    }

    #[test]
    fn location_matches_exact_area_never_substring() {
        let taxonomy = mini();
        let catalogue = mini_catalogue(&taxonomy);
        let filter = |location: &str| {
            let record = FilterRecord {
                location: Some(location.to_string()),
                ..Default::default()
            };
            let filter = EntryFilter::new(&record, &taxonomy, wednesday());
            catalogue
                .filter(catalogue.entries(), &filter)
                .iter()
                .map(|e| e.id.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(filter("Bethnal Green"), vec!["g1"]);
        assert!(filter("Bethnal").is_empty());
        assert!(filter("Green").is_empty());
    }

    #[test]
    fn region_constraint_matches_member_areas() {
        let taxonomy = mini();
        let catalogue = mini_catalogue(&taxonomy);
        let record = FilterRecord {
            location: Some("east london".to_string()),
            ..Default::default()
        };
        let filter = EntryFilter::new(&record, &taxonomy, wednesday());
        assert_eq!(ids(&catalogue.filter(catalogue.entries(), &filter)), vec!["w1", "g1"]);
    }

    #[test]
    fn low_budget_keeps_free_and_low_only() {
        let taxonomy = mini();
        let catalogue = mini_catalogue(&taxonomy);
        let record = FilterRecord {
            budget: Some(Budget::Low),
            ..Default::default()
        };
        let filter = EntryFilter::new(&record, &taxonomy, wednesday());
        assert_eq!(ids(&catalogue.filter(catalogue.entries(), &filter)), vec!["w1", "g1", "s1"]);
    }

    #[test]
    fn solo_requests_exclude_group_only_entries() {
        let taxonomy = mini();
        let catalogue = mini_catalogue(&taxonomy);
        let record = FilterRecord {
            group: Some(GroupSize::Solo),
            ..Default::default()
        };
        let filter = EntryFilter::new(&record, &taxonomy, wednesday());
        assert_eq!(ids(&catalogue.eligible("witchy_wild", &filter)), vec!["w1"]);
    }

    #[test]
    fn time_constraint_checks_availability_when_present() {
        let taxonomy = mini();
        let catalogue = mini_catalogue(&taxonomy);
        let at = |time: TimeConstraint| {
            let record = FilterRecord {
                time: Some(time),
                ..Default::default()
            };
            let filter = EntryFilter::new(&record, &taxonomy, wednesday());
            catalogue
                .eligible("witchy_wild", &filter)
                .iter()
                .map(|e| e.id.clone())
                .collect::<Vec<_>>()
        };
        // w1 has no availability predicate and always passes
        assert_eq!(at(TimeConstraint::Tonight), vec!["w1"]);
        assert_eq!(at(TimeConstraint::Weekend), vec!["w1", "w2"]);
        assert_eq!(at(TimeConstraint::Day(Weekday::Fri)), vec!["w1", "w2"]);
    }

    #[test]
    fn absent_constraints_do_not_filter() {
        let taxonomy = mini();
        let catalogue = mini_catalogue(&taxonomy);
        let filter = EntryFilter::new(&FilterRecord::default(), &taxonomy, wednesday());
        assert_eq!(catalogue.filter(catalogue.entries(), &filter).len(), 5);
        assert_eq!(catalogue.filter(catalogue.entries(), &EntryFilter::any()).len(), 5);
    }

    #[test]
    fn audit_reports_gaps() {
        let taxonomy = mini();
        let catalogue = mini_catalogue(&taxonomy);
        let audit = catalogue.audit(&taxonomy);
        assert!(audit.tags_without_entries.is_empty());
        assert!(audit.clusters_without_refuge.is_empty());
        assert!(audit.is_clean());

        let sparse = build_one(
            r#"[{"id": "x", "name": "X", "tags": ["witchy_wild"], "area": "Soho", "price": "free", "capacity": "any"}]"#,
        )
        .unwrap();
        let audit = sparse.audit(&taxonomy);
        assert_eq!(audit.tags_without_entries.len(), 3);
        assert_eq!(audit.clusters_without_refuge, vec!["to_rest".to_string()]);
    }

    #[test]
    fn json_file_source_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalogue.json");
        std::fs::write(&path, MINI_CATALOGUE).unwrap();

        let taxonomy = mini();
        let catalogue = CatalogueIndex::load(&JsonFileSource::new(&path), &taxonomy).unwrap();
        assert_eq!(catalogue.len(), 5);

        let missing = JsonFileSource::new(dir.path().join("nope.json"));
        assert!(matches!(missing.fetch().unwrap_err(), CatalogueError::Io { .. }));
    }
}
