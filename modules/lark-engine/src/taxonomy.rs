//! Tag taxonomy: canonical tags, their synonyms, the adjacency graph,
//! need clusters, per-tier care policies, regions and hedge phrases.
//!
//! Built once from [`TaxonomyConfig`] and immutable afterwards. All
//! validation happens in [`Taxonomy::from_config`]; a malformed document is
//! a startup failure, never silently patched.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

use lark_common::text::{normalize, normalize_area};
use lark_common::{SeverityTier, TagId, TaxonomyError};

const BUILTIN_TAXONOMY: &str = include_str!("../data/taxonomy.toml");

const MIN_NEIGHBORS: usize = 2;
const MAX_NEIGHBORS: usize = 4;
const CLUSTER_SIZE: usize = 3;

// --- Configuration schema ---

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaxonomyConfig {
    pub tags: Vec<TagSpec>,
    #[serde(default)]
    pub needs: Vec<NeedClusterSpec>,
    pub keywords: KeywordSpec,
    pub care: CareSpec,
    #[serde(default)]
    pub regions: Vec<RegionSpec>,
    #[serde(default)]
    pub hedges: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagSpec {
    pub id: TagId,
    pub label: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    pub neighbors: Vec<TagId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NeedClusterSpec {
    pub name: String,
    pub tags: Vec<TagId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeywordSpec {
    pub crisis: Vec<String>,
    pub distress: Vec<String>,
    pub melancholy: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CareSpec {
    pub melancholy: CarePolicySpec,
    pub distress: CarePolicySpec,
    pub crisis: CarePolicySpec,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CarePolicySpec {
    pub clusters: Vec<String>,
    pub refuge: RefugePolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionSpec {
    pub name: String,
    pub areas: Vec<String>,
}

/// How refuge-flagged entries are treated when drawing for a care tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefugePolicy {
    /// Refuge flag plays no part.
    Ignore,
    /// Refuge entries first; fall back to any eligible entry in the cluster.
    Prefer,
    /// Refuge entries only; a cluster without one is skipped.
    Require,
}

impl TaxonomyConfig {
    pub fn parse(document: &str) -> Result<Self, TaxonomyError> {
        Ok(toml::from_str(document)?)
    }

    /// The taxonomy bundled with this crate.
    pub fn builtin() -> Result<Self, TaxonomyError> {
        Self::parse(BUILTIN_TAXONOMY)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read taxonomy file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse taxonomy file: {}", path.display()))
    }
}

// --- Built taxonomy ---

#[derive(Debug, Clone)]
pub struct Tag {
    pub id: TagId,
    pub label: String,
    pub synonyms: Vec<String>,
    /// Symmetrized adjacency: configured neighbors first, then reverse edges.
    pub neighbors: Vec<TagId>,
    /// Normalized id, label and synonyms, in that order.
    pub(crate) forms: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NeedCluster {
    pub name: String,
    pub tags: Vec<TagId>,
}

impl NeedCluster {
    pub fn contains(&self, tag: &TagId) -> bool {
        self.tags.contains(tag)
    }
}

#[derive(Debug, Clone)]
pub struct CarePolicy {
    /// Eligible clusters in draw order.
    pub clusters: Vec<String>,
    pub refuge: RefugePolicy,
}

#[derive(Debug)]
pub struct Taxonomy {
    tags: Vec<Tag>,
    tag_by_id: HashMap<TagId, usize>,
    clusters: Vec<NeedCluster>,
    cluster_by_name: HashMap<String, usize>,
    care: HashMap<SeverityTier, CarePolicy>,
    regions: HashMap<String, HashSet<String>>,
    hedges: Vec<String>,
}

impl Taxonomy {
    pub fn from_config(config: &TaxonomyConfig) -> Result<Self, TaxonomyError> {
        if config.tags.is_empty() {
            return Err(TaxonomyError::Empty);
        }

        let mut tag_by_id = HashMap::with_capacity(config.tags.len());
        for (i, spec) in config.tags.iter().enumerate() {
            if spec.id.as_str().trim().is_empty() {
                return Err(TaxonomyError::EmptyField {
                    tag: spec.id.clone(),
                    field: "id",
                });
            }
            if tag_by_id.insert(spec.id.clone(), i).is_some() {
                return Err(TaxonomyError::DuplicateTag(spec.id.clone()));
            }
        }

        let mut tags = Vec::with_capacity(config.tags.len());
        for spec in &config.tags {
            tags.push(build_tag(spec, &tag_by_id)?);
        }
        symmetrize(&mut tags, &tag_by_id);

        let (clusters, cluster_by_name) = build_clusters(&config.needs, &tag_by_id)?;

        let mut care = HashMap::new();
        for (tier, spec) in [
            (SeverityTier::Melancholy, &config.care.melancholy),
            (SeverityTier::Distress, &config.care.distress),
            (SeverityTier::Crisis, &config.care.crisis),
        ] {
            if spec.clusters.is_empty() {
                return Err(TaxonomyError::EmptyCarePolicy(tier));
            }
            for name in &spec.clusters {
                if !cluster_by_name.contains_key(name) {
                    return Err(TaxonomyError::UnknownCareCluster {
                        tier,
                        cluster: name.clone(),
                    });
                }
            }
            let mut seen = HashSet::new();
            let clusters = spec
                .clusters
                .iter()
                .filter(|name| seen.insert(name.as_str()))
                .cloned()
                .collect();
            care.insert(
                tier,
                CarePolicy {
                    clusters,
                    refuge: spec.refuge,
                },
            );
        }

        let mut regions = HashMap::new();
        for region in &config.regions {
            let areas: HashSet<String> = region
                .areas
                .iter()
                .map(|a| normalize_area(a))
                .filter(|a| !a.is_empty())
                .collect();
            if areas.is_empty() {
                return Err(TaxonomyError::EmptyRegion(region.name.clone()));
            }
            regions.insert(normalize_area(&region.name), areas);
        }

        let hedges = config
            .hedges
            .iter()
            .map(|h| normalize(h))
            .filter(|h| !h.is_empty())
            .collect();

        info!(
            tags = tags.len(),
            clusters = clusters.len(),
            regions = regions.len(),
            "Taxonomy loaded"
        );

        Ok(Self {
            tags,
            tag_by_id,
            clusters,
            cluster_by_name,
            care,
            regions,
            hedges,
        })
    }

    pub fn builtin() -> Result<Self, TaxonomyError> {
        Self::from_config(&TaxonomyConfig::builtin()?)
    }

    /// Tags in load order. This order drives resolver tie-breaks.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn tag(&self, id: &str) -> Option<&Tag> {
        self.tag_by_id.get(id).map(|&i| &self.tags[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tag_by_id.contains_key(id)
    }

    pub fn neighbors(&self, id: &str) -> &[TagId] {
        self.tag(id).map(|t| t.neighbors.as_slice()).unwrap_or(&[])
    }

    pub fn are_adjacent(&self, a: &str, b: &str) -> bool {
        self.neighbors(a).iter().any(|n| n.as_str() == b)
    }

    pub fn clusters(&self) -> &[NeedCluster] {
        &self.clusters
    }

    pub fn cluster(&self, name: &str) -> Option<&NeedCluster> {
        self.cluster_by_name.get(name).map(|&i| &self.clusters[i])
    }

    /// Care policy for a sensitive tier. `None` for [`SeverityTier::None`].
    pub fn care_policy(&self, tier: SeverityTier) -> Option<&CarePolicy> {
        self.care.get(&tier)
    }

    /// Member areas if `name` is a configured region.
    pub fn region(&self, name: &str) -> Option<&HashSet<String>> {
        self.regions.get(name)
    }

    /// Normalized hedge phrases ("surprise me", "dont know", ...).
    pub fn hedges(&self) -> &[String] {
        &self.hedges
    }
}

fn build_tag(spec: &TagSpec, tag_by_id: &HashMap<TagId, usize>) -> Result<Tag, TaxonomyError> {
    if spec.label.trim().is_empty() {
        return Err(TaxonomyError::EmptyField {
            tag: spec.id.clone(),
            field: "label",
        });
    }
    if spec.synonyms.iter().any(|s| normalize(s).is_empty()) {
        return Err(TaxonomyError::EmptyField {
            tag: spec.id.clone(),
            field: "synonym",
        });
    }

    let mut neighbors: Vec<TagId> = Vec::with_capacity(spec.neighbors.len());
    for neighbor in &spec.neighbors {
        if neighbor == &spec.id {
            return Err(TaxonomyError::SelfNeighbor(spec.id.clone()));
        }
        if !tag_by_id.contains_key(neighbor) {
            return Err(TaxonomyError::UnknownNeighbor {
                tag: spec.id.clone(),
                neighbor: neighbor.clone(),
            });
        }
        if !neighbors.contains(neighbor) {
            neighbors.push(neighbor.clone());
        }
    }
    if !(MIN_NEIGHBORS..=MAX_NEIGHBORS).contains(&neighbors.len()) {
        return Err(TaxonomyError::NeighborCount {
            tag: spec.id.clone(),
            count: neighbors.len(),
        });
    }

    let mut forms = Vec::with_capacity(spec.synonyms.len() + 2);
    for raw in std::iter::once(spec.id.as_str())
        .chain(std::iter::once(spec.label.as_str()))
        .chain(spec.synonyms.iter().map(String::as_str))
    {
        let form = normalize(raw);
        if !form.is_empty() && !forms.contains(&form) {
            forms.push(form);
        }
    }

    Ok(Tag {
        id: spec.id.clone(),
        label: spec.label.clone(),
        synonyms: spec.synonyms.clone(),
        neighbors,
        forms,
    })
}

/// Union of forward and reverse edges. Reverse edges are appended in
/// taxonomy order so the result is deterministic.
fn symmetrize(tags: &mut [Tag], tag_by_id: &HashMap<TagId, usize>) {
    let edges: Vec<(usize, TagId)> = tags
        .iter()
        .flat_map(|t| t.neighbors.iter().map(move |n| (tag_by_id[n], t.id.clone())))
        .collect();
    for (target, source) in edges {
        let neighbors = &mut tags[target].neighbors;
        if !neighbors.contains(&source) {
            neighbors.push(source);
        }
    }
}

fn build_clusters(
    specs: &[NeedClusterSpec],
    tag_by_id: &HashMap<TagId, usize>,
) -> Result<(Vec<NeedCluster>, HashMap<String, usize>), TaxonomyError> {
    let mut clusters = Vec::with_capacity(specs.len());
    let mut by_name = HashMap::with_capacity(specs.len());
    for spec in specs {
        let mut tags: Vec<TagId> = Vec::with_capacity(CLUSTER_SIZE);
        for tag in &spec.tags {
            if !tag_by_id.contains_key(tag) {
                return Err(TaxonomyError::UnknownClusterTag {
                    cluster: spec.name.clone(),
                    tag: tag.clone(),
                });
            }
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        if tags.len() != CLUSTER_SIZE {
            return Err(TaxonomyError::ClusterSize {
                cluster: spec.name.clone(),
                count: tags.len(),
            });
        }
        if by_name.insert(spec.name.clone(), clusters.len()).is_some() {
            return Err(TaxonomyError::DuplicateCluster(spec.name.clone()));
        }
        clusters.push(NeedCluster {
            name: spec.name.clone(),
            tags,
        });
    }
    Ok((clusters, by_name))
}
