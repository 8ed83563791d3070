//! Pick selection: standard, wildcard and care-pathway modes.
//!
//! The three modes are separate entry points. Care-pathway selection never
//! looks up entries by the literal mood tag; it only receives that tag as an
//! exclusion.
//!
//! Randomness is always supplied by the caller so concurrent requests never
//! share generator state and tests can pin outcomes with a seeded `StdRng`.

use std::collections::HashSet;
use std::sync::Arc;

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use tracing::debug;

use lark_common::{CatalogueEntry, Pick, SelectionConfig, SelectionRole, SeverityTier, TagId};

use crate::catalogue::{CatalogueIndex, EntryFilter};
use crate::taxonomy::{NeedCluster, RefugePolicy, Taxonomy};

pub struct Selector<'a> {
    taxonomy: &'a Taxonomy,
    catalogue: &'a CatalogueIndex,
    config: SelectionConfig,
}

impl<'a> Selector<'a> {
    pub fn new(taxonomy: &'a Taxonomy, catalogue: &'a CatalogueIndex, config: SelectionConfig) -> Self {
        Self {
            taxonomy,
            catalogue,
            config,
        }
    }

    /// Primary picks from the mood's own pool, then adjacent picks from its
    /// neighbors. An empty primary pool yields no picks at all.
    pub fn standard<R: Rng + ?Sized>(&self, mood: &TagId, filter: &EntryFilter<'_>, rng: &mut R) -> Vec<Pick> {
        let pool = self.catalogue.eligible(mood.as_str(), filter);
        if pool.is_empty() {
            debug!(mood = %mood, "No eligible entries for mood");
            return Vec::new();
        }

        let mut picks: Vec<Pick> = pool
            .choose_multiple(rng, self.config.primary_picks)
            .map(|entry| Pick {
                role: SelectionRole::Primary,
                via_tag: mood.clone(),
                entry: Arc::clone(entry),
            })
            .collect();

        self.push_adjacent(mood, self.config.adjacent_picks, filter, &mut picks, rng);
        picks
    }

    /// One entry under a random tag, then adjacent picks around it. A tag
    /// whose pool is empty is passed over for another, in random order.
    pub fn wildcard<R: Rng + ?Sized>(&self, filter: &EntryFilter<'_>, rng: &mut R) -> Vec<Pick> {
        let tags = self.taxonomy.tags();
        if tags.is_empty() {
            return Vec::new();
        }

        let first = rng.random_range(0..tags.len());
        let mut rest: Vec<usize> = (0..tags.len()).filter(|&i| i != first).collect();
        rest.shuffle(rng);

        for i in std::iter::once(first).chain(rest) {
            let tag = &tags[i].id;
            let pool = self.catalogue.eligible(tag.as_str(), filter);
            let Some(entry) = pool.choose(rng) else {
                continue;
            };
            let mut picks = vec![Pick {
                role: SelectionRole::Wildcard,
                via_tag: tag.clone(),
                entry: Arc::clone(entry),
            }];
            self.push_adjacent(tag, self.config.wildcard_adjacent_picks, filter, &mut picks, rng);
            return picks;
        }

        debug!("No eligible entries under any tag");
        Vec::new()
    }

    /// One entry per need cluster from the tier's care policy, spread
    /// clusters first and reserves after. If that leaves slots open, used
    /// clusters are drawn from again. Entries carrying `exclude` are never
    /// eligible.
    pub fn care<R: Rng + ?Sized>(
        &self,
        tier: SeverityTier,
        exclude: Option<&TagId>,
        filter: &EntryFilter<'_>,
        rng: &mut R,
    ) -> Vec<Pick> {
        let Some(policy) = self.taxonomy.care_policy(tier) else {
            return Vec::new();
        };
        let clusters: Vec<&NeedCluster> = policy
            .clusters
            .iter()
            .filter_map(|name| self.taxonomy.cluster(name))
            .collect();

        let target = self.config.care_picks;
        let mut picks: Vec<Pick> = Vec::with_capacity(target);
        let mut used: HashSet<String> = HashSet::new();
        let mut drawn: Vec<&NeedCluster> = Vec::new();

        for &cluster in &clusters {
            if picks.len() >= target {
                break;
            }
            match self.draw_from_cluster(cluster, policy.refuge, exclude, &used, filter, rng) {
                Some(pick) => {
                    used.insert(pick.entry.id.clone());
                    picks.push(pick);
                    drawn.push(cluster);
                }
                None => debug!(cluster = %cluster.name, tier = %tier, "Need cluster has no eligible entries"),
            }
        }

        // Second round over clusters that produced something.
        let mut exhausted = false;
        while picks.len() < target && !exhausted {
            exhausted = true;
            for cluster in &drawn {
                if picks.len() >= target {
                    break;
                }
                if let Some(pick) = self.draw_from_cluster(cluster, policy.refuge, exclude, &used, filter, rng) {
                    used.insert(pick.entry.id.clone());
                    picks.push(pick);
                    exhausted = false;
                }
            }
        }

        picks
    }

    fn draw_from_cluster<R: Rng + ?Sized>(
        &self,
        cluster: &NeedCluster,
        refuge: RefugePolicy,
        exclude: Option<&TagId>,
        used: &HashSet<String>,
        filter: &EntryFilter<'_>,
        rng: &mut R,
    ) -> Option<Pick> {
        let cluster_tags: Vec<&TagId> = cluster.tags.iter().filter(|t| Some(*t) != exclude).collect();

        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates: Vec<Arc<CatalogueEntry>> = Vec::new();
        for tag in &cluster_tags {
            for entry in self.catalogue.eligible(tag.as_str(), filter) {
                if used.contains(&entry.id) || exclude.is_some_and(|t| entry.has_tag(t.as_str())) {
                    continue;
                }
                if seen.insert(entry.id.clone()) {
                    candidates.push(entry);
                }
            }
        }

        let pool: Vec<Arc<CatalogueEntry>> = match refuge {
            RefugePolicy::Ignore => candidates,
            RefugePolicy::Require => candidates.into_iter().filter(|e| e.refuge).collect(),
            RefugePolicy::Prefer => {
                let refuges: Vec<Arc<CatalogueEntry>> = candidates.iter().filter(|e| e.refuge).cloned().collect();
                if refuges.is_empty() {
                    candidates
                } else {
                    refuges
                }
            }
        };

        let entry = pool.choose(rng)?;
        let via_tag = cluster_tags
            .iter()
            .find(|t| entry.has_tag(t.as_str()))
            .map(|t| (*t).clone())?;
        Some(Pick {
            role: SelectionRole::NeedCluster(cluster.name.clone()),
            via_tag,
            entry: Arc::clone(entry),
        })
    }

    /// Append up to `count` adjacent picks around `tag`. Each draw starts
    /// from a random neighbor not yet used, then falls back to the rest of
    /// the adjacency list in order, then to neighbors already used.
    fn push_adjacent<R: Rng + ?Sized>(
        &self,
        tag: &TagId,
        count: usize,
        filter: &EntryFilter<'_>,
        picks: &mut Vec<Pick>,
        rng: &mut R,
    ) {
        let neighbors = self.taxonomy.neighbors(tag.as_str());
        let mut used_neighbors: Vec<&TagId> = Vec::new();

        for _ in 0..count {
            let fresh: Vec<&TagId> = neighbors.iter().filter(|n| !used_neighbors.contains(n)).collect();
            let start = fresh.choose(rng).copied();
            let order: Vec<&TagId> = start
                .into_iter()
                .chain(fresh.iter().copied().filter(|n| Some(*n) != start))
                .chain(neighbors.iter().filter(|n| used_neighbors.contains(n)))
                .collect();

            let found = order
                .into_iter()
                .find_map(|n| self.draw_adjacent(n, filter, picks.as_slice(), rng).map(|pick| (n, pick)));
            let Some((neighbor, pick)) = found else {
                debug!(tag = %tag, "No adjacent entries available");
                break;
            };
            if !used_neighbors.contains(&neighbor) {
                used_neighbors.push(neighbor);
            }
            picks.push(pick);
        }
    }

    fn draw_adjacent<R: Rng + ?Sized>(
        &self,
        neighbor: &TagId,
        filter: &EntryFilter<'_>,
        picks: &[Pick],
        rng: &mut R,
    ) -> Option<Pick> {
        let pool: Vec<Arc<CatalogueEntry>> = self
            .catalogue
            .eligible(neighbor.as_str(), filter)
            .into_iter()
            .filter(|e| !picks.iter().any(|p| p.entry.id == e.id))
            .collect();
        pool.choose(rng).map(|entry| Pick {
            role: SelectionRole::Adjacent,
            via_tag: neighbor.clone(),
            entry: Arc::clone(entry),
        })
    }
}
