//! Typed errors for configuration and catalogue loading.
//!
//! Everything here is a load-time failure. Request-time misses (no mood,
//! no eligible entries) are represented as `None` or an empty
//! `MatchResult`, never as an error.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{SeverityTier, TagId};

/// Malformed taxonomy, need-cluster, keyword, care or region configuration.
#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("failed to parse taxonomy: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("taxonomy has no tags")]
    Empty,

    #[error("duplicate tag id: {0}")]
    DuplicateTag(TagId),

    #[error("tag {tag} has an empty {field}")]
    EmptyField { tag: TagId, field: &'static str },

    #[error("tag {tag} must list 2-4 neighbors, found {count}")]
    NeighborCount { tag: TagId, count: usize },

    #[error("tag {tag} lists an unknown neighbor: {neighbor}")]
    UnknownNeighbor { tag: TagId, neighbor: TagId },

    #[error("tag {0} lists itself as a neighbor")]
    SelfNeighbor(TagId),

    #[error("duplicate need cluster: {0}")]
    DuplicateCluster(String),

    #[error("need cluster {cluster} must reference exactly 3 tags, found {count}")]
    ClusterSize { cluster: String, count: usize },

    #[error("need cluster {cluster} references an unknown tag: {tag}")]
    UnknownClusterTag { cluster: String, tag: TagId },

    #[error("empty keyword in the {0} set")]
    EmptyKeyword(SeverityTier),

    #[error("keyword {keyword:?} appears in both the {first} and {second} sets")]
    OverlappingKeyword {
        keyword: String,
        first: SeverityTier,
        second: SeverityTier,
    },

    #[error("care policy for {tier} references an unknown need cluster: {cluster}")]
    UnknownCareCluster { tier: SeverityTier, cluster: String },

    #[error("care policy for {0} lists no need clusters")]
    EmptyCarePolicy(SeverityTier),

    #[error("region {0} has no member areas")]
    EmptyRegion(String),
}

/// Catalogue entries that fail validation. Loading fails fast on the first one.
#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("failed to read catalogue {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalogue: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("entry #{index} ({id}) is missing required field `{field}`")]
    MissingField {
        index: usize,
        id: String,
        field: &'static str,
    },

    #[error("entry {id} must carry 1-4 tags, found {count}")]
    TagCount { id: String, count: usize },

    #[error("entry {id} references an unknown tag: {tag}")]
    UnknownTag { id: String, tag: TagId },

    #[error("entry {id} has a compound location: {location:?}")]
    CompoundLocation { id: String, location: String },

    #[error("duplicate entry id: {0}")]
    DuplicateId(String),
}

/// Upstream filter values that could not be parsed.
#[derive(Debug, Error)]
#[error("invalid {field}: {value:?}")]
pub struct FilterParseError {
    pub field: &'static str,
    pub value: String,
}

#[derive(Debug, Error)]
pub enum LarkError {
    #[error("taxonomy error: {0}")]
    Taxonomy(#[from] TaxonomyError),

    #[error("catalogue error: {0}")]
    Catalogue(#[from] CatalogueError),

    #[error("filter error: {0}")]
    Filter(#[from] FilterParseError),

    #[error("snapshot reload already in progress")]
    ReloadInProgress,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type LarkResult<T> = std::result::Result<T, LarkError>;
