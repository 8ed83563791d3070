pub mod catalogue;
pub mod classifier;
pub mod engine;
pub mod resolver;
pub mod selector;
pub mod store;
pub mod taxonomy;

pub use catalogue::{
    CatalogueAudit, CatalogueIndex, CatalogueSource, EntryFilter, JsonFileSource, RawEntry,
    StaticSource,
};
pub use classifier::NeedClassifier;
pub use engine::Engine;
pub use resolver::MoodResolver;
pub use selector::Selector;
pub use store::{FileLoader, SnapshotLoader, SnapshotStore};
pub use taxonomy::{CarePolicy, NeedCluster, RefugePolicy, Tag, Taxonomy, TaxonomyConfig};
