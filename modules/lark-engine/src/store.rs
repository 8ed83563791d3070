//! Hot-reloadable engine snapshots.
//!
//! Readers take an owned `Arc<Engine>` and keep a consistent view for the
//! whole request even if a reload lands meanwhile. A reload builds and
//! validates a complete new engine before swapping it in; on failure the
//! previous snapshot stays live.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{error, info};

use lark_common::{FileConfig, LarkError, LarkResult, SelectionConfig};

use crate::catalogue::JsonFileSource;
use crate::engine::Engine;
use crate::taxonomy::TaxonomyConfig;

/// Builds a fresh engine from wherever the data lives.
pub trait SnapshotLoader: Send + Sync {
    fn load(&self) -> LarkResult<Engine>;
}

impl<F> SnapshotLoader for F
where
    F: Fn() -> LarkResult<Engine> + Send + Sync,
{
    fn load(&self) -> LarkResult<Engine> {
        self()
    }
}

/// Loads the taxonomy (or the bundled default) and a JSON catalogue from disk.
#[derive(Debug, Clone)]
pub struct FileLoader {
    taxonomy: Option<PathBuf>,
    catalogue: PathBuf,
    selection: SelectionConfig,
}

impl FileLoader {
    pub fn new(taxonomy: Option<PathBuf>, catalogue: PathBuf, selection: SelectionConfig) -> Self {
        Self {
            taxonomy,
            catalogue,
            selection,
        }
    }

    pub fn from_config(config: &FileConfig) -> Self {
        Self::new(
            config.data.taxonomy.clone(),
            config.data.catalogue.clone(),
            config.selection,
        )
    }
}

impl SnapshotLoader for FileLoader {
    fn load(&self) -> LarkResult<Engine> {
        let taxonomy = match &self.taxonomy {
            Some(path) => TaxonomyConfig::load(path)?,
            None => TaxonomyConfig::builtin()?,
        };
        Engine::new(&taxonomy, &JsonFileSource::new(&self.catalogue), self.selection)
    }
}

pub struct SnapshotStore {
    inner: ArcSwap<Engine>,
    loader: Box<dyn SnapshotLoader>,
    reloading: AtomicBool,
}

impl SnapshotStore {
    /// Initial load. Failure here is a startup failure.
    pub fn open(loader: impl SnapshotLoader + 'static) -> LarkResult<Self> {
        let initial = loader.load()?;
        Ok(Self {
            inner: ArcSwap::new(Arc::new(initial)),
            loader: Box::new(loader),
            reloading: AtomicBool::new(false),
        })
    }

    pub fn load_full(&self) -> Arc<Engine> {
        self.inner.load_full()
    }

    /// Rebuild from the loader and swap atomically. Only one reload runs at
    /// a time; a concurrent call returns [`LarkError::ReloadInProgress`].
    pub fn reload(&self) -> LarkResult<Arc<Engine>> {
        if self
            .reloading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("Snapshot reload already in progress, skipping");
            return Err(LarkError::ReloadInProgress);
        }
        let _guard = ReloadGuard(&self.reloading);

        info!("Reloading engine snapshot");
        match self.loader.load() {
            Ok(engine) => {
                let engine = Arc::new(engine);
                self.inner.store(Arc::clone(&engine));
                info!(entries = engine.catalogue().len(), "Engine snapshot reloaded");
                Ok(engine)
            }
            Err(e) => {
                error!(error = %e, "Failed to reload engine snapshot, keeping previous");
                Err(e)
            }
        }
    }
}

/// Clears the reload flag on every exit, including a panicking loader.
struct ReloadGuard<'a>(&'a AtomicBool);

impl Drop for ReloadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
