// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2026 Waveforge contributors
// Part of Waveforge. Licensed under AGPL-3.0-or-later.

//! Process-wide artifact cache and its owning context.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace, warn};
use waveforge_config::Settings;

pub mod paths;
pub mod persist;

use persist::PersistError;

/// Shared ordered sequence of 32-bit words: coefficient tables,
/// decompressed cache bytes, and similar expensive-to-rebuild values.
pub type RawBlob = Arc<Vec<u32>>;

struct Tables<P> {
    pipelines: HashMap<String, Arc<P>>,
    raw: HashMap<String, RawBlob>,
}

impl<P> Default for Tables<P> {
    fn default() -> Self {
        Self {
            pipelines: HashMap::new(),
            raw: HashMap::new(),
        }
    }
}

/// Thread-safe mapping from a semantic configuration key to an
/// already-built artifact.
///
/// Keys are opaque caller-canonical strings compared by exact equality.
/// Artifacts are shared: the table and every in-flight caller hold the same
/// `Arc`, and an entry is never mutated once stored.
///
/// One coarse mutex guards both tables. It is held for map access only,
/// never across artifact construction, so callers build missing artifacts
/// outside the lock and store the result. Two threads racing on the same
/// missing key may both build it; the last store wins.
pub struct ArtifactCache<P> {
    tables: Mutex<Tables<P>>,
}

impl<P> ArtifactCache<P> {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tables<P>> {
        self.tables.lock().expect("artifact cache poisoned")
    }

    /// Returns the stored pipeline artifact for `key`, if present.
    pub fn lookup_pipeline(&self, key: &str) -> Option<Arc<P>> {
        let tables = self.lock();
        match tables.pipelines.get(key) {
            Some(artifact) => {
                trace!("hit for pipeline {key}");
                Some(Arc::clone(artifact))
            }
            None => {
                trace!("miss for pipeline {key}");
                None
            }
        }
    }

    /// Inserts or overwrites the pipeline entry for `key`.
    pub fn store_pipeline(&self, key: &str, artifact: Arc<P>) {
        let mut tables = self.lock();
        trace!("store pipeline: {key}");
        tables.pipelines.insert(key.to_owned(), artifact);
    }

    /// Returns the stored raw blob for `key`, if present.
    pub fn lookup_raw(&self, key: &str) -> Option<RawBlob> {
        let tables = self.lock();
        match tables.raw.get(key) {
            Some(blob) => {
                trace!("hit for raw {key}");
                Some(Arc::clone(blob))
            }
            None => {
                trace!("miss for raw {key}");
                None
            }
        }
    }

    /// Inserts or overwrites the raw-blob entry for `key`.
    pub fn store_raw(&self, key: &str, blob: RawBlob) {
        let mut tables = self.lock();
        trace!("store raw: {key} ({} words)", blob.len());
        tables.raw.insert(key.to_owned(), blob);
    }

    /// Looks up `key` in the raw table, building and storing the blob on a
    /// miss.
    ///
    /// `build` runs without the cache lock held; concurrent callers may
    /// build the same key redundantly and the last store wins.
    pub fn get_or_build_raw<F, E>(&self, key: &str, build: F) -> Result<RawBlob, E>
    where
        F: FnOnce() -> Result<Vec<u32>, E>,
    {
        if let Some(blob) = self.lookup_raw(key) {
            return Ok(blob);
        }
        let blob = Arc::new(build()?);
        self.store_raw(key, Arc::clone(&blob));
        Ok(blob)
    }

    /// Removes all content from both tables. Persisted disk state is left
    /// untouched.
    pub fn clear(&self) {
        let mut tables = self.lock();
        tables.pipelines.clear();
        tables.raw.clear();
    }

    /// Number of cached pipeline artifacts.
    pub fn pipeline_count(&self) -> usize {
        self.lock().pipelines.len()
    }

    /// Number of cached raw blobs.
    pub fn raw_count(&self) -> usize {
        self.lock().raw.len()
    }

    fn snapshot_raw(&self) -> Vec<(String, RawBlob)> {
        let tables = self.lock();
        tables
            .raw
            .iter()
            .map(|(key, blob)| (key.clone(), Arc::clone(blob)))
            .collect()
    }

    fn extend_raw(&self, entries: Vec<(String, RawBlob)>) {
        let mut tables = self.lock();
        for (key, blob) in entries {
            tables.raw.insert(key, blob);
        }
    }
}

impl<P> Default for ArtifactCache<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for ArtifactCache<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.lock();
        f.debug_struct("ArtifactCache")
            .field("pipelines", &tables.pipelines.len())
            .field("raw", &tables.raw.len())
            .finish()
    }
}

/// Explicitly constructed cache context: resolves the cache root, loads any
/// persisted blobs at startup, and flushes them back on teardown.
///
/// Hosts create one manager per logical device and pass it by reference to
/// every processing stage; tests construct isolated instances.
pub struct CacheManager<P> {
    cache: Arc<ArtifactCache<P>>,
    root: Option<PathBuf>,
}

impl<P> CacheManager<P> {
    /// Opens the cache described by `settings`.
    ///
    /// Directory-resolution failure disables persistence with a warning
    /// rather than failing the host: the cache then lives in memory only
    /// for the life of the process.
    pub fn open(settings: &Settings) -> Self {
        let root = if settings.disk_cache() {
            match paths::resolve_cache_root(settings) {
                Ok(root) => {
                    debug!("cache root directory is {}", root.display());
                    Some(root)
                }
                Err(err) => {
                    warn!("cache persistence disabled: {err}");
                    None
                }
            }
        } else {
            None
        };

        let cache = Arc::new(ArtifactCache::new());
        if let Some(root) = &root {
            match persist::load_blobs(root) {
                Ok(entries) => cache.extend_raw(entries),
                Err(err) => warn!("ignoring persisted cache state: {err}"),
            }
        }

        Self { cache, root }
    }

    /// A manager with persistence disabled outright.
    pub fn in_memory() -> Self {
        Self {
            cache: Arc::new(ArtifactCache::new()),
            root: None,
        }
    }

    /// The owned cache. Subsystems that outlive a borrow clone the `Arc`;
    /// the manager keeps flushing whatever they store.
    pub fn cache(&self) -> &Arc<ArtifactCache<P>> {
        &self.cache
    }

    /// The resolved persistence root, or `None` when running memory-only.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Writes the current raw-blob table out to disk and reports the number
    /// of entries written. A no-op when persistence is disabled.
    pub fn flush(&self) -> Result<usize, PersistError> {
        let Some(root) = &self.root else { return Ok(0) };
        let entries = self.cache.snapshot_raw();
        persist::save_blobs(root, &entries)
    }
}

impl<P> Drop for CacheManager<P> {
    /// Best-effort flush before the tables go away.
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            warn!("failed to flush artifact cache: {err}");
        }
        self.cache.clear();
    }
}
