//! Load-result cache keyed by file fingerprint

use crate::types::FloodResult;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Identity of a file's content as seen by the filesystem
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
    pub len: u64,
}

impl Fingerprint {
    pub fn of<P: AsRef<Path>>(path: P) -> FloodResult<Self> {
        let metadata = std::fs::metadata(path.as_ref())?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }
}

/// Cache of loaded values, one entry per path
///
/// An entry is reused only while the file's modification time and length are
/// unchanged; otherwise it is reloaded. Entries live until invalidated.
pub struct ResultCache<T> {
    entries: HashMap<PathBuf, (Fingerprint, Arc<T>)>,
    hits: u64,
    misses: u64,
}

impl<T> Default for ResultCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResultCache<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Cached value for `path`, loading it when absent or stale
    pub fn get_or_load<P, F>(&mut self, path: P, loader: F) -> FloodResult<Arc<T>>
    where
        P: AsRef<Path>,
        F: FnOnce(&Path) -> FloodResult<T>,
    {
        let path = path.as_ref();
        let fingerprint = Fingerprint::of(path)?;

        if let Some((cached, value)) = self.entries.get(path) {
            if *cached == fingerprint {
                self.hits += 1;
                log::debug!("Cache hit: {}", path.display());
                return Ok(Arc::clone(value));
            }
            log::debug!("Cache entry stale: {}", path.display());
        }

        self.misses += 1;
        let value = Arc::new(loader(path)?);
        self.entries
            .insert(path.to_path_buf(), (fingerprint, Arc::clone(&value)));
        Ok(value)
    }

    /// Drop the entry for `path`; returns whether one existed
    pub fn invalidate<P: AsRef<Path>>(&mut self, path: P) -> bool {
        self.entries.remove(path.as_ref()).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses)
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
