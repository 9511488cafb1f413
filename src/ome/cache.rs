//! Read-through cache of open TIFF files.
//!
//! Opening a dataset touches the same files repeatedly: once to validate
//! each range record, then for every directory lookup during metadata fill
//! and pixel reads. The cache keeps parsed files (header plus IFD chain)
//! keyed by path and evicts the least recently used when full.
//!
//! Lookups take `&self`; the map sits behind a mutex so that query methods
//! of the reader can populate it without needing `&mut`.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::TiffError;
use crate::format::tiff::TiffFile;

/// Default number of open files kept.
pub const DEFAULT_HANDLE_CACHE_CAPACITY: usize = 16;

pub struct TiffCache {
    files: Mutex<LruCache<PathBuf, Arc<TiffFile>>>,
}

impl TiffCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HANDLE_CACHE_CAPACITY)
    }

    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            files: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The parsed file at `path`, opening it on a miss.
    ///
    /// Failures are not cached; the next lookup tries again.
    pub fn get(&self, path: &Path) -> Result<Arc<TiffFile>, TiffError> {
        if let Some(file) = self.files.lock().get(path) {
            return Ok(Arc::clone(file));
        }

        let file = Arc::new(TiffFile::open(path)?);
        debug!(
            file = %path.display(),
            directories = file.directory_count(),
            "Opened TIFF file"
        );
        self.files.lock().put(path.to_path_buf(), Arc::clone(&file));
        Ok(file)
    }

    /// True if `path` opens as a TIFF file.
    pub fn is_valid(&self, path: &Path) -> bool {
        self.get(path).is_ok()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.files.lock().cap().get()
    }

    /// Drop every cached handle.
    pub fn clear(&self) {
        self.files.lock().clear();
    }
}

impl Default for TiffCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
