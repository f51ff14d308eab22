//! LRU cache for zoom overlay rasters

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use super::request::DocEpoch;
use super::types::Surface;

/// Cache key for overlay rasters
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Document the raster belongs to
    pub epoch: u64,
    /// Page number (1-indexed)
    pub page: usize,
    /// Magnification (stored as millionths for stable hashing)
    pub magnification_millionths: u32,
}

impl CacheKey {
    #[must_use]
    pub fn new(epoch: DocEpoch, page: usize, magnification: f32) -> Self {
        Self {
            epoch: epoch.0,
            page,
            magnification_millionths: (magnification * 1_000_000.0) as u32,
        }
    }
}

/// LRU cache of overlay surfaces.
///
/// Overlay rasters do not depend on the base scale, so they survive rescale
/// passes and are only dropped when a new document is loaded.
pub struct OverlayCache {
    cache: LruCache<CacheKey, Arc<Surface>>,
}

impl OverlayCache {
    /// Create a new cache with the given capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Get a cached surface, promoting it in the LRU order
    #[must_use]
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<Surface>> {
        self.cache.get(key).cloned()
    }

    /// Check if a key is in the cache without promoting it
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.cache.contains(key)
    }

    /// Insert a surface, returning an Arc to it
    pub fn insert(&mut self, key: CacheKey, surface: Surface) -> Arc<Surface> {
        let arc = Arc::new(surface);
        self.cache.put(key, Arc::clone(&arc));
        arc
    }

    /// Drop every raster that does not belong to `epoch`
    pub fn retain_epoch(&mut self, epoch: DocEpoch) {
        let stale: Vec<_> = self
            .cache
            .iter()
            .filter(|(k, _)| k.epoch != epoch.0)
            .map(|(k, _)| k.clone())
            .collect();

        for key in stale {
            self.cache.pop(&key);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
