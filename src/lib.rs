//! A capacity-bounded tile cache, a composable tiled-image graph
//! (source -> decorator -> downsampler), and a pyramid builder for
//! map-style image serving.
//!
//! The color-map catalog, file decoder, HTTP/RPC surface, and ND-array
//! back-end are external collaborators, consumed here through the
//! narrow traits in [`image::array`] and [`image::colormap`].

pub mod cache;
pub mod error;
pub mod id;
pub mod image;
pub mod pyramid;

pub use error::{EngineError, EngineResult};

/// The process-wide default tile cache, consulted by an `OpImage` that
/// isn't given an explicit cache of its own.
///
/// Unlike the original's module-level variable that any import could
/// silently mutate, initialization and teardown here are explicit calls
/// behind a `Mutex`, so concurrent callers observe a consistent value.
pub mod default_cache {
    use std::sync::{Arc, Mutex, OnceLock};

    use crate::cache::store::{ByteSizedStore, PixelTile};
    use crate::cache::{Cache, Policy};

    type DefaultCache = Cache<PixelTile, ByteSizedStore>;

    fn slot() -> &'static Mutex<Option<Arc<DefaultCache>>> {
        static SLOT: OnceLock<Mutex<Option<Arc<DefaultCache>>>> = OnceLock::new();
        SLOT.get_or_init(|| Mutex::new(None))
    }

    /// Install `cache` as the process-wide default, replacing any
    /// previous one.
    pub fn init_default_cache(cache: Arc<DefaultCache>) {
        *slot().lock().unwrap() = Some(cache);
    }

    /// Install a fresh in-memory byte-sized cache as the default, with
    /// the original's defaults: 64 MiB capacity at a 0.75 threshold,
    /// LRU eviction.
    pub fn init_default_memory_cache(capacity: f64, threshold: f64) {
        init_default_cache(Arc::new(Cache::new(ByteSizedStore, capacity, threshold, Policy::Lru)));
    }

    /// The current process-wide default cache, if one has been
    /// installed.
    pub fn default_cache() -> Option<Arc<DefaultCache>> {
        slot().lock().unwrap().clone()
    }

    /// Remove the process-wide default cache. Images already holding a
    /// clone of the old `Arc` keep working against it; only new lookups
    /// via `default_cache()` see `None`.
    pub fn clear_default_cache() {
        *slot().lock().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    // Both cases live in one test: the singleton is process-global, so
    // running them as separate #[test] fns risks interleaving under the
    // default parallel test runner.
    #[test]
    fn default_cache_init_and_clear_round_trip() {
        use super::default_cache::*;
        clear_default_cache();
        assert!(default_cache().is_none());
        init_default_memory_cache(1024.0 * 1024.0, 0.75);
        assert!(default_cache().is_some());
        clear_default_cache();
        assert!(default_cache().is_none());
    }
}
