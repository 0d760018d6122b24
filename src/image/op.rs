//! `OpImage`: a `TiledImage` that computes its own tiles, memoized
//! through an optional cache.

use std::sync::Arc;

use crate::cache::store::CacheStore;
use crate::cache::Cache;
use crate::error::EngineResult;
use crate::id;
use crate::image::{Mode, Rectangle, TiledImage};

/// Layout parameters shared by every `OpImage`. Callers either supply
/// these directly or derive them from a source image (see
/// `image::decorator::DecoratorImage`).
#[derive(Debug, Clone)]
pub struct OpImageLayout {
    pub id: String,
    pub size: (u32, u32),
    pub tile_size: (u32, u32),
    pub mode: Mode,
    pub format: Option<String>,
}

impl OpImageLayout {
    pub fn new(size: (u32, u32), tile_size: (u32, u32), mode: Mode) -> Self {
        Self {
            id: id::new_image_id(),
            size,
            tile_size,
            mode,
            format: None,
        }
    }

    pub fn with_id(mut self, image_id: impl Into<String>) -> Self {
        self.id = image_id.into();
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Base for tiled images that compute their own tile content.
/// Implementers provide `compute_tile`; `get_tile` wraps it with a
/// cache lookup keyed by [`id::tile_id`], matching the original's
/// "check cache, else compute, then store" sequence.
pub trait OpImage<V, S>: TiledImage<Tile = V>
where
    V: Clone + Send + Sync,
    S: CacheStore<V>,
{
    fn layout(&self) -> &OpImageLayout;

    /// The cache this image memoizes tiles through, if any.
    fn tile_cache(&self) -> Option<&Arc<Cache<V, S>>>;

    /// Compute the tile at `(tile_x, tile_y)` covering `rectangle`,
    /// bypassing the cache. Called only on a cache miss.
    fn compute_tile(&self, tile_x: u32, tile_y: u32, rectangle: Rectangle) -> EngineResult<Option<V>>;

    fn get_tile_cached(&self, tile_x: u32, tile_y: u32) -> EngineResult<Option<V>> {
        self.check_tile_range(tile_x, tile_y)?;
        let layout = self.layout();
        let cache = self.tile_cache();
        let key = cache.map(|_| id::tile_id(&layout.id, tile_x, tile_y));

        if let (Some(cache), Some(key)) = (cache, &key) {
            if let Some(tile) = cache.get_value(key)? {
                return Ok(Some(tile));
            }
        }

        let (tw, th) = layout.tile_size;
        let rect = Rectangle::new(
            (tw as i64) * tile_x as i64,
            (th as i64) * tile_y as i64,
            tw,
            th,
        );
        let tile = self.compute_tile(tile_x, tile_y, rect)?;

        if let (Some(cache), Some(key), Some(value)) = (cache, &key, &tile) {
            cache.put_value(key, value.clone())?;
        }
        Ok(tile)
    }

    /// Evict every tile this image owns from its cache. Idempotent.
    fn dispose_cached(&self) {
        let layout = self.layout();
        if let Some(cache) = self.tile_cache() {
            let (nx, ny) = self.num_tiles();
            for ty in 0..ny {
                for tx in 0..nx {
                    let key = id::tile_id(&layout.id, tx, ty);
                    let _ = cache.remove_value(&key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::InMemoryStore;
    use crate::cache::Policy;
    use crate::error::EngineResult;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSquare {
        layout: OpImageLayout,
        cache: Arc<Cache<i32, InMemoryStore>>,
        computations: AtomicUsize,
    }

    impl TiledImage for CountingSquare {
        type Tile = i32;
        fn id(&self) -> &str {
            &self.layout.id
        }
        fn mode(&self) -> Mode {
            self.layout.mode.clone()
        }
        fn size(&self) -> (u32, u32) {
            self.layout.size
        }
        fn tile_size(&self) -> (u32, u32) {
            self.layout.tile_size
        }
        fn get_tile(&self, tile_x: u32, tile_y: u32) -> EngineResult<Option<i32>> {
            self.get_tile_cached(tile_x, tile_y)
        }
        fn dispose(&self) {
            self.dispose_cached();
        }
    }

    impl OpImage<i32, InMemoryStore> for CountingSquare {
        fn layout(&self) -> &OpImageLayout {
            &self.layout
        }
        fn tile_cache(&self) -> Option<&Arc<Cache<i32, InMemoryStore>>> {
            Some(&self.cache)
        }
        fn compute_tile(&self, tile_x: u32, tile_y: u32, _rect: Rectangle) -> EngineResult<Option<i32>> {
            self.computations.fetch_add(1, Ordering::SeqCst);
            Ok(Some((tile_x * tile_y) as i32))
        }
    }

    #[test]
    fn second_fetch_hits_cache() {
        let image = CountingSquare {
            layout: OpImageLayout::new((512, 512), (256, 256), Mode::L),
            cache: Arc::new(Cache::new(InMemoryStore, 100.0, 1.0, Policy::Lru)),
            computations: AtomicUsize::new(0),
        };
        assert_eq!(image.get_tile(1, 1).unwrap(), Some(1));
        assert_eq!(image.get_tile(1, 1).unwrap(), Some(1));
        assert_eq!(image.computations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispose_clears_cache() {
        let image = CountingSquare {
            layout: OpImageLayout::new((512, 512), (256, 256), Mode::L),
            cache: Arc::new(Cache::new(InMemoryStore, 100.0, 1.0, Policy::Lru)),
            computations: AtomicUsize::new(0),
        };
        image.get_tile(0, 0).unwrap();
        assert_eq!(image.cache.size(), 1);
        image.dispose();
        assert_eq!(image.cache.size(), 0);
    }

    #[test]
    fn out_of_range_tile_errors() {
        let image = CountingSquare {
            layout: OpImageLayout::new((256, 256), (256, 256), Mode::L),
            cache: Arc::new(Cache::new(InMemoryStore, 100.0, 1.0, Policy::Lru)),
            computations: AtomicUsize::new(0),
        };
        assert!(image.get_tile(1, 0).is_err());
    }
}
