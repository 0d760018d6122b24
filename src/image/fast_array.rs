//! `FastArrayDownsamplingImage`: produces a pyramid level directly from
//! a whole-image array via strided slicing, bypassing the per-tile
//! composition in `image::downsample`.

use std::sync::Arc;

use crate::cache::store::CacheStore;
use crate::cache::Cache;
use crate::error::{EngineError, EngineResult};
use crate::id;
use crate::image::array::ArrayView;
use crate::image::op::{OpImage, OpImageLayout};
use crate::image::{Mode, Rectangle, TiledImage};

/// A flat row-major `(bands, height, width)` tile of `f64` samples,
/// the value type `FastArrayDownsamplingImage` produces and caches.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayTile {
    pub data: Vec<f64>,
    pub shape: (usize, usize, usize),
}

impl ArrayTile {
    fn index(&self, band: usize, x: usize, y: usize) -> usize {
        let (_, h, w) = self.shape;
        (band * h + y) * w + x
    }
}

impl ArrayView for ArrayTile {
    fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }

    fn is_float(&self) -> bool {
        true
    }

    fn slice(&self, band: usize, x: usize, y: usize, w: usize, h: usize, step_x: usize, step_y: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(w * h);
        for row in 0..h {
            let sy = y + row * step_y;
            for col in 0..w {
                let sx = x + col * step_x;
                out.push(self.data[self.index(band, sx, sy)]);
            }
        }
        out
    }

    fn is_missing(&self, band: usize, x: usize, y: usize) -> bool {
        self.data[self.index(band, x, y)].is_nan()
    }
}

/// One pyramid level backed directly by strided reads against a shared
/// source array. For level `z` of `num_levels`, the zoom factor is
/// `2^(num_levels - z - 1)`; level `num_levels - 1` is zoom 1, i.e. the
/// source resolution itself.
pub struct FastArrayDownsamplingImage<A: ArrayView, S: CacheStore<ArrayTile>> {
    layout: OpImageLayout,
    array: Arc<A>,
    zoom: u32,
    cache: Option<Arc<Cache<ArrayTile, S>>>,
}

impl<A: ArrayView, S: CacheStore<ArrayTile>> FastArrayDownsamplingImage<A, S> {
    pub fn new(
        array: Arc<A>,
        tile_size: (u32, u32),
        z_index: u32,
        num_levels: u32,
        root_id: &str,
        cache: Option<Arc<Cache<ArrayTile, S>>>,
    ) -> EngineResult<Self> {
        if z_index >= num_levels {
            return Err(EngineError::InvalidLayout(format!(
                "z_index {z_index} out of range for {num_levels} levels"
            )));
        }
        let zoom = 1u32 << (num_levels - z_index - 1);
        let (_, source_height, source_width) = array.shape();
        let width = source_width as u32 / zoom;
        let height = source_height as u32 / zoom;
        let layout = OpImageLayout::new((width, height), tile_size, Mode::Other("f64".to_string()))
            .with_id(id::level_image_id(root_id, z_index));
        Ok(Self {
            layout,
            array,
            zoom,
            cache,
        })
    }
}

impl<A: ArrayView, S: CacheStore<ArrayTile>> TiledImage for FastArrayDownsamplingImage<A, S> {
    type Tile = ArrayTile;

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

    fn get_tile(&self, tile_x: u32, tile_y: u32) -> EngineResult<Option<ArrayTile>> {
        self.get_tile_cached(tile_x, tile_y)
    }

    fn dispose(&self) {
        self.dispose_cached();
    }
}

impl<A: ArrayView, S: CacheStore<ArrayTile>> OpImage<ArrayTile, S> for FastArrayDownsamplingImage<A, S> {
    fn layout(&self) -> &OpImageLayout {
        &self.layout
    }

    fn tile_cache(&self) -> Option<&Arc<Cache<ArrayTile, S>>> {
        self.cache.as_ref()
    }

    fn compute_tile(&self, _tile_x: u32, _tile_y: u32, rectangle: Rectangle) -> EngineResult<Option<ArrayTile>> {
        let zoom = self.zoom as usize;
        let (bands, _, _) = self.array.shape();
        let x = rectangle.x as usize * zoom;
        let y = rectangle.y as usize * zoom;
        let w = rectangle.width as usize;
        let h = rectangle.height as usize;

        let mut data = Vec::with_capacity(bands * w * h);
        for band in 0..bands {
            data.extend(self.array.slice(band, x, y, w, h, zoom, zoom));
        }
        Ok(Some(ArrayTile {
            data,
            shape: (bands, h, w),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::InMemoryStore;
    use crate::image::array::MemoryArray;

    fn checkerboard(size: usize) -> MemoryArray {
        let data: Vec<f64> = (0..size * size).map(|i| i as f64).collect();
        MemoryArray::new(data, 1, size, size)
    }

    #[test]
    fn top_level_zoom_is_one() {
        let array = Arc::new(checkerboard(8));
        let image = FastArrayDownsamplingImage::<_, InMemoryStore>::new(
            array, (4, 4), 1, 2, "root", None,
        )
        .unwrap();
        assert_eq!(image.zoom, 1);
        assert_eq!(image.size(), (8, 8));
    }

    #[test]
    fn lower_level_halves_per_zoom_step() {
        let array = Arc::new(checkerboard(8));
        let image = FastArrayDownsamplingImage::<_, InMemoryStore>::new(
            array, (4, 4), 0, 2, "root", None,
        )
        .unwrap();
        assert_eq!(image.zoom, 2);
        assert_eq!(image.size(), (4, 4));
    }

    #[test]
    fn compute_tile_strides_by_zoom() {
        let array = Arc::new(checkerboard(8));
        let image = FastArrayDownsamplingImage::<_, InMemoryStore>::new(
            array, (4, 4), 0, 2, "root", None,
        )
        .unwrap();
        let tile = image.get_tile(0, 0).unwrap().unwrap();
        assert_eq!(tile.shape, (1, 4, 4));
        // stride-2 samples of an 8x8 0..64 checkerboard starting at (0,0).
        assert_eq!(tile.data[0], 0.0);
        assert_eq!(tile.data[1], 2.0);
    }

    #[test]
    fn out_of_range_z_index_errors() {
        let array = Arc::new(checkerboard(8));
        let result = FastArrayDownsamplingImage::<_, InMemoryStore>::new(
            array, (4, 4), 5, 2, "root", None,
        );
        assert!(result.is_err());
    }
}
