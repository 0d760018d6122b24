//! `TransformImage`: a decorator that flips a source image vertically
//! and/or marks a fill value and non-finite samples as missing.

use std::sync::Arc;

use crate::cache::store::CacheStore;
use crate::cache::Cache;
use crate::error::EngineResult;
use crate::id;
use crate::image::decorator::DecoratorImage;
use crate::image::op::{OpImage, OpImageLayout};
use crate::image::{Rectangle, TiledImage};

/// A source tile plus a per-sample missing mask, the value type
/// `TransformImage` both consumes and produces.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedTile {
    pub values: Vec<f64>,
    pub missing: Vec<bool>,
    pub shape: (usize, usize, usize),
}

/// Flips a source image top-to-bottom and/or marks samples equal to a
/// fill value (or non-finite, for float sources) as missing.
///
/// Grounded on the original's array-transform decorator: `flip_y`
/// reverses row order by remapping the requested tile's `y` coordinate
/// to its mirror before fetching from the source, rather than flipping
/// pixel data after the fact.
pub struct TransformImage<Src, S>
where
    Src: TiledImage<Tile = MaskedTile>,
    S: CacheStore<MaskedTile>,
{
    layout: OpImageLayout,
    source: Src,
    flip_y: bool,
    force_masked: bool,
    no_data_value: Option<f64>,
    cache: Option<Arc<Cache<MaskedTile, S>>>,
}

impl<Src, S> TransformImage<Src, S>
where
    Src: TiledImage<Tile = MaskedTile>,
    S: CacheStore<MaskedTile>,
{
    pub fn new(source: Src, flip_y: bool, force_masked: bool, no_data_value: Option<f64>) -> Self {
        let layout = OpImageLayout::new(source.size(), source.tile_size(), source.mode())
            .with_id(id::new_image_id());
        Self {
            layout,
            source,
            flip_y,
            force_masked,
            no_data_value,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<Cache<MaskedTile, S>>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn apply_mask(&self, mut tile: MaskedTile) -> MaskedTile {
        if !self.force_masked {
            return tile;
        }
        for (value, missing) in tile.values.iter().zip(tile.missing.iter_mut()) {
            if *missing {
                continue;
            }
            if let Some(fill) = self.no_data_value {
                if *value == fill {
                    *missing = true;
                }
            } else if value.is_nan() || value.is_infinite() {
                *missing = true;
            }
        }
        tile
    }

    fn flip_rows(&self, mut tile: MaskedTile) -> MaskedTile {
        let (bands, h, w) = tile.shape;
        for band in 0..bands {
            let base = band * h * w;
            for row in 0..h / 2 {
                let top = base + row * w;
                let bottom = base + (h - 1 - row) * w;
                for col in 0..w {
                    tile.values.swap(top + col, bottom + col);
                    tile.missing.swap(top + col, bottom + col);
                }
            }
        }
        tile
    }
}

impl<Src, S> TiledImage for TransformImage<Src, S>
where
    Src: TiledImage<Tile = MaskedTile>,
    S: CacheStore<MaskedTile>,
{
    type Tile = MaskedTile;

    fn id(&self) -> &str {
        &self.layout.id
    }

    fn mode(&self) -> crate::image::Mode {
        self.layout.mode.clone()
    }

    fn size(&self) -> (u32, u32) {
        self.layout.size
    }

    fn tile_size(&self) -> (u32, u32) {
        self.layout.tile_size
    }

    fn get_tile(&self, tile_x: u32, tile_y: u32) -> EngineResult<Option<MaskedTile>> {
        self.get_tile_cached(tile_x, tile_y)
    }

    fn dispose(&self) {
        self.dispose_cached();
    }
}

impl<Src, S> OpImage<MaskedTile, S> for TransformImage<Src, S>
where
    Src: TiledImage<Tile = MaskedTile>,
    S: CacheStore<MaskedTile>,
{
    fn layout(&self) -> &OpImageLayout {
        &self.layout
    }

    fn tile_cache(&self) -> Option<&Arc<Cache<MaskedTile, S>>> {
        self.cache.as_ref()
    }

    fn compute_tile(&self, tile_x: u32, tile_y: u32, rectangle: Rectangle) -> EngineResult<Option<MaskedTile>> {
        let source_tile_y = if self.flip_y {
            let (_, ny) = self.source.num_tiles();
            ny - 1 - tile_y
        } else {
            tile_y
        };
        match self.source.get_tile(tile_x, source_tile_y)? {
            Some(tile) => self.compute_tile_from_source_tile(tile_x, tile_y, rectangle, tile),
            None => Ok(None),
        }
    }
}

impl<Src, S> DecoratorImage<MaskedTile, S> for TransformImage<Src, S>
where
    Src: TiledImage<Tile = MaskedTile>,
    S: CacheStore<MaskedTile>,
{
    type Source = Src;

    fn source_image(&self) -> &Src {
        &self.source
    }

    /// The row-order flip and fill/NaN masking applied to a single
    /// already-fetched source tile. The `y`-coordinate remapping that
    /// picks *which* source tile to fetch for a flipped request happens
    /// in `OpImage::compute_tile` above, since it changes what gets
    /// requested rather than how a fetched tile is transformed.
    fn compute_tile_from_source_tile(
        &self,
        _tile_x: u32,
        _tile_y: u32,
        _rectangle: Rectangle,
        source_tile: MaskedTile,
    ) -> EngineResult<Option<MaskedTile>> {
        let tile = if self.flip_y { self.flip_rows(source_tile) } else { source_tile };
        Ok(Some(self.apply_mask(tile)))
    }
}
