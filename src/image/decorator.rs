//! `DecoratorImage`: a `TiledImage` that wraps a source image on the
//! same tile grid and derives each tile from the corresponding source
//! tile.

use crate::cache::store::CacheStore;
use crate::error::EngineResult;
use crate::image::op::OpImage;
use crate::image::{Rectangle, TiledImage};

/// Implemented by images that derive their tiles from a source image on
/// the identical grid. `OpImage::compute_tile` is wired automatically:
/// fetch the source tile at the same coordinates, and if present, run
/// it through `compute_tile_from_source_tile`. A missing source tile
/// propagates as `None` without calling the transform.
///
/// The source's tile type need not match `V`: a decorator may change
/// representation entirely (e.g. mapping a masked sample array to RGBA
/// pixels), same as the original's single `DecoratorImage` base serving
/// both same-type transforms and type-changing color mappers.
pub trait DecoratorImage<V, S>: OpImage<V, S>
where
    V: Clone + Send + Sync,
    S: CacheStore<V>,
{
    type Source: TiledImage;

    fn source_image(&self) -> &Self::Source;

    fn compute_tile_from_source_tile(
        &self,
        tile_x: u32,
        tile_y: u32,
        rectangle: Rectangle,
        source_tile: <Self::Source as TiledImage>::Tile,
    ) -> EngineResult<Option<V>>;

    /// Default `OpImage::compute_tile` body for decorators: fetch from
    /// the source, then transform. Call this from the implementing
    /// type's `compute_tile` method (Rust has no trait method override
    /// resolution across two traits, so this is invoked explicitly
    /// rather than inherited).
    fn decorator_compute_tile(
        &self,
        tile_x: u32,
        tile_y: u32,
        rectangle: Rectangle,
    ) -> EngineResult<Option<V>> {
        match self.source_image().get_tile(tile_x, tile_y)? {
            Some(source_tile) => {
                self.compute_tile_from_source_tile(tile_x, tile_y, rectangle, source_tile)
            }
            None => Ok(None),
        }
    }
}
