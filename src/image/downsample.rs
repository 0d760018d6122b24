//! `DownsamplingImage`: halves a source image's resolution by
//! aggregating each 2x2 block of source tiles into one target tile.

use std::sync::Arc;

use crate::cache::store::{CacheStore, PixelTile};
use crate::cache::Cache;
use crate::error::EngineResult;
use crate::id;
use crate::image::array::ArrayView;
use crate::image::fast_array::ArrayTile;
use crate::image::op::{OpImage, OpImageLayout};
use crate::image::{Rectangle, TiledImage};

/// The four-way reducer applied to each non-overlapping 2x2 block during
/// ND-array downsampling. `First` is a pure strided slice with no
/// arithmetic — the only variant that skips reading 3 of the 4 inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregator {
    First,
    Min,
    Max,
    Sum,
    Mean,
}

impl Aggregator {
    pub fn apply(self, a1: f64, a2: f64, a3: f64, a4: f64) -> f64 {
        match self {
            Aggregator::First => a1,
            Aggregator::Min => a1.min(a2).min(a3).min(a4),
            Aggregator::Max => a1.max(a2).max(a3).max(a4),
            Aggregator::Sum => a1 + a2 + a3 + a4,
            Aggregator::Mean => (a1 + a2 + a3 + a4) / 4.0,
        }
    }
}

/// Resamples a pixel buffer to half its width and height. The concrete
/// resampling filter (box, antialias, nearest, ...) is the external
/// collaborator's choice.
pub trait PixelDownsampler<T>: Send + Sync {
    /// Resize `tile` (of size `(src_w, src_h)`) down to `(src_w/2,
    /// src_h/2)`.
    fn halve(&self, tile: &T, src_w: u32, src_h: u32) -> T;

    /// Paste `source` at `(x, y)` into a fresh tile of `size`, filling
    /// any uncovered area with the mode's background.
    fn stitch(&self, size: (u32, u32), parts: [(T, (u32, u32)); 4]) -> T;
}

/// A reference [`PixelDownsampler`] over [`PixelTile`] that does plain
/// 2x2 box averaging per channel. Real backends substitute their own
/// resampling filter (PIL's antialias, libvips, ...) through the same
/// trait; this one exists so `PixelDownsamplingImage` is usable without
/// an external imaging dependency.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoxPixelDownsampler;

impl PixelDownsampler<PixelTile> for BoxPixelDownsampler {
    fn halve(&self, tile: &PixelTile, src_w: u32, src_h: u32) -> PixelTile {
        let channels = tile.mode.channels() as usize;
        let (w, h) = (src_w / 2, src_h / 2);
        let row_stride = src_w as usize * channels;
        let mut data = Vec::with_capacity(w as usize * h as usize * channels);
        for y in 0..h as usize {
            for x in 0..w as usize {
                let p00 = (2 * y) * row_stride + 2 * x * channels;
                let p01 = p00 + channels;
                let p10 = p00 + row_stride;
                let p11 = p10 + channels;
                for c in 0..channels {
                    let sum = tile.data[p00 + c] as u32
                        + tile.data[p01 + c] as u32
                        + tile.data[p10 + c] as u32
                        + tile.data[p11 + c] as u32;
                    data.push((sum / 4) as u8);
                }
            }
        }
        PixelTile {
            data: bytes::Bytes::from(data),
            width: w,
            height: h,
            mode: tile.mode.clone(),
        }
    }

    fn stitch(&self, size: (u32, u32), parts: [(PixelTile, (u32, u32)); 4]) -> PixelTile {
        let mode = parts[0].0.mode.clone();
        let channels = mode.channels() as usize;
        let (w, h) = size;
        let mut data = vec![0u8; w as usize * h as usize * channels];
        for (part, (px, py)) in &parts {
            let dst_row_stride = w as usize * channels;
            let src_row_stride = part.width as usize * channels;
            for row in 0..part.height as usize {
                let dst_start = (*py as usize + row) * dst_row_stride + *px as usize * channels;
                let src_start = row * src_row_stride;
                data[dst_start..dst_start + src_row_stride]
                    .copy_from_slice(&part.data[src_start..src_start + src_row_stride]);
            }
        }
        PixelTile {
            data: bytes::Bytes::from(data),
            width: w,
            height: h,
            mode,
        }
    }
}

/// Aggregates 2x2 blocks of an ND-array-backed source image. Distinct
/// from [`PixelDownsampler`] because array aggregation operates on raw
/// numeric blocks rather than an opaque resampling filter.
pub trait ArrayDownsampler: Send + Sync {
    type Array: ArrayView;

    fn aggregator(&self) -> Aggregator;

    /// Downsample `source` by a factor of two per axis using
    /// `aggregator`, producing a flat row-major buffer of
    /// `(width/2) * (height/2)` elements per band plus its shape.
    fn downsample(&self, source: &Self::Array) -> (Vec<f64>, (usize, usize, usize)) {
        let (bands, h, w) = source.shape();
        let (out_h, out_w) = (h / 2, w / 2);
        let mut out = Vec::with_capacity(bands * out_h * out_w);
        let aggregator = self.aggregator();
        for band in 0..bands {
            if aggregator == Aggregator::First {
                let slice = source.slice(band, 0, 0, out_w, out_h, 2, 2);
                out.extend(slice);
                continue;
            }
            let a1 = source.slice(band, 0, 0, out_w, out_h, 2, 2);
            let a2 = source.slice(band, 1, 0, out_w, out_h, 2, 2);
            let a3 = source.slice(band, 0, 1, out_w, out_h, 2, 2);
            let a4 = source.slice(band, 1, 1, out_w, out_h, 2, 2);
            for i in 0..out_w * out_h {
                out.push(aggregator.apply(a1[i], a2[i], a3[i], a4[i]));
            }
        }
        (out, (bands, out_h, out_w))
    }
}

/// Shared layout derivation for a `DownsamplingImage`: half the source's
/// size, same tile size, halved tile counts (integer division, dropping
/// a trailing odd row/column by design).
pub fn half_layout<V>(source: &dyn TiledImage<Tile = V>) -> (u32, u32, u32, u32)
where
    V: Clone + Send + Sync,
{
    let (w, h) = source.size();
    let (nx, ny) = source.num_tiles();
    (w / 2, h / 2, nx / 2, ny / 2)
}

/// Compute the four source-tile coordinates and target paste positions
/// for target tile `(tile_x, tile_y)`.
pub fn source_quad(tile_x: u32, tile_y: u32, tile_size: (u32, u32)) -> ([(u32, u32); 4], [(u32, u32); 4]) {
    let sx = 2 * tile_x;
    let sy = 2 * tile_y;
    let (tw, th) = tile_size;
    let (hw, hh) = (tw / 2, th / 2);
    (
        [(sx, sy), (sx, sy + 1), (sx + 1, sy), (sx + 1, sy + 1)],
        [(0, 0), (0, hh), (hw, 0), (hw, hh)],
    )
}

/// An [`ArrayDownsampler`] over [`ArrayTile`]s, the concrete reducer
/// `DownsamplingImage` uses for its ND-array variant.
#[derive(Debug, Clone, Copy)]
pub struct ArrayTileDownsampler {
    aggregator: Aggregator,
}

impl ArrayTileDownsampler {
    pub fn new(aggregator: Aggregator) -> Self {
        Self { aggregator }
    }
}

impl ArrayDownsampler for ArrayTileDownsampler {
    type Array = ArrayTile;

    fn aggregator(&self) -> Aggregator {
        self.aggregator
    }
}

fn stitch_array_tiles(target_shape: (usize, usize, usize), parts: [(ArrayTile, (u32, u32)); 4]) -> ArrayTile {
    let (bands, h, w) = target_shape;
    let mut data = vec![0.0; bands * h * w];
    for (part, (px, py)) in parts {
        let (part_bands, part_h, part_w) = part.shape;
        for band in 0..part_bands {
            for row in 0..part_h {
                for col in 0..part_w {
                    let src = (band * part_h + row) * part_w + col;
                    let dst_y = py as usize + row;
                    let dst_x = px as usize + col;
                    let dst = (band * h + dst_y) * w + dst_x;
                    data[dst] = part.data[src];
                }
            }
        }
    }
    ArrayTile { data, shape: target_shape }
}

/// Halves a tiled source image's resolution by aggregating each 2x2
/// block of source tiles (ND-array variant, see `image::downsample`
/// module docs). Each source tile is first downsampled in place via
/// `aggregator`, then the four downsampled quadrants are pasted into a
/// fresh full-size target tile.
pub struct DownsamplingImage<Src, S>
where
    Src: TiledImage<Tile = ArrayTile>,
    S: CacheStore<ArrayTile>,
{
    layout: OpImageLayout,
    source: Src,
    downsampler: ArrayTileDownsampler,
    cache: Option<Arc<Cache<ArrayTile, S>>>,
}

impl<Src, S> DownsamplingImage<Src, S>
where
    Src: TiledImage<Tile = ArrayTile>,
    S: CacheStore<ArrayTile>,
{
    pub fn new(source: Src, aggregator: Aggregator) -> Self {
        let (sw, sh, _, _) = half_layout::<ArrayTile>(&source);
        let mut layout = OpImageLayout::new((sw, sh), source.tile_size(), source.mode())
            .with_id(id::new_image_id());
        layout.format = source.format();
        Self {
            layout,
            source,
            downsampler: ArrayTileDownsampler::new(aggregator),
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<Cache<ArrayTile, S>>) -> Self {
        self.cache = Some(cache);
        self
    }
}

impl<Src, S> TiledImage for DownsamplingImage<Src, S>
where
    Src: TiledImage<Tile = ArrayTile>,
    S: CacheStore<ArrayTile>,
{
    type Tile = ArrayTile;

    fn id(&self) -> &str {
        &self.layout.id
    }

    fn format(&self) -> Option<String> {
        self.layout.format.clone()
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

    fn num_tiles(&self) -> (u32, u32) {
        let (_, _, nx, ny) = half_layout::<ArrayTile>(&self.source);
        (nx, ny)
    }

    fn get_tile(&self, tile_x: u32, tile_y: u32) -> EngineResult<Option<ArrayTile>> {
        self.get_tile_cached(tile_x, tile_y)
    }

    fn dispose(&self) {
        self.dispose_cached();
    }
}

impl<Src, S> OpImage<ArrayTile, S> for DownsamplingImage<Src, S>
where
    Src: TiledImage<Tile = ArrayTile>,
    S: CacheStore<ArrayTile>,
{
    fn layout(&self) -> &OpImageLayout {
        &self.layout
    }

    fn tile_cache(&self) -> Option<&Arc<Cache<ArrayTile, S>>> {
        self.cache.as_ref()
    }

    fn compute_tile(&self, tile_x: u32, tile_y: u32, _rectangle: Rectangle) -> EngineResult<Option<ArrayTile>> {
        let (source_coords, target_positions) = source_quad(tile_x, tile_y, self.layout.tile_size);
        let mut source_tiles = Vec::with_capacity(4);
        for (sx, sy) in source_coords {
            match self.source.get_tile(sx, sy)? {
                Some(tile) => source_tiles.push(tile),
                None => return Ok(None),
            }
        }

        let (bands, _, _) = source_tiles[0].shape;
        let (tw, th) = self.layout.tile_size;
        let target_shape = (bands, th as usize, tw as usize);

        let mut parts: Vec<(ArrayTile, (u32, u32))> = Vec::with_capacity(4);
        for (tile, position) in source_tiles.into_iter().zip(target_positions) {
            let (data, shape) = self.downsampler.downsample(&tile);
            parts.push((ArrayTile { data, shape }, position));
        }
        let parts: [(ArrayTile, (u32, u32)); 4] = parts.try_into().unwrap_or_else(|_| unreachable!());

        Ok(Some(stitch_array_tiles(target_shape, parts)))
    }
}

/// Halves a tiled source image's resolution by resizing and pasting raw
/// pixel-buffer tiles (the PIL-backed variant; see `image::downsample`
/// module docs for the ND-array counterpart). The actual resize/paste is
/// delegated to a [`PixelDownsampler`], grounded on the original's
/// `PilDownsamplingImage` wrapping a `PIL.Image.resize`/`paste` pair.
pub struct PixelDownsamplingImage<Src, S>
where
    Src: TiledImage<Tile = PixelTile>,
    S: CacheStore<PixelTile>,
{
    layout: OpImageLayout,
    source: Src,
    downsampler: Arc<dyn PixelDownsampler<PixelTile>>,
    cache: Option<Arc<Cache<PixelTile, S>>>,
}

impl<Src, S> PixelDownsamplingImage<Src, S>
where
    Src: TiledImage<Tile = PixelTile>,
    S: CacheStore<PixelTile>,
{
    pub fn new(source: Src, downsampler: Arc<dyn PixelDownsampler<PixelTile>>) -> Self {
        let (sw, sh, _, _) = half_layout::<PixelTile>(&source);
        let mut layout = OpImageLayout::new((sw, sh), source.tile_size(), source.mode())
            .with_id(id::new_image_id());
        layout.format = source.format();
        Self {
            layout,
            source,
            downsampler,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<Cache<PixelTile, S>>) -> Self {
        self.cache = Some(cache);
        self
    }
}

impl<Src, S> TiledImage for PixelDownsamplingImage<Src, S>
where
    Src: TiledImage<Tile = PixelTile>,
    S: CacheStore<PixelTile>,
{
    type Tile = PixelTile;

    fn id(&self) -> &str {
        &self.layout.id
    }

    fn format(&self) -> Option<String> {
        self.layout.format.clone()
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

    fn num_tiles(&self) -> (u32, u32) {
        let (_, _, nx, ny) = half_layout::<PixelTile>(&self.source);
        (nx, ny)
    }

    fn get_tile(&self, tile_x: u32, tile_y: u32) -> EngineResult<Option<PixelTile>> {
        self.get_tile_cached(tile_x, tile_y)
    }

    fn dispose(&self) {
        self.dispose_cached();
    }
}

impl<Src, S> OpImage<PixelTile, S> for PixelDownsamplingImage<Src, S>
where
    Src: TiledImage<Tile = PixelTile>,
    S: CacheStore<PixelTile>,
{
    fn layout(&self) -> &OpImageLayout {
        &self.layout
    }

    fn tile_cache(&self) -> Option<&Arc<Cache<PixelTile, S>>> {
        self.cache.as_ref()
    }

    fn compute_tile(&self, tile_x: u32, tile_y: u32, _rectangle: Rectangle) -> EngineResult<Option<PixelTile>> {
        let (tw, th) = self.layout.tile_size;
        let (source_coords, target_positions) = source_quad(tile_x, tile_y, (tw, th));
        let mut source_tiles = Vec::with_capacity(4);
        for (sx, sy) in source_coords {
            match self.source.get_tile(sx, sy)? {
                Some(tile) => source_tiles.push(tile),
                None => return Ok(None),
            }
        }

        let (src_w, src_h) = self.source.tile_size();
        let mut parts: Vec<(PixelTile, (u32, u32))> = Vec::with_capacity(4);
        for (tile, position) in source_tiles.into_iter().zip(target_positions) {
            let halved = self.downsampler.halve(&tile, src_w, src_h);
            parts.push((halved, position));
        }
        let parts: [(PixelTile, (u32, u32)); 4] = parts.try_into().unwrap_or_else(|_| unreachable!());

        Ok(Some(self.downsampler.stitch((tw, th), parts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregator_first_ignores_other_inputs() {
        assert_eq!(Aggregator::First.apply(1.0, 99.0, 99.0, 99.0), 1.0);
    }

    #[test]
    fn aggregator_mean() {
        assert_eq!(Aggregator::Mean.apply(1.0, 2.0, 3.0, 4.0), 2.5);
    }

    #[test]
    fn aggregator_min_max() {
        assert_eq!(Aggregator::Min.apply(4.0, 1.0, 3.0, 2.0), 1.0);
        assert_eq!(Aggregator::Max.apply(4.0, 1.0, 3.0, 2.0), 4.0);
    }

    #[test]
    fn source_quad_positions() {
        let (coords, positions) = source_quad(1, 2, (256, 256));
        assert_eq!(coords, [(2, 4), (2, 5), (3, 4), (3, 5)]);
        assert_eq!(positions, [(0, 0), (0, 128), (128, 0), (128, 128)]);
    }

    #[test]
    fn odd_tile_count_drops_trailing_tile() {
        // 5 source tiles along an axis halves (by design) to 2.
        assert_eq!(5u32 / 2, 2);
    }

    #[test]
    fn box_downsampler_halve_averages_block() {
        let tile = PixelTile {
            data: bytes::Bytes::from(vec![1u8, 2, 3, 4]),
            width: 2,
            height: 2,
            mode: crate::image::Mode::L,
        };
        let halved = BoxPixelDownsampler.halve(&tile, 2, 2);
        assert_eq!(halved.width, 1);
        assert_eq!(halved.height, 1);
        assert_eq!(&halved.data[..], &[2u8]); // (1+2+3+4)/4 = 2
    }

    #[test]
    fn box_downsampler_stitch_places_quadrants() {
        let quadrant = |v: u8| PixelTile {
            data: bytes::Bytes::from(vec![v]),
            width: 1,
            height: 1,
            mode: crate::image::Mode::L,
        };
        let parts = [
            (quadrant(10), (0, 0)),
            (quadrant(30), (0, 1)),
            (quadrant(20), (1, 0)),
            (quadrant(40), (1, 1)),
        ];
        let stitched = BoxPixelDownsampler.stitch((2, 2), parts);
        assert_eq!(&stitched.data[..], &[10u8, 20, 30, 40]);
    }

    struct ConstGridSource {
        layout: OpImageLayout,
    }

    impl TiledImage for ConstGridSource {
        type Tile = PixelTile;
        fn id(&self) -> &str {
            &self.layout.id
        }
        fn mode(&self) -> crate::image::Mode {
            crate::image::Mode::L
        }
        fn size(&self) -> (u32, u32) {
            self.layout.size
        }
        fn tile_size(&self) -> (u32, u32) {
            self.layout.tile_size
        }
        fn get_tile(&self, tile_x: u32, tile_y: u32) -> EngineResult<Option<PixelTile>> {
            self.check_tile_range(tile_x, tile_y)?;
            let v = match (tile_x, tile_y) {
                (0, 0) => 10,
                (1, 0) => 20,
                (0, 1) => 30,
                (1, 1) => 40,
                _ => unreachable!(),
            };
            Ok(Some(PixelTile {
                data: bytes::Bytes::from(vec![v; 4]),
                width: 2,
                height: 2,
                mode: crate::image::Mode::L,
            }))
        }
    }

    #[test]
    fn pixel_downsampling_image_composes_quadrants() {
        use crate::cache::store::InMemoryStore;

        let source = ConstGridSource {
            layout: OpImageLayout::new((4, 4), (2, 2), crate::image::Mode::L),
        };
        let image: PixelDownsamplingImage<_, InMemoryStore> =
            PixelDownsamplingImage::new(source, Arc::new(BoxPixelDownsampler));
        assert_eq!(image.size(), (2, 2));
        assert_eq!(image.num_tiles(), (1, 1));

        let tile = image.get_tile(0, 0).unwrap().unwrap();
        assert_eq!(&tile.data[..], &[10u8, 20, 30, 40]);
    }
}
