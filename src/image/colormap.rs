//! `ColorMappedImage`: maps a scalar source value to RGBA through a
//! `ColorMap`. The full matplotlib-style catalog (thumbnails,
//! categories) is an external collaborator; this module only needs a
//! function from `t in [0, 1]` to a color.

use std::sync::Arc;

use crate::cache::store::CacheStore;
use crate::cache::Cache;
use crate::error::EngineResult;
use crate::id;
use crate::image::decorator::DecoratorImage;
use crate::image::op::{OpImage, OpImageLayout};
use crate::image::transform::MaskedTile;
use crate::image::{Mode, Rectangle, TiledImage};

/// A linear color ramp from `t = 0.0` to `t = 1.0`. `t` outside that
/// range is clamped by callers before lookup.
pub trait ColorMap: Send + Sync {
    /// RGBA at position `t` (clamped to `[0, 1]`).
    fn color_at(&self, t: f64) -> [u8; 4];

    /// Color used for missing/masked samples. Defaults to transparent
    /// black, matching the original's `set_bad('k', 0)`.
    fn bad_color(&self) -> [u8; 4] {
        [0, 0, 0, 0]
    }
}

fn lerp(a: u8, b: u8, t: f64) -> u8 {
    (a as f64 + (b as f64 - a as f64) * t).round() as u8
}

fn ramp_color(stops: &[[u8; 3]], t: f64) -> [u8; 4] {
    let t = t.clamp(0.0, 1.0);
    let n = stops.len() - 1;
    let scaled = t * n as f64;
    let i = (scaled.floor() as usize).min(n - 1);
    let frac = scaled - i as f64;
    let [r0, g0, b0] = stops[i];
    let [r1, g1, b1] = stops[i + 1];
    [lerp(r0, r1, frac), lerp(g0, g1, frac), lerp(b0, b1, frac), 255]
}

/// A sequential grayscale ramp: black at `t=0` to white at `t=1`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GrayscaleColorMap;

impl ColorMap for GrayscaleColorMap {
    fn color_at(&self, t: f64) -> [u8; 4] {
        let v = (t.clamp(0.0, 1.0) * 255.0).round() as u8;
        [v, v, v, 255]
    }
}

/// A sequential blue-green-yellow ramp, in the spirit of "viridis".
#[derive(Debug, Default, Clone, Copy)]
pub struct ViridisLikeColorMap;

impl ColorMap for ViridisLikeColorMap {
    fn color_at(&self, t: f64) -> [u8; 4] {
        const STOPS: [[u8; 3]; 4] = [[68, 1, 84], [59, 82, 139], [33, 145, 140], [253, 231, 37]];
        ramp_color(&STOPS, t)
    }
}

/// A rainbow-style ramp, in the spirit of "jet" (the original's default).
#[derive(Debug, Default, Clone, Copy)]
pub struct JetLikeColorMap;

impl ColorMap for JetLikeColorMap {
    fn color_at(&self, t: f64) -> [u8; 4] {
        const STOPS: [[u8; 3]; 5] = [[0, 0, 143], [0, 255, 255], [255, 255, 0], [255, 128, 0], [128, 0, 0]];
        ramp_color(&STOPS, t)
    }
}

/// A diverging blue-white-red ramp, in the spirit of "coolwarm".
#[derive(Debug, Default, Clone, Copy)]
pub struct CoolwarmLikeColorMap;

impl ColorMap for CoolwarmLikeColorMap {
    fn color_at(&self, t: f64) -> [u8; 4] {
        const STOPS: [[u8; 3]; 3] = [[59, 76, 192], [221, 221, 221], [180, 4, 38]];
        ramp_color(&STOPS, t)
    }
}

/// Look up a built-in color map by name.
pub fn named(name: &str) -> Option<Arc<dyn ColorMap>> {
    match name {
        "gray" | "grayscale" => Some(Arc::new(GrayscaleColorMap)),
        "viridis" => Some(Arc::new(ViridisLikeColorMap)),
        "jet" => Some(Arc::new(JetLikeColorMap)),
        "coolwarm" => Some(Arc::new(CoolwarmLikeColorMap)),
        _ => None,
    }
}

/// An RGBA tile produced from a [`MaskedTile`] by clamping each sample
/// into `value_range` and running it through a [`ColorMap`].
#[derive(Debug, Clone, PartialEq)]
pub struct RgbaTile {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

pub struct ColorMappedImage<Src, S>
where
    Src: TiledImage<Tile = MaskedTile>,
    S: CacheStore<RgbaTile>,
{
    layout: OpImageLayout,
    source: Src,
    value_range: (f64, f64),
    cmap: Arc<dyn ColorMap>,
    cache: Option<Arc<Cache<RgbaTile, S>>>,
}

impl<Src, S> ColorMappedImage<Src, S>
where
    Src: TiledImage<Tile = MaskedTile>,
    S: CacheStore<RgbaTile>,
{
    pub fn new(source: Src, value_range: (f64, f64), cmap: Arc<dyn ColorMap>) -> Self {
        let layout = OpImageLayout::new(source.size(), source.tile_size(), Mode::Rgba)
            .with_id(id::new_image_id());
        Self {
            layout,
            source,
            value_range,
            cmap,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<Cache<RgbaTile, S>>) -> Self {
        self.cache = Some(cache);
        self
    }
}

impl<Src, S> TiledImage for ColorMappedImage<Src, S>
where
    Src: TiledImage<Tile = MaskedTile>,
    S: CacheStore<RgbaTile>,
{
    type Tile = RgbaTile;

    fn id(&self) -> &str {
        &self.layout.id
    }

    fn format(&self) -> Option<String> {
        self.layout.format.clone()
    }

    fn mode(&self) -> Mode {
        Mode::Rgba
    }

    fn size(&self) -> (u32, u32) {
        self.layout.size
    }

    fn tile_size(&self) -> (u32, u32) {
        self.layout.tile_size
    }

    fn get_tile(&self, tile_x: u32, tile_y: u32) -> EngineResult<Option<RgbaTile>> {
        self.get_tile_cached(tile_x, tile_y)
    }

    fn dispose(&self) {
        self.dispose_cached();
    }
}

impl<Src, S> OpImage<RgbaTile, S> for ColorMappedImage<Src, S>
where
    Src: TiledImage<Tile = MaskedTile>,
    S: CacheStore<RgbaTile>,
{
    fn layout(&self) -> &OpImageLayout {
        &self.layout
    }

    fn tile_cache(&self) -> Option<&Arc<Cache<RgbaTile, S>>> {
        self.cache.as_ref()
    }

    fn compute_tile(&self, tile_x: u32, tile_y: u32, rectangle: Rectangle) -> EngineResult<Option<RgbaTile>> {
        self.decorator_compute_tile(tile_x, tile_y, rectangle)
    }
}

impl<Src, S> DecoratorImage<RgbaTile, S> for ColorMappedImage<Src, S>
where
    Src: TiledImage<Tile = MaskedTile>,
    S: CacheStore<RgbaTile>,
{
    type Source = Src;

    fn source_image(&self) -> &Src {
        &self.source
    }

    fn compute_tile_from_source_tile(
        &self,
        _tile_x: u32,
        _tile_y: u32,
        _rectangle: Rectangle,
        source_tile: MaskedTile,
    ) -> EngineResult<Option<RgbaTile>> {
        let (min, max) = self.value_range;
        let span = (max - min).max(f64::EPSILON);
        let (_, h, w) = source_tile.shape;
        let mut data = Vec::with_capacity(w * h * 4);
        for (value, missing) in source_tile.values.iter().zip(source_tile.missing.iter()) {
            let rgba = if *missing {
                self.cmap.bad_color()
            } else {
                let t = (value.clamp(min, max) - min) / span;
                self.cmap.color_at(t)
            };
            data.extend_from_slice(&rgba);
        }
        Ok(Some(RgbaTile {
            data,
            width: w as u32,
            height: h as u32,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grayscale_endpoints() {
        let cmap = GrayscaleColorMap;
        assert_eq!(cmap.color_at(0.0), [0, 0, 0, 255]);
        assert_eq!(cmap.color_at(1.0), [255, 255, 255, 255]);
    }

    #[test]
    fn named_lookup_covers_builtins() {
        assert!(named("jet").is_some());
        assert!(named("viridis").is_some());
        assert!(named("nonexistent").is_none());
    }

    #[test]
    fn ramp_clamps_out_of_range_t() {
        let cmap = JetLikeColorMap;
        assert_eq!(cmap.color_at(-1.0), cmap.color_at(0.0));
        assert_eq!(cmap.color_at(2.0), cmap.color_at(1.0));
    }
}
