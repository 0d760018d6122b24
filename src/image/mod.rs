//! The tiled-image graph: the `TiledImage` capability trait and the
//! types shared by every node in it (source, decorator, downsampler).

pub mod array;
pub mod colormap;
pub mod decorator;
pub mod downsample;
pub mod fast_array;
pub mod op;
pub mod transform;

use crate::error::EngineResult;

/// Pixel format tag. Named after the PIL mode strings the original
/// implementation used, since `cache::store::ByteSizedStore` keys its
/// per-pixel byte accounting off exactly this set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Mode {
    Rgba,
    Rgbx,
    Rgb,
    YCbCr,
    Lab,
    Hsv,
    Bilevel,
    L,
    Other(String),
}

impl Mode {
    /// Whole-byte channel count per pixel, for raw pixel-buffer resizers
    /// that operate on byte-aligned samples. `Bilevel` packs sub-byte and
    /// is treated as 1 here — box-averaging a bit-packed buffer isn't
    /// meaningful without unpacking first, so bilevel tiles aren't a
    /// realistic input to a pixel-buffer downsampler.
    pub fn channels(&self) -> u32 {
        match self {
            Mode::Rgba | Mode::Rgbx => 4,
            Mode::Rgb | Mode::YCbCr | Mode::Lab | Mode::Hsv => 3,
            Mode::Bilevel | Mode::L | Mode::Other(_) => 1,
        }
    }
}

/// An optional encoded-file format tag (`"PNG"`, `"JPEG"`, ...), carried
/// for parity with the original's `format` property. The crate never
/// interprets this beyond handing it to an external encoder.
pub type Format = Option<String>;

/// A rectangle in source-image pixel coordinates: `(x, y, width, height)`.
/// `x`/`y` are signed so `FastArrayDownsamplingImage` can express
/// negative-origin slices against a backing array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rectangle {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl Rectangle {
    pub fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// The capability set every node in the tiled-image graph implements:
/// source images, decorators, and downsamplers alike.
///
/// `get_tile` returns `Ok(None)` when the requested tile is within the
/// image's declared grid but the upstream source produced nothing for it
/// (spec's "propagate null" disposition); it returns `Err` only for a
/// genuine failure (store failure, out-of-range coordinates).
pub trait TiledImage: Send + Sync {
    type Tile: Clone + Send + Sync;

    /// Stable identifier for this image, used as the tile-id prefix.
    fn id(&self) -> &str;

    /// Encoded-file format hint, if any.
    fn format(&self) -> Format {
        None
    }

    /// Pixel mode of tiles this image produces.
    fn mode(&self) -> Mode;

    /// Full image size in pixels, `(width, height)`.
    fn size(&self) -> (u32, u32);

    /// Tile size in pixels, `(width, height)`.
    fn tile_size(&self) -> (u32, u32);

    /// Number of tiles along each axis, `(num_x, num_y)`.
    fn num_tiles(&self) -> (u32, u32) {
        let (w, h) = self.size();
        let (tw, th) = self.tile_size();
        (w.div_ceil(tw), h.div_ceil(th))
    }

    /// Fetch the tile at grid coordinates `(tile_x, tile_y)`.
    fn get_tile(&self, tile_x: u32, tile_y: u32) -> EngineResult<Option<Self::Tile>>;

    /// Release any resources this image holds (cached tiles, upstream
    /// handles). Idempotent: calling `dispose` more than once is safe.
    fn dispose(&self) {}

    /// Bounds check shared by every `get_tile` implementation.
    fn check_tile_range(&self, tile_x: u32, tile_y: u32) -> EngineResult<()> {
        let (nx, ny) = self.num_tiles();
        if tile_x >= nx || tile_y >= ny {
            return Err(crate::error::EngineError::OutOfRange(format!(
                "tile ({tile_x}, {tile_y}) outside grid ({nx}, {ny})"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_counts_bytes_per_pixel() {
        assert_eq!(Mode::Rgba.channels(), 4);
        assert_eq!(Mode::Rgb.channels(), 3);
        assert_eq!(Mode::L.channels(), 1);
    }

    #[test]
    fn num_tiles_rounds_up() {
        struct Stub;
        impl TiledImage for Stub {
            type Tile = ();
            fn id(&self) -> &str {
                "stub"
            }
            fn mode(&self) -> Mode {
                Mode::Rgb
            }
            fn size(&self) -> (u32, u32) {
                (257, 100)
            }
            fn tile_size(&self) -> (u32, u32) {
                (256, 256)
            }
            fn get_tile(&self, _x: u32, _y: u32) -> EngineResult<Option<()>> {
                Ok(Some(()))
            }
        }
        assert_eq!(Stub.num_tiles(), (2, 1));
    }

    #[test]
    fn check_tile_range_rejects_out_of_bounds() {
        struct Stub;
        impl TiledImage for Stub {
            type Tile = ();
            fn id(&self) -> &str {
                "stub"
            }
            fn mode(&self) -> Mode {
                Mode::Rgb
            }
            fn size(&self) -> (u32, u32) {
                (256, 256)
            }
            fn tile_size(&self) -> (u32, u32) {
                (256, 256)
            }
            fn get_tile(&self, _x: u32, _y: u32) -> EngineResult<Option<()>> {
                Ok(Some(()))
            }
        }
        assert!(Stub.check_tile_range(0, 0).is_ok());
        assert!(Stub.check_tile_range(1, 0).is_err());
    }
}
