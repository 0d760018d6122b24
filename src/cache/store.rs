//! Pluggable adapters that size, serialize, and discard cached values.

use crate::error::EngineResult;
use crate::image::fast_array::ArrayTile;
use crate::image::Mode;

/// Bytes per pixel for `mode` (fractional for sub-byte modes; the caller
/// rounds up to a whole byte count).
fn bytes_per_pixel(mode: &Mode) -> f64 {
    match mode {
        Mode::Rgba | Mode::Rgbx => 4.0,
        Mode::Rgb | Mode::YCbCr | Mode::Lab | Mode::Hsv => 3.0,
        Mode::Bilevel => 1.0 / 8.0,
        Mode::L | Mode::Other(_) => 1.0,
    }
}

/// A value a [`ByteSizedStore`] can measure: either a dense pixel buffer
/// with known dimensions and mode, or an ND-array-like payload that
/// reports its own byte count directly.
pub trait Sized4Cache {
    /// Report the payload's size in bytes, or `None` if it cannot size
    /// itself (the store then falls back to a best-effort estimate).
    fn cache_size_hint(&self) -> Option<usize>;
}

/// A pluggable adapter the cache uses to externalize payload
/// representation. See spec §4.1.
///
/// `store_value` may transform the value (compress, encode) and must
/// report its size in the store's unit; `restore_value` must be the
/// pure, idempotent inverse; `discard_value` must tolerate being called
/// more than once for the same stored representation.
pub trait CacheStore<V>: Send + Sync {
    /// The representation actually held by the cache's item table.
    type Stored: Clone + Send + Sync;

    /// Store `value` and report its stored representation plus size.
    fn store_value(&self, key: &str, value: V) -> EngineResult<(Self::Stored, usize)>;

    /// Restore a value from its stored representation.
    fn restore_value(&self, key: &str, stored: &Self::Stored) -> EngineResult<V>;

    /// Release any resources owned by `stored`. Must be safe to call
    /// more than once for logically-the-same item (idempotent).
    fn discard_value(&self, key: &str, stored: &Self::Stored);
}

/// The default in-memory store: returns the value unchanged with a
/// count-based size of 1 per item (capacity is then "number of items").
#[derive(Debug, Default, Clone, Copy)]
pub struct InMemoryStore;

impl<V: Clone + Send + Sync> CacheStore<V> for InMemoryStore {
    type Stored = V;

    fn store_value(&self, _key: &str, value: V) -> EngineResult<(V, usize)> {
        Ok((value, 1))
    }

    fn restore_value(&self, _key: &str, stored: &V) -> EngineResult<V> {
        Ok(stored.clone())
    }

    fn discard_value(&self, _key: &str, _stored: &V) {}
}

/// A store that measures payload size in bytes.
///
/// For values implementing [`Sized4Cache`] (ND-array-like payloads that
/// know their own `nbytes`), that hint is used directly. Otherwise, given
/// pixel-buffer dimensions and a [`Mode`], the size is
/// `width * height * bytes_per_pixel(mode)`. If neither is available the
/// store falls back to `std::mem::size_of_val`, a best-effort estimate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ByteSizedStore;

/// A dense pixel-buffer tile: raw bytes plus the metadata needed to
/// compute its resident size.
#[derive(Debug, Clone)]
pub struct PixelTile {
    pub data: bytes::Bytes,
    pub width: u32,
    pub height: u32,
    pub mode: Mode,
}

impl ByteSizedStore {
    /// Best-effort byte size for a pixel buffer of `width x height` in `mode`.
    pub fn pixel_buffer_size(width: u32, height: u32, mode: &Mode) -> usize {
        let pixels = width as f64 * height as f64;
        let bytes = pixels * bytes_per_pixel(mode);
        bytes.ceil() as usize
    }
}

impl CacheStore<PixelTile> for ByteSizedStore {
    type Stored = PixelTile;

    fn store_value(&self, _key: &str, value: PixelTile) -> EngineResult<(PixelTile, usize)> {
        let size = Self::pixel_buffer_size(value.width, value.height, &value.mode);
        Ok((value, size))
    }

    fn restore_value(&self, _key: &str, stored: &PixelTile) -> EngineResult<PixelTile> {
        Ok(stored.clone())
    }

    fn discard_value(&self, _key: &str, _stored: &PixelTile) {}
}

impl Sized4Cache for ArrayTile {
    fn cache_size_hint(&self) -> Option<usize> {
        Some(self.data.len() * std::mem::size_of::<f64>())
    }
}

impl CacheStore<ArrayTile> for ByteSizedStore {
    type Stored = ArrayTile;

    fn store_value(&self, _key: &str, value: ArrayTile) -> EngineResult<(ArrayTile, usize)> {
        let size = value.cache_size_hint().unwrap_or_else(|| std::mem::size_of_val(&value));
        Ok((value, size))
    }

    fn restore_value(&self, _key: &str, stored: &ArrayTile) -> EngineResult<ArrayTile> {
        Ok(stored.clone())
    }

    fn discard_value(&self, _key: &str, _stored: &ArrayTile) {}
}
