//! `ImagePyramid`: a fixed-length stack of level images whose
//! resolution doubles between adjacent levels, plus the layout
//! algorithm (`compute_tile_size`, `num_level_zero_tiles`, `num_levels`)
//! used to derive it.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::image::TiledImage;

/// Ceiling division for non-negative integers: `ceil(num / denom)`.
pub fn cardinal_div_round(num: u32, denom: u32) -> u32 {
    (num + denom - 1) / denom
}

/// The number of times `x` can be evenly halved.
pub fn cardinal_log2(mut x: u32) -> u32 {
    let mut n = 0;
    while x % 2 == 0 && x > 0 {
        n += 1;
        x /= 2;
    }
    n
}

/// Pick a tile edge length for an axis of `total_size` pixels.
///
/// Two-phase algorithm, in order:
/// 1. **Natural halving**: while `total_size` is even and still above
///    `tile_size_max`, keep halving it, stopping rather than dropping
///    below `tile_size_min`. If this lands within
///    `[tile_size_min, tile_size_max]` (and meets `num_levels_min`, if
///    given), use it directly — the size that tiles the image exactly
///    with power-of-two levels and no waste.
/// 2. **Penalty scan**: otherwise, scan `tile_size_min..=tile_size_max`
///    in steps of `tile_size_step`, scoring each candidate by the
///    padding it leaves at the image edge (plus, if `chunk_size` is
///    given, the padding a tile leaves at a chunk boundary), and return
///    the lowest-penalty candidate.
pub fn compute_tile_size(
    total_size: u32,
    tile_size_min: u32,
    tile_size_max: u32,
    tile_size_step: u32,
    chunk_size: Option<u32>,
    num_levels_min: Option<u32>,
    int_div: bool,
) -> EngineResult<u32> {
    let mut ts = total_size;
    let mut num_levels = 0u32;
    while ts % 2 == 0 && ts > tile_size_max {
        let ts2 = ts / 2;
        if ts2 < tile_size_min {
            break;
        }
        ts = ts2;
        num_levels += 1;
    }
    let meets_levels_min = match num_levels_min {
        Some(min) => num_levels >= min,
        None => true,
    };
    if ts <= tile_size_max && meets_levels_min {
        return Ok(ts);
    }

    let mut min_penalty = 10 * total_size;
    let mut best: Option<u32> = None;
    let mut candidate = tile_size_min;
    while candidate <= tile_size_max {
        if !(int_div && total_size % candidate != 0) {
            let num_tiles = cardinal_div_round(total_size, candidate);
            let ok_levels = match num_levels_min {
                Some(min) => cardinal_log2(num_tiles * candidate) >= min,
                None => true,
            };
            if ok_levels {
                let total_excess = candidate * num_tiles - total_size;
                let mut penalty = total_excess;
                if let Some(chunk) = chunk_size {
                    let num_chunks = cardinal_div_round(candidate, chunk);
                    penalty += candidate * num_chunks - candidate;
                }
                if penalty < min_penalty {
                    min_penalty = penalty;
                    best = Some(candidate);
                }
            }
        }
        candidate += tile_size_step;
    }

    best.ok_or_else(|| EngineError::InvalidLayout("tile size could not be computed".to_string()))
}

/// The resolved inputs to an `ImagePyramid`: the source size, tile
/// size, tile count at level zero, and level count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutParams {
    pub max_size: (u32, u32),
    pub tile_size: (u32, u32),
    pub num_level_zero_tiles: (u32, u32),
    pub num_levels: u32,
}

/// Options accepted by [`compute_layout`]. Any field left `None` is
/// derived from the others.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutInputs {
    pub max_size: Option<(u32, u32)>,
    pub tile_size: Option<(u32, u32)>,
    pub num_level_zero_tiles: Option<(u32, u32)>,
    pub num_levels: Option<u32>,
    pub chunk_size: Option<(u32, u32)>,
    pub int_div: bool,
}

/// Parse a [`LayoutInputs`] from a JSON config document, the same way
/// the teacher's slide-metadata loader reads its sidecar file.
pub fn layout_inputs_from_json(text: &str) -> EngineResult<LayoutInputs> {
    Ok(serde_json::from_str(text)?)
}

/// Derive a complete [`LayoutParams`] from a partial [`LayoutInputs`].
///
/// `max_size` must be known, either directly or (when called via
/// [`ImagePyramid::create_from_array`]) from the backing array's shape;
/// that reconciliation happens in the caller, which then passes a fully
/// resolved `max_size` here.
pub fn compute_layout(inputs: LayoutInputs) -> EngineResult<LayoutParams> {
    let max_size = inputs
        .max_size
        .ok_or_else(|| EngineError::InvalidLayout("missing max_size value".to_string()))?;
    let (max_width, max_height) = max_size;

    let tile_size = match inputs.tile_size {
        Some(ts) => ts,
        None => {
            let (chunk_w, chunk_h) = inputs.chunk_size.unzip();
            (
                compute_tile_size(max_width, 180, 512, 2, chunk_w, None, inputs.int_div)?,
                compute_tile_size(max_height, 180, 512, 2, chunk_h, None, inputs.int_div)?,
            )
        }
    };
    let (tile_width, tile_height) = tile_size;

    let num_level_zero_tiles = inputs
        .num_level_zero_tiles
        .unwrap_or_else(|| (cardinal_div_round(max_width, max_height), cardinal_div_round(max_height, max_width)));

    let num_levels = match inputs.num_levels {
        Some(n) => n,
        None => {
            let mut num_levels = 1u32;
            let (mut num_tiles_x, mut num_tiles_y) = num_level_zero_tiles;
            loop {
                let w = num_tiles_x * tile_width;
                let h = num_tiles_y * tile_height;
                if w >= max_width && h >= max_height {
                    break;
                }
                num_tiles_x *= 2;
                num_tiles_y *= 2;
                num_levels += 1;
            }
            num_levels
        }
    };

    Ok(LayoutParams {
        max_size,
        tile_size,
        num_level_zero_tiles,
        num_levels,
    })
}

/// A fixed-length stack of level images, indexed `0..num_levels-1` with
/// resolution doubling between adjacent levels. Level `num_levels - 1`
/// is the highest resolution.
pub struct ImagePyramid<I> {
    num_level_zero_tiles: (u32, u32),
    tile_size: (u32, u32),
    levels: Vec<I>,
}

impl<I> ImagePyramid<I> {
    pub fn new(num_level_zero_tiles: (u32, u32), tile_size: (u32, u32), levels: Vec<I>) -> Self {
        Self {
            num_level_zero_tiles,
            tile_size,
            levels,
        }
    }

    pub fn num_level_zero_tiles(&self) -> (u32, u32) {
        self.num_level_zero_tiles
    }

    pub fn tile_size(&self) -> (u32, u32) {
        self.tile_size
    }

    pub fn num_levels(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn level_image(&self, z_index: u32) -> EngineResult<&I> {
        self.levels
            .get(z_index as usize)
            .ok_or_else(|| EngineError::OutOfRange(format!("level {z_index} out of range")))
    }

    /// Apply `mapper` to each level image, producing a new pyramid with
    /// the same layout. Used to rebuild a pyramid's levels behind a
    /// decorator (e.g. wrap every level in a `ColorMappedImage`).
    pub fn apply<J>(self, mut mapper: impl FnMut(I) -> J) -> ImagePyramid<J> {
        ImagePyramid {
            num_level_zero_tiles: self.num_level_zero_tiles,
            tile_size: self.tile_size,
            levels: self.levels.into_iter().map(&mut mapper).collect(),
        }
    }
}

impl<I: TiledImage> ImagePyramid<I> {
    pub fn get_tile(&self, tile_x: u32, tile_y: u32, z_index: u32) -> EngineResult<Option<I::Tile>> {
        self.level_image(z_index)?.get_tile(tile_x, tile_y)
    }

    pub fn dispose(&self) {
        use rayon::prelude::*;
        self.levels.par_iter().for_each(|level| level.dispose());
    }
}
