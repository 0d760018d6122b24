//! End-to-end pyramid scenarios exercised through the public crate
//! surface: layout derivation, array-backed downsampling composition,
//! and cache disposal.

use std::sync::Arc;

use tile_pyramid_core::cache::store::InMemoryStore;
use tile_pyramid_core::cache::{Cache, Policy};
use tile_pyramid_core::image::array::MemoryArray;
use tile_pyramid_core::image::fast_array::FastArrayDownsamplingImage;
use tile_pyramid_core::image::op::OpImageLayout;
use tile_pyramid_core::image::{Mode, TiledImage};
use tile_pyramid_core::pyramid::{compute_layout, ImagePyramid, LayoutInputs};

// S4: a 4096x2048 image tiled at 512 needs 3 levels, level zero at 2x1 tiles.
#[test]
fn pyramid_layout_from_wide_image() {
    let layout = compute_layout(LayoutInputs {
        max_size: Some((4096, 2048)),
        tile_size: Some((512, 512)),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(layout.num_level_zero_tiles, (2, 1));
    assert_eq!(layout.num_levels, 3);
}

// S5: a two-level array-backed pyramid built from a 1024x1024 source with
// 256-pixel tiles; the lowest-resolution level's tile (0,0) pixel (i, j)
// is the source pixel at (2i, 2j) -- the "first" aggregate, here realized
// as FastArrayDownsamplingImage's plain strided slice.
#[test]
fn downsampling_composition_picks_first_source_pixel() {
    let size = 1024usize;
    let data: Vec<f64> = (0..size * size).map(|v| v as f64).collect();
    let array = Arc::new(MemoryArray::new(data, 1, size, size));

    let num_levels = 2u32;
    let tile_size = (256u32, 256u32);
    let mut levels = Vec::new();
    for z in 0..num_levels {
        let image = FastArrayDownsamplingImage::<_, InMemoryStore>::new(
            array.clone(),
            tile_size,
            z,
            num_levels,
            "source",
            None,
        )
        .unwrap();
        levels.push(image);
    }
    let pyramid = ImagePyramid::new((1, 1), tile_size, levels);

    let tile = pyramid.get_tile(0, 0, 0).unwrap().unwrap();
    assert_eq!(tile.shape, (1, 256, 256));
    for j in 0..4usize {
        for i in 0..4usize {
            let expected = (2 * j * size + 2 * i) as f64;
            assert_eq!(tile.data[j * 256 + i], expected);
        }
    }

    // The highest-resolution level (z = num_levels - 1) has zoom 1 and
    // returns the source verbatim.
    let top_tile = pyramid.get_tile(0, 0, 1).unwrap().unwrap();
    assert_eq!(top_tile.data[0], 0.0);
    assert_eq!(top_tile.data[1], 1.0);
}

// S6: fetch every tile of a 16-tile OpImage, dispose it, and confirm the
// cache returns to its pre-creation size.
#[test]
fn dispose_returns_cache_to_baseline() {
    use tile_pyramid_core::error::EngineResult;
    use tile_pyramid_core::image::op::OpImage;
    use tile_pyramid_core::image::Rectangle;

    struct Grid {
        layout: OpImageLayout,
        cache: Arc<Cache<i32, InMemoryStore>>,
    }

    impl TiledImage for Grid {
        type Tile = i32;
        fn id(&self) -> &str {
            &self.layout.id
        }
        fn mode(&self) -> Mode {
            Mode::L
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

    impl OpImage<i32, InMemoryStore> for Grid {
        fn layout(&self) -> &OpImageLayout {
            &self.layout
        }
        fn tile_cache(&self) -> Option<&Arc<Cache<i32, InMemoryStore>>> {
            Some(&self.cache)
        }
        fn compute_tile(&self, tile_x: u32, tile_y: u32, _rect: Rectangle) -> EngineResult<Option<i32>> {
            Ok(Some((tile_x + tile_y) as i32))
        }
    }

    let cache = Arc::new(Cache::new(InMemoryStore, 1000.0, 1.0, Policy::Lru));
    let baseline = cache.size();

    let grid = Grid {
        layout: OpImageLayout::new((1024, 1024), (256, 256), Mode::L),
        cache: cache.clone(),
    };
    let (nx, ny) = grid.num_tiles();
    assert_eq!(nx * ny, 16);
    for ty in 0..ny {
        for tx in 0..nx {
            grid.get_tile(tx, ty).unwrap();
        }
    }
    assert_eq!(cache.size(), baseline + 16);

    grid.dispose();
    assert_eq!(cache.size(), baseline);
}
