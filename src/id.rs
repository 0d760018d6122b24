//! Tile and image id formatting.
//!
//! Tile ids are the cache key: `"<image_id>/<tile_y>/<tile_x>"`. Level
//! image ids suffix `"-L<z>"` on a stable root id so tiles belonging to
//! different pyramid levels never collide in a shared cache.

use uuid::Uuid;

/// Generate a fresh, globally unique image id.
///
/// The original implementation defaulted to `str(uuid.uuid4)`, the
/// stringified function object rather than a called UUID — every image
/// without an explicit id ended up sharing the literal string
/// `"<function uuid4 at 0x...>"`. `new_image_id` always returns a freshly
/// generated id.
pub fn new_image_id() -> String {
    Uuid::new_v4().to_string()
}

/// Build the cache key for a tile at `(tile_x, tile_y)` of image `image_id`.
pub fn tile_id(image_id: &str, tile_x: u32, tile_y: u32) -> String {
    format!("{image_id}/{tile_y}/{tile_x}")
}

/// Build the id of the level-`z` image derived from `root_id`.
pub fn level_image_id(root_id: &str, z: u32) -> String {
    format!("{root_id}-L{z}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_image_id_is_fresh_each_call() {
        let a = new_image_id();
        let b = new_image_id();
        assert_ne!(a, b);
    }

    #[test]
    fn tile_id_format_is_image_y_x() {
        assert_eq!(tile_id("abc", 3, 7), "abc/7/3");
    }

    #[test]
    fn level_image_id_format() {
        assert_eq!(level_image_id("root", 2), "root-L2");
    }
}
