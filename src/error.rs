//! Error types for the tile pyramid engine.

use thiserror::Error;

/// Error kinds surfaced by the cache, image graph, and pyramid builder.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The pyramid layout could not be computed: inconsistent `max_size`
    /// and array shape, or `compute_tile_size` found no candidate.
    #[error("invalid pyramid layout: {0}")]
    InvalidLayout(String),

    /// `get_tile`/`ImagePyramid::get_tile` was called with coordinates
    /// outside the image's or pyramid's grid.
    #[error("tile coordinate out of range: {0}")]
    OutOfRange(String),

    /// A `CacheStore` adapter failed to store, restore, or discard a value.
    #[error("cache store failure: {0}")]
    StoreFailure(String),

    /// A named color map was not found in the catalog.
    #[error("unknown color map: {0}")]
    InvalidColormap(String),

    /// An upstream source image produced no data for a tile. Most callers
    /// never see this: `get_tile` returns `Option<Tile>` and translates a
    /// missing upstream tile to `None` directly. This variant exists for
    /// adapters that want to log the condition before discarding it.
    #[error("upstream produced no tile: {0}")]
    UpstreamMissing(String),

    /// I/O error from a store or array adapter that touches disk or network.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A layout config document failed to parse as JSON.
    #[error("config error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;
