//! Errors surfaced by the JSON bridge and fog raster I/O.
//!
//! The geometry core never fails: bad input degrades to a no-op or `None`.

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid {what} JSON: {source}")]
    InvalidJson {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unknown wall: {0}")]
    UnknownWall(String),
    #[error("Unknown door material: {0}")]
    UnknownMaterial(String),
    #[error("PNG decode failed: {0}")]
    PngDecode(#[from] png::DecodingError),
    #[error("PNG encode failed: {0}")]
    PngEncode(#[from] png::EncodingError),
    #[error("Unsupported PNG layout: {0:?} at {1:?}")]
    UnsupportedPng(png::ColorType, png::BitDepth),
}
