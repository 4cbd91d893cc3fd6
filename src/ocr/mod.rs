//! OCR module
//!
//! Everything on the OCR side of the pipeline:
//!
//! - **Types** - the recognized text hierarchy (paragraph -> word -> symbol)
//!   with bounding polygons and per-symbol confidence
//! - **Vision** ([`vision`]) - conversion from the Vision-style JSON response
//! - **Engine** - the [`OcrEngine`] collaborator trait and an external-command
//!   implementation
//! - **Cache** - on-disk store of recognized pages, keyed by relative path

mod cache;
mod engine;
mod types;

pub mod vision;

// Re-export public API
pub use cache::{CacheError, OcrResultCache, CACHE_EXTENSION};
pub(crate) use cache::write_atomic;
pub use engine::{CommandOcrEngine, CommandOcrOptions, OcrEngine, CREDENTIALS_ENV};
pub use types::{
    BoundingPolygon, OcrError, OcrPage, Result, TextParagraph, TextSymbol, TextWord, Vertex,
    MIN_POLYGON_VERTICES,
};
