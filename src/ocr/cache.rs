//! File-based OCR result cache
//!
//! One JSON document per processed image, stored at
//! `<cache_dir>/<relative_path>.json`. Writes go through a temporary file in
//! the target directory followed by a rename, so a reader never sees a
//! half-written document.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use super::types::OcrPage;
use super::vision;

/// Cache file extension appended to the image's relative path
pub const CACHE_EXTENSION: &str = "json";

/// Cache error types
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache entry not found: {0}")]
    NotFound(PathBuf),

    #[error("Malformed cache entry {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// OCR result cache rooted at a directory
#[derive(Debug, Clone)]
pub struct OcrResultCache {
    root: PathBuf,
}

impl OcrResultCache {
    /// Create the cache, creating its directory if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Deterministic cache location for an image's relative path
    pub fn path_for(&self, relative_path: &str) -> Result<PathBuf> {
        let rel = Path::new(relative_path);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if relative_path.is_empty() || escapes {
            return Err(CacheError::InvalidKey(relative_path.to_string()));
        }
        Ok(self
            .root
            .join(format!("{}.{}", relative_path, CACHE_EXTENSION)))
    }

    /// Store a page, returning the location it was written to
    pub fn store(&self, relative_path: &str, page: &OcrPage) -> Result<PathBuf> {
        let path = self.path_for(relative_path)?;
        let json = vision::to_json(page).map_err(|e| CacheError::Malformed {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        write_atomic(&path, json.as_bytes())?;
        Ok(path)
    }

    /// Load the page stored for a relative path
    pub fn load(&self, relative_path: &str) -> Result<OcrPage> {
        let path = self.path_for(relative_path)?;
        Self::load_from(&path)
    }

    /// Load a page from an explicit cache location
    pub fn load_from(path: &Path) -> Result<OcrPage> {
        if !path.exists() {
            return Err(CacheError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidData => CacheError::Malformed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
            _ => CacheError::IoError(e),
        })?;
        vision::parse_response(&content).map_err(|e| CacheError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Write `data` to `path` via a temporary sibling file and rename
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::types::{BoundingPolygon, TextParagraph, TextSymbol, TextWord};
    use tempfile::tempdir;

    fn sample_page() -> OcrPage {
        OcrPage::new(vec![TextParagraph::new(vec![TextWord::new(vec![
            TextSymbol::new("日", 0.93, BoundingPolygon::rect(0, 0, 30, 30)),
            TextSymbol::new("本", 0.61, BoundingPolygon::rect(30, 0, 30, 30)),
        ])])])
    }

    #[test]
    fn test_path_for_is_deterministic() {
        let dir = tempdir().unwrap();
        let cache = OcrResultCache::new(dir.path()).unwrap();
        let a = cache.path_for("scans/p001.png").unwrap();
        let b = cache.path_for("scans/p001.png").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, dir.path().join("scans/p001.png.json"));
    }

    #[test]
    fn test_path_for_rejects_escape() {
        let dir = tempdir().unwrap();
        let cache = OcrResultCache::new(dir.path()).unwrap();
        assert!(matches!(
            cache.path_for("../outside.png"),
            Err(CacheError::InvalidKey(_))
        ));
        assert!(matches!(cache.path_for(""), Err(CacheError::InvalidKey(_))));
    }

    #[test]
    fn test_store_and_load() {
        let dir = tempdir().unwrap();
        let cache = OcrResultCache::new(dir.path()).unwrap();
        let page = sample_page();

        let location = cache.store("book/p1.jpg", &page).unwrap();
        assert!(location.exists());

        assert_eq!(cache.load("book/p1.jpg").unwrap(), page);
        assert_eq!(OcrResultCache::load_from(&location).unwrap(), page);
    }

    #[test]
    fn test_load_missing() {
        let dir = tempdir().unwrap();
        let cache = OcrResultCache::new(dir.path()).unwrap();
        assert!(matches!(cache.load("nope.png"), Err(CacheError::NotFound(_))));
    }

    #[test]
    fn test_load_malformed() {
        let dir = tempdir().unwrap();
        let cache = OcrResultCache::new(dir.path()).unwrap();
        let path = cache.path_for("bad.png").unwrap();
        std::fs::write(&path, "{ truncated").unwrap();
        assert!(matches!(
            cache.load("bad.png"),
            Err(CacheError::Malformed { .. })
        ));
    }

    #[test]
    fn test_store_overwrites() {
        let dir = tempdir().unwrap();
        let cache = OcrResultCache::new(dir.path()).unwrap();
        cache.store("p.png", &sample_page()).unwrap();
        cache.store("p.png", &OcrPage::default()).unwrap();
        assert!(cache.load("p.png").unwrap().is_empty());
    }

    // CACHE-001: 信頼度は保存と再読込で1ビットも変わらない
    #[test]
    fn test_store_and_load_preserves_every_confidence_bit() {
        let dir = tempdir().unwrap();
        let cache = OcrResultCache::new(dir.path()).unwrap();

        // Deterministic spread of f64 values in [0, 1)
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut confidences = vec![
            0.9856906946328695,
            0.1 + 0.2,
            f64::MIN_POSITIVE,
            1.0 - f64::EPSILON,
        ];
        for _ in 0..500 {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            confidences.push((state >> 11) as f64 / (1u64 << 53) as f64);
        }

        let symbols = confidences
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                TextSymbol::new("字", c, BoundingPolygon::rect(i as i32 * 10, 0, 10, 10))
            })
            .collect();
        let page = OcrPage::new(vec![TextParagraph::new(vec![TextWord::new(symbols)])]);

        cache.store("p.png", &page).unwrap();
        let loaded = cache.load("p.png").unwrap();
        let reloaded: Vec<u64> = loaded.paragraphs[0].words()[0]
            .symbols
            .iter()
            .map(|s| s.confidence.to_bits())
            .collect();
        let expected: Vec<u64> = confidences.iter().map(|c| c.to_bits()).collect();
        assert_eq!(reloaded, expected);
        assert_eq!(loaded, page);
    }
}
