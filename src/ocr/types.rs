//! Common types for the OCR module

use thiserror::Error;

use crate::script;

// ============================================================
// Error Types
// ============================================================

/// OCR collaborator error types
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR command not found: {0}")]
    CommandNotFound(String),

    #[error("OCR service error: {0}")]
    Service(String),

    #[error("OCR timed out after {0}s")]
    Timeout(u64),

    #[error("Malformed OCR response: {0}")]
    MalformedResponse(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OcrError>;

// ============================================================
// Geometry
// ============================================================

/// Minimum number of vertices in a bounding polygon
pub const MIN_POLYGON_VERTICES: usize = 4;

/// Polygon vertex (top-left origin)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vertex {
    pub x: i32,
    pub y: i32,
}

impl Vertex {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Ordered, clockwise bounding polygon of at least four vertices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundingPolygon {
    vertices: Vec<Vertex>,
}

impl BoundingPolygon {
    /// Validate and wrap a vertex list
    pub fn new(vertices: Vec<Vertex>) -> Result<Self> {
        if vertices.len() < MIN_POLYGON_VERTICES {
            return Err(OcrError::MalformedResponse(format!(
                "bounding polygon has {} vertices, expected at least {}",
                vertices.len(),
                MIN_POLYGON_VERTICES
            )));
        }
        Ok(Self { vertices })
    }

    /// Axis-aligned rectangle `(x, y, width, height)`
    pub fn rect(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            vertices: vec![
                Vertex::new(x, y),
                Vertex::new(x + width, y),
                Vertex::new(x + width, y + height),
                Vertex::new(x, y + height),
            ],
        }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Width of the axis-aligned bounding box
    pub fn width(&self) -> f64 {
        let (min, max) = self
            .vertices
            .iter()
            .fold((i32::MAX, i32::MIN), |(lo, hi), v| (lo.min(v.x), hi.max(v.x)));
        // Widened so extreme coordinates cannot overflow
        (i64::from(max) - i64::from(min)) as f64
    }
}

// ============================================================
// Text Hierarchy
// ============================================================

/// One recognized character
#[derive(Debug, Clone, PartialEq)]
pub struct TextSymbol {
    /// Recognized text (one or more code points)
    pub text: String,
    /// Recognition confidence (0.0-1.0)
    pub confidence: f64,
    /// Bounding polygon
    pub polygon: BoundingPolygon,
}

impl TextSymbol {
    pub fn new(text: impl Into<String>, confidence: f64, polygon: BoundingPolygon) -> Self {
        Self {
            text: text.into(),
            confidence,
            polygon,
        }
    }

    /// Bounding-box width of this symbol
    pub fn width(&self) -> f64 {
        self.polygon.width()
    }
}

/// Symbols in reading order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextWord {
    pub symbols: Vec<TextSymbol>,
}

impl TextWord {
    pub fn new(symbols: Vec<TextSymbol>) -> Self {
        Self { symbols }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Plain text without confidence markers
    pub fn text(&self) -> String {
        self.symbols.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Words in reading order, with derived size and script attributes
#[derive(Debug, Clone, PartialEq)]
pub struct TextParagraph {
    words: Vec<TextWord>,
    widths: Vec<f64>,
    is_kana_only: bool,
}

impl TextParagraph {
    /// Build a paragraph, deriving symbol widths and the kana-only flag
    pub fn new(words: Vec<TextWord>) -> Self {
        let mut widths = Vec::new();
        let mut is_kana_only = true;

        for symbol in words.iter().flat_map(|w| w.symbols.iter()) {
            widths.push(symbol.width());
            if is_kana_only && !script::is_kana_text(&symbol.text) {
                is_kana_only = false;
            }
        }

        Self {
            words,
            widths,
            is_kana_only,
        }
    }

    pub fn words(&self) -> &[TextWord] {
        &self.words
    }

    /// Per-symbol bounding-box widths, in encounter order
    pub fn widths(&self) -> &[f64] {
        &self.widths
    }

    /// Every symbol is hiragana/katakana with no kanji
    pub fn is_kana_only(&self) -> bool {
        self.is_kana_only
    }

    pub fn symbol_count(&self) -> usize {
        self.widths.len()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &TextSymbol> {
        self.words.iter().flat_map(|w| w.symbols.iter())
    }

    /// Plain text without confidence markers
    pub fn text(&self) -> String {
        self.words.iter().map(TextWord::text).collect()
    }
}

/// All paragraphs recognized on one image, in reading order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OcrPage {
    pub paragraphs: Vec<TextParagraph>,
}

impl OcrPage {
    pub fn new(paragraphs: Vec<TextParagraph>) -> Self {
        Self { paragraphs }
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    pub fn symbol_count(&self) -> usize {
        self.paragraphs.iter().map(TextParagraph::symbol_count).sum()
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(text: &str, width: i32) -> TextSymbol {
        TextSymbol::new(text, 0.95, BoundingPolygon::rect(0, 0, width, 20))
    }

    #[test]
    fn test_polygon_requires_four_vertices() {
        let result = BoundingPolygon::new(vec![Vertex::new(0, 0), Vertex::new(1, 0)]);
        assert!(matches!(result, Err(OcrError::MalformedResponse(_))));
    }

    #[test]
    fn test_polygon_size() {
        let poly = BoundingPolygon::rect(10, 20, 30, 40);
        assert_eq!(poly.width(), 30.0);
        assert_eq!(poly.vertices().len(), 4);
    }

    #[test]
    fn test_rotated_polygon_width_uses_extent() {
        let poly = BoundingPolygon::new(vec![
            Vertex::new(5, 0),
            Vertex::new(15, 5),
            Vertex::new(10, 15),
            Vertex::new(0, 10),
        ])
        .unwrap();
        assert_eq!(poly.width(), 15.0);
    }

    #[test]
    fn test_polygon_width_spanning_full_i32_range() {
        let poly = BoundingPolygon::new(vec![
            Vertex::new(-2_000_000_000, 0),
            Vertex::new(2_000_000_000, 0),
            Vertex::new(2_000_000_000, 10),
            Vertex::new(-2_000_000_000, 10),
        ])
        .unwrap();
        assert_eq!(poly.width(), 4_000_000_000.0);

        let extreme = BoundingPolygon::rect(i32::MIN, 0, 0, 1);
        assert_eq!(extreme.width(), 0.0);
    }

    #[test]
    fn test_paragraph_derived_attributes() {
        let para = TextParagraph::new(vec![
            TextWord::new(vec![sym("ふ", 10), sym("り", 12)]),
            TextWord::new(vec![sym("ガ", 11)]),
        ]);
        assert_eq!(para.widths(), &[10.0, 12.0, 11.0]);
        assert!(para.is_kana_only());
        assert_eq!(para.symbol_count(), 3);
        assert_eq!(para.text(), "ふりガ");
    }

    #[test]
    fn test_paragraph_with_kanji_is_not_kana() {
        let para = TextParagraph::new(vec![TextWord::new(vec![sym("か", 10), sym("漢", 20)])]);
        assert!(!para.is_kana_only());
    }

    #[test]
    fn test_paragraph_with_punctuation_is_not_kana() {
        let para = TextParagraph::new(vec![TextWord::new(vec![sym("か", 10), sym("。", 10)])]);
        assert!(!para.is_kana_only());
    }

    #[test]
    fn test_empty_paragraph() {
        let para = TextParagraph::new(vec![]);
        assert!(para.widths().is_empty());
        assert_eq!(para.text(), "");
    }

    #[test]
    fn test_page_symbol_count() {
        let page = OcrPage::new(vec![
            TextParagraph::new(vec![TextWord::new(vec![sym("あ", 10)])]),
            TextParagraph::new(vec![TextWord::new(vec![sym("い", 10), sym("う", 10)])]),
        ]);
        assert_eq!(page.symbol_count(), 3);
        assert!(!page.is_empty());
    }
}
