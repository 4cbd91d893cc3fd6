//! Vision-style OCR response format
//!
//! The external OCR command and the on-disk result cache both speak the
//! `fullTextAnnotation` JSON shape (page -> block -> paragraph -> word ->
//! symbol). This module is the only place that shape is handled: it is
//! validated here once and converted into the typed records of
//! [`super::types`].
//!
//! Keys are accepted in camelCase or snake_case. Missing vertex
//! coordinates default to 0, and a missing or non-numeric confidence is
//! read as 1.0.

use serde::{Deserialize, Deserializer, Serialize};

use super::types::{
    BoundingPolygon, OcrError, OcrPage, Result, TextParagraph, TextSymbol, TextWord, Vertex,
};

/// Top-level response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionResponse {
    #[serde(
        default,
        alias = "full_text_annotation",
        skip_serializing_if = "Option::is_none"
    )]
    pub full_text_annotation: Option<FullTextAnnotation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<VisionStatus>,
}

/// Error status reported inside a response body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisionStatus {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FullTextAnnotation {
    #[serde(default)]
    pub pages: Vec<VisionPage>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisionPage {
    #[serde(default)]
    pub blocks: Vec<VisionBlock>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisionBlock {
    #[serde(default)]
    pub paragraphs: Vec<VisionParagraph>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionParagraph {
    #[serde(default, alias = "bounding_box", skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<VisionBoundingPoly>,
    #[serde(default)]
    pub words: Vec<VisionWord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionWord {
    #[serde(default, alias = "bounding_box", skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<VisionBoundingPoly>,
    #[serde(default)]
    pub symbols: Vec<VisionSymbol>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionSymbol {
    #[serde(default)]
    pub text: String,
    #[serde(
        default,
        deserialize_with = "lenient_confidence",
        skip_serializing_if = "Option::is_none"
    )]
    pub confidence: Option<f64>,
    #[serde(default, alias = "bounding_box", skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<VisionBoundingPoly>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisionBoundingPoly {
    #[serde(default)]
    pub vertices: Vec<VisionVertex>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VisionVertex {
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
}

/// Accepts numbers, numeric strings, or anything else (read as absent)
fn lenient_confidence<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

impl VisionResponse {
    /// Error message carried by the response, if any
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_ref()
            .map(|e| e.message.as_str())
            .filter(|m| !m.is_empty())
    }

    /// Flatten into the typed page structure
    ///
    /// A response without a text annotation is a valid, empty page.
    pub fn into_page(self) -> Result<OcrPage> {
        if let Some(message) = self.error_message() {
            return Err(OcrError::Service(message.to_string()));
        }

        let Some(annotation) = self.full_text_annotation else {
            return Ok(OcrPage::default());
        };

        let mut paragraphs = Vec::new();
        for page in annotation.pages {
            for block in page.blocks {
                for paragraph in block.paragraphs {
                    paragraphs.push(convert_paragraph(paragraph)?);
                }
            }
        }

        Ok(OcrPage::new(paragraphs))
    }

    /// Build a response from a typed page (single page, single block)
    pub fn from_page(page: &OcrPage) -> Self {
        let paragraphs = page
            .paragraphs
            .iter()
            .map(|paragraph| VisionParagraph {
                bounding_box: None,
                words: paragraph
                    .words()
                    .iter()
                    .map(|word| VisionWord {
                        bounding_box: None,
                        symbols: word.symbols.iter().map(symbol_to_vision).collect(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            full_text_annotation: Some(FullTextAnnotation {
                pages: vec![VisionPage {
                    blocks: vec![VisionBlock { paragraphs }],
                }],
                text: String::new(),
            }),
            error: None,
        }
    }
}

fn convert_paragraph(paragraph: VisionParagraph) -> Result<TextParagraph> {
    let words = paragraph
        .words
        .into_iter()
        .map(|word| {
            word.symbols
                .into_iter()
                .map(convert_symbol)
                .collect::<Result<Vec<_>>>()
                .map(TextWord::new)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(TextParagraph::new(words))
}

fn convert_symbol(symbol: VisionSymbol) -> Result<TextSymbol> {
    let poly = symbol.bounding_box.ok_or_else(|| {
        OcrError::MalformedResponse(format!("symbol {:?} has no bounding box", symbol.text))
    })?;
    let vertices = poly
        .vertices
        .into_iter()
        .map(|v| Vertex::new(v.x, v.y))
        .collect();
    let polygon = BoundingPolygon::new(vertices)?;
    Ok(TextSymbol::new(
        symbol.text,
        symbol.confidence.unwrap_or(1.0),
        polygon,
    ))
}

fn symbol_to_vision(symbol: &TextSymbol) -> VisionSymbol {
    VisionSymbol {
        text: symbol.text.clone(),
        confidence: Some(symbol.confidence),
        bounding_box: Some(VisionBoundingPoly {
            vertices: symbol
                .polygon
                .vertices()
                .iter()
                .map(|v| VisionVertex { x: v.x, y: v.y })
                .collect(),
        }),
    }
}

/// Parse a JSON document into a typed page
pub fn parse_response(json: &str) -> Result<OcrPage> {
    let response: VisionResponse = serde_json::from_str(json)
        .map_err(|e| OcrError::MalformedResponse(e.to_string()))?;
    response.into_page()
}

/// Serialize a typed page into a JSON document
pub fn to_json(page: &OcrPage) -> Result<String> {
    serde_json::to_string_pretty(&VisionResponse::from_page(page))
        .map_err(|e| OcrError::MalformedResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAMEL: &str = r#"{
        "fullTextAnnotation": {
            "pages": [{
                "blocks": [{
                    "paragraphs": [{
                        "words": [{
                            "symbols": [
                                {"text": "漢", "confidence": 0.98,
                                 "boundingBox": {"vertices": [{"x": 0, "y": 0}, {"x": 20, "y": 0}, {"x": 20, "y": 20}, {"x": 0, "y": 20}]}},
                                {"text": "字", "confidence": "0.71",
                                 "boundingBox": {"vertices": [{"y": 0}, {"x": 20, "y": 0}, {"x": 20, "y": 20}, {"y": 20}]}}
                            ]
                        }]
                    }]
                }]
            }]
        }
    }"#;

    #[test]
    fn test_parse_camel_case() {
        let page = parse_response(CAMEL).unwrap();
        assert_eq!(page.paragraphs.len(), 1);
        let symbols: Vec<_> = page.paragraphs[0].symbols().collect();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].text, "漢");
        assert!((symbols[1].confidence - 0.71).abs() < 1e-9);
        assert_eq!(symbols[1].width(), 20.0);
    }

    #[test]
    fn test_parse_snake_case_and_missing_confidence() {
        let json = r#"{"full_text_annotation": {"pages": [{"blocks": [{"paragraphs": [{"words": [{"symbols": [
            {"text": "あ", "bounding_box": {"vertices": [{"x": 0, "y": 0}, {"x": 8, "y": 0}, {"x": 8, "y": 8}, {"x": 0, "y": 8}]}}
        ]}]}]}]}]}}"#;
        let page = parse_response(json).unwrap();
        let symbol = page.paragraphs[0].symbols().next().unwrap();
        assert_eq!(symbol.confidence, 1.0);
    }

    #[test]
    fn test_non_numeric_confidence_is_high() {
        let json = r#"{"fullTextAnnotation": {"pages": [{"blocks": [{"paragraphs": [{"words": [{"symbols": [
            {"text": "あ", "confidence": "n/a", "boundingBox": {"vertices": [{}, {"x": 8}, {"x": 8, "y": 8}, {"y": 8}]}}
        ]}]}]}]}]}}"#;
        let page = parse_response(json).unwrap();
        assert_eq!(page.paragraphs[0].symbols().next().unwrap().confidence, 1.0);
    }

    #[test]
    fn test_missing_annotation_is_empty_page() {
        let page = parse_response("{}").unwrap();
        assert!(page.is_empty());
    }

    #[test]
    fn test_error_body_is_service_failure() {
        let json = r#"{"error": {"code": 8, "message": "Quota exceeded"}}"#;
        let err = parse_response(json).unwrap_err();
        assert!(matches!(err, OcrError::Service(ref m) if m == "Quota exceeded"));
    }

    #[test]
    fn test_short_polygon_is_malformed() {
        let json = r#"{"fullTextAnnotation": {"pages": [{"blocks": [{"paragraphs": [{"words": [{"symbols": [
            {"text": "あ", "boundingBox": {"vertices": [{"x": 0, "y": 0}, {"x": 8, "y": 0}]}}
        ]}]}]}]}]}}"#;
        assert!(matches!(
            parse_response(json),
            Err(OcrError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        assert!(matches!(
            parse_response("not json"),
            Err(OcrError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_to_json_preserves_shape() {
        let page = parse_response(CAMEL).unwrap();
        let json = to_json(&page).unwrap();
        assert!(json.contains("fullTextAnnotation"));
        assert!(json.contains("boundingBox"));
        assert_eq!(parse_response(&json).unwrap(), page);
    }

    #[test]
    fn test_multiple_blocks_flatten_in_order() {
        let json = r#"{"fullTextAnnotation": {"pages": [
            {"blocks": [{"paragraphs": [{"words": []}]}, {"paragraphs": [{"words": []}, {"words": []}]}]},
            {"blocks": [{"paragraphs": [{"words": []}]}]}
        ]}}"#;
        let page = parse_response(json).unwrap();
        assert_eq!(page.paragraphs.len(), 4);
    }
}
