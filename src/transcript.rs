//! Transcript rendering
//!
//! Turns classified paragraphs into annotated lines, one section per image,
//! and assembles the final report. The formatter keeps whatever section
//! order it is given; callers sort before rendering.

use chrono::{DateTime, Local};

use crate::confidence;
use crate::furigana::{ClassifiedParagraph, ParagraphKind};
use crate::ocr::TextSymbol;

/// First line of every report
pub const REPORT_TITLE: &str = "=== Japanese OCR Results ===";

/// Format of the `Generated:` header line
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Rendered lines for one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTranscript {
    /// Relative path inside the input root
    pub relative_path: String,
    /// File name shown in the section header
    pub filename: String,
    /// One tagged line per non-empty paragraph
    pub lines: Vec<String>,
}

impl ImageTranscript {
    /// Render a section from classified paragraphs
    pub fn new(relative_path: impl Into<String>, paragraphs: &[ClassifiedParagraph]) -> Self {
        let relative_path = relative_path.into();
        let filename = relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&relative_path)
            .to_string();
        Self {
            relative_path,
            filename,
            lines: paragraphs.iter().filter_map(render_paragraph).collect(),
        }
    }

    /// Section header line
    pub fn header(&self) -> String {
        format!("=== Image: {} ===", self.filename)
    }

    /// Header followed by the paragraph lines
    pub fn render(&self) -> String {
        let mut out = self.header();
        for line in &self.lines {
            out.push('\n');
            out.push_str(line);
        }
        out
    }
}

/// A symbol's text wrapped in its confidence marker
pub fn render_symbol(symbol: &TextSymbol) -> String {
    confidence::annotate(&symbol.text, confidence::classify(symbol.confidence))
}

/// One tagged transcript line, or `None` for a paragraph without text
pub fn render_paragraph(classified: &ClassifiedParagraph) -> Option<String> {
    let text: String = classified.paragraph.symbols().map(render_symbol).collect();
    if text.is_empty() {
        return None;
    }
    let tag = classified.kind.tag();
    Some(match classified.kind {
        ParagraphKind::Furigana => format!("{tag}  {text} "),
        ParagraphKind::Regular => format!("{tag} {text}"),
    })
}

/// Report header lines
pub fn render_header(total_images: usize, generated_at: &DateTime<Local>) -> Vec<String> {
    vec![
        REPORT_TITLE.to_string(),
        format!("Total Images Processed: {total_images}"),
        format!("Generated: {}", generated_at.format(TIMESTAMP_FORMAT)),
        confidence::legend(),
    ]
}

/// Full report: header, blank line, then each section followed by a blank line
pub fn render_report(sections: &[ImageTranscript], generated_at: &DateTime<Local>) -> String {
    let mut lines = render_header(sections.len(), generated_at);
    lines.push(String::new());
    for section in sections {
        lines.push(section.header());
        lines.extend(section.lines.iter().cloned());
        lines.push(String::new());
    }
    lines.join("\n")
}
