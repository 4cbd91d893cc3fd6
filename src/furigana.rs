//! Furigana detection
//!
//! # Overview
//!
//! Furigana are small kana glosses printed beside kanji. OCR returns them as
//! separate short paragraphs, which would otherwise be spliced into the
//! running text. This module tags every paragraph of a page as regular text
//! or furigana.
//!
//! # Algorithm
//!
//! 1. Take the median of every symbol width on the page as the size baseline.
//!    Without a usable baseline every paragraph is regular.
//! 2. Take the median symbol width of each paragraph.
//! 3. A paragraph is furigana only if all of the following hold:
//!    - its median width is below `size_ratio` times the page baseline,
//!    - it is kana-only (no kanji, no punctuation),
//!    - none of its words has more than `max_word_symbols` symbols.
//!
//! A page with a single paragraph never yields furigana: its ratio is 1.0.

use crate::ocr::{OcrPage, TextParagraph};

/// Default width ratio below which a paragraph counts as small
pub const DEFAULT_SIZE_RATIO: f64 = 0.8;

/// Default longest word (in symbols) a furigana run may contain
pub const DEFAULT_MAX_WORD_SYMBOLS: usize = 6;

/// Options for furigana classification
#[derive(Debug, Clone, PartialEq)]
pub struct FuriganaOptions {
    /// Paragraph/page median width ratio that must be undercut
    pub size_ratio: f64,
    /// Longest word allowed in a furigana paragraph
    pub max_word_symbols: usize,
}

impl Default for FuriganaOptions {
    fn default() -> Self {
        Self {
            size_ratio: DEFAULT_SIZE_RATIO,
            max_word_symbols: DEFAULT_MAX_WORD_SYMBOLS,
        }
    }
}

impl FuriganaOptions {
    #[must_use]
    pub fn with_size_ratio(mut self, ratio: f64) -> Self {
        self.size_ratio = ratio;
        self
    }

    #[must_use]
    pub fn with_max_word_symbols(mut self, max: usize) -> Self {
        self.max_word_symbols = max;
        self
    }
}

/// Paragraph classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParagraphKind {
    #[default]
    Regular,
    Furigana,
}

impl ParagraphKind {
    /// Line prefix in the transcript
    pub fn tag(&self) -> &'static str {
        match self {
            ParagraphKind::Regular => "[REGULAR]",
            ParagraphKind::Furigana => "[FURIGANA]",
        }
    }
}

/// A paragraph tagged with its kind
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedParagraph {
    pub paragraph: TextParagraph,
    pub kind: ParagraphKind,
}

impl ClassifiedParagraph {
    pub fn regular(paragraph: TextParagraph) -> Self {
        Self {
            paragraph,
            kind: ParagraphKind::Regular,
        }
    }

    pub fn is_furigana(&self) -> bool {
        self.kind == ParagraphKind::Furigana
    }
}

/// Median of a list of values; `None` when empty
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Page-level furigana classifier
#[derive(Debug, Clone, Default)]
pub struct FuriganaClassifier {
    options: FuriganaOptions,
}

impl FuriganaClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: FuriganaOptions) -> Self {
        Self { options }
    }

    /// Median symbol width across every paragraph of the page
    pub fn page_median_width(paragraphs: &[TextParagraph]) -> Option<f64> {
        let widths: Vec<f64> = paragraphs
            .iter()
            .flat_map(|p| p.widths().iter().copied())
            .collect();
        median(&widths)
    }

    /// Classify every paragraph of a page, keeping reading order
    pub fn classify(&self, page: OcrPage) -> Vec<ClassifiedParagraph> {
        self.classify_paragraphs(page.paragraphs)
    }

    /// Classify a flat list of paragraphs, keeping reading order
    pub fn classify_paragraphs(&self, paragraphs: Vec<TextParagraph>) -> Vec<ClassifiedParagraph> {
        let baseline = match Self::page_median_width(&paragraphs) {
            Some(width) if width > 0.0 => width,
            _ => {
                tracing::debug!(
                    paragraphs = paragraphs.len(),
                    "no measurable symbol widths, treating page as regular text"
                );
                return paragraphs
                    .into_iter()
                    .map(ClassifiedParagraph::regular)
                    .collect();
            }
        };

        let classified: Vec<ClassifiedParagraph> = paragraphs
            .into_iter()
            .map(|paragraph| {
                let kind = if self.is_furigana(&paragraph, baseline) {
                    ParagraphKind::Furigana
                } else {
                    ParagraphKind::Regular
                };
                ClassifiedParagraph { paragraph, kind }
            })
            .collect();

        tracing::debug!(
            baseline,
            paragraphs = classified.len(),
            furigana = classified.iter().filter(|c| c.is_furigana()).count(),
            "classified page"
        );

        classified
    }

    /// The composite gate: small, kana-only, short words
    fn is_furigana(&self, paragraph: &TextParagraph, page_median_width: f64) -> bool {
        let Some(width) = median(paragraph.widths()) else {
            return false;
        };
        let is_small = width / page_median_width < self.options.size_ratio;
        let has_short_words = paragraph
            .words()
            .iter()
            .all(|word| word.len() <= self.options.max_word_symbols);

        is_small && paragraph.is_kana_only() && has_short_words
    }
}
