//! Confidence buckets and display markers
//!
//! Recognition confidence is mapped onto a fixed, closed table of buckets,
//! evaluated from the highest threshold down. The last bucket has a
//! threshold of zero and matches everything that fell through.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence bucket for a recognized symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBucket {
    /// >= 0.90, no marker
    High,
    /// >= 0.80
    Medium,
    /// >= 0.60
    Low,
    /// Everything else
    VeryLow,
}

/// Buckets in evaluation order (threshold descending)
pub const BUCKETS: [ConfidenceBucket; 4] = [
    ConfidenceBucket::High,
    ConfidenceBucket::Medium,
    ConfidenceBucket::Low,
    ConfidenceBucket::VeryLow,
];

impl ConfidenceBucket {
    /// Bucket name as used in reports and logs
    pub fn name(&self) -> &'static str {
        match self {
            ConfidenceBucket::High => "high",
            ConfidenceBucket::Medium => "medium",
            ConfidenceBucket::Low => "low",
            ConfidenceBucket::VeryLow => "very_low",
        }
    }

    /// Lower bound of the bucket
    pub fn threshold(&self) -> f64 {
        match self {
            ConfidenceBucket::High => 0.90,
            ConfidenceBucket::Medium => 0.80,
            ConfidenceBucket::Low => 0.60,
            ConfidenceBucket::VeryLow => 0.0,
        }
    }

    /// Marker wrapped around text in this bucket
    pub fn marker(&self) -> &'static str {
        match self {
            ConfidenceBucket::High => "",
            ConfidenceBucket::Medium => "[?]",
            ConfidenceBucket::Low => "[??]",
            ConfidenceBucket::VeryLow => "[???]",
        }
    }

    /// Human readable label used in the report legend
    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceBucket::High => "high confidence",
            ConfidenceBucket::Medium => "medium confidence",
            ConfidenceBucket::Low => "low confidence",
            ConfidenceBucket::VeryLow => "very low confidence",
        }
    }
}

impl fmt::Display for ConfidenceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Classify a confidence score.
///
/// NaN is treated like a missing score: assumed trustworthy.
pub fn classify(confidence: f64) -> ConfidenceBucket {
    if confidence.is_nan() {
        return ConfidenceBucket::High;
    }
    BUCKETS
        .into_iter()
        .find(|bucket| confidence >= bucket.threshold())
        .unwrap_or(ConfidenceBucket::VeryLow)
}

/// Wrap `text` in the bucket's marker on both sides
pub fn annotate(text: &str, bucket: ConfidenceBucket) -> String {
    let marker = bucket.marker();
    if marker.is_empty() {
        text.to_string()
    } else {
        format!("{marker}{text}{marker}")
    }
}

/// Legend line describing every non-empty marker
pub fn legend() -> String {
    let parts: Vec<String> = BUCKETS
        .iter()
        .filter(|bucket| !bucket.marker().is_empty())
        .map(|bucket| format!("{} = {}", bucket.marker(), bucket.label()))
        .collect();
    format!("Confidence Markers: {}", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(classify(0.90), ConfidenceBucket::High);
        assert_eq!(classify(0.8999), ConfidenceBucket::Medium);
        assert_eq!(classify(0.80), ConfidenceBucket::Medium);
        assert_eq!(classify(0.60), ConfidenceBucket::Low);
        assert_eq!(classify(0.5999), ConfidenceBucket::VeryLow);
        assert_eq!(classify(1.0), ConfidenceBucket::High);
        assert_eq!(classify(0.0), ConfidenceBucket::VeryLow);
    }

    #[test]
    fn test_out_of_range_scores() {
        assert_eq!(classify(-0.5), ConfidenceBucket::VeryLow);
        assert_eq!(classify(1.5), ConfidenceBucket::High);
    }

    #[test]
    fn test_nan_confidence_is_high() {
        assert_eq!(classify(f64::NAN), ConfidenceBucket::High);
    }

    #[test]
    fn test_table_is_descending() {
        for pair in BUCKETS.windows(2) {
            assert!(pair[0].threshold() > pair[1].threshold());
        }
        assert_eq!(BUCKETS[BUCKETS.len() - 1].threshold(), 0.0);
    }

    #[test]
    fn test_annotate() {
        assert_eq!(annotate("字", ConfidenceBucket::High), "字");
        assert_eq!(annotate("字", ConfidenceBucket::Medium), "[?]字[?]");
        assert_eq!(annotate("字", ConfidenceBucket::Low), "[??]字[??]");
        assert_eq!(annotate("字", ConfidenceBucket::VeryLow), "[???]字[???]");
    }

    #[test]
    fn test_legend() {
        assert_eq!(
            legend(),
            "Confidence Markers: [?] = medium confidence, [??] = low confidence, [???] = very low confidence"
        );
    }

    #[test]
    fn test_display_and_serde_names() {
        assert_eq!(ConfidenceBucket::VeryLow.to_string(), "very_low");
        let json = serde_json::to_string(&ConfidenceBucket::VeryLow).unwrap();
        assert_eq!(json, "\"very_low\"");
    }
}
