//! Confidence-scored format detection
//!
//! A [`Detector`] holds weighted indicators for one dialect. The score is
//! the sum of the weights of every matching indicator, capped at 100.
//!
//! Scores are not normalized against the size of an indicator set, so two
//! dialects with differently sized sets are not guaranteed to share a scale.

use crate::markdown::compile;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Score at which content counts as detected
pub const DEFAULT_MIN_CONFIDENCE: u8 = 50;

/// Maximum score
pub const MAX_CONFIDENCE: u8 = 100;

/// One weighted structural marker
#[derive(Debug, Clone)]
pub struct Indicator {
    regex: Regex,
    weight: u8,
    label: &'static str,
}

impl Indicator {
    /// Create indicator; `None` if `pattern` is not a valid regex
    #[must_use]
    pub fn new(pattern: &str, weight: u8, label: &'static str) -> Option<Self> {
        Some(Self {
            regex: compile(pattern)?,
            weight,
            label,
        })
    }

    #[inline]
    #[must_use]
    pub fn weight(&self) -> u8 {
        self.weight
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    #[inline]
    #[must_use]
    pub fn matches(&self, content: &str) -> bool {
        self.regex.is_match(content)
    }
}

/// Outcome of running a detector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Confidence reached the detector's threshold
    pub detected: bool,
    /// Capped weighted score, 0..=100
    pub confidence: u8,
    /// `matched X of Y indicators`, followed by matched labels
    pub reason: String,
    /// Dialect format identifier
    pub format: String,
    /// Labels of the matching indicators, in indicator order
    pub matched: Vec<String>,
}

impl DetectionResult {
    /// A result with a fixed confidence, as produced by simple detectors
    #[must_use]
    pub fn with_confidence(format: impl Into<String>, confidence: u8, min_confidence: u8) -> Self {
        let confidence = confidence.min(MAX_CONFIDENCE);
        Self {
            detected: confidence >= min_confidence,
            confidence,
            reason: format!("fixed confidence {confidence}"),
            format: format.into(),
            matched: Vec::new(),
        }
    }
}

/// Weighted-OR scorer over a dialect's indicators
#[derive(Debug, Clone)]
pub struct Detector {
    format: &'static str,
    indicators: Vec<Indicator>,
    min_confidence: u8,
}

impl Detector {
    /// Create detector from `(pattern, weight, label)` triples
    ///
    /// Malformed patterns are skipped and logged.
    #[must_use]
    pub fn new(format: &'static str, indicators: &[(&str, u8, &'static str)]) -> Self {
        let indicators = indicators
            .iter()
            .filter_map(|&(pattern, weight, label)| {
                let indicator = Indicator::new(pattern, weight, label);
                if indicator.is_none() {
                    debug!(format, label, "skipping malformed indicator pattern");
                }
                indicator
            })
            .collect();
        Self {
            format,
            indicators,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    /// With a different detection threshold
    #[inline]
    #[must_use]
    pub fn with_min_confidence(mut self, min_confidence: u8) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    #[inline]
    #[must_use]
    pub fn indicators(&self) -> &[Indicator] {
        &self.indicators
    }

    /// Score `content`
    #[must_use]
    pub fn detect(&self, content: &str) -> DetectionResult {
        let matched: Vec<&Indicator> = self
            .indicators
            .iter()
            .filter(|i| i.matches(content))
            .collect();

        let score: u32 = matched.iter().map(|i| u32::from(i.weight)).sum();
        let confidence = u8::try_from(score.min(u32::from(MAX_CONFIDENCE))).unwrap_or(MAX_CONFIDENCE);

        let labels: Vec<String> = matched.iter().map(|i| i.label.to_string()).collect();
        let mut reason = format!(
            "matched {} of {} indicators",
            matched.len(),
            self.indicators.len()
        );
        if !labels.is_empty() {
            reason.push_str(": ");
            reason.push_str(&labels.join(", "));
        }

        debug!(format = self.format, confidence, matched = matched.len(), "detection scored");

        DetectionResult {
            detected: confidence >= self.min_confidence,
            confidence,
            reason,
            format: self.format.to_string(),
            matched: labels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn detector() -> Detector {
        Detector::new(
            "demo",
            &[
                (r"(?m)^# Demo", 40, "title"),
                (r"\bDEMO-\d+\b", 30, "ids"),
                (r"(?m)^## Extra", 20, "extra"),
                (r"(?m)^## More", 20, "more"),
            ],
        )
    }

    #[test]
    fn no_match_scores_zero() {
        let result = detector().detect("nothing relevant");
        assert!(!result.detected);
        assert_eq!(result.confidence, 0);
        assert_eq!(result.reason, "matched 0 of 4 indicators");
    }

    #[test]
    fn weights_accumulate() {
        let result = detector().detect("# Demo\n\nDEMO-1");
        assert!(result.detected);
        assert_eq!(result.confidence, 70);
        assert_eq!(result.reason, "matched 2 of 4 indicators: title, ids");
        assert_eq!(result.matched, ["title", "ids"]);
    }

    #[test]
    fn score_is_capped() {
        let result = detector().detect("# Demo\nDEMO-1\n## Extra\n## More\n");
        assert_eq!(result.confidence, MAX_CONFIDENCE);
    }

    #[test]
    fn below_threshold_is_not_detected() {
        let result = detector().detect("DEMO-7 only");
        assert_eq!(result.confidence, 30);
        assert!(!result.detected);
    }

    #[test]
    fn custom_threshold() {
        let result = detector().with_min_confidence(30).detect("DEMO-7 only");
        assert!(result.detected);
    }

    #[test]
    fn malformed_pattern_is_skipped() {
        let detector = Detector::new("bad", &[("(unclosed", 50, "broken"), ("ok", 60, "ok")]);
        assert_eq!(detector.indicators().len(), 1);
        assert_eq!(detector.detect("ok").confidence, 60);
    }

    #[test]
    fn fixed_confidence_result() {
        let result = DetectionResult::with_confidence("mock", 120, 50);
        assert_eq!(result.confidence, 100);
        assert!(result.detected);
    }

    proptest! {
        // Adding text never lowers the score: indicators only ever match more
        #[test]
        fn appending_content_never_lowers_confidence(base in ".{0,40}", extra in ".{0,40}") {
            let d = detector();
            let before = d.detect(&base).confidence;
            let after = d.detect(&format!("{base}\n{extra}")).confidence;
            prop_assert!(after >= before);
        }
    }
}
