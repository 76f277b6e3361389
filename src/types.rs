//! Core types for Brainform
//!
//! This module defines the data that flows between the pattern generator,
//! the form session and its collaborators: emotion labels, numeric ranges,
//! notification severities and the payloads exchanged with the server.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FormError;

/// Test-pattern category used to synthesize a batch of feature values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmotionLabel {
    Positive,
    Negative,
    /// Half zero-range, half high-range values
    Neutral,
    NeutralZero,
    NeutralHigh,
    Random,
    SmartRandom,
    ExtremePositive,
    ExtremeNegative,
    ExtremeNeutralZero,
}

impl EmotionLabel {
    pub const ALL: [EmotionLabel; 10] = [
        EmotionLabel::Positive,
        EmotionLabel::Negative,
        EmotionLabel::Neutral,
        EmotionLabel::NeutralZero,
        EmotionLabel::NeutralHigh,
        EmotionLabel::Random,
        EmotionLabel::SmartRandom,
        EmotionLabel::ExtremePositive,
        EmotionLabel::ExtremeNegative,
        EmotionLabel::ExtremeNeutralZero,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Positive => "positive",
            EmotionLabel::Negative => "negative",
            EmotionLabel::Neutral => "neutral",
            EmotionLabel::NeutralZero => "neutral-zero",
            EmotionLabel::NeutralHigh => "neutral-high",
            EmotionLabel::Random => "random",
            EmotionLabel::SmartRandom => "smart-random",
            EmotionLabel::ExtremePositive => "extreme-positive",
            EmotionLabel::ExtremeNegative => "extreme-negative",
            EmotionLabel::ExtremeNeutralZero => "extreme-neutral-zero",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionLabel {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        EmotionLabel::ALL
            .into_iter()
            .find(|label| label.as_str() == normalized)
            .ok_or_else(|| FormError::Config(format!("unknown emotion label '{}'", s.trim())))
    }
}

/// A numeric interval used to synthesize a plausible value, with an optional
/// jitter amplitude added after the base draw.
///
/// `min <= max` always holds; construction and deserialization reject
/// anything else.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRangeSpec")]
pub struct RangeSpec {
    min: f64,
    max: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    jitter: Option<f64>,
}

#[derive(Deserialize)]
struct RawRangeSpec {
    min: f64,
    max: f64,
    #[serde(default)]
    jitter: Option<f64>,
}

impl TryFrom<RawRangeSpec> for RangeSpec {
    type Error = FormError;

    fn try_from(raw: RawRangeSpec) -> Result<Self, Self::Error> {
        match raw.jitter {
            Some(j) => RangeSpec::with_jitter(raw.min, raw.max, j),
            None => RangeSpec::new(raw.min, raw.max),
        }
    }
}

impl RangeSpec {
    pub fn new(min: f64, max: f64) -> Result<Self, FormError> {
        if !(min.is_finite() && max.is_finite()) || min > max {
            return Err(FormError::InvalidRange { min, max });
        }
        Ok(Self {
            min,
            max,
            jitter: None,
        })
    }

    pub fn with_jitter(min: f64, max: f64, jitter: f64) -> Result<Self, FormError> {
        if !jitter.is_finite() || jitter < 0.0 {
            return Err(FormError::Config(format!(
                "jitter amplitude must be a non-negative number, got {}",
                jitter
            )));
        }
        let mut spec = Self::new(min, max)?;
        spec.jitter = Some(jitter);
        Ok(spec)
    }

    /// Used by the built-in tables, whose bounds are known to be ordered.
    pub(crate) const fn fixed(min: f64, max: f64, jitter: Option<f64>) -> Self {
        Self { min, max, jitter }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn jitter(&self) -> Option<f64> {
        self.jitter
    }

    /// Closed band every generated value lands in, jitter extremes included.
    pub fn envelope(&self) -> (f64, f64) {
        let half = self.jitter.unwrap_or(0.0) / 2.0;
        (self.min - half, self.max + half)
    }
}

/// Severity of a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// Submission lifecycle of a form session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Validating,
    Submitting,
    AwaitingResult,
}

/// One (name, value) pair of a submitted snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureValue {
    pub name: String,
    pub value: f64,
}

/// Result of a single-record prediction, as reported by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionSummary {
    /// Emotion name (NEGATIVE, NEUTRAL, POSITIVE or UNKNOWN_<id>)
    pub emotion: String,
    /// Confidence of the winning class, in percent
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Class probabilities in model class order
    #[serde(default)]
    pub probabilities: Vec<f64>,
}

impl SubmissionSummary {
    /// Build a summary from the model's raw class id and probabilities.
    pub fn from_class(class_id: i64, probabilities: Vec<f64>) -> Self {
        let confidence = probabilities
            .iter()
            .copied()
            .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |a| a.max(p))))
            .map(|p| (p * 1000.0).round() / 10.0);

        Self {
            emotion: emotion_for_class(class_id),
            confidence,
            probabilities,
        }
    }

    /// Human-readable one-line description of the result
    pub fn headline(&self) -> String {
        match self.confidence {
            Some(c) => format!("Emotion: {} ({:.1}% confidence)", self.emotion, c),
            None => format!("Emotion: {}", self.emotion),
        }
    }
}

/// Map a raw model class id to its emotion name.
pub fn emotion_for_class(class_id: i64) -> String {
    match class_id {
        0 => "NEGATIVE".to_string(),
        1 => "NEUTRAL".to_string(),
        2 => "POSITIVE".to_string(),
        other => format!("UNKNOWN_{}", other),
    }
}

/// Server report for a CSV batch upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    #[serde(alias = "total_rows_processed", alias = "total")]
    pub total_rows: usize,
    #[serde(default)]
    pub success_count: usize,
    #[serde(default)]
    pub error_count: usize,
    #[serde(default, alias = "download_link")]
    pub download_url: Option<String>,
}

impl BatchSummary {
    pub fn headline(&self) -> String {
        format!(
            "Processed {} rows ({} ok, {} failed)",
            self.total_rows, self.success_count, self.error_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parse() {
        assert_eq!("positive".parse::<EmotionLabel>().unwrap(), EmotionLabel::Positive);
        assert_eq!(
            "Smart_Random".parse::<EmotionLabel>().unwrap(),
            EmotionLabel::SmartRandom
        );
        assert_eq!(
            " extreme-neutral-zero ".parse::<EmotionLabel>().unwrap(),
            EmotionLabel::ExtremeNeutralZero
        );
        assert!("joyful".parse::<EmotionLabel>().is_err());
    }

    #[test]
    fn test_label_serde_matches_as_str() {
        for label in EmotionLabel::ALL {
            let json = serde_json::to_string(&label).unwrap();
            assert_eq!(json, format!("\"{}\"", label.as_str()));
        }
    }

    #[test]
    fn test_range_spec_rejects_inverted_bounds() {
        assert!(matches!(
            RangeSpec::new(1.0, -1.0),
            Err(FormError::InvalidRange { .. })
        ));
        assert!(RangeSpec::new(-1.0, -1.0).is_ok());
        assert!(RangeSpec::with_jitter(0.0, 1.0, -0.5).is_err());
    }

    #[test]
    fn test_range_spec_deserialize_validates() {
        let ok: RangeSpec = serde_json::from_str(r#"{"min": -3, "max": -0.5, "jitter": 0.2}"#).unwrap();
        assert_eq!(ok.jitter(), Some(0.2));
        let (lo, hi) = ok.envelope();
        assert!((lo - -3.1).abs() < 1e-12);
        assert!((hi - -0.4).abs() < 1e-12);

        let bad = serde_json::from_str::<RangeSpec>(r#"{"min": 5, "max": 1}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_emotion_for_class() {
        assert_eq!(emotion_for_class(0), "NEGATIVE");
        assert_eq!(emotion_for_class(1), "NEUTRAL");
        assert_eq!(emotion_for_class(2), "POSITIVE");
        assert_eq!(emotion_for_class(7), "UNKNOWN_7");
    }

    #[test]
    fn test_summary_from_class() {
        let summary = SubmissionSummary::from_class(2, vec![0.1, 0.024, 0.876]);
        assert_eq!(summary.emotion, "POSITIVE");
        assert_eq!(summary.confidence, Some(87.6));
        assert_eq!(summary.headline(), "Emotion: POSITIVE (87.6% confidence)");
    }

    #[test]
    fn test_batch_summary_aliases() {
        let json = r#"{"total_rows_processed": 10, "success_count": 9, "error_count": 1, "download_link": "/download/out.csv"}"#;
        let summary: BatchSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.total_rows, 10);
        assert_eq!(summary.download_url.as_deref(), Some("/download/out.csv"));
        assert_eq!(summary.headline(), "Processed 10 rows (9 ok, 1 failed)");
    }
}
