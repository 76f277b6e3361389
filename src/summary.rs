//! Client-side statistics over a set of feature values
//!
//! The predicted-label guess is a hint derived from the mean alone, using
//! the bands the deployed model is known to react to. It is independent of
//! the real server-side prediction.

use serde::{Deserialize, Serialize};

/// Client-side guess of the label a value set will receive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictedLabel {
    #[serde(rename = "Likely POSITIVE")]
    LikelyPositive,
    #[serde(rename = "Likely NEGATIVE")]
    LikelyNegative,
    #[serde(rename = "Likely NEUTRAL (zero)")]
    LikelyNeutralZero,
    #[serde(rename = "Likely NEUTRAL (high)")]
    LikelyNeutralHigh,
    Uncertain,
}

impl PredictedLabel {
    /// Guess from the mean of a value set.
    ///
    /// Bands are checked in order; the positive band sits inside the
    /// neutral-zero band and takes precedence.
    pub fn from_mean(mean: f64) -> Self {
        if (-5.0..=-0.1).contains(&mean) {
            PredictedLabel::LikelyPositive
        } else if mean <= -10000.0 {
            PredictedLabel::LikelyNegative
        } else if (-200.0..=200.0).contains(&mean) {
            PredictedLabel::LikelyNeutralZero
        } else if mean >= 5000.0 {
            PredictedLabel::LikelyNeutralHigh
        } else {
            PredictedLabel::Uncertain
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PredictedLabel::LikelyPositive => "Likely POSITIVE",
            PredictedLabel::LikelyNegative => "Likely NEGATIVE",
            PredictedLabel::LikelyNeutralZero => "Likely NEUTRAL (zero)",
            PredictedLabel::LikelyNeutralHigh => "Likely NEUTRAL (high)",
            PredictedLabel::Uncertain => "Uncertain",
        }
    }
}

/// Value band used by the per-value range analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueBand {
    Positive,
    Negative,
    NeutralZero,
    NeutralHigh,
}

/// How many values fall into each band. Bands overlap, so counts need not
/// add up to the total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeAnalysis {
    pub positive_range: usize,
    pub negative_range: usize,
    pub neutral_zero: usize,
    pub neutral_high: usize,
    pub dominant: Option<ValueBand>,
}

impl RangeAnalysis {
    fn from_values(values: &[f64]) -> Self {
        let count = |pred: fn(f64) -> bool| values.iter().filter(|v| pred(**v)).count();

        let positive_range = count(|v| (-5.0..=-0.1).contains(&v));
        let negative_range = count(|v| v <= -10000.0);
        let neutral_zero = count(|v| (-200.0..=200.0).contains(&v));
        let neutral_high = count(|v| v >= 5000.0);

        // ties go to the earlier band
        let dominant = [
            (ValueBand::Positive, positive_range),
            (ValueBand::Negative, negative_range),
            (ValueBand::NeutralZero, neutral_zero),
            (ValueBand::NeutralHigh, neutral_high),
        ]
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .fold(None::<(ValueBand, usize)>, |best, (band, n)| match best {
            Some((_, m)) if m >= n => best,
            _ => Some((band, n)),
        })
        .map(|(band, _)| band);

        Self {
            positive_range,
            negative_range,
            neutral_zero,
            neutral_high,
            dominant,
        }
    }
}

/// Statistics of a value snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub positive_count: usize,
    pub negative_count: usize,
    pub zero_count: usize,
    pub predicted_label_guess: PredictedLabel,
    pub ranges: RangeAnalysis,
}

/// Summarize a set of values. An empty set yields zeros and `Uncertain`.
pub fn compute_summary(values: &[f64]) -> ValueSummary {
    let ranges = RangeAnalysis::from_values(values);

    if values.is_empty() {
        return ValueSummary {
            count: 0,
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            median: 0.0,
            positive_count: 0,
            negative_count: 0,
            zero_count: 0,
            predicted_label_guess: PredictedLabel::Uncertain,
            ranges,
        };
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / values.len() as f64;

    ValueSummary {
        count: values.len(),
        min,
        max,
        mean,
        median: median(values),
        positive_count: values.iter().filter(|v| **v > 0.0).count(),
        negative_count: values.iter().filter(|v| **v < 0.0).count(),
        zero_count: values.iter().filter(|v| **v == 0.0).count(),
        predicted_label_guess: PredictedLabel::from_mean(mean),
        ranges,
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_uniform_small_negative_reads_positive() {
        let summary = compute_summary(&[-1.0, -1.0, -1.0]);

        assert_eq!(summary.count, 3);
        assert_eq!(summary.min, -1.0);
        assert_eq!(summary.max, -1.0);
        assert_eq!(summary.mean, -1.0);
        assert_eq!(summary.negative_count, 3);
        assert_eq!(summary.predicted_label_guess, PredictedLabel::LikelyPositive);
        assert_eq!(summary.predicted_label_guess.as_str(), "Likely POSITIVE");
    }

    #[test]
    fn test_guess_bands() {
        assert_eq!(PredictedLabel::from_mean(-5.0), PredictedLabel::LikelyPositive);
        assert_eq!(PredictedLabel::from_mean(-0.1), PredictedLabel::LikelyPositive);
        assert_eq!(PredictedLabel::from_mean(-0.05), PredictedLabel::LikelyNeutralZero);
        assert_eq!(PredictedLabel::from_mean(-10000.0), PredictedLabel::LikelyNegative);
        assert_eq!(PredictedLabel::from_mean(150.0), PredictedLabel::LikelyNeutralZero);
        assert_eq!(PredictedLabel::from_mean(5000.0), PredictedLabel::LikelyNeutralHigh);
        assert_eq!(PredictedLabel::from_mean(1000.0), PredictedLabel::Uncertain);
        assert_eq!(PredictedLabel::from_mean(-5000.0), PredictedLabel::Uncertain);
    }

    #[test]
    fn test_sign_counts_and_median() {
        let summary = compute_summary(&[3.0, -2.0, 0.0, 0.0, 7.0, -1.0]);

        assert_eq!(summary.positive_count, 2);
        assert_eq!(summary.negative_count, 2);
        assert_eq!(summary.zero_count, 2);
        assert_eq!(summary.median, 0.0);
        assert_eq!(summary.min, -2.0);
        assert_eq!(summary.max, 7.0);
    }

    #[test]
    fn test_odd_median() {
        let summary = compute_summary(&[9.0, 1.0, 5.0]);
        assert_eq!(summary.median, 5.0);
    }

    #[test]
    fn test_empty_summary_is_uncertain() {
        let summary = compute_summary(&[]);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.mean, 0.0);
        assert_eq!(summary.predicted_label_guess, PredictedLabel::Uncertain);
        assert_eq!(summary.ranges.dominant, None);
    }

    #[test]
    fn test_range_analysis_dominant_band() {
        let values = [-50000.0, -40000.0, -1.0, 25000.0];
        let summary = compute_summary(&values);

        assert_eq!(
            summary.ranges,
            RangeAnalysis {
                positive_range: 1,
                negative_range: 2,
                neutral_zero: 1,
                neutral_high: 1,
                dominant: Some(ValueBand::Negative),
            }
        );
    }

    #[test]
    fn test_range_analysis_tie_prefers_earlier_band() {
        // -1 counts towards both positive and neutral-zero
        let summary = compute_summary(&[-1.0]);
        assert_eq!(summary.ranges.dominant, Some(ValueBand::Positive));
    }

    #[test]
    fn test_guess_serializes_as_display_string() {
        let json = serde_json::to_string(&PredictedLabel::LikelyNeutralHigh).unwrap();
        assert_eq!(json, "\"Likely NEUTRAL (high)\"");
    }
}
