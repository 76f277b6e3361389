//! Feature schemas
//!
//! A schema is the fixed, ordered list of feature identifiers the form
//! holds and the server expects. Two addressing schemes exist: positional
//! (`f0`..`f44`, the field names the prediction endpoint reads) and named
//! (45 EEG statistics keyed by stable names). Exactly one is active per
//! deployment.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of features the prediction model expects
pub const FEATURE_COUNT: usize = 45;

/// Addressing scheme of a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    Positional,
    Named,
}

/// Identity of one feature slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureKey {
    Index(usize),
    Name(String),
}

impl FeatureKey {
    /// Field name used on the wire
    pub fn wire_name(&self) -> String {
        match self {
            FeatureKey::Index(i) => format!("f{}", i),
            FeatureKey::Name(name) => name.clone(),
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire_name())
    }
}

/// Ordered list of feature identifiers
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    kind: SchemaKind,
    keys: Vec<FeatureKey>,
}

impl FeatureSchema {
    /// The 45 positional features of the prediction form
    pub fn positional() -> Self {
        Self::positional_with(FEATURE_COUNT)
    }

    pub fn positional_with(count: usize) -> Self {
        Self {
            kind: SchemaKind::Positional,
            keys: (0..count).map(FeatureKey::Index).collect(),
        }
    }

    /// The 45 named EEG features
    pub fn named() -> Self {
        Self::with_names(NAMED_FEATURES.iter().copied())
    }

    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: SchemaKind::Named,
            keys: names
                .into_iter()
                .map(|n| FeatureKey::Name(n.into()))
                .collect(),
        }
    }

    pub fn for_kind(kind: SchemaKind) -> Self {
        match kind {
            SchemaKind::Positional => Self::positional(),
            SchemaKind::Named => Self::named(),
        }
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    pub fn keys(&self) -> &[FeatureKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Resolve a user-supplied slot reference to its position.
    ///
    /// Accepts a wire name (`f3`, `mean_0_a`) or a bare zero-based index.
    pub fn position(&self, reference: &str) -> Option<usize> {
        let reference = reference.trim();
        if let Some(pos) = self.keys.iter().position(|k| k.wire_name() == reference) {
            return Some(pos);
        }
        reference
            .parse::<usize>()
            .ok()
            .filter(|&i| i < self.keys.len())
    }

    /// Human-readable description of a feature, if one is known.
    pub fn description(&self, position: usize) -> Option<&'static str> {
        match self.keys.get(position)? {
            FeatureKey::Index(i) => POSITIONAL_DESCRIPTIONS.get(*i).copied(),
            FeatureKey::Name(name) => NAMED_FAMILIES
                .iter()
                .filter(|(prefix, _)| name.starts_with(prefix))
                .max_by_key(|(prefix, _)| prefix.len())
                .map(|(_, desc)| *desc),
        }
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::positional()
    }
}

const POSITIONAL_DESCRIPTIONS: [&str; FEATURE_COUNT] = [
    "EEG F3 - Left frontal electrode (emotional valence)",
    "EEG F4 - Right frontal electrode (emotional valence)",
    "EEG C3 - Left central electrode (motor activity)",
    "EEG C4 - Right central electrode (motor activity)",
    "EEG P3 - Left parietal electrode (attention)",
    "EEG P4 - Right parietal electrode (attention)",
    "EEG O1 - Left occipital electrode (visual processing)",
    "EEG O2 - Right occipital electrode (visual processing)",
    "EEG F7 - Left temporal electrode (language)",
    "EEG F8 - Right temporal electrode (language)",
    "EEG T3 - Left temporal electrode (emotion processing)",
    "EEG T4 - Right temporal electrode (emotion processing)",
    "EEG T5 - Left posterior temporal electrode",
    "EEG T6 - Right posterior temporal electrode",
    "Alpha power (8-12 Hz) - Relaxation state",
    "Beta power (12-30 Hz) - Active thinking",
    "Gamma power (30-100 Hz) - High-level cognition",
    "Theta power (4-8 Hz) - Deep relaxation/meditation",
    "Delta power (0.5-4 Hz) - Deep sleep",
    "Alpha/Beta ratio - Relaxation vs alertness",
    "Theta/Beta ratio - Meditation vs focus",
    "Frontal asymmetry (F4-F3) - Emotional valence",
    "Parietal asymmetry (P4-P3) - Spatial attention",
    "Temporal asymmetry (T4-T3) - Language processing",
    "F3 mean amplitude - Left frontal activity",
    "F4 mean amplitude - Right frontal activity",
    "C3 variance - Left central variability",
    "C4 variance - Right central variability",
    "P3 standard deviation - Left parietal consistency",
    "P4 standard deviation - Right parietal consistency",
    "Frontal coherence - F3-F4 synchronization",
    "Central coherence - C3-C4 synchronization",
    "Parietal coherence - P3-P4 synchronization",
    "Cross-hemispheric coherence - Overall sync",
    "Frontal-central coherence - FC connectivity",
    "Central-parietal coherence - CP connectivity",
    "Alpha peak frequency - Individual alpha freq",
    "Beta peak frequency - Individual beta freq",
    "Power spectral density - Overall brain activity",
    "Spectral entropy - Complexity measure",
    "Hjorth mobility - Signal mobility parameter",
    "Hjorth complexity - Signal complexity parameter",
    "Zero crossing rate - Signal regularity",
    "Approximate entropy - Signal predictability",
    "Sample entropy - Signal complexity measure",
];

// one row per family
#[rustfmt::skip]
const NAMED_FEATURES: [&str; FEATURE_COUNT] = [
    "mean_0_a", "mean_1_a", "mean_2_a",
    "mean_d_0_a", "mean_d_1_a", "mean_d_2_a",
    "stddev_0_a", "stddev_1_a", "stddev_2_a",
    "stddev_d_0_a", "stddev_d_1_a", "stddev_d_2_a",
    "moments_0_a", "moments_1_a", "moments_2_a",
    "max_0_a", "max_1_a", "max_2_a",
    "min_0_a", "min_1_a", "min_2_a",
    "max_q_0_a", "max_q_1_a", "max_q_2_a",
    "min_q_0_a", "min_q_1_a", "min_q_2_a",
    "covmat_0_a", "covmat_1_a", "covmat_2_a",
    "eigen_0_a", "eigen_1_a", "eigen_2_a",
    "logm_0_a", "logm_1_a", "logm_2_a",
    "entropy0_a", "entropy1_a", "entropy2_a",
    "correlate_0_a", "correlate_1_a", "correlate_2_a",
    "fft_0_a", "fft_1_a", "fft_2_a",
];

const NAMED_FAMILIES: [(&str, &str); 15] = [
    ("mean_", "Mean amplitude over the window"),
    ("mean_d_", "Change in mean amplitude between window halves"),
    ("stddev_", "Standard deviation of the signal"),
    ("stddev_d_", "Change in standard deviation between window halves"),
    ("moments_", "Statistical moments (skewness, kurtosis)"),
    ("max_", "Maximum amplitude"),
    ("min_", "Minimum amplitude"),
    ("max_q_", "Maximum over quarter windows"),
    ("min_q_", "Minimum over quarter windows"),
    ("covmat_", "Channel covariance matrix entry"),
    ("eigen_", "Eigenvalue of the covariance matrix"),
    ("logm_", "Matrix logarithm of the covariance matrix"),
    ("entropy", "Shannon entropy of the signal"),
    ("correlate_", "Cross-channel correlation"),
    ("fft_", "FFT magnitude bin"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schemas_have_45_features() {
        assert_eq!(FeatureSchema::positional().len(), FEATURE_COUNT);
        assert_eq!(FeatureSchema::named().len(), FEATURE_COUNT);
    }

    #[test]
    fn test_named_features_are_unique() {
        let mut names: Vec<&str> = NAMED_FEATURES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_position_lookup() {
        let positional = FeatureSchema::positional();
        assert_eq!(positional.position("f0"), Some(0));
        assert_eq!(positional.position("44"), Some(44));
        assert_eq!(positional.position("45"), None);
        assert_eq!(positional.position("f45"), None);

        let named = FeatureSchema::named();
        assert_eq!(named.position("mean_d_1_a"), Some(4));
        assert_eq!(named.position("fft_2_a"), Some(44));
        assert_eq!(named.position("alpha"), None);
    }

    #[test]
    fn test_wire_names() {
        let positional = FeatureSchema::positional();
        assert_eq!(positional.keys()[12].wire_name(), "f12");

        let named = FeatureSchema::with_names(["mean_a", "min_q_b"]);
        assert_eq!(named.keys()[1].wire_name(), "min_q_b");
        assert_eq!(named.kind(), SchemaKind::Named);
    }

    #[test]
    fn test_descriptions_prefer_longest_family() {
        let named = FeatureSchema::named();
        let pos = named.position("mean_d_0_a").unwrap();
        assert_eq!(
            named.description(pos),
            Some("Change in mean amplitude between window halves")
        );

        let positional = FeatureSchema::positional();
        assert_eq!(
            positional.description(14),
            Some("Alpha power (8-12 Hz) - Relaxation state")
        );
    }
}
