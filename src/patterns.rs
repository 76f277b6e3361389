//! Synthetic test-pattern generation
//!
//! Maps (feature identifier, emotion label) to a plausible feature value,
//! using a table of numeric ranges per label and, for named schemas, per
//! feature-name prefix. The random source is injectable so tests can drive
//! the generator with a fixed sequence.
//!
//! The built-in tables encode the value ranges the deployed model reacts to,
//! including its inverted polarity (small negative values read as positive).
//! They are configuration data and are kept as observed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::FormError;
use crate::schema::{FeatureKey, SchemaKind};
use crate::types::{EmotionLabel, RangeSpec};

/// Source of uniform random numbers in `[0, 1)`
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

/// Adapter for any `rand` generator
pub struct RngSource<R>(pub R);

impl RngSource<StdRng> {
    pub fn from_entropy() -> Self {
        Self(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn next_unit(&mut self) -> f64 {
        self.0.gen::<f64>()
    }
}

/// Adapter for a plain closure
pub struct FnSource<F>(pub F);

impl<F: FnMut() -> f64> RandomSource for FnSource<F> {
    fn next_unit(&mut self) -> f64 {
        (self.0)()
    }
}

/// Replays a fixed list of values, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct FixedSequence {
    values: Vec<f64>,
    pos: usize,
}

impl FixedSequence {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, pos: 0 }
    }

    /// A source that returns `value` on every call.
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }
}

impl RandomSource for FixedSequence {
    fn next_unit(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let v = self.values[self.pos % self.values.len()];
        self.pos += 1;
        v
    }
}

/// One of the four base ranges each table row defines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeKind {
    Positive,
    Negative,
    NeutralZero,
    NeutralHigh,
}

/// Cumulative cut points of the `Random` label: 40% negative, 30% positive,
/// 20% neutral-zero, 10% neutral-high.
pub const RANDOM_BUCKETS: [(f64, RangeKind); 4] = [
    (0.4, RangeKind::Negative),
    (0.7, RangeKind::Positive),
    (0.9, RangeKind::NeutralZero),
    (1.0, RangeKind::NeutralHigh),
];

/// Ranges for the four base classes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRanges {
    pub positive: RangeSpec,
    pub negative: RangeSpec,
    pub neutral_zero: RangeSpec,
    pub neutral_high: RangeSpec,
}

impl LabelRanges {
    pub fn get(&self, kind: RangeKind) -> &RangeSpec {
        match kind {
            RangeKind::Positive => &self.positive,
            RangeKind::Negative => &self.negative,
            RangeKind::NeutralZero => &self.neutral_zero,
            RangeKind::NeutralHigh => &self.neutral_high,
        }
    }
}

/// Fixed representative values, one per class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchors {
    pub positive: f64,
    pub negative: f64,
    pub neutral_zero: f64,
    pub neutral_high: f64,
}

impl Default for Anchors {
    fn default() -> Self {
        Self {
            positive: -1.0,
            negative: -50000.0,
            neutral_zero: 0.0,
            neutral_high: 25000.0,
        }
    }
}

impl Anchors {
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.positive,
            self.negative,
            self.neutral_zero,
            self.neutral_high,
        ]
    }
}

/// Row of a pattern table selected by feature-name prefix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixRule {
    pub prefix: String,
    pub ranges: LabelRanges,
}

/// Range table consulted by the generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternTable {
    /// Used by positional slots and by names no rule matches
    pub default: LabelRanges,
    #[serde(default)]
    pub rules: Vec<PrefixRule>,
    #[serde(default)]
    pub anchors: Anchors,
}

impl PatternTable {
    pub fn new(default: LabelRanges) -> Self {
        Self {
            default,
            rules: Vec::new(),
            anchors: Anchors::default(),
        }
    }

    pub fn with_rule(mut self, prefix: impl Into<String>, ranges: LabelRanges) -> Self {
        self.rules.push(PrefixRule {
            prefix: prefix.into(),
            ranges,
        });
        self
    }

    pub fn for_kind(kind: SchemaKind) -> Self {
        match kind {
            SchemaKind::Positional => Self::positional(),
            SchemaKind::Named => Self::named(),
        }
    }

    /// Ranges of the positional 45-feature form
    pub fn positional() -> Self {
        Self::new(LabelRanges {
            positive: RangeSpec::fixed(-3.0, -0.5, Some(0.2)),
            negative: RangeSpec::fixed(-80000.0, -15000.0, Some(5000.0)),
            neutral_zero: RangeSpec::fixed(-100.0, 100.0, None),
            neutral_high: RangeSpec::fixed(10000.0, 80000.0, None),
        })
    }

    /// Ranges of the named EEG feature form, per feature family.
    /// `mean_` is the default row.
    pub fn named() -> Self {
        Self::new(rows(
            (20.0, 35.0, Some(1.0)),
            (-15.0, 5.0, Some(2.0)),
            (-1.0, 1.0, None),
            (40.0, 60.0, None),
        ))
        .with_rule(
            "mean_d_",
            rows(
                (-1.0, 1.0, Some(0.1)),
                (-8.0, -2.0, Some(0.5)),
                (-0.5, 0.5, None),
                (2.0, 8.0, None),
            ),
        )
        .with_rule(
            "stddev_",
            rows(
                (5.0, 15.0, Some(0.5)),
                (20.0, 60.0, Some(2.0)),
                (0.0, 2.0, None),
                (60.0, 120.0, None),
            ),
        )
        .with_rule(
            "stddev_d_",
            rows(
                (-2.0, 2.0, None),
                (-10.0, -3.0, Some(0.5)),
                (-0.5, 0.5, None),
                (3.0, 10.0, None),
            ),
        )
        .with_rule(
            "max_q_",
            rows(
                (20.0, 40.0, Some(1.0)),
                (150.0, 300.0, Some(10.0)),
                (-5.0, 5.0, None),
                (200.0, 400.0, None),
            ),
        )
        .with_rule(
            "min_q_",
            rows(
                (-40.0, -20.0, Some(1.0)),
                (-300.0, -150.0, Some(10.0)),
                (-5.0, 5.0, None),
                (0.0, 50.0, None),
            ),
        )
        .with_rule(
            "covmat_",
            rows(
                (50.0, 500.0, Some(20.0)),
                (2000.0, 20000.0, Some(500.0)),
                (-10.0, 10.0, None),
                (20000.0, 80000.0, None),
            ),
        )
        .with_rule(
            "eigen_",
            rows(
                (0.0, 500.0, None),
                (1000.0, 50000.0, Some(500.0)),
                (-1.0, 1.0, None),
                (50000.0, 150000.0, None),
            ),
        )
        .with_rule(
            "logm_",
            rows(
                (-2.0, 2.0, Some(0.1)),
                (5.0, 10.0, Some(0.5)),
                (-0.5, 0.5, None),
                (10.0, 15.0, None),
            ),
        )
        .with_rule(
            "entropy",
            rows(
                (0.5, 1.5, Some(0.05)),
                (-500.0, -100.0, Some(20.0)),
                (-1.0, 1.0, None),
                (100.0, 1000.0, None),
            ),
        )
        .with_rule(
            "correlate_",
            rows(
                (-0.2, 0.2, None),
                (-1.0, -0.5, None),
                (-0.05, 0.05, None),
                (0.5, 1.0, None),
            ),
        )
        .with_rule(
            "fft_",
            rows(
                (-100.0, 100.0, Some(5.0)),
                (-600.0, -200.0, Some(20.0)),
                (-10.0, 10.0, None),
                (200.0, 600.0, None),
            ),
        )
    }

    /// Row for a feature: positional slots always use the default row;
    /// named slots use the longest matching prefix, falling back to the
    /// default row.
    pub fn resolve(&self, key: &FeatureKey) -> &LabelRanges {
        match key {
            FeatureKey::Index(_) => &self.default,
            FeatureKey::Name(name) => self
                .rules
                .iter()
                .filter(|rule| name.starts_with(rule.prefix.as_str()))
                .fold(None::<&PrefixRule>, |best, rule| match best {
                    Some(b) if b.prefix.len() >= rule.prefix.len() => Some(b),
                    _ => Some(rule),
                })
                .map_or(&self.default, |rule| &rule.ranges),
        }
    }

    /// Parse a table from JSON. Range invariants are checked while parsing.
    pub fn from_json(json: &str) -> Result<Self, FormError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, FormError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

type Row = (f64, f64, Option<f64>);

fn rows(positive: Row, negative: Row, neutral_zero: Row, neutral_high: Row) -> LabelRanges {
    let spec = |(min, max, jitter): Row| RangeSpec::fixed(min, max, jitter);
    LabelRanges {
        positive: spec(positive),
        negative: spec(negative),
        neutral_zero: spec(neutral_zero),
        neutral_high: spec(neutral_high),
    }
}

/// Maps (feature, label) to a synthetic value
#[derive(Debug, Clone)]
pub struct PatternGenerator {
    table: PatternTable,
}

impl Default for PatternGenerator {
    fn default() -> Self {
        Self::new(PatternTable::positional())
    }
}

impl PatternGenerator {
    pub fn new(table: PatternTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &PatternTable {
        &self.table
    }

    /// Generate one value for `key` under `label`.
    ///
    /// Pure apart from advancing `rng`.
    pub fn generate(
        &self,
        key: &FeatureKey,
        label: EmotionLabel,
        rng: &mut dyn RandomSource,
    ) -> f64 {
        let ranges = self.table.resolve(key);
        let anchors = &self.table.anchors;

        match label {
            EmotionLabel::Positive => draw_jittered(&ranges.positive, rng),
            EmotionLabel::Negative => draw_jittered(&ranges.negative, rng),
            EmotionLabel::NeutralZero => draw_jittered(&ranges.neutral_zero, rng),
            EmotionLabel::NeutralHigh => draw_jittered(&ranges.neutral_high, rng),
            EmotionLabel::Neutral => {
                let kind = if unit(rng) < 0.5 {
                    RangeKind::NeutralZero
                } else {
                    RangeKind::NeutralHigh
                };
                draw(ranges.get(kind), rng)
            }
            EmotionLabel::Random => {
                let kind = random_bucket(unit(rng));
                draw(ranges.get(kind), rng)
            }
            EmotionLabel::SmartRandom => {
                let choices = anchors.as_array();
                let idx = ((unit(rng) * choices.len() as f64) as usize).min(choices.len() - 1);
                choices[idx]
            }
            EmotionLabel::ExtremePositive => anchors.positive,
            EmotionLabel::ExtremeNegative => anchors.negative,
            EmotionLabel::ExtremeNeutralZero => anchors.neutral_zero,
        }
    }
}

/// Bucket of the `Random` label for a uniform draw `r`.
pub fn random_bucket(r: f64) -> RangeKind {
    RANDOM_BUCKETS
        .iter()
        .find(|(cut, _)| r < *cut)
        .map_or(RangeKind::NeutralHigh, |(_, kind)| *kind)
}

fn unit(rng: &mut dyn RandomSource) -> f64 {
    let r = rng.next_unit();
    if r.is_nan() {
        0.0
    } else {
        r.clamp(0.0, 1.0)
    }
}

fn draw(spec: &RangeSpec, rng: &mut dyn RandomSource) -> f64 {
    spec.min() + unit(rng) * (spec.max() - spec.min())
}

fn draw_jittered(spec: &RangeSpec, rng: &mut dyn RandomSource) -> f64 {
    let base = draw(spec, rng);
    match spec.jitter() {
        Some(amplitude) => base + (unit(rng) - 0.5) * amplitude,
        None => base,
    }
}
