//! Fixed-point confidence scores.
//!
//! Every confidence and quality value in the system is a decimal with
//! exactly two fractional digits in [0.00, 1.00]. Thresholding never touches
//! binary floats; comparisons are decimal-compare and the admission
//! threshold is the exact value 0.60.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Scale every score is held at.
const SCALE: u32 = 2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScoreError {
    #[error("score out of range [0.00, 1.00]: {0}")]
    OutOfRange(Decimal),
    #[error("invalid decimal: '{0}'")]
    Parse(String),
    #[error("score weights must sum to exactly 1.00, got {0}")]
    BadWeights(Decimal),
}

/// A confidence score: two fractional digits, 0.00 ..= 1.00.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Score(Decimal);

impl Score {
    /// Build a score, rounding half-up to two fractional digits.
    pub fn new(value: Decimal) -> Result<Self, ScoreError> {
        let mut rounded = value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero);
        if rounded < Decimal::ZERO || rounded > Decimal::ONE {
            return Err(ScoreError::OutOfRange(value));
        }
        rounded.rescale(SCALE);
        Ok(Self(rounded))
    }

    pub fn zero() -> Self {
        let mut z = Decimal::ZERO;
        z.rescale(SCALE);
        Self(z)
    }

    pub fn one() -> Self {
        let mut o = Decimal::ONE;
        o.rescale(SCALE);
        Self(o)
    }

    /// The admission threshold: exactly 0.60.
    pub fn threshold() -> Self {
        Self(Decimal::new(60, SCALE))
    }

    /// Decimal-compare admission check: pass when `self >= 0.60`.
    pub fn passes_threshold(&self) -> bool {
        self.0 >= Self::threshold().0
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Weighted aggregate of the four sub-scores, rounded half-up at two
    /// fractional digits.
    pub fn weighted_aggregate(weights: &ScoreWeights, subs: &SubScores) -> Score {
        let sum = weights.funding_keywords * subs.funding_keywords.0
            + weights.domain_credibility * subs.domain_credibility.0
            + weights.geographic_relevance * subs.geographic_relevance.0
            + weights.organization_type * subs.organization_type.0;
        let mut rounded =
            sum.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(SCALE);
        // Weights sum to 1.00 and every sub-score is <= 1.00, so the sum is in range.
        Score(rounded)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Score {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|_| ScoreError::Parse(s.to_string()))?;
        Score::new(value)
    }
}

impl TryFrom<Decimal> for Score {
    type Error = ScoreError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Score::new(value)
    }
}

impl From<Score> for Decimal {
    fn from(value: Score) -> Self {
        value.0
    }
}

/// The four weighted inputs to an aggregate score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubScores {
    pub funding_keywords: Score,
    pub domain_credibility: Score,
    pub geographic_relevance: Score,
    pub organization_type: Score,
}

/// Weight vector for the four sub-scores. Must sum to exactly 1.00.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreWeights {
    pub funding_keywords: Decimal,
    pub domain_credibility: Decimal,
    pub geographic_relevance: Decimal,
    pub organization_type: Decimal,
}

impl ScoreWeights {
    pub fn new(
        funding_keywords: Decimal,
        domain_credibility: Decimal,
        geographic_relevance: Decimal,
        organization_type: Decimal,
    ) -> Result<Self, ScoreError> {
        let sum = funding_keywords + domain_credibility + geographic_relevance + organization_type;
        if sum != Decimal::ONE {
            return Err(ScoreError::BadWeights(sum));
        }
        Ok(Self {
            funding_keywords,
            domain_credibility,
            geographic_relevance,
            organization_type,
        })
    }

    /// The production weight vector: 0.30 / 0.25 / 0.25 / 0.20.
    pub fn standard() -> Self {
        Self {
            funding_keywords: Decimal::new(30, 2),
            domain_credibility: Decimal::new(25, 2),
            geographic_relevance: Decimal::new(25, 2),
            organization_type: Decimal::new(20, 2),
        }
    }
}

/// The full output of scoring one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub subs: SubScores,
    pub aggregate: Score,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Score {
        text.parse().unwrap()
    }

    #[test]
    fn rounds_half_up_to_two_digits() {
        assert_eq!(Score::new(Decimal::new(605, 3)).unwrap(), s("0.61"));
        assert_eq!(Score::new(Decimal::new(604, 3)).unwrap(), s("0.60"));
        assert_eq!(Score::new(Decimal::new(595, 3)).unwrap(), s("0.60"));
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(Score::new(Decimal::new(101, 2)).is_err());
        assert!(Score::new(Decimal::new(-1, 2)).is_err());
        assert!(Score::new(Decimal::ONE).is_ok());
        assert!(Score::new(Decimal::ZERO).is_ok());
    }

    #[test]
    fn threshold_is_inclusive() {
        assert!(s("0.60").passes_threshold());
        assert!(s("0.61").passes_threshold());
        assert!(!s("0.59").passes_threshold());
    }

    #[test]
    fn standard_weights_sum_to_one() {
        let w = ScoreWeights::standard();
        let rebuilt = ScoreWeights::new(
            w.funding_keywords,
            w.domain_credibility,
            w.geographic_relevance,
            w.organization_type,
        );
        assert!(rebuilt.is_ok());
    }

    #[test]
    fn bad_weights_rejected() {
        let err = ScoreWeights::new(
            Decimal::new(30, 2),
            Decimal::new(25, 2),
            Decimal::new(25, 2),
            Decimal::new(21, 2),
        );
        assert!(matches!(err, Err(ScoreError::BadWeights(_))));
    }

    #[test]
    fn aggregate_matches_hand_computation() {
        let subs = SubScores {
            funding_keywords: s("1.00"),
            domain_credibility: s("0.40"),
            geographic_relevance: s("0.20"),
            organization_type: s("0.75"),
        };
        // 0.30*1.00 + 0.25*0.40 + 0.25*0.20 + 0.20*0.75 = 0.60
        let agg = Score::weighted_aggregate(&ScoreWeights::standard(), &subs);
        assert_eq!(agg, s("0.60"));
        assert!(agg.passes_threshold());
    }

    #[test]
    fn serializes_as_exact_decimal() {
        let json = serde_json::to_string(&s("0.60")).unwrap();
        assert_eq!(json, "\"0.60\"");
        let back: Score = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s("0.60"));
    }
}
