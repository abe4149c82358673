//! The confidence scorer.

use crate::config::{OrgClass, ScoringConfig};
use fundscout_protocol::{Score, ScoreBreakdown, ScoreError, ScoreWeights, SubScores};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::trace;
use url::Url;

#[derive(Debug, Error)]
pub enum ScoringError {
    /// Missing URL or unusable metadata; the single result is dropped.
    #[error("unusable result metadata: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Score(#[from] ScoreError),
}

pub struct ConfidenceScorer {
    weights: ScoreWeights,
    config: ScoringConfig,
}

impl ConfidenceScorer {
    /// Fails unless the weight vector sums to exactly 1.00.
    pub fn new(weights: ScoreWeights, config: ScoringConfig) -> Result<Self, ScoreError> {
        let verified = ScoreWeights::new(
            weights.funding_keywords,
            weights.domain_credibility,
            weights.geographic_relevance,
            weights.organization_type,
        )?;
        Ok(Self {
            weights: verified,
            config,
        })
    }

    pub fn standard(config: ScoringConfig) -> Result<Self, ScoreError> {
        Self::new(ScoreWeights::standard(), config)
    }

    /// Score one result from its metadata alone.
    ///
    /// Deterministic: same `(url, title, description)` always produces the
    /// same breakdown, byte for byte.
    pub fn score(
        &self,
        url: &str,
        title: &str,
        description: &str,
    ) -> Result<ScoreBreakdown, ScoringError> {
        let host = extract_host(url)?;
        let text = format!("{} {}", title, description).to_lowercase();

        let subs = SubScores {
            funding_keywords: self.funding_keywords(&text)?,
            domain_credibility: self.domain_credibility(&host)?,
            geographic_relevance: self.geographic_relevance(&text)?,
            organization_type: self.organization_type(&text, &host)?,
        };
        let aggregate = Score::weighted_aggregate(&self.weights, &subs);
        trace!(
            host = %host,
            aggregate = %aggregate,
            "scored result"
        );
        Ok(ScoreBreakdown { subs, aggregate })
    }

    /// Sum of the weights of every keyword present, capped at 1.00.
    fn funding_keywords(&self, text: &str) -> Result<Score, ScoringError> {
        let mut total = Decimal::ZERO;
        for kw in &self.config.funding_keywords {
            if text.contains(kw.term.as_str()) {
                total += kw.weight;
            }
        }
        Ok(Score::new(total.min(Decimal::ONE))?)
    }

    /// Spam markers beat authority labels beat suffix tiers.
    fn domain_credibility(&self, host: &str) -> Result<Score, ScoringError> {
        let table = &self.config.credibility;
        if table.spam_markers.iter().any(|m| host.contains(m.as_str())) {
            return Ok(Score::new(table.spam_score)?);
        }
        if host_label_match(host, &table.authority_labels) {
            return Ok(Score::new(table.authority_score)?);
        }
        for tier in &table.suffix_tiers {
            if host.ends_with(tier.suffix.as_str()) {
                return Ok(Score::new(tier.score)?);
            }
        }
        Ok(Score::new(table.fallback)?)
    }

    /// Any configured region term is a full match; broader geography terms
    /// earn partial credit.
    fn geographic_relevance(&self, text: &str) -> Result<Score, ScoringError> {
        let table = &self.config.geography;
        let region_hit = table
            .region_terms
            .values()
            .flatten()
            .any(|term| text.contains(term.as_str()));
        if region_hit {
            return Ok(Score::new(table.match_score)?);
        }
        if table.continent_terms.iter().any(|t| text.contains(t.as_str())) {
            return Ok(Score::new(table.continent_score)?);
        }
        Ok(Score::new(table.fallback)?)
    }

    /// First matching class in table order wins.
    fn organization_type(&self, text: &str, host: &str) -> Result<Score, ScoringError> {
        let table = &self.config.organization;
        for class in &table.classes {
            if class_matches(class, text, host) {
                return Ok(Score::new(class.score)?);
            }
        }
        Ok(Score::new(table.fallback)?)
    }
}

fn class_matches(class: &OrgClass, text: &str, host: &str) -> bool {
    class.terms.iter().any(|t| text.contains(t.as_str()))
        || host_label_match(host, &class.host_labels)
}

fn host_label_match(host: &str, labels: &[String]) -> bool {
    host.split('.').any(|label| labels.iter().any(|l| l == label))
}

fn extract_host(url: &str) -> Result<String, ScoringError> {
    if url.trim().is_empty() {
        return Err(ScoringError::InvalidInput("empty url".into()));
    }
    let parsed =
        Url::parse(url).map_err(|e| ScoringError::InvalidInput(format!("url '{}': {}", url, e)))?;
    parsed
        .host_str()
        .map(|h| h.to_lowercase())
        .ok_or_else(|| ScoringError::InvalidInput(format!("url '{}' has no host", url)))
}
