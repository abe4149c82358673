//! The domain registry service: owns the domain state machine and the
//! monotonic best-score invariant.
//!
//! Every mutation runs a compare-and-swap loop over the versioned row;
//! losing the race is `registry.contention` and is retried here, never
//! surfaced to the error stream.

use crate::error::RegistryError;
use crate::models::DomainRecord;
use crate::repository::DomainRepository;
use chrono::Utc;
use fundscout_protocol::defaults::{
    CONSECUTIVE_ERRORS_FOR_FAILED, CONSECUTIVE_LOW_FOR_DOWNGRADE, REGISTRY_CAS_MAX_ATTEMPTS,
};
use fundscout_protocol::{DomainStatus, Score};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a judgement applied to a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JudgementUpdate {
    pub status: DomainStatus,
    pub best_score_raised: bool,
}

#[derive(Clone)]
pub struct DomainRegistry {
    domains: Arc<dyn DomainRepository>,
}

impl DomainRegistry {
    pub fn new(domains: Arc<dyn DomainRepository>) -> Self {
        Self { domains }
    }

    pub fn repository(&self) -> Arc<dyn DomainRepository> {
        Arc::clone(&self.domains)
    }

    /// First-sighting registration: create as DISCOVERED or refresh
    /// `last_processed_at`. Returns whether the domain is new.
    pub async fn record_sighting(&self, domain: &str) -> Result<bool, RegistryError> {
        let now = Utc::now();
        if self.domains.insert_discovered(domain, now).await? {
            return Ok(true);
        }
        self.domains.touch_last_processed(domain, now).await?;
        Ok(false)
    }

    /// Apply one scored result to the domain counters and status.
    ///
    /// High (>= threshold): high counter up, consecutive-low reset, status to
    /// PROCESSED_HIGH_QUALITY, best score raised if exceeded. Low: low
    /// counter and consecutive-low up; after enough consecutive lows with no
    /// high hit the domain is downgraded to PROCESSED_LOW_QUALITY.
    pub async fn record_judgement(
        &self,
        domain: &str,
        score: Score,
    ) -> Result<JudgementUpdate, RegistryError> {
        self.with_cas(domain, |record| {
            let current = record.status()?;
            let high = score.passes_threshold();
            let mut raised = false;

            if high {
                record.high_quality_count += 1;
                record.consecutive_low_count = 0;
                if current.can_transition_to(DomainStatus::ProcessedHighQuality) {
                    record.status = DomainStatus::ProcessedHighQuality.as_str().to_string();
                }
                let best = record.best_score()?;
                if score > best {
                    record.best_confidence_score = score.to_string();
                    raised = true;
                }
            } else {
                record.low_quality_count += 1;
                record.consecutive_low_count += 1;
                let downgrade = record.high_quality_count == 0
                    && record.consecutive_low_count >= CONSECUTIVE_LOW_FOR_DOWNGRADE as i64
                    && current.can_transition_to(DomainStatus::ProcessedLowQuality);
                if downgrade {
                    record.status = DomainStatus::ProcessedLowQuality.as_str().to_string();
                }
            }
            record.consecutive_error_count = 0;
            record.last_processed_at = Some(Utc::now());

            Ok(JudgementUpdate {
                status: record
                    .status
                    .parse()
                    .map_err(|_| RegistryError::Corrupt(record.status.clone()))?,
                best_score_raised: raised,
            })
        })
        .await
    }

    /// Count a processing error against the domain. After enough consecutive
    /// errors the status flips to FAILED; the domain stays searchable.
    pub async fn record_failure(&self, domain: &str) -> Result<(), RegistryError> {
        self.with_cas(domain, |record| {
            record.consecutive_error_count += 1;
            if record.consecutive_error_count >= CONSECUTIVE_ERRORS_FOR_FAILED as i64 {
                let current = record.status()?;
                if current.can_transition_to(DomainStatus::Failed) {
                    record.status = DomainStatus::Failed.as_str().to_string();
                }
            }
            Ok(())
        })
        .await
    }

    /// Admin action; terminal unless lifted.
    pub async fn mark_blacklisted(
        &self,
        domain: &str,
        reason: &str,
    ) -> Result<(), RegistryError> {
        // A never-sighted domain can be blacklisted proactively.
        self.domains.insert_discovered(domain, Utc::now()).await?;
        self.with_cas(domain, |record| {
            record.status = DomainStatus::Blacklisted.as_str().to_string();
            record.blacklist_reason = Some(reason.to_string());
            Ok(())
        })
        .await?;
        info!(domain, reason, "domain blacklisted");
        Ok(())
    }

    /// Admin lift: back to DISCOVERED, reason cleared.
    pub async fn lift_blacklist(&self, domain: &str) -> Result<(), RegistryError> {
        self.with_cas(domain, |record| {
            record.status = DomainStatus::Discovered.as_str().to_string();
            record.blacklist_reason = None;
            Ok(())
        })
        .await?;
        info!(domain, "blacklist lifted");
        Ok(())
    }

    pub async fn is_blacklisted(&self, domain: &str) -> Result<bool, RegistryError> {
        match self.domains.lookup(domain).await? {
            Some(record) => Ok(record.status()? == DomainStatus::Blacklisted),
            None => Ok(false),
        }
    }

    async fn with_cas<T>(
        &self,
        domain: &str,
        mut apply: impl FnMut(&mut DomainRecord) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        for attempt in 1..=REGISTRY_CAS_MAX_ATTEMPTS {
            let Some(mut record) = self.domains.lookup(domain).await? else {
                return Err(RegistryError::Corrupt(format!(
                    "domain '{}' vanished mid-update",
                    domain
                )));
            };
            let outcome = apply(&mut record)?;
            if self.domains.update_versioned(&record).await? {
                if attempt > 1 {
                    debug!(domain, attempt, "domain update succeeded after contention");
                }
                return Ok(outcome);
            }
            warn!(domain, attempt, "domain row contention, retrying");
        }
        Err(RegistryError::Contention {
            domain: domain.to_string(),
        })
    }
}
