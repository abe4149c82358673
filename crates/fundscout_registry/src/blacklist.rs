//! Read-through blacklist cache over the domain registry.
//!
//! `is_blacklisted` answers from the cache when it can; on a miss (or an
//! unavailable store) it consults the registry and refills. Store failures
//! degrade to direct registry reads with a warning; they never become
//! workflow errors.

use crate::cache::{CacheStore, LruTtlCache};
use crate::error::RegistryError;
use crate::registry::DomainRegistry;
use fundscout_protocol::defaults::{BLACKLIST_CACHE_CAPACITY, BLACKLIST_CACHE_TTL};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct BlacklistCache {
    store: Arc<dyn CacheStore<String, bool>>,
    registry: DomainRegistry,
    /// Set while the store is failing, so the degraded-mode warning fires
    /// once per incident instead of per lookup.
    degraded: AtomicBool,
}

impl BlacklistCache {
    pub fn new(registry: DomainRegistry) -> Self {
        Self::with_store(
            registry,
            Arc::new(LruTtlCache::new(BLACKLIST_CACHE_CAPACITY, BLACKLIST_CACHE_TTL)),
        )
    }

    pub fn with_store(
        registry: DomainRegistry,
        store: Arc<dyn CacheStore<String, bool>>,
    ) -> Self {
        Self {
            store,
            registry,
            degraded: AtomicBool::new(false),
        }
    }

    /// Preload every known blacklisted domain. Best-effort: a failing store
    /// just leaves the cache cold.
    pub async fn warm(&self) -> Result<usize, RegistryError> {
        let domains = self.registry.repository().blacklisted_domains().await?;
        let count = domains.len();
        for domain in domains {
            if let Err(err) = self.store.put(domain, true) {
                warn!(error = %err, "blacklist cache warm-up aborted");
                break;
            }
        }
        debug!(count, "blacklist cache warmed");
        Ok(count)
    }

    pub async fn is_blacklisted(&self, domain: &str) -> Result<bool, RegistryError> {
        let key = domain.to_string();
        match self.store.get(&key) {
            Ok(Some(verdict)) => {
                self.degraded.store(false, Ordering::Relaxed);
                return Ok(verdict);
            }
            Ok(None) => {
                self.degraded.store(false, Ordering::Relaxed);
            }
            Err(err) => {
                if !self.degraded.swap(true, Ordering::Relaxed) {
                    warn!(error = %err, "blacklist cache unavailable, falling through to registry");
                }
                return self.registry.is_blacklisted(domain).await;
            }
        }

        let verdict = self.registry.is_blacklisted(domain).await?;
        if let Err(err) = self.store.put(key, verdict) {
            if !self.degraded.swap(true, Ordering::Relaxed) {
                warn!(error = %err, "blacklist cache refill failed");
            }
        }
        debug!(domain, verdict, "blacklist verdict cached");
        Ok(verdict)
    }

    /// Write-through blacklist: registry first, then cache invalidation so
    /// the next lookup sees the new status.
    pub async fn mark_blacklisted(
        &self,
        domain: &str,
        reason: &str,
    ) -> Result<(), RegistryError> {
        self.registry.mark_blacklisted(domain, reason).await?;
        if let Err(err) = self.store.invalidate(&domain.to_string()) {
            warn!(domain, error = %err, "blacklist cache invalidation failed");
        }
        Ok(())
    }

    pub async fn lift(&self, domain: &str) -> Result<(), RegistryError> {
        self.registry.lift_blacklist(domain).await?;
        if let Err(err) = self.store.invalidate(&domain.to_string()) {
            warn!(domain, error = %err, "blacklist cache invalidation failed");
        }
        Ok(())
    }
}
