//! Expiring tenant cache
//!
//! One entry per issuer, each with its own expiry. Entries are replaced, not
//! edited: a refresh inserts a fresh `(Arc<Tenant>, expires_at)` pair over the
//! old one. Backed by [`DashMap`], so lookups for different issuers don't
//! contend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use super::Tenant;

/// Cache entry: a tenant and the instant it stops being served
#[derive(Debug, Clone)]
struct CacheEntry {
    tenant: Arc<Tenant>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Per-issuer tenant cache
#[derive(Debug)]
pub struct TenantCache {
    entries: DashMap<String, CacheEntry>,
    default_ttl: Duration,
}

impl TenantCache {
    /// Create an empty cache whose entries live for `default_ttl`
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
        }
    }

    /// TTL applied by [`TenantCache::set_default`]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Tenant and expiry for `issuer`, expired or not
    ///
    /// Callers decide whether an expired entry is usable; the resolver treats
    /// it as a miss.
    pub fn get_with_expiration(&self, issuer: &str) -> Option<(Arc<Tenant>, Instant)> {
        self.entries
            .get(issuer)
            .map(|entry| (Arc::clone(&entry.tenant), entry.expires_at))
    }

    /// Live tenant for `issuer`, if any
    pub fn get(&self, issuer: &str) -> Option<Arc<Tenant>> {
        let now = Instant::now();
        self.entries
            .get(issuer)
            .filter(|entry| entry.is_live(now))
            .map(|entry| Arc::clone(&entry.tenant))
    }

    /// Store `tenant` under `issuer` with the default TTL
    pub fn set_default(&self, issuer: impl Into<String>, tenant: Arc<Tenant>) {
        self.set(issuer, tenant, self.default_ttl);
    }

    /// Store `tenant` under `issuer` with an explicit TTL
    pub fn set(&self, issuer: impl Into<String>, tenant: Arc<Tenant>, ttl: Duration) {
        let issuer = issuer.into();
        debug!(issuer = %issuer, ttl_secs = ttl.as_secs(), "Caching tenant");
        self.entries.insert(
            issuer,
            CacheEntry {
                tenant,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "Purged expired tenants");
        }
        removed
    }

    /// Remove all entries
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let total_entries = self.entries.len();
        let valid_entries = self
            .entries
            .iter()
            .filter(|entry| entry.is_live(now))
            .count();

        CacheStats {
            total_entries,
            expired_entries: total_entries.saturating_sub(valid_entries),
            valid_entries,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of cache entries
    pub total_entries: usize,

    /// Number of expired entries
    pub expired_entries: usize,

    /// Number of valid entries
    pub valid_entries: usize,
}
