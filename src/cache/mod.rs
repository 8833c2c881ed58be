pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::corpus::{FactType, normalize_value};

pub use memory::MemoryCacheStore;
pub use sqlite::SqliteCacheStore;

pub const SIMILARITY_TTL_DAYS: i64 = 7;

/// A pairwise score before it is stamped for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPair {
    pub fact_type: FactType,
    pub value_a: String,
    pub value_b: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityCacheEntry {
    pub fact_type: FactType,
    pub value_a: String,
    pub value_b: String,
    pub score: f32,
    pub computed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SimilarityCacheEntry {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub valid: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("cache table lock poisoned")]
    Poisoned,
}

/// Key-value table holding similarity scores. Keys are
/// `(fact_type, value_a, value_b)` exactly as written; callers that want
/// unordered lookups query both orderings.
pub trait CacheStore {
    fn upsert(&self, entries: &[SimilarityCacheEntry]) -> Result<(), CacheError>;
    fn get(
        &self,
        fact_type: FactType,
        value_a: &str,
        value_b: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SimilarityCacheEntry>, CacheError>;
    fn scan_valid(&self, now: DateTime<Utc>) -> Result<Vec<SimilarityCacheEntry>, CacheError>;
    fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, CacheError>;
    fn delete_all(&self) -> Result<usize, CacheError>;
    fn any_valid(&self, now: DateTime<Utc>) -> Result<bool, CacheError>;
    fn count(&self) -> Result<usize, CacheError>;
}

/// Advisory store of fact-value similarity scores with a fixed freshness
/// window. Read failures surface as misses; only the maintenance operations
/// report errors.
pub struct SimilarityCache {
    store: Box<dyn CacheStore>,
    clock: Box<dyn Clock>,
    ttl: Duration,
}

impl SimilarityCache {
    pub fn new(store: Box<dyn CacheStore>) -> Self {
        Self::with_clock(store, Box::new(SystemClock))
    }

    pub fn with_clock(store: Box<dyn CacheStore>, clock: Box<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            ttl: Duration::days(SIMILARITY_TTL_DAYS),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn lookup(&self, fact_type: FactType, value_a: &str, value_b: &str) -> Option<f32> {
        let a = normalize_value(value_a);
        let b = normalize_value(value_b);
        if a == b {
            return Some(1.0);
        }

        let now = self.clock.now();
        for (left, right) in [(&a, &b), (&b, &a)] {
            match self.store.get(fact_type, left, right, now) {
                Ok(Some(entry)) => return Some(entry.score),
                Ok(None) => {}
                Err(err) => {
                    warn!(%fact_type, error = %err, "similarity cache read failed; treating as miss");
                    return None;
                }
            }
        }
        None
    }

    /// Stamps each pair with `now + ttl` and upserts; the last write for a
    /// key wins.
    pub fn bulk_store(&self, pairs: &[ScoredPair]) -> Result<usize, CacheError> {
        if pairs.is_empty() {
            return Ok(0);
        }
        let computed_at = self.clock.now();
        let expires_at = computed_at + self.ttl;
        let entries = pairs
            .iter()
            .map(|pair| SimilarityCacheEntry {
                fact_type: pair.fact_type,
                value_a: normalize_value(&pair.value_a),
                value_b: normalize_value(&pair.value_b),
                score: pair.score,
                computed_at,
                expires_at,
            })
            .collect::<Vec<_>>();
        self.store.upsert(&entries)?;
        debug!(count = entries.len(), "stored similarity scores");
        Ok(entries.len())
    }

    pub fn valid_entries(&self) -> Result<Vec<SimilarityCacheEntry>, CacheError> {
        self.store.scan_valid(self.clock.now())
    }

    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let removed = self.store.delete_expired(self.clock.now())?;
        debug!(removed, "purged expired similarity scores");
        Ok(removed)
    }

    pub fn clear(&self) -> Result<usize, CacheError> {
        self.store.delete_all()
    }

    pub fn has_any_valid_entry(&self) -> bool {
        match self.store.any_valid(self.clock.now()) {
            Ok(found) => found,
            Err(err) => {
                warn!(error = %err, "similarity cache probe failed");
                false
            }
        }
    }

    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let total = self.store.count()?;
        let valid = self.store.scan_valid(self.clock.now())?.len();
        Ok(CacheStats { total, valid })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::clock::ManualClock;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 9, 30, 0).unwrap()
    }

    fn pair(fact_type: FactType, a: &str, b: &str, score: f32) -> ScoredPair {
        ScoredPair {
            fact_type,
            value_a: a.to_string(),
            value_b: b.to_string(),
            score,
        }
    }

    struct BrokenStore;

    impl CacheStore for BrokenStore {
        fn upsert(&self, _: &[SimilarityCacheEntry]) -> Result<(), CacheError> {
            Err(CacheError::Poisoned)
        }
        fn get(
            &self,
            _: FactType,
            _: &str,
            _: &str,
            _: DateTime<Utc>,
        ) -> Result<Option<SimilarityCacheEntry>, CacheError> {
            Err(CacheError::Poisoned)
        }
        fn scan_valid(&self, _: DateTime<Utc>) -> Result<Vec<SimilarityCacheEntry>, CacheError> {
            Err(CacheError::Poisoned)
        }
        fn delete_expired(&self, _: DateTime<Utc>) -> Result<usize, CacheError> {
            Err(CacheError::Poisoned)
        }
        fn delete_all(&self) -> Result<usize, CacheError> {
            Err(CacheError::Poisoned)
        }
        fn any_valid(&self, _: DateTime<Utc>) -> Result<bool, CacheError> {
            Err(CacheError::Poisoned)
        }
        fn count(&self) -> Result<usize, CacheError> {
            Err(CacheError::Poisoned)
        }
    }

    #[test]
    fn identical_values_short_circuit_without_a_store() {
        let cache = SimilarityCache::new(Box::new(BrokenStore));
        assert_eq!(cache.lookup(FactType::Location, "Paris", " paris"), Some(1.0));
    }

    #[test]
    fn read_failures_are_misses() {
        let cache = SimilarityCache::new(Box::new(BrokenStore));
        assert_eq!(cache.lookup(FactType::Work, "Google", "Alphabet"), None);
        assert!(!cache.has_any_valid_entry());
        assert!(cache.bulk_store(&[pair(FactType::Work, "a", "b", 0.5)]).is_err());
    }

    #[test]
    fn stored_pairs_are_normalized_and_symmetric() {
        let clock = Arc::new(ManualClock::at(start()));
        let cache =
            SimilarityCache::with_clock(Box::new(MemoryCacheStore::new()), Box::new(clock.clone()));

        cache
            .bulk_store(&[pair(FactType::Hobby, " Chess ", "Go", 0.72)])
            .expect("store");

        assert_eq!(cache.lookup(FactType::Hobby, "chess", "go"), Some(0.72));
        assert_eq!(cache.lookup(FactType::Hobby, "GO", "CHESS"), Some(0.72));
        assert_eq!(cache.lookup(FactType::Interest, "chess", "go"), None);
    }

    #[test]
    fn stats_count_expired_rows_until_purged() {
        let clock = Arc::new(ManualClock::at(start()));
        let cache =
            SimilarityCache::with_clock(Box::new(MemoryCacheStore::new()), Box::new(clock.clone()));
        cache
            .bulk_store(&[pair(FactType::Work, "acme", "acme corp", 0.9)])
            .expect("first store");
        clock.advance(Duration::days(SIMILARITY_TTL_DAYS) + Duration::seconds(1));
        cache
            .bulk_store(&[pair(FactType::Work, "google", "alphabet", 0.8)])
            .expect("second store");

        assert_eq!(cache.stats().expect("stats"), CacheStats { total: 2, valid: 1 });
        assert_eq!(cache.purge_expired().expect("purge"), 1);
        assert_eq!(cache.stats().expect("stats"), CacheStats { total: 1, valid: 1 });
    }
}
