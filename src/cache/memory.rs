use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::cache::{CacheError, CacheStore, SimilarityCacheEntry};
use crate::corpus::FactType;

type EntryKey = (FactType, String, String);

/// In-process cache table. Clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    rows: Arc<Mutex<HashMap<EntryKey, SimilarityCacheEntry>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> Result<MutexGuard<'_, HashMap<EntryKey, SimilarityCacheEntry>>, CacheError> {
        self.rows.lock().map_err(|_| CacheError::Poisoned)
    }
}

impl CacheStore for MemoryCacheStore {
    fn upsert(&self, entries: &[SimilarityCacheEntry]) -> Result<(), CacheError> {
        let mut rows = self.rows()?;
        for entry in entries {
            rows.insert(
                (entry.fact_type, entry.value_a.clone(), entry.value_b.clone()),
                entry.clone(),
            );
        }
        Ok(())
    }

    fn get(
        &self,
        fact_type: FactType,
        value_a: &str,
        value_b: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SimilarityCacheEntry>, CacheError> {
        let rows = self.rows()?;
        Ok(rows
            .get(&(fact_type, value_a.to_string(), value_b.to_string()))
            .filter(|entry| entry.is_valid_at(now))
            .cloned())
    }

    fn scan_valid(&self, now: DateTime<Utc>) -> Result<Vec<SimilarityCacheEntry>, CacheError> {
        let rows = self.rows()?;
        let mut out = rows
            .values()
            .filter(|entry| entry.is_valid_at(now))
            .cloned()
            .collect::<Vec<_>>();
        out.sort_by(|left, right| {
            (left.fact_type, &left.value_a, &left.value_b).cmp(&(
                right.fact_type,
                &right.value_a,
                &right.value_b,
            ))
        });
        Ok(out)
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, CacheError> {
        let mut rows = self.rows()?;
        let before = rows.len();
        rows.retain(|_, entry| entry.is_valid_at(now));
        Ok(before - rows.len())
    }

    fn delete_all(&self) -> Result<usize, CacheError> {
        let mut rows = self.rows()?;
        let removed = rows.len();
        rows.clear();
        Ok(removed)
    }

    fn any_valid(&self, now: DateTime<Utc>) -> Result<bool, CacheError> {
        Ok(self.rows()?.values().any(|entry| entry.is_valid_at(now)))
    }

    fn count(&self) -> Result<usize, CacheError> {
        Ok(self.rows()?.len())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn entry(a: &str, b: &str, expires_at: DateTime<Utc>) -> SimilarityCacheEntry {
        SimilarityCacheEntry {
            fact_type: FactType::Work,
            value_a: a.to_string(),
            value_b: b.to_string(),
            score: 0.5,
            computed_at: expires_at - Duration::days(7),
            expires_at,
        }
    }

    #[test]
    fn clones_share_rows() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let store = MemoryCacheStore::new();
        let view = store.clone();
        store
            .upsert(&[entry("a", "b", now + Duration::hours(1))])
            .expect("upsert");

        assert!(view.any_valid(now).expect("probe"));
        assert_eq!(view.delete_all().expect("clear"), 1);
        assert_eq!(store.count().expect("count"), 0);
    }

    #[test]
    fn get_ignores_expired_rows() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let store = MemoryCacheStore::new();
        store
            .upsert(&[entry("a", "b", now)])
            .expect("upsert");

        assert_eq!(store.get(FactType::Work, "a", "b", now).expect("get"), None);
        assert!(
            store
                .get(FactType::Work, "a", "b", now - Duration::seconds(1))
                .expect("get")
                .is_some()
        );
    }
}
