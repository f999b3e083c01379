use crate::domain::scan::ScanResult;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

// Ten years; keeps chrono arithmetic in range.
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 3600;

#[derive(Debug, Clone)]
struct CachedScan {
    result: ScanResult,
    fetched_at: DateTime<Utc>,
}

/// Process-wide memo of scanner results, keyed on the full parameter tuple.
///
/// Entries older than the TTL are treated as missing. They are evicted on
/// lookup and swept on every insert. A TTL of zero disables caching.
#[derive(Debug)]
pub struct QueryCache {
    ttl: Duration,
    entries: tokio::sync::Mutex<HashMap<String, CachedScan>>,
}

impl QueryCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64),
            entries: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &str, now: DateTime<Utc>) -> Option<ScanResult> {
        let mut guard = self.entries.lock().await;
        let fresh = guard
            .get(key)
            .map(|cached| now < cached.fetched_at + self.ttl)?;
        if fresh {
            return guard.get(key).map(|cached| cached.result.clone());
        }
        guard.remove(key);
        None
    }

    pub async fn insert(&self, key: String, result: ScanResult, fetched_at: DateTime<Utc>) {
        if self.ttl <= Duration::zero() {
            return;
        }
        let ttl = self.ttl;
        let mut guard = self.entries.lock().await;
        let before = guard.len();
        guard.retain(|_, cached| fetched_at < cached.fetched_at + ttl);
        let swept = before - guard.len();
        if swept > 0 {
            tracing::debug!(swept, "evicted stale screener cache entries");
        }
        guard.insert(key, CachedScan { result, fetched_at });
    }

    pub async fn invalidate(&self, key: &str) -> bool {
        self.entries.lock().await.remove(key).is_some()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
