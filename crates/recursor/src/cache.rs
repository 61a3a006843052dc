//! Shared answer cache: a concurrent map from `(name, record type)` to an
//! immutable record set, with lazy TTL expiry.

use hickory_proto::rr::{Name, Record, RecordType};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    name: String,
    rtype: RecordType,
}

impl CacheKey {
    /// Names are canonicalised to their lowercased textual form so that
    /// lookups are case-insensitive regardless of the on-wire spelling.
    fn new(name: &Name, rtype: RecordType) -> Self {
        Self {
            name: name.to_utf8().to_ascii_lowercase(),
            rtype,
        }
    }
}

struct CacheEntry {
    records: Arc<Vec<Record>>,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(records: Vec<Record>) -> Self {
        let min_ttl = records.iter().map(Record::ttl).min().unwrap_or(0);
        Self {
            records: Arc::new(records),
            expires_at: Instant::now() + Duration::from_secs(u64::from(min_ttl)),
        }
    }

    fn expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Concurrent answer cache with reader-preferred locking. Lookups take the
/// read lock; only expiry removal and insertion take the write lock. The
/// lock is never held across I/O.
#[derive(Default)]
pub struct AnswerCache {
    inner: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl AnswerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached record set for `(name, rtype)`, or `None` on a miss.
    /// An entry past its deadline is removed and reported as a miss.
    pub fn lookup(&self, name: &Name, rtype: RecordType) -> Option<Arc<Vec<Record>>> {
        let key = CacheKey::new(name, rtype);
        {
            let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            match map.get(&key) {
                Some(entry) if !entry.expired() => return Some(entry.records.clone()),
                Some(_) => {} // expired; remove below under the write lock
                None => return None,
            }
        }
        // Another reader may still observe the expired entry between the
        // read guard dropping and this write lock; it only ever sees the
        // stale records once more.
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if map.get(&key).is_some_and(|entry| entry.expired()) {
            map.remove(&key);
        }
        None
    }

    /// Insert `records` under `(name, rtype)`, replacing any existing
    /// entry. Positive answers only; empty record sets are not cached.
    pub fn insert(&self, name: &Name, rtype: RecordType, records: Vec<Record>) {
        if records.is_empty() {
            return;
        }
        let key = CacheKey::new(name, rtype);
        let entry = CacheEntry::new(records);
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
