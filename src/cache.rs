use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory TTL cache for fetched calendar payloads.
///
/// One lock guards the whole map; it is held only for the duration of a map
/// read or write, never across network I/O. Expiry is lazy: an expired entry
/// is reported as a miss but stays in the map until the next `set` for its
/// alias overwrites it. There is no eviction and no background sweep.
#[derive(Debug)]
pub struct TtlCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

#[derive(Debug)]
struct CacheEntry {
    data: Bytes,
    fetched_at: Instant,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns the cached bytes for `alias` if an entry exists and is
    /// younger than the TTL.
    pub async fn get(&self, alias: &str) -> Option<Bytes> {
        let entries = self.entries.lock().await;
        match entries.get(alias) {
            Some(entry) if entry.fetched_at.elapsed() < self.ttl => Some(entry.data.clone()),
            Some(_) => {
                debug!("Cache entry expired for alias {}", alias);
                None
            }
            None => None,
        }
    }

    /// Unconditionally inserts or overwrites the entry for `alias`,
    /// timestamped now.
    pub async fn set(&self, alias: &str, data: Bytes) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            alias.to_string(),
            CacheEntry {
                data,
                fetched_at: Instant::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
