use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{Clock, Result, SecretError, SecretStore, SecretString};

/// Tuning for [`SecretCache`].
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// How long a successfully fetched value is served without asking the store.
    pub ttl: Duration,
    /// Added to the refresh time once per consecutive failure count.
    pub retry_base: Duration,
    /// Ceiling for the consecutive failure multiplier.
    pub max_error_count: u32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(1),
            retry_base: Duration::seconds(1),
            max_error_count: 10,
        }
    }
}

struct CacheEntry {
    value: SecretString,
    fresh_until: DateTime<Utc>,
    consecutive_errors: u32,
}

type Slot = Arc<Mutex<Option<CacheEntry>>>;

/// Shared secret cache. Each name has its own slot so a slow refresh of one
/// secret never blocks readers of another.
pub struct SecretCache {
    store: Arc<dyn SecretStore>,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
    slots: DashMap<String, Slot>,
}

impl SecretCache {
    pub fn new(store: Arc<dyn SecretStore>, clock: Arc<dyn Clock>, settings: CacheSettings) -> Self {
        Self {
            store,
            clock,
            settings,
            slots: DashMap::new(),
        }
    }

    /// Return the secret stored under `name`.
    ///
    /// Fresh entries are served as-is. Stale or missing entries are refetched;
    /// if that fails a stale value is returned and the next refresh is delayed
    /// by `consecutive_errors * retry_base`. Only a name that has never been
    /// fetched successfully produces an error.
    pub async fn get(&self, name: &str) -> Result<SecretString> {
        // Clone the slot out so the map shard lock is released before awaiting.
        let slot: Slot = Arc::clone(&*self.slots.entry(name.to_string()).or_default());
        let mut entry = slot.lock().await;
        let now = self.clock.now();

        if let Some(cached) = entry.as_mut() {
            if now < cached.fresh_until {
                cached.consecutive_errors = 0;
                return Ok(cached.value.clone());
            }
        }

        match self.store.fetch(name).await {
            Ok(raw) => {
                let value = SecretString::new(raw);
                *entry = Some(CacheEntry {
                    value: value.clone(),
                    fresh_until: now + self.settings.ttl,
                    consecutive_errors: 0,
                });
                debug!(secret = %name, "secret refreshed");
                Ok(value)
            }
            Err(err) => match entry.as_mut() {
                Some(cached) => {
                    if cached.consecutive_errors < self.settings.max_error_count {
                        cached.consecutive_errors += 1;
                    }
                    cached.fresh_until += self.settings.retry_base * cached.consecutive_errors as i32;
                    warn!(
                        secret = %name,
                        consecutive_errors = cached.consecutive_errors,
                        retry_after = %cached.fresh_until,
                        error = %err,
                        "secret refresh failed, serving stale value"
                    );
                    Ok(cached.value.clone())
                }
                None => Err(SecretError::Unavailable {
                    name: name.to_string(),
                    source: err.into(),
                }),
            },
        }
    }

    /// Drop the cached value for `name`, forcing the next `get` to fetch.
    pub fn invalidate(&self, name: &str) {
        self.slots.remove(name);
    }
}
