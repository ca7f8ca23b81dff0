// refguard-core/src/infrastructure/cache.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::domain::dataset::SharedDataset;
use crate::error::RefGuardError;
use crate::ports::dataset::DatasetProvider;

type CacheKey = (String, String);

struct Entry {
    dataset: SharedDataset,
    loaded_at: Instant,
}

impl Entry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.loaded_at.elapsed() < ttl
    }
}

type Slot = Arc<tokio::sync::Mutex<Option<Entry>>>;

/// Read-through cache in front of a `DatasetProvider`.
///
/// Entries expire after `ttl` (zero disables caching). Concurrent requests for the
/// same (product type, exchange) wait on one load instead of each hitting the source.
/// Failed loads are not cached. Expired entries are released on their next lookup,
/// and idle expired slots are swept whenever a slot is taken.
pub struct DatasetCache {
    provider: Arc<dyn DatasetProvider>,
    ttl: Duration,
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl DatasetCache {
    pub fn new(provider: Arc<dyn DatasetProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn provider(&self) -> &Arc<dyn DatasetProvider> {
        &self.provider
    }

    fn key(product_type: &str, exchange: &str) -> CacheKey {
        (product_type.to_lowercase(), exchange.to_string())
    }

    fn slot(&self, key: CacheKey) -> Result<Slot, RefGuardError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| RefGuardError::InternalError("Dataset cache mutex poisoned".into()))?;
        Self::sweep(&mut slots, self.ttl);
        Ok(Arc::clone(slots.entry(key).or_default()))
    }

    /// Drops slots nobody is using whose entry is gone or expired.
    /// Slots are only cloned under the map lock, so a count of one means idle.
    fn sweep(slots: &mut HashMap<CacheKey, Slot>, ttl: Duration) {
        slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(entry) => entry.as_ref().is_some_and(|e| e.is_fresh(ttl)),
                Err(_) => true,
            }
        });
    }

    pub async fn get(
        &self,
        product_type: &str,
        exchange: &str,
    ) -> Result<SharedDataset, RefGuardError> {
        let slot = self.slot(Self::key(product_type, exchange))?;
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref()
            && cached.is_fresh(self.ttl)
        {
            debug!(product_type, exchange, "Dataset cache hit");
            return Ok(Arc::clone(&cached.dataset));
        }
        // Release the stale dataset before loading its replacement
        *entry = None;

        let dataset: SharedDataset = Arc::new(self.provider.load(product_type, exchange).await?);
        *entry = Some(Entry {
            dataset: Arc::clone(&dataset),
            loaded_at: Instant::now(),
        });
        Ok(dataset)
    }

    /// Drops one entry; the next `get` reloads from the source.
    pub fn invalidate(&self, product_type: &str, exchange: &str) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.remove(&Self::key(product_type, exchange));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.clear();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::domain::dataset::{Dataset, InstrumentRecord};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // --- MOCK PROVIDER ---
    #[derive(Default)]
    struct CountingProvider {
        loads: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl DatasetProvider for CountingProvider {
        async fn load(&self, product_type: &str, exchange: &str) -> Result<Dataset, RefGuardError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(RefGuardError::DataSource {
                    product_type: product_type.into(),
                    exchange: exchange.into(),
                    reason: "offline".into(),
                });
            }
            Ok(Dataset::new(vec![
                InstrumentRecord::new().with("MasterId", "1001"),
            ]))
        }

        fn provider_name(&self) -> &str {
            "counting"
        }
    }

    fn cache(provider: &Arc<CountingProvider>, ttl: Duration) -> DatasetCache {
        DatasetCache::new(Arc::clone(provider) as Arc<dyn DatasetProvider>, ttl)
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_load() {
        let provider = Arc::new(CountingProvider::default());
        let cache = cache(&provider, Duration::from_secs(60));

        let results =
            futures::future::join_all((0..10).map(|_| cache.get("stock", "HKEX"))).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(provider.loads.load(Ordering::SeqCst), 1);

        let first = results[0].as_ref().unwrap();
        assert!(results.iter().all(|r| Arc::ptr_eq(r.as_ref().unwrap(), first)));
    }

    #[tokio::test]
    async fn test_keys_are_independent_and_case_folded() -> anyhow::Result<()> {
        let provider = Arc::new(CountingProvider::default());
        let cache = cache(&provider, Duration::from_secs(60));

        cache.get("stock", "HKEX").await?;
        cache.get("Stock", "HKEX").await?;
        cache.get("stock", "XTKS").await?;
        assert_eq!(provider.loads.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_zero_ttl_always_reloads() -> anyhow::Result<()> {
        let provider = Arc::new(CountingProvider::default());
        let cache = cache(&provider, Duration::ZERO);

        cache.get("stock", "HKEX").await?;
        cache.get("stock", "HKEX").await?;
        assert_eq!(provider.loads.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() -> anyhow::Result<()> {
        let provider = Arc::new(CountingProvider::default());
        let cache = cache(&provider, Duration::from_secs(60));

        cache.get("stock", "HKEX").await?;
        cache.invalidate("stock", "HKEX");
        cache.get("stock", "HKEX").await?;
        cache.clear();
        cache.get("stock", "HKEX").await?;
        assert_eq!(provider.loads.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_datasets_are_released() -> anyhow::Result<()> {
        let provider = Arc::new(CountingProvider::default());
        let cache = cache(&provider, Duration::from_millis(50));

        let hkex = Arc::downgrade(&cache.get("stock", "HKEX").await?);
        let xtks = Arc::downgrade(&cache.get("stock", "XTKS").await?);
        assert!(hkex.upgrade().is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;

        // Stale hit: the old dataset is dropped and reloaded
        let reloaded = cache.get("stock", "HKEX").await?;
        assert!(hkex.upgrade().is_none());
        assert_eq!(reloaded.len(), 1);

        // The untouched XTKS slot was swept
        assert!(xtks.upgrade().is_none());
        assert_eq!(cache.slots.lock().unwrap().len(), 1);
        assert_eq!(provider.loads.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let provider = Arc::new(CountingProvider {
            fail: true,
            ..Default::default()
        });
        let cache = cache(&provider, Duration::from_secs(60));

        assert!(cache.get("stock", "HKEX").await.is_err());
        assert!(cache.get("stock", "HKEX").await.is_err());
        assert_eq!(provider.loads.load(Ordering::SeqCst), 2);
    }
}
