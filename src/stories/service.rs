//! Bounded fan-out aggregation of the best-story ranking.

use crate::cache::TtlCache;
use crate::hn::StoryRecord;
use crate::resilience::BreakerSnapshot;
use crate::stories::client::ResilientClient;
use crate::stories::view::BestStoryView;
use crate::utils::log_if_slow;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, trace};

const RANKED_IDS_KEY: &str = "hn:beststories";

/// Tunables for [`BestStoriesService`].
#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    pub ids_ttl: Duration,
    pub item_ttl: Duration,
    /// Process-wide cap on simultaneous upstream detail fetches.
    pub max_concurrent_fetches: usize,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            ids_ttl: Duration::from_secs(30),
            item_ttl: Duration::from_secs(5 * 60),
            max_concurrent_fetches: 8,
        }
    }
}

/// Cache and concurrency figures for the status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatorStats {
    pub cached_rankings: usize,
    pub cached_items: usize,
    pub fetch_slots_available: usize,
    pub fetch_slots_total: usize,
    pub upstream: BreakerSnapshot,
}

/// Resolves the top `n` best stories, sharing caches and the fetch gate
/// across every request in the process.
pub struct BestStoriesService {
    client: ResilientClient,
    ranked_ids: TtlCache<&'static str, Vec<u32>>,
    items: TtlCache<u32, StoryRecord>,
    gate: Semaphore,
    settings: AggregatorSettings,
}

impl BestStoriesService {
    pub fn new(client: ResilientClient, settings: AggregatorSettings) -> Self {
        let slots = settings.max_concurrent_fetches.max(1);
        Self {
            client,
            ranked_ids: TtlCache::new("ranked_ids"),
            items: TtlCache::new("items"),
            gate: Semaphore::new(slots),
            settings: AggregatorSettings {
                max_concurrent_fetches: slots,
                ..settings
            },
        }
    }

    /// The top `n` stories in ranking order, skipping any that could not be
    /// resolved. Returns fewer than `n` when the ranking is shorter, and an
    /// empty list when the ranking itself is unavailable.
    pub async fn get_top(&self, n: usize) -> Vec<BestStoryView> {
        let start = Instant::now();
        let ids = self.ranked_ids().await;
        if ids.is_empty() || n == 0 {
            return Vec::new();
        }

        let mut seen = HashSet::with_capacity(n.min(ids.len()));
        let wanted: Vec<u32> = ids
            .iter()
            .take(n)
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        let resolved = join_all(wanted.iter().map(|&id| self.resolve(id))).await;

        let stories: Vec<BestStoryView> = resolved
            .iter()
            .flatten()
            .map(|story| BestStoryView::from(&**story))
            .collect();

        let dropped = wanted.len() - stories.len();
        debug!(
            requested = n,
            resolved = stories.len(),
            dropped,
            "assembled best stories"
        );
        log_if_slow(start, Duration::from_secs(5), "best stories aggregation");
        stories
    }

    /// The cached ranking, refreshed from upstream when missing or expired.
    /// An empty or unavailable ranking is returned but never cached.
    async fn ranked_ids(&self) -> Arc<Vec<u32>> {
        let result = self
            .ranked_ids
            .get_or_try_create(RANKED_IDS_KEY, self.settings.ids_ttl, || async {
                let ids = self.client.fetch_ranked_ids().await;
                if ids.is_empty() { Err(()) } else { Ok(ids) }
            })
            .await;
        result.unwrap_or_default()
    }

    /// Cache-or-fetch for one item. Only a cache miss takes a fetch slot.
    async fn resolve(&self, id: u32) -> Option<Arc<StoryRecord>> {
        self.items
            .get_or_try_create(id, self.settings.item_ttl, || async {
                let Ok(_slot) = self.gate.acquire().await else {
                    return Err(());
                };
                trace!(id, available = self.gate.available_permits(), "fetch slot acquired");
                self.client.fetch_item(id).await.ok_or(())
            })
            .await
            .ok()
    }

    pub fn stats(&self) -> AggregatorStats {
        AggregatorStats {
            cached_rankings: self.ranked_ids.len(),
            cached_items: self.items.len(),
            fetch_slots_available: self.gate.available_permits(),
            fetch_slots_total: self.settings.max_concurrent_fetches,
            upstream: self.client.pipeline().breaker().snapshot(),
        }
    }

    /// Start background purging of expired cache entries.
    pub fn spawn_cache_sweeper(
        &self,
        interval: Duration,
        cancel: tokio_util::sync::CancellationToken,
    ) {
        self.ranked_ids.spawn_sweeper(interval, cancel.clone());
        self.items.spawn_sweeper(interval, cancel);
    }
}
