//! Scripted upstream transport and service builders shared by integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use beststories::hn::{HnTransport, ItemKind, StoryRecord, UpstreamError};
use beststories::resilience::{BreakerConfig, ResiliencePipeline, RetryPolicy};
use beststories::stories::{AggregatorSettings, BestStoriesService, ResilientClient};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory upstream. Unknown item ids answer `NotFound`.
#[derive(Default)]
pub struct FakeTransport {
    ids: Mutex<Vec<u32>>,
    ids_status: Mutex<Option<u16>>,
    items: Mutex<HashMap<u32, StoryRecord>>,
    /// Per-item count of transient failures to serve before succeeding.
    flaky: Mutex<HashMap<u32, u32>>,
    /// Status served by every item call while set.
    item_status: Mutex<Option<u16>>,
    delay: Mutex<Duration>,

    ids_calls: AtomicU32,
    item_calls: Mutex<HashMap<u32, u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeTransport {
    pub fn with_stories(ids: &[u32]) -> Arc<Self> {
        let fake = Self::default();
        fake.set_ids(ids);
        for &id in ids {
            fake.put(story(id));
        }
        Arc::new(fake)
    }

    pub fn set_ids(&self, ids: &[u32]) {
        *self.ids.lock().unwrap() = ids.to_vec();
    }

    pub fn fail_ids(&self, status: Option<u16>) {
        *self.ids_status.lock().unwrap() = status;
    }

    pub fn put(&self, record: StoryRecord) {
        self.items.lock().unwrap().insert(record.id, record);
    }

    pub fn remove(&self, id: u32) {
        self.items.lock().unwrap().remove(&id);
    }

    pub fn flaky(&self, id: u32, failures: u32) {
        self.flaky.lock().unwrap().insert(id, failures);
    }

    pub fn fail_items(&self, status: Option<u16>) {
        *self.item_status.lock().unwrap() = status;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn ids_calls(&self) -> u32 {
        self.ids_calls.load(Ordering::SeqCst)
    }

    pub fn item_calls(&self, id: u32) -> u32 {
        self.item_calls.lock().unwrap().get(&id).copied().unwrap_or(0)
    }

    pub fn total_item_calls(&self) -> u32 {
        self.item_calls.lock().unwrap().values().sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight gauge when an item call finishes or is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl HnTransport for FakeTransport {
    async fn best_story_ids(&self) -> Result<Vec<u32>, UpstreamError> {
        self.ids_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = *self.ids_status.lock().unwrap() {
            return Err(UpstreamError::Status(status));
        }
        Ok(self.ids.lock().unwrap().clone())
    }

    async fn item(&self, id: u32) -> Result<StoryRecord, UpstreamError> {
        *self.item_calls.lock().unwrap().entry(id).or_default() += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(status) = *self.item_status.lock().unwrap() {
            return Err(UpstreamError::Status(status));
        }
        {
            let mut flaky = self.flaky.lock().unwrap();
            if let Some(remaining) = flaky.get_mut(&id)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(UpstreamError::Status(503));
            }
        }

        self.items
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(UpstreamError::NotFound)
    }
}

pub fn story(id: u32) -> StoryRecord {
    StoryRecord {
        id,
        title: Some(format!("Story {id}")),
        url: Some(format!("https://example.com/{id}")),
        by: Some(format!("user{id}")),
        time: 1_700_000_000 + i64::from(id),
        score: id * 10,
        descendants: Some(id),
        kind: ItemKind::Story,
        dead: false,
        deleted: false,
    }
}

pub fn pipeline() -> Arc<ResiliencePipeline> {
    Arc::new(ResiliencePipeline::new(
        RetryPolicy::default(),
        BreakerConfig::default(),
        Duration::from_secs(10),
    ))
}

pub fn service(fake: Arc<FakeTransport>) -> BestStoriesService {
    BestStoriesService::new(
        ResilientClient::new(fake, pipeline()),
        AggregatorSettings::default(),
    )
}
