//! Upstream client that routes every call through the resilience pipeline and
//! absorbs failures into "unavailable".

use crate::hn::{HnTransport, StoryRecord, UpstreamError};
use crate::resilience::ResiliencePipeline;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct ResilientClient {
    transport: Arc<dyn HnTransport>,
    pipeline: Arc<ResiliencePipeline>,
}

impl ResilientClient {
    pub fn new(transport: Arc<dyn HnTransport>, pipeline: Arc<ResiliencePipeline>) -> Self {
        Self {
            transport,
            pipeline,
        }
    }

    pub fn pipeline(&self) -> &ResiliencePipeline {
        &self.pipeline
    }

    /// Current best-story ranking, or an empty list when upstream is unavailable.
    pub async fn fetch_ranked_ids(&self) -> Vec<u32> {
        let result = self
            .pipeline
            .execute("best_story_ids", || self.transport.best_story_ids())
            .await;
        match result {
            Ok(ids) => {
                debug!(count = ids.len(), "fetched best story ids");
                ids
            }
            Err(e) => {
                warn!(error = %e, "best story ids unavailable");
                Vec::new()
            }
        }
    }

    /// Detail for `id`, or `None` when it is missing, malformed, or unavailable.
    pub async fn fetch_item(&self, id: u32) -> Option<StoryRecord> {
        let result = self
            .pipeline
            .execute("item", || self.transport.item(id))
            .await;
        match result {
            Ok(story) => Some(story),
            Err(UpstreamError::NotFound) => {
                debug!(id, "item not found upstream");
                None
            }
            Err(UpstreamError::CircuitOpen) => {
                debug!(id, "item skipped, circuit open");
                None
            }
            Err(e) => {
                warn!(id, error = %e, "item unavailable");
                None
            }
        }
    }
}
