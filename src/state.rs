//! Application state shared across request handlers.

use crate::stories::BestStoriesService;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub stories: Arc<BestStoriesService>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(stories: Arc<BestStoriesService>) -> Self {
        Self {
            stories,
            started_at: Instant::now(),
        }
    }
}
