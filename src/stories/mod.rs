//! Best-story aggregation: resilient upstream access, caching, fan-out and
//! result assembly.

pub mod client;
pub mod service;
pub mod view;

pub use client::ResilientClient;
pub use service::{AggregatorSettings, AggregatorStats, BestStoriesService};
pub use view::BestStoryView;
