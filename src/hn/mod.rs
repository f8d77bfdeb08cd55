//! Hacker News API client: transport, payload models and error taxonomy.

pub mod api;
pub mod errors;
pub mod json;
pub mod models;

pub use api::{DEFAULT_BASE_URL, HnApi, HnTransport};
pub use errors::UpstreamError;
pub use models::{ItemKind, StoryRecord};
