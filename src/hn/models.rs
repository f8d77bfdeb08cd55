//! Upstream item payloads.

use serde::{Deserialize, Serialize};

/// Kind of a Hacker News item, from its `type` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Story,
    Comment,
    Job,
    Poll,
    PollOpt,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Raw detail for one upstream item.
///
/// Immutable once fetched; the aggregator shares it behind an `Arc` between
/// every request that resolves the same id while it is cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRecord {
    pub id: u32,
    pub title: Option<String>,
    pub url: Option<String>,
    pub by: Option<String>,
    /// Creation time, seconds since the Unix epoch.
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub score: u32,
    /// Total comment count; absent on items that cannot have comments.
    pub descendants: Option<u32>,
    #[serde(rename = "type", default)]
    pub kind: ItemKind,
    #[serde(default)]
    pub dead: bool,
    #[serde(default)]
    pub deleted: bool,
}
