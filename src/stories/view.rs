//! Caller-facing projection of a story.

use crate::hn::StoryRecord;
use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BestStoryView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted_by: Option<String>,
    /// Creation time as `YYYY-MM-DDTHH:MM:SSZ`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub score: u32,
    pub comment_count: u32,
}

impl From<&StoryRecord> for BestStoryView {
    fn from(story: &StoryRecord) -> Self {
        Self {
            title: story.title.clone(),
            uri: story.url.clone(),
            posted_by: story.by.clone(),
            time: format_timestamp(story.time),
            score: story.score,
            comment_count: story.descendants.unwrap_or(0),
        }
    }
}

/// Format epoch seconds as an ISO-8601 UTC timestamp; `None` if out of range.
pub fn format_timestamp(epoch_secs: i64) -> Option<String> {
    DateTime::from_timestamp(epoch_secs, 0).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}
