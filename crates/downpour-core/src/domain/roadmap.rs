//! Roadmap cache entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single roadmap entry as published on the CDN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapItem {
    /// Stable entry id.
    pub id: String,
    /// Short title.
    pub title: String,
    /// Longer description, may contain markdown.
    #[serde(default)]
    pub description: String,
    /// Lifecycle bucket (`"planned"`, `"in-progress"`, `"shipped"`).
    #[serde(default)]
    pub status: String,
    /// Optional grouping category.
    #[serde(default)]
    pub category: String,
}

/// The cached roadmap: payload plus the metadata needed for conditional
/// refresh. Exactly one row is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapSnapshot {
    /// Parsed items.
    pub items: Vec<RoadmapItem>,
    /// sha256 of the raw payload, lowercase hex.
    pub hash: String,
    /// HTTP entity tag from the last 200 response.
    pub etag: String,
    /// Language the payload is tagged with (e.g. `"en"`).
    pub lang: String,
    /// When the payload was fetched.
    pub fetched_at: DateTime<Utc>,
}
