//! Roadmap cache persistence port.

use async_trait::async_trait;

use crate::domain::RoadmapSnapshot;
use crate::error::CoreResult;

/// Persistence contract for the single-row roadmap cache.
#[async_trait]
pub trait RoadmapStore: Send + Sync {
    /// Load the persisted snapshot, `None` when never fetched.
    async fn load(&self) -> CoreResult<Option<RoadmapSnapshot>>;

    /// Replace the persisted snapshot.
    async fn save(&self, snapshot: &RoadmapSnapshot) -> CoreResult<()>;
}
