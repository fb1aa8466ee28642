//! Roadmap cache for Downpour.
//!
//! Fetches the project roadmap from a CDN with conditional requests,
//! serves it stale-while-revalidate, and backs off exponentially on
//! errors. Existing cache is never cleared by a failed sync.

mod backoff;
mod service;

pub use backoff::backoff_after;
pub use service::{RoadmapConfig, RoadmapService};
