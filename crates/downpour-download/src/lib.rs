//! Download manager for Downpour.
//!
//! Owns the job lifecycle: bounded-concurrency dispatch, cancellation,
//! restart recovery, incognito semantics, and batched progress delivery.

mod manager;

pub use manager::{DownloadManager, ManagerConfig};
