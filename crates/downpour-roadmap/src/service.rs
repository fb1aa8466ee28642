//! The roadmap service.
//!
//! Layered reads: in-memory cache (< 2 min, same language) → persisted
//! cache (same language) → synchronous CDN fetch. Cache hits return
//! immediately and kick a background revalidation.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use downpour_core::{
    AppEvent, CoreError, CoreResult, EventEmitter, RoadmapItem, RoadmapSnapshot, RoadmapStore,
};

use crate::backoff::backoff_after;

/// Configuration for the roadmap service.
#[derive(Debug, Clone)]
pub struct RoadmapConfig {
    /// CDN base URL (already sanitized, see `sanitize_cdn_base_url`).
    pub base_url: Url,
    /// Timer-driven sync cadence.
    pub sync_interval: Duration,
    /// First-failure backoff.
    pub initial_backoff: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
    /// Jitter window for timer-driven syncs.
    pub jitter_max: Duration,
    /// Freshness window of the in-memory cache.
    pub memory_ttl: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Connect timeout.
    pub connect_timeout: Duration,
}

impl Default for RoadmapConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://cdn.downpour.app/").expect("valid default base"),
            sync_interval: Duration::from_secs(5 * 60),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            jitter_max: Duration::from_secs(30),
            memory_ttl: Duration::from_secs(2 * 60),
            request_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

struct MemoryCache {
    items: Vec<RoadmapItem>,
    hash: String,
    etag: String,
    lang: String,
    refreshed: Instant,
}

/// CDN-backed roadmap cache with stale-while-revalidate semantics.
pub struct RoadmapService {
    store: Arc<dyn RoadmapStore>,
    emitter: Arc<dyn EventEmitter>,
    client: reqwest::Client,
    config: RoadmapConfig,
    memory: RwLock<Option<MemoryCache>>,
    sync_inflight: AtomicBool,
    error_count: AtomicU32,
    shutdown: CancellationToken,
}

impl RoadmapService {
    /// Create the service.
    pub fn new(
        store: Arc<dyn RoadmapStore>,
        emitter: Arc<dyn EventEmitter>,
        config: RoadmapConfig,
    ) -> CoreResult<Arc<Self>> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| CoreError::wrap("Roadmap.New", e))?;

        Ok(Arc::new(Self {
            store,
            emitter,
            client,
            config,
            memory: RwLock::new(None),
            sync_inflight: AtomicBool::new(false),
            error_count: AtomicU32::new(0),
            shutdown: CancellationToken::new(),
        }))
    }

    /// Consecutive sync failures since the last success.
    #[must_use]
    pub fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Fetch the roadmap for `lang`.
    ///
    /// Cache hits (memory or persisted, language-matched) return
    /// immediately and start a background revalidation; a miss fetches
    /// synchronously.
    pub async fn fetch(self: &Arc<Self>, lang: &str) -> CoreResult<Vec<RoadmapItem>> {
        {
            let memory = self.memory.read();
            if let Some(cache) = memory.as_ref() {
                if cache.lang == lang && cache.refreshed.elapsed() < self.config.memory_ttl {
                    let items = cache.items.clone();
                    drop(memory);
                    self.spawn_sync(lang.to_string(), false);
                    return Ok(items);
                }
            }
        }

        if let Some(snapshot) = self.store.load().await? {
            // A cached entry in another language is treated as absent.
            if snapshot.lang == lang {
                let items = snapshot.items.clone();
                *self.memory.write() = Some(MemoryCache {
                    items: snapshot.items,
                    hash: snapshot.hash,
                    etag: snapshot.etag,
                    lang: snapshot.lang,
                    refreshed: Instant::now(),
                });
                self.spawn_sync(lang.to_string(), false);
                return Ok(items);
            }
        }

        self.revalidate(lang).await?;
        let memory = self.memory.read();
        Ok(memory.as_ref().map(|c| c.items.clone()).unwrap_or_default())
    }

    /// Run the periodic sync until [`RoadmapService::stop`].
    ///
    /// Timer-driven syncs get jitter; after failures the cadence follows
    /// the exponential backoff schedule instead of the regular interval.
    pub async fn run_sync_loop(self: Arc<Self>, lang: String) {
        loop {
            let failures = self.error_count.load(Ordering::Relaxed);
            let delay = if failures == 0 {
                self.config.sync_interval
            } else {
                backoff_after(failures, self.config.initial_backoff, self.config.max_backoff)
            };

            tokio::select! {
                () = self.shutdown.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }

            self.sync(&lang, true).await;
        }
    }

    /// Stop the sync loop and any jittered waits.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Trigger one background sync (no jitter: manual syncs fire at once).
    pub fn sync_now(self: &Arc<Self>, lang: &str) {
        self.spawn_sync(lang.to_string(), false);
    }

    fn spawn_sync(self: &Arc<Self>, lang: String, jitter: bool) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            service.sync(&lang, jitter).await;
        });
    }

    /// One guarded sync pass. Only one runs at a time.
    async fn sync(&self, lang: &str, jitter: bool) {
        if self.sync_inflight.swap(true, Ordering::SeqCst) {
            return;
        }

        if jitter && !self.config.jitter_max.is_zero() {
            let jitter_ms = rand::random::<u64>()
                % u64::try_from(self.config.jitter_max.as_millis()).unwrap_or(u64::MAX);
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    self.sync_inflight.store(false, Ordering::SeqCst);
                    return;
                }
                () = tokio::time::sleep(Duration::from_millis(jitter_ms)) => {}
            }
        }

        match self.revalidate(lang).await {
            Ok(()) => {
                self.error_count.store(0, Ordering::Relaxed);
            }
            Err(e) => {
                let failures = self.error_count.fetch_add(1, Ordering::Relaxed) + 1;
                let next = backoff_after(
                    failures,
                    self.config.initial_backoff,
                    self.config.max_backoff,
                );
                tracing::warn!(
                    target: "downpour.roadmap",
                    failures,
                    next_backoff_secs = next.as_secs(),
                    error = %e,
                    "roadmap sync failed; keeping existing cache"
                );
            }
        }

        self.sync_inflight.store(false, Ordering::SeqCst);
    }

    /// Conditional CDN fetch. Never clears existing cache on failure.
    async fn revalidate(&self, lang: &str) -> CoreResult<()> {
        const OP: &str = "Roadmap.Sync";

        let url = self
            .config
            .base_url
            .join(&format!("roadmap.{lang}.json"))
            .map_err(|e| CoreError::wrap(OP, e))?;

        let known_etag = {
            let memory = self.memory.read();
            memory
                .as_ref()
                .filter(|c| c.lang == lang)
                .map(|c| c.etag.clone())
        };

        let mut request = self.client.get(url.clone());
        if let Some(etag) = known_etag.as_ref().filter(|e| !e.is_empty()) {
            request = request.header(reqwest::header::IF_NONE_MATCH, etag);
        }

        let response = request.send().await.map_err(|e| {
            CoreError::download_failed(OP, format!("cdn request failed: {e}"))
                .with_code("ERR_NETWORK")
                .with_source(e)
        })?;

        if response.status() == reqwest::StatusCode::NOT_MODIFIED {
            // No change; keep the persisted cache byte-for-byte, just
            // refresh the memory timestamp.
            if let Some(cache) = self.memory.write().as_mut() {
                cache.refreshed = Instant::now();
            }
            tracing::debug!(target: "downpour.roadmap", %url, "roadmap unchanged (304)");
            return Ok(());
        }

        if !response.status().is_success() {
            return Err(CoreError::download_failed(
                OP,
                format!("cdn returned HTTP {}", response.status()),
            )
            .with_code("ERR_NETWORK"));
        }

        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = response
            .text()
            .await
            .map_err(|e| CoreError::wrap(OP, e))?;

        // Upstream files have occasionally shipped with stray ESC bytes;
        // strip them before parsing.
        let cleaned: String = body.chars().filter(|c| *c != '\u{1b}').collect();
        let items: Vec<RoadmapItem> =
            serde_json::from_str(&cleaned).map_err(|e| CoreError::wrap(OP, e))?;

        let hash = hex::encode(Sha256::digest(cleaned.as_bytes()));

        let changed = {
            let memory = self.memory.read();
            memory
                .as_ref()
                .filter(|c| c.lang == lang)
                .map_or(true, |c| c.hash != hash)
        };

        *self.memory.write() = Some(MemoryCache {
            items: items.clone(),
            hash: hash.clone(),
            etag: etag.clone(),
            lang: lang.to_string(),
            refreshed: Instant::now(),
        });

        if changed {
            self.store
                .save(&RoadmapSnapshot {
                    items: items.clone(),
                    hash,
                    etag,
                    lang: lang.to_string(),
                    fetched_at: chrono::Utc::now(),
                })
                .await?;
            self.emitter.emit(AppEvent::RoadmapUpdate { items });
            tracing::info!(target: "downpour.roadmap", %url, "roadmap updated");
        }

        Ok(())
    }
}
