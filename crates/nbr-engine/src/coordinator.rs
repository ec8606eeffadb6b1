//! The request coordinator: cache, deduplication and progress signalling.
//!
//! Per-key lifecycle: `Idle -> Fetching -> Computing -> {Cached, Failed}`.
//! A cache hit short-circuits straight from `Idle` to `Cached`; a failed
//! attempt leaves the key eligible for a fresh request with no backoff.
//!
//! Concurrency rules:
//! - identical keys requested while a computation is in flight join that
//!   computation instead of starting another;
//! - a new computation bumps the generation counter and takes over the
//!   single worker slot; a superseded computation still finishes and
//!   installs its cache entry, but its progress and completion signals are
//!   discarded (last-writer-wins on the slot, not on the cache);
//! - only the coordinator mutates the cache, and entries are installed
//!   atomically under one lock acquisition.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nbr_common::{
    denormalize_extent, detect_crs, normalize_extent, BoundingBox, NbrError, NbrResult,
};
use nbr_renderer::{render_severity, SeverityImage};
use raster_source::{resolve_window, BandFetcher, BandImage, HttpBandFetcher};
use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::band_math::NO_DATA;
use crate::cache::{computation_key, CacheEntry, CacheStats, ResultCache};
use crate::downsample::{apply_factor, downsample_factor};
use crate::worker::{spawn_band_math, WorkerHandle, WorkerMessage, WorkerRequest};

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Per-band HTTP request timeout.
    pub request_timeout: Duration,
    /// Result cache bound. `None` keeps every entry for the session; set a
    /// capacity to opt into LRU eviction instead.
    pub cache_capacity: Option<NonZeroUsize>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            cache_capacity: None,
        }
    }
}

/// Observable computation state for UI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComputeStatus {
    pub loading: bool,
    /// Pixels completed, 0-100.
    pub progress: u8,
}

impl Default for ComputeStatus {
    fn default() -> Self {
        Self {
            loading: false,
            progress: 0,
        }
    }
}

/// A displayable computation result.
#[derive(Debug, Clone)]
pub struct RasterResult {
    /// The cached computation this result was rendered from.
    pub entry: Arc<CacheEntry>,
    /// Severity-colored RGBA layer.
    pub image: SeverityImage,
    /// Layer extent in the caller's working projection.
    pub display_extent: BoundingBox,
}

impl RasterResult {
    /// Valid-value range for legend display.
    pub fn value_range(&self) -> (f32, f32) {
        (self.entry.min, self.entry.max)
    }
}

type ComputationOutcome = Result<Arc<CacheEntry>, NbrError>;

/// Async entry point for NBR computations.
pub struct NbrCoordinator {
    fetcher: Arc<dyn BandFetcher>,
    cache: Mutex<ResultCache>,
    /// Opened band rasters keyed by raw URL, so panning to a new extent over
    /// the same fire does not refetch the imagery.
    band_cache: Mutex<HashMap<String, Arc<BandImage>>>,
    inflight: Mutex<HashMap<String, broadcast::Sender<ComputationOutcome>>>,
    generation: AtomicU64,
    worker_slot: Mutex<Option<JoinHandle<()>>>,
    current_key: Mutex<Option<String>>,
    status_tx: watch::Sender<ComputeStatus>,
}

impl NbrCoordinator {
    /// Coordinator fetching bands over HTTP(S).
    pub fn new(config: CoordinatorConfig) -> NbrResult<Self> {
        let fetcher = Arc::new(HttpBandFetcher::new(config.request_timeout)?);
        Ok(Self::with_fetcher(fetcher, config))
    }

    /// Coordinator with a caller-supplied band source.
    pub fn with_fetcher(fetcher: Arc<dyn BandFetcher>, config: CoordinatorConfig) -> Self {
        let cache = match config.cache_capacity {
            Some(capacity) => ResultCache::with_capacity(capacity),
            None => ResultCache::unbounded(),
        };
        let (status_tx, _) = watch::channel(ComputeStatus::default());

        Self {
            fetcher,
            cache: Mutex::new(cache),
            band_cache: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            worker_slot: Mutex::new(None),
            current_key: Mutex::new(None),
            status_tx,
        }
    }

    /// Subscribe to loading/progress state.
    pub fn status(&self) -> watch::Receiver<ComputeStatus> {
        self.status_tx.subscribe()
    }

    /// Snapshot of result-cache statistics.
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.lock().await.stats()
    }

    /// Key of the currently displayed layer, if any.
    pub async fn current_key(&self) -> Option<String> {
        self.current_key.lock().await.clone()
    }

    /// Request the severity layer for a band pair over an extent.
    ///
    /// With `visible` false the displayed layer is released and no
    /// computation happens. Otherwise a cached result returns immediately,
    /// an in-flight computation for the same key is joined, and only a truly
    /// new key starts a computation.
    pub async fn request(
        &self,
        nir_url: &str,
        swir_url: &str,
        extent: &BoundingBox,
        visible: bool,
    ) -> NbrResult<Option<RasterResult>> {
        if !visible {
            self.release_layer().await;
            return Ok(None);
        }

        let key = computation_key(nir_url, swir_url, extent);

        if let Some(entry) = self.cache.lock().await.get(&key) {
            debug!(%key, "serving cached NBR result");
            *self.current_key.lock().await = Some(key);
            return Ok(Some(self.present(entry, extent)));
        }

        enum Role {
            Leader(broadcast::Sender<ComputationOutcome>),
            Joiner(broadcast::Receiver<ComputationOutcome>),
        }

        let role = {
            let mut inflight = self.inflight.lock().await;
            match inflight.get(&key) {
                Some(tx) => Role::Joiner(tx.subscribe()),
                None => {
                    let (tx, _) = broadcast::channel(1);
                    inflight.insert(key.clone(), tx.clone());
                    Role::Leader(tx)
                }
            }
        };

        let outcome = match role {
            Role::Joiner(mut rx) => {
                debug!(%key, "joining in-flight computation");
                rx.recv()
                    .await
                    .map_err(|_| NbrError::Internal("in-flight computation dropped".to_string()))?
            }
            Role::Leader(tx) => {
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                let outcome = self
                    .run_computation(&key, nir_url, swir_url, extent, generation)
                    .await;

                if let Ok(entry) = &outcome {
                    // Superseded computations install their entry too; only
                    // their signals are dropped.
                    self.cache.lock().await.insert(key.clone(), entry.clone());
                }
                self.update_status(
                    generation,
                    ComputeStatus {
                        loading: false,
                        progress: if outcome.is_ok() { 100 } else { 0 },
                    },
                );

                // Cache first, then unregister: late joiners either found the
                // in-flight sender or will find the cache entry.
                self.inflight.lock().await.remove(&key);
                let _ = tx.send(outcome.clone());
                outcome
            }
        };

        let entry = outcome?;
        *self.current_key.lock().await = Some(key);
        Ok(Some(self.present(entry, extent)))
    }

    /// Run one computation end to end: open both bands, resolve windows,
    /// decode, and hand the buffers to the band-math worker.
    async fn run_computation(
        &self,
        key: &str,
        nir_url: &str,
        swir_url: &str,
        extent: &BoundingBox,
        generation: u64,
    ) -> ComputationOutcome {
        info!(key, "starting NBR computation");
        self.update_status(
            generation,
            ComputeStatus {
                loading: true,
                progress: 0,
            },
        );

        // Fetching
        let (extent_deg, _) = normalize_extent(extent);
        let (nir, swir) = tokio::try_join!(self.open_band(nir_url), self.open_band(swir_url))?;

        let window = resolve_window(&extent_deg, nir.bbox(), nir.width(), nir.height());
        let swir_window = window.scale_to(nir.dimensions(), swir.dimensions());

        let factor = downsample_factor(window.width(), window.height());
        let (target_w, target_h) = apply_factor(window.width(), window.height(), factor);
        debug!(key, ?window, ?swir_window, factor, target_w, target_h, "resolved read windows");

        let (nir_buf, swir_buf) = tokio::try_join!(
            nir.read_window(&window, target_w, target_h),
            swir.read_window(&swir_window, target_w, target_h),
        )?;

        // Computing
        let WorkerHandle { mut messages, join } = spawn_band_math(WorkerRequest {
            nir_data: nir_buf.data,
            swir_data: swir_buf.data,
            width: target_w,
            height: target_h,
            no_data_value: NO_DATA,
        });

        // Last-writer-wins on the worker slot: replacing the handle detaches
        // any previous worker; its kernel runs on but nothing applies its
        // messages here.
        *self.worker_slot.lock().await = Some(join);

        let mut grid = None;
        while let Some(message) = messages.recv().await {
            match message {
                WorkerMessage::Progress { percent } => self.update_status(
                    generation,
                    ComputeStatus {
                        loading: true,
                        progress: percent,
                    },
                ),
                WorkerMessage::Complete { grid: finished } => {
                    grid = Some(finished);
                    break;
                }
            }
        }
        let grid = grid
            .ok_or_else(|| NbrError::Internal("band-math worker exited without a result".to_string()))?;

        let entry = Arc::new(CacheEntry {
            values: Arc::new(grid.values),
            width: grid.width,
            height: grid.height,
            extent: nir.window_extent(&window),
            min: grid.min,
            max: grid.max,
        });

        info!(
            key,
            width = entry.width,
            height = entry.height,
            min = entry.min,
            max = entry.max,
            "NBR computation complete"
        );
        Ok(entry)
    }

    /// Open a band raster, serving repeat URLs from the imagery cache.
    async fn open_band(&self, url: &str) -> NbrResult<Arc<BandImage>> {
        if let Some(image) = self.band_cache.lock().await.get(url) {
            debug!(url, "serving cached band image");
            return Ok(image.clone());
        }

        let image = Arc::new(BandImage::open(self.fetcher.as_ref(), url).await?);

        let mut cache = self.band_cache.lock().await;
        // Double-check after reacquiring: a concurrent open may have won
        if let Some(existing) = cache.get(url) {
            return Ok(existing.clone());
        }
        cache.insert(url.to_string(), image.clone());
        Ok(image)
    }

    /// Rasterize a cache entry for display in the caller's projection.
    fn present(&self, entry: Arc<CacheEntry>, request_extent: &BoundingBox) -> RasterResult {
        let image = render_severity(&entry.values, entry.width, entry.height, NO_DATA);
        let display_extent = denormalize_extent(&entry.extent, detect_crs(request_extent));

        RasterResult {
            entry,
            image,
            display_extent,
        }
    }

    /// Apply a status update unless its computation has been superseded.
    fn update_status(&self, generation: u64, status: ComputeStatus) {
        if self.generation.load(Ordering::SeqCst) == generation {
            self.status_tx.send_replace(status);
        }
    }

    /// Drop the displayed layer and clear loading state.
    async fn release_layer(&self) {
        let mut current = self.current_key.lock().await;
        if current.take().is_some() {
            debug!("released displayed severity layer");
        }
        self.status_tx.send_replace(ComputeStatus::default());
    }
}
