//! Normalized Burn Ratio computation engine.
//!
//! The pipeline, in dependency order:
//!
//! - [`downsample`]: output-size policy bounding compute cost
//! - [`band_math`]: the per-pixel NBR kernel with no-data handling
//! - [`worker`]: message-passing background execution of the kernel
//! - [`cache`]: completed results keyed by computation inputs
//! - [`coordinator`]: the async entry point tying it all together —
//!   cache lookups, in-flight deduplication, progress signalling
//!
//! A map client calls [`NbrCoordinator::request`] with the two band URLs and
//! the viewed extent; everything else is internal.

pub mod band_math;
pub mod cache;
pub mod coordinator;
pub mod downsample;
pub mod worker;

pub use band_math::{compute_nbr, nbr_pixel, NbrGrid, NO_DATA};
pub use cache::{computation_key, CacheEntry, CacheStats, ResultCache};
pub use coordinator::{ComputeStatus, CoordinatorConfig, NbrCoordinator, RasterResult};
pub use downsample::{apply_factor, downsample_factor};
pub use worker::{spawn_band_math, WorkerHandle, WorkerMessage, WorkerRequest};
