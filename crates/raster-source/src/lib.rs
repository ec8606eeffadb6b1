//! Remote single-band raster access for the burn-severity pipeline.
//!
//! A [`BandImage`] is one opened remote GeoTIFF band: its pixel dimensions,
//! its geographic bounding box, and a way to read a rectangular pixel window
//! (optionally pre-scaled to a requested output size) as a flat sample
//! buffer. Fetching goes through the [`BandFetcher`] trait so tests can
//! substitute in-memory fixtures for HTTP.

pub mod band_image;
pub mod decode;
pub mod fetch;
pub mod window;

pub use band_image::BandImage;
pub use decode::SampleBuffer;
pub use fetch::{BandFetcher, HttpBandFetcher};
pub use window::{resolve_window, PixelWindow};
