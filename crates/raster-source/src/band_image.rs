//! Opened remote band rasters.

use std::io::Cursor;

use bytes::Bytes;
use nbr_common::{BoundingBox, NbrError, NbrResult};
use tiff::decoder::Decoder;
use tiff::tags::Tag;
use tracing::debug;

use crate::decode::{self, SampleBuffer};
use crate::fetch::BandFetcher;
use crate::window::PixelWindow;

// GeoTIFF georeferencing tags (not named in the tiff crate's Tag enum)
const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;

/// One opened remote single-band raster.
///
/// Immutable once opened: dimensions and the geographic bounding box are
/// parsed from the GeoTIFF header up front, the raw bytes are retained for
/// window reads during the computation, and the handle is dropped afterward.
#[derive(Debug)]
pub struct BandImage {
    url: String,
    width: u32,
    height: u32,
    bbox: BoundingBox,
    bytes: Bytes,
}

impl BandImage {
    /// Fetch and open the raster at `url`.
    pub async fn open(fetcher: &dyn BandFetcher, url: &str) -> NbrResult<Self> {
        let bytes = fetcher.fetch(url).await?;
        Self::from_bytes(url, bytes)
    }

    /// Open a raster from already-fetched bytes.
    pub fn from_bytes(url: &str, bytes: Bytes) -> NbrResult<Self> {
        let (width, height, bbox) = read_metadata(url, &bytes)?;
        debug!(url, width, height, bbox = %bbox.cache_key(), "opened band image");

        Ok(Self {
            url: url.to_string(),
            width,
            height,
            bbox,
            bytes,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Geographic bounding box of the raster, in degrees.
    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// The geographic extent covered by a pixel window of this raster.
    pub fn window_extent(&self, window: &PixelWindow) -> BoundingBox {
        let deg_per_px_x = self.bbox.width() / self.width as f64;
        let deg_per_px_y = self.bbox.height() / self.height as f64;

        BoundingBox::new(
            self.bbox.min_x + window.left as f64 * deg_per_px_x,
            self.bbox.max_y - window.bottom as f64 * deg_per_px_y,
            self.bbox.min_x + window.right as f64 * deg_per_px_x,
            self.bbox.max_y - window.top as f64 * deg_per_px_y,
        )
    }

    /// Read `window` as a `target_w x target_h` sample buffer.
    ///
    /// Decoding is CPU-bound and runs on the blocking pool so the caller's
    /// task stays responsive.
    pub async fn read_window(
        &self,
        window: &PixelWindow,
        target_w: u32,
        target_h: u32,
    ) -> NbrResult<SampleBuffer> {
        let url = self.url.clone();
        let bytes = self.bytes.clone();
        let window = *window;
        let (full_w, full_h) = (self.width, self.height);

        tokio::task::spawn_blocking(move || {
            decode::decode_band_window(&url, &bytes, &window, target_w, target_h, full_w, full_h)
        })
        .await
        .map_err(|e| NbrError::Internal(format!("decode task panicked: {}", e)))?
    }
}

/// Parse dimensions and the geographic bounding box from the GeoTIFF header.
///
/// The bounding box comes from the ModelTiepoint + ModelPixelScale tag pair;
/// rasters without them cannot be positioned and are rejected.
fn read_metadata(url: &str, bytes: &[u8]) -> NbrResult<(u32, u32, BoundingBox)> {
    let unsupported = |message: String| NbrError::UnsupportedRaster {
        url: url.to_string(),
        message,
    };

    let mut decoder = Decoder::new(Cursor::new(bytes)).map_err(|e| NbrError::InputDecode {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let (width, height) = decoder.dimensions().map_err(|e| NbrError::InputDecode {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    if width == 0 || height == 0 {
        return Err(unsupported(format!("empty raster ({}x{})", width, height)));
    }

    let scale = decoder
        .find_tag(Tag::Unknown(TAG_MODEL_PIXEL_SCALE))
        .ok()
        .flatten()
        .and_then(|v| v.into_f64_vec().ok())
        .ok_or_else(|| unsupported("missing ModelPixelScale tag".to_string()))?;
    let tiepoint = decoder
        .find_tag(Tag::Unknown(TAG_MODEL_TIEPOINT))
        .ok()
        .flatten()
        .and_then(|v| v.into_f64_vec().ok())
        .ok_or_else(|| unsupported("missing ModelTiepoint tag".to_string()))?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(unsupported(format!(
            "malformed georeferencing tags (scale {} values, tiepoint {} values)",
            scale.len(),
            tiepoint.len()
        )));
    }

    // Tiepoint maps raster position (i, j) to model position (x, y); the
    // anchor is almost always the upper-left corner (0, 0).
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];

    let bbox = BoundingBox::new(
        origin_x,
        origin_y - height as f64 * scale[1],
        origin_x + width as f64 * scale[0],
        origin_y,
    );

    Ok((width, height, bbox))
}
