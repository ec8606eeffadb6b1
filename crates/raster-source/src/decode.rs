//! TIFF band decoding: window extraction with decode-time downsampling.
//!
//! Cloud-optimized GeoTIFFs carry reduced-resolution overview images as
//! additional IFDs after the full-resolution band. When the caller asks for
//! an output smaller than the read window, the decoder picks the smallest
//! overview that still meets the requested resolution and decodes that,
//! rather than decoding the full band and discarding pixels.

use std::io::Cursor;

use nbr_common::{NbrError, NbrResult};
use tiff::decoder::{Decoder, DecodingResult};
use tracing::debug;

use crate::window::PixelWindow;

/// Flat row-major sample buffer for one band over one window.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

impl SampleBuffer {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Decode one band of a TIFF into a `target_w x target_h` sample buffer
/// covering `window` (expressed in the full-resolution pixel grid of
/// `full_w x full_h`).
///
/// Only the first raster band is read; extra samples per pixel are skipped.
/// Decoding happens at the best-fitting overview level, then the window is
/// cropped and box-averaged to exactly the requested output size. Samples
/// equal to zero are treated as missing and excluded from block averages.
pub fn decode_band_window(
    url: &str,
    bytes: &[u8],
    window: &PixelWindow,
    target_w: u32,
    target_h: u32,
    full_w: u32,
    full_h: u32,
) -> NbrResult<SampleBuffer> {
    if target_w == 0 || target_h == 0 {
        return Err(NbrError::InputDecode {
            url: url.to_string(),
            message: "requested zero-size output".to_string(),
        });
    }

    let decode_err = |message: String| NbrError::InputDecode {
        url: url.to_string(),
        message,
    };

    let mut decoder =
        Decoder::new(Cursor::new(bytes)).map_err(|e| decode_err(e.to_string()))?;

    // Enumerate IFD dimensions: index 0 is the full band, the rest overviews.
    let mut levels: Vec<(u32, u32)> = Vec::new();
    loop {
        let dims = decoder
            .dimensions()
            .map_err(|e| decode_err(e.to_string()))?;
        levels.push(dims);
        if !decoder.more_images() {
            break;
        }
        decoder.next_image().map_err(|e| decode_err(e.to_string()))?;
    }

    let level = select_level(&levels, window, target_w, target_h, full_w, full_h);
    let (level_w, level_h) = levels[level];

    decoder
        .seek_to_image(level)
        .map_err(|e| decode_err(e.to_string()))?;
    let image = decoder
        .read_image()
        .map_err(|e| decode_err(e.to_string()))?;
    let samples = samples_to_f32(image);

    let pixel_count = level_w as usize * level_h as usize;
    if pixel_count == 0 || samples.len() < pixel_count {
        return Err(decode_err(format!(
            "decoded {} samples for a {}x{} image",
            samples.len(),
            level_w,
            level_h
        )));
    }
    // Multi-sample rasters: keep band 1, skip the rest.
    let samples_per_pixel = samples.len() / pixel_count;

    let level_window = window.scale_to((full_w, full_h), (level_w, level_h));
    debug!(
        url,
        level,
        level_w,
        level_h,
        ?level_window,
        target_w,
        target_h,
        "decoding band window"
    );

    Ok(extract_window(
        &samples,
        samples_per_pixel,
        level_w,
        &level_window,
        target_w,
        target_h,
    ))
}

/// Pick the smallest overview whose window footprint still covers the
/// requested output resolution in both dimensions. Level 0 always qualifies.
fn select_level(
    levels: &[(u32, u32)],
    window: &PixelWindow,
    target_w: u32,
    target_h: u32,
    full_w: u32,
    full_h: u32,
) -> usize {
    let mut best = 0;
    for (index, &(level_w, level_h)) in levels.iter().enumerate().skip(1) {
        if level_w == 0 || level_h == 0 || level_w > full_w || level_h > full_h {
            continue;
        }
        let scaled_w = window.width() as u64 * level_w as u64 / full_w as u64;
        let scaled_h = window.height() as u64 * level_h as u64 / full_h as u64;
        if scaled_w >= target_w as u64 && scaled_h >= target_h as u64 {
            best = index;
        }
    }
    best
}

/// Convert any decoded sample representation to f32.
fn samples_to_f32(image: DecodingResult) -> Vec<f32> {
    match image {
        DecodingResult::U8(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::U16(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::I16(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::F16(v) => v.into_iter().map(|s| s.to_f32()).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|s| s as f32).collect(),
    }
}

/// Crop `window` out of a decoded level and box-average it down to
/// `target_w x target_h`. Zero samples are missing data: they are excluded
/// from block means, and an all-missing block stays zero.
fn extract_window(
    samples: &[f32],
    samples_per_pixel: usize,
    level_w: u32,
    window: &PixelWindow,
    target_w: u32,
    target_h: u32,
) -> SampleBuffer {
    let region_w = window.width() as u64;
    let region_h = window.height() as u64;
    let mut data = Vec::with_capacity(target_w as usize * target_h as usize);

    for oy in 0..target_h as u64 {
        let sy0 = window.top as u64 + oy * region_h / target_h as u64;
        let sy1 = (window.top as u64 + ((oy + 1) * region_h).div_ceil(target_h as u64))
            .max(sy0 + 1);

        for ox in 0..target_w as u64 {
            let sx0 = window.left as u64 + ox * region_w / target_w as u64;
            let sx1 = (window.left as u64 + ((ox + 1) * region_w).div_ceil(target_w as u64))
                .max(sx0 + 1);

            let mut sum = 0.0f64;
            let mut count = 0u32;
            for sy in sy0..sy1 {
                let row = sy as usize * level_w as usize;
                for sx in sx0..sx1 {
                    let sample = samples[(row + sx as usize) * samples_per_pixel];
                    if sample != 0.0 {
                        sum += sample as f64;
                        count += 1;
                    }
                }
            }

            data.push(if count == 0 {
                0.0
            } else {
                (sum / count as f64) as f32
            });
        }
    }

    SampleBuffer {
        data,
        width: target_w,
        height: target_h,
    }
}
