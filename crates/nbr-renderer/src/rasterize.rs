//! RGBA rasterization of classified NBR grids.

use rayon::prelude::*;
use tracing::debug;

use crate::severity::{classify, Color};

/// A rendered severity layer: row-major RGBA pixels plus dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct SeverityImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Pixels that classified to no class (sentinel or out of range).
    pub transparent_pixels: u64,
}

impl SeverityImage {
    /// Encode this layer as an RGBA PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, String> {
        crate::png::create_png(&self.pixels, self.width as usize, self.height as usize)
    }
}

/// Render an NBR value grid as a severity-colored RGBA image.
///
/// Each value maps through the ordered severity thresholds to a fixed color;
/// there is no interpolation between classes. Sentinel and out-of-range
/// values render fully transparent.
pub fn render_severity(values: &[f32], width: u32, height: u32, no_data: f32) -> SeverityImage {
    let width_usize = width as usize;
    let mut pixels = vec![0u8; width_usize * height as usize * 4];

    let transparent_pixels: u64 = pixels
        .par_chunks_mut(width_usize * 4)
        .enumerate()
        .map(|(y, row)| {
            let mut transparent = 0u64;
            let row_start = y * width_usize;

            for x in 0..width_usize {
                let idx = row_start + x;
                let color = match values.get(idx).and_then(|&v| classify(v, no_data)) {
                    Some(class) => class.color(),
                    None => {
                        transparent += 1;
                        Color::transparent()
                    }
                };

                let px = x * 4;
                row[px] = color.r;
                row[px + 1] = color.g;
                row[px + 2] = color.b;
                row[px + 3] = color.a;
            }

            transparent
        })
        .sum();

    debug!(width, height, transparent_pixels, "rendered severity layer");

    SeverityImage {
        pixels,
        width,
        height,
        transparent_pixels,
    }
}
