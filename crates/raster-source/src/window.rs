//! Pixel-window resolution against a georeferenced raster grid.

use nbr_common::BoundingBox;
use tracing::debug;

/// A rectangular read window into a raster's pixel grid.
///
/// Bounds are clamped to `[0, width] x [0, height]`. A window is only valid
/// when `right > left` and `bottom > top`; constructors that could produce a
/// degenerate window fall back to the full-image window instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl PixelWindow {
    /// The window covering an entire `width x height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width,
            bottom: height,
        }
    }

    /// Window width in pixels.
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    /// Window height in pixels.
    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// Total pixel count of the window.
    pub fn pixel_count(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    fn is_degenerate(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// Derive the equivalent window in another image's pixel grid by scaling
    /// each bound by the ratio of the two images' dimensions.
    ///
    /// This deliberately does not redo the geographic transform: the second
    /// band inherits whatever clamping or fallback was already applied when
    /// this window was resolved against the first band.
    pub fn scale_to(&self, from: (u32, u32), to: (u32, u32)) -> PixelWindow {
        let (from_w, from_h) = from;
        let (to_w, to_h) = to;
        if from_w == 0 || from_h == 0 {
            return PixelWindow::full(to_w, to_h);
        }

        let sx = to_w as f64 / from_w as f64;
        let sy = to_h as f64 / from_h as f64;

        let scaled = PixelWindow {
            left: ((self.left as f64 * sx).floor() as u32).min(to_w),
            top: ((self.top as f64 * sy).floor() as u32).min(to_h),
            right: ((self.right as f64 * sx).ceil() as u32).min(to_w),
            bottom: ((self.bottom as f64 * sy).ceil() as u32).min(to_h),
        };

        if scaled.is_degenerate() {
            debug!(?scaled, to_w, to_h, "scaled window degenerate, using full image");
            PixelWindow::full(to_w, to_h)
        } else {
            scaled
        }
    }
}

/// Resolve a geographic extent (already in degrees) to a pixel window in a
/// raster whose bounding box covers `image_bbox` at `width x height` pixels.
///
/// Pixel row 0 corresponds to the raster's northern edge. Left/top bounds are
/// floored and clamped to 0; right/bottom bounds are ceiled and clamped to the
/// image dimensions. A degenerate result (extent disjoint from the raster, or
/// collapsed to zero pixels) falls back to the full-image window: the map
/// extent is always "valid enough" to approximate with the whole image.
pub fn resolve_window(
    extent: &BoundingBox,
    image_bbox: &BoundingBox,
    width: u32,
    height: u32,
) -> PixelWindow {
    let bb_w = image_bbox.width();
    let bb_h = image_bbox.height();
    if bb_w <= 0.0 || bb_h <= 0.0 || width == 0 || height == 0 {
        return PixelWindow::full(width, height);
    }

    let px_left = width as f64 * (extent.min_x - image_bbox.min_x) / bb_w;
    let px_right = width as f64 * (extent.max_x - image_bbox.min_x) / bb_w;
    // Row 0 is the geographic maximum latitude
    let px_top = height as f64 * (image_bbox.max_y - extent.max_y) / bb_h;
    let px_bottom = height as f64 * (image_bbox.max_y - extent.min_y) / bb_h;

    let window = PixelWindow {
        left: px_left.floor().max(0.0).min(width as f64) as u32,
        top: px_top.floor().max(0.0).min(height as f64) as u32,
        right: px_right.ceil().max(0.0).min(width as f64) as u32,
        bottom: px_bottom.ceil().max(0.0).min(height as f64) as u32,
    };

    if window.is_degenerate() {
        debug!(
            ?window,
            extent = %extent.cache_key(),
            "resolved window degenerate, using full image"
        );
        PixelWindow::full(width, height)
    } else {
        window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1-degree raster, 100x100 pixels over (-122..-121, 39..40)
    fn image_bbox() -> BoundingBox {
        BoundingBox::new(-122.0, 39.0, -121.0, 40.0)
    }

    #[test]
    fn test_resolve_interior_extent() {
        let extent = BoundingBox::new(-121.75, 39.25, -121.25, 39.75);
        let window = resolve_window(&extent, &image_bbox(), 100, 100);

        assert_eq!(window.left, 25);
        assert_eq!(window.right, 75);
        // max_y=39.75 is 0.25 degrees below the northern edge
        assert_eq!(window.top, 25);
        assert_eq!(window.bottom, 75);
    }

    #[test]
    fn test_resolve_clamps_overhanging_extent() {
        let extent = BoundingBox::new(-123.0, 38.0, -121.5, 39.5);
        let window = resolve_window(&extent, &image_bbox(), 100, 100);

        assert_eq!(window.left, 0);
        assert_eq!(window.right, 50);
        assert_eq!(window.top, 50);
        assert_eq!(window.bottom, 100);
    }

    #[test]
    fn test_resolve_disjoint_extent_falls_back_to_full_image() {
        let extent = BoundingBox::new(10.0, 10.0, 11.0, 11.0);
        let window = resolve_window(&extent, &image_bbox(), 100, 100);
        assert_eq!(window, PixelWindow::full(100, 100));
    }

    #[test]
    fn test_resolve_fractional_bounds_floor_and_ceil() {
        // 0.303 degrees from the west edge at 100 px/deg -> left floor(30.3)=30
        let extent = BoundingBox::new(-121.697, 39.1, -121.303, 39.9);
        let window = resolve_window(&extent, &image_bbox(), 100, 100);

        assert_eq!(window.left, 30);
        assert_eq!(window.right, 70);
        assert_eq!(window.top, 10);
        assert_eq!(window.bottom, 90);
    }

    #[test]
    fn test_scale_to_other_band_grid() {
        // 10m band window scaled to a 20m band (half the pixels each way)
        let window = PixelWindow {
            left: 25,
            top: 31,
            right: 75,
            bottom: 75,
        };
        let scaled = window.scale_to((100, 100), (50, 50));

        assert_eq!(scaled.left, 12); // floor(12.5)
        assert_eq!(scaled.top, 15); // floor(15.5)
        assert_eq!(scaled.right, 38); // ceil(37.5)
        assert_eq!(scaled.bottom, 38); // ceil(37.5)
    }

    #[test]
    fn test_scale_to_tiny_target_stays_valid() {
        let window = PixelWindow {
            left: 0,
            top: 0,
            right: 1,
            bottom: 1,
        };
        // A 1px window scaled to a much coarser grid keeps at least one pixel
        let scaled = window.scale_to((10_000, 10_000), (4, 4));
        assert!(scaled.width() > 0 && scaled.height() > 0);
    }

    #[test]
    fn test_pixel_count() {
        let window = PixelWindow {
            left: 0,
            top: 0,
            right: 2500,
            bottom: 2000,
        };
        assert_eq!(window.pixel_count(), 5_000_000);
    }
}
