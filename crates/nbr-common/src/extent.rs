//! Working-projection detection and normalization for request extents.
//!
//! The map UI hands the pipeline an extent in whatever projection the map is
//! running in. In practice that is either Web Mercator meters (EPSG:3857) or
//! plain geographic degrees (EPSG:4326), and the request does not say which.
//! Detection is a numeric-range heuristic: coordinates beyond the geographic
//! domain cannot be degrees.

use tracing::warn;

use crate::BoundingBox;

/// Earth radius used by the spherical Web Mercator projection, in meters.
const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

/// Coordinate reference kinds the pipeline can receive extents in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsKind {
    /// Geographic degrees (EPSG:4326).
    Geographic,
    /// Spherical Web Mercator meters (EPSG:3857).
    WebMercator,
}

/// Detect the coordinate reference of an extent by magnitude.
///
/// Any coordinate with |x| > 180 or |y| > 90 is impossible in degrees, so the
/// extent is taken to be Web Mercator meters. Non-finite coordinates are
/// unclassifiable; they fall back to [`CrsKind::Geographic`] with a warning,
/// and the window resolver's full-image fallback bounds the damage downstream.
pub fn detect_crs(extent: &BoundingBox) -> CrsKind {
    if !extent.is_finite() {
        warn!(
            extent = %extent.cache_key(),
            "extent has non-finite coordinates, assuming geographic degrees"
        );
        return CrsKind::Geographic;
    }

    let beyond_degrees = extent.min_x.abs() > 180.0
        || extent.max_x.abs() > 180.0
        || extent.min_y.abs() > 90.0
        || extent.max_y.abs() > 90.0;

    if beyond_degrees {
        CrsKind::WebMercator
    } else {
        CrsKind::Geographic
    }
}

/// Normalize an extent to geographic degrees (EPSG:4326).
///
/// Returns the normalized extent together with the detected source CRS so the
/// caller can transform results back into the working projection.
pub fn normalize_extent(extent: &BoundingBox) -> (BoundingBox, CrsKind) {
    match detect_crs(extent) {
        CrsKind::Geographic => (*extent, CrsKind::Geographic),
        CrsKind::WebMercator => {
            let (min_x, min_y) = mercator_to_lonlat(extent.min_x, extent.min_y);
            let (max_x, max_y) = mercator_to_lonlat(extent.max_x, extent.max_y);
            (BoundingBox::new(min_x, min_y, max_x, max_y), CrsKind::WebMercator)
        }
    }
}

/// Transform a geographic-degree extent back into the given working projection.
pub fn denormalize_extent(extent: &BoundingBox, crs: CrsKind) -> BoundingBox {
    match crs {
        CrsKind::Geographic => *extent,
        CrsKind::WebMercator => {
            let (min_x, min_y) = lonlat_to_mercator(extent.min_x, extent.min_y);
            let (max_x, max_y) = lonlat_to_mercator(extent.max_x, extent.max_y);
            BoundingBox::new(min_x, min_y, max_x, max_y)
        }
    }
}

/// Spherical Web Mercator meters to longitude/latitude degrees.
fn mercator_to_lonlat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / WEB_MERCATOR_RADIUS).to_degrees();
    let lat = ((y / WEB_MERCATOR_RADIUS).sinh().atan()).to_degrees();
    (lon, lat)
}

/// Longitude/latitude degrees to spherical Web Mercator meters.
fn lonlat_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let x = lon.to_radians() * WEB_MERCATOR_RADIUS;
    // Clamp away from the poles where the projection diverges
    let lat = lat.clamp(-89.9999, 89.9999);
    let y = (lat.to_radians() / 2.0 + std::f64::consts::FRAC_PI_4).tan().ln() * WEB_MERCATOR_RADIUS;
    (x, y)
}
