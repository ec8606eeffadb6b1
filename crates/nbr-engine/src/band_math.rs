//! The per-pixel NBR kernel.
//!
//! NBR = (NIR - SWIR) / (NIR + SWIR) over reflectance-scaled samples. The
//! raw-sample guards encode the sensor's conventions: a digital number of 0
//! is fill, values above 65000 are saturation/fill codes, and reflectance is
//! stored scaled by 10000.

/// Sentinel for pixels with no computable NBR value.
pub const NO_DATA: f32 = -9999.0;

/// Raw digital numbers above this are sensor fill/saturation codes.
const MAX_VALID_SAMPLE: f32 = 65000.0;

/// Scale factor from raw digital numbers to surface reflectance.
const REFLECTANCE_SCALE: f32 = 0.0001;

/// Denominators at or below this are numerically meaningless.
const MIN_DENOMINATOR: f32 = 0.001;

/// A computed NBR grid with the observed range of valid values.
#[derive(Debug, Clone)]
pub struct NbrGrid {
    pub values: Vec<f32>,
    pub width: u32,
    pub height: u32,
    /// Minimum valid NBR value, or -1.0 if no pixel was valid.
    pub min: f32,
    /// Maximum valid NBR value, or 1.0 if no pixel was valid.
    pub max: f32,
}

/// Compute the NBR value for one pixel from raw band samples.
///
/// Returns `no_data` for fill/saturated samples, vanishing denominators,
/// and results outside `[-1, 1]`.
pub fn nbr_pixel(raw_nir: f32, raw_swir: f32, no_data: f32) -> f32 {
    if raw_nir == 0.0
        || raw_swir == 0.0
        || raw_nir > MAX_VALID_SAMPLE
        || raw_swir > MAX_VALID_SAMPLE
    {
        return no_data;
    }

    let nir = raw_nir * REFLECTANCE_SCALE;
    let swir = raw_swir * REFLECTANCE_SCALE;

    let denom = nir + swir;
    if denom <= MIN_DENOMINATOR {
        return no_data;
    }

    let value = (nir - swir) / denom;
    if !(-1.0..=1.0).contains(&value) {
        return no_data;
    }

    value
}

/// Compute an NBR grid from two equal-length raw sample buffers.
///
/// `on_progress` receives the integer percentage of pixels completed; it is
/// called once per processed chunk with a strictly increasing value, ending
/// at 100. Missing samples (short buffers) are treated as fill.
pub fn compute_nbr(
    nir: &[f32],
    swir: &[f32],
    width: u32,
    height: u32,
    no_data: f32,
    mut on_progress: impl FnMut(u8),
) -> NbrGrid {
    let total = width as usize * height as usize;
    let mut values = Vec::with_capacity(total);

    let mut min = f32::MAX;
    let mut max = f32::MIN;
    let mut any_valid = false;

    // Chunked so progress lands roughly every 2% even on huge grids.
    let chunk = (total / 50).max(4096);
    let mut last_percent = 0u8;

    for start in (0..total).step_by(chunk) {
        let end = (start + chunk).min(total);
        for idx in start..end {
            let raw_nir = nir.get(idx).copied().unwrap_or(0.0);
            let raw_swir = swir.get(idx).copied().unwrap_or(0.0);

            let value = nbr_pixel(raw_nir, raw_swir, no_data);
            if value != no_data {
                any_valid = true;
                if value < min {
                    min = value;
                }
                if value > max {
                    max = value;
                }
            }
            values.push(value);
        }

        let percent = (end * 100 / total.max(1)) as u8;
        if percent > last_percent {
            last_percent = percent;
            on_progress(percent);
        }
    }

    if total == 0 {
        on_progress(100);
    }

    // All-sentinel grids get a fixed fallback range rather than MAX/MIN junk.
    let (min, max) = if any_valid { (min, max) } else { (-1.0, 1.0) };

    NbrGrid {
        values,
        width,
        height,
        min,
        max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn test_zero_samples_are_no_data() {
        assert_eq!(nbr_pixel(0.0, 5000.0, NO_DATA), NO_DATA);
        assert_eq!(nbr_pixel(5000.0, 0.0, NO_DATA), NO_DATA);
        assert_eq!(nbr_pixel(0.0, 0.0, NO_DATA), NO_DATA);
    }

    #[test]
    fn test_saturated_samples_are_no_data() {
        assert_eq!(nbr_pixel(65001.0, 5000.0, NO_DATA), NO_DATA);
        assert_eq!(nbr_pixel(5000.0, 70000.0, NO_DATA), NO_DATA);
        // 65000 itself is still valid
        assert!(nbr_pixel(65000.0, 5000.0, NO_DATA) != NO_DATA);
    }

    #[test]
    fn test_vanishing_denominator_is_no_data() {
        // 5 + 5 raw -> 0.001 reflectance sum, which is not above the floor
        assert_eq!(nbr_pixel(5.0, 5.0, NO_DATA), NO_DATA);
        assert!(nbr_pixel(6.0, 6.0, NO_DATA) != NO_DATA);
    }

    #[test]
    fn test_valid_pixel_formula() {
        let value = nbr_pixel(4000.0, 2000.0, NO_DATA);
        assert!((value - 1.0 / 3.0).abs() < EPS);

        let value = nbr_pixel(9000.0, 9500.0, NO_DATA);
        assert!((value + 0.0270).abs() < EPS);
    }

    #[test]
    fn test_end_to_end_triple() {
        let nir = [4000.0, 0.0, 9000.0];
        let swir = [2000.0, 500.0, 9500.0];

        let grid = compute_nbr(&nir, &swir, 3, 1, NO_DATA, |_| {});

        assert!((grid.values[0] - 0.3333).abs() < EPS);
        assert_eq!(grid.values[1], NO_DATA);
        assert!((grid.values[2] + 0.0270).abs() < EPS);

        // Range comes from the two valid entries only
        assert!((grid.min + 0.0270).abs() < EPS);
        assert!((grid.max - 0.3333).abs() < EPS);
    }

    #[test]
    fn test_all_sentinel_grid_has_fallback_range() {
        let nir = [0.0, 0.0];
        let swir = [0.0, 0.0];

        let grid = compute_nbr(&nir, &swir, 2, 1, NO_DATA, |_| {});

        assert_eq!(grid.min, -1.0);
        assert_eq!(grid.max, 1.0);
        assert!(grid.min.is_finite() && grid.max.is_finite());
    }

    #[test]
    fn test_short_buffers_are_fill() {
        let grid = compute_nbr(&[4000.0], &[2000.0], 2, 1, NO_DATA, |_| {});
        assert!(grid.values[0] != NO_DATA);
        assert_eq!(grid.values[1], NO_DATA);
    }

    #[test]
    fn test_progress_reaches_one_hundred() {
        let nir = vec![4000.0; 10_000];
        let swir = vec![2000.0; 10_000];

        let mut reports = Vec::new();
        compute_nbr(&nir, &swir, 100, 100, NO_DATA, |p| reports.push(p));

        assert_eq!(*reports.last().unwrap(), 100);
        assert!(reports.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_out_of_range_result_is_substituted() {
        // Algebraically unreachable for positive reflectances; forced by
        // feeding a negative raw sample straight into the unit.
        let value = nbr_pixel(4000.0, -2000.0, NO_DATA);
        assert_eq!(value, NO_DATA);
    }
}
