//! Output-size reduction policy for large read windows.
//!
//! Multi-megapixel windows are cut down before decoding: the factor scales
//! the *requested output* dimensions handed to the band reader, which then
//! decodes at a reduced resolution (COG overview selection) instead of
//! decoding everything and discarding pixels afterward.

/// Pixel count above which output is reduced by a factor of 4.
const FACTOR_4_THRESHOLD: u64 = 4_000_000;

/// Pixel count above which output is reduced by a factor of 2.
const FACTOR_2_THRESHOLD: u64 = 2_000_000;

/// Pick the downsampling factor for a read window of the given size.
pub fn downsample_factor(width: u32, height: u32) -> u32 {
    let pixels = width as u64 * height as u64;
    if pixels > FACTOR_4_THRESHOLD {
        4
    } else if pixels > FACTOR_2_THRESHOLD {
        2
    } else {
        1
    }
}

/// Apply a downsampling factor to window dimensions, rounding up so no part
/// of the window is dropped.
pub fn apply_factor(width: u32, height: u32, factor: u32) -> (u32, u32) {
    let factor = factor.max(1);
    (width.div_ceil(factor), height.div_ceil(factor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor_thresholds() {
        // 5,000,000 px
        assert_eq!(downsample_factor(2500, 2000), 4);
        // 2,250,000 px
        assert_eq!(downsample_factor(1500, 1500), 2);
        // 1,000,000 px
        assert_eq!(downsample_factor(1000, 1000), 1);
    }

    #[test]
    fn test_factor_thresholds_are_exclusive() {
        // Exactly 2,000,000 px stays at full resolution
        assert_eq!(downsample_factor(2000, 1000), 1);
        // Exactly 4,000,000 px gets factor 2
        assert_eq!(downsample_factor(2000, 2000), 2);
    }

    #[test]
    fn test_apply_factor_rounds_up() {
        assert_eq!(apply_factor(2501, 2001, 4), (626, 501));
        assert_eq!(apply_factor(2500, 2000, 4), (625, 500));
        assert_eq!(apply_factor(1000, 1000, 1), (1000, 1000));
    }

    #[test]
    fn test_apply_factor_guards_zero() {
        assert_eq!(apply_factor(100, 100, 0), (100, 100));
    }
}
