//! Burn-severity classification of NBR values.

use serde::Serialize;

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn transparent() -> Self {
        Self { r: 0, g: 0, b: 0, a: 0 }
    }
}

/// Burn-severity classes in ascending order of NBR lower bound.
///
/// Low NBR means burned vegetation; high NBR means healthy or regrowing
/// vegetation. Values at or above the regrowth-high upper bound, and the
/// no-data sentinel, carry no class and render transparent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeverityClass {
    Severe,
    High,
    ModerateHigh,
    Moderate,
    LowUnburned,
    RegrowthLow,
    RegrowthModerate,
    RegrowthHigh,
}

impl SeverityClass {
    /// Fixed overlay color for this class.
    ///
    /// The conventional burn-severity ramp: purple through red and orange for
    /// burned ground, yellow around the transition, greens for regrowth.
    /// Alpha is uniform so the basemap stays readable under the layer.
    pub fn color(&self) -> Color {
        match self {
            SeverityClass::Severe => Color::new(165, 0, 165, 200),
            SeverityClass::High => Color::new(230, 0, 0, 200),
            SeverityClass::ModerateHigh => Color::new(255, 128, 0, 200),
            SeverityClass::Moderate => Color::new(255, 211, 0, 200),
            SeverityClass::LowUnburned => Color::new(255, 255, 115, 200),
            SeverityClass::RegrowthLow => Color::new(166, 230, 102, 200),
            SeverityClass::RegrowthModerate => Color::new(80, 180, 70, 200),
            SeverityClass::RegrowthHigh => Color::new(0, 115, 30, 200),
        }
    }
}

/// Classify one NBR value against the ordered severity thresholds.
///
/// Classification is a hard step function over half-open ranges; the branch
/// ordering makes each boundary value belong to the class above it (an NBR of
/// exactly -0.25 is moderate, not moderate-high). Values at or above 0.7 and
/// the no-data sentinel return `None`.
pub fn classify(value: f32, no_data: f32) -> Option<SeverityClass> {
    if value == no_data {
        return None;
    }

    match value {
        v if v < -0.5 => Some(SeverityClass::Severe),
        v if v < -0.35 => Some(SeverityClass::High),
        v if v < -0.25 => Some(SeverityClass::ModerateHigh),
        v if v < -0.1 => Some(SeverityClass::Moderate),
        v if v < 0.1 => Some(SeverityClass::LowUnburned),
        v if v < 0.3 => Some(SeverityClass::RegrowthLow),
        v if v < 0.5 => Some(SeverityClass::RegrowthModerate),
        v if v < 0.7 => Some(SeverityClass::RegrowthHigh),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_DATA: f32 = -9999.0;

    #[test]
    fn test_class_ladder() {
        assert_eq!(classify(-0.8, NO_DATA), Some(SeverityClass::Severe));
        assert_eq!(classify(-0.4, NO_DATA), Some(SeverityClass::High));
        assert_eq!(classify(-0.3, NO_DATA), Some(SeverityClass::ModerateHigh));
        assert_eq!(classify(-0.2, NO_DATA), Some(SeverityClass::Moderate));
        assert_eq!(classify(0.0, NO_DATA), Some(SeverityClass::LowUnburned));
        assert_eq!(classify(0.2, NO_DATA), Some(SeverityClass::RegrowthLow));
        assert_eq!(classify(0.4, NO_DATA), Some(SeverityClass::RegrowthModerate));
        assert_eq!(classify(0.6, NO_DATA), Some(SeverityClass::RegrowthHigh));
    }

    #[test]
    fn test_boundary_belongs_to_class_above() {
        // Exactly -0.25 fails the `< -0.25` branch and lands in moderate
        assert_eq!(classify(-0.25, NO_DATA), Some(SeverityClass::Moderate));
        assert_eq!(classify(-0.5, NO_DATA), Some(SeverityClass::High));
        assert_eq!(classify(0.5, NO_DATA), Some(SeverityClass::RegrowthHigh));
    }

    #[test]
    fn test_top_of_range_is_transparent() {
        // Exactly 0.7 is past regrowth-high
        assert_eq!(classify(0.7, NO_DATA), None);
        assert_eq!(classify(1.0, NO_DATA), None);
    }

    #[test]
    fn test_no_data_is_transparent() {
        assert_eq!(classify(NO_DATA, NO_DATA), None);
    }
}
