//! Feature rescaling.
//!
//! Each fusion model is trained on features clipped into fixed per-feature
//! bounds and normalized to [0, 1]. The bounds are constants of the trained
//! model; reordering or changing them invalidates predictions.

use serde::{Deserialize, Serialize};

/// Clip bounds for one feature series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RescaleBounds {
    pub lower: f64,
    pub upper: f64,
}

impl RescaleBounds {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }
}

/// Clip `value` into `[lower, upper]` and map it linearly to [0, 1].
pub fn rescale(value: f64, bounds: RescaleBounds) -> f64 {
    let clipped = value.clamp(bounds.lower, bounds.upper);
    (clipped - bounds.lower) / (bounds.upper - bounds.lower)
}

/// Rescale a whole series.
pub fn rescale_series(values: &[f64], bounds: RescaleBounds) -> Vec<f64> {
    values.iter().map(|&v| rescale(v, bounds)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: RescaleBounds = RescaleBounds::new(0.4, 1.0);

    #[test]
    fn test_bounds_map_to_unit_interval() {
        assert_eq!(rescale(0.4, BOUNDS), 0.0);
        assert_eq!(rescale(1.0, BOUNDS), 1.0);
    }

    #[test]
    fn test_out_of_bounds_clips() {
        assert_eq!(rescale(0.1, BOUNDS), 0.0);
        assert_eq!(rescale(2.5, BOUNDS), 1.0);
    }

    #[test]
    fn test_interior_is_linear() {
        assert!((rescale(0.7, BOUNDS) - 0.5).abs() < 1e-12);
        assert!((rescale(0.55, BOUNDS) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_series() {
        let bounds = RescaleBounds::new(10.0, 50.0);
        assert_eq!(rescale_series(&[30.0, 40.0, 60.0], bounds), vec![0.5, 0.75, 1.0]);
    }
}
