//! Feet ↔ pixel conversion. One grid square is five feet.

const FEET_PER_SQUARE: f64 = 5.0;

/// Pixels per foot for a grid size, or 0 when the grid is unusable.
pub fn px_per_foot(grid_size_px: f64) -> f64 {
    if !grid_size_px.is_finite() || grid_size_px <= 0.0 {
        return 0.0;
    }
    grid_size_px / FEET_PER_SQUARE
}

pub fn feet_to_px(feet: f64, grid_size_px: f64) -> Option<f64> {
    let per_foot = px_per_foot(grid_size_px);
    if per_foot <= 0.0 || !feet.is_finite() {
        return None;
    }
    Some(feet * per_foot)
}

pub fn px_to_feet(px: f64, grid_size_px: f64) -> Option<f64> {
    let per_foot = px_per_foot(grid_size_px);
    if per_foot <= 0.0 || !px.is_finite() {
        return None;
    }
    Some(px / per_foot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(px_per_foot(64.0), 12.8);
        assert_eq!(feet_to_px(5.0, 64.0), Some(64.0));
        assert_eq!(px_to_feet(128.0, 64.0), Some(10.0));
    }

    #[test]
    fn invalid_grid_or_value() {
        assert_eq!(px_per_foot(0.0), 0.0);
        assert_eq!(px_per_foot(f64::NAN), 0.0);
        assert_eq!(feet_to_px(5.0, -1.0), None);
        assert_eq!(feet_to_px(f64::INFINITY, 64.0), None);
        assert_eq!(px_to_feet(f64::NAN, 64.0), None);
    }
}
