//! Float vectors for simulation and the integer vectors carried on the wire

use serde::{Deserialize, Serialize};

/// Simulation vector. Positive x is to the right, positive y is up.
pub use glam::Vec2;

/// Integer vector carried inside position/velocity blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WireVec {
    pub x: i32,
    pub y: i32,
}

impl WireVec {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Truncates both components toward zero.
impl From<Vec2> for WireVec {
    fn from(v: Vec2) -> Self {
        WireVec {
            x: v.x as i32,
            y: v.y as i32,
        }
    }
}

impl From<WireVec> for Vec2 {
    fn from(v: WireVec) -> Self {
        Vec2::new(v.x as f32, v.y as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_normalize_zero_vector() {
        assert_eq!(Vec2::ZERO.normalize_or_zero(), Vec2::ZERO);
    }

    #[test]
    fn test_clamp_length_keeps_direction() {
        let v = Vec2::new(300.0, 400.0).clamp_length_max(100.0);
        assert_approx_eq!(v.length(), 100.0, 0.001);
        assert_approx_eq!(v.x, 60.0, 0.001);
        assert_approx_eq!(v.y, 80.0, 0.001);
    }

    #[test]
    fn test_clamp_length_below_limit_is_identity() {
        let v = Vec2::new(3.0, 4.0);
        assert_eq!(v.clamp_length_max(10.0), v);
    }

    #[test]
    fn test_wire_truncates_toward_zero() {
        assert_eq!(WireVec::from(Vec2::new(12.9, -3.7)), WireVec::new(12, -3));
    }

    #[test]
    fn test_wire_back_to_float() {
        assert_eq!(Vec2::from(WireVec::new(-4, 250)), Vec2::new(-4.0, 250.0));
    }
}
