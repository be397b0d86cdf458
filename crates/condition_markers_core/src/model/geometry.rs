//! Plane geometry primitives shared by scene items and the transform engine.
//!
//! # Invariants
//! - Rotation values are expressed in degrees, clockwise in scene space
//!   (y axis points down).
//! - Helpers are pure and never allocate.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

/// 2D vector used for positions, offsets and scale factors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };
    pub const ONE: Self = Self { x: 1.0, y: 1.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Uniform vector with both components set to `value`.
    pub const fn splat(value: f64) -> Self {
        Self { x: value, y: value }
    }

    /// Component-wise product.
    pub fn multiply(self, other: Self) -> Self {
        Self {
            x: self.x * other.x,
            y: self.y * other.y,
        }
    }

    /// Component-wise absolute value.
    pub fn abs(self) -> Self {
        Self {
            x: self.x.abs(),
            y: self.y.abs(),
        }
    }

    /// Rotates this point around `origin` by `degrees`.
    pub fn rotate(self, origin: Self, degrees: f64) -> Self {
        if degrees == 0.0 {
            return self;
        }
        let (sin, cos) = degrees.to_radians().sin_cos();
        let dx = self.x - origin.x;
        let dy = self.y - origin.y;
        Self {
            x: origin.x + dx * cos - dy * sin,
            y: origin.y + dx * sin + dy * cos,
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vector2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl Sub for Vector2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Mul<f64> for Vector2 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

impl Neg for Vector2 {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Vector2;

    fn assert_close(actual: Vector2, expected: Vector2) {
        assert!(
            (actual.x - expected.x).abs() < 1e-9 && (actual.y - expected.y).abs() < 1e-9,
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn rotate_quarter_turn_around_origin() {
        let rotated = Vector2::new(10.0, 0.0).rotate(Vector2::ZERO, 90.0);
        assert_close(rotated, Vector2::new(0.0, 10.0));
    }

    #[test]
    fn rotate_around_custom_origin() {
        let rotated = Vector2::new(20.0, 10.0).rotate(Vector2::new(10.0, 10.0), 180.0);
        assert_close(rotated, Vector2::new(0.0, 10.0));
    }

    #[test]
    fn zero_rotation_is_exact_identity() {
        let point = Vector2::new(0.1, 0.7);
        assert_eq!(point.rotate(Vector2::new(3.0, 4.0), 0.0), point);
    }

    #[test]
    fn arithmetic_helpers() {
        let a = Vector2::new(2.0, -3.0);
        let b = Vector2::new(4.0, 5.0);
        assert_eq!(a + b, Vector2::new(6.0, 2.0));
        assert_eq!(b - a, Vector2::new(2.0, 8.0));
        assert_eq!(a * 2.0, Vector2::new(4.0, -6.0));
        assert_eq!(a.multiply(b), Vector2::new(8.0, -15.0));
        assert_eq!(a.abs(), Vector2::new(2.0, 3.0));
        assert_eq!(-a, Vector2::new(-2.0, 3.0));
    }
}
