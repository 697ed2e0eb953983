use core::ops::{Add, Mul, Sub};

/// Point or offset in canvas pixels, +Y down.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    #[inline]
    fn zip(self, other: Vec2, f: impl Fn(f32, f32) -> f32) -> Vec2 {
        Vec2::new(f(self.x, other.x), f(self.y, other.y))
    }

    #[inline]
    pub fn min(self, other: Vec2) -> Vec2 {
        self.zip(other, f32::min)
    }

    #[inline]
    pub fn max(self, other: Vec2) -> Vec2 {
        self.zip(other, f32::max)
    }

    /// Turns the vector by the angle whose cosine and sine are given.
    ///
    /// With +Y down a positive angle turns clockwise on screen.
    #[inline]
    pub fn rotated(self, cos: f32, sin: f32) -> Vec2 {
        Vec2::new(cos * self.x - sin * self.y, sin * self.x + cos * self.y)
    }

    /// Undoes [`rotated`](Self::rotated) for the same angle.
    #[inline]
    pub fn unrotated(self, cos: f32, sin: f32) -> Vec2 {
        self.rotated(cos, -sin)
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    #[inline]
    fn add(self, rhs: Vec2) -> Vec2 {
        self.zip(rhs, |a, b| a + b)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    #[inline]
    fn sub(self, rhs: Vec2) -> Vec2 {
        self.zip(rhs, |a, b| a - b)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    #[inline]
    fn mul(self, k: f32) -> Vec2 {
        Vec2::new(self.x * k, self.y * k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec2, b: Vec2) {
        assert!((a.x - b.x).abs() < 1e-5 && (a.y - b.y).abs() < 1e-5, "{a:?} != {b:?}");
    }

    #[test]
    fn quarter_turn_is_clockwise_on_screen() {
        let (sin, cos) = std::f32::consts::FRAC_PI_2.sin_cos();
        approx(Vec2::new(1.0, 0.0).rotated(cos, sin), Vec2::new(0.0, 1.0));
    }

    #[test]
    fn unrotated_is_the_inverse_turn() {
        let (sin, cos) = 1.234f32.sin_cos();
        let p = Vec2::new(3.0, -7.5);
        approx(p.rotated(cos, sin).unrotated(cos, sin), p);
    }

    #[test]
    fn min_max_pick_per_axis() {
        let a = Vec2::new(1.0, 5.0);
        let b = Vec2::new(3.0, 2.0);
        assert_eq!((a.min(b), a.max(b)), (Vec2::new(1.0, 2.0), Vec2::new(3.0, 5.0)));
    }
}
