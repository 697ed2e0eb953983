use crate::coords::{Bounds, ColorRgba, Vec2};

/// One brush stroke: a textured quad centered at `center`.
///
/// The quad is the brush texture's pixel size multiplied by `scale`, rotated by
/// `rotation` radians about its center, tinted with `color`, and its alpha
/// modulated by the brush mask.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StrokeCmd {
    /// Absolute canvas position of the quad center.
    pub center: Vec2,
    pub scale: f32,
    pub rotation: f32,
    pub color: ColorRgba,
    pub brush: u32,
}

impl StrokeCmd {
    /// Half extents of the quad for a brush texture of `brush_size` pixels.
    #[inline]
    pub fn half_size(&self, brush_size: Vec2) -> Vec2 {
        brush_size * (self.scale.abs() * 0.5)
    }

    /// Quad corners in canvas space, in (0,0) (1,0) (1,1) (0,1) UV order.
    pub fn corners(&self, brush_size: Vec2) -> [Vec2; 4] {
        let h = self.half_size(brush_size);
        let (sin, cos) = self.rotation.sin_cos();
        [
            Vec2::new(-h.x, -h.y),
            Vec2::new(h.x, -h.y),
            Vec2::new(h.x, h.y),
            Vec2::new(-h.x, h.y),
        ]
        .map(|c| self.center + c.rotated(cos, sin))
    }

    /// Axis-aligned bounds of the rotated quad.
    #[inline]
    pub fn bounds(&self, brush_size: Vec2) -> Bounds {
        Bounds::enclosing(&self.corners(brush_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stroke(rotation: f32) -> StrokeCmd {
        StrokeCmd {
            center: Vec2::new(10.0, 10.0),
            scale: 0.5,
            rotation,
            color: ColorRgba::white(),
            brush: 0,
        }
    }

    #[test]
    fn unrotated_bounds_match_scaled_brush() {
        let b = stroke(0.0).bounds(Vec2::new(8.0, 4.0));
        assert_eq!(b, Bounds::new(Vec2::new(8.0, 9.0), Vec2::new(12.0, 11.0)));
    }

    #[test]
    fn quarter_turn_swaps_extents() {
        let b = stroke(std::f32::consts::FRAC_PI_2).bounds(Vec2::new(8.0, 4.0));
        assert!((b.size().x - 2.0).abs() < 1e-4);
        assert!((b.size().y - 4.0).abs() < 1e-4);
    }

    #[test]
    fn negative_scale_is_treated_as_magnitude() {
        let mut s = stroke(0.0);
        s.scale = -0.5;
        assert_eq!(s.half_size(Vec2::new(8.0, 4.0)), Vec2::new(2.0, 1.0));
    }
}
