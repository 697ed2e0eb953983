use super::{Bounds, Vec2};

/// Size of a render target in physical pixels.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0 && self.height > 0
    }

    #[inline]
    pub fn as_vec2(self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }
}

/// Canvas sub-region: where a population paints, in canvas pixels.
///
/// Strokes are positioned in absolute canvas coordinates; a render target of
/// `extent` pixels shows `[offset, offset + extent)`.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Canvas {
    pub offset: Vec2,
    pub extent: Extent,
}

impl Canvas {
    #[inline]
    pub const fn new(offset: Vec2, extent: Extent) -> Self {
        Self { offset, extent }
    }

    /// Canvas anchored at the origin.
    #[inline]
    pub const fn from_extent(extent: Extent) -> Self {
        Self { offset: Vec2::zero(), extent }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.extent.is_valid() && self.offset.is_finite()
    }

    /// Area of the canvas the target shows.
    #[inline]
    pub fn bounds(self) -> Bounds {
        Bounds::at(self.offset, self.extent.as_vec2())
    }

    /// Maps an absolute canvas position into target-local pixels.
    #[inline]
    pub fn to_local(self, p: Vec2) -> Vec2 {
        p - self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_extent_is_invalid() {
        assert!(!Extent::new(0, 4).is_valid());
        assert!(!Extent::new(4, 0).is_valid());
        assert!(Extent::new(1, 1).is_valid());
    }

    #[test]
    fn to_local_subtracts_offset() {
        let canvas = Canvas::new(Vec2::new(10.0, 20.0), Extent::new(32, 32));
        assert_eq!(canvas.to_local(Vec2::new(15.0, 20.0)), Vec2::new(5.0, 0.0));
        assert_eq!(canvas.bounds().max, Vec2::new(42.0, 52.0));
    }
}
