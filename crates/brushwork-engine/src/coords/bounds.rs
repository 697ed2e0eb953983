use super::Vec2;

/// Axis-aligned box stored as its two extreme corners, in canvas pixels.
///
/// Half-open on the max side: a box covers `[min, max)`.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    #[inline]
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Box of `size` whose top-left corner is `origin`.
    #[inline]
    pub fn at(origin: Vec2, size: Vec2) -> Self {
        Self::new(origin, origin + size)
    }

    /// Tightest box around `points`; zero-sized at the origin when there are none.
    pub fn enclosing(points: &[Vec2]) -> Self {
        let mut it = points.iter().copied();
        let Some(first) = it.next() else {
            return Self::default();
        };
        it.fold(Self::new(first, first), |b, p| Self::new(b.min.min(p), b.max.max(p)))
    }

    #[inline]
    pub fn size(self) -> Vec2 {
        self.max - self.min
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.max.x <= self.min.x || self.max.y <= self.min.y
    }

    #[inline]
    pub fn contains(self, p: Vec2) -> bool {
        (self.min.x..self.max.x).contains(&p.x) && (self.min.y..self.max.y).contains(&p.y)
    }

    /// Shared area of both boxes, `None` unless it has positive size.
    #[inline]
    pub fn overlap(self, other: Bounds) -> Option<Bounds> {
        let b = Self::new(self.min.max(other.min), self.max.min(other.max));
        (!b.is_empty()).then_some(b)
    }
}
