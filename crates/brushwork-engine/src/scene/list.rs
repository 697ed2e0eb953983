use super::StrokeCmd;

/// Recorded stroke stream for one render target.
///
/// Strokes are composited in insertion order (first pushed = furthest back).
/// `clear()` keeps the allocation, so one list can be reused across every genome
/// of a pass without per-genome allocation once warmed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawList {
    strokes: Vec<StrokeCmd>,
}

impl DrawList {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { strokes: Vec::with_capacity(capacity) }
    }

    /// Clears recorded strokes. Keeps allocated capacity for reuse.
    #[inline]
    pub fn clear(&mut self) {
        self.strokes.clear();
    }

    #[inline]
    pub fn push(&mut self, stroke: StrokeCmd) {
        self.strokes.push(stroke);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    /// Strokes in paint order (back to front).
    #[inline]
    pub fn strokes(&self) -> &[StrokeCmd] {
        &self.strokes
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, StrokeCmd> {
        self.strokes.iter()
    }
}

impl Extend<StrokeCmd> for DrawList {
    fn extend<I: IntoIterator<Item = StrokeCmd>>(&mut self, iter: I) {
        self.strokes.extend(iter);
    }
}
