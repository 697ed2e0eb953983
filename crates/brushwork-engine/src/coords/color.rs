/// Stroke color in straight (non-premultiplied) alpha, channels nominally in `[0, 1]`.
///
/// Genomes mutate alpha independently of rgb, so premultiplication happens only
/// at the point a backend blends.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct ColorRgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ColorRgba {
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn black() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    #[inline]
    pub const fn white() -> Self {
        Self::new(1.0, 1.0, 1.0, 1.0)
    }

    #[inline]
    pub fn clamped(self) -> Self {
        let [r, g, b, a] = [self.r, self.g, self.b, self.a].map(|c| c.clamp(0.0, 1.0));
        Self { r, g, b, a }
    }

    /// `[r*a, g*a, b*a, a]` after clamping; the form both backends blend with.
    #[inline]
    pub fn premultiplied(self) -> [f32; 4] {
        let Self { r, g, b, a } = self.clamped();
        [r * a, g * a, b * a, a]
    }

    /// Premultiplied and rounded to 8 bits per channel.
    #[inline]
    pub fn premultiplied_u8(self) -> [u8; 4] {
        self.premultiplied().map(|c| (c * 255.0).round() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_scales_rgb_when_premultiplied() {
        assert_eq!(ColorRgba::new(1.0, 0.5, 0.0, 0.5).premultiplied(), [0.5, 0.25, 0.0, 0.5]);
    }

    #[test]
    fn out_of_range_channels_clamp_first() {
        assert_eq!(ColorRgba::new(2.0, -1.0, 0.5, 1.5).premultiplied(), [1.0, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn quantized_white_is_full_scale() {
        assert_eq!(ColorRgba::white().premultiplied_u8(), [255; 4]);
        assert_eq!(ColorRgba::new(1.0, 1.0, 1.0, 0.5).premultiplied_u8(), [128; 4]);
    }
}
