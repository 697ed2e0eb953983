//! Brush texture store and atlas packing.
//!
//! A brush is a single-channel coverage mask. Both backends read the same
//! [`BrushSet`]; the GPU backend additionally packs it into one R8 atlas.

use image::{GrayImage, Luma};

use crate::coords::Vec2;
use crate::device::RenderError;

/// Pixels left empty between packed brushes.
const BRUSH_PADDING: u32 = 1;

/// Smallest atlas edge tried before growing.
const MIN_ATLAS_SIZE: u32 = 256;

/// Ordered set of brush masks, addressed by stroke brush index.
#[derive(Debug, Clone)]
pub struct BrushSet {
    brushes: Vec<GrayImage>,
}

impl BrushSet {
    /// Wraps caller-supplied masks. Rejects an empty set and zero-sized masks.
    pub fn new(brushes: Vec<GrayImage>) -> Result<Self, RenderError> {
        if brushes.is_empty() {
            return Err(RenderError::resource("brush set", "no brushes supplied"));
        }
        if let Some(i) = brushes.iter().position(|b| b.width() == 0 || b.height() == 0) {
            return Err(RenderError::resource("brush set", format!("brush {i} has zero size")));
        }
        Ok(Self { brushes })
    }

    /// Generates `count` deterministic masks of `size`×`size` pixels.
    ///
    /// Cycles through three families: soft round dabs of increasing hardness,
    /// bristle streaks, and flat rounded-square blocks.
    pub fn procedural(count: usize, size: u32) -> Self {
        let size = size.max(4);
        let brushes = (0..count.max(1))
            .map(|i| match i % 3 {
                0 => soft_round(size, 0.2 + 0.6 * (i / 3) as f32 / count.max(1) as f32),
                1 => bristle(size, i as u32),
                _ => flat(size),
            })
            .collect();
        Self { brushes }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.brushes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.brushes.is_empty()
    }

    /// Returns the mask for `index`.
    pub fn get_brush_texture(&self, index: u32) -> Result<&GrayImage, RenderError> {
        self.brushes
            .get(index as usize)
            .ok_or(RenderError::BrushOutOfRange { index, count: self.brushes.len() })
    }

    /// Mask size in pixels, as a float vector for stroke geometry.
    pub fn brush_size(&self, index: u32) -> Result<Vec2, RenderError> {
        let b = self.get_brush_texture(index)?;
        Ok(Vec2::new(b.width() as f32, b.height() as f32))
    }

    /// Nearest-neighbor coverage in `[0, 1]` at normalized `(u, v)`.
    ///
    /// Coordinates outside `[0, 1)` return zero coverage.
    pub fn sample(&self, index: u32, u: f32, v: f32) -> Result<f32, RenderError> {
        let b = self.get_brush_texture(index)?;
        if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
            return Ok(0.0);
        }
        let x = ((u * b.width() as f32) as u32).min(b.width() - 1);
        let y = ((v * b.height() as f32) as u32).min(b.height() - 1);
        Ok(b.get_pixel(x, y).0[0] as f32 / 255.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GrayImage> {
        self.brushes.iter()
    }
}

// ── procedural masks ──────────────────────────────────────────────────────

fn soft_round(size: u32, hardness: f32) -> GrayImage {
    let r = size as f32 * 0.5;
    GrayImage::from_fn(size, size, |x, y| {
        let dx = (x as f32 + 0.5 - r) / r;
        let dy = (y as f32 + 0.5 - r) / r;
        let d = (dx * dx + dy * dy).sqrt();
        let edge = ((1.0 - d) / (1.0 - hardness).max(1e-3)).clamp(0.0, 1.0);
        Luma([(edge * 255.0) as u8])
    })
}

fn bristle(size: u32, seed: u32) -> GrayImage {
    let r = size as f32 * 0.5;
    GrayImage::from_fn(size, size, |x, y| {
        let dy = (y as f32 + 0.5 - r) / r;
        let dx = (x as f32 + 0.5 - r) / r;
        // Elliptical envelope, long along x.
        let env = (1.0 - (dx * dx * 0.6 + dy * dy)).clamp(0.0, 1.0);
        // Per-row streak density from an integer hash, so each bristle row is stable.
        let streak = (hash(seed.wrapping_mul(977).wrapping_add(y)) % 100) as f32 / 100.0;
        Luma([(env * (0.35 + 0.65 * streak) * 255.0) as u8])
    })
}

fn flat(size: u32) -> GrayImage {
    let r = size as f32 * 0.5;
    GrayImage::from_fn(size, size, |x, y| {
        let dx = ((x as f32 + 0.5 - r) / r).abs();
        let dy = ((y as f32 + 0.5 - r) / r).abs();
        let d = dx.max(dy);
        Luma([(((1.0 - d) * 6.0).clamp(0.0, 1.0) * 255.0) as u8])
    })
}

fn hash(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^ (x >> 16)
}

// ── atlas ─────────────────────────────────────────────────────────────────

/// Normalized atlas rectangle of one brush.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct UvRect {
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
}

/// All brushes of a [`BrushSet`] shelf-packed into one square R8 image.
#[derive(Debug, Clone)]
pub struct BrushAtlas {
    pub image: GrayImage,
    pub uvs: Vec<UvRect>,
}

impl BrushAtlas {
    /// Packs `brushes`, growing the atlas edge by powers of two up to `max_size`.
    pub fn pack(brushes: &BrushSet, max_size: u32) -> Result<Self, RenderError> {
        let mut size = MIN_ATLAS_SIZE.min(max_size.max(1));
        loop {
            if let Some(placements) = shelf_pack(brushes, size) {
                return Ok(Self::blit(brushes, size, &placements));
            }
            if size >= max_size {
                return Err(RenderError::resource(
                    "brush atlas",
                    format!("{} brushes do not fit in {max_size}x{max_size}", brushes.len()),
                ));
            }
            size = (size * 2).min(max_size);
        }
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.image.width()
    }

    fn blit(brushes: &BrushSet, size: u32, placements: &[(u32, u32)]) -> Self {
        let mut image = GrayImage::new(size, size);
        let atlas_f = size as f32;
        let uvs = brushes
            .iter()
            .zip(placements)
            .map(|(brush, &(gx, gy))| {
                for (x, y, px) in brush.enumerate_pixels() {
                    image.put_pixel(gx + x, gy + y, *px);
                }
                UvRect {
                    uv_min: [gx as f32 / atlas_f, gy as f32 / atlas_f],
                    uv_max: [
                        (gx + brush.width()) as f32 / atlas_f,
                        (gy + brush.height()) as f32 / atlas_f,
                    ],
                }
            })
            .collect();
        Self { image, uvs }
    }
}

/// Shelf packing: fill rows left to right, open a new row when the next brush
/// does not fit horizontally. Returns top-left placements or `None` when full.
fn shelf_pack(brushes: &BrushSet, size: u32) -> Option<Vec<(u32, u32)>> {
    let mut cursor_x = BRUSH_PADDING;
    let mut cursor_y = BRUSH_PADDING;
    let mut row_height = 0;
    let mut placements = Vec::with_capacity(brushes.len());

    for brush in brushes.iter() {
        let (w, h) = brush.dimensions();
        if cursor_x + w + BRUSH_PADDING > size {
            cursor_y += row_height + BRUSH_PADDING;
            cursor_x = BRUSH_PADDING;
            row_height = 0;
        }
        if cursor_x + w + BRUSH_PADDING > size || cursor_y + h + BRUSH_PADDING > size {
            return None;
        }
        placements.push((cursor_x, cursor_y));
        cursor_x += w + BRUSH_PADDING;
        row_height = row_height.max(h);
    }
    Some(placements)
}
