//! CPU rasterizer with the same stroke semantics as the wgpu backend.
//!
//! Used on machines without an adapter and by every headless test. Work is done
//! at submit time, so a submission is complete by the time it is returned.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use image::{Rgba, RgbaImage};

use crate::coords::{Canvas, ColorRgba, Vec2};
use crate::device::RenderError;
use crate::render::brushes::BrushSet;
use crate::render::OffscreenBackend;
use crate::scene::{DrawList, StrokeCmd};

pub struct SoftwareBackend {
    brushes: Arc<BrushSet>,
    clear: ColorRgba,
}

/// Pixel buffer shared between a target and the commands recorded into it.
pub struct SoftwareTarget {
    pixels: Arc<Mutex<RgbaImage>>,
    canvas: Canvas,
}

impl SoftwareTarget {
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }
}

pub struct SoftwareCommands {
    pixels: Arc<Mutex<RgbaImage>>,
    canvas: Canvas,
    strokes: Vec<StrokeCmd>,
}

/// Already-completed submission.
#[derive(Debug, Clone, Copy)]
pub struct SoftwareSubmission;

impl SoftwareBackend {
    pub fn new(brushes: BrushSet) -> Self {
        log::info!("software offscreen backend, {} brushes", brushes.len());
        Self { brushes: Arc::new(brushes), clear: ColorRgba::white() }
    }

    pub fn with_clear_color(mut self, clear: ColorRgba) -> Self {
        self.clear = clear;
        self
    }

    fn rasterize(&self, image: &mut RgbaImage, canvas: Canvas, stroke: &StrokeCmd) -> Result<(), RenderError> {
        let size = self.brushes.brush_size(stroke.brush)?;
        let half = stroke.half_size(size);
        if half.x <= 0.0 || half.y <= 0.0 {
            return Ok(());
        }
        let Some(area) = stroke.bounds(size).overlap(canvas.bounds()) else {
            return Ok(());
        };

        let lo = canvas.to_local(area.min);
        let hi = canvas.to_local(area.max);
        let x0 = lo.x.floor().max(0.0) as u32;
        let y0 = lo.y.floor().max(0.0) as u32;
        let x1 = (hi.x.ceil() as u32).min(canvas.extent.width);
        let y1 = (hi.y.ceil() as u32).min(canvas.extent.height);

        let (sin, cos) = stroke.rotation.sin_cos();
        let color = stroke.color.premultiplied();

        for y in y0..y1 {
            for x in x0..x1 {
                let p = canvas.offset + Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let q = (p - stroke.center).unrotated(cos, sin);
                let u = (q.x + half.x) / (2.0 * half.x);
                let v = (q.y + half.y) / (2.0 * half.y);
                let coverage = self.brushes.sample(stroke.brush, u, v)?;
                if coverage <= 0.0 {
                    continue;
                }
                let px = image.get_pixel_mut(x, y);
                *px = blend_over(*px, color.map(|c| c * coverage));
            }
        }
        Ok(())
    }
}

/// Premultiplied source-over: `dst = src + dst * (1 - src.a)`, quantized to 8 bits.
fn blend_over(dst: Rgba<u8>, src: [f32; 4]) -> Rgba<u8> {
    let inv = 1.0 - src[3];
    let mut out = [0u8; 4];
    for (i, o) in out.iter_mut().enumerate() {
        let d = dst.0[i] as f32 / 255.0;
        *o = ((src[i] + d * inv).clamp(0.0, 1.0) * 255.0).round() as u8;
    }
    Rgba(out)
}

impl OffscreenBackend for SoftwareBackend {
    type Target = SoftwareTarget;
    type Commands = SoftwareCommands;
    type Submission = SoftwareSubmission;

    fn brush_count(&self) -> usize {
        self.brushes.len()
    }

    fn create_offscreen_target(&self, canvas: Canvas) -> Result<SoftwareTarget, RenderError> {
        if !canvas.is_valid() {
            return Err(RenderError::resource(
                "offscreen target",
                format!("invalid canvas {}x{}", canvas.extent.width, canvas.extent.height),
            ));
        }
        let image = RgbaImage::new(canvas.extent.width, canvas.extent.height);
        Ok(SoftwareTarget { pixels: Arc::new(Mutex::new(image)), canvas })
    }

    fn record_commands(
        &self,
        target: &SoftwareTarget,
        draw_list: &DrawList,
    ) -> Result<SoftwareCommands, RenderError> {
        for stroke in draw_list.iter() {
            self.brushes.get_brush_texture(stroke.brush)?;
        }
        Ok(SoftwareCommands {
            pixels: Arc::clone(&target.pixels),
            canvas: target.canvas,
            strokes: draw_list.strokes().to_vec(),
        })
    }

    fn submit(&self, commands: SoftwareCommands) -> Result<SoftwareSubmission, RenderError> {
        let mut image = commands.pixels.lock().unwrap_or_else(PoisonError::into_inner);
        let clear = Rgba(self.clear.premultiplied_u8());
        for px in image.pixels_mut() {
            *px = clear;
        }
        for stroke in &commands.strokes {
            self.rasterize(&mut image, commands.canvas, stroke)?;
        }
        Ok(SoftwareSubmission)
    }

    fn wait_fence(&self, _: &SoftwareSubmission, _: Option<Duration>) -> Result<(), RenderError> {
        Ok(())
    }

    fn map_readback(&self, target: &SoftwareTarget, _: Option<Duration>) -> Result<RgbaImage, RenderError> {
        Ok(target.pixels.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}
