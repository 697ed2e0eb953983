//! Headless wgpu backend: render into an offscreen texture, copy to a mappable buffer.

use std::sync::{mpsc, Mutex, PoisonError};
use std::time::Duration;

use image::RgbaImage;

use crate::coords::{Canvas, ColorRgba};
use crate::device::{Gpu, RenderError};
use crate::render::brushes::BrushSet;
use crate::render::strokes::{StrokeFrame, StrokeRenderer};
use crate::render::OffscreenBackend;
use crate::scene::DrawList;

/// Color format of every slot target. Linear, so readback bytes are the blended values.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const BYTES_PER_PIXEL: u32 = 4;

/// One slot's GPU resources.
pub struct WgpuTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    readback: wgpu::Buffer,
    padded_bytes_per_row: u32,
    canvas: Canvas,
}

impl WgpuTarget {
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }
}

/// [`OffscreenBackend`] on a headless wgpu device.
///
/// The stroke renderer keeps a single instance buffer, so record and submit for one
/// target must complete before the next target is recorded. The slot pool's
/// callers already do this: a frame is recorded and submitted in one step.
pub struct WgpuBackend {
    gpu: Gpu,
    renderer: Mutex<StrokeRenderer>,
    brush_count: usize,
    clear: ColorRgba,
}

impl WgpuBackend {
    pub fn new(gpu: Gpu, brushes: BrushSet) -> Self {
        let info = gpu.adapter_info();
        log::info!(
            "wgpu offscreen backend on {} ({:?}), {} brushes",
            info.name,
            info.backend,
            brushes.len()
        );
        Self {
            gpu,
            brush_count: brushes.len(),
            renderer: Mutex::new(StrokeRenderer::new(brushes)),
            clear: ColorRgba::white(),
        }
    }

    /// Background every target is cleared to before strokes are drawn.
    pub fn with_clear_color(mut self, clear: ColorRgba) -> Self {
        self.clear = clear;
        self
    }

    pub fn gpu(&self) -> &Gpu {
        &self.gpu
    }
}

impl OffscreenBackend for WgpuBackend {
    type Target = WgpuTarget;
    type Commands = wgpu::CommandBuffer;
    type Submission = wgpu::SubmissionIndex;

    fn brush_count(&self) -> usize {
        self.brush_count
    }

    fn create_offscreen_target(&self, canvas: Canvas) -> Result<WgpuTarget, RenderError> {
        if !canvas.is_valid() {
            return Err(RenderError::resource(
                "offscreen target",
                format!("invalid canvas {}x{}", canvas.extent.width, canvas.extent.height),
            ));
        }
        let max = self.gpu.device().limits().max_texture_dimension_2d;
        let (width, height) = (canvas.extent.width, canvas.extent.height);
        if width > max || height > max {
            return Err(RenderError::resource(
                "offscreen target",
                format!("{width}x{height} exceeds device limit {max}"),
            ));
        }

        let device = self.gpu.device();
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("brushwork slot target"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let padded_bytes_per_row = padded_row_bytes(width);
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("brushwork slot readback"),
            size: padded_bytes_per_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Ok(WgpuTarget { texture, view, readback, padded_bytes_per_row, canvas })
    }

    fn record_commands(
        &self,
        target: &WgpuTarget,
        draw_list: &DrawList,
    ) -> Result<wgpu::CommandBuffer, RenderError> {
        let device = self.gpu.device();
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("brushwork slot encoder"),
        });

        let c = self.clear.premultiplied();
        {
            let _clear = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("brushwork clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: c[0] as f64,
                            g: c[1] as f64,
                            b: c[2] as f64,
                            a: c[3] as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }

        {
            let mut frame = StrokeFrame {
                device,
                queue: self.gpu.queue(),
                encoder: &mut encoder,
                view: &target.view,
                format: TARGET_FORMAT,
                canvas: target.canvas,
            };
            let mut renderer = self.renderer.lock().unwrap_or_else(PoisonError::into_inner);
            renderer.render(&mut frame, draw_list)?;
        }

        encoder.copy_texture_to_buffer(
            target.texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &target.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(target.padded_bytes_per_row),
                    rows_per_image: None,
                },
            },
            wgpu::Extent3d {
                width: target.canvas.extent.width,
                height: target.canvas.extent.height,
                depth_or_array_layers: 1,
            },
        );

        Ok(encoder.finish())
    }

    fn submit(&self, commands: wgpu::CommandBuffer) -> Result<wgpu::SubmissionIndex, RenderError> {
        Ok(self.gpu.queue().submit(std::iter::once(commands)))
    }

    fn wait_fence(
        &self,
        submission: &wgpu::SubmissionIndex,
        timeout: Option<Duration>,
    ) -> Result<(), RenderError> {
        match self.gpu.device().poll(wgpu::PollType::Wait {
            submission_index: Some(submission.clone()),
            timeout,
        }) {
            Ok(_) => Ok(()),
            Err(wgpu::PollError::Timeout) => {
                Err(RenderError::FenceTimeout(timeout.unwrap_or_default()))
            }
            Err(e) => Err(RenderError::Submission(e.to_string())),
        }
    }

    fn map_readback(
        &self,
        target: &WgpuTarget,
        timeout: Option<Duration>,
    ) -> Result<RgbaImage, RenderError> {
        let slice = target.readback.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        let polled = self.gpu.device().poll(wgpu::PollType::Wait { submission_index: None, timeout });
        if let Err(e) = polled {
            // Cancels the pending map so the slot's buffer can be mapped again.
            target.readback.unmap();
            return Err(match e {
                wgpu::PollError::Timeout => RenderError::FenceTimeout(timeout.unwrap_or_default()),
                e => RenderError::Readback(e.to_string()),
            });
        }

        rx.recv()
            .map_err(|_| RenderError::Readback("map callback never ran".into()))?
            .map_err(|e| RenderError::Readback(e.to_string()))?;

        let Canvas { extent, .. } = target.canvas;
        let row_bytes = (extent.width * BYTES_PER_PIXEL) as usize;
        let mut pixels = Vec::with_capacity(row_bytes * extent.height as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks_exact(target.padded_bytes_per_row as usize) {
                pixels.extend_from_slice(&row[..row_bytes]);
            }
        }
        target.readback.unmap();

        RgbaImage::from_raw(extent.width, extent.height, pixels)
            .ok_or_else(|| RenderError::Readback("readback size does not match target".into()))
    }
}

/// Row stride of the readback buffer, aligned for texture-to-buffer copies.
fn padded_row_bytes(width: u32) -> u32 {
    let unpadded = width * BYTES_PER_PIXEL;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_rows_are_aligned_and_cover_the_row() {
        for width in [1, 63, 64, 65, 300] {
            let padded = padded_row_bytes(width);
            assert_eq!(padded % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT, 0);
            assert!(padded >= width * BYTES_PER_PIXEL);
            assert!(padded - width * BYTES_PER_PIXEL < wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        }
    }

    #[test]
    fn aligned_width_needs_no_padding() {
        assert_eq!(padded_row_bytes(64), 256);
    }
}
