//! Instanced stroke renderer for the wgpu backend.
//!
//! One instance per stroke; the quad corners come from the vertex index, so the
//! only vertex buffer is the per-stroke instance data. Brush masks live in a
//! single R8 atlas packed from the [`BrushSet`] on first use.

use bytemuck::{Pod, Zeroable};

use crate::coords::Canvas;
use crate::device::RenderError;
use crate::render::brushes::{BrushAtlas, BrushSet, UvRect};
use crate::scene::DrawList;

/// Everything a stroke pass needs from the frame being recorded.
pub(crate) struct StrokeFrame<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub view: &'a wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub canvas: Canvas,
}

pub struct StrokeRenderer {
    brushes: BrushSet,
    resources: Option<StrokeResources>,
    instances: Option<InstanceBuffer>,
}

impl StrokeRenderer {
    pub fn new(brushes: BrushSet) -> Self {
        Self { brushes, resources: None, instances: None }
    }

    /// Encodes every stroke of `draw_list` over the current contents of the frame.
    ///
    /// A stroke naming an unknown brush fails the whole list and nothing is encoded.
    pub(crate) fn render(
        &mut self,
        frame: &mut StrokeFrame<'_>,
        draw_list: &DrawList,
    ) -> Result<(), RenderError> {
        if !self.resources.as_ref().is_some_and(|r| r.format == frame.format) {
            self.resources = Some(StrokeResources::build(
                frame.device,
                frame.queue,
                frame.format,
                &self.brushes,
            )?);
        }
        let Some(res) = self.resources.as_ref() else {
            return Err(RenderError::resource("stroke pipeline", "not initialized"));
        };

        let instances = stroke_instances(&self.brushes, &res.atlas_uvs, draw_list)?;
        if instances.is_empty() {
            return Ok(());
        }

        if !self.instances.as_ref().is_some_and(|b| b.capacity >= instances.len()) {
            self.instances = Some(InstanceBuffer::new(frame.device, instances.len()));
        }
        let Some(vbo) = self.instances.as_ref() else {
            return Err(RenderError::resource("stroke instance buffer", "not allocated"));
        };

        frame.queue.write_buffer(
            &res.canvas_ubo,
            0,
            bytemuck::bytes_of(&CanvasUniform::from(frame.canvas)),
        );
        frame.queue.write_buffer(&vbo.buffer, 0, bytemuck::cast_slice(&instances));

        let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("brushwork stroke pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(&res.pipeline);
        pass.set_bind_group(0, &res.bind_group, &[]);
        pass.set_vertex_buffer(0, vbo.buffer.slice(..));
        pass.draw(0..6, 0..instances.len() as u32);
        Ok(())
    }
}

fn stroke_instances(
    brushes: &BrushSet,
    uvs: &[UvRect],
    draw_list: &DrawList,
) -> Result<Vec<StrokeInstance>, RenderError> {
    draw_list
        .iter()
        .map(|stroke| -> Result<StrokeInstance, RenderError> {
            let size = brushes.brush_size(stroke.brush)?;
            let uv = uvs
                .get(stroke.brush as usize)
                .ok_or(RenderError::BrushOutOfRange { index: stroke.brush, count: uvs.len() })?;
            let half = stroke.half_size(size);
            let (sin, cos) = stroke.rotation.sin_cos();
            Ok(StrokeInstance {
                center: [stroke.center.x, stroke.center.y],
                half_size: [half.x, half.y],
                rotation: [cos, sin],
                uv_min: uv.uv_min,
                uv_max: uv.uv_max,
                color: stroke.color.premultiplied(),
            })
        })
        .collect()
}

// ── device objects ────────────────────────────────────────────────────────

/// Pipeline, atlas and bindings; rebuilt only if the target format changes.
struct StrokeResources {
    format: wgpu::TextureFormat,
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    canvas_ubo: wgpu::Buffer,
    atlas_uvs: Vec<UvRect>,
    _atlas: wgpu::Texture,
}

impl StrokeResources {
    fn build(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        brushes: &BrushSet,
    ) -> Result<Self, RenderError> {
        let atlas = BrushAtlas::pack(brushes, device.limits().max_texture_dimension_2d)?;
        let texture = upload_atlas(device, queue, &atlas);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("brushwork brush sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });
        let canvas_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("brushwork canvas ubo"),
            size: std::mem::size_of::<CanvasUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let layout = bind_group_layout(device);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("brushwork stroke bind group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: canvas_ubo.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        log::debug!(
            "stroke pipeline for {format:?}, atlas {0}x{0} with {1} brushes",
            atlas.size(),
            atlas.uvs.len()
        );

        Ok(Self {
            format,
            pipeline: stroke_pipeline(device, &layout, format),
            bind_group,
            canvas_ubo,
            atlas_uvs: atlas.uvs,
            _atlas: texture,
        })
    }
}

fn upload_atlas(device: &wgpu::Device, queue: &wgpu::Queue, atlas: &BrushAtlas) -> wgpu::Texture {
    let size = atlas.size();
    let extent = wgpu::Extent3d { width: size, height: size, depth_or_array_layers: 1 };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("brushwork brush atlas"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::R8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        texture.as_image_copy(),
        atlas.image.as_raw(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(size),
            rows_per_image: Some(size),
        },
        extent,
    );
    texture
}

fn bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("brushwork stroke bgl"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<CanvasUniform>() as u64,
                    ),
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

fn stroke_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("brushwork stroke shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/stroke.wgsl").into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("brushwork stroke pipeline layout"),
        bind_group_layouts: &[layout],
        immediate_size: 0,
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("brushwork stroke pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_stroke"),
            compilation_options: Default::default(),
            buffers: &[StrokeInstance::layout()],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_stroke"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                // Colors arrive premultiplied: src + dst * (1 - src.a).
                blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

// ── GPU types ─────────────────────────────────────────────────────────────

/// Visible window of the canvas: `origin` maps to the top-left of the target.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct CanvasUniform {
    origin: [f32; 2],
    size: [f32; 2],
}

impl From<Canvas> for CanvasUniform {
    fn from(canvas: Canvas) -> Self {
        Self {
            origin: [canvas.offset.x, canvas.offset.y],
            size: [
                (canvas.extent.width as f32).max(1.0),
                (canvas.extent.height as f32).max(1.0),
            ],
        }
    }
}

/// Per-stroke vertex data, 56 bytes. `rotation` is (cos, sin), `color` premultiplied.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct StrokeInstance {
    center: [f32; 2],
    half_size: [f32; 2],
    rotation: [f32; 2],
    uv_min: [f32; 2],
    uv_max: [f32; 2],
    color: [f32; 4],
}

impl StrokeInstance {
    const ATTRS: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Float32x2,
        2 => Float32x2,
        3 => Float32x2,
        4 => Float32x2,
        5 => Float32x4
    ];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<StrokeInstance>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRS,
        }
    }
}

struct InstanceBuffer {
    buffer: wgpu::Buffer,
    capacity: usize,
}

impl InstanceBuffer {
    /// Grows in powers of two, never below 64 strokes.
    fn new(device: &wgpu::Device, required: usize) -> Self {
        let capacity = required.next_power_of_two().max(64);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("brushwork stroke instances"),
            size: (capacity * std::mem::size_of::<StrokeInstance>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self { buffer, capacity }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{Extent, Vec2};

    #[test]
    fn instance_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<StrokeInstance>(), 56);
        assert_eq!(std::mem::size_of::<CanvasUniform>(), 16);
    }

    #[test]
    fn canvas_uniform_keeps_offset_and_guards_zero_size() {
        let u = CanvasUniform::from(Canvas::new(Vec2::new(3.0, 4.0), Extent::new(0, 8)));
        assert_eq!(u.origin, [3.0, 4.0]);
        assert_eq!(u.size, [1.0, 8.0]);
    }
}
