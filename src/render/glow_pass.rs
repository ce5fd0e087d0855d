use super::target::DEPTH_STENCIL_FORMAT;
use super::{capture_validation, RenderError};
use crate::assets::{load_texture, RowOrder, TextureColorSpace};
use crate::scene::{glow_sprite_matrix, GlowSprites, ProgramState};
use bytemuck::{Pod, Zeroable};
use std::path::Path;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GlowVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl GlowVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GlowVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Unit quad in the XY plane. UV origin is bottom-left, which is why the glow
/// texture is decoded with `RowOrder::FlipVertical`.
pub const GLOW_QUAD: [GlowVertex; 6] = [
    GlowVertex { position: [-0.5, 0.5, 0.0], uv: [0.0, 1.0] },
    GlowVertex { position: [-0.5, -0.5, 0.0], uv: [0.0, 0.0] },
    GlowVertex { position: [0.5, -0.5, 0.0], uv: [1.0, 0.0] },
    GlowVertex { position: [-0.5, 0.5, 0.0], uv: [0.0, 1.0] },
    GlowVertex { position: [0.5, -0.5, 0.0], uv: [1.0, 0.0] },
    GlowVertex { position: [0.5, 0.5, 0.0], uv: [1.0, 1.0] },
];

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct CameraUniforms {
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
}

struct SpriteSlot {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Transparent billboard pass. Sprites are re-sorted farthest-first every
/// frame before their matrices are uploaded.
pub struct GlowPass {
    pipeline: wgpu::RenderPipeline,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    texture_bind_group: wgpu::BindGroup,
    vertex_buffer: wgpu::Buffer,
    slots: Vec<SpriteSlot>,
    sprites: GlowSprites,
}

impl GlowPass {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color_format: wgpu::TextureFormat,
        texture_path: &Path,
        sprites: GlowSprites,
    ) -> Result<Self, RenderError> {
        let uniform_entry = |visibility| wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Glow Camera Layout"),
            entries: &[uniform_entry(wgpu::ShaderStages::VERTEX)],
        });
        let sprite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Glow Sprite Layout"),
            entries: &[uniform_entry(wgpu::ShaderStages::VERTEX)],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Glow Texture Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline = capture_validation(device, || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Glow Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/glow.wgsl").into()),
            });
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Glow Pipeline Layout"),
                bind_group_layouts: &[&camera_layout, &sprite_layout, &texture_layout],
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Glow Pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[GlowVertex::desc()],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: color_format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                // Both faces: the quad is seen from either side.
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_STENCIL_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })
        .map_err(RenderError::Pipeline)?;

        let glow_texture = load_texture(
            device,
            queue,
            texture_path,
            RowOrder::FlipVertical,
            TextureColorSpace::matching(color_format),
        );
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Glow Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let texture_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Glow Texture Bind Group"),
            layout: &texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&glow_texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Glow Camera Uniforms"),
            size: std::mem::size_of::<CameraUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Glow Camera Bind Group"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        // One uniform slot per sprite so every draw in the pass sees its own matrix.
        let slots = (0..sprites.len())
            .map(|i| {
                let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("Glow Sprite {i} Uniforms")),
                    size: std::mem::size_of::<[[f32; 4]; 4]>() as wgpu::BufferAddress,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("Glow Sprite {i} Bind Group")),
                    layout: &sprite_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                });
                SpriteSlot { buffer, bind_group }
            })
            .collect();

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Glow Quad Buffer"),
            contents: bytemuck::cast_slice(&GLOW_QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Ok(Self {
            pipeline,
            camera_buffer,
            camera_bind_group,
            texture_bind_group,
            vertex_buffer,
            slots,
            sprites,
        })
    }

    pub fn sprites(&self) -> &GlowSprites {
        &self.sprites
    }

    /// Sorts the sprites for the current camera and uploads their matrices in
    /// draw order.
    pub fn prepare(&mut self, queue: &wgpu::Queue, state: &ProgramState, aspect: f32) {
        let camera = &state.camera;
        let uniforms = CameraUniforms {
            view: camera.view_matrix().to_cols_array_2d(),
            projection: camera.projection_matrix(aspect).to_cols_array_2d(),
        };
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&uniforms));

        let order = self.sprites.sort_back_to_front(camera.position);
        for (slot, position) in self.slots.iter().zip(order) {
            let model = glow_sprite_matrix(*position).to_cols_array_2d();
            queue.write_buffer(&slot.buffer, 0, bytemuck::bytes_of(&model));
        }
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.camera_bind_group, &[]);
        pass.set_bind_group(2, &self.texture_bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        for slot in &self.slots {
            pass.set_bind_group(1, &slot.bind_group, &[]);
            pass.draw(0..GLOW_QUAD.len() as u32, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_is_centered_and_uses_bottom_left_uvs() {
        let sum: [f32; 3] = GLOW_QUAD.iter().fold([0.0; 3], |acc, v| {
            [acc[0] + v.position[0], acc[1] + v.position[1], acc[2] + v.position[2]]
        });
        assert_eq!(sum, [0.0, 0.0, 0.0]);
        for vertex in &GLOW_QUAD {
            assert_eq!(vertex.uv[0], vertex.position[0] + 0.5);
            assert_eq!(vertex.uv[1], vertex.position[1] + 0.5);
        }
    }

    #[test]
    fn glow_vertex_stride() {
        assert_eq!(std::mem::size_of::<GlowVertex>(), 20);
        assert_eq!(std::mem::size_of::<CameraUniforms>(), 128);
    }
}
