use super::target::DEPTH_STENCIL_FORMAT;
use super::{capture_validation, RenderError};
use crate::assets::{Model, ModelVertex, TextureColorSpace};
use crate::scene::{ModelTransform, PointLight, ProgramState, MATERIAL_SHININESS};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use std::path::Path;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuPointLight {
    pub position: [f32; 3],
    pub attenuation_constant: f32,
    pub ambient: [f32; 3],
    pub attenuation_linear: f32,
    pub diffuse: [f32; 3],
    pub attenuation_quadratic: f32,
    pub specular: [f32; 3],
    _pad: f32,
}

impl From<&PointLight> for GpuPointLight {
    fn from(light: &PointLight) -> Self {
        Self {
            position: light.position.to_array(),
            attenuation_constant: light.constant,
            ambient: light.ambient.to_array(),
            attenuation_linear: light.linear,
            diffuse: light.diffuse.to_array(),
            attenuation_quadratic: light.quadratic,
            specular: light.specular.to_array(),
            _pad: 0.0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneUniforms {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub view_position: [f32; 3],
    pub shininess: f32,
    pub lights: [GpuPointLight; 3],
}

impl SceneUniforms {
    pub fn from_state(state: &ProgramState, aspect: f32) -> Self {
        let camera = &state.camera;
        Self {
            view: camera.view_matrix().to_cols_array_2d(),
            projection: camera.projection_matrix(aspect).to_cols_array_2d(),
            view_position: camera.position.to_array(),
            shininess: MATERIAL_SHININESS,
            lights: [
                GpuPointLight::from(&state.point_lights[0]),
                GpuPointLight::from(&state.point_lights[1]),
                GpuPointLight::from(&state.point_lights[2]),
            ],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ModelUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
}

impl ModelUniforms {
    pub fn from_matrix(model: Mat4) -> Self {
        let normal_matrix = if model.determinant().abs() > f32::EPSILON {
            model.inverse().transpose()
        } else {
            Mat4::IDENTITY
        };
        Self {
            model: model.to_cols_array_2d(),
            normal_matrix: normal_matrix.to_cols_array_2d(),
        }
    }
}

struct PlacedModel {
    model: Model,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl PlacedModel {
    fn new(device: &wgpu::Device, label: &str, model: Model, layout: &wgpu::BindGroupLayout) -> Self {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Model Uniforms")),
            contents: bytemuck::bytes_of(&ModelUniforms::from_matrix(Mat4::IDENTITY)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label} Model Bind Group")),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        Self {
            model,
            uniform_buffer,
            bind_group,
        }
    }

    fn write(&self, queue: &wgpu::Queue, transform: &ModelTransform) {
        let uniforms = ModelUniforms::from_matrix(transform.matrix());
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }
}

/// Opaque lit pass for the room and the horse.
pub struct ScenePass {
    pipeline: wgpu::RenderPipeline,
    scene_buffer: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
    room: PlacedModel,
    horse: PlacedModel,
}

impl ScenePass {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color_format: wgpu::TextureFormat,
        room_path: &Path,
        horse_path: &Path,
    ) -> Result<Self, RenderError> {
        let scene_layout = uniform_layout(device, "Scene Uniform Layout", wgpu::ShaderStages::VERTEX_FRAGMENT);
        let model_layout = uniform_layout(device, "Model Uniform Layout", wgpu::ShaderStages::VERTEX);
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material Bind Group Layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline = capture_validation(device, || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Lighting Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/lighting.wgsl").into()),
            });
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Lighting Pipeline Layout"),
                bind_group_layouts: &[&scene_layout, &model_layout, &material_layout],
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Lighting Pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[ModelVertex::desc()],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: color_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: Some(wgpu::Face::Back),
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

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let color_space = TextureColorSpace::matching(color_format);
        let room = Model::load(device, queue, room_path, &material_layout, &sampler, color_space)?;
        let horse = Model::load(device, queue, horse_path, &material_layout, &sampler, color_space)?;

        let scene_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Uniforms"),
            size: std::mem::size_of::<SceneUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Bind Group"),
            layout: &scene_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_buffer.as_entire_binding(),
            }],
        });

        Ok(Self {
            pipeline,
            scene_buffer,
            scene_bind_group,
            room: PlacedModel::new(device, "Room", room, &model_layout),
            horse: PlacedModel::new(device, "Horse", horse, &model_layout),
        })
    }

    /// Uploads camera, lights and both model transforms for this frame.
    pub fn prepare(&self, queue: &wgpu::Queue, state: &ProgramState, aspect: f32) {
        let uniforms = SceneUniforms::from_state(state, aspect);
        queue.write_buffer(&self.scene_buffer, 0, bytemuck::bytes_of(&uniforms));
        self.room.write(queue, &state.room);
        self.horse.write(queue, &state.horse);
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.scene_bind_group, &[]);
        for placed in [&self.room, &self.horse] {
            pass.set_bind_group(1, &placed.bind_group, &[]);
            placed.model.draw(pass);
        }
    }
}

fn uniform_layout(
    device: &wgpu::Device,
    label: &str,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_sizes_match_shader_layout() {
        assert_eq!(std::mem::size_of::<GpuPointLight>(), 64);
        assert_eq!(std::mem::size_of::<SceneUniforms>(), 336);
        assert_eq!(std::mem::size_of::<ModelUniforms>(), 128);
    }

    #[test]
    fn scene_uniforms_carry_lights_in_order() {
        let state = ProgramState::new();
        let uniforms = SceneUniforms::from_state(&state, 800.0 / 600.0);
        assert_eq!(uniforms.shininess, 32.0);
        assert_eq!(uniforms.view_position, [0.0, 0.0, 3.0]);
        for (gpu, light) in uniforms.lights.iter().zip(state.point_lights.iter()) {
            assert_eq!(gpu.position, light.position.to_array());
            assert_eq!(gpu.attenuation_constant, 0.5);
            assert_eq!(gpu.attenuation_linear, 0.09);
            assert_eq!(gpu.attenuation_quadratic, 0.0036);
            assert_eq!(gpu.diffuse, [0.6, 0.6, 0.6]);
        }
    }

    #[test]
    fn normal_matrix_undoes_uniform_scale() {
        let transform = ModelTransform::new(Vec3::new(3.0, 0.0, 0.0), 0.5);
        let uniforms = ModelUniforms::from_matrix(transform.matrix());
        let normal_matrix = Mat4::from_cols_array_2d(&uniforms.normal_matrix);
        let n = normal_matrix.transform_vector3(Vec3::Y);
        assert!((n - Vec3::Y * 2.0).length() < 1e-5, "{n:?}");
    }

    #[test]
    fn degenerate_model_matrix_falls_back_to_identity_normals() {
        let uniforms = ModelUniforms::from_matrix(Mat4::ZERO);
        assert_eq!(uniforms.normal_matrix, Mat4::IDENTITY.to_cols_array_2d());
    }
}
