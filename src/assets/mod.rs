//! OBJ model and texture loading.
//!
//! CPU-side decoding (`load_model_data`, `decode_texture`) is kept apart from
//! the GPU upload so it can be exercised without a device.

use std::path::{Path, PathBuf};
use wgpu::util::DeviceExt;

const MISSING_TEXTURE_RGBA: [u8; 4] = [255, 0, 255, 255];
const DEFAULT_DIFFUSE_RGBA: [u8; 4] = [255, 255, 255, 255];
const DEFAULT_SPECULAR_RGBA: [u8; 4] = [0, 0, 0, 255];

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to load OBJ at {path}: {source}")]
    Obj {
        path: String,
        #[source]
        source: tobj::LoadError,
    },
    #[error("OBJ at {path} contains no triangles")]
    EmptyModel { path: String },
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl ModelVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Row order applied while decoding an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrder {
    AsStored,
    /// Bottom row first, for quads authored with a bottom-left UV origin.
    FlipVertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureColorSpace {
    Srgb,
    /// Sampled values are the stored bytes.
    Linear,
}

impl TextureColorSpace {
    /// Picks the space that keeps stored texel values unchanged on screen
    /// when rendered to `surface`.
    pub fn matching(surface: wgpu::TextureFormat) -> Self {
        if surface.is_srgb() {
            Self::Srgb
        } else {
            Self::Linear
        }
    }

    fn format(self) -> wgpu::TextureFormat {
        match self {
            Self::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            Self::Linear => wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureData {
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            rgba: rgba.to_vec(),
        }
    }

    pub fn missing() -> Self {
        Self::solid(MISSING_TEXTURE_RGBA)
    }
}

pub fn decode_texture(path: &Path, row_order: RowOrder) -> Result<TextureData, image::ImageError> {
    let mut image = image::open(path)?;
    if row_order == RowOrder::FlipVertical {
        image = image.flipv();
    }
    let rgba = image.to_rgba8();
    Ok(TextureData {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    })
}

/// Decodes `path`, or returns the magenta placeholder when it cannot be read.
pub fn decode_texture_or_missing(path: &Path, row_order: RowOrder) -> TextureData {
    match decode_texture(path, row_order) {
        Ok(data) => data,
        Err(err) => {
            log::warn!("Failed to load texture {:?}: {}", path, err);
            TextureData::missing()
        }
    }
}

pub struct GpuTexture {
    _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

pub fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    data: &TextureData,
    color_space: TextureColorSpace,
) -> GpuTexture {
    let size = wgpu::Extent3d {
        width: data.width.max(1),
        height: data.height.max(1),
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: color_space.format(),
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &data.rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * size.width),
            rows_per_image: Some(size.height),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture {
        _texture: texture,
        view,
    }
}

/// Loads and uploads an image. Decode failures are logged and yield a 1x1
/// magenta texture.
pub fn load_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    path: &Path,
    row_order: RowOrder,
    color_space: TextureColorSpace,
) -> GpuTexture {
    let data = decode_texture_or_missing(path, row_order);
    upload_texture(device, queue, &path.display().to_string(), &data, color_space)
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub material_index: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialData {
    pub name: String,
    pub diffuse_texture: Option<PathBuf>,
    pub specular_texture: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelData {
    pub meshes: Vec<MeshData>,
    pub materials: Vec<MaterialData>,
}

impl ModelData {
    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.indices.len() / 3).sum()
    }
}

/// Parses an OBJ and its MTL library. Texture paths are resolved against the
/// OBJ's directory and texture coordinates are flipped to a top-left origin.
pub fn load_model_data(path: &Path) -> Result<ModelData, AssetError> {
    let load_options = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    };
    let (models, materials) =
        tobj::load_obj(path, &load_options).map_err(|source| AssetError::Obj {
            path: path.display().to_string(),
            source,
        })?;
    let materials = materials.unwrap_or_else(|err| {
        log::warn!("No usable materials for {:?}: {}", path, err);
        Vec::new()
    });

    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let materials: Vec<MaterialData> = materials
        .into_iter()
        .map(|material| MaterialData {
            name: material.name,
            diffuse_texture: material.diffuse_texture.map(|p| base_dir.join(p)),
            specular_texture: material.specular_texture.map(|p| base_dir.join(p)),
        })
        .collect();

    let meshes: Vec<MeshData> = models
        .into_iter()
        .filter(|model| !model.mesh.indices.is_empty())
        .map(|model| mesh_from_obj(model.mesh, materials.len()))
        .collect();

    if meshes.is_empty() {
        return Err(AssetError::EmptyModel {
            path: path.display().to_string(),
        });
    }
    Ok(ModelData { meshes, materials })
}

fn mesh_from_obj(mesh: tobj::Mesh, material_count: usize) -> MeshData {
    let vertex_count = mesh.positions.len() / 3;
    let has_normals = mesh.normals.len() == mesh.positions.len();
    let has_uvs = mesh.texcoords.len() / 2 == vertex_count;

    let normals = if has_normals {
        mesh.normals
            .chunks_exact(3)
            .map(|n| [n[0], n[1], n[2]])
            .collect()
    } else {
        compute_vertex_normals(&mesh.positions, &mesh.indices)
    };

    let vertices = (0..vertex_count)
        .map(|i| {
            let uv = if has_uvs {
                [mesh.texcoords[i * 2], 1.0 - mesh.texcoords[i * 2 + 1]]
            } else {
                [0.0, 0.0]
            };
            ModelVertex {
                position: [
                    mesh.positions[i * 3],
                    mesh.positions[i * 3 + 1],
                    mesh.positions[i * 3 + 2],
                ],
                normal: normals[i],
                uv,
            }
        })
        .collect();

    MeshData {
        vertices,
        indices: mesh.indices,
        material_index: mesh.material_id.filter(|&id| id < material_count),
    }
}

/// Area-weighted vertex normals; isolated vertices get +Y.
fn compute_vertex_normals(positions: &[f32], indices: &[u32]) -> Vec<[f32; 3]> {
    let vertex_count = positions.len() / 3;
    let point = |i: usize| glam::Vec3::from_slice(&positions[i * 3..i * 3 + 3]);
    let mut accum = vec![glam::Vec3::ZERO; vertex_count];

    for tri in indices.chunks_exact(3) {
        let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
            continue;
        }
        let face = (point(i1) - point(i0)).cross(point(i2) - point(i0));
        for idx in [i0, i1, i2] {
            accum[idx] += face;
        }
    }

    accum
        .into_iter()
        .map(|n| n.try_normalize().unwrap_or(glam::Vec3::Y).to_array())
        .collect()
}

pub struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    material_index: usize,
}

pub struct Material {
    bind_group: wgpu::BindGroup,
}

/// Uploaded model. The last material is the fallback for meshes without one.
pub struct Model {
    meshes: Vec<GpuMesh>,
    materials: Vec<Material>,
}

impl Model {
    /// `material_layout` must declare the diffuse texture at binding 0, the
    /// specular texture at 1 and a filtering sampler at 2.
    pub fn load(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: &Path,
        material_layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        color_space: TextureColorSpace,
    ) -> Result<Self, AssetError> {
        let data = load_model_data(path)?;
        log::info!(
            "Loaded {:?}: {} meshes, {} materials, {} triangles",
            path,
            data.meshes.len(),
            data.materials.len(),
            data.triangle_count()
        );

        let mut materials: Vec<Material> = data
            .materials
            .iter()
            .map(|material| {
                let diffuse = material_texture(
                    device,
                    queue,
                    material.diffuse_texture.as_deref(),
                    DEFAULT_DIFFUSE_RGBA,
                    color_space,
                );
                let specular = material_texture(
                    device,
                    queue,
                    material.specular_texture.as_deref(),
                    DEFAULT_SPECULAR_RGBA,
                    color_space,
                );
                Material::new(device, &material.name, material_layout, &diffuse, &specular, sampler)
            })
            .collect();
        let fallback_index = materials.len();
        let white = upload_texture(
            device,
            queue,
            "Default Diffuse",
            &TextureData::solid(DEFAULT_DIFFUSE_RGBA),
            color_space,
        );
        let black = upload_texture(
            device,
            queue,
            "Default Specular",
            &TextureData::solid(DEFAULT_SPECULAR_RGBA),
            color_space,
        );
        materials.push(Material::new(
            device,
            "default",
            material_layout,
            &white,
            &black,
            sampler,
        ));

        let label = path.display().to_string();
        let meshes = data
            .meshes
            .iter()
            .map(|mesh| GpuMesh {
                vertex_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{label} Vertex Buffer")),
                    contents: bytemuck::cast_slice(&mesh.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                index_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{label} Index Buffer")),
                    contents: bytemuck::cast_slice(&mesh.indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
                index_count: mesh.indices.len() as u32,
                material_index: mesh.material_index.unwrap_or(fallback_index),
            })
            .collect();

        Ok(Self { meshes, materials })
    }

    /// Draws every mesh. Material textures go to bind group 2; the caller
    /// binds the pipeline and groups 0 and 1.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        for mesh in &self.meshes {
            let Some(material) = self.materials.get(mesh.material_index) else {
                continue;
            };
            pass.set_bind_group(2, &material.bind_group, &[]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }
}

impl Material {
    fn new(
        device: &wgpu::Device,
        name: &str,
        layout: &wgpu::BindGroupLayout,
        diffuse: &GpuTexture,
        specular: &GpuTexture,
        sampler: &wgpu::Sampler,
    ) -> Self {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("Material {name}")),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&diffuse.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&specular.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });
        Self { bind_group }
    }
}

fn material_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    path: Option<&Path>,
    fallback: [u8; 4],
    color_space: TextureColorSpace,
) -> GpuTexture {
    match path {
        Some(path) => load_texture(device, queue, path, RowOrder::AsStored, color_space),
        None => upload_texture(
            device,
            queue,
            "Material Placeholder",
            &TextureData::solid(fallback),
            color_space,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        path.push(format!("lodge_assets_{}_{}_{}", tag, std::process::id(), nonce));
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    const QUAD_OBJ: &str = "mtllib quad.mtl
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
usemtl wall
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    const QUAD_MTL: &str = "newmtl wall
map_Kd wall_diffuse.png
map_Ks wall_specular.png
";

    #[test]
    fn obj_is_triangulated_with_flipped_uvs() {
        let dir = temp_dir("quad");
        std::fs::write(dir.join("quad.obj"), QUAD_OBJ).unwrap();
        std::fs::write(dir.join("quad.mtl"), QUAD_MTL).unwrap();

        let data = load_model_data(&dir.join("quad.obj")).unwrap();
        let _ = std::fs::remove_dir_all(&dir);

        assert_eq!(data.meshes.len(), 1);
        assert_eq!(data.triangle_count(), 2);
        let mesh = &data.meshes[0];
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.material_index, Some(0));
        for vertex in &mesh.vertices {
            let expected_v = 1.0 - vertex.position[1];
            assert_eq!(vertex.uv, [vertex.position[0], expected_v]);
            assert_eq!(vertex.normal, [0.0, 0.0, 1.0]);
        }

        let material = &data.materials[0];
        assert_eq!(material.name, "wall");
        assert_eq!(material.diffuse_texture, Some(dir.join("wall_diffuse.png")));
        assert_eq!(material.specular_texture, Some(dir.join("wall_specular.png")));
    }

    #[test]
    fn missing_normals_are_generated_from_faces() {
        let dir = temp_dir("nonormals");
        let obj = "v 0 0 0\nv 1 0 0\nv 0 0 -1\nf 1 2 3\n";
        std::fs::write(dir.join("tri.obj"), obj).unwrap();
        let data = load_model_data(&dir.join("tri.obj")).unwrap();
        let _ = std::fs::remove_dir_all(&dir);

        let mesh = &data.meshes[0];
        assert_eq!(mesh.material_index, None);
        for vertex in &mesh.vertices {
            assert_eq!(vertex.normal, [0.0, 1.0, 0.0]);
            assert_eq!(vertex.uv, [0.0, 0.0]);
        }
    }

    #[test]
    fn missing_obj_is_an_error() {
        let dir = temp_dir("missing");
        let result = load_model_data(&dir.join("absent.obj"));
        let _ = std::fs::remove_dir_all(&dir);
        assert!(matches!(result, Err(AssetError::Obj { .. })));
    }

    #[test]
    fn obj_without_faces_is_rejected() {
        let dir = temp_dir("empty");
        std::fs::write(dir.join("points.obj"), "v 0 0 0\nv 1 0 0\n").unwrap();
        let result = load_model_data(&dir.join("points.obj"));
        let _ = std::fs::remove_dir_all(&dir);
        assert!(matches!(result, Err(AssetError::EmptyModel { .. })));
    }

    #[test]
    fn texture_rows_flip_on_request() {
        let dir = temp_dir("flip");
        let path = dir.join("stripes.png");
        let mut image = image::RgbaImage::new(1, 2);
        image.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        image.put_pixel(0, 1, image::Rgba([0, 0, 255, 255]));
        image.save(&path).unwrap();

        let stored = decode_texture(&path, RowOrder::AsStored).unwrap();
        let flipped = decode_texture(&path, RowOrder::FlipVertical).unwrap();
        let _ = std::fs::remove_dir_all(&dir);

        assert_eq!(&stored.rgba[..4], &[255, 0, 0, 255]);
        assert_eq!(&flipped.rgba[..4], &[0, 0, 255, 255]);
        assert_eq!((flipped.width, flipped.height), (1, 2));
    }

    #[test]
    fn undecodable_texture_becomes_magenta() {
        let dir = temp_dir("broken");
        let path = dir.join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();
        let data = decode_texture_or_missing(&path, RowOrder::AsStored);
        let _ = std::fs::remove_dir_all(&dir);
        assert_eq!(data, TextureData::missing());
    }

    #[test]
    fn vertex_layout_matches_struct() {
        let layout = ModelVertex::desc();
        assert_eq!(layout.array_stride, 32);
        assert_eq!(layout.attributes[2].offset, 24);
    }

    #[test]
    fn texture_color_space_follows_surface() {
        let srgb = TextureColorSpace::matching(wgpu::TextureFormat::Bgra8UnormSrgb);
        assert_eq!(srgb.format(), wgpu::TextureFormat::Rgba8UnormSrgb);
        let linear = TextureColorSpace::matching(wgpu::TextureFormat::Bgra8Unorm);
        assert_eq!(linear.format(), wgpu::TextureFormat::Rgba8Unorm);
    }
}
