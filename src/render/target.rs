use super::{capture_validation, RenderError};

pub const DEPTH_STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

pub struct DepthStencilBuffer {
    _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl DepthStencilBuffer {
    fn new(device: &wgpu::Device, size: wgpu::Extent3d, label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_STENCIL_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

/// Color + depth/stencil pair the scene passes render into before the
/// composite pass samples it.
pub struct OffscreenTarget {
    _color: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    pub depth: DepthStencilBuffer,
}

/// Where the scene passes draw for a given frame composition.
pub enum FrameTargets {
    Offscreen(OffscreenTarget),
    /// Scene passes draw straight into the surface; only depth is owned here.
    Direct(DepthStencilBuffer),
}

impl FrameTargets {
    pub fn create(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        offscreen: bool,
    ) -> Result<Self, RenderError> {
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };
        capture_validation(device, || {
            let depth = DepthStencilBuffer::new(device, size, "Scene Depth Stencil");
            if !offscreen {
                return FrameTargets::Direct(depth);
            }
            let color = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Offscreen Color"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
            FrameTargets::Offscreen(OffscreenTarget {
                _color: color,
                color_view,
                depth,
            })
        })
        .map_err(RenderError::Target)
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        match self {
            FrameTargets::Offscreen(target) => &target.depth.view,
            FrameTargets::Direct(depth) => &depth.view,
        }
    }

    /// Color view the scene passes write, or `None` when that is the surface.
    pub fn offscreen_color(&self) -> Option<&wgpu::TextureView> {
        match self {
            FrameTargets::Offscreen(target) => Some(&target.color_view),
            FrameTargets::Direct(_) => None,
        }
    }
}
