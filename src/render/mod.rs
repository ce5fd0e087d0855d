pub mod camera;
mod composite_pass;
mod egui_overlay;
mod glow_pass;
mod scene_pass;
mod target;

pub use camera::{CameraController, CameraMovement};
pub use egui_overlay::EguiFrameOutput;

use crate::assets::AssetError;
use crate::config::ResourcePaths;
use crate::scene::{GlowSprites, ProgramState};
use composite_pass::CompositePass;
use egui_overlay::EguiOverlay;
use glow_pass::GlowPass;
use scene_pass::ScenePass;
use std::sync::Arc;
use target::FrameTargets;
use winit::dpi::PhysicalSize;
use winit::window::Window;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create window surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no GPU adapter compatible with the window surface")]
    NoAdapter,
    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported formats")]
    UnsupportedSurface,
    #[error("pipeline creation failed: {0}")]
    Pipeline(String),
    #[error("render target creation failed: {0}")]
    Target(String),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("surface error: {0}")]
    Surface(wgpu::SurfaceError),
}

/// How a frame reaches the window.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FrameComposition {
    /// Scene passes draw offscreen; the composite pass copies (and optionally
    /// desaturates) the result onto the surface.
    #[default]
    PostProcessed,
    /// Scene passes draw straight into the surface. Grayscale has no effect.
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    Skipped,
}

/// Runs `build` inside a validation error scope and reports the first error.
pub(crate) fn capture_validation<T>(
    device: &wgpu::Device,
    build: impl FnOnce() -> T,
) -> Result<T, String> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = build();
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(err.to_string()),
        None => Ok(value),
    }
}

pub struct RenderContext {
    _window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    composition: FrameComposition,
    targets: FrameTargets,
    scene_pass: ScenePass,
    glow_pass: GlowPass,
    composite_pass: Option<CompositePass>,
    egui: EguiOverlay,
}

impl RenderContext {
    pub fn new(
        window: Arc<Window>,
        composition: FrameComposition,
        paths: &ResourcePaths,
        sprites: GlowSprites,
    ) -> Result<Self, RenderError> {
        pollster::block_on(Self::new_async(window, composition, paths, sprites))
    }

    async fn new_async(
        window: Arc<Window>,
        composition: FrameComposition,
        paths: &ResourcePaths,
        sprites: GlowSprites,
    ) -> Result<Self, RenderError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window.clone())?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::NoAdapter)?;
        let info = adapter.get_info();
        log::info!("GPU adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Lodge Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;
        device.on_uncaptured_error(Box::new(|err: wgpu::Error| {
            log::error!("Uncaptured GPU error: {}", err);
        }));

        let caps = surface.get_capabilities(&adapter);
        let format = choose_surface_format(&caps.formats).ok_or(RenderError::UnsupportedSurface)?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        log::info!(
            "Surface {}x{} {:?}, composition {:?}",
            config.width,
            config.height,
            format,
            composition
        );

        let offscreen = composition == FrameComposition::PostProcessed;
        let targets = FrameTargets::create(&device, format, config.width, config.height, offscreen)?;
        let scene_pass = ScenePass::new(
            &device,
            &queue,
            format,
            &paths.room_model,
            &paths.horse_model,
        )?;
        let glow_pass = GlowPass::new(&device, &queue, format, &paths.glow_texture, sprites)?;
        if glow_pass.sprites().is_empty() {
            log::warn!("No glow sprites to draw");
        } else {
            log::debug!("Glow pass ready with {} sprites", glow_pass.sprites().len());
        }
        let composite_pass = match targets.offscreen_color() {
            Some(source) => Some(CompositePass::new(&device, format, source)?),
            None => None,
        };
        let egui = EguiOverlay::new(&device, format);

        Ok(Self {
            _window: window,
            surface,
            device,
            queue,
            config,
            composition,
            targets,
            scene_pass,
            glow_pass,
            composite_pass,
            egui,
        })
    }

    pub fn composition(&self) -> FrameComposition {
        self.composition
    }

    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height.max(1) as f32
    }

    /// Reconfigures the surface and rebuilds the size-dependent targets.
    /// Zero-sized requests (minimized window) are ignored.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) -> Result<(), RenderError> {
        if new_size.width == 0 || new_size.height == 0 {
            return Ok(());
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);

        let offscreen = self.composition == FrameComposition::PostProcessed;
        self.targets = FrameTargets::create(
            &self.device,
            self.config.format,
            self.config.width,
            self.config.height,
            offscreen,
        )?;
        if let (Some(composite), Some(source)) =
            (&mut self.composite_pass, self.targets.offscreen_color())
        {
            composite.set_source(&self.device, source);
        }
        log::debug!("Resized to {}x{}", new_size.width, new_size.height);
        Ok(())
    }

    /// Records and presents one frame: opaque models, glow sprites, the
    /// composite (when post-processing) and finally the overlay.
    pub fn render_frame(
        &mut self,
        state: &ProgramState,
        overlay: Option<&EguiFrameOutput>,
    ) -> Result<FrameStatus, RenderError> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Ok(FrameStatus::Skipped);
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timeout, skipping frame");
                return Ok(FrameStatus::Skipped);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(RenderError::Surface(wgpu::SurfaceError::OutOfMemory));
            }
            Err(err) => {
                log::warn!("Surface error {}, skipping frame", err);
                return Ok(FrameStatus::Skipped);
            }
        };
        let surface_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let aspect = self.aspect();
        self.scene_pass.prepare(&self.queue, state, aspect);
        self.glow_pass.prepare(&self.queue, state, aspect);
        if let Some(composite) = &self.composite_pass {
            composite.prepare(&self.queue, state.grayscale_enabled);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let scene_color = self.targets.offscreen_color().unwrap_or(&surface_view);
        let [r, g, b] = state.clear_color;
        let clear = wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: 1.0,
        };

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Opaque Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: scene_color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.targets.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(0),
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            self.scene_pass.draw(&mut pass);
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Glow Sprite Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: scene_color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.targets.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Discard,
                    }),
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            self.glow_pass.draw(&mut pass);
        }

        if let Some(composite) = &self.composite_pass {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Composite Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            composite.draw(&mut pass);
        }

        let mut command_buffers = Vec::new();
        if let Some(output) = overlay {
            if state.overlay_enabled && !output.is_empty() {
                command_buffers = self.egui.paint(
                    &self.device,
                    &self.queue,
                    &mut encoder,
                    &surface_view,
                    output,
                );
            } else {
                self.egui.sync_textures(&self.device, &self.queue, output);
            }
        }
        command_buffers.push(encoder.finish());

        self.queue.submit(command_buffers);
        frame.present();
        Ok(FrameStatus::Presented)
    }
}

/// Prefers a non-sRGB format so shaded values reach the screen unconverted.
fn choose_surface_format(formats: &[wgpu::TextureFormat]) -> Option<wgpu::TextureFormat> {
    formats
        .iter()
        .copied()
        .find(|format| !format.is_srgb())
        .or_else(|| formats.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_format_prefers_unconverted_output() {
        let formats = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Bgra8Unorm,
        ];
        assert_eq!(
            choose_surface_format(&formats),
            Some(wgpu::TextureFormat::Bgra8Unorm)
        );
        assert_eq!(
            choose_surface_format(&[wgpu::TextureFormat::Rgba8UnormSrgb]),
            Some(wgpu::TextureFormat::Rgba8UnormSrgb)
        );
        assert_eq!(choose_surface_format(&[]), None);
    }

    #[test]
    fn default_composition_post_processes() {
        assert_eq!(FrameComposition::default(), FrameComposition::PostProcessed);
    }
}
