/// Tessellated overlay for one frame, produced by the egui host and consumed
/// by the painter.
pub struct EguiFrameOutput {
    pub clipped_primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
    pub screen_size_px: [u32; 2],
    pub wants_keyboard_input: bool,
}

impl EguiFrameOutput {
    pub fn is_empty(&self) -> bool {
        self.clipped_primitives.is_empty()
            && self.textures_delta.set.is_empty()
            && self.textures_delta.free.is_empty()
    }
}

/// Paints egui output on top of whatever the surface already holds.
pub struct EguiOverlay {
    renderer: egui_wgpu::Renderer,
}

impl EguiOverlay {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        Self {
            renderer: egui_wgpu::Renderer::new(device, surface_format, None, 1, false),
        }
    }

    /// Records the overlay pass into `encoder`. Any extra command buffers egui
    /// needs are returned so they can be submitted ahead of the encoder.
    pub fn paint(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        output: &EguiFrameOutput,
    ) -> Vec<wgpu::CommandBuffer> {
        for (id, image_delta) in &output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: output.screen_size_px,
            pixels_per_point: output.pixels_per_point,
        };
        let extra_buffers = self.renderer.update_buffers(
            device,
            queue,
            encoder,
            &output.clipped_primitives,
            &screen_descriptor,
        );

        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            self.renderer.render(
                &mut render_pass.forget_lifetime(),
                &output.clipped_primitives,
                &screen_descriptor,
            );
        }

        for id in &output.textures_delta.free {
            self.renderer.free_texture(id);
        }
        extra_buffers
    }

    /// Keeps the texture atlas in step on frames where nothing is painted.
    pub fn sync_textures(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        output: &EguiFrameOutput,
    ) {
        for (id, image_delta) in &output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }
        for id in &output.textures_delta.free {
            self.renderer.free_texture(id);
        }
    }
}
