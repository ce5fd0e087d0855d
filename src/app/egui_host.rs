use crate::render::EguiFrameOutput;
use crate::scene::ProgramState;
use egui_winit::winit::event::WindowEvent;
use winit::window::Window;

/// Owns the egui context and its winit integration. Runs the overlay UI and
/// tessellates it for the painter.
pub struct EguiHost {
    context: egui::Context,
    winit_state: egui_winit::State,
}

impl EguiHost {
    pub fn new(window: &Window) -> Self {
        let context = egui::Context::default();
        let viewport_id = egui::ViewportId::ROOT;
        let winit_state = egui_winit::State::new(
            context.clone(),
            viewport_id,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        Self {
            context,
            winit_state,
        }
    }

    /// Forwards a window event; returns true when egui consumed it.
    pub fn on_window_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        self.winit_state.on_window_event(window, event).consumed
    }

    /// Runs one overlay frame. While the overlay is hidden egui still runs
    /// with an empty UI so its input and texture state stay in step.
    pub fn run_overlay(&mut self, window: &Window, state: &mut ProgramState) -> EguiFrameOutput {
        let visible = state.overlay_enabled;
        self.run_ui(window, |ctx| {
            if visible {
                crate::ui::draw_overlay(ctx, state);
            }
        })
    }

    fn run_ui<F>(&mut self, window: &Window, run_ui: F) -> EguiFrameOutput
    where
        F: FnMut(&egui::Context),
    {
        let raw_input = self.winit_state.take_egui_input(window);
        let full_output = self.context.run(raw_input, run_ui);
        self.winit_state
            .handle_platform_output(window, full_output.platform_output.clone());
        let pixels_per_point = full_output.pixels_per_point;
        let clipped_primitives = self
            .context
            .tessellate(full_output.shapes, pixels_per_point);
        let size = window.inner_size();

        EguiFrameOutput {
            clipped_primitives,
            textures_delta: full_output.textures_delta,
            pixels_per_point,
            screen_size_px: [size.width.max(1), size.height.max(1)],
            wants_keyboard_input: self.context.wants_keyboard_input(),
        }
    }
}
