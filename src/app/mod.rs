mod egui_host;
mod input;
mod timing;

use crate::config::ViewerConfig;
use crate::render::{FrameStatus, RenderContext, RenderError};
use crate::scene::serialization::{load_or_default, save_state_to_file};
use crate::scene::{GlowSprites, ProgramState};
use egui_host::EguiHost;
use input::{CursorMode, InputAction, InputState};
use timing::FrameTiming;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, DeviceId, ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{CursorGrabMode, Window, WindowAttributes, WindowId};

const WINDOW_TITLE: &str = "The Black Lodge";
const PIXELS_PER_SCROLL_LINE: f32 = 40.0;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

pub struct App {
    config: ViewerConfig,
    state_path: PathBuf,
    window: Option<Arc<Window>>,
    render: Option<RenderContext>,
    egui: Option<EguiHost>,
    state: ProgramState,
    input: InputState,
    timing: FrameTiming,
    ui_wants_keyboard: bool,
    target_frame_duration: Duration,
    next_frame_time: Instant,
    fatal: Option<AppError>,
}

impl App {
    fn new(config: ViewerConfig) -> Self {
        let state_path = config.state_file_path();
        let state = ProgramState::from_persisted(&load_or_default(&state_path));
        let input = InputState::new(&state);
        Self {
            config,
            state_path,
            window: None,
            render: None,
            egui: None,
            state,
            input,
            timing: FrameTiming::new(WINDOW_TITLE.to_string()),
            ui_wants_keyboard: false,
            target_frame_duration: Duration::from_millis(16),
            next_frame_time: Instant::now(),
            fatal: None,
        }
    }

    fn init_window(&mut self, event_loop: &ActiveEventLoop) -> Result<(), AppError> {
        let (width, height) = self.config.window_size();
        let window_attrs = WindowAttributes::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(true);
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let sprites = GlowSprites::for_lights(&self.state.point_lights);
        let render = RenderContext::new(
            window.clone(),
            self.config.composition(),
            &self.config.resource_paths(),
            sprites,
        )?;
        log::info!("Frame composition {:?}", render.composition());
        self.egui = Some(EguiHost::new(&window));
        self.render = Some(render);
        apply_cursor_mode(&window, self.input.cursor_mode());
        self.update_target_frame_duration(&window);
        self.window = Some(window);
        log::info!("Viewer ready (F1 overlay, F2 grayscale, Esc quit)");
        Ok(())
    }

    /// Stops the loop; the error is reported by `run`'s caller.
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: AppError) {
        self.fatal = Some(err);
        event_loop.exit();
    }

    fn update_target_frame_duration(&mut self, window: &Window) {
        let mut target = Duration::from_millis(16);
        if let Some(millihz) = window
            .current_monitor()
            .and_then(|monitor| monitor.refresh_rate_millihertz())
        {
            let hz = millihz as f32 / 1000.0;
            if hz > 1.0 {
                target = Duration::from_secs_f32(1.0 / hz);
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    fn handle_resize(&mut self, event_loop: &ActiveEventLoop, new_size: PhysicalSize<u32>) {
        let result = match &mut self.render {
            Some(render) => render.resize(new_size),
            None => Ok(()),
        };
        if let Err(err) = result {
            self.fail(event_loop, err.into());
        }
    }

    fn handle_input_action(&mut self, event_loop: &ActiveEventLoop, action: InputAction) {
        match action {
            InputAction::None => {}
            InputAction::CursorModeChanged(mode) => {
                if let Some(window) = &self.window {
                    apply_cursor_mode(window, mode);
                }
            }
            InputAction::CloseRequested => event_loop.exit(),
        }
    }

    fn render(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(window), Some(render), Some(egui)) =
            (self.window.clone(), self.render.as_mut(), self.egui.as_mut())
        else {
            return;
        };

        let frame_dt = self.timing.update(Some(&window), Instant::now());
        self.input.apply_movement(&mut self.state, frame_dt);

        let overlay = egui.run_overlay(&window, &mut self.state);
        self.ui_wants_keyboard = self.state.overlay_enabled && overlay.wants_keyboard_input;

        let frame_start = Instant::now();
        match render.render_frame(&self.state, Some(&overlay)) {
            Ok(FrameStatus::Presented) => {
                self.timing
                    .set_render_ms(frame_start.elapsed().as_secs_f32() * 1000.0);
            }
            Ok(FrameStatus::Skipped) => {}
            Err(err) => self.fail(event_loop, err.into()),
        }
    }

    fn save_state(&self) {
        if self.config.no_save {
            log::info!("State saving disabled");
            return;
        }
        match save_state_to_file(&self.state.persisted(), &self.state_path) {
            Ok(()) => log::info!("Saved program state to {:?}", self.state_path),
            Err(err) => log::warn!("Failed to save program state to {:?}: {}", self.state_path, err),
        }
    }
}

fn apply_cursor_mode(window: &Window, mode: CursorMode) {
    match mode {
        CursorMode::Captured => {
            let grabbed = window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
            if let Err(err) = grabbed {
                log::warn!("Cursor grab unavailable: {}", err);
            }
            window.set_cursor_visible(false);
        }
        CursorMode::Free => {
            if let Err(err) = window.set_cursor_grab(CursorGrabMode::None) {
                log::warn!("Failed to release cursor: {}", err);
            }
            window.set_cursor_visible(true);
        }
    }
    log::debug!("Cursor mode {:?}", mode);
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init_window(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let egui_consumed = match (&mut self.egui, &self.window) {
            (Some(egui), Some(window)) if self.state.overlay_enabled => {
                egui.on_window_event(window, &event)
            }
            _ => false,
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Focused(focused) => {
                if !focused {
                    self.input.release_movement_keys();
                    self.input.forget_pointer();
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let pressed = event.state == ElementState::Pressed;
                let action = self.input.handle_key(
                    event.physical_key,
                    pressed,
                    event.repeat,
                    self.ui_wants_keyboard,
                    &mut self.state,
                );
                self.handle_input_action(event_loop, action);
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(event_loop, new_size);
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self.window.as_ref().map(|window| window.inner_size()) {
                    self.handle_resize(event_loop, size);
                }
            }
            WindowEvent::Moved(_) => {
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if egui_consumed {
                    self.input.forget_pointer();
                } else {
                    self.input
                        .handle_pointer(position.x as f32, position.y as f32, &mut self.state);
                }
            }
            WindowEvent::CursorLeft { .. } => {
                self.input.forget_pointer();
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if egui_consumed {
                    return;
                }
                let wheel_y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_SCROLL_LINE,
                };
                self.input.handle_scroll(wheel_y, &mut self.state);
            }
            WindowEvent::RedrawRequested => {
                self.render(event_loop);
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.input
                .handle_pointer_motion(dx as f32, dy as f32, &mut self.state);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        if now >= self.next_frame_time {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            self.next_frame_time = now + self.target_frame_duration;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if self.render.is_some() {
            self.save_state();
        }
    }
}

/// Runs the viewer until the window closes. The program state is saved on
/// the way out unless disabled.
pub fn run(config: ViewerConfig) -> Result<(), AppError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    if let Some(err) = app.fatal.take() {
        return Err(err);
    }
    Ok(())
}
