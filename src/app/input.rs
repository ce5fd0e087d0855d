use crate::render::CameraMovement;
use crate::scene::ProgramState;
use winit::keyboard::{KeyCode, PhysicalKey};

pub const OVERLAY_TOGGLE_KEY: KeyCode = KeyCode::F1;
pub const GRAYSCALE_TOGGLE_KEY: KeyCode = KeyCode::F2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    /// Hidden and locked to the window; pointer motion drives the camera.
    Captured,
    /// Visible and free so the overlay can be used.
    Free,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    None,
    CursorModeChanged(CursorMode),
    CloseRequested,
}

/// Converts absolute pointer positions into look deltas. The first sample
/// after a reset only seeds the tracker.
#[derive(Debug, Default, Clone, Copy)]
pub struct PointerTracker {
    last: Option<(f32, f32)>,
}

impl PointerTracker {
    /// Returns `(dx, dy)` with `dy` positive when the pointer moves up.
    pub fn sample(&mut self, x: f32, y: f32) -> (f32, f32) {
        let delta = match self.last {
            Some((last_x, last_y)) => (x - last_x, last_y - y),
            None => (0.0, 0.0),
        };
        self.last = Some((x, y));
        delta
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[derive(Debug, Clone)]
pub struct InputState {
    movement: CameraMovement,
    cursor_mode: CursorMode,
    pointer: PointerTracker,
    /// Cleared whenever `pointer` is reset; the first raw motion after that
    /// only sets it again, since a fresh grab can report a warp delta.
    motion_seeded: bool,
}

impl InputState {
    /// Starts captured unless the restored state already has the overlay on.
    /// In that case only the cursor is freed; camera-mouse-update is left as
    /// loaded.
    pub fn new(state: &ProgramState) -> Self {
        let cursor_mode = if state.overlay_enabled {
            CursorMode::Free
        } else {
            CursorMode::Captured
        };
        Self {
            movement: CameraMovement::default(),
            cursor_mode,
            pointer: PointerTracker::default(),
            motion_seeded: false,
        }
    }

    pub fn cursor_mode(&self) -> CursorMode {
        self.cursor_mode
    }

    /// Routes a keyboard event. Toggles fire on the press edge only; movement
    /// keys are level-triggered and skipped while `ui_wants_keyboard`.
    pub fn handle_key(
        &mut self,
        key: PhysicalKey,
        pressed: bool,
        repeat: bool,
        ui_wants_keyboard: bool,
        state: &mut ProgramState,
    ) -> InputAction {
        let PhysicalKey::Code(code) = key else {
            return InputAction::None;
        };
        let press_edge = pressed && !repeat;
        match code {
            KeyCode::Escape if pressed => InputAction::CloseRequested,
            OVERLAY_TOGGLE_KEY if press_edge => self.toggle_overlay(state),
            GRAYSCALE_TOGGLE_KEY if press_edge => {
                state.grayscale_enabled = !state.grayscale_enabled;
                log::debug!("Grayscale {}", state.grayscale_enabled);
                InputAction::None
            }
            KeyCode::KeyW | KeyCode::KeyS | KeyCode::KeyA | KeyCode::KeyD => {
                if ui_wants_keyboard && pressed {
                    return InputAction::None;
                }
                let slot = match code {
                    KeyCode::KeyW => &mut self.movement.move_forward,
                    KeyCode::KeyS => &mut self.movement.move_backward,
                    KeyCode::KeyA => &mut self.movement.move_left,
                    _ => &mut self.movement.move_right,
                };
                *slot = pressed;
                InputAction::None
            }
            _ => InputAction::None,
        }
    }

    fn toggle_overlay(&mut self, state: &mut ProgramState) -> InputAction {
        state.overlay_enabled = !state.overlay_enabled;
        let mode = if state.overlay_enabled {
            // Re-enabling is left to the overlay checkbox.
            state.camera_mouse_update_enabled = false;
            CursorMode::Free
        } else {
            CursorMode::Captured
        };
        log::debug!("Overlay {}", state.overlay_enabled);
        self.set_cursor_mode(mode);
        InputAction::CursorModeChanged(mode)
    }

    pub fn set_cursor_mode(&mut self, mode: CursorMode) {
        if self.cursor_mode != mode {
            self.cursor_mode = mode;
            self.forget_pointer();
        }
    }

    /// Absolute pointer position, used while the cursor is free.
    pub fn handle_pointer(&mut self, x: f32, y: f32, state: &mut ProgramState) {
        if self.cursor_mode != CursorMode::Free {
            return;
        }
        let (dx, dy) = self.pointer.sample(x, y);
        if state.camera_mouse_update_enabled {
            state.camera.process_look(dx, dy);
        }
    }

    /// Raw device motion, used while the cursor is captured. `dy` grows
    /// downward as reported by the platform.
    pub fn handle_pointer_motion(&mut self, dx: f32, dy: f32, state: &mut ProgramState) {
        if self.cursor_mode != CursorMode::Captured {
            return;
        }
        if !self.motion_seeded {
            self.motion_seeded = true;
            return;
        }
        if state.camera_mouse_update_enabled {
            state.camera.process_look(dx, -dy);
        }
    }

    pub fn handle_scroll(&mut self, dy: f32, state: &mut ProgramState) {
        state.camera.process_scroll(dy);
    }

    /// Applies held movement keys scaled by the frame time.
    pub fn apply_movement(&self, state: &mut ProgramState, frame_dt: f32) -> bool {
        state.camera.update_movement(&self.movement, frame_dt)
    }

    /// Drops held keys, e.g. when the window loses focus.
    pub fn release_movement_keys(&mut self) {
        self.movement = CameraMovement::default();
    }

    pub fn forget_pointer(&mut self) {
        self.pointer.reset();
        self.motion_seeded = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::camera::MOVE_SPEED;
    use glam::Vec3;

    fn press(input: &mut InputState, state: &mut ProgramState, code: KeyCode) -> InputAction {
        let action = input.handle_key(PhysicalKey::Code(code), true, false, false, state);
        input.handle_key(PhysicalKey::Code(code), false, false, false, state);
        action
    }

    #[test]
    fn overlay_toggle_twice_restores_mode_but_not_mouse_update() {
        let mut state = ProgramState::new();
        let mut input = InputState::new(&state);
        assert_eq!(input.cursor_mode(), CursorMode::Captured);

        let action = press(&mut input, &mut state, OVERLAY_TOGGLE_KEY);
        assert_eq!(action, InputAction::CursorModeChanged(CursorMode::Free));
        assert!(state.overlay_enabled);
        assert!(!state.camera_mouse_update_enabled);

        let action = press(&mut input, &mut state, OVERLAY_TOGGLE_KEY);
        assert_eq!(action, InputAction::CursorModeChanged(CursorMode::Captured));
        assert!(!state.overlay_enabled);
        assert_eq!(input.cursor_mode(), CursorMode::Captured);
        assert!(!state.camera_mouse_update_enabled);
    }

    #[test]
    fn key_repeat_does_not_retoggle() {
        let mut state = ProgramState::new();
        let mut input = InputState::new(&state);
        let key = PhysicalKey::Code(GRAYSCALE_TOGGLE_KEY);
        input.handle_key(key, true, false, false, &mut state);
        for _ in 0..5 {
            input.handle_key(key, true, true, false, &mut state);
        }
        input.handle_key(key, false, false, false, &mut state);
        assert!(state.grayscale_enabled);
    }

    #[test]
    fn grayscale_toggle_parity() {
        let mut state = ProgramState::new();
        let mut input = InputState::new(&state);
        for n in 1..=7 {
            press(&mut input, &mut state, GRAYSCALE_TOGGLE_KEY);
            assert_eq!(state.grayscale_enabled, n % 2 == 1);
        }
    }

    #[test]
    fn toggles_and_escape_ignore_ui_keyboard_capture() {
        let mut state = ProgramState::new();
        let mut input = InputState::new(&state);
        input.handle_key(PhysicalKey::Code(GRAYSCALE_TOGGLE_KEY), true, false, true, &mut state);
        assert!(state.grayscale_enabled);

        input.handle_key(PhysicalKey::Code(KeyCode::KeyW), true, false, true, &mut state);
        assert!(!input.apply_movement(&mut state, 1.0));

        let action = input.handle_key(PhysicalKey::Code(KeyCode::Escape), true, false, true, &mut state);
        assert_eq!(action, InputAction::CloseRequested);
    }

    #[test]
    fn first_pointer_sample_does_not_rotate() {
        let mut state = ProgramState::new();
        state.overlay_enabled = true;
        let mut input = InputState::new(&state);
        assert_eq!(input.cursor_mode(), CursorMode::Free);
        let front = state.camera.front();

        input.handle_pointer(640.0, 360.0, &mut state);
        assert_eq!(state.camera.front(), front);

        input.handle_pointer(650.0, 350.0, &mut state);
        assert!((state.camera.yaw() - (-89.0)).abs() < 1e-4);
        assert!((state.camera.pitch() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn first_pointer_motion_after_startup_does_not_rotate() {
        let mut state = ProgramState::new();
        let mut input = InputState::new(&state);
        assert_eq!(input.cursor_mode(), CursorMode::Captured);
        let front = state.camera.front();

        input.handle_pointer_motion(400.0, -300.0, &mut state);
        assert_eq!(state.camera.front(), front);
        assert_eq!(state.camera.yaw(), -90.0);

        input.handle_pointer_motion(10.0, 0.0, &mut state);
        assert!((state.camera.yaw() - (-89.0)).abs() < 1e-4);
    }

    #[test]
    fn pointer_motion_reseeds_after_mode_change_and_focus_loss() {
        let mut state = ProgramState::new();
        let mut input = InputState::new(&state);
        input.handle_pointer_motion(1.0, 0.0, &mut state);

        press(&mut input, &mut state, OVERLAY_TOGGLE_KEY);
        press(&mut input, &mut state, OVERLAY_TOGGLE_KEY);
        state.camera_mouse_update_enabled = true;
        let front = state.camera.front();
        input.handle_pointer_motion(250.0, 250.0, &mut state);
        assert_eq!(state.camera.front(), front);

        input.forget_pointer();
        input.handle_pointer_motion(-250.0, 80.0, &mut state);
        assert_eq!(state.camera.front(), front);

        input.handle_pointer_motion(0.0, -10.0, &mut state);
        assert!((state.camera.pitch() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn forgotten_pointer_does_not_replay_skipped_motion() {
        let mut state = ProgramState::new();
        state.overlay_enabled = true;
        let mut input = InputState::new(&state);
        input.handle_pointer(100.0, 100.0, &mut state);

        // Moves the overlay swallowed only reset the tracker.
        input.forget_pointer();
        let front = state.camera.front();
        input.handle_pointer(700.0, 500.0, &mut state);
        assert_eq!(state.camera.front(), front);

        input.handle_pointer(710.0, 500.0, &mut state);
        assert!((state.camera.yaw() - (-89.0)).abs() < 1e-4);
    }

    #[test]
    fn pointer_tracker_reseeds_after_reset() {
        let mut tracker = PointerTracker::default();
        assert_eq!(tracker.sample(10.0, 10.0), (0.0, 0.0));
        assert_eq!(tracker.sample(13.0, 4.0), (3.0, 6.0));
        tracker.reset();
        assert_eq!(tracker.sample(500.0, 500.0), (0.0, 0.0));
    }

    #[test]
    fn look_is_gated_by_camera_mouse_update() {
        let mut state = ProgramState::new();
        state.camera_mouse_update_enabled = false;
        let mut input = InputState::new(&state);
        input.handle_pointer_motion(5.0, 5.0, &mut state);
        let front = state.camera.front();
        input.handle_pointer_motion(100.0, 100.0, &mut state);
        assert_eq!(state.camera.front(), front);

        state.camera_mouse_update_enabled = true;
        input.handle_pointer_motion(0.0, -100.0, &mut state);
        assert!((state.camera.pitch() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn restored_overlay_frees_cursor_only() {
        let mut state = ProgramState::new();
        state.overlay_enabled = true;
        let input = InputState::new(&state);
        assert_eq!(input.cursor_mode(), CursorMode::Free);
        assert!(state.camera_mouse_update_enabled);
    }

    #[test]
    fn holding_forward_for_one_second_moves_by_speed() {
        let mut state = ProgramState::new();
        let mut input = InputState::new(&state);
        let start = state.camera.position;
        input.handle_key(PhysicalKey::Code(KeyCode::KeyW), true, false, false, &mut state);
        assert!(input.apply_movement(&mut state, 1.0));
        let moved = state.camera.position - start;
        assert!((moved - Vec3::NEG_Z * MOVE_SPEED).length() < 1e-5);

        input.release_movement_keys();
        assert!(!input.apply_movement(&mut state, 1.0));
    }
}
