use crate::render::CameraController;
use crate::scene::ProgramState;
use glam::Vec3;

const POSITION_DRAG_SPEED: f64 = 0.1;
const SCALE_DRAG_SPEED: f64 = 0.05;
const SCALE_RANGE: std::ops::RangeInclusive<f32> = 0.01..=4.0;

/// Draws the debug overlay windows and applies edits to `state` in place.
pub fn draw_overlay(ctx: &egui::Context, state: &mut ProgramState) {
    egui::Window::new("The Black Lodge")
        .default_pos([10.0, 10.0])
        .resizable(false)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.color_edit_button_rgb(&mut state.clear_color);
                ui.label("Background color");
            });
            drag_vec3(ui, "Room position", &mut state.room.position);
            drag_scale(ui, "Room scale", &mut state.room.scale);
            drag_vec3(ui, "Horse position", &mut state.horse.position);
            drag_scale(ui, "Horse scale", &mut state.horse.scale);
            ui.checkbox(&mut state.grayscale_enabled, "Grayscale");
        });

    egui::Window::new("Camera info")
        .default_pos([10.0, 220.0])
        .resizable(false)
        .show(ctx, |ui| {
            for line in camera_summary(&state.camera) {
                ui.label(line);
            }
            ui.checkbox(
                &mut state.camera_mouse_update_enabled,
                "Camera mouse update",
            );
        });
}

pub fn camera_summary(camera: &CameraController) -> [String; 4] {
    let p = camera.position;
    let f = camera.front();
    [
        format!("Camera position: ({:.3}, {:.3}, {:.3})", p.x, p.y, p.z),
        format!("(Yaw, Pitch): ({:.3}, {:.3})", camera.yaw(), camera.pitch()),
        format!("Camera front: ({:.3}, {:.3}, {:.3})", f.x, f.y, f.z),
        format!("Field of view: {:.1} deg", camera.zoom()),
    ]
}

fn drag_vec3(ui: &mut egui::Ui, label: &str, value: &mut Vec3) {
    ui.horizontal(|ui| {
        ui.add(egui::DragValue::new(&mut value.x).speed(POSITION_DRAG_SPEED));
        ui.add(egui::DragValue::new(&mut value.y).speed(POSITION_DRAG_SPEED));
        ui.add(egui::DragValue::new(&mut value.z).speed(POSITION_DRAG_SPEED));
        ui.label(label);
    });
}

fn drag_scale(ui: &mut egui::Ui, label: &str, value: &mut f32) {
    ui.horizontal(|ui| {
        ui.add(
            egui::DragValue::new(value)
                .speed(SCALE_DRAG_SPEED)
                .range(SCALE_RANGE),
        );
        ui.label(label);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_runs_headless_without_touching_state() {
        let ctx = egui::Context::default();
        let mut state = ProgramState::new();
        let before = state.clone();
        for _ in 0..3 {
            let _ = ctx.run(egui::RawInput::default(), |ctx| draw_overlay(ctx, &mut state));
        }
        assert_eq!(state.clear_color, before.clear_color);
        assert_eq!(state.room, before.room);
        assert_eq!(state.horse, before.horse);
        assert_eq!(state.grayscale_enabled, before.grayscale_enabled);
        assert_eq!(
            state.camera_mouse_update_enabled,
            before.camera_mouse_update_enabled
        );
    }

    #[test]
    fn camera_summary_reports_defaults() {
        let camera = CameraController::default();
        let lines = camera_summary(&camera);
        assert_eq!(lines[0], "Camera position: (0.000, 0.000, 3.000)");
        assert_eq!(lines[1], "(Yaw, Pitch): (-90.000, 0.000)");
        assert_eq!(lines[3], "Field of view: 45.0 deg");
    }
}
