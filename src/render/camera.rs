use glam::{Mat4, Vec3};

pub const DEFAULT_POSITION: Vec3 = Vec3::new(0.0, 0.0, 3.0);
pub const DEFAULT_YAW: f32 = -90.0;
pub const DEFAULT_PITCH: f32 = 0.0;
pub const MOVE_SPEED: f32 = 2.5;
pub const LOOK_SENSITIVITY: f32 = 0.1;
pub const PITCH_LIMIT: f32 = 89.0;
pub const ZOOM_MIN: f32 = 1.0;
pub const ZOOM_MAX: f32 = 45.0;
pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 100.0;

const WORLD_UP: Vec3 = Vec3::Y;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraDirection {
    Forward,
    Backward,
    Left,
    Right,
}

/// Movement keys held during the current frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CameraMovement {
    pub move_forward: bool,
    pub move_backward: bool,
    pub move_left: bool,
    pub move_right: bool,
}

impl CameraMovement {
    pub fn is_idle(&self) -> bool {
        !(self.move_forward || self.move_backward || self.move_left || self.move_right)
    }
}

/// Free-fly camera. Angles are stored in degrees; the basis vectors are
/// recomputed whenever yaw or pitch change and are always unit length.
#[derive(Debug, Clone, Copy)]
pub struct CameraController {
    pub position: Vec3,
    yaw: f32,
    pitch: f32,
    zoom: f32,
    front: Vec3,
    right: Vec3,
    up: Vec3,
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new(DEFAULT_POSITION, DEFAULT_YAW, DEFAULT_PITCH)
    }
}

impl CameraController {
    pub fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        let pitch = pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        let (front, right, up) = camera_basis(yaw, pitch);
        Self {
            position,
            yaw,
            pitch,
            zoom: ZOOM_MAX,
            front,
            right,
            up,
        }
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Vertical field of view in degrees.
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        (self.front, self.right, self.up)
    }

    /// Re-aims the camera along `front`. Degenerate vectors are ignored.
    pub fn set_front(&mut self, front: Vec3) -> bool {
        let Some((yaw, pitch)) = forward_to_yaw_pitch(front) else {
            return false;
        };
        self.yaw = yaw;
        self.pitch = pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.update_basis();
        true
    }

    pub fn process_movement(&mut self, direction: CameraDirection, frame_dt: f32) {
        let velocity = MOVE_SPEED * frame_dt;
        match direction {
            CameraDirection::Forward => self.position += self.front * velocity,
            CameraDirection::Backward => self.position -= self.front * velocity,
            CameraDirection::Left => self.position -= self.right * velocity,
            CameraDirection::Right => self.position += self.right * velocity,
        }
    }

    pub fn update_movement(&mut self, input: &CameraMovement, frame_dt: f32) -> bool {
        if input.is_idle() {
            return false;
        }
        if input.move_forward {
            self.process_movement(CameraDirection::Forward, frame_dt);
        }
        if input.move_backward {
            self.process_movement(CameraDirection::Backward, frame_dt);
        }
        if input.move_left {
            self.process_movement(CameraDirection::Left, frame_dt);
        }
        if input.move_right {
            self.process_movement(CameraDirection::Right, frame_dt);
        }
        true
    }

    /// Applies a pointer delta in pixels. Positive `dy` looks up.
    pub fn process_look(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * LOOK_SENSITIVITY;
        self.pitch = (self.pitch + dy * LOOK_SENSITIVITY).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        wrap_yaw(&mut self.yaw);
        self.update_basis();
    }

    pub fn process_scroll(&mut self, dy: f32) {
        if !dy.is_finite() {
            return;
        }
        self.zoom = (self.zoom - dy).clamp(ZOOM_MIN, ZOOM_MAX);
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let aspect = if aspect.is_finite() && aspect > 0.0 {
            aspect
        } else {
            1.0
        };
        Mat4::perspective_rh(self.zoom.to_radians(), aspect, NEAR_PLANE, FAR_PLANE)
    }

    fn update_basis(&mut self) {
        let (front, right, up) = camera_basis(self.yaw, self.pitch);
        self.front = front;
        self.right = right;
        self.up = up;
    }
}

fn forward_to_yaw_pitch(forward: Vec3) -> Option<(f32, f32)> {
    if !forward.is_finite() || forward.length_squared() <= 1e-12 {
        return None;
    }
    let dir = forward.normalize();
    let yaw = dir.z.atan2(dir.x).to_degrees();
    let pitch = dir.y.clamp(-1.0, 1.0).asin().to_degrees();
    Some((yaw, pitch))
}

fn camera_basis(yaw: f32, pitch: f32) -> (Vec3, Vec3, Vec3) {
    let (yaw, pitch) = (yaw.to_radians(), pitch.to_radians());
    let front = Vec3::new(
        yaw.cos() * pitch.cos(),
        pitch.sin(),
        yaw.sin() * pitch.cos(),
    )
    .normalize();
    let right = front.cross(WORLD_UP).normalize();
    let up = right.cross(front).normalize();
    (front, right, up)
}

fn wrap_yaw(yaw: &mut f32) {
    if yaw.is_finite() {
        *yaw = (*yaw + 180.0).rem_euclid(360.0) - 180.0;
    }
}
