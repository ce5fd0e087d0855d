pub mod serialization;

use crate::render::CameraController;
use glam::{Mat4, Vec3};
use serialization::PersistedState;

pub const MATERIAL_SHININESS: f32 = 32.0;
pub const GLOW_SPRITE_SCALE: f32 = 1.5;

/// Point light with Phong color terms and distance attenuation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl PointLight {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ambient: Vec3::splat(0.2),
            diffuse: Vec3::splat(0.6),
            specular: Vec3::splat(1.0),
            constant: 0.5,
            linear: 0.09,
            quadratic: 0.0036,
        }
    }
}

pub fn default_point_lights() -> [PointLight; 3] {
    [
        PointLight::at(Vec3::new(5.6, 8.7, 26.5)),
        PointLight::at(Vec3::new(20.0, 8.7, 26.5)),
        PointLight::at(Vec3::new(-37.0, 4.0, -35.0)),
    ]
}

/// Placement of one of the hardcoded models: translation plus uniform scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelTransform {
    pub position: Vec3,
    pub scale: f32,
}

impl ModelTransform {
    pub const fn new(position: Vec3, scale: f32) -> Self {
        Self { position, scale }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position) * Mat4::from_scale(Vec3::splat(self.scale))
    }
}

pub const DEFAULT_ROOM: ModelTransform = ModelTransform::new(Vec3::ZERO, 0.5);
pub const DEFAULT_HORSE: ModelTransform = ModelTransform::new(Vec3::new(-37.0, 0.0, -35.0), 0.05);

/// Everything that changes between frames. The application owns the only
/// instance and lends it to the input router, the overlay and the renderer.
#[derive(Debug, Clone)]
pub struct ProgramState {
    pub clear_color: [f32; 3],
    pub overlay_enabled: bool,
    pub grayscale_enabled: bool,
    pub camera_mouse_update_enabled: bool,
    pub camera: CameraController,
    pub room: ModelTransform,
    pub horse: ModelTransform,
    pub point_lights: [PointLight; 3],
}

impl Default for ProgramState {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0],
            overlay_enabled: false,
            grayscale_enabled: false,
            camera_mouse_update_enabled: true,
            camera: CameraController::default(),
            room: DEFAULT_ROOM,
            horse: DEFAULT_HORSE,
            point_lights: default_point_lights(),
        }
    }
}

impl ProgramState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the fields that survive a restart.
    pub fn persisted(&self) -> PersistedState {
        PersistedState {
            version: serialization::STATE_FORMAT_VERSION,
            clear_color: self.clear_color,
            overlay_enabled: self.overlay_enabled,
            grayscale_enabled: self.grayscale_enabled,
            camera_position: self.camera.position.to_array(),
            camera_front: self.camera.front().to_array(),
        }
    }

    /// Restores the persisted subset. Camera-mouse-update, model transforms
    /// and lights keep their compiled defaults.
    pub fn apply_persisted(&mut self, persisted: &PersistedState) {
        self.clear_color = persisted.clear_color;
        self.overlay_enabled = persisted.overlay_enabled;
        self.grayscale_enabled = persisted.grayscale_enabled;
        self.camera.position = Vec3::from_array(persisted.camera_position);
        if !self.camera.set_front(Vec3::from_array(persisted.camera_front)) {
            log::warn!(
                "Ignoring degenerate camera front {:?}",
                persisted.camera_front
            );
        }
    }

    pub fn from_persisted(persisted: &PersistedState) -> Self {
        let mut state = Self::default();
        state.apply_persisted(persisted);
        state
    }
}

/// World positions of the light-glow billboards.
#[derive(Debug, Clone, PartialEq)]
pub struct GlowSprites {
    positions: Vec<Vec3>,
}

impl GlowSprites {
    pub fn new(positions: Vec<Vec3>) -> Self {
        Self { positions }
    }

    /// One sprite on each of the first two point lights.
    pub fn for_lights(lights: &[PointLight]) -> Self {
        Self::new(lights.iter().take(2).map(|light| light.position).collect())
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Reorders the sprites farthest-first and returns them in draw order.
    pub fn sort_back_to_front(&mut self, camera_position: Vec3) -> &[Vec3] {
        sort_back_to_front(&mut self.positions, camera_position);
        &self.positions
    }
}

pub fn sort_back_to_front(positions: &mut [Vec3], camera_position: Vec3) {
    positions.sort_by(|a, b| {
        b.distance_squared(camera_position)
            .total_cmp(&a.distance_squared(camera_position))
    });
}

/// Model matrix of a glow billboard: translate, quarter turn about Y, scale.
pub fn glow_sprite_matrix(position: Vec3) -> Mat4 {
    Mat4::from_translation(position)
        * Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2)
        * Mat4::from_scale(Vec3::splat(GLOW_SPRITE_SCALE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_farthest_first(positions: &[Vec3], camera: Vec3) {
        for pair in positions.windows(2) {
            assert!(
                pair[0].distance(camera) >= pair[1].distance(camera),
                "{:?} drawn before {:?} for camera {:?}",
                pair[0],
                pair[1],
                camera
            );
        }
    }

    fn permutations(items: &[Vec3]) -> Vec<Vec<Vec3>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head);
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn sort_orders_every_permutation_farthest_first() {
        let sprites = [
            Vec3::new(5.6, 8.7, 26.5),
            Vec3::new(20.0, 8.7, 26.5),
            Vec3::new(-3.0, 0.5, 1.0),
            Vec3::new(0.0, 0.0, -40.0),
        ];
        let cameras = [
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, 3.0),
            Vec3::new(30.0, 10.0, 30.0),
            Vec3::new(-50.0, -2.0, -50.0),
            Vec3::new(12.8, 8.7, 26.5),
        ];
        for camera in cameras {
            for mut order in permutations(&sprites) {
                sort_back_to_front(&mut order, camera);
                assert_farthest_first(&order, camera);
                assert_eq!(order.len(), sprites.len());
            }
        }
    }

    #[test]
    fn glow_sprites_resort_when_camera_crosses_over() {
        let lights = default_point_lights();
        let mut sprites = GlowSprites::for_lights(&lights);
        assert_eq!(sprites.len(), 2);

        let near_first = Vec3::new(0.0, 8.7, 26.5);
        let order = sprites.sort_back_to_front(near_first).to_vec();
        assert_eq!(order, vec![lights[1].position, lights[0].position]);

        let near_second = Vec3::new(30.0, 8.7, 26.5);
        let order = sprites.sort_back_to_front(near_second).to_vec();
        assert_eq!(order, vec![lights[0].position, lights[1].position]);
    }

    #[test]
    fn default_state_matches_compiled_defaults() {
        let state = ProgramState::new();
        assert_eq!(state.clear_color, [0.0, 0.0, 0.0]);
        assert!(!state.overlay_enabled);
        assert!(!state.grayscale_enabled);
        assert!(state.camera_mouse_update_enabled);
        assert_eq!(state.room, DEFAULT_ROOM);
        assert_eq!(state.horse, DEFAULT_HORSE);
        assert_eq!(state.point_lights, default_point_lights());
        assert_eq!(state.camera.position, Vec3::new(0.0, 0.0, 3.0));
    }

    #[test]
    fn apply_persisted_leaves_unpersisted_fields_at_defaults() {
        let mut state = ProgramState::new();
        state.room.scale = 3.0;
        state.horse.position = Vec3::splat(9.0);
        state.camera_mouse_update_enabled = false;
        state.point_lights[0].diffuse = Vec3::ONE;

        let restored = ProgramState::from_persisted(&state.persisted());
        assert_eq!(restored.room, DEFAULT_ROOM);
        assert_eq!(restored.horse, DEFAULT_HORSE);
        assert!(restored.camera_mouse_update_enabled);
        assert_eq!(restored.point_lights, default_point_lights());
    }

    #[test]
    fn model_matrix_translates_after_scaling() {
        let transform = ModelTransform::new(Vec3::new(1.0, 2.0, 3.0), 0.5);
        let p = transform.matrix().transform_point3(Vec3::new(2.0, 2.0, 2.0));
        assert!((p - Vec3::new(2.0, 3.0, 4.0)).length() < 1e-6);
    }

    #[test]
    fn glow_matrix_turns_quad_to_face_x_axis() {
        let m = glow_sprite_matrix(Vec3::new(10.0, 0.0, 0.0));
        let edge = m.transform_point3(Vec3::new(0.5, 0.0, 0.0));
        let expected = Vec3::new(10.0, 0.0, -0.5 * GLOW_SPRITE_SCALE);
        assert!((edge - expected).length() < 1e-5, "{edge:?}");
    }
}
