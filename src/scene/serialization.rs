use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

pub const STATE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StateFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("state file root is not a JSON object")]
    NotAnObject,
}

pub type Result<T> = std::result::Result<T, StateFileError>;

/// The subset of `ProgramState` that survives a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    pub clear_color: [f32; 3],
    pub overlay_enabled: bool,
    pub grayscale_enabled: bool,
    pub camera_position: [f32; 3],
    pub camera_front: [f32; 3],
}

impl Default for PersistedState {
    fn default() -> Self {
        crate::scene::ProgramState::default().persisted()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: &'static str,
    pub reason: String,
}

/// Result of a lenient load: the decoded record plus every field that fell
/// back to its default.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub state: PersistedState,
    pub rejected_fields: Vec<FieldIssue>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.rejected_fields.is_empty()
    }
}

pub fn save_state_to_file(state: &PersistedState, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(state)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn load_state_from_file(path: &Path) -> Result<LoadReport> {
    let json = std::fs::read_to_string(path)?;
    decode_state(&json)
}

/// Decodes each field on its own so one bad value does not discard the rest.
pub fn decode_state(json: &str) -> Result<LoadReport> {
    let root: Value = serde_json::from_str(json)?;
    let Value::Object(fields) = root else {
        return Err(StateFileError::NotAnObject);
    };

    let mut state = PersistedState::default();
    let mut rejected = Vec::new();

    let version: Option<u32> = read_field(&fields, "version", &mut rejected, |_| Ok(()));
    if let Some(version) = version {
        if version != STATE_FORMAT_VERSION {
            log::warn!(
                "State file version {} differs from {}, decoding anyway",
                version,
                STATE_FORMAT_VERSION
            );
        }
    }

    if let Some(value) = read_field(&fields, "clear_color", &mut rejected, check_finite) {
        state.clear_color = value;
    }
    if let Some(value) = read_field(&fields, "overlay_enabled", &mut rejected, |_| Ok(())) {
        state.overlay_enabled = value;
    }
    if let Some(value) = read_field(&fields, "grayscale_enabled", &mut rejected, |_| Ok(())) {
        state.grayscale_enabled = value;
    }
    if let Some(value) = read_field(&fields, "camera_position", &mut rejected, check_finite) {
        state.camera_position = value;
    }
    if let Some(value) = read_field(&fields, "camera_front", &mut rejected, check_direction) {
        state.camera_front = value;
    }

    Ok(LoadReport {
        state,
        rejected_fields: rejected,
    })
}

/// Loads the state file, falling back to defaults for anything unusable.
pub fn load_or_default(path: &Path) -> PersistedState {
    match load_state_from_file(path) {
        Ok(report) => {
            for issue in &report.rejected_fields {
                log::warn!(
                    "State file {:?}: field '{}' uses its default ({})",
                    path,
                    issue.field,
                    issue.reason
                );
            }
            log::info!("Loaded program state from {:?}", path);
            report.state
        }
        Err(StateFileError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            log::info!("No state file at {:?}, using defaults", path);
            PersistedState::default()
        }
        Err(err) => {
            log::warn!("Failed to read state file {:?}: {}, using defaults", path, err);
            PersistedState::default()
        }
    }
}

fn read_field<T, F>(
    fields: &Map<String, Value>,
    name: &'static str,
    rejected: &mut Vec<FieldIssue>,
    validate: F,
) -> Option<T>
where
    T: serde::de::DeserializeOwned,
    F: Fn(&T) -> std::result::Result<(), String>,
{
    let Some(raw) = fields.get(name) else {
        rejected.push(FieldIssue {
            field: name,
            reason: "missing".to_string(),
        });
        return None;
    };
    let parsed = serde_json::from_value::<T>(raw.clone())
        .map_err(|err| err.to_string())
        .and_then(|value| validate(&value).map(|()| value));
    match parsed {
        Ok(value) => Some(value),
        Err(reason) => {
            rejected.push(FieldIssue { field: name, reason });
            None
        }
    }
}

fn check_finite(value: &[f32; 3]) -> std::result::Result<(), String> {
    if value.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err("non-finite component".to_string())
    }
}

fn check_direction(value: &[f32; 3]) -> std::result::Result<(), String> {
    check_finite(value)?;
    if glam::Vec3::from_array(*value).length_squared() <= 1e-12 {
        return Err("zero-length direction".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ProgramState;
    use glam::Vec3;

    fn temp_state_path(tag: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        path.push(format!(
            "lodge_state_{}_{}_{}.json",
            tag,
            std::process::id(),
            nonce
        ));
        path
    }

    #[test]
    fn test_state_round_trips_through_file() {
        let mut state = ProgramState::new();
        state.clear_color = [0.1, 0.2, 0.3];
        state.overlay_enabled = true;
        state.grayscale_enabled = true;
        state.camera.position = Vec3::new(4.0, 1.5, -7.25);
        state.camera.process_look(250.0, -120.0);
        state.room.scale = 2.0;
        state.camera_mouse_update_enabled = false;

        let path = temp_state_path("roundtrip");
        save_state_to_file(&state.persisted(), &path).unwrap();
        let report = load_state_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert!(report.is_clean(), "{:?}", report.rejected_fields);

        let restored = ProgramState::from_persisted(&report.state);
        assert_eq!(restored.clear_color, state.clear_color);
        assert!(restored.overlay_enabled);
        assert!(restored.grayscale_enabled);
        assert!((restored.camera.position - state.camera.position).length() < 1e-5);
        assert!((restored.camera.front() - state.camera.front()).length() < 1e-5);
        assert_eq!(restored.room.scale, 0.5);
        assert!(restored.camera_mouse_update_enabled);
    }

    #[test]
    fn test_save_load_stress_loop_via_file() {
        let mut persisted = ProgramState::new().persisted();
        persisted.camera_front = [0.3, -0.2, -0.9];
        let path = temp_state_path("stress");

        for _ in 0..50 {
            save_state_to_file(&persisted, &path).unwrap();
            let report = load_state_from_file(&path).unwrap();
            assert!(report.is_clean());
            persisted = ProgramState::from_persisted(&report.state).persisted();
        }

        let _ = std::fs::remove_file(&path);
        let front = Vec3::from_array(persisted.camera_front);
        let expected = Vec3::new(0.3, -0.2, -0.9).normalize();
        assert!((front - expected).length() < 1e-4);
    }

    #[test]
    fn test_bad_fields_fall_back_individually() {
        let json = r#"{
            "version": 1,
            "clear_color": "blue",
            "overlay_enabled": true,
            "camera_position": [1.0, 2.0, 3.0],
            "camera_front": [0.0, 0.0, 0.0]
        }"#;
        let report = decode_state(json).unwrap();
        let defaults = PersistedState::default();

        assert_eq!(report.state.clear_color, defaults.clear_color);
        assert!(report.state.overlay_enabled);
        assert_eq!(report.state.grayscale_enabled, defaults.grayscale_enabled);
        assert_eq!(report.state.camera_position, [1.0, 2.0, 3.0]);
        assert_eq!(report.state.camera_front, defaults.camera_front);

        let mut fields: Vec<_> = report.rejected_fields.iter().map(|i| i.field).collect();
        fields.sort_unstable();
        assert_eq!(fields, vec!["camera_front", "clear_color", "grayscale_enabled"]);
    }

    #[test]
    fn test_unknown_version_still_decodes() {
        let mut persisted = PersistedState::default();
        persisted.version = 7;
        persisted.grayscale_enabled = true;
        let json = serde_json::to_string(&persisted).unwrap();
        let report = decode_state(&json).unwrap();
        assert!(report.is_clean());
        assert!(report.state.grayscale_enabled);
        assert_eq!(report.state.version, STATE_FORMAT_VERSION);
    }

    #[test]
    fn test_non_object_root_is_an_error() {
        assert!(matches!(
            decode_state("[1, 2, 3]"),
            Err(StateFileError::NotAnObject)
        ));
        assert!(matches!(decode_state("{"), Err(StateFileError::Json(_))));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = temp_state_path("missing");
        assert_eq!(load_or_default(&path), PersistedState::default());
    }

    #[test]
    fn test_saved_json_is_versioned_and_pretty() {
        let path = temp_state_path("pretty");
        save_state_to_file(&PersistedState::default(), &path).unwrap();
        let json = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert!(json.contains("\"version\": 1"));
        assert!(json.contains('\n'));
    }
}
