use crate::render::FrameComposition;
use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_STATE_FILE: &str = "program_state.json";
const ROOM_MODEL: &str = "objects/blacklodge/untitled.obj";
const HORSE_MODEL: &str = "objects/horsie/horse.obj";
const GLOW_TEXTURE: &str = "textures/light_glow.png";

/// Interactive viewer for the lodge scene.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct ViewerConfig {
    /// Directory holding models, textures and the default state file
    #[arg(long, default_value = "resources")]
    pub resources: PathBuf,

    /// Program state file (defaults to <resources>/program_state.json)
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Render the scene straight to the window, skipping the composite pass
    #[arg(long)]
    pub no_post_process: bool,

    /// Initial window width
    #[arg(long, default_value_t = 800)]
    pub width: u32,

    /// Initial window height
    #[arg(long, default_value_t = 600)]
    pub height: u32,

    /// Do not write the program state on exit
    #[arg(long)]
    pub no_save: bool,
}

/// Resolved locations of everything loaded at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePaths {
    pub room_model: PathBuf,
    pub horse_model: PathBuf,
    pub glow_texture: PathBuf,
}

impl ViewerConfig {
    pub fn state_file_path(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| self.resources.join(DEFAULT_STATE_FILE))
    }

    pub fn composition(&self) -> FrameComposition {
        if self.no_post_process {
            FrameComposition::Direct
        } else {
            FrameComposition::PostProcessed
        }
    }

    pub fn resource_paths(&self) -> ResourcePaths {
        ResourcePaths {
            room_model: self.resources.join(ROOM_MODEL),
            horse_model: self.resources.join(HORSE_MODEL),
            glow_texture: self.resources.join(GLOW_TEXTURE),
        }
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.width.max(1), self.height.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_into_resources() {
        let config = ViewerConfig::parse_from(["lodge-viewer"]);
        assert_eq!(config.state_file_path(), PathBuf::from("resources/program_state.json"));
        assert_eq!(config.composition(), FrameComposition::PostProcessed);
        assert_eq!(config.window_size(), (800, 600));
        assert!(!config.no_save);
        let paths = config.resource_paths();
        assert_eq!(paths.horse_model, PathBuf::from("resources/objects/horsie/horse.obj"));
        assert_eq!(paths.glow_texture, PathBuf::from("resources/textures/light_glow.png"));
    }

    #[test]
    fn flags_override_defaults() {
        let config = ViewerConfig::parse_from([
            "lodge-viewer",
            "--resources",
            "/data/lodge",
            "--state-file",
            "/tmp/state.json",
            "--no-post-process",
            "--width",
            "1280",
            "--height",
            "0",
            "--no-save",
        ]);
        assert_eq!(config.state_file_path(), PathBuf::from("/tmp/state.json"));
        assert_eq!(config.composition(), FrameComposition::Direct);
        assert_eq!(config.window_size(), (1280, 1));
        assert!(config.no_save);
        assert_eq!(
            config.resource_paths().room_model,
            PathBuf::from("/data/lodge/objects/blacklodge/untitled.obj")
        );
    }
}
