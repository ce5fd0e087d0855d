//! Lodge viewer: an interactive scene with a room and a horse model, three
//! point lights, glow sprites and an optional grayscale post pass.
//!
//! F1 toggles the overlay and frees the cursor, F2 toggles grayscale, WASD
//! and the mouse drive the camera, Esc quits.

mod app;
mod assets;
mod config;
mod render;
mod scene;
mod ui;

use clap::Parser;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config = config::ViewerConfig::parse();
    log::info!("Lodge viewer starting");
    log::info!("   Resources: {:?}", config.resources);

    if let Err(err) = app::run(config) {
        log::error!("Fatal: {}", err);
        std::process::exit(1);
    }

    log::info!("Goodbye");
}
