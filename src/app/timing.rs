use std::time::{Duration, Instant};
use winit::window::Window;

const FIRST_FRAME_DT: Duration = Duration::from_millis(16);
const TITLE_REFRESH_SECS: f32 = 0.5;

/// Per-frame clock. `frame_dt` is the wall time between the last two updates
/// and scales camera movement.
pub struct FrameTiming {
    last_frame_time: Option<Instant>,
    last_fps_time: Instant,
    frame_count: u32,
    pub frame_dt: f32,
    fps: f32,
    render_ms: f32,
    base_title: String,
}

impl FrameTiming {
    pub fn new(base_title: String) -> Self {
        Self {
            last_frame_time: None,
            last_fps_time: Instant::now(),
            frame_count: 0,
            frame_dt: FIRST_FRAME_DT.as_secs_f32(),
            fps: 0.0,
            render_ms: 0.0,
            base_title,
        }
    }

    pub fn set_render_ms(&mut self, render_ms: f32) {
        self.render_ms = render_ms;
    }

    /// Advances the clock to `now` and returns the new frame delta in seconds.
    pub fn tick(&mut self, now: Instant) -> f32 {
        let dt_duration = match self.last_frame_time {
            Some(last) => now.saturating_duration_since(last),
            None => FIRST_FRAME_DT,
        };
        self.last_frame_time = Some(now);
        self.frame_dt = dt_duration.as_secs_f32().max(0.0);
        self.frame_count = self.frame_count.saturating_add(1);
        self.frame_dt
    }

    /// Returns the refreshed title once per refresh window.
    pub fn poll_title(&mut self, now: Instant) -> Option<String> {
        let elapsed = now.saturating_duration_since(self.last_fps_time);
        if elapsed.as_secs_f32() < TITLE_REFRESH_SECS {
            return None;
        }
        self.fps = self.frame_count as f32 / elapsed.as_secs_f32();
        self.frame_count = 0;
        self.last_fps_time = now;
        let ms = (self.frame_dt * 1000.0).max(0.0);
        Some(format!(
            "{} - {:.1} fps (cadence {:.2} ms, render {:.2} ms)",
            self.base_title, self.fps, ms, self.render_ms
        ))
    }

    pub fn update(&mut self, window: Option<&Window>, now: Instant) -> f32 {
        let dt = self.tick(now);
        if let Some(title) = self.poll_title(now) {
            if let Some(window) = window {
                window.set_title(&title);
            }
        }
        dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_uses_nominal_delta() {
        let mut timing = FrameTiming::new("Lodge".to_string());
        let dt = timing.tick(Instant::now());
        assert!((dt - 0.016).abs() < 1e-6);
    }

    #[test]
    fn later_ticks_measure_elapsed_time() {
        let mut timing = FrameTiming::new("Lodge".to_string());
        let start = Instant::now();
        timing.tick(start);
        let dt = timing.tick(start + Duration::from_millis(250));
        assert!((dt - 0.25).abs() < 1e-4);
        assert_eq!(timing.frame_dt, dt);
    }

    #[test]
    fn title_refreshes_after_half_second() {
        let mut timing = FrameTiming::new("Lodge".to_string());
        let start = timing.last_fps_time;
        timing.tick(start);
        assert!(timing.poll_title(start + Duration::from_millis(100)).is_none());

        for step in 1..=30 {
            timing.tick(start + Duration::from_millis(step * 20));
        }
        let title = timing
            .poll_title(start + Duration::from_millis(600))
            .unwrap();
        assert!(title.starts_with("Lodge - "));
        assert!(timing.fps > 40.0 && timing.fps < 60.0, "{}", timing.fps);
    }
}
