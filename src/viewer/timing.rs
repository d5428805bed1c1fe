use std::time::Duration;
use tokio::time::Instant;

/// Frame cadence bookkeeping for the render loop.
pub struct FrameTiming {
    last_frame_time: Option<Instant>,
    last_fps_time: Instant,
    frame_count: u32,
    pub frame_dt: f32,
    fps: f32,
    label: String,
}

impl FrameTiming {
    pub fn new(label: String) -> Self {
        Self {
            last_frame_time: None,
            last_fps_time: Instant::now(),
            frame_count: 0,
            frame_dt: 1.0 / 60.0,
            fps: 0.0,
            label,
        }
    }

    /// Forget the previous frame, e.g. after a model switch.
    pub fn reset(&mut self, label: String, now: Instant) {
        self.last_frame_time = None;
        self.last_fps_time = now;
        self.frame_count = 0;
        self.fps = 0.0;
        self.label = label;
    }

    /// Most recent rate measured over a half-second window.
    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn update(&mut self, now: Instant) {
        let dt_duration = if let Some(last) = self.last_frame_time {
            now.saturating_duration_since(last)
        } else {
            Duration::from_millis(16)
        };
        self.last_frame_time = Some(now);
        self.frame_dt = dt_duration.as_secs_f32().max(0.0);

        self.frame_count = self.frame_count.saturating_add(1);
        let elapsed = now.saturating_duration_since(self.last_fps_time);
        if elapsed.as_secs_f32() >= 0.5 {
            self.fps = self.frame_count as f32 / elapsed.as_secs_f32();
            log::debug!(
                "{} - {:.1} fps (cadence {:.2} ms)",
                self.label,
                self.fps,
                self.frame_dt * 1000.0
            );
            self.frame_count = 0;
            self.last_fps_time = now;
        }
    }
}
