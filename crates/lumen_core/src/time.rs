use std::time::{Duration, Instant};

use flecs_ecs::macros::Component;

#[derive(Component)]
pub struct Time {
    startup: Instant,
    last_update: Instant,
    delta: Duration,
    frame: u64,
}

impl Default for Time {
    fn default() -> Self {
        Self {
            startup: Instant::now(),
            last_update: Instant::now(),
            delta: Duration::ZERO,
            frame: 0,
        }
    }
}

impl Time {
    /// Called by the engine loop once per frame
    pub fn update(&mut self) {
        let now = Instant::now();
        self.delta = now - self.last_update;
        self.last_update = now;
        self.frame += 1;
    }

    /// Returns time in seconds since last frame (e.g., 0.016 for 60fps)
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Returns total time since app started
    pub fn elapsed_seconds(&self) -> f32 {
        self.last_update.duration_since(self.startup).as_secs_f32()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_advances_frame_and_elapsed() {
        let mut time = Time::default();
        assert_eq!(time.frame_count(), 0);
        assert_eq!(time.delta_seconds(), 0.0);

        std::thread::sleep(Duration::from_millis(2));
        time.update();

        assert_eq!(time.frame_count(), 1);
        assert!(time.delta_seconds() > 0.0);
        assert!(time.elapsed_seconds() >= time.delta_seconds());
    }
}
