use flecs_ecs::macros::Component;

/// Size of the window's drawable area in physical pixels.
/// `dirty` is raised by the window runner and cleared by whoever owns the surface.
#[derive(Component, Debug, Clone, Copy)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub dirty: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            dirty: false,
        }
    }
}

impl Viewport {
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            // Minimized; keep the last usable size.
            return;
        }
        if (width, height) != (self.width, self.height) {
            self.width = width;
            self.height = height;
            self.dirty = true;
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}
