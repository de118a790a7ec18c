use flecs_ecs::prelude::*;
pub use rayon;

pub mod camera;
pub mod fly_camera;
pub mod input;
pub mod logging;
pub mod pipeline;
pub mod time;
pub mod transform;
pub mod viewport;

pub use input::*;

use crate::{pipeline::define_pipeline_stages, time::Time, viewport::Viewport};

/// The Plugin Trait
/// Every module (Renderer, Window, Camera) must implement this.
pub trait Plugin {
    fn build(&self, app: &mut App);
}

/// The Engine Application
/// Holds the ECS World and orchestrates the loop.
pub struct App {
    pub world: World,
    pub running: bool,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        // Rayon initializes itself globally the first time you use it.
        // We reserve the pool here so host-side clustering has a known width.
        rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("lumen-worker-{i}"))
            .build_global()
            .ok();

        let mut world = World::new();
        define_pipeline_stages(&mut world);

        world.component::<Time>().add_trait::<flecs::Singleton>();
        world.set(Time::default());

        world.component::<Input>().add_trait::<flecs::Singleton>();
        world.set(Input::default());

        world.component::<Viewport>().add_trait::<flecs::Singleton>();
        world.set(Viewport::default());

        Self {
            world,
            running: true,
        }
    }

    pub fn add_plugin<P: Plugin>(&mut self, plugin: P) -> &mut Self {
        plugin.build(self);
        self
    }

    /// Explicit Ticks
    /// We do not have a run() function that takes over the thread.
    /// The windowing system decides WHEN a frame runs and calls this once per frame.
    pub fn update(&mut self) {
        if !self.running {
            return;
        }

        self.world.get::<&mut Time>(|time| time.update());

        if !self.world.progress() {
            log::info!("World requested quit");
            self.running = false;
        }

        self.world.get::<&mut Input>(|input| input.end_frame());
    }

    /// Stops the frame loop. Resources owned by singletons are released when the
    /// world is dropped, after the last frame has been submitted.
    pub fn shutdown(&mut self) {
        self.running = false;
    }
}
