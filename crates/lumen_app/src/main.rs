use flecs_ecs::prelude::*;
use glam::Vec3;
use lumen_core::{
    App, Input, KeyCode,
    camera::Camera,
    fly_camera::{FlyCamera, register_fly_camera_systems},
    logging,
    transform::Transform,
};
use lumen_renderer::{ClusterConfig, RenderContext, RenderPlugin};
use lumen_scene::SceneData;
use lumen_window::{WindowPlugin, run_lumen_app};

/// Lights added or removed per key press.
const LIGHT_STEP: u32 = 100;

fn main() {
    logging::init();

    let config = match ClusterConfig::load() {
        Ok(config) => config,
        Err(err) => {
            log::error!("{err}");
            if let Some(source) = std::error::Error::source(&err) {
                log::error!("  caused by: {source}");
            }
            std::process::exit(1);
        }
    };

    let mut app = App::new();

    app.add_plugin(WindowPlugin);
    app.add_plugin(RenderPlugin {
        config,
        scene: SceneData::demo_hall(),
    });
    register_fly_camera_systems(&mut app);

    app.world
        .entity_named("main camera")
        .set(Camera::default())
        .set(Transform::from_xyz(-7.0, 2.0, 0.0).looking_to(Vec3::X, Vec3::Y))
        .set(FlyCamera::default());

    app.world
        .system_named::<(&Input, &mut RenderContext)>("light count")
        .kind(flecs::pipeline::OnUpdate)
        .each(|(input, context)| {
            let renderer = &mut context.renderer;
            let current = renderer.active_lights();
            let requested = if input.just_pressed(KeyCode::Equal) || input.just_pressed(KeyCode::NumpadAdd) {
                current.saturating_add(LIGHT_STEP)
            } else if input.just_pressed(KeyCode::Minus) || input.just_pressed(KeyCode::NumpadSubtract) {
                current.saturating_sub(LIGHT_STEP)
            } else {
                return;
            };
            let applied = renderer.set_active_lights(requested);
            log::info!("Active lights: {applied} / {}", renderer.light_capacity());
        });

    log::info!("Controls: hold a mouse button to look, WASDQE to move, +/- to change the light count");

    if let Err(err) = run_lumen_app(app, "Lumen") {
        log::error!("{err}");
        std::process::exit(1);
    }
}
