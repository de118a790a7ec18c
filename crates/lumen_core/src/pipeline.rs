use flecs_ecs::prelude::*;

/// Acquires the swapchain image and applies pending resizes.
#[derive(Component)]
pub struct PhasePrepareFrame;

/// Records and submits the frame's GPU work.
#[derive(Component)]
pub struct PhaseRender3D;

#[derive(Component)]
pub struct PhasePresent;

pub fn define_pipeline_stages(world: &mut World) {
    world
        .component::<PhasePrepareFrame>()
        .add(flecs::Phase)
        .depends_on(flecs::pipeline::OnStore);
    world
        .component::<PhaseRender3D>()
        .add(flecs::Phase)
        .depends_on(PhasePrepareFrame);
    world
        .component::<PhasePresent>()
        .add(flecs::Phase)
        .depends_on(PhaseRender3D);
}
