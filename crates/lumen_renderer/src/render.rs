use std::iter;

use flecs_ecs::prelude::*;
use lumen_core::{
    App, Plugin,
    camera::Camera,
    pipeline::{PhasePrepareFrame, PhasePresent, PhaseRender3D},
    time::Time,
    transform::Transform,
    viewport::Viewport,
};
use lumen_scene::SceneData;
use lumen_window::MainWindow;
use wgpu::{Surface, SurfaceConfiguration};

use crate::{
    cluster::{ClusterCamera, ClusterGrid},
    clustering,
    config::{ClusterConfig, ComputeBackend},
    error::RenderError,
    frame::{FrameInputs, FrameOrchestrator, FrameStage, StageRecorder},
    gbuffer::GBuffer,
    global_resources::GlobalResources,
    layout::{CameraUniform, ClusterSetLayout, LightSetLayout},
    lights::{LightSet, LightUpload},
    programs::{
        ClusterProgram, ComputeProgram, GBufferProgram, GpuProgram, GpuProgramRenderContext,
        LightingProgram, MoveLightsProgram, workgroup_count,
    },
    scene::GpuScene,
    shaders::ShaderConstants,
};

/// Window-facing half of the renderer: the surface and everything drawn into it.
#[derive(Component)]
pub struct RenderContext {
    pub surface: Surface<'static>,
    pub config: SurfaceConfiguration,
    pub renderer: ClusteredRenderer,
}

impl RenderContext {
    pub fn new(
        window: &MainWindow,
        cluster_config: ClusterConfig,
        scene: &SceneData,
    ) -> Result<Self, RenderError> {
        log::info!("Initializing GPU");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        // Arc<Window> keeps the window alive for as long as the surface
        let surface = instance.create_surface(window.0.clone())?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))?;
        let info = adapter.get_info();
        log::info!("Using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Lumen Device"),
            required_limits: adapter.limits(),
            ..Default::default()
        }))?;

        let size = window.0.inner_size();
        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or(RenderError::NoSurfaceFormat)?;

        let config = SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo, // VSync On
            desired_maximum_frame_latency: 2,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let renderer = ClusteredRenderer::new(
            device,
            queue,
            format,
            (config.width, config.height),
            cluster_config,
            scene,
        )?;

        Ok(Self {
            surface,
            config,
            renderer,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.reconfigure();
        self.renderer.resize(width, height);
    }

    pub fn reconfigure(&self) {
        self.surface.configure(self.renderer.device(), &self.config);
    }
}

#[derive(Component, Default)]
pub struct RenderTarget {
    pub view: Option<wgpu::TextureView>,
    pub texture: Option<wgpu::SurfaceTexture>,
}

/// Checks the buffer sizes and dispatch shapes against what the device allows.
pub fn check_limits(
    config: &ClusterConfig,
    light_layout: &LightSetLayout,
    cluster_layout: &ClusterSetLayout,
    limits: &wgpu::Limits,
) -> Result<(), RenderError> {
    let exceeds = |what: &'static str, requested: u64, limit: u64| {
        if requested > limit {
            Err(RenderError::DeviceLimit {
                what,
                requested,
                limit,
            })
        } else {
            Ok(())
        }
    };

    let binding_limit = u64::from(limits.max_storage_buffer_binding_size);
    let buffer_limit = u64::from(limits.max_buffer_size);
    for (what, size) in [
        ("light set buffer", light_layout.size_bytes() as u64),
        ("cluster set buffer", cluster_layout.size_bytes() as u64),
    ] {
        exceeds(what, size, binding_limit)?;
        exceeds(what, size, buffer_limit)?;
    }

    for (what, size) in [
        ("move lights workgroup", config.move_lights_workgroup_size),
        ("clustering workgroup", config.cluster_workgroup_size),
    ] {
        exceeds(what, size.into(), limits.max_compute_workgroup_size_x.into())?;
        exceeds(what, size.into(), limits.max_compute_invocations_per_workgroup.into())?;
    }

    let per_dimension = u64::from(limits.max_compute_workgroups_per_dimension);
    exceeds(
        "move lights dispatch",
        workgroup_count(config.max_lights, config.move_lights_workgroup_size).into(),
        per_dimension,
    )?;
    exceeds(
        "clustering dispatch",
        workgroup_count(cluster_layout.cluster_count, config.cluster_workgroup_size).into(),
        per_dimension,
    )?;
    Ok(())
}

/// Runs `create` inside a validation error scope so a bad pipeline surfaces as
/// an error instead of the device's uncaptured-error panic.
fn with_validation<T>(
    device: &wgpu::Device,
    label: &'static str,
    create: impl FnOnce() -> T,
) -> Result<T, RenderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(RenderError::PipelineCreation {
            label,
            message: err.to_string(),
        }),
        None => Ok(value),
    }
}

/// Owns the device, every GPU resource and the per-frame pass sequence.
pub struct ClusteredRenderer {
    orchestrator: FrameOrchestrator,
    passes: FramePasses,
}

struct FramePasses {
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: ClusterConfig,
    grid: ClusterGrid,
    cluster_layout: ClusterSetLayout,
    lights: LightSet,
    // host backend scratch, empty on the GPU path
    clusters: Vec<u32>,
    globals: GlobalResources,
    gbuffer: GBuffer,
    scene: GpuScene,
    move_lights: MoveLightsProgram,
    cluster: ClusterProgram,
    geometry: GBufferProgram,
    lighting: LightingProgram,
    destroyed: bool,
}

impl ClusteredRenderer {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        format: wgpu::TextureFormat,
        (width, height): (u32, u32),
        config: ClusterConfig,
        scene: &SceneData,
    ) -> Result<Self, RenderError> {
        config.validate()?;

        let lights = LightSet::new(&config);
        let grid = ClusterGrid::new(config.cluster_count);
        let cluster_layout = ClusterSetLayout {
            cluster_count: grid.cluster_count(),
            max_lights_per_cluster: config.max_lights_per_cluster,
        };
        check_limits(&config, &lights.layout(), &cluster_layout, &device.limits())?;

        let globals = GlobalResources::new(&device, lights.layout(), cluster_layout, &lights.encode())?;
        let gbuffer = GBuffer::new(&device, width, height);
        let shaders = ShaderConstants::from_config(&config);

        let ctx = GpuProgramRenderContext {
            device: &device,
            queue: &queue,
            format,
            config: &config,
            shaders: &shaders,
        };

        let move_lights = with_validation(&device, "move lights pipeline", || {
            MoveLightsProgram::new(&ctx, &globals)
        })?;
        let cluster = with_validation(&device, "clustering pipeline", || {
            ClusterProgram::new(&ctx, &globals)
        })?;
        let geometry = with_validation(&device, "g-buffer pipeline", || {
            GBufferProgram::new(&ctx, &globals)
        })?;
        let lighting = with_validation(&device, "lighting pipeline", || {
            LightingProgram::new(&ctx, (&globals, &gbuffer))
        })?;
        log::info!("Pipelines compiled");

        let scene = GpuScene::upload(&device, scene, &geometry.material_layout, &geometry.mesh_layout);

        let clusters = match config.backend {
            ComputeBackend::Gpu => Vec::new(),
            ComputeBackend::Host => cluster_layout.zeroed(),
        };

        log::info!(
            "Clustered renderer ready: {} / {} lights, {}x{}x{} clusters, {} per cluster, {:?} backend",
            lights.active_count(),
            lights.capacity(),
            grid.dims.x,
            grid.dims.y,
            grid.dims.z,
            config.max_lights_per_cluster,
            config.backend
        );

        Ok(Self {
            orchestrator: FrameOrchestrator::default(),
            passes: FramePasses {
                device,
                queue,
                config,
                grid,
                cluster_layout,
                lights,
                clusters,
                globals,
                gbuffer,
                scene,
                move_lights,
                cluster,
                geometry,
                lighting,
                destroyed: false,
            },
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.passes.device
    }

    pub fn active_lights(&self) -> u32 {
        self.passes.lights.active_count()
    }

    pub fn light_capacity(&self) -> u32 {
        self.passes.lights.capacity()
    }

    /// Takes effect on the next frame. Returns the count actually applied.
    pub fn set_active_lights(&mut self, count: u32) -> u32 {
        self.passes.lights.set_active_count(count)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.orchestrator.frames_submitted()
    }

    /// Recreates the G-buffer. The light and cluster buffers keep their size.
    pub fn resize(&mut self, width: u32, height: u32) {
        let passes = &mut self.passes;
        if (width.max(1), height.max(1)) == (passes.gbuffer.width, passes.gbuffer.height) {
            return;
        }
        passes.gbuffer = GBuffer::new(&passes.device, width, height);
        passes
            .lighting
            .rebind(&passes.device, &passes.globals, &passes.gbuffer);
        log::debug!("G-buffer resized to {width}x{height}");
    }

    pub fn render(&mut self, target: &wgpu::TextureView, inputs: &FrameInputs) -> Result<(), RenderError> {
        if self.passes.destroyed {
            return Ok(());
        }
        let mut recorder = GpuFrameRecorder {
            passes: &mut self.passes,
            target,
        };
        self.orchestrator.run_frame(&mut recorder, inputs)
    }

    /// Releases every buffer and texture. Safe to call more than once.
    pub fn destroy(&mut self) {
        if std::mem::replace(&mut self.passes.destroyed, true) {
            return;
        }
        self.passes.globals.destroy();
        self.passes.gbuffer.destroy();
        self.passes.scene.destroy();
        log::info!("Renderer resources released");
    }
}

impl Drop for ClusteredRenderer {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl FramePasses {
    fn record_animation(&mut self, encoder: &mut wgpu::CommandEncoder, time: f32) -> Result<(), RenderError> {
        let backend = self.config.backend;
        match self.lights.frame_upload(backend, time) {
            LightUpload::None => {}
            LightUpload::Header(header) => self.globals.write_light_header(&self.queue, &header),
            LightUpload::Whole(bytes) => self.globals.write_lights(&self.queue, &bytes)?,
        }

        if backend == ComputeBackend::Gpu {
            self.globals.update_time(&self.queue, time);
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Move Lights Pass"),
                timestamp_writes: None,
            });
            self.move_lights.dispatch(&mut cpass, self.lights.active_count());
        }
        Ok(())
    }

    fn record_clustering(&mut self, encoder: &mut wgpu::CommandEncoder, inputs: &FrameInputs) -> Result<(), RenderError> {
        let camera = &inputs.camera;
        self.globals.update_camera(
            &self.queue,
            &CameraUniform::new(
                camera.view_proj(),
                camera.view,
                camera.near,
                camera.far,
                camera.tan_half_fov_y(),
                camera.aspect_ratio,
                inputs.resolution,
            ),
        );

        match self.config.backend {
            ComputeBackend::Gpu => {
                let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Cluster Lights Pass"),
                    timestamp_writes: None,
                });
                self.cluster.dispatch(&mut cpass, self.grid.cluster_count());
            }
            ComputeBackend::Host => {
                clustering::assign_clusters(
                    &self.grid,
                    camera,
                    self.lights.active_lights(),
                    self.config.light_radius,
                    &self.cluster_layout,
                    &mut self.clusters,
                )?;
                self.globals.write_clusters(&self.queue, &self.clusters)?;
            }
        }
        Ok(())
    }

    fn record_geometry(&self, encoder: &mut wgpu::CommandEncoder) {
        let color_attachments = self.gbuffer.color_attachments();
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("G-Buffer Pass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(self.gbuffer.depth_attachment()),
            ..Default::default()
        });
        self.geometry.record(&mut rpass, &self.scene);
    }

    fn record_lighting(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Lighting Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            ..Default::default()
        });
        self.lighting.record(&mut rpass, ());
    }
}

/// Encodes each stage into command encoders on the device queue.
struct GpuFrameRecorder<'a> {
    passes: &'a mut FramePasses,
    target: &'a wgpu::TextureView,
}

impl StageRecorder for GpuFrameRecorder<'_> {
    type Batch = wgpu::CommandEncoder;

    fn begin_batch(&mut self, first: FrameStage) -> Self::Batch {
        self.passes
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(first.label()),
            })
    }

    fn record(
        &mut self,
        encoder: &mut Self::Batch,
        stage: FrameStage,
        inputs: &FrameInputs,
    ) -> Result<(), RenderError> {
        match stage {
            FrameStage::AnimateLights => self.passes.record_animation(encoder, inputs.time),
            FrameStage::AssignClusters => self.passes.record_clustering(encoder, inputs),
            FrameStage::RenderGeometry => {
                self.passes.record_geometry(encoder);
                Ok(())
            }
            FrameStage::RenderLighting => {
                self.passes.record_lighting(encoder, self.target);
                Ok(())
            }
        }
    }

    fn submit(&mut self, encoder: Self::Batch) {
        self.passes.queue.submit(iter::once(encoder.finish()));
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

pub struct RenderPlugin {
    pub config: ClusterConfig,
    pub scene: SceneData,
}

impl Plugin for RenderPlugin {
    fn build(&self, app: &mut App) {
        app.world
            .component::<RenderTarget>()
            .add_trait::<flecs::Singleton>();
        app.world.set(RenderTarget::default());
        app.world
            .component::<RenderContext>()
            .add_trait::<flecs::Singleton>();

        let config = self.config.clone();
        let scene = self.scene.clone();
        app.world
            .system_named::<&MainWindow>("init renderer")
            .kind(flecs::pipeline::OnStart)
            .each_entity(move |entity, window| {
                let world = entity.world();
                match RenderContext::new(window, config.clone(), &scene) {
                    Ok(context) => {
                        world.set(context);
                    }
                    Err(err) => {
                        log::error!("Renderer failed to start: {}", error_chain(&err));
                        world.quit();
                    }
                }
            });

        app.world
            .system_named::<(&mut RenderContext, &mut Viewport)>("resize surface")
            .kind(PhasePrepareFrame)
            .each(|(context, viewport)| {
                if viewport.dirty {
                    context.resize(viewport.width, viewport.height);
                    viewport.dirty = false;
                }
            });

        app.world
            .system_named::<(&RenderContext, &mut RenderTarget)>("start frame")
            .kind(PhasePrepareFrame)
            .each(|(context, target)| match context.surface.get_current_texture() {
                Ok(frame) => {
                    let view = frame
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default());
                    target.texture = Some(frame);
                    target.view = Some(view);
                }
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    log::warn!("Surface lost or outdated; reconfiguring");
                    context.reconfigure();
                }
                Err(wgpu::SurfaceError::Timeout) => log::debug!("Surface timed out; skipping frame"),
                Err(err) => log::error!("{}", error_chain(&RenderError::from(err))),
            });

        app.world
            .system_named::<(&Camera, &Transform, &Time, &mut RenderContext, &RenderTarget)>("render frame")
            .kind(PhaseRender3D)
            .each(|(camera, transform, time, context, target)| {
                let Some(view) = target.view.as_ref() else {
                    return;
                };
                let inputs = FrameInputs {
                    time: time.elapsed_seconds(),
                    camera: ClusterCamera::from_camera(camera, transform),
                    resolution: (context.config.width, context.config.height),
                };
                if let Err(err) = context.renderer.render(view, &inputs) {
                    log::error!("Frame failed: {}", error_chain(&err));
                }
            });

        app.world
            .system_named::<&mut RenderTarget>("end frame")
            .kind(PhasePresent)
            .each(|target| {
                target.view = None;
                if let Some(frame) = target.texture.take() {
                    frame.present();
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layouts(config: &ClusterConfig) -> (LightSetLayout, ClusterSetLayout) {
        (
            LightSetLayout {
                capacity: config.max_lights,
            },
            ClusterSetLayout {
                cluster_count: config.total_clusters(),
                max_lights_per_cluster: config.max_lights_per_cluster,
            },
        )
    }

    #[test]
    fn default_config_fits_default_limits() {
        let config = ClusterConfig::default();
        let (lights, clusters) = layouts(&config);
        check_limits(&config, &lights, &clusters, &wgpu::Limits::default()).unwrap();
    }

    #[test]
    fn oversized_workgroup_is_rejected() {
        let config = ClusterConfig {
            cluster_workgroup_size: 1024,
            ..Default::default()
        };
        let (lights, clusters) = layouts(&config);
        let err = check_limits(&config, &lights, &clusters, &wgpu::Limits::default()).unwrap_err();
        assert!(matches!(
            err,
            RenderError::DeviceLimit {
                what: "clustering workgroup",
                requested: 1024,
                ..
            }
        ));
    }

    #[test]
    fn oversized_cluster_set_is_rejected() {
        // 262144 clusters of 1040 bytes is past the default 128 MiB binding size
        let config = ClusterConfig {
            cluster_count: [64, 64, 64],
            ..Default::default()
        };
        let (lights, clusters) = layouts(&config);
        let err = check_limits(&config, &lights, &clusters, &wgpu::Limits::default()).unwrap_err();
        assert!(matches!(
            err,
            RenderError::DeviceLimit {
                what: "cluster set buffer",
                ..
            }
        ));
    }

    #[test]
    fn error_chain_includes_sources() {
        let err = RenderError::Config(crate::config::ConfigError::Invalid("bad".into()));
        assert!(error_chain(&err).contains("bad"));
    }
}
