pub mod cluster_program;
pub mod gbuffer_program;
pub mod lighting_program;
pub mod move_lights_program;

pub use cluster_program::ClusterProgram;
pub use gbuffer_program::GBufferProgram;
pub use lighting_program::LightingProgram;
pub use move_lights_program::MoveLightsProgram;

use crate::{config::ClusterConfig, shaders::ShaderConstants};

/// Holds common WGPU references to simplify function signatures.
pub struct GpuProgramRenderContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub format: wgpu::TextureFormat, // The output format (Swapchain)
    pub config: &'a ClusterConfig,
    pub shaders: &'a ShaderConstants,
}

impl GpuProgramRenderContext<'_> {
    /// Compiles `body` with the shared WGSL declarations prepended.
    pub fn shader_module(&self, label: &str, body: &str) -> wgpu::ShaderModule {
        self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(self.shaders.compose(body).into()),
        })
    }
}

pub trait GpuProgram {
    /// Data required to initialize the pipeline (e.g., shared buffers)
    type InitData<'a>;

    /// Data required to draw a frame
    type DrawData<'a>
    where
        Self: 'a;

    /// 1. INIT: Compiles shaders, creates pipeline layouts and the pipeline itself.
    fn new(ctx: &GpuProgramRenderContext, init_data: Self::InitData<'_>) -> Self;

    /// 2. RECORD: Encodes commands into the RenderPass.
    fn record<'a>(&'a self, rpass: &mut wgpu::RenderPass<'a>, data: Self::DrawData<'a>);
}

/// Compute counterpart of [`GpuProgram`]: one invocation per work item.
pub trait ComputeProgram {
    type InitData<'a>;

    fn new(ctx: &GpuProgramRenderContext, init_data: Self::InitData<'_>) -> Self;

    /// Dispatches enough workgroups to cover `items`; surplus invocations exit early.
    fn dispatch(&self, cpass: &mut wgpu::ComputePass<'_>, items: u32);
}

/// Workgroups needed to cover `items` invocations, rounded up.
pub fn workgroup_count(items: u32, workgroup_size: u32) -> u32 {
    items.div_ceil(workgroup_size.max(1))
}

pub(crate) fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn storage_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    read_only: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workgroups_round_up() {
        assert_eq!(workgroup_count(0, 64), 0);
        assert_eq!(workgroup_count(1, 64), 1);
        assert_eq!(workgroup_count(64, 64), 1);
        assert_eq!(workgroup_count(65, 64), 2);
        // default grid: 3456 clusters in groups of 64
        assert_eq!(workgroup_count(16 * 9 * 24, 64), 54);
        assert_eq!(workgroup_count(5000, 128), 40);
    }
}
