use crate::{
    global_resources::GlobalResources,
    programs::{ComputeProgram, GpuProgramRenderContext, storage_entry, uniform_entry, workgroup_count},
    shaders,
};

/// Rebuilds every cluster's light list from the current lights and camera.
pub struct ClusterProgram {
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    workgroup_size: u32,
}

impl ComputeProgram for ClusterProgram {
    type InitData<'a> = &'a GlobalResources;

    fn new(ctx: &GpuProgramRenderContext, globals: Self::InitData<'_>) -> Self {
        let shader = ctx.shader_module("Clustering Shader", shaders::CLUSTERING);

        let layout = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Clustering Bind Group Layout"),
                entries: &[
                    storage_entry(0, wgpu::ShaderStages::COMPUTE, false), // cluster set
                    storage_entry(1, wgpu::ShaderStages::COMPUTE, true),  // light set
                    uniform_entry(2, wgpu::ShaderStages::COMPUTE),        // camera
                ],
            });

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Clustering Bind Group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: globals.cluster_set_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: globals.light_set_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: globals.camera_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Clustering Pipeline Layout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });

        let pipeline = ctx
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Clustering Pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            });

        Self {
            pipeline,
            bind_group,
            workgroup_size: ctx.config.cluster_workgroup_size,
        }
    }

    fn dispatch(&self, cpass: &mut wgpu::ComputePass<'_>, clusters: u32) {
        cpass.set_pipeline(&self.pipeline);
        cpass.set_bind_group(0, &self.bind_group, &[]);
        cpass.dispatch_workgroups(workgroup_count(clusters, self.workgroup_size), 1, 1);
    }
}
