use crate::{
    global_resources::GlobalResources,
    programs::{ComputeProgram, GpuProgramRenderContext, storage_entry, uniform_entry, workgroup_count},
    shaders,
};

/// Advances every active light along its closed-form path.
pub struct MoveLightsProgram {
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    workgroup_size: u32,
}

impl ComputeProgram for MoveLightsProgram {
    type InitData<'a> = &'a GlobalResources;

    fn new(ctx: &GpuProgramRenderContext, globals: Self::InitData<'_>) -> Self {
        let shader = ctx.shader_module("Move Lights Shader", shaders::MOVE_LIGHTS);

        let layout = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Move Lights Bind Group Layout"),
                entries: &[
                    storage_entry(0, wgpu::ShaderStages::COMPUTE, false), // light set
                    uniform_entry(1, wgpu::ShaderStages::COMPUTE),        // time
                ],
            });

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Move Lights Bind Group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: globals.light_set_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: globals.animation_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Move Lights Pipeline Layout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });

        let pipeline = ctx
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Move Lights Pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            });

        Self {
            pipeline,
            bind_group,
            workgroup_size: ctx.config.move_lights_workgroup_size,
        }
    }

    fn dispatch(&self, cpass: &mut wgpu::ComputePass<'_>, active_lights: u32) {
        let groups = workgroup_count(active_lights, self.workgroup_size);
        if groups == 0 {
            return;
        }
        cpass.set_pipeline(&self.pipeline);
        cpass.set_bind_group(0, &self.bind_group, &[]);
        cpass.dispatch_workgroups(groups, 1, 1);
    }
}
