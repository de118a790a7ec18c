use crate::{
    gbuffer::GBuffer,
    global_resources::GlobalResources,
    programs::{GpuProgram, GpuProgramRenderContext, storage_entry, uniform_entry},
    shaders,
};

/// Fullscreen pass: reads the G-buffer, finds each pixel's cluster and sums
/// only that cluster's lights.
pub struct LightingProgram {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            // read with textureLoad, never sampled
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
        },
        count: None,
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    globals: &GlobalResources,
    gbuffer: &GBuffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Lighting Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: globals.camera_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: globals.light_set_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: globals.cluster_set_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(&gbuffer.albedo.view),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::TextureView(&gbuffer.normal.view),
            },
            wgpu::BindGroupEntry {
                binding: 5,
                resource: wgpu::BindingResource::TextureView(&gbuffer.position.view),
            },
        ],
    })
}

impl LightingProgram {
    /// The G-buffer views change on resize; the buffers never do.
    pub fn rebind(&mut self, device: &wgpu::Device, globals: &GlobalResources, gbuffer: &GBuffer) {
        self.bind_group = create_bind_group(device, &self.layout, globals, gbuffer);
    }
}

impl GpuProgram for LightingProgram {
    type InitData<'a> = (&'a GlobalResources, &'a GBuffer);
    type DrawData<'a> = ();

    fn new(ctx: &GpuProgramRenderContext, (globals, gbuffer): Self::InitData<'_>) -> Self {
        let shader = ctx.shader_module("Lighting Shader", shaders::LIGHTING);

        let layout = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Lighting Bind Group Layout"),
                entries: &[
                    uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                    storage_entry(1, wgpu::ShaderStages::FRAGMENT, true),
                    storage_entry(2, wgpu::ShaderStages::FRAGMENT, true),
                    texture_entry(3),
                    texture_entry(4),
                    texture_entry(5),
                ],
            });

        let bind_group = create_bind_group(ctx.device, &layout, globals, gbuffer);

        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Lighting Pipeline Layout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });

        let pipeline = ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                cache: None,
                label: Some("Lighting Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[], // fullscreen triangle from vertex_index
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: ctx.format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                depth_stencil: None,
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });

        Self {
            pipeline,
            layout,
            bind_group,
        }
    }

    fn record<'a>(&'a self, render_pass: &mut wgpu::RenderPass<'a>, _: Self::DrawData<'a>) {
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}
