use wgpu::RenderPipeline;

use crate::{
    gbuffer::{self, COLOR_FORMATS},
    global_resources::GlobalResources,
    mesh::Vertex,
    programs::{GpuProgram, GpuProgramRenderContext, uniform_entry},
    scene::SceneSource,
    shaders,
};

/// Writes albedo, normal and world position of opaque geometry. No lighting.
pub struct GBufferProgram {
    pipeline: RenderPipeline,
    camera_bind_group: wgpu::BindGroup,
    pub material_layout: wgpu::BindGroupLayout,
    pub mesh_layout: wgpu::BindGroupLayout,
}

impl GpuProgram for GBufferProgram {
    type InitData<'a> = &'a GlobalResources;
    type DrawData<'a> = &'a dyn SceneSource;

    fn new(ctx: &GpuProgramRenderContext, globals: Self::InitData<'_>) -> Self {
        let shader = ctx.shader_module("G-Buffer Shader", shaders::GBUFFER);

        let camera_layout = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("G-Buffer Camera Bind Group Layout"),
                entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
            });

        let material_layout = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Material Bind Group Layout"),
                entries: &[uniform_entry(0, wgpu::ShaderStages::FRAGMENT)],
            });

        let mesh_layout = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Mesh Bind Group Layout"),
                entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
            });

        let camera_bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("G-Buffer Camera Bind Group"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals.camera_buffer.as_entire_binding(),
            }],
        });

        // [0: Camera, 1: Material, 2: Model]
        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("G-Buffer Pipeline Layout"),
                bind_group_layouts: &[&camera_layout, &material_layout, &mesh_layout],
                push_constant_ranges: &[],
            });

        // Position is a 32-bit float target, which cannot blend
        let targets = COLOR_FORMATS.map(|format| {
            Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })
        });

        let pipeline = ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                cache: None,
                label: Some("G-Buffer Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[Vertex::desc()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &targets,
                }),
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: gbuffer::DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less, // Closer pixels win
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: Some(wgpu::Face::Back),
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });

        Self {
            pipeline,
            camera_bind_group,
            material_layout,
            mesh_layout,
        }
    }

    fn record<'a>(&'a self, render_pass: &mut wgpu::RenderPass<'a>, scene: Self::DrawData<'a>) {
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.camera_bind_group, &[]);

        scene.for_each_primitive(&mut |primitive| {
            render_pass.set_bind_group(1, primitive.material, &[]);
            render_pass.set_bind_group(2, primitive.model, &[]);
            render_pass.set_vertex_buffer(0, primitive.vertex_buffer.slice(..));
            render_pass.set_index_buffer(primitive.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..primitive.index_count, 0, 0..1);
        });
    }
}
