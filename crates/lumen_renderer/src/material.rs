use lumen_scene::MaterialData;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuMaterialUniform {
    pub base_color: [f32; 4], // 16 bytes
}

impl From<&MaterialData> for GpuMaterialUniform {
    fn from(material: &MaterialData) -> Self {
        Self {
            base_color: material.base_color,
        }
    }
}

/// Material constants bound at group 1 of the geometry pass.
pub struct GpuMaterial {
    pub bind_group: wgpu::BindGroup,
    pub buffer: wgpu::Buffer,
}

impl GpuMaterial {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, material: &MaterialData) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Material Uniform Buffer"),
            contents: bytemuck::bytes_of(&GpuMaterialUniform::from(material)),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        Self { bind_group, buffer }
    }
}
