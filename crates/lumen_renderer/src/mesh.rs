use std::mem;

use bytemuck::{Pod, Zeroable};
use lumen_core::transform::Transform;
use lumen_scene::MeshData;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct MeshUniform {
    pub model: [[f32; 4]; 4],
    // Transpose(Inverse(Model)), so non-uniform scale keeps normals perpendicular.
    // 4x4 to keep uniform alignment simple.
    pub normal_matrix: [[f32; 4]; 4],
}

impl MeshUniform {
    pub fn from_transform(transform: &Transform) -> Self {
        let model_matrix = transform.compute_matrix();
        let normal_matrix = model_matrix.inverse().transpose();

        Self {
            model: model_matrix.to_cols_array_2d(),
            normal_matrix: normal_matrix.to_cols_array_2d(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl From<&lumen_scene::Vertex> for Vertex {
    fn from(v: &lumen_scene::Vertex) -> Self {
        Self {
            position: v.position,
            normal: v.normal,
            uv: v.uv,
        }
    }
}

impl Vertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0, // @location(0) in shader
                    format: wgpu::VertexFormat::Float32x3, // position
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: (mem::size_of::<[f32; 3]>() * 2) as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

pub struct GpuGeometry {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl GpuGeometry {
    pub fn upload(device: &wgpu::Device, data: &MeshData, label: &str) -> Self {
        let vertices: Vec<Vertex> = data.vertices.iter().map(Vertex::from).collect();

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Vertex Buffer")),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Index Buffer")),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: data.indices.len() as u32,
        }
    }

    pub fn destroy(&self) {
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
    }
}

/// Per-node model transform, bound at group 2.
pub struct MeshInstance {
    pub bind_group: wgpu::BindGroup,
    pub buffer: wgpu::Buffer,
}

impl MeshInstance {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, transform: &Transform) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Uniform Buffer"),
            contents: bytemuck::bytes_of(&MeshUniform::from_transform(transform)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Mesh Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        Self { bind_group, buffer }
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec3, Vec4};

    use super::*;

    #[test]
    fn vertex_layout_matches_scene_vertex() {
        assert_eq!(mem::size_of::<Vertex>(), 32);
        assert_eq!(Vertex::desc().array_stride, 32);
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let mut transform = Transform::from_xyz(1.0, 2.0, 3.0);
        transform.scale = Vec3::new(1.0, 4.0, 1.0);
        let uniform = MeshUniform::from_transform(&transform);

        let normal_matrix = glam::Mat4::from_cols_array_2d(&uniform.normal_matrix);
        // the normal of a surface tilted 45 degrees in model space
        let n = (normal_matrix * Vec4::new(1.0, 1.0, 0.0, 0.0)).truncate().normalize();
        let tangent = transform.compute_matrix().transform_vector3(Vec3::new(1.0, -1.0, 0.0));
        assert!(n.dot(tangent).abs() < 1e-5);
    }
}
