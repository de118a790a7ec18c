use lumen_scene::SceneData;

use crate::{
    material::GpuMaterial,
    mesh::{GpuGeometry, MeshInstance},
};

/// Everything the geometry pass needs to issue one indexed draw.
pub struct DrawPrimitive<'a> {
    pub vertex_buffer: &'a wgpu::Buffer,
    pub index_buffer: &'a wgpu::Buffer,
    pub index_count: u32,
    pub material: &'a wgpu::BindGroup,
    pub model: &'a wgpu::BindGroup,
}

/// Scene traversal consumed by the geometry pass. The pass draws whatever is
/// yielded, once, in the order given.
pub trait SceneSource {
    fn for_each_primitive(&self, visit: &mut dyn FnMut(DrawPrimitive<'_>));
}

struct GpuNode {
    mesh: usize,
    material: usize,
    instance: MeshInstance,
}

/// Static scene uploaded once at startup.
pub struct GpuScene {
    geometries: Vec<GpuGeometry>,
    materials: Vec<GpuMaterial>,
    nodes: Vec<GpuNode>,
}

impl GpuScene {
    pub fn upload(
        device: &wgpu::Device,
        scene: &SceneData,
        material_layout: &wgpu::BindGroupLayout,
        mesh_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let geometries = scene
            .meshes
            .iter()
            .enumerate()
            .map(|(i, mesh)| GpuGeometry::upload(device, mesh, &format!("Mesh {i}")))
            .collect();

        let materials = scene
            .materials
            .iter()
            .map(|material| GpuMaterial::new(device, material_layout, material))
            .collect();

        let nodes: Vec<GpuNode> = scene
            .nodes
            .iter()
            .filter(|node| {
                let valid = node.mesh_index < scene.meshes.len() && node.material_index < scene.materials.len();
                if !valid {
                    log::warn!("Skipping scene node '{}' with dangling mesh or material", node.name);
                }
                valid
            })
            .map(|node| GpuNode {
                mesh: node.mesh_index,
                material: node.material_index,
                instance: MeshInstance::new(device, mesh_layout, &node.transform),
            })
            .collect();

        log::info!(
            "Uploaded scene: {} meshes, {} materials, {} nodes",
            scene.meshes.len(),
            scene.materials.len(),
            nodes.len()
        );

        Self {
            geometries,
            materials,
            nodes,
        }
    }

    pub fn destroy(&self) {
        for geometry in &self.geometries {
            geometry.destroy();
        }
        for material in &self.materials {
            material.buffer.destroy();
        }
        for node in &self.nodes {
            node.instance.buffer.destroy();
        }
    }
}

impl SceneSource for GpuScene {
    fn for_each_primitive(&self, visit: &mut dyn FnMut(DrawPrimitive<'_>)) {
        for node in &self.nodes {
            let geometry = &self.geometries[node.mesh];
            visit(DrawPrimitive {
                vertex_buffer: &geometry.vertex_buffer,
                index_buffer: &geometry.index_buffer,
                index_count: geometry.index_count,
                material: &self.materials[node.material].bind_group,
                model: &node.instance.bind_group,
            });
        }
    }
}
