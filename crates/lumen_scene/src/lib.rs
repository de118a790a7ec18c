//! CPU-side scene description handed to the renderer.
//!
//! The renderer only ever iterates this data to upload buffers and issue draws;
//! nothing here knows about the GPU.

use lumen_core::transform::Transform;

pub mod material;
pub mod mesh;

pub use material::MaterialData;
pub use mesh::{MeshData, Vertex};

#[derive(Clone, Debug, Default)]
pub struct SceneData {
    pub meshes: Vec<MeshData>,
    pub materials: Vec<MaterialData>,

    // The Nodes (drawables)
    pub nodes: Vec<SceneNode>,
}

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub mesh_index: usize, // Index into the meshes list above
    pub material_index: usize,
}

impl SceneData {
    pub fn add_mesh(&mut self, mesh: MeshData) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    pub fn add_material(&mut self, material: MaterialData) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn spawn(&mut self, name: &str, transform: Transform, mesh_index: usize, material_index: usize) {
        self.nodes.push(SceneNode {
            name: name.to_string(),
            transform,
            mesh_index,
            material_index,
        });
    }

    /// A long hall with a floor, two rows of pillars and a few spheres; sized to
    /// sit inside the light animation volume.
    pub fn demo_hall() -> Self {
        let mut scene = SceneData::default();

        let floor = scene.add_mesh(MeshData::plane(32.0, 14.0));
        let pillar = scene.add_mesh(MeshData::cuboid(0.5, 4.0, 0.5));
        let ball = scene.add_mesh(MeshData::uv_sphere(1.0, 32, 16));

        let stone = scene.add_material(MaterialData::from_color([0.8, 0.8, 0.78, 1.0]));
        let marble = scene.add_material(MaterialData::from_color([0.95, 0.93, 0.9, 1.0]));
        let brass = scene.add_material(MaterialData::from_color([0.85, 0.65, 0.3, 1.0]));

        scene.spawn("floor", Transform::default(), floor, stone);

        for i in 0..7 {
            let x = -12.0 + i as f32 * 4.0;
            for z in [-4.0, 4.0] {
                scene.spawn(
                    &format!("pillar_{i}_{z}"),
                    Transform::from_xyz(x, 4.0, z),
                    pillar,
                    marble,
                );
            }
        }

        for i in 0..4 {
            let x = -9.0 + i as f32 * 6.0;
            scene.spawn(&format!("ball_{i}"), Transform::from_xyz(x, 1.0, 0.0), ball, brass);
        }

        scene
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_hall_nodes_reference_existing_data() {
        let scene = SceneData::demo_hall();
        assert_eq!(scene.nodes.len(), 1 + 14 + 4);
        for node in &scene.nodes {
            assert!(node.mesh_index < scene.meshes.len(), "{}", node.name);
            assert!(node.material_index < scene.materials.len(), "{}", node.name);
        }
    }
}
