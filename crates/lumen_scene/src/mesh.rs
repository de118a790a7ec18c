use std::f32::consts::PI;

use glam::{Vec2, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3], // Flat lists are easier for generic loaders
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Horizontal quad centered on the origin, facing +Y.
    pub fn plane(width: f32, depth: f32) -> Self {
        let mut mesh = MeshData::default();
        mesh.push_quad(Vec3::ZERO, Vec3::Y, Vec3::Z * depth * 0.5, Vec3::X * width * 0.5);
        mesh
    }

    /// Axis-aligned box with the given half extents, one quad per face so
    /// normals stay flat.
    pub fn cuboid(hx: f32, hy: f32, hz: f32) -> Self {
        let (x, y, z) = (Vec3::X * hx, Vec3::Y * hy, Vec3::Z * hz);
        let mut mesh = MeshData::default();
        mesh.push_quad(x, Vec3::X, y, z);
        mesh.push_quad(-x, -Vec3::X, z, y);
        mesh.push_quad(y, Vec3::Y, z, x);
        mesh.push_quad(-y, -Vec3::Y, x, z);
        mesh.push_quad(z, Vec3::Z, x, y);
        mesh.push_quad(-z, -Vec3::Z, y, x);
        mesh
    }

    pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut mesh = MeshData::default();

        for r in 0..=rings {
            let theta = PI * r as f32 / rings as f32;
            for s in 0..=segments {
                let phi = 2.0 * PI * s as f32 / segments as f32;
                let normal = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
                mesh.vertices.push(Vertex {
                    position: (normal * radius).into(),
                    normal: normal.into(),
                    uv: [s as f32 / segments as f32, r as f32 / rings as f32],
                });
            }
        }

        let stride = segments + 1;
        for r in 0..rings {
            for s in 0..segments {
                let a = r * stride + s;
                let b = a + stride;
                mesh.indices.extend_from_slice(&[a, a + 1, b, a + 1, b + 1, b]);
            }
        }

        mesh
    }

    /// Appends a quad centered at `center`. `u x v` must point along `normal`
    /// so the triangles wind counter-clockwise seen from outside.
    fn push_quad(&mut self, center: Vec3, normal: Vec3, u: Vec3, v: Vec3) {
        let base = self.vertices.len() as u32;
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

        for (cu, cv) in corners {
            let uv = Vec2::new(cu, cv) * 0.5 + 0.5;
            self.vertices.push(Vertex {
                position: (center + u * cu + v * cv).into(),
                normal: normal.into(),
                uv: uv.into(),
            });
        }

        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every triangle's geometric normal agrees with its vertex normals.
    fn assert_outward_winding(mesh: &MeshData) {
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| mesh.vertices[i as usize]);
            let (pa, pb, pc) = (Vec3::from(a.position), Vec3::from(b.position), Vec3::from(c.position));
            let face = (pb - pa).cross(pc - pa);
            if face.length_squared() < 1e-12 {
                continue; // pole triangles of the sphere
            }
            let shading = Vec3::from(a.normal) + Vec3::from(b.normal) + Vec3::from(c.normal);
            assert!(face.dot(shading) > 0.0, "inward triangle {tri:?}");
        }
    }

    #[test]
    fn cuboid_has_flat_faces() {
        let mesh = MeshData::cuboid(0.5, 4.0, 0.5);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        assert_outward_winding(&mesh);

        for v in &mesh.vertices {
            let p = Vec3::from(v.position);
            assert!(p.x.abs() <= 0.5 + 1e-6 && p.y.abs() <= 4.0 + 1e-6 && p.z.abs() <= 0.5 + 1e-6);
        }
    }

    #[test]
    fn plane_faces_up() {
        let mesh = MeshData::plane(32.0, 14.0);
        assert_outward_winding(&mesh);
        assert!(mesh.vertices.iter().all(|v| v.normal == [0.0, 1.0, 0.0]));
    }

    #[test]
    fn sphere_indices_are_in_range_and_outward() {
        let mesh = MeshData::uv_sphere(2.0, 16, 8);
        assert_eq!(mesh.vertices.len(), 17 * 9);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
        assert_outward_winding(&mesh);
        for v in &mesh.vertices {
            assert!((Vec3::from(v.position).length() - 2.0).abs() < 1e-4);
        }
    }
}
