//! View-space cluster grid and the mapping in both directions.
//!
//! Forward: grid coordinate -> view-space AABB, used by cluster assignment.
//! Inverse: (ndc xy, view depth) -> grid coordinate, used by shading.
//!
//! A cluster owns the half-open ranges `[tile_start(t), tile_start(t + 1))` in
//! NDC x/y and `[depth_slice_start(k), depth_slice_start(k + 1))` in view depth.
//! The inverse functions are defined against those same boundary values so a
//! point classified by the forward ranges always maps back to the same cluster.
//! Values outside the grid clamp to the first or last cluster.
//!
//! `shaders/common.wgsl` carries the same functions line for line.

use glam::{Mat4, UVec3, Vec2, Vec3};
use lumen_core::{camera::Camera, transform::Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClusterCoord {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl ClusterCoord {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

/// View-space axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_points(points: &[Vec3]) -> Self {
        points.iter().fold(
            Aabb {
                min: Vec3::splat(f32::INFINITY),
                max: Vec3::splat(f32::NEG_INFINITY),
            },
            |acc, p| Aabb {
                min: acc.min.min(*p),
                max: acc.max.max(*p),
            },
        )
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Sphere-vs-box test. Touching counts as intersecting.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        let closest = center.clamp(self.min, self.max);
        center.distance_squared(closest) <= radius * radius
    }
}

/// Camera parameters needed to place clusters in view space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterCamera {
    pub view: Mat4,
    pub projection: Mat4,
    pub near: f32,
    pub far: f32,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub aspect_ratio: f32,
}

impl ClusterCamera {
    pub fn from_camera(camera: &Camera, transform: &Transform) -> Self {
        Self {
            view: transform.view_matrix(),
            projection: camera.compute_projection_matrix(),
            near: camera.near,
            far: camera.far,
            fov_y: camera.fov,
            aspect_ratio: camera.aspect_ratio,
        }
    }

    pub fn tan_half_fov_y(&self) -> f32 {
        (self.fov_y * 0.5).tan()
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view
    }

    /// View-space point on the ray through `ndc` at view depth `depth`.
    pub fn view_point(&self, ndc: Vec2, depth: f32) -> Vec3 {
        let tan = self.tan_half_fov_y();
        Vec3::new(ndc.x * depth * tan * self.aspect_ratio, ndc.y * depth * tan, -depth)
    }

    /// Inverse of [`ClusterCamera::view_point`]: returns (ndc, view depth).
    pub fn project_view_point(&self, p: Vec3) -> (Vec2, f32) {
        let depth = -p.z;
        let tan = self.tan_half_fov_y();
        (Vec2::new(p.x / (depth * tan * self.aspect_ratio), p.y / (depth * tan)), depth)
    }
}

pub fn depth_slice_start(k: u32, slices: u32, near: f32, far: f32) -> f32 {
    near * (far / near).powf(k as f32 / slices as f32)
}

/// Exponential depth slice holding view depth `depth`.
pub fn depth_to_slice(depth: f32, slices: u32, near: f32, far: f32) -> u32 {
    let d = depth.max(near);
    let estimate = ((d / near).ln() / (far / near).ln() * slices as f32).floor();
    let mut k = estimate.clamp(0.0, (slices - 1) as f32) as u32;
    if k > 0 && depth < depth_slice_start(k, slices, near, far) {
        k -= 1;
    } else if k + 1 < slices && depth >= depth_slice_start(k + 1, slices, near, far) {
        k += 1;
    }
    k
}

pub fn tile_start(t: u32, tiles: u32) -> f32 {
    -1.0 + 2.0 * t as f32 / tiles as f32
}

pub fn ndc_to_tile(ndc: f32, tiles: u32) -> u32 {
    let estimate = ((ndc + 1.0) * 0.5 * tiles as f32).floor();
    let mut t = estimate.clamp(0.0, (tiles - 1) as f32) as u32;
    if t > 0 && ndc < tile_start(t, tiles) {
        t -= 1;
    } else if t + 1 < tiles && ndc >= tile_start(t + 1, tiles) {
        t += 1;
    }
    t
}

/// Pixel-center coordinates (origin top-left, y down) to NDC (y up).
pub fn pixel_to_ndc(pixel: Vec2, resolution: Vec2) -> Vec2 {
    Vec2::new(pixel.x / resolution.x * 2.0 - 1.0, 1.0 - pixel.y / resolution.y * 2.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterGrid {
    pub dims: UVec3,
}

impl ClusterGrid {
    pub fn new(dims: [u32; 3]) -> Self {
        Self {
            dims: UVec3::from_array(dims),
        }
    }

    pub fn cluster_count(&self) -> u32 {
        self.dims.x * self.dims.y * self.dims.z
    }

    /// x varies fastest, then y, then z.
    pub fn linear_index(&self, c: ClusterCoord) -> u32 {
        c.x + c.y * self.dims.x + c.z * self.dims.x * self.dims.y
    }

    pub fn coord(&self, index: u32) -> ClusterCoord {
        let slice = self.dims.x * self.dims.y;
        ClusterCoord {
            x: index % self.dims.x,
            y: (index % slice) / self.dims.x,
            z: index / slice,
        }
    }

    pub fn coords(&self) -> impl Iterator<Item = ClusterCoord> + '_ {
        (0..self.cluster_count()).map(|i| self.coord(i))
    }

    /// NDC x/y range and view depth range owned by cluster `c`.
    pub fn slice_ranges(&self, c: ClusterCoord, camera: &ClusterCamera) -> (Vec2, Vec2, f32, f32) {
        let ndc_min = Vec2::new(tile_start(c.x, self.dims.x), tile_start(c.y, self.dims.y));
        let ndc_max = Vec2::new(tile_start(c.x + 1, self.dims.x), tile_start(c.y + 1, self.dims.y));
        let depth_min = depth_slice_start(c.z, self.dims.z, camera.near, camera.far);
        let depth_max = depth_slice_start(c.z + 1, self.dims.z, camera.near, camera.far);
        (ndc_min, ndc_max, depth_min, depth_max)
    }

    /// View-space box enclosing the frustum slice of cluster `c`.
    pub fn bounds(&self, c: ClusterCoord, camera: &ClusterCamera) -> Aabb {
        let (ndc_min, ndc_max, near, far) = self.slice_ranges(c, camera);
        let mut corners = [Vec3::ZERO; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let ndc = Vec2::new(
                if i & 1 == 0 { ndc_min.x } else { ndc_max.x },
                if i & 2 == 0 { ndc_min.y } else { ndc_max.y },
            );
            let depth = if i & 4 == 0 { near } else { far };
            *corner = camera.view_point(ndc, depth);
        }
        Aabb::from_points(&corners)
    }

    pub fn coord_for_ndc(&self, ndc: Vec2, depth: f32, near: f32, far: f32) -> ClusterCoord {
        ClusterCoord {
            x: ndc_to_tile(ndc.x, self.dims.x),
            y: ndc_to_tile(ndc.y, self.dims.y),
            z: depth_to_slice(depth, self.dims.z, near, far),
        }
    }

    pub fn index_for_ndc(&self, ndc: Vec2, depth: f32, near: f32, far: f32) -> u32 {
        self.linear_index(self.coord_for_ndc(ndc, depth, near, far))
    }

    /// Cluster of a view-space point, projected the same way shading does.
    pub fn coord_for_view_point(&self, p: Vec3, camera: &ClusterCamera) -> ClusterCoord {
        let (ndc, depth) = camera.project_view_point(p);
        self.coord_for_ndc(ndc, depth, camera.near, camera.far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn camera() -> ClusterCamera {
        ClusterCamera {
            view: Mat4::IDENTITY,
            projection: Mat4::perspective_rh(45f32.to_radians(), 16.0 / 9.0, 0.1, 1000.0),
            near: 0.1,
            far: 1000.0,
            fov_y: 45f32.to_radians(),
            aspect_ratio: 16.0 / 9.0,
        }
    }

    #[test]
    fn linear_index_round_trips() {
        let grid = ClusterGrid::new([16, 9, 24]);
        for i in 0..grid.cluster_count() {
            assert_eq!(grid.linear_index(grid.coord(i)), i);
        }
        assert_eq!(grid.linear_index(ClusterCoord::new(15, 8, 23)), grid.cluster_count() - 1);
    }

    #[test]
    fn depth_slices_span_near_to_far() {
        assert_eq!(depth_slice_start(0, 24, 0.1, 1000.0), 0.1);
        assert!((depth_slice_start(24, 24, 0.1, 1000.0) - 1000.0).abs() < 1e-2);
        for k in 0..24 {
            assert!(depth_slice_start(k, 24, 0.1, 1000.0) < depth_slice_start(k + 1, 24, 0.1, 1000.0));
        }
    }

    #[test]
    fn boundaries_belong_to_the_upper_cell() {
        for k in 0..24 {
            let start = depth_slice_start(k, 24, 0.1, 1000.0);
            assert_eq!(depth_to_slice(start, 24, 0.1, 1000.0), k);
        }
        for t in 0..16 {
            assert_eq!(ndc_to_tile(tile_start(t, 16), 16), t);
        }
    }

    #[test]
    fn out_of_range_values_clamp() {
        assert_eq!(depth_to_slice(0.0, 24, 0.1, 1000.0), 0);
        assert_eq!(depth_to_slice(-5.0, 24, 0.1, 1000.0), 0);
        assert_eq!(depth_to_slice(1e9, 24, 0.1, 1000.0), 23);
        assert_eq!(ndc_to_tile(-3.0, 16), 0);
        assert_eq!(ndc_to_tile(1.0, 16), 15);
        assert_eq!(ndc_to_tile(7.0, 16), 15);
    }

    #[test]
    fn pixel_corners_map_to_ndc_corners() {
        let res = Vec2::new(1920.0, 1080.0);
        assert_eq!(pixel_to_ndc(Vec2::ZERO, res), Vec2::new(-1.0, 1.0));
        assert_eq!(pixel_to_ndc(res, res), Vec2::new(1.0, -1.0));
    }

    #[test]
    fn forward_slice_maps_back_to_its_cluster() {
        let grid = ClusterGrid::new([16, 9, 24]);
        let cam = camera();
        let mut rng = StdRng::seed_from_u64(7);

        for c in grid.coords() {
            let (ndc_min, ndc_max, d0, d1) = grid.slice_ranges(c, &cam);
            for _ in 0..4 {
                let ndc = Vec2::new(rng.gen_range(ndc_min.x..ndc_max.x), rng.gen_range(ndc_min.y..ndc_max.y));
                let depth = rng.gen_range(d0..d1);
                assert_eq!(grid.coord_for_ndc(ndc, depth, cam.near, cam.far), c, "ndc {ndc} depth {depth}");
            }
            // the lower corner is inside by the half-open convention
            assert_eq!(grid.coord_for_ndc(ndc_min, d0, cam.near, cam.far), c);
        }
    }

    #[test]
    fn view_points_land_inside_their_cluster_bounds() {
        let grid = ClusterGrid::new([16, 9, 24]);
        let cam = camera();
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..2000 {
            let ndc = Vec2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
            let depth = rng.gen_range(cam.near..200.0);
            let p = cam.view_point(ndc, depth);
            let c = grid.coord_for_view_point(p, &cam);
            let bounds = grid.bounds(c, &cam);
            // points on a shared face may round either way by one ulp
            assert!(bounds.intersects_sphere(p, 1e-3), "{p} not in {bounds:?}");
        }
    }

    #[test]
    fn view_point_agrees_with_projection_matrix() {
        let cam = ClusterCamera::from_camera(&Camera::default(), &Transform::from_xyz(-7.0, 2.0, 0.0));
        let p = cam.view_point(Vec2::new(0.5, -0.25), 20.0);
        let clip = cam.projection * p.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!((ndc.x - 0.5).abs() < 1e-5 && (ndc.y + 0.25).abs() < 1e-5, "{ndc}");
    }

    #[test]
    fn sphere_touching_a_face_intersects() {
        let aabb = Aabb {
            min: Vec3::ZERO,
            max: Vec3::ONE,
        };
        assert!(aabb.intersects_sphere(Vec3::new(2.0, 0.5, 0.5), 1.0));
        assert!(!aabb.intersects_sphere(Vec3::new(2.0, 2.0, 0.5), 1.0));
        assert!(aabb.intersects_sphere(Vec3::splat(0.5), 0.01));
    }
}
