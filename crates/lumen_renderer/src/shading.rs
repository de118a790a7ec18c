//! Host version of the lighting pass math, mirrored by `lighting.wgsl`.

use glam::{Vec2, Vec3};

use crate::{
    cluster::{ClusterCamera, ClusterGrid},
    layout::{ClusterSetView, GpuLight},
};

/// Keeps a light sitting exactly on a surface from blowing up to infinity.
pub const MIN_DISTANCE_SQUARED: f32 = 1e-4;

/// Smooth window reaching zero at `radius`, times inverse-square falloff.
pub fn range_attenuation(distance: f32, radius: f32) -> f32 {
    let window = (1.0 - (distance / radius).powi(4)).clamp(0.0, 1.0);
    window / (distance * distance).max(MIN_DISTANCE_SQUARED)
}

pub fn light_contribution(light: &GpuLight, position: Vec3, normal: Vec3, radius: f32) -> Vec3 {
    let to_light = light.position() - position;
    let lambert = normal.dot(to_light.normalize_or_zero()).max(0.0);
    light.color() * lambert * range_attenuation(to_light.length(), radius)
}

/// One decoded G-buffer texel.
#[derive(Debug, Clone, Copy)]
pub struct GBufferSample {
    pub albedo: Vec3,
    pub normal: Vec3,
    pub position: Vec3,
}

pub struct ShadingInputs<'a> {
    pub grid: &'a ClusterGrid,
    pub camera: &'a ClusterCamera,
    pub clusters: ClusterSetView<'a>,
    pub lights: &'a [GpuLight],
    pub radius: f32,
    pub ambient: f32,
}

impl ShadingInputs<'_> {
    /// Cluster the lighting pass reads for a pixel at `ndc` covering `position`.
    pub fn cluster_for(&self, ndc: Vec2, position: Vec3) -> u32 {
        let depth = -self.camera.view.transform_point3(position).z;
        self.grid
            .index_for_ndc(ndc, depth, self.camera.near, self.camera.far)
    }

    pub fn shade(&self, ndc: Vec2, sample: &GBufferSample) -> Vec3 {
        let cluster = self.cluster_for(ndc, sample.position);
        let lighting = self
            .clusters
            .lights(cluster)
            .iter()
            .filter_map(|&index| self.lights.get(index as usize))
            .fold(Vec3::splat(self.ambient), |acc, light| {
                acc + light_contribution(light, sample.position, sample.normal, self.radius)
            });
        sample.albedo * lighting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attenuation_reaches_zero_at_radius() {
        assert_eq!(range_attenuation(2.0, 2.0), 0.0);
        assert_eq!(range_attenuation(3.0, 2.0), 0.0);
        assert!(range_attenuation(1.0, 2.0) > 0.0);
        // window is (1 - 1/16) at half radius
        assert!((range_attenuation(1.0, 2.0) - 15.0 / 16.0).abs() < 1e-6);
        assert!(range_attenuation(0.0, 2.0).is_finite());
    }

    #[test]
    fn back_facing_light_contributes_nothing() {
        let light = GpuLight::new(Vec3::new(0.0, -1.0, 0.0), Vec3::ONE);
        let c = light_contribution(&light, Vec3::ZERO, Vec3::Y, 2.0);
        assert_eq!(c, Vec3::ZERO);
    }

    #[test]
    fn light_above_surface_is_lambertian() {
        let light = GpuLight::new(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.1, 0.2, 0.3));
        let straight = light_contribution(&light, Vec3::ZERO, Vec3::Y, 2.0);
        let tilted = light_contribution(&light, Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0).normalize(), 2.0);
        assert!((straight - Vec3::new(0.1, 0.2, 0.3) * 15.0 / 16.0).length() < 1e-6);
        assert!((tilted - straight * std::f32::consts::FRAC_1_SQRT_2).length() < 1e-6);
    }
}
