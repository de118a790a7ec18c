use glam::Vec3;
use rayon::prelude::*;

use crate::{
    cluster::{ClusterCamera, ClusterGrid},
    layout::{ClusterRecord, ClusterSetLayout, GpuLight, LayoutError},
};

/// Host cluster assignment over the device layout.
///
/// Each cluster is an independent task writing only its own record. Lights
/// are tested in ascending index order and the record stops accepting once
/// full, so overflowing clusters keep the lowest intersecting indices.
pub fn assign_clusters(
    grid: &ClusterGrid,
    camera: &ClusterCamera,
    lights: &[GpuLight],
    radius: f32,
    layout: &ClusterSetLayout,
    out: &mut [u32],
) -> Result<(), LayoutError> {
    if out.len() != layout.size_words() || layout.cluster_count != grid.cluster_count() {
        return Err(LayoutError::ClusterSetSize {
            expected: grid.cluster_count() as usize * layout.stride_words(),
            actual: out.len(),
        });
    }

    let view_positions: Vec<Vec3> = lights
        .par_iter()
        .map(|light| camera.view.transform_point3(light.position()))
        .collect();

    out.par_chunks_mut(layout.stride_words())
        .enumerate()
        .for_each(|(index, words)| {
            let bounds = grid.bounds(grid.coord(index as u32), camera);
            let mut record = ClusterRecord::new(words, layout.max_lights_per_cluster);
            for (light, center) in view_positions.iter().enumerate() {
                if record.is_full() {
                    break;
                }
                if bounds.intersects_sphere(*center, radius) {
                    record.push(light as u32);
                }
            }
        });

    Ok(())
}

#[cfg(test)]
mod tests {
    use glam::Mat4;

    use super::*;

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
    fn rejects_a_buffer_of_the_wrong_size() {
        let grid = ClusterGrid::new([2, 2, 2]);
        let layout = ClusterSetLayout {
            cluster_count: 8,
            max_lights_per_cluster: 4,
        };
        let mut out = vec![0; 3];
        assert!(assign_clusters(&grid, &camera(), &[], 1.0, &layout, &mut out).is_err());
    }

    #[test]
    fn stale_records_are_overwritten() {
        let grid = ClusterGrid::new([2, 2, 2]);
        let layout = ClusterSetLayout {
            cluster_count: 8,
            max_lights_per_cluster: 4,
        };
        let mut out = vec![7; layout.size_words()];
        assign_clusters(&grid, &camera(), &[], 1.0, &layout, &mut out).unwrap();

        let view = layout.view(&out).unwrap();
        assert!((0..8).all(|c| view.count(c) == 0));
    }

    #[test]
    fn light_in_front_lands_in_its_cluster() {
        let grid = ClusterGrid::new([16, 9, 24]);
        let layout = ClusterSetLayout {
            cluster_count: grid.cluster_count(),
            max_lights_per_cluster: 16,
        };
        let cam = camera();
        let light = GpuLight::new(Vec3::new(0.3, -0.2, -10.0), Vec3::ONE);
        let mut out = layout.zeroed();
        assign_clusters(&grid, &cam, &[light], 0.5, &layout, &mut out).unwrap();

        let home = grid.linear_index(grid.coord_for_view_point(light.position(), &cam));
        let view = layout.view(&out).unwrap();
        assert_eq!(view.lights(home), &[0]);
    }
}
