//! Byte layout of every buffer shared between the host and the shaders.
//!
//! The WGSL declarations in `shaders/common.wgsl` must describe exactly these
//! layouts. Sizes are asserted at compile time below; anything that depends on
//! configuration (light capacity, per-cluster capacity) goes through
//! [`LightSetLayout`] and [`ClusterSetLayout`].
//!
//! ```text
//! LightSet   | numLights u32 | pad x3 | Light 0 (32 B) | Light 1 | ...
//! Light      | pos xyz | pad | color xyz | pad |
//! ClusterSet | Cluster 0 | Cluster 1 | ...
//! Cluster    | count u32 | pad x3 | index 0 | index 1 | ... | index slots-1 |
//! ```

use std::mem::size_of;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

pub const LIGHT_STRIDE_BYTES: usize = 32;
pub const LIGHT_SET_HEADER_BYTES: usize = 16;
pub const CLUSTER_HEADER_WORDS: usize = 4;
pub const CAMERA_UNIFORM_BYTES: usize = 160;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("light set buffer is {actual} bytes, layout expects {expected}")]
    LightSetSize { expected: usize, actual: usize },
    #[error("cluster set buffer is {actual} words, layout expects {expected}")]
    ClusterSetSize { expected: usize, actual: usize },
}

/// One point light. Color is stored premultiplied by the light intensity.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    pub position: [f32; 4], // .w unused
    pub color: [f32; 4],    // .w unused
}

impl GpuLight {
    pub fn new(position: Vec3, color: Vec3) -> Self {
        Self {
            position: position.extend(0.0).to_array(),
            color: color.extend(0.0).to_array(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_slice(&self.position[..3])
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position.extend(0.0).to_array();
    }

    pub fn color(&self) -> Vec3 {
        Vec3::from_slice(&self.color[..3])
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct LightSetHeader {
    pub num_lights: u32,
    pub _padding: [u32; 3],
}

impl LightSetHeader {
    pub fn new(num_lights: u32) -> Self {
        Self {
            num_lights,
            _padding: [0; 3],
        }
    }
}

/// Per-frame camera block read by clustering, the geometry pass and shading.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub near: f32,
    pub far: f32,
    pub tan_half_fov_y: f32,
    pub aspect_ratio: f32,
    pub resolution: [f32; 2],
    pub _padding: [f32; 2],
}

impl CameraUniform {
    pub fn new(
        view_proj: Mat4,
        view: Mat4,
        near: f32,
        far: f32,
        tan_half_fov_y: f32,
        aspect_ratio: f32,
        resolution: (u32, u32),
    ) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            near,
            far,
            tan_half_fov_y,
            aspect_ratio,
            resolution: [resolution.0 as f32, resolution.1 as f32],
            _padding: [0.0; 2],
        }
    }
}

/// Uniform sizes are kept at 16 bytes even though only `time` is read.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct AnimationUniform {
    pub time: f32,
    pub _padding: [f32; 3],
}

impl AnimationUniform {
    pub fn new(time: f32) -> Self {
        Self {
            time,
            _padding: [0.0; 3],
        }
    }
}

const _: () = assert!(size_of::<GpuLight>() == LIGHT_STRIDE_BYTES);
const _: () = assert!(size_of::<LightSetHeader>() == LIGHT_SET_HEADER_BYTES);
const _: () = assert!(size_of::<CameraUniform>() == CAMERA_UNIFORM_BYTES);
const _: () = assert!(size_of::<AnimationUniform>() == 16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightSetLayout {
    pub capacity: u32,
}

impl LightSetLayout {
    pub fn size_bytes(&self) -> usize {
        LIGHT_SET_HEADER_BYTES + self.capacity as usize * LIGHT_STRIDE_BYTES
    }

    /// Byte offset of light `index` inside the buffer.
    pub fn light_offset(&self, index: u32) -> usize {
        LIGHT_SET_HEADER_BYTES + index as usize * LIGHT_STRIDE_BYTES
    }

    /// Header followed by `capacity` records. Missing lights are zeroed.
    pub fn encode(&self, num_lights: u32, lights: &[GpuLight]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.size_bytes());
        bytes.extend_from_slice(bytemuck::bytes_of(&LightSetHeader::new(num_lights)));
        let stored = lights.len().min(self.capacity as usize);
        bytes.extend_from_slice(bytemuck::cast_slice(&lights[..stored]));
        bytes.resize(self.size_bytes(), 0);
        bytes
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<(LightSetHeader, Vec<GpuLight>), LayoutError> {
        if bytes.len() != self.size_bytes() {
            return Err(LayoutError::LightSetSize {
                expected: self.size_bytes(),
                actual: bytes.len(),
            });
        }
        let (header, lights) = bytes.split_at(LIGHT_SET_HEADER_BYTES);
        let lights = lights
            .chunks_exact(LIGHT_STRIDE_BYTES)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        Ok((bytemuck::pod_read_unaligned(header), lights))
    }
}

/// Layout of the per-cluster light index lists.
///
/// The index array is rounded up to a multiple of four words so every record
/// starts on a 16-byte boundary. Only the first `max_lights_per_cluster` slots
/// are ever written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterSetLayout {
    pub cluster_count: u32,
    pub max_lights_per_cluster: u32,
}

impl ClusterSetLayout {
    pub fn index_slots(&self) -> usize {
        (self.max_lights_per_cluster as usize).next_multiple_of(4)
    }

    pub fn stride_words(&self) -> usize {
        CLUSTER_HEADER_WORDS + self.index_slots()
    }

    pub fn stride_bytes(&self) -> usize {
        self.stride_words() * size_of::<u32>()
    }

    pub fn size_words(&self) -> usize {
        self.cluster_count as usize * self.stride_words()
    }

    pub fn size_bytes(&self) -> usize {
        self.size_words() * size_of::<u32>()
    }

    pub fn zeroed(&self) -> Vec<u32> {
        vec![0; self.size_words()]
    }

    /// Read-only view over an encoded cluster set.
    pub fn view<'a>(&self, words: &'a [u32]) -> Result<ClusterSetView<'a>, LayoutError> {
        if words.len() != self.size_words() {
            return Err(LayoutError::ClusterSetSize {
                expected: self.size_words(),
                actual: words.len(),
            });
        }
        Ok(ClusterSetView { layout: *self, words })
    }
}

#[derive(Clone, Copy)]
pub struct ClusterSetView<'a> {
    layout: ClusterSetLayout,
    words: &'a [u32],
}

impl<'a> ClusterSetView<'a> {
    pub fn len(&self) -> usize {
        self.layout.cluster_count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored count of cluster `index`, as written by the assignment pass.
    pub fn count(&self, index: u32) -> u32 {
        self.words[index as usize * self.layout.stride_words()]
    }

    /// Light indices stored for cluster `index`. A corrupt count is clamped to
    /// the per-cluster capacity the same way the shaders clamp it.
    pub fn lights(&self, index: u32) -> &'a [u32] {
        let start = index as usize * self.layout.stride_words() + CLUSTER_HEADER_WORDS;
        let count = self.count(index).min(self.layout.max_lights_per_cluster) as usize;
        &self.words[start..start + count]
    }
}

/// Mutable access to one cluster record.
pub struct ClusterRecord<'a> {
    words: &'a mut [u32],
    capacity: u32,
}

impl<'a> ClusterRecord<'a> {
    /// `words` must be exactly one record (`stride_words` long).
    pub fn new(words: &'a mut [u32], capacity: u32) -> Self {
        words[..CLUSTER_HEADER_WORDS].fill(0);
        Self { words, capacity }
    }

    pub fn count(&self) -> u32 {
        self.words[0]
    }

    pub fn is_full(&self) -> bool {
        self.count() >= self.capacity
    }

    /// Appends `light` if capacity remains. Returns false once the record is full.
    pub fn push(&mut self, light: u32) -> bool {
        if self.is_full() {
            return false;
        }
        let count = self.count();
        self.words[CLUSTER_HEADER_WORDS + count as usize] = light;
        self.words[0] = count + 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_records_are_16_byte_aligned() {
        for max in [1, 3, 4, 5, 100, 250, 256, 511] {
            let layout = ClusterSetLayout {
                cluster_count: 7,
                max_lights_per_cluster: max,
            };
            assert_eq!(layout.stride_bytes() % 16, 0, "max {max}");
            assert!(layout.index_slots() >= max as usize);
            assert_eq!(layout.size_bytes(), 7 * layout.stride_bytes());
        }
        // the default capacity needs no extra padding
        let layout = ClusterSetLayout {
            cluster_count: 1,
            max_lights_per_cluster: 256,
        };
        assert_eq!(layout.stride_bytes(), (1 + 3 + 256) * 4);
    }

    #[test]
    fn light_set_encoding_matches_declared_offsets() {
        let layout = LightSetLayout { capacity: 3 };
        let lights = [
            GpuLight::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.1, 0.2, 0.3)),
            GpuLight::new(Vec3::new(-1.0, 0.0, 5.0), Vec3::ONE),
        ];
        let bytes = layout.encode(2, &lights);
        assert_eq!(bytes.len(), 16 + 3 * 32);
        assert_eq!(&bytes[0..4], &2u32.to_ne_bytes());
        assert!(bytes[4..16].iter().all(|&b| b == 0));

        let second_x = layout.light_offset(1);
        assert_eq!(&bytes[second_x..second_x + 4], &(-1.0f32).to_ne_bytes());
        // color starts 16 bytes into the record
        assert_eq!(&bytes[second_x + 16..second_x + 20], &1.0f32.to_ne_bytes());
        // unused third record is zero
        assert!(bytes[layout.light_offset(2)..].iter().all(|&b| b == 0));

        let (header, decoded) = layout.decode(&bytes).unwrap();
        assert_eq!(header.num_lights, 2);
        assert_eq!(&decoded[..2], &lights);
    }

    #[test]
    fn decode_rejects_wrong_size() {
        let layout = LightSetLayout { capacity: 2 };
        let err = layout.decode(&[0u8; 40]).unwrap_err();
        assert_eq!(
            err,
            LayoutError::LightSetSize {
                expected: 80,
                actual: 40
            }
        );
    }

    #[test]
    fn record_push_stops_at_capacity() {
        let layout = ClusterSetLayout {
            cluster_count: 2,
            max_lights_per_cluster: 3,
        };
        let mut words = layout.zeroed();
        {
            let (first, _) = words.split_at_mut(layout.stride_words());
            let mut record = ClusterRecord::new(first, layout.max_lights_per_cluster);
            for light in [4, 9, 11, 20, 31] {
                record.push(light);
            }
            assert!(record.is_full());
            assert!(!record.push(99));
        }

        let view = layout.view(&words).unwrap();
        assert_eq!(view.count(0), 3);
        assert_eq!(view.lights(0), &[4, 9, 11]);
        assert_eq!(view.count(1), 0);
        assert!(view.lights(1).is_empty());
    }

    #[test]
    fn view_clamps_a_corrupt_count() {
        let layout = ClusterSetLayout {
            cluster_count: 1,
            max_lights_per_cluster: 2,
        };
        let mut words = layout.zeroed();
        words[0] = 1000;
        let view = layout.view(&words).unwrap();
        assert_eq!(view.lights(0).len(), 2);
    }
}
