use wgpu::util::DeviceExt;

use crate::layout::{
    AnimationUniform, CameraUniform, ClusterSetLayout, LayoutError, LightSetHeader, LightSetLayout,
};

/// Buffers shared by every pass. Allocated once, overwritten in place.
pub struct GlobalResources {
    pub camera_buffer: wgpu::Buffer,
    pub animation_buffer: wgpu::Buffer,
    pub light_set_buffer: wgpu::Buffer,
    pub cluster_set_buffer: wgpu::Buffer,
    light_layout: LightSetLayout,
    cluster_layout: ClusterSetLayout,
}

impl GlobalResources {
    /// `initial_lights` is the full encoded light set (header and records).
    pub fn new(
        device: &wgpu::Device,
        light_layout: LightSetLayout,
        cluster_layout: ClusterSetLayout,
        initial_lights: &[u8],
    ) -> Result<Self, LayoutError> {
        if initial_lights.len() != light_layout.size_bytes() {
            return Err(LayoutError::LightSetSize {
                expected: light_layout.size_bytes(),
                actual: initial_lights.len(),
            });
        }

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Uniform Buffer"),
            size: size_of::<CameraUniform>() as wgpu::BufferAddress,
            // COPY_DST: rewritten every frame before clustering
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let animation_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Animation Uniform Buffer"),
            contents: bytemuck::bytes_of(&AnimationUniform::new(0.0)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let light_set_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Set Buffer"),
            contents: initial_lights,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        // zero-initialized, so the first frame reads empty clusters at worst
        let cluster_set_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cluster Set Buffer"),
            size: cluster_layout.size_bytes() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        log::debug!(
            "Allocated light set ({} B) and cluster set ({} B, stride {} B)",
            light_layout.size_bytes(),
            cluster_layout.size_bytes(),
            cluster_layout.stride_bytes()
        );

        Ok(Self {
            camera_buffer,
            animation_buffer,
            light_set_buffer,
            cluster_set_buffer,
            light_layout,
            cluster_layout,
        })
    }

    pub fn update_camera(&self, queue: &wgpu::Queue, uniform: &CameraUniform) {
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(uniform));
    }

    pub fn update_time(&self, queue: &wgpu::Queue, time: f32) {
        queue.write_buffer(
            &self.animation_buffer,
            0,
            bytemuck::bytes_of(&AnimationUniform::new(time)),
        );
    }

    /// Only the 16-byte header; the records are untouched.
    pub fn write_light_header(&self, queue: &wgpu::Queue, header: &LightSetHeader) {
        queue.write_buffer(&self.light_set_buffer, 0, bytemuck::bytes_of(header));
    }

    /// Host backend: replaces the whole light set.
    pub fn write_lights(&self, queue: &wgpu::Queue, encoded: &[u8]) -> Result<(), LayoutError> {
        if encoded.len() != self.light_layout.size_bytes() {
            return Err(LayoutError::LightSetSize {
                expected: self.light_layout.size_bytes(),
                actual: encoded.len(),
            });
        }
        queue.write_buffer(&self.light_set_buffer, 0, encoded);
        Ok(())
    }

    /// Host backend: replaces the whole cluster set.
    pub fn write_clusters(&self, queue: &wgpu::Queue, words: &[u32]) -> Result<(), LayoutError> {
        if words.len() != self.cluster_layout.size_words() {
            return Err(LayoutError::ClusterSetSize {
                expected: self.cluster_layout.size_words(),
                actual: words.len(),
            });
        }
        queue.write_buffer(&self.cluster_set_buffer, 0, bytemuck::cast_slice(words));
        Ok(())
    }

    pub fn destroy(&self) {
        self.camera_buffer.destroy();
        self.animation_buffer.destroy();
        self.light_set_buffer.destroy();
        self.cluster_set_buffer.destroy();
    }
}
