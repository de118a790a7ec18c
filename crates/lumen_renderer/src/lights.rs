use glam::Vec3;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::prelude::*;

use crate::{
    config::{ClusterConfig, ComputeBackend},
    layout::{GpuLight, LightSetHeader, LightSetLayout},
};

/// Per-axis oscillation frequency range, in full bounces per second.
pub const LIGHT_SPEED_MIN: f32 = 0.02;
pub const LIGHT_SPEED_MAX: f32 = 0.08;
/// Salt separating the speed hashes from the phase hashes.
pub const SPEED_HASH_SALT: u32 = 0x9e37_79b9;

#[derive(Debug, PartialEq)]
pub enum LightUpload {
    None,
    Header(LightSetHeader),
    Whole(Vec<u8>),
}

/// Pastel RGB for a hue in [0, 1).
pub fn hue_to_rgb(h: f32) -> Vec3 {
    let f = |n: f32| {
        let k = (n + h * 6.0) % 6.0;
        1.0 - k.min(4.0 - k).min(1.0).max(0.0)
    };
    Vec3::ONE.lerp(Vec3::new(f(5.0), f(3.0), f(1.0)), 0.8)
}

/// One color per light, already scaled by `intensity`. Same seed, same palette.
pub fn generate_palette(count: u32, intensity: f32, seed: u64) -> Vec<Vec3> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| hue_to_rgb(rng.r#gen::<f32>()) * intensity)
        .collect()
}

/// PCG output permutation. Matches `pcgHash` in common.wgsl.
pub fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Top 24 bits of `h` as a float in [0, 1).
pub fn hash_to_unit(h: u32) -> f32 {
    (h >> 8) as f32 / 16_777_216.0
}

fn hash3(index: u32, salt: u32) -> Vec3 {
    let base = index.wrapping_mul(3) ^ salt;
    Vec3::new(
        hash_to_unit(pcg_hash(base)),
        hash_to_unit(pcg_hash(base.wrapping_add(1))),
        hash_to_unit(pcg_hash(base.wrapping_add(2))),
    )
}

/// 0 -> 0, 0.5 -> 1, 1 -> 0, repeating.
pub fn triangle_wave(u: f32) -> f32 {
    1.0 - (2.0 * (u - u.floor()) - 1.0).abs()
}

/// Closed-form light trajectory: each axis bounces between the box faces at
/// its own speed, starting from a per-light phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightMotion {
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
}

impl LightMotion {
    pub fn from_config(config: &ClusterConfig) -> Self {
        Self {
            bounds_min: Vec3::from_array(config.light_bounds_min),
            bounds_max: Vec3::from_array(config.light_bounds_max),
        }
    }

    pub fn phase(index: u32) -> Vec3 {
        hash3(index, 0)
    }

    pub fn speed(index: u32) -> Vec3 {
        Vec3::splat(LIGHT_SPEED_MIN) + (LIGHT_SPEED_MAX - LIGHT_SPEED_MIN) * hash3(index, SPEED_HASH_SALT)
    }

    pub fn position(&self, index: u32, time: f32) -> Vec3 {
        let u = Self::phase(index) + Self::speed(index) * time;
        let t = Vec3::new(triangle_wave(u.x), triangle_wave(u.y), triangle_wave(u.z));
        self.bounds_min + (self.bounds_max - self.bounds_min) * t
    }
}

/// Host mirror of the device light buffer.
pub struct LightSet {
    layout: LightSetLayout,
    lights: Vec<GpuLight>,
    active: u32,
    header_dirty: bool,
    motion: LightMotion,
}

impl LightSet {
    /// Every record gets its palette color; positions stay at the origin until
    /// the first animation step.
    pub fn new(config: &ClusterConfig) -> Self {
        let lights = generate_palette(config.max_lights, config.light_intensity, config.palette_seed)
            .into_iter()
            .map(|color| GpuLight::new(Vec3::ZERO, color))
            .collect();

        Self {
            layout: LightSetLayout {
                capacity: config.max_lights,
            },
            lights,
            active: config.num_lights.min(config.max_lights),
            header_dirty: false,
            motion: LightMotion::from_config(config),
        }
    }

    pub fn layout(&self) -> LightSetLayout {
        self.layout
    }

    pub fn capacity(&self) -> u32 {
        self.layout.capacity
    }

    pub fn active_count(&self) -> u32 {
        self.active
    }

    pub fn motion(&self) -> &LightMotion {
        &self.motion
    }

    /// Clamps to capacity and returns the count actually applied.
    pub fn set_active_count(&mut self, requested: u32) -> u32 {
        let count = requested.min(self.capacity());
        if count != requested {
            log::warn!("Requested {requested} lights, clamped to capacity {}", self.capacity());
        }
        if count != self.active {
            log::debug!("Active lights: {} -> {count}", self.active);
            self.active = count;
            self.header_dirty = true;
        }
        count
    }

    /// Returns the header once after each change of the active count.
    pub fn take_header_update(&mut self) -> Option<LightSetHeader> {
        std::mem::take(&mut self.header_dirty).then(|| LightSetHeader::new(self.active))
    }

    pub fn lights(&self) -> &[GpuLight] {
        &self.lights
    }

    pub fn active_lights(&self) -> &[GpuLight] {
        &self.lights[..self.active as usize]
    }

    /// Whole buffer, header included. Uploaded once at startup.
    pub fn encode(&self) -> Vec<u8> {
        self.layout.encode(self.active, &self.lights)
    }

    /// What the light set buffer needs this frame. The host backend animates
    /// here and replaces the whole buffer, header included.
    pub fn frame_upload(&mut self, backend: ComputeBackend, time: f32) -> LightUpload {
        let header = self.take_header_update();
        match backend {
            ComputeBackend::Gpu => header.map_or(LightUpload::None, LightUpload::Header),
            ComputeBackend::Host => {
                self.animate(time);
                LightUpload::Whole(self.encode())
            }
        }
    }

    /// Host version of the animation pass: moves the active lights only.
    pub fn animate(&mut self, time: f32) {
        let motion = self.motion;
        let active = self.active as usize;
        self.lights[..active]
            .par_iter_mut()
            .enumerate()
            .for_each(|(index, light)| light.set_position(motion.position(index as u32, time)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ClusterConfig {
        ClusterConfig {
            max_lights: 64,
            num_lights: 16,
            ..Default::default()
        }
    }

    #[test]
    fn hue_zero_is_pastel_red() {
        let c = hue_to_rgb(0.0);
        assert!((c - Vec3::new(1.0, 0.2, 0.2)).length() < 1e-6, "{c}");
        let g = hue_to_rgb(1.0 / 3.0);
        assert!((g - Vec3::new(0.2, 1.0, 0.2)).length() < 1e-5, "{g}");
    }

    #[test]
    fn palette_is_deterministic_and_scaled() {
        let a = generate_palette(100, 0.1, 3);
        let b = generate_palette(100, 0.1, 3);
        assert_eq!(a, b);
        assert!(a.iter().all(|c| c.max_element() <= 0.1 + 1e-6 && c.min_element() >= 0.02 - 1e-6));
        assert_ne!(a, generate_palette(100, 0.1, 4));
    }

    #[test]
    fn triangle_wave_bounces() {
        assert_eq!(triangle_wave(0.0), 0.0);
        assert_eq!(triangle_wave(0.5), 1.0);
        assert_eq!(triangle_wave(0.25), 0.5);
        assert_eq!(triangle_wave(1.75), 0.5);
        assert_eq!(triangle_wave(-0.25), 0.5);
    }

    #[test]
    fn hash_is_stable() {
        // values shared with the WGSL implementation
        assert_eq!(pcg_hash(0), 129_708_002);
        assert!(hash_to_unit(u32::MAX) < 1.0);
        assert_eq!(hash_to_unit(0), 0.0);
    }

    #[test]
    fn animation_matches_closed_form() {
        let config = small_config();
        let mut set = LightSet::new(&config);
        set.animate(12.5);

        let motion = LightMotion::from_config(&config);
        for (i, light) in set.active_lights().iter().enumerate() {
            let i = i as u32;
            let u = LightMotion::phase(i) + LightMotion::speed(i) * 12.5;
            let t = Vec3::new(triangle_wave(u.x), triangle_wave(u.y), triangle_wave(u.z));
            let expected = motion.bounds_min + (motion.bounds_max - motion.bounds_min) * t;
            assert_eq!(light.position(), expected);
        }
        // inactive lights are untouched
        assert!(set.lights()[16..].iter().all(|l| l.position() == Vec3::ZERO));
    }

    #[test]
    fn animated_lights_stay_in_bounds() {
        let config = small_config();
        let motion = LightMotion::from_config(&config);
        for i in 0..64 {
            for time in [0.0, 1.0, 17.3, 600.0] {
                let p = motion.position(i, time);
                assert!(p.cmpge(motion.bounds_min).all() && p.cmple(motion.bounds_max).all(), "{p}");
            }
        }
    }

    #[test]
    fn active_count_clamps_and_flags_header() {
        let mut set = LightSet::new(&small_config());
        assert_eq!(set.take_header_update(), None);

        assert_eq!(set.set_active_count(1000), 64);
        assert_eq!(set.take_header_update(), Some(LightSetHeader::new(64)));
        assert_eq!(set.take_header_update(), None);

        // unchanged count does not dirty the header
        set.set_active_count(64);
        assert_eq!(set.take_header_update(), None);

        set.set_active_count(0);
        assert!(set.active_lights().is_empty());
        assert_eq!(set.take_header_update(), Some(LightSetHeader::new(0)));
    }

    #[test]
    fn gpu_upload_is_header_only() {
        let mut set = LightSet::new(&small_config());
        assert_eq!(set.frame_upload(ComputeBackend::Gpu, 1.0), LightUpload::None);

        set.set_active_count(40);
        assert_eq!(
            set.frame_upload(ComputeBackend::Gpu, 1.0),
            LightUpload::Header(LightSetHeader::new(40))
        );
        assert_eq!(set.frame_upload(ComputeBackend::Gpu, 2.0), LightUpload::None);
    }

    #[test]
    fn host_upload_replaces_whole_buffer_once() {
        let mut set = LightSet::new(&small_config());
        set.set_active_count(40);

        let LightUpload::Whole(bytes) = set.frame_upload(ComputeBackend::Host, 3.0) else {
            panic!("host backend must upload the whole light set");
        };
        let (header, lights) = set.layout().decode(&bytes).unwrap();
        assert_eq!(header.num_lights, 40);
        assert_eq!(lights[7].position(), set.motion().position(7, 3.0));
        // the count change travelled with the whole buffer
        assert_eq!(set.take_header_update(), None);
    }

    #[test]
    fn encoded_buffer_carries_all_records() {
        let set = LightSet::new(&small_config());
        let (header, lights) = set.layout().decode(&set.encode()).unwrap();
        assert_eq!(header.num_lights, 16);
        assert_eq!(lights.len(), 64);
        assert_eq!(lights[63].color(), set.lights()[63].color());
    }
}
