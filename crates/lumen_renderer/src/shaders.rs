use crate::{
    config::ClusterConfig,
    layout::ClusterSetLayout,
    lights::{LIGHT_SPEED_MAX, LIGHT_SPEED_MIN, SPEED_HASH_SALT},
    shading::MIN_DISTANCE_SQUARED,
};

const COMMON: &str = include_str!("shaders/common.wgsl");

pub const MOVE_LIGHTS: &str = include_str!("shaders/move_lights.wgsl");
pub const CLUSTERING: &str = include_str!("shaders/clustering.wgsl");
pub const GBUFFER: &str = include_str!("shaders/gbuffer.wgsl");
pub const LIGHTING: &str = include_str!("shaders/lighting.wgsl");

/// Values substituted for `${name}` in the WGSL templates.
#[derive(Debug, Clone)]
pub struct ShaderConstants {
    values: Vec<(&'static str, String)>,
}

fn wgsl_f32(v: f32) -> String {
    // Debug keeps a decimal point or exponent, which WGSL needs for a float literal
    format!("{v:?}")
}

fn wgsl_vec3(v: [f32; 3]) -> String {
    v.map(wgsl_f32).join(", ")
}

impl ShaderConstants {
    pub fn from_config(config: &ClusterConfig) -> Self {
        let [x, y, z] = config.cluster_count;
        let cluster_layout = ClusterSetLayout {
            cluster_count: config.total_clusters(),
            max_lights_per_cluster: config.max_lights_per_cluster,
        };

        let values = vec![
            ("clusterCountX", format!("{x}u")),
            ("clusterCountY", format!("{y}u")),
            ("clusterCountZ", format!("{z}u")),
            ("clusterCount", format!("{}u", config.total_clusters())),
            ("maxLightsPerCluster", format!("{}u", config.max_lights_per_cluster)),
            ("clusterIndexSlots", cluster_layout.index_slots().to_string()),
            ("lightRadius", wgsl_f32(config.light_radius)),
            ("ambientLight", wgsl_f32(config.ambient)),
            ("minDistanceSquared", wgsl_f32(MIN_DISTANCE_SQUARED)),
            ("lightBoundsMin", wgsl_vec3(config.light_bounds_min)),
            ("lightBoundsMax", wgsl_vec3(config.light_bounds_max)),
            ("lightSpeedMin", wgsl_f32(LIGHT_SPEED_MIN)),
            ("lightSpeedMax", wgsl_f32(LIGHT_SPEED_MAX)),
            ("speedHashSalt", format!("{SPEED_HASH_SALT}u")),
            ("moveLightsWorkgroupSize", config.move_lights_workgroup_size.to_string()),
            ("clusterWorkgroupSize", config.cluster_workgroup_size.to_string()),
        ];
        Self { values }
    }

    /// Shared declarations followed by `body`, with every placeholder filled.
    pub fn compose(&self, body: &str) -> String {
        let mut source = format!("{COMMON}\n{body}");
        for (name, value) in &self.values {
            source = source.replace(&format!("${{{name}}}"), value);
        }
        source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_placeholder_is_filled() {
        let constants = ShaderConstants::from_config(&ClusterConfig::default());
        for body in [MOVE_LIGHTS, CLUSTERING, GBUFFER, LIGHTING] {
            let source = constants.compose(body);
            assert!(!source.contains("${"), "unfilled placeholder in:\n{source}");
        }
    }

    fn validate(source: &str) {
        let module = naga::front::wgsl::parse_str(source)
            .unwrap_or_else(|err| panic!("{}", err.emit_to_string(source)));
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .unwrap_or_else(|err| panic!("{}", err.emit_to_string(source)));
    }

    #[test]
    fn composed_programs_compile() {
        let small = ClusterConfig {
            cluster_count: [8, 4, 12],
            max_lights_per_cluster: 30,
            cluster_workgroup_size: 32,
            ..Default::default()
        };
        for config in [ClusterConfig::default(), small] {
            let constants = ShaderConstants::from_config(&config);
            for body in [MOVE_LIGHTS, CLUSTERING, GBUFFER, LIGHTING] {
                validate(&constants.compose(body));
            }
        }
    }

    #[test]
    fn constants_follow_config() {
        let config = ClusterConfig {
            cluster_count: [8, 4, 12],
            max_lights_per_cluster: 30,
            light_radius: 3.0,
            cluster_workgroup_size: 32,
            ..Default::default()
        };
        let source = ShaderConstants::from_config(&config).compose(CLUSTERING);
        assert!(source.contains("const clusterCountX: u32 = 8u;"));
        assert!(source.contains("const clusterCount: u32 = 384u;"));
        assert!(source.contains("const lightRadius: f32 = 3.0;"));
        // 30 slots round up to 32 to keep records 16-byte aligned
        assert!(source.contains("lightIndices: array<u32, 32>"));
        assert!(source.contains("@workgroup_size(32)"));
    }

    #[test]
    fn floats_are_wgsl_literals() {
        assert_eq!(wgsl_f32(2.0), "2.0");
        assert_eq!(wgsl_f32(0.1), "0.1");
        assert_eq!(wgsl_f32(-14.0), "-14.0");
        assert_eq!(wgsl_vec3([1.0, 0.0, -6.0]), "1.0, 0.0, -6.0");
    }
}
