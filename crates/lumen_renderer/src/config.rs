use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_FILE_PATH: &str = "lumen.json";
/// Overrides [`DEFAULT_FILE_PATH`].
pub const FILE_PATH_ENV: &str = "LUMEN_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Where the per-frame light animation and cluster assignment run.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComputeBackend {
    #[default]
    Gpu,
    /// CPU reference path. Results are uploaded in the same binary layout.
    Host,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    /// Number of light records allocated on the device.
    pub max_lights: u32,
    /// Lights animated, clustered and shaded at startup.
    pub num_lights: u32,
    pub max_lights_per_cluster: u32,
    /// Grid dimensions along screen X, screen Y and view depth.
    pub cluster_count: [u32; 3],
    pub light_intensity: f32,
    pub light_radius: f32,
    pub ambient: f32,
    pub move_lights_workgroup_size: u32,
    pub cluster_workgroup_size: u32,
    pub palette_seed: u64,
    /// World-space box the lights bounce around in.
    pub light_bounds_min: [f32; 3],
    pub light_bounds_max: [f32; 3],
    pub backend: ComputeBackend,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_lights: 5000,
            num_lights: 500,
            max_lights_per_cluster: 256,
            cluster_count: [16, 9, 24],
            light_intensity: 0.1,
            light_radius: 2.0,
            ambient: 0.0,
            move_lights_workgroup_size: 128,
            cluster_workgroup_size: 64,
            palette_seed: 0x5eed,
            light_bounds_min: [-14.0, 0.0, -6.0],
            light_bounds_max: [14.0, 8.0, 6.0],
            backend: ComputeBackend::Gpu,
        }
    }
}

impl ClusterConfig {
    /// Reads the file named by `LUMEN_CONFIG`, or `lumen.json` in the working
    /// directory. A missing file means defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(FILE_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_PATH));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No configuration at {path:?}, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config = Self::from_json(&contents).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        log::info!("Loaded configuration from {path:?}");
        Ok(config)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.max_lights == 0 {
            return invalid("max_lights must be at least 1".into());
        }
        if self.num_lights > self.max_lights {
            return invalid(format!(
                "num_lights ({}) exceeds max_lights ({})",
                self.num_lights, self.max_lights
            ));
        }
        if self.max_lights_per_cluster == 0 {
            return invalid("max_lights_per_cluster must be at least 1".into());
        }
        if self.cluster_count.contains(&0) {
            return invalid(format!("cluster_count {:?} has a zero dimension", self.cluster_count));
        }
        if self.move_lights_workgroup_size == 0 || self.cluster_workgroup_size == 0 {
            return invalid("workgroup sizes must be at least 1".into());
        }
        if !(self.light_radius.is_finite() && self.light_radius > 0.0) {
            return invalid(format!("light_radius must be positive, got {}", self.light_radius));
        }
        if !self.light_intensity.is_finite() || !self.ambient.is_finite() {
            return invalid("light_intensity and ambient must be finite".into());
        }
        let inverted = self
            .light_bounds_min
            .iter()
            .zip(&self.light_bounds_max)
            .any(|(min, max)| !(min <= max));
        if inverted {
            return invalid("light_bounds_min must not exceed light_bounds_max".into());
        }
        Ok(())
    }

    pub fn total_clusters(&self) -> u32 {
        self.cluster_count.iter().product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ClusterConfig::default();
        config.validate().unwrap();
        assert_eq!(config.total_clusters(), 16 * 9 * 24);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ClusterConfig::from_json(r#"{ "num_lights": 42, "backend": "host" }"#).unwrap();
        assert_eq!(config.num_lights, 42);
        assert_eq!(config.backend, ComputeBackend::Host);
        assert_eq!(config.max_lights, 5000);
        assert_eq!(config.cluster_count, [16, 9, 24]);
    }

    #[test]
    fn rejects_active_above_capacity() {
        let err = ClusterConfig::from_json(r#"{ "max_lights": 10, "num_lights": 11 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
    }

    #[test]
    fn rejects_zero_grid_dimension() {
        let config = ClusterConfig {
            cluster_count: [16, 0, 24],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = ClusterConfig::from_json("{ num_lights: }").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("lumen-config-that-does-not-exist.json");
        let config = ClusterConfig::load_from(&path).unwrap();
        assert_eq!(config, ClusterConfig::default());
    }

    #[test]
    fn file_round_trips_through_serde() {
        let path = std::env::temp_dir().join(format!("lumen-config-{}.json", std::process::id()));
        let written = ClusterConfig {
            num_lights: 1234,
            light_radius: 3.5,
            ..Default::default()
        };
        std::fs::write(&path, serde_json::to_string_pretty(&written).unwrap()).unwrap();

        let read = ClusterConfig::load_from(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(read, written);
    }
}
