//! Clustered deferred renderer.
//!
//! Each frame animates a large set of point lights, bins them into a
//! view-space cluster grid, rasterizes the scene into a G-buffer and shades
//! every pixel against only the lights of its cluster.

pub mod cluster;
pub mod clustering;
pub mod config;
pub mod error;
pub mod frame;
pub mod gbuffer;
pub mod global_resources;
pub mod layout;
pub mod lights;
mod material;
mod mesh;
pub mod programs;
pub mod render;
pub mod scene;
pub mod shaders;
pub mod shading;

pub use cluster::{ClusterCamera, ClusterCoord, ClusterGrid};
pub use config::{ClusterConfig, ComputeBackend, ConfigError};
pub use error::RenderError;
pub use frame::{FrameInputs, FrameOrchestrator, FrameStage};
pub use lights::LightSet;
pub use render::{ClusteredRenderer, RenderContext, RenderPlugin, RenderTarget};
