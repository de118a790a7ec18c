use crate::{config::ConfigError, layout::LayoutError};

/// Everything that can stop the renderer from coming up. All of these are
/// fatal; the frame loop itself only logs surface hiccups.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to create a surface for the main window")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("no compatible GPU adapter found")]
    NoAdapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to open a logical device")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("surface reports no supported texture formats")]
    NoSurfaceFormat,

    #[error("could not acquire the next surface texture")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("{label} failed validation: {message}")]
    PipelineCreation { label: &'static str, message: String },

    #[error("{what} needs {requested} but the device allows {limit}")]
    DeviceLimit {
        what: &'static str,
        requested: u64,
        limit: u64,
    },

    #[error("host and device layouts disagree")]
    Layout(#[from] LayoutError),
}
