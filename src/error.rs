//! Error types for Pixie.
//!
//! Setup operations (creating pools, loading presets and alpha maps,
//! bringing up the GPU) return these. The per-frame path never fails:
//! misconfiguration there is logged and skipped instead.

use thiserror::Error;

/// Errors that can occur when creating a particle pool.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// A pool must hold at least one slot.
    #[error("particle pool capacity must be at least 1")]
    ZeroCapacity,
}

/// Errors that can occur during GPU initialization.
#[derive(Debug, Error)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    #[error("failed to create GPU surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    #[error("no compatible GPU adapter found; ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support")]
    NoAdapter,
    /// Failed to create GPU device.
    #[error("failed to create GPU device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),
}

/// Errors that can occur while loading an alpha map.
#[derive(Debug, Error)]
pub enum TextureError {
    /// Failed to decode the image file.
    #[error("failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),
    /// Failed to read file from disk.
    #[error("failed to read texture file: {0}")]
    Io(#[from] std::io::Error),
    /// The image has no pixels.
    #[error("texture has zero width or height")]
    Empty,
}

/// Errors that can occur while loading or exporting an effect preset.
#[derive(Debug, Error)]
pub enum PresetError {
    /// Failed to read the preset file.
    #[error("could not read preset: {0}")]
    Io(#[from] std::io::Error),
    /// The preset is not valid RON.
    #[error("could not parse RON: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// The preset could not be written as RON.
    #[error("could not serialize preset: {0}")]
    Serialize(#[from] ron::Error),
    /// No built-in preset has this name.
    #[error("unknown built-in preset `{0}`")]
    UnknownBuiltIn(String),
    /// A pool names an alpha map that failed to load.
    #[error("alpha map for pool `{pool}`: {source}")]
    Texture {
        /// Pool that requested the texture.
        pool: String,
        /// Underlying load failure.
        source: TextureError,
    },
    /// A pool entry has invalid settings.
    #[error("pool `{pool}`: {source}")]
    Pool {
        /// Offending pool.
        pool: String,
        /// Underlying pool failure.
        source: PoolError,
    },
}

/// Errors that can occur when running the viewer.
#[derive(Debug, Error)]
pub enum ViewerError {
    /// Failed to create event loop.
    #[error("failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    /// Failed to create window.
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    /// GPU initialization failed.
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    /// The effect preset could not be loaded.
    #[error("preset error: {0}")]
    Preset(#[from] PresetError),
}
