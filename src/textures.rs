//! Alpha map textures for particle quads.
//!
//! A pool may carry an optional alpha map. Its alpha channel multiplies the
//! particle's faded opacity, giving soft dots, sparks or smoke puffs instead
//! of hard squares. The engine only stores an opaque [`TextureHandle`]; the
//! GPU layer uploads the pixels when it builds the pool's pipeline.
//!
//! # Example
//!
//! ```ignore
//! use pixie::textures::AlphaMap;
//!
//! let spark = AlphaMap::from_file("assets/spark.png")?.into_handle();
//! let dot = AlphaMap::radial_dot(64).into_handle();
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::TextureError;

/// Largest generated dot, in pixels per side.
pub const MAX_DOT_SIZE: u32 = 2048;

/// Filter mode for texture sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Smooth linear filtering (default).
    #[default]
    Linear,
    /// Sharp nearest-neighbor filtering. Good for pixel art sprites.
    Nearest,
}

/// RGBA pixels used as a particle alpha mask.
#[derive(Clone)]
pub struct AlphaMap {
    /// Raw RGBA pixel data (width * height * 4 bytes).
    pub data: Vec<u8>,
    /// Texture width in pixels.
    pub width: u32,
    /// Texture height in pixels.
    pub height: u32,
    /// Filter mode for magnification/minification.
    pub filter: FilterMode,
}

impl fmt::Debug for AlphaMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlphaMap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

impl AlphaMap {
    /// Wrap raw RGBA data.
    ///
    /// Fails with [`TextureError::Empty`] when either dimension is zero or
    /// the data length does not match.
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32) -> Result<Self, TextureError> {
        if width == 0 || height == 0 || data.len() != (width as usize * height as usize * 4) {
            return Err(TextureError::Empty);
        }
        Ok(Self {
            data,
            width,
            height,
            filter: FilterMode::Linear,
        })
    }

    /// Load an image file (PNG or JPEG).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TextureError> {
        let bytes = std::fs::read(path.as_ref())?;
        let img = image::load_from_memory(&bytes)?.into_rgba8();
        let (width, height) = img.dimensions();
        log::debug!(
            "loaded alpha map {} ({}x{})",
            path.as_ref().display(),
            width,
            height
        );
        Self::from_rgba(img.into_raw(), width, height)
    }

    /// Procedural soft dot: opaque center fading to transparent at the edge.
    ///
    /// `size` is clamped to `2..=MAX_DOT_SIZE`.
    pub fn radial_dot(size: u32) -> Self {
        if size > MAX_DOT_SIZE {
            log::warn!("alpha dot size {} clamped to {}", size, MAX_DOT_SIZE);
        }
        let size = size.clamp(2, MAX_DOT_SIZE);
        let mut data = Vec::with_capacity(size as usize * size as usize * 4);
        let half = (size - 1) as f32 / 2.0;
        for y in 0..size {
            for x in 0..size {
                let dx = (x as f32 - half) / half;
                let dy = (y as f32 - half) / half;
                let d = (dx * dx + dy * dy).sqrt().min(1.0);
                let a = (1.0 - d) * (1.0 - d);
                data.extend_from_slice(&[255, 255, 255, (a * 255.0).round() as u8]);
            }
        }
        Self {
            data,
            width: size,
            height: size,
            filter: FilterMode::Linear,
        }
    }

    /// Set the filter mode.
    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    /// Alpha value at a pixel, in `0.0..=1.0`.
    pub fn alpha_at(&self, x: u32, y: u32) -> f32 {
        let i = ((y.min(self.height - 1) * self.width + x.min(self.width - 1)) * 4 + 3) as usize;
        self.data[i] as f32 / 255.0
    }

    /// Share this map between pools.
    pub fn into_handle(self) -> TextureHandle {
        TextureHandle(Arc::new(self))
    }
}

/// Opaque, cheaply clonable reference to an alpha map.
///
/// Two handles are equal when they point at the same map.
#[derive(Debug, Clone)]
pub struct TextureHandle(Arc<AlphaMap>);

impl TextureHandle {
    /// The underlying pixels.
    pub fn map(&self) -> &AlphaMap {
        &self.0
    }
}

impl PartialEq for TextureHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
