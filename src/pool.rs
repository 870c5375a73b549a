//! Fixed-capacity particle pools.
//!
//! A [`ParticlePool`] is a ring buffer of particle slots stored as parallel
//! attribute arrays (see [`Attribute`]). Allocation writes slots at the
//! cursor and advances it with wraparound, overwriting the oldest particles
//! without complaint. There is no free list and no resize: a slot is "dead"
//! simply because its lifetime has run out.
//!
//! # Example
//!
//! ```ignore
//! use pixie::prelude::*;
//!
//! let mut pool = ParticlePool::new(PoolSettings {
//!     capacity: 4,
//!     render_mode: RenderMode::CameraFacing,
//!     ..Default::default()
//! })?;
//!
//! pool.allocate(6, &mut || ParticleAttributes::default());
//! assert_eq!(pool.cursor(), 2);
//!
//! let dirty = pool.flush(); // whole pool: a full lap happened
//! ```

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::PoolError;
use crate::lifecycle::{self, CameraBasis, FadeWindow, RenderMode, RenderedParticle};
use crate::particle::{Lifetime, ParticleAttributes, ParticleGenerator};
use crate::textures::TextureHandle;
use crate::upload::{Attribute, DirtyRange, UploadTracker};

/// How particle fragments combine with the framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendMode {
    /// Standard alpha blending.
    #[default]
    Alpha,
    /// Additive blending. Overlapping particles glow.
    Additive,
}

/// Pool configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Number of slots. Fixed for the lifetime of the pool.
    pub capacity: usize,
    /// Multiplier applied to the interpolated color.
    pub intensity: f32,
    /// Quad orientation mode.
    pub render_mode: RenderMode,
    /// Framebuffer blending.
    pub blend: BlendMode,
    /// Scale envelope.
    pub fade_size: FadeWindow,
    /// Opacity envelope.
    pub fade_alpha: FadeWindow,
    /// Optional texture whose alpha masks each quad.
    #[serde(skip)]
    pub alpha_map: Option<TextureHandle>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            capacity: 1000,
            intensity: 1.2,
            render_mode: RenderMode::Oriented,
            blend: BlendMode::Alpha,
            fade_size: FadeWindow::new(0.0, 0.0),
            fade_alpha: FadeWindow::new(0.0, 1.0),
            alpha_map: None,
        }
    }
}

impl PoolSettings {
    /// Set the capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the render mode.
    pub fn with_render_mode(mut self, mode: RenderMode) -> Self {
        self.render_mode = mode;
        self
    }

    /// Set the alpha map.
    pub fn with_alpha_map(mut self, map: TextureHandle) -> Self {
        self.alpha_map = Some(map);
        self
    }
}

/// Decoded contents of one slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotView {
    /// Slot index.
    pub index: usize,
    /// Emission transform.
    pub transform: Mat4,
    /// Color at birth.
    pub color_start: Color,
    /// Color at death.
    pub color_end: Color,
    /// Travel axis.
    pub direction: Vec3,
    /// Scalar speed.
    pub speed: f32,
    /// Angular velocity.
    pub rotation_speed: Vec3,
    /// Birth time and duration.
    pub lifetime: Lifetime,
}

impl SlotView {
    /// The view a slot would have after storing `attrs`.
    pub fn from_attributes(index: usize, attrs: &ParticleAttributes) -> Self {
        Self {
            index,
            transform: attrs.transform(),
            color_start: attrs.color_start,
            color_end: attrs.color_end,
            direction: attrs.direction,
            speed: attrs.speed,
            rotation_speed: attrs.rotation_speed,
            lifetime: attrs.lifetime,
        }
    }
}

/// Ring buffer of particle slots with dirty-range tracking.
#[derive(Debug)]
pub struct ParticlePool {
    settings: PoolSettings,
    cursor: usize,
    tracker: UploadTracker,

    // ========== Per-slot attribute arrays ==========
    transforms: Vec<[f32; 16]>,
    color_start: Vec<[f32; 3]>,
    color_end: Vec<[f32; 3]>,
    direction: Vec<[f32; 3]>,
    speed: Vec<f32>,
    rotation_speed: Vec<[f32; 3]>,
    lifetime: Vec<[f32; 2]>,
}

impl ParticlePool {
    /// Create a pool with every slot dead.
    pub fn new(settings: PoolSettings) -> Result<Self, PoolError> {
        let n = settings.capacity;
        if n == 0 {
            return Err(PoolError::ZeroCapacity);
        }
        Ok(Self {
            settings,
            cursor: 0,
            tracker: UploadTracker::new(),
            transforms: vec![Mat4::IDENTITY.to_cols_array(); n],
            color_start: vec![[0.0; 3]; n],
            color_end: vec![[0.0; 3]; n],
            direction: vec![[0.0; 3]; n],
            speed: vec![0.0; n],
            rotation_speed: vec![[0.0; 3]; n],
            lifetime: vec![[0.0; 2]; n],
        })
    }

    /// Pool configuration.
    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.settings.capacity
    }

    /// Next slot to be written.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Cursor value at the previous flush.
    #[inline]
    pub fn last_cursor(&self) -> usize {
        self.tracker.last_cursor()
    }

    /// Write `count` particles starting at the cursor.
    ///
    /// The generator is called once per slot, in order. Requests larger than
    /// the capacity wrap and overwrite particles from the same call; only
    /// the last `capacity` survive. Returns `count`.
    pub fn allocate<G>(&mut self, count: usize, generator: &mut G) -> usize
    where
        G: ParticleGenerator + ?Sized,
    {
        let capacity = self.capacity();
        if count > capacity {
            log::debug!(
                "allocating {} particles into a pool of {}; {} are overwritten",
                count,
                capacity,
                count - capacity
            );
        }
        for _ in 0..count {
            let attrs = generator.generate();
            self.write_slot(self.cursor, &attrs);
            self.cursor = (self.cursor + 1) % capacity;
        }
        self.tracker.record(count);
        count
    }

    fn write_slot(&mut self, i: usize, attrs: &ParticleAttributes) {
        self.transforms[i] = attrs.transform().to_cols_array();
        self.color_start[i] = attrs.color_start.to_array();
        self.color_end[i] = attrs.color_end.to_array();
        self.direction[i] = attrs.direction.to_array();
        self.speed[i] = attrs.speed;
        self.rotation_speed[i] = attrs.rotation_speed.to_array();
        self.lifetime[i] = [attrs.lifetime.birth_time, attrs.lifetime.duration];
    }

    /// Slots changed since the previous flush; starts a new tracking window.
    pub fn flush(&mut self) -> DirtyRange {
        let range = self.tracker.flush(self.cursor, self.capacity());
        log::trace!("flush: cursor {} -> {:?}", self.cursor, range);
        range
    }

    /// Kill every particle and rewind the cursor. The next flush is the whole pool.
    pub fn clear(&mut self) {
        self.transforms.fill(Mat4::IDENTITY.to_cols_array());
        self.color_start.fill([0.0; 3]);
        self.color_end.fill([0.0; 3]);
        self.direction.fill([0.0; 3]);
        self.speed.fill(0.0);
        self.rotation_speed.fill([0.0; 3]);
        self.lifetime.fill([0.0; 2]);
        self.cursor = 0;
        self.tracker.mark_all(self.capacity());
    }

    /// Decoded slot, or `None` past the capacity.
    pub fn slot(&self, index: usize) -> Option<SlotView> {
        if index >= self.capacity() {
            return None;
        }
        Some(SlotView {
            index,
            transform: Mat4::from_cols_array(&self.transforms[index]),
            color_start: Color::from(self.color_start[index]),
            color_end: Color::from(self.color_end[index]),
            direction: Vec3::from_array(self.direction[index]),
            speed: self.speed[index],
            rotation_speed: Vec3::from_array(self.rotation_speed[index]),
            lifetime: Lifetime::new(self.lifetime[index][0], self.lifetime[index][1]),
        })
    }

    /// Raw bytes of one attribute array, laid out for a vertex buffer.
    pub fn attribute_bytes(&self, attribute: Attribute) -> &[u8] {
        match attribute {
            Attribute::Transform => bytemuck::cast_slice(&self.transforms),
            Attribute::ColorStart => bytemuck::cast_slice(&self.color_start),
            Attribute::ColorEnd => bytemuck::cast_slice(&self.color_end),
            Attribute::Direction => bytemuck::cast_slice(&self.direction),
            Attribute::Speed => bytemuck::cast_slice(&self.speed),
            Attribute::RotationSpeed => bytemuck::cast_slice(&self.rotation_speed),
            Attribute::Lifetime => bytemuck::cast_slice(&self.lifetime),
        }
    }

    /// Number of particles visible at `time`.
    pub fn live_count(&self, time: f32) -> usize {
        self.lifetime
            .iter()
            .filter(|[birth, duration]| {
                lifecycle::progress(time, Lifetime::new(*birth, *duration))
                    .is_some_and(lifecycle::is_visible)
            })
            .count()
    }

    /// Evaluate every visible particle at `time`.
    pub fn evaluate(&self, time: f32, camera: &CameraBasis) -> Vec<RenderedParticle> {
        (0..self.capacity())
            .filter_map(|i| self.slot(i))
            .filter_map(|slot| lifecycle::evaluate(&slot, time, &self.settings, camera))
            .collect()
    }
}
