//! # Pixie - GPU-instanced particle effects
//!
//! Pixie renders large numbers of short-lived particles as instanced quads.
//! The CPU only writes a particle once, at birth; everything after that
//! (motion, spin, color and fade) is a closed-form function of age that the
//! vertex shader evaluates every frame.
//!
//! ## Quick Start
//!
//! ```ignore
//! use pixie::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut engine = VfxEngine::new();
//!     engine.register_pool(
//!         "sparks",
//!         ParticlePool::new(PoolSettings::default().with_render_mode(RenderMode::CameraFacing))?,
//!     );
//!     engine.add_emitter(Emitter::new(
//!         "sparks",
//!         EmitterSettings::default().with_looping(true),
//!     ));
//!     pixie::viewer::run(engine, "sparks")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Pools
//!
//! A [`ParticlePool`] is a fixed-capacity ring buffer of slots stored as
//! parallel attribute arrays. Allocation writes at the cursor and wraps,
//! overwriting the oldest particles when the pool is full.
//!
//! ### Emitters
//!
//! An [`Emitter`] releases `particle_count` particles per cycle, either
//! spread over `duration` or all at once, into a pool looked up by name in
//! the [`PoolRegistry`].
//!
//! ### Uploads
//!
//! Every flush yields a [`DirtyRange`]: the one or two slot spans written
//! since the previous flush. Only those bytes are sent to the GPU.
//!
//! ### Lifecycle
//!
//! [`lifecycle::evaluate`] is the CPU mirror of the vertex shader and is
//! what the tests check rendering behaviour against.
//!
//! ## Module Overview
//!
//! | Concern | Modules |
//! |---------|---------|
//! | Storage | [`pool`], [`upload`], [`registry`] |
//! | Emission | [`emitter`], [`particle`], [`fireworks`] |
//! | Rendering | [`lifecycle`], [`shader`], [`gpu`], [`textures`] |
//! | Driving | [`engine`], [`time`], [`viewer`] |
//! | Configuration | [`preset`], [`color`] |

pub mod color;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod fireworks;
pub mod gpu;
pub mod lifecycle;
pub mod particle;
pub mod pool;
pub mod preset;
pub mod registry;
pub mod shader;
pub mod textures;
pub mod time;
pub mod upload;
pub mod viewer;

pub use color::Color;
pub use emitter::{Emitter, EmitterSettings, SpawnMode};
pub use engine::{EmitterId, FrameReport, Motion, VfxEngine};
pub use error::{GpuError, PoolError, PresetError, TextureError, ViewerError};
pub use fireworks::{FireworkLauncher, FireworkSettings};
pub use glam::{Vec2, Vec3, Vec4};
pub use lifecycle::{CameraBasis, FadeWindow, RenderMode, RenderedParticle};
pub use particle::{Lifetime, ParticleAttributes, ParticleGenerator, ValueRange, VectorRange};
pub use pool::{BlendMode, ParticlePool, PoolSettings};
pub use preset::EffectPreset;
pub use registry::PoolRegistry;
pub use textures::{AlphaMap, TextureHandle};
pub use time::{Clock, FrameTime};
pub use upload::{DirtyRange, Span};

/// Everything needed to build and run an effect.
pub mod prelude {
    pub use crate::color::Color;
    pub use crate::emitter::{Emitter, EmitterSettings, SpawnMode};
    pub use crate::engine::{Motion, VfxEngine};
    pub use crate::fireworks::{FireworkLauncher, FireworkSettings};
    pub use crate::lifecycle::{FadeWindow, RenderMode};
    pub use crate::particle::{ValueRange, VectorRange};
    pub use crate::pool::{BlendMode, ParticlePool, PoolSettings};
    pub use crate::preset::EffectPreset;
    pub use crate::registry::PoolRegistry;
    pub use crate::textures::AlphaMap;
    pub use crate::time::{Clock, FrameTime};
    pub use glam::{Affine3A, Vec3};
}
