//! Per-particle lifecycle evaluation.
//!
//! A particle is never simulated step by step. Everything visible about it
//! at time `t` is a pure function of the attributes written at emission and
//! its age `t - birth_time`:
//!
//! | Quantity | Formula |
//! |----------|---------|
//! | progress | `age / duration`, visible only inside `[0, 1]` |
//! | scale | `fade(0, fade_size.start, p) * fade(1.01, fade_size.end, p)` |
//! | alpha | same shape with `fade_alpha` |
//! | displacement | `normalize(direction) * age * speed` (zero for a zero direction) |
//! | spin | `Rz * Ry * Rx` of `rotation_speed * age` |
//! | color | `mix(color_start, color_end, p) * intensity` |
//!
//! The same math runs in the generated WGSL (see [`crate::shader`]); this
//! module is the CPU rendition used for tests, picking and headless runs.

use glam::{Mat3, Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::particle::Lifetime;
use crate::pool::{PoolSettings, SlotView};

/// Side length of the unit particle quad.
pub const QUAD_SIZE: f32 = 0.5;

/// How a pool orients its particle quads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RenderMode {
    /// Honor the stored emission rotation plus the accumulated spin.
    #[default]
    Oriented,
    /// Always face the viewer, ignoring stored rotation.
    CameraFacing,
}

/// A pair of progress fractions shaping fade-in and fade-out.
///
/// `start` is where the fade-in completes, `end` is where the fade-out
/// begins (it falls to zero just past progress 1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FadeWindow {
    /// Progress at which the fade-in reaches full value.
    pub start: f32,
    /// Progress at which the fade-out begins.
    pub end: f32,
}

impl FadeWindow {
    /// Create a fade window.
    pub const fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    /// Envelope value at `progress`.
    pub fn value(&self, progress: f32) -> f32 {
        fade_window(0.0, self.start, progress) * fade_window(1.01, self.end, progress)
    }
}

/// Camera right and up vectors in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraBasis {
    /// World-space right.
    pub right: Vec3,
    /// World-space up.
    pub up: Vec3,
}

impl CameraBasis {
    /// Extract the basis from a view matrix (its first two rows).
    pub fn from_view(view: &Mat4) -> Self {
        let rows = view.transpose();
        Self {
            right: rows.x_axis.truncate(),
            up: rows.y_axis.truncate(),
        }
    }
}

impl Default for CameraBasis {
    fn default() -> Self {
        Self {
            right: Vec3::X,
            up: Vec3::Y,
        }
    }
}

/// Scale and alpha multipliers at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    /// Size multiplier.
    pub scale: f32,
    /// Opacity multiplier.
    pub alpha: f32,
}

/// A visible particle, ready to draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedParticle {
    /// Slot in the pool.
    pub slot: usize,
    /// Normalized age in `[0, 1]`.
    pub progress: f32,
    /// Maps quad-local coordinates to world space.
    pub transform: Mat4,
    /// Final color including intensity.
    pub color: Color,
    /// Opacity from the alpha envelope.
    pub alpha: f32,
}

impl RenderedParticle {
    /// World position of the quad center.
    pub fn position(&self) -> Vec3 {
        self.transform.w_axis.truncate()
    }
}

/// Normalized age, or `None` for a degenerate lifetime.
///
/// The result is not clamped; callers check [`is_visible`].
pub fn progress(time: f32, lifetime: Lifetime) -> Option<f32> {
    if !(lifetime.duration > 0.0) || !lifetime.duration.is_finite() {
        return None;
    }
    let p = (time - lifetime.birth_time) / lifetime.duration;
    p.is_finite().then_some(p)
}

/// Whether a progress value lies inside the lifetime.
pub fn is_visible(progress: f32) -> bool {
    (0.0..=1.0).contains(&progress)
}

/// Hermite smoothstep from `edge0` to `edge1`.
///
/// Works for falling windows (`edge0 > edge1`). Equal edges give a hard step.
pub fn fade_window(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge0 == edge1 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Scale and alpha envelopes at `progress`.
pub fn envelope(progress: f32, fade_size: FadeWindow, fade_alpha: FadeWindow) -> Envelope {
    Envelope {
        scale: fade_size.value(progress),
        alpha: fade_alpha.value(progress),
    }
}

/// Offset travelled along `direction` after `age` seconds.
pub fn displacement(direction: Vec3, speed: f32, age: f32) -> Vec3 {
    direction.normalize_or_zero() * age * speed
}

/// Accumulated rotation after `age` seconds.
pub fn spin(rotation_speed: Vec3, age: f32) -> Mat3 {
    let a = rotation_speed * age;
    Mat3::from_rotation_z(a.z) * Mat3::from_rotation_y(a.y) * Mat3::from_rotation_x(a.x)
}

/// Evaluate one slot at `time`. Returns `None` when the particle is unborn,
/// dead or never written.
pub fn evaluate(
    slot: &SlotView,
    time: f32,
    settings: &PoolSettings,
    camera: &CameraBasis,
) -> Option<RenderedParticle> {
    let progress = progress(time, slot.lifetime)?;
    if !is_visible(progress) {
        return None;
    }
    let age = time - slot.lifetime.birth_time;
    let env = envelope(progress, settings.fade_size, settings.fade_alpha);
    let offset = displacement(slot.direction, slot.speed, age);

    let transform = match settings.render_mode {
        RenderMode::Oriented => {
            Mat4::from_translation(offset)
                * slot.transform
                * Mat4::from_mat3(spin(slot.rotation_speed, age))
                * Mat4::from_scale(Vec3::splat(env.scale))
        }
        RenderMode::CameraFacing => {
            let size = slot.transform.x_axis.truncate().length() * env.scale;
            let center = slot.transform.w_axis.truncate() + offset;
            Mat4::from_cols(
                (camera.right * size).extend(0.0),
                (camera.up * size).extend(0.0),
                camera.right.cross(camera.up).extend(0.0),
                center.extend(1.0),
            )
        }
    };

    let color = slot.color_start.lerp(slot.color_end, progress);
    Some(RenderedParticle {
        slot: slot.index,
        progress,
        transform,
        color: Color::from(Vec3::from(color) * settings.intensity),
        alpha: env.alpha,
    })
}
