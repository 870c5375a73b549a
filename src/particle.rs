//! Per-particle value types.
//!
//! A [`ParticleAttributes`] is everything a pool stores for one slot. It is
//! produced once at emission by a generator and never mutated afterwards;
//! all motion is derived from it plus the particle's age.

use glam::{Mat4, Quat, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::color::Color;

/// Birth time and duration of one particle, in simulation seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Lifetime {
    /// Absolute clock value at emission.
    pub birth_time: f32,
    /// How long the particle stays alive.
    pub duration: f32,
}

impl Lifetime {
    /// Create a lifetime starting at `birth_time`.
    pub const fn new(birth_time: f32, duration: f32) -> Self {
        Self { birth_time, duration }
    }

    /// Time of death.
    pub fn end(&self) -> f32 {
        self.birth_time + self.duration
    }
}

/// The full attribute set of one particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleAttributes {
    /// Emission position in world space.
    pub position: Vec3,
    /// Emission orientation as XYZ Euler angles in radians.
    pub rotation: Vec3,
    /// Emission scale per axis.
    pub scale: Vec3,
    /// Color at birth.
    pub color_start: Color,
    /// Color at death.
    pub color_end: Color,
    /// Travel axis; normalized when evaluated, may be zero.
    pub direction: Vec3,
    /// Distance travelled per second of age along `direction`.
    pub speed: f32,
    /// Angular velocity per axis in radians per second.
    pub rotation_speed: Vec3,
    /// When the particle is born and how long it lives.
    pub lifetime: Lifetime,
}

impl Default for ParticleAttributes {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            color_start: Color::WHITE,
            color_end: Color::WHITE,
            direction: Vec3::ZERO,
            speed: 0.0,
            rotation_speed: Vec3::ZERO,
            lifetime: Lifetime::default(),
        }
    }
}

impl ParticleAttributes {
    /// Compose the emission transform: scale, then XYZ rotation, then translation.
    pub fn transform(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            glam::EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

/// Produces one particle's attributes per call.
///
/// Pools invoke the generator once per allocated slot, in slot order.
/// Any `FnMut() -> ParticleAttributes` closure is a generator.
pub trait ParticleGenerator {
    /// Produce the next particle.
    fn generate(&mut self) -> ParticleAttributes;
}

impl<F> ParticleGenerator for F
where
    F: FnMut() -> ParticleAttributes,
{
    fn generate(&mut self) -> ParticleAttributes {
        self()
    }
}

/// Uniform sampling interval for a scalar attribute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    /// Lower bound.
    pub min: f32,
    /// Upper bound.
    pub max: f32,
}

impl ValueRange {
    /// Create a range.
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// A range that always yields `value`.
    pub const fn constant(value: f32) -> Self {
        Self::new(value, value)
    }

    /// Draw a value in `[min, max)`. Reversed or empty bounds are accepted.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        self.min + rng.gen::<f32>() * (self.max - self.min)
    }
}

/// Per-component uniform sampling box for a vector attribute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VectorRange {
    /// Lower corner.
    pub min: Vec3,
    /// Upper corner.
    pub max: Vec3,
}

impl VectorRange {
    /// Create a range.
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// A range that always yields `value`.
    pub const fn constant(value: Vec3) -> Self {
        Self::new(value, value)
    }

    /// Draw each component independently.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec3 {
        let t = Vec3::new(rng.gen(), rng.gen(), rng.gen());
        self.min + t * (self.max - self.min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_value_range_bounds() {
        let mut rng = SmallRng::seed_from_u64(7);
        let range = ValueRange::new(5.0, 20.0);
        for _ in 0..1000 {
            let v = range.sample(&mut rng);
            assert!((5.0..=20.0).contains(&v));
        }
    }

    #[test]
    fn test_constant_and_reversed_ranges() {
        let mut rng = SmallRng::seed_from_u64(7);
        assert_eq!(ValueRange::constant(3.0).sample(&mut rng), 3.0);
        assert_eq!(VectorRange::constant(Vec3::X).sample(&mut rng), Vec3::X);

        let reversed = ValueRange::new(1.0, -1.0);
        for _ in 0..100 {
            let v = reversed.sample(&mut rng);
            assert!(v <= 1.0 && v > -1.0);
        }
    }

    #[test]
    fn test_vector_range_per_component() {
        let mut rng = SmallRng::seed_from_u64(1);
        let range = VectorRange::new(Vec3::new(-0.5, 0.0, -0.5), Vec3::new(0.5, 1.0, 0.5));
        for _ in 0..500 {
            let v = range.sample(&mut rng);
            assert!(v.x >= -0.5 && v.x < 0.5);
            assert!(v.y >= 0.0 && v.y < 1.0);
            assert!(v.z >= -0.5 && v.z < 0.5);
        }
    }

    #[test]
    fn test_transform_composition() {
        let p = ParticleAttributes {
            position: Vec3::new(1.0, 2.0, 3.0),
            scale: Vec3::splat(2.0),
            ..Default::default()
        };
        let m = p.transform();
        assert_eq!(m.transform_point3(Vec3::ZERO), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(m.transform_point3(Vec3::X), Vec3::new(3.0, 2.0, 3.0));
    }
}
