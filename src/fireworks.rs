//! Firework rockets.
//!
//! A [`FireworkLauncher`] fires rockets that fly a ballistic arc while
//! leaving a faint trail, then burst into a sphere of sparks when their
//! fuse runs out. Both the trail and the burst are ordinary [`Emitter`]s
//! that move with the rocket, writing into one shared pool.

use glam::{Affine3A, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::emitter::{Emitter, EmitterSettings, SpawnMode};
use crate::particle::{ValueRange, VectorRange};
use crate::registry::PoolRegistry;
use crate::time::FrameTime;

/// Launch and burst parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FireworkSettings {
    /// Initial rocket velocity.
    pub velocity: VectorRange,
    /// Seconds from launch to burst.
    pub fuse: ValueRange,
    /// Downward acceleration during flight.
    pub gravity: f32,
    /// Burst colors.
    pub colors: Vec<Color>,
    /// Sparks per burst.
    pub burst_count: usize,
    /// Spark lifetime.
    pub spark_lifetime: ValueRange,
    /// Spark speed.
    pub spark_speed: ValueRange,
    /// Spark size.
    pub spark_size: ValueRange,
    /// Trail particles per second of flight. Zero disables the trail.
    pub trail_rate: usize,
    /// Seconds after launch when a rocket is forgotten. A rocket whose
    /// burst has not fired yet is kept regardless.
    pub retire_after: f32,
}

impl Default for FireworkSettings {
    fn default() -> Self {
        Self {
            velocity: VectorRange::new(Vec3::new(-8.0, 5.0, -8.0), Vec3::new(8.0, 10.0, 8.0)),
            fuse: ValueRange::new(0.8, 2.0),
            gravity: 4.0,
            colors: vec![Color::rgb_u8(0x87, 0xCE, 0xEB), Color::rgb_u8(0xFF, 0xC0, 0xCB)],
            burst_count: 400,
            spark_lifetime: ValueRange::new(0.5, 2.0),
            spark_speed: ValueRange::new(1.0, 4.0),
            spark_size: ValueRange::new(0.05, 0.2),
            trail_rate: 80,
            retire_after: 4.0,
        }
    }
}

impl FireworkSettings {
    fn burst_emitter(&self, fuse: f32) -> EmitterSettings {
        EmitterSettings {
            duration: 1.0,
            particle_count: self.burst_count,
            spawn_mode: SpawnMode::Burst,
            looping: false,
            delay: fuse,
            color_start: self.colors.clone(),
            color_end: Vec::new(),
            lifetime: self.spark_lifetime,
            speed: self.spark_speed,
            size: self.spark_size,
            position_offset: VectorRange::constant(Vec3::ZERO),
            rotation: VectorRange::constant(Vec3::ZERO),
            rotation_speed: VectorRange::constant(Vec3::ZERO),
            direction: VectorRange::new(Vec3::splat(-1.0), Vec3::splat(1.0)),
        }
    }

    fn trail_emitter(&self) -> EmitterSettings {
        EmitterSettings {
            duration: 1.0,
            particle_count: self.trail_rate,
            spawn_mode: SpawnMode::Time,
            looping: true,
            delay: 0.0,
            color_start: vec![Color::rgb_u8(0xFF, 0xE4, 0xB5)],
            color_end: vec![Color::rgb_u8(0xFF, 0x45, 0x00)],
            lifetime: ValueRange::new(0.2, 0.5),
            speed: ValueRange::new(0.1, 0.4),
            size: ValueRange::new(0.02, 0.06),
            position_offset: VectorRange::new(Vec3::splat(-0.05), Vec3::splat(0.05)),
            rotation: VectorRange::constant(Vec3::ZERO),
            rotation_speed: VectorRange::constant(Vec3::ZERO),
            direction: VectorRange::new(Vec3::new(-0.2, -1.0, -0.2), Vec3::new(0.2, 0.0, 0.2)),
        }
    }
}

/// One rocket in flight or bursting.
#[derive(Debug, Clone)]
pub struct Rocket {
    /// Current position.
    pub position: Vec3,
    /// Current velocity.
    pub velocity: Vec3,
    /// Seconds from launch to burst.
    pub fuse: f32,
    /// Clock time at launch.
    pub launched_at: f32,
    trail: Emitter,
    burst: Emitter,
}

impl Rocket {
    /// Whether the fuse has burnt down at `time`.
    pub fn has_burst(&self, time: f32) -> bool {
        time - self.launched_at >= self.fuse
    }

    /// Whether the rocket can be dropped at `time`.
    fn is_spent(&self, time: f32, retire_after: f32) -> bool {
        self.burst.is_finished() && time - self.launched_at >= retire_after
    }
}

/// Launches rockets into a named pool and keeps them moving.
#[derive(Debug, Clone)]
pub struct FireworkLauncher {
    pool: String,
    settings: FireworkSettings,
    rockets: Vec<Rocket>,
    rng: SmallRng,
}

impl FireworkLauncher {
    /// Launcher writing into the pool named `pool`.
    pub fn new(pool: impl Into<String>, settings: FireworkSettings) -> Self {
        Self {
            pool: pool.into(),
            settings,
            rockets: Vec::new(),
            rng: SmallRng::from_entropy(),
        }
    }

    /// Use a deterministic random sequence.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    /// Target pool name.
    pub fn pool(&self) -> &str {
        &self.pool
    }

    /// Launch parameters.
    pub fn settings(&self) -> &FireworkSettings {
        &self.settings
    }

    /// Rockets that have not been retired.
    pub fn rockets(&self) -> &[Rocket] {
        &self.rockets
    }

    /// Fire a rocket from `origin` at clock time `time`.
    pub fn launch(&mut self, origin: Vec3, time: f32) {
        let velocity = self.settings.velocity.sample(&mut self.rng);
        let fuse = self.settings.fuse.sample(&mut self.rng).max(0.0);
        let at = Affine3A::from_translation(origin);
        let trail = Emitter::new(self.pool.clone(), self.settings.trail_emitter())
            .with_seed(self.rng.gen())
            .with_transform(at);
        let burst = Emitter::new(self.pool.clone(), self.settings.burst_emitter(fuse))
            .with_seed(self.rng.gen())
            .with_transform(at);
        log::debug!("firework launched at {:?}, fuse {:.2}s", origin, fuse);
        self.rockets.push(Rocket {
            position: origin,
            velocity,
            fuse,
            launched_at: time,
            trail,
            burst,
        });
    }

    /// Move rockets, emit trails and bursts, retire old rockets. Returns
    /// the number of particles written.
    pub fn update(&mut self, frame: FrameTime, registry: &mut PoolRegistry) -> usize {
        let settings = &self.settings;
        self.rockets
            .retain(|r| !r.is_spent(frame.time, settings.retire_after));

        let mut written = 0;
        for rocket in &mut self.rockets {
            let in_flight = !rocket.has_burst(frame.time);
            let at = Affine3A::from_translation(rocket.position);
            rocket.trail.set_transform(at);
            rocket.burst.set_transform(at);
            if in_flight {
                written += rocket.trail.tick(frame, registry);
            }
            written += rocket.burst.tick(frame, registry);

            if in_flight {
                rocket.velocity.y -= settings.gravity * frame.delta;
                rocket.position += rocket.velocity * frame.delta;
            }
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{ParticlePool, PoolSettings};

    fn setup() -> (FireworkLauncher, PoolRegistry) {
        let mut registry = PoolRegistry::new();
        registry.register(
            "fireworks",
            ParticlePool::new(PoolSettings::default().with_capacity(10_000)).unwrap(),
        );
        let settings = FireworkSettings {
            fuse: ValueRange::constant(1.0),
            burst_count: 100,
            trail_rate: 0,
            ..Default::default()
        };
        (FireworkLauncher::new("fireworks", settings).with_seed(5), registry)
    }

    #[test]
    fn test_rocket_bursts_after_fuse() {
        let (mut launcher, mut registry) = setup();
        launcher.launch(Vec3::ZERO, 0.0);

        let dt = 0.125;
        let mut burst_at = None;
        for i in 0..16 {
            let t = i as f32 * dt;
            if launcher.update(FrameTime::new(t, dt), &mut registry) > 0 {
                burst_at = Some(t);
                break;
            }
        }
        assert_eq!(burst_at, Some(1.0));
        assert_eq!(registry.get("fireworks").unwrap().cursor(), 100);
    }

    #[test]
    fn test_rocket_flies_then_stops() {
        let (mut launcher, mut registry) = setup();
        launcher.launch(Vec3::ZERO, 0.0);
        launcher.update(FrameTime::new(0.0, 0.1), &mut registry);
        let moved = launcher.rockets()[0].position;
        assert_ne!(moved, Vec3::ZERO);
        assert!(moved.y > 0.0);

        launcher.update(FrameTime::new(1.5, 0.1), &mut registry);
        let after = launcher.rockets()[0].position;
        launcher.update(FrameTime::new(1.6, 0.1), &mut registry);
        assert_eq!(launcher.rockets()[0].position, after);
    }

    #[test]
    fn test_rockets_retire() {
        let (mut launcher, mut registry) = setup();
        launcher.launch(Vec3::ZERO, 0.0);
        let dt = 0.25;
        for i in 0..=17 {
            let t = i as f32 * dt;
            if i == 12 {
                launcher.launch(Vec3::ZERO, t);
            }
            launcher.update(FrameTime::new(t, dt), &mut registry);
        }
        assert_eq!(launcher.rockets().len(), 1);
        assert_eq!(launcher.rockets()[0].launched_at, 3.0);
    }

    #[test]
    fn test_long_fuse_still_bursts() {
        let (_, mut registry) = setup();
        let mut launcher = FireworkLauncher::new(
            "fireworks",
            FireworkSettings {
                fuse: ValueRange::constant(6.0),
                burst_count: 100,
                trail_rate: 0,
                retire_after: 2.0,
                ..Default::default()
            },
        )
        .with_seed(2);
        launcher.launch(Vec3::ZERO, 0.0);

        let dt = 0.25;
        let mut total = 0;
        for i in 0..=32 {
            total += launcher.update(FrameTime::new(i as f32 * dt, dt), &mut registry);
        }
        assert_eq!(total, 100);
        assert!(launcher.rockets().is_empty());
    }

    #[test]
    fn test_trail_emits_in_flight() {
        let (_, mut registry) = setup();
        let mut launcher = FireworkLauncher::new(
            "fireworks",
            FireworkSettings {
                fuse: ValueRange::constant(10.0),
                trail_rate: 100,
                retire_after: 20.0,
                ..Default::default()
            },
        )
        .with_seed(1);
        launcher.launch(Vec3::ZERO, 0.0);
        let mut total = 0;
        for i in 0..10 {
            total += launcher.update(FrameTime::new(i as f32 * 0.1, 0.1), &mut registry);
        }
        assert!(total > 50 && total <= 100, "trail emitted {}", total);
    }
}
