//! Timed particle emitters.
//!
//! An [`Emitter`] decides each frame how many particles are due and asks the
//! pool it targets (by name, through the [`PoolRegistry`]) to write them.
//! Every particle samples its attributes independently from the configured
//! ranges and starts at the emitter's current world position.
//!
//! # Spawn Modes
//!
//! | Mode | Due particles at cycle time `t` |
//! |------|---------------------------------|
//! | [`SpawnMode::Time`] | `floor((t - delay) / duration * count)`, clamped to `[0, count]` |
//! | [`SpawnMode::Burst`] | `count` as soon as `t >= delay` |
//!
//! A looping emitter starts a new cycle once it has emitted `count`
//! particles and the cycle has lasted `duration`. The delay only applies to
//! the first cycle.
//!
//! # Example
//!
//! ```ignore
//! let mut emitter = Emitter::new(
//!     "sparks",
//!     EmitterSettings {
//!         particle_count: 10_000,
//!         looping: true,
//!         size: ValueRange::new(0.01, 0.1),
//!         speed: ValueRange::new(1.0, 5.0),
//!         direction: VectorRange::new(Vec3::new(-0.5, 0.0, -0.5), Vec3::new(0.5, 1.0, 0.5)),
//!         ..Default::default()
//!     },
//! );
//!
//! // every frame
//! emitter.tick(frame, &mut registry);
//! ```

use glam::{Affine3A, Vec3};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::particle::{Lifetime, ParticleAttributes, ValueRange, VectorRange};
use crate::registry::PoolRegistry;
use crate::time::FrameTime;

/// Emission schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpawnMode {
    /// Spread `particle_count` linearly over `duration`.
    #[default]
    Time,
    /// Emit all `particle_count` particles in one frame.
    Burst,
}

/// Emitter configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterSettings {
    /// Length of one schedule cycle in seconds.
    pub duration: f32,
    /// Particles per cycle.
    pub particle_count: usize,
    /// Time-spread or burst.
    pub spawn_mode: SpawnMode,
    /// Restart the schedule after each completed cycle.
    pub looping: bool,
    /// Seconds before the first cycle begins.
    pub delay: f32,
    /// Candidate birth colors; one is picked per particle.
    pub color_start: Vec<Color>,
    /// Candidate death colors. Empty means "same as the birth color".
    pub color_end: Vec<Color>,
    /// Particle lifetime in seconds.
    pub lifetime: ValueRange,
    /// Travel speed.
    pub speed: ValueRange,
    /// Uniform particle scale.
    pub size: ValueRange,
    /// Offset from the emitter position.
    pub position_offset: VectorRange,
    /// Emission orientation (XYZ Euler radians).
    pub rotation: VectorRange,
    /// Angular velocity per axis.
    pub rotation_speed: VectorRange,
    /// Travel axis, normalized at evaluation.
    pub direction: VectorRange,
}

impl Default for EmitterSettings {
    fn default() -> Self {
        Self {
            duration: 1.0,
            particle_count: 1000,
            spawn_mode: SpawnMode::Time,
            looping: false,
            delay: 0.0,
            color_start: vec![Color::rgb(0.0, 0.0, 1.0), Color::rgb_u8(0x87, 0xCE, 0xEB)],
            color_end: Vec::new(),
            lifetime: ValueRange::new(0.5, 6.0),
            speed: ValueRange::new(5.0, 20.0),
            size: ValueRange::new(0.1, 1.0),
            position_offset: VectorRange::new(Vec3::splat(-1.0), Vec3::splat(1.0)),
            rotation: VectorRange::constant(Vec3::ZERO),
            rotation_speed: VectorRange::constant(Vec3::ZERO),
            direction: VectorRange::constant(Vec3::ZERO),
        }
    }
}

impl EmitterSettings {
    /// Set particles per cycle.
    pub fn with_particle_count(mut self, count: usize) -> Self {
        self.particle_count = count;
        self
    }

    /// Set the cycle duration.
    pub fn with_duration(mut self, seconds: f32) -> Self {
        self.duration = seconds;
        self
    }

    /// Set the spawn mode.
    pub fn with_spawn_mode(mut self, mode: SpawnMode) -> Self {
        self.spawn_mode = mode;
        self
    }

    /// Enable or disable looping.
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Set the first-cycle delay.
    pub fn with_delay(mut self, seconds: f32) -> Self {
        self.delay = seconds;
        self
    }

    /// Draw one particle born at `birth_time` around `origin`.
    pub fn sample(&self, rng: &mut SmallRng, origin: Vec3, birth_time: f32) -> ParticleAttributes {
        let color_start = self
            .color_start
            .choose(rng)
            .copied()
            .unwrap_or(Color::WHITE);
        let color_end = self.color_end.choose(rng).copied().unwrap_or(color_start);

        ParticleAttributes {
            position: origin + self.position_offset.sample(rng),
            rotation: self.rotation.sample(rng),
            scale: Vec3::splat(self.size.sample(rng)),
            color_start,
            color_end,
            direction: self.direction.sample(rng),
            speed: self.speed.sample(rng),
            rotation_speed: self.rotation_speed.sample(rng),
            lifetime: Lifetime::new(birth_time, self.lifetime.sample(rng)),
        }
    }
}

/// Independently timed producer that fills a named pool.
#[derive(Debug, Clone)]
pub struct Emitter {
    target_pool: String,
    settings: EmitterSettings,
    transform: Affine3A,
    emitted: usize,
    /// Schedule accumulator for the current cycle.
    elapsed: f32,
    first_cycle: bool,
    pool_missing: bool,
    rng: SmallRng,
}

impl Emitter {
    /// Create an emitter writing into the pool named `target_pool`.
    ///
    /// The pool does not need to exist yet.
    pub fn new(target_pool: impl Into<String>, settings: EmitterSettings) -> Self {
        Self {
            target_pool: target_pool.into(),
            settings,
            transform: Affine3A::IDENTITY,
            emitted: 0,
            elapsed: 0.0,
            first_cycle: true,
            pool_missing: false,
            rng: SmallRng::from_entropy(),
        }
    }

    /// Use a deterministic random sequence.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    /// Set the initial world transform.
    pub fn with_transform(mut self, transform: Affine3A) -> Self {
        self.transform = transform;
        self
    }

    /// Name of the targeted pool.
    pub fn target_pool(&self) -> &str {
        &self.target_pool
    }

    /// Current configuration.
    pub fn settings(&self) -> &EmitterSettings {
        &self.settings
    }

    /// Replace the configuration. Already emitted particles are unaffected.
    pub fn set_settings(&mut self, settings: EmitterSettings) {
        self.settings = settings;
    }

    /// Current world transform.
    pub fn transform(&self) -> Affine3A {
        self.transform
    }

    /// Move the emitter. New particles originate at the new position.
    pub fn set_transform(&mut self, transform: Affine3A) {
        self.transform = transform;
    }

    /// Particles emitted in the current cycle.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Schedule time accumulated in the current cycle.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Whether a non-looping emitter has emitted its whole count.
    pub fn is_finished(&self) -> bool {
        !self.settings.looping && self.emitted >= self.settings.particle_count
    }

    /// Rewind the schedule; the delay applies again.
    pub fn restart(&mut self) {
        self.emitted = 0;
        self.elapsed = 0.0;
        self.first_cycle = true;
    }

    fn active_delay(&self) -> f32 {
        if self.first_cycle {
            self.settings.delay
        } else {
            0.0
        }
    }

    /// Particles due by cycle time `elapsed`.
    pub fn due_at(&self, elapsed: f32) -> usize {
        let count = self.settings.particle_count;
        let delay = self.active_delay();
        if elapsed < delay {
            return 0;
        }
        match self.settings.spawn_mode {
            SpawnMode::Time if self.settings.duration > 0.0 => {
                let fraction = (elapsed - delay) / self.settings.duration;
                (fraction * count as f32).floor().clamp(0.0, count as f32) as usize
            }
            // zero duration degenerates to a burst
            SpawnMode::Time | SpawnMode::Burst => count,
        }
    }

    /// Advance one frame, emitting whatever is due. Returns the number of
    /// particles written.
    ///
    /// A missing pool skips emission without consuming the schedule, so
    /// the emitter catches up once the pool is registered.
    pub fn tick(&mut self, frame: FrameTime, registry: &mut PoolRegistry) -> usize {
        let count = self.settings.particle_count;
        if count == 0 {
            return 0;
        }

        let due = self.due_at(self.elapsed);
        let to_emit = due.saturating_sub(self.emitted);
        let mut written = 0;

        if to_emit > 0 {
            match registry.get_mut(&self.target_pool) {
                Some(pool) => {
                    if self.pool_missing {
                        log::info!("particle pool `{}` is available again", self.target_pool);
                        self.pool_missing = false;
                    }
                    let settings = &self.settings;
                    let rng = &mut self.rng;
                    let origin = self.transform.translation.into();
                    let mut generator = || settings.sample(rng, origin, frame.time);
                    written = pool.allocate(to_emit, &mut generator);
                    self.emitted += written;
                }
                None => {
                    if !self.pool_missing {
                        log::warn!(
                            "particle pool `{}` not found; emitter is waiting",
                            self.target_pool
                        );
                        self.pool_missing = true;
                    }
                }
            }
        }

        self.elapsed += frame.delta;
        if self.settings.looping && self.emitted >= count {
            self.finish_cycle();
        }
        written
    }

    /// Start the next cycle once the current one has lasted `duration`.
    /// Time past the cycle end carries over so the rate stays exact.
    fn finish_cycle(&mut self) {
        let cycle = self.active_delay() + self.settings.duration;
        if self.elapsed < cycle {
            return;
        }
        self.elapsed = if self.settings.duration > 0.0 {
            self.elapsed - cycle
        } else {
            0.0
        };
        self.emitted = 0;
        self.first_cycle = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{ParticlePool, PoolSettings};

    fn registry_with(name: &str, capacity: usize) -> PoolRegistry {
        let mut registry = PoolRegistry::new();
        registry.register(
            name,
            ParticlePool::new(PoolSettings::default().with_capacity(capacity)).unwrap(),
        );
        registry
    }

    /// Tick at a fixed step until `until` seconds, returning total emitted.
    fn run(emitter: &mut Emitter, registry: &mut PoolRegistry, dt: f32, until: f32) -> usize {
        let mut t = 0.0;
        let mut total = 0;
        while t <= until {
            total += emitter.tick(FrameTime::new(t, dt), registry);
            t += dt;
        }
        total
    }

    #[test]
    fn test_due_time_spread() {
        let emitter = Emitter::new(
            "p",
            EmitterSettings::default()
                .with_duration(2.0)
                .with_particle_count(100),
        );
        assert_eq!(emitter.due_at(0.0), 0);
        assert_eq!(emitter.due_at(1.0), 50);
        assert_eq!(emitter.due_at(2.0), 100);
        assert_eq!(emitter.due_at(10.0), 100);
    }

    #[test]
    fn test_due_respects_delay() {
        let emitter = Emitter::new(
            "p",
            EmitterSettings::default()
                .with_particle_count(10)
                .with_spawn_mode(SpawnMode::Burst)
                .with_delay(0.5),
        );
        assert_eq!(emitter.due_at(0.4), 0);
        assert_eq!(emitter.due_at(0.5), 10);
    }

    #[test]
    fn test_zero_duration_time_mode_is_burst() {
        let emitter = Emitter::new(
            "p",
            EmitterSettings::default()
                .with_duration(0.0)
                .with_particle_count(7),
        );
        assert_eq!(emitter.due_at(0.0), 7);
    }

    #[test]
    fn test_burst_in_one_tick() {
        let mut registry = registry_with("p", 100);
        let mut emitter = Emitter::new(
            "p",
            EmitterSettings::default()
                .with_particle_count(40)
                .with_spawn_mode(SpawnMode::Burst),
        )
        .with_seed(1);
        assert_eq!(emitter.tick(FrameTime::new(0.0, 0.016), &mut registry), 40);
        assert_eq!(emitter.emitted(), 40);
        assert_eq!(emitter.tick(FrameTime::new(0.016, 0.016), &mut registry), 0);
    }

    #[test]
    fn test_zero_count_never_emits() {
        let mut registry = registry_with("p", 10);
        let mut emitter = Emitter::new(
            "p",
            EmitterSettings::default()
                .with_particle_count(0)
                .with_looping(true),
        );
        assert_eq!(run(&mut emitter, &mut registry, 0.1, 5.0), 0);
        assert_eq!(registry.get("p").unwrap().cursor(), 0);
    }

    #[test]
    fn test_non_looping_exhausts() {
        let mut registry = registry_with("p", 1000);
        let mut emitter = Emitter::new(
            "p",
            EmitterSettings::default()
                .with_particle_count(100)
                .with_duration(1.0),
        )
        .with_seed(2);
        assert_eq!(run(&mut emitter, &mut registry, 0.05, 10.0), 100);
        assert!(emitter.is_finished());
    }

    #[test]
    fn test_looping_time_mode_keeps_rate() {
        for dt in [1.0f32 / 60.0, 0.25] {
            let mut registry = registry_with("p", 100_000);
            let mut emitter = Emitter::new(
                "p",
                EmitterSettings::default()
                    .with_particle_count(100)
                    .with_duration(1.0)
                    .with_looping(true),
            )
            .with_seed(3);

            let frames = (10.0 / dt).round() as usize;
            let mut total = 0;
            let mut idle = 0;
            for i in 0..=frames {
                let written = emitter.tick(FrameTime::new(i as f32 * dt, dt), &mut registry);
                if i > 0 && written == 0 {
                    idle += 1;
                }
                total += written;
            }
            // ten cycles by t = 10, within float rounding
            assert!((999..=1001).contains(&total), "dt {}: emitted {}", dt, total);
            assert_eq!(idle, 0, "dt {}", dt);
        }
    }

    #[test]
    fn test_looping_burst_waits_for_duration() {
        let mut registry = registry_with("p", 1000);
        let mut emitter = Emitter::new(
            "p",
            EmitterSettings::default()
                .with_particle_count(10)
                .with_duration(1.0)
                .with_spawn_mode(SpawnMode::Burst)
                .with_looping(true),
        );
        let dt = 0.25;
        let mut bursts = Vec::new();
        for i in 0..12 {
            let t = i as f32 * dt;
            if emitter.tick(FrameTime::new(t, dt), &mut registry) > 0 {
                bursts.push(t);
            }
        }
        assert_eq!(bursts, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_delay_only_first_cycle() {
        let mut registry = registry_with("p", 1000);
        let mut emitter = Emitter::new(
            "p",
            EmitterSettings::default()
                .with_particle_count(5)
                .with_duration(1.0)
                .with_spawn_mode(SpawnMode::Burst)
                .with_looping(true)
                .with_delay(0.5),
        );
        let dt = 0.25;
        let mut bursts = Vec::new();
        for i in 0..12 {
            let t = i as f32 * dt;
            if emitter.tick(FrameTime::new(t, dt), &mut registry) > 0 {
                bursts.push(t);
            }
        }
        assert_eq!(bursts, vec![0.5, 1.5, 2.5]);
    }

    #[test]
    fn test_missing_pool_catches_up() {
        let mut registry = PoolRegistry::new();
        let mut emitter = Emitter::new(
            "late",
            EmitterSettings::default()
                .with_particle_count(10)
                .with_spawn_mode(SpawnMode::Burst),
        );
        assert_eq!(emitter.tick(FrameTime::new(0.0, 0.1), &mut registry), 0);
        assert_eq!(emitter.emitted(), 0);

        registry.register(
            "late",
            ParticlePool::new(PoolSettings::default().with_capacity(16)).unwrap(),
        );
        assert_eq!(emitter.tick(FrameTime::new(0.1, 0.1), &mut registry), 10);
    }

    #[test]
    fn test_particles_follow_emitter_position() {
        let mut registry = registry_with("p", 10);
        let settings = EmitterSettings {
            particle_count: 1,
            spawn_mode: SpawnMode::Burst,
            position_offset: VectorRange::constant(Vec3::ZERO),
            ..Default::default()
        };
        let mut emitter = Emitter::new("p", settings)
            .with_transform(Affine3A::from_translation(Vec3::new(3.0, 0.0, 0.0)));
        emitter.tick(FrameTime::new(2.0, 0.1), &mut registry);

        emitter.restart();
        emitter.set_transform(Affine3A::from_translation(Vec3::new(0.0, 4.0, 0.0)));
        emitter.tick(FrameTime::new(3.0, 0.1), &mut registry);

        let pool = registry.get("p").unwrap();
        let first = pool.slot(0).unwrap();
        let second = pool.slot(1).unwrap();
        assert_eq!(first.transform.w_axis.truncate(), Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(first.lifetime.birth_time, 2.0);
        assert_eq!(second.transform.w_axis.truncate(), Vec3::new(0.0, 4.0, 0.0));
    }

    #[test]
    fn test_sample_respects_ranges_and_colors() {
        let settings = EmitterSettings {
            color_start: vec![Color::WHITE],
            color_end: Vec::new(),
            speed: ValueRange::new(1.0, 5.0),
            size: ValueRange::constant(0.5),
            ..Default::default()
        };
        let mut rng = SmallRng::seed_from_u64(9);
        for _ in 0..200 {
            let p = settings.sample(&mut rng, Vec3::ZERO, 1.0);
            assert!(p.speed >= 1.0 && p.speed <= 5.0);
            assert_eq!(p.scale, Vec3::splat(0.5));
            assert_eq!(p.color_end, p.color_start);
            assert_eq!(p.lifetime.birth_time, 1.0);
            assert!(p.position.abs().max_element() <= 1.0);
        }
    }

    #[test]
    fn test_settings_round_trip_ron() {
        let settings = EmitterSettings::default()
            .with_spawn_mode(SpawnMode::Burst)
            .with_looping(true);
        let text = ron::to_string(&settings).unwrap();
        let back: EmitterSettings = ron::from_str(&text).unwrap();
        assert_eq!(back, settings);

        let partial: EmitterSettings = ron::from_str("(particle_count: 5)").unwrap();
        assert_eq!(partial.particle_count, 5);
        assert_eq!(partial.duration, 1.0);
    }
}
