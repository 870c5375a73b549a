//! The per-frame driver.
//!
//! [`VfxEngine`] owns a [`PoolRegistry`], every emitter and an optional
//! firework launcher, and runs one frame in a fixed order:
//!
//! 1. move emitters that have a [`Motion`],
//! 2. tick every emitter (each may allocate into its pool),
//! 3. update fireworks,
//! 4. flush every pool into a [`DirtyRange`].
//!
//! The returned [`FrameReport`] is what the renderer uploads. Because the
//! flush is part of [`VfxEngine::frame`], emission can never be left
//! untracked. The renderer then evaluates lifecycles with the same
//! [`FrameTime::time`] the emitters used as birth time.
//!
//! # Example
//!
//! ```ignore
//! let mut engine = VfxEngine::new();
//! engine.register_pool("sparks", ParticlePool::new(PoolSettings::default())?);
//! engine.add_emitter(Emitter::new("sparks", EmitterSettings::default()));
//!
//! let mut clock = Clock::new();
//! loop {
//!     let frame = clock.update();
//!     let report = engine.frame(frame);
//!     renderer.upload(engine.registry(), &report);
//!     renderer.draw(frame.time);
//! }
//! ```

use glam::{Affine3A, Vec3};
use serde::{Deserialize, Serialize};

use crate::emitter::Emitter;
use crate::fireworks::FireworkLauncher;
use crate::lifecycle::{CameraBasis, RenderedParticle};
use crate::pool::ParticlePool;
use crate::registry::PoolRegistry;
use crate::time::FrameTime;
use crate::upload::DirtyRange;

/// Handle to an emitter owned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EmitterId(u64);

/// Scripted emitter movement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Motion {
    /// Circle around the anchor in the XZ plane.
    Orbit {
        /// Circle radius.
        radius: f32,
        /// Radians per second.
        angular_speed: f32,
        /// Vertical bob amplitude.
        #[serde(default)]
        bob: f32,
    },
    /// Independent sine wave per axis: `amplitude * sin(frequency * t + phase)`.
    Lissajous {
        /// Per-axis amplitude.
        amplitude: Vec3,
        /// Per-axis angular frequency.
        frequency: Vec3,
        /// Per-axis phase in radians.
        #[serde(default)]
        phase: Vec3,
    },
}

impl Motion {
    /// Offset from the anchor at `time`.
    pub fn offset(&self, time: f32) -> Vec3 {
        match *self {
            Motion::Orbit {
                radius,
                angular_speed,
                bob,
            } => {
                let a = time * angular_speed;
                Vec3::new(a.cos() * radius, (a * 2.0).sin() * bob, a.sin() * radius)
            }
            Motion::Lissajous {
                amplitude,
                frequency,
                phase,
            } => {
                let a = frequency * time + phase;
                amplitude * Vec3::new(a.x.sin(), a.y.sin(), a.z.sin())
            }
        }
    }
}

#[derive(Debug)]
struct EmitterEntry {
    id: EmitterId,
    emitter: Emitter,
    anchor: Vec3,
    motion: Option<Motion>,
}

/// What one frame changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// The frame this report belongs to.
    pub frame: FrameTime,
    /// Particles written by emitters and fireworks.
    pub emitted: usize,
    /// Dirty range per pool, sorted by pool name. Clean pools are included.
    pub dirty: Vec<(String, DirtyRange)>,
}

impl FrameReport {
    /// Dirty range of one pool.
    pub fn dirty_range(&self, pool: &str) -> Option<DirtyRange> {
        self.dirty
            .iter()
            .find(|(name, _)| name == pool)
            .map(|(_, range)| *range)
    }

    /// Slots to upload across all pools.
    pub fn dirty_slots(&self) -> usize {
        self.dirty.iter().map(|(_, r)| r.slot_count()).sum()
    }
}

/// Pools, emitters and fireworks driven as one unit.
#[derive(Debug, Default)]
pub struct VfxEngine {
    registry: PoolRegistry,
    emitters: Vec<EmitterEntry>,
    fireworks: Option<FireworkLauncher>,
    next_id: u64,
}

impl VfxEngine {
    /// Empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool directory.
    pub fn registry(&self) -> &PoolRegistry {
        &self.registry
    }

    /// Pool directory, mutably.
    pub fn registry_mut(&mut self) -> &mut PoolRegistry {
        &mut self.registry
    }

    /// Register a pool. See [`PoolRegistry::register`].
    pub fn register_pool(&mut self, name: impl Into<String>, pool: ParticlePool) -> bool {
        self.registry.register(name, pool)
    }

    /// Unregister a pool. Emitters targeting it wait until it returns.
    pub fn unregister_pool(&mut self, name: &str) -> Option<ParticlePool> {
        self.registry.unregister(name)
    }

    /// Take ownership of an emitter.
    pub fn add_emitter(&mut self, emitter: Emitter) -> EmitterId {
        let anchor = emitter.transform().translation.into();
        self.push_emitter(emitter, anchor, None)
    }

    /// Take ownership of an emitter that follows `motion` around `anchor`.
    pub fn add_moving_emitter(&mut self, emitter: Emitter, anchor: Vec3, motion: Motion) -> EmitterId {
        self.push_emitter(emitter, anchor, Some(motion))
    }

    fn push_emitter(&mut self, emitter: Emitter, anchor: Vec3, motion: Option<Motion>) -> EmitterId {
        let id = EmitterId(self.next_id);
        self.next_id += 1;
        self.emitters.push(EmitterEntry {
            id,
            emitter,
            anchor,
            motion,
        });
        id
    }

    /// Remove an emitter. Its particles stay in the pool until they die.
    pub fn remove_emitter(&mut self, id: EmitterId) -> Option<Emitter> {
        let index = self.emitters.iter().position(|e| e.id == id)?;
        Some(self.emitters.remove(index).emitter)
    }

    /// Look up an emitter.
    pub fn emitter(&self, id: EmitterId) -> Option<&Emitter> {
        self.emitters.iter().find(|e| e.id == id).map(|e| &e.emitter)
    }

    /// Look up an emitter mutably.
    pub fn emitter_mut(&mut self, id: EmitterId) -> Option<&mut Emitter> {
        self.emitters
            .iter_mut()
            .find(|e| e.id == id)
            .map(|e| &mut e.emitter)
    }

    /// Number of emitters.
    pub fn emitter_count(&self) -> usize {
        self.emitters.len()
    }

    /// Attach a firework launcher, replacing any previous one.
    pub fn set_fireworks(&mut self, launcher: FireworkLauncher) {
        self.fireworks = Some(launcher);
    }

    /// The firework launcher, if any.
    pub fn fireworks(&self) -> Option<&FireworkLauncher> {
        self.fireworks.as_ref()
    }

    /// Launch a firework from `origin`. Returns `false` without a launcher.
    pub fn launch_firework(&mut self, origin: Vec3, time: f32) -> bool {
        match &mut self.fireworks {
            Some(launcher) => {
                launcher.launch(origin, time);
                true
            }
            None => {
                log::warn!("no firework launcher configured");
                false
            }
        }
    }

    /// Restart every emitter schedule.
    pub fn restart(&mut self) {
        for entry in &mut self.emitters {
            entry.emitter.restart();
        }
        log::info!("restarted {} emitters", self.emitters.len());
    }

    /// Restart emitters and kill every live particle.
    pub fn reset(&mut self) {
        self.restart();
        for (_, pool) in self.registry.iter_mut() {
            pool.clear();
        }
    }

    /// Run one frame: move, emit, flush.
    pub fn frame(&mut self, frame: FrameTime) -> FrameReport {
        let mut emitted = 0;

        for entry in &mut self.emitters {
            if let Some(motion) = entry.motion {
                let position = entry.anchor + motion.offset(frame.time);
                entry.emitter.set_transform(Affine3A::from_translation(position));
            }
            emitted += entry.emitter.tick(frame, &mut self.registry);
        }

        if let Some(launcher) = &mut self.fireworks {
            emitted += launcher.update(frame, &mut self.registry);
        }

        let mut dirty: Vec<(String, DirtyRange)> = self
            .registry
            .iter_mut()
            .map(|(name, pool)| (name.to_string(), pool.flush()))
            .collect();
        dirty.sort_by(|a, b| a.0.cmp(&b.0));

        if emitted > 0 {
            log::trace!("frame t={:.3}: {} particles emitted", frame.time, emitted);
        }

        FrameReport {
            frame,
            emitted,
            dirty,
        }
    }

    /// CPU evaluation of one pool at `time`.
    pub fn evaluate(&self, pool: &str, time: f32, camera: &CameraBasis) -> Option<Vec<RenderedParticle>> {
        self.registry.get(pool).map(|p| p.evaluate(time, camera))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::{EmitterSettings, SpawnMode};
    use crate::pool::PoolSettings;
    use crate::upload::Span;

    fn engine_with_pool(capacity: usize) -> VfxEngine {
        let mut engine = VfxEngine::new();
        engine.register_pool(
            "sparks",
            ParticlePool::new(PoolSettings::default().with_capacity(capacity)).unwrap(),
        );
        engine
    }

    #[test]
    fn test_frame_flushes_what_was_emitted() {
        let mut engine = engine_with_pool(64);
        engine.add_emitter(
            Emitter::new(
                "sparks",
                EmitterSettings::default()
                    .with_particle_count(10)
                    .with_spawn_mode(SpawnMode::Burst),
            )
            .with_seed(1),
        );

        let report = engine.frame(FrameTime::new(0.0, 0.016));
        assert_eq!(report.emitted, 10);
        assert_eq!(
            report.dirty_range("sparks"),
            Some(DirtyRange::Contiguous(Span { offset: 0, len: 10 }))
        );

        let report = engine.frame(FrameTime::new(0.016, 0.016));
        assert_eq!(report.emitted, 0);
        assert_eq!(report.dirty_range("sparks"), Some(DirtyRange::Clean));
    }

    #[test]
    fn test_two_emitters_share_a_pool() {
        let mut engine = engine_with_pool(16);
        for seed in 0..2 {
            engine.add_emitter(
                Emitter::new(
                    "sparks",
                    EmitterSettings::default()
                        .with_particle_count(5)
                        .with_spawn_mode(SpawnMode::Burst),
                )
                .with_seed(seed),
            );
        }
        let report = engine.frame(FrameTime::new(0.0, 0.1));
        assert_eq!(report.emitted, 10);
        assert_eq!(engine.registry().get("sparks").unwrap().cursor(), 10);
        assert_eq!(report.dirty_slots(), 10);
    }

    #[test]
    fn test_moving_emitter_follows_orbit() {
        let mut engine = engine_with_pool(16);
        let motion = Motion::Orbit {
            radius: 2.0,
            angular_speed: 1.0,
            bob: 0.0,
        };
        let id = engine.add_moving_emitter(
            Emitter::new("sparks", EmitterSettings::default()),
            Vec3::new(0.0, 1.0, 0.0),
            motion,
        );
        engine.frame(FrameTime::new(0.0, 0.1));
        let t = engine.emitter(id).unwrap().transform().translation;
        assert!((Vec3::from(t) - Vec3::new(2.0, 1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_lissajous_offset() {
        let motion = Motion::Lissajous {
            amplitude: Vec3::splat(1.5),
            frequency: Vec3::new(6.0, 3.0, 4.0),
            phase: Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0),
        };
        let at_zero = motion.offset(0.0);
        assert!((at_zero - Vec3::new(0.0, 1.5, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_remove_emitter() {
        let mut engine = engine_with_pool(4);
        let a = engine.add_emitter(Emitter::new("sparks", EmitterSettings::default()));
        let b = engine.add_emitter(Emitter::new("sparks", EmitterSettings::default()));
        assert!(engine.remove_emitter(a).is_some());
        assert!(engine.remove_emitter(a).is_none());
        assert!(engine.emitter(b).is_some());
        assert_eq!(engine.emitter_count(), 1);
    }

    #[test]
    fn test_reset_clears_pools() {
        let mut engine = engine_with_pool(8);
        engine.add_emitter(Emitter::new(
            "sparks",
            EmitterSettings::default()
                .with_particle_count(4)
                .with_spawn_mode(SpawnMode::Burst),
        ));
        engine.frame(FrameTime::new(0.0, 0.1));
        engine.reset();
        let pool = engine.registry().get("sparks").unwrap();
        assert_eq!(pool.live_count(0.05), 0);

        let report = engine.frame(FrameTime::new(0.1, 0.1));
        assert_eq!(report.emitted, 4);
        assert_eq!(
            report.dirty_range("sparks"),
            Some(DirtyRange::Contiguous(Span { offset: 0, len: 8 }))
        );
    }

    #[test]
    fn test_launch_without_launcher() {
        let mut engine = VfxEngine::new();
        assert!(!engine.launch_firework(Vec3::ZERO, 0.0));
    }
}
