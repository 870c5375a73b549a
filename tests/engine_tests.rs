//! Integration tests for pools, emitters and the frame driver.
//!
//! These drive the public API the way an application would: build pools
//! and emitters, step frames, and check what the renderer would see.

use std::collections::BTreeSet;

use glam::Vec3;
use pixie::prelude::*;
use pixie::{lifecycle, CameraBasis, DirtyRange, Lifetime, ParticleAttributes};
use proptest::prelude::*;

/// Generator that numbers particles 1, 2, 3... through `speed`.
fn numbered() -> impl FnMut() -> ParticleAttributes {
    let mut n = 0.0;
    move || {
        n += 1.0;
        ParticleAttributes {
            speed: n,
            ..Default::default()
        }
    }
}

fn pool(capacity: usize) -> ParticlePool {
    ParticlePool::new(PoolSettings::default().with_capacity(capacity)).unwrap()
}

// ============================================================================
// Ring buffer
// ============================================================================

#[test]
fn test_overflow_keeps_newest_in_ring_order() {
    let mut pool = pool(4);
    let mut gen = numbered();
    assert_eq!(pool.allocate(6, &mut gen), 6);

    assert_eq!(pool.cursor(), 2);
    let speeds: Vec<f32> = (0..4).map(|i| pool.slot(i).unwrap().speed).collect();
    assert_eq!(speeds, vec![5.0, 6.0, 3.0, 4.0]);
}

proptest! {
    #[test]
    fn prop_ring_holds_last_capacity_particles(
        capacity in 1usize..48,
        counts in prop::collection::vec(0usize..80, 0..8),
    ) {
        let mut pool = pool(capacity);
        let mut gen = numbered();
        for &count in &counts {
            pool.allocate(count, &mut gen);
        }
        let total: usize = counts.iter().sum();
        prop_assert_eq!(pool.cursor(), total % capacity);

        // particle k (1-based) lives in slot (k - 1) % capacity
        let first_kept = total.saturating_sub(capacity) + 1;
        for k in first_kept..=total {
            let slot = pool.slot((k - 1) % capacity).unwrap();
            prop_assert_eq!(slot.speed, k as f32);
        }
    }

    #[test]
    fn prop_dirty_range_covers_exactly_written_slots(
        capacity in 1usize..48,
        batches in prop::collection::vec(prop::collection::vec(0usize..30, 0..4), 1..8),
    ) {
        let mut pool = pool(capacity);
        let mut gen = numbered();
        for batch in &batches {
            let start = pool.cursor();
            let written: usize = batch.iter().sum();
            for &count in batch {
                pool.allocate(count, &mut gen);
            }
            let expected: BTreeSet<usize> = (0..written.min(capacity))
                .map(|i| (start + written - 1 - i) % capacity)
                .collect();

            let range = pool.flush();
            prop_assert_eq!(range.slot_count(), expected.len());
            for slot in 0..capacity {
                prop_assert_eq!(range.contains(slot), expected.contains(&slot), "slot {}", slot);
            }
            for span in range.spans() {
                prop_assert!(span.end() <= capacity);
            }
        }
    }
}

#[test]
fn test_wrapped_dirty_range() {
    let mut pool = pool(10);
    let mut gen = numbered();
    pool.allocate(8, &mut gen);
    pool.flush();
    pool.allocate(4, &mut gen);
    match pool.flush() {
        DirtyRange::Wrapped { head, tail } => {
            assert_eq!(head.slots(), 0..2);
            assert_eq!(tail.slots(), 8..10);
        }
        other => panic!("expected wrapped range, got {:?}", other),
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_lifecycle_boundaries() {
    let life = Lifetime::new(3.0, 2.0);
    assert_eq!(lifecycle::progress(3.0, life), Some(0.0));
    assert_eq!(lifecycle::progress(5.0, life), Some(1.0));

    let mut pool = pool(1);
    let mut gen = || ParticleAttributes {
        lifetime: life,
        ..Default::default()
    };
    pool.allocate(1, &mut gen);
    assert_eq!(pool.live_count(2.99), 0);
    assert_eq!(pool.live_count(3.0), 1);
    assert_eq!(pool.live_count(5.0), 1);
    assert_eq!(pool.live_count(5.01), 0);
}

#[test]
fn test_zero_direction_does_not_move() {
    let d = lifecycle::displacement(Vec3::ZERO, 7.0, 5.0);
    assert_eq!(d, Vec3::ZERO);
    assert!(!d.is_nan());
}

#[test]
fn test_zero_duration_never_renders() {
    let mut pool = pool(4);
    let mut gen = || ParticleAttributes {
        lifetime: Lifetime::new(1.0, 0.0),
        ..Default::default()
    };
    pool.allocate(4, &mut gen);
    for t in [0.0, 1.0, 2.0] {
        assert!(pool.evaluate(t, &CameraBasis::default()).is_empty());
    }
}

#[test]
fn test_attributes_fixed_at_emission() {
    let mut registry = PoolRegistry::new();
    registry.register("p", pool(100));
    let mut emitter = Emitter::new(
        "p",
        EmitterSettings::default()
            .with_particle_count(10)
            .with_spawn_mode(SpawnMode::Burst),
    )
    .with_seed(2);
    emitter.tick(FrameTime::new(0.0, 0.1), &mut registry);
    let before: Vec<_> = (0..10).map(|i| registry.get("p").unwrap().slot(i)).collect();

    let mut settings = emitter.settings().clone();
    settings.speed = ValueRange::constant(1000.0);
    emitter.set_settings(settings);

    let after: Vec<_> = (0..10).map(|i| registry.get("p").unwrap().slot(i)).collect();
    assert_eq!(before, after);
}

// ============================================================================
// Emitters through the engine
// ============================================================================

#[test]
fn test_non_looping_emits_exactly_count() {
    let mut engine = VfxEngine::new();
    engine.register_pool("p", pool(10_000));
    engine.add_emitter(
        Emitter::new(
            "p",
            EmitterSettings::default()
                .with_particle_count(250)
                .with_duration(0.5),
        )
        .with_seed(4),
    );

    let mut clock = Clock::new();
    let mut total = 0;
    for _ in 0..600 {
        total += engine.frame(clock.advance(1.0 / 60.0)).emitted;
    }
    assert_eq!(total, 250);
}

#[test]
fn test_burst_is_atomic() {
    let mut registry = PoolRegistry::new();
    registry.register("p", pool(1000));
    let mut emitter = Emitter::new(
        "p",
        EmitterSettings::default()
            .with_particle_count(300)
            .with_spawn_mode(SpawnMode::Burst),
    );
    emitter.tick(FrameTime::new(0.0, 0.016), &mut registry);
    assert_eq!(emitter.emitted(), 300);
    assert!(emitter.is_finished());
}

#[test]
fn test_zero_count_emitter_never_allocates() {
    let mut engine = VfxEngine::new();
    engine.register_pool("p", pool(8));
    engine.add_emitter(Emitter::new(
        "p",
        EmitterSettings::default().with_particle_count(0).with_looping(true),
    ));
    for i in 0..100 {
        let report = engine.frame(FrameTime::new(i as f32 * 0.1, 0.1));
        assert_eq!(report.emitted, 0);
        assert_eq!(report.dirty_range("p"), Some(DirtyRange::Clean));
    }
}

#[test]
fn test_duplicate_registration_keeps_original() {
    let mut registry = PoolRegistry::new();
    assert!(registry.register("p", pool(4)));
    assert!(!registry.register("p", pool(8)));
    assert_eq!(registry.get("p").unwrap().capacity(), 4);
    assert!(registry.unregister("q").is_none());
    assert!(registry.get("P").is_none());
}

#[test]
fn test_rendered_particles_travel_from_emitter() {
    let mut engine = VfxEngine::new();
    engine.register_pool("p", pool(16));
    let settings = EmitterSettings {
        particle_count: 1,
        spawn_mode: SpawnMode::Burst,
        lifetime: ValueRange::constant(4.0),
        speed: ValueRange::constant(2.0),
        position_offset: VectorRange::constant(Vec3::ZERO),
        direction: VectorRange::constant(Vec3::Y),
        ..Default::default()
    };
    engine.add_emitter(
        Emitter::new("p", settings).with_transform(Affine3A::from_translation(Vec3::new(1.0, 0.0, 0.0))),
    );
    engine.frame(FrameTime::new(1.0, 0.1));

    let rendered = engine.evaluate("p", 2.0, &CameraBasis::default()).unwrap();
    assert_eq!(rendered.len(), 1);
    let p = rendered[0].position();
    assert!((p - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-4, "{:?}", p);
    assert!((rendered[0].progress - 0.25).abs() < 1e-6);
}

#[test]
fn test_built_in_preset_runs() {
    let mut engine = EffectPreset::built_in("fireworks")
        .unwrap()
        .instantiate(Some(9))
        .unwrap();
    assert!(engine.launch_firework(Vec3::ZERO, 0.0));

    let mut clock = Clock::new();
    let mut total = 0;
    for _ in 0..240 {
        total += engine.frame(clock.advance(1.0 / 60.0)).emitted;
    }
    // one burst of the default size plus some trail
    assert!(total > FireworkSettings::default().burst_count, "emitted {}", total);
}
