//! Effect presets stored as RON.
//!
//! A preset bundles the pools, emitters and fireworks that make up one
//! effect. Tuned settings can be exported with
//! [`EffectPreset::to_ron_string`] and loaded back later:
//!
//! ```ron
//! (
//!     name: "embers",
//!     pools: [
//!         (
//!             name: "embers",
//!             settings: (capacity: 5000, render_mode: CameraFacing, blend: Additive),
//!             alpha_map: Some(Dot(32)),
//!         ),
//!     ],
//!     emitters: [
//!         (
//!             pool: "embers",
//!             position: (0.0, -1.0, 0.0),
//!             settings: (particle_count: 500, looping: true, color_start: ["orange", "#ff4500"]),
//!         ),
//!     ],
//! )
//! ```
//!
//! Any field left out takes its default.

use std::fs;
use std::path::{Path, PathBuf};

use glam::{Affine3A, Vec3};
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::emitter::{Emitter, EmitterSettings};
use crate::engine::{Motion, VfxEngine};
use crate::error::PresetError;
use crate::fireworks::{FireworkLauncher, FireworkSettings};
use crate::lifecycle::{FadeWindow, RenderMode};
use crate::particle::{ValueRange, VectorRange};
use crate::pool::{BlendMode, ParticlePool, PoolSettings};
use crate::textures::AlphaMap;

/// Names accepted by [`EffectPreset::built_in`].
pub const BUILT_INS: [&str; 3] = ["sparks", "fountain", "fireworks"];

/// Where a pool's alpha map comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AlphaMapSource {
    /// Image file. Relative paths resolve against the preset's directory.
    File(PathBuf),
    /// Generated soft dot of the given size in pixels.
    Dot(u32),
}

/// One pool in a preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolPreset {
    /// Registry name.
    pub name: String,
    /// Pool settings.
    #[serde(default)]
    pub settings: PoolSettings,
    /// Optional alpha map.
    #[serde(default)]
    pub alpha_map: Option<AlphaMapSource>,
}

/// One emitter in a preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitterPreset {
    /// Target pool name.
    pub pool: String,
    /// Emitter position, or the anchor of its motion.
    #[serde(default)]
    pub position: Vec3,
    /// Scripted movement.
    #[serde(default)]
    pub motion: Option<Motion>,
    /// Emission settings.
    #[serde(default)]
    pub settings: EmitterSettings,
}

/// Firework launcher in a preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireworkPreset {
    /// Target pool name.
    pub pool: String,
    /// Launch parameters.
    #[serde(default)]
    pub settings: FireworkSettings,
}

/// A complete effect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectPreset {
    /// Display name.
    pub name: String,
    /// Pools to register.
    pub pools: Vec<PoolPreset>,
    /// Emitters to add.
    pub emitters: Vec<EmitterPreset>,
    /// Optional firework launcher.
    pub fireworks: Option<FireworkPreset>,
    /// Directory used to resolve relative alpha map paths.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl EffectPreset {
    /// Parse a preset from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, PresetError> {
        Ok(ron::from_str(text)?)
    }

    /// Read a preset file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PresetError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut preset = Self::from_ron_str(&text)?;
        preset.base_dir = path.parent().map(Path::to_path_buf);
        log::info!(
            "loaded preset `{}` from {}: {} pools, {} emitters",
            preset.name,
            path.display(),
            preset.pools.len(),
            preset.emitters.len()
        );
        Ok(preset)
    }

    /// Serialize as pretty RON.
    pub fn to_ron_string(&self) -> Result<String, PresetError> {
        Ok(ron::ser::to_string_pretty(self, PrettyConfig::new())?)
    }

    /// Write the preset to a file as pretty RON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PresetError> {
        fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }

    /// One of the presets shipped with the crate. See [`BUILT_INS`].
    pub fn built_in(name: &str) -> Result<Self, PresetError> {
        match name {
            "sparks" => Ok(sparks()),
            "fountain" => Ok(fountain()),
            "fireworks" => Ok(fireworks()),
            other => Err(PresetError::UnknownBuiltIn(other.to_string())),
        }
    }

    /// Build a running engine. With a seed, every emitter and the launcher
    /// get derived deterministic seeds.
    pub fn instantiate(&self, seed: Option<u64>) -> Result<VfxEngine, PresetError> {
        let mut engine = VfxEngine::new();

        for pool in &self.pools {
            let mut settings = pool.settings.clone();
            if let Some(source) = &pool.alpha_map {
                let map = self
                    .load_alpha_map(source)
                    .map_err(|source| PresetError::Texture {
                        pool: pool.name.clone(),
                        source,
                    })?;
                settings = settings.with_alpha_map(map.into_handle());
            }
            let particles = ParticlePool::new(settings).map_err(|source| PresetError::Pool {
                pool: pool.name.clone(),
                source,
            })?;
            engine.register_pool(pool.name.clone(), particles);
        }

        for (i, entry) in self.emitters.iter().enumerate() {
            if !engine.registry().contains(&entry.pool) {
                log::warn!("emitter {} targets pool `{}` which the preset does not define", i, entry.pool);
            }
            let mut emitter = Emitter::new(entry.pool.clone(), entry.settings.clone())
                .with_transform(Affine3A::from_translation(entry.position));
            if let Some(seed) = seed {
                emitter = emitter.with_seed(seed.wrapping_add(i as u64));
            }
            match entry.motion {
                Some(motion) => engine.add_moving_emitter(emitter, entry.position, motion),
                None => engine.add_emitter(emitter),
            };
        }

        if let Some(fw) = &self.fireworks {
            let mut launcher = FireworkLauncher::new(fw.pool.clone(), fw.settings.clone());
            if let Some(seed) = seed {
                launcher = launcher.with_seed(seed.wrapping_add(self.emitters.len() as u64));
            }
            engine.set_fireworks(launcher);
        }

        Ok(engine)
    }

    fn load_alpha_map(&self, source: &AlphaMapSource) -> Result<AlphaMap, crate::error::TextureError> {
        match source {
            AlphaMapSource::Dot(size) => Ok(AlphaMap::radial_dot(*size)),
            AlphaMapSource::File(path) => match &self.base_dir {
                Some(dir) if path.is_relative() => AlphaMap::from_file(dir.join(path)),
                _ => AlphaMap::from_file(path),
            },
        }
    }
}

// ========== Built-in presets ==========

/// Two looping emitters weaving through a shared camera-facing pool.
fn sparks() -> EffectPreset {
    let pool = PoolSettings {
        capacity: 100_000,
        render_mode: RenderMode::CameraFacing,
        ..Default::default()
    };
    let spark = |colors: Vec<Color>, color_end: Vec<Color>| EmitterSettings {
        particle_count: 10_000,
        looping: true,
        color_start: colors,
        color_end,
        size: ValueRange::new(0.01, 0.1),
        position_offset: VectorRange::constant(Vec3::ZERO),
        direction: VectorRange::new(Vec3::new(-0.5, 0.0, -0.5), Vec3::new(0.5, 1.0, 0.5)),
        speed: ValueRange::new(1.0, 5.0),
        ..Default::default()
    };
    let yellow_green = Color::rgb_u8(0x9A, 0xCD, 0x32);
    let pale_green = Color::rgb_u8(0x98, 0xFB, 0x98);
    let pale_goldenrod = Color::rgb_u8(0xEE, 0xE8, 0xAA);
    let orchid = Color::rgb_u8(0xDA, 0x70, 0xD6);
    let half_pi = std::f32::consts::FRAC_PI_2;

    EffectPreset {
        name: "sparks".to_string(),
        pools: vec![PoolPreset {
            name: "sparks".to_string(),
            settings: pool,
            alpha_map: None,
        }],
        emitters: vec![
            EmitterPreset {
                pool: "sparks".to_string(),
                position: Vec3::ZERO,
                motion: Some(Motion::Lissajous {
                    amplitude: Vec3::splat(1.5),
                    frequency: Vec3::new(6.0, 3.0, 4.0),
                    phase: Vec3::new(0.0, half_pi, 0.0),
                }),
                settings: spark(vec![yellow_green, pale_green], vec![orchid]),
            },
            EmitterPreset {
                pool: "sparks".to_string(),
                position: Vec3::ZERO,
                motion: Some(Motion::Lissajous {
                    amplitude: Vec3::splat(1.5),
                    frequency: Vec3::new(6.0, 3.0, 4.0),
                    phase: Vec3::new(half_pi, 0.0, half_pi),
                }),
                settings: spark(vec![pale_goldenrod, pale_green], Vec::new()),
            },
        ],
        fireworks: None,
        base_dir: None,
    }
}

fn fountain() -> EffectPreset {
    EffectPreset {
        name: "fountain".to_string(),
        pools: vec![PoolPreset {
            name: "fountain".to_string(),
            settings: PoolSettings {
                capacity: 20_000,
                render_mode: RenderMode::CameraFacing,
                blend: BlendMode::Additive,
                fade_size: FadeWindow::new(0.1, 0.7),
                ..Default::default()
            },
            alpha_map: Some(AlphaMapSource::Dot(32)),
        }],
        emitters: vec![EmitterPreset {
            pool: "fountain".to_string(),
            position: Vec3::new(0.0, -1.0, 0.0),
            motion: None,
            settings: EmitterSettings {
                particle_count: 3000,
                looping: true,
                color_start: vec![Color::rgb_u8(0x00, 0xBF, 0xFF), Color::rgb_u8(0x00, 0xFF, 0xFF)],
                color_end: vec![Color::WHITE],
                lifetime: ValueRange::new(1.0, 2.5),
                speed: ValueRange::new(2.0, 4.0),
                size: ValueRange::new(0.05, 0.15),
                position_offset: VectorRange::new(Vec3::splat(-0.05), Vec3::splat(0.05)),
                direction: VectorRange::new(Vec3::new(-0.15, 1.0, -0.15), Vec3::new(0.15, 1.0, 0.15)),
                ..Default::default()
            },
        }],
        fireworks: None,
        base_dir: None,
    }
}

fn fireworks() -> EffectPreset {
    EffectPreset {
        name: "fireworks".to_string(),
        pools: vec![PoolPreset {
            name: "fireworks".to_string(),
            settings: PoolSettings {
                capacity: 50_000,
                render_mode: RenderMode::CameraFacing,
                blend: BlendMode::Additive,
                fade_alpha: FadeWindow::new(0.0, 0.6),
                ..Default::default()
            },
            alpha_map: Some(AlphaMapSource::Dot(32)),
        }],
        emitters: Vec::new(),
        fireworks: Some(FireworkPreset {
            pool: "fireworks".to_string(),
            settings: FireworkSettings::default(),
        }),
        base_dir: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PoolError, TextureError};
    use crate::time::FrameTime;

    #[test]
    fn test_built_ins_instantiate() {
        for name in BUILT_INS {
            let preset = EffectPreset::built_in(name).unwrap();
            let engine = preset.instantiate(Some(1)).unwrap();
            assert!(engine.registry().contains(name), "{} has no pool", name);
        }
    }

    #[test]
    fn test_unknown_built_in() {
        let err = EffectPreset::built_in("smoke").unwrap_err();
        assert!(matches!(err, PresetError::UnknownBuiltIn(ref n) if n == "smoke"));
    }

    #[test]
    fn test_sparks_emits_into_shared_pool() {
        let mut engine = EffectPreset::built_in("sparks")
            .unwrap()
            .instantiate(Some(7))
            .unwrap();
        assert_eq!(engine.emitter_count(), 2);
        engine.frame(FrameTime::new(0.0, 0.1));
        let report = engine.frame(FrameTime::new(0.1, 0.1));
        // each emitter releases 10% of 10_000 by the second tick
        assert_eq!(report.emitted, 2000);
    }

    #[test]
    fn test_ron_round_trip() {
        for name in BUILT_INS {
            let preset = EffectPreset::built_in(name).unwrap();
            let text = preset.to_ron_string().unwrap();
            let back = EffectPreset::from_ron_str(&text).unwrap();
            assert_eq!(back, preset, "{} did not survive export", name);
        }
    }

    #[test]
    fn test_partial_preset_uses_defaults() {
        let preset = EffectPreset::from_ron_str(
            r#"(
                pools: [(name: "a", settings: (capacity: 10), alpha_map: Some(Dot(8)))],
                emitters: [(pool: "a", settings: (particle_count: 5, spawn_mode: Burst, color_start: ["red"]))],
            )"#,
        )
        .unwrap();
        assert_eq!(preset.pools[0].settings.intensity, 1.2);
        assert_eq!(preset.emitters[0].settings.color_start, vec![Color::rgb(1.0, 0.0, 0.0)]);
        assert!(preset.fireworks.is_none());

        let mut engine = preset.instantiate(None).unwrap();
        assert!(engine.registry().get("a").unwrap().settings().alpha_map.is_some());
        assert_eq!(engine.frame(FrameTime::new(0.0, 0.1)).emitted, 5);
    }

    #[test]
    fn test_parse_error() {
        let err = EffectPreset::from_ron_str("(pools: [").unwrap_err();
        assert!(matches!(err, PresetError::Parse(_)));
    }

    #[test]
    fn test_zero_capacity_pool_rejected() {
        let preset = EffectPreset::from_ron_str(r#"(pools: [(name: "empty", settings: (capacity: 0))])"#)
            .unwrap();
        match preset.instantiate(None) {
            Err(PresetError::Pool { pool, source }) => {
                assert_eq!(pool, "empty");
                assert_eq!(source, PoolError::ZeroCapacity);
            }
            other => panic!("expected pool error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_alpha_map_file() {
        let mut preset = EffectPreset::from_ron_str(
            r#"(pools: [(name: "a", alpha_map: Some(File("no_such_mask.png")))])"#,
        )
        .unwrap();
        preset.base_dir = Some(std::env::temp_dir());
        match preset.instantiate(None) {
            Err(PresetError::Texture { pool, source }) => {
                assert_eq!(pool, "a");
                assert!(matches!(source, TextureError::Io(_)));
            }
            other => panic!("expected texture error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("pixie_preset_{}.ron", std::process::id()));
        let preset = EffectPreset::built_in("fountain").unwrap();
        preset.save(&path).unwrap();
        let loaded = EffectPreset::load(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded.base_dir.as_deref(), path.parent());
        assert_eq!(loaded.pools, preset.pools);
        assert_eq!(loaded.emitters, preset.emitters);
    }
}
