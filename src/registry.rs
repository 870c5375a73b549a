//! Name-keyed directory of particle pools.
//!
//! Emitters never hold a pool directly. They name one, and the registry
//! resolves the name every time they emit, so a pool may be registered
//! after the emitters that target it, or be torn down under them.
//!
//! The registry is an ordinary owned value: create one per scene (or per
//! test) and drop it with the scene.

use std::collections::HashMap;

use crate::particle::ParticleGenerator;
use crate::pool::ParticlePool;

#[derive(Debug)]
struct Entry {
    pool: ParticlePool,
    generation: u64,
}

/// Owned mapping from unique, case-sensitive pool names to pools.
#[derive(Debug, Default)]
pub struct PoolRegistry {
    pools: HashMap<String, Entry>,
    next_generation: u64,
}

impl PoolRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `pool` under `name`.
    ///
    /// If the name is taken the existing pool is kept, a warning is logged
    /// and `false` is returned.
    pub fn register(&mut self, name: impl Into<String>, pool: ParticlePool) -> bool {
        let name = name.into();
        if self.pools.contains_key(&name) {
            log::warn!("particle pool `{}` already exists; registration ignored", name);
            return false;
        }
        log::debug!("registered particle pool `{}` ({} slots)", name, pool.capacity());
        let generation = self.next_generation;
        self.next_generation += 1;
        self.pools.insert(name, Entry { pool, generation });
        true
    }

    /// Remove and return the pool named `name`. Logs a warning if absent.
    pub fn unregister(&mut self, name: &str) -> Option<ParticlePool> {
        let pool = self.pools.remove(name).map(|entry| entry.pool);
        if pool.is_none() {
            log::warn!("particle pool `{}` not found; nothing to unregister", name);
        }
        pool
    }

    /// Allocate `count` particles in the named pool.
    ///
    /// Returns `None` without logging when the pool is absent; callers that
    /// care report it themselves.
    pub fn emit<G>(&mut self, name: &str, count: usize, generator: &mut G) -> Option<usize>
    where
        G: ParticleGenerator + ?Sized,
    {
        self.pools
            .get_mut(name)
            .map(|entry| entry.pool.allocate(count, generator))
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.pools.contains_key(name)
    }

    /// Look up a pool.
    pub fn get(&self, name: &str) -> Option<&ParticlePool> {
        self.pools.get(name).map(|entry| &entry.pool)
    }

    /// Look up a pool mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ParticlePool> {
        self.pools.get_mut(name).map(|entry| &mut entry.pool)
    }

    /// Identifies one registration of `name`.
    ///
    /// A pool registered again under the same name gets a new generation,
    /// so holders of per-pool resources can tell it apart from the old one.
    pub fn generation(&self, name: &str) -> Option<u64> {
        self.pools.get(name).map(|entry| entry.generation)
    }

    /// All pools, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParticlePool)> {
        self.pools.iter().map(|(k, v)| (k.as_str(), &v.pool))
    }

    /// All pools mutably, in no particular order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut ParticlePool)> {
        self.pools.iter_mut().map(|(k, v)| (k.as_str(), &mut v.pool))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.pools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered pools.
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Whether no pool is registered.
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}
