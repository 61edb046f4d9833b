//! Adaptive entity pools
//!
//! One [`EntityPool`] exists per exact component signature. Each pool keeps
//! its own hysteresis counters: `frequency` rises on every acquisition
//! attempt and falls on every release, and the capacity bounds `min_size`
//! and `max_size` move by doubling and halving against it. Pools only shrink
//! in [`EntityPool::release_from_pool`], which the [`PoolManager`] triggers
//! once per configured removal period.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, trace};

use crate::config::PoolConfig;
use crate::ecs::{Entity, Signature};

/// Floor for `min_size` when a trim pass shrinks it
const MIN_SIZE_FLOOR: usize = 4;

/// Frame deltas are milliseconds, removal periods seconds
const MILLIS_TO_SECS: f32 = 0.001;

pub struct EntityPool {
    /// Oldest at the front, most recently released at the back
    entities: VecDeque<Entity>,
    min_size: usize,
    max_size: usize,
    frequency: usize,
    absolute_max: usize,
}

impl EntityPool {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            entities: VecDeque::new(),
            min_size: config.initial_min_size.min(config.absolute_max),
            max_size: config.initial_max_size.min(config.absolute_max),
            frequency: 1,
            absolute_max: config.absolute_max,
        }
    }

    /// Takes the most recently released entity, if any
    pub fn get(&mut self) -> Option<Entity> {
        self.frequency += 1;
        let entity = self.entities.pop_back()?;
        if self.min_size / self.frequency > 0 {
            self.min_size = (self.min_size * 2).min(self.absolute_max);
        }
        Some(entity)
    }

    /// Stores `entity` for reuse. A saturated pool hands it straight back.
    pub fn put(&mut self, entity: Entity) -> Option<Entity> {
        self.frequency = self.frequency.saturating_sub(1).max(1);
        if self.entities.len() >= self.max_size {
            return Some(entity);
        }

        let stats = self.max_size / self.frequency;
        if stats < 1 && self.max_size * 2 <= self.absolute_max {
            self.max_size *= 2;
        } else if stats > 10 {
            self.max_size /= 2;
        }
        self.entities.push_back(entity);
        None
    }

    /// Trim pass. Drops `min_size / frequency` of the oldest entries, or,
    /// when the pool is already near its floor, shrinks the bounds instead.
    /// Returns the number of entities dropped.
    pub fn release_from_pool(&mut self) -> usize {
        let step = self.min_size / self.frequency;
        let size = self.entities.len();

        if size <= self.min_size + step {
            self.min_size = (self.min_size - self.min_size / 2).max(MIN_SIZE_FLOOR);
            if size > 0 && self.max_size / size > 2 {
                self.max_size /= 2;
            }
            return 0;
        }

        self.entities.drain(..step);
        self.frequency = self.frequency.max(1);
        step
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn frequency(&self) -> usize {
        self.frequency
    }
}

/// Routes pooled entities to the pool of their signature and drives the
/// periodic trim
pub struct PoolManager {
    pools: HashMap<Signature, EntityPool>,
    config: PoolConfig,
    accumulated_secs: f32,
}

impl PoolManager {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            pools: HashMap::new(),
            config,
            accumulated_secs: 0.0,
        }
    }

    /// Spare entity for `signature`, if its pool holds one. The first
    /// request for a signature only creates the (empty) pool.
    pub fn acquire(&mut self, signature: Signature) -> Option<Entity> {
        match self.pools.get_mut(&signature) {
            Some(pool) => pool.get(),
            None => {
                debug!(%signature, "created entity pool");
                self.pools.insert(signature, EntityPool::new(&self.config));
                None
            }
        }
    }

    /// Hands `entity` to the pool of its current signature
    pub fn release(&mut self, entity: Entity) {
        let signature = entity.signature();
        let config = &self.config;
        let pool = self.pools.entry(signature).or_insert_with(|| {
            debug!(%signature, "created entity pool");
            EntityPool::new(config)
        });
        if pool.put(entity).is_some() {
            trace!(%signature, size = pool.len(), "pool saturated, dropped entity");
        }
    }

    /// Accumulates `delta_ms` and trims every pool once the removal period
    /// has elapsed. A non-positive period disables trimming.
    pub fn advance(&mut self, delta_ms: f32) {
        if self.config.removal_period_secs <= 0.0 {
            return;
        }
        self.accumulated_secs += delta_ms * MILLIS_TO_SECS;
        if self.accumulated_secs >= self.config.removal_period_secs {
            let dropped = self.release_from_pools();
            debug!(pools = self.pools.len(), dropped, "trimmed entity pools");
            self.accumulated_secs = 0.0;
        }
    }

    /// Runs one trim pass over every pool
    pub fn release_from_pools(&mut self) -> usize {
        self.pools.values_mut().map(EntityPool::release_from_pool).sum()
    }

    pub fn pool(&self, signature: Signature) -> Option<&EntityPool> {
        self.pools.get(&signature)
    }

    pub fn signatures(&self) -> Vec<Signature> {
        let mut signatures: Vec<Signature> = self.pools.keys().copied().collect();
        signatures.sort_unstable();
        signatures
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn set_removal_period(&mut self, secs: f32) {
        self.config.removal_period_secs = secs;
    }

    /// Applies to pools created from now on
    pub fn set_absolute_max(&mut self, absolute_max: usize) {
        self.config.absolute_max = absolute_max;
    }

    pub(crate) fn dispose(&mut self) {
        self.pools.clear();
        self.accumulated_secs = 0.0;
    }
}
