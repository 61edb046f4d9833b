//! System contract and per-system scheduling state

use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::ecs::{AsAny, Component, ComponentRegistry, ComponentType, EntityId, Signature, World};
use crate::error::EcsResult;

/// Handle of a system attached to a [`World`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SystemId(pub(crate) u64);

impl SystemId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "system#{}", self.0)
    }
}

/// How often a system's per-entity step runs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schedule {
    /// Only the once-per-frame hook runs
    pub passive: bool,
    pub periodic: bool,
    /// Accumulated delta required before a periodic system is due.
    /// Values below 1 make the system due every frame.
    pub period: f32,
}

impl Schedule {
    pub fn every_frame() -> Self {
        Self {
            passive: false,
            periodic: false,
            period: 0.0,
        }
    }

    pub fn passive() -> Self {
        Self {
            passive: true,
            ..Self::every_frame()
        }
    }

    pub fn periodic(period: f32) -> Self {
        Self {
            periodic: true,
            period,
            ..Self::every_frame()
        }
    }

    pub fn with_passive(mut self, passive: bool) -> Self {
        self.passive = passive;
        self
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::every_frame()
    }
}

/// Registration record kept by the world for each attached system
///
/// `required` is fixed once the system's `initialize` has run; the match
/// cache relies on it never changing afterwards.
#[derive(Debug, Clone)]
pub struct SystemRecord {
    id: SystemId,
    name: String,
    required: Signature,
    schedule: Schedule,
    accumulated: f32,
}

impl SystemRecord {
    pub(crate) fn new(id: SystemId, name: impl Into<String>, required: Signature, schedule: Schedule) -> Self {
        Self {
            id,
            name: name.into(),
            required,
            schedule,
            accumulated: 0.0,
        }
    }

    pub fn id(&self) -> SystemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required(&self) -> Signature {
        self.required
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    pub fn is_passive(&self) -> bool {
        self.schedule.passive
    }

    pub fn is_periodic(&self) -> bool {
        self.schedule.periodic
    }

    pub fn accumulated(&self) -> f32 {
        self.accumulated
    }

    /// Advances the accumulator by `delta` and reports whether the system
    /// is due this frame. The accumulator resets when the period is reached.
    pub fn is_due(&mut self, delta: f32) -> bool {
        if !self.schedule.periodic || self.schedule.period < 1.0 {
            return true;
        }
        self.accumulated += delta;
        if self.accumulated >= self.schedule.period {
            self.accumulated = 0.0;
            return true;
        }
        false
    }
}

/// Outcome of one system within a frame
#[derive(Clone, Debug)]
pub struct SystemRunReport {
    pub name: String,
    /// Entities handed to the per-entity step; `None` when the step was
    /// skipped (passive, or periodic and not yet due)
    pub processed: Option<usize>,
    pub duration_ms: f64,
}

#[derive(Clone, Debug)]
pub struct FrameReport {
    pub frame: u64,
    pub delta: f32,
    pub systems: Vec<SystemRunReport>,
}

/// Matched entity pinned to the registration it had when the batch was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedEntity {
    pub id: EntityId,
    pub generation: u32,
}

/// Snapshot of the entities matched for one run of a system's per-entity
/// step, in ascending id order
#[derive(Debug, Clone)]
pub struct MatchedBatch {
    required: Signature,
    entities: Vec<MatchedEntity>,
}

impl MatchedBatch {
    pub(crate) fn new(required: Signature, entities: Vec<MatchedEntity>) -> Self {
        Self { required, entities }
    }

    pub fn required(&self) -> Signature {
        self.required
    }

    pub fn entities(&self) -> &[MatchedEntity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// False once `entity` was removed, its id handed to another entity, or
    /// its components changed so that it no longer qualifies
    pub fn still_matches(&self, world: &World, entity: MatchedEntity) -> bool {
        world.entity(entity.id).map_or(false, |live| {
            live.generation() == entity.generation && live.signature().satisfies(self.required)
        })
    }
}

/// Builder handed to [`System::initialize`] to declare required components
pub struct SystemSetup<'a> {
    registry: &'a mut ComponentRegistry,
    required: Signature,
}

impl<'a> SystemSetup<'a> {
    pub(crate) fn new(registry: &'a mut ComponentRegistry) -> Self {
        Self {
            registry,
            required: Signature::EMPTY,
        }
    }

    /// Adds `T` to the required signature and returns its id
    pub fn require<T: Component>(&mut self) -> Signature {
        let id = self.registry.id_of_type::<T>();
        self.required |= id;
        id
    }

    pub fn require_type(&mut self, ty: &ComponentType) -> EcsResult<Signature> {
        let id = self.registry.id_of(ty)?;
        self.required |= id;
        Ok(id)
    }

    /// Id of `T` without requiring it
    pub fn component_id<T: Component>(&mut self) -> Signature {
        self.registry.id_of_type::<T>()
    }

    pub fn required(&self) -> Signature {
        self.required
    }
}

/// A unit of per-frame logic
///
/// Systems run in attachment order, one at a time. Every frame the world
/// calls [`System::process_system`]; when the system is due and not passive
/// it then hands over the entities matching the required signature.
pub trait System: AsAny {
    fn name(&self) -> &str;

    /// Default scheduling; a `systems` entry in the world config overrides it
    fn schedule(&self) -> Schedule {
        Schedule::every_frame()
    }

    /// Called once before `initialize`
    fn attach(&mut self, _world: &World) {}

    fn initialize(&mut self, setup: &mut SystemSetup<'_>) -> Result<()>;

    fn process_system(&mut self, _world: &mut World) -> Result<()> {
        Ok(())
    }

    fn process_entity(&mut self, world: &mut World, entity: EntityId) -> Result<()>;

    /// Entities that stopped matching earlier in the same batch are skipped
    fn process_entities(&mut self, world: &mut World, batch: &MatchedBatch) -> Result<()> {
        for &entity in batch.entities() {
            if batch.still_matches(world, entity) {
                self.process_entity(world, entity.id)?;
            }
        }
        Ok(())
    }

    fn dispose(&mut self) {}
}
