//! World - central ECS container
//!
//! The world owns the component registry, the entity directory, the pools,
//! the attached systems and any user managers. It is the only way to create
//! entities, and every public entry point checks the lifecycle state first.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info};

use super::component::downcast_box;
use super::{
    AsAny, Component, ComponentRegistry, ComponentType, Entity, EntityDirectory, EntityId,
    EntityRef, Manager, Signature,
};
use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult};
use crate::pool::PoolManager;
use crate::scheduler::{
    FrameReport, MatchedBatch, MatchedEntity, System, SystemId, SystemRecord, SystemRunReport,
    SystemSetup,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Active,
    Disposed,
}

struct ManagerSlot {
    name: &'static str,
    manager: Box<dyn Manager>,
}

fn manager_failed(name: &'static str, err: anyhow::Error) -> EcsError {
    EcsError::ManagerFailed {
        manager: name,
        source: err.into(),
    }
}

fn system_not_found(id: SystemId) -> EcsError {
    EcsError::NotFound {
        kind: "system",
        name: id.to_string(),
    }
}

/// World holds all entities, components and systems
pub struct World {
    state: Lifecycle,
    config: WorldConfig,
    registry: ComponentRegistry,
    directory: EntityDirectory,
    pools: PoolManager,
    /// Attachment order
    records: Vec<SystemRecord>,
    systems: HashMap<SystemId, Box<dyn System>>,
    next_system_id: u64,
    managers: HashMap<TypeId, ManagerSlot>,
    frame: u64,
}

impl World {
    /// Create a world with the default configuration
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Create a world from a loaded configuration
    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            state: Lifecycle::Created,
            registry: ComponentRegistry::new(),
            directory: EntityDirectory::new(),
            pools: PoolManager::new(config.pool.clone()),
            records: Vec::new(),
            systems: HashMap::new(),
            next_system_id: 0,
            managers: HashMap::new(),
            frame: 0,
            config,
        }
    }

    fn ensure_active(&self) -> EcsResult<()> {
        match self.state {
            Lifecycle::Active => Ok(()),
            _ => Err(EcsError::NotInitialized { target: "world" }),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> Lifecycle {
        self.state
    }

    /// Configuration the world was built with
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Frames run since creation
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Entry point for an external discovery step. Allowed before
    /// `initialize()`.
    pub fn register_component_type(&mut self, ty: ComponentType) -> EcsResult<Signature> {
        if self.state == Lifecycle::Disposed {
            return Err(EcsError::NotInitialized { target: "world" });
        }
        self.registry.id_of(&ty)
    }

    /// Activate the world. A disposed world may be initialized again.
    pub fn initialize(&mut self) -> EcsResult<()> {
        if self.state == Lifecycle::Active {
            return Err(EcsError::AlreadyInitialized { target: "world" });
        }
        self.state = Lifecycle::Active;
        info!(
            component_types = self.registry.len(),
            absolute_max = self.pools.config().absolute_max,
            removal_period_secs = self.pools.config().removal_period_secs,
            "world initialized"
        );
        Ok(())
    }

    /// Get the id of `T`, registering it on first use
    pub fn component_id<T: Component>(&mut self) -> EcsResult<Signature> {
        self.ensure_active()?;
        Ok(self.registry.id_of_type::<T>())
    }

    /// Raw read access; types may be registered before `initialize()`
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Create a new entity, optionally reachable by alias
    pub fn create_entity(&mut self, alias: Option<&str>) -> EcsResult<EntityId> {
        self.ensure_active()?;
        let entity = Entity::new(alias.map(str::to_string));
        self.directory.register(entity, &self.records)
    }

    /// Reuses a pooled entity with exactly these component types, or builds
    /// a fresh one whose components come from the registered factories.
    pub fn create_pooled_entity(&mut self, types: &[ComponentType]) -> EcsResult<EntityId> {
        self.ensure_active()?;
        if types.is_empty() {
            return Err(EcsError::InvalidArgument(
                "pooled entity needs at least one component type".to_string(),
            ));
        }

        let mut signature = Signature::EMPTY;
        let mut ids = Vec::with_capacity(types.len());
        for ty in types {
            let id = self.registry.id_of(ty)?;
            signature |= id;
            ids.push(id);
        }

        if let Some(entity) = self.pools.acquire(signature) {
            return self.directory.register(entity, &self.records);
        }

        let components = types
            .iter()
            .map(|ty| self.registry.construct(ty))
            .collect::<EcsResult<Vec<_>>>()?;

        let mut entity = Entity::new(None);
        entity.set_pooled(true);
        let id = self.directory.register(entity, &self.records)?;
        self.directory.evict_then_reinsert(id, &self.records, |entity| {
            for ((ty, component_id), component) in types.iter().zip(ids).zip(components) {
                entity.attach(ty.type_id(), component_id, component);
            }
        })?;
        Ok(id)
    }

    /// Add a component to an entity, replacing any existing `C`
    pub fn add_component<C: Component>(&mut self, entity: EntityId, component: C) -> EcsResult<()> {
        self.ensure_active()?;
        if !self.directory.contains(entity) {
            return Err(EcsError::EntityNotFound(entity));
        }
        let component_id = self.registry.id_of_type::<C>();
        self.directory.evict_then_reinsert(entity, &self.records, |entity| {
            entity.attach(TypeId::of::<C>(), component_id, Box::new(component));
        })
    }

    /// Detaches and returns the `C` instance, if the entity carried one
    pub fn remove_component<C: Component>(&mut self, entity: EntityId) -> EcsResult<Option<C>> {
        self.ensure_active()?;
        let removed = self
            .directory
            .evict_then_reinsert(entity, &self.records, |entity| entity.detach(TypeId::of::<C>()))?;
        Ok(removed.and_then(downcast_box::<C>))
    }

    /// Get an entity by id
    pub fn entity(&self, id: EntityId) -> EcsResult<&Entity> {
        self.ensure_active()?;
        self.directory.get(id).ok_or(EcsError::EntityNotFound(id))
    }

    /// Component data is mutable through the returned entity; its
    /// component set is not.
    pub fn entity_mut(&mut self, id: EntityId) -> EcsResult<&mut Entity> {
        self.ensure_active()?;
        self.directory.get_mut(id).ok_or(EcsError::EntityNotFound(id))
    }

    /// Get an entity by alias
    pub fn entity_by_alias(&self, alias: &str) -> EcsResult<&Entity> {
        self.ensure_active()?;
        self.directory.get_by_alias(alias)
    }

    /// Check if an entity is live. Always false outside the active state,
    /// since nothing is registered then.
    pub fn contains(&self, id: EntityId) -> bool {
        self.directory.contains(id)
    }

    /// Number of live entities; zero outside the active state
    pub fn entity_count(&self) -> usize {
        self.directory.len()
    }

    /// Ids of all live entities, ascending
    pub fn entities(&self) -> EcsResult<Vec<EntityId>> {
        self.ensure_active()?;
        Ok(self.directory.ids())
    }

    /// Ids of live entities carrying a `C`, ascending
    pub fn entities_with<C: Component>(&self) -> EcsResult<Vec<EntityId>> {
        self.ensure_active()?;
        let Some(component_id) = self.registry.lookup_type::<C>() else {
            return Ok(Vec::new());
        };
        let mut ids: Vec<EntityId> = self
            .directory
            .iter()
            .filter(|(_, entity)| entity.signature().contains(component_id))
            .map(|(id, _)| id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Entities the match cache holds for `system`
    pub fn entities_matching(&mut self, system: SystemId) -> EcsResult<Vec<EntityId>> {
        self.ensure_active()?;
        let record = self
            .records
            .iter()
            .find(|record| record.id() == system)
            .ok_or_else(|| system_not_found(system))?;
        Ok(self.directory.entities_matching(record).iter().copied().collect())
    }

    /// Removes an entity by id or alias. Pooled entities go back to the pool
    /// of their signature.
    pub fn remove_entity(&mut self, entity: impl Into<EntityRef>) -> EcsResult<EntityId> {
        self.ensure_active()?;
        let id = self.directory.resolve(&entity.into())?;
        let entity = self.directory.remove(id)?;
        if entity.is_pooled() {
            self.pools.release(entity);
        }
        Ok(id)
    }

    /// Removes every live entity, returning how many were removed
    pub fn clear_entities(&mut self) -> EcsResult<usize> {
        self.ensure_active()?;
        let ids = self.directory.ids();
        for &id in &ids {
            self.remove_entity(id)?;
        }
        Ok(ids.len())
    }

    /// Attach a system after the ones already attached
    pub fn add_system<S: System>(&mut self, system: S) -> EcsResult<SystemId> {
        self.add_boxed_system(Box::new(system))
    }

    /// Attaches `system`, runs its `attach` and `initialize` hooks and
    /// freezes its required signature.
    pub fn add_boxed_system(&mut self, mut system: Box<dyn System>) -> EcsResult<SystemId> {
        self.ensure_active()?;
        let id = SystemId(self.next_system_id);
        self.next_system_id += 1;

        system.attach(self);
        let mut setup = SystemSetup::new(&mut self.registry);
        system
            .initialize(&mut setup)
            .map_err(|err| EcsError::system_failed(system.name(), err))?;
        let required = setup.required();

        let name = system.name().to_string();
        let schedule = self
            .config
            .systems
            .get(&name)
            .copied()
            .unwrap_or_else(|| system.schedule());
        debug!(system = %name, %id, %required, ?schedule, "attached system");

        self.records.push(SystemRecord::new(id, name, required, schedule));
        self.systems.insert(id, system);
        Ok(id)
    }

    /// Detach a system and dispose it
    pub fn remove_system(&mut self, id: SystemId) -> EcsResult<()> {
        self.ensure_active()?;
        let position = self
            .records
            .iter()
            .position(|record| record.id() == id)
            .ok_or_else(|| system_not_found(id))?;
        let record = self.records.remove(position);
        self.directory.forget_system(id);
        // A system removed from inside its own callback is disposed by
        // the frame loop once it returns.
        if let Some(mut system) = self.systems.remove(&id) {
            system.dispose();
        }
        debug!(system = record.name(), %id, "detached system");
        Ok(())
    }

    /// Get an attached system by id. Systems only exist while the world is
    /// active, so these lookups need no state check.
    pub fn system<S: System>(&self, id: SystemId) -> Option<&S> {
        self.systems
            .get(&id)
            .and_then(|system| AsAny::as_any(&**system).downcast_ref::<S>())
    }

    pub fn system_mut<S: System>(&mut self, id: SystemId) -> Option<&mut S> {
        self.systems
            .get_mut(&id)
            .and_then(|system| AsAny::as_any_mut(&mut **system).downcast_mut::<S>())
    }

    /// Scheduling state of an attached system
    pub fn system_record(&self, id: SystemId) -> Option<&SystemRecord> {
        self.records.iter().find(|record| record.id() == id)
    }

    /// Attached systems in execution order
    pub fn system_ids(&self) -> Vec<SystemId> {
        self.records.iter().map(SystemRecord::id).collect()
    }

    /// Runs one frame: every system in attachment order, then the pool trim
    /// accumulator. `delta` is the elapsed time in milliseconds.
    pub fn update(&mut self, delta: f32) -> EcsResult<FrameReport> {
        self.ensure_active()?;
        self.frame += 1;

        let order = self.system_ids();
        let mut reports = Vec::with_capacity(order.len());
        for id in order {
            let Some(mut system) = self.systems.remove(&id) else {
                continue;
            };

            let start = Instant::now();
            let outcome = self.run_system(id, system.as_mut(), delta);
            let duration_ms = start.elapsed().as_secs_f64() * 1_000.0;
            let name = system.name().to_string();

            if self.records.iter().any(|record| record.id() == id) {
                self.systems.insert(id, system);
            } else {
                system.dispose();
            }

            reports.push(SystemRunReport {
                name,
                processed: outcome?,
                duration_ms,
            });
        }

        self.pools.advance(delta);
        Ok(FrameReport {
            frame: self.frame,
            delta,
            systems: reports,
        })
    }

    fn run_system(&mut self, id: SystemId, system: &mut dyn System, delta: f32) -> EcsResult<Option<usize>> {
        system
            .process_system(self)
            .map_err(|err| EcsError::system_failed(system.name(), err))?;

        let Some(position) = self.records.iter().position(|record| record.id() == id) else {
            return Ok(None);
        };
        let record = &mut self.records[position];
        if !record.is_due(delta) || record.is_passive() {
            return Ok(None);
        }

        let required = self.records[position].required();
        let ids: Vec<EntityId> = self
            .directory
            .entities_matching(&self.records[position])
            .iter()
            .copied()
            .collect();
        let entities = ids
            .into_iter()
            .filter_map(|id| {
                self.directory.get(id).map(|entity| MatchedEntity {
                    id,
                    generation: entity.generation(),
                })
            })
            .collect();
        let batch = MatchedBatch::new(required, entities);
        system
            .process_entities(self, &batch)
            .map_err(|err| EcsError::system_failed(system.name(), err))?;
        Ok(Some(batch.len()))
    }

    /// Raw read access; usable in any lifecycle state
    pub fn pool_manager(&self) -> &PoolManager {
        &self.pools
    }

    /// Pool settings can only change while the world is active
    pub fn pool_manager_mut(&mut self) -> EcsResult<&mut PoolManager> {
        self.ensure_active()?;
        Ok(&mut self.pools)
    }

    /// Initializes and stores `manager`, replacing (and disposing) any
    /// previous manager of the same type
    pub fn add_manager<M: Manager>(&mut self, mut manager: M) -> EcsResult<()> {
        self.ensure_active()?;
        let name = type_name::<M>();
        manager
            .initialize()
            .map_err(|err| manager_failed(name, err))?;
        let slot = ManagerSlot {
            name,
            manager: Box::new(manager),
        };
        if let Some(mut previous) = self.managers.insert(TypeId::of::<M>(), slot) {
            previous
                .manager
                .dispose()
                .map_err(|err| manager_failed(previous.name, err))?;
        }
        Ok(())
    }

    /// Get a manager by type
    pub fn manager<M: Manager>(&self) -> EcsResult<&M> {
        self.ensure_active()?;
        self.managers
            .get(&TypeId::of::<M>())
            .and_then(|slot| AsAny::as_any(&*slot.manager).downcast_ref::<M>())
            .ok_or_else(|| EcsError::NotFound {
                kind: "manager",
                name: type_name::<M>().to_string(),
            })
    }

    /// Get a mutable manager by type
    pub fn manager_mut<M: Manager>(&mut self) -> EcsResult<&mut M> {
        self.ensure_active()?;
        self.managers
            .get_mut(&TypeId::of::<M>())
            .and_then(|slot| AsAny::as_any_mut(&mut *slot.manager).downcast_mut::<M>())
            .ok_or_else(|| EcsError::NotFound {
                kind: "manager",
                name: type_name::<M>().to_string(),
            })
    }

    /// Remove a manager and dispose it
    pub fn remove_manager<M: Manager>(&mut self) -> EcsResult<()> {
        self.ensure_active()?;
        let mut slot = self
            .managers
            .remove(&TypeId::of::<M>())
            .ok_or_else(|| EcsError::NotFound {
                kind: "manager",
                name: type_name::<M>().to_string(),
            })?;
        slot.manager
            .dispose()
            .map_err(|err| manager_failed(slot.name, err))
    }

    /// Disposes entities, registry, pools, managers and systems. The first
    /// manager failure is reported after everything else has been torn down.
    pub fn dispose(&mut self) -> EcsResult<()> {
        self.ensure_active()?;
        let entities = self.directory.len();
        self.directory.dispose();
        self.registry.clear();
        self.pools.dispose();

        let mut failure = None;
        for (_, mut slot) in self.managers.drain() {
            if let Err(err) = slot.manager.dispose() {
                failure.get_or_insert(manager_failed(slot.name, err));
            }
        }

        for record in self.records.drain(..) {
            if let Some(mut system) = self.systems.remove(&record.id()) {
                system.dispose();
            }
        }
        self.systems.clear();

        self.state = Lifecycle::Disposed;
        info!(entities, frames = self.frame, "world disposed");
        failure.map_or(Ok(()), Err)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
