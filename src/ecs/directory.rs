//! Entity directory and per-system match cache
//!
//! The directory owns every live entity, the alias index and the id
//! allocator. It also memoizes, per system, the set of entities whose
//! signature satisfies that system's requirement.
//!
//! The cache is filled lazily: a read of an empty entry triggers a full scan,
//! a read of a non-empty entry returns the stored set as is. Keeping the
//! stored sets correct is the job of [`EntityDirectory::evict_then_reinsert`],
//! which every component-set mutation goes through. Reinsertion only touches
//! entries that a scan has already primed; entries that were never scanned
//! will pick the entity up on their first read.

use std::collections::{BTreeSet, HashMap};

use tracing::trace;

use super::entity::IdAllocator;
use super::{Entity, EntityId, EntityRef, Signature};
use crate::error::{EcsError, EcsResult};
use crate::scheduler::{SystemId, SystemRecord};

#[derive(Default)]
pub struct EntityDirectory {
    entities: HashMap<EntityId, Entity>,
    aliases: HashMap<String, EntityId>,
    ids: IdAllocator,
    /// Registrations so far; stamps each registered entity
    generation: u32,
    cache: HashMap<SystemId, BTreeSet<EntityId>>,
}

impl EntityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns an id to `entity`, indexes it and returns the id.
    ///
    /// An entity that already carries components (a pooled entity coming
    /// back into play) is added to every primed cache it matches.
    pub fn register(&mut self, mut entity: Entity, systems: &[SystemRecord]) -> EcsResult<EntityId> {
        if let Some(alias) = entity.alias() {
            if let Some(&existing) = self.aliases.get(alias) {
                return Err(EcsError::DuplicateAlias {
                    alias: alias.to_string(),
                    existing,
                });
            }
        }

        let id = self.ids.acquire();
        self.generation = self.generation.wrapping_add(1);
        entity.set_id(Some(id));
        entity.set_generation(self.generation);
        if let Some(alias) = entity.alias() {
            self.aliases.insert(alias.to_string(), id);
        }

        let signature = entity.signature();
        if !signature.is_empty() {
            self.reinsert(id, signature, systems);
        }
        self.entities.insert(id, entity);
        Ok(id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn get_by_alias(&self, alias: &str) -> EcsResult<&Entity> {
        self.aliases
            .get(alias)
            .and_then(|id| self.entities.get(id))
            .ok_or_else(|| EcsError::AliasNotFound(alias.to_string()))
    }

    /// Resolves an id or alias to a live entity id
    pub fn resolve(&self, entity: &EntityRef) -> EcsResult<EntityId> {
        match entity {
            EntityRef::Id(id) if self.entities.contains_key(id) => Ok(*id),
            EntityRef::Id(id) => Err(EcsError::EntityNotFound(*id)),
            EntityRef::Alias(alias) => self
                .aliases
                .get(alias)
                .copied()
                .ok_or_else(|| EcsError::AliasNotFound(alias.clone())),
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Live entity ids in ascending order
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter().map(|(id, entity)| (*id, entity))
    }

    /// Entities known to satisfy `system`'s requirement. An empty
    /// requirement matches nothing and never scans.
    pub fn entities_matching(&mut self, system: &SystemRecord) -> &BTreeSet<EntityId> {
        let required = system.required();
        let stale = !required.is_empty()
            && self
                .cache
                .get(&system.id())
                .map_or(true, |matched| matched.is_empty());
        if stale {
            let matched: BTreeSet<EntityId> = self
                .entities
                .iter()
                .filter(|(_, entity)| entity.signature().satisfies(required))
                .map(|(id, _)| *id)
                .collect();
            trace!(
                system = system.name(),
                matched = matched.len(),
                "rescanned entities"
            );
            self.cache.insert(system.id(), matched);
        }
        self.cache.entry(system.id()).or_default()
    }

    /// Applies `mutate` to the component set of `id`, keeping every primed
    /// cache consistent: the entity is evicted under its old signature before
    /// the mutation and reinserted under the new one after it.
    pub fn evict_then_reinsert<R>(
        &mut self,
        id: EntityId,
        systems: &[SystemRecord],
        mutate: impl FnOnce(&mut Entity) -> R,
    ) -> EcsResult<R> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(EcsError::EntityNotFound(id))?;

        let old = entity.signature();
        for system in systems {
            if old.satisfies(system.required()) {
                if let Some(matched) = self.cache.get_mut(&system.id()) {
                    matched.remove(&id);
                }
            }
        }

        let output = mutate(entity);
        let new = entity.signature();
        self.reinsert(id, new, systems);
        Ok(output)
    }

    fn reinsert(&mut self, id: EntityId, signature: Signature, systems: &[SystemRecord]) {
        for system in systems {
            if signature.satisfies(system.required()) {
                if let Some(matched) = self.cache.get_mut(&system.id()) {
                    matched.insert(id);
                }
            }
        }
    }

    /// Drops every index of `id`, releases the id and disposes the
    /// entity's components. The entity itself is handed back so a pool can
    /// keep it.
    pub fn remove(&mut self, id: EntityId) -> EcsResult<Entity> {
        let mut entity = self
            .entities
            .remove(&id)
            .ok_or(EcsError::EntityNotFound(id))?;

        for matched in self.cache.values_mut() {
            matched.remove(&id);
        }
        self.ids.release(id);
        if let Some(alias) = entity.alias() {
            self.aliases.remove(alias);
        }
        entity.dispose();
        entity.set_id(None);
        Ok(entity)
    }

    /// Forgets the cache entry of a detached system
    pub fn forget_system(&mut self, system: SystemId) {
        self.cache.remove(&system);
    }

    pub(crate) fn dispose(&mut self) {
        self.cache.clear();
        self.aliases.clear();
        for entity in self.entities.values_mut() {
            entity.dispose();
        }
        self.entities.clear();
        self.ids.reset();
    }
}
