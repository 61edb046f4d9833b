//! Entity records and id allocation

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use super::component::{downcast_mut, downcast_ref};
use super::{Component, Signature};

/// Entity ID type - simple numeric ID
pub type EntityId = u64;

/// Key used to address an entity from outside the directory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Id(EntityId),
    Alias(String),
}

impl From<EntityId> for EntityRef {
    fn from(id: EntityId) -> Self {
        EntityRef::Id(id)
    }
}

impl From<&str> for EntityRef {
    fn from(alias: &str) -> Self {
        EntityRef::Alias(alias.to_string())
    }
}

impl From<String> for EntityRef {
    fn from(alias: String) -> Self {
        EntityRef::Alias(alias)
    }
}

struct ComponentSlot {
    id: Signature,
    value: Box<dyn Component>,
}

/// A bag of components
///
/// `signature` is always the OR of the ids of the components present. Only
/// the crate mutates the component set, so that every change passes through
/// the directory's cache bracket.
pub struct Entity {
    id: Option<EntityId>,
    generation: u32,
    alias: Option<String>,
    components: HashMap<TypeId, ComponentSlot>,
    signature: Signature,
    pooled: bool,
}

impl Entity {
    pub(crate) fn new(alias: Option<String>) -> Self {
        Self {
            id: None,
            generation: 0,
            alias,
            components: HashMap::new(),
            signature: Signature::EMPTY,
            pooled: false,
        }
    }

    /// Assigned by the directory on registration; `None` while pooled
    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    /// Registration count at the time this entity was registered. An id
    /// that was released and handed out again carries a new generation.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// Whether removal hands this entity back to a pool
    pub fn is_pooled(&self) -> bool {
        self.pooled
    }

    pub fn component<T: Component>(&self) -> Option<&T> {
        self.components
            .get(&TypeId::of::<T>())
            .and_then(|slot| downcast_ref::<T>(slot.value.as_ref()))
    }

    pub fn component_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.components
            .get_mut(&TypeId::of::<T>())
            .and_then(|slot| downcast_mut::<T>(slot.value.as_mut()))
    }

    pub fn has<T: Component>(&self) -> bool {
        self.components.contains_key(&TypeId::of::<T>())
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub(crate) fn set_id(&mut self, id: Option<EntityId>) {
        self.id = id;
    }

    pub(crate) fn set_generation(&mut self, generation: u32) {
        self.generation = generation;
    }

    pub(crate) fn set_pooled(&mut self, pooled: bool) {
        self.pooled = pooled;
    }

    /// Stores `value` under `type_id`, replacing any previous instance
    pub(crate) fn attach(&mut self, type_id: TypeId, id: Signature, value: Box<dyn Component>) {
        self.components.insert(type_id, ComponentSlot { id, value });
        self.signature |= id;
    }

    pub(crate) fn detach(&mut self, type_id: TypeId) -> Option<Box<dyn Component>> {
        let slot = self.components.remove(&type_id)?;
        self.signature = self.signature.without(slot.id);
        Some(slot.value)
    }

    /// Runs the release hook of every component that opted into one
    pub(crate) fn dispose(&mut self) {
        for slot in self.components.values_mut() {
            if let Some(disposable) = slot.value.as_disposable() {
                disposable.dispose();
            }
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("alias", &self.alias)
            .field("signature", &self.signature)
            .field("components", &self.components.len())
            .field("pooled", &self.pooled)
            .finish()
    }
}

/// Id allocator with LIFO reuse of retired ids
#[derive(Debug, Default)]
pub struct IdAllocator {
    next_id: EntityId,
    free_list: Vec<EntityId>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self) -> EntityId {
        if let Some(id) = self.free_list.pop() {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn release(&mut self, id: EntityId) {
        self.free_list.push(id);
    }

    pub fn reset(&mut self) {
        self.free_list.clear();
        self.next_id = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::Disposable;

    #[derive(Debug, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    struct Handle {
        released: std::rc::Rc<std::cell::Cell<bool>>,
    }
    impl Component for Handle {
        fn as_disposable(&mut self) -> Option<&mut dyn Disposable> {
            Some(self)
        }
    }
    impl Disposable for Handle {
        fn dispose(&mut self) {
            self.released.set(true);
        }
    }

    #[test]
    fn test_id_allocation() {
        let mut allocator = IdAllocator::new();

        assert_eq!(allocator.acquire(), 0);
        assert_eq!(allocator.acquire(), 1);
        assert_eq!(allocator.acquire(), 2);

        allocator.release(0);
        allocator.release(2);
        // Most recently retired id comes back first
        assert_eq!(allocator.acquire(), 2);
        assert_eq!(allocator.acquire(), 0);
        assert_eq!(allocator.acquire(), 3);

        allocator.reset();
        assert_eq!(allocator.acquire(), 0);
    }

    #[test]
    fn test_signature_tracks_components() {
        let mut entity = Entity::new(None);
        entity.attach(TypeId::of::<Health>(), Signature::from_bits(4), Box::new(Health(10)));
        assert_eq!(entity.signature().bits(), 4);
        assert_eq!(entity.component::<Health>(), Some(&Health(10)));

        entity.component_mut::<Health>().unwrap().0 = 3;
        assert_eq!(entity.component::<Health>(), Some(&Health(3)));

        assert!(entity.detach(TypeId::of::<Health>()).is_some());
        assert!(entity.signature().is_empty());
        assert!(!entity.has::<Health>());
        assert!(entity.detach(TypeId::of::<Health>()).is_none());
    }

    #[test]
    fn test_dispose_releases_only_disposable_components() {
        let released = std::rc::Rc::new(std::cell::Cell::new(false));
        let mut entity = Entity::new(Some("player".into()));
        entity.attach(TypeId::of::<Health>(), Signature::from_bits(1), Box::new(Health(1)));
        entity.attach(
            TypeId::of::<Handle>(),
            Signature::from_bits(2),
            Box::new(Handle {
                released: released.clone(),
            }),
        );

        entity.dispose();
        assert!(released.get());
        assert_eq!(entity.alias(), Some("player"));
    }
}
