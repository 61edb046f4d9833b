//! Component identity registry
//!
//! Every component type is assigned a single-bit [`Signature`] the first time
//! it is seen. Ids are append-only: they are never reassigned or reused for
//! the lifetime of the registry.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use super::Signature;
use crate::error::{EcsError, EcsResult};

/// Width of the identity space
pub const MAX_COMPONENT_TYPES: usize = u64::BITS as usize;

/// Type-erasure helper implemented for every `'static` type
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Trait for components
///
/// Components that hold resources opt into release on entity disposal by
/// returning themselves from [`Component::as_disposable`].
pub trait Component: AsAny {
    fn as_disposable(&mut self) -> Option<&mut dyn Disposable> {
        None
    }
}

/// Release hook run when the owning entity is disposed
pub trait Disposable {
    fn dispose(&mut self);
}

pub(crate) fn downcast_ref<T: Component>(component: &dyn Component) -> Option<&T> {
    AsAny::as_any(component).downcast_ref::<T>()
}

pub(crate) fn downcast_mut<T: Component>(component: &mut dyn Component) -> Option<&mut T> {
    AsAny::as_any_mut(component).downcast_mut::<T>()
}

/// Builds a fresh instance for pooled entity construction
pub type ComponentFactory = fn() -> Box<dyn Component>;

pub(crate) fn downcast_box<T: Component>(component: Box<dyn Component>) -> Option<T> {
    AsAny::into_any(component).downcast::<T>().ok().map(|boxed| *boxed)
}

fn construct_default<T: Component + Default>() -> Box<dyn Component> {
    Box::new(T::default())
}

/// Descriptor of a component type as seen by the registry
#[derive(Clone, Copy)]
pub struct ComponentType {
    type_id: TypeId,
    name: &'static str,
    factory: Option<ComponentFactory>,
}

impl ComponentType {
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
            factory: None,
        }
    }

    /// Descriptor that can also build default instances of `T`
    pub fn constructible<T: Component + Default>() -> Self {
        Self {
            factory: Some(construct_default::<T>),
            ..Self::of::<T>()
        }
    }

    /// Override the display name reported by a discovery step
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_constructible(&self) -> bool {
        self.factory.is_some()
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ComponentType {}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentType")
            .field("name", &self.name)
            .field("constructible", &self.is_constructible())
            .finish()
    }
}

/// Maps component types to single-bit ids
#[derive(Default)]
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, Signature>,
    /// Indexed by bit position
    types: Vec<ComponentType>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `ty`, assigning `2^n` on first sight where `n` is
    /// the number of types registered so far.
    ///
    /// # Panics
    /// Panics when a 65th distinct type is registered.
    pub fn id_of(&mut self, ty: &ComponentType) -> EcsResult<Signature> {
        if ty.name.trim().is_empty() {
            return Err(EcsError::InvalidArgument(
                "component type must have a name".to_string(),
            ));
        }
        Ok(self.assign(ty))
    }

    /// Typed shorthand for [`ComponentRegistry::id_of`]
    pub fn id_of_type<T: Component>(&mut self) -> Signature {
        self.assign(&ComponentType::of::<T>())
    }

    fn assign(&mut self, ty: &ComponentType) -> Signature {
        if let Some(&id) = self.by_type.get(&ty.type_id) {
            let slot = id.bits().trailing_zeros() as usize;
            if self.types[slot].factory.is_none() && ty.factory.is_some() {
                self.types[slot].factory = ty.factory;
            }
            return id;
        }

        assert!(
            self.types.len() < MAX_COMPONENT_TYPES,
            "component identity space exhausted: at most {MAX_COMPONENT_TYPES} component types"
        );
        let id = Signature::from_bits(1u64 << self.types.len());
        self.by_type.insert(ty.type_id, id);
        self.types.push(*ty);
        id
    }

    /// Id of an already registered type, without registering it
    pub fn lookup(&self, type_id: TypeId) -> Option<Signature> {
        self.by_type.get(&type_id).copied()
    }

    pub fn lookup_type<T: Component>(&self) -> Option<Signature> {
        self.lookup(TypeId::of::<T>())
    }

    /// Descriptor for a single-bit id
    pub fn descriptor(&self, id: Signature) -> Option<&ComponentType> {
        if id.len() != 1 {
            return None;
        }
        self.types.get(id.bits().trailing_zeros() as usize)
    }

    /// Builds a fresh instance of `ty`, using either the descriptor's own
    /// factory or the one installed at registration.
    pub fn construct(&self, ty: &ComponentType) -> EcsResult<Box<dyn Component>> {
        let registered = self
            .lookup(ty.type_id)
            .and_then(|id| self.descriptor(id))
            .and_then(|desc| desc.factory);
        let factory = ty.factory.or(registered).ok_or_else(|| {
            EcsError::ComponentConstructionError {
                component: ty.name.to_string(),
                reason: "no factory available for component type",
            }
        })?;
        Ok(factory())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.by_type.clear();
        self.types.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {}

    #[derive(Debug, Default)]
    struct Velocity;
    impl Component for Velocity {}

    struct Opaque;
    impl Component for Opaque {}

    #[test]
    fn test_ids_are_distinct_powers_of_two() {
        let mut registry = ComponentRegistry::new();

        let pos = registry.id_of_type::<Position>();
        let vel = registry.id_of_type::<Velocity>();
        let opaque = registry.id_of(&ComponentType::of::<Opaque>()).unwrap();

        assert_eq!(pos.bits(), 1);
        assert_eq!(vel.bits(), 2);
        assert_eq!(opaque.bits(), 4);
        assert_eq!(registry.id_of_type::<Position>(), pos);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_unnamed_type_is_rejected() {
        let mut registry = ComponentRegistry::new();
        let err = registry
            .id_of(&ComponentType::of::<Position>().with_name(""))
            .unwrap_err();
        assert!(matches!(err, EcsError::InvalidArgument(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_construct_uses_registered_factory() {
        let mut registry = ComponentRegistry::new();
        registry
            .id_of(&ComponentType::constructible::<Position>())
            .unwrap();

        let built = registry.construct(&ComponentType::of::<Position>()).unwrap();
        assert_eq!(downcast_ref::<Position>(built.as_ref()), Some(&Position::default()));

        let err = registry
            .construct(&ComponentType::of::<Opaque>())
            .err()
            .unwrap();
        assert!(matches!(err, EcsError::ComponentConstructionError { .. }));
    }

    #[test]
    #[should_panic(expected = "identity space exhausted")]
    fn test_sixty_fifth_type_panics() {
        macro_rules! many {
            ($($name:ident)*) => {
                $(struct $name; impl Component for $name {})*
                let mut registry = ComponentRegistry::new();
                $(registry.id_of_type::<$name>();)*
            };
        }
        many!(
            C0 C1 C2 C3 C4 C5 C6 C7 C8 C9 C10 C11 C12 C13 C14 C15
            C16 C17 C18 C19 C20 C21 C22 C23 C24 C25 C26 C27 C28 C29 C30 C31
            C32 C33 C34 C35 C36 C37 C38 C39 C40 C41 C42 C43 C44 C45 C46 C47
            C48 C49 C50 C51 C52 C53 C54 C55 C56 C57 C58 C59 C60 C61 C62 C63
            C64
        );
    }
}
