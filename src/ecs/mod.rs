//! Entity Component System (ECS) implementation
//!
//! Entities are bags of typed components identified by a bit-mask signature;
//! systems declare a required signature and are fed the entities carrying
//! it.

pub mod component;
pub mod directory;
pub mod entity;
pub mod manager;
pub mod signature;
pub mod world;

pub use component::{
    AsAny, Component, ComponentFactory, ComponentRegistry, ComponentType, Disposable,
    MAX_COMPONENT_TYPES,
};
pub use directory::EntityDirectory;
pub use entity::{Entity, EntityId, EntityRef, IdAllocator};
pub use manager::Manager;
pub use signature::Signature;
pub use world::{Lifecycle, World};
