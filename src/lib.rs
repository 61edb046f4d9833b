pub mod config;
pub mod ecs;
pub mod error;
pub mod pool;
pub mod scheduler;

pub use config::{LoggingConfig, PoolConfig, WorldConfig};
pub use ecs::{
    Component, ComponentType, Disposable, Entity, EntityId, EntityRef, Lifecycle, Manager,
    Signature, World,
};
pub use error::{EcsError, EcsResult};
pub use pool::{EntityPool, PoolManager};
pub use scheduler::{
    FrameReport, MatchedBatch, MatchedEntity, Schedule, System, SystemId, SystemRunReport,
    SystemSetup,
};
