//! Error types shared by every entry point of the runtime

use thiserror::Error;

use crate::ecs::EntityId;

pub type EcsResult<T> = Result<T, EcsError>;

#[derive(Debug, Error)]
pub enum EcsError {
    /// Operation invoked before `initialize()` or after `dispose()`
    #[error("{target} is not initialized")]
    NotInitialized { target: &'static str },

    #[error("{target} has already been initialized")]
    AlreadyInitialized { target: &'static str },

    #[error("entity {0} is not registered")]
    EntityNotFound(EntityId),

    #[error("entity with alias '{0}' is not registered")]
    AliasNotFound(String),

    #[error("{kind} '{name}' is not registered")]
    NotFound { kind: &'static str, name: String },

    #[error("alias '{alias}' is already bound to entity {existing}")]
    DuplicateAlias { alias: String, existing: EntityId },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to construct component '{component}': {reason}")]
    ComponentConstructionError {
        component: String,
        reason: &'static str,
    },

    #[error("system '{system}' failed")]
    SystemFailed {
        system: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("manager '{manager}' failed")]
    ManagerFailed {
        manager: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl EcsError {
    /// True for every lookup miss, whichever key was used
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EcsError::EntityNotFound(_) | EcsError::AliasNotFound(_) | EcsError::NotFound { .. }
        )
    }

    pub(crate) fn system_failed(system: &str, err: anyhow::Error) -> Self {
        EcsError::SystemFailed {
            system: system.to_string(),
            source: err.into(),
        }
    }
}
