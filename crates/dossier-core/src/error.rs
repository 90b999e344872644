use crate::entity::EntityId;
use thiserror::Error;

/// Errors surfaced by structural repository operations.
///
/// Lookup failures leave the repository unchanged; duplicate operations
/// are not errors and report through boolean results instead.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("entity not found: {0}")]
    NotFound(EntityId),

    #[error("no entity named '{0}'")]
    NameNotFound(String),

    #[error("cannot merge an entity into itself")]
    MergeSelf,
}
