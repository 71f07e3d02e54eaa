//! Error types for `formwork-core`.

use thiserror::Error;

use crate::{
  authz::Denial,
  graph::{EntityKind, EntityRef},
};

#[derive(Debug, Error)]
pub enum Error {
  /// The row does not exist or has been soft-deleted.
  #[error("{0} not found")]
  NotFound(EntityRef),

  /// A blocking reference from outside the ownership chain.
  #[error("{target} is in use by {count} active {blocker} row(s)")]
  EntityInUse {
    target:  EntityRef,
    blocker: EntityKind,
    count:   u64,
  },

  #[error("forbidden: {0}")]
  Forbidden(Denial),

  #[error("principal not found: {0:?}")]
  PrincipalNotFound(String),

  /// A uniqueness constraint was violated.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("the root administrator role cannot be modified")]
  RootRoleImmutable,

  #[error("invalid input: {0}")]
  Validation(String),

  /// Storage failure; the surrounding transaction was rolled back.
  #[error("transaction rolled back: {0}")]
  Transaction(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Shorthand for building an [`Error::Validation`].
pub(crate) fn invalid(msg: impl Into<String>) -> Error {
  Error::Validation(msg.into())
}
