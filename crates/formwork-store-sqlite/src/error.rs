//! Error type for `formwork-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] formwork_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<rusqlite::Error> for Error {
  /// Uniqueness violations are an expected outcome and become
  /// [`formwork_core::Error::Conflict`]; everything else is a database error.
  fn from(err: rusqlite::Error) -> Self {
    if is_unique_violation(&err) {
      return Self::Core(formwork_core::Error::Conflict(err.to_string()));
    }
    Self::Database(tokio_rusqlite::Error::Rusqlite(err))
  }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _)
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}

impl From<Error> for formwork_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::Core(e) => e,
      Error::Database(tokio_rusqlite::Error::Rusqlite(e)) if is_unique_violation(&e) => {
        Self::Conflict(e.to_string())
      }
      other => Self::Transaction(other.to_string()),
    }
  }
}
