//! Row timestamps and soft-delete status.
//!
//! Rows are never physically removed by the cascade engine. A tombstoned row
//! keeps its data and gains a `deleted_at` timestamp; `is_deleted` is derived
//! from it so the two can never disagree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bookkeeping columns shared by every entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub deleted_at: Option<DateTime<Utc>>,
}

impl Timestamps {
  /// Fresh timestamps for a row created at `at`.
  pub fn created(at: DateTime<Utc>) -> Self {
    Self { created_at: at, updated_at: at, deleted_at: None }
  }

  pub fn is_deleted(&self) -> bool { self.deleted_at.is_some() }

  pub fn status(&self) -> RecordStatus {
    match self.deleted_at {
      Some(at) => RecordStatus::Deleted { at },
      None => RecordStatus::Active,
    }
  }
}

/// The soft-delete status of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordStatus {
  Active,
  Deleted { at: DateTime<Utc> },
}

impl RecordStatus {
  pub fn is_active(&self) -> bool { matches!(self, Self::Active) }
}
