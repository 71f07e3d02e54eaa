//! SQL side of the lifecycle operations: [`SqlCascade`] answers the cascade
//! walk's primitive queries, and the free functions here run soft delete,
//! hard delete, restore and scope resolution against one connection.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, params, params_from_iter, types::Value};
use tracing::error;

use formwork_core::{
  Error as CoreError,
  cascade::{self, CascadeError, CascadeTx, DeletionStats},
  graph::{Edge, EntityKind, EntityRef, InUseRule, scope_path},
  id::EnvironmentId,
  record::Record,
};

use crate::{Error, Result, encode};

/// SQLite caps bound parameters per statement; IN-lists are split to stay
/// well below it.
const CHUNK: usize = 500;

pub(crate) fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

// ─── Primitive queries ───────────────────────────────────────────────────────

pub struct SqlCascade<'c> {
  conn: &'c Connection,
}

impl CascadeTx for SqlCascade<'_> {
  type Error = rusqlite::Error;

  fn is_active(&self, target: EntityRef) -> rusqlite::Result<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?1 AND is_deleted = 0", target.kind.table());
    Ok(
      self
        .conn
        .query_row(&sql, [target.id], |_| Ok(()))
        .optional()?
        .is_some(),
    )
  }

  fn count_blockers(&self, target: EntityRef, rule: &InUseRule) -> rusqlite::Result<u64> {
    let sql = match rule.through {
      None => format!(
        "SELECT COUNT(*) FROM {b} WHERE {col} = ?1 AND is_deleted = 0",
        b = rule.blocker.table(),
        col = rule.column,
      ),
      Some(through) => format!(
        "SELECT COUNT(*) FROM {b} x JOIN {t} t ON x.{tcol} = t.id
         WHERE x.{col} = ?1 AND x.is_deleted = 0 AND t.is_deleted = 0",
        b = rule.blocker.table(),
        t = through.kind.table(),
        tcol = through.column,
        col = rule.column,
      ),
    };
    let count: i64 = self.conn.query_row(&sql, [target.id], |r| r.get(0))?;
    Ok(count as u64)
  }

  fn active_children(
    &self,
    parent: EntityKind,
    ids: &[i64],
    edge: &Edge,
  ) -> rusqlite::Result<Vec<i64>> {
    let mut out = Vec::new();
    for chunk in ids.chunks(CHUNK) {
      let sql = format!(
        "SELECT c.id FROM {child} c JOIN {parent} p ON c.{ccol} = p.{pcol}
         WHERE p.id IN ({list}) AND c.is_deleted = 0
         ORDER BY c.id",
        child = edge.child.table(),
        parent = parent.table(),
        ccol = edge.child_column,
        pcol = edge.parent_column,
        list = placeholders(chunk.len()),
      );
      let mut stmt = self.conn.prepare(&sql)?;
      let rows = stmt.query_map(params_from_iter(chunk), |r| r.get::<_, i64>(0))?;
      for id in rows {
        out.push(id?);
      }
    }
    Ok(out)
  }

  fn tombstone(
    &self,
    kind: EntityKind,
    ids: &[i64],
    at: DateTime<Utc>,
  ) -> rusqlite::Result<u64> {
    let at = encode::encode_dt(at);
    let mut changed = 0;
    for chunk in ids.chunks(CHUNK) {
      let sql = format!(
        "UPDATE {t} SET is_deleted = 1, deleted_at = ?, updated_at = ?
         WHERE is_deleted = 0 AND id IN ({list})",
        t = kind.table(),
        list = placeholders(chunk.len()),
      );
      let values = [Value::Text(at.clone()), Value::Text(at.clone())]
        .into_iter()
        .chain(chunk.iter().map(|id| Value::Integer(*id)));
      changed += self.conn.execute(&sql, params_from_iter(values))? as u64;
    }
    Ok(changed)
  }
}

// ─── Lifecycle operations ────────────────────────────────────────────────────

/// Run the cascade inside a savepoint. Any error drops the savepoint, which
/// rolls every tombstone back.
pub fn soft_delete(
  conn: &mut Connection,
  target: EntityRef,
  at: DateTime<Utc>,
) -> Result<DeletionStats> {
  let sp = conn.savepoint()?;
  let stats = cascade::soft_delete(&SqlCascade { conn: &sp }, target, at).map_err(|e| {
    match e {
      CascadeError::NotFound(t) => Error::Core(CoreError::NotFound(t)),
      CascadeError::InUse { target, blocker, count } => {
        Error::Core(CoreError::EntityInUse { target, blocker, count })
      }
      CascadeError::Storage(e) => {
        error!(%target, error = %e, "cascade rolled back");
        Error::from(e)
      }
    }
  })?;
  sp.commit()?;
  Ok(stats)
}

/// Physically remove one row, tombstoned or not.
pub fn hard_delete(conn: &Connection, target: EntityRef) -> Result<DeletionStats> {
  let sql = format!("DELETE FROM {} WHERE id = ?1", target.kind.table());
  match conn.execute(&sql, [target.id])? {
    0 => Err(Error::Core(CoreError::NotFound(target))),
    _ => Ok(DeletionStats::single(target.kind)),
  }
}

/// Clear the tombstone on one row. Children stay deleted.
pub fn restore(conn: &Connection, target: EntityRef, at: DateTime<Utc>) -> Result<Option<Record>> {
  let sql = format!(
    "UPDATE {} SET is_deleted = 0, deleted_at = NULL, updated_at = ?2
     WHERE id = ?1 AND is_deleted = 1",
    target.kind.table()
  );
  if conn.execute(&sql, params![target.id, encode::encode_dt(at)])? == 0 {
    return Ok(None);
  }
  fetch(conn, target, false)
}

pub fn fetch(conn: &Connection, target: EntityRef, include_deleted: bool) -> Result<Option<Record>> {
  let filter = if include_deleted { "" } else { " AND is_deleted = 0" };
  let sql = format!("SELECT * FROM {} WHERE id = ?1{filter}", target.kind.table());
  Ok(
    conn
      .query_row(&sql, [target.id], |row| encode::record(target.kind, row))
      .optional()?,
  )
}

/// Follow the kind's scope path up to its environment. Tombstones are
/// ignored so deleted rows can still be authorized for restore.
pub fn environment_of(conn: &Connection, target: EntityRef) -> Result<Option<EnvironmentId>> {
  let Some(path) = scope_path(target.kind) else {
    return Ok(None);
  };

  let sql = match path.split_last() {
    None => format!("SELECT t0.id FROM {} t0 WHERE t0.id = ?1", target.kind.table()),
    Some((last, joins)) => {
      let mut sql = String::new();
      let mut from = format!("{} t0", target.kind.table());
      for (i, hop) in joins.iter().enumerate() {
        from.push_str(&format!(
          " JOIN {table} t{next} ON t{i}.{col} = t{next}.id",
          table = hop.parent.table(),
          next = i + 1,
          col = hop.column,
        ));
      }
      sql.push_str(&format!(
        "SELECT t{n}.{col} FROM {from} WHERE t0.id = ?1",
        n = joins.len(),
        col = last.column,
      ));
      sql
    }
  };

  let id: Option<i64> = conn.query_row(&sql, [target.id], |r| r.get(0)).optional()?;
  Ok(id.map(EnvironmentId))
}
