//! The cascading soft-delete walk.
//!
//! [`soft_delete`] is generic over a [`CascadeTx`], a handle to an open
//! transaction that knows how to answer four primitive questions. The walk
//! itself (in-use checks, closure collection, top-down tombstoning) lives
//! here so every backend deletes the same rows in the same order.
//!
//! The caller owns the transaction: if `soft_delete` returns an error, no
//! tombstone it wrote may be committed.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::graph::{
  Edge, EntityKind, EntityRef, InUseRule, children, descendant_kinds, in_use_rules,
};

// ─── Stats ───────────────────────────────────────────────────────────────────

/// Rows tombstoned by one delete, keyed by table name.
///
/// The target's own table counts 1. Every table reachable below the target
/// is present, with `0` when nothing active was found there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DeletionStats(BTreeMap<&'static str, u64>);

impl DeletionStats {
  pub fn for_root(kind: EntityKind) -> Self {
    let mut counts = BTreeMap::new();
    counts.insert(kind.table(), 1);
    for child in descendant_kinds(kind) {
      counts.insert(child.table(), 0);
    }
    Self(counts)
  }

  /// Stats for a single physically removed row.
  pub fn single(kind: EntityKind) -> Self {
    Self(BTreeMap::from([(kind.table(), 1)]))
  }

  pub fn add(&mut self, kind: EntityKind, n: u64) {
    *self.0.entry(kind.table()).or_default() += n;
  }

  /// Count for `table`, or `0` when the table was not part of the cascade.
  pub fn get(&self, table: &str) -> u64 { self.0.get(table).copied().unwrap_or(0) }

  pub fn total(&self) -> u64 { self.0.values().sum() }

  pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
    self.0.iter().map(|(k, v)| (*k, *v))
  }
}

// ─── Transaction seam ────────────────────────────────────────────────────────

/// The primitive operations the walk needs from an open transaction.
///
/// All reads must observe writes made earlier through the same handle.
pub trait CascadeTx {
  type Error;

  /// Whether `target` exists and is not tombstoned.
  fn is_active(&self, target: EntityRef) -> Result<bool, Self::Error>;

  /// Number of active rows that block deleting `target` under `rule`.
  fn count_blockers(&self, target: EntityRef, rule: &InUseRule) -> Result<u64, Self::Error>;

  /// Ids of active `edge.child` rows owned by any of the `parent` rows `ids`.
  fn active_children(
    &self,
    parent: EntityKind,
    ids: &[i64],
    edge: &Edge,
  ) -> Result<Vec<i64>, Self::Error>;

  /// Tombstone the active rows among `ids`. Returns how many changed.
  fn tombstone(
    &self,
    kind: EntityKind,
    ids: &[i64],
    at: DateTime<Utc>,
  ) -> Result<u64, Self::Error>;
}

#[derive(Debug, Error)]
pub enum CascadeError<E> {
  #[error("{0} not found")]
  NotFound(EntityRef),

  #[error("{target} is in use by {count} active {blocker} row(s)")]
  InUse {
    target:  EntityRef,
    blocker: EntityKind,
    count:   u64,
  },

  #[error("storage error: {0}")]
  Storage(E),
}

// ─── Walk ────────────────────────────────────────────────────────────────────

/// Tombstone `target` and every active row it transitively owns.
///
/// Rows already tombstoned are neither counted nor descended through, so a
/// second delete of the same target reports [`CascadeError::NotFound`].
pub fn soft_delete<T: CascadeTx>(
  tx: &T,
  target: EntityRef,
  at: DateTime<Utc>,
) -> Result<DeletionStats, CascadeError<T::Error>> {
  if !tx.is_active(target).map_err(CascadeError::Storage)? {
    return Err(CascadeError::NotFound(target));
  }

  for rule in in_use_rules(target.kind) {
    let count = tx.count_blockers(target, rule).map_err(CascadeError::Storage)?;
    if count > 0 {
      return Err(CascadeError::InUse { target, blocker: rule.blocker, count });
    }
  }

  let levels = collect_closure(tx, target).map_err(CascadeError::Storage)?;

  let mut stats = DeletionStats::for_root(target.kind);
  tx.tombstone(target.kind, &[target.id], at)
    .map_err(CascadeError::Storage)?;
  for level in &levels {
    for (kind, ids) in level {
      let n = tx.tombstone(*kind, ids, at).map_err(CascadeError::Storage)?;
      stats.add(*kind, n);
    }
  }

  tracing::debug!(%target, total = stats.total(), "cascade complete");
  Ok(stats)
}

type Level = BTreeMap<EntityKind, Vec<i64>>;

/// Breadth-first collection of the active closure below `root`, one map per
/// depth. Each row appears once, at the first depth it is reached.
fn collect_closure<T: CascadeTx>(tx: &T, root: EntityRef) -> Result<Vec<Level>, T::Error> {
  let mut seen: BTreeMap<EntityKind, BTreeSet<i64>> = BTreeMap::new();
  seen.entry(root.kind).or_default().insert(root.id);

  let mut frontier: Level = BTreeMap::from([(root.kind, vec![root.id])]);
  let mut levels = Vec::new();

  while !frontier.is_empty() {
    let mut next: Level = BTreeMap::new();
    for (kind, ids) in &frontier {
      for edge in children(*kind) {
        for child in tx.active_children(*kind, ids, edge)? {
          if seen.entry(edge.child).or_default().insert(child) {
            next.entry(edge.child).or_default().push(child);
          }
        }
      }
    }
    if !next.is_empty() {
      levels.push(next.clone());
    }
    frontier = next;
  }

  Ok(levels)
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, collections::BTreeMap};

  use super::*;
  use EntityKind::*;

  /// In-memory rows: column values are stored as strings so the username
  /// edge resolves the same way as integer foreign keys.
  #[derive(Default)]
  struct FakeTx {
    rows:       RefCell<BTreeMap<(EntityKind, i64), Row>>,
    fail_on:    Option<EntityKind>,
    tombstones: RefCell<Vec<EntityKind>>,
  }

  struct Row {
    cols:    BTreeMap<&'static str, String>,
    deleted: bool,
  }

  impl FakeTx {
    fn insert(&self, kind: EntityKind, id: i64, cols: &[(&'static str, &str)]) {
      let mut map: BTreeMap<_, _> =
        cols.iter().map(|(k, v)| (*k, (*v).to_owned())).collect();
      map.insert("id", id.to_string());
      self.rows.borrow_mut().insert((kind, id), Row { cols: map, deleted: false });
    }

    fn deleted(&self, kind: EntityKind, id: i64) -> bool {
      self.rows.borrow()[&(kind, id)].deleted
    }

    fn active_where(&self, kind: EntityKind, column: &str, value: &str) -> Vec<i64> {
      self
        .rows
        .borrow()
        .iter()
        .filter(|((k, _), row)| {
          *k == kind && !row.deleted && row.cols.get(column).map(String::as_str) == Some(value)
        })
        .map(|((_, id), _)| *id)
        .collect()
    }
  }

  impl CascadeTx for FakeTx {
    type Error = String;

    fn is_active(&self, target: EntityRef) -> Result<bool, String> {
      Ok(
        self
          .rows
          .borrow()
          .get(&(target.kind, target.id))
          .is_some_and(|r| !r.deleted),
      )
    }

    fn count_blockers(&self, target: EntityRef, rule: &InUseRule) -> Result<u64, String> {
      let ids = self.active_where(rule.blocker, rule.column, &target.id.to_string());
      let rows = self.rows.borrow();
      let count = ids
        .into_iter()
        .filter(|id| match rule.through {
          None => true,
          Some(through) => {
            let fk: i64 = rows[&(rule.blocker, *id)].cols[through.column]
              .parse()
              .unwrap();
            rows.get(&(through.kind, fk)).is_some_and(|r| !r.deleted)
          }
        })
        .count();
      Ok(count as u64)
    }

    fn active_children(
      &self,
      parent: EntityKind,
      ids: &[i64],
      edge: &Edge,
    ) -> Result<Vec<i64>, String> {
      let keys: Vec<String> = {
        let rows = self.rows.borrow();
        ids
          .iter()
          .map(|id| rows[&(parent, *id)].cols[edge.parent_column].clone())
          .collect()
      };
      Ok(
        keys
          .iter()
          .flat_map(|key| self.active_where(edge.child, edge.child_column, key))
          .collect(),
      )
    }

    fn tombstone(
      &self,
      kind: EntityKind,
      ids: &[i64],
      _at: DateTime<Utc>,
    ) -> Result<u64, String> {
      if self.fail_on == Some(kind) {
        return Err(format!("write to {kind} failed"));
      }
      self.tombstones.borrow_mut().push(kind);
      let mut rows = self.rows.borrow_mut();
      let mut n = 0;
      for id in ids {
        if let Some(row) = rows.get_mut(&(kind, *id))
          && !row.deleted
        {
          row.deleted = true;
          n += 1;
        }
      }
      Ok(n)
    }
  }

  /// One form with two questions, one candidate answer, one submission that
  /// picked it, and no attachments.
  fn form_fixture() -> FakeTx {
    let tx = FakeTx::default();
    tx.insert(User, 1, &[("username", "author"), ("environment_id", "1")]);
    tx.insert(Form, 1, &[("user_id", "1")]);
    tx.insert(Question, 1, &[]);
    tx.insert(Question, 2, &[]);
    tx.insert(Answer, 1, &[]);
    tx.insert(FormQuestion, 1, &[("form_id", "1"), ("question_id", "1")]);
    tx.insert(FormQuestion, 2, &[("form_id", "1"), ("question_id", "2")]);
    tx.insert(FormAnswer, 1, &[("form_question_id", "1"), ("answer_id", "1")]);
    tx.insert(FormSubmission, 1, &[("form_id", "1"), ("submitted_by", "author")]);
    tx.insert(AnswerSubmitted, 1, &[
      ("form_answer_id", "1"),
      ("form_submission_id", "1"),
    ]);
    tx
  }

  #[test]
  fn form_delete_reports_every_descendant_table() {
    let tx = form_fixture();
    let stats = soft_delete(&tx, EntityRef::new(Form, 1), Utc::now()).unwrap();

    assert_eq!(stats.get("forms"), 1);
    assert_eq!(stats.get("form_questions"), 2);
    assert_eq!(stats.get("form_answers"), 1);
    assert_eq!(stats.get("form_submissions"), 1);
    assert_eq!(stats.get("answers_submitted"), 1);
    assert_eq!(stats.get("attachments"), 0);
    assert_eq!(stats.iter().count(), 6);

    assert!(!tx.deleted(Question, 1));
    assert!(!tx.deleted(Answer, 1));
    assert!(tx.deleted(AnswerSubmitted, 1));
  }

  #[test]
  fn root_is_tombstoned_before_descendants() {
    let tx = form_fixture();
    soft_delete(&tx, EntityRef::new(Form, 1), Utc::now()).unwrap();
    let order = tx.tombstones.borrow();
    assert_eq!(order[0], Form);
    let pos = |k| order.iter().position(|x| *x == k).unwrap();
    assert!(pos(FormQuestion) < pos(FormAnswer));
    assert!(pos(FormSubmission) < pos(AnswerSubmitted));
  }

  #[test]
  fn second_delete_is_not_found() {
    let tx = form_fixture();
    let target = EntityRef::new(Form, 1);
    soft_delete(&tx, target, Utc::now()).unwrap();
    assert!(matches!(
      soft_delete(&tx, target, Utc::now()),
      Err(CascadeError::NotFound(t)) if t == target
    ));
  }

  #[test]
  fn tombstoned_children_are_skipped() {
    let tx = form_fixture();
    soft_delete(&tx, EntityRef::new(FormQuestion, 2), Utc::now()).unwrap();
    let stats = soft_delete(&tx, EntityRef::new(Form, 1), Utc::now()).unwrap();
    assert_eq!(stats.get("form_questions"), 1);
  }

  #[test]
  fn in_use_target_is_refused_untouched() {
    let tx = form_fixture();
    let target = EntityRef::new(Question, 1);
    match soft_delete(&tx, target, Utc::now()) {
      Err(CascadeError::InUse { blocker, count, .. }) => {
        assert_eq!(blocker, FormQuestion);
        assert_eq!(count, 1);
      }
      other => panic!("expected in-use, got {other:?}"),
    }
    assert!(!tx.deleted(Question, 1));
    assert!(tx.tombstones.borrow().is_empty());
  }

  #[test]
  fn user_cascade_follows_the_username_edge() {
    let tx = form_fixture();
    tx.insert(Form, 2, &[("user_id", "2")]);
    tx.insert(User, 2, &[("username", "tech01"), ("environment_id", "1")]);
    tx.insert(FormSubmission, 2, &[("form_id", "2"), ("submitted_by", "author")]);

    let stats = soft_delete(&tx, EntityRef::new(User, 1), Utc::now()).unwrap();
    assert_eq!(stats.get("forms"), 1);
    // Submission 1 is reached through the form and through the username;
    // it is counted once.
    assert_eq!(stats.get("form_submissions"), 2);
    assert!(!tx.deleted(Form, 2));
    assert!(tx.deleted(FormSubmission, 2));
  }

  #[test]
  fn storage_errors_surface() {
    let mut tx = form_fixture();
    tx.fail_on = Some(AnswerSubmitted);
    assert!(matches!(
      soft_delete(&tx, EntityRef::new(Form, 1), Utc::now()),
      Err(CascadeError::Storage(_))
    ));
  }

  #[test]
  fn permission_blocked_only_by_active_roles() {
    let tx = FakeTx::default();
    tx.insert(Role, 2, &[]);
    tx.insert(Permission, 1, &[]);
    tx.insert(RolePermission, 1, &[("role_id", "2"), ("permission_id", "1")]);

    assert!(matches!(
      soft_delete(&tx, EntityRef::new(Permission, 1), Utc::now()),
      Err(CascadeError::InUse { blocker: RolePermission, count: 1, .. })
    ));

    tx.rows.borrow_mut().get_mut(&(Role, 2)).unwrap().deleted = true;
    let stats = soft_delete(&tx, EntityRef::new(Permission, 1), Utc::now()).unwrap();
    assert_eq!(stats.get("role_permissions"), 1);
  }
}
