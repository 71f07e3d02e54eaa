//! The declarative ownership graph.
//!
//! Every cascade, in-use check and environment-scope lookup is driven from
//! the tables in this module rather than from per-entity code. Backends only
//! need to know how to turn an [`Edge`], an [`InUseRule`] or a [`Hop`] path
//! into a query.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};

// ─── Entity kinds ────────────────────────────────────────────────────────────

/// Every persisted entity type.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
  Environment,
  Role,
  Permission,
  RolePermission,
  User,
  QuestionType,
  Question,
  Answer,
  Form,
  FormQuestion,
  FormAnswer,
  FormSubmission,
  AnswerSubmitted,
  Attachment,
}

impl EntityKind {
  /// Backing table name. Also the key used in [`DeletionStats`](crate::cascade::DeletionStats).
  pub const fn table(self) -> &'static str {
    match self {
      Self::Environment => "environments",
      Self::Role => "roles",
      Self::Permission => "permissions",
      Self::RolePermission => "role_permissions",
      Self::User => "users",
      Self::QuestionType => "question_types",
      Self::Question => "questions",
      Self::Answer => "answers",
      Self::Form => "forms",
      Self::FormQuestion => "form_questions",
      Self::FormAnswer => "form_answers",
      Self::FormSubmission => "form_submissions",
      Self::AnswerSubmitted => "answers_submitted",
      Self::Attachment => "attachments",
    }
  }

  pub fn name(self) -> &'static str { self.into() }
}

impl fmt::Display for EntityKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// An untyped pointer at one row of one entity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
  pub kind: EntityKind,
  pub id:   i64,
}

impl EntityRef {
  pub const fn new(kind: EntityKind, id: i64) -> Self { Self { kind, id } }
}

impl fmt::Display for EntityRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.kind, self.id)
  }
}

// ─── Ownership edges ─────────────────────────────────────────────────────────

/// A parent → child ownership link: a child row belongs to a parent row when
/// `child.child_column = parent.parent_column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
  pub child:         EntityKind,
  pub child_column:  &'static str,
  pub parent_column: &'static str,
}

const fn owned(child: EntityKind, child_column: &'static str) -> Edge {
  Edge { child, child_column, parent_column: "id" }
}

/// The children owned by `kind`. Deleting a `kind` row tombstones every
/// active row reachable through these edges.
pub const fn children(kind: EntityKind) -> &'static [Edge] {
  use EntityKind::*;
  match kind {
    Environment => const { &[owned(User, "environment_id")] },
    Role => const { &[owned(RolePermission, "role_id")] },
    Permission => const { &[owned(RolePermission, "permission_id")] },
    User => const {
      &[
        owned(Form, "user_id"),
        Edge {
          child:         FormSubmission,
          child_column:  "submitted_by",
          parent_column: "username",
        },
      ]
    },
    QuestionType => const { &[owned(Question, "question_type_id")] },
    Question => const { &[owned(FormQuestion, "question_id")] },
    Answer => const { &[owned(FormAnswer, "answer_id")] },
    Form => const { &[owned(FormQuestion, "form_id"), owned(FormSubmission, "form_id")] },
    FormQuestion => const { &[owned(FormAnswer, "form_question_id")] },
    FormAnswer => const { &[owned(AnswerSubmitted, "form_answer_id")] },
    FormSubmission => const {
      &[
        owned(Attachment, "form_submission_id"),
        owned(AnswerSubmitted, "form_submission_id"),
      ]
    },
    RolePermission | AnswerSubmitted | Attachment => &[],
  }
}

/// Every kind reachable below `kind`, in breadth-first order, each listed
/// once. `kind` itself is not included.
pub fn descendant_kinds(kind: EntityKind) -> Vec<EntityKind> {
  let mut seen = vec![kind];
  let mut out = Vec::new();
  let mut cursor = 0;
  let mut frontier = vec![kind];
  while cursor < frontier.len() {
    let parent = frontier[cursor];
    cursor += 1;
    for edge in children(parent) {
      if !seen.contains(&edge.child) {
        seen.push(edge.child);
        out.push(edge.child);
        frontier.push(edge.child);
      }
    }
  }
  out
}

// ─── In-use rules ────────────────────────────────────────────────────────────

/// A blocking reference from outside the ownership chain.
///
/// The target is in use while at least one active `blocker` row has
/// `blocker.column = target.id`. When `through` is set, the blocker only
/// counts if the row it points at via `through.column` is active as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InUseRule {
  pub blocker: EntityKind,
  pub column:  &'static str,
  pub through: Option<Through>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Through {
  pub kind:   EntityKind,
  pub column: &'static str,
}

const fn used_by(blocker: EntityKind, column: &'static str) -> InUseRule {
  InUseRule { blocker, column, through: None }
}

pub const fn in_use_rules(kind: EntityKind) -> &'static [InUseRule] {
  use EntityKind::*;
  match kind {
    Role => const { &[used_by(User, "role_id")] },
    Permission => const {
      &[InUseRule {
        blocker: RolePermission,
        column:  "permission_id",
        through: Some(Through { kind: Role, column: "role_id" }),
      }]
    },
    QuestionType => const { &[used_by(Question, "question_type_id")] },
    Question => const { &[used_by(FormQuestion, "question_id")] },
    Answer => const { &[used_by(FormAnswer, "answer_id")] },
    FormAnswer => const { &[used_by(AnswerSubmitted, "form_answer_id")] },
    _ => &[],
  }
}

// ─── Environment scope ───────────────────────────────────────────────────────

/// One step up the ownership chain: follow `column` to a row of `parent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hop {
  pub column: &'static str,
  pub parent: EntityKind,
}

const fn hop(column: &'static str, parent: EntityKind) -> Hop {
  Hop { column, parent }
}

/// Path from a row of `kind` up to the environment that scopes it.
///
/// `None` means the kind is global (roles, permissions, the shared question
/// and answer pools). An empty path means the row *is* the environment.
pub const fn scope_path(kind: EntityKind) -> Option<&'static [Hop]> {
  use EntityKind::*;
  match kind {
    Environment => Some(&[]),
    User => Some(const { &[hop("environment_id", Environment)] }),
    Form => Some(const { &[hop("user_id", User), hop("environment_id", Environment)] }),
    FormQuestion | FormSubmission => Some(const {
      &[
        hop("form_id", Form),
        hop("user_id", User),
        hop("environment_id", Environment),
      ]
    }),
    FormAnswer => Some(const {
      &[
        hop("form_question_id", FormQuestion),
        hop("form_id", Form),
        hop("user_id", User),
        hop("environment_id", Environment),
      ]
    }),
    AnswerSubmitted | Attachment => Some(const {
      &[
        hop("form_submission_id", FormSubmission),
        hop("form_id", Form),
        hop("user_id", User),
        hop("environment_id", Environment),
      ]
    }),
    Role | Permission | RolePermission | QuestionType | Question | Answer => None,
  }
}

// ─── Delete policy ───────────────────────────────────────────────────────────

/// How a direct delete request for a kind is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
  /// Tombstone through the cascade engine.
  Soft,
  /// Physically remove the single row. No cascade.
  Hard,
}

pub const fn delete_policy(kind: EntityKind) -> DeletePolicy {
  match kind {
    EntityKind::RolePermission | EntityKind::AnswerSubmitted => DeletePolicy::Hard,
    _ => DeletePolicy::Soft,
  }
}
