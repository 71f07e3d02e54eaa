//! Strongly-typed row identifiers.
//!
//! Every table uses an integer primary key. Each entity gets its own newtype
//! so a `FormId` can never be passed where a `UserId` is expected; all of them
//! convert into an untyped [`EntityRef`] for the generic cascade and scope
//! machinery.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::{EntityKind, EntityRef};

macro_rules! entity_id {
  ($name:ident => $kind:ident) => {
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
      Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl $name {
      pub fn get(self) -> i64 { self.0 }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
      }
    }

    impl From<$name> for EntityRef {
      fn from(id: $name) -> Self { EntityRef::new(EntityKind::$kind, id.0) }
    }
  };
}

entity_id!(EnvironmentId => Environment);
entity_id!(RoleId => Role);
entity_id!(PermissionId => Permission);
entity_id!(RolePermissionId => RolePermission);
entity_id!(UserId => User);
entity_id!(QuestionTypeId => QuestionType);
entity_id!(QuestionId => Question);
entity_id!(AnswerId => Answer);
entity_id!(FormId => Form);
entity_id!(FormQuestionId => FormQuestion);
entity_id!(FormAnswerId => FormAnswer);
entity_id!(FormSubmissionId => FormSubmission);
entity_id!(AnswerSubmittedId => AnswerSubmitted);
entity_id!(AttachmentId => Attachment);

impl EnvironmentId {
  /// The seeded administration environment.
  pub const ADMIN: EnvironmentId = EnvironmentId(1);
}

impl RoleId {
  /// The seeded administrator role. Immutable through every mutation path.
  pub const ROOT: RoleId = RoleId(1);
}
