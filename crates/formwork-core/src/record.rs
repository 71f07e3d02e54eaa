//! [`Record`]: a row of any entity table, as a closed set of variants.

use serde::{Deserialize, Serialize};

use crate::{
  access::{Environment, Permission, Role, RolePermission, User},
  authz::{OwnerKey, Ownable},
  form::{
    Answer, AnswerSubmitted, Attachment, Form, FormAnswer, FormQuestion,
    FormSubmission, Question, QuestionType,
  },
  graph::{EntityKind, EntityRef},
  lifecycle::Timestamps,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum Record {
  Environment(Environment),
  Role(Role),
  Permission(Permission),
  RolePermission(RolePermission),
  User(User),
  QuestionType(QuestionType),
  Question(Question),
  Answer(Answer),
  Form(Form),
  FormQuestion(FormQuestion),
  FormAnswer(FormAnswer),
  FormSubmission(FormSubmission),
  AnswerSubmitted(AnswerSubmitted),
  Attachment(Attachment),
}

/// Dispatch an expression over every variant, binding the inner row to `$r`.
macro_rules! each_variant {
  ($self:expr, $r:ident => $body:expr) => {
    match $self {
      Record::Environment($r) => $body,
      Record::Role($r) => $body,
      Record::Permission($r) => $body,
      Record::RolePermission($r) => $body,
      Record::User($r) => $body,
      Record::QuestionType($r) => $body,
      Record::Question($r) => $body,
      Record::Answer($r) => $body,
      Record::Form($r) => $body,
      Record::FormQuestion($r) => $body,
      Record::FormAnswer($r) => $body,
      Record::FormSubmission($r) => $body,
      Record::AnswerSubmitted($r) => $body,
      Record::Attachment($r) => $body,
    }
  };
}

impl Record {
  pub fn entity_ref(&self) -> EntityRef { each_variant!(self, r => r.id.into()) }

  pub fn kind(&self) -> EntityKind { self.entity_ref().kind }

  pub fn stamps(&self) -> &Timestamps { each_variant!(self, r => &r.stamps) }

  pub fn is_deleted(&self) -> bool { self.stamps().is_deleted() }
}

impl Ownable for Record {
  fn owner_key(&self) -> OwnerKey {
    match self {
      Record::Form(form) => form.owner_key(),
      Record::FormSubmission(sub) => sub.owner_key(),
      _ => OwnerKey::Unowned,
    }
  }
}
