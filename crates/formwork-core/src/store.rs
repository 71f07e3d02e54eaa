//! The `FormStore` trait.
//!
//! Implemented by storage backends (e.g. `formwork-store-sqlite`). The
//! [`Service`](crate::service::Service) layer depends on this abstraction and
//! performs every authorization check before calling into it; the store
//! itself trusts its caller.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  access::{
    Environment, EnvironmentPatch, NewEnvironment, NewPermission, NewRole, NewUser,
    Permission, PermissionPatch, Role, RolePatch, RolePermission, User, UserPatch,
  },
  authz::Principal,
  cascade::DeletionStats,
  form::{
    Answer, Attachment, Form, FormAnswer, FormPatch, FormQuestion, FormSubmission,
    NewAnswer, NewAttachment, NewForm, NewFormAnswer, NewFormQuestion, NewQuestion,
    NewQuestionType, NewSubmission, Question, QuestionPatch, QuestionType,
  },
  graph::EntityRef,
  id::{
    EnvironmentId, FormId, FormQuestionId, FormSubmissionId, PermissionId, QuestionId,
    RoleId, UserId,
  },
  record::Record,
};

/// What [`FormStore::bootstrap`] created. Rows that already existed are not
/// counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SeedReport {
  pub environments:   u64,
  pub roles:          u64,
  pub permissions:    u64,
  pub question_types: u64,
}

/// Abstraction over a Formwork storage backend.
///
/// Reads skip tombstoned rows unless stated otherwise. Every write that
/// touches more than one row runs in a single transaction.
pub trait FormStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Seed ──────────────────────────────────────────────────────────────

  /// Idempotently seed the administration environment, the built-in roles
  /// (the root role with id 1), the permission catalogue and the default
  /// question types.
  fn bootstrap(&self) -> impl Future<Output = Result<SeedReport, Self::Error>> + Send + '_;

  // ── Access ────────────────────────────────────────────────────────────

  fn create_environment(
    &self,
    input: NewEnvironment,
  ) -> impl Future<Output = Result<Environment, Self::Error>> + Send + '_;

  fn update_environment(
    &self,
    id: EnvironmentId,
    patch: EnvironmentPatch,
  ) -> impl Future<Output = Result<Environment, Self::Error>> + Send + '_;

  fn create_role(
    &self,
    input: NewRole,
  ) -> impl Future<Output = Result<Role, Self::Error>> + Send + '_;

  fn update_role(
    &self,
    id: RoleId,
    patch: RolePatch,
  ) -> impl Future<Output = Result<Role, Self::Error>> + Send + '_;

  fn create_permission(
    &self,
    input: NewPermission,
  ) -> impl Future<Output = Result<Permission, Self::Error>> + Send + '_;

  fn update_permission(
    &self,
    id: PermissionId,
    patch: PermissionPatch,
  ) -> impl Future<Output = Result<Permission, Self::Error>> + Send + '_;

  /// Grant `permission` to `role`. Fails with a conflict if an active grant
  /// for the pair already exists.
  fn assign_permission(
    &self,
    role: RoleId,
    permission: PermissionId,
  ) -> impl Future<Output = Result<RolePermission, Self::Error>> + Send + '_;

  /// The active grant of `permission` to `role`, if any.
  fn find_role_permission(
    &self,
    role: RoleId,
    permission: PermissionId,
  ) -> impl Future<Output = Result<Option<RolePermission>, Self::Error>> + Send + '_;

  /// Active permissions granted to `role` through active grants.
  fn role_permissions(
    &self,
    role: RoleId,
  ) -> impl Future<Output = Result<Vec<Permission>, Self::Error>> + Send + '_;

  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn update_user(
    &self,
    id: UserId,
    patch: UserPatch,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Active user by username.
  fn find_user<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  /// Resolve the principal for `username`. `None` unless both the user and
  /// their role are active.
  fn principal<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<Principal>, Self::Error>> + Send + 'a;

  fn users_in_environment(
    &self,
    environment: EnvironmentId,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  // ── Forms ─────────────────────────────────────────────────────────────

  fn create_question_type(
    &self,
    input: NewQuestionType,
  ) -> impl Future<Output = Result<QuestionType, Self::Error>> + Send + '_;

  fn create_question(
    &self,
    input: NewQuestion,
  ) -> impl Future<Output = Result<Question, Self::Error>> + Send + '_;

  /// Apply `patch`. A question referenced by an active form question only
  /// accepts remark changes; anything else is refused as in use.
  fn update_question(
    &self,
    id: QuestionId,
    patch: QuestionPatch,
  ) -> impl Future<Output = Result<Question, Self::Error>> + Send + '_;

  fn create_answer(
    &self,
    input: NewAnswer,
  ) -> impl Future<Output = Result<Answer, Self::Error>> + Send + '_;

  fn create_form(
    &self,
    input: NewForm,
  ) -> impl Future<Output = Result<Form, Self::Error>> + Send + '_;

  fn update_form(
    &self,
    id: FormId,
    patch: FormPatch,
  ) -> impl Future<Output = Result<Form, Self::Error>> + Send + '_;

  fn add_form_question(
    &self,
    input: NewFormQuestion,
  ) -> impl Future<Output = Result<FormQuestion, Self::Error>> + Send + '_;

  /// Set the order number of each listed form question. Every id must be an
  /// active question of `form`.
  fn reorder_form_questions(
    &self,
    form: FormId,
    order: Vec<(FormQuestionId, i64)>,
  ) -> impl Future<Output = Result<Vec<FormQuestion>, Self::Error>> + Send + '_;

  fn add_form_answer(
    &self,
    input: NewFormAnswer,
  ) -> impl Future<Output = Result<FormAnswer, Self::Error>> + Send + '_;

  /// Record a submission, its chosen answers and its attachments together.
  fn submit_form(
    &self,
    input: NewSubmission,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<FormSubmission, Self::Error>> + Send + '_;

  fn add_attachment(
    &self,
    submission: FormSubmissionId,
    input: NewAttachment,
  ) -> impl Future<Output = Result<Attachment, Self::Error>> + Send + '_;

  fn forms_in_environment(
    &self,
    environment: EnvironmentId,
  ) -> impl Future<Output = Result<Vec<Form>, Self::Error>> + Send + '_;

  // ── Generic ───────────────────────────────────────────────────────────

  /// Point lookup of any row.
  fn get(
    &self,
    target: EntityRef,
    include_deleted: bool,
  ) -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send + '_;

  /// The environment that scopes `target`, resolved up the ownership chain.
  /// `None` for global kinds, and for rows whose chain is broken.
  fn environment_of(
    &self,
    target: EntityRef,
  ) -> impl Future<Output = Result<Option<EnvironmentId>, Self::Error>> + Send + '_;

  /// Tombstone `target` and everything it owns, atomically.
  fn soft_delete(
    &self,
    target: EntityRef,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<DeletionStats, Self::Error>> + Send + '_;

  /// Physically remove a single row. No cascade.
  fn hard_delete(
    &self,
    target: EntityRef,
  ) -> impl Future<Output = Result<DeletionStats, Self::Error>> + Send + '_;

  /// Clear the tombstone on `target` only. `None` when the row is absent or
  /// not deleted.
  fn restore(
    &self,
    target: EntityRef,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send + '_;
}
