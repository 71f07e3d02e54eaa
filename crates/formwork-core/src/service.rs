//! [`Service`]: guarded operations over a [`FormStore`].
//!
//! Every public method takes the acting username, resolves it to a
//! [`Principal`] and runs the guards in a fixed order before touching the
//! store: root-role protection, then permission, then environment scope.
//! Denials are logged and returned as [`Error::Forbidden`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::{
  Error, Result,
  access::{
    Environment, EnvironmentPatch, NewEnvironment, NewPermission, NewRole, NewUser,
    Permission, PermissionPatch, Role, RolePatch, RolePermission, User, UserPatch,
  },
  authz::{
    AccessRequest, Action, Denial, Principal, Resource, authorize,
    check_environment_access, check_resource_ownership, effective_permissions,
    has_permission, require_role, roles,
  },
  cascade::DeletionStats,
  form::{
    Answer, Attachment, Form, FormAnswer, FormPatch, FormQuestion, FormSubmission,
    NewAnswer, NewAttachment, NewForm, NewFormAnswer, NewFormQuestion, NewQuestion,
    NewQuestionType, NewSubmission, Question, QuestionPatch, QuestionType,
  },
  graph::{DeletePolicy, EntityRef, delete_policy},
  id::{
    EnvironmentId, FormId, FormQuestionId, FormSubmissionId, PermissionId, QuestionId,
    RoleId, UserId,
  },
  record::Record,
  store::{FormStore, SeedReport},
};

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Tunables for business rules layered on top of the authorization model.
#[derive(Debug, Clone, Copy)]
pub struct ServicePolicy {
  /// How long after submission a submission may still be deleted by a
  /// non-super user.
  pub submission_delete_window: Duration,
}

impl Default for ServicePolicy {
  fn default() -> Self { Self { submission_delete_window: Duration::days(7) } }
}

/// The part of a submission a delete request removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionPart {
  Whole,
  Answer,
  Attachment { is_signature: bool },
}

impl SubmissionPart {
  fn resource(self) -> Resource {
    match self {
      Self::Whole | Self::Answer => Resource::Submissions,
      Self::Attachment { .. } => Resource::Attachments,
    }
  }

  fn noun(self) -> &'static str {
    match self {
      Self::Whole => "submissions",
      Self::Answer => "answers",
      Self::Attachment { .. } => "attachments",
    }
  }
}

/// Who may delete a submission or one of its parts, and until when.
///
/// Super users always may. Everyone else first passes the delete permission
/// for the part's resource in the submission's environment, falling back to
/// the `_own` variant when they submitted it. Holders of the plain
/// permission who did not submit it must be a Site Manager or Supervisor.
/// The submission must be at most `window` whole days old, and signature
/// attachments stay with super users.
pub fn check_submission_delete(
  principal: &Principal,
  part: SubmissionPart,
  submission: &FormSubmission,
  environment: Option<EnvironmentId>,
  now: DateTime<Utc>,
  window: Duration,
) -> Result<(), Denial> {
  if principal.is_super_user {
    return Ok(());
  }

  let resource = part.resource();
  let owns = check_resource_ownership(principal, submission);
  let request = AccessRequest::new(Action::Delete, resource).in_environment(environment);
  match authorize(principal, &request) {
    Ok(()) => {
      let manages = matches!(
        principal.role_name.as_str(),
        roles::SITE_MANAGER | roles::SUPERVISOR
      );
      if !owns && !manages {
        return Err(Denial::Ownership);
      }
    }
    Err(Denial::Permission { .. }) if owns => authorize(principal, &request.own())?,
    Err(Denial::Permission { .. }) if has_permission(principal, Action::Delete, resource, true) => {
      return Err(Denial::Ownership);
    }
    Err(denial) => return Err(denial),
  }
  if environment.is_none() {
    return Err(Denial::Environment);
  }

  if (now - submission.submitted_at).num_days() > window.num_days() {
    return Err(Denial::Policy {
      reason: format!(
        "{} can only be deleted within {} day(s) of submission",
        part.noun(),
        window.num_days()
      ),
    });
  }
  if let SubmissionPart::Attachment { is_signature: true } = part {
    return Err(Denial::Role { allowed: vec![roles::ADMIN.to_owned()] });
  }
  Ok(())
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct Service<S> {
  store:  S,
  policy: ServicePolicy,
}

impl<S> Service<S>
where
  S: FormStore,
  Error: From<S::Error>,
{
  pub fn new(store: S, policy: ServicePolicy) -> Self { Self { store, policy } }

  pub fn store(&self) -> &S { &self.store }

  pub fn policy(&self) -> &ServicePolicy { &self.policy }

  // ── Guards ────────────────────────────────────────────────────────────

  async fn resolve(&self, identity: &str) -> Result<Principal> {
    self
      .store
      .principal(identity)
      .await?
      .ok_or_else(|| Error::PrincipalNotFound(identity.to_owned()))
  }

  fn deny(principal: &Principal, denial: Denial) -> Error {
    warn!(user = %principal.username, role = %principal.role_name, %denial, "access denied");
    Error::Forbidden(denial)
  }

  fn guard(principal: &Principal, request: &AccessRequest) -> Result<()> {
    authorize(principal, request).map_err(|d| Self::deny(principal, d))
  }

  /// Admin-only operations skip the permission table entirely.
  fn guard_admin(principal: &Principal) -> Result<()> {
    require_role(principal, &[roles::ADMIN]).map_err(|d| Self::deny(principal, d))
  }

  /// Guard an action on an existing record. When the plain permission is
  /// missing and the principal owns the record, the `_own` variant is tried.
  async fn guard_record(
    &self,
    principal: &Principal,
    action: Action,
    record: &Record,
  ) -> Result<()> {
    let environment = self.store.environment_of(record.entity_ref()).await?;
    let request =
      AccessRequest::new(action, Resource::for_kind(record.kind())).in_environment(environment);
    let denial = match authorize(principal, &request) {
      Ok(()) => return Ok(()),
      Err(denial) => denial,
    };
    if matches!(denial, Denial::Permission { .. }) && self.owns(principal, record).await? {
      return Self::guard(principal, &request.own());
    }
    Err(Self::deny(principal, denial))
  }

  /// Ownership, following attachments up to their submission.
  async fn owns(&self, principal: &Principal, record: &Record) -> Result<bool> {
    if let Record::Attachment(att) = record {
      let parent = self.store.get(att.form_submission_id.into(), true).await?;
      return Ok(parent.is_some_and(|p| check_resource_ownership(principal, &p)));
    }
    Ok(check_resource_ownership(principal, record))
  }

  /// Guard an action on a row that must exist and be active.
  async fn guard_target(
    &self,
    principal: &Principal,
    action: Action,
    target: EntityRef,
  ) -> Result<Record> {
    let record = self
      .store
      .get(target, false)
      .await?
      .ok_or(Error::NotFound(target))?;
    self.guard_record(principal, action, &record).await?;
    Ok(record)
  }

  async fn scoped(&self, target: EntityRef) -> Result<Option<EnvironmentId>> {
    Ok(self.store.environment_of(target).await?)
  }

  // ── Lifecycle ─────────────────────────────────────────────────────────

  /// Delete `target` as `identity`, following the kind's delete policy.
  pub async fn delete(&self, identity: &str, target: EntityRef) -> Result<DeletionStats> {
    let principal = self.resolve(identity).await?;

    if target == RoleId::ROOT.into() {
      return Err(Error::RootRoleImmutable);
    }
    let record = self
      .store
      .get(target, false)
      .await?
      .ok_or(Error::NotFound(target))?;
    if let Record::RolePermission(grant) = &record
      && grant.role_id == RoleId::ROOT
    {
      return Err(Error::RootRoleImmutable);
    }

    let part = match &record {
      Record::FormSubmission(sub) => Some((SubmissionPart::Whole, sub.id)),
      Record::AnswerSubmitted(ans) => Some((SubmissionPart::Answer, ans.form_submission_id)),
      Record::Attachment(att) => Some((
        SubmissionPart::Attachment { is_signature: att.is_signature },
        att.form_submission_id,
      )),
      _ => None,
    };
    match part {
      Some((part, submission)) => {
        let parent = EntityRef::from(submission);
        let Some(Record::FormSubmission(sub)) = self.store.get(parent, false).await? else {
          return Err(Error::NotFound(parent));
        };
        let environment = self.scoped(parent).await?;
        check_submission_delete(
          &principal,
          part,
          &sub,
          environment,
          Utc::now(),
          self.policy.submission_delete_window,
        )
        .map_err(|d| Self::deny(&principal, d))?;
      }
      None => self.guard_record(&principal, Action::Delete, &record).await?,
    }

    let result = match delete_policy(target.kind) {
      DeletePolicy::Soft => self.store.soft_delete(target, Utc::now()).await,
      DeletePolicy::Hard => self.store.hard_delete(target).await,
    };
    match result.map_err(Error::from) {
      Ok(stats) => {
        info!(user = %principal.username, %target, total = stats.total(), "deleted");
        Ok(stats)
      }
      Err(err @ Error::EntityInUse { .. }) => {
        warn!(user = %principal.username, %target, %err, "delete blocked");
        Err(err)
      }
      Err(err) => Err(err),
    }
  }

  /// Clear the tombstone on `target` alone. Requires update permission on
  /// its kind.
  pub async fn restore(&self, identity: &str, target: EntityRef) -> Result<Option<Record>> {
    let principal = self.resolve(identity).await?;
    let Some(record) = self.store.get(target, true).await? else {
      return Ok(None);
    };
    self.guard_record(&principal, Action::Update, &record).await?;
    let restored = self.store.restore(target, Utc::now()).await?;
    if restored.is_some() {
      info!(user = %principal.username, %target, "restored");
    }
    Ok(restored)
  }

  /// Read one active row.
  pub async fn view(&self, identity: &str, target: EntityRef) -> Result<Record> {
    let principal = self.resolve(identity).await?;
    self.guard_target(&principal, Action::View, target).await
  }

  // ── Access administration ─────────────────────────────────────────────

  pub async fn create_environment(
    &self,
    identity: &str,
    input: NewEnvironment,
  ) -> Result<Environment> {
    let principal = self.resolve(identity).await?;
    Self::guard_admin(&principal)?;
    input.validate()?;
    let env = self.store.create_environment(input).await?;
    info!(user = %principal.username, environment = %env.id, "environment created");
    Ok(env)
  }

  pub async fn update_environment(
    &self,
    identity: &str,
    id: EnvironmentId,
    patch: EnvironmentPatch,
  ) -> Result<Environment> {
    let principal = self.resolve(identity).await?;
    Self::guard_admin(&principal)?;
    patch.validate()?;
    Ok(self.store.update_environment(id, patch).await?)
  }

  pub async fn create_role(&self, identity: &str, input: NewRole) -> Result<Role> {
    let principal = self.resolve(identity).await?;
    Self::guard(&principal, &AccessRequest::new(Action::Create, Resource::Roles))?;
    input.validate()?;
    Ok(self.store.create_role(input).await?)
  }

  /// The root role refuses every change, including from super users.
  pub async fn update_role(&self, identity: &str, id: RoleId, patch: RolePatch) -> Result<Role> {
    let principal = self.resolve(identity).await?;
    if id == RoleId::ROOT {
      return Err(Error::RootRoleImmutable);
    }
    self.guard_target(&principal, Action::Update, id.into()).await?;
    patch.validate()?;
    Ok(self.store.update_role(id, patch).await?)
  }

  pub async fn create_permission(
    &self,
    identity: &str,
    input: NewPermission,
  ) -> Result<Permission> {
    let principal = self.resolve(identity).await?;
    Self::guard_admin(&principal)?;
    input.validate()?;
    Ok(self.store.create_permission(input).await?)
  }

  pub async fn update_permission(
    &self,
    identity: &str,
    id: PermissionId,
    patch: PermissionPatch,
  ) -> Result<Permission> {
    let principal = self.resolve(identity).await?;
    Self::guard_admin(&principal)?;
    patch.validate()?;
    Ok(self.store.update_permission(id, patch).await?)
  }

  pub async fn grant(
    &self,
    identity: &str,
    role: RoleId,
    permission: PermissionId,
  ) -> Result<RolePermission> {
    let principal = self.resolve(identity).await?;
    if role == RoleId::ROOT {
      return Err(Error::RootRoleImmutable);
    }
    Self::guard(&principal, &AccessRequest::new(Action::Update, Resource::Roles))?;
    let grant = self.store.assign_permission(role, permission).await?;
    info!(user = %principal.username, %role, %permission, "permission granted");
    Ok(grant)
  }

  /// Remove the active grant of `permission` to `role`.
  pub async fn revoke(
    &self,
    identity: &str,
    role: RoleId,
    permission: PermissionId,
  ) -> Result<DeletionStats> {
    let principal = self.resolve(identity).await?;
    if role == RoleId::ROOT {
      return Err(Error::RootRoleImmutable);
    }
    Self::guard(&principal, &AccessRequest::new(Action::Delete, Resource::Roles))?;
    if self.store.get(role.into(), false).await?.is_none() {
      return Err(Error::NotFound(role.into()));
    }
    let grant = self
      .store
      .find_role_permission(role, permission)
      .await?
      .ok_or(Error::NotFound(permission.into()))?;
    let stats = self.store.hard_delete(grant.id.into()).await?;
    info!(user = %principal.username, %role, %permission, "permission revoked");
    Ok(stats)
  }

  pub async fn role_permissions(&self, identity: &str, role: RoleId) -> Result<Vec<Permission>> {
    let principal = self.resolve(identity).await?;
    Self::guard(&principal, &AccessRequest::new(Action::View, Resource::Roles))?;
    Ok(self.store.role_permissions(role).await?)
  }

  /// Only admins may place someone in the root role.
  pub async fn create_user(&self, identity: &str, input: NewUser) -> Result<User> {
    let principal = self.resolve(identity).await?;
    Self::guard(
      &principal,
      &AccessRequest::new(Action::Create, Resource::Users)
        .in_environment(Some(input.environment_id)),
    )?;
    if input.role_id == RoleId::ROOT {
      Self::guard_admin(&principal)?;
    }
    input.validate()?;
    Ok(self.store.create_user(input).await?)
  }

  pub async fn update_user(&self, identity: &str, id: UserId, patch: UserPatch) -> Result<User> {
    let principal = self.resolve(identity).await?;
    self.guard_target(&principal, Action::Update, id.into()).await?;
    if let Some(env) = patch.environment_id
      && !check_environment_access(&principal, env)
    {
      return Err(Self::deny(&principal, Denial::Environment));
    }
    if patch.role_id == Some(RoleId::ROOT) {
      Self::guard_admin(&principal)?;
    }
    patch.validate()?;
    Ok(self.store.update_user(id, patch).await?)
  }

  pub async fn users_in_environment(
    &self,
    identity: &str,
    environment: EnvironmentId,
  ) -> Result<Vec<User>> {
    let principal = self.resolve(identity).await?;
    Self::guard(
      &principal,
      &AccessRequest::new(Action::View, Resource::Users).in_environment(Some(environment)),
    )?;
    Ok(self.store.users_in_environment(environment).await?)
  }

  /// Per resource, the actions `identity` holds.
  pub async fn effective_permissions(
    &self,
    identity: &str,
  ) -> Result<BTreeMap<String, BTreeSet<String>>> {
    let principal = self.resolve(identity).await?;
    Ok(effective_permissions(&principal))
  }

  // ── Question pool ─────────────────────────────────────────────────────

  pub async fn create_question_type(
    &self,
    identity: &str,
    input: NewQuestionType,
  ) -> Result<QuestionType> {
    let principal = self.resolve(identity).await?;
    Self::guard(&principal, &AccessRequest::new(Action::Create, Resource::QuestionTypes))?;
    input.validate()?;
    Ok(self.store.create_question_type(input).await?)
  }

  pub async fn create_question(&self, identity: &str, input: NewQuestion) -> Result<Question> {
    let principal = self.resolve(identity).await?;
    Self::guard(&principal, &AccessRequest::new(Action::Create, Resource::Questions))?;
    input.validate()?;
    Ok(self.store.create_question(input).await?)
  }

  pub async fn update_question(
    &self,
    identity: &str,
    id: QuestionId,
    patch: QuestionPatch,
  ) -> Result<Question> {
    let principal = self.resolve(identity).await?;
    self.guard_target(&principal, Action::Update, id.into()).await?;
    patch.validate()?;
    Ok(self.store.update_question(id, patch).await?)
  }

  pub async fn create_answer(&self, identity: &str, input: NewAnswer) -> Result<Answer> {
    let principal = self.resolve(identity).await?;
    Self::guard(&principal, &AccessRequest::new(Action::Create, Resource::Answers))?;
    input.validate()?;
    Ok(self.store.create_answer(input).await?)
  }

  // ── Forms ─────────────────────────────────────────────────────────────

  /// Create a form owned by the acting user.
  pub async fn create_form(&self, identity: &str, mut input: NewForm) -> Result<Form> {
    let principal = self.resolve(identity).await?;
    Self::guard(
      &principal,
      &AccessRequest::new(Action::Create, Resource::Forms)
        .in_environment(Some(principal.environment_id)),
    )?;
    input.user_id = principal.user_id;
    input.validate()?;
    Ok(self.store.create_form(input).await?)
  }

  pub async fn update_form(&self, identity: &str, id: FormId, patch: FormPatch) -> Result<Form> {
    let principal = self.resolve(identity).await?;
    self.guard_target(&principal, Action::Update, id.into()).await?;
    patch.validate()?;
    Ok(self.store.update_form(id, patch).await?)
  }

  pub async fn add_form_question(
    &self,
    identity: &str,
    input: NewFormQuestion,
  ) -> Result<FormQuestion> {
    let principal = self.resolve(identity).await?;
    self.guard_target(&principal, Action::Update, input.form_id.into()).await?;
    Ok(self.store.add_form_question(input).await?)
  }

  pub async fn reorder_form_questions(
    &self,
    identity: &str,
    form: FormId,
    order: Vec<(FormQuestionId, i64)>,
  ) -> Result<Vec<FormQuestion>> {
    let principal = self.resolve(identity).await?;
    self.guard_target(&principal, Action::Update, form.into()).await?;
    Ok(self.store.reorder_form_questions(form, order).await?)
  }

  pub async fn add_form_answer(
    &self,
    identity: &str,
    input: NewFormAnswer,
  ) -> Result<FormAnswer> {
    let principal = self.resolve(identity).await?;
    self
      .guard_target(&principal, Action::Update, input.form_question_id.into())
      .await?;
    Ok(self.store.add_form_answer(input).await?)
  }

  /// Forms of an environment. Principals who may only view public forms see
  /// just those.
  pub async fn forms_in_environment(
    &self,
    identity: &str,
    environment: EnvironmentId,
  ) -> Result<Vec<Form>> {
    let principal = self.resolve(identity).await?;
    let full = AccessRequest::new(Action::View, Resource::Forms).in_environment(Some(environment));
    let public_only = match authorize(&principal, &full) {
      Ok(()) => false,
      Err(Denial::Permission { .. }) => {
        Self::guard(
          &principal,
          &AccessRequest::new(Action::View, Resource::PublicForms)
            .in_environment(Some(environment)),
        )?;
        true
      }
      Err(denial) => return Err(Self::deny(&principal, denial)),
    };
    let forms = self.store.forms_in_environment(environment).await?;
    Ok(if public_only { forms.into_iter().filter(|f| f.is_public).collect() } else { forms })
  }

  // ── Submissions ───────────────────────────────────────────────────────

  /// Submit answers to `form` as the acting user.
  pub async fn submit_form(
    &self,
    identity: &str,
    mut input: NewSubmission,
  ) -> Result<FormSubmission> {
    let principal = self.resolve(identity).await?;
    let form = EntityRef::from(input.form_id);
    if self.store.get(form, false).await?.is_none() {
      return Err(Error::NotFound(form));
    }
    let environment = self.scoped(form).await?;
    Self::guard(
      &principal,
      &AccessRequest::new(Action::Create, Resource::Submissions).in_environment(environment),
    )?;
    input.submitted_by = principal.username.clone();
    input.validate()?;
    let submission = self.store.submit_form(input, Utc::now()).await?;
    info!(user = %principal.username, submission = %submission.id, "form submitted");
    Ok(submission)
  }

  pub async fn add_attachment(
    &self,
    identity: &str,
    submission: FormSubmissionId,
    input: NewAttachment,
  ) -> Result<Attachment> {
    let principal = self.resolve(identity).await?;
    let target = EntityRef::from(submission);
    let record = self
      .store
      .get(target, false)
      .await?
      .ok_or(Error::NotFound(target))?;
    let environment = self.scoped(target).await?;
    Self::guard(
      &principal,
      &AccessRequest::new(Action::Create, Resource::Attachments).in_environment(environment),
    )?;
    if !principal.is_super_user
      && !check_resource_ownership(&principal, &record)
      && !has_permission(&principal, Action::Update, Resource::Submissions, false)
    {
      return Err(Self::deny(&principal, Denial::Ownership));
    }
    input.validate()?;
    Ok(self.store.add_attachment(submission, input).await?)
  }

  // ── Seed ──────────────────────────────────────────────────────────────

  /// Seed built-in rows. Not guarded: runs before any user exists.
  pub async fn bootstrap(&self) -> Result<SeedReport> {
    let report = self.store.bootstrap().await?;
    info!(?report, "bootstrap complete");
    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{id::FormSubmissionId, lifecycle::Timestamps};

  fn principal(role: &str, username: &str, env: i64) -> Principal {
    Principal {
      user_id:        UserId(5),
      username:       username.into(),
      role_id:        RoleId(3),
      role_name:      role.into(),
      is_super_user:  false,
      environment_id: EnvironmentId(env),
      grants:         BTreeSet::new(),
    }
  }

  fn submission(by: &str, at: DateTime<Utc>) -> FormSubmission {
    FormSubmission {
      id:           FormSubmissionId(1),
      form_id:      FormId(1),
      submitted_by: by.into(),
      submitted_at: at,
      stamps:       Timestamps::created(at),
    }
  }

  const NORTH: Option<EnvironmentId> = Some(EnvironmentId(3));
  const SOUTH: Option<EnvironmentId> = Some(EnvironmentId(7));

  #[test]
  fn owner_may_delete_within_window() {
    let now = Utc::now();
    let window = ServicePolicy::default().submission_delete_window;
    let tech = principal(roles::TECHNICIAN, "tech01", 3);
    let whole = SubmissionPart::Whole;

    let fresh = submission("tech01", now - Duration::days(2));
    assert_eq!(check_submission_delete(&tech, whole, &fresh, NORTH, now, window), Ok(()));

    let stale = submission("tech01", now - Duration::days(8));
    assert!(matches!(
      check_submission_delete(&tech, whole, &stale, NORTH, now, window),
      Err(Denial::Policy { .. })
    ));

    let other = submission("tech02", now);
    assert_eq!(
      check_submission_delete(&tech, whole, &other, NORTH, now, window),
      Err(Denial::Ownership)
    );
  }

  #[test]
  fn window_counts_whole_days() {
    let now = Utc::now();
    let window = Duration::days(7);
    let tech = principal(roles::TECHNICIAN, "tech01", 3);

    let last_day = submission("tech01", now - Duration::days(7) - Duration::hours(23));
    assert_eq!(
      check_submission_delete(&tech, SubmissionPart::Whole, &last_day, NORTH, now, window),
      Ok(())
    );
    let expired = submission("tech01", now - Duration::days(8));
    assert!(matches!(
      check_submission_delete(&tech, SubmissionPart::Answer, &expired, NORTH, now, window),
      Err(Denial::Policy { .. })
    ));
  }

  #[test]
  fn permission_is_checked_before_scope() {
    let now = Utc::now();
    let window = Duration::days(7);
    let sub = submission("tech01", now);

    let sup = principal(roles::SUPERVISOR, "sup01", 3);
    assert_eq!(
      check_submission_delete(&sup, SubmissionPart::Whole, &sub, NORTH, now, window),
      Err(Denial::Permission { permission: "delete_submissions".into() })
    );

    let mut granted = sup.clone();
    granted.grants.insert("delete_submissions".into());
    assert_eq!(
      check_submission_delete(&granted, SubmissionPart::Whole, &sub, NORTH, now, window),
      Ok(())
    );

    let manager = principal(roles::SITE_MANAGER, "manager", 3);
    assert_eq!(
      check_submission_delete(&manager, SubmissionPart::Whole, &sub, NORTH, now, window),
      Ok(())
    );
    assert_eq!(
      check_submission_delete(&manager, SubmissionPart::Whole, &sub, SOUTH, now, window),
      Err(Denial::Environment)
    );
    assert_eq!(
      check_submission_delete(&manager, SubmissionPart::Whole, &sub, None, now, window),
      Err(Denial::Environment)
    );
  }

  #[test]
  fn attachments_follow_their_own_permission() {
    let now = Utc::now();
    let window = Duration::days(7);
    let sub = submission("tech01", now);
    let plain = SubmissionPart::Attachment { is_signature: false };
    let signature = SubmissionPart::Attachment { is_signature: true };

    let tech = principal(roles::TECHNICIAN, "tech01", 3);
    assert_eq!(check_submission_delete(&tech, plain, &sub, NORTH, now, window), Ok(()));
    assert!(matches!(
      check_submission_delete(&tech, signature, &sub, NORTH, now, window),
      Err(Denial::Role { .. })
    ));

    let manager = principal(roles::SITE_MANAGER, "manager", 3);
    assert_eq!(
      check_submission_delete(&manager, plain, &sub, NORTH, now, window),
      Err(Denial::Permission { permission: "delete_attachments".into() })
    );
  }

  #[test]
  fn super_user_ignores_the_window() {
    let now = Utc::now();
    let mut admin = principal(roles::ADMIN, "root", 1);
    admin.is_super_user = true;
    let ancient = submission("tech01", now - Duration::days(400));
    assert_eq!(
      check_submission_delete(
        &admin,
        SubmissionPart::Attachment { is_signature: true },
        &ancient,
        Some(EnvironmentId(9)),
        now,
        Duration::days(7)
      ),
      Ok(())
    );
  }
}
