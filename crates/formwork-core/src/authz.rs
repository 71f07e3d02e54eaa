//! The authorization model.
//!
//! Decisions are made from three inputs: the principal's role (looked up in
//! the static [`ROLE_POLICIES`] table), the explicit grants attached to that
//! role in storage, and the principal's environment. Every check returns a
//! decision rather than an error and fails closed: an unknown role, an
//! unparsable name or a missing lookup all deny.
//!
//! The static table only encodes the permission-name convention per role. Role
//! and permission *rows* are ordinary entities managed through the store.

use std::{
  collections::{BTreeMap, BTreeSet},
  fmt,
};

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

use crate::{
  form::{Form, FormSubmission},
  graph::EntityKind,
  id::{EnvironmentId, RoleId, UserId},
};

// ─── Vocabulary ──────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Action {
  View,
  Create,
  Update,
  Delete,
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(<&'static str>::from(self))
  }
}

/// The entity-type segment of a permission name.
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
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Resource {
  Users,
  Roles,
  Forms,
  PublicForms,
  Questions,
  QuestionTypes,
  Answers,
  Submissions,
  Attachments,
  Environments,
}

impl Resource {
  /// The resource whose permissions gate operations on `kind`.
  pub const fn for_kind(kind: EntityKind) -> Self {
    match kind {
      EntityKind::Environment => Self::Environments,
      EntityKind::Role | EntityKind::Permission | EntityKind::RolePermission => {
        Self::Roles
      }
      EntityKind::User => Self::Users,
      EntityKind::QuestionType => Self::QuestionTypes,
      EntityKind::Question => Self::Questions,
      EntityKind::Answer => Self::Answers,
      EntityKind::Form | EntityKind::FormQuestion | EntityKind::FormAnswer => {
        Self::Forms
      }
      EntityKind::FormSubmission | EntityKind::AnswerSubmitted => Self::Submissions,
      EntityKind::Attachment => Self::Attachments,
    }
  }

  pub fn name(self) -> &'static str { self.into() }
}

impl fmt::Display for Resource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Build a permission name: `{action}[_own]_{resource}`.
pub fn permission_name(action: Action, resource: Resource, own: bool) -> String {
  if own {
    format!("{action}_own_{resource}")
  } else {
    format!("{action}_{resource}")
  }
}

// ─── Static role table ───────────────────────────────────────────────────────

pub mod roles {
  pub const ADMIN: &str = "Admin";
  pub const SITE_MANAGER: &str = "Site Manager";
  pub const SUPERVISOR: &str = "Supervisor";
  pub const TECHNICIAN: &str = "Technician";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleGrant {
  /// Every permission.
  All,
  Only(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolePolicy {
  pub name:                   &'static str,
  pub grant:                  RoleGrant,
  /// Whether the role is confined to its own environment.
  pub environment_restricted: bool,
}

pub const ROLE_POLICIES: &[RolePolicy] = &[
  RolePolicy {
    name:                   roles::ADMIN,
    grant:                  RoleGrant::All,
    environment_restricted: false,
  },
  RolePolicy {
    name:                   roles::SITE_MANAGER,
    grant:                  RoleGrant::Only(&[
      "view_users",
      "update_users",
      "delete_users",
      "view_forms",
      "create_forms",
      "update_forms",
      "delete_forms",
      "view_environments",
      "view_questions",
      "create_questions",
      "update_questions",
      "delete_questions",
      "view_submissions",
      "create_submissions",
      "update_submissions",
      "delete_submissions",
    ]),
    environment_restricted: true,
  },
  RolePolicy {
    name:                   roles::SUPERVISOR,
    grant:                  RoleGrant::Only(&[
      "view_forms",
      "create_forms",
      "update_forms",
      "delete_forms",
      "view_environments",
      "view_submissions",
      "update_submissions",
    ]),
    environment_restricted: true,
  },
  RolePolicy {
    name:                   roles::TECHNICIAN,
    grant:                  RoleGrant::Only(&[
      "view_public_forms",
      "view_environments",
      "create_submissions",
      "view_own_submissions",
      "update_own_submissions",
      "delete_own_submissions",
      "create_attachments",
      "view_own_attachments",
      "update_own_attachments",
      "delete_own_attachments",
    ]),
    environment_restricted: true,
  },
];

pub fn role_policy(role_name: &str) -> Option<&'static RolePolicy> {
  ROLE_POLICIES.iter().find(|p| p.name == role_name)
}

// ─── Principal ───────────────────────────────────────────────────────────────

/// The authenticated user an operation runs as, with everything the guards
/// need already resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
  pub user_id:        UserId,
  pub username:       String,
  pub role_id:        RoleId,
  pub role_name:      String,
  pub is_super_user:  bool,
  pub environment_id: EnvironmentId,
  /// Names of permissions granted to the role through active role/permission
  /// rows.
  pub grants:         BTreeSet<String>,
}

// ─── Primitive checks ────────────────────────────────────────────────────────

pub fn has_permission(
  principal: &Principal,
  action: Action,
  resource: Resource,
  own_resource: bool,
) -> bool {
  if principal.is_super_user {
    return true;
  }
  let Some(policy) = role_policy(&principal.role_name) else {
    return false;
  };
  match policy.grant {
    RoleGrant::All => true,
    RoleGrant::Only(names) => {
      let wanted = permission_name(action, resource, own_resource);
      names.contains(&wanted.as_str()) || principal.grants.contains(&wanted)
    }
  }
}

/// Environments are a flat partition: no hierarchy, exact match only.
pub fn check_environment_access(
  principal: &Principal,
  environment_id: EnvironmentId,
) -> bool {
  principal.is_super_user || principal.environment_id == environment_id
}

pub fn check_resource_ownership(principal: &Principal, resource: &impl Ownable) -> bool {
  match resource.owner_key() {
    OwnerKey::User(id) | OwnerKey::Creator(id) => id == principal.user_id,
    OwnerKey::Submitter(username) => username == principal.username,
    OwnerKey::Unowned => false,
  }
}

/// Coarse guard for admin-only operations.
pub fn require_role(principal: &Principal, allowed: &[&str]) -> Result<(), Denial> {
  if principal.is_super_user || allowed.contains(&principal.role_name.as_str()) {
    return Ok(());
  }
  Err(Denial::Role {
    allowed: allowed.iter().map(|r| (*r).to_owned()).collect(),
  })
}

// ─── Composed guard ──────────────────────────────────────────────────────────

/// What an operation needs from the principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRequest {
  pub action:      Action,
  pub resource:    Resource,
  pub own:         bool,
  /// Environment the touched data lives in, when it is scoped.
  pub environment: Option<EnvironmentId>,
}

impl AccessRequest {
  pub fn new(action: Action, resource: Resource) -> Self {
    Self { action, resource, own: false, environment: None }
  }

  pub fn own(mut self) -> Self {
    self.own = true;
    self
  }

  pub fn in_environment(mut self, environment: Option<EnvironmentId>) -> Self {
    self.environment = environment;
    self
  }
}

/// Permission check, then environment check. The permission check
/// short-circuits.
pub fn authorize(principal: &Principal, request: &AccessRequest) -> Result<(), Denial> {
  if !has_permission(principal, request.action, request.resource, request.own) {
    return Err(Denial::Permission {
      permission: permission_name(request.action, request.resource, request.own),
    });
  }
  if let Some(env) = request.environment
    && !check_environment_access(principal, env)
  {
    return Err(Denial::Environment);
  }
  Ok(())
}

/// Which guard refused an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "guard", rename_all = "snake_case")]
pub enum Denial {
  Permission { permission: String },
  Role { allowed: Vec<String> },
  /// Deliberately carries no environment id.
  Environment,
  Ownership,
  /// A business rule attached to the operation, e.g. an expired edit window.
  Policy { reason: String },
}

impl fmt::Display for Denial {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Permission { permission } => {
        write!(f, "missing permission {permission:?}")
      }
      Self::Role { allowed } => {
        write!(f, "this action requires one of these roles: {}", allowed.join(", "))
      }
      Self::Environment => f.write_str("you don't have access to this environment"),
      Self::Ownership => f.write_str("the resource belongs to another user"),
      Self::Policy { reason } => f.write_str(reason),
    }
  }
}

// ─── Ownership ───────────────────────────────────────────────────────────────

/// The attribute a resource uses to name its owner. A resource exposes at
/// most one; when a type could offer several, `User` wins over `Submitter`,
/// which wins over `Creator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerKey {
  User(UserId),
  Submitter(String),
  Creator(UserId),
  Unowned,
}

pub trait Ownable {
  fn owner_key(&self) -> OwnerKey;
}

impl Ownable for Form {
  fn owner_key(&self) -> OwnerKey { OwnerKey::User(self.user_id) }
}

impl Ownable for FormSubmission {
  fn owner_key(&self) -> OwnerKey { OwnerKey::Submitter(self.submitted_by.clone()) }
}

// ─── Effective permissions ───────────────────────────────────────────────────

/// Per resource, the actions the principal holds (`"view"`, `"update_own"`,
/// ...). Grants that do not follow the naming convention are grouped by
/// their first segment the same way.
pub fn effective_permissions(principal: &Principal) -> BTreeMap<String, BTreeSet<String>> {
  let all = principal.is_super_user
    || matches!(
      role_policy(&principal.role_name).map(|p| p.grant),
      Some(RoleGrant::All)
    );

  let mut out: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
  if all {
    for resource in Resource::iter() {
      let actions = out.entry(resource.name().to_owned()).or_default();
      for action in Action::iter() {
        actions.insert(action.to_string());
        if action != Action::Create {
          actions.insert(format!("{action}_own"));
        }
      }
    }
    return out;
  }

  let static_names = match role_policy(&principal.role_name).map(|p| p.grant) {
    Some(RoleGrant::Only(names)) => names,
    _ => return out,
  };
  let names = static_names
    .iter()
    .copied()
    .chain(principal.grants.iter().map(String::as_str));
  for name in names {
    if let Some((action, resource)) = split_permission_name(name) {
      out.entry(resource.to_owned()).or_default().insert(action);
    }
  }
  out
}

fn split_permission_name(name: &str) -> Option<(String, &str)> {
  let (action, rest) = name.split_once('_')?;
  match rest.strip_prefix("own_") {
    Some(resource) if !resource.is_empty() => Some((format!("{action}_own"), resource)),
    _ if !rest.is_empty() => Some((action.to_owned(), rest)),
    _ => None,
  }
}
