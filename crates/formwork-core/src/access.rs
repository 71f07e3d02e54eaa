//! Tenancy and access-control entities: environments, roles, permissions,
//! role/permission grants, and users.

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  error::invalid,
  id::{EnvironmentId, PermissionId, RoleId, RolePermissionId, UserId},
  lifecycle::Timestamps,
};

// ─── Environment ─────────────────────────────────────────────────────────────

/// A tenant-like partition. Non-super-user principals only see data in the
/// environment they are assigned to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
  pub id:          EnvironmentId,
  pub name:        String,
  pub description: Option<String>,
  #[serde(flatten)]
  pub stamps:      Timestamps,
}

#[derive(Debug, Clone)]
pub struct NewEnvironment {
  pub name:        String,
  pub description: Option<String>,
}

impl NewEnvironment {
  pub fn validate(&self) -> Result<()> {
    require_text("environment name", &self.name, 50)
  }
}

#[derive(Debug, Clone, Default)]
pub struct EnvironmentPatch {
  pub name:        Option<String>,
  pub description: Option<Option<String>>,
}

impl EnvironmentPatch {
  pub fn validate(&self) -> Result<()> {
    if let Some(name) = &self.name {
      require_text("environment name", name, 50)?;
    }
    Ok(())
  }
}

// ─── Role ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
  pub id:            RoleId,
  pub name:          String,
  pub description:   Option<String>,
  pub is_super_user: bool,
  #[serde(flatten)]
  pub stamps:        Timestamps,
}

impl Role {
  /// The seeded administrator role that no request may alter or remove.
  pub fn is_root(&self) -> bool { self.id == RoleId::ROOT && self.is_super_user }
}

#[derive(Debug, Clone)]
pub struct NewRole {
  pub name:          String,
  pub description:   Option<String>,
  pub is_super_user: bool,
}

impl NewRole {
  pub fn validate(&self) -> Result<()> { require_text("role name", &self.name, 50) }
}

#[derive(Debug, Clone, Default)]
pub struct RolePatch {
  pub name:          Option<String>,
  pub description:   Option<Option<String>>,
  pub is_super_user: Option<bool>,
}

impl RolePatch {
  pub fn validate(&self) -> Result<()> {
    if let Some(name) = &self.name {
      require_text("role name", name, 50)?;
    }
    Ok(())
  }
}

// ─── Permission ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
  pub id:          PermissionId,
  pub name:        String,
  pub description: Option<String>,
  #[serde(flatten)]
  pub stamps:      Timestamps,
}

#[derive(Debug, Clone)]
pub struct NewPermission {
  pub name:        String,
  pub description: Option<String>,
}

impl NewPermission {
  pub fn validate(&self) -> Result<()> { validate_permission_name(&self.name) }
}

#[derive(Debug, Clone, Default)]
pub struct PermissionPatch {
  pub name:        Option<String>,
  pub description: Option<Option<String>>,
}

impl PermissionPatch {
  pub fn validate(&self) -> Result<()> {
    match &self.name {
      Some(name) => validate_permission_name(name),
      None => Ok(()),
    }
  }
}

/// Permission names are lowercase and contain no whitespace, e.g.
/// `delete_own_submissions`.
pub fn validate_permission_name(name: &str) -> Result<()> {
  require_text("permission name", name, 50)?;
  if name.chars().any(char::is_whitespace) {
    return Err(invalid("permission name must not contain spaces"));
  }
  if name.chars().any(char::is_uppercase) {
    return Err(invalid("permission name must be lowercase"));
  }
  Ok(())
}

// ─── RolePermission ──────────────────────────────────────────────────────────

/// An explicit grant of one permission to one role.
///
/// At most one *active* row exists per (role, permission) pair; a tombstoned
/// pair may be granted again, producing a new row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePermission {
  pub id:            RolePermissionId,
  pub role_id:       RoleId,
  pub permission_id: PermissionId,
  #[serde(flatten)]
  pub stamps:        Timestamps,
}

// ─── User ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub id:             UserId,
  pub first_name:     String,
  pub last_name:      String,
  pub email:          String,
  pub contact_number: Option<String>,
  pub username:       String,
  /// PHC string produced by the credential collaborator. Opaque here.
  #[serde(skip_serializing)]
  pub password_hash:  String,
  pub role_id:        RoleId,
  pub environment_id: EnvironmentId,
  #[serde(flatten)]
  pub stamps:         Timestamps,
}

#[derive(Debug, Clone)]
pub struct NewUser {
  pub first_name:     String,
  pub last_name:      String,
  pub email:          String,
  pub contact_number: Option<String>,
  pub username:       String,
  pub password_hash:  String,
  pub role_id:        RoleId,
  pub environment_id: EnvironmentId,
}

impl NewUser {
  pub fn validate(&self) -> Result<()> {
    require_text("first name", &self.first_name, 255)?;
    require_text("last name", &self.last_name, 255)?;
    validate_email(&self.email)?;
    validate_username(&self.username)?;
    if self.password_hash.is_empty() {
      return Err(invalid("password hash is required"));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
  pub first_name:     Option<String>,
  pub last_name:      Option<String>,
  pub email:          Option<String>,
  pub contact_number: Option<Option<String>>,
  pub password_hash:  Option<String>,
  pub role_id:        Option<RoleId>,
  pub environment_id: Option<EnvironmentId>,
}

impl UserPatch {
  pub fn validate(&self) -> Result<()> {
    if let Some(v) = &self.first_name {
      require_text("first name", v, 255)?;
    }
    if let Some(v) = &self.last_name {
      require_text("last name", v, 255)?;
    }
    if let Some(v) = &self.email {
      validate_email(v)?;
    }
    if matches!(&self.password_hash, Some(h) if h.is_empty()) {
      return Err(invalid("password hash is required"));
    }
    Ok(())
  }
}

/// At least four characters of `[A-Za-z0-9_-]`.
pub fn validate_username(username: &str) -> Result<()> {
  if username.len() < 4 || username.len() > 50 {
    return Err(invalid("username must be between 4 and 50 characters"));
  }
  if !username
    .chars()
    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
  {
    return Err(invalid(
      "username may only contain letters, numbers, underscores and hyphens",
    ));
  }
  Ok(())
}

fn validate_email(email: &str) -> Result<()> {
  let valid = email
    .split_once('@')
    .is_some_and(|(local, domain)| {
      !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
    });
  if !valid || email.chars().any(char::is_whitespace) {
    return Err(invalid(format!("invalid email address: {email:?}")));
  }
  Ok(())
}

pub(crate) fn require_text(field: &str, value: &str, max: usize) -> Result<()> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Err(invalid(format!("{field} cannot be empty")));
  }
  if trimmed.chars().count() > max {
    return Err(invalid(format!("{field} exceeds {max} characters")));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn permission_names_follow_the_convention() {
    assert!(validate_permission_name("create_own_submissions").is_ok());
    assert!(validate_permission_name("Create_forms").is_err());
    assert!(validate_permission_name("view forms").is_err());
    assert!(validate_permission_name("").is_err());
  }

  #[test]
  fn usernames_are_restricted() {
    assert!(validate_username("site-mgr_01").is_ok());
    assert!(validate_username("abc").is_err());
    assert!(validate_username("bad name").is_err());
  }

  #[test]
  fn new_user_requires_a_plausible_email() {
    let mut user = NewUser {
      first_name:     "Ada".into(),
      last_name:      "Lovelace".into(),
      email:          "ada@example.com".into(),
      contact_number: None,
      username:       "ada_l".into(),
      password_hash:  "$argon2id$v=19$stub".into(),
      role_id:        RoleId(2),
      environment_id: EnvironmentId(1),
    };
    assert!(user.validate().is_ok());
    user.email = "ada.example.com".into();
    assert!(user.validate().is_err());
  }
}
