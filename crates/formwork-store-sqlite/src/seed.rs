//! Built-in rows written by [`FormStore::bootstrap`].
//!
//! [`FormStore::bootstrap`]: formwork_core::store::FormStore::bootstrap

use rusqlite::{Connection, params};

use formwork_core::{authz::roles, id::EnvironmentId, store::SeedReport};

use crate::Result;

pub const ADMIN_ENVIRONMENT: (&str, &str) = ("ADMIN", "System Administration Environment");

/// `(id, name, description, is_super_user)`. The first entry is the root role.
pub const ROLES: &[(i64, &str, &str, bool)] = &[
  (1, roles::ADMIN, "Full system administrator with unrestricted access", true),
  (2, roles::SITE_MANAGER, "Manager with full access within their environment", false),
  (3, roles::SUPERVISOR, "Supervisor with form management capabilities", false),
  (4, roles::TECHNICIAN, "Technical user with limited form access", false),
];

pub const PERMISSIONS: &[(&str, &str)] = &[
  ("view_users", "Can view users within their environment"),
  ("view_all_users", "Can view all users across environments"),
  ("create_users", "Can create users within their environment"),
  ("update_users", "Can update users within their environment"),
  ("delete_users", "Can delete users within their environment"),
  ("manage_all_users", "Can manage all users across environments"),
  ("view_forms", "Can view forms within their environment"),
  ("create_forms", "Can create forms within their environment"),
  ("update_forms", "Can update forms within their environment"),
  ("delete_forms", "Can delete forms within their environment"),
  ("view_public_forms", "Can view public forms only"),
  ("manage_all_forms", "Can manage all forms across environments"),
  ("view_questions", "Can view questions"),
  ("create_questions", "Can create questions within their environment"),
  ("update_questions", "Can update questions within their environment"),
  ("delete_questions", "Can delete questions within their environment"),
  ("view_question_types", "Can view question types"),
  ("create_question_types", "Can create question types"),
  ("update_question_types", "Can update question types"),
  ("delete_question_types", "Can delete question types"),
  ("view_answers", "Can view answers within their environment"),
  ("create_answers", "Can create answers within their environment"),
  ("update_answers", "Can update answers within their environment"),
  ("delete_answers", "Can delete answers within their environment"),
  ("view_submissions", "Can view form submissions within their environment"),
  ("create_submissions", "Can create form submissions"),
  ("update_submissions", "Can update submissions within their environment"),
  ("delete_submissions", "Can delete submissions within their environment"),
  ("view_own_submissions", "Can view own form submissions only"),
  ("update_own_submissions", "Can update own submissions only"),
  ("delete_own_submissions", "Can delete own submissions only"),
  ("view_attachments", "Can view attachments within their environment"),
  ("create_attachments", "Can create attachments"),
  ("update_attachments", "Can update attachments within their environment"),
  ("delete_attachments", "Can delete attachments within their environment"),
  ("view_own_attachments", "Can view own attachments only"),
  ("update_own_attachments", "Can update own attachments only"),
  ("delete_own_attachments", "Can delete own attachments only"),
  ("view_environments", "Can view environments"),
  ("manage_environments", "Can manage all environments"),
];

pub const QUESTION_TYPES: &[&str] =
  &["text", "multiple_choices", "checkbox", "date", "datetime", "user"];

/// Insert whatever is missing. Existing rows, tombstoned or not, are left
/// alone, except that a tombstoned default question type is restored.
pub fn run(conn: &Connection, at: &str) -> Result<SeedReport> {
  let mut report = SeedReport::default();

  let (name, description) = ADMIN_ENVIRONMENT;
  report.environments += conn.execute(
    "INSERT OR IGNORE INTO environments (id, name, description, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?4)",
    params![EnvironmentId::ADMIN.get(), name, description, at],
  )? as u64;

  for (id, name, description, is_super_user) in ROLES {
    report.roles += conn.execute(
      "INSERT OR IGNORE INTO roles (id, name, description, is_super_user, created_at, updated_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
      params![id, name, description, is_super_user, at],
    )? as u64;
  }

  for (name, description) in PERMISSIONS {
    report.permissions += conn.execute(
      "INSERT OR IGNORE INTO permissions (name, description, created_at, updated_at)
       VALUES (?1, ?2, ?3, ?3)",
      params![name, description, at],
    )? as u64;
  }

  for label in QUESTION_TYPES {
    report.question_types += conn.execute(
      "INSERT OR IGNORE INTO question_types (label, created_at, updated_at)
       VALUES (?1, ?2, ?2)",
      params![label, at],
    )? as u64;
    conn.execute(
      "UPDATE question_types SET is_deleted = 0, deleted_at = NULL, updated_at = ?2
       WHERE label = ?1 AND is_deleted = 1",
      params![label, at],
    )?;
  }

  Ok(report)
}
