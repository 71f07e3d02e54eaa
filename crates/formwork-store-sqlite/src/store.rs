//! [`SqliteStore`]: the SQLite implementation of [`FormStore`].

use std::{collections::BTreeSet, path::Path};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, Row, params, params_from_iter, types::Value};

use formwork_core::{
  Error as CoreError,
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
  graph::{EntityKind, EntityRef},
  id::{
    AnswerId, AttachmentId, EnvironmentId, FormAnswerId, FormId, FormQuestionId,
    FormSubmissionId, PermissionId, QuestionId, QuestionTypeId, RoleId, RolePermissionId,
    UserId,
  },
  record::Record,
  store::{FormStore, SeedReport},
};

use crate::{
  Error, Result, cascade,
  cascade::placeholders,
  encode::{self, encode_dt},
  schema::SCHEMA,
  seed,
};

type Decode<T> = fn(&Row<'_>) -> rusqlite::Result<T>;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Formwork store backed by a single SQLite file.
///
/// Cloning shares the inner connection.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread. Domain errors travel back inside the
  /// closure's own result.
  async fn with_conn<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  /// Like [`with_conn`](Self::with_conn), inside a transaction that commits
  /// only when `f` succeeds.
  async fn in_tx<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
  {
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
      })
      .await
  }
}

// ─── SQL helpers ─────────────────────────────────────────────────────────────

fn now() -> String { encode_dt(Utc::now()) }

fn text(v: String) -> Value { Value::Text(v) }

fn opt_text(v: Option<String>) -> Value { v.map_or(Value::Null, Value::Text) }

fn int(v: i64) -> Value { Value::Integer(v) }

fn flag(v: bool) -> Value { Value::Integer(v as i64) }

fn not_found(target: impl Into<EntityRef>) -> Error {
  Error::Core(CoreError::NotFound(target.into()))
}

/// Insert a row with fresh timestamps and return its id.
fn insert(conn: &Connection, kind: EntityKind, cols: &[(&str, Value)], at: &str) -> Result<i64> {
  let names: Vec<&str> = cols.iter().map(|(c, _)| *c).collect();
  let sql = format!(
    "INSERT INTO {} ({}, created_at, updated_at) VALUES ({}, ?, ?)",
    kind.table(),
    names.join(", "),
    placeholders(cols.len()),
  );
  let values = cols
    .iter()
    .map(|(_, v)| v.clone())
    .chain([text(at.to_owned()), text(at.to_owned())]);
  conn.execute(&sql, params_from_iter(values))?;
  Ok(conn.last_insert_rowid())
}

/// Apply `sets` to an active row and bump `updated_at`.
fn update(conn: &Connection, target: EntityRef, sets: Vec<(&str, Value)>, at: &str) -> Result<()> {
  let mut assignments: Vec<String> = sets.iter().map(|(c, _)| format!("{c} = ?")).collect();
  assignments.push("updated_at = ?".to_owned());
  let sql = format!(
    "UPDATE {} SET {} WHERE id = ? AND is_deleted = 0",
    target.kind.table(),
    assignments.join(", "),
  );
  let values = sets
    .into_iter()
    .map(|(_, v)| v)
    .chain([text(at.to_owned()), int(target.id)]);
  match conn.execute(&sql, params_from_iter(values))? {
    0 => Err(not_found(target)),
    _ => Ok(()),
  }
}

/// Load an active row or fail with `NotFound`.
fn load<T>(conn: &Connection, target: EntityRef, decode: Decode<T>) -> Result<T> {
  let sql = format!("SELECT * FROM {} WHERE id = ?1 AND is_deleted = 0", target.kind.table());
  conn
    .query_row(&sql, [target.id], decode)
    .optional()?
    .ok_or_else(|| not_found(target))
}

fn require_active(conn: &Connection, target: impl Into<EntityRef>) -> Result<()> {
  let target = target.into();
  let sql = format!("SELECT 1 FROM {} WHERE id = ?1 AND is_deleted = 0", target.kind.table());
  match conn.query_row(&sql, [target.id], |_| Ok(())).optional()? {
    Some(()) => Ok(()),
    None => Err(not_found(target)),
  }
}

fn list<T, P: rusqlite::Params>(
  conn: &Connection,
  sql: &str,
  params: P,
  decode: Decode<T>,
) -> Result<Vec<T>> {
  let mut stmt = conn.prepare(sql)?;
  let rows = stmt
    .query_map(params, decode)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn insert_attachment(
  conn: &Connection,
  submission: FormSubmissionId,
  input: NewAttachment,
  at: &str,
) -> Result<Attachment> {
  let id = insert(
    conn,
    EntityKind::Attachment,
    &[
      ("form_submission_id", int(submission.get())),
      ("file_type", text(input.file_type)),
      ("file_path", text(input.file_path)),
      ("is_signature", flag(input.is_signature)),
    ],
    at,
  )?;
  load(conn, AttachmentId(id).into(), encode::attachment)
}

// ─── FormStore impl ──────────────────────────────────────────────────────────

impl FormStore for SqliteStore {
  type Error = Error;

  // ── Seed ──────────────────────────────────────────────────────────────────

  async fn bootstrap(&self) -> Result<SeedReport> {
    let at = now();
    self.in_tx(move |conn| seed::run(conn, &at)).await
  }

  // ── Access ────────────────────────────────────────────────────────────────

  async fn create_environment(&self, input: NewEnvironment) -> Result<Environment> {
    input.validate()?;
    let at = now();
    self
      .with_conn(move |conn| {
        let id = insert(
          conn,
          EntityKind::Environment,
          &[("name", text(input.name)), ("description", opt_text(input.description))],
          &at,
        )?;
        load(conn, EnvironmentId(id).into(), encode::environment)
      })
      .await
  }

  async fn update_environment(
    &self,
    id: EnvironmentId,
    patch: EnvironmentPatch,
  ) -> Result<Environment> {
    patch.validate()?;
    let at = now();
    self
      .in_tx(move |conn| {
        let mut sets = Vec::new();
        if let Some(name) = patch.name {
          sets.push(("name", text(name)));
        }
        if let Some(description) = patch.description {
          sets.push(("description", opt_text(description)));
        }
        update(conn, id.into(), sets, &at)?;
        load(conn, id.into(), encode::environment)
      })
      .await
  }

  async fn create_role(&self, input: NewRole) -> Result<Role> {
    input.validate()?;
    let at = now();
    self
      .with_conn(move |conn| {
        let id = insert(
          conn,
          EntityKind::Role,
          &[
            ("name", text(input.name)),
            ("description", opt_text(input.description)),
            ("is_super_user", flag(input.is_super_user)),
          ],
          &at,
        )?;
        load(conn, RoleId(id).into(), encode::role)
      })
      .await
  }

  async fn update_role(&self, id: RoleId, patch: RolePatch) -> Result<Role> {
    patch.validate()?;
    let at = now();
    self
      .in_tx(move |conn| {
        let mut sets = Vec::new();
        if let Some(name) = patch.name {
          sets.push(("name", text(name)));
        }
        if let Some(description) = patch.description {
          sets.push(("description", opt_text(description)));
        }
        if let Some(is_super_user) = patch.is_super_user {
          sets.push(("is_super_user", flag(is_super_user)));
        }
        update(conn, id.into(), sets, &at)?;
        load(conn, id.into(), encode::role)
      })
      .await
  }

  async fn create_permission(&self, input: NewPermission) -> Result<Permission> {
    input.validate()?;
    let at = now();
    self
      .with_conn(move |conn| {
        let id = insert(
          conn,
          EntityKind::Permission,
          &[("name", text(input.name)), ("description", opt_text(input.description))],
          &at,
        )?;
        load(conn, PermissionId(id).into(), encode::permission)
      })
      .await
  }

  async fn update_permission(
    &self,
    id: PermissionId,
    patch: PermissionPatch,
  ) -> Result<Permission> {
    patch.validate()?;
    let at = now();
    self
      .in_tx(move |conn| {
        let mut sets = Vec::new();
        if let Some(name) = patch.name {
          sets.push(("name", text(name)));
        }
        if let Some(description) = patch.description {
          sets.push(("description", opt_text(description)));
        }
        update(conn, id.into(), sets, &at)?;
        load(conn, id.into(), encode::permission)
      })
      .await
  }

  async fn assign_permission(
    &self,
    role: RoleId,
    permission: PermissionId,
  ) -> Result<RolePermission> {
    let at = now();
    self
      .in_tx(move |conn| {
        require_active(conn, role)?;
        require_active(conn, permission)?;
        let id = insert(
          conn,
          EntityKind::RolePermission,
          &[("role_id", int(role.get())), ("permission_id", int(permission.get()))],
          &at,
        )?;
        load(conn, RolePermissionId(id).into(), encode::role_permission)
      })
      .await
  }

  async fn find_role_permission(
    &self,
    role: RoleId,
    permission: PermissionId,
  ) -> Result<Option<RolePermission>> {
    self
      .with_conn(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT * FROM role_permissions
               WHERE role_id = ?1 AND permission_id = ?2 AND is_deleted = 0",
              params![role.get(), permission.get()],
              encode::role_permission,
            )
            .optional()?,
        )
      })
      .await
  }

  async fn role_permissions(&self, role: RoleId) -> Result<Vec<Permission>> {
    self
      .with_conn(move |conn| {
        list(
          conn,
          "SELECT p.* FROM permissions p
           JOIN role_permissions rp ON rp.permission_id = p.id
           WHERE rp.role_id = ?1 AND rp.is_deleted = 0 AND p.is_deleted = 0
           ORDER BY p.name",
          [role.get()],
          encode::permission,
        )
      })
      .await
  }

  async fn create_user(&self, input: NewUser) -> Result<User> {
    input.validate()?;
    let at = now();
    self
      .in_tx(move |conn| {
        require_active(conn, input.role_id)?;
        require_active(conn, input.environment_id)?;
        let id = insert(
          conn,
          EntityKind::User,
          &[
            ("first_name", text(input.first_name)),
            ("last_name", text(input.last_name)),
            ("email", text(input.email)),
            ("contact_number", opt_text(input.contact_number)),
            ("username", text(input.username)),
            ("password_hash", text(input.password_hash)),
            ("role_id", int(input.role_id.get())),
            ("environment_id", int(input.environment_id.get())),
          ],
          &at,
        )?;
        load(conn, UserId(id).into(), encode::user)
      })
      .await
  }

  async fn update_user(&self, id: UserId, patch: UserPatch) -> Result<User> {
    patch.validate()?;
    let at = now();
    self
      .in_tx(move |conn| {
        let mut sets = Vec::new();
        if let Some(v) = patch.first_name {
          sets.push(("first_name", text(v)));
        }
        if let Some(v) = patch.last_name {
          sets.push(("last_name", text(v)));
        }
        if let Some(v) = patch.email {
          sets.push(("email", text(v)));
        }
        if let Some(v) = patch.contact_number {
          sets.push(("contact_number", opt_text(v)));
        }
        if let Some(v) = patch.password_hash {
          sets.push(("password_hash", text(v)));
        }
        if let Some(role) = patch.role_id {
          require_active(conn, role)?;
          sets.push(("role_id", int(role.get())));
        }
        if let Some(env) = patch.environment_id {
          require_active(conn, env)?;
          sets.push(("environment_id", int(env.get())));
        }
        update(conn, id.into(), sets, &at)?;
        load(conn, id.into(), encode::user)
      })
      .await
  }

  async fn find_user<'a>(&'a self, username: &'a str) -> Result<Option<User>> {
    let username = username.to_owned();
    self
      .with_conn(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT * FROM users WHERE username = ?1 AND is_deleted = 0",
              [username],
              encode::user,
            )
            .optional()?,
        )
      })
      .await
  }

  async fn principal<'a>(&'a self, username: &'a str) -> Result<Option<Principal>> {
    let username = username.to_owned();
    self
      .with_conn(move |conn| {
        let found = conn
          .query_row(
            "SELECT u.id, u.username, u.environment_id, r.id, r.name, r.is_super_user
             FROM users u JOIN roles r ON r.id = u.role_id
             WHERE u.username = ?1 AND u.is_deleted = 0 AND r.is_deleted = 0",
            [username],
            |r| {
              Ok(Principal {
                user_id:        UserId(r.get(0)?),
                username:       r.get(1)?,
                environment_id: EnvironmentId(r.get(2)?),
                role_id:        RoleId(r.get(3)?),
                role_name:      r.get(4)?,
                is_super_user:  r.get(5)?,
                grants:         BTreeSet::new(),
              })
            },
          )
          .optional()?;
        let Some(mut principal) = found else {
          return Ok(None);
        };

        let mut stmt = conn.prepare(
          "SELECT p.name FROM role_permissions rp
           JOIN permissions p ON p.id = rp.permission_id
           WHERE rp.role_id = ?1 AND rp.is_deleted = 0 AND p.is_deleted = 0",
        )?;
        principal.grants = stmt
          .query_map([principal.role_id.get()], |r| r.get::<_, String>(0))?
          .collect::<rusqlite::Result<_>>()?;
        Ok(Some(principal))
      })
      .await
  }

  async fn users_in_environment(&self, environment: EnvironmentId) -> Result<Vec<User>> {
    self
      .with_conn(move |conn| {
        list(
          conn,
          "SELECT * FROM users WHERE environment_id = ?1 AND is_deleted = 0 ORDER BY id",
          [environment.get()],
          encode::user,
        )
      })
      .await
  }

  // ── Forms ─────────────────────────────────────────────────────────────────

  async fn create_question_type(&self, input: NewQuestionType) -> Result<QuestionType> {
    input.validate()?;
    let at = now();
    self
      .with_conn(move |conn| {
        let id = insert(conn, EntityKind::QuestionType, &[("label", text(input.label))], &at)?;
        load(conn, QuestionTypeId(id).into(), encode::question_type)
      })
      .await
  }

  async fn create_question(&self, input: NewQuestion) -> Result<Question> {
    input.validate()?;
    let at = now();
    self
      .in_tx(move |conn| {
        require_active(conn, input.question_type_id)?;
        let id = insert(
          conn,
          EntityKind::Question,
          &[
            ("text", text(input.text)),
            ("question_type_id", int(input.question_type_id.get())),
            ("remarks", opt_text(input.remarks)),
          ],
          &at,
        )?;
        load(conn, QuestionId(id).into(), encode::question)
      })
      .await
  }

  async fn update_question(&self, id: QuestionId, patch: QuestionPatch) -> Result<Question> {
    patch.validate()?;
    let at = now();
    self
      .in_tx(move |conn| {
        require_active(conn, id)?;
        if patch.alters_content() {
          let in_use: i64 = conn.query_row(
            "SELECT COUNT(*) FROM form_questions WHERE question_id = ?1 AND is_deleted = 0",
            [id.get()],
            |r| r.get(0),
          )?;
          if in_use > 0 {
            return Err(Error::Core(CoreError::EntityInUse {
              target:  id.into(),
              blocker: EntityKind::FormQuestion,
              count:   in_use as u64,
            }));
          }
        }

        let mut sets = Vec::new();
        if let Some(v) = patch.text {
          sets.push(("text", text(v)));
        }
        if let Some(ty) = patch.question_type_id {
          require_active(conn, ty)?;
          sets.push(("question_type_id", int(ty.get())));
        }
        if let Some(v) = patch.remarks {
          sets.push(("remarks", opt_text(v)));
        }
        update(conn, id.into(), sets, &at)?;
        load(conn, id.into(), encode::question)
      })
      .await
  }

  async fn create_answer(&self, input: NewAnswer) -> Result<Answer> {
    input.validate()?;
    let at = now();
    self
      .with_conn(move |conn| {
        let id = insert(
          conn,
          EntityKind::Answer,
          &[("value", text(input.value)), ("remarks", opt_text(input.remarks))],
          &at,
        )?;
        load(conn, AnswerId(id).into(), encode::answer)
      })
      .await
  }

  async fn create_form(&self, input: NewForm) -> Result<Form> {
    input.validate()?;
    let at = now();
    self
      .in_tx(move |conn| {
        require_active(conn, input.user_id)?;
        let id = insert(
          conn,
          EntityKind::Form,
          &[
            ("title", text(input.title)),
            ("description", opt_text(input.description)),
            ("user_id", int(input.user_id.get())),
            ("is_public", flag(input.is_public)),
          ],
          &at,
        )?;
        load(conn, FormId(id).into(), encode::form)
      })
      .await
  }

  async fn update_form(&self, id: FormId, patch: FormPatch) -> Result<Form> {
    patch.validate()?;
    let at = now();
    self
      .in_tx(move |conn| {
        let mut sets = Vec::new();
        if let Some(v) = patch.title {
          sets.push(("title", text(v)));
        }
        if let Some(v) = patch.description {
          sets.push(("description", opt_text(v)));
        }
        if let Some(v) = patch.is_public {
          sets.push(("is_public", flag(v)));
        }
        update(conn, id.into(), sets, &at)?;
        load(conn, id.into(), encode::form)
      })
      .await
  }

  async fn add_form_question(&self, input: NewFormQuestion) -> Result<FormQuestion> {
    let at = now();
    self
      .in_tx(move |conn| {
        require_active(conn, input.form_id)?;
        require_active(conn, input.question_id)?;
        let order = match input.order_number {
          Some(n) => n,
          None => conn.query_row(
            "SELECT COALESCE(MAX(order_number), 0) + 1 FROM form_questions
             WHERE form_id = ?1 AND is_deleted = 0",
            [input.form_id.get()],
            |r| r.get(0),
          )?,
        };
        let id = insert(
          conn,
          EntityKind::FormQuestion,
          &[
            ("form_id", int(input.form_id.get())),
            ("question_id", int(input.question_id.get())),
            ("order_number", int(order)),
          ],
          &at,
        )?;
        load(conn, FormQuestionId(id).into(), encode::form_question)
      })
      .await
  }

  async fn reorder_form_questions(
    &self,
    form: FormId,
    order: Vec<(FormQuestionId, i64)>,
  ) -> Result<Vec<FormQuestion>> {
    let at = now();
    self
      .in_tx(move |conn| {
        require_active(conn, form)?;
        for (id, position) in order {
          let changed = conn.execute(
            "UPDATE form_questions SET order_number = ?1, updated_at = ?2
             WHERE id = ?3 AND form_id = ?4 AND is_deleted = 0",
            params![position, at, id.get(), form.get()],
          )?;
          if changed == 0 {
            return Err(not_found(id));
          }
        }
        list(
          conn,
          "SELECT * FROM form_questions WHERE form_id = ?1 AND is_deleted = 0
           ORDER BY order_number, id",
          [form.get()],
          encode::form_question,
        )
      })
      .await
  }

  async fn add_form_answer(&self, input: NewFormAnswer) -> Result<FormAnswer> {
    let at = now();
    self
      .in_tx(move |conn| {
        require_active(conn, input.form_question_id)?;
        require_active(conn, input.answer_id)?;
        let id = insert(
          conn,
          EntityKind::FormAnswer,
          &[
            ("form_question_id", int(input.form_question_id.get())),
            ("answer_id", int(input.answer_id.get())),
            ("remarks", opt_text(input.remarks)),
          ],
          &at,
        )?;
        load(conn, FormAnswerId(id).into(), encode::form_answer)
      })
      .await
  }

  async fn submit_form(&self, input: NewSubmission, at: DateTime<Utc>) -> Result<FormSubmission> {
    input.validate()?;
    let at = encode_dt(at);
    self
      .in_tx(move |conn| {
        require_active(conn, input.form_id)?;
        let id = insert(
          conn,
          EntityKind::FormSubmission,
          &[
            ("form_id", int(input.form_id.get())),
            ("submitted_by", text(input.submitted_by)),
            ("submitted_at", text(at.clone())),
          ],
          &at,
        )?;
        let submission = FormSubmissionId(id);

        for answer in input.answers {
          let belongs = conn
            .query_row(
              "SELECT 1 FROM form_answers fa
               JOIN form_questions fq ON fq.id = fa.form_question_id
               WHERE fa.id = ?1 AND fq.form_id = ?2
                 AND fa.is_deleted = 0 AND fq.is_deleted = 0",
              params![answer.get(), input.form_id.get()],
              |_| Ok(()),
            )
            .optional()?
            .is_some();
          if !belongs {
            return Err(Error::Core(CoreError::Validation(format!(
              "form answer {answer} does not belong to form {}",
              input.form_id
            ))));
          }
          insert(
            conn,
            EntityKind::AnswerSubmitted,
            &[("form_answer_id", int(answer.get())), ("form_submission_id", int(id))],
            &at,
          )?;
        }

        for attachment in input.attachments {
          insert_attachment(conn, submission, attachment, &at)?;
        }

        load(conn, submission.into(), encode::form_submission)
      })
      .await
  }

  async fn add_attachment(
    &self,
    submission: FormSubmissionId,
    input: NewAttachment,
  ) -> Result<Attachment> {
    input.validate()?;
    let at = now();
    self
      .in_tx(move |conn| {
        require_active(conn, submission)?;
        insert_attachment(conn, submission, input, &at)
      })
      .await
  }

  async fn forms_in_environment(&self, environment: EnvironmentId) -> Result<Vec<Form>> {
    self
      .with_conn(move |conn| {
        list(
          conn,
          "SELECT f.* FROM forms f JOIN users u ON u.id = f.user_id
           WHERE u.environment_id = ?1 AND f.is_deleted = 0
           ORDER BY f.id",
          [environment.get()],
          encode::form,
        )
      })
      .await
  }

  // ── Generic ───────────────────────────────────────────────────────────────

  async fn get(&self, target: EntityRef, include_deleted: bool) -> Result<Option<Record>> {
    self
      .with_conn(move |conn| cascade::fetch(conn, target, include_deleted))
      .await
  }

  async fn environment_of(&self, target: EntityRef) -> Result<Option<EnvironmentId>> {
    self
      .with_conn(move |conn| cascade::environment_of(conn, target))
      .await
  }

  async fn soft_delete(&self, target: EntityRef, at: DateTime<Utc>) -> Result<DeletionStats> {
    let stats = self
      .with_conn(move |conn| cascade::soft_delete(conn, target, at))
      .await?;
    tracing::info!(%target, ?stats, "soft delete committed");
    Ok(stats)
  }

  async fn hard_delete(&self, target: EntityRef) -> Result<DeletionStats> {
    self
      .with_conn(move |conn| cascade::hard_delete(conn, target))
      .await
  }

  async fn restore(&self, target: EntityRef, at: DateTime<Utc>) -> Result<Option<Record>> {
    self
      .with_conn(move |conn| cascade::restore(conn, target, at))
      .await
  }
}
