//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings. Booleans are stored as 0/1.
//! Row decoders read columns by name so every query can `SELECT *`.

use chrono::{DateTime, Utc};
use rusqlite::{Row, types::Type};

use formwork_core::{
  access::{Environment, Permission, Role, RolePermission, User},
  form::{
    Answer, AnswerSubmitted, Attachment, Form, FormAnswer, FormQuestion, FormSubmission,
    Question, QuestionType,
  },
  graph::EntityKind,
  id::{
    AnswerId, AnswerSubmittedId, AttachmentId, EnvironmentId, FormAnswerId, FormId,
    FormQuestionId, FormSubmissionId, PermissionId, QuestionId, QuestionTypeId, RoleId,
    RolePermissionId, UserId,
  },
  lifecycle::Timestamps,
  record::Record,
};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

/// Read a timestamp column inside a row-mapping closure.
fn dt_col(row: &Row<'_>, col: &str) -> rusqlite::Result<DateTime<Utc>> {
  let raw: String = row.get(col)?;
  parse_col(row, col, &raw)
}

fn opt_dt_col(row: &Row<'_>, col: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
  let raw: Option<String> = row.get(col)?;
  raw.map(|s| parse_col(row, col, &s)).transpose()
}

fn parse_col(row: &Row<'_>, col: &str, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(raw)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| {
      let idx = row.as_ref().column_index(col).unwrap_or(0);
      rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

fn stamps(row: &Row<'_>) -> rusqlite::Result<Timestamps> {
  Ok(Timestamps {
    created_at: dt_col(row, "created_at")?,
    updated_at: dt_col(row, "updated_at")?,
    deleted_at: opt_dt_col(row, "deleted_at")?,
  })
}

// ─── Row decoders ────────────────────────────────────────────────────────────

pub fn environment(row: &Row<'_>) -> rusqlite::Result<Environment> {
  Ok(Environment {
    id:          EnvironmentId(row.get("id")?),
    name:        row.get("name")?,
    description: row.get("description")?,
    stamps:      stamps(row)?,
  })
}

pub fn role(row: &Row<'_>) -> rusqlite::Result<Role> {
  Ok(Role {
    id:            RoleId(row.get("id")?),
    name:          row.get("name")?,
    description:   row.get("description")?,
    is_super_user: row.get("is_super_user")?,
    stamps:        stamps(row)?,
  })
}

pub fn permission(row: &Row<'_>) -> rusqlite::Result<Permission> {
  Ok(Permission {
    id:          PermissionId(row.get("id")?),
    name:        row.get("name")?,
    description: row.get("description")?,
    stamps:      stamps(row)?,
  })
}

pub fn role_permission(row: &Row<'_>) -> rusqlite::Result<RolePermission> {
  Ok(RolePermission {
    id:            RolePermissionId(row.get("id")?),
    role_id:       RoleId(row.get("role_id")?),
    permission_id: PermissionId(row.get("permission_id")?),
    stamps:        stamps(row)?,
  })
}

pub fn user(row: &Row<'_>) -> rusqlite::Result<User> {
  Ok(User {
    id:             UserId(row.get("id")?),
    first_name:     row.get("first_name")?,
    last_name:      row.get("last_name")?,
    email:          row.get("email")?,
    contact_number: row.get("contact_number")?,
    username:       row.get("username")?,
    password_hash:  row.get("password_hash")?,
    role_id:        RoleId(row.get("role_id")?),
    environment_id: EnvironmentId(row.get("environment_id")?),
    stamps:         stamps(row)?,
  })
}

pub fn question_type(row: &Row<'_>) -> rusqlite::Result<QuestionType> {
  Ok(QuestionType {
    id:     QuestionTypeId(row.get("id")?),
    label:  row.get("label")?,
    stamps: stamps(row)?,
  })
}

pub fn question(row: &Row<'_>) -> rusqlite::Result<Question> {
  Ok(Question {
    id:               QuestionId(row.get("id")?),
    text:             row.get("text")?,
    question_type_id: QuestionTypeId(row.get("question_type_id")?),
    remarks:          row.get("remarks")?,
    stamps:           stamps(row)?,
  })
}

pub fn answer(row: &Row<'_>) -> rusqlite::Result<Answer> {
  Ok(Answer {
    id:      AnswerId(row.get("id")?),
    value:   row.get("value")?,
    remarks: row.get("remarks")?,
    stamps:  stamps(row)?,
  })
}

pub fn form(row: &Row<'_>) -> rusqlite::Result<Form> {
  Ok(Form {
    id:          FormId(row.get("id")?),
    title:       row.get("title")?,
    description: row.get("description")?,
    user_id:     UserId(row.get("user_id")?),
    is_public:   row.get("is_public")?,
    stamps:      stamps(row)?,
  })
}

pub fn form_question(row: &Row<'_>) -> rusqlite::Result<FormQuestion> {
  Ok(FormQuestion {
    id:           FormQuestionId(row.get("id")?),
    form_id:      FormId(row.get("form_id")?),
    question_id:  QuestionId(row.get("question_id")?),
    order_number: row.get("order_number")?,
    stamps:       stamps(row)?,
  })
}

pub fn form_answer(row: &Row<'_>) -> rusqlite::Result<FormAnswer> {
  Ok(FormAnswer {
    id:               FormAnswerId(row.get("id")?),
    form_question_id: FormQuestionId(row.get("form_question_id")?),
    answer_id:        AnswerId(row.get("answer_id")?),
    remarks:          row.get("remarks")?,
    stamps:           stamps(row)?,
  })
}

pub fn form_submission(row: &Row<'_>) -> rusqlite::Result<FormSubmission> {
  Ok(FormSubmission {
    id:           FormSubmissionId(row.get("id")?),
    form_id:      FormId(row.get("form_id")?),
    submitted_by: row.get("submitted_by")?,
    submitted_at: dt_col(row, "submitted_at")?,
    stamps:       stamps(row)?,
  })
}

pub fn answer_submitted(row: &Row<'_>) -> rusqlite::Result<AnswerSubmitted> {
  Ok(AnswerSubmitted {
    id:                 AnswerSubmittedId(row.get("id")?),
    form_answer_id:     FormAnswerId(row.get("form_answer_id")?),
    form_submission_id: FormSubmissionId(row.get("form_submission_id")?),
    stamps:             stamps(row)?,
  })
}

pub fn attachment(row: &Row<'_>) -> rusqlite::Result<Attachment> {
  Ok(Attachment {
    id:                 AttachmentId(row.get("id")?),
    form_submission_id: FormSubmissionId(row.get("form_submission_id")?),
    file_type:          row.get("file_type")?,
    file_path:          row.get("file_path")?,
    is_signature:       row.get("is_signature")?,
    stamps:             stamps(row)?,
  })
}

/// Decode a row of `kind`'s table into the matching [`Record`] variant.
pub fn record(kind: EntityKind, row: &Row<'_>) -> rusqlite::Result<Record> {
  use EntityKind as K;
  Ok(match kind {
    K::Environment => Record::Environment(environment(row)?),
    K::Role => Record::Role(role(row)?),
    K::Permission => Record::Permission(permission(row)?),
    K::RolePermission => Record::RolePermission(role_permission(row)?),
    K::User => Record::User(user(row)?),
    K::QuestionType => Record::QuestionType(question_type(row)?),
    K::Question => Record::Question(question(row)?),
    K::Answer => Record::Answer(answer(row)?),
    K::Form => Record::Form(form(row)?),
    K::FormQuestion => Record::FormQuestion(form_question(row)?),
    K::FormAnswer => Record::FormAnswer(form_answer(row)?),
    K::FormSubmission => Record::FormSubmission(form_submission(row)?),
    K::AnswerSubmitted => Record::AnswerSubmitted(answer_submitted(row)?),
    K::Attachment => Record::Attachment(attachment(row)?),
  })
}
