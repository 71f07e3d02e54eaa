//! Form-building and submission entities.
//!
//! Question types, questions and answers are shared pools. A form owns its
//! ordered form questions, each form question owns the candidate answers
//! mapped to it, and each submission owns its submitted answers and
//! attachments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Result,
  access::require_text,
  error::invalid,
  id::{
    AnswerId, AnswerSubmittedId, AttachmentId, FormAnswerId, FormId,
    FormQuestionId, FormSubmissionId, QuestionId, QuestionTypeId, UserId,
  },
  lifecycle::Timestamps,
};

// ─── Shared pools ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionType {
  pub id:     QuestionTypeId,
  /// Display label, e.g. `"checkbox"` or `"text"`.
  pub label:  String,
  #[serde(flatten)]
  pub stamps: Timestamps,
}

#[derive(Debug, Clone)]
pub struct NewQuestionType {
  pub label: String,
}

impl NewQuestionType {
  pub fn validate(&self) -> Result<()> { require_text("question type", &self.label, 255) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
  pub id:               QuestionId,
  pub text:             String,
  pub question_type_id: QuestionTypeId,
  pub remarks:          Option<String>,
  #[serde(flatten)]
  pub stamps:           Timestamps,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
  pub text:             String,
  pub question_type_id: QuestionTypeId,
  pub remarks:          Option<String>,
}

impl NewQuestion {
  pub fn validate(&self) -> Result<()> { require_text("question text", &self.text, 255) }
}

#[derive(Debug, Clone, Default)]
pub struct QuestionPatch {
  pub text:             Option<String>,
  pub question_type_id: Option<QuestionTypeId>,
  pub remarks:          Option<Option<String>>,
}

impl QuestionPatch {
  pub fn validate(&self) -> Result<()> {
    if let Some(text) = &self.text {
      require_text("question text", text, 255)?;
    }
    Ok(())
  }

  /// Whether the patch touches anything besides `remarks`. A question that is
  /// in use by an active form may only have its remarks changed.
  pub fn alters_content(&self) -> bool {
    self.text.is_some() || self.question_type_id.is_some()
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
  pub id:      AnswerId,
  pub value:   String,
  pub remarks: Option<String>,
  #[serde(flatten)]
  pub stamps:  Timestamps,
}

#[derive(Debug, Clone)]
pub struct NewAnswer {
  pub value:   String,
  pub remarks: Option<String>,
}

impl NewAnswer {
  pub fn validate(&self) -> Result<()> {
    if self.value.trim().is_empty() {
      return Err(invalid("answer value cannot be empty"));
    }
    Ok(())
  }
}

// ─── Forms ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
  pub id:          FormId,
  pub title:       String,
  pub description: Option<String>,
  /// The creator. Forms are scoped to the creator's environment.
  pub user_id:     UserId,
  pub is_public:   bool,
  #[serde(flatten)]
  pub stamps:      Timestamps,
}

#[derive(Debug, Clone)]
pub struct NewForm {
  pub title:       String,
  pub description: Option<String>,
  pub user_id:     UserId,
  pub is_public:   bool,
}

impl NewForm {
  pub fn validate(&self) -> Result<()> { require_text("form title", &self.title, 255) }
}

#[derive(Debug, Clone, Default)]
pub struct FormPatch {
  pub title:       Option<String>,
  pub description: Option<Option<String>>,
  pub is_public:   Option<bool>,
}

impl FormPatch {
  pub fn validate(&self) -> Result<()> {
    if let Some(title) = &self.title {
      require_text("form title", title, 255)?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormQuestion {
  pub id:           FormQuestionId,
  pub form_id:      FormId,
  pub question_id:  QuestionId,
  pub order_number: Option<i64>,
  #[serde(flatten)]
  pub stamps:       Timestamps,
}

#[derive(Debug, Clone)]
pub struct NewFormQuestion {
  pub form_id:      FormId,
  pub question_id:  QuestionId,
  /// Defaults to one past the highest active order number in the form.
  pub order_number: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormAnswer {
  pub id:               FormAnswerId,
  pub form_question_id: FormQuestionId,
  pub answer_id:        AnswerId,
  pub remarks:          Option<String>,
  #[serde(flatten)]
  pub stamps:           Timestamps,
}

#[derive(Debug, Clone)]
pub struct NewFormAnswer {
  pub form_question_id: FormQuestionId,
  pub answer_id:        AnswerId,
  pub remarks:          Option<String>,
}

// ─── Submissions ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSubmission {
  pub id:           FormSubmissionId,
  pub form_id:      FormId,
  /// Username of the submitting principal.
  pub submitted_by: String,
  pub submitted_at: DateTime<Utc>,
  #[serde(flatten)]
  pub stamps:       Timestamps,
}

/// Links a chosen candidate answer to the submission it was given in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSubmitted {
  pub id:                 AnswerSubmittedId,
  pub form_answer_id:     FormAnswerId,
  pub form_submission_id: FormSubmissionId,
  #[serde(flatten)]
  pub stamps:             Timestamps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
  pub id:                 AttachmentId,
  pub form_submission_id: FormSubmissionId,
  pub file_type:          String,
  /// Storage key. File bytes live outside the database.
  pub file_path:          String,
  pub is_signature:       bool,
  #[serde(flatten)]
  pub stamps:             Timestamps,
}

#[derive(Debug, Clone)]
pub struct NewAttachment {
  pub file_type:    String,
  pub file_path:    String,
  pub is_signature: bool,
}

impl NewAttachment {
  pub fn validate(&self) -> Result<()> {
    require_text("file type", &self.file_type, 50)?;
    require_text("file path", &self.file_path, 255)?;
    if self.file_path.contains("..") {
      return Err(invalid("file path must not traverse directories"));
    }
    Ok(())
  }
}

/// Input to [`crate::store::FormStore::submit_form`]. The submission, its
/// answers and its attachments are written in one transaction.
#[derive(Debug, Clone)]
pub struct NewSubmission {
  pub form_id:      FormId,
  /// Set by the service from the authenticated principal.
  pub submitted_by: String,
  pub answers:      Vec<FormAnswerId>,
  pub attachments:  Vec<NewAttachment>,
}

impl NewSubmission {
  pub fn validate(&self) -> Result<()> {
    if self.answers.is_empty() && self.attachments.is_empty() {
      return Err(invalid("a submission needs at least one answer or attachment"));
    }
    let mut seen = std::collections::BTreeSet::new();
    for id in &self.answers {
      if !seen.insert(*id) {
        return Err(invalid(format!("form answer {id} submitted twice")));
      }
    }
    self.attachments.iter().try_for_each(NewAttachment::validate)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn remarks_only_patch_does_not_alter_content() {
    let patch = QuestionPatch {
      remarks: Some(Some("clarified wording".into())),
      ..Default::default()
    };
    assert!(!patch.alters_content());

    let patch = QuestionPatch {
      text: Some("Is the valve closed?".into()),
      ..Default::default()
    };
    assert!(patch.alters_content());
  }

  #[test]
  fn submission_rejects_duplicate_answers() {
    let sub = NewSubmission {
      form_id:      FormId(1),
      submitted_by: "tech01".into(),
      answers:      vec![FormAnswerId(4), FormAnswerId(4)],
      attachments:  vec![],
    };
    assert!(sub.validate().is_err());
  }

  #[test]
  fn attachment_paths_cannot_escape() {
    let att = NewAttachment {
      file_type:    "image/png".into(),
      file_path:    "../etc/passwd".into(),
      is_signature: false,
    };
    assert!(att.validate().is_err());
  }
}
