//! Integration tests for `SqliteStore` against an in-memory database.

mod cascade;

use formwork_core::{
  access::{NewEnvironment, NewUser},
  form::{NewAnswer, NewForm, NewFormAnswer, NewFormQuestion, NewQuestion, NewSubmission},
  id::{
    AnswerId, EnvironmentId, FormAnswerId, FormId, FormQuestionId, FormSubmissionId,
    QuestionId, QuestionTypeId, RoleId, UserId,
  },
  store::FormStore,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  let s = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  s.bootstrap().await.expect("bootstrap");
  s
}

/// Ids of the rows created by [`world`].
struct World {
  north:    EnvironmentId,
  south:    EnvironmentId,
  manager:  UserId,
  tech01:   UserId,
  q1:       QuestionId,
  q2:       QuestionId,
  a1:       AnswerId,
  f1:       FormId,
  fq1:      FormQuestionId,
  fq2:      FormQuestionId,
  fa1:      FormAnswerId,
  sub1:     FormSubmissionId,
}

async fn add_user(
  s: &SqliteStore,
  username: &str,
  role: i64,
  environment: EnvironmentId,
) -> UserId {
  s.create_user(NewUser {
    first_name:     "Test".into(),
    last_name:      username.into(),
    email:          format!("{username}@example.com"),
    contact_number: None,
    username:       username.into(),
    password_hash:  "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaGhhc2g".into(),
    role_id:        RoleId(role),
    environment_id: environment,
  })
  .await
  .unwrap()
  .id
}

/// Two environments with users in each, and one form in `north` with two
/// questions, one mapped answer and one submission choosing it.
///
/// Users: `root` (Admin), `manager` (Site Manager, north), `super_n`
/// (Supervisor, north), `tech01` (Technician, north), `tech02` (Technician,
/// north), `manager_s` (Site Manager, south).
async fn world(s: &SqliteStore) -> World {
  let admin_env = EnvironmentId::ADMIN;
  let north = s
    .create_environment(NewEnvironment { name: "North".into(), description: None })
    .await
    .unwrap()
    .id;
  let south = s
    .create_environment(NewEnvironment { name: "South".into(), description: None })
    .await
    .unwrap()
    .id;

  add_user(s, "root", 1, admin_env).await;
  let manager = add_user(s, "manager", 2, north).await;
  add_user(s, "super_n", 3, north).await;
  let tech01 = add_user(s, "tech01", 4, north).await;
  add_user(s, "tech02", 4, north).await;
  add_user(s, "manager_s", 2, south).await;

  let q1 = s
    .create_question(NewQuestion {
      text:             "Is the valve closed?".into(),
      question_type_id: QuestionTypeId(1),
      remarks:          None,
    })
    .await
    .unwrap()
    .id;
  let q2 = s
    .create_question(NewQuestion {
      text:             "Pressure reading".into(),
      question_type_id: QuestionTypeId(1),
      remarks:          None,
    })
    .await
    .unwrap()
    .id;
  let a1 = s
    .create_answer(NewAnswer { value: "Yes".into(), remarks: None })
    .await
    .unwrap()
    .id;

  let f1 = s
    .create_form(NewForm {
      title:       "Daily inspection".into(),
      description: None,
      user_id:     manager,
      is_public:   true,
    })
    .await
    .unwrap()
    .id;
  let fq1 = s
    .add_form_question(NewFormQuestion { form_id: f1, question_id: q1, order_number: None })
    .await
    .unwrap()
    .id;
  let fq2 = s
    .add_form_question(NewFormQuestion { form_id: f1, question_id: q2, order_number: None })
    .await
    .unwrap()
    .id;
  let fa1 = s
    .add_form_answer(NewFormAnswer { form_question_id: fq1, answer_id: a1, remarks: None })
    .await
    .unwrap()
    .id;
  let sub1 = s
    .submit_form(
      NewSubmission {
        form_id:      f1,
        submitted_by: "tech01".into(),
        answers:      vec![fa1],
        attachments:  vec![],
      },
      chrono::Utc::now(),
    )
    .await
    .unwrap()
    .id;

  World { north, south, manager, tech01, q1, q2, a1, f1, fq1, fq2, fa1, sub1 }
}

/// Count rows in `table` straight from SQL, optionally only active ones.
async fn count(s: &SqliteStore, table: &'static str, active_only: bool) -> i64 {
  let filter = if active_only { " WHERE is_deleted = 0" } else { "" };
  let sql = format!("SELECT COUNT(*) FROM {table}{filter}");
  s.conn
    .call(move |conn| Ok(conn.query_row(&sql, [], |r| r.get::<_, i64>(0))?))
    .await
    .unwrap()
}
