use chrono::Utc;
use formwork_core::{
  Error as CoreError,
  access::NewPermission,
  form::{NewAttachment, NewSubmission},
  graph::{EntityKind, EntityRef},
  id::RoleId,
  record::Record,
  store::FormStore,
};

use super::{count, store, world};
use crate::Error;

#[tokio::test]
async fn form_delete_tombstones_its_tree_only() {
  let s = store().await;
  let w = world(&s).await;

  let stats = s.soft_delete(w.f1.into(), Utc::now()).await.unwrap();
  assert_eq!(stats.get("forms"), 1);
  assert_eq!(stats.get("form_questions"), 2);
  assert_eq!(stats.get("form_answers"), 1);
  assert_eq!(stats.get("form_submissions"), 1);
  assert_eq!(stats.get("answers_submitted"), 1);
  assert_eq!(stats.get("attachments"), 0);
  assert_eq!(stats.iter().count(), 6);

  // Shared pools survive.
  assert!(s.get(w.q1.into(), false).await.unwrap().is_some());
  assert!(s.get(w.q2.into(), false).await.unwrap().is_some());
  assert!(s.get(w.a1.into(), false).await.unwrap().is_some());

  // Tombstoned rows are hidden but not gone.
  assert!(s.get(w.fq1.into(), false).await.unwrap().is_none());
  let fq1 = s.get(w.fq1.into(), true).await.unwrap().unwrap();
  assert!(fq1.is_deleted());
  assert_eq!(fq1.stamps().deleted_at, s
    .get(w.f1.into(), true)
    .await
    .unwrap()
    .unwrap()
    .stamps()
    .deleted_at);
}

#[tokio::test]
async fn deleting_twice_is_not_found() {
  let s = store().await;
  let w = world(&s).await;

  s.soft_delete(w.f1.into(), Utc::now()).await.unwrap();
  let err = s.soft_delete(w.f1.into(), Utc::now()).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::NotFound(t)) if t == EntityRef::from(w.f1)));
}

#[tokio::test]
async fn missing_target_is_not_found() {
  let s = store().await;
  let err = s
    .soft_delete(EntityRef::new(EntityKind::Form, 999), Utc::now())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::NotFound(_))));
}

#[tokio::test]
async fn question_in_use_is_refused() {
  let s = store().await;
  let w = world(&s).await;

  let err = s.soft_delete(w.q1.into(), Utc::now()).await.unwrap_err();
  match err {
    Error::Core(CoreError::EntityInUse { target, blocker, count }) => {
      assert_eq!(target, EntityRef::from(w.q1));
      assert_eq!(blocker, EntityKind::FormQuestion);
      assert_eq!(count, 1);
    }
    other => panic!("expected in-use, got {other:?}"),
  }
  assert!(s.get(w.q1.into(), false).await.unwrap().is_some());

  // Once the referencing form is gone, the question is free.
  s.soft_delete(w.f1.into(), Utc::now()).await.unwrap();
  let stats = s.soft_delete(w.q1.into(), Utc::now()).await.unwrap();
  assert_eq!(stats.get("questions"), 1);
  assert_eq!(stats.get("form_questions"), 0);
}

#[tokio::test]
async fn form_answer_with_submissions_is_in_use() {
  let s = store().await;
  let w = world(&s).await;

  let err = s.soft_delete(w.fa1.into(), Utc::now()).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(CoreError::EntityInUse { blocker: EntityKind::AnswerSubmitted, count: 1, .. })
  ));
}

#[tokio::test]
async fn user_delete_reaches_submissions_by_username() {
  let s = store().await;
  let w = world(&s).await;

  let stats = s.soft_delete(w.tech01.into(), Utc::now()).await.unwrap();
  assert_eq!(stats.get("users"), 1);
  assert_eq!(stats.get("forms"), 0);
  assert_eq!(stats.get("form_submissions"), 1);
  assert_eq!(stats.get("answers_submitted"), 1);

  // The form itself belongs to the manager and stays.
  assert!(s.get(w.f1.into(), false).await.unwrap().is_some());
  assert!(s.get(w.sub1.into(), false).await.unwrap().is_none());
}

#[tokio::test]
async fn environment_delete_cascades_through_users() {
  let s = store().await;
  let w = world(&s).await;

  let stats = s.soft_delete(w.north.into(), Utc::now()).await.unwrap();
  assert_eq!(stats.get("environments"), 1);
  assert_eq!(stats.get("users"), 4);
  assert_eq!(stats.get("forms"), 1);
  assert_eq!(stats.get("form_submissions"), 1);
  assert_eq!(stats.get("form_questions"), 2);

  assert!(s.get(w.south.into(), false).await.unwrap().is_some());
  assert_eq!(count(&s, "users", true).await, 2);
}

#[tokio::test]
async fn failed_cascade_rolls_back_everything() {
  let s = store().await;
  let w = world(&s).await;
  s.add_attachment(w.sub1, NewAttachment {
    file_type:    "image/png".into(),
    file_path:    "uploads/sig.png".into(),
    is_signature: true,
  })
  .await
  .unwrap();

  s.conn
    .call(|conn| {
      conn.execute_batch(
        "CREATE TRIGGER attachments_offline BEFORE UPDATE ON attachments
         BEGIN SELECT RAISE(ABORT, 'attachment storage offline'); END;",
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let err = s.soft_delete(w.north.into(), Utc::now()).await.unwrap_err();
  let core = CoreError::from(err);
  assert!(matches!(&core, CoreError::Transaction(msg) if msg.contains("attachment storage offline")));

  for table in ["environments", "users", "forms", "form_questions", "form_submissions"] {
    assert_eq!(
      count(&s, table, true).await,
      count(&s, table, false).await,
      "{table} has tombstones after rollback"
    );
  }
}

#[tokio::test]
async fn restore_revives_one_row_only() {
  let s = store().await;
  let w = world(&s).await;
  s.soft_delete(w.f1.into(), Utc::now()).await.unwrap();

  let restored = s.restore(w.f1.into(), Utc::now()).await.unwrap();
  assert!(matches!(restored, Some(Record::Form(ref f)) if f.id == w.f1));
  assert!(s.get(w.fq1.into(), false).await.unwrap().is_none());
  assert!(s.get(w.sub1.into(), false).await.unwrap().is_none());

  // Restoring an active row is a no-op.
  assert!(s.restore(w.f1.into(), Utc::now()).await.unwrap().is_none());
}

#[tokio::test]
async fn restore_respects_active_uniqueness() {
  let s = store().await;
  let w = world(&s).await;

  s.soft_delete(w.fq2.into(), Utc::now()).await.unwrap();
  s.add_form_question(formwork_core::form::NewFormQuestion {
    form_id:      w.f1,
    question_id:  w.q2,
    order_number: None,
  })
  .await
  .unwrap();

  let err = s.restore(w.fq2.into(), Utc::now()).await.unwrap_err();
  assert!(matches!(CoreError::from(err), CoreError::Conflict(_)));
}

#[tokio::test]
async fn grant_can_be_recreated_after_delete() {
  let s = store().await;
  let perm = s
    .create_permission(NewPermission { name: "export_forms".into(), description: None })
    .await
    .unwrap();

  let grant = s.assign_permission(RoleId(3), perm.id).await.unwrap();
  let dup = s.assign_permission(RoleId(3), perm.id).await.unwrap_err();
  assert!(matches!(dup, Error::Core(CoreError::Conflict(_))));

  let stats = s.hard_delete(grant.id.into()).await.unwrap();
  assert_eq!(stats.get("role_permissions"), 1);
  assert!(s.get(grant.id.into(), true).await.unwrap().is_none());

  let again = s.assign_permission(RoleId(3), perm.id).await.unwrap();
  assert!(again.stamps.deleted_at.is_none());
}

#[tokio::test]
async fn tombstoned_grant_does_not_block_reassignment() {
  let s = store().await;
  let perm = s
    .create_permission(NewPermission { name: "export_forms".into(), description: None })
    .await
    .unwrap();

  let grant = s.assign_permission(RoleId(3), perm.id).await.unwrap();
  s.soft_delete(grant.id.into(), Utc::now()).await.unwrap();
  assert!(s.find_role_permission(RoleId(3), perm.id).await.unwrap().is_none());

  let again = s.assign_permission(RoleId(3), perm.id).await.unwrap();
  assert_ne!(again.id, grant.id);
  assert!(again.stamps.deleted_at.is_none());
  let Some(Record::RolePermission(old)) = s.get(grant.id.into(), true).await.unwrap() else {
    panic!("tombstoned grant missing");
  };
  assert!(old.stamps.deleted_at.is_some());
  assert_eq!(count(&s, "role_permissions", false).await, 2);
  assert_eq!(count(&s, "role_permissions", true).await, 1);

  let dup = s.assign_permission(RoleId(3), perm.id).await.unwrap_err();
  assert!(matches!(dup, Error::Core(CoreError::Conflict(_))));
}

#[tokio::test]
async fn permission_blocked_while_granted_to_active_role() {
  let s = store().await;
  let perm = s
    .create_permission(NewPermission { name: "export_forms".into(), description: None })
    .await
    .unwrap();
  s.assign_permission(RoleId(3), perm.id).await.unwrap();

  let err = s.soft_delete(perm.id.into(), Utc::now()).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(CoreError::EntityInUse { blocker: EntityKind::RolePermission, .. })
  ));
}

#[tokio::test]
async fn hard_delete_of_missing_row_is_not_found() {
  let s = store().await;
  let err = s
    .hard_delete(EntityRef::new(EntityKind::RolePermission, 42))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::NotFound(_))));
}

#[tokio::test]
async fn scope_resolves_up_the_chain() {
  let s = store().await;
  let w = world(&s).await;
  let sub = s
    .submit_form(
      NewSubmission {
        form_id:      w.f1,
        submitted_by: "tech01".into(),
        answers:      vec![],
        attachments:  vec![NewAttachment {
          file_type:    "application/pdf".into(),
          file_path:    "uploads/report.pdf".into(),
          is_signature: false,
        }],
      },
      Utc::now(),
    )
    .await
    .unwrap();
  let attachment_id = s
    .conn
    .call(move |conn| {
      Ok(conn.query_row(
        "SELECT id FROM attachments WHERE form_submission_id = ?1",
        [sub.id.get()],
        |r| r.get::<_, i64>(0),
      )?)
    })
    .await
    .unwrap();

  let env = s
    .environment_of(EntityRef::new(EntityKind::Attachment, attachment_id))
    .await
    .unwrap();
  assert_eq!(env, Some(w.north));
  assert_eq!(s.environment_of(w.fa1.into()).await.unwrap(), Some(w.north));
  assert_eq!(s.environment_of(w.north.into()).await.unwrap(), Some(w.north));
  assert_eq!(s.environment_of(w.q1.into()).await.unwrap(), None);
  assert_eq!(
    s.environment_of(EntityRef::new(EntityKind::Form, 999)).await.unwrap(),
    None
  );
  assert_eq!(s.environment_of(w.manager.into()).await.unwrap(), Some(w.north));
}
