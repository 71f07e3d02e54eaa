//! SQL schema for the Formwork SQLite store.
//!
//! Every table carries the same bookkeeping columns. `is_deleted` and
//! `deleted_at` are kept in lockstep by a CHECK constraint. Pairs that may
//! be re-created after a delete are unique among active rows only, through
//! partial indexes.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS environments (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    is_deleted  INTEGER NOT NULL DEFAULT 0,
    deleted_at  TEXT,
    CHECK ((is_deleted = 0 AND deleted_at IS NULL) OR (is_deleted = 1 AND deleted_at IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS roles (
    id            INTEGER PRIMARY KEY,
    name          TEXT NOT NULL UNIQUE,
    description   TEXT,
    is_super_user INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    is_deleted    INTEGER NOT NULL DEFAULT 0,
    deleted_at    TEXT,
    CHECK ((is_deleted = 0 AND deleted_at IS NULL) OR (is_deleted = 1 AND deleted_at IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS permissions (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    is_deleted  INTEGER NOT NULL DEFAULT 0,
    deleted_at  TEXT,
    CHECK ((is_deleted = 0 AND deleted_at IS NULL) OR (is_deleted = 1 AND deleted_at IS NOT NULL))
);

-- Hard deleted when revoked directly; tombstoned when reached by a cascade.
CREATE TABLE IF NOT EXISTS role_permissions (
    id            INTEGER PRIMARY KEY,
    role_id       INTEGER NOT NULL REFERENCES roles(id),
    permission_id INTEGER NOT NULL REFERENCES permissions(id),
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    is_deleted    INTEGER NOT NULL DEFAULT 0,
    deleted_at    TEXT,
    CHECK ((is_deleted = 0 AND deleted_at IS NULL) OR (is_deleted = 1 AND deleted_at IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS users (
    id             INTEGER PRIMARY KEY,
    first_name     TEXT NOT NULL,
    last_name      TEXT NOT NULL,
    email          TEXT NOT NULL,
    contact_number TEXT,
    username       TEXT NOT NULL UNIQUE,
    password_hash  TEXT NOT NULL,   -- argon2 PHC string
    role_id        INTEGER NOT NULL REFERENCES roles(id),
    environment_id INTEGER NOT NULL REFERENCES environments(id),
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    is_deleted     INTEGER NOT NULL DEFAULT 0,
    deleted_at     TEXT,
    CHECK ((is_deleted = 0 AND deleted_at IS NULL) OR (is_deleted = 1 AND deleted_at IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS question_types (
    id         INTEGER PRIMARY KEY,
    label      TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    deleted_at TEXT,
    CHECK ((is_deleted = 0 AND deleted_at IS NULL) OR (is_deleted = 1 AND deleted_at IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS questions (
    id               INTEGER PRIMARY KEY,
    text             TEXT NOT NULL,
    question_type_id INTEGER NOT NULL REFERENCES question_types(id),
    remarks          TEXT,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    is_deleted       INTEGER NOT NULL DEFAULT 0,
    deleted_at       TEXT,
    CHECK ((is_deleted = 0 AND deleted_at IS NULL) OR (is_deleted = 1 AND deleted_at IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS answers (
    id         INTEGER PRIMARY KEY,
    value      TEXT NOT NULL,
    remarks    TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    deleted_at TEXT,
    CHECK ((is_deleted = 0 AND deleted_at IS NULL) OR (is_deleted = 1 AND deleted_at IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS forms (
    id          INTEGER PRIMARY KEY,
    title       TEXT NOT NULL,
    description TEXT,
    user_id     INTEGER NOT NULL REFERENCES users(id),
    is_public   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    is_deleted  INTEGER NOT NULL DEFAULT 0,
    deleted_at  TEXT,
    CHECK ((is_deleted = 0 AND deleted_at IS NULL) OR (is_deleted = 1 AND deleted_at IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS form_questions (
    id           INTEGER PRIMARY KEY,
    form_id      INTEGER NOT NULL REFERENCES forms(id),
    question_id  INTEGER NOT NULL REFERENCES questions(id),
    order_number INTEGER,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    is_deleted   INTEGER NOT NULL DEFAULT 0,
    deleted_at   TEXT,
    CHECK ((is_deleted = 0 AND deleted_at IS NULL) OR (is_deleted = 1 AND deleted_at IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS form_answers (
    id               INTEGER PRIMARY KEY,
    form_question_id INTEGER NOT NULL REFERENCES form_questions(id),
    answer_id        INTEGER NOT NULL REFERENCES answers(id),
    remarks          TEXT,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    is_deleted       INTEGER NOT NULL DEFAULT 0,
    deleted_at       TEXT,
    CHECK ((is_deleted = 0 AND deleted_at IS NULL) OR (is_deleted = 1 AND deleted_at IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS form_submissions (
    id           INTEGER PRIMARY KEY,
    form_id      INTEGER NOT NULL REFERENCES forms(id),
    submitted_by TEXT NOT NULL REFERENCES users(username),
    submitted_at TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    is_deleted   INTEGER NOT NULL DEFAULT 0,
    deleted_at   TEXT,
    CHECK ((is_deleted = 0 AND deleted_at IS NULL) OR (is_deleted = 1 AND deleted_at IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS answers_submitted (
    id                 INTEGER PRIMARY KEY,
    form_answer_id     INTEGER NOT NULL REFERENCES form_answers(id),
    form_submission_id INTEGER NOT NULL REFERENCES form_submissions(id),
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL,
    is_deleted         INTEGER NOT NULL DEFAULT 0,
    deleted_at         TEXT,
    CHECK ((is_deleted = 0 AND deleted_at IS NULL) OR (is_deleted = 1 AND deleted_at IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS attachments (
    id                 INTEGER PRIMARY KEY,
    form_submission_id INTEGER NOT NULL REFERENCES form_submissions(id),
    file_type          TEXT NOT NULL,
    file_path          TEXT NOT NULL,   -- storage key; bytes live elsewhere
    is_signature       INTEGER NOT NULL DEFAULT 0,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL,
    is_deleted         INTEGER NOT NULL DEFAULT 0,
    deleted_at         TEXT,
    CHECK ((is_deleted = 0 AND deleted_at IS NULL) OR (is_deleted = 1 AND deleted_at IS NOT NULL))
);

-- Unique among active rows only.
CREATE UNIQUE INDEX IF NOT EXISTS role_permissions_active_uq
    ON role_permissions(role_id, permission_id) WHERE is_deleted = 0;
CREATE UNIQUE INDEX IF NOT EXISTS form_questions_active_uq
    ON form_questions(form_id, question_id) WHERE is_deleted = 0;
CREATE UNIQUE INDEX IF NOT EXISTS form_answers_active_uq
    ON form_answers(form_question_id, answer_id) WHERE is_deleted = 0;
CREATE UNIQUE INDEX IF NOT EXISTS answers_submitted_active_uq
    ON answers_submitted(form_answer_id, form_submission_id) WHERE is_deleted = 0;

-- Child lookups used by the cascade walk.
CREATE INDEX IF NOT EXISTS users_environment_idx          ON users(environment_id);
CREATE INDEX IF NOT EXISTS users_role_idx                 ON users(role_id);
CREATE INDEX IF NOT EXISTS role_permissions_perm_idx      ON role_permissions(permission_id);
CREATE INDEX IF NOT EXISTS questions_type_idx             ON questions(question_type_id);
CREATE INDEX IF NOT EXISTS forms_user_idx                 ON forms(user_id);
CREATE INDEX IF NOT EXISTS form_questions_question_idx    ON form_questions(question_id);
CREATE INDEX IF NOT EXISTS form_answers_answer_idx        ON form_answers(answer_id);
CREATE INDEX IF NOT EXISTS form_submissions_form_idx      ON form_submissions(form_id);
CREATE INDEX IF NOT EXISTS form_submissions_by_idx        ON form_submissions(submitted_by);
CREATE INDEX IF NOT EXISTS answers_submitted_sub_idx      ON answers_submitted(form_submission_id);
CREATE INDEX IF NOT EXISTS attachments_submission_idx     ON attachments(form_submission_id);

PRAGMA user_version = 1;
";
