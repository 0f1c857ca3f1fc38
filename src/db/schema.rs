//! PostgreSQL schema, created idempotently at startup
//!
//! Status columns hold the SMALLINT ids of the enrollment FSM. The partial
//! unique index on standing statuses (10, 20, 30) backs the one-holder-per-
//! program rule; `uq_enrollment_payment` backs payment idempotence.

use sqlx::PgPool;

const CREATE_PROGRAMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS programs_tb (
    program_id   UUID PRIMARY KEY,
    slug         VARCHAR(128) NOT NULL UNIQUE,
    title        VARCHAR(256) NOT NULL,
    category     VARCHAR(32)  NOT NULL,
    price        NUMERIC(18, 2) NOT NULL,
    currency     VARCHAR(8)   NOT NULL,
    modules      JSONB        NOT NULL DEFAULT '[]',
    is_active    BOOLEAN      NOT NULL DEFAULT TRUE,
    created_at   TIMESTAMPTZ  NOT NULL DEFAULT NOW()
)
"#;

const CREATE_LESSONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS lessons_tb (
    lesson_id            UUID PRIMARY KEY,
    program_id           UUID NOT NULL REFERENCES programs_tb(program_id) ON DELETE CASCADE,
    module_index         INTEGER NOT NULL,
    lesson_order         INTEGER NOT NULL,
    title                VARCHAR(256) NOT NULL,
    lesson_type          VARCHAR(16)  NOT NULL,
    duration_minutes     INTEGER NOT NULL DEFAULT 0,
    video_duration_secs  INTEGER,
    is_free              BOOLEAN NOT NULL DEFAULT FALSE,
    is_published         BOOLEAN NOT NULL DEFAULT TRUE,
    quiz                 JSONB
)
"#;

const CREATE_LESSONS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_lessons_curriculum
    ON lessons_tb (program_id, module_index, lesson_order)
"#;

const CREATE_ENROLLMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS enrollments_tb (
    enrollment_id      UUID PRIMARY KEY,
    learner            JSONB        NOT NULL,
    learner_email      VARCHAR(320) NOT NULL,
    account_id         UUID,
    program_id         UUID         NOT NULL REFERENCES programs_tb(program_id),
    enrollment_type    VARCHAR(16)  NOT NULL,
    participants       INTEGER      NOT NULL DEFAULT 1,
    cohort             JSONB,
    status             SMALLINT     NOT NULL,
    payment_status     SMALLINT     NOT NULL,
    amount_due         NUMERIC(18, 2) NOT NULL,
    currency           VARCHAR(8)   NOT NULL,
    payment_provider   VARCHAR(16),
    payment_reference  VARCHAR(128),
    paid_amount        NUMERIC(18, 2),
    paid_currency      VARCHAR(8),
    paid_at            TIMESTAMPTZ,
    notes              TEXT,
    source             VARCHAR(64)  NOT NULL,
    created_at         TIMESTAMPTZ  NOT NULL,
    updated_at         TIMESTAMPTZ  NOT NULL,
    CONSTRAINT uq_enrollment_payment UNIQUE (payment_provider, payment_reference)
)
"#;

const CREATE_ENROLLMENTS_STANDING_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS uq_enrollment_standing
    ON enrollments_tb (learner_email, program_id)
    WHERE status IN (10, 20, 30)
"#;

const CREATE_ENROLLMENTS_EMAIL_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_enrollments_email
    ON enrollments_tb (learner_email, created_at DESC)
"#;

const CREATE_PROGRESS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS progress_tb (
    progress_id            UUID PRIMARY KEY,
    enrollment_id          UUID NOT NULL REFERENCES enrollments_tb(enrollment_id) ON DELETE CASCADE,
    learner_email          VARCHAR(320) NOT NULL,
    program_id             UUID NOT NULL,
    completed_lessons      JSONB NOT NULL DEFAULT '[]',
    current_lesson         UUID,
    overall_progress       SMALLINT NOT NULL DEFAULT 0,
    total_watch_time_secs  BIGINT NOT NULL DEFAULT 0,
    last_accessed_at       TIMESTAMPTZ NOT NULL,
    notes                  JSONB NOT NULL DEFAULT '[]',
    created_at             TIMESTAMPTZ NOT NULL,
    CONSTRAINT uq_progress_learner_program UNIQUE (learner_email, program_id)
)
"#;

const STATEMENTS: [(&str, &str); 7] = [
    ("programs_tb", CREATE_PROGRAMS_TABLE),
    ("lessons_tb", CREATE_LESSONS_TABLE),
    ("idx_lessons_curriculum", CREATE_LESSONS_INDEX),
    ("enrollments_tb", CREATE_ENROLLMENTS_TABLE),
    ("uq_enrollment_standing", CREATE_ENROLLMENTS_STANDING_INDEX),
    ("idx_enrollments_email", CREATE_ENROLLMENTS_EMAIL_INDEX),
    ("progress_tb", CREATE_PROGRESS_TABLE),
];

/// Create tables and indexes that do not exist yet
pub async fn init_schema(pool: &PgPool) -> anyhow::Result<()> {
    tracing::info!("Initializing PostgreSQL schema...");
    for (name, ddl) in STATEMENTS {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", name, e))?;
    }
    tracing::info!("PostgreSQL schema initialized successfully");
    Ok(())
}
