//! PostgreSQL implementation of the catalog, enrollment and progress stores
//!
//! Runtime-checked queries. Structured sub-records (learner identity, cohort,
//! completions, notes, quiz, modules) are JSONB columns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool, Row};

use crate::catalog::{
    CatalogStore, Lesson, LessonType, Money, Program, ProgramCategory, ProgramModule, Quiz,
};
use crate::core_types::{AccountId, EnrollmentId, LessonId, ProgramId, normalize_email};
use crate::enrollment::{
    Cohort, Enrollment, EnrollmentFilter, EnrollmentStatus, EnrollmentStore, EnrollmentType,
    LearnerIdentity, Page, PaymentClaim, PaymentDetails, PaymentRecord, PaymentStatus,
};
use crate::error::CoreError;
use crate::payment::ProviderKind;
use crate::progress::{CompletedLesson, LessonNote, Progress, ProgressStore};

const PROGRAM_COLUMNS: &str =
    "program_id, slug, title, category, price, currency, modules, is_active, created_at";

const LESSON_COLUMNS: &str = "lesson_id, program_id, module_index, lesson_order, title, \
     lesson_type, duration_minutes, video_duration_secs, is_free, is_published, quiz";

const ENROLLMENT_COLUMNS: &str = "enrollment_id, learner, learner_email, program_id, \
     enrollment_type, participants, cohort, status, payment_status, amount_due, currency, \
     payment_provider, payment_reference, paid_amount, paid_currency, paid_at, notes, source, \
     created_at, updated_at";

const PROGRESS_COLUMNS: &str = "progress_id, enrollment_id, learner_email, program_id, \
     completed_lessons, current_lesson, overall_progress, total_watch_time_secs, \
     last_accessed_at, notes, created_at";

fn corrupt(column: &str, value: impl std::fmt::Display) -> CoreError {
    CoreError::Storage(format!("Invalid {} in row: {}", column, value))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

// ============================================================================
// Row mapping
// ============================================================================

fn row_to_program(row: &PgRow) -> Result<Program, CoreError> {
    let category: String = row.try_get("category")?;
    let currency: String = row.try_get("currency")?;
    let modules: Json<Vec<ProgramModule>> = row.try_get("modules")?;
    Ok(Program {
        id: row.try_get("program_id")?,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        category: category
            .parse::<ProgramCategory>()
            .map_err(|e| corrupt("category", e))?,
        price: Money::new(row.try_get("price")?, &currency),
        modules: modules.0,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_lesson(row: &PgRow) -> Result<Lesson, CoreError> {
    let lesson_type: String = row.try_get("lesson_type")?;
    let module_index: i32 = row.try_get("module_index")?;
    let order: i32 = row.try_get("lesson_order")?;
    let duration: i32 = row.try_get("duration_minutes")?;
    let video: Option<i32> = row.try_get("video_duration_secs")?;
    let quiz: Option<Json<Quiz>> = row.try_get("quiz")?;
    Ok(Lesson {
        id: row.try_get("lesson_id")?,
        program_id: row.try_get("program_id")?,
        module_index: module_index as u32,
        order: order as u32,
        title: row.try_get("title")?,
        lesson_type: lesson_type
            .parse::<LessonType>()
            .map_err(|e| corrupt("lesson_type", e))?,
        duration_minutes: duration as u32,
        video_duration_secs: video.map(|v| v as u32),
        is_free: row.try_get("is_free")?,
        is_published: row.try_get("is_published")?,
        quiz: quiz.map(|q| q.0),
    })
}

fn row_to_enrollment(row: &PgRow) -> Result<Enrollment, CoreError> {
    let learner: Json<LearnerIdentity> = row.try_get("learner")?;
    let enrollment_type: String = row.try_get("enrollment_type")?;
    let participants: i32 = row.try_get("participants")?;
    let cohort: Option<Json<Cohort>> = row.try_get("cohort")?;
    let status: i16 = row.try_get("status")?;
    let payment_status: i16 = row.try_get("payment_status")?;
    let currency: String = row.try_get("currency")?;

    let provider: Option<String> = row.try_get("payment_provider")?;
    let reference: Option<String> = row.try_get("payment_reference")?;
    let paid_amount: Option<Decimal> = row.try_get("paid_amount")?;
    let paid_currency: Option<String> = row.try_get("paid_currency")?;
    let paid_at: Option<DateTime<Utc>> = row.try_get("paid_at")?;

    let payment = match (provider, reference, paid_amount, paid_at) {
        (Some(provider), Some(reference), Some(amount), Some(paid_at)) => Some(PaymentDetails {
            provider: provider
                .parse::<ProviderKind>()
                .map_err(|e| corrupt("payment_provider", e))?,
            reference,
            amount: Money::new(amount, paid_currency.as_deref().unwrap_or(&currency)),
            paid_at,
        }),
        _ => None,
    };

    Ok(Enrollment {
        id: row.try_get("enrollment_id")?,
        learner: learner.0,
        learner_email: row.try_get("learner_email")?,
        program_id: row.try_get("program_id")?,
        enrollment_type: enrollment_type
            .parse::<EnrollmentType>()
            .map_err(|e| corrupt("enrollment_type", e))?,
        participants: participants as u32,
        cohort: cohort.map(|c| c.0),
        status: EnrollmentStatus::from_id(status).ok_or_else(|| corrupt("status", status))?,
        payment_status: PaymentStatus::from_id(payment_status)
            .ok_or_else(|| corrupt("payment_status", payment_status))?,
        amount_due: Money::new(row.try_get("amount_due")?, &currency),
        payment,
        notes: row.try_get("notes")?,
        source: row.try_get("source")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_progress(row: &PgRow) -> Result<Progress, CoreError> {
    let completed: Json<Vec<CompletedLesson>> = row.try_get("completed_lessons")?;
    let notes: Json<Vec<LessonNote>> = row.try_get("notes")?;
    let overall: i16 = row.try_get("overall_progress")?;
    let watch: i64 = row.try_get("total_watch_time_secs")?;
    Ok(Progress {
        id: row.try_get("progress_id")?,
        enrollment_id: row.try_get("enrollment_id")?,
        learner_email: row.try_get("learner_email")?,
        program_id: row.try_get("program_id")?,
        completed_lessons: completed.0,
        current_lesson: row.try_get("current_lesson")?,
        overall_progress: overall.clamp(0, 100) as u8,
        total_watch_time_secs: watch.max(0) as u64,
        last_accessed_at: row.try_get("last_accessed_at")?,
        notes: notes.0,
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// Shared statements
// ============================================================================

async fn insert_enrollment_row<'e>(
    executor: impl PgExecutor<'e>,
    e: &Enrollment,
) -> Result<(), sqlx::Error> {
    let payment = e.payment.as_ref();
    sqlx::query(&format!(
        "INSERT INTO enrollments_tb (account_id, {}) VALUES \
         ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)",
        ENROLLMENT_COLUMNS
    ))
    .bind(e.learner.account_id())
    .bind(e.id)
    .bind(Json(&e.learner))
    .bind(&e.learner_email)
    .bind(e.program_id)
    .bind(e.enrollment_type.as_str())
    .bind(e.participants as i32)
    .bind(e.cohort.map(Json))
    .bind(e.status.id())
    .bind(e.payment_status.id())
    .bind(e.amount_due.amount)
    .bind(&e.amount_due.currency)
    .bind(payment.map(|p| p.provider.as_str()))
    .bind(payment.map(|p| p.reference.as_str()))
    .bind(payment.map(|p| p.amount.amount))
    .bind(payment.map(|p| p.amount.currency.as_str()))
    .bind(payment.map(|p| p.paid_at))
    .bind(e.notes.as_deref())
    .bind(&e.source)
    .bind(e.created_at)
    .bind(e.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

async fn fetch_by_reference<'e>(
    executor: impl PgExecutor<'e>,
    provider: ProviderKind,
    reference: &str,
) -> Result<Option<Enrollment>, CoreError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM enrollments_tb WHERE payment_provider = $1 AND payment_reference = $2",
        ENROLLMENT_COLUMNS
    ))
    .bind(provider.as_str())
    .bind(reference)
    .fetch_optional(executor)
    .await?;
    row.as_ref().map(row_to_enrollment).transpose()
}

async fn fetch_for_learner<'e>(
    executor: impl PgExecutor<'e>,
    email: &str,
    program_id: ProgramId,
    statuses: &[EnrollmentStatus],
    lock: bool,
) -> Result<Option<Enrollment>, CoreError> {
    let ids: Vec<i16> = statuses.iter().map(|s| s.id()).collect();
    let row = sqlx::query(&format!(
        "SELECT {} FROM enrollments_tb \
         WHERE learner_email = $1 AND program_id = $2 AND status = ANY($3) \
         ORDER BY created_at DESC LIMIT 1{}",
        ENROLLMENT_COLUMNS,
        if lock { " FOR UPDATE" } else { "" }
    ))
    .bind(email)
    .bind(program_id)
    .bind(ids)
    .fetch_optional(executor)
    .await?;
    row.as_ref().map(row_to_enrollment).transpose()
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Resolve a unique violation on the payment path by re-reading the winner
    async fn resolve_payment_conflict(
        &self,
        claim: &PaymentClaim,
        email: &str,
    ) -> Result<PaymentRecord, CoreError> {
        let payment = &claim.payment;
        if let Some(existing) =
            fetch_by_reference(&self.pool, payment.provider, &payment.reference).await?
        {
            return Ok(PaymentRecord::AlreadyRecorded(existing));
        }
        if let Some(existing) = fetch_for_learner(
            &self.pool,
            email,
            claim.program_id,
            &EnrollmentStatus::STANDING,
            false,
        )
        .await?
        {
            return Ok(PaymentRecord::AlreadyEnrolled(existing));
        }
        Err(CoreError::Storage(
            "Unique violation without a conflicting enrollment".to_string(),
        ))
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn get_program(&self, id: ProgramId) -> Result<Option<Program>, CoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM programs_tb WHERE program_id = $1",
            PROGRAM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_program).transpose()
    }

    async fn list_programs(&self) -> Result<Vec<Program>, CoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM programs_tb ORDER BY title",
            PROGRAM_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_program).collect()
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, CoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM lessons_tb WHERE lesson_id = $1",
            LESSON_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_lesson).transpose()
    }

    async fn published_lessons(&self, program_id: ProgramId) -> Result<Vec<Lesson>, CoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM lessons_tb WHERE program_id = $1 AND is_published \
             ORDER BY module_index, lesson_order",
            LESSON_COLUMNS
        ))
        .bind(program_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_lesson).collect()
    }

    async fn count_published_lessons(&self, program_id: ProgramId) -> Result<usize, CoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM lessons_tb WHERE program_id = $1 AND is_published",
        )
        .bind(program_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as usize)
    }

    async fn upsert_program(&self, program: &Program) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO programs_tb
                (program_id, slug, title, category, price, currency, modules, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (program_id) DO UPDATE SET
                slug = EXCLUDED.slug,
                title = EXCLUDED.title,
                category = EXCLUDED.category,
                price = EXCLUDED.price,
                currency = EXCLUDED.currency,
                modules = EXCLUDED.modules,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(program.id)
        .bind(&program.slug)
        .bind(&program.title)
        .bind(program.category.as_str())
        .bind(program.price.amount)
        .bind(&program.price.currency)
        .bind(Json(&program.modules))
        .bind(program.is_active)
        .bind(program.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO lessons_tb
                (lesson_id, program_id, module_index, lesson_order, title, lesson_type,
                 duration_minutes, video_duration_secs, is_free, is_published, quiz)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (lesson_id) DO UPDATE SET
                program_id = EXCLUDED.program_id,
                module_index = EXCLUDED.module_index,
                lesson_order = EXCLUDED.lesson_order,
                title = EXCLUDED.title,
                lesson_type = EXCLUDED.lesson_type,
                duration_minutes = EXCLUDED.duration_minutes,
                video_duration_secs = EXCLUDED.video_duration_secs,
                is_free = EXCLUDED.is_free,
                is_published = EXCLUDED.is_published,
                quiz = EXCLUDED.quiz
            "#,
        )
        .bind(lesson.id)
        .bind(lesson.program_id)
        .bind(lesson.module_index as i32)
        .bind(lesson.order as i32)
        .bind(&lesson.title)
        .bind(lesson.lesson_type.as_str())
        .bind(lesson.duration_minutes as i32)
        .bind(lesson.video_duration_secs.map(|v| v as i32))
        .bind(lesson.is_free)
        .bind(lesson.is_published)
        .bind(lesson.quiz.as_ref().map(Json))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EnrollmentStore for PgStore {
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), CoreError> {
        insert_enrollment_row(&self.pool, enrollment)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CoreError::Conflict(format!("Enrollment {} already exists", enrollment.id))
                } else {
                    e.into()
                }
            })
    }

    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, CoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM enrollments_tb WHERE enrollment_id = $1",
            ENROLLMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_enrollment).transpose()
    }

    async fn find_by_payment_reference(
        &self,
        provider: ProviderKind,
        reference: &str,
    ) -> Result<Option<Enrollment>, CoreError> {
        fetch_by_reference(&self.pool, provider, reference).await
    }

    async fn find_for_learner(
        &self,
        email: &str,
        program_id: ProgramId,
        statuses: &[EnrollmentStatus],
    ) -> Result<Option<Enrollment>, CoreError> {
        fetch_for_learner(&self.pool, &normalize_email(email), program_id, statuses, false).await
    }

    async fn list_for_learner(
        &self,
        email: &str,
        account_id: Option<AccountId>,
    ) -> Result<Vec<Enrollment>, CoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM enrollments_tb \
             WHERE learner_email = $1 OR ($2::UUID IS NOT NULL AND account_id = $2) \
             ORDER BY created_at DESC",
            ENROLLMENT_COLUMNS
        ))
        .bind(normalize_email(email))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_enrollment).collect()
    }

    async fn list_enrollments(&self, filter: &EnrollmentFilter) -> Result<Page<Enrollment>, CoreError> {
        let status = filter.status.map(|s| s.id());
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM enrollments_tb \
             WHERE ($1::SMALLINT IS NULL OR status = $1) AND ($2::UUID IS NULL OR program_id = $2)",
        )
        .bind(status)
        .bind(filter.program_id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM enrollments_tb \
             WHERE ($1::SMALLINT IS NULL OR status = $1) AND ($2::UUID IS NULL OR program_id = $2) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4",
            ENROLLMENT_COLUMNS
        ))
        .bind(status)
        .bind(filter.program_id)
        .bind(i64::from(filter.limit))
        .bind(filter.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .iter()
            .map(row_to_enrollment)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total.max(0) as u64, filter))
    }

    async fn record_payment(&self, claim: &PaymentClaim) -> Result<PaymentRecord, CoreError> {
        let payment = &claim.payment;
        let email = claim.email();
        let mut tx = self.pool.begin().await?;

        // Serialize payment recording per (learner, program) for this transaction
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1)::BIGINT)")
            .bind(format!("{}:{}", email, claim.program_id))
            .execute(&mut *tx)
            .await?;

        // 1. Idempotency check
        if let Some(existing) =
            fetch_by_reference(&mut *tx, payment.provider, &payment.reference).await?
        {
            return Ok(PaymentRecord::AlreadyRecorded(existing));
        }

        // 2. Already holds the program
        if let Some(existing) = fetch_for_learner(
            &mut *tx,
            &email,
            claim.program_id,
            &EnrollmentStatus::STANDING,
            false,
        )
        .await?
        {
            return Ok(PaymentRecord::AlreadyEnrolled(existing));
        }

        // 3. Upgrade an open intake, 4. or create
        let pending = fetch_for_learner(
            &mut *tx,
            &email,
            claim.program_id,
            &[EnrollmentStatus::Pending],
            true,
        )
        .await?;

        let written = match pending {
            Some(mut enrollment) => {
                enrollment.apply_payment(payment.clone());
                let result = sqlx::query(
                    r#"
                    UPDATE enrollments_tb SET
                        status = $1, payment_status = $2,
                        payment_provider = $3, payment_reference = $4,
                        paid_amount = $5, paid_currency = $6, paid_at = $7,
                        updated_at = $8
                    WHERE enrollment_id = $9
                    "#,
                )
                .bind(enrollment.status.id())
                .bind(enrollment.payment_status.id())
                .bind(payment.provider.as_str())
                .bind(&payment.reference)
                .bind(payment.amount.amount)
                .bind(&payment.amount.currency)
                .bind(payment.paid_at)
                .bind(enrollment.updated_at)
                .bind(enrollment.id)
                .execute(&mut *tx)
                .await;
                result.map(|_| PaymentRecord::Confirmed(enrollment))
            }
            None => {
                let enrollment =
                    Enrollment::paid(claim.learner.clone(), claim.program_id, payment.clone());
                insert_enrollment_row(&mut *tx, &enrollment)
                    .await
                    .map(|_| PaymentRecord::Created(enrollment))
            }
        };

        match written {
            Ok(record) => {
                tx.commit().await?;
                Ok(record)
            }
            Err(e) if is_unique_violation(&e) => {
                // Transaction is aborted; the winner is visible once it commits
                drop(tx);
                tracing::debug!(
                    reference = %payment.reference,
                    "Unique violation while recording payment, re-reading"
                );
                self.resolve_payment_conflict(claim, &email).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set_status(
        &self,
        id: EnrollmentId,
        status: EnrollmentStatus,
        notes: Option<String>,
    ) -> Result<Option<Enrollment>, CoreError> {
        let row = sqlx::query(&format!(
            "UPDATE enrollments_tb SET status = $1, notes = COALESCE($2, notes), updated_at = NOW() \
             WHERE enrollment_id = $3 RETURNING {}",
            ENROLLMENT_COLUMNS
        ))
        .bind(status.id())
        .bind(notes)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                CoreError::Conflict("Learner already holds this program".to_string())
            } else {
                e.into()
            }
        })?;
        row.as_ref().map(row_to_enrollment).transpose()
    }

    async fn transition_status(
        &self,
        id: EnrollmentId,
        from: EnrollmentStatus,
        to: EnrollmentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE enrollments_tb
            SET status = $1, updated_at = $2
            WHERE enrollment_id = $3 AND status = $4
            "#,
        )
        .bind(to.id())
        .bind(at)
        .bind(id)
        .bind(from.id())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_enrollment(&self, id: EnrollmentId) -> Result<bool, CoreError> {
        // progress_tb rows go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM enrollments_tb WHERE enrollment_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ProgressStore for PgStore {
    async fn get_progress(
        &self,
        email: &str,
        program_id: ProgramId,
    ) -> Result<Option<Progress>, CoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM progress_tb WHERE learner_email = $1 AND program_id = $2",
            PROGRESS_COLUMNS
        ))
        .bind(normalize_email(email))
        .bind(program_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_progress).transpose()
    }

    async fn insert_progress_if_absent(&self, progress: &Progress) -> Result<Progress, CoreError> {
        sqlx::query(&format!(
            "INSERT INTO progress_tb ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (learner_email, program_id) DO NOTHING",
            PROGRESS_COLUMNS
        ))
        .bind(progress.id)
        .bind(progress.enrollment_id)
        .bind(&progress.learner_email)
        .bind(progress.program_id)
        .bind(Json(&progress.completed_lessons))
        .bind(progress.current_lesson)
        .bind(i16::from(progress.overall_progress))
        .bind(progress.total_watch_time_secs as i64)
        .bind(progress.last_accessed_at)
        .bind(Json(&progress.notes))
        .bind(progress.created_at)
        .execute(&self.pool)
        .await?;

        self.get_progress(&progress.learner_email, progress.program_id)
            .await?
            .ok_or_else(|| CoreError::Storage("Progress vanished after insert".to_string()))
    }

    async fn save_progress(&self, progress: &Progress) -> Result<(), CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE progress_tb SET
                completed_lessons = $1,
                current_lesson = $2,
                overall_progress = $3,
                total_watch_time_secs = $4,
                last_accessed_at = $5,
                notes = $6
            WHERE progress_id = $7
            "#,
        )
        .bind(Json(&progress.completed_lessons))
        .bind(progress.current_lesson)
        .bind(i16::from(progress.overall_progress))
        .bind(progress.total_watch_time_secs as i64)
        .bind(progress.last_accessed_at)
        .bind(Json(&progress.notes))
        .bind(progress.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("Progress"));
        }
        Ok(())
    }

    async fn list_progress(&self, email: &str) -> Result<Vec<Progress>, CoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM progress_tb WHERE learner_email = $1 ORDER BY last_accessed_at DESC",
            PROGRESS_COLUMNS
        ))
        .bind(normalize_email(email))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_progress).collect()
    }
}
