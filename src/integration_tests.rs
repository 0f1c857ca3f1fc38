//! Scenario tests for the whole engine
//!
//! Everything runs on `MemoryStore` with sandbox payment providers and a
//! recording notifier, so no external service is needed.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::catalog::{
    CatalogStore, Lesson, LessonType, Money, Program, ProgramCategory, Quiz, QuizQuestion,
};
use crate::core_types::{Caller, LessonId, ProgramId, Role};
use crate::enrollment::{
    ContactInfo, EnrollmentFilter, EnrollmentIntake, EnrollmentService, EnrollmentStatus,
    EnrollmentType, PaymentStatus, WebhookOutcome,
};
use crate::error::CoreError;
use crate::notify::mock::RecordingNotifier;
use crate::payment::{PaymentEvent, PaymentGateway, ProviderKind, SandboxProvider};
use crate::progress::{Completion, ProgressTracker};
use crate::store::MemoryStore;

const LEARNER_EMAIL: &str = "ada@example.com";

fn usd(cents: i64) -> Money {
    Money::new(Decimal::new(cents, 2), "USD")
}

/// Engine wired on in-memory collaborators
struct TestHarness {
    store: Arc<MemoryStore>,
    paystack: Arc<SandboxProvider>,
    notifier: Arc<RecordingNotifier>,
    service: EnrollmentService,
    tracker: ProgressTracker,
    program: Program,
    /// Published lessons in curriculum order
    lessons: Vec<Lesson>,
}

impl TestHarness {
    /// "Python Bootcamp" ($349) with `video_lessons` published videos
    async fn new(video_lessons: u32) -> Self {
        Self::with_lessons(video_lessons, |_| {}).await
    }

    async fn with_lessons(video_lessons: u32, extra: impl FnOnce(&mut Vec<Lesson>)) -> Self {
        let store = Arc::new(MemoryStore::new());
        let paystack = Arc::new(SandboxProvider::new(ProviderKind::Paystack));
        let stripe = Arc::new(SandboxProvider::new(ProviderKind::Stripe));
        let notifier = Arc::new(RecordingNotifier::default());

        let program = Program::new("Python Bootcamp", ProgramCategory::Bootcamp, usd(34900));
        store.upsert_program(&program).await.unwrap();

        let mut lessons: Vec<Lesson> = (1..=video_lessons)
            .map(|i| Lesson::new(program.id, (i - 1) / 5, i, &format!("Lesson {}", i)))
            .collect();
        extra(&mut lessons);
        for lesson in &lessons {
            store.upsert_lesson(lesson).await.unwrap();
        }
        let lessons = store.published_lessons(program.id).await.unwrap();

        let payments = Arc::new(
            PaymentGateway::new(ProviderKind::Paystack)
                .with_provider(paystack.clone())
                .with_provider(stripe),
        );
        let service = EnrollmentService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            payments,
            notifier.clone(),
            "http://localhost:3000",
        );
        let tracker = ProgressTracker::new(store.clone(), store.clone(), store.clone(), notifier.clone());

        Self {
            store,
            paystack,
            notifier,
            service,
            tracker,
            program,
            lessons,
        }
    }

    fn learner(&self) -> Caller {
        Caller::new(Uuid::new_v4(), LEARNER_EMAIL, Role::Student)
    }

    fn intake(&self) -> EnrollmentIntake {
        EnrollmentIntake {
            program_id: self.program.id,
            student_info: ContactInfo {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: "Ada@Example.com".to_string(),
                ..Default::default()
            },
            cohort_date: None,
            enrollment_type: EnrollmentType::Individual,
            number_of_participants: 1,
            notes: None,
            source: None,
        }
    }

    /// Settle `reference` at the program price and verify it through Paystack
    async fn pay(&self, caller: &Caller, reference: &str) -> crate::enrollment::Enrollment {
        self.paystack.settle(reference, self.program.price.clone());
        self.service
            .verify_payment(caller, ProviderKind::Paystack, reference, self.program.id)
            .await
            .unwrap()
    }

    fn event(&self, reference: &str) -> PaymentEvent {
        PaymentEvent {
            provider: ProviderKind::Paystack,
            reference: reference.to_string(),
            program_id: self.program.id,
            account_id: None,
            email: LEARNER_EMAIL.to_string(),
            amount: self.program.price.clone(),
            paid_at: Utc::now(),
        }
    }
}

fn quiz_lesson(program_id: ProgramId) -> Lesson {
    let mut lesson = Lesson::new(program_id, 9, 1, "Final Quiz");
    lesson.lesson_type = LessonType::Quiz;
    lesson.quiz = Some(Quiz {
        questions: vec![
            QuizQuestion {
                question: "2 + 2".to_string(),
                options: vec!["3".into(), "4".into()],
                correct_answer: 1,
                explanation: None,
            },
            QuizQuestion {
                question: "len('abc')".to_string(),
                options: vec!["3".into(), "2".into()],
                correct_answer: 0,
                explanation: Some("Three characters".into()),
            },
        ],
        passing_score: 70,
    });
    lesson
}

// ============================================================================
// Intake → payment → learning
// ============================================================================

/// Intake, verification of "PE_123", lazy activation, then ten completions
#[tokio::test]
async fn test_bootcamp_scenario_end_to_end() {
    let h = TestHarness::new(10).await;
    let caller = h.learner();

    let submitted = h.service.submit(h.intake()).await.unwrap();
    assert_eq!(submitted.status, EnrollmentStatus::Pending);
    assert_eq!(submitted.payment_status, PaymentStatus::Pending);
    assert_eq!(submitted.amount_due, usd(34900));

    let checkout = h
        .service
        .initialize_payment(&caller, h.program.id, None)
        .await
        .unwrap();
    assert_eq!(checkout.provider, ProviderKind::Paystack);
    assert_eq!(h.store.enrollment_count().await, 1, "initialize writes nothing");

    let confirmed = h.pay(&caller, "PE_123").await;
    assert_eq!(confirmed.id, submitted.id, "pending intake is upgraded in place");
    assert_eq!(confirmed.status, EnrollmentStatus::Confirmed);
    assert_eq!(confirmed.payment_status, PaymentStatus::Paid);
    let payment = confirmed.payment.clone().unwrap();
    assert_eq!(payment.amount, usd(34900));
    assert_eq!(payment.reference, "PE_123");
    assert_eq!(h.store.enrollment_count().await, 1);

    let listing = h.tracker.program_lessons(&caller, h.program.id).await.unwrap();
    assert_eq!(listing.lessons.len(), 10);
    assert_eq!(listing.enrollment.unwrap().status, EnrollmentStatus::Active);

    let mut sequence = Vec::new();
    for lesson in &h.lessons {
        let progress = h
            .tracker
            .complete_lesson(&caller, lesson.id, Completion::default())
            .await
            .unwrap();
        sequence.push(progress.overall_progress);
    }
    assert_eq!(sequence, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);

    let finished = h.service.get(submitted.id).await.unwrap();
    assert_eq!(finished.status, EnrollmentStatus::Completed);
    assert_eq!(
        h.notifier.kinds(),
        vec![
            "enrollment_submitted",
            "payment_received",
            "enrollment_confirmed",
            "program_completed"
        ]
    );
}

#[tokio::test]
async fn test_repeated_verification_returns_same_enrollment() {
    let h = TestHarness::new(3).await;
    let caller = h.learner();

    let first = h.pay(&caller, "PE_123").await;
    let verify_calls = h.paystack.verify_count();

    for _ in 0..3 {
        let again = h
            .service
            .verify_payment(&caller, ProviderKind::Paystack, "PE_123", h.program.id)
            .await
            .unwrap();
        assert_eq!(again, first);
    }
    assert_eq!(h.paystack.verify_count(), verify_calls, "provider not asked again");
    assert_eq!(h.store.enrollment_count().await, 1);
}

#[tokio::test]
async fn test_concurrent_verification_creates_one_enrollment() {
    let h = TestHarness::new(3).await;
    let caller = h.learner();
    h.paystack.settle("PE_777", h.program.price.clone());

    let (a, b) = tokio::join!(
        h.service
            .verify_payment(&caller, ProviderKind::Paystack, "PE_777", h.program.id),
        h.service
            .verify_payment(&caller, ProviderKind::Paystack, "PE_777", h.program.id),
    );
    assert_eq!(a.unwrap().id, b.unwrap().id);
    assert_eq!(h.store.enrollment_count().await, 1);
}

#[tokio::test]
async fn test_concurrent_webhooks_create_one_enrollment() {
    let h = TestHarness::new(3).await;
    let (body, signature) = h.paystack.webhook(&h.event("PE_999")).unwrap();

    let (a, b) = tokio::join!(
        h.service
            .handle_webhook(ProviderKind::Paystack, &body, Some(&signature)),
        h.service
            .handle_webhook(ProviderKind::Paystack, &body, Some(&signature)),
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    let recorded: Vec<_> = outcomes
        .iter()
        .filter_map(|o| match o {
            WebhookOutcome::Recorded(e) => Some(e.id),
            _ => None,
        })
        .collect();
    let duplicate: Vec<_> = outcomes
        .iter()
        .filter_map(|o| match o {
            WebhookOutcome::Duplicate(e) => Some(e.id),
            _ => None,
        })
        .collect();
    assert_eq!(recorded.len(), 1);
    assert_eq!(duplicate, recorded, "second delivery returns the first's data");
    assert_eq!(h.store.enrollment_count().await, 1);
}

#[tokio::test]
async fn test_webhook_then_browser_return_converge() {
    let h = TestHarness::new(3).await;
    let caller = h.learner();
    let (body, signature) = h.paystack.webhook(&h.event("PE_555")).unwrap();

    let outcome = h
        .service
        .handle_webhook(ProviderKind::Paystack, &body, Some(&signature))
        .await
        .unwrap();
    let WebhookOutcome::Recorded(from_webhook) = outcome else {
        panic!("expected recorded, got {:?}", outcome);
    };

    let from_browser = h
        .service
        .verify_payment(&caller, ProviderKind::Paystack, "PE_555", h.program.id)
        .await
        .unwrap();
    assert_eq!(from_browser.id, from_webhook.id);
    assert_eq!(h.store.enrollment_count().await, 1);
}

#[tokio::test]
async fn test_webhook_bad_signature_rejected() {
    let h = TestHarness::new(1).await;
    let (body, _) = h.paystack.webhook(&h.event("PE_1")).unwrap();

    let result = h
        .service
        .handle_webhook(ProviderKind::Paystack, &body, Some("deadbeef"))
        .await;
    assert!(matches!(result, Err(CoreError::Validation(_))));
    assert_eq!(h.store.enrollment_count().await, 0);
}

#[tokio::test]
async fn test_intake_requires_active_program() {
    let h = TestHarness::new(1).await;

    let mut unknown = h.intake();
    unknown.program_id = Uuid::new_v4();
    assert_eq!(
        h.service.submit(unknown).await.unwrap_err(),
        CoreError::not_found("Program")
    );

    let mut retired = h.program.clone();
    retired.is_active = false;
    h.store.upsert_program(&retired).await.unwrap();
    assert_eq!(
        h.service.submit(h.intake()).await.unwrap_err(),
        CoreError::not_found("Program")
    );

    assert_eq!(h.store.enrollment_count().await, 0);
    assert!(h.notifier.kinds().is_empty());
}

// ============================================================================
// Payment failures
// ============================================================================

#[tokio::test]
async fn test_declined_payment_changes_nothing() {
    let h = TestHarness::new(1).await;
    let caller = h.learner();
    let submitted = h.service.submit(h.intake()).await.unwrap();
    h.paystack.decline("PE_404", "Insufficient funds");

    let result = h
        .service
        .verify_payment(&caller, ProviderKind::Paystack, "PE_404", h.program.id)
        .await;
    assert!(matches!(result, Err(CoreError::PaymentVerification(_))));

    let unchanged = h.service.get(submitted.id).await.unwrap();
    assert_eq!(unchanged, submitted);
}

#[tokio::test]
async fn test_underpayment_rejected() {
    let h = TestHarness::new(1).await;
    let caller = h.learner();
    h.paystack.settle("PE_LOW", usd(10000));

    let result = h
        .service
        .verify_payment(&caller, ProviderKind::Paystack, "PE_LOW", h.program.id)
        .await;
    assert!(matches!(result, Err(CoreError::PaymentVerification(_))));
    assert_eq!(h.store.enrollment_count().await, 0);
}

#[tokio::test]
async fn test_provider_outage_is_retryable() {
    let h = TestHarness::new(1).await;
    let caller = h.learner();
    h.paystack.settle("PE_RETRY", h.program.price.clone());
    h.paystack.set_unavailable(true);

    let err = h
        .service
        .verify_payment(&caller, ProviderKind::Paystack, "PE_RETRY", h.program.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ProviderUnavailable(_)));
    assert!(err.is_retryable());
    assert_eq!(h.store.enrollment_count().await, 0);

    h.paystack.set_unavailable(false);
    let enrollment = h
        .service
        .verify_payment(&caller, ProviderKind::Paystack, "PE_RETRY", h.program.id)
        .await
        .unwrap();
    assert_eq!(enrollment.status, EnrollmentStatus::Confirmed);
}

#[tokio::test]
async fn test_initialize_rejected_when_already_enrolled() {
    let h = TestHarness::new(1).await;
    let caller = h.learner();
    h.pay(&caller, "PE_123").await;

    let result = h.service.initialize_payment(&caller, h.program.id, None).await;
    assert_eq!(result.unwrap_err(), CoreError::AlreadyEnrolled);
}

#[tokio::test]
async fn test_second_reference_for_held_program_is_flagged() {
    let h = TestHarness::new(1).await;
    let caller = h.learner();
    h.pay(&caller, "PE_FIRST").await;
    h.paystack.settle("PE_SECOND", h.program.price.clone());

    let result = h
        .service
        .verify_payment(&caller, ProviderKind::Paystack, "PE_SECOND", h.program.id)
        .await;
    assert_eq!(result.unwrap_err(), CoreError::AlreadyEnrolled);
    assert_eq!(h.store.enrollment_count().await, 1);
}

// ============================================================================
// Access and progress
// ============================================================================

#[tokio::test]
async fn test_pending_denied_then_granted_after_payment() {
    let h = TestHarness::new(3).await;
    let caller = h.learner();
    let lesson = h.lessons[1].clone();

    h.service.submit(h.intake()).await.unwrap();
    let denied = h.tracker.lesson(&caller, lesson.id).await;
    assert!(matches!(denied, Err(CoreError::AccessDenied(_))));
    let no_progress = h.tracker.get_or_create(&caller, h.program.id).await;
    assert!(matches!(no_progress, Err(CoreError::AccessDenied(_))));

    h.pay(&caller, "PE_123").await;
    let view = h.tracker.lesson(&caller, lesson.id).await.unwrap();
    assert_eq!(view.id, lesson.id);
}

#[tokio::test]
async fn test_free_preview_open_without_enrollment() {
    let h = TestHarness::with_lessons(2, |lessons| lessons[0].is_free = true).await;
    let caller = h.learner();

    assert!(h.tracker.lesson(&caller, h.lessons[0].id).await.is_ok());
    assert!(h.tracker.lesson(&caller, h.lessons[1].id).await.is_err());
}

#[tokio::test]
async fn test_unpublished_lesson_hidden_and_not_counted() {
    let mut hidden: Option<LessonId> = None;
    let h = TestHarness::with_lessons(4, |lessons| {
        lessons[3].is_published = false;
        hidden = Some(lessons[3].id);
    })
    .await;
    let caller = h.learner();
    h.pay(&caller, "PE_123").await;

    let hidden = hidden.unwrap();
    assert_eq!(
        h.tracker.lesson(&caller, hidden).await.unwrap_err(),
        CoreError::not_found("Lesson")
    );

    let progress = h
        .tracker
        .complete_lesson(&caller, h.lessons[0].id, Completion::default())
        .await
        .unwrap();
    // 1 of 3 published
    assert_eq!(progress.overall_progress, 33);
}

#[tokio::test]
async fn test_repeated_completion_is_noop() {
    let h = TestHarness::new(4).await;
    let caller = h.learner();
    h.pay(&caller, "PE_123").await;
    let lesson = h.lessons[0].id;

    let first = h
        .tracker
        .complete_lesson(&caller, lesson, Completion {
            watch_time_secs: Some(120),
            quiz_score: None,
        })
        .await
        .unwrap();
    let second = h
        .tracker
        .complete_lesson(&caller, lesson, Completion {
            watch_time_secs: Some(999),
            quiz_score: None,
        })
        .await
        .unwrap();

    assert_eq!(second.completed_lessons.len(), 1);
    assert_eq!(second.overall_progress, first.overall_progress);
    assert_eq!(second.total_watch_time_secs, 120);
}

#[tokio::test]
async fn test_quiz_pass_completes_once() {
    let h = TestHarness::with_lessons(1, |lessons| {
        let program_id = lessons[0].program_id;
        lessons.push(quiz_lesson(program_id));
    })
    .await;
    let caller = h.learner();
    h.pay(&caller, "PE_123").await;
    let quiz = h.lessons.iter().find(|l| l.is_quiz()).unwrap().id;

    let first = h.tracker.submit_quiz(&caller, quiz, &[1, 0]).await.unwrap();
    assert_eq!(first.score, 100);
    assert!(first.passed);
    assert!(first.lesson_completed);

    let second = h.tracker.submit_quiz(&caller, quiz, &[1, 0]).await.unwrap();
    assert!(second.passed);
    assert!(!second.lesson_completed);

    // A later failure never undoes the completion
    let failed = h.tracker.submit_quiz(&caller, quiz, &[0, 1]).await.unwrap();
    assert!(!failed.passed);
    assert_eq!(failed.results.len(), 2);

    let (_, progress) = h.tracker.get_or_create(&caller, h.program.id).await.unwrap();
    assert_eq!(progress.completed_lessons.len(), 1);
    assert_eq!(progress.completed_lessons[0].quiz_score, Some(100));
    assert_eq!(progress.overall_progress, 50);
}

#[tokio::test]
async fn test_quiz_fail_never_completes() {
    let h = TestHarness::with_lessons(1, |lessons| {
        let program_id = lessons[0].program_id;
        lessons.push(quiz_lesson(program_id));
    })
    .await;
    let caller = h.learner();
    h.pay(&caller, "PE_123").await;
    let quiz = h.lessons.iter().find(|l| l.is_quiz()).unwrap().clone();

    // 1 of 2 correct = 50 < 70
    let result = h.tracker.submit_quiz(&caller, quiz.id, &[1, 1]).await.unwrap();
    assert_eq!(result.score, 50);
    assert!(!result.passed);
    assert!(!result.lesson_completed);

    let (enrollment, progress) = h.tracker.get_or_create(&caller, h.program.id).await.unwrap();
    assert!(progress.completed_lessons.is_empty());
    assert_eq!(progress.overall_progress, 0);
    assert_ne!(enrollment.status, EnrollmentStatus::Completed);
}

#[tokio::test]
async fn test_quiz_endpoint_rejects_non_quiz_lesson() {
    let h = TestHarness::new(1).await;
    let caller = h.learner();
    let result = h.tracker.submit_quiz(&caller, h.lessons[0].id, &[0]).await;
    assert_eq!(result.unwrap_err(), CoreError::not_found("Quiz"));
}

#[tokio::test]
async fn test_notes_require_progress() {
    let h = TestHarness::new(2).await;
    let caller = h.learner();
    let note = |content: &str| crate::progress::NoteRequest {
        program_id: h.program.id,
        lesson_id: h.lessons[0].id,
        content: content.to_string(),
        timestamp: Some(42),
    };

    let missing = h.tracker.save_note(&caller, note("first")).await;
    assert_eq!(missing.unwrap_err(), CoreError::not_found("Progress"));

    h.pay(&caller, "PE_123").await;
    h.tracker.get_or_create(&caller, h.program.id).await.unwrap();

    assert!(matches!(
        h.tracker.save_note(&caller, note("   ")).await,
        Err(CoreError::Validation(_))
    ));
    h.tracker.save_note(&caller, note("first")).await.unwrap();
    let notes = h.tracker.save_note(&caller, note("second")).await.unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[1].timestamp_secs, Some(42));

    let listed = h.tracker.list_notes(&caller, h.program.id).await.unwrap();
    assert_eq!(listed, notes);
}

#[tokio::test]
async fn test_learning_page_groups_modules() {
    let h = TestHarness::new(7).await;
    let caller = h.learner();
    h.pay(&caller, "PE_123").await;

    let page = h.tracker.learning_page(&caller, h.program.id).await.unwrap();
    let sizes: Vec<usize> = page.modules.iter().map(|m| m.lessons.len()).collect();
    assert_eq!(sizes, vec![5, 2]);
    assert_eq!(page.modules[1].title, "Module 2");
    assert_eq!(page.enrollment.status, EnrollmentStatus::Active);
    assert_eq!(page.progress.current_lesson, Some(h.lessons[0].id));
}

// ============================================================================
// Administration and dashboard
// ============================================================================

#[tokio::test]
async fn test_admin_override_and_delete_cascade() {
    let h = TestHarness::new(2).await;
    let caller = h.learner();
    let enrollment = h.pay(&caller, "PE_123").await;
    h.tracker.get_or_create(&caller, h.program.id).await.unwrap();
    assert_eq!(h.store.progress_count().await, 1);

    let cancelled = h
        .service
        .update_status(enrollment.id, EnrollmentStatus::Cancelled, Some(" refund issued ".into()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, EnrollmentStatus::Cancelled);
    assert_eq!(cancelled.payment_status, PaymentStatus::Paid, "payment status untouched");
    assert_eq!(cancelled.notes.as_deref(), Some("refund issued"));
    assert!(h.tracker.lesson(&caller, h.lessons[0].id).await.is_err());

    let mut filter = EnrollmentFilter::new(None, None);
    filter.status = Some(EnrollmentStatus::Cancelled);
    assert_eq!(h.service.list(&filter).await.unwrap().total, 1);

    h.service.delete(enrollment.id).await.unwrap();
    assert_eq!(h.store.enrollment_count().await, 0);
    assert_eq!(h.store.progress_count().await, 0);
    assert_eq!(
        h.service.delete(enrollment.id).await.unwrap_err(),
        CoreError::not_found("Enrollment")
    );
}

#[tokio::test]
async fn test_admin_override_cannot_duplicate_standing_enrollment() {
    let h = TestHarness::new(2).await;
    let caller = h.learner();
    h.pay(&caller, "PE_1").await;
    let second = h.service.submit(h.intake()).await.unwrap();

    let result = h
        .service
        .update_status(second.id, EnrollmentStatus::Confirmed, None)
        .await;
    assert!(matches!(result, Err(CoreError::Conflict(_))));
    assert_eq!(h.service.get(second.id).await.unwrap().status, EnrollmentStatus::Pending);
}

#[tokio::test]
async fn test_dashboard_counts() {
    let h = TestHarness::new(4).await;
    let caller = h.learner();
    h.pay(&caller, "PE_123").await;
    h.tracker
        .complete_lesson(&caller, h.lessons[0].id, Completion::default())
        .await
        .unwrap();

    let dashboard = h.service.dashboard(&caller).await.unwrap();
    assert_eq!(dashboard.stats.total_enrollments, 1);
    assert_eq!(dashboard.stats.active_programs, 1);
    assert_eq!(dashboard.stats.pending_enrollments, 0);
    assert_eq!(dashboard.enrollments.len(), 1);
    let entry = &dashboard.enrollments[0];
    assert_eq!(entry.total_lessons, 4);
    assert_eq!(entry.program_title.as_deref(), Some("Python Bootcamp"));
    assert_eq!(entry.progress.as_ref().unwrap().overall_progress, 25);
    assert_eq!(dashboard.recent_activity.len(), 1);
}
