//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::catalog::{LessonView, Money, Program};
use crate::enrollment::{Dashboard, Enrollment, EnrollmentIntake, EnrollmentStatus};
use crate::gateway::handlers::{
    EnrollmentCreated, HealthResponse, InitializePaymentRequest, StripeVerifyRequest,
    UpdateStatusRequest, WebhookAck,
};
use crate::payment::{Checkout, PaymentPublicConfig, ProviderKind};
use crate::progress::{
    CompleteLessonRequest, LearningPage, LessonNote, NoteRequest, Progress, ProgramLessons,
    QuizResult, QuizSubmission,
};

/// Bearer JWT issued by the platform's auth service
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("JWT")
                .description(Some(
                    "HS256 token with claims sub (account id), email, role, name, exp, iat",
                ))
                .build();
            components.add_security_scheme("bearer_auth", SecurityScheme::Http(scheme));
        }
    }
}

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Enrollment Core API",
        version = "1.0.0",
        description = "Program enrollment, payment confirmation and learning progress.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health_check,
        // Catalog
        crate::gateway::handlers::list_programs,
        crate::gateway::handlers::get_program,
        // Enrollments
        crate::gateway::handlers::submit_enrollment,
        crate::gateway::handlers::my_enrollments,
        crate::gateway::handlers::list_enrollments,
        crate::gateway::handlers::get_enrollment,
        crate::gateway::handlers::update_enrollment_status,
        crate::gateway::handlers::delete_enrollment,
        // Payments
        crate::gateway::handlers::payment_config,
        crate::gateway::handlers::initialize_payment,
        crate::gateway::handlers::verify_paystack,
        crate::gateway::handlers::verify_stripe,
        crate::gateway::handlers::payment_webhook,
        // Learning
        crate::gateway::handlers::program_lessons,
        crate::gateway::handlers::get_lesson,
        crate::gateway::handlers::complete_lesson,
        crate::gateway::handlers::dashboard,
        crate::gateway::handlers::learning_page,
        crate::gateway::handlers::save_note,
        crate::gateway::handlers::list_notes,
        crate::gateway::handlers::submit_quiz,
    ),
    components(
        schemas(
            HealthResponse,
            Program,
            Money,
            LessonView,
            Enrollment,
            EnrollmentIntake,
            EnrollmentStatus,
            EnrollmentCreated,
            UpdateStatusRequest,
            Dashboard,
            ProviderKind,
            Checkout,
            PaymentPublicConfig,
            InitializePaymentRequest,
            StripeVerifyRequest,
            WebhookAck,
            Progress,
            ProgramLessons,
            LearningPage,
            CompleteLessonRequest,
            NoteRequest,
            LessonNote,
            QuizSubmission,
            QuizResult,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Catalog", description = "Public program catalog"),
        (name = "Enrollments", description = "Intake and the caller's enrollments"),
        (name = "Payments", description = "Checkout, verification and provider webhooks"),
        (name = "Learning", description = "Lessons, progress, notes and quizzes (auth required)"),
        (name = "Administration", description = "Enrollment management (admin role)"),
        (name = "System", description = "Health checks and system info")
    )
)]
pub struct ApiDoc;
