//! HTTP-level tests: the real router on an ephemeral port, driven by reqwest.
//!
//! Requires the `mock-api` feature (default) for the sandbox payment provider.

#![cfg(feature = "mock-api")]

use std::sync::Arc;

use chrono::{Duration, Utc};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use uuid::Uuid;

use enrollment_core::catalog::{CatalogStore, Lesson, Money, Program, ProgramCategory};
use enrollment_core::core_types::{Caller, Role};
use enrollment_core::gateway::{self, AppState, Stores, TokenVerifier};
use enrollment_core::notify::TracingNotifier;
use enrollment_core::payment::paystack::SIGNATURE_HEADER;
use enrollment_core::payment::{PaymentEvent, PaymentGateway, ProviderKind, SandboxProvider};
use enrollment_core::store::MemoryStore;

const JWT_SECRET: &str = "gateway-test-secret";

struct TestServer {
    base: String,
    client: reqwest::Client,
    tokens: TokenVerifier,
    paystack: Arc<SandboxProvider>,
    program: Program,
    lessons: Vec<Lesson>,
}

impl TestServer {
    async fn start() -> Self {
        let store = Arc::new(MemoryStore::new());
        let program = Program::new(
            "Python Bootcamp",
            ProgramCategory::Bootcamp,
            Money::new(Decimal::new(34900, 2), "USD"),
        );
        store.upsert_program(&program).await.unwrap();
        let lessons = vec![
            Lesson::new(program.id, 0, 1, "Welcome"),
            Lesson::new(program.id, 0, 2, "Installing Python"),
        ];
        for lesson in &lessons {
            store.upsert_lesson(lesson).await.unwrap();
        }

        let paystack = Arc::new(SandboxProvider::new(ProviderKind::Paystack));
        let payments = Arc::new(PaymentGateway::new(ProviderKind::Paystack).with_provider(paystack.clone()));
        let state = AppState::new(
            Stores::shared(store),
            payments,
            Arc::new(TracingNotifier),
            JWT_SECRET,
            "http://localhost:3000",
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = gateway::router(Arc::new(state));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}/api/v1", addr),
            client: reqwest::Client::new(),
            tokens: TokenVerifier::new(JWT_SECRET),
            paystack,
            program,
            lessons,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn token(&self, email: &str, role: Role) -> String {
        let caller = Caller::new(Uuid::new_v4(), email, role);
        self.tokens.issue(&caller, Duration::hours(1)).unwrap()
    }

    async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut req = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.unwrap();
        (resp.status(), resp.json().await.unwrap())
    }
}

#[tokio::test]
async fn test_health_and_catalog() {
    let server = TestServer::start().await;

    let (status, body) = server.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert!(body["data"]["timestamp_ms"].as_i64().unwrap() > 0);

    let (status, body) = server.get("/programs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["title"], "Python Bootcamp");

    let (status, body) = server.get(&format!("/programs/{}", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4001);

    let (status, body) = server.get("/payments/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["defaultProvider"], "paystack");
}

#[tokio::test]
async fn test_public_intake() {
    let server = TestServer::start().await;
    let intake = json!({
        "programId": server.program.id,
        "studentInfo": {"firstName": "Ada", "lastName": "Lovelace", "email": "ada@example.com"},
        "enrollmentType": "individual",
        "numberOfParticipants": 1
    });

    let (status, body) = server.post("/enrollments", None, intake).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["paymentStatus"], "pending");

    let invalid = json!({
        "programId": server.program.id,
        "studentInfo": {"firstName": "", "lastName": "Lovelace", "email": "not-an-email"}
    });
    let (status, body) = server.post("/enrollments", None, invalid).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1001);

    let unknown = json!({
        "programId": Uuid::new_v4(),
        "studentInfo": {"firstName": "Ada", "lastName": "Lovelace", "email": "ada@example.com"}
    });
    let (status, body) = server.post("/enrollments", None, unknown).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4001);
}

#[tokio::test]
async fn test_auth_required_and_admin_only() {
    let server = TestServer::start().await;

    let (status, body) = server.get("/enrollments/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 2002);

    let (status, _) = server.get("/enrollments/me", Some("garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let student = server.token("ada@example.com", Role::Student);
    let (status, body) = server.get("/enrollments", Some(&student)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 2003);

    let admin = server.token("admin@example.com", Role::Admin);
    let (status, body) = server.get("/enrollments?page=1&limit=5", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 0);
    assert_eq!(body["data"]["limit"], 5);
}

#[tokio::test]
async fn test_pay_then_learn() {
    let server = TestServer::start().await;
    let token = server.token("grace@example.com", Role::Student);
    let program_id = server.program.id;

    // Not enrolled yet
    let (status, _) = server
        .get(&format!("/lessons/program/{}", program_id), Some(&token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = server
        .post(
            "/payments/initialize",
            Some(&token),
            json!({"programId": program_id}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let reference = body["data"]["reference"].as_str().unwrap().to_string();
    assert!(reference.starts_with("PE_"));

    let verify_path = format!("/payments/verify/paystack/{}?programId={}", reference, program_id);
    let (status, body) = server.get(&verify_path, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "confirmed");
    assert_eq!(body["data"]["payment_status"], "paid");
    let enrollment_id = body["data"]["id"].clone();

    // Verifying again is idempotent
    let (status, body) = server.get(&verify_path, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], enrollment_id);

    let (status, body) = server
        .post(
            "/payments/initialize",
            Some(&token),
            json!({"programId": program_id}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1002);

    let (status, body) = server
        .get(&format!("/lessons/program/{}", program_id), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["enrollment"]["status"], "active");
    assert_eq!(body["data"]["lessons"].as_array().unwrap().len(), 2);

    // Completion body is optional
    let resp = server
        .client
        .post(server.url(&format!("/lessons/{}/complete", server.lessons[0].id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["overall_progress"], 50);

    let (_, body) = server
        .post(
            &format!("/lessons/{}/complete", server.lessons[1].id),
            Some(&token),
            json!({"watchTime": 300}),
        )
        .await;
    assert_eq!(body["data"]["overall_progress"], 100);

    let (status, body) = server.get("/student/dashboard", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stats"]["completed_programs"], 1);
}

#[tokio::test]
async fn test_webhook_signed_and_idempotent() {
    let server = TestServer::start().await;
    let event = PaymentEvent {
        provider: ProviderKind::Paystack,
        reference: "PE_999".to_string(),
        program_id: server.program.id,
        account_id: None,
        email: "linus@example.com".to_string(),
        amount: server.program.price.clone(),
        paid_at: Utc::now(),
    };
    let (body, signature) = server.paystack.webhook(&event).unwrap();

    let send = |signature: String| {
        server
            .client
            .post(server.url("/payments/webhook/paystack"))
            .header(SIGNATURE_HEADER, signature)
            .header("content-type", "application/json")
            .body(body.clone())
            .send()
    };

    let resp = send(signature.clone()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let ack: Value = resp.json().await.unwrap();
    assert_eq!(ack["data"]["outcome"], "recorded");

    let resp = send(signature).await.unwrap();
    let ack: Value = resp.json().await.unwrap();
    assert_eq!(ack["data"]["outcome"], "duplicate");

    let resp = send("0".repeat(128)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let admin = server.token("admin@example.com", Role::Admin);
    let (_, body) = server
        .get("/enrollments?status=confirmed", Some(&admin))
        .await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["learner_email"], "linus@example.com");
}

#[tokio::test]
async fn test_admin_status_override_and_delete() {
    let server = TestServer::start().await;
    let admin = server.token("admin@example.com", Role::Admin);
    let intake = json!({
        "programId": server.program.id,
        "studentInfo": {"firstName": "Ada", "lastName": "Lovelace", "email": "ada@example.com"}
    });
    let (_, body) = server.post("/enrollments", None, intake).await;
    let id = body["data"]["enrollmentId"].as_str().unwrap().to_string();

    let resp = server
        .client
        .put(server.url(&format!("/enrollments/{}/status", id)))
        .bearer_auth(&admin)
        .json(&json!({"status": "cancelled", "notes": "duplicate intake"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status"], "cancelled");
    assert_eq!(body["data"]["notes"], "duplicate intake");

    let delete = || {
        server
            .client
            .delete(server.url(&format!("/enrollments/{}", id)))
            .bearer_auth(&admin)
            .send()
    };
    assert_eq!(delete().await.unwrap().status(), StatusCode::OK);
    assert_eq!(delete().await.unwrap().status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_openapi_served() {
    let server = TestServer::start().await;
    let docs = server.base.replace("/api/v1", "/api-docs/openapi.json");
    let spec: Value = server.client.get(docs).send().await.unwrap().json().await.unwrap();
    assert_eq!(spec["info"]["title"], "Enrollment Core API");
}
