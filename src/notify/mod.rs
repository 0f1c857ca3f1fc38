//! Notification Dispatcher
//!
//! The engine emits [`NotificationEvent`]s; rendering and delivery belong to an
//! external mail collaborator. `notify` never blocks on delivery and never
//! fails the operation that triggered it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::catalog::Money;
use crate::core_types::{EnrollmentId, ProgramId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// Intake received (to the learner, copy to admin)
    EnrollmentSubmitted {
        enrollment_id: EnrollmentId,
        program_id: ProgramId,
        program_title: String,
        learner_email: String,
        learner_name: Option<String>,
        amount: Money,
    },
    /// A payment was captured (to the admin)
    PaymentReceived {
        enrollment_id: EnrollmentId,
        program_title: String,
        learner_email: String,
        amount: Money,
        provider: String,
        reference: String,
    },
    /// Enrollment confirmed after payment (to the learner)
    EnrollmentConfirmed {
        enrollment_id: EnrollmentId,
        program_title: String,
        learner_email: String,
        amount: Money,
    },
    ProgramCompleted {
        enrollment_id: EnrollmentId,
        program_title: String,
        learner_email: String,
        completed_at: DateTime<Utc>,
    },
}

impl NotificationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::EnrollmentSubmitted { .. } => "enrollment_submitted",
            NotificationEvent::PaymentReceived { .. } => "payment_received",
            NotificationEvent::EnrollmentConfirmed { .. } => "enrollment_confirmed",
            NotificationEvent::ProgramCompleted { .. } => "program_completed",
        }
    }

    pub fn enrollment_id(&self) -> EnrollmentId {
        match self {
            NotificationEvent::EnrollmentSubmitted { enrollment_id, .. }
            | NotificationEvent::PaymentReceived { enrollment_id, .. }
            | NotificationEvent::EnrollmentConfirmed { enrollment_id, .. }
            | NotificationEvent::ProgramCompleted { enrollment_id, .. } => *enrollment_id,
        }
    }
}

/// Fire-and-forget event sink
pub trait Notifier: Send + Sync {
    fn notify(&self, event: NotificationEvent);
}

/// Log-only sink
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: NotificationEvent) {
        info!(
            kind = event.kind(),
            enrollment_id = %event.enrollment_id(),
            "Notification emitted"
        );
    }
}

/// POSTs every event as JSON to a mail relay
pub struct RelayNotifier {
    client: reqwest::Client,
    relay_url: String,
    admin_email: Option<String>,
}

#[derive(Serialize)]
struct RelayEnvelope<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    admin_email: Option<&'a str>,
    event: &'a NotificationEvent,
}

impl RelayNotifier {
    pub fn new(client: reqwest::Client, relay_url: &str, admin_email: Option<String>) -> Self {
        Self {
            client,
            relay_url: relay_url.to_string(),
            admin_email,
        }
    }
}

impl Notifier for RelayNotifier {
    fn notify(&self, event: NotificationEvent) {
        // No runtime (e.g. sync tests): log instead of panicking in spawn
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(kind = event.kind(), "No async runtime, notification dropped");
            return;
        };

        let client = self.client.clone();
        let url = self.relay_url.clone();
        let admin_email = self.admin_email.clone();
        handle.spawn(async move {
            let envelope = RelayEnvelope {
                admin_email: admin_email.as_deref(),
                event: &event,
            };
            let result = client
                .post(&url)
                .json(&envelope)
                .send()
                .await
                .and_then(|r| r.error_for_status());
            match result {
                Ok(_) => info!(kind = event.kind(), "Notification relayed"),
                Err(e) => warn!(kind = event.kind(), error = %e, "Notification relay failed"),
            }
        });
    }
}

/// HTTP client for relay deliveries; a stalled relay is cut off after `timeout`
pub fn relay_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Log-only when no relay is configured
pub fn build_notifier(
    config: &crate::config::NotificationConfig,
) -> reqwest::Result<Arc<dyn Notifier>> {
    Ok(match &config.relay_url {
        Some(url) => Arc::new(RelayNotifier::new(
            relay_client(Duration::from_secs(config.timeout_secs))?,
            url,
            config.admin_email.clone(),
        )),
        None => Arc::new(TracingNotifier),
    })
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Captures events for assertions
    #[derive(Default)]
    pub struct RecordingNotifier {
        events: Mutex<Vec<NotificationEvent>>,
    }

    impl RecordingNotifier {
        pub fn events(&self) -> Vec<NotificationEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn kinds(&self) -> Vec<&'static str> {
            self.events().iter().map(|e| e.kind()).collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, event: NotificationEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}
