use std::sync::Arc;

use super::auth::TokenVerifier;
use crate::catalog::CatalogStore;
use crate::db::Database;
use crate::enrollment::{EnrollmentService, EnrollmentStore};
use crate::notify::Notifier;
use crate::payment::PaymentGateway;
use crate::progress::{ProgressStore, ProgressTracker};

/// Shared gateway state
pub struct AppState {
    pub catalog: Arc<dyn CatalogStore>,
    pub enrollments: EnrollmentService,
    pub tracker: ProgressTracker,
    pub tokens: TokenVerifier,
    /// PostgreSQL (absent in memory mode)
    pub pg_db: Option<Arc<Database>>,
}

/// Stores behind the three persistence seams
pub struct Stores {
    pub catalog: Arc<dyn CatalogStore>,
    pub enrollments: Arc<dyn EnrollmentStore>,
    pub progress: Arc<dyn ProgressStore>,
}

impl Stores {
    /// One object implementing all three seams
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: CatalogStore + EnrollmentStore + ProgressStore + 'static,
    {
        Self {
            catalog: store.clone(),
            enrollments: store.clone(),
            progress: store,
        }
    }
}

impl AppState {
    pub fn new(
        stores: Stores,
        payments: Arc<PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        jwt_secret: &str,
        callback_base_url: &str,
    ) -> Self {
        let enrollments = EnrollmentService::new(
            stores.catalog.clone(),
            stores.enrollments.clone(),
            stores.progress.clone(),
            payments,
            notifier.clone(),
            callback_base_url,
        );
        let tracker = ProgressTracker::new(
            stores.catalog.clone(),
            stores.enrollments,
            stores.progress,
            notifier,
        );
        Self {
            catalog: stores.catalog,
            enrollments,
            tracker,
            tokens: TokenVerifier::new(jwt_secret),
            pg_db: None,
        }
    }

    pub fn with_database(mut self, db: Arc<Database>) -> Self {
        self.pg_db = Some(db);
        self
    }
}
