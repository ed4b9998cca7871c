use std::sync::Arc;

use assess_core::model::SubmissionPolicy;
use chrono::Duration;
use storage::repository::Storage;

use crate::Clock;
use crate::catalog::FormCatalog;
use crate::error::AppServicesError;
use crate::identity::IdentityGate;
use crate::progress::ProgressCoordinator;
use crate::user_details_service::UserDetailsService;

/// Deployment knobs the services need.
#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    pub session_ttl: Duration,
    pub submission_policy: SubmissionPolicy,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            session_ttl: Duration::hours(24),
            submission_policy: SubmissionPolicy::default(),
        }
    }
}

/// Assembles the app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    identity: Arc<IdentityGate>,
    catalog: Arc<FormCatalog>,
    progress: Arc<ProgressCoordinator>,
    user_details: Arc<UserDetailsService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, running migrations first.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: ServiceSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, settings))
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, settings: ServiceSettings) -> Self {
        let identity = Arc::new(IdentityGate::new(
            clock,
            settings.session_ttl,
            Arc::clone(&storage.users),
            Arc::clone(&storage.sessions),
        ));
        let catalog = Arc::new(FormCatalog::new(Arc::clone(&storage.questions)));
        let progress = Arc::new(ProgressCoordinator::new(
            clock,
            settings.submission_policy,
            Arc::clone(&storage.progress),
            Arc::clone(&storage.responses),
            Arc::clone(&storage.form_writes),
        ));
        let user_details = Arc::new(UserDetailsService::new(
            clock,
            Arc::clone(&storage.user_details),
        ));

        Self {
            identity,
            catalog,
            progress,
            user_details,
        }
    }

    #[must_use]
    pub fn identity(&self) -> Arc<IdentityGate> {
        Arc::clone(&self.identity)
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<FormCatalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressCoordinator> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn user_details(&self) -> Arc<UserDetailsService> {
        Arc::clone(&self.user_details)
    }
}
