use std::sync::Arc;

use assess_core::model::{UserDetails, UserDetailsDraft};
use storage::repository::UserDetailsRepository;
use tracing::info;

use crate::Clock;
use crate::error::UserDetailsServiceError;
use crate::identity::Identity;

/// Reads and overwrites the caller's profile.
#[derive(Clone)]
pub struct UserDetailsService {
    clock: Clock,
    details: Arc<dyn UserDetailsRepository>,
}

impl UserDetailsService {
    #[must_use]
    pub fn new(clock: Clock, details: Arc<dyn UserDetailsRepository>) -> Self {
        Self { clock, details }
    }

    /// Replace the caller's profile, keeping the original creation time.
    ///
    /// # Errors
    ///
    /// Returns `UserDetailsServiceError::Invalid` for an unparseable age or date of birth.
    /// Returns `UserDetailsServiceError::Storage` if persistence fails.
    pub async fn save(
        &self,
        identity: &Identity,
        draft: UserDetailsDraft,
    ) -> Result<UserDetails, UserDetailsServiceError> {
        let now = self.clock.now();
        let created_at = self
            .details
            .get_details(identity.user_id())
            .await?
            .map_or(now, |existing| existing.created_at());

        let details = draft.validate(identity.user_id(), created_at, now)?;
        self.details.save_details(&details).await?;
        info!(user_id = %identity.user_id(), "user details saved");
        Ok(details)
    }

    /// The caller's profile, or `None` if it was never filled in.
    ///
    /// # Errors
    ///
    /// Returns `UserDetailsServiceError::Storage` if repository access fails.
    pub async fn get(
        &self,
        identity: &Identity,
    ) -> Result<Option<UserDetails>, UserDetailsServiceError> {
        Ok(self.details.get_details(identity.user_id()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assess_core::model::{RegistrationDraft, UserDetailsError};
    use assess_core::time::fixed_now;
    use chrono::Duration;
    use storage::repository::Storage;

    use crate::IdentityGate;

    async fn setup(clock: Clock) -> (Storage, Identity) {
        let storage = Storage::in_memory();
        let gate = IdentityGate::new(
            clock,
            Duration::hours(1),
            Arc::clone(&storage.users),
            Arc::clone(&storage.sessions),
        );
        let identity = gate
            .register(RegistrationDraft {
                username: "alice".into(),
                password: "pw".into(),
                email: "alice@x.com".into(),
            })
            .await
            .unwrap()
            .identity;
        (storage, identity)
    }

    #[tokio::test]
    async fn missing_profile_is_none() {
        let clock = Clock::fixed(fixed_now());
        let (storage, alice) = setup(clock).await;
        let service = UserDetailsService::new(clock, Arc::clone(&storage.user_details));
        assert!(service.get(&alice).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn overwrite_keeps_created_at() {
        let mut clock = Clock::fixed(fixed_now());
        let (storage, alice) = setup(clock).await;

        let first = UserDetailsService::new(clock, Arc::clone(&storage.user_details))
            .save(
                &alice,
                UserDetailsDraft {
                    name: Some("Alice".into()),
                    age: Some("30".into()),
                    ..UserDetailsDraft::new()
                },
            )
            .await
            .unwrap();

        clock.advance(Duration::days(2));
        let second = UserDetailsService::new(clock, Arc::clone(&storage.user_details))
            .save(
                &alice,
                UserDetailsDraft {
                    name: Some("Alice B".into()),
                    ..UserDetailsDraft::new()
                },
            )
            .await
            .unwrap();

        assert_eq!(second.created_at(), first.created_at());
        assert_eq!(second.updated_at(), fixed_now() + Duration::days(2));
        assert_eq!(second.name(), Some("Alice B"));
        assert_eq!(second.age(), None);
    }

    #[tokio::test]
    async fn invalid_age_is_rejected() {
        let clock = Clock::fixed(fixed_now());
        let (storage, alice) = setup(clock).await;
        let service = UserDetailsService::new(clock, Arc::clone(&storage.user_details));

        let err = service
            .save(
                &alice,
                UserDetailsDraft {
                    age: Some("old".into()),
                    ..UserDetailsDraft::new()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UserDetailsServiceError::Invalid(UserDetailsError::InvalidAge)
        ));
        assert!(service.get(&alice).await.unwrap().is_none());
    }
}
