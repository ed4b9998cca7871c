use std::sync::Arc;

use assess_core::model::{
    FormAction, FormName, FormProgress, ProgressMarker, ResponsePayload, SubmissionPolicy,
};
use storage::repository::{
    FormProgressRepository, FormWrite, FormWriteError, ProgressPersistence, ResponseRepository,
    StorageError,
};
use tracing::{debug, error, info, warn};

use crate::Clock;
use crate::error::ProgressServiceError;
use crate::identity::Identity;

/// Snapshot of every progress row a user owns, ordered by form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSummary {
    entries: Vec<FormProgress>,
}

impl ProgressSummary {
    #[must_use]
    pub fn entries(&self) -> &[FormProgress] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, form_name: FormName) -> Option<&FormProgress> {
        self.entries.iter().find(|p| p.form_name() == form_name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Applies saves and submits to a user's forms and reads them back.
///
/// Every write goes through `ProgressPersistence::apply_form_write`, so the
/// progress row and the response record change together or not at all.
#[derive(Clone)]
pub struct ProgressCoordinator {
    clock: Clock,
    policy: SubmissionPolicy,
    progress: Arc<dyn FormProgressRepository>,
    responses: Arc<dyn ResponseRepository>,
    writes: Arc<dyn ProgressPersistence>,
}

impl ProgressCoordinator {
    #[must_use]
    pub fn new(
        clock: Clock,
        policy: SubmissionPolicy,
        progress: Arc<dyn FormProgressRepository>,
        responses: Arc<dyn ResponseRepository>,
        writes: Arc<dyn ProgressPersistence>,
    ) -> Self {
        Self {
            clock,
            policy,
            progress,
            responses,
            writes,
        }
    }

    /// Record the caller's position in a form and replace its stored answers.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::UnknownForm` if the form does not exist for this user.
    /// Returns `ProgressServiceError::Rejected` if the form is locked after submission.
    /// Returns `ProgressServiceError::Storage` if the write fails; nothing is changed.
    pub async fn save_progress(
        &self,
        identity: &Identity,
        form_name: &str,
        marker: ProgressMarker,
        responses: ResponsePayload,
    ) -> Result<(), ProgressServiceError> {
        let form_name = parse_form(form_name)?;
        self.write(identity, form_name, FormAction::Save { marker }, responses)
            .await?;
        debug!(user_id = %identity.user_id(), form = %form_name, marker = marker.value(), "progress saved");
        Ok(())
    }

    /// Mark a form submitted and replace its stored answers. The marker is left as is.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::UnknownForm` if the form does not exist for this user.
    /// Returns `ProgressServiceError::Rejected` if the form is locked after submission.
    /// Returns `ProgressServiceError::Storage` if the write fails; nothing is changed.
    pub async fn submit_form(
        &self,
        identity: &Identity,
        form_name: &str,
        responses: ResponsePayload,
    ) -> Result<(), ProgressServiceError> {
        let form_name = parse_form(form_name)?;
        let answered = responses.len();
        self.write(identity, form_name, FormAction::Submit, responses)
            .await?;
        info!(user_id = %identity.user_id(), form = %form_name, answered, "form submitted");
        Ok(())
    }

    /// Current marker, status and last update for each of the caller's forms.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn progress_summary(
        &self,
        identity: &Identity,
    ) -> Result<ProgressSummary, ProgressServiceError> {
        let entries = self
            .progress
            .list_progress(identity.user_id())
            .await
            .map_err(|err| storage_fault("progress_summary", err))?;
        Ok(ProgressSummary { entries })
    }

    /// Stored answers for a form, or an empty payload if nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::UnknownForm` if the name is not a known form.
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn get_responses(
        &self,
        identity: &Identity,
        form_name: &str,
    ) -> Result<ResponsePayload, ProgressServiceError> {
        let form_name = parse_form(form_name)?;
        let record = self
            .responses
            .get_responses(identity.user_id(), form_name)
            .await
            .map_err(|err| storage_fault("get_responses", err))?;
        Ok(record.map(|r| r.responses).unwrap_or_default())
    }

    async fn write(
        &self,
        identity: &Identity,
        form_name: FormName,
        action: FormAction,
        responses: ResponsePayload,
    ) -> Result<(), ProgressServiceError> {
        let write = FormWrite {
            user_id: identity.user_id(),
            form_name,
            action,
            responses,
            policy: self.policy,
            at: self.clock.now(),
        };

        match self.writes.apply_form_write(&write).await {
            Ok(_) => Ok(()),
            Err(FormWriteError::UnknownForm(form)) => {
                warn!(user_id = %identity.user_id(), form = %form, "write to form without progress row");
                Err(ProgressServiceError::UnknownForm(form.to_string()))
            }
            Err(FormWriteError::Rejected(err)) => {
                warn!(user_id = %identity.user_id(), form = %form_name, "write rejected: {err}");
                Err(err.into())
            }
            Err(FormWriteError::Storage(err)) => Err(storage_fault("apply_form_write", err)),
            Err(other) => Err(storage_fault(
                "apply_form_write",
                StorageError::Connection(other.to_string()),
            )),
        }
    }
}

fn parse_form(raw: &str) -> Result<FormName, ProgressServiceError> {
    raw.parse()
        .map_err(|_| ProgressServiceError::UnknownForm(raw.to_owned()))
}

fn storage_fault(op: &'static str, err: StorageError) -> ProgressServiceError {
    error!(op, error = %err, "storage failure");
    ProgressServiceError::Storage(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    use assess_core::model::{ProgressError, ProgressStatus, RegistrationDraft};
    use assess_core::time::fixed_now;
    use chrono::Duration;
    use serde_json::json;
    use storage::repository::{InMemoryRepository, Storage};

    use crate::IdentityGate;

    fn payload(value: serde_json::Value) -> ResponsePayload {
        ResponsePayload::from_value(value).unwrap()
    }

    async fn setup(policy: SubmissionPolicy) -> (InMemoryRepository, ProgressCoordinator, Identity) {
        let repo = InMemoryRepository::new();
        let storage = Storage::from_memory(repo.clone());
        let clock = Clock::fixed(fixed_now());
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
        let coordinator = ProgressCoordinator::new(
            clock,
            policy,
            Arc::clone(&storage.progress),
            Arc::clone(&storage.responses),
            Arc::clone(&storage.form_writes),
        );
        (repo, coordinator, identity)
    }

    #[tokio::test]
    async fn save_then_submit_updates_status_and_answers() {
        let (_, coordinator, alice) = setup(SubmissionPolicy::Amend).await;

        coordinator
            .save_progress(&alice, "HowGard", ProgressMarker::new(40), payload(json!({"q1": "yes"})))
            .await
            .unwrap();
        let summary = coordinator.progress_summary(&alice).await.unwrap();
        let howgard = summary.get(FormName::HowGard).unwrap();
        assert_eq!(howgard.status(), ProgressStatus::InProgress);
        assert_eq!(howgard.marker(), ProgressMarker::new(40));

        coordinator
            .submit_form(&alice, "HowGard", payload(json!({"q1": "yes", "q2": "no"})))
            .await
            .unwrap();
        let summary = coordinator.progress_summary(&alice).await.unwrap();
        let howgard = summary.get(FormName::HowGard).unwrap();
        assert_eq!(howgard.status(), ProgressStatus::Submitted);
        assert_eq!(howgard.marker(), ProgressMarker::new(40));
        assert_eq!(
            summary.get(FormName::Attitude).unwrap().status(),
            ProgressStatus::NotStarted
        );

        let answers = coordinator.get_responses(&alice, "HowGard").await.unwrap();
        assert_eq!(answers, payload(json!({"q1": "yes", "q2": "no"})));
    }

    #[tokio::test]
    async fn responses_default_to_empty() {
        let (_, coordinator, alice) = setup(SubmissionPolicy::Amend).await;
        let answers = coordinator.get_responses(&alice, "Motivational").await.unwrap();
        assert!(answers.is_empty());
    }

    #[tokio::test]
    async fn unknown_form_changes_nothing() {
        let (_, coordinator, alice) = setup(SubmissionPolicy::Amend).await;
        let before = coordinator.progress_summary(&alice).await.unwrap();

        let err = coordinator
            .save_progress(&alice, "Foo", ProgressMarker::new(1), ResponsePayload::empty())
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::UnknownForm(ref name) if name == "Foo"));

        let after = coordinator.progress_summary(&alice).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn failed_record_write_leaves_progress_untouched() {
        let (repo, coordinator, alice) = setup(SubmissionPolicy::Amend).await;
        repo.fail_record_writes(true);

        let err = coordinator
            .save_progress(&alice, "Attitude", ProgressMarker::new(3), payload(json!({"q1": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::Storage(_)));

        repo.fail_record_writes(false);
        let summary = coordinator.progress_summary(&alice).await.unwrap();
        let attitude = summary.get(FormName::Attitude).unwrap();
        assert_eq!(attitude.status(), ProgressStatus::NotStarted);
        assert_eq!(attitude.marker(), ProgressMarker::default());
        assert!(coordinator.get_responses(&alice, "Attitude").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn amend_policy_accepts_resubmission() {
        let (_, coordinator, alice) = setup(SubmissionPolicy::Amend).await;
        coordinator
            .submit_form(&alice, "Attitude", payload(json!({"q1": "a"})))
            .await
            .unwrap();
        coordinator
            .submit_form(&alice, "Attitude", payload(json!({"q1": "b"})))
            .await
            .unwrap();

        let answers = coordinator.get_responses(&alice, "Attitude").await.unwrap();
        assert_eq!(answers, payload(json!({"q1": "b"})));
    }

    #[tokio::test]
    async fn lock_policy_rejects_writes_after_submit() {
        let (_, coordinator, alice) = setup(SubmissionPolicy::Lock).await;
        coordinator
            .submit_form(&alice, "Attitude", payload(json!({"q1": "a"})))
            .await
            .unwrap();

        let err = coordinator
            .save_progress(&alice, "Attitude", ProgressMarker::new(9), payload(json!({"q1": "b"})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProgressServiceError::Rejected(ProgressError::AlreadySubmitted(FormName::Attitude))
        ));

        let answers = coordinator.get_responses(&alice, "Attitude").await.unwrap();
        assert_eq!(answers, payload(json!({"q1": "a"})));
    }
}
