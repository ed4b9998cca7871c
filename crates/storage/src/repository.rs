use assess_core::model::{
    FormAction, FormName, FormProgress, FormProgressId, ProgressError, Question, ResponsePayload,
    ResponseRecord, ResponseRecordId, SessionToken, SubmissionPolicy, User, UserDetails, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// A server-side login session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token: SessionToken,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A save or submit against one (user, form) pair.
///
/// Both the progress row and the response record are written from this in a
/// single transaction; the status transition itself is decided by
/// `FormProgress::apply` against the row as read inside that transaction.
#[derive(Debug, Clone)]
pub struct FormWrite {
    pub user_id: UserId,
    pub form_name: FormName,
    pub action: FormAction,
    pub responses: ResponsePayload,
    pub policy: SubmissionPolicy,
    pub at: DateTime<Utc>,
}

/// State of both records after a committed `FormWrite`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormWriteOutcome {
    pub progress: FormProgress,
    pub record: ResponseRecord,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FormWriteError {
    /// No progress row exists for this user and form.
    #[error("no progress row for form {0}")]
    UnknownForm(FormName),

    #[error(transparent)]
    Rejected(#[from] ProgressError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user together with one `not_started` progress row per form.
    ///
    /// Either everything is written or nothing is.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the username or email is taken.
    async fn register_user(&self, user: &User, forms: &[FormName]) -> Result<(), StorageError>;

    /// Look a user up by username or email.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn find_by_login(&self, login: &str) -> Result<Option<User>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn create_session(&self, session: &SessionRecord) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_session(&self, token: &SessionToken)
    -> Result<Option<SessionRecord>, StorageError>;

    /// Deleting a missing session is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn delete_session(&self, token: &SessionToken) -> Result<(), StorageError>;

    /// Remove every session that expired at or before `now`; returns the count.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait FormProgressRepository: Send + Sync {
    /// All progress rows of a user, ordered by form.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_progress(&self, user_id: UserId) -> Result<Vec<FormProgress>, StorageError>;
}

#[async_trait]
pub trait ResponseRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_responses(
        &self,
        user_id: UserId,
        form_name: FormName,
    ) -> Result<Option<ResponseRecord>, StorageError>;
}

/// Atomic write of a progress row and its response record.
#[async_trait]
pub trait ProgressPersistence: Send + Sync {
    /// # Errors
    ///
    /// Returns `FormWriteError::UnknownForm` if the progress row is missing,
    /// `FormWriteError::Rejected` if the transition is refused, and
    /// `FormWriteError::Storage` if the transaction fails. No error leaves
    /// either record modified.
    async fn apply_form_write(&self, write: &FormWrite)
    -> Result<FormWriteOutcome, FormWriteError>;
}

#[async_trait]
pub trait UserDetailsRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_details(&self, user_id: UserId) -> Result<Option<UserDetails>, StorageError>;

    /// Insert or replace the single profile row of the user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the profile cannot be stored.
    async fn save_details(&self, details: &UserDetails) -> Result<(), StorageError>;
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Questions of a form ordered by serial number. Empty when none are loaded.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_questions(&self, form_name: FormName) -> Result<Vec<Question>, StorageError>;

    /// Replace the whole question set of a form.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the set cannot be stored.
    async fn replace_questions(
        &self,
        form_name: FormName,
        questions: &[Question],
    ) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY BACKEND ─────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    sessions: HashMap<SessionToken, SessionRecord>,
    progress: HashMap<(UserId, FormName), FormProgress>,
    records: HashMap<(UserId, FormName), ResponseRecord>,
    details: HashMap<UserId, UserDetails>,
    questions: HashMap<FormName, Vec<Question>>,
    next_form_id: u64,
    next_record_id: u64,
    fail_record_writes: bool,
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Every operation holds one lock over the whole state, so multi-record
/// writes are atomic with respect to readers.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent response-record write fail with a connection
    /// error, to exercise rollback paths.
    pub fn fail_record_writes(&self, fail: bool) {
        if let Ok(mut guard) = self.state.lock() {
            guard.fail_record_writes = fail;
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn register_user(&self, user: &User, forms: &[FormName]) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let taken = guard.users.values().any(|existing| {
            existing.username() == user.username() || existing.email() == user.email()
        });
        if taken || guard.users.contains_key(&user.id()) {
            return Err(StorageError::Conflict);
        }

        guard.users.insert(user.id(), user.clone());
        for form in forms {
            guard.next_form_id += 1;
            let id = FormProgressId::new(guard.next_form_id);
            guard.progress.insert(
                (user.id(), *form),
                FormProgress::not_started(id, user.id(), *form, user.created_at()),
            );
        }
        Ok(())
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .users
            .values()
            .find(|user| user.username().as_str() == login || user.email().as_str() == login)
            .cloned())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.users.get(&id).cloned())
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn create_session(&self, session: &SessionRecord) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.users.contains_key(&session.user_id) {
            return Err(StorageError::NotFound);
        }
        guard.sessions.insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn get_session(
        &self,
        token: &SessionToken,
    ) -> Result<Option<SessionRecord>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.sessions.get(token).cloned())
    }

    async fn delete_session(&self, token: &SessionToken) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.sessions.remove(token);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        let before = guard.sessions.len();
        guard.sessions.retain(|_, session| !session.is_expired(now));
        Ok((before - guard.sessions.len()) as u64)
    }
}

#[async_trait]
impl FormProgressRepository for InMemoryRepository {
    async fn list_progress(&self, user_id: UserId) -> Result<Vec<FormProgress>, StorageError> {
        let guard = self.lock()?;
        let mut rows: Vec<FormProgress> = guard
            .progress
            .iter()
            .filter(|((owner, _), _)| *owner == user_id)
            .map(|(_, progress)| progress.clone())
            .collect();
        rows.sort_by_key(FormProgress::form_name);
        Ok(rows)
    }
}

#[async_trait]
impl ResponseRepository for InMemoryRepository {
    async fn get_responses(
        &self,
        user_id: UserId,
        form_name: FormName,
    ) -> Result<Option<ResponseRecord>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.records.get(&(user_id, form_name)).cloned())
    }
}

#[async_trait]
impl ProgressPersistence for InMemoryRepository {
    async fn apply_form_write(
        &self,
        write: &FormWrite,
    ) -> Result<FormWriteOutcome, FormWriteError> {
        let mut guard = self.lock()?;
        let key = (write.user_id, write.form_name);

        // Stage both records, then commit them together.
        let mut progress = guard
            .progress
            .get(&key)
            .cloned()
            .ok_or(FormWriteError::UnknownForm(write.form_name))?;
        progress.apply(write.action, write.policy, write.at)?;

        if guard.fail_record_writes {
            return Err(StorageError::Connection("record write failed".into()).into());
        }

        let record = match guard.records.get(&key) {
            Some(existing) => ResponseRecord {
                responses: write.responses.clone(),
                updated_at: write.at,
                ..existing.clone()
            },
            None => {
                guard.next_record_id += 1;
                ResponseRecord {
                    id: ResponseRecordId::new(guard.next_record_id),
                    user_id: write.user_id,
                    form_id: progress.id(),
                    form_name: write.form_name,
                    responses: write.responses.clone(),
                    created_at: write.at,
                    updated_at: write.at,
                }
            }
        };

        guard.progress.insert(key, progress.clone());
        guard.records.insert(key, record.clone());
        Ok(FormWriteOutcome { progress, record })
    }
}

#[async_trait]
impl UserDetailsRepository for InMemoryRepository {
    async fn get_details(&self, user_id: UserId) -> Result<Option<UserDetails>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.details.get(&user_id).cloned())
    }

    async fn save_details(&self, details: &UserDetails) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.users.contains_key(&details.user_id()) {
            return Err(StorageError::NotFound);
        }
        guard.details.insert(details.user_id(), details.clone());
        Ok(())
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn list_questions(&self, form_name: FormName) -> Result<Vec<Question>, StorageError> {
        let guard = self.lock()?;
        let mut questions = guard.questions.get(&form_name).cloned().unwrap_or_default();
        questions.sort_by_key(|q| q.id);
        Ok(questions)
    }

    async fn replace_questions(
        &self,
        form_name: FormName,
        questions: &[Question],
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.questions.insert(form_name, questions.to_vec());
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub progress: Arc<dyn FormProgressRepository>,
    pub responses: Arc<dyn ResponseRepository>,
    pub form_writes: Arc<dyn ProgressPersistence>,
    pub user_details: Arc<dyn UserDetailsRepository>,
    pub questions: Arc<dyn QuestionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_memory(InMemoryRepository::new())
    }

    /// Wrap an existing in-memory repository, keeping a handle for inspection.
    #[must_use]
    pub fn from_memory(repo: InMemoryRepository) -> Self {
        Self {
            users: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            responses: Arc::new(repo.clone()),
            form_writes: Arc::new(repo.clone()),
            user_details: Arc::new(repo.clone()),
            questions: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::model::{Email, ProgressMarker, ProgressStatus, Username};
    use assess_core::time::fixed_now;
    use serde_json::json;

    fn build_user(name: &str) -> User {
        User::new(
            UserId::generate(),
            Username::new(name).unwrap(),
            Email::new(format!("{name}@x.com")).unwrap(),
            "$argon2id$stub".into(),
            fixed_now(),
        )
    }

    fn payload(value: serde_json::Value) -> ResponsePayload {
        ResponsePayload::from_value(value).unwrap()
    }

    fn save(user: &User, form: FormName, marker: u32, responses: ResponsePayload) -> FormWrite {
        FormWrite {
            user_id: user.id(),
            form_name: form,
            action: FormAction::Save {
                marker: ProgressMarker::new(marker),
            },
            responses,
            policy: SubmissionPolicy::Amend,
            at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn registration_seeds_progress_rows() {
        let repo = InMemoryRepository::new();
        let user = build_user("alice");
        repo.register_user(&user, &FormName::ALL).await.unwrap();

        let rows = repo.list_progress(user.id()).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.status() == ProgressStatus::NotStarted));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_without_side_effects() {
        let repo = InMemoryRepository::new();
        let alice = build_user("alice");
        repo.register_user(&alice, &FormName::ALL).await.unwrap();

        let imposter = User::new(
            UserId::generate(),
            Username::new("other").unwrap(),
            Email::new("alice@x.com").unwrap(),
            "h".into(),
            fixed_now(),
        );
        let err = repo
            .register_user(&imposter, &FormName::ALL)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
        assert!(repo.get_user(imposter.id()).await.unwrap().is_none());
        assert!(repo.list_progress(imposter.id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn form_write_replaces_record_in_place() {
        let repo = InMemoryRepository::new();
        let user = build_user("bob");
        repo.register_user(&user, &FormName::ALL).await.unwrap();

        let first = repo
            .apply_form_write(&save(&user, FormName::HowGard, 1, payload(json!({"q1": "a"}))))
            .await
            .unwrap();
        let second = repo
            .apply_form_write(&save(&user, FormName::HowGard, 2, payload(json!({"q2": "b"}))))
            .await
            .unwrap();

        assert_eq!(first.record.id, second.record.id);
        assert_eq!(second.record.form_id, second.progress.id());
        let stored = repo
            .get_responses(user.id(), FormName::HowGard)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.responses, payload(json!({"q2": "b"})));
    }

    #[tokio::test]
    async fn failed_record_write_leaves_progress_untouched() {
        let repo = InMemoryRepository::new();
        let user = build_user("carol");
        repo.register_user(&user, &FormName::ALL).await.unwrap();
        repo.fail_record_writes(true);

        let err = repo
            .apply_form_write(&save(&user, FormName::Attitude, 5, ResponsePayload::empty()))
            .await
            .unwrap_err();
        assert!(matches!(err, FormWriteError::Storage(_)));

        let rows = repo.list_progress(user.id()).await.unwrap();
        let progress = rows
            .iter()
            .find(|row| row.form_name() == FormName::Attitude)
            .unwrap();
        assert_eq!(progress.status(), ProgressStatus::NotStarted);
        assert!(
            repo.get_responses(user.id(), FormName::Attitude)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn purge_removes_only_expired_sessions() {
        let repo = InMemoryRepository::new();
        let user = build_user("dave");
        repo.register_user(&user, &FormName::ALL).await.unwrap();

        let now = fixed_now();
        let live = SessionRecord {
            token: SessionToken::generate(),
            user_id: user.id(),
            created_at: now,
            expires_at: now + chrono::Duration::hours(1),
        };
        let stale = SessionRecord {
            token: SessionToken::generate(),
            user_id: user.id(),
            created_at: now - chrono::Duration::hours(2),
            expires_at: now - chrono::Duration::hours(1),
        };
        repo.create_session(&live).await.unwrap();
        repo.create_session(&stale).await.unwrap();

        assert_eq!(repo.purge_expired(now).await.unwrap(), 1);
        assert!(repo.get_session(&live.token).await.unwrap().is_some());
        assert!(repo.get_session(&stale.token).await.unwrap().is_none());
    }
}
