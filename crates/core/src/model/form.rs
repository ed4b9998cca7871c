use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{FormProgressId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FormError {
    #[error("unknown form: {0}")]
    UnknownForm(String),

    #[error("invalid progress status: {0}")]
    InvalidStatus(String),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("form {0} has already been submitted")]
    AlreadySubmitted(FormName),
}

//
// ─── FORM NAME ─────────────────────────────────────────────────────────────────
//

/// The fixed set of assessment forms.
///
/// Registration seeds one progress row per variant in `FormName::ALL`, and the
/// question catalog accepts exactly these names, so adding a form here is the
/// only change needed to make it available everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormName {
    HowGard,
    Attitude,
    Motivational,
}

impl FormName {
    pub const ALL: [FormName; 3] = [FormName::HowGard, FormName::Attitude, FormName::Motivational];

    /// Canonical spelling used in storage and API payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FormName::HowGard => "HowGard",
            FormName::Attitude => "Attitude",
            FormName::Motivational => "Motivational",
        }
    }
}

impl fmt::Display for FormName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormName {
    type Err = FormError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        FormName::ALL
            .into_iter()
            .find(|form| form.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| FormError::UnknownForm(s.to_string()))
    }
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Lifecycle of a form for one user.
///
/// Ordering follows the lifecycle, so `a < b` means `b` is further along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Submitted,
}

impl ProgressStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Submitted => "submitted",
        }
    }
}

impl FromStr for ProgressStatus {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(ProgressStatus::NotStarted),
            "in_progress" => Ok(ProgressStatus::InProgress),
            "submitted" => Ok(ProgressStatus::Submitted),
            other => Err(FormError::InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied position within a form (the client sends the number of
/// answered questions). Not required to grow between saves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressMarker(u32);

impl ProgressMarker {
    #[must_use]
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn value(self) -> u32 {
        self.0
    }
}

//
// ─── ACTIONS & POLICY ──────────────────────────────────────────────────────────
//

/// A write the caller asks to apply to a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    Save { marker: ProgressMarker },
    Submit,
}

/// What happens to writes against a form that is already submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmissionPolicy {
    /// Later saves and submits overwrite the stored answers; status stays `submitted`.
    #[default]
    Amend,
    /// A submitted form is final; further writes are rejected.
    Lock,
}

impl FromStr for SubmissionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "amend" => Ok(SubmissionPolicy::Amend),
            "lock" => Ok(SubmissionPolicy::Lock),
            other => Err(format!("unknown submission policy: {other}")),
        }
    }
}

//
// ─── FORM PROGRESS ─────────────────────────────────────────────────────────────
//

/// Per (user, form) progress ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormProgress {
    id: FormProgressId,
    user_id: UserId,
    form_name: FormName,
    marker: ProgressMarker,
    status: ProgressStatus,
    last_updated: DateTime<Utc>,
}

impl FormProgress {
    /// A fresh, untouched entry as created at registration.
    #[must_use]
    pub fn not_started(
        id: FormProgressId,
        user_id: UserId,
        form_name: FormName,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            form_name,
            marker: ProgressMarker::default(),
            status: ProgressStatus::NotStarted,
            last_updated: created_at,
        }
    }

    #[must_use]
    pub fn from_persisted(
        id: FormProgressId,
        user_id: UserId,
        form_name: FormName,
        marker: ProgressMarker,
        status: ProgressStatus,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            form_name,
            marker,
            status,
            last_updated,
        }
    }

    /// Apply a save or submit.
    ///
    /// A save moves the form to `in_progress` and replaces the marker, except
    /// that a submitted form stays submitted. A submit always ends in
    /// `submitted` and keeps the marker.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::AlreadySubmitted` when the form is submitted and
    /// the policy is `SubmissionPolicy::Lock`.
    pub fn apply(
        &mut self,
        action: FormAction,
        policy: SubmissionPolicy,
        at: DateTime<Utc>,
    ) -> Result<(), ProgressError> {
        if self.status == ProgressStatus::Submitted && policy == SubmissionPolicy::Lock {
            return Err(ProgressError::AlreadySubmitted(self.form_name));
        }

        match action {
            FormAction::Save { marker } => {
                self.marker = marker;
                self.status = self.status.max(ProgressStatus::InProgress);
            }
            FormAction::Submit => {
                self.status = ProgressStatus::Submitted;
            }
        }
        self.last_updated = at;
        Ok(())
    }

    #[must_use]
    pub fn id(&self) -> FormProgressId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn form_name(&self) -> FormName {
        self.form_name
    }

    #[must_use]
    pub fn marker(&self) -> ProgressMarker {
        self.marker
    }

    #[must_use]
    pub fn status(&self) -> ProgressStatus {
        self.status
    }

    #[must_use]
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn fresh(form: FormName) -> FormProgress {
        FormProgress::not_started(FormProgressId::new(1), UserId::generate(), form, fixed_now())
    }

    #[test]
    fn form_name_parses_case_insensitively() {
        assert_eq!("howgard".parse::<FormName>().unwrap(), FormName::HowGard);
        assert_eq!("ATTITUDE".parse::<FormName>().unwrap(), FormName::Attitude);
        assert_eq!(" Motivational ".parse::<FormName>().unwrap(), FormName::Motivational);
    }

    #[test]
    fn form_name_rejects_unknown() {
        let err = "Foo".parse::<FormName>().unwrap_err();
        assert_eq!(err, FormError::UnknownForm("Foo".into()));
    }

    #[test]
    fn status_round_trips_storage_spelling() {
        for status in [
            ProgressStatus::NotStarted,
            ProgressStatus::InProgress,
            ProgressStatus::Submitted,
        ] {
            assert_eq!(status.as_str().parse::<ProgressStatus>().unwrap(), status);
        }
        assert!("done".parse::<ProgressStatus>().is_err());
    }

    #[test]
    fn save_moves_to_in_progress_and_accepts_lower_marker() {
        let mut progress = fresh(FormName::HowGard);
        let later = fixed_now() + Duration::minutes(5);

        progress
            .apply(
                FormAction::Save { marker: ProgressMarker::new(40) },
                SubmissionPolicy::Amend,
                later,
            )
            .unwrap();
        assert_eq!(progress.status(), ProgressStatus::InProgress);
        assert_eq!(progress.marker(), ProgressMarker::new(40));
        assert_eq!(progress.last_updated(), later);

        progress
            .apply(
                FormAction::Save { marker: ProgressMarker::new(10) },
                SubmissionPolicy::Amend,
                later,
            )
            .unwrap();
        assert_eq!(progress.marker(), ProgressMarker::new(10));
        assert_eq!(progress.status(), ProgressStatus::InProgress);
    }

    #[test]
    fn submit_is_repeatable_under_amend() {
        let mut progress = fresh(FormName::Attitude);
        progress
            .apply(FormAction::Submit, SubmissionPolicy::Amend, fixed_now())
            .unwrap();
        progress
            .apply(FormAction::Submit, SubmissionPolicy::Amend, fixed_now())
            .unwrap();
        assert_eq!(progress.status(), ProgressStatus::Submitted);
    }

    #[test]
    fn save_after_submit_never_regresses_status() {
        let mut progress = fresh(FormName::HowGard);
        progress
            .apply(FormAction::Submit, SubmissionPolicy::Amend, fixed_now())
            .unwrap();
        progress
            .apply(
                FormAction::Save { marker: ProgressMarker::new(3) },
                SubmissionPolicy::Amend,
                fixed_now(),
            )
            .unwrap();
        assert_eq!(progress.status(), ProgressStatus::Submitted);
        assert_eq!(progress.marker(), ProgressMarker::new(3));
    }

    #[test]
    fn lock_policy_rejects_writes_after_submit() {
        let mut progress = fresh(FormName::Motivational);
        progress
            .apply(FormAction::Submit, SubmissionPolicy::Lock, fixed_now())
            .unwrap();

        let before = progress.clone();
        let err = progress
            .apply(FormAction::Submit, SubmissionPolicy::Lock, fixed_now() + Duration::hours(1))
            .unwrap_err();
        assert_eq!(err, ProgressError::AlreadySubmitted(FormName::Motivational));
        assert_eq!(progress, before);
    }

    #[test]
    fn submission_policy_parses() {
        assert_eq!("Lock".parse::<SubmissionPolicy>().unwrap(), SubmissionPolicy::Lock);
        assert_eq!("amend".parse::<SubmissionPolicy>().unwrap(), SubmissionPolicy::Amend);
        assert!("never".parse::<SubmissionPolicy>().is_err());
    }
}
