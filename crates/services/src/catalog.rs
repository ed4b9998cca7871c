use std::sync::Arc;

use assess_core::model::{FormName, Question};
use storage::repository::QuestionRepository;
use tracing::{debug, info, warn};

use crate::error::CatalogError;
use crate::identity::Identity;

/// Ordered questions for one form.
///
/// `warning` is set when the form is known but has no questions loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionList {
    pub form_name: FormName,
    pub questions: Vec<Question>,
    pub warning: Option<String>,
}

/// Read access to the question bank, plus bulk replacement for seeding.
#[derive(Clone)]
pub struct FormCatalog {
    questions: Arc<dyn QuestionRepository>,
}

impl FormCatalog {
    #[must_use]
    pub fn new(questions: Arc<dyn QuestionRepository>) -> Self {
        Self { questions }
    }

    /// List a form's questions in order. The form name is matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidFormType` if the name is not a known form.
    /// Returns `CatalogError::Storage` if repository access fails.
    pub async fn list_questions(
        &self,
        identity: &Identity,
        form_type: &str,
    ) -> Result<QuestionList, CatalogError> {
        let form_name: FormName = form_type
            .parse()
            .map_err(|_| CatalogError::InvalidFormType(form_type.to_owned()))?;

        let questions = self.questions.list_questions(form_name).await?;
        debug!(user_id = %identity.user_id(), form = %form_name, count = questions.len(), "questions listed");

        let warning = questions.is_empty().then(|| {
            warn!(form = %form_name, "no questions loaded for form");
            format!("no questions found for {form_name}")
        });

        Ok(QuestionList {
            form_name,
            questions,
            warning,
        })
    }

    /// Replace the stored question set for one form.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if the write fails, including duplicate ids.
    pub async fn replace_questions(
        &self,
        form_name: FormName,
        questions: &[Question],
    ) -> Result<(), CatalogError> {
        self.questions
            .replace_questions(form_name, questions)
            .await?;
        info!(form = %form_name, count = questions.len(), "question set replaced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assess_core::model::RegistrationDraft;
    use assess_core::time::fixed_now;
    use chrono::Duration;
    use storage::repository::Storage;

    use crate::{Clock, IdentityGate};

    async fn signed_in(storage: &Storage) -> Identity {
        let gate = IdentityGate::new(
            Clock::fixed(fixed_now()),
            Duration::hours(1),
            Arc::clone(&storage.users),
            Arc::clone(&storage.sessions),
        );
        gate.register(RegistrationDraft {
            username: "alice".into(),
            password: "pw".into(),
            email: "alice@x.com".into(),
        })
        .await
        .unwrap()
        .identity
    }

    #[tokio::test]
    async fn known_form_lists_in_order_case_insensitively() {
        let storage = Storage::in_memory();
        let identity = signed_in(&storage).await;
        let catalog = FormCatalog::new(Arc::clone(&storage.questions));
        catalog
            .replace_questions(
                FormName::Attitude,
                &[Question::new(2, "Second"), Question::new(1, "First")],
            )
            .await
            .unwrap();

        let list = catalog.list_questions(&identity, "attitude").await.unwrap();
        assert_eq!(list.form_name, FormName::Attitude);
        assert_eq!(
            list.questions,
            vec![Question::new(1, "First"), Question::new(2, "Second")]
        );
        assert!(list.warning.is_none());
    }

    #[tokio::test]
    async fn empty_form_warns_instead_of_failing() {
        let storage = Storage::in_memory();
        let identity = signed_in(&storage).await;
        let catalog = FormCatalog::new(Arc::clone(&storage.questions));

        let list = catalog.list_questions(&identity, "HowGard").await.unwrap();
        assert!(list.questions.is_empty());
        assert!(list.warning.is_some());
    }

    #[tokio::test]
    async fn unknown_form_is_rejected() {
        let storage = Storage::in_memory();
        let identity = signed_in(&storage).await;
        let catalog = FormCatalog::new(Arc::clone(&storage.questions));

        let err = catalog.list_questions(&identity, "Foo").await.unwrap_err();
        assert!(matches!(err, CatalogError::InvalidFormType(ref name) if name == "Foo"));
    }
}
