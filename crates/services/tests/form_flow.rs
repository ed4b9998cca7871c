use assess_core::model::{
    FormName, ProgressMarker, ProgressStatus, RegistrationDraft, ResponsePayload, SubmissionPolicy,
};
use assess_core::time::fixed_now;
use serde_json::json;
use services::{
    AppServices, Clock, IdentityError, ProgressServiceError, ServiceSettings,
};

fn payload(value: serde_json::Value) -> ResponsePayload {
    ResponsePayload::from_value(value).expect("object payload")
}

fn alice_draft() -> RegistrationDraft {
    RegistrationDraft {
        username: "alice".into(),
        password: "s3cret".into(),
        email: "alice@example.com".into(),
    }
}

#[tokio::test]
async fn alice_saves_submits_and_reads_back() {
    let services = AppServices::new_sqlite(
        "sqlite:file:memdb_alice_flow?mode=memory&cache=shared",
        Clock::fixed(fixed_now()),
        ServiceSettings::default(),
    )
    .await
    .expect("connect sqlite");
    let identity = services.identity();
    let progress = services.progress();

    let grant = identity.register(alice_draft()).await.expect("register");
    let alice = identity
        .resolve(Some(&grant.token))
        .await
        .expect("resolve session");

    let summary = progress.progress_summary(&alice).await.expect("summary");
    assert_eq!(summary.len(), 3);
    assert!(
        summary
            .entries()
            .iter()
            .all(|p| p.status() == ProgressStatus::NotStarted)
    );

    progress
        .save_progress(
            &alice,
            "HowGard",
            ProgressMarker::new(40),
            payload(json!({"q1": "yes"})),
        )
        .await
        .expect("save");
    progress
        .submit_form(&alice, "HowGard", payload(json!({"q1": "yes", "q2": "no"})))
        .await
        .expect("submit");

    let summary = progress.progress_summary(&alice).await.expect("summary");
    let howgard = summary.get(FormName::HowGard).expect("howgard row");
    assert_eq!(howgard.status(), ProgressStatus::Submitted);
    assert_eq!(howgard.marker(), ProgressMarker::new(40));
    for form in [FormName::Attitude, FormName::Motivational] {
        assert_eq!(
            summary.get(form).expect("row").status(),
            ProgressStatus::NotStarted
        );
    }

    let answers = progress
        .get_responses(&alice, "HowGard")
        .await
        .expect("responses");
    assert_eq!(answers, payload(json!({"q1": "yes", "q2": "no"})));

    let err = progress
        .submit_form(&alice, "Foo", payload(json!({"q1": "x"})))
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressServiceError::UnknownForm(_)));
    let after = progress.progress_summary(&alice).await.expect("summary");
    assert_eq!(after, summary);

    let err = identity.register(alice_draft()).await.unwrap_err();
    assert!(matches!(err, IdentityError::Conflict));

    identity.logout(Some(&grant.token)).await.expect("logout");
    assert!(matches!(
        identity.resolve(Some(&grant.token)).await,
        Err(IdentityError::Unauthenticated)
    ));
}

#[tokio::test]
async fn lock_policy_freezes_submitted_form() {
    let services = AppServices::new_sqlite(
        "sqlite:file:memdb_lock_flow?mode=memory&cache=shared",
        Clock::fixed(fixed_now()),
        ServiceSettings {
            submission_policy: SubmissionPolicy::Lock,
            ..ServiceSettings::default()
        },
    )
    .await
    .expect("connect sqlite");
    let identity = services.identity();
    let progress = services.progress();
    let alice = identity.register(alice_draft()).await.expect("register").identity;

    progress
        .submit_form(&alice, "motivational", payload(json!({"q1": 5})))
        .await
        .expect("first submit");
    let err = progress
        .submit_form(&alice, "Motivational", payload(json!({"q1": 1})))
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressServiceError::Rejected(_)));

    let answers = progress
        .get_responses(&alice, "Motivational")
        .await
        .expect("responses");
    assert_eq!(answers, payload(json!({"q1": 5})));
}
