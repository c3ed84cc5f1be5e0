//! Case creation, register status changes, reminders and routing.

mod common;

use crate::common::*;
use application_intake::domain::{
    ExternalUid, FollowUpAction, PaymentState, ScheduledFollowUp, Template,
};
use application_intake::effects::Step;
use application_intake::kernel::test_dependencies::{
    Call, TestDependencies, NOTIFY_CREDENTIAL, NOTIFY_SECRET,
};
use application_intake::store::{
    EntityStore, Item, PartitionKey, RecordKey, SortKey, StoreError,
};
use application_intake::{EngineError, ErrorClass, Outcome};
use chrono::{Duration, Months};
use serde_json::json;

fn case_identifier_requested() -> application_intake::EventEnvelope {
    envelope(
        "application",
        "case-identifier-requested",
        json!({
            "applicationId": "app-seeded",
            "donorSessionId": "session-1",
            "applicationType": "personal-welfare",
            "donor": { "firstNames": "Sam", "lastName": "Smith" },
        }),
    )
}

fn unassigned() -> TestDependencies {
    let deps = TestDependencies::new();
    let mut record = deps.application(UID);
    record.external_uid = None;
    deps.seed(record);
    deps
}

#[tokio::test]
async fn new_case_is_recorded_and_indexed() {
    let deps = unassigned();
    deps.case_client.with_uid("M-5555-6666-7777");
    let harness = TestHarness::with(deps);

    let outcome = harness.handle(&case_identifier_requested()).await.unwrap();

    assert_eq!(
        outcome,
        Outcome::Applied {
            performed: vec![Step::CreateCase]
        }
    );
    let stored = harness.stored("M-5555-6666-7777").await;
    assert_eq!(stored.application_id, "app-seeded");
    assert_eq!(stored.external_uid, Some(ExternalUid::new("M-5555-6666-7777")));
    assert_eq!(stored.version, 2);

    let again = harness.handle(&case_identifier_requested()).await.unwrap();
    assert!(matches!(again, Outcome::Skipped { .. }));
    assert_eq!(harness.deps.calls.kinds(), vec!["case-client.create"]);
}

#[tokio::test]
async fn stored_record_reads_back_by_key_and_uid() {
    let deps = TestDependencies::new();
    let record = deps.application(UID);
    deps.seed(record.clone());
    let harness = TestHarness::with(deps);

    harness
        .handle(&uid_event("payment-approval", "fee-denied", UID))
        .await
        .unwrap();

    let key = harness
        .deps
        .store
        .get_by_external_uid(&ExternalUid::new(UID))
        .await
        .unwrap();
    assert_eq!(key, Some(record.key()));

    let by_key = harness
        .deps
        .store
        .get_application(&record.key())
        .await
        .unwrap()
        .unwrap();
    let by_uid = harness.stored(UID).await;
    assert_eq!(by_key, by_uid);
    assert_eq!(by_key.external_uid, record.external_uid);
    assert_ne!(by_key.integrity_hash, record.integrity_hash);
    assert_eq!(by_key.integrity_hash, by_key.compute_hash());
}

#[tokio::test]
async fn rejected_case_is_terminal() {
    let deps = unassigned();
    deps.case_client.rejecting("donor date of birth missing");
    let harness = TestHarness::with(deps);

    let err = harness
        .handle(&case_identifier_requested())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::DownstreamFailure {
            step: Step::CreateCase,
            terminal: true,
            ..
        }
    ));
    assert_eq!(err.class(), ErrorClass::Terminal);
    assert_eq!(harness.deps.store.writes(), 0);
}

#[tokio::test]
async fn cannot_register_removes_every_follow_up_for_the_uid() {
    let deps = TestDependencies::new();
    let record = deps.application(UID);
    let follow_up = |uid: &str, id: &str| {
        ScheduledFollowUp::new(
            TestDependencies::now() + Duration::days(30),
            FollowUpAction::RemindCertificateProviderToComplete,
            record.key(),
            ExternalUid::new(uid),
            id,
        )
    };
    let ours = follow_up(UID, "app-seeded");
    let theirs = follow_up("M-0000-0000-0001", "other");
    deps.store.seed(ours.clone());
    deps.store.seed(theirs.clone());
    deps.seed(record.clone());
    let harness = TestHarness::with(deps);

    let outcome = harness
        .handle(&status_changed(UID, "CANNOT_REGISTER"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::Applied {
            performed: vec![Step::DeleteFollowUps]
        }
    );
    let store = &harness.deps.store;
    assert_eq!(store.get_by_key(&ours.key()).await.unwrap(), None);
    assert_eq!(
        store.get_by_key(&theirs.key()).await.unwrap(),
        Some(Item::FollowUp(theirs))
    );
    assert!(harness
        .stored(UID)
        .await
        .milestones
        .cannot_register_at
        .is_some());
}

#[tokio::test]
async fn waiting_period_is_recorded() {
    let deps = TestDependencies::new();
    deps.seed(deps.application(UID));
    let harness = TestHarness::with(deps);

    harness
        .handle(&status_changed(UID, "waiting-period-entered"))
        .await
        .unwrap();

    assert_eq!(
        harness.stored(UID).await.milestones.statutory_waiting_period_at,
        Some(TestDependencies::now())
    );
    assert!(harness.deps.calls.is_empty());
}

#[tokio::test]
async fn overdue_certificate_provider_is_reminded_and_donor_told() {
    let deps = TestDependencies::new();
    let mut record = deps.application(UID);
    record.milestones.certificate_provider_invited_at =
        TestDependencies::now().checked_sub_months(Months::new(4));
    let target = serde_json::to_value(record.key()).unwrap();
    deps.seed(record);
    let harness = TestHarness::with(deps);

    let outcome = harness
        .handle(&envelope(
            "scheduler",
            "follow-up-due",
            json!({
                "action": "remind-certificate-provider-to-complete",
                "target": target,
                "uid": UID,
            }),
        ))
        .await
        .unwrap();

    assert!(outcome.is_applied());
    assert_eq!(
        harness.deps.calls.templates(),
        vec![
            Template::CertificateProviderReminder,
            Template::DonorCertificateProviderNotActed
        ]
    );
    assert!(harness
        .stored(UID)
        .await
        .milestones
        .certificate_provider_reminded_at
        .is_some());
}

#[tokio::test]
async fn failed_identity_check_tells_the_donor() {
    let deps = TestDependencies::new();
    deps.seed(deps.application(UID));
    let harness = TestHarness::with(deps);

    harness
        .handle(&uid_event(
            "case-management",
            "certificate-provider-identity-check-failed",
            UID,
        ))
        .await
        .unwrap();

    let calls = harness.deps.calls.calls();
    let [Call::Notify {
        template,
        recipient,
        ..
    }] = calls.as_slice()
    else {
        panic!("expected one notification, got {calls:?}");
    };
    assert_eq!(*template, Template::DonorIdentityCheckFailed);
    assert_eq!(recipient.name, "Sam Smith");
}

#[tokio::test]
async fn evidence_marker_is_written_beside_the_record() {
    let deps = TestDependencies::new();
    let record = deps.application(UID);
    deps.seed(record.clone());
    let harness = TestHarness::with(deps);

    harness
        .handle(&uid_event("case-management", "evidence-received", UID))
        .await
        .unwrap();

    let marker = harness
        .deps
        .store
        .get_by_key(&RecordKey::new(record.pk, SortKey::evidence_received()))
        .await
        .unwrap();
    assert!(matches!(marker, Some(Item::Marker(_))));
}

#[tokio::test]
async fn unknown_kind_from_known_source_never_touches_the_store() {
    let harness = TestHarness::new();

    let err = harness
        .handle(&uid_event("case-management", "fee-approved", UID))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::UnrecognizedEvent { .. }));
    assert_eq!(err.class(), ErrorClass::Terminal);
    assert_eq!(harness.deps.store.reads(), 0);
    assert_eq!(harness.deps.store.writes(), 0);
}

#[tokio::test]
async fn stale_credential_is_used_while_secret_store_is_down() {
    let deps = TestDependencies::new();
    deps.seed(deps.application(UID));
    let mut second = deps.application("M-2222-3333-4444");
    second.application_id = "app-second".to_string();
    second.pk = PartitionKey::application("app-second");
    deps.seed(second);
    let harness = TestHarness::with(deps);
    let identity_check_failed = |uid: &str| {
        uid_event(
            "case-management",
            "certificate-provider-identity-check-failed",
            uid,
        )
    };

    harness.handle(&identity_check_failed(UID)).await.unwrap();
    harness.deps.clock.advance(Duration::hours(2));
    harness.deps.secret_store.remove(NOTIFY_SECRET);

    let outcome = harness
        .handle(&identity_check_failed("M-2222-3333-4444"))
        .await
        .unwrap();

    assert!(outcome.is_applied());
    let credentials: Vec<_> = harness
        .deps
        .calls
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Notify { credential, .. } => Some(credential),
            _ => None,
        })
        .collect();
    assert_eq!(credentials, vec![NOTIFY_CREDENTIAL, NOTIFY_CREDENTIAL]);
}

#[tokio::test]
async fn credential_never_fetched_fails_the_step() {
    let deps = TestDependencies::new();
    deps.seed(deps.application(UID));
    deps.secret_store.remove(NOTIFY_SECRET);
    let harness = TestHarness::with(deps);

    let err = harness
        .handle(&uid_event(
            "case-management",
            "certificate-provider-identity-check-failed",
            UID,
        ))
        .await
        .unwrap_err();

    assert_eq!(err.step(), Some(Step::LoadCredential));
    assert!(err.is_retryable());
    assert!(harness.deps.calls.is_empty());
    assert_eq!(harness.deps.store.writes(), 0);
}

async fn race_with_concurrent_writer(
    conditional_writes: bool,
) -> (TestHarness, Result<Outcome, EngineError>) {
    let mut deps = TestDependencies::new();
    deps.settings.conditional_writes = conditional_writes;
    deps.seed(signed_exemption_request(&deps, UID));
    deps.notifier.respond_after(std::time::Duration::from_secs(2));
    let harness = TestHarness::with(deps);

    let concurrent = async {
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        let mut record = signed_exemption_request(&harness.deps, UID);
        record.milestones.priority_correspondence_sent_at = Some(TestDependencies::now());
        harness.deps.seed(record);
    };
    let event = fee_approved(UID, "NO_FEE");
    let (result, ()) = tokio::join!(harness.handle(&event), concurrent);

    (harness, result)
}

#[tokio::test(start_paused = true)]
async fn conditional_write_rejects_a_record_changed_mid_flight() {
    let (harness, result) = race_with_concurrent_writer(true).await;

    let err = tokio_test::assert_err!(result);
    assert!(matches!(
        err,
        EngineError::PersistenceFailure {
            source: StoreError::Conflict { .. },
            ..
        }
    ));
    assert!(err.side_effects_performed());
    let stored = harness.stored(UID).await;
    assert_eq!(stored.tasks.pay_for_application, PaymentState::Pending);
    assert!(stored.milestones.priority_correspondence_sent_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn unconditional_write_lets_the_last_writer_win() {
    let (harness, result) = race_with_concurrent_writer(false).await;

    tokio_test::assert_ok!(result);
    let stored = harness.stored(UID).await;
    assert_eq!(stored.tasks.pay_for_application, PaymentState::Completed);
    assert_eq!(stored.milestones.priority_correspondence_sent_at, None);
}
