//! Event engine: the single `handle` entry point.
//!
//! Routing happens before any store access, so an unrecognized or malformed
//! envelope never touches the store. Each handler then loads, asks its guard,
//! runs the guard's effects and writes last.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::context::InvocationContext;
use crate::domain::ExternalUid;
use crate::effects::{Orchestrator, Step};
use crate::error::{EngineError, Result};
use crate::events::{
    ApplicationStatusChanged, CaseIdentifierRequested, DecodeError, EventEnvelope, FeeApproved,
    FollowUpDue, InboundEvent, PriorityCorrespondenceSent, Registry, RegistryError, Source,
    UidEvent,
};
use crate::guards::{self, Decision, GuardEnv, SkipReason, Transition};
use crate::kernel::EngineDeps;
use crate::store::{PartitionKey, RecordKey, SortKey};

/// Engine-level settings, usually built by [`crate::Config::engine_settings`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Deadline applied by [`Engine::handle_with_deadline`].
    pub deadline: Duration,
    /// Base URL for links in notifications, without a trailing slash.
    pub app_public_url: String,
    pub notify_api_key_secret: String,
    pub case_store_secret: String,
    /// Use the hash-checked put for single-record writes.
    pub conditional_writes: bool,
}

/// What handling one event amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The transition was written. `performed` lists the side effects run
    /// before the write, in order.
    Applied { performed: Vec<Step> },
    /// Nothing was written and no side effect ran.
    Skipped { reason: SkipReason },
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied { .. })
    }
}

pub struct Engine {
    deps: EngineDeps,
    settings: EngineSettings,
    registry: Registry,
}

impl Engine {
    /// Build an engine over `deps`. Fails if the route table is incomplete.
    pub fn new(deps: EngineDeps, settings: EngineSettings) -> std::result::Result<Self, RegistryError> {
        Ok(Self {
            deps,
            settings,
            registry: Registry::standard()?,
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn deps(&self) -> &EngineDeps {
        &self.deps
    }

    /// Handle `envelope` under a fresh context using the configured deadline.
    pub async fn handle_with_deadline(&self, envelope: &EventEnvelope) -> Result<Outcome> {
        let ctx = InvocationContext::with_timeout(self.settings.deadline);
        self.handle(&ctx, envelope).await
    }

    /// Apply one inbound event. An `Err` asks the host to redeliver unless
    /// [`EngineError::class`] says otherwise.
    pub async fn handle(&self, ctx: &InvocationContext, envelope: &EventEnvelope) -> Result<Outcome> {
        let event = match self.route(envelope) {
            Ok(event) => event,
            Err(err) => {
                report_failure(envelope, None, &err);
                return Err(err);
            }
        };

        let uid = event.uid().cloned();
        let result = self.apply(ctx, event).await;

        match &result {
            Ok(Outcome::Applied { performed }) => info!(
                source = %envelope.source,
                category = category_field(&envelope.source),
                kind = %envelope.kind,
                uid = uid_field(uid.as_ref()),
                steps = performed.len(),
                "event applied"
            ),
            Ok(Outcome::Skipped {
                reason: reason @ SkipReason::IllegalTransition { .. },
            }) => warn!(
                source = %envelope.source,
                category = category_field(&envelope.source),
                kind = %envelope.kind,
                uid = uid_field(uid.as_ref()),
                %reason,
                "event skipped"
            ),
            Ok(Outcome::Skipped { reason }) => debug!(
                source = %envelope.source,
                category = category_field(&envelope.source),
                kind = %envelope.kind,
                uid = uid_field(uid.as_ref()),
                %reason,
                "event skipped"
            ),
            Err(err) => report_failure(envelope, uid.as_ref(), err),
        }

        result
    }

    fn route(&self, envelope: &EventEnvelope) -> Result<InboundEvent> {
        let kind = self
            .registry
            .resolve(&envelope.source, &envelope.kind)
            .ok_or_else(|| EngineError::UnrecognizedEvent {
                origin: envelope.source.clone(),
                kind: envelope.kind.clone(),
            })?;

        InboundEvent::decode(kind, &envelope.detail).map_err(|err| match err {
            DecodeError::Malformed(source) => EngineError::MalformedEvent {
                kind,
                reason: source.to_string(),
            },
            DecodeError::UnknownChangeType(change) => EngineError::UnrecognizedEvent {
                origin: envelope.source.clone(),
                kind: format!("{}/{}", kind, change),
            },
        })
    }

    async fn apply(&self, ctx: &InvocationContext, event: InboundEvent) -> Result<Outcome> {
        let run = Orchestrator::new(
            &self.deps,
            &self.settings,
            ctx,
            event.kind(),
            event.uid().cloned(),
        );
        let env = GuardEnv {
            now: self.deps.clock.now(),
            app_public_url: &self.settings.app_public_url,
        };

        match event {
            InboundEvent::CaseIdentifierRequested(detail) => {
                self.case_identifier_requested(run, detail, env.now).await
            }
            InboundEvent::EvidenceReceived(detail) => {
                self.evidence_received(run, detail, env.now).await
            }
            InboundEvent::FeeApproved(FeeApproved { uid, approved_type }) => {
                let record = run.load_by_uid(&uid).await?;
                let decision = guards::fee_approved(&record, approved_type, &env);
                commit_transition(run, &record.integrity_hash, decision, env.now).await
            }
            InboundEvent::FeeDenied(UidEvent { uid }) => {
                let record = run.load_by_uid(&uid).await?;
                let decision = guards::fee_denied(&record, &env);
                commit_transition(run, &record.integrity_hash, decision, env.now).await
            }
            InboundEvent::MoreEvidenceRequired(UidEvent { uid })
            | InboundEvent::FurtherInfoRequested(UidEvent { uid }) => {
                let record = run.load_by_uid(&uid).await?;
                let decision = guards::more_evidence_required(&record, &env);
                commit_transition(run, &record.integrity_hash, decision, env.now).await
            }
            InboundEvent::DonorSubmissionCompleted(detail) => {
                self.donor_submission_completed(run, detail, &env).await
            }
            InboundEvent::CertificateProviderSubmissionCompleted(UidEvent { uid }) => {
                let record = run.load_by_uid(&uid).await?;
                let case = run.fetch_case_document(&uid).await?;
                let decision =
                    guards::certificate_provider_submission_completed(&record, &case, &env);
                commit_transition(run, &record.integrity_hash, decision, env.now).await
            }
            InboundEvent::PriorityCorrespondenceSent(PriorityCorrespondenceSent {
                uid,
                sent_date,
            }) => {
                let record = run.load_by_uid(&uid).await?;
                let decision = guards::priority_correspondence_sent(&record, sent_date);
                commit_transition(run, &record.integrity_hash, decision, env.now).await
            }
            InboundEvent::CertificateProviderIdentityCheckFailed(UidEvent { uid }) => {
                let record = run.load_by_uid(&uid).await?;
                let decision = guards::identity_check_failed(&record, &env);
                commit_transition(run, &record.integrity_hash, decision, env.now).await
            }
            InboundEvent::ApplicationStatusChanged(ApplicationStatusChanged { uid, change }) => {
                let record = run.load_by_uid(&uid).await?;
                let decision = guards::status_changed(&record, change, &env);
                commit_transition(run, &record.integrity_hash, decision, env.now).await
            }
            InboundEvent::FollowUpDue(FollowUpDue { action, target, .. }) => {
                let record = run.load_by_key(&target).await?;
                let decision = guards::follow_up_due(&record, action, &env);
                commit_transition(run, &record.integrity_hash, decision, env.now).await
            }
        }
    }

    // =========================================================================
    // Handlers that need more than load, decide, write
    // =========================================================================

    async fn case_identifier_requested(
        &self,
        mut run: Orchestrator<'_>,
        detail: CaseIdentifierRequested,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let key = RecordKey::new(
            PartitionKey::application(&detail.application_id),
            SortKey::donor(&detail.donor_session_id),
        );
        let record = run.load_by_key(&key).await?;

        if let Decision::Skip(reason) = guards::case_identifier_requested(&record) {
            return Ok(Outcome::Skipped { reason });
        }

        let uid = run
            .create_case(detail.application_type, &detail.donor)
            .await?;
        run.commit(guards::assign_identifier(&record, uid, now))
            .await?;

        Ok(Outcome::Applied {
            performed: run.into_performed(),
        })
    }

    async fn evidence_received(
        &self,
        mut run: Orchestrator<'_>,
        detail: UidEvent,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let application = run.load_by_uid(&detail.uid).await?.key();
        let marker_key = RecordKey::new(application.pk.clone(), SortKey::evidence_received());
        let existing = run.get_item(&marker_key).await?;

        match guards::evidence_received(&application, existing.as_ref(), &detail.uid, now) {
            Decision::Skip(reason) => Ok(Outcome::Skipped { reason }),
            Decision::Apply(marker) => {
                run.put_item(marker.into()).await?;
                Ok(Outcome::Applied {
                    performed: run.into_performed(),
                })
            }
        }
    }

    async fn donor_submission_completed(
        &self,
        mut run: Orchestrator<'_>,
        detail: UidEvent,
        env: &GuardEnv<'_>,
    ) -> Result<Outcome> {
        let already_indexed = run.resolve_uid(&detail.uid).await?.is_some();
        let case = run.fetch_case_document(&detail.uid).await?;
        let application_id = self.deps.ids.next_id();

        match guards::donor_submission_completed(&case, already_indexed, &application_id, env) {
            Decision::Skip(reason) => Ok(Outcome::Skipped { reason }),
            Decision::Apply(creation) => {
                run.perform(&creation.effects, &creation.application)
                    .await?;
                run.commit(creation.transaction()).await?;
                Ok(Outcome::Applied {
                    performed: run.into_performed(),
                })
            }
        }
    }
}

/// Run a transition's effects, then write the record.
async fn commit_transition(
    mut run: Orchestrator<'_>,
    loaded_hash: &str,
    decision: Decision,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    let Transition { mut record, effects } = match decision {
        Decision::Skip(reason) => return Ok(Outcome::Skipped { reason }),
        Decision::Apply(transition) => transition,
    };

    record.touch(now);
    run.perform(&effects, &record).await?;
    run.persist(record, loaded_hash).await?;

    Ok(Outcome::Applied {
        performed: run.into_performed(),
    })
}

fn report_failure(envelope: &EventEnvelope, uid: Option<&ExternalUid>, err: &EngineError) {
    error!(
        source = %envelope.source,
        category = category_field(&envelope.source),
        kind = %envelope.kind,
        uid = uid_field(err.uid().or(uid)),
        step = err.step().map(Step::as_str).unwrap_or("-"),
        class = ?err.class(),
        error = %err,
        "event failed"
    );
}

/// `external` or `internal` for known sources, `unknown` otherwise.
fn category_field(source: &str) -> &'static str {
    Source::parse(source)
        .map(|source| source.category().as_str())
        .unwrap_or("unknown")
}

fn uid_field(uid: Option<&ExternalUid>) -> &str {
    uid.map(ExternalUid::as_str).unwrap_or("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FeeType, PaymentState, TaskState};
    use crate::events::EventKind;
    use crate::kernel::test_dependencies::{Call, TestDependencies};
    use crate::store::EntityStore;
    use serde_json::json;

    fn fee_approved(uid: &str, approved: &str) -> EventEnvelope {
        EventEnvelope::new(
            "payment-approval",
            "fee-approved",
            json!({ "uid": uid, "approvedType": approved }),
        )
    }

    #[tokio::test]
    async fn signed_exemption_runs_cascade_then_persists() {
        let deps = TestDependencies::new();
        let mut record = deps.application("M-1");
        record.fee.fee_type = FeeType::NoFee;
        record.tasks.sign = TaskState::Completed;
        record.tasks.pay_for_application = PaymentState::Pending;
        deps.seed(record.clone());
        let engine = deps.engine();

        let outcome = engine
            .handle_with_deadline(&fee_approved("M-1", "NO_FEE"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Applied {
                performed: vec![
                    Step::SendToCaseStore,
                    Step::PublishCertificateProviderStarted,
                    Step::PromptCertificateProvider,
                ]
            }
        );
        assert_eq!(
            deps.calls.kinds(),
            vec!["case-store.send", "publisher.publish", "notifier.send"]
        );

        let stored = deps.store.get_application(&record.key()).await.unwrap().unwrap();
        assert_eq!(stored.tasks.pay_for_application, PaymentState::Completed);
        assert_eq!(stored.version, record.version + 1);
    }

    #[tokio::test]
    async fn unknown_kind_never_reads_the_store() {
        let deps = TestDependencies::new();
        let engine = deps.engine();

        let err = engine
            .handle_with_deadline(&EventEnvelope::new(
                "payment-approval",
                "fee-waived",
                json!({ "uid": "M-1" }),
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::UnrecognizedEvent { .. }));
        assert_eq!(deps.store.reads(), 0);
        assert!(deps.calls.is_empty());
    }

    #[tokio::test]
    async fn bad_detail_is_malformed() {
        let deps = TestDependencies::new();
        let engine = deps.engine();

        let err = engine
            .handle_with_deadline(&EventEnvelope::new(
                "payment-approval",
                "fee-approved",
                json!({ "approvedType": "NO_FEE" }),
            ))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::MalformedEvent {
                kind: EventKind::FeeApproved,
                ..
            }
        ));
        assert_eq!(deps.store.reads(), 0);
    }

    #[tokio::test]
    async fn unknown_status_change_is_unrecognized() {
        let deps = TestDependencies::new();
        let engine = deps.engine();

        let err = engine
            .handle_with_deadline(&EventEnvelope::new(
                "register",
                "application-status-changed",
                json!({ "uid": "M-1", "changeType": "REVOKED" }),
            ))
            .await
            .unwrap_err();

        let EngineError::UnrecognizedEvent { kind, .. } = err else {
            panic!("expected unrecognized event, got {err:?}");
        };
        assert_eq!(kind, "application-status-changed/REVOKED");
    }

    #[tokio::test]
    async fn missing_record_is_retryable() {
        let deps = TestDependencies::new();
        let engine = deps.engine();

        let err = engine
            .handle_with_deadline(&EventEnvelope::new(
                "payment-approval",
                "fee-denied",
                json!({ "uid": "M-404" }),
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::RecordMissing { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn failed_notification_leaves_record_unwritten() {
        let deps = TestDependencies::new();
        let mut record = deps.application("M-1");
        record.fee.fee_type = FeeType::NoFee;
        record.tasks.sign = TaskState::Completed;
        deps.seed(record.clone());
        deps.notifier.fail_with("notify down");
        let engine = deps.engine();

        let err = engine
            .handle_with_deadline(&fee_approved("M-1", "NO_FEE"))
            .await
            .unwrap_err();

        assert_eq!(err.step(), Some(Step::PromptCertificateProvider));
        assert!(err.is_retryable());
        assert_eq!(deps.store.writes(), 0);
        assert!(deps.calls.contains(&Call::CaseStoreSend {
            uid: Some(ExternalUid::new("M-1"))
        }));
    }

    #[test]
    fn log_category_follows_the_source() {
        assert_eq!(category_field("register"), "external");
        assert_eq!(category_field("scheduler"), "internal");
        assert_eq!(category_field("billing"), "unknown");
    }
}
