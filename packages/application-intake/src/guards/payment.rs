use chrono::{DateTime, Utc};

use super::{notification, Decision, GuardEnv, SkipReason, Transition};
use crate::domain::{
    reconcile, ApplicationRecord, ExternalUid, FeeOutcome, FeeType, Obligation, PaymentState,
    Template,
};
use crate::effects::{SideEffect, Step};
use crate::store::{Item, MarkerRecord, RecordKey, SortKey};

pub fn fee_approved(record: &ApplicationRecord, approved: FeeType, env: &GuardEnv<'_>) -> Decision {
    let current = record.tasks.pay_for_application;
    match current {
        PaymentState::Completed => {
            return Decision::Skip(SkipReason::AlreadyApplied("payment already completed"))
        }
        PaymentState::Approved => {
            return Decision::Skip(SkipReason::AlreadyApplied("payment already approved"))
        }
        _ => {}
    }

    let mut next = record.clone();
    next.fee.revise(approved);

    // Costed against the stored task state: a prior denial keeps the full fee.
    let obligation = next.fee.obligation(current);
    let outcome = reconcile(obligation, next.tasks.sign.is_completed());
    let target = outcome.payment_state();
    if !current.can_transition_to(target) {
        return Decision::Skip(SkipReason::IllegalTransition {
            from: current,
            to: target,
        });
    }

    next.tasks.pay_for_application = target;
    next.milestones.fee_decision_at = Some(env.now);

    let mut effects = Vec::new();
    if outcome == FeeOutcome::CompleteAndFile {
        effects.push(SideEffect::SendToCaseStore);
        effects.push(SideEffect::PublishCertificateProviderStarted);
        effects.push(notification(
            Step::PromptCertificateProvider,
            Template::CertificateProviderPrompt,
            &next.certificate_provider,
            &next,
            env,
        ));
    }

    if obligation == Obligation::Settled
        && next.voucher_allowed
        && next.milestones.voucher_invited_at.is_none()
    {
        if let Some(voucher) = next.voucher.as_ref() {
            effects.push(notification(
                Step::SendVoucherAccessCode,
                Template::VoucherAccessCode,
                voucher,
                &next,
                env,
            ));
            next.milestones.voucher_invited_at = Some(env.now);
        }
    }

    Decision::Apply(Transition {
        record: next,
        effects,
    })
}

pub fn fee_denied(record: &ApplicationRecord, env: &GuardEnv<'_>) -> Decision {
    let current = record.tasks.pay_for_application;
    if current == PaymentState::Denied {
        return Decision::Skip(SkipReason::AlreadyApplied("payment already denied"));
    }
    if !current.can_transition_to(PaymentState::Denied) {
        return Decision::Skip(SkipReason::IllegalTransition {
            from: current,
            to: PaymentState::Denied,
        });
    }

    let mut next = record.clone();
    next.fee.revise(FeeType::FullFee);
    next.tasks.pay_for_application = PaymentState::Denied;
    next.milestones.fee_decision_at = Some(env.now);

    Decision::Apply(Transition {
        record: next,
        effects: Vec::new(),
    })
}

/// Shared by more-evidence-required and further-info-requested.
pub fn more_evidence_required(record: &ApplicationRecord, env: &GuardEnv<'_>) -> Decision {
    let current = record.tasks.pay_for_application;
    if current == PaymentState::MoreEvidenceRequired {
        return Decision::Skip(SkipReason::AlreadyApplied(
            "payment already flagged as needing more evidence",
        ));
    }
    if !current.can_transition_to(PaymentState::MoreEvidenceRequired) {
        return Decision::Skip(SkipReason::IllegalTransition {
            from: current,
            to: PaymentState::MoreEvidenceRequired,
        });
    }

    let mut next = record.clone();
    next.tasks.pay_for_application = PaymentState::MoreEvidenceRequired;
    next.milestones.more_evidence_required_at = Some(env.now);

    Decision::Apply(Transition {
        record: next,
        effects: Vec::new(),
    })
}

/// Evidence is recorded as a marker beside the application, once.
pub fn evidence_received(
    application: &RecordKey,
    existing: Option<&Item>,
    uid: &ExternalUid,
    now: DateTime<Utc>,
) -> Decision<MarkerRecord> {
    if existing.is_some() {
        return Decision::Skip(SkipReason::AlreadyApplied("evidence already recorded"));
    }

    Decision::Apply(MarkerRecord {
        pk: application.pk.clone(),
        sk: SortKey::evidence_received(),
        uid: uid.clone(),
        recorded_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Payment, Person, TaskState};
    use crate::guards::fixtures::{env, now, person, record};

    fn signed_exemption_request() -> ApplicationRecord {
        let mut record = record();
        record.fee.fee_type = FeeType::NoFee;
        record.tasks.pay_for_application = PaymentState::Pending;
        record.tasks.sign = TaskState::Completed;
        record
    }

    fn steps(transition: &Transition) -> Vec<Step> {
        transition.effects.iter().map(SideEffect::step).collect()
    }

    fn apply(decision: Decision) -> Transition {
        match decision {
            Decision::Apply(transition) => transition,
            Decision::Skip(reason) => panic!("expected a transition, skipped: {reason}"),
        }
    }

    #[test]
    fn exemption_granted_on_signed_application_runs_cascade() {
        let transition = apply(fee_approved(&signed_exemption_request(), FeeType::NoFee, &env()));

        assert_eq!(transition.record.tasks.pay_for_application, PaymentState::Completed);
        assert_eq!(
            steps(&transition),
            vec![
                Step::SendToCaseStore,
                Step::PublishCertificateProviderStarted,
                Step::PromptCertificateProvider,
            ]
        );
        assert_eq!(transition.record.milestones.fee_decision_at, Some(now()));
    }

    #[test]
    fn escalation_to_half_fee_approves_without_cascade() {
        let transition =
            apply(fee_approved(&signed_exemption_request(), FeeType::HalfFee, &env()));

        assert_eq!(transition.record.tasks.pay_for_application, PaymentState::Approved);
        assert!(transition.effects.is_empty());
        assert_eq!(transition.record.fee.requested_fee_type, Some(FeeType::NoFee));
    }

    #[test]
    fn settled_but_unsigned_defers_cascade() {
        let mut record = signed_exemption_request();
        record.tasks.sign = TaskState::InProgress;

        let transition = apply(fee_approved(&record, FeeType::NoFee, &env()));

        assert_eq!(transition.record.tasks.pay_for_application, PaymentState::Completed);
        assert!(transition.effects.is_empty());
    }

    #[test]
    fn lower_grant_than_paid_for_completes() {
        let mut record = signed_exemption_request();
        record.fee.fee_type = FeeType::HalfFee;
        record.fee.payments.push(Payment {
            reference: "PAY-1".to_string(),
            amount: 4100,
            paid_at: now(),
        });

        let transition = apply(fee_approved(&record, FeeType::QuarterFee, &env()));

        assert_eq!(transition.record.tasks.pay_for_application, PaymentState::Completed);
        assert_eq!(transition.effects.len(), 3);
    }

    #[test]
    fn prior_decision_is_idempotent() {
        for state in [PaymentState::Completed, PaymentState::Approved] {
            let mut record = signed_exemption_request();
            record.tasks.pay_for_application = state;

            assert!(matches!(
                fee_approved(&record, FeeType::NoFee, &env()),
                Decision::Skip(SkipReason::AlreadyApplied(_))
            ));
        }
    }

    #[test]
    fn voucher_is_invited_once_fee_settles() {
        let mut record = signed_exemption_request();
        record.voucher_allowed = true;
        record.voucher = Some(person("Val", "Vouch"));

        let transition = apply(fee_approved(&record, FeeType::NoFee, &env()));

        assert_eq!(steps(&transition).last(), Some(&Step::SendVoucherAccessCode));
        assert_eq!(transition.record.milestones.voucher_invited_at, Some(now()));

        let Some(SideEffect::Notify { recipient, .. }) = transition.effects.last() else {
            panic!("expected a notification");
        };
        assert_eq!(recipient.name, "Val Vouch");
        assert_eq!(
            recipient.personalisation.get("startUrl").map(String::as_str),
            Some("https://apply.example.gov/voucher-start")
        );
    }

    #[test]
    fn voucher_without_details_is_not_invited() {
        let mut record = signed_exemption_request();
        record.voucher_allowed = true;
        record.voucher = None::<Person>;

        let transition = apply(fee_approved(&record, FeeType::NoFee, &env()));

        assert!(!steps(&transition).contains(&Step::SendVoucherAccessCode));
        assert_eq!(transition.record.milestones.voucher_invited_at, None);
    }

    #[test]
    fn denial_sets_full_fee() {
        let transition = apply(fee_denied(&signed_exemption_request(), &env()));

        assert_eq!(transition.record.tasks.pay_for_application, PaymentState::Denied);
        assert_eq!(transition.record.fee.fee_type, FeeType::FullFee);
        assert!(transition.effects.is_empty());
    }

    #[test]
    fn denial_after_completion_is_illegal() {
        let mut record = signed_exemption_request();
        record.tasks.pay_for_application = PaymentState::Completed;

        assert_eq!(
            fee_denied(&record, &env()).skip_reason(),
            Some(&SkipReason::IllegalTransition {
                from: PaymentState::Completed,
                to: PaymentState::Denied
            })
        );
    }

    #[test]
    fn approval_after_denial_still_owes_the_full_fee() {
        let mut record = signed_exemption_request();
        record.fee.fee_type = FeeType::FullFee;
        record.tasks.pay_for_application = PaymentState::Denied;

        let transition = apply(fee_approved(&record, FeeType::NoFee, &env()));

        assert_eq!(transition.record.tasks.pay_for_application, PaymentState::Approved);
        assert_eq!(transition.record.fee.fee_type, FeeType::NoFee);
        assert!(transition.effects.is_empty());
    }

    #[test]
    fn more_evidence_is_flagged_once() {
        let transition = apply(more_evidence_required(&signed_exemption_request(), &env()));
        assert_eq!(
            transition.record.tasks.pay_for_application,
            PaymentState::MoreEvidenceRequired
        );
        assert_eq!(transition.record.milestones.more_evidence_required_at, Some(now()));

        assert!(matches!(
            more_evidence_required(&transition.record, &env()),
            Decision::Skip(SkipReason::AlreadyApplied(_))
        ));
    }

    #[test]
    fn evidence_marker_is_written_once() {
        let application = record().key();
        let uid = ExternalUid::new("M-1111-2222-3333");

        let Decision::Apply(marker) = evidence_received(&application, None, &uid, now()) else {
            panic!("expected a marker");
        };
        assert_eq!(marker.sk.as_str(), "EVIDENCE_RECEIVED");
        assert_eq!(marker.pk, application.pk);

        let existing = Item::from(marker);
        assert!(matches!(
            evidence_received(&application, Some(&existing), &uid, now()),
            Decision::Skip(_)
        ));
    }
}
