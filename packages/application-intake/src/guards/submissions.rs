use super::{notification, Decision, GuardEnv, SkipReason, Transition};
use crate::domain::{
    reminder_due, ApplicationRecord, CaseDocument, Channel, FollowUpAction, ScheduledFollowUp,
    TaskState, Template,
};
use crate::effects::{SideEffect, Step};
use crate::store::{ReservationRecord, SecondaryIndexRecord, SortKey, Transaction, DONOR_PREFIX};

/// The four records a paper submission creates, plus what to send first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Creation {
    pub application: ApplicationRecord,
    pub follow_up: ScheduledFollowUp,
    pub index: SecondaryIndexRecord,
    pub reservation: ReservationRecord,
    pub effects: Vec<SideEffect>,
}

impl Creation {
    /// All four records as creates in one transaction.
    pub fn transaction(&self) -> Transaction {
        Transaction::new()
            .create(self.application.clone())
            .create(self.follow_up.clone())
            .create(self.index.clone())
            .create(self.reservation.clone())
    }
}

/// A paper donor finished: invite the certificate provider and create the
/// application record under a fresh id.
pub fn donor_submission_completed(
    case: &CaseDocument,
    already_indexed: bool,
    application_id: &str,
    env: &GuardEnv<'_>,
) -> Decision<Creation> {
    if case.donor_channel == Channel::Online {
        return Decision::Skip(SkipReason::NotApplicable("donor applied online"));
    }
    if already_indexed {
        return Decision::Skip(SkipReason::AlreadyApplied("application already recorded"));
    }

    let application = ApplicationRecord::paper(application_id, case, env.now);
    let follow_up = ScheduledFollowUp::new(
        reminder_due(env.now),
        FollowUpAction::RemindCertificateProviderToComplete,
        application.key(),
        case.uid.clone(),
        application_id,
    );
    let index = SecondaryIndexRecord::new(case.uid.clone(), application.key(), env.now);
    let reservation = ReservationRecord {
        pk: application.pk.clone(),
        sk: SortKey::reserved(DONOR_PREFIX),
        created_at: env.now,
    };
    let effects = vec![notification(
        Step::InviteCertificateProvider,
        Template::CertificateProviderInvite,
        &case.certificate_provider,
        &application,
        env,
    )];

    Decision::Apply(Creation {
        application,
        follow_up,
        index,
        reservation,
        effects,
    })
}

/// A paper certificate provider finished: cancel their reminder and invite
/// the attorneys.
pub fn certificate_provider_submission_completed(
    record: &ApplicationRecord,
    case: &CaseDocument,
    env: &GuardEnv<'_>,
) -> Decision {
    if case.certificate_provider_channel == Channel::Online {
        return Decision::Skip(SkipReason::NotApplicable("certificate provider acted online"));
    }
    if record.milestones.attorneys_invited_at.is_some() {
        return Decision::Skip(SkipReason::AlreadyApplied("attorneys already invited"));
    }

    let mut next = record.clone();
    next.tasks.certificate_provided = TaskState::Completed;
    next.milestones.attorneys_invited_at = Some(env.now);

    let mut effects = vec![SideEffect::DeleteFollowUps {
        actions: vec![
            FollowUpAction::RemindCertificateProviderToComplete,
            FollowUpAction::RemindCertificateProviderToConfirmIdentity,
        ],
    }];
    effects.extend(case.attorneys.iter().map(|attorney| {
        notification(
            Step::InviteAttorneys,
            Template::AttorneyInvite,
            attorney,
            &next,
            env,
        )
    }));

    Decision::Apply(Transition {
        record: next,
        effects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guards::fixtures::{case, env, now, record};
    use crate::store::Item;

    #[test]
    fn paper_donor_creates_four_records() {
        let case = case(Channel::Paper, Channel::Paper);

        let Decision::Apply(creation) = donor_submission_completed(&case, false, "new-id", &env())
        else {
            panic!("expected creation");
        };

        let application = &creation.application;
        assert_eq!(application.pk.as_str(), "LPA#new-id");
        assert_eq!(application.sk.as_str(), "DONOR#PAPER");
        assert_eq!(application.external_uid.as_ref(), Some(&case.uid));
        assert_eq!(application.version, 1);
        assert_eq!(application.milestones.certificate_provider_invited_at, Some(now()));

        assert_eq!(creation.follow_up.due_at, reminder_due(now()));
        assert_eq!(creation.follow_up.target, application.key());
        assert_eq!(creation.index.target, application.key());
        assert_eq!(creation.reservation.sk.as_str(), "RESERVED#DONOR#");

        let transaction = creation.transaction();
        assert_eq!(transaction.creates().len(), 4);
        assert!(transaction.validate().is_ok());
        assert!(matches!(transaction.creates()[0], Item::Application(_)));

        assert_eq!(
            creation.effects.iter().map(SideEffect::step).collect::<Vec<_>>(),
            vec![Step::InviteCertificateProvider]
        );
    }

    #[test]
    fn online_donor_is_left_alone() {
        let decision =
            donor_submission_completed(&case(Channel::Online, Channel::Paper), false, "id", &env());

        assert!(matches!(decision, Decision::Skip(SkipReason::NotApplicable(_))));
    }

    #[test]
    fn indexed_submission_is_already_applied() {
        let decision =
            donor_submission_completed(&case(Channel::Paper, Channel::Paper), true, "id", &env());

        assert!(matches!(decision, Decision::Skip(SkipReason::AlreadyApplied(_))));
    }

    #[test]
    fn paper_certificate_provider_invites_each_attorney() {
        let Decision::Apply(transition) = certificate_provider_submission_completed(
            &record(),
            &case(Channel::Paper, Channel::Paper),
            &env(),
        ) else {
            panic!("expected transition");
        };

        assert_eq!(
            transition.effects.iter().map(SideEffect::step).collect::<Vec<_>>(),
            vec![Step::DeleteFollowUps, Step::InviteAttorneys, Step::InviteAttorneys]
        );
        assert_eq!(transition.record.tasks.certificate_provided, TaskState::Completed);
        assert_eq!(transition.record.milestones.attorneys_invited_at, Some(now()));
    }

    #[test]
    fn attorneys_are_invited_once() {
        let mut record = record();
        record.milestones.attorneys_invited_at = Some(now());

        let decision = certificate_provider_submission_completed(
            &record,
            &case(Channel::Paper, Channel::Paper),
            &env(),
        );

        assert!(matches!(decision, Decision::Skip(SkipReason::AlreadyApplied(_))));
    }
}
