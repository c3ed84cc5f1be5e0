use super::{notification, Decision, GuardEnv, SkipReason, Transition};
use crate::domain::{reminder_due, ApplicationRecord, FollowUpAction, Template};
use crate::effects::Step;

pub fn follow_up_due(
    record: &ApplicationRecord,
    action: FollowUpAction,
    env: &GuardEnv<'_>,
) -> Decision {
    match action {
        FollowUpAction::RemindCertificateProviderToComplete => {
            remind_certificate_provider(record, env)
        }
        // Scheduled and sent by the identity journey; only cancelled here.
        FollowUpAction::RemindCertificateProviderToConfirmIdentity => {
            Decision::Skip(SkipReason::NotApplicable("identity reminders are not sent from intake"))
        }
    }
}

fn remind_certificate_provider(record: &ApplicationRecord, env: &GuardEnv<'_>) -> Decision {
    if record.tasks.certificate_provided.is_completed() {
        return Decision::Skip(SkipReason::AlreadyApplied("certificate already provided"));
    }
    if record.milestones.certificate_provider_reminded_at.is_some() {
        return Decision::Skip(SkipReason::AlreadyApplied("certificate provider already reminded"));
    }
    let Some(invited_at) = record.milestones.certificate_provider_invited_at else {
        return Decision::Skip(SkipReason::NotApplicable("certificate provider not invited"));
    };
    if env.now < reminder_due(invited_at) {
        return Decision::Skip(SkipReason::NotApplicable("reminder not yet due"));
    }

    let mut next = record.clone();
    next.milestones.certificate_provider_reminded_at = Some(env.now);
    let effects = vec![
        notification(
            Step::RemindCertificateProvider,
            Template::CertificateProviderReminder,
            &next.certificate_provider,
            &next,
            env,
        ),
        notification(
            Step::InformDonor,
            Template::DonorCertificateProviderNotActed,
            &next.donor,
            &next,
            env,
        ),
    ];

    Decision::Apply(Transition {
        record: next,
        effects,
    })
}
