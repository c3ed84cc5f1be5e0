use chrono::{DateTime, Utc};

use super::{notification, Decision, GuardEnv, SkipReason, Transition};
use crate::domain::{ApplicationRecord, Template};
use crate::effects::{SideEffect, Step};
use crate::events::StatusChange;

/// Register status changes. Entering the waiting period is recorded;
/// a cannot-register decision also cancels every scheduled follow-up.
pub fn status_changed(
    record: &ApplicationRecord,
    change: StatusChange,
    env: &GuardEnv<'_>,
) -> Decision {
    let mut next = record.clone();
    let mut effects = Vec::new();

    match change {
        StatusChange::WaitingPeriodEntered => {
            if record.milestones.statutory_waiting_period_at.is_some() {
                return Decision::Skip(SkipReason::AlreadyApplied("waiting period already recorded"));
            }
            next.milestones.statutory_waiting_period_at = Some(env.now);
        }
        StatusChange::CannotRegister => {
            if record.milestones.cannot_register_at.is_some() {
                return Decision::Skip(SkipReason::AlreadyApplied("cannot-register already recorded"));
            }
            next.milestones.cannot_register_at = Some(env.now);
            effects.push(SideEffect::DeleteFollowUps { actions: Vec::new() });
        }
    }

    Decision::Apply(Transition {
        record: next,
        effects,
    })
}

pub fn priority_correspondence_sent(
    record: &ApplicationRecord,
    sent_at: DateTime<Utc>,
) -> Decision {
    if record.milestones.priority_correspondence_sent_at == Some(sent_at) {
        return Decision::Skip(SkipReason::AlreadyApplied(
            "priority correspondence already recorded",
        ));
    }

    let mut next = record.clone();
    next.milestones.priority_correspondence_sent_at = Some(sent_at);

    Decision::Apply(Transition {
        record: next,
        effects: Vec::new(),
    })
}

/// A paper certificate provider failed their identity check: tell the donor.
pub fn identity_check_failed(record: &ApplicationRecord, env: &GuardEnv<'_>) -> Decision {
    if record.milestones.identity_check_failure_notified_at.is_some() {
        return Decision::Skip(SkipReason::AlreadyApplied("donor already told"));
    }

    let mut next = record.clone();
    next.milestones.identity_check_failure_notified_at = Some(env.now);
    let effects = vec![notification(
        Step::InformDonor,
        Template::DonorIdentityCheckFailed,
        &next.donor,
        &next,
        env,
    )];

    Decision::Apply(Transition {
        record: next,
        effects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guards::fixtures::{env, now, record};

    #[test]
    fn waiting_period_is_recorded_once() {
        let Decision::Apply(transition) =
            status_changed(&record(), StatusChange::WaitingPeriodEntered, &env())
        else {
            panic!("expected transition");
        };
        assert_eq!(transition.record.milestones.statutory_waiting_period_at, Some(now()));
        assert!(transition.effects.is_empty());

        assert!(matches!(
            status_changed(&transition.record, StatusChange::WaitingPeriodEntered, &env()),
            Decision::Skip(SkipReason::AlreadyApplied(_))
        ));
    }

    #[test]
    fn cannot_register_cancels_all_follow_ups() {
        let Decision::Apply(transition) =
            status_changed(&record(), StatusChange::CannotRegister, &env())
        else {
            panic!("expected transition");
        };

        assert_eq!(
            transition.effects,
            vec![SideEffect::DeleteFollowUps { actions: Vec::new() }]
        );
        assert_eq!(transition.record.milestones.cannot_register_at, Some(now()));
    }

    #[test]
    fn same_priority_date_is_idempotent_but_a_new_one_is_recorded() {
        let mut record = record();
        record.milestones.priority_correspondence_sent_at = Some(now());

        assert!(matches!(
            priority_correspondence_sent(&record, now()),
            Decision::Skip(_)
        ));

        let later = now() + chrono::Duration::days(2);
        let Decision::Apply(transition) = priority_correspondence_sent(&record, later) else {
            panic!("expected transition");
        };
        assert_eq!(
            transition.record.milestones.priority_correspondence_sent_at,
            Some(later)
        );
    }

    #[test]
    fn donor_is_told_about_failed_identity_check_once() {
        let Decision::Apply(transition) = identity_check_failed(&record(), &env()) else {
            panic!("expected transition");
        };
        assert_eq!(transition.effects.len(), 1);
        assert_eq!(transition.effects[0].step(), Step::InformDonor);

        assert!(matches!(
            identity_check_failed(&transition.record, &env()),
            Decision::Skip(_)
        ));
    }
}
