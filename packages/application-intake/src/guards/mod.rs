//! State-Transition Guards.
//!
//! One pure function per event kind. Each looks at the current record (and
//! whatever the engine read alongside it), returns `Skip` when its idempotency
//! predicate says the transition already happened, and otherwise returns the
//! new state plus the side effects to run before it is written.
//!
//! Guards never do IO, which keeps every decision testable with plain values.

mod identifiers;
mod payment;
mod reminders;
mod status;
mod submissions;

use chrono::{DateTime, Utc};
use std::fmt;

use crate::domain::{ApplicationRecord, PaymentState, Person, RecipientContext, Template};
use crate::effects::{SideEffect, Step};

pub use identifiers::{assign_identifier, case_identifier_requested};
pub use payment::{evidence_received, fee_approved, fee_denied, more_evidence_required};
pub use reminders::follow_up_due;
pub use status::{identity_check_failed, priority_correspondence_sent, status_changed};
pub use submissions::{certificate_provider_submission_completed, donor_submission_completed, Creation};

/// Inputs every guard may use besides the record.
#[derive(Debug, Clone, Copy)]
pub struct GuardEnv<'a> {
    pub now: DateTime<Utc>,
    pub app_public_url: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The idempotency predicate holds.
    AlreadyApplied(&'static str),
    /// The payment task cannot move this way; redelivery will not change that.
    IllegalTransition { from: PaymentState, to: PaymentState },
    /// The event does not concern this record in its current shape.
    NotApplicable(&'static str),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyApplied(predicate) => write!(f, "already applied: {}", predicate),
            SkipReason::IllegalTransition { from, to } => {
                write!(f, "illegal payment transition {} -> {}", from, to)
            }
            SkipReason::NotApplicable(why) => write!(f, "not applicable: {}", why),
        }
    }
}

/// A record's next state and the effects that precede writing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub record: ApplicationRecord,
    pub effects: Vec<SideEffect>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision<T = Transition> {
    Skip(SkipReason),
    Apply(T),
}

impl<T> Decision<T> {
    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            Decision::Skip(reason) => Some(reason),
            Decision::Apply(_) => None,
        }
    }
}

/// Build a notification about `record` addressed to `to`.
fn notification(
    step: Step,
    template: Template,
    to: &Person,
    record: &ApplicationRecord,
    env: &GuardEnv<'_>,
) -> SideEffect {
    let mut recipient = RecipientContext::to(to, record.external_uid.as_ref())
        .with("donorFullName", record.donor.full_name())
        .with("certificateProviderFullName", record.certificate_provider.full_name());

    if let Some(application_type) = record.application_type {
        recipient = recipient.with("applicationType", application_type.as_str());
    }
    if let Some(path) = template.start_path() {
        recipient = recipient.with("startUrl", format!("{}{}", env.app_public_url, path));
    }

    SideEffect::Notify {
        step,
        template,
        recipient,
    }
}
