//! Domain model: the application record and everything hanging off it.

pub mod application;
pub mod case;
pub mod fees;
pub mod follow_up;
pub mod notification;
pub mod tasks;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use application::{ApplicationRecord, Milestones};
pub use case::{ApplicationType, CaseDocument, Channel, Language, Person};
pub use fees::{reconcile, FeeDetails, FeeOutcome, FeeRevision, FeeType, Obligation, Payment, RepeatCost};
pub use follow_up::{reminder_due, FollowUpAction, ScheduledFollowUp};
pub use notification::{RecipientContext, Template};
pub use tasks::{PaymentState, TaskState, Tasks};

/// Identifier issued by the external case-management system.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalUid(String);

impl ExternalUid {
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
