use serde::{Deserialize, Serialize};
use std::fmt;

/// Progress of a plain task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl TaskState {
    pub fn is_completed(self) -> bool {
        self == TaskState::Completed
    }
}

/// Progress of the payment task.
///
/// `Completed` is terminal. Decisions from the payment-approval system move the
/// task between the other states, but nothing returns to `NotStarted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    #[default]
    NotStarted,
    Pending,
    Approved,
    Denied,
    MoreEvidenceRequired,
    Completed,
}

impl PaymentState {
    pub fn can_transition_to(self, next: PaymentState) -> bool {
        use PaymentState::*;

        match (self, next) {
            (Completed, _) => false,
            (_, NotStarted) => false,
            (from, to) => from != to,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentState::NotStarted => "not-started",
            PaymentState::Pending => "pending",
            PaymentState::Approved => "approved",
            PaymentState::Denied => "denied",
            PaymentState::MoreEvidenceRequired => "more-evidence-required",
            PaymentState::Completed => "completed",
        }
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tasks {
    pub pay_for_application: PaymentState,
    pub sign: TaskState,
    pub certificate_provided: TaskState,
}
