//! Fee classifications and the reconciliation table applied when the
//! payment-approval system decides on a reduced fee.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::PaymentState;

/// Amounts are whole pence.
pub type Pence = i64;

pub const FULL_FEE: Pence = 8200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeType {
    #[default]
    FullFee,
    HalfFee,
    QuarterFee,
    NoFee,
    HardshipFee,
    RepeatApplicationFee,
}

impl FeeType {
    pub fn as_str(self) -> &'static str {
        match self {
            FeeType::FullFee => "FULL_FEE",
            FeeType::HalfFee => "HALF_FEE",
            FeeType::QuarterFee => "QUARTER_FEE",
            FeeType::NoFee => "NO_FEE",
            FeeType::HardshipFee => "HARDSHIP_FEE",
            FeeType::RepeatApplicationFee => "REPEAT_APPLICATION_FEE",
        }
    }
}

impl fmt::Display for FeeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a repeat application costs, decided when the repeat is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepeatCost {
    NoFee,
    HalfFee,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub reference: String,
    pub amount: Pence,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeDetails {
    pub fee_type: FeeType,
    /// The classification the donor asked for, kept once a decision revises it.
    pub requested_fee_type: Option<FeeType>,
    pub repeat_cost: Option<RepeatCost>,
    pub payments: Vec<Payment>,
}

impl FeeDetails {
    /// Cost of the current classification. A denied reduction always costs the full fee.
    pub fn cost(&self, payment: PaymentState) -> Pence {
        if payment == PaymentState::Denied {
            return FULL_FEE;
        }

        match self.fee_type {
            FeeType::FullFee => FULL_FEE,
            FeeType::HalfFee => FULL_FEE / 2,
            FeeType::QuarterFee => FULL_FEE / 4,
            FeeType::NoFee | FeeType::HardshipFee => 0,
            FeeType::RepeatApplicationFee => match self.repeat_cost {
                Some(RepeatCost::HalfFee) => FULL_FEE / 2,
                Some(RepeatCost::NoFee) | None => 0,
            },
        }
    }

    pub fn paid(&self) -> Pence {
        self.payments.iter().map(|payment| payment.amount).sum()
    }

    pub fn obligation(&self, payment: PaymentState) -> Obligation {
        let remaining = self.cost(payment) - self.paid();
        if remaining <= 0 {
            Obligation::Settled
        } else {
            Obligation::Outstanding(remaining)
        }
    }

    /// Replace the classification with an externally decided one.
    pub fn revise(&mut self, decided: FeeType) -> FeeRevision {
        let revision = FeeRevision::between(self.fee_type, decided);
        if revision != FeeRevision::Unchanged && self.requested_fee_type.is_none() {
            self.requested_fee_type = Some(self.fee_type);
        }
        self.fee_type = decided;
        revision
    }
}

/// What is left to pay once a classification is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Obligation {
    Settled,
    Outstanding(Pence),
}

/// How a decided classification relates to the requested one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeRevision {
    Unchanged,
    Reduced,
    Increased,
    Reclassified,
}

impl FeeRevision {
    pub fn between(requested: FeeType, decided: FeeType) -> Self {
        if requested == decided {
            return FeeRevision::Unchanged;
        }

        let base = FeeDetails::default();
        let cost = |fee_type| {
            FeeDetails {
                fee_type,
                ..base.clone()
            }
            .cost(PaymentState::Pending)
        };

        match cost(decided).cmp(&cost(requested)) {
            std::cmp::Ordering::Less => FeeRevision::Reduced,
            std::cmp::Ordering::Greater => FeeRevision::Increased,
            std::cmp::Ordering::Equal => FeeRevision::Reclassified,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeeRevision::Unchanged => "unchanged",
            FeeRevision::Reduced => "reduced",
            FeeRevision::Increased => "increased",
            FeeRevision::Reclassified => "reclassified",
        }
    }
}

/// Result of reconciling an approval against the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeOutcome {
    /// Nothing left to pay and the application is signed: file it and start
    /// the certificate provider.
    CompleteAndFile,
    /// Nothing left to pay but signing is still outstanding; the cascade runs
    /// when signing completes.
    CompleteDeferred,
    /// A balance remains.
    Approve,
}

impl FeeOutcome {
    pub fn payment_state(self) -> PaymentState {
        match self {
            FeeOutcome::CompleteAndFile | FeeOutcome::CompleteDeferred => PaymentState::Completed,
            FeeOutcome::Approve => PaymentState::Approved,
        }
    }
}

/// Reconciliation table.
///
/// | obligation  | signed | outcome          |
/// |-------------|--------|------------------|
/// | settled     | yes    | CompleteAndFile  |
/// | settled     | no     | CompleteDeferred |
/// | outstanding | any    | Approve          |
///
/// The obligation is computed from the decided classification against what
/// was already paid under the requested one, which is where the requested
/// classification enters: asking for no fee and being granted half leaves a
/// balance, asking for half (and paying it) and being granted a quarter does not.
pub fn reconcile(obligation: Obligation, signed: bool) -> FeeOutcome {
    match (obligation, signed) {
        (Obligation::Settled, true) => FeeOutcome::CompleteAndFile,
        (Obligation::Settled, false) => FeeOutcome::CompleteDeferred,
        (Obligation::Outstanding(_), _) => FeeOutcome::Approve,
    }
}
